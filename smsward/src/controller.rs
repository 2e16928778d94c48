//! Top-level controller: configuration root and task supervision.

use std::{path::PathBuf, sync::Arc, sync::LazyLock};

use serde::Deserialize;
use smsward_common::{
    Signal,
    clock::{Clock, SystemClock},
    internal, logging, tracing,
};
use smsward_delivery::{
    CredentialSource, DeliveryQueue, DeliveryScheduler, LogNotifier, QueueControlService,
    QueueService, SchedulerConfig,
};
use smsward_smtp::{FileCredentials, SmtpConfig, SmtpMailer};
use smsward_store::StoreConfig;
use tokio::sync::broadcast;

use crate::{
    control::ControlServer,
    ingest::SmsIngest,
    intake::IntakeServer,
    lines::{LineConfig, LineRegistry},
};

fn default_intake_socket() -> PathBuf {
    PathBuf::from("/tmp/smsward-intake.sock")
}

fn default_control_socket() -> PathBuf {
    PathBuf::from("/tmp/smsward-control.sock")
}

/// The deserialized configuration root, and everything it controls
#[derive(Debug, Deserialize)]
pub struct Smsward {
    /// Relay and mailbox settings
    smtp: SmtpConfig,

    /// Where queue state survives restarts
    #[serde(default)]
    store: StoreConfig,

    /// Scheduler tick and retry policy
    #[serde(default)]
    delivery: SchedulerConfig,

    /// Configured phone lines, for receiving-number attribution
    #[serde(default)]
    lines: Vec<LineConfig>,

    /// Socket the platform SMS hook writes raw events to
    #[serde(default = "default_intake_socket")]
    intake_socket: PathBuf,

    /// Socket smswardctl talks to
    #[serde(default = "default_control_socket")]
    control_socket: PathBuf,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Smsward {
    /// Run this controller, and everything it controls
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is unusable,
    /// the state store cannot be prepared, or a listener socket cannot be
    /// bound.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        if !self.smtp.is_configured() {
            anyhow::bail!(
                "SMTP relay is not configured: host, username, from_email and to_email are required"
            );
        }

        self.store.init()?;
        let store = self.store.clone().into_state_store();

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let queue = DeliveryQueue::restore(store, self.delivery.retry.clone()).await?;

        let scheduler = DeliveryScheduler::new(
            &self.delivery,
            queue.clone(),
            Arc::new(SmtpMailer::new(self.smtp.clone())),
            Arc::new(FileCredentials::new(&self.smtp)),
            Arc::new(LogNotifier),
            Arc::clone(&clock),
        );

        let lines = LineRegistry::new(self.lines.clone());
        if lines.is_multi_line() {
            internal!(
                level = INFO,
                "Multiple lines configured; receiving-number attribution disabled"
            );
        }
        let ingest = Arc::new(SmsIngest::new(queue.clone(), lines, Arc::clone(&clock)));
        let intake = IntakeServer::new(self.intake_socket.clone(), ingest);

        let service: Arc<dyn QueueControlService> = Arc::new(QueueService::new(queue, clock));
        let control = ControlServer::new(self.control_socket.clone(), service);

        internal!("Controller running");

        let ret = tokio::select! {
            () = scheduler.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                Ok(())
            }
            r = intake.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(Into::into)
            }
            r = control.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(Into::into)
            }
            r = shutdown() => {
                r
            }
        };

        internal!("Shutting down...");

        ret
    }

    /// Send the probe email through the configured relay and report the result
    ///
    /// # Errors
    ///
    /// Returns the transport's failure reason if the probe could not be sent.
    pub async fn test_smtp(&self) -> anyhow::Result<()> {
        if !self.smtp.is_configured() {
            anyhow::bail!(
                "SMTP relay is not configured: host, username, from_email and to_email are required"
            );
        }

        let credentials = FileCredentials::new(&self.smtp).resolve().await?;
        SmtpMailer::new(self.smtp.clone())
            .send_test_probe(&credentials)
            .await?;

        println!("Test email sent to {}", self.smtp.to_email);
        Ok(())
    }
}
