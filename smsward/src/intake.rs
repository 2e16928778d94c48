//! Intake listener: where the platform SMS hook drops raw events.
//!
//! One newline-delimited JSON [`RawSmsEvent`] per line. Intake is
//! fire-and-forget: the hook gets no reply, and a malformed line is logged
//! and skipped without disturbing the connection or the queue.

use std::{path::PathBuf, sync::Arc, time::Duration};

use smsward_common::{Signal, ingest, internal};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::UnixStream,
    sync::broadcast,
};
use tracing::{debug, error, warn};

use crate::{
    ingest::{RawSmsEvent, SmsIngest},
    socket,
};

/// How long an idle intake connection may sit before being dropped
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Accepts intake connections and feeds events to ingest
#[derive(Debug)]
pub struct IntakeServer {
    socket_path: PathBuf,
    ingest: Arc<SmsIngest>,
}

impl IntakeServer {
    #[must_use]
    pub fn new(socket_path: PathBuf, ingest: Arc<SmsIngest>) -> Self {
        Self {
            socket_path,
            ingest,
        }
    }

    /// Run the intake listener until a shutdown signal arrives
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> std::io::Result<()> {
        let listener = socket::bind(&self.socket_path).await?;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let ingest = Arc::clone(&self.ingest);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, ingest).await {
                                    error!("Error on intake connection: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting intake connection: {e}");
                        }
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Intake listener shutting down");
                            break;
                        }
                        Err(e) => {
                            error!("Intake listener shutdown channel error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        socket::cleanup(&self.socket_path).await;
        Ok(())
    }
}

/// Drain one hook connection, line by line
async fn handle_connection(stream: UnixStream, ingest: Arc<SmsIngest>) -> std::io::Result<()> {
    let mut lines = BufReader::new(stream).lines();

    loop {
        let line = match tokio::time::timeout(IDLE_TIMEOUT, lines.next_line()).await {
            Ok(line) => line?,
            Err(_) => {
                debug!("Closing idle intake connection");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<RawSmsEvent>(&line) {
            Ok(event) => match ingest.observe(event).await {
                Ok(id) => {
                    ingest!(level = INFO, "Accepted message {id} from intake");
                }
                Err(e) => {
                    // A single bad event never takes the listener down
                    warn!("Rejected intake event: {e}");
                }
            },
            Err(e) => {
                warn!("Undecodable intake line: {e}");
            }
        }
    }
}
