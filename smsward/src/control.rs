//! Control surface for observing and nudging the queue.
//!
//! Newline-delimited JSON over a Unix socket: one [`Request`] per line, one
//! [`Response`] per line back. Exposes pending/failed listings plus the
//! manual retry, dismiss and clear-failed actions.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smsward_common::{
    Signal, internal,
    message::MessageId,
    state::{QueueItem, QueueStatus},
};
use smsward_delivery::{QueueControlService, QueueStats};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    sync::broadcast,
};
use tracing::{debug, error, warn};

use crate::socket;

/// How long to wait for a request line before dropping the client
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Control request, one JSON document per line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Queue counters
    Status,
    /// List queue items, optionally filtered by status
    List {
        #[serde(default)]
        status: Option<QueueStatus>,
    },
    /// Reset a failed item for an immediate retry
    Retry { id: String },
    /// Dismiss an item without retrying
    Dismiss { id: String },
    /// Dismiss every failed item
    ClearFailed,
}

/// Control response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Stats(QueueStats),
    Items(Vec<ItemView>),
    Cleared { removed: usize },
    Done,
    Error { message: String },
}

/// Display projection of one queue item
///
/// Timestamps are rendered for humans. Raw transport exceptions never leave
/// the daemon, only the recorded reason string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub sender: String,
    pub body: String,
    pub status: String,
    pub attempts: u32,
    pub captured_at: String,
    pub next_retry: Option<String>,
    pub error: Option<String>,
}

fn format_time(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

impl From<&QueueItem> for ItemView {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id().to_string(),
            sender: item.message.sender.clone(),
            body: item.message.body.clone(),
            status: match item.status {
                QueueStatus::Pending => "pending".to_string(),
                QueueStatus::Failed => "failed".to_string(),
            },
            attempts: item.attempts,
            captured_at: format_time(item.message.captured_at),
            next_retry: item.next_retry.map(format_time),
            error: item.error.clone(),
        }
    }
}

/// Serves the control socket
pub struct ControlServer {
    socket_path: PathBuf,
    service: Arc<dyn QueueControlService>,
}

impl std::fmt::Debug for ControlServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlServer")
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl ControlServer {
    #[must_use]
    pub fn new(socket_path: PathBuf, service: Arc<dyn QueueControlService>) -> Self {
        Self {
            socket_path,
            service,
        }
    }

    /// Run the control listener until a shutdown signal arrives
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> std::io::Result<()> {
        let listener = socket::bind(&self.socket_path).await?;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let service = Arc::clone(&self.service);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, service).await {
                                    error!("Error on control connection: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting control connection: {e}");
                        }
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Control listener shutting down");
                            break;
                        }
                        Err(e) => {
                            error!("Control listener shutdown channel error: {e}");
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

async fn handle_connection(
    stream: UnixStream,
    service: Arc<dyn QueueControlService>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    loop {
        let line = match tokio::time::timeout(READ_TIMEOUT, lines.next_line()).await {
            Ok(line) => line?,
            Err(_) => {
                debug!("Closing idle control connection");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(service.as_ref(), request).await,
            Err(e) => Response::Error {
                message: format!("Undecodable request: {e}"),
            },
        };

        let mut encoded = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
        encoded.push(b'\n');
        write.write_all(&encoded).await?;
    }
}

/// Execute one request against the queue service
///
/// Contract violations (unknown id, resetting a pending item) come back as
/// `Error` responses; they never disturb the scheduler loop.
async fn dispatch(service: &dyn QueueControlService, request: Request) -> Response {
    match request {
        Request::Status => Response::Stats(service.stats().await),
        Request::List { status } => Response::Items(
            service
                .list(status)
                .await
                .iter()
                .map(ItemView::from)
                .collect(),
        ),
        Request::Retry { id } => match parse_id(&id) {
            Err(response) => response,
            Ok(id) => match service.retry(id).await {
                Ok(()) => Response::Done,
                Err(e) => {
                    warn!("Retry of {id} rejected: {e}");
                    Response::Error {
                        message: e.to_string(),
                    }
                }
            },
        },
        Request::Dismiss { id } => match parse_id(&id) {
            Err(response) => response,
            Ok(id) => match service.dismiss(id).await {
                Ok(true) => Response::Done,
                Ok(false) => Response::Error {
                    message: format!("No such item: {id}"),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            },
        },
        Request::ClearFailed => match service.clear_failed().await {
            Ok(removed) => Response::Cleared { removed },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },
    }
}

fn parse_id(id: &str) -> Result<MessageId, Response> {
    id.parse().map_err(|e| Response::Error {
        message: format!("Invalid message id {id:?}: {e}"),
    })
}
