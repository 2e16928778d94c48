#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use smsward::control::{ItemView, Request, Response};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};

#[derive(Debug, Parser)]
#[command(name = "smswardctl", about = "Inspect and manage a running smsward instance")]
struct Cli {
    /// Path to the control socket
    #[arg(long, default_value = "/tmp/smsward-control.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show queue counters
    Status,
    /// List queued items
    List {
        /// Only failed items
        #[arg(long, conflicts_with = "pending")]
        failed: bool,
        /// Only pending items
        #[arg(long)]
        pending: bool,
    },
    /// Reset a failed item for an immediate retry
    Retry {
        /// The item's message id
        id: String,
    },
    /// Dismiss an item without retrying
    Dismiss {
        /// The item's message id
        id: String,
    },
    /// Dismiss every failed item
    ClearFailed,
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        use smsward_common::state::QueueStatus;

        match command {
            Command::Status => Self::Status,
            Command::List { failed, pending } => Self::List {
                status: if failed {
                    Some(QueueStatus::Failed)
                } else if pending {
                    Some(QueueStatus::Pending)
                } else {
                    None
                },
            },
            Command::Retry { id } => Self::Retry { id },
            Command::Dismiss { id } => Self::Dismiss { id },
            Command::ClearFailed => Self::ClearFailed,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let stream = UnixStream::connect(&cli.socket).await.map_err(|e| {
        anyhow::anyhow!(
            "Cannot reach smsward at {}: {e} (is the daemon running?)",
            cli.socket.display()
        )
    })?;
    let (read, mut write) = stream.into_split();

    let mut encoded = serde_json::to_vec(&Request::from(cli.command))?;
    encoded.push(b'\n');
    write.write_all(&encoded).await?;

    let mut lines = BufReader::new(read).lines();
    let Some(line) = lines.next_line().await? else {
        anyhow::bail!("Connection closed without a response");
    };

    match serde_json::from_str::<Response>(&line)? {
        Response::Stats(stats) => {
            println!("pending:          {}", stats.pending);
            println!("failed:           {}", stats.failed);
            println!("total forwarded:  {}", stats.total_forwarded);
        }
        Response::Items(items) => {
            if items.is_empty() {
                println!("Queue is empty");
            }
            for item in items {
                print_item(&item);
            }
        }
        Response::Cleared { removed } => println!("Removed {removed} failed item(s)"),
        Response::Done => println!("OK"),
        Response::Error { message } => anyhow::bail!(message),
    }

    Ok(())
}

fn print_item(item: &ItemView) {
    println!(
        "{} [{}] attempts={} from={}",
        item.id, item.status, item.attempts, item.sender
    );
    println!("    captured: {}", item.captured_at);
    if let Some(next_retry) = &item.next_retry {
        println!("    next retry: {next_retry}");
    }
    if let Some(error) = &item.error {
        println!("    error: {error}");
    }
    let mut body: String = item.body.chars().take(50).collect();
    if body.len() < item.body.len() {
        body.push_str("...");
    }
    println!("    \"{body}\"");
}
