pub mod clock;
pub mod logging;
pub mod message;
pub mod state;

pub use tracing;

/// Shutdown coordination signal, broadcast to every long-running task.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
