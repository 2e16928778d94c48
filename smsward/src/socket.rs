//! Unix-socket plumbing shared by the intake and control listeners.

use std::path::Path;

use tokio::net::{UnixListener, UnixStream};
use tracing::info;

/// Bind a listening socket at `path`
///
/// Refuses to bind when another instance is actively listening; a stale
/// socket file left by a crashed process is removed. The socket is
/// restricted to the owning user (mode 0600).
pub(crate) async fn bind(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        // Test whether the socket is live by attempting a connection
        if UnixStream::connect(path).await.is_ok() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "Socket already in use by a running instance: {}",
                    path.display()
                ),
            ));
        }
        // Stale socket from a crashed process, safe to remove
        info!("Removing stale socket file: {}", path.display());
        tokio::fs::remove_file(path).await?;
    }

    let listener = UnixListener::bind(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = tokio::fs::metadata(path).await?;
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    info!("Listening on {}", path.display());
    Ok(listener)
}

/// Remove the socket file on shutdown; failures are irrelevant at this point
pub(crate) async fn cleanup(path: &Path) {
    if path.exists() {
        let _ = tokio::fs::remove_file(path).await;
    }
}
