//! Unix datagram receiver for telemetry samples

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixDatagram;
use tokio::time::timeout;
use tracing::{debug, info};

pub const RECV_BUFFER_SIZE: usize = 4096;
pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub struct DatagramReceiver {
    path: PathBuf,
    socket: UnixDatagram,
    buf: Vec<u8>,
}

impl DatagramReceiver {
    /// Binds at `path`, replacing a stale socket file. Must be called from
    /// within a tokio runtime.
    pub fn bind(path: &Path) -> io::Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed stale socket {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let socket = UnixDatagram::bind(path)?;
        info!("Listening on {:?}", path);
        Ok(Self { path: path.to_path_buf(), socket, buf: vec![0u8; RECV_BUFFER_SIZE] })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits up to [`RECV_TIMEOUT`] for one datagram. `Ok(None)` means the
    /// wait timed out.
    pub async fn recv(&mut self) -> io::Result<Option<&[u8]>> {
        match timeout(RECV_TIMEOUT, self.socket.recv(&mut self.buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(n)) => Ok(Some(&self.buf[..n])),
            Ok(Err(e)) => Err(e),
        }
    }
}

impl Drop for DatagramReceiver {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
