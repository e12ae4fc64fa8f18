// Unix socket transport implementation, including socket-activated streams
use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg};
use tracing::{debug, info};
use transmission_core::{BackendKind, Result, TransmissionError};

use crate::stream::{accept_until_closed, shutdown_listener, StreamBackend, StreamSocket};
use crate::traits::{Backend, BackendListener};

/// First file descriptor a service manager passes to an activated process.
pub const INHERITED_FD: RawFd = 3;

static INHERITED_TAKEN: AtomicBool = AtomicBool::new(false);

pub type UnixBackend = StreamBackend<UnixStream>;

impl StreamSocket for UnixStream {
    fn read_some(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut stream = self;
        stream.read(buf)
    }

    fn write_all_bytes(&self, data: &[u8]) -> io::Result<()> {
        let mut stream = self;
        stream.write_all(data)?;
        stream.flush()
    }

    fn set_receive_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn shutdown_both(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

impl StreamBackend<UnixStream> {
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref())?;
        debug!(fd = stream.as_raw_fd(), path = %path.as_ref().display(), "unix connected");
        Ok(StreamBackend::new(stream))
    }

    /// Adopt the connected socket handed over as fd 3 by a service manager
    /// (socket activation with one connection per process).
    ///
    /// The descriptor can only be adopted once per process.
    pub fn inherited() -> Result<Self> {
        if INHERITED_TAKEN.swap(true, Ordering::AcqRel) {
            return Err(TransmissionError::InvalidArgument(format!(
                "inherited fd {} already adopted",
                INHERITED_FD
            )));
        }

        if let Err(errno) = fcntl(INHERITED_FD, FcntlArg::F_GETFD) {
            INHERITED_TAKEN.store(false, Ordering::Release);
            return Err(TransmissionError::Io(io::Error::from(errno)));
        }

        // SAFETY: the descriptor is open (checked above) and is owned by no
        // other object in this process (guarded by INHERITED_TAKEN).
        let stream = unsafe { UnixStream::from_raw_fd(INHERITED_FD) };
        info!(fd = INHERITED_FD, "adopted inherited stream socket");
        Ok(StreamBackend::new(stream))
    }
}

pub struct UnixBackendListener {
    listener: UnixListener,
    path: PathBuf,
    closed: AtomicBool,
}

impl UnixBackendListener {
    /// Bind `path`, removing a stale socket file left by a previous run.
    pub fn bind<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "unix listener bound");
        Ok(UnixBackendListener {
            listener,
            path,
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BackendListener for UnixBackendListener {
    fn kind(&self) -> BackendKind {
        BackendKind::Stream
    }

    fn accept(&self) -> Result<Box<dyn Backend>> {
        let (stream, _) = accept_until_closed(&self.closed, || self.listener.accept())?;
        debug!(fd = stream.as_raw_fd(), path = %self.path.display(), "unix connection accepted");
        Ok(Box::new(UnixBackend::new(stream)))
    }

    fn native_handle(&self) -> i64 {
        self.listener.as_raw_fd() as i64
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _ = fs::remove_file(&self.path);
        shutdown_listener(self.listener.as_raw_fd())
    }
}
