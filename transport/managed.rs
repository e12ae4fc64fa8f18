// Managed transport: event-driven in-process sessions over crossbeam channels
//
// Each endpoint is fed `SessionEvent`s by its peer instead of reading a
// socket. Delivery is message-granular like a datagram, but ordered and
// reliable, with an explicit close event.
use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};
use transmission_core::{BackendKind, Result, TransmissionError};

use crate::traits::{Backend, BackendListener, Delivery};

// Session ids start above any file descriptor so identifiers never collide.
static NEXT_SESSION_ID: AtomicI64 = AtomicI64::new(1 << 32);

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Data(Bytes),
    Closed,
}

pub struct ManagedBackend {
    id: i64,
    inbound: Receiver<SessionEvent>,
    // Our own inbound sender, used to wake a receive blocked on close.
    wake: Sender<SessionEvent>,
    outbound: Sender<SessionEvent>,
    read_timeout: Mutex<Option<Duration>>,
    remote_closed: AtomicBool,
    closed: AtomicBool,
}

/// Two connected endpoints of one session.
pub fn pair() -> (ManagedBackend, ManagedBackend) {
    let (a_tx, a_rx) = unbounded();
    let (b_tx, b_rx) = unbounded();

    let a = ManagedBackend::new(a_rx, a_tx.clone(), b_tx.clone());
    let b = ManagedBackend::new(b_rx, b_tx, a_tx);
    debug!(a = a.id, b = b.id, "managed session opened");
    (a, b)
}

impl ManagedBackend {
    fn new(inbound: Receiver<SessionEvent>, wake: Sender<SessionEvent>, outbound: Sender<SessionEvent>) -> Self {
        ManagedBackend {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            inbound,
            wake,
            outbound,
            read_timeout: Mutex::new(None),
            remote_closed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    fn next_event(&self) -> Result<SessionEvent> {
        let timeout = *self.read_timeout.lock();
        match timeout {
            Some(timeout) => match self.inbound.recv_timeout(timeout) {
                Ok(event) => Ok(event),
                Err(RecvTimeoutError::Timeout) => Err(TransmissionError::Io(io::Error::new(
                    ErrorKind::TimedOut,
                    "managed receive timed out",
                ))),
                Err(RecvTimeoutError::Disconnected) => Ok(SessionEvent::Closed),
            },
            None => Ok(self.inbound.recv().unwrap_or(SessionEvent::Closed)),
        }
    }
}

impl Backend for ManagedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Managed
    }

    fn receive(&self, _max_bytes: usize) -> Result<Delivery> {
        if self.remote_closed() || self.closed.load(Ordering::Acquire) {
            return Ok(Delivery::closed());
        }

        match self.next_event()? {
            SessionEvent::Data(data) => {
                trace!(session = self.id, bytes = data.len(), "managed receive");
                Ok(Delivery::data(data))
            }
            SessionEvent::Closed => {
                self.remote_closed.store(true, Ordering::Release);
                trace!(session = self.id, "managed peer closed");
                Ok(Delivery::closed())
            }
        }
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransmissionError::Closed);
        }
        self.outbound
            .send(SessionEvent::Data(Bytes::copy_from_slice(data)))
            .map_err(|_| {
                TransmissionError::Io(io::Error::new(ErrorKind::BrokenPipe, "managed peer is gone"))
            })?;
        trace!(session = self.id, bytes = data.len(), "managed send");
        Ok(data.len())
    }

    fn remote_closed(&self) -> bool {
        self.remote_closed.load(Ordering::Acquire)
    }

    fn native_handle(&self) -> i64 {
        self.id
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        *self.read_timeout.lock() = timeout;
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(session = self.id, "closing managed session");
        let _ = self.outbound.send(SessionEvent::Closed);
        let _ = self.wake.send(SessionEvent::Closed);
        Ok(())
    }
}

impl Drop for ManagedBackend {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            let _ = self.outbound.send(SessionEvent::Closed);
        }
    }
}

enum Incoming {
    Session(ManagedBackend),
    Shutdown,
}

/// Accepts sessions opened through the matching `ManagedConnector`.
pub struct ManagedListener {
    id: i64,
    incoming: Receiver<Incoming>,
    wake: Sender<Incoming>,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct ManagedConnector {
    outgoing: Sender<Incoming>,
}

pub fn listener() -> (ManagedListener, ManagedConnector) {
    let (tx, rx) = unbounded();
    let listener = ManagedListener {
        id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
        incoming: rx,
        wake: tx.clone(),
        closed: AtomicBool::new(false),
    };
    (listener, ManagedConnector { outgoing: tx })
}

impl ManagedConnector {
    /// Open a session; the other endpoint is queued for the listener.
    pub fn connect(&self) -> Result<ManagedBackend> {
        let (local, remote) = pair();
        self.outgoing
            .send(Incoming::Session(remote))
            .map_err(|_| {
                TransmissionError::Io(io::Error::new(
                    ErrorKind::ConnectionRefused,
                    "managed listener is gone",
                ))
            })?;
        Ok(local)
    }
}

impl BackendListener for ManagedListener {
    fn kind(&self) -> BackendKind {
        BackendKind::Managed
    }

    fn accept(&self) -> Result<Box<dyn Backend>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransmissionError::Closed);
        }
        match self.incoming.recv() {
            Ok(Incoming::Session(backend)) if !self.closed.load(Ordering::Acquire) => {
                debug!(listener = self.id, session = backend.id, "managed session accepted");
                Ok(Box::new(backend))
            }
            _ => Err(TransmissionError::Closed),
        }
    }

    fn native_handle(&self) -> i64 {
        self.id
    }

    fn close(&self) -> io::Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.wake.send(Incoming::Shutdown);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (a, b) = pair();
        a.send(b"one").unwrap();
        a.send(b"two").unwrap();

        assert_eq!(&b.receive(64).unwrap().data[..], b"one");
        assert_eq!(&b.receive(64).unwrap().data[..], b"two");
    }

    #[test]
    fn close_is_seen_by_peer() {
        let (a, b) = pair();
        a.close().unwrap();

        let delivery = b.receive(64).unwrap();
        assert!(delivery.peer_closed);
        assert!(delivery.data.is_empty());
        assert!(b.remote_closed());
        assert!(matches!(a.send(b"late"), Err(TransmissionError::Closed)));
    }

    #[test]
    fn dropping_an_endpoint_closes_the_session() {
        let (a, b) = pair();
        drop(a);
        assert!(b.receive(64).unwrap().peer_closed);
    }

    #[test]
    fn receive_times_out() {
        let (_a, b) = pair();
        b.set_read_timeout(Some(Duration::from_millis(20))).unwrap();

        let err = b.receive(64).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn close_wakes_blocked_receive() {
        let (_a, b) = pair();
        let b = std::sync::Arc::new(b);
        let reader = {
            let b = std::sync::Arc::clone(&b);
            std::thread::spawn(move || b.receive(64))
        };
        std::thread::sleep(Duration::from_millis(20));
        b.close().unwrap();

        let delivery = reader.join().unwrap().unwrap();
        assert!(delivery.peer_closed);
    }

    #[test]
    fn listener_accepts_connected_sessions() {
        let (listener, connector) = listener();
        let client = connector.connect().unwrap();
        let server = listener.accept().unwrap();

        client.send(b"hello").unwrap();
        assert_eq!(&server.receive(64).unwrap().data[..], b"hello");
        assert_ne!(client.native_handle(), server.native_handle());

        listener.close().unwrap();
        assert!(matches!(listener.accept(), Err(TransmissionError::Closed)));
    }
}
