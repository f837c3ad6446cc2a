// src/server/socket.rs

//! Server-side socket for one session.
//!
//! A socket is created by the listener on the first frame carrying a new
//! reply subject. Later frames with the same reply subject are appended to
//! the socket's backlog. The backlog feeds a single-slot hand-off channel
//! that a parked [`Socket::recv`] waits on:
//!
//! ```text
//!   listener ──deliver──▶ backlog (VecDeque) ──promote──▶ slot (cap 1) ──▶ recv()
//! ```
//!
//! Promotion is always non-blocking. The listener promotes after every
//! delivery and `recv` promotes after every take, so the slot followed by
//! the backlog is one FIFO queue and no frame is lost or duplicated while
//! the socket is open.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::domain::{decode, encode};
use crate::{
    // ---
    lock_ignore_poison,
    log_debug,
    Address,
    BusPtr,
    Error,
    Frame,
    Message,
    Result,
};

/// Duplex endpoint for one session, handed to the accept handler.
///
/// Cheap to clone (internally `Arc`-backed); clones refer to the same
/// session.
#[derive(Clone)]
pub struct Socket {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    bus: BusPtr,
    reply: Address,

    backlog: Mutex<VecDeque<Frame>>,
    slot_tx: mpsc::Sender<Frame>,

    // The async mutex admits one receiver at a time.
    slot_rx: tokio::sync::Mutex<mpsc::Receiver<Frame>>,

    closed: AtomicBool,
    close_tx: watch::Sender<bool>,
}

impl Socket {
    // ---
    pub(crate) fn new(bus: BusPtr, reply: Address) -> Self {
        // ---
        let (slot_tx, slot_rx) = mpsc::channel(1);
        let (close_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                bus,
                reply,
                backlog: Mutex::new(VecDeque::new()),
                slot_tx,
                slot_rx: tokio::sync::Mutex::new(slot_rx),
                closed: AtomicBool::new(false),
                close_tx,
            }),
        }
    }

    /// Reply subject of the session, which is also its registry key.
    pub fn reply_to(&self) -> &Address {
        &self.inner.reply
    }

    /// Whether [`close`](Socket::close) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the socket is closed.
    pub async fn closed(&self) {
        // ---
        let mut rx = self.inner.close_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Receive the next message of the session.
    ///
    /// Waits until a frame is buffered or the socket is closed.
    ///
    /// # Errors
    ///
    /// - [`Error::Eof`] once the socket is closed, including when the close
    ///   happens while this call is waiting.
    /// - [`Error::Serialization`] if the frame does not decode. The socket
    ///   stays open and the next call returns the following frame.
    pub async fn recv(&self) -> Result<Message> {
        // ---
        let mut slot = self.inner.slot_rx.lock().await;

        if self.is_closed() {
            return Err(Error::Eof);
        }

        let frame = tokio::select! {
            biased;
            _ = self.closed() => return Err(Error::Eof),
            frame = slot.recv() => frame,
        };

        // The sender lives in `Inner`, so the slot cannot disconnect while
        // `self` is alive.
        let Some(frame) = frame else {
            return Err(Error::Eof);
        };

        self.promote();
        drop(slot);

        decode(&frame.payload)
    }

    /// Publish a reply to the session's reply subject.
    ///
    /// Fire-and-forget: no acknowledgement is awaited. The socket does not
    /// guard against sending after close.
    pub async fn send(&self, msg: &Message) -> Result<()> {
        // ---
        let payload = encode(msg)?;
        self.inner.bus.publish(&self.inner.reply, payload).await
    }

    /// Close the socket.
    ///
    /// Idempotent; only the first call has an effect. Closing wakes a
    /// receiver parked in [`recv`](Socket::recv) and lets the listener drop
    /// the session from its registry.
    pub fn close(&self) -> Result<()> {
        // ---
        self.shutdown();
        Ok(())
    }

    /// Perform the one-shot close. Returns `true` for the call that won.
    pub(crate) fn shutdown(&self) -> bool {
        // ---
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.inner.close_tx.send_replace(true);
        log_debug!("{}: session {} closed", self.inner.bus.bus_id(), self.inner.reply);
        true
    }

    /// Append a frame to the backlog and try to hand the head to a receiver.
    pub(crate) fn deliver(&self, frame: Frame) {
        // ---
        let mut backlog = lock_ignore_poison(&self.inner.backlog);
        backlog.push_back(frame);
        Self::promote_locked(&self.inner.slot_tx, &mut backlog);
    }

    /// Number of frames buffered behind the hand-off slot.
    #[cfg(test)]
    pub(crate) fn backlog_len(&self) -> usize {
        lock_ignore_poison(&self.inner.backlog).len()
    }

    pub(crate) fn same_session(&self, other: &Socket) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn promote(&self) {
        // ---
        let mut backlog = lock_ignore_poison(&self.inner.backlog);
        Self::promote_locked(&self.inner.slot_tx, &mut backlog);
    }

    // Non-blocking: an occupied slot leaves the head in place for the next
    // promotion.
    fn promote_locked(slot: &mpsc::Sender<Frame>, backlog: &mut VecDeque<Frame>) {
        // ---
        let Some(head) = backlog.pop_front() else {
            return;
        };

        match slot.try_send(head) {
            Ok(()) => {}
            Err(TrySendError::Full(head)) | Err(TrySendError::Closed(head)) => {
                backlog.push_front(head);
            }
        }
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("reply", &self.inner.reply)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
