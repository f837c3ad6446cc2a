//! Server side: listener and per-session sockets.
//!
//! # Architecture
//!
//! A [`Listener`] owns one bus subscription on its listen subject. The bus
//! has no notion of an incoming connection, so every frame on that subject
//! is either the first frame of a new session or a continuation of a known
//! one. The frame's reply subject is the only session identifier available
//! and becomes the registry key.
//!
//! For every new session the accept loop spawns:
//! - the handler task, which receives the [`Socket`];
//! - a supervisor that turns a handler panic into a socket close;
//! - a cleanup watcher that deletes the registry entry once the socket
//!   closes.
//!
//! The loop itself never waits on a handler.
//!
//! # Limitations
//!
//! Closing the listener stops dispatch and releases its subscription. Live
//! sockets are not closed; handlers close them independently. The
//! listener's bus connection is closed once the listener is closed and the
//! last session is gone, so a socket that is never closed keeps the
//! connection open.

mod sessions;
mod socket;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use sessions::{Route, SessionTable};
pub use socket::Socket;

use crate::{
    // ---
    lock_ignore_poison,
    log_debug,
    log_error,
    log_info,
    log_warn,
    Address,
    BusPtr,
    Error,
    Frame,
    Result,
    SubscriptionPtr,
};

/// Accepts sessions on a bus subject.
///
/// Cheap to clone (internally `Arc`-backed), so one clone can run
/// [`accept`](Listener::accept) in a task while another calls
/// [`close`](Listener::close).
#[derive(Clone)]
pub struct Listener {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    bus: BusPtr,
    addr: Address,
    poll_interval: Duration,
    sessions: SessionTable,

    /// Taken by the accept loop; `None` while accepting or after close.
    subscription: Mutex<Option<SubscriptionPtr>>,
    accepting: AtomicBool,

    exit_tx: watch::Sender<bool>,
}

impl Listener {
    // ---
    /// Subscribe to `addr` and build a listener around the subscription.
    ///
    /// Subscribing eagerly means frames published after `listen` returns
    /// are buffered even if `accept` has not started yet.
    pub(crate) async fn bind(bus: BusPtr, addr: Address, poll_interval: Duration) -> Result<Self> {
        // ---
        let subscription = bus.subscribe_sync(&addr).await?;
        let (exit_tx, _) = watch::channel(false);

        log_info!("{}: listening on {addr}", bus.bus_id());

        Ok(Self {
            inner: Arc::new(Inner {
                sessions: SessionTable::new(bus.clone()),
                bus,
                addr,
                poll_interval,
                subscription: Mutex::new(Some(subscription)),
                accepting: AtomicBool::new(false),
                exit_tx,
            }),
        })
    }

    /// Subject this listener receives on.
    pub fn addr(&self) -> &str {
        self.inner.addr.as_str()
    }

    /// Number of sessions currently in the registry.
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.len().await
    }

    /// Whether a session keyed by `reply` is currently registered.
    pub async fn has_session(&self, reply: &Address) -> bool {
        self.inner.sessions.contains(reply).await
    }

    /// Run the accept loop until [`close`](Listener::close) is called.
    ///
    /// `handler` is invoked once per new session, in its own task. A panic
    /// inside the handler closes that session's socket and leaves the loop
    /// and all other sessions untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the listener is already accepting or was
    ///   closed before this call could take the subscription.
    /// - Any non-timeout receive error from the bus, which ends the loop.
    pub async fn accept<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(Socket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        let mut sub = {
            let mut slot = lock_ignore_poison(&self.inner.subscription);
            let sub = slot.take().ok_or_else(|| {
                Error::Transport(format!(
                    "listener {} is closed or already accepting",
                    self.inner.addr
                ))
            })?;
            // Set under the slot lock so `close` cannot release the bus
            // between the take and the store.
            self.inner.accepting.store(true, Ordering::SeqCst);
            sub
        };

        let handler = Arc::new(handler);
        let mut exit = self.inner.exit_tx.subscribe();
        let bus_id = self.inner.bus.bus_id();

        let outcome = loop {
            // ---
            let next = tokio::select! {
                biased;
                _ = stopped(&mut exit) => break Ok(()),
                next = sub.next_frame(self.inner.poll_interval) => next,
            };

            match next {
                Ok(frame) => self.dispatch(frame, &handler).await,
                Err(Error::Timeout) => continue,
                Err(err) => {
                    log_error!("{bus_id}: accept on {} failed: {err}", self.inner.addr);
                    break Err(err);
                }
            }
        };

        let result = match outcome {
            Ok(()) => {
                log_info!("{bus_id}: stopped listening on {}", self.inner.addr);
                sub.unsubscribe().await
            }
            Err(err) => {
                if let Err(_unsub_err) = sub.unsubscribe().await {
                    log_debug!("{bus_id}: unsubscribe after failure: {_unsub_err}");
                }
                Err(err)
            }
        };

        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.release_if_idle().await;

        result
    }

    /// Stop the accept loop and release the subscription.
    ///
    /// Sockets of live sessions stay open and can keep replying. The bus
    /// connection is closed as soon as no session is left, here if the
    /// registry is already empty, otherwise when the last socket closes.
    pub async fn close(&self) -> Result<()> {
        // ---
        self.inner.exit_tx.send_replace(true);

        // Not accepting yet: release the idle subscription here.
        let idle = lock_ignore_poison(&self.inner.subscription).take();
        if let Some(mut sub) = idle {
            sub.unsubscribe().await?;
        }

        self.inner.release_if_idle().await;
        Ok(())
    }

    async fn dispatch<F, Fut>(&self, frame: Frame, handler: &Arc<F>)
    where
        F: Fn(Socket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        let bus_id = self.inner.bus.bus_id();

        match self.inner.sessions.route(frame).await {
            Route::Opened(socket) => {
                log_debug!("{bus_id}: new session {}", socket.reply_to());
                self.spawn_session(socket, Arc::clone(handler));
            }
            Route::Delivered => {}
            Route::Dropped(_reply) => {
                log_debug!("{bus_id}: dropped frame for closed session {_reply}");
            }
            Route::Unroutable(_subject) => {
                log_warn!("{bus_id}: dropped frame on {_subject} without reply subject");
            }
        }
    }

    fn spawn_session<F, Fut>(&self, socket: Socket, handler: Arc<F>)
    where
        F: Fn(Socket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        let handler_task = tokio::spawn({
            let socket = socket.clone();
            async move { handler(socket).await }
        });

        let supervised = socket.clone();
        let bus_id = self.inner.bus.bus_id().to_owned();
        tokio::spawn(async move {
            if let Err(err) = handler_task.await {
                if err.is_panic() {
                    log_warn!("{bus_id}: handler for {} panicked", supervised.reply_to());
                    supervised.shutdown();
                }
            }
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            socket.closed().await;
            inner.sessions.remove(&socket).await;
            inner.release_if_idle().await;
        });
    }
}

impl Inner {
    // ---
    /// Close the bus connection once the listener is closed, the accept
    /// loop has returned and the registry is empty.
    async fn release_if_idle(&self) {
        // ---
        let stopped = *self.exit_tx.borrow();
        if !stopped || self.accepting.load(Ordering::SeqCst) {
            return;
        }
        if self.sessions.len().await > 0 {
            return;
        }

        log_debug!("{}: listener {} idle, closing bus", self.bus.bus_id(), self.addr);
        if let Err(_err) = self.bus.close().await {
            log_debug!("{}: closing bus failed: {_err}", self.bus.bus_id());
        }
    }
}

async fn stopped(exit: &mut watch::Receiver<bool>) {
    let _ = exit.wait_for(|stop| *stop).await;
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("addr", &self.inner.addr)
            .field("bus", &self.inner.bus.bus_id())
            .finish_non_exhaustive()
    }
}
