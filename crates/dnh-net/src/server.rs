// ── Hub server ──
//
// Binds the realtime and HTTP listeners around one coordinator, runs the
// keepalive pinger, and tears everything down on shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use strum::{AsRefStr, Display};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dnh_core::{ConnectionTable, Coordinator, LogSink, ProtocolDispatcher};

use crate::error::Error;
use crate::{http, ws};

/// Lifecycle of a [`HubServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    ShuttingDown,
    /// A listener failed to bind.
    Failed,
}

/// Listener addresses for both front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubAddrs {
    pub http: SocketAddr,
    pub ws: SocketAddr,
}

/// Owns the coordinator, the connection table and the server tasks.
pub struct HubServer {
    coordinator: Coordinator,
    dispatcher: Arc<ProtocolDispatcher>,
    table: Arc<ConnectionTable>,
    cancel: CancellationToken,
    status: watch::Sender<ServerStatus>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HubServer {
    pub fn new(sink: Arc<dyn LogSink>, outbound_queue: usize) -> Self {
        let table = Arc::new(ConnectionTable::new(outbound_queue));
        let coordinator = Coordinator::new(table.clone(), sink);
        let dispatcher = Arc::new(ProtocolDispatcher::new(coordinator.clone()));
        let (status, _) = watch::channel(ServerStatus::Stopped);
        Self {
            coordinator,
            dispatcher,
            table,
            cancel: CancellationToken::new(),
            status,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.table
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Bind both listeners and spawn their accept loops.
    ///
    /// Returns the bound addresses, which differ from `addrs` when a
    /// port of 0 was requested.
    pub async fn start(&self, addrs: HubAddrs) -> Result<HubAddrs, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShutDown);
        }
        let mut started = false;
        self.status.send_if_modified(|status| {
            started = matches!(*status, ServerStatus::Stopped | ServerStatus::Failed);
            if started {
                *status = ServerStatus::Starting;
            }
            started
        });
        if !started {
            return Err(Error::AlreadyRunning);
        }

        let (ws_listener, http_listener) = match bind_both(addrs).await {
            Ok(listeners) => listeners,
            Err(e) => {
                self.status.send_replace(ServerStatus::Failed);
                return Err(e);
            }
        };
        let bound = HubAddrs {
            http: http_listener.local_addr()?,
            ws: ws_listener.local_addr()?,
        };

        let ws_task = tokio::spawn(ws::serve_realtime(
            ws_listener,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.table),
            self.cancel.child_token(),
        ));

        let coordinator = self.coordinator.clone();
        let cancel = self.cancel.child_token();
        let http_task = tokio::spawn(async move {
            if let Err(e) = http::serve_http(http_listener, coordinator, cancel).await {
                tracing::error!(error = %e, "HTTP server stopped");
            }
        });

        self.tasks().extend([ws_task, http_task]);
        self.status.send_replace(ServerStatus::Running);
        tracing::info!(http = %bound.http, ws = %bound.ws, "hub listening");
        Ok(bound)
    }

    /// Ping every open connection each `interval` until shutdown.
    pub fn spawn_pinger(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        let coordinator = self.coordinator.clone();
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let reached = coordinator.ping();
                        tracing::trace!(reached, "ping sent");
                    }
                }
            }
        });
        self.tasks().push(task);
    }

    /// Stop accepting, close every connection, and wait for the server
    /// tasks to finish.
    pub async fn shutdown(&self) {
        self.status.send_replace(ServerStatus::ShuttingDown);
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "server task ended abnormally");
            }
        }
        self.status.send_replace(ServerStatus::Stopped);
        tracing::info!("hub stopped");
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn bind_both(addrs: HubAddrs) -> Result<(TcpListener, TcpListener), Error> {
    let ws = TcpListener::bind(addrs.ws).await.map_err(|source| Error::Bind {
        role: "WebSocket",
        addr: addrs.ws,
        source,
    })?;
    let http = TcpListener::bind(addrs.http).await.map_err(|source| Error::Bind {
        role: "HTTP",
        addr: addrs.http,
        source,
    })?;
    Ok((ws, http))
}
