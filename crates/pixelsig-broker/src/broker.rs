//! Broker orchestration
//!
//! Owns the accept loops (one per listener), the per-connection event tasks,
//! and the periodic reaper. All process-wide state travels in one [`Shared`]
//! value, so several brokers can coexist in a process and tests can poke at
//! the registry directly.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use pixelsig_core::{Envelope, Role};
use pixelsig_transport::{
    RoleDispatch, SocketEvent, SocketHandle, SocketReceiver, TransportError, WsListener,
};

use crate::config::BrokerConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::metrics::{AtomicMetrics, MetricsSink};
use crate::registry::{ConnectionStats, Registry};
use crate::roles;
use crate::subscription::SubscriptionGraph;

/// Half-open sockets the OS has not surfaced yet get swept on this cadence.
const REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Process-wide broker state, shared by every task.
pub(crate) struct Shared {
    pub(crate) config: BrokerConfig,
    pub(crate) registry: Registry,
    pub(crate) graph: SubscriptionGraph,
    pub(crate) metrics: Arc<dyn MetricsSink>,
}

/// The signalling broker.
pub struct Broker {
    shared: Arc<Shared>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self::with_metrics(config, Arc::new(AtomicMetrics::new()))
    }

    pub fn with_metrics(config: BrokerConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: Registry::new(),
                graph: SubscriptionGraph::new(),
                metrics,
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    pub fn graph(&self) -> &SubscriptionGraph {
        &self.shared.graph
    }

    pub fn stats(&self) -> ConnectionStats {
        self.shared.registry.stats(&self.shared.graph)
    }

    /// Bind the configured listeners and serve until the task is dropped.
    ///
    /// Unified mode runs one path-dispatched listener; split mode runs one
    /// hard-wired listener per role (SFU only when enabled).
    pub async fn serve(&self) -> Result<()> {
        let config = &self.shared.config;
        let mut listeners = Vec::new();

        if config.enable_unified_port {
            let addr = format!("{}:{}", config.host, config.unified_port);
            let dispatch = RoleDispatch::ByPath(config.path_map());
            listeners.push(WsListener::bind(&addr, config.listener_config(dispatch)).await?);
            info!(%addr, "serving unified signalling endpoint");
        } else {
            let split = [
                (config.streamer_port, Role::Streamer, true),
                (config.player_port, Role::Player, true),
                (config.sfu_port, Role::Sfu, config.enable_sfu),
            ];
            for (port, role, enabled) in split {
                if !enabled {
                    continue;
                }
                let addr = format!("{}:{}", config.host, port);
                let dispatch = RoleDispatch::Fixed(role);
                listeners.push(WsListener::bind(&addr, config.listener_config(dispatch)).await?);
                info!(%addr, %role, "serving split signalling endpoint");
            }
        }

        let mut tasks = Vec::new();
        for listener in listeners {
            let shared = Arc::clone(&self.shared);
            tasks.push(tokio::spawn(accept_loop(shared, listener)));
        }
        tasks.push(tokio::spawn(reaper_loop(Arc::clone(&self.shared))));

        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: WsListener) {
    loop {
        match listener.accept().await {
            Ok((socket, receiver, role, addr)) => {
                debug!(%addr, %role, "connection accepted");
                spawn_connection_task(Arc::clone(&shared), socket, receiver, role);
            }
            // Refused upgrade: the refusal already went out on the wire and
            // nothing was registered.
            Err(TransportError::HandshakeRejected { .. })
            | Err(TransportError::HandshakeFailed(_)) => {}
            Err(e) => {
                error!("accept error: {e}");
            }
        }
    }
}

/// Register the connection and run its event loop until the socket goes
/// away. Exactly one teardown runs per connection; a panic in dispatch kills
/// only this task, and the reaper finishes the cleanup.
fn spawn_connection_task(
    shared: Arc<Shared>,
    socket: SocketHandle,
    mut receiver: SocketReceiver,
    role: Role,
) {
    let conn = Arc::new(Connection::new(role, socket));
    shared.registry.add(Arc::clone(&conn));
    if role == Role::Streamer {
        shared
            .graph
            .register_streamer(conn.id(), shared.config.max_subscribers);
    }
    shared.metrics.connection_opened(role);
    info!(id = %conn.id(), %role, "connection registered");

    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                SocketEvent::Frame(text) => match Envelope::parse(&text) {
                    Ok(env) => roles::dispatch(&shared, &conn, env),
                    Err(e) => {
                        debug!(id = %conn.id(), "malformed frame: {e}");
                        shared.metrics.malformed_frame();
                        roles::send_to(&shared, &conn, &Envelope::error("malformed message"));
                    }
                },
                SocketEvent::Closed { reason } => {
                    debug!(id = %conn.id(), ?reason, "socket closed");
                    break;
                }
            }
        }
        roles::teardown(&shared, &conn);
    });
}

/// Periodic sweep for connections the event path could not clean up:
/// half-open sockets past the idle threshold and registry entries whose
/// task died.
async fn reaper_loop(shared: Arc<Shared>) {
    let idle_limit = shared.config.connection_timeout();
    let mut ticker = tokio::time::interval(REAPER_INTERVAL);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        for role in [Role::Player, Role::Streamer, Role::Sfu] {
            for conn in shared.registry.enumerate(role) {
                if !conn.is_connected() {
                    debug!(id = %conn.id(), "reaping dead connection");
                    roles::teardown(&shared, &conn);
                } else if conn.idle_duration() > idle_limit {
                    debug!(id = %conn.id(), "reaping idle connection");
                    conn.close();
                }
            }
        }
    }
}
