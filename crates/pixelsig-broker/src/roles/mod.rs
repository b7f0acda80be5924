//! Role state machines
//!
//! All three roles share one skeleton: stamp activity, classify on the
//! message type, route. Forwarded frames are re-serialized from the parsed
//! envelope, so fields the broker does not understand ride along verbatim.
//!
//! Handling is best-effort per message: a bad frame or a full target queue
//! never poisons the session that produced it.

mod player;
mod sfu;
mod streamer;

use std::sync::Arc;

use tracing::{debug, info, warn};

use pixelsig_core::{Envelope, Role};
use pixelsig_transport::{SendOutcome, TransportError};

use crate::broker::Shared;
use crate::connection::Connection;

/// Route one inbound message to its role handler.
pub(crate) fn dispatch(ctx: &Shared, conn: &Arc<Connection>, env: Envelope) {
    conn.touch();
    match conn.role() {
        Role::Player => player::handle(ctx, conn, env),
        Role::Streamer => streamer::handle(ctx, conn, env),
        Role::Sfu => sfu::handle(ctx, conn, env),
    }
}

/// Tear down a connection: unregister, drop subscription edges, notify the
/// peers affected. Idempotent; the registry removal decides the winner when
/// the connection task and the reaper race here.
pub(crate) fn teardown(ctx: &Shared, conn: &Arc<Connection>) {
    if ctx.registry.remove(conn.role(), conn.id()).is_none() {
        return;
    }
    conn.close();
    match conn.role() {
        Role::Player => player::teardown(ctx, conn),
        Role::Streamer => streamer::teardown(ctx, conn),
        Role::Sfu => {}
    }
    ctx.metrics.connection_closed(conn.role());
    info!(id = %conn.id(), role = %conn.role(), "connection closed");
}

/// Send with drop accounting.
pub(crate) fn send_to(ctx: &Shared, target: &Connection, env: &Envelope) {
    track_send(ctx, target, target.send(env));
}

/// Broadcast flavor: the caller serialized once.
pub(super) fn send_text_to(ctx: &Shared, target: &Connection, text: String, critical: bool) {
    track_send(ctx, target, target.send_text(text, critical));
}

fn track_send(ctx: &Shared, target: &Connection, outcome: SendOutcome) {
    match outcome {
        SendOutcome::Queued => {}
        SendOutcome::QueuedEvicted | SendOutcome::Dropped => {
            ctx.metrics.frame_dropped();
            warn!(target = %target.id(), error = %TransportError::QueueFull, "frame dropped");
        }
        SendOutcome::Closed => {
            debug!(target = %target.id(), "send to closed connection");
        }
    }
}
