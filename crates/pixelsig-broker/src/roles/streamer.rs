//! Streamer state machine
//!
//! CONNECTED → IDENTIFIED → (CLOSING). A streamer addresses individual
//! subscribers through the routing `id` and broadcasts data-channel layouts
//! to all of them. Its disconnect sweeps every subscription edge.

use std::sync::Arc;

use tracing::{debug, info};

use pixelsig_core::{msg, Envelope, Role};

use crate::broker::Shared;
use crate::connection::{Connection, ConnectionId};
use crate::error::BrokerError;

use super::{send_text_to, send_to};

pub(super) fn handle(ctx: &Shared, conn: &Arc<Connection>, env: Envelope) {
    match env.msg_type() {
        msg::IDENTIFY => identify(ctx, conn, &env),
        msg::OFFER | msg::ANSWER | msg::ICE_CANDIDATE | msg::ICE_CANDIDATE_ERROR => {
            if let Err(e) = forward_to_player(ctx, conn, &env) {
                debug!(streamer = %conn.id(), msg_type = env.msg_type(), "forward dropped: {e}");
            }
        }
        msg::STREAMER_DATA_CHANNELS => broadcast(ctx, conn, &env),
        msg::PING => send_to(ctx, conn, &Envelope::pong()),
        msg::DISCONNECT => {
            info!(streamer = %conn.id(), "streamer requested disconnect");
            conn.close();
        }
        other => debug!(streamer = %conn.id(), msg_type = other, "unhandled message type"),
    }
}

pub(super) fn teardown(ctx: &Shared, conn: &Arc<Connection>) {
    let swept = ctx.graph.sweep_streamer(conn.id());
    if swept.is_empty() {
        return;
    }
    info!(streamer = %conn.id(), players = swept.len(), "sweeping subscribers");
    let notice = Envelope::streamer_disconnected();
    for player_id in swept {
        if let Some(player) = ctx.registry.get(Role::Player, player_id) {
            send_to(ctx, &player, &notice);
        }
    }
}

fn identify(ctx: &Shared, conn: &Arc<Connection>, env: &Envelope) {
    let assigned = match env.field_str("streamerId") {
        Some(id) => id.to_string(),
        None => format!("streamer_{}", conn.id().short()),
    };

    let prior = conn.peer_id();
    if prior.as_deref() != Some(assigned.as_str()) {
        conn.set_peer_id(assigned.clone());
        if prior.is_some() {
            // Re-identification: every subscriber needs the new name.
            info!(streamer = %conn.id(), old = ?prior, new = %assigned, "streamer id changed");
            let notice = Envelope::streamer_id_changed(&assigned);
            for player_id in ctx.graph.subscribers(conn.id()) {
                if let Some(player) = ctx.registry.get(Role::Player, player_id) {
                    send_to(ctx, &player, &notice);
                }
            }
        } else {
            info!(streamer = %conn.id(), streamer_id = %assigned, "streamer identified");
        }
    }

    send_to(ctx, conn, &Envelope::config(None));
}

/// Forward to the player named by the routing id. The target must be a live
/// subscriber of this streamer; anything else is dropped with a debug log.
fn forward_to_player(ctx: &Shared, conn: &Arc<Connection>, env: &Envelope) -> Result<(), BrokerError> {
    let id_str = env
        .id()
        .ok_or_else(|| BrokerError::TargetUnknown("missing id".to_string()))?;
    let player_id = ConnectionId::parse(id_str)
        .ok_or_else(|| BrokerError::TargetUnknown(id_str.to_string()))?;

    if !ctx.graph.is_subscriber(conn.id(), player_id) {
        return Err(BrokerError::TargetUnknown(id_str.to_string()));
    }
    let player = ctx
        .registry
        .get(Role::Player, player_id)
        .filter(|p| p.is_connected())
        .ok_or_else(|| BrokerError::TargetUnknown(id_str.to_string()))?;

    send_to(ctx, &player, env);
    ctx.metrics.frame_forwarded();
    debug!(
        streamer = %conn.id(),
        player = %player.id(),
        msg_type = env.msg_type(),
        "forwarded to player"
    );
    Ok(())
}

/// Broadcast to every subscriber, pruning dead ones during the walk.
/// Not atomic: each subscriber sees the frame interleaved with its own
/// per-player traffic in per-target FIFO order.
fn broadcast(ctx: &Shared, conn: &Arc<Connection>, env: &Envelope) {
    let subscribers = ctx.graph.subscribers(conn.id());
    if subscribers.is_empty() {
        debug!(streamer = %conn.id(), "broadcast with no subscribers");
        return;
    }

    let text = env.serialize();
    let critical = env.is_critical();
    let mut pruned = false;
    for player_id in subscribers {
        match ctx
            .registry
            .get(Role::Player, player_id)
            .filter(|p| p.is_connected())
        {
            Some(player) => send_text_to(ctx, &player, text.clone(), critical),
            None => {
                debug!(streamer = %conn.id(), player = %player_id, "pruning dead subscriber");
                ctx.graph.unbind(player_id);
                pruned = true;
            }
        }
    }

    if pruned {
        let count = ctx.graph.subscriber_count(conn.id());
        send_to(ctx, conn, &Envelope::player_count(count));
    }
}
