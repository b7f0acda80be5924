//! Player state machine
//!
//! CONNECTED → IDENTIFIED → SUBSCRIBED → (CLOSING). A player forwards its
//! WebRTC control messages to exactly one subscribed streamer; without a
//! subscription it gets a user-visible error and nothing else happens.

use std::sync::Arc;

use tracing::{debug, info};

use pixelsig_core::{msg, Envelope, Role};

use crate::broker::Shared;
use crate::connection::Connection;
use crate::error::BrokerError;
use crate::subscription::BindOutcome;

use super::send_to;

pub(super) fn handle(ctx: &Shared, conn: &Arc<Connection>, mut env: Envelope) {
    // The forward path stamps the routing id, so the tag is detached from
    // the envelope before the match borrows it mutably.
    let msg_type = env.msg_type().to_string();
    match msg_type.as_str() {
        msg::IDENTIFY => identify(ctx, conn, &env),
        msg::LIST_STREAMERS => list_streamers(ctx, conn),
        msg::SUBSCRIBE => subscribe(ctx, conn, &env),
        msg::UNSUBSCRIBE => unbind(ctx, conn),
        msg::OFFER
        | msg::ANSWER
        | msg::ICE_CANDIDATE
        | msg::ICE_CANDIDATE_ERROR
        | msg::DATA_CHANNEL_REQUEST => {
            if let Err(e) = forward_to_streamer(ctx, conn, &mut env) {
                debug!(player = %conn.id(), msg_type = %msg_type, "forward refused: {e}");
                send_to(ctx, conn, &Envelope::error(e.to_string()));
            }
        }
        msg::PING => send_to(ctx, conn, &Envelope::pong()),
        msg::DISCONNECT => {
            info!(player = %conn.id(), "player requested disconnect");
            conn.close();
        }
        other => debug!(player = %conn.id(), msg_type = other, "unhandled message type"),
    }
}

pub(super) fn teardown(ctx: &Shared, conn: &Arc<Connection>) {
    unbind(ctx, conn);
}

fn identify(ctx: &Shared, conn: &Arc<Connection>, env: &Envelope) {
    if let Some(player_id) = env.field_str("playerId") {
        conn.set_peer_id(player_id);
        info!(player = %conn.id(), player_id, "player identified");
    }
    send_to(ctx, conn, &Envelope::config(None));
    try_auto_bind(ctx, conn);
}

/// Bind to the streamer picked by the registry's selection policy. No
/// streamer connected at all is not an error; every streamer being full is.
fn try_auto_bind(ctx: &Shared, conn: &Arc<Connection>) {
    let Some(streamer) = ctx.registry.find_available_streamer(&ctx.graph) else {
        if ctx.registry.streamer_candidates().is_empty() {
            debug!(player = %conn.id(), "no streamer connected yet");
        } else {
            send_to(
                ctx,
                conn,
                &Envelope::error(BrokerError::CapacityExceeded.to_string()),
            );
        }
        return;
    };
    match ctx.graph.bind(conn.id(), streamer.id()) {
        BindOutcome::Bound { count } => on_bound(ctx, conn, &streamer, count),
        // Lost the race between the lookup and the bind.
        BindOutcome::AtCapacity | BindOutcome::StreamerInactive => send_to(
            ctx,
            conn,
            &Envelope::error(BrokerError::CapacityExceeded.to_string()),
        ),
    }
}

fn on_bound(ctx: &Shared, conn: &Arc<Connection>, streamer: &Connection, count: usize) {
    info!(player = %conn.id(), streamer = %streamer.id(), count, "player subscribed");
    // The streamer addresses this player by its internal id from here on.
    send_to(
        ctx,
        streamer,
        &Envelope::player_connected(&conn.id().to_string(), true, false, true),
    );
    send_to(ctx, streamer, &Envelope::player_count(count));
}

/// Explicit subscription to a named streamer.
fn subscribe(ctx: &Shared, conn: &Arc<Connection>, env: &Envelope) {
    let Some(wanted) = env.field_str("streamerId") else {
        send_to(ctx, conn, &Envelope::error("subscribe requires a streamerId"));
        return;
    };
    let target = ctx
        .registry
        .streamer_candidates()
        .into_iter()
        .find(|s| s.peer_id().as_deref() == Some(wanted));
    let Some(streamer) = target else {
        send_to(ctx, conn, &Envelope::error("no such streamer"));
        return;
    };

    // Leave the current streamer (with its notifications) before moving.
    unbind(ctx, conn);
    match ctx.graph.bind(conn.id(), streamer.id()) {
        BindOutcome::Bound { count } => on_bound(ctx, conn, &streamer, count),
        BindOutcome::AtCapacity => send_to(
            ctx,
            conn,
            &Envelope::error(BrokerError::CapacityExceeded.to_string()),
        ),
        BindOutcome::StreamerInactive => send_to(ctx, conn, &Envelope::error("no such streamer")),
    }
}

/// Drop the player's edge, telling the streamer it lost a subscriber.
/// Idempotent.
fn unbind(ctx: &Shared, conn: &Arc<Connection>) {
    if let Some((streamer_id, count)) = ctx.graph.unbind(conn.id()) {
        info!(player = %conn.id(), streamer = %streamer_id, "player unsubscribed");
        if let Some(streamer) = ctx.registry.get(Role::Streamer, streamer_id) {
            send_to(
                ctx,
                &streamer,
                &Envelope::player_disconnected(&conn.id().to_string()),
            );
            send_to(ctx, &streamer, &Envelope::player_count(count));
        }
    }
}

fn list_streamers(ctx: &Shared, conn: &Arc<Connection>) {
    let mut ids: Vec<String> = ctx
        .registry
        .enumerate(Role::Streamer)
        .iter()
        .filter_map(|s| s.peer_id())
        .collect();
    ids.sort();
    send_to(ctx, conn, &Envelope::streamer_list(ids));
}

fn forward_to_streamer(
    ctx: &Shared,
    conn: &Arc<Connection>,
    env: &mut Envelope,
) -> Result<(), BrokerError> {
    let streamer = ctx
        .graph
        .subscribed_streamer(conn.id())
        .and_then(|sid| ctx.registry.get(Role::Streamer, sid))
        .filter(|s| s.is_connected())
        .ok_or(BrokerError::NoActiveStreamer)?;

    // Stamp the routing id only when the sender left it out.
    env.ensure_id(&conn.id().to_string());
    send_to(ctx, &streamer, env);
    ctx.metrics.frame_forwarded();
    debug!(
        player = %conn.id(),
        streamer = %streamer.id(),
        msg_type = env.msg_type(),
        "forwarded to streamer"
    );
    Ok(())
}
