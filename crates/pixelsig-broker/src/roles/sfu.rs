//! SFU state machine
//!
//! Streamer-shaped vocabulary plus the SFU data-channel readiness and layer
//! messages. Those are accepted and logged but not yet routed anywhere; the
//! state machine keeps them legal on the wire so routing can be added
//! without a protocol change.

use std::sync::Arc;

use tracing::{debug, info};

use pixelsig_core::{msg, Envelope};

use crate::broker::Shared;
use crate::connection::Connection;

use super::send_to;

pub(super) fn handle(ctx: &Shared, conn: &Arc<Connection>, env: Envelope) {
    match env.msg_type() {
        msg::IDENTIFY => identify(ctx, conn, &env),
        msg::SFU_RECV_DATA_CHANNEL_READY
        | msg::SFU_PEER_DATA_CHANNELS_READY
        | msg::LAYER_PREFERENCE => {
            debug!(sfu = %conn.id(), msg_type = env.msg_type(), "sfu control message accepted");
        }
        msg::PING => send_to(ctx, conn, &Envelope::pong()),
        msg::DISCONNECT => {
            info!(sfu = %conn.id(), "sfu requested disconnect");
            conn.close();
        }
        other => debug!(sfu = %conn.id(), msg_type = other, "unhandled message type"),
    }
}

fn identify(ctx: &Shared, conn: &Arc<Connection>, env: &Envelope) {
    let assigned = match env.field_str("sfuId") {
        Some(id) => id.to_string(),
        None => format!("sfu_{}", conn.id().short()),
    };
    conn.set_peer_id(assigned.clone());
    info!(sfu = %conn.id(), sfu_id = %assigned, "sfu identified");
    send_to(ctx, conn, &Envelope::config(None));
}
