//! Deterministic conversation-ID derivation.
//!
//! Conversation IDs are prefix-tagged by session kind:
//! - `si_` single chat (both participant IDs, sorted)
//! - `g_` group chat
//! - `sg_` super-group chat
//! - `n_` notification conversation

use crate::{MsgData, SessionType};

/// Conversation ID for a `(session_type, target)` pair where the target is
/// a group or peer identifier.
pub fn gen_conversation_id_by_session(session_type: SessionType, target_id: &str) -> String {
    match session_type {
        SessionType::GroupChat => format!("g_{target_id}"),
        SessionType::SuperGroupChat => format!("sg_{target_id}"),
        SessionType::Notification => format!("n_{target_id}"),
        _ => format!("si_{target_id}"),
    }
}

/// Conversation ID of a super group.
pub fn gen_group_conversation_id(group_id: &str) -> String {
    gen_conversation_id_by_session(SessionType::SuperGroupChat, group_id)
}

/// Conversation ID derived from a message's addressing fields.
pub fn gen_conversation_id_by_msg(msg: &MsgData) -> String {
    match msg.session_type {
        SessionType::SingleChat => {
            let (low, high) = if msg.send_id <= msg.recv_id {
                (&msg.send_id, &msg.recv_id)
            } else {
                (&msg.recv_id, &msg.send_id)
            };
            format!("si_{low}_{high}")
        }
        SessionType::GroupChat => format!("g_{}", msg.group_id),
        SessionType::SuperGroupChat => format!("sg_{}", msg.group_id),
        SessionType::Notification => format!("n_{}_{}", msg.send_id, msg.recv_id),
        SessionType::Other(_) => format!("si_{}_{}", msg.send_id, msg.recv_id),
    }
}

/// Whether a conversation ID names a notification conversation.
pub fn is_notification(conversation_id: &str) -> bool {
    conversation_id.starts_with("n_")
}
