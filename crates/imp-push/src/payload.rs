//! Offline-payload derivation.
//!
//! Builds the `(title, content, opts)` triple handed to the offline-push
//! adapter.  Sender-supplied `OfflinePushInfo` wins; otherwise the title
//! falls back to a per-content-type label, and an empty body falls back to
//! the title.  The AtText mention check runs against the actual offline
//! target user IDs.

use crate::offlinepush::{Opts, Signal};
use imp_protocol::{AtTextElem, ContentType, MsgData};

// Human-readable fallback labels per content type.
const TEXT_LABEL: &str = "Text";
const PICTURE_LABEL: &str = "Picture";
const VOICE_LABEL: &str = "Voice";
const VIDEO_LABEL: &str = "Video";
const FILE_LABEL: &str = "File";
const AT_TEXT_LABEL: &str = "[You were mentioned]";
const GROUP_MSG_LABEL: &str = "[Group message]";
const SIGNAL_MSG_LABEL: &str = "[Signal message]";
const COMMON_LABEL: &str = "Common";

/// Push options from the message's offline-push info.
pub fn offline_push_opts(msg: &MsgData) -> Opts {
    let mut opts = Opts {
        signal: Signal::default(),
        ..Default::default()
    };
    if let Some(info) = &msg.offline_push_info {
        opts.ios_badge_count = info.ios_badge_count;
        opts.ios_push_sound = info.ios_push_sound.clone();
        opts.ex = info.ex.clone();
    }
    opts
}

/// Full offline payload: `(title, content, opts)`.
///
/// `offline_push_user_ids` is the resolved offline target set; it feeds
/// the AtText mention check.  Deterministic for a given input.
pub fn offline_push_infos(
    msg: &MsgData,
    offline_push_user_ids: &[String],
) -> (String, String, Opts) {
    let opts = offline_push_opts(msg);

    let (mut title, mut content) = match &msg.offline_push_info {
        Some(info) => (info.title.clone(), info.desc.clone()),
        None => (String::new(), String::new()),
    };

    if title.is_empty() {
        title = match msg.content_type {
            ContentType::Text => TEXT_LABEL.to_owned(),
            ContentType::Picture => PICTURE_LABEL.to_owned(),
            ContentType::Voice => VOICE_LABEL.to_owned(),
            ContentType::Video => VIDEO_LABEL.to_owned(),
            ContentType::File => FILE_LABEL.to_owned(),
            ContentType::AtText => {
                // Best-effort parse; a malformed body reads as "nobody
                // mentioned".
                let at_elem: AtTextElem =
                    serde_json::from_slice(&msg.content).unwrap_or_default();
                let mentioned = offline_push_user_ids
                    .iter()
                    .any(|id| at_elem.at_user_list.contains(id));
                if mentioned {
                    format!("{AT_TEXT_LABEL}{COMMON_LABEL}")
                } else {
                    GROUP_MSG_LABEL.to_owned()
                }
            }
            ContentType::SignalingNotification => SIGNAL_MSG_LABEL.to_owned(),
            _ => COMMON_LABEL.to_owned(),
        };
    }
    if content.is_empty() {
        content = title.clone();
    }
    (title, content, opts)
}
