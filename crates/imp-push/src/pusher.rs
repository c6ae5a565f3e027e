//! The push dispatcher.
//!
//! Entry points `push_to_user` and `push_to_group` run the two-phase
//! pipeline: pre-hook callback, online gateway fan-out, offline-residue
//! computation, offline callback, payload build, offline-provider push.
//! Group-lifecycle notifications additionally schedule side effects
//! (max-seq fast-forward, group teardown) that run after the push attempt
//! on every exit path.

use crate::callback::PushCallback;
use crate::clients::{ConversationApi, GroupApi, GroupMemberCache, MessageApi};
use crate::config::{PushServiceConfig, Topology};
use crate::discovery::ServiceRegistry;
use crate::error::PushError;
use crate::metrics::PushMetrics;
use crate::offlinepush::OfflinePushProvider;
use crate::onlinepush::OnlinePusher;
use crate::payload;
use imp_protocol::conversation;
use imp_protocol::{
    BACKGROUND_RESULT_CODE, ContentType, GroupDismissedTips, MemberKickedTips, MemberQuitTips,
    MsgData, PlatformId, UserPushResult, decode_notification,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Group-state transition deferred until after the push attempt.
///
/// These are the authoritative transitions; they run on every exit path,
/// in scheduling order, and a failed action never suppresses later ones.
enum DeferredAction {
    SetConversationSeq {
        group_id: String,
        user_ids: Vec<String>,
    },
    DismissGroup {
        op_user_id: String,
        group_id: String,
    },
}

pub struct Pusher {
    config: PushServiceConfig,
    online_pusher: OnlinePusher,
    offline_pusher: Option<Arc<dyn OfflinePushProvider>>,
    callback: Arc<dyn PushCallback>,
    conversation_api: Arc<dyn ConversationApi>,
    message_api: Arc<dyn MessageApi>,
    group_api: Arc<dyn GroupApi>,
    group_member_cache: Arc<dyn GroupMemberCache>,
    metrics: Arc<PushMetrics>,
}

impl Pusher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PushServiceConfig,
        registry: Arc<dyn ServiceRegistry>,
        offline_pusher: Option<Arc<dyn OfflinePushProvider>>,
        callback: Arc<dyn PushCallback>,
        conversation_api: Arc<dyn ConversationApi>,
        message_api: Arc<dyn MessageApi>,
        group_api: Arc<dyn GroupApi>,
        group_member_cache: Arc<dyn GroupMemberCache>,
        metrics: Arc<PushMetrics>,
    ) -> Self {
        let online_pusher = OnlinePusher::new(
            registry,
            config.topology,
            config.gateway_service_name.clone(),
            config.push.max_concurrent_workers,
        );
        Self {
            config,
            online_pusher,
            offline_pusher,
            callback,
            conversation_api,
            message_api,
            group_api,
            group_member_cache,
            metrics,
        }
    }

    // -----------------------------------------------------------------------
    // User-addressed messages
    // -----------------------------------------------------------------------

    /// Deliver a message to an explicit set of users.
    pub async fn push_to_user(&self, user_ids: &[String], msg: &MsgData) -> Result<(), PushError> {
        if user_ids.is_empty() {
            return Ok(());
        }
        debug!(
            users = user_ids.len(),
            client_msg_id = %msg.client_msg_id,
            "dispatching message to users"
        );
        self.callback.on_online_push(msg, user_ids).await?;

        let results = self.online_pusher.push(msg, user_ids).await?;
        self.metrics.record_online_push();

        let is_offline_push = msg.options.is_offline_push();
        debug!(
            results = results.len(),
            is_offline_push,
            client_msg_id = %msg.client_msg_id,
            "online push finished"
        );
        if !is_offline_push || results.is_empty() {
            return Ok(());
        }

        let online_success: HashSet<&str> = results
            .iter()
            .filter(|r| r.online_push && !r.user_id.is_empty())
            .map(|r| r.user_id.as_str())
            .collect();
        let offline_targets: Vec<String> = results
            .iter()
            .filter(|r| {
                !online_success.contains(r.user_id.as_str())
                    && !r.user_id.is_empty()
                    && r.user_id != msg.send_id
            })
            .map(|r| r.user_id.clone())
            .collect();
        if offline_targets.is_empty() {
            return Ok(());
        }

        let overridden = self.callback.on_offline_push(msg, &offline_targets).await?;
        let offline_targets = apply_override(offline_targets, overridden);
        self.offline_push_msg(msg, &offline_targets).await
    }

    // -----------------------------------------------------------------------
    // Group messages
    // -----------------------------------------------------------------------

    /// Deliver a message to a (super) group.
    pub async fn push_to_group(&self, group_id: &str, msg: &MsgData) -> Result<(), PushError> {
        debug!(group_id, client_msg_id = %msg.client_msg_id, "dispatching message to group");
        let mut deferred = Vec::new();
        let result = self.push_to_group_inner(group_id, msg, &mut deferred).await;
        self.run_deferred(deferred).await;
        result
    }

    async fn push_to_group_inner(
        &self,
        group_id: &str,
        msg: &MsgData,
        deferred: &mut Vec<DeferredAction>,
    ) -> Result<(), PushError> {
        let mut push_to_user_ids = self
            .callback
            .on_super_group_online_push(group_id, msg)
            .await?
            .unwrap_or_default();

        if push_to_user_ids.is_empty() {
            push_to_user_ids = self.group_member_cache.group_member_ids(group_id).await?;
            self.augment_lifecycle_recipients(group_id, msg, &mut push_to_user_ids, deferred);
        }

        let results = self.online_pusher.push(msg, &push_to_user_ids).await?;
        self.metrics.record_online_push();
        debug!(
            group_id,
            results = results.len(),
            "group online push finished"
        );

        if !msg.options.is_offline_push() {
            return Ok(());
        }
        match self.config.topology {
            Topology::Sharded => {
                self.offline_push_to_group_sharded(group_id, msg, &results)
                    .await
            }
            Topology::Flat => {
                self.offline_push_to_group_flat(group_id, msg, &push_to_user_ids, &results)
                    .await
            }
        }
    }

    /// Content-type-specific recipient augmentation for group-lifecycle
    /// notifications, plus scheduling of their side effects.
    ///
    /// A payload that fails to decode skips the lifecycle transition but
    /// never the push itself.
    fn augment_lifecycle_recipients(
        &self,
        group_id: &str,
        msg: &MsgData,
        push_to_user_ids: &mut Vec<String>,
        deferred: &mut Vec<DeferredAction>,
    ) {
        match msg.content_type {
            ContentType::MemberQuitNotification => {
                match decode_notification::<MemberQuitTips>(&msg.content) {
                    Ok(tips) => {
                        deferred.push(DeferredAction::SetConversationSeq {
                            group_id: group_id.to_owned(),
                            user_ids: vec![tips.quit_user.user_id.clone()],
                        });
                        push_to_user_ids.push(tips.quit_user.user_id);
                    }
                    Err(e) => {
                        let e = PushError::MalformedContent(e);
                        warn!(group_id, error = %e, "bad member-quit payload, skipping seq fast-forward");
                    }
                }
            }
            ContentType::MemberKickedNotification => {
                match decode_notification::<MemberKickedTips>(&msg.content) {
                    Ok(tips) => {
                        let kicked: Vec<String> = tips
                            .kicked_user_list
                            .into_iter()
                            .map(|member| member.user_id)
                            .collect();
                        deferred.push(DeferredAction::SetConversationSeq {
                            group_id: group_id.to_owned(),
                            user_ids: kicked.clone(),
                        });
                        push_to_user_ids.extend(kicked);
                    }
                    Err(e) => {
                        let e = PushError::MalformedContent(e);
                        warn!(group_id, error = %e, "bad member-kicked payload, skipping seq fast-forward");
                    }
                }
            }
            ContentType::GroupDismissedNotification => {
                // Ordinary messages arrive first; only the notification
                // conversation carries the authoritative dismiss.
                if conversation::is_notification(&conversation::gen_conversation_id_by_msg(msg)) {
                    match decode_notification::<GroupDismissedTips>(&msg.content) {
                        Ok(_tips) => {
                            info!(
                                group_id,
                                members = push_to_user_ids.len(),
                                "group dismissed, scheduling teardown"
                            );
                            deferred.push(DeferredAction::DismissGroup {
                                op_user_id: self.dismiss_op_user_id(),
                                group_id: group_id.to_owned(),
                            });
                        }
                        Err(e) => {
                            let e = PushError::MalformedContent(e);
                            warn!(group_id, error = %e, "bad group-dismissed payload, skipping teardown");
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Sharded topology: the offline residue is simply everyone the
    /// gateways did not reach online.
    async fn offline_push_to_group_sharded(
        &self,
        group_id: &str,
        msg: &MsgData,
        results: &[UserPushResult],
    ) -> Result<(), PushError> {
        let need_offline: Vec<String> = results
            .iter()
            .filter(|r| !r.online_push)
            .map(|r| r.user_id.clone())
            .collect();
        if need_offline.is_empty() {
            return Ok(());
        }

        let overridden = self.callback.on_offline_push(msg, &need_offline).await?;
        let need_offline = apply_override(need_offline, overridden);

        if msg.content_type == ContentType::SignalingNotification {
            return Ok(());
        }
        let conversation_id = conversation::gen_group_conversation_id(group_id);
        let filtered = self
            .conversation_api
            .get_conversation_offline_push_user_ids(&conversation_id, &need_offline)
            .await?;
        if filtered.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.offline_push_msg(msg, &filtered).await {
            error!(group_id, error = %e, "offline push to group failed");
            return Err(e);
        }
        Ok(())
    }

    /// Flat topology: residue is the recipient list minus the
    /// sender-inclusive online-success set, and backgrounded PC/Web
    /// clients get a second online push once the offline push has landed.
    async fn offline_push_to_group_flat(
        &self,
        group_id: &str,
        msg: &MsgData,
        push_to_user_ids: &[String],
        results: &[UserPushResult],
    ) -> Result<(), PushError> {
        let mut online_success_user_ids = vec![msg.send_id.clone()];
        let mut web_and_pc_background_user_ids = Vec::new();
        for result in results {
            if result.online_push && result.user_id != msg.send_id {
                online_success_user_ids.push(result.user_id.clone());
            }
            if result.online_push {
                continue;
            }
            for device in &result.resp {
                if device.result_code != BACKGROUND_RESULT_CODE {
                    continue;
                }
                if device.platform_id.is_pc() || device.platform_id == PlatformId::Web {
                    web_and_pc_background_user_ids.push(result.user_id.clone());
                }
            }
        }

        // Order-preserving set difference against the recipient list.
        let success_set: HashSet<&str> = online_success_user_ids
            .iter()
            .map(String::as_str)
            .collect();
        let need_offline: Vec<String> = push_to_user_ids
            .iter()
            .filter(|id| !success_set.contains(id.as_str()))
            .cloned()
            .collect();
        if need_offline.is_empty() {
            return Ok(());
        }

        let overridden = self.callback.on_offline_push(msg, &need_offline).await?;
        let need_offline = apply_override(need_offline, overridden);

        if msg.content_type == ContentType::SignalingNotification {
            return Ok(());
        }
        let conversation_id = conversation::gen_group_conversation_id(group_id);
        let filtered = self
            .conversation_api
            .get_conversation_offline_push_user_ids(&conversation_id, &need_offline)
            .await?;
        if filtered.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.offline_push_msg(msg, &filtered).await {
            error!(group_id, error = %e, "offline push to group failed");
            return Err(e);
        }

        // Wake backgrounded PC/Web clients the offline push just nudged.
        let background_set: HashSet<&str> = web_and_pc_background_user_ids
            .iter()
            .map(String::as_str)
            .collect();
        let wake_user_ids: Vec<String> = filtered
            .iter()
            .filter(|id| background_set.contains(id.as_str()))
            .cloned()
            .collect();
        if let Err(e) = self.online_pusher.push(msg, &wake_user_ids).await {
            error!(group_id, error = %e, users = wake_user_ids.len(), "background wake push failed");
            return Err(e);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Offline delivery
    // -----------------------------------------------------------------------

    async fn offline_push_msg(&self, msg: &MsgData, user_ids: &[String]) -> Result<(), PushError> {
        let pusher = self
            .offline_pusher
            .as_ref()
            .ok_or(PushError::NoOfflinePusher)?;
        let (title, content, opts) = payload::offline_push_infos(msg, user_ids);
        self.metrics.record_offline_push();
        if let Err(e) = pusher.push(user_ids, &title, &content, &opts).await {
            self.metrics.record_offline_push_failure();
            return Err(e);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Side effects
    // -----------------------------------------------------------------------

    /// Fast-forward departing users past all historical group messages so
    /// they cannot re-read them.
    pub async fn delete_member_and_set_conversation_seq(
        &self,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<(), PushError> {
        let conversation_id = conversation::gen_group_conversation_id(group_id);
        let max_seq = self
            .message_api
            .get_conversation_max_seq(&conversation_id)
            .await?;
        self.conversation_api
            .set_conversation_max_seq(user_ids, &conversation_id, max_seq)
            .await
    }

    async fn run_deferred(&self, actions: Vec<DeferredAction>) {
        for action in actions {
            match action {
                DeferredAction::SetConversationSeq { group_id, user_ids } => {
                    if let Err(e) = self
                        .delete_member_and_set_conversation_seq(&group_id, &user_ids)
                        .await
                    {
                        error!(
                            group_id = %group_id,
                            users = user_ids.len(),
                            error = %e,
                            "conversation max-seq fast-forward failed"
                        );
                    }
                }
                DeferredAction::DismissGroup {
                    op_user_id,
                    group_id,
                } => {
                    if let Err(e) = self.group_api.dismiss_group(&op_user_id, &group_id).await {
                        error!(group_id = %group_id, error = %e, "group dismiss failed");
                    }
                }
            }
        }
    }

    /// Operator identity the dismiss teardown runs under: first manager if
    /// any, else first IM admin.
    fn dismiss_op_user_id(&self) -> String {
        self.config
            .manager_user_ids
            .first()
            .or_else(|| self.config.admin_user_ids.first())
            .cloned()
            .unwrap_or_default()
    }
}

/// Hooks replace the target list only by returning a non-empty override.
fn apply_override(targets: Vec<String>, overridden: Option<Vec<String>>) -> Vec<String> {
    match overridden {
        Some(list) if !list.is_empty() => list,
        _ => targets,
    }
}
