//! Gateway fan-out engine.
//!
//! Dispatches one message to every relevant gateway endpoint and merges
//! the per-recipient results.  An RPC failure against one endpoint is
//! logged and swallowed; that endpoint's users are simply absent from the
//! merged results.  An error surfaces only when discovery itself fails
//! before any RPC was issued.
//!
//! Dropping the returned future cancels outstanding workers; the merged
//! result set then reflects whichever workers had already appended.

use crate::config::Topology;
use crate::discovery::{MsgGateway, ServiceRegistry};
use crate::error::PushError;
use imp_protocol::{MsgData, OnlineBatchPushRequest, UserPushResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// The worker cap is a floor, not just a limit: configured values below
/// this are silently raised.
const MIN_WORKERS: usize = 3;

pub struct OnlinePusher {
    registry: Arc<dyn ServiceRegistry>,
    topology: Topology,
    gateway_service_name: String,
    max_concurrent_workers: usize,
}

impl OnlinePusher {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        topology: Topology,
        gateway_service_name: String,
        max_concurrent_workers: usize,
    ) -> Self {
        Self {
            registry,
            topology,
            gateway_service_name,
            max_concurrent_workers,
        }
    }

    fn worker_cap(&self) -> usize {
        self.max_concurrent_workers.max(MIN_WORKERS)
    }

    /// Fan the message out and merge per-recipient results.
    pub async fn push(
        &self,
        msg: &MsgData,
        user_ids: &[String],
    ) -> Result<Vec<UserPushResult>, PushError> {
        match self.topology {
            Topology::Flat => self.push_flat(msg, user_ids).await,
            Topology::Sharded => self.push_sharded(msg, user_ids).await,
        }
    }

    /// Flat mode: the same request (full user list) goes to every gateway;
    /// each answers only for the users it owns connections for.
    async fn push_flat(
        &self,
        msg: &MsgData,
        user_ids: &[String],
    ) -> Result<Vec<UserPushResult>, PushError> {
        let conns = self.registry.get_conns(&self.gateway_service_name).await?;
        debug!(conns = conns.len(), "resolved gateway endpoints");
        let req = OnlineBatchPushRequest {
            msg: msg.clone(),
            push_to_user_ids: user_ids.to_vec(),
        };
        let batches = conns
            .into_iter()
            .map(|conn| (conn, req.clone()))
            .collect();
        Ok(self.dispatch(batches).await)
    }

    /// Sharded mode: each user maps to exactly one gateway by hash; one
    /// request per gateway carrying only its subset.
    async fn push_sharded(
        &self,
        msg: &MsgData,
        user_ids: &[String],
    ) -> Result<Vec<UserPushResult>, PushError> {
        let mut users_by_host: HashMap<String, Vec<String>> = HashMap::new();
        for user_id in user_ids {
            let host = self
                .registry
                .get_user_hash_gateway_host(user_id)
                .await
                .map_err(|e| {
                    error!(user_id = %user_id, error = %e, "gateway hash lookup failed");
                    e
                })?;
            users_by_host.entry(host).or_default().push(user_id.clone());
        }
        debug!(shards = users_by_host.len(), "grouped users by gateway host");

        let mut batches = Vec::with_capacity(users_by_host.len());
        for (host, shard_user_ids) in users_by_host {
            let conn = self.registry.get_conn(&host).await?;
            batches.push((
                conn,
                OnlineBatchPushRequest {
                    msg: msg.clone(),
                    push_to_user_ids: shard_user_ids,
                },
            ));
        }
        Ok(self.dispatch(batches).await)
    }

    /// Run all batch RPCs under the worker cap and merge the non-empty
    /// result slices.  Per-endpoint failures are swallowed.
    async fn dispatch(
        &self,
        batches: Vec<(Arc<dyn MsgGateway>, OnlineBatchPushRequest)>,
    ) -> Vec<UserPushResult> {
        let results = Arc::new(Mutex::new(Vec::new()));
        let semaphore = Arc::new(Semaphore::new(self.worker_cap()));
        let mut workers = JoinSet::new();

        for (gateway, req) in batches {
            let results = Arc::clone(&results);
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                match gateway.online_batch_push(req).await {
                    Ok(slice) => {
                        if !slice.is_empty() {
                            results.lock().await.extend(slice);
                        }
                    }
                    Err(e) => {
                        // That endpoint's users are simply absent from the
                        // merged results.
                        error!(error = %e, "gateway batch push failed");
                    }
                }
            });
        }
        while workers.join_next().await.is_some() {}

        let mut guard = results.lock().await;
        std::mem::take(&mut *guard)
    }
}
