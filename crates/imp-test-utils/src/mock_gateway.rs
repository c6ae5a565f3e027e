// mock_gateway: Scripted message gateways and a scripted registry.
//
// A `MockGateway` owns a fixed set of users: a batch-push request returns
// the scripted result for every requested user the gateway owns and
// nothing for the rest, which is exactly how real gateways answer in flat
// mode.  Failure injection and an optional concurrency gauge cover the
// partial-failure and worker-cap tests.

use async_trait::async_trait;
use imp_protocol::{OnlineBatchPushRequest, UserPushResult};
use imp_push::discovery::{MsgGateway, ServiceRegistry};
use imp_push::error::PushError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Concurrency gauge
// ---------------------------------------------------------------------------

/// Tracks how many gateway RPCs are in flight at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    /// Highest number of simultaneous in-flight RPCs observed.
    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

struct GaugeGuard<'a> {
    gauge: &'a ConcurrencyGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

pub struct MockGateway {
    name: String,
    owned: HashMap<String, UserPushResult>,
    fail: bool,
    delay: Option<Duration>,
    gauge: Option<Arc<ConcurrencyGauge>>,
    calls: Mutex<Vec<OnlineBatchPushRequest>>,
}

impl MockGateway {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            owned: HashMap::new(),
            fail: false,
            delay: None,
            gauge: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the result this gateway returns for one of its users.
    pub fn with_result(mut self, result: UserPushResult) -> Self {
        self.owned.insert(result.user_id.clone(), result);
        self
    }

    /// Every RPC against this gateway fails.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Hold each RPC open for `delay` (for concurrency-cap tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    /// All requests this gateway received, in arrival order.
    pub fn calls(&self) -> Vec<OnlineBatchPushRequest> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl MsgGateway for MockGateway {
    async fn online_batch_push(
        &self,
        req: OnlineBatchPushRequest,
    ) -> Result<Vec<UserPushResult>, PushError> {
        let _guard = self.gauge.as_ref().map(|gauge| gauge.enter());
        self.calls.lock().expect("calls lock").push(req.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PushError::Rpc(format!(
                "{}: injected gateway failure",
                self.name
            )));
        }
        Ok(req
            .push_to_user_ids
            .iter()
            .filter_map(|user_id| self.owned.get(user_id).cloned())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockRegistry
// ---------------------------------------------------------------------------

/// Scripted service registry covering both topologies.
#[derive(Default)]
pub struct MockRegistry {
    conns: Vec<Arc<MockGateway>>,
    user_hosts: HashMap<String, String>,
    by_host: HashMap<String, Arc<MockGateway>>,
    fail_discovery: bool,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway for flat-mode enumeration.
    pub fn with_gateway(mut self, gateway: Arc<MockGateway>) -> Self {
        self.conns.push(gateway);
        self
    }

    /// Pin `users` to `gateway` under `host` for sharded-mode routing.
    pub fn with_shard(mut self, host: &str, gateway: Arc<MockGateway>, users: &[&str]) -> Self {
        for user in users {
            self.user_hosts.insert((*user).to_owned(), host.to_owned());
        }
        self.by_host.insert(host.to_owned(), gateway);
        self
    }

    /// Every discovery lookup fails.
    pub fn failing_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }
}

#[async_trait]
impl ServiceRegistry for MockRegistry {
    async fn get_conns(&self, service_name: &str) -> Result<Vec<Arc<dyn MsgGateway>>, PushError> {
        if self.fail_discovery {
            return Err(PushError::Discovery(format!(
                "injected discovery failure for {service_name}"
            )));
        }
        Ok(self
            .conns
            .iter()
            .map(|gw| Arc::clone(gw) as Arc<dyn MsgGateway>)
            .collect())
    }

    async fn get_user_hash_gateway_host(&self, user_id: &str) -> Result<String, PushError> {
        if self.fail_discovery {
            return Err(PushError::Discovery("injected discovery failure".to_owned()));
        }
        self.user_hosts
            .get(user_id)
            .cloned()
            .ok_or_else(|| PushError::Discovery(format!("no shard for user {user_id}")))
    }

    async fn get_conn(&self, host: &str) -> Result<Arc<dyn MsgGateway>, PushError> {
        self.by_host
            .get(host)
            .map(|gw| Arc::clone(gw) as Arc<dyn MsgGateway>)
            .ok_or_else(|| PushError::Discovery(format!("no gateway at {host}")))
    }
}
