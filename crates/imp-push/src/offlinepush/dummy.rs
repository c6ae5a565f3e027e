//! No-op offline pusher.
//!
//! Selected when no provider is configured; accepts every push and drops
//! it on the floor.

use super::Opts;
use crate::error::PushError;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DummyClient;

impl DummyClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn push(
        &self,
        user_ids: &[String],
        title: &str,
        _content: &str,
        _opts: &Opts,
    ) -> Result<(), PushError> {
        debug!(users = user_ids.len(), title, "dummy offline pusher dropped push");
        Ok(())
    }
}
