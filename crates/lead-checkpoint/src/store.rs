use async_trait::async_trait;
use lead_core::types::{ConversationState, ThreadId};

use crate::error::Result;

/// Durable per-thread snapshot of conversation state, per spec §4.2.
///
/// Guarantee: after `save` returns, a subsequent `load` on the same
/// `thread_id` returns the saved state or a strictly later one. Concurrent
/// turns on the same `thread_id` are serialized by the graph runtime, so
/// implementations need not arbitrate writers themselves.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>>;

    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<()>;
}
