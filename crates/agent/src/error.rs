//! Structured errors for the stowage agent.
//!
//! By policy none of these crash the agent: every handler contains its
//! failures within its own task, and the router logs whatever escapes.

use crate::router::TriggerKind;

/// Structured errors for the stowage agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// One or more shell resources were unreachable during install.
    /// Non-fatal; activation proceeds in degraded-cache mode.
    #[error("SEED_PARTIAL: {failed} of {total} shell resources failed to seed")]
    SeedPartial { failed: usize, total: usize },

    /// The store rejected or failed a write. The triggering response is
    /// still returned to its caller.
    #[error("CACHE_WRITE: {0}")]
    CacheWrite(String),

    /// A fetch attempt produced no response.
    #[error("NETWORK_FAILURE: {0}")]
    Network(String),

    /// Update endpoint unreachable or malformed; scheduled sync exits quietly.
    #[error("UPDATE_CHECK_FAILED: {0}")]
    UpdateCheck(String),

    /// Deferred sync could not reach the remote endpoint; the host
    /// re-raises the trigger on the next connectivity restoration.
    #[error("SYNC_TRANSMIT_FAILED: {0}")]
    SyncTransmit(String),

    /// Notification delivery failed.
    #[error("NOTIFY_FAILED: {0}")]
    Notify(String),

    /// A second handler was registered for the same trigger kind.
    #[error("DUPLICATE_HANDLER: {0}")]
    DuplicateHandler(TriggerKind),

    /// Agent construction was given unusable configuration.
    #[error("CONFIG: {0}")]
    Config(String),

    /// Cache store failure outside a write path.
    #[error(transparent)]
    Cache(#[from] stowage_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_partial_display() {
        let err = AgentError::SeedPartial { failed: 2, total: 5 };
        assert!(err.to_string().contains("SEED_PARTIAL"));
        assert!(err.to_string().contains("2 of 5"));
    }

    #[test]
    fn test_duplicate_handler_display() {
        let err = AgentError::DuplicateHandler(TriggerKind::Fetch);
        assert!(err.to_string().contains("DUPLICATE_HANDLER"));
        assert!(err.to_string().contains("fetch"));
    }
}
