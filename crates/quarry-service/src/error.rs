use quarry_world::ChunkCoord;

use crate::protocol::{DataKey, RequestKind};

/// Per-request failure inside the service; each maps onto one failure reply.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("chunk {0} is already generated")]
    DuplicateInit(ChunkCoord),
    #[error("request failed: {0}")]
    Failed(String),
}

impl ServiceError {
    #[inline]
    pub fn reply_kind(&self) -> RequestKind {
        match self {
            ServiceError::Invalid(_) => RequestKind::Invalid,
            ServiceError::DuplicateInit(_) => RequestKind::DuplicateInit,
            ServiceError::Failed(_) => RequestKind::Failed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("chunk data service connection closed")]
    Disconnected,
    #[error("{request:?} rejected with {kind:?}: {}", .context.as_deref().unwrap_or("no context"))]
    Rejected {
        request: RequestKind,
        kind: RequestKind,
        context: Option<String>,
    },
    #[error("sent {request:?} but the service answered {reply:?}")]
    Mismatched {
        request: RequestKind,
        reply: RequestKind,
    },
    #[error("reply to {request:?} is missing {expected:?}")]
    Malformed {
        request: RequestKind,
        expected: DataKey,
    },
}

impl ClientError {
    /// The two ends disagree about the wire format. Never expected from a
    /// correct build, so callers treat it as fatal rather than retrying.
    #[inline]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ClientError::Mismatched { .. } | ClientError::Malformed { .. }
        )
    }

    #[inline]
    pub fn is_duplicate_init(&self) -> bool {
        matches!(
            self,
            ClientError::Rejected {
                kind: RequestKind::DuplicateInit,
                ..
            }
        )
    }
}
