//! Svcnet error types.

use crate::{status, MsgTypeId, RequestId};
use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The svcnet error type.
///
/// This is what error callbacks of requests receive. Invocation and
/// timeout errors are synthesized locally and travel inside local error
/// envelopes only. A peer's non-zero status is always a
/// [SvcError::Remote].
///
/// This type is required to implement `Clone`: a request records its error
/// for later inspection and hands a copy to its error callback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SvcError {
    /// The request could not be handed to the transport: the endpoint
    /// could not be resolved, the route was rejected, the send failed
    /// locally, or there were no candidate endpoints.
    #[error("invocation failed: {ctx}")]
    Invocation {
        /// Why the invocation failed.
        ctx: Arc<str>,
    },

    /// No response arrived before the request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The remote peer responded with a non-zero status.
    #[error("remote error (status: {status})")]
    Remote {
        /// The status code the peer responded with.
        status: i32,

        /// The payload of the error response.
        payload: bytes::Bytes,
    },

    /// An inbound message carried a type with no registered handler.
    #[error("unknown message type: {0}")]
    UnknownMessageType(MsgTypeId),

    /// A request id was registered twice.
    #[error("duplicate request id: {0}")]
    DuplicateId(RequestId),

    /// Generic svcnet internal error.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

impl SvcError {
    /// Construct an invocation error.
    pub fn invocation<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Invocation {
            ctx: ctx.to_string().into_boxed_str().into(),
        }
    }

    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }

    /// The error carried by a response envelope received from a peer.
    /// Every non-zero status is passed through unmodified as a
    /// [SvcError::Remote], including the codes this crate synthesizes
    /// locally: a peer reporting 1002 timed out on its own downstream call.
    pub fn from_status(code: i32, payload: bytes::Bytes) -> Self {
        Self::Remote {
            status: code,
            payload,
        }
    }

    /// The error carried by a locally synthesized error envelope. The
    /// codes this crate synthesizes map back to their variants, anything
    /// else is treated as if a peer had sent it.
    pub fn from_local_status(code: i32, payload: bytes::Bytes) -> Self {
        match code {
            status::INVOCATION => {
                Self::invocation(String::from_utf8_lossy(&payload))
            }
            status::TIMEOUT => Self::Timeout,
            code => Self::from_status(code, payload),
        }
    }

    /// The status code this error is transmitted with.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Invocation { .. } => status::INVOCATION,
            Self::Timeout => status::TIMEOUT,
            Self::Remote { status, .. } => *status,
            _ => status::HANDLER_FAILED,
        }
    }

    /// The payload this error is transmitted with.
    pub fn status_payload(&self) -> bytes::Bytes {
        match self {
            Self::Invocation { ctx } => {
                bytes::Bytes::copy_from_slice(ctx.as_bytes())
            }
            Self::Timeout => bytes::Bytes::new(),
            Self::Remote { payload, .. } => payload.clone(),
            oth => bytes::Bytes::from(oth.to_string()),
        }
    }
}

/// The svcnet result type.
pub type SvcResult<T> = Result<T, SvcError>;
