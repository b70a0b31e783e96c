//! Handlers for unsolicited inbound requests.

use crate::*;
use std::sync::Arc;

/// A reply to an inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Message type of the response.
    pub msg_type_id: MsgTypeId,

    /// Response payload.
    pub payload: bytes::Bytes,
}

impl Reply {
    /// Construct a reply.
    pub fn new(msg_type_id: MsgTypeId, payload: bytes::Bytes) -> Self {
        Self {
            msg_type_id,
            payload,
        }
    }
}

/// Handles one inbound message type.
///
/// `Ok(Some(_))` is sent back to the requester, `Ok(None)` sends nothing,
/// and `Err(_)` is sent back as an error response: a [SvcError::Remote]
/// keeps its status, any other error is sent as
/// [status::HANDLER_FAILED](crate::status::HANDLER_FAILED).
pub trait MsgHandler: 'static + Send + Sync + std::fmt::Debug {
    /// Handle an inbound request envelope.
    fn handle_request(
        &self,
        envelope: Envelope,
    ) -> BoxFut<'_, SvcResult<Option<Reply>>>;
}

/// Trait-object [MsgHandler].
pub type DynMsgHandler = Arc<dyn MsgHandler>;
