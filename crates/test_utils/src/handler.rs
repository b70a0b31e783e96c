//! Test [MsgHandler] implementations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use svcnet_api::{handler::*, *};

/// Replies to every request with its own payload.
#[derive(Debug)]
pub struct EchoHandler {
    reply_type: MsgTypeId,
    calls: AtomicUsize,
}

impl EchoHandler {
    /// Create an echo handler replying with the given message type.
    pub fn create(reply_type: MsgTypeId) -> Arc<Self> {
        Arc::new(Self {
            reply_type,
            calls: AtomicUsize::new(0),
        })
    }

    /// How many requests this handler has seen.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MsgHandler for EchoHandler {
    fn handle_request(
        &self,
        envelope: Envelope,
    ) -> BoxFut<'_, SvcResult<Option<Reply>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(Some(Reply::new(self.reply_type, envelope.payload)))
        })
    }
}

/// Fails every request with a remote error status.
#[derive(Debug)]
pub struct FailHandler {
    status: i32,
}

impl FailHandler {
    /// Create a handler failing with the given status.
    pub fn create(status: i32) -> Arc<Self> {
        Arc::new(Self { status })
    }
}

impl MsgHandler for FailHandler {
    fn handle_request(
        &self,
        envelope: Envelope,
    ) -> BoxFut<'_, SvcResult<Option<Reply>>> {
        Box::pin(async move {
            Err(SvcError::Remote {
                status: self.status,
                payload: envelope.payload,
            })
        })
    }
}
