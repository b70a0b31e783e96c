//! Inbound message dispatch.
//!
//! Requests are routed by message type to registered [MsgHandler]s and run
//! on the work pool. Responses are routed by request id to the in-flight
//! registry, serialized per request id.

use super::ctx::SvcCtx;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use svcnet_api::{handler::DynMsgHandler, transport::TxHandler, *};

/// Routes inbound requests to handlers and inbound responses to the
/// requests awaiting them.
#[derive(Debug)]
pub struct SvcDispatcher {
    ctx: Arc<SvcCtx>,
    handlers: RwLock<HashMap<MsgTypeId, DynMsgHandler>>,
    deferred: Mutex<Option<Vec<Envelope>>>,
}

impl SvcDispatcher {
    pub(crate) fn new(ctx: Arc<SvcCtx>) -> Self {
        Self {
            ctx,
            handlers: Default::default(),
            deferred: Mutex::new(None),
        }
    }

    /// Register the handler for a message type.
    ///
    /// Panics if a handler is already registered for that type. Handlers
    /// are wired once at startup, a second registration is a bug.
    pub fn register_handler(
        &self,
        msg_type_id: MsgTypeId,
        handler: DynMsgHandler,
    ) {
        if self
            .handlers
            .write()
            .unwrap()
            .insert(msg_type_id, handler)
            .is_some()
        {
            panic!(
                "Cannot register a handler for message type {msg_type_id}, already registered"
            );
        }
    }

    /// While deferring, inbound requests are queued instead of handled.
    /// Turning deferral off handles the queued requests in arrival order.
    /// Responses are never deferred.
    pub fn defer_requests(&self, defer: bool) {
        let queued = {
            let mut lock = self.deferred.lock().unwrap();
            if defer {
                if lock.is_none() {
                    *lock = Some(Vec::new());
                }
                return;
            }
            lock.take()
        };

        if let Some(queued) = queued {
            tracing::debug!(count = queued.len(), "draining deferred requests");
            for envelope in queued {
                self.recv_request(envelope);
            }
        }
    }

    /// Handle an inbound request envelope.
    ///
    /// Unknown message types are dropped with a warning. Otherwise the
    /// handler runs on the work pool and its reply, if any, is sent back
    /// to the requester unless the request is untracked.
    pub fn recv_request(&self, envelope: Envelope) {
        {
            let mut lock = self.deferred.lock().unwrap();
            if let Some(queue) = lock.as_mut() {
                queue.push(envelope);
                return;
            }
        }

        let msg_type_id = envelope.msg_type();
        let handler = self.handlers.read().unwrap().get(&msg_type_id).cloned();
        let Some(handler) = handler else {
            self.ctx.counters.incr_unknown_msg_types();
            tracing::warn!(
                request_id = envelope.request_id,
                src = %envelope.src_uuid(),
                err = %SvcError::UnknownMessageType(msg_type_id),
                "dropping inbound request",
            );
            return;
        };

        let ctx = self.ctx.clone();
        self.ctx.work_pool.submit(async move {
            let untracked = envelope.request_id().is_untracked();
            let header = envelope.swap();

            let reply = handler.handle_request(envelope).await;

            if untracked {
                if let Err(err) = reply {
                    tracing::debug!(
                        %msg_type_id,
                        ?err,
                        "handler failed for untracked request",
                    );
                }
                return;
            }

            let response = match reply {
                Ok(Some(reply)) => Envelope {
                    msg_type_id: reply.msg_type_id.0,
                    payload: reply.payload,
                    ..header
                },
                Ok(None) => return,
                Err(err) => header.with_handler_error(&err),
            };

            ctx.send_response(response);
        });
    }

    /// Handle an inbound response envelope. Responses for ids that are
    /// not in flight are dropped.
    pub fn recv_response(&self, envelope: Envelope) {
        self.ctx.deliver_response(envelope);
    }
}

impl TxHandler for SvcDispatcher {
    fn recv_data(&self, data: bytes::Bytes) -> SvcResult<()> {
        let frame = SvcFrame::decode_bytes(data)?;
        let ty = frame.ty();
        let Some(envelope) = frame.envelope else {
            return Err(SvcError::other("frame has no envelope"));
        };

        match ty {
            FrameTy::Request => self.recv_request(envelope),
            FrameTy::Response => self.recv_response(envelope),
            FrameTy::Unspecified => {
                return Err(SvcError::other("unspecified frame type"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test;
