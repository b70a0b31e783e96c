//! Direct requests: one destination, one response.

use super::request::{imp_request_setters, HasRequestCore, RequestCore};
use super::ctx::SvcCtx;
use std::sync::{Arc, Weak};
use std::time::Duration;
use svcnet_api::{request::SvcRequest, *};

/// Owner of direct sub-requests. Failover and quorum requests fan out
/// into direct requests that report back here instead of firing user
/// callbacks.
pub(crate) trait SubRequestOwner: 'static + Send + Sync {
    fn on_sub_done(&self, peer: SvcUuid, result: SvcResult<Envelope>);
}

/// A request to a single destination service.
///
/// Completes with the peer's response, with [SvcError::Invocation] if the
/// destination could not be resolved or the send failed locally, or with
/// [SvcError::Timeout].
#[derive(Debug)]
pub struct EpSvcRequest {
    core: RequestCore,
    peer: SvcUuid,
    sub: bool,
}

imp_request_setters!(EpSvcRequest);

impl EpSvcRequest {
    pub(crate) fn new(ctx: Arc<SvcCtx>, id: RequestId, peer: SvcUuid) -> Self {
        Self {
            core: RequestCore::new(ctx, id),
            peer,
            sub: false,
        }
    }

    /// A direct request owned by an aggregate request. It shares the
    /// owner's id, is never registered and never arms its own timer.
    pub(crate) fn new_sub(
        ctx: Arc<SvcCtx>,
        id: RequestId,
        peer: SvcUuid,
        (msg_type_id, payload): (MsgTypeId, bytes::Bytes),
        owner: Weak<dyn SubRequestOwner>,
    ) -> Arc<Self> {
        let out = Self {
            core: RequestCore::new(ctx, id),
            peer: peer.clone(),
            sub: true,
        };
        out.core.set_payload(msg_type_id, payload);

        out.core.set_success_cb(Box::new({
            let owner = owner.clone();
            let peer = peer.clone();
            move |envelope| {
                if let Some(owner) = owner.upgrade() {
                    owner.on_sub_done(peer, Ok(envelope));
                }
            }
        }));
        out.core.set_error_cb(Box::new(move |err| {
            if let Some(owner) = owner.upgrade() {
                owner.on_sub_done(peer, Err(err));
            }
        }));

        Arc::new(out)
    }

    /// The destination service.
    pub fn peer(&self) -> &SvcUuid {
        &self.peer
    }

    fn handle_result(&self, result: SvcResult<Envelope>) {
        if self.core.is_complete() {
            tracing::debug!(
                request_id = %self.core.id(),
                "response for a completed request, ignoring",
            );
            return;
        }

        self.core.complete(result);
    }
}

impl HasRequestCore for EpSvcRequest {
    fn core(&self) -> &RequestCore {
        &self.core
    }
}

impl SvcRequest for EpSvcRequest {
    fn id(&self) -> RequestId {
        self.core.id()
    }

    fn timeout(&self) -> Duration {
        self.core.timeout()
    }

    fn invoke(&self) {
        if !self.core.start() {
            return;
        }

        if !self.sub {
            self.core.arm_timer(&self.peer);
        }

        tracing::trace!(
            request_id = %self.core.id(),
            peer = %self.peer,
            "invoking direct request",
        );

        self.core
            .ctx()
            .send_request(self.core.request_envelope(&self.peer));
    }

    fn handle_response(&self, envelope: Envelope) {
        self.handle_result(envelope.into_result());
    }

    fn handle_local_error(&self, envelope: Envelope) {
        self.handle_result(envelope.into_local_result());
    }

    fn is_complete(&self) -> bool {
        self.core.is_complete()
    }
}
