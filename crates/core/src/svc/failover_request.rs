//! Failover requests: try candidates in order until one succeeds.
//!
//! Exactly one direct sub-request is in flight at a time. A sub-request
//! success completes the failover request. A sub-request error either moves
//! on to the next candidate or, when the candidates are exhausted or the
//! continue predicate says stop, completes the failover request with that
//! error. The timeout covers the whole request, not each attempt.

use super::ctx::SvcCtx;
use super::ep_request::{EpSvcRequest, SubRequestOwner};
use super::request::{imp_request_setters, HasRequestCore, RequestCore};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use svcnet_api::{endpoint::DynEpIdProvider, request::SvcRequest, *};

type ContinuePredicate =
    Arc<dyn Fn(&SvcUuid, &SvcError) -> bool + 'static + Send + Sync>;

#[derive(Default)]
struct FailoverState {
    candidates: Vec<SvcUuid>,
    cursor: usize,
    current: Option<Arc<EpSvcRequest>>,
    attempted: Vec<SvcUuid>,
    predicate: Option<ContinuePredicate>,
}

/// A request sent to an ordered list of candidate endpoints, one at a
/// time, until one of them succeeds.
pub struct FailoverSvcRequest {
    core: RequestCore,
    provider: DynEpIdProvider,
    this: Weak<Self>,
    state: Mutex<FailoverState>,
}

impl std::fmt::Debug for FailoverSvcRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverSvcRequest")
            .field("core", &self.core)
            .field("attempted", &self.attempted())
            .finish()
    }
}

imp_request_setters!(FailoverSvcRequest);

impl FailoverSvcRequest {
    pub(crate) fn new(
        ctx: Arc<SvcCtx>,
        id: RequestId,
        provider: DynEpIdProvider,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            core: RequestCore::new(ctx, id),
            provider,
            this: this.clone(),
            state: Mutex::new(FailoverState::default()),
        })
    }

    /// Decide, after a candidate failed, whether to move on to the next
    /// one. Returning false completes the request with that failure.
    /// Without a predicate every failure moves on.
    pub fn set_continue_predicate<F>(&self, predicate: F)
    where
        F: Fn(&SvcUuid, &SvcError) -> bool + 'static + Send + Sync,
    {
        self.state.lock().unwrap().predicate = Some(Arc::new(predicate));
    }

    /// The candidates tried so far, in order.
    pub fn attempted(&self) -> Vec<SvcUuid> {
        self.state.lock().unwrap().attempted.clone()
    }

    /// The in-flight sub-request `envelope` is addressed to, if any.
    fn current_for(&self, envelope: &Envelope) -> Option<Arc<EpSvcRequest>> {
        if self.core.is_complete() {
            tracing::debug!(
                request_id = %self.core.id(),
                "response for a completed request, ignoring",
            );
            return None;
        }

        let current = self.state.lock().unwrap().current.clone();
        match current {
            Some(sub) if *sub.peer() == envelope.src_uuid() => Some(sub),
            _ => {
                tracing::debug!(
                    request_id = %self.core.id(),
                    src = %envelope.src_uuid(),
                    "response from a non-current endpoint, ignoring",
                );
                None
            }
        }
    }

    fn start_sub(
        &self,
        state: &mut FailoverState,
        payload: (MsgTypeId, bytes::Bytes),
    ) -> Arc<EpSvcRequest> {
        let peer = state.candidates[state.cursor].clone();
        let sub = EpSvcRequest::new_sub(
            self.core.ctx().clone(),
            self.core.id(),
            peer.clone(),
            payload,
            self.this.clone(),
        );
        state.attempted.push(peer);
        state.current = Some(sub.clone());
        sub
    }
}

impl SubRequestOwner for FailoverSvcRequest {
    fn on_sub_done(&self, peer: SvcUuid, result: SvcResult<Envelope>) {
        let err = match result {
            Ok(envelope) => {
                self.core.complete(Ok(envelope));
                return;
            }
            Err(err) => err,
        };

        if self.core.is_complete() {
            return;
        }

        let predicate = self.state.lock().unwrap().predicate.clone();
        let proceed = predicate.map(|p| p(&peer, &err)).unwrap_or(true);

        let next = if proceed {
            let payload = self.core.payload();
            let mut lock = self.state.lock().unwrap();
            if lock.cursor + 1 < lock.candidates.len() {
                lock.cursor += 1;
                Some(self.start_sub(&mut lock, payload))
            } else {
                None
            }
        } else {
            None
        };

        match next {
            Some(sub) => {
                tracing::debug!(
                    request_id = %self.core.id(),
                    failed = %peer,
                    next = %sub.peer(),
                    ?err,
                    "failing over",
                );
                sub.invoke();
            }
            None => {
                self.core.complete(Err(err));
            }
        }
    }
}

impl HasRequestCore for FailoverSvcRequest {
    fn core(&self) -> &RequestCore {
        &self.core
    }
}

impl SvcRequest for FailoverSvcRequest {
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

        let ctx = self.core.ctx().clone();
        self.core.arm_timer(&ctx.self_uuid);

        let candidates = self.provider.candidates();
        if candidates.is_empty() {
            ctx.counters.incr_invocation_errors();
            self.core.complete(Err(SvcError::invocation(
                "no candidate endpoints for failover request",
            )));
            return;
        }

        let payload = self.core.payload();
        let sub = {
            let mut lock = self.state.lock().unwrap();
            lock.candidates = candidates;
            lock.cursor = 0;
            self.start_sub(&mut lock, payload)
        };

        sub.invoke();
    }

    fn handle_response(&self, envelope: Envelope) {
        if let Some(sub) = self.current_for(&envelope) {
            sub.handle_response(envelope);
        }
    }

    fn handle_local_error(&self, envelope: Envelope) {
        if self.core.is_complete() {
            return;
        }

        // our own timer, not a candidate
        if envelope.status == status::TIMEOUT
            && envelope.src == self.core.ctx().self_uuid.0
        {
            self.core.complete(Err(SvcError::Timeout));
            return;
        }

        if let Some(sub) = self.current_for(&envelope) {
            sub.handle_local_error(envelope);
        }
    }

    fn is_complete(&self) -> bool {
        self.core.is_complete()
    }
}
