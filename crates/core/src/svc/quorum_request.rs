//! Quorum requests: broadcast to a set, complete on a success threshold.

use super::ctx::SvcCtx;
use super::ep_request::{EpSvcRequest, SubRequestOwner};
use super::request::{imp_request_setters, HasRequestCore, RequestCore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use svcnet_api::{endpoint::DynEpIdProvider, request::SvcRequest, *};

#[derive(Debug, Default)]
struct QuorumState {
    subs: Vec<Arc<EpSvcRequest>>,
    requested_threshold: Option<usize>,
    threshold: usize,
    ok: usize,
    err: usize,
}

/// A request sent concurrently to every endpoint of a set.
///
/// Succeeds with the response that brings the success count to the
/// threshold. Fails with the latest error as soon as the threshold can no
/// longer be reached. Responses arriving after either point are ignored.
#[derive(Debug)]
pub struct QuorumSvcRequest {
    core: RequestCore,
    provider: DynEpIdProvider,
    this: Weak<Self>,
    state: Mutex<QuorumState>,
}

imp_request_setters!(QuorumSvcRequest);

impl QuorumSvcRequest {
    pub(crate) fn new(
        ctx: Arc<SvcCtx>,
        id: RequestId,
        provider: DynEpIdProvider,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            core: RequestCore::new(ctx, id),
            provider,
            this: this.clone(),
            state: Mutex::new(QuorumState::default()),
        })
    }

    /// Number of successes required. Defaults to a simple majority of the
    /// endpoint set. Values below 1 are raised to 1. Only effective
    /// before invoke.
    pub fn set_quorum_threshold(&self, threshold: usize) {
        self.state.lock().unwrap().requested_threshold =
            Some(threshold.max(1));
    }

    /// The (success, error) counts of sub-responses received so far.
    pub fn response_counts(&self) -> (usize, usize) {
        let lock = self.state.lock().unwrap();
        (lock.ok, lock.err)
    }

    /// The sub-request for the member `envelope` comes from, if any.
    fn sub_for(&self, envelope: &Envelope) -> Option<Arc<EpSvcRequest>> {
        if self.core.is_complete() {
            tracing::debug!(
                request_id = %self.core.id(),
                "response for a completed request, ignoring",
            );
            return None;
        }

        let src = envelope.src_uuid();
        let sub = self
            .state
            .lock()
            .unwrap()
            .subs
            .iter()
            .find(|s| *s.peer() == src)
            .cloned();
        if sub.is_none() {
            tracing::debug!(
                request_id = %self.core.id(),
                %src,
                "response from outside the quorum set, ignoring",
            );
        }
        sub
    }
}

impl SubRequestOwner for QuorumSvcRequest {
    fn on_sub_done(&self, peer: SvcUuid, result: SvcResult<Envelope>) {
        let outcome = {
            let mut lock = self.state.lock().unwrap();
            let total = lock.subs.len();
            match result {
                Ok(envelope) => {
                    lock.ok += 1;
                    if lock.ok >= lock.threshold {
                        Some(Ok(envelope))
                    } else {
                        None
                    }
                }
                Err(err) => {
                    lock.err += 1;
                    let outstanding = total - lock.ok - lock.err;
                    if lock.ok + outstanding < lock.threshold {
                        Some(Err(err))
                    } else {
                        tracing::debug!(
                            request_id = %self.core.id(),
                            %peer,
                            ?err,
                            "quorum member failed",
                        );
                        None
                    }
                }
            }
        };

        if let Some(result) = outcome {
            self.core.complete(result);
        }
    }
}

impl HasRequestCore for QuorumSvcRequest {
    fn core(&self) -> &RequestCore {
        &self.core
    }
}

impl SvcRequest for QuorumSvcRequest {
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

        let mut candidates = self.provider.candidates();
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));

        let payload = self.core.payload();
        let res = {
            let mut lock = self.state.lock().unwrap();
            let threshold = lock
                .requested_threshold
                .unwrap_or(candidates.len() / 2 + 1);
            if candidates.is_empty() {
                Err(SvcError::invocation(
                    "no candidate endpoints for quorum request",
                ))
            } else if threshold > candidates.len() {
                Err(SvcError::invocation(format!(
                    "quorum threshold {threshold} exceeds {} endpoints",
                    candidates.len()
                )))
            } else {
                lock.threshold = threshold;
                lock.subs = candidates
                    .into_iter()
                    .map(|peer| {
                        EpSvcRequest::new_sub(
                            ctx.clone(),
                            self.core.id(),
                            peer,
                            payload.clone(),
                            self.this.clone(),
                        )
                    })
                    .collect();
                Ok(lock.subs.clone())
            }
        };

        match res {
            Ok(subs) => {
                for sub in subs {
                    sub.invoke();
                }
            }
            Err(err) => {
                ctx.counters.incr_invocation_errors();
                self.core.complete(Err(err));
            }
        }
    }

    fn handle_response(&self, envelope: Envelope) {
        if let Some(sub) = self.sub_for(&envelope) {
            sub.handle_response(envelope);
        }
    }

    fn handle_local_error(&self, envelope: Envelope) {
        if self.core.is_complete() {
            return;
        }

        // our own timer, not a member
        if envelope.status == status::TIMEOUT
            && envelope.src == self.core.ctx().self_uuid.0
        {
            self.core.complete(Err(SvcError::Timeout));
            return;
        }

        if let Some(sub) = self.sub_for(&envelope) {
            sub.handle_local_error(envelope);
        }
    }

    fn is_complete(&self) -> bool {
        self.core.is_complete()
    }
}
