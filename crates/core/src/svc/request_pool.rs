//! The request factory.
//!
//! Allocates request ids, constructs and registers requests, and is the
//! single entry point for locally synthesized errors
//! ([SvcRequestPool::post_error]).

use super::counters::SvcRequestCounters;
use super::ctx::SvcCtx;
use super::ep_request::EpSvcRequest;
use super::failover_request::FailoverSvcRequest;
use super::quorum_request::QuorumSvcRequest;
use super::request::{FinishTrackingCb, HasRequestCore};
use super::request_tracker::RequestTracker;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use svcnet_api::{endpoint::DynEpIdProvider, *};

/// SvcRequestPool configuration types.
pub mod config {
    /// Configuration parameters for [SvcRequestPool](super::SvcRequestPool).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct SvcRequestPoolConfig {
        /// Timeout assigned to new requests, in milliseconds.
        /// Default: 5000.
        pub request_timeout_ms: u32,

        /// Worker tasks resolving endpoints and sending frames.
        /// Default: 2.
        pub send_worker_count: usize,

        /// Worker tasks handling responses and inbound requests.
        /// Default: 4.
        pub work_worker_count: usize,
    }

    impl Default for SvcRequestPoolConfig {
        fn default() -> Self {
            Self {
                request_timeout_ms: 5000,
                send_worker_count: 2,
                work_worker_count: 4,
            }
        }
    }

    /// Module-level configuration for SvcRequestPool.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SvcRequestPoolModConfig {
        /// SvcRequestPool configuration.
        #[serde(default)]
        pub svc_request_pool: SvcRequestPoolConfig,
    }

    impl svcnet_api::config::ModConfig for SvcRequestPoolModConfig {}
}

/// Creates and tracks outstanding requests.
pub struct SvcRequestPool {
    ctx: Arc<SvcCtx>,
    next_request_id: AtomicU64,
    finish_tracking: FinishTrackingCb,
}

impl std::fmt::Debug for SvcRequestPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvcRequestPool")
            .field("self_uuid", &self.ctx.self_uuid)
            .field("next_request_id", &self.next_request_id)
            .finish()
    }
}

impl SvcRequestPool {
    pub(crate) fn new(ctx: Arc<SvcCtx>) -> Self {
        let tracker = ctx.tracker.clone();
        Self {
            ctx,
            next_request_id: AtomicU64::new(RequestId::UNTRACKED.0 + 1),
            finish_tracking: Arc::new(move |id| {
                tracker.remove(id);
            }),
        }
    }

    /// Allocate a request id. Never returns [RequestId::UNTRACKED], even
    /// when the counter wraps.
    pub fn next_request_id(&self) -> RequestId {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if id == RequestId::UNTRACKED.0 {
            return RequestId(
                self.next_request_id.fetch_add(1, Ordering::Relaxed),
            );
        }
        RequestId(id)
    }

    /// Set the next id to allocate. Lets a restarted service move past
    /// ids that may still be answered by peers.
    pub fn seed_request_id(&self, next: u64) {
        self.next_request_id.store(next, Ordering::Relaxed);
    }

    /// Create and register a direct request to `peer`.
    pub fn new_ep_request(&self, peer: SvcUuid) -> Arc<EpSvcRequest> {
        let request = Arc::new(EpSvcRequest::new(
            self.ctx.clone(),
            self.next_request_id(),
            peer,
        ));
        self.init_common(request)
    }

    /// Create and register a failover request over the provider's
    /// candidates.
    pub fn new_failover_request(
        &self,
        provider: DynEpIdProvider,
    ) -> Arc<FailoverSvcRequest> {
        let request = FailoverSvcRequest::new(
            self.ctx.clone(),
            self.next_request_id(),
            provider,
        );
        self.init_common(request)
    }

    /// Create and register a quorum request over the provider's
    /// candidates.
    pub fn new_quorum_request(
        &self,
        provider: DynEpIdProvider,
    ) -> Arc<QuorumSvcRequest> {
        let request = QuorumSvcRequest::new(
            self.ctx.clone(),
            self.next_request_id(),
            provider,
        );
        self.init_common(request)
    }

    fn init_common<R: HasRequestCore>(&self, request: Arc<R>) -> Arc<R> {
        request
            .core()
            .set_finish_tracking(self.finish_tracking.clone());

        if let Err(err) =
            self.ctx.tracker.register(request.id(), request.clone())
        {
            // ids come from a single atomic counter, a duplicate means
            // that invariant is broken
            panic!("request registration failed: {err}");
        }

        request
    }

    /// Send a one-way message. The envelope carries
    /// [RequestId::UNTRACKED], the receiver does not respond, and a
    /// failed send is only counted.
    pub fn send_untracked(
        &self,
        dst: SvcUuid,
        msg_type_id: MsgTypeId,
        payload: bytes::Bytes,
    ) {
        self.ctx.send_request(Envelope::new_request(
            RequestId::UNTRACKED,
            msg_type_id,
            self.ctx.self_uuid.clone(),
            dst,
            payload,
        ));
    }

    /// Deliver a locally synthesized error response through the same
    /// serialized path as peer responses. Status 1001 completes the
    /// request with [SvcError::Invocation], 1002 with [SvcError::Timeout],
    /// any other status as a peer error would. Bumps the invocation error
    /// counter, or the timeout counter once the timeout completes the
    /// request. Envelopes carrying [RequestId::UNTRACKED] are counted and
    /// dropped.
    pub fn post_error(&self, envelope: Envelope) {
        self.ctx.post_error(envelope);
    }

    /// A request header from this service.
    pub fn new_request_header(
        &self,
        request_id: RequestId,
        msg_type_id: MsgTypeId,
        dst: SvcUuid,
    ) -> Envelope {
        Envelope::new_request(
            request_id,
            msg_type_id,
            self.ctx.self_uuid.clone(),
            dst,
            bytes::Bytes::new(),
        )
    }

    /// The id of the local service.
    pub fn self_uuid(&self) -> &SvcUuid {
        &self.ctx.self_uuid
    }

    /// Timeout assigned to new requests.
    pub fn default_timeout(&self) -> Duration {
        self.ctx.default_timeout
    }

    /// Live counters.
    pub fn counters(&self) -> &SvcRequestCounters {
        &self.ctx.counters
    }

    /// The in-flight registry.
    pub fn tracker(&self) -> &RequestTracker {
        &self.ctx.tracker
    }
}
