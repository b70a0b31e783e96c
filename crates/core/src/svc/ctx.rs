//! State shared by the request factory, the requests it creates, and the
//! inbound dispatcher.

use super::{
    counters::SvcRequestCounters, request_pool::config::SvcRequestPoolConfig,
    request_tracker::RequestTracker, serial_executor::SerialExecutor,
    task_pool::TaskPool,
};
use std::sync::Arc;
use std::time::Duration;
use svcnet_api::{builder::Builder, endpoint::*, transport::*, *};

#[derive(Debug)]
pub(crate) struct SvcCtx {
    pub self_uuid: SvcUuid,
    pub runtime: tokio::runtime::Handle,
    pub default_timeout: Duration,
    pub directory: DynEndpointDirectory,
    pub transport: DynTransport,
    pub route_validator: Option<DynRouteValidator>,
    pub tracker: Arc<RequestTracker>,
    pub counters: Arc<SvcRequestCounters>,
    pub send_pool: TaskPool,
    pub work_pool: Arc<TaskPool>,
    pub serial: SerialExecutor,
}

impl SvcCtx {
    /// Must be called from within a tokio runtime. Pools, timers and
    /// dispatch all run on that runtime.
    pub fn new(builder: &Builder, config: &SvcRequestPoolConfig) -> Arc<Self> {
        let work_pool =
            Arc::new(TaskPool::new("svc-work", config.work_worker_count));
        Arc::new(Self {
            self_uuid: builder.self_uuid.clone(),
            runtime: tokio::runtime::Handle::current(),
            default_timeout: Duration::from_millis(
                config.request_timeout_ms as u64,
            ),
            directory: builder.directory.clone(),
            transport: builder.transport.clone(),
            route_validator: builder.route_validator.clone(),
            tracker: Arc::new(RequestTracker::default()),
            counters: Arc::new(SvcRequestCounters::default()),
            send_pool: TaskPool::new("svc-send", config.send_worker_count),
            serial: SerialExecutor::new(work_pool.clone()),
            work_pool,
        })
    }

    /// Validate, resolve and send a request envelope on the send pool.
    /// Any failure comes back to the request as an invocation error.
    pub fn send_request(self: &Arc<Self>, envelope: Envelope) {
        let this = self.clone();
        self.send_pool.submit(async move {
            let frame = SvcFrame::request(envelope.clone());
            if let Err(err) = this.send_frame(frame).await {
                tracing::debug!(
                    request_id = envelope.request_id,
                    dst = %envelope.dst_uuid(),
                    ?err,
                    "request send failed",
                );
                this.post_error(envelope.swap().with_error(&err));
            }
        });
    }

    /// Resolve and send a response envelope on the send pool. Responses
    /// that cannot be sent are dropped, the requester will time out.
    pub fn send_response(self: &Arc<Self>, envelope: Envelope) {
        let this = self.clone();
        self.send_pool.submit(async move {
            let request_id = envelope.request_id;
            let dst = envelope.dst_uuid();
            if let Err(err) =
                this.send_frame(SvcFrame::response(envelope)).await
            {
                tracing::warn!(
                    request_id,
                    %dst,
                    ?err,
                    "dropping response that could not be sent",
                );
            }
        });
    }

    async fn send_frame(&self, frame: SvcFrame) -> SvcResult<()> {
        let Some(envelope) = frame.envelope.as_ref() else {
            return Err(SvcError::invocation("frame has no envelope"));
        };
        let dst = envelope.dst_uuid();

        if frame.ty() == FrameTy::Request {
            if let Some(route_validator) = &self.route_validator {
                route_validator.validate(envelope).map_err(|err| {
                    SvcError::invocation(format!("route rejected: {err}"))
                })?;
            }
        }

        let handle = self.directory.resolve(&dst).map_err(|err| match err {
            SvcError::Invocation { .. } => err,
            oth => SvcError::invocation(oth),
        })?;

        if let Err(err) = self.transport.send(handle, frame).await {
            self.directory.mark_down(&dst);
            return Err(SvcError::invocation(format!(
                "send to {dst} failed: {err}"
            )));
        }

        Ok(())
    }

    /// Route a locally synthesized error response through the serialized
    /// response path. Invocation errors are counted here, a timeout only
    /// once it actually completes its request. Untracked envelopes are
    /// only counted.
    pub fn post_error(&self, envelope: Envelope) {
        if envelope.request_id().is_untracked() {
            match envelope.status {
                status::TIMEOUT => self.counters.incr_timeouts(),
                _ => self.counters.incr_invocation_errors(),
            }
            tracing::trace!(
                status = envelope.status,
                "dropping error for untracked request",
            );
            return;
        }

        if envelope.status != status::TIMEOUT {
            self.counters.incr_invocation_errors();
        }

        let request_id = envelope.request_id();
        let tracker = self.tracker.clone();

        self.serial.schedule(request_id, move || {
            match tracker.get(request_id) {
                Some(request) => request.handle_local_error(envelope),
                None => tracing::trace!(
                    %request_id,
                    status = envelope.status,
                    "local error for a completed request, dropping",
                ),
            }
        });
    }

    /// Hand a peer's response to its request, serialized per request id.
    pub fn deliver_response(&self, envelope: Envelope) {
        let request_id = envelope.request_id();
        let tracker = self.tracker.clone();
        let counters = self.counters.clone();

        self.serial.schedule(request_id, move || {
            match tracker.get(request_id) {
                Some(request) => request.handle_response(envelope),
                None => {
                    counters.incr_late_responses();
                    tracing::debug!(
                        %request_id,
                        src = %envelope.src_uuid(),
                        "response for a request that doesn't exist (timed out?), dropping",
                    );
                }
            }
        });
    }
}
