//! The request state machine shared by every request kind.
//!
//! A request moves `Created -> InFlight -> Complete` and nothing leaves
//! `Complete`. Completion is guarded: the response handler, the timeout and
//! a local invocation failure may all race to complete a request, only the
//! first one wins and fires exactly one terminal callback.

use super::ctx::SvcCtx;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use svcnet_api::*;
use tokio::task::AbortHandle;

pub(crate) type SuccessCb = Box<dyn FnOnce(Envelope) + 'static + Send>;
pub(crate) type ErrorCb = Box<dyn FnOnce(SvcError) + 'static + Send>;
pub(crate) type FinishTrackingCb =
    Arc<dyn Fn(RequestId) + 'static + Send + Sync>;

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Constructed and registered, not yet invoked.
    Created,

    /// Invoked, waiting for a response, a timeout or a local failure.
    InFlight,

    /// The terminal callback has fired.
    Complete,
}

struct CoreState {
    state: RequestState,
    timeout: Duration,
    msg_type_id: MsgTypeId,
    payload: bytes::Bytes,
    error: Option<SvcError>,
    response: Option<Envelope>,
    success_cb: Option<SuccessCb>,
    error_cb: Option<ErrorCb>,
    finish_tracking: Option<FinishTrackingCb>,
    timer: Option<AbortHandle>,
    invoked_at: Option<Instant>,
}

/// Implemented by every request kind the factory registers.
pub(crate) trait HasRequestCore: svcnet_api::request::SvcRequest {
    fn core(&self) -> &RequestCore;
}

pub(crate) struct RequestCore {
    id: RequestId,
    ctx: Arc<SvcCtx>,
    state: Mutex<CoreState>,
}

impl std::fmt::Debug for RequestCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCore")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl RequestCore {
    pub fn new(ctx: Arc<SvcCtx>, id: RequestId) -> Self {
        let timeout = ctx.default_timeout;
        Self {
            id,
            ctx,
            state: Mutex::new(CoreState {
                state: RequestState::Created,
                timeout,
                msg_type_id: MsgTypeId(0),
                payload: bytes::Bytes::new(),
                error: None,
                response: None,
                success_cb: None,
                error_cb: None,
                finish_tracking: None,
                timer: None,
                invoked_at: None,
            }),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn ctx(&self) -> &Arc<SvcCtx> {
        &self.ctx
    }

    pub fn state(&self) -> RequestState {
        self.state.lock().unwrap().state
    }

    pub fn is_complete(&self) -> bool {
        self.state() == RequestState::Complete
    }

    pub fn error(&self) -> Option<SvcError> {
        self.state.lock().unwrap().error.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.state.lock().unwrap().timeout
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.state.lock().unwrap().timeout = timeout;
    }

    pub fn set_payload(&self, msg_type_id: MsgTypeId, payload: bytes::Bytes) {
        let mut lock = self.state.lock().unwrap();
        lock.msg_type_id = msg_type_id;
        lock.payload = payload;
    }

    pub fn payload(&self) -> (MsgTypeId, bytes::Bytes) {
        let lock = self.state.lock().unwrap();
        (lock.msg_type_id, lock.payload.clone())
    }

    pub fn set_success_cb(&self, cb: SuccessCb) {
        self.state.lock().unwrap().success_cb = Some(cb);
    }

    pub fn set_error_cb(&self, cb: ErrorCb) {
        self.state.lock().unwrap().error_cb = Some(cb);
    }

    /// Installed by the request factory on registered requests. Removes
    /// the request from the registry at completion.
    pub fn set_finish_tracking(&self, cb: FinishTrackingCb) {
        self.state.lock().unwrap().finish_tracking = Some(cb);
    }

    /// The outbound request envelope for a destination.
    pub fn request_envelope(&self, dst: &SvcUuid) -> Envelope {
        let (msg_type_id, payload) = self.payload();
        Envelope::new_request(
            self.id,
            msg_type_id,
            self.ctx.self_uuid.clone(),
            dst.clone(),
            payload,
        )
    }

    /// `Created -> InFlight`. Returns false if the request was already
    /// invoked.
    pub fn start(&self) -> bool {
        let mut lock = self.state.lock().unwrap();
        if lock.state != RequestState::Created {
            tracing::warn!(
                request_id = %self.id,
                state = ?lock.state,
                "request invoked twice, ignoring",
            );
            return false;
        }
        lock.state = RequestState::InFlight;
        lock.invoked_at = Some(Instant::now());
        true
    }

    /// Arm the one-shot timeout. On expiry a timeout response appearing to
    /// come from `peer` is posted through the regular response path.
    pub fn arm_timer(&self, peer: &SvcUuid) {
        let timeout = self.timeout();
        let envelope = self
            .request_envelope(peer)
            .swap()
            .with_error(&SvcError::Timeout);
        let ctx = self.ctx.clone();

        let timer = self
            .ctx
            .runtime
            .spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::debug!(
                    request_id = envelope.request_id,
                    "request timed out",
                );
                ctx.post_error(envelope);
            })
            .abort_handle();

        let mut lock = self.state.lock().unwrap();
        if lock.state == RequestState::Complete {
            timer.abort();
        } else {
            lock.timer = Some(timer);
        }
    }

    /// Complete the request with a result. The first call wins: it
    /// records the error, cancels the timer, removes the registry entry,
    /// then fires the matching callback. Later calls, and calls before
    /// invoke, return false and do nothing.
    pub fn complete(&self, result: SvcResult<Envelope>) -> bool {
        let (success_cb, error_cb, finish_tracking, timer, invoked_at) = {
            let mut lock = self.state.lock().unwrap();
            match lock.state {
                RequestState::Created => {
                    tracing::warn!(
                        request_id = %self.id,
                        "ignoring completion of a request that was never invoked",
                    );
                    return false;
                }
                RequestState::Complete => return false,
                RequestState::InFlight => (),
            }
            lock.state = RequestState::Complete;
            lock.error = result.as_ref().err().cloned();
            lock.response = result.as_ref().ok().cloned();
            (
                lock.success_cb.take(),
                lock.error_cb.take(),
                lock.finish_tracking.clone(),
                lock.timer.take(),
                lock.invoked_at,
            )
        };

        if let Some(timer) = timer {
            timer.abort();
        }

        if let Some(finish_tracking) = finish_tracking {
            finish_tracking(self.id);
            if matches!(result, Err(SvcError::Timeout)) {
                self.ctx.counters.incr_timeouts();
            }
            if let Some(invoked_at) = invoked_at {
                self.ctx
                    .counters
                    .record_completion(invoked_at.elapsed(), result.is_ok());
            }
        }

        match result {
            Ok(envelope) => {
                tracing::trace!(request_id = %self.id, "request complete");
                if let Some(cb) = success_cb {
                    cb(envelope);
                }
            }
            Err(err) => {
                tracing::debug!(request_id = %self.id, ?err, "request failed");
                if let Some(cb) = error_cb {
                    cb(err);
                }
            }
        }

        true
    }

    /// A future resolving with the outcome of this request. Installs both
    /// callbacks, replacing any set before. Once complete, resolves with
    /// the recorded response or error.
    pub fn completion(&self) -> BoxFut<'static, SvcResult<Envelope>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));

        {
            let mut lock = self.state.lock().unwrap();
            if lock.state == RequestState::Complete {
                let res = match (lock.error.clone(), lock.response.clone()) {
                    (Some(err), _) => Err(err),
                    (None, Some(response)) => Ok(response),
                    (None, None) => Err(SvcError::other(
                        "request complete without outcome",
                    )),
                };
                return Box::pin(async move { res });
            }

            lock.success_cb = Some(Box::new({
                let tx = tx.clone();
                move |envelope| {
                    if let Some(tx) = tx.lock().unwrap().take() {
                        let _ = tx.send(Ok(envelope));
                    }
                }
            }));
            lock.error_cb = Some(Box::new(move |err| {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(Err(err));
                }
            }));
        }

        Box::pin(async move {
            rx.await.unwrap_or_else(|_| {
                Err(SvcError::other("request dropped before completion"))
            })
        })
    }
}

/// Adds the public configuration surface every request kind shares.
macro_rules! imp_request_setters {
    ($t:ty) => {
        impl $t {
            /// Override the timeout assigned at creation. Only effective
            /// before invoke.
            pub fn set_timeout(&self, timeout: std::time::Duration) {
                self.core.set_timeout(timeout);
            }

            /// Set the outbound message type and payload.
            pub fn set_payload(
                &self,
                msg_type_id: svcnet_api::MsgTypeId,
                payload: bytes::Bytes,
            ) {
                self.core.set_payload(msg_type_id, payload);
            }

            /// Encode a protobuf message as the outbound payload.
            pub fn set_message<M: prost::Message>(
                &self,
                msg_type_id: svcnet_api::MsgTypeId,
                msg: &M,
            ) {
                self.core
                    .set_payload(msg_type_id, msg.encode_to_vec().into());
            }

            /// Called with the response envelope if the request succeeds.
            pub fn on_success<F>(&self, cb: F)
            where
                F: FnOnce(svcnet_api::Envelope) + 'static + Send,
            {
                self.core.set_success_cb(Box::new(cb));
            }

            /// Called with the error if the request fails.
            pub fn on_error<F>(&self, cb: F)
            where
                F: FnOnce(svcnet_api::SvcError) + 'static + Send,
            {
                self.core.set_error_cb(Box::new(cb));
            }

            /// Current lifecycle state.
            pub fn state(&self) -> $crate::svc::RequestState {
                self.core.state()
            }

            /// The recorded error, valid once complete.
            pub fn error(&self) -> Option<svcnet_api::SvcError> {
                self.core.error()
            }

            /// A future resolving with the outcome. Replaces the success
            /// and error callbacks, so call it before invoke.
            pub fn completion(
                &self,
            ) -> svcnet_api::BoxFut<
                'static,
                svcnet_api::SvcResult<svcnet_api::Envelope>,
            > {
                self.core.completion()
            }
        }
    };
}

pub(crate) use imp_request_setters;
