//! The capability interface shared by every outstanding request.

use crate::*;
use std::sync::Arc;

/// An outstanding request, as seen by the registry and the dispatcher.
///
/// Direct, failover and quorum requests all implement this. The registry
/// stores requests as [DynSvcRequest] and the dispatcher only ever calls
/// [SvcRequest::handle_response] and [SvcRequest::handle_local_error] on
/// them.
pub trait SvcRequest: 'static + Send + Sync + std::fmt::Debug {
    /// The request id this request is registered under.
    fn id(&self) -> RequestId;

    /// The timeout armed at invoke.
    fn timeout(&self) -> std::time::Duration;

    /// Send the request. Only the first call has any effect.
    fn invoke(&self);

    /// Feed a response envelope received from a peer to the request.
    fn handle_response(&self, envelope: Envelope);

    /// Feed a locally synthesized error envelope to the request: its own
    /// timeout, or an invocation failure towards the envelope's source.
    fn handle_local_error(&self, envelope: Envelope);

    /// True once the request has fired its terminal callback.
    fn is_complete(&self) -> bool;
}

/// Trait-object [SvcRequest].
pub type DynSvcRequest = Arc<dyn SvcRequest>;
