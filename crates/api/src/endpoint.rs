//! Endpoint resolution and candidate selection.

use crate::*;
use std::sync::Arc;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

/// A resolved, connectable endpoint for a service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointHandle {
    /// The service this handle reaches.
    pub svc_uuid: SvcUuid,

    /// Transport address of the service.
    pub addr: String,

    /// Incarnation of the service at this address. A restarted service
    /// comes back with a higher incarnation.
    pub incarnation: u64,
}

/// Maps service ids to connectable endpoints.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait EndpointDirectory: 'static + Send + Sync + std::fmt::Debug {
    /// Resolve a service to an endpoint handle. Unknown or unreachable
    /// services produce an [SvcError::Invocation].
    fn resolve(&self, svc_uuid: &SvcUuid) -> SvcResult<EndpointHandle>;

    /// Called after a send to this service failed locally. Directories
    /// that track liveness should mark the service down.
    fn mark_down(&self, svc_uuid: &SvcUuid) {
        let _ = svc_uuid;
    }
}

/// Trait-object [EndpointDirectory].
pub type DynEndpointDirectory = Arc<dyn EndpointDirectory>;

/// Supplies the ordered candidate list for failover and quorum requests.
pub trait EpIdProvider: 'static + Send + Sync + std::fmt::Debug {
    /// The candidates, primary first.
    fn candidates(&self) -> Vec<SvcUuid>;
}

/// Trait-object [EpIdProvider].
pub type DynEpIdProvider = Arc<dyn EpIdProvider>;

/// An [EpIdProvider] over a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticEpIdProvider(pub Vec<SvcUuid>);

impl StaticEpIdProvider {
    /// Construct a trait-object provider over a fixed list.
    pub fn create(candidates: Vec<SvcUuid>) -> DynEpIdProvider {
        Arc::new(Self(candidates))
    }
}

impl EpIdProvider for StaticEpIdProvider {
    fn candidates(&self) -> Vec<SvcUuid> {
        self.0.clone()
    }
}

/// Optional placement check applied to every outbound request before it
/// is sent. A rejection completes the request with an invocation error.
pub trait RouteValidator: 'static + Send + Sync + std::fmt::Debug {
    /// Check that this envelope may be sent to its destination.
    fn validate(&self, envelope: &Envelope) -> SvcResult<()>;
}

/// Trait-object [RouteValidator].
pub type DynRouteValidator = Arc<dyn RouteValidator>;
