//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general svcnet builder.
/// This contains both configuration and the collaborator instances
/// a service manager is constructed from.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the builder.
    pub config: config::Config,

    /// The id of the local service. Used as `src` of outbound requests.
    pub self_uuid: SvcUuid,

    /// The [endpoint::EndpointDirectory] used to resolve destinations.
    pub directory: endpoint::DynEndpointDirectory,

    /// The [transport::Transport] outbound frames are sent over.
    pub transport: transport::DynTransport,

    /// Optional [endpoint::RouteValidator] applied to outbound requests.
    pub route_validator: Option<endpoint::DynRouteValidator>,
}

impl Builder {
    /// Set a module config before freezing the builder.
    pub fn with_module_config<M: config::ModConfig>(
        mut self,
        config: &M,
    ) -> SvcResult<Self> {
        self.config.set_module_config(config)?;
        Ok(self)
    }

    /// Set a route validator before freezing the builder.
    pub fn with_route_validator(
        mut self,
        route_validator: endpoint::DynRouteValidator,
    ) -> Self {
        self.route_validator = Some(route_validator);
        self
    }

    /// Freeze this builder.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}
