#![deny(missing_docs)]
//! Svcnet asynchronous request subsystem and in-memory modules.

use svcnet_api::{
    builder::Builder, config::Config, endpoint::*, transport::*, *,
};

/// Construct a builder with default module configuration.
///
/// - `self_uuid` - The id of the local service.
/// - `directory` - Resolves destination services, e.g. [svc::MemEndpointDirectory].
/// - `transport` - Sends frames, e.g. [svc::MemTransport].
pub fn default_builder(
    self_uuid: SvcUuid,
    directory: DynEndpointDirectory,
    transport: DynTransport,
) -> SvcResult<Builder> {
    let mut config = Config::default();
    config.set_module_config(
        &svc::request_pool::config::SvcRequestPoolModConfig::default(),
    )?;
    Ok(Builder {
        config,
        self_uuid,
        directory,
        transport,
        route_validator: None,
    })
}

pub mod svc;
