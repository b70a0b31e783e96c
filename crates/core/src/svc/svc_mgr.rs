use super::ctx::SvcCtx;
use super::dispatcher::SvcDispatcher;
use super::request_pool::{config::SvcRequestPoolModConfig, SvcRequestPool};
use std::sync::Arc;
use svcnet_api::{builder::Builder, transport::DynTxHandler, *};

/// One service's view of the request subsystem: the request factory and
/// the inbound dispatcher, sharing one registry, one set of pools and one
/// set of counters.
#[derive(Debug)]
pub struct SvcMgr {
    request_pool: SvcRequestPool,
    dispatcher: Arc<SvcDispatcher>,
}

impl SvcMgr {
    /// Construct from a frozen builder. Must be called from within a
    /// tokio runtime.
    pub fn create(builder: Arc<Builder>) -> SvcResult<Arc<Self>> {
        let config: SvcRequestPoolModConfig =
            builder.config.get_module_config()?;
        let ctx = SvcCtx::new(&builder, &config.svc_request_pool);

        tracing::debug!(
            self_uuid = %ctx.self_uuid,
            ?config,
            "starting service manager",
        );

        Ok(Arc::new(Self {
            request_pool: SvcRequestPool::new(ctx.clone()),
            dispatcher: Arc::new(SvcDispatcher::new(ctx)),
        }))
    }

    /// The request factory.
    pub fn request_pool(&self) -> &SvcRequestPool {
        &self.request_pool
    }

    /// The inbound dispatcher.
    pub fn dispatcher(&self) -> &Arc<SvcDispatcher> {
        &self.dispatcher
    }

    /// The dispatcher as a transport inbound handler.
    pub fn tx_handler(&self) -> DynTxHandler {
        self.dispatcher.clone()
    }

    /// The id of the local service.
    pub fn self_uuid(&self) -> &SvcUuid {
        self.request_pool.self_uuid()
    }
}
