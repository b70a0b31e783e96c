//! Svcnet transport related types.
//!
//! The transport only moves frames. It gives no delivery guarantee: a send
//! either fails locally right away, or succeeds and the frame may or may
//! not arrive. Timeouts on the request side cover the rest.

use crate::*;
use std::sync::Arc;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

/// Sends frames to resolved endpoints.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait Transport: 'static + Send + Sync + std::fmt::Debug {
    /// Send a frame to an endpoint.
    ///
    /// An error return means the frame was not handed off. `Ok` means
    /// only that the transport accepted it.
    fn send(
        &self,
        handle: endpoint::EndpointHandle,
        frame: SvcFrame,
    ) -> BoxFut<'_, SvcResult<()>>;
}

/// Trait-object [Transport].
pub type DynTransport = Arc<dyn Transport>;

/// Receives inbound frames from a transport.
pub trait TxHandler: 'static + Send + Sync + std::fmt::Debug {
    /// Encoded [SvcFrame] data arrived. An error means the data could not
    /// be decoded or routed.
    fn recv_data(&self, data: bytes::Bytes) -> SvcResult<()>;
}

/// Trait-object [TxHandler].
pub type DynTxHandler = Arc<dyn TxHandler>;
