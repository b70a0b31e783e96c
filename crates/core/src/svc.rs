//! The asynchronous request subsystem.
//!
//! - [SvcRequestPool] creates and registers requests: [EpSvcRequest] for a
//!   single destination, [FailoverSvcRequest] for ordered failover and
//!   [QuorumSvcRequest] for broadcast with a success threshold.
//! - [SvcDispatcher] routes inbound requests to [MsgHandler]s and inbound
//!   responses to the requests waiting for them.
//! - [SvcMgr] wires both to one shared registry and set of worker pools.
//!
//! [MsgHandler]: svcnet_api::handler::MsgHandler

mod ctx;

mod counters;
pub use counters::*;

mod request;
pub use request::RequestState;

mod request_tracker;
pub use request_tracker::*;

mod ep_request;
pub use ep_request::*;

mod failover_request;
pub use failover_request::*;

mod quorum_request;
pub use quorum_request::*;

pub mod request_pool;
pub use request_pool::SvcRequestPool;

mod task_pool;
pub use task_pool::*;

mod serial_executor;
pub use serial_executor::*;

mod dispatcher;
pub use dispatcher::*;

pub mod mem_directory;
pub use mem_directory::MemEndpointDirectory;

mod mem_transport;
pub use mem_transport::*;

mod svc_mgr;
pub use svc_mgr::*;

#[cfg(test)]
pub(crate) mod test_support;
