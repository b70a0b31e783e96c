//! An in-process [Transport] for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use svcnet_api::{endpoint::EndpointHandle, transport::*, *};

/// Address book shared by every [MemTransport] of one in-process network.
#[derive(Debug, Default)]
pub struct MemNetwork {
    con_map: Mutex<HashMap<String, Weak<dyn TxHandler>>>,
}

impl MemNetwork {
    /// Construct an empty network.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver frames for `addr` to `handler`. The network only holds a
    /// weak reference, so a dropped handler stops receiving.
    pub fn bind(&self, addr: impl Into<String>, handler: &DynTxHandler) {
        self.con_map
            .lock()
            .unwrap()
            .insert(addr.into(), Arc::downgrade(handler));
    }

    /// Stop delivering frames for `addr`.
    pub fn unbind(&self, addr: &str) {
        self.con_map.lock().unwrap().remove(addr);
    }

    fn lookup(&self, addr: &str) -> Option<DynTxHandler> {
        self.con_map.lock().unwrap().get(addr).and_then(Weak::upgrade)
    }
}

/// Sends frames over a [MemNetwork].
///
/// Frames are encoded like on a real wire and delivered on a spawned task,
/// so a successful send says nothing about delivery.
#[derive(Debug)]
pub struct MemTransport {
    net: Arc<MemNetwork>,
}

impl MemTransport {
    /// Construct a transport over a network.
    pub fn create(net: Arc<MemNetwork>) -> DynTransport {
        let out: DynTransport = Arc::new(Self { net });
        out
    }
}

impl Transport for MemTransport {
    fn send(
        &self,
        handle: EndpointHandle,
        frame: SvcFrame,
    ) -> BoxFut<'_, SvcResult<()>> {
        Box::pin(async move {
            let handler = self.net.lookup(&handle.addr).ok_or_else(|| {
                SvcError::other(format!("no listener at {}", handle.addr))
            })?;

            let data = frame.encode_to_bytes();
            tokio::task::spawn(async move {
                if let Err(err) = handler.recv_data(data) {
                    tracing::warn!(?err, "dropping undeliverable frame");
                }
            });

            Ok(())
        })
    }
}
