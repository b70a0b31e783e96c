//! Fixtures shared by the request subsystem unit tests.

use super::mem_directory::SvcInfo;
use super::request_pool::config::*;
use super::*;
use std::sync::{Arc, Mutex};
use svcnet_api::{endpoint::*, transport::*, *};
use svcnet_test_utils::iter_check;

pub(crate) const SELF: SvcUuid = SvcUuid::from_static(b"self");
pub(crate) const SVC_A: SvcUuid = SvcUuid::from_static(b"svc-a");
pub(crate) const SVC_B: SvcUuid = SvcUuid::from_static(b"svc-b");
pub(crate) const SVC_C: SvcUuid = SvcUuid::from_static(b"svc-c");
pub(crate) const SVC_UNKNOWN: SvcUuid = SvcUuid::from_static(b"svc-?");

pub(crate) const MSG_PUT: MsgTypeId = MsgTypeId(10);
pub(crate) const MSG_PUT_RESP: MsgTypeId = MsgTypeId(11);

type SentFrames = Arc<Mutex<Vec<(EndpointHandle, SvcFrame)>>>;

/// A service manager whose transport records every frame instead of
/// delivering it. Tests play the remote side by injecting responses.
pub(crate) struct TestSvc {
    pub mgr: Arc<SvcMgr>,
    pub directory: Arc<MemEndpointDirectory>,
    pub sent: SentFrames,
}

impl TestSvc {
    /// SVC_A, SVC_B and SVC_C resolvable, default config.
    pub fn create() -> Self {
        Self::create_with(&[SVC_A, SVC_B, SVC_C], Default::default(), false)
    }

    pub fn create_with(
        known: &[SvcUuid],
        config: SvcRequestPoolConfig,
        faulty_transport: bool,
    ) -> Self {
        Self::create_inner(known, config, faulty_transport, None)
    }

    /// Like [TestSvc::create], with outbound requests checked by
    /// `route_validator`.
    pub fn create_with_validator(route_validator: DynRouteValidator) -> Self {
        Self::create_inner(
            &[SVC_A, SVC_B, SVC_C],
            Default::default(),
            false,
            Some(route_validator),
        )
    }

    fn create_inner(
        known: &[SvcUuid],
        config: SvcRequestPoolConfig,
        faulty_transport: bool,
        route_validator: Option<DynRouteValidator>,
    ) -> Self {
        svcnet_test_utils::enable_tracing();

        let directory = MemEndpointDirectory::create();
        directory.update_svc_map(
            known
                .iter()
                .map(|svc| SvcInfo::active(svc.clone(), svc.to_string(), 1))
                .collect(),
        );

        let sent = SentFrames::default();
        let transport = make_mock_transport(sent.clone(), faulty_transport);

        let mut builder = crate::default_builder(
            SELF,
            directory.clone(),
            transport,
        )
        .unwrap()
        .with_module_config(&SvcRequestPoolModConfig {
            svc_request_pool: config,
        })
        .unwrap();
        if let Some(route_validator) = route_validator {
            builder = builder.with_route_validator(route_validator);
        }
        let builder = builder.build();

        Self {
            mgr: SvcMgr::create(builder).unwrap(),
            directory,
            sent,
        }
    }

    pub fn pool(&self) -> &SvcRequestPool {
        self.mgr.request_pool()
    }

    pub fn sent_frames(&self) -> Vec<SvcFrame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent_frames()
            .into_iter()
            .map(|frame| frame.envelope.unwrap())
            .collect()
    }

    /// Wait until at least `count` frames went out, return their envelopes.
    pub async fn wait_sent(&self, count: usize) -> Vec<Envelope> {
        iter_check!(1000, {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
        });
        self.sent_envelopes()
    }

    /// The sent request envelope addressed to `dst`.
    pub fn sent_to(&self, dst: &SvcUuid) -> Envelope {
        self.sent_envelopes()
            .into_iter()
            .find(|env| env.dst_uuid() == *dst)
            .unwrap_or_else(|| panic!("nothing sent to {dst}"))
    }

    /// Deliver the peer's response to `request` through the dispatcher.
    pub fn respond(&self, request: &Envelope, status: i32, payload: &[u8]) {
        let mut response = request.swap();
        response.status = status;
        response.payload = bytes::Bytes::copy_from_slice(payload);
        self.mgr.dispatcher().recv_response(response);
    }
}

fn make_mock_transport(sent: SentFrames, faulty: bool) -> DynTransport {
    let mut mock_transport = MockTransport::new();
    mock_transport.expect_send().returning(move |handle, frame| {
        sent.lock().unwrap().push((handle, frame));
        Box::pin(async move {
            if faulty {
                Err(SvcError::other("connection refused"))
            } else {
                Ok(())
            }
        })
    });
    Arc::new(mock_transport)
}

/// Wait for a completion future, failing the test if it takes too long.
pub(crate) async fn wait_completion(
    fut: BoxFut<'static, SvcResult<Envelope>>,
) -> SvcResult<Envelope> {
    tokio::time::timeout(std::time::Duration::from_secs(2), fut)
        .await
        .expect("request did not complete")
}
