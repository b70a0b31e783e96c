use crate::svc::request_pool::config::SvcRequestPoolConfig;
use crate::svc::test_support::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svcnet_api::{handler::*, request::SvcRequest, transport::TxHandler, *};
use svcnet_test_utils::handler::{EchoHandler, FailHandler};
use svcnet_test_utils::iter_check;

fn inbound(
    request_id: u64,
    msg_type_id: MsgTypeId,
    payload: &'static [u8],
) -> Envelope {
    Envelope::new_request(
        RequestId(request_id),
        msg_type_id,
        SVC_A,
        SELF,
        bytes::Bytes::from_static(payload),
    )
}

/// Records the payloads it handles, never replies.
#[derive(Debug, Default)]
struct RecordingHandler(Mutex<Vec<bytes::Bytes>>);

impl RecordingHandler {
    fn seen(&self) -> Vec<bytes::Bytes> {
        self.0.lock().unwrap().clone()
    }
}

impl MsgHandler for RecordingHandler {
    fn handle_request(
        &self,
        envelope: Envelope,
    ) -> BoxFut<'_, SvcResult<Option<Reply>>> {
        self.0.lock().unwrap().push(envelope.payload);
        Box::pin(async { Ok(None) })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_reply_is_sent_back() {
    let svc = TestSvc::create();
    let echo = EchoHandler::create(MSG_PUT_RESP);
    svc.mgr.dispatcher().register_handler(MSG_PUT, echo.clone());

    svc.mgr.dispatcher().recv_request(inbound(5, MSG_PUT, b"hello"));

    svc.wait_sent(1).await;
    let frame = &svc.sent_frames()[0];
    assert_eq!(FrameTy::Response, frame.ty());

    let env = frame.envelope.clone().unwrap();
    assert_eq!(RequestId(5), env.request_id());
    assert_eq!(MSG_PUT_RESP, env.msg_type());
    assert_eq!(SELF, env.src_uuid());
    assert_eq!(SVC_A, env.dst_uuid());
    assert_eq!(status::OK, env.status);
    assert_eq!(&b"hello"[..], &env.payload[..]);
    assert_eq!(1, echo.calls());
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_error_is_sent_back_with_status() {
    let svc = TestSvc::create();
    svc.mgr
        .dispatcher()
        .register_handler(MSG_PUT, FailHandler::create(77));

    svc.mgr.dispatcher().recv_request(inbound(6, MSG_PUT, b"bad"));

    let sent = svc.wait_sent(1).await;
    assert_eq!(RequestId(6), sent[0].request_id());
    assert_eq!(77, sent[0].status);
    assert!(matches!(
        sent[0].clone().into_result(),
        Err(SvcError::Remote { status: 77, .. })
    ));
}

/// Fails the way a handler whose own downstream request failed would.
#[derive(Debug)]
struct DownstreamFailHandler(SvcError);

impl MsgHandler for DownstreamFailHandler {
    fn handle_request(
        &self,
        _envelope: Envelope,
    ) -> BoxFut<'_, SvcResult<Option<Reply>>> {
        let err = self.0.clone();
        Box::pin(async move { Err(err) })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn local_handler_errors_are_sent_as_handler_failed() {
    let svc = TestSvc::create();
    svc.mgr.dispatcher().register_handler(
        MSG_PUT,
        Arc::new(DownstreamFailHandler(SvcError::Timeout)),
    );
    svc.mgr.dispatcher().register_handler(
        MSG_PUT_RESP,
        Arc::new(DownstreamFailHandler(SvcError::invocation("no route"))),
    );

    svc.mgr.dispatcher().recv_request(inbound(20, MSG_PUT, b""));
    svc.mgr.dispatcher().recv_request(inbound(21, MSG_PUT_RESP, b""));

    let sent = svc.wait_sent(2).await;
    for env in sent.iter() {
        assert_eq!(status::HANDLER_FAILED, env.status);
    }
    let no_route = sent
        .iter()
        .find(|env| env.request_id() == RequestId(21))
        .unwrap();
    assert!(String::from_utf8_lossy(&no_route.payload).contains("no route"));
}

#[tokio::test(flavor = "multi_thread")]
async fn no_reply_to_untracked_request() {
    let svc = TestSvc::create();
    let echo = EchoHandler::create(MSG_PUT_RESP);
    svc.mgr.dispatcher().register_handler(MSG_PUT, echo.clone());

    svc.mgr.dispatcher().recv_request(inbound(0, MSG_PUT, b"fyi"));

    iter_check!(1000, {
        if echo.calls() == 1 {
            break;
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(svc.sent_frames().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_message_type_is_dropped() {
    let svc = TestSvc::create();

    svc.mgr.dispatcher().recv_request(inbound(7, MsgTypeId(99), b""));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(1, svc.pool().counters().snapshot().unknown_msg_types);
    assert!(svc.sent_frames().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
#[should_panic(expected = "already registered")]
async fn duplicate_registration_panics() {
    let svc = TestSvc::create();
    let dispatcher = svc.mgr.dispatcher();
    dispatcher.register_handler(MSG_PUT, EchoHandler::create(MSG_PUT_RESP));
    dispatcher.register_handler(MSG_PUT, EchoHandler::create(MSG_PUT_RESP));
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_requests_drain_in_order() {
    let svc = TestSvc::create_with(
        &[SVC_A],
        SvcRequestPoolConfig {
            work_worker_count: 1,
            ..Default::default()
        },
        false,
    );
    let recorder = Arc::new(RecordingHandler::default());
    svc.mgr.dispatcher().register_handler(MSG_PUT, recorder.clone());

    svc.mgr.dispatcher().defer_requests(true);
    for (id, payload) in [(1, &b"1"[..]), (2, b"2"), (3, b"3")] {
        svc.mgr.dispatcher().recv_request(inbound(id, MSG_PUT, payload));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(recorder.seen().is_empty());

    svc.mgr.dispatcher().defer_requests(false);

    iter_check!(1000, {
        if recorder.seen().len() == 3 {
            break;
        }
    });
    assert_eq!(
        vec![
            bytes::Bytes::from_static(b"1"),
            bytes::Bytes::from_static(b"2"),
            bytes::Bytes::from_static(b"3"),
        ],
        recorder.seen(),
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn response_for_unknown_id_is_dropped() {
    let svc = TestSvc::create();

    svc.respond(&inbound(12345, MSG_PUT, b"").swap(), status::OK, b"");

    iter_check!(1000, {
        if svc.pool().counters().snapshot().late_responses == 1 {
            break;
        }
    });
}

/// Records how many response handlers run at once, for itself and
/// across every instance sharing `global`.
#[derive(Debug)]
struct ConcurrencyRecorder {
    id: RequestId,
    running: AtomicUsize,
    max_running: AtomicUsize,
    handled: AtomicUsize,
    global: Arc<(AtomicUsize, AtomicUsize)>,
}

impl ConcurrencyRecorder {
    fn new(id: u64, global: Arc<(AtomicUsize, AtomicUsize)>) -> Arc<Self> {
        Arc::new(Self {
            id: RequestId(id),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            handled: AtomicUsize::new(0),
            global,
        })
    }
}

impl SvcRequest for ConcurrencyRecorder {
    fn id(&self) -> RequestId {
        self.id
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn invoke(&self) {}

    fn handle_local_error(&self, envelope: Envelope) {
        self.handle_response(envelope);
    }

    fn handle_response(&self, _envelope: Envelope) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let now = self.global.0.fetch_add(1, Ordering::SeqCst) + 1;
        self.global.1.fetch_max(now, Ordering::SeqCst);

        std::thread::sleep(Duration::from_millis(20));

        self.global.0.fetch_sub(1, Ordering::SeqCst);
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.handled.fetch_add(1, Ordering::SeqCst);
    }

    fn is_complete(&self) -> bool {
        false
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn responses_serialized_per_request_id() {
    let svc = TestSvc::create();

    let global = Arc::new((AtomicUsize::new(0), AtomicUsize::new(0)));
    let p1 = ConcurrencyRecorder::new(1000, global.clone());
    let p2 = ConcurrencyRecorder::new(1001, global.clone());
    svc.pool().tracker().register(p1.id, p1.clone()).unwrap();
    svc.pool().tracker().register(p2.id, p2.clone()).unwrap();

    for _ in 0..5 {
        for recorder in [&p1, &p2] {
            let request = inbound(recorder.id.0, MSG_PUT, b"").swap();
            svc.respond(&request, status::OK, b"");
        }
    }

    iter_check!(5000, {
        if p1.handled.load(Ordering::SeqCst) == 5
            && p2.handled.load(Ordering::SeqCst) == 5
        {
            break;
        }
    });

    assert_eq!(1, p1.max_running.load(Ordering::SeqCst));
    assert_eq!(1, p2.max_running.load(Ordering::SeqCst));

    // different ids are not serialized against each other
    assert_eq!(2, global.1.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn recv_data_routes_frames() {
    let svc = TestSvc::create();
    let echo = EchoHandler::create(MSG_PUT_RESP);
    svc.mgr.dispatcher().register_handler(MSG_PUT, echo.clone());
    let tx_handler = svc.mgr.tx_handler();

    let frame = SvcFrame::request(inbound(8, MSG_PUT, b"wire"));
    tx_handler.recv_data(frame.encode_to_bytes()).unwrap();
    let sent = svc.wait_sent(1).await;
    assert_eq!(&b"wire"[..], &sent[0].payload[..]);

    let frame = SvcFrame::response(inbound(9, MSG_PUT, b"").swap());
    tx_handler.recv_data(frame.encode_to_bytes()).unwrap();
    iter_check!(1000, {
        if svc.pool().counters().snapshot().late_responses == 1 {
            break;
        }
    });

    assert!(tx_handler
        .recv_data(bytes::Bytes::from_static(b"\xff\xff\xff"))
        .is_err());

    let no_type = SvcFrame {
        ty: FrameTy::Unspecified as i32,
        envelope: Some(inbound(10, MSG_PUT, b"")),
    };
    assert!(tx_handler.recv_data(no_type.encode_to_bytes()).is_err());

    let no_envelope = SvcFrame {
        ty: FrameTy::Request as i32,
        envelope: None,
    };
    assert!(tx_handler.recv_data(no_envelope.encode_to_bytes()).is_err());
}
