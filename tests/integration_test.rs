//! Integration Tests - Feed Session Lifecycle with a Mock Transport
//!
//! Drives `FeedSession` through a mockall transport and checks the
//! lifecycle order, the one-shot subscription, shutdown and failures.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use mockall::mock;

use md_feed_handler::adapters::metrics::FeedMetrics;
use md_feed_handler::domain::credentials::CredentialInjector;
use md_feed_handler::domain::error::FeedError;
use md_feed_handler::domain::fix_message::{FixMessage, msg_type, tags};
use md_feed_handler::domain::frame::{FrameCategory, InboundFrame, SessionId};
use md_feed_handler::domain::identity::Identity;
use md_feed_handler::domain::lifecycle::SessionState;
use md_feed_handler::domain::subscription::SubscriptionRequest;
use md_feed_handler::ports::event_sink::{EventSink, FeedEvent};
use md_feed_handler::ports::transport::{FeedTransport, TransportEvent, TransportKind};
use md_feed_handler::usecases::classifier::{HandlerTable, MessageClassifier};
use md_feed_handler::usecases::feed_session::{CloseCause, FeedSession};
use md_feed_handler::usecases::shutdown::ShutdownFlag;

// ---- Mock Definitions ----

mock! {
    pub Transport {}

    #[async_trait::async_trait]
    impl FeedTransport for Transport {
        fn kind(&self) -> TransportKind;
        async fn connect(&mut self, session: SessionId) -> Result<(), FeedError>;
        async fn authenticate(
            &mut self,
            injector: &CredentialInjector,
        ) -> Result<Vec<InboundFrame>, FeedError>;
        async fn send_subscription(
            &mut self,
            request: &SubscriptionRequest,
        ) -> Result<(), FeedError>;
        async fn next_event(&mut self) -> Result<TransportEvent, FeedError>;
        async fn close(&mut self) -> Result<(), FeedError>;
    }
}

#[derive(Default)]
struct Collect(Mutex<Vec<FeedEvent>>);

impl Collect {
    fn categories(&self) -> Vec<FrameCategory> {
        self.0.lock().unwrap().iter().map(|e| e.category).collect()
    }

    fn raws(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|e| e.raw.clone()).collect()
    }
}

impl EventSink for Collect {
    fn emit(&self, event: FeedEvent) {
        self.0.lock().unwrap().push(event);
    }
}

// ---- Helpers ----

const FULL_LIFECYCLE: [SessionState; 7] = [
    SessionState::Idle,
    SessionState::Connecting,
    SessionState::Authenticating,
    SessionState::Subscribing,
    SessionState::Streaming,
    SessionState::Closing,
    SessionState::Closed,
];

fn ticker() -> SubscriptionRequest {
    SubscriptionRequest::new("ticker", vec!["BTC-USD".to_string()]).unwrap()
}

fn base_mock() -> MockTransport {
    let mut transport = MockTransport::new();
    transport.expect_kind().return_const(TransportKind::Websocket);
    transport
}

fn session(
    transport: MockTransport,
    flag: ShutdownFlag,
    identity: Option<Identity>,
) -> (FeedSession<MockTransport>, Arc<Collect>, Arc<FeedMetrics>) {
    let sink = Arc::new(Collect::default());
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    let table = HandlerTable::new()
        .route(FrameCategory::Admin, sink.clone())
        .route(FrameCategory::App, sink.clone())
        .route(FrameCategory::Message, sink.clone());
    let classifier = MessageClassifier::new(table, Arc::clone(&metrics));
    let session = FeedSession::new(
        transport,
        identity,
        ticker(),
        classifier,
        flag,
        Arc::clone(&metrics),
    );
    (session, sink, metrics)
}

fn scripted_events(
    transport: &mut MockTransport,
    events: Vec<Result<TransportEvent, FeedError>>,
) {
    let mut queue = VecDeque::from(events);
    transport.expect_next_event().returning(move || {
        queue.pop_front().unwrap_or_else(|| {
            Ok(TransportEvent::Closed {
                reason: "script exhausted".to_string(),
            })
        })
    });
}

// ---- Lifecycle ----

#[tokio::test]
async fn test_remote_close_walks_full_lifecycle() {
    let mut transport = base_mock();
    transport.expect_connect().times(1).returning(|_| Ok(()));
    transport
        .expect_authenticate()
        .times(1)
        .returning(|_| Ok(Vec::new()));
    transport
        .expect_send_subscription()
        .times(1)
        .returning(|_| Ok(()));
    scripted_events(
        &mut transport,
        vec![
            Ok(TransportEvent::Frame(InboundFrame::text(
                r#"{"type":"ticker","product_id":"BTC-USD"}"#,
                SessionId::nil(),
            ))),
            Ok(TransportEvent::Closed {
                reason: "bye".to_string(),
            }),
        ],
    );
    transport.expect_close().times(1).returning(|| Ok(()));

    let (session, sink, metrics) = session(transport, ShutdownFlag::new(), None);
    let report = session.run().await.unwrap();

    assert_eq!(report.final_state, SessionState::Closed);
    assert_eq!(report.history, FULL_LIFECYCLE.to_vec());
    assert_eq!(report.cause, CloseCause::Remote("bye".to_string()));
    assert_eq!(
        sink.raws(),
        vec![r#"{"type":"ticker","product_id":"BTC-USD"}"#.to_string()]
    );
    assert_eq!(metrics.subscriptions_sent.get(), 1);
    assert_eq!(metrics.dispatched(FrameCategory::Message), 1);
}

#[tokio::test]
async fn test_shutdown_while_streaming_closes_cleanly() {
    let flag = ShutdownFlag::new();
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport.expect_authenticate().returning(|_| Ok(Vec::new()));
    let stopper = flag.clone();
    transport.expect_send_subscription().times(1).returning(move |_| {
        stopper.request_stop();
        Ok(())
    });
    transport.expect_next_event().times(0);
    transport.expect_close().times(1).returning(|| Ok(()));

    let (session, _sink, _metrics) = session(transport, flag, None);
    let report = session.run().await.unwrap();

    assert_eq!(report.cause, CloseCause::ShutdownRequested);
    assert_eq!(report.history, FULL_LIFECYCLE.to_vec());
}

#[tokio::test]
async fn test_close_failure_still_reaches_closed() {
    let flag = ShutdownFlag::new();
    flag.request_stop();
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport.expect_authenticate().returning(|_| Ok(Vec::new()));
    transport.expect_send_subscription().returning(|_| Ok(()));
    transport
        .expect_close()
        .times(1)
        .returning(|| Err(FeedError::Transport("reset by peer".to_string())));

    let (session, _sink, _metrics) = session(transport, flag, None);
    let report = session.run().await.unwrap();
    assert_eq!(report.final_state, SessionState::Closed);
}

// ---- Failures ----

#[tokio::test]
async fn test_connect_failure_is_errored() {
    let mut transport = base_mock();
    transport
        .expect_connect()
        .times(1)
        .returning(|_| Err(FeedError::ConnectionInit("refused".to_string())));
    transport.expect_authenticate().times(0);
    transport.expect_send_subscription().times(0);

    let (session, _sink, metrics) = session(transport, ShutdownFlag::new(), None);
    let state = session.watch_state();
    let err = session.run().await.unwrap_err();

    assert!(matches!(err, FeedError::ConnectionInit(_)));
    assert_eq!(*state.borrow(), SessionState::Errored);
    assert_eq!(metrics.lifecycle_state.get(), SessionState::Errored.code());
}

#[tokio::test]
async fn test_subscription_failure_is_errored() {
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport.expect_authenticate().returning(|_| Ok(Vec::new()));
    transport
        .expect_send_subscription()
        .times(1)
        .returning(|_| Err(FeedError::SubscriptionSend("broken pipe".to_string())));
    transport.expect_next_event().times(0);

    let (session, _sink, metrics) = session(transport, ShutdownFlag::new(), None);
    let state = session.watch_state();
    assert!(matches!(
        session.run().await,
        Err(FeedError::SubscriptionSend(_))
    ));
    assert_eq!(*state.borrow(), SessionState::Errored);
    assert_eq!(metrics.subscriptions_sent.get(), 0);
}

#[tokio::test]
async fn test_transport_error_while_streaming_is_errored() {
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport.expect_authenticate().returning(|_| Ok(Vec::new()));
    transport.expect_send_subscription().returning(|_| Ok(()));
    scripted_events(
        &mut transport,
        vec![Err(FeedError::Transport("connection reset".to_string()))],
    );
    transport.expect_close().times(0);

    let (session, _sink, _metrics) = session(transport, ShutdownFlag::new(), None);
    let state = session.watch_state();
    assert!(session.run().await.is_err());
    assert_eq!(*state.borrow(), SessionState::Errored);
}

#[tokio::test]
async fn test_logon_rejected_is_errored() {
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport
        .expect_authenticate()
        .returning(|_| Err(FeedError::LogonRejected("bad password".to_string())));
    transport.expect_send_subscription().times(0);

    let (session, _sink, _metrics) = session(transport, ShutdownFlag::new(), None);
    assert!(matches!(
        session.run().await,
        Err(FeedError::LogonRejected(reason)) if reason == "bad password"
    ));
}

// ---- Credentials and classification ----

#[tokio::test]
async fn test_injector_carries_identity_to_transport() {
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport.expect_authenticate().times(1).returning(|injector| {
        let mut logon = FixMessage::new(msg_type::LOGON);
        assert!(injector.decorate(&mut logon));
        assert_eq!(logon.get(tags::USERNAME), Some("api-key"));
        assert_eq!(logon.get(tags::PASSWORD), Some("passphrase"));
        Ok(Vec::new())
    });
    transport.expect_send_subscription().returning(|_| Ok(()));
    scripted_events(&mut transport, Vec::new());
    transport.expect_close().returning(|| Ok(()));

    let identity = Identity::new("api-key", "passphrase");
    let (session, _sink, _metrics) = session(transport, ShutdownFlag::new(), Some(identity));
    session.run().await.unwrap();
}

#[tokio::test]
async fn test_handshake_admin_frames_dispatched_app_frames_gated() {
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport.expect_authenticate().returning(|_| {
        Ok(vec![
            InboundFrame::fix(FixMessage::new(msg_type::LOGON), SessionId::nil()),
            InboundFrame::fix(FixMessage::new("W"), SessionId::nil()),
        ])
    });
    transport.expect_send_subscription().returning(|_| Ok(()));
    scripted_events(
        &mut transport,
        vec![Ok(TransportEvent::Frame(InboundFrame::fix(
            FixMessage::new("W"),
            SessionId::nil(),
        )))],
    );
    transport.expect_close().returning(|| Ok(()));

    let (session, sink, metrics) = session(transport, ShutdownFlag::new(), None);
    session.run().await.unwrap();

    assert_eq!(sink.categories(), vec![FrameCategory::Admin, FrameCategory::App]);
    assert_eq!(metrics.discarded("not_streaming"), 1);
}

#[tokio::test]
async fn test_malformed_frame_does_not_end_session() {
    let mut transport = base_mock();
    transport.expect_connect().returning(|_| Ok(()));
    transport.expect_authenticate().returning(|_| Ok(Vec::new()));
    transport.expect_send_subscription().returning(|_| Ok(()));
    scripted_events(
        &mut transport,
        vec![
            Ok(TransportEvent::Frame(InboundFrame::text("{not json", SessionId::nil()))),
            Ok(TransportEvent::Frame(InboundFrame::text(r#"{"ok":true}"#, SessionId::nil()))),
        ],
    );
    transport.expect_close().returning(|| Ok(()));

    let (session, sink, metrics) = session(transport, ShutdownFlag::new(), None);
    let report = session.run().await.unwrap();

    assert_eq!(report.final_state, SessionState::Closed);
    assert_eq!(sink.raws(), vec![r#"{"ok":true}"#.to_string()]);
    assert_eq!(metrics.decode_errors.get(), 1);
    assert_eq!(metrics.discarded("decode"), 1);
}
