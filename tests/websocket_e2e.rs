//! WebSocket End-to-End Tests - Local Feed Server
//!
//! Runs the full app wiring against an in-process tokio-tungstenite
//! server: subscribe message shape, verbatim frame delivery, malformed
//! frame containment and shutdown while streaming.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use md_feed_handler::adapters::feeds::tls;
use md_feed_handler::adapters::sinks::BroadcastSink;
use md_feed_handler::app::{self, EXIT_OK};
use md_feed_handler::config::AppConfig;
use md_feed_handler::config::loader::{parse_config, validate_config};
use md_feed_handler::domain::frame::FrameCategory;
use md_feed_handler::domain::lifecycle::SessionState;
use md_feed_handler::usecases::classifier::HandlerTable;
use md_feed_handler::usecases::feed_session::CloseCause;
use md_feed_handler::usecases::shutdown::ShutdownCoordinator;

const TICKER: &str = r#"{"type":"ticker","product_id":"BTC-USD"}"#;
const TIMEOUT: Duration = Duration::from_secs(10);

fn ws_config(uri: &str) -> AppConfig {
    let config = parse_config(&format!(
        "[feed]\ntransport = \"websocket\"\n\n[coinbase]\nsocket_connection_uri = \"{uri}\"\n"
    ))
    .unwrap();
    validate_config(&config).unwrap();
    config
}

fn handlers(sink: &BroadcastSink) -> HandlerTable {
    HandlerTable::new().route(FrameCategory::Message, Arc::new(sink.clone()))
}

#[tokio::test]
async fn test_subscribe_stream_and_remote_close() {
    tls::install_crypto_provider();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("ws://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();

        let subscribe = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => text,
            other => panic!("expected text subscribe, got {other:?}"),
        };
        ws.send(Message::Text("{not json".into())).await.unwrap();
        ws.send(Message::Text(TICKER.into())).await.unwrap();
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
        subscribe
    });

    let config = ws_config(&uri);
    let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
    let sink = BroadcastSink::new();
    let mut events = sink.subscribe();

    let result = tokio::time::timeout(
        TIMEOUT,
        app::run_with_handlers(&config, &coordinator, handlers(&sink)),
    )
    .await
    .expect("session should finish");

    let subscribe = server.await.unwrap();
    let subscribe: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(
        subscribe,
        serde_json::json!({
            "type": "subscribe",
            "channels": [{"name": "ticker", "product_ids": ["BTC-USD"]}]
        })
    );

    let event = events.try_recv().unwrap();
    assert_eq!(event.raw, TICKER);
    assert_eq!(event.category, FrameCategory::Message);
    assert!(events.try_recv().is_err(), "malformed frame must be discarded");

    assert_eq!(app::exit_status(&result), EXIT_OK);
    let report = result.unwrap();
    assert_eq!(report.final_state, SessionState::Closed);
    assert!(matches!(report.cause, CloseCause::Remote(_)));
}

#[tokio::test]
async fn test_shutdown_while_streaming_exits_zero() {
    tls::install_crypto_provider();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("ws://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let _subscribe = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(TICKER.into())).await.unwrap();

        // Hold the stream open until the client closes it.
        let mut saw_close = false;
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                saw_close = true;
            }
        }
        saw_close
    });

    let config = ws_config(&uri);
    let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
    let sink = BroadcastSink::new();
    let mut events = sink.subscribe();
    let flag = coordinator.flag();

    let stop_after_first_frame = async move {
        let event = events.recv().await.unwrap();
        assert_eq!(event.raw, TICKER);
        assert!(flag.request_stop());
    };

    let (result, ()) = tokio::time::timeout(
        TIMEOUT,
        async {
            tokio::join!(
                app::run_with_handlers(&config, &coordinator, handlers(&sink)),
                stop_after_first_frame,
            )
        },
    )
    .await
    .expect("session should stop");

    assert!(server.await.unwrap(), "client should send a close frame");
    assert_eq!(app::exit_status(&result), EXIT_OK);
    let report = result.unwrap();
    assert_eq!(report.cause, CloseCause::ShutdownRequested);
    assert_eq!(
        &report.history[report.history.len() - 3..],
        &[SessionState::Streaming, SessionState::Closing, SessionState::Closed]
    );
}
