mod common;

use axum::{Json, Router, routing::post};
use base64::Engine;
use common::{CallLog, deck_file, harness, harness_with_avatar, settings};
use presenter_agent::{
    orchestrator::{SessionEnd, SessionError},
    provider::{
        ModelCommand,
        anam::{AnamAvatar, AnamConfig},
    },
    room::{self, protocol::PeerEvent},
};
use presenter_core::{control::ChannelError, generic_types::{ModelEvent, ToolCallRequest}};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn tool_call(call_id: &str, name: &str, arguments: Value) -> ModelEvent {
    ModelEvent::ToolCall(ToolCallRequest {
        call_id: call_id.into(),
        tool_name: name.into(),
        arguments,
    })
}

async fn expect_tool_result(peer: &mut common::ModelPeer) -> (String, String, bool) {
    loop {
        if let ModelCommand::ToolResult {
            call_id,
            output,
            is_error,
            ..
        } = peer.next_command().await
        {
            return (call_id, output, is_error);
        }
    }
}

#[tokio::test]
async fn test_avatar_starts_before_model_then_greets() {
    let deck = deck_file(&["Welcome", "Agenda", "Questions"]);
    let mut h = harness(settings(deck.path()), false);
    let (room, link) = room::open("room_1", 16);
    link.ready.send_replace(true);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let mut model = h.next_model().await;

    assert_eq!(h.log.calls(), vec!["avatar.start", "model.start"]);
    assert!(model.config.instructions.contains("THE PRESENTATION HAS 3 SLIDES"));
    assert!(model.config.instructions.contains("Slide 2: Agenda"));
    let mut names: Vec<_> = model.config.tools.iter().map(|t| t.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["advance_slide", "click_element", "fill_form_field"]);

    match model.next_command().await {
        ModelCommand::GenerateReply { instructions } => {
            assert!(instructions.contains("3-slide presentation"), "{instructions}")
        }
        other => panic!("expected the greeting first, got {other:?}"),
    }

    link.closed.cancel();
    assert_eq!(session.await.unwrap().unwrap(), SessionEnd::PeerLeft);
    assert_eq!(h.log.calls().last(), Some(&"avatar.stop"));
}

#[tokio::test]
async fn test_tool_call_publishes_and_answers_the_model() {
    let deck = deck_file(&["a", "b", "c"]);
    let mut h = harness(settings(deck.path()), false);
    let (room, mut link) = room::open("room_2", 16);
    link.ready.send_replace(true);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let mut model = h.next_model().await;

    model
        .events
        .send(tool_call("call-1", "advance_slide", json!({})))
        .await
        .unwrap();
    let (call_id, output, is_error) = expect_tool_result(&mut model).await;
    assert_eq!(call_id, "call-1");
    assert_eq!(output, "Now showing slide 1 of 3.");
    assert!(!is_error);

    let envelope = link.outbound.recv().await.unwrap();
    assert_eq!(envelope.topic, "browser-control");
    assert_eq!(
        envelope.payload,
        json!({"type": "slide_change", "slide_number": 1, "image_url": "/slides/Slide1.jpg"})
    );

    // A retry inside the debounce window changes nothing.
    model
        .events
        .send(tool_call("call-2", "advance_slide", json!({})))
        .await
        .unwrap();
    let (_, output, _) = expect_tool_result(&mut model).await;
    assert_eq!(output, "already active");
    assert!(link.outbound.try_recv().is_err());

    model
        .events
        .send(tool_call(
            "call-3",
            "fill_form_field",
            json!({"field_identifier": "Email Address", "value": "a@b.com"}),
        ))
        .await
        .unwrap();
    let (_, output, _) = expect_tool_result(&mut model).await;
    assert_eq!(output, "ok");
    let envelope = link.outbound.recv().await.unwrap();
    assert_eq!(
        envelope.payload,
        json!({"type": "fill_field", "field": "Email Address", "value": "a@b.com"})
    );

    link.closed.cancel();
    assert_eq!(session.await.unwrap().unwrap(), SessionEnd::PeerLeft);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_the_model() {
    let deck = deck_file(&["a"]);
    let mut h = harness(settings(deck.path()), false);
    let (room, link) = room::open("room_3", 16);
    link.ready.send_replace(true);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let mut model = h.next_model().await;

    model
        .events
        .send(tool_call("call-9", "jump_to_slide", json!({"slide": 3})))
        .await
        .unwrap();
    let (call_id, _, is_error) = expect_tool_result(&mut model).await;
    assert_eq!(call_id, "call-9");
    assert!(is_error);

    link.closed.cancel();
    assert!(session.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_avatar_failure_means_model_never_starts() {
    let deck = deck_file(&["a"]);
    let h = harness(settings(deck.path()), true);
    let (room, link) = room::open("room_4", 16);
    link.ready.send_replace(true);

    let result = h.orchestrator.clone().supervise(room, CancellationToken::new()).await;

    assert!(matches!(result, Err(SessionError::AvatarStart(_))));
    assert_eq!(h.log.calls(), vec!["avatar.start"]);
    assert!(link.closed.is_cancelled(), "the room is released");
}

#[tokio::test]
async fn test_transient_channel_error_keeps_session_alive() {
    let deck = deck_file(&["a", "b"]);
    let mut cfg = settings(deck.path());
    cfg.peer_ready_timeout = Duration::from_millis(20);
    let mut h = harness(cfg, false);
    // The peer never reports ready, so every publish fails with NotReady.
    let (room, mut link) = room::open("room_5", 16);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let mut model = h.next_model().await;

    model
        .events
        .send(tool_call("call-1", "advance_slide", Value::Null))
        .await
        .unwrap();
    let (_, output, is_error) = expect_tool_result(&mut model).await;
    assert_eq!(output, "Now showing slide 1 of 2.");
    assert!(!is_error);
    assert!(link.outbound.try_recv().is_err());
    assert!(!session.is_finished());

    link.closed.cancel();
    assert_eq!(session.await.unwrap().unwrap(), SessionEnd::PeerLeft);
}

#[tokio::test]
async fn test_closed_channel_ends_the_session() {
    let deck = deck_file(&["a"]);
    let mut h = harness(settings(deck.path()), false);
    let (room, link) = room::open("room_6", 16);
    link.ready.send_replace(true);
    let room::PeerLink {
        outbound,
        closed,
        ready: _ready,
        events: _events,
    } = link;
    // The socket writer is gone but the peer has not been marked closed.
    drop(outbound);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let model = h.next_model().await;

    model
        .events
        .send(tool_call(
            "call-1",
            "click_element",
            json!({"element_description": "Submit"}),
        ))
        .await
        .unwrap();

    let result = session.await.unwrap();
    assert!(
        matches!(result, Err(SessionError::Channel(ChannelError::Closed))),
        "{result:?}"
    );
    assert!(closed.is_cancelled());
    assert_eq!(h.log.calls().last(), Some(&"avatar.stop"));
}

#[tokio::test]
async fn test_missing_deck_degrades_to_apology() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(settings(&dir.path().join("missing.json")), false);
    let (room, link) = room::open("room_7", 16);
    link.ready.send_replace(true);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let mut model = h.next_model().await;

    assert!(model.config.instructions.contains("No presentation is loaded"));
    match model.next_command().await {
        ModelCommand::GenerateReply { instructions } => assert!(instructions.contains("Apologise")),
        other => panic!("expected the greeting, got {other:?}"),
    }

    model
        .events
        .send(tool_call("call-1", "advance_slide", json!({})))
        .await
        .unwrap();
    let (_, output, is_error) = expect_tool_result(&mut model).await;
    assert!(!is_error);
    assert_eq!(output, "There are no slides to present.");

    link.closed.cancel();
    assert!(session.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_model_disconnect_and_shutdown() {
    let deck = deck_file(&["a"]);
    let mut h = harness(settings(deck.path()), false);

    let (room, link) = room::open("room_8", 16);
    link.ready.send_replace(true);
    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let model = h.next_model().await;
    model.events.send(ModelEvent::Closed).await.unwrap();
    assert!(matches!(
        session.await.unwrap(),
        Err(SessionError::ModelClosed(_))
    ));
    assert!(link.closed.is_cancelled());

    let (room, link) = room::open("room_9", 16);
    link.ready.send_replace(true);
    let shutdown = CancellationToken::new();
    let session = tokio::spawn(h.orchestrator.clone().supervise(room, shutdown.clone()));
    let _model = h.next_model().await;
    shutdown.cancel();
    assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Shutdown);
}

#[tokio::test]
async fn test_peer_media_is_forwarded_and_video_is_sampled() {
    let deck = deck_file(&["a"]);
    let mut h = harness(settings(deck.path()), false);
    let (room, link) = room::open("room_10", 16);
    link.ready.send_replace(true);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    let mut model = h.next_model().await;
    assert!(matches!(
        model.next_command().await,
        ModelCommand::GenerateReply { .. }
    ));

    let frame = || PeerEvent::VideoFrame {
        mime_type: "image/jpeg".into(),
        data: "AAAA".into(),
    };
    let silence = base64::engine::general_purpose::STANDARD.encode([0u8; 960]);

    link.events.send(frame()).await.unwrap();
    // Arrives well inside the 10 s silent-state interval, so it is dropped.
    link.events.send(frame()).await.unwrap();
    link.events
        .send(PeerEvent::Audio(silence.clone()))
        .await
        .unwrap();

    assert!(matches!(
        model.next_command().await,
        ModelCommand::VideoFrame { .. }
    ));
    assert_eq!(model.next_command().await, ModelCommand::Audio(silence));

    model
        .events
        .send(ModelEvent::AudioChunk("AAE=".into()))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !h.log.calls().contains(&"avatar.audio") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("model audio reaches the avatar");

    link.closed.cancel();
    assert!(session.await.unwrap().is_ok());
}

async fn avatar_api() -> String {
    let app = Router::new().route(
        "/v1/auth/session-token",
        post(|| async { Json(json!({"sessionToken": "sess-42"})) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_slow_peer_still_gets_the_avatar() {
    let deck = deck_file(&["a", "b"]);
    let mut cfg = settings(deck.path());
    cfg.peer_ready_timeout = Duration::from_millis(20);
    let avatar = Arc::new(AnamAvatar::new(AnamConfig {
        api_url: avatar_api().await,
        api_key: "anam-key".into(),
        avatar_id: "avatar-1".into(),
        persona_name: "Maya".into(),
    }));
    let mut h = harness_with_avatar(cfg, avatar, CallLog::default());
    let (room, mut link) = room::open("room_11", 16);

    let session = tokio::spawn(h.orchestrator.clone().supervise(room, CancellationToken::new()));
    // The model only starts once the avatar has started.
    let mut model = h.next_model().await;
    assert!(matches!(
        model.next_command().await,
        ModelCommand::GenerateReply { .. }
    ));
    assert!(!session.is_finished());

    link.ready.send_replace(true);
    let announced = tokio::time::timeout(Duration::from_secs(5), link.outbound.recv())
        .await
        .expect("avatar announced after ready")
        .unwrap();
    assert_eq!(announced.topic, "avatar");
    assert_eq!(
        announced.payload,
        json!({"type": "avatar_session", "session_token": "sess-42", "persona": "Maya"})
    );

    link.closed.cancel();
    assert_eq!(session.await.unwrap().unwrap(), SessionEnd::PeerLeft);
}
