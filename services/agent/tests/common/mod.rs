#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use presenter_agent::{
    config::Config,
    orchestrator::{SessionOrchestrator, SessionSettings},
    provider::{
        AvatarSession, ModelCommand, ModelSession, ModelSessionConfig, ModelSessionHandle,
    },
    room::RoomHandle,
};
use presenter_core::{
    control::DeliveryPolicy, generic_types::ModelEvent, instructions::NavigationPolicy,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

/// Ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

pub struct FakeAvatar {
    pub log: CallLog,
    pub fail_start: bool,
}

#[async_trait]
impl AvatarSession for FakeAvatar {
    async fn start(&self, _room: &RoomHandle) -> Result<()> {
        self.log.push("avatar.start");
        if self.fail_start {
            bail!("avatar API unavailable");
        }
        Ok(())
    }

    async fn push_audio(&self, _room: &RoomHandle, _data: String) -> Result<()> {
        self.log.push("avatar.audio");
        Ok(())
    }

    async fn stop(&self, _room: &RoomHandle) {
        self.log.push("avatar.stop");
    }
}

/// The test's end of a started model session.
pub struct ModelPeer {
    pub config: ModelSessionConfig,
    pub commands: mpsc::Receiver<ModelCommand>,
    pub events: mpsc::Sender<ModelEvent>,
}

impl ModelPeer {
    pub async fn next_command(&mut self) -> ModelCommand {
        tokio::time::timeout(Duration::from_secs(5), self.commands.recv())
            .await
            .expect("timed out waiting for a model command")
            .expect("model command channel closed")
    }
}

pub struct FakeModel {
    pub log: CallLog,
    pub peers: mpsc::UnboundedSender<ModelPeer>,
}

#[async_trait]
impl ModelSession for FakeModel {
    async fn start(&self, config: ModelSessionConfig) -> Result<ModelSessionHandle> {
        self.log.push("model.start");
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (events_tx, events_rx) = mpsc::channel(32);
        let _ = self.peers.send(ModelPeer {
            config,
            commands: commands_rx,
            events: events_tx,
        });
        Ok(ModelSessionHandle {
            commands: commands_tx,
            events: events_rx,
            task: tokio::spawn(async {}),
        })
    }
}

pub struct Harness {
    pub orchestrator: SessionOrchestrator,
    pub log: CallLog,
    pub models: mpsc::UnboundedReceiver<ModelPeer>,
}

impl Harness {
    pub async fn next_model(&mut self) -> ModelPeer {
        tokio::time::timeout(Duration::from_secs(5), self.models.recv())
            .await
            .expect("timed out waiting for the model session")
            .expect("model factory dropped")
    }
}

pub fn settings(deck_path: &Path) -> SessionSettings {
    SessionSettings {
        persona_name: "Maya".into(),
        deck_path: deck_path.to_path_buf(),
        debounce_interval: Duration::from_secs(2),
        delivery: DeliveryPolicy::default(),
        peer_ready_timeout: Duration::from_secs(5),
        speaking_fps: 0.2,
        silent_fps: 0.1,
        navigation_policy: NavigationPolicy::ConfirmEachSlide,
    }
}

pub fn harness(settings: SessionSettings, fail_avatar: bool) -> Harness {
    let log = CallLog::default();
    let avatar = Arc::new(FakeAvatar {
        log: log.clone(),
        fail_start: fail_avatar,
    });
    harness_with_avatar(settings, avatar, log)
}

/// A harness around a caller-supplied avatar; only the model is faked.
pub fn harness_with_avatar(
    settings: SessionSettings,
    avatar: Arc<dyn AvatarSession>,
    log: CallLog,
) -> Harness {
    let (peers_tx, peers_rx) = mpsc::unbounded_channel();
    let orchestrator = SessionOrchestrator::new(
        settings,
        avatar,
        Arc::new(FakeModel {
            log: log.clone(),
            peers: peers_tx,
        }),
    );
    Harness {
        orchestrator,
        log,
        models: peers_rx,
    }
}

/// A deck file in the conversion job's output format.
pub fn deck_file(texts: &[&str]) -> NamedTempFile {
    let records: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            json!({
                "slide_number": i + 1,
                "image_url": format!("/slides/Slide{}.jpg", i + 1),
                "content": text,
            })
        })
        .collect();
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), serde_json::to_string(&records).unwrap()).unwrap();
    file
}

pub fn test_config(deck_path: PathBuf, slides_dir: PathBuf) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        public_url: "ws://localhost:8000".into(),
        room_api_key: "presenter".into(),
        room_api_secret: "test-secret".into(),
        anam_api_key: "anam-key".into(),
        anam_avatar_id: "avatar-1".into(),
        anam_api_url: "http://127.0.0.1:1".into(),
        avatar_name: "Maya".into(),
        gemini_api_key: "gemini-key".into(),
        gemini_model: "models/test".into(),
        gemini_voice: "Aoede".into(),
        deck_path,
        slides_dir,
        debounce_interval: Duration::from_secs(2),
        delivery: DeliveryPolicy::default(),
        peer_ready_timeout: Duration::from_secs(5),
        speaking_fps: 0.2,
        silent_fps: 0.1,
        navigation_policy: NavigationPolicy::ConfirmEachSlide,
        log_level: tracing::Level::INFO,
    }
}
