//! 100ms Stream Adapter
//!
//! The 100ms SDK is store-driven: instead of discrete publish/unpublish
//! events it pushes full peer-list snapshots, and local tracks are created
//! and published by the SDK itself when a broadcaster joins. The adapter
//! therefore reconciles its remote-user view from each snapshot and treats
//! the discrete Agora-style events as noise.

use super::engine::{EngineEvent, MediaTrack, PeerSnapshot, RtcEngine, TrackKind};
use super::error::{AdapterError, Result};
use super::traits::{
    AdapterState, JoinCredentials, RemoteUser, SessionPhase, StreamAdapter, VideoTrackCallback,
};
use async_trait::async_trait;
use faircast_core::StreamRole;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    phase: SessionPhase,
    is_joined: bool,
    is_publishing: bool,
    remote_users: Vec<RemoteUser>,
    /// Video track ids already announced through the callback
    seen_video_tracks: HashSet<String>,
}

pub struct HundredMsAdapter {
    engine: Arc<dyn RtcEngine>,
    inner: Mutex<Inner>,
    on_video_track: Mutex<Option<VideoTrackCallback>>,
}

impl HundredMsAdapter {
    pub fn new(engine: Arc<dyn RtcEngine>) -> Self {
        Self {
            engine,
            inner: Mutex::new(Inner::default()),
            on_video_track: Mutex::new(None),
        }
    }

    /// Rebuild the remote-user view from a store snapshot. Returns the video
    /// tracks that appeared for the first time.
    fn reconcile(&self, peers: &[PeerSnapshot]) -> Vec<(u32, MediaTrack)> {
        let mut inner = self.inner.lock();
        inner.remote_users = peers
            .iter()
            .filter(|p| !p.is_local)
            .map(|p| RemoteUser {
                uid: p.uid,
                video_track: p.video_track.clone(),
                audio_track: p.audio_track.clone(),
            })
            .collect();

        let mut fresh = Vec::new();
        for peer in peers.iter().filter(|p| !p.is_local) {
            if let Some(track) = &peer.video_track {
                if inner.seen_video_tracks.insert(track.id.clone()) {
                    fresh.push((peer.uid, track.clone()));
                }
            }
        }
        fresh
    }
}

#[async_trait]
impl StreamAdapter for HundredMsAdapter {
    fn provider(&self) -> &'static str {
        "100ms"
    }

    async fn join_channel(&self, credentials: &JoinCredentials, role: StreamRole) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.phase != SessionPhase::Idle {
                return Err(AdapterError::AlreadyJoined(credentials.channel.clone()));
            }
            inner.phase = SessionPhase::Joining;
        }

        if let Err(error) = self.engine.join(credentials, role).await {
            self.inner.lock().phase = SessionPhase::Idle;
            return Err(error);
        }

        let mut inner = self.inner.lock();
        inner.phase = SessionPhase::Joined;
        inner.is_joined = true;
        // The SDK publishes local tracks itself when a broadcaster joins
        if role == StreamRole::Host {
            inner.is_publishing = true;
        }
        tracing::debug!(room = %credentials.channel, role = role.as_str(), "joined room");
        Ok(())
    }

    async fn leave_channel(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if !inner.is_joined {
                tracing::debug!("already left room");
                return Ok(());
            }
            inner.phase = SessionPhase::Leaving;
            inner.is_joined = false;
            inner.is_publishing = false;
        }

        let result = self.engine.leave().await;

        let mut inner = self.inner.lock();
        inner.remote_users.clear();
        inner.seen_video_tracks.clear();
        inner.phase = SessionPhase::Idle;

        result
    }

    async fn start_publishing(&self, container_id: Option<&str>) -> Result<()> {
        if !self.inner.lock().is_joined {
            return Err(AdapterError::NotJoined);
        }

        // Tracks already exist; publishing means unmuting them
        self.engine
            .set_local_track_enabled(TrackKind::Video, true)
            .await?;
        self.engine
            .set_local_track_enabled(TrackKind::Audio, true)
            .await?;
        if let Some(container) = container_id {
            self.engine.attach_local_video(container).await?;
        }
        self.inner.lock().is_publishing = true;
        Ok(())
    }

    async fn stop_publishing(&self) -> Result<()> {
        let was_publishing = {
            let mut inner = self.inner.lock();
            let was = inner.is_publishing;
            inner.is_publishing = false;
            was
        };
        if was_publishing {
            self.engine
                .set_local_track_enabled(TrackKind::Video, false)
                .await?;
            self.engine
                .set_local_track_enabled(TrackKind::Audio, false)
                .await?;
        }
        Ok(())
    }

    async fn toggle_audio(&self, mute: bool) -> Result<()> {
        if !self.inner.lock().is_joined {
            return Ok(());
        }
        self.engine
            .set_local_track_enabled(TrackKind::Audio, !mute)
            .await
    }

    async fn toggle_video(&self, enabled: bool) -> Result<()> {
        if !self.inner.lock().is_joined {
            return Ok(());
        }
        self.engine
            .set_local_track_enabled(TrackKind::Video, enabled)
            .await
    }

    async fn switch_camera(&self) -> Result<()> {
        if !self.inner.lock().is_joined {
            return Ok(());
        }
        self.engine.switch_camera().await
    }

    fn set_on_video_track(&self, callback: VideoTrackCallback) {
        *self.on_video_track.lock() = Some(callback);
    }

    async fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::StoreUpdate { peers } => {
                if !self.inner.lock().is_joined {
                    tracing::debug!("ignoring store update before join");
                    return;
                }
                let fresh = self.reconcile(&peers);
                if let Some(callback) = self.on_video_track.lock().as_ref() {
                    for (uid, track) in &fresh {
                        callback(*uid, track);
                    }
                }
            }
            // Discrete events are superseded by the next store snapshot
            other => {
                tracing::debug!(event = ?other, "ignoring discrete event on a store-driven SDK");
            }
        }
    }

    fn state(&self) -> AdapterState {
        let inner = self.inner.lock();
        AdapterState {
            phase: inner.phase,
            is_joined: inner.is_joined,
            is_publishing: inner.is_publishing,
            remote_users: inner.remote_users.clone(),
        }
    }

    async fn cleanup(&self) {
        if let Err(error) = self.leave_channel().await {
            tracing::warn!(%error, "failed to leave room during cleanup");
        }
    }
}
