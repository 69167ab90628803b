//! Agora Stream Adapter
//!
//! Wraps the Agora RTC engine. The delicate part is the join sequence: the
//! vendor rejects subscriptions for peers it has not registered yet, and
//! queued `user-published` events can replay after a reconnect. Remote
//! handling is therefore gated behind two conditions — the signaling layer
//! has acknowledged our join (observed via a connection-state poll, not just
//! the join call resolving) and the already-present peers have been
//! harvested — and every subscription is de-duplicated per (peer, kind).

use super::engine::{ConnectionState, EngineEvent, MediaTrack, RtcEngine, TrackKind};
use super::error::{AdapterError, Result};
use super::traits::{
    AdapterState, JoinCredentials, RemoteUser, SessionPhase, StreamAdapter, VideoTrackCallback,
};
use async_trait::async_trait;
use faircast_core::StreamRole;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Connection-state poll cadence and bound while waiting for the join ack
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const CONNECT_POLL_ATTEMPTS: u32 = 25;

/// Settle window before harvesting peers that joined before us
const HARVEST_SETTLE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Default)]
struct Inner {
    phase: SessionPhase,
    is_joined: bool,
    /// Gate for remote events: join acknowledged AND existing peers harvested
    ready_for_events: bool,
    is_publishing: bool,
    remote_users: Vec<RemoteUser>,
    /// Active subscriptions per (peer, kind)
    subscribed: HashSet<(u32, TrackKind)>,
    local_video: Option<MediaTrack>,
    local_audio: Option<MediaTrack>,
}

pub struct AgoraAdapter {
    engine: Arc<dyn RtcEngine>,
    inner: Mutex<Inner>,
    on_video_track: Mutex<Option<VideoTrackCallback>>,
}

impl AgoraAdapter {
    pub fn new(engine: Arc<dyn RtcEngine>) -> Self {
        Self {
            engine,
            inner: Mutex::new(Inner::default()),
            on_video_track: Mutex::new(None),
        }
    }

    /// Subscribe to one remote track, once
    async fn subscribe_remote(&self, uid: u32, kind: TrackKind) {
        {
            let mut inner = self.inner.lock();
            if !inner.is_joined {
                return;
            }
            // Replayed or queued events must not double-subscribe
            if !inner.subscribed.insert((uid, kind)) {
                tracing::debug!(uid, ?kind, "already subscribed");
                return;
            }
        }

        match self.engine.subscribe(uid, kind).await {
            Ok(track) => {
                {
                    let mut inner = self.inner.lock();
                    if inner.remote_users.iter().all(|u| u.uid != uid) {
                        inner.remote_users.push(RemoteUser {
                            uid,
                            video_track: None,
                            audio_track: None,
                        });
                    }
                    if let Some(user) = inner.remote_users.iter_mut().find(|u| u.uid == uid) {
                        match kind {
                            TrackKind::Video => user.video_track = Some(track.clone()),
                            TrackKind::Audio => user.audio_track = Some(track.clone()),
                        }
                    }
                }

                if kind == TrackKind::Video {
                    if let Some(callback) = self.on_video_track.lock().as_ref() {
                        callback(uid, &track);
                    }
                }
            }
            Err(error) => {
                // Free the slot so a later replay can retry
                self.inner.lock().subscribed.remove(&(uid, kind));
                tracing::warn!(uid, ?kind, %error, "failed to subscribe to remote user");
            }
        }
    }
}

#[async_trait]
impl StreamAdapter for AgoraAdapter {
    fn provider(&self) -> &'static str {
        "agora"
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

        // The join call resolving is not enough: wait until the signaling
        // layer reports the connection as established.
        let mut connected = false;
        for _ in 0..CONNECT_POLL_ATTEMPTS {
            if self.engine.connection_state().await == ConnectionState::Connected {
                connected = true;
                break;
            }
            tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
        }
        if !connected {
            let _ = self.engine.leave().await;
            self.inner.lock().phase = SessionPhase::Idle;
            return Err(AdapterError::JoinTimeout);
        }

        {
            let mut inner = self.inner.lock();
            inner.phase = SessionPhase::Joined;
            inner.is_joined = true;
        }
        tracing::debug!(channel = %credentials.channel, uid = credentials.uid, "joined channel");

        // Let the SDK settle, then subscribe to peers that were already in
        // the channel before our join; only then accept live events.
        tokio::time::sleep(HARVEST_SETTLE_DELAY).await;
        let existing = self.engine.remote_users().await;
        tracing::debug!(count = existing.len(), "harvesting existing remote users");
        for user in existing {
            if user.has_video {
                self.subscribe_remote(user.uid, TrackKind::Video).await;
            }
            if user.has_audio {
                self.subscribe_remote(user.uid, TrackKind::Audio).await;
            }
        }

        self.inner.lock().ready_for_events = true;
        tracing::debug!("ready for user-published events");
        Ok(())
    }

    async fn leave_channel(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if !inner.is_joined {
                tracing::debug!("already left channel");
                return Ok(());
            }
            inner.phase = SessionPhase::Leaving;
            inner.is_joined = false;
            inner.ready_for_events = false;
            inner.is_publishing = false;
            inner.local_video = None;
            inner.local_audio = None;
        }

        let result = self.engine.leave().await;

        let mut inner = self.inner.lock();
        inner.remote_users.clear();
        inner.subscribed.clear();
        inner.phase = SessionPhase::Idle;

        result
    }

    async fn start_publishing(&self, container_id: Option<&str>) -> Result<()> {
        if !self.inner.lock().is_joined {
            return Err(AdapterError::NotJoined);
        }

        let (video, audio) = self.engine.create_local_tracks().await?;
        if let Some(container) = container_id {
            self.engine.attach_local_video(container).await?;
        }
        self.engine.publish(&[video.clone(), audio.clone()]).await?;

        let mut inner = self.inner.lock();
        inner.local_video = Some(video);
        inner.local_audio = Some(audio);
        inner.is_publishing = true;
        Ok(())
    }

    async fn stop_publishing(&self) -> Result<()> {
        let (was_publishing, tracks) = {
            let mut inner = self.inner.lock();
            let tracks: Vec<MediaTrack> = inner
                .local_video
                .take()
                .into_iter()
                .chain(inner.local_audio.take())
                .collect();
            let was_publishing = inner.is_publishing;
            inner.is_publishing = false;
            (was_publishing, tracks)
        };

        if was_publishing && !tracks.is_empty() {
            self.engine.unpublish(&tracks).await?;
        }
        Ok(())
    }

    async fn toggle_audio(&self, mute: bool) -> Result<()> {
        if self.inner.lock().local_audio.is_some() {
            self.engine
                .set_local_track_enabled(TrackKind::Audio, !mute)
                .await?;
        }
        Ok(())
    }

    async fn toggle_video(&self, enabled: bool) -> Result<()> {
        if self.inner.lock().local_video.is_some() {
            self.engine
                .set_local_track_enabled(TrackKind::Video, enabled)
                .await?;
        }
        Ok(())
    }

    async fn switch_camera(&self) -> Result<()> {
        if self.inner.lock().local_video.is_some() {
            self.engine.switch_camera().await?;
        }
        Ok(())
    }

    fn set_on_video_track(&self, callback: VideoTrackCallback) {
        *self.on_video_track.lock() = Some(callback);
    }

    async fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::UserPublished { uid, kind } => {
                if !self.inner.lock().ready_for_events {
                    tracing::debug!(uid, "ignoring early user-published event");
                    return;
                }
                self.subscribe_remote(uid, kind).await;
            }
            EngineEvent::UserUnpublished { uid, kind } => {
                let mut inner = self.inner.lock();
                // Clear the dedup slot so a re-publish subscribes again
                inner.subscribed.remove(&(uid, kind));
                if let Some(user) = inner.remote_users.iter_mut().find(|u| u.uid == uid) {
                    match kind {
                        TrackKind::Video => user.video_track = None,
                        TrackKind::Audio => user.audio_track = None,
                    }
                }
            }
            EngineEvent::UserLeft { uid } => {
                let mut inner = self.inner.lock();
                inner.subscribed.retain(|(u, _)| *u != uid);
                inner.remote_users.retain(|u| u.uid != uid);
            }
            EngineEvent::StoreUpdate { .. } => {
                tracing::debug!("ignoring store update on an event-driven SDK");
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
            tracing::warn!(%error, "failed to leave channel during cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::engine::RemotePresence;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockEngine {
        current_state: Mutex<ConnectionState>,
        pending_states: Mutex<VecDeque<ConnectionState>>,
        remote: Mutex<Vec<RemotePresence>>,
        subscriptions: Mutex<Vec<(u32, TrackKind)>>,
        fail_subscribe: AtomicBool,
        join_calls: AtomicUsize,
        leave_calls: AtomicUsize,
    }

    impl MockEngine {
        fn new(initial: ConnectionState) -> Arc<Self> {
            Arc::new(Self {
                current_state: Mutex::new(initial),
                pending_states: Mutex::new(VecDeque::new()),
                remote: Mutex::new(Vec::new()),
                subscriptions: Mutex::new(Vec::new()),
                fail_subscribe: AtomicBool::new(false),
                join_calls: AtomicUsize::new(0),
                leave_calls: AtomicUsize::new(0),
            })
        }

        fn connected() -> Arc<Self> {
            Self::new(ConnectionState::Connected)
        }

        fn queue_states(&self, states: &[ConnectionState]) {
            self.pending_states.lock().extend(states.iter().copied());
        }

        fn add_remote(&self, uid: u32, has_video: bool, has_audio: bool) {
            self.remote.lock().push(RemotePresence {
                uid,
                has_video,
                has_audio,
            });
        }

        fn subscriptions(&self) -> Vec<(u32, TrackKind)> {
            self.subscriptions.lock().clone()
        }
    }

    #[async_trait]
    impl RtcEngine for MockEngine {
        async fn join(&self, _credentials: &JoinCredentials, _role: StreamRole) -> Result<()> {
            self.join_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn leave(&self) -> Result<()> {
            self.leave_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn connection_state(&self) -> ConnectionState {
            let mut current = self.current_state.lock();
            if let Some(next) = self.pending_states.lock().pop_front() {
                *current = next;
            }
            *current
        }

        async fn remote_users(&self) -> Vec<RemotePresence> {
            self.remote.lock().clone()
        }

        async fn subscribe(&self, uid: u32, kind: TrackKind) -> Result<MediaTrack> {
            // The real SDK rejects subscriptions before the join is
            // acknowledged or for unknown peers; enforcing that here makes
            // ordering violations fail the tests.
            if *self.current_state.lock() != ConnectionState::Connected {
                return Err(AdapterError::Engine("not connected".to_string()));
            }
            if !self.remote.lock().iter().any(|u| u.uid == uid) {
                return Err(AdapterError::Engine(format!("unknown peer {uid}")));
            }
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(AdapterError::Engine("subscribe failed".to_string()));
            }
            self.subscriptions.lock().push((uid, kind));
            Ok(MediaTrack {
                id: format!("remote-{uid}-{kind:?}"),
                kind,
            })
        }

        async fn create_local_tracks(&self) -> Result<(MediaTrack, MediaTrack)> {
            Ok((
                MediaTrack {
                    id: "local-video".to_string(),
                    kind: TrackKind::Video,
                },
                MediaTrack {
                    id: "local-audio".to_string(),
                    kind: TrackKind::Audio,
                },
            ))
        }

        async fn attach_local_video(&self, _container_id: &str) -> Result<()> {
            Ok(())
        }

        async fn publish(&self, _tracks: &[MediaTrack]) -> Result<()> {
            Ok(())
        }

        async fn unpublish(&self, _tracks: &[MediaTrack]) -> Result<()> {
            Ok(())
        }

        async fn set_local_track_enabled(&self, _kind: TrackKind, _enabled: bool) -> Result<()> {
            Ok(())
        }

        async fn switch_camera(&self) -> Result<()> {
            Ok(())
        }
    }

    fn credentials() -> JoinCredentials {
        JoinCredentials {
            token: "007token".to_string(),
            channel: "booth-1".to_string(),
            uid: 99,
            app_id: Some("app".to_string()),
            subdomain: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_waits_for_ack_then_harvests_existing_peers() {
        let engine = MockEngine::new(ConnectionState::Connecting);
        engine.queue_states(&[
            ConnectionState::Connecting,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]);
        engine.add_remote(7, true, true);
        let adapter = AgoraAdapter::new(engine.clone());

        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();

        // Subscriptions only happen once the mock reports Connected, so this
        // also proves no subscribe ran before the ack.
        assert_eq!(
            engine.subscriptions(),
            vec![(7, TrackKind::Video), (7, TrackKind::Audio)]
        );

        let state = adapter.state();
        assert!(state.is_joined);
        assert_eq!(state.phase, SessionPhase::Joined);
        assert_eq!(state.remote_users.len(), 1);
        assert!(state.remote_users[0].video_track.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_timeout_rolls_back() {
        let engine = MockEngine::new(ConnectionState::Connecting);
        let adapter = AgoraAdapter::new(engine.clone());

        let err = adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::JoinTimeout));
        assert_eq!(engine.leave_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.state().phase, SessionPhase::Idle);

        // The session is reusable after the rollback
        engine.queue_states(&[ConnectionState::Connected]);
        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_before_ready_are_ignored() {
        let engine = MockEngine::connected();
        engine.add_remote(5, true, false);
        let adapter = AgoraAdapter::new(engine.clone());

        adapter
            .handle_event(EngineEvent::UserPublished {
                uid: 5,
                kind: TrackKind::Video,
            })
            .await;
        assert!(engine.subscriptions().is_empty());

        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();
        // Harvest already picked the peer up; the replayed event is deduped
        adapter
            .handle_event(EngineEvent::UserPublished {
                uid: 5,
                kind: TrackKind::Video,
            })
            .await;
        assert_eq!(engine.subscriptions(), vec![(5, TrackKind::Video)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_publish_events_subscribe_once() {
        let engine = MockEngine::connected();
        let adapter = AgoraAdapter::new(engine.clone());
        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();

        engine.add_remote(5, true, false);
        for _ in 0..3 {
            adapter
                .handle_event(EngineEvent::UserPublished {
                    uid: 5,
                    kind: TrackKind::Video,
                })
                .await;
        }
        assert_eq!(engine.subscriptions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpublish_frees_subscription_slot() {
        let engine = MockEngine::connected();
        let adapter = AgoraAdapter::new(engine.clone());
        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();

        engine.add_remote(5, true, false);
        let publish = EngineEvent::UserPublished {
            uid: 5,
            kind: TrackKind::Video,
        };
        adapter.handle_event(publish.clone()).await;
        adapter
            .handle_event(EngineEvent::UserUnpublished {
                uid: 5,
                kind: TrackKind::Video,
            })
            .await;
        assert!(adapter.state().remote_users[0].video_track.is_none());

        adapter.handle_event(publish).await;
        assert_eq!(engine.subscriptions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscribe_can_retry() {
        let engine = MockEngine::connected();
        let adapter = AgoraAdapter::new(engine.clone());
        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();

        engine.add_remote(5, true, false);
        engine.fail_subscribe.store(true, Ordering::SeqCst);
        let publish = EngineEvent::UserPublished {
            uid: 5,
            kind: TrackKind::Video,
        };
        adapter.handle_event(publish.clone()).await;
        assert!(engine.subscriptions().is_empty());

        engine.fail_subscribe.store(false, Ordering::SeqCst);
        adapter.handle_event(publish).await;
        assert_eq!(engine.subscriptions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_is_idempotent_and_clears_bookkeeping() {
        let engine = MockEngine::connected();
        engine.add_remote(7, true, false);
        let adapter = AgoraAdapter::new(engine.clone());
        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();
        assert_eq!(adapter.state().remote_users.len(), 1);

        adapter.leave_channel().await.unwrap();
        adapter.leave_channel().await.unwrap();
        assert_eq!(engine.leave_calls.load(Ordering::SeqCst), 1);

        let state = adapter.state();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(!state.is_joined);
        assert!(state.remote_users.is_empty());

        // Rejoin subscribes again from a clean slate
        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();
        assert_eq!(engine.subscriptions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_lifecycle() {
        let engine = MockEngine::connected();
        let adapter = AgoraAdapter::new(engine.clone());

        assert!(matches!(
            adapter.start_publishing(None).await,
            Err(AdapterError::NotJoined)
        ));

        adapter
            .join_channel(&credentials(), StreamRole::Host)
            .await
            .unwrap();
        adapter.start_publishing(Some("local-video")).await.unwrap();
        assert!(adapter.state().is_publishing);

        adapter.stop_publishing().await.unwrap();
        assert!(!adapter.state().is_publishing);
        // Toggles are no-ops without local tracks
        adapter.toggle_audio(true).await.unwrap();
        adapter.toggle_video(false).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_track_callback_fires() {
        let engine = MockEngine::connected();
        engine.add_remote(7, true, false);
        let adapter = AgoraAdapter::new(engine.clone());

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        adapter.set_on_video_track(Box::new(move |uid, track| {
            sink.lock().push((uid, track.id.clone()));
        }));

        adapter
            .join_channel(&credentials(), StreamRole::Audience)
            .await
            .unwrap();

        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 7);
    }
}
