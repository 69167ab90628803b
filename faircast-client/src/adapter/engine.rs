// RTC Engine Boundary
//
// Abstraction over the vendor browser SDK (AgoraRTC, 100ms store). Adapters
// drive this interface; the embedding application supplies a concrete engine
// and forwards SDK callbacks as EngineEvents.

use super::error::Result;
use super::traits::JoinCredentials;
use async_trait::async_trait;
use faircast_core::StreamRole;

/// Signaling connection state as reported by the vendor SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Handle to a media track owned by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
}

/// A remote participant the engine currently knows about
#[derive(Debug, Clone)]
pub struct RemotePresence {
    pub uid: u32,
    pub has_video: bool,
    pub has_audio: bool,
}

/// Snapshot of one peer in a store-driven SDK (100ms)
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub uid: u32,
    pub is_local: bool,
    pub video_track: Option<MediaTrack>,
    pub audio_track: Option<MediaTrack>,
}

/// Event pushed from the vendor SDK into an adapter
#[derive(Debug, Clone)]
pub enum EngineEvent {
    UserPublished { uid: u32, kind: TrackKind },
    UserUnpublished { uid: u32, kind: TrackKind },
    UserLeft { uid: u32 },
    /// Full peer-list snapshot (store-driven SDKs)
    StoreUpdate { peers: Vec<PeerSnapshot> },
}

/// Vendor SDK surface needed by the adapters
///
/// The channel is the only shared resource, owned by the vendor and mutated
/// solely through these operations.
#[async_trait]
pub trait RtcEngine: Send + Sync {
    async fn join(&self, credentials: &JoinCredentials, role: StreamRole) -> Result<()>;

    async fn leave(&self) -> Result<()>;

    async fn connection_state(&self) -> ConnectionState;

    /// Remote participants already in the channel
    async fn remote_users(&self) -> Vec<RemotePresence>;

    /// Subscribe to one track of one remote participant. The engine rejects
    /// subscriptions for peers it has not registered yet, which is exactly
    /// the race the adapters gate against.
    async fn subscribe(&self, uid: u32, kind: TrackKind) -> Result<MediaTrack>;

    /// Create local (video, audio) capture tracks
    async fn create_local_tracks(&self) -> Result<(MediaTrack, MediaTrack)>;

    /// Attach the local video preview to a UI container
    async fn attach_local_video(&self, container_id: &str) -> Result<()>;

    async fn publish(&self, tracks: &[MediaTrack]) -> Result<()>;

    async fn unpublish(&self, tracks: &[MediaTrack]) -> Result<()>;

    async fn set_local_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<()>;

    async fn switch_camera(&self) -> Result<()>;
}
