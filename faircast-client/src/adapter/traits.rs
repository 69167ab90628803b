// Stream Adapter Trait
//
// Client-side mirror of the backend provider abstraction: each vendor SDK is
// wrapped in an adapter with a uniform join/publish/leave surface.

use super::engine::{EngineEvent, MediaTrack};
use super::error::Result;
use async_trait::async_trait;
use faircast_core::StreamRole;
use serde::{Deserialize, Serialize};

/// Connection credentials produced by the backend token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCredentials {
    pub token: String,
    /// Channel (Agora) or room id (100ms)
    pub channel: String,
    pub uid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

/// Session lifecycle: Idle -> Joining -> Joined -> Leaving -> Idle,
/// with publishing tracked as a flag inside Joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Joining,
    Joined,
    Leaving,
}

/// A remote participant with whatever tracks we are subscribed to
#[derive(Debug, Clone)]
pub struct RemoteUser {
    pub uid: u32,
    pub video_track: Option<MediaTrack>,
    pub audio_track: Option<MediaTrack>,
}

/// Observable adapter state snapshot for the UI layer
#[derive(Debug, Clone)]
pub struct AdapterState {
    pub phase: SessionPhase,
    pub is_joined: bool,
    pub is_publishing: bool,
    pub remote_users: Vec<RemoteUser>,
}

/// Invoked when a remote video track becomes ready to attach
pub type VideoTrackCallback = Box<dyn Fn(u32, &MediaTrack) + Send + Sync>;

/// Client-side streaming adapter
///
/// The embedding event loop forwards vendor SDK callbacks to
/// [`Self::handle_event`]; everything else is called from the UI.
#[async_trait]
pub trait StreamAdapter: Send + Sync {
    /// Canonical provider name this adapter speaks for
    fn provider(&self) -> &'static str;

    /// Join a channel. Resolves only once the connection is acknowledged by
    /// the signaling layer and peers already in the channel have been
    /// harvested, so no remote event is acted on before the session is
    /// actually ready.
    async fn join_channel(&self, credentials: &JoinCredentials, role: StreamRole) -> Result<()>;

    /// Leave the channel, tearing down local tracks and all subscription
    /// bookkeeping. Safe to call when already left.
    async fn leave_channel(&self) -> Result<()>;

    /// Start publishing local media (host only)
    async fn start_publishing(&self, container_id: Option<&str>) -> Result<()>;

    async fn stop_publishing(&self) -> Result<()>;

    async fn toggle_audio(&self, mute: bool) -> Result<()>;

    async fn toggle_video(&self, enabled: bool) -> Result<()>;

    async fn switch_camera(&self) -> Result<()>;

    fn set_on_video_track(&self, callback: VideoTrackCallback);

    /// Feed one vendor SDK event into the adapter
    async fn handle_event(&self, event: EngineEvent);

    fn state(&self) -> AdapterState;

    /// Release all resources; used on component unmount
    async fn cleanup(&self);
}
