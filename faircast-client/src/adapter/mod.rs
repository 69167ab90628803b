//! Client-side streaming adapters
//!
//! Mirror of the backend provider abstraction for the booth UI: one adapter
//! per vendor SDK behind a shared [`StreamAdapter`] trait, resolved by name
//! through [`StreamAdapterFactory`]. The vendor SDK itself sits behind the
//! [`RtcEngine`] boundary so adapters stay testable off the browser.

pub mod agora;
pub mod engine;
pub mod error;
pub mod factory;
pub mod hundredms;
pub mod traits;

pub use agora::AgoraAdapter;
pub use engine::{
    ConnectionState, EngineEvent, MediaTrack, PeerSnapshot, RemotePresence, RtcEngine, TrackKind,
};
pub use error::AdapterError;
pub use factory::{AdapterBuilder, StreamAdapterFactory};
pub use hundredms::HundredMsAdapter;
pub use traits::{
    AdapterState, JoinCredentials, RemoteUser, SessionPhase, StreamAdapter, VideoTrackCallback,
};
