//! Faircast client
//!
//! Booth-side streaming session management. Wraps the vendor RTC SDKs
//! (Agora, 100ms) behind a uniform [`StreamAdapter`] so the UI joins,
//! publishes and leaves without branching on the vendor, and so the join
//! ordering and subscription bookkeeping live in one audited place.

pub mod adapter;

pub use adapter::{
    AdapterError, AdapterState, EngineEvent, JoinCredentials, MediaTrack, RemoteUser, RtcEngine,
    SessionPhase, StreamAdapter, StreamAdapterFactory, TrackKind,
};
