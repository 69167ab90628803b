//! Faircast core
//!
//! Streaming-provider abstraction and capacity planning for live trade-fair
//! events. Booths go live through a pluggable video vendor (Agora, 100ms);
//! organizers plan events with the cost and capacity calculators.
//!
//! The HTTP layer resolves a provider by name through
//! [`StreamProviderFactory`] and delegates token, channel and cost
//! operations; [`CapacityService`] builds its budget and comparison
//! algorithms on the same factory, so nothing here branches on a vendor.

pub mod config;
pub mod logging;
pub mod provider;
pub mod service;

pub use config::Config;
pub use provider::{
    booth_channel_name, AgoraProvider, ChannelDescriptor, ChannelEnded, ChannelInfo,
    ChannelOptions, CostBreakdown, CostEstimate, CostParams, HundredMsProvider, PricingTable,
    PricingTier, ProviderError, StreamProvider, StreamProviderFactory, StreamQuality, StreamRole,
    StreamToken,
};
pub use service::CapacityService;
