// Stream Provider Traits
//
// Core interface for the streaming provider system

use super::{ProviderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Token lifetime for every provider. Tokens are regenerated on each
/// join/reconnect, never persisted.
pub const TOKEN_TTL_SECONDS: i64 = 3600;

/// Role of a participant inside a stream channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRole {
    /// Publishes media (one per booth)
    Host,
    /// Subscribe-only
    Audience,
}

impl StreamRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Audience => "audience",
        }
    }

    /// Lenient parse used at the request boundary: anything that is not
    /// recognizably a host falls back to audience permissions, never host.
    pub fn from_str_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Self::Host,
            _ => Self::Audience,
        }
    }
}

impl FromStr for StreamRole {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "audience" => Ok(Self::Audience),
            other => Err(ProviderError::InvalidRole(other.to_string())),
        }
    }
}

/// Short-lived join token for a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamToken {
    pub token: String,
    pub uid: u32,
    pub channel: String,
    pub role: StreamRole,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
    pub provider: String,
    /// Agora connection parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// 100ms connection parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

/// Provider-specific channel creation options, forwarded opaquely
pub type ChannelOptions = serde_json::Map<String, Value>;

/// Uniform result of `create_channel`
///
/// The descriptor is deterministic for a given channel name, so it can be
/// reconstructed without storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub channel_name: String,
    pub provider: String,
    pub config: ChannelOptions,
}

/// Best-effort liveness information for a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_name: String,
    pub provider: String,
    pub active: bool,
}

/// Acknowledgement of an (advisory) end-channel request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEnded {
    pub channel_name: String,
    pub ended: bool,
}

/// One entry in a provider pricing table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTier {
    pub name: String,
    /// USD per participant-minute
    pub price_per_minute: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Static per-provider pricing table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable {
    pub provider: String,
    pub currency: String,
    /// Monthly free-tier allowance in participant-minutes
    pub free_minutes: u64,
    pub tiers: Vec<PricingTier>,
    /// Surcharge per recorded publisher-minute, if the provider supports
    /// recording
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_price_per_minute: Option<f64>,
    /// Audio-only rate, if published separately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_price_per_minute: Option<f64>,
}

/// Video quality class, mapped by each provider to a pricing tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamQuality {
    #[default]
    Hd,
    #[serde(rename = "fullhd")]
    FullHd,
}

impl StreamQuality {
    /// Unrecognized quality falls back to the cheaper default tier, never
    /// silently to the most expensive one.
    pub fn from_str_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "fullhd" | "full_hd" | "1080p" => Self::FullHd,
            _ => Self::Hd,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd => "hd",
            Self::FullHd => "fullhd",
        }
    }
}

/// Input to all cost calculations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostParams {
    /// Peak concurrent viewers, treated as constant for the full duration.
    /// This is a deliberate worst-case upper bound; the monotonicity it gives
    /// the cost function is what makes the budget binary search sound.
    pub peak_concurrent_users: u32,
    pub duration_minutes: u32,
    /// One publisher per booth for the whole event
    pub number_of_booths: u32,
    #[serde(default)]
    pub quality: StreamQuality,
    #[serde(default)]
    pub recording: bool,
}

impl CostParams {
    /// Reject parameter combinations that hide a caller bug. Zero viewers or
    /// zero duration are legal (an empty event costs nothing), zero booths is
    /// not.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_booths == 0 {
            return Err(ProviderError::InvalidParams(
                "number_of_booths must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-minute accounting behind a cost estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub publisher_minutes: u64,
    pub viewer_minutes: u64,
    pub total_minutes: u64,
    /// Free-tier minutes actually consumed
    pub free_minutes: u64,
    pub billable_minutes: u64,
    pub price_per_minute: f64,
    pub quality: StreamQuality,
    pub recording: bool,
    pub recording_minutes: u64,
    pub recording_cost: f64,
}

/// Computed cost estimate; a pure function of (provider, params)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub provider: String,
    pub breakdown: CostBreakdown,
    /// USD, always >= 0 and non-decreasing in each of the input parameters
    pub estimated_cost: f64,
    pub currency: String,
}

/// Stream provider trait
///
/// Uniform interface any video backend must satisfy so callers never branch
/// on vendor. Providers are stateless and cheap to construct; the factory
/// hands out a fresh instance per call.
///
/// Channel lifecycle operations default to a "not implemented" error rather
/// than a silent no-op, so a partially implemented provider still behaves
/// predictably at the interface boundary.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Canonical provider name (e.g., "agora", "100ms")
    fn name(&self) -> &'static str;

    /// Generate a short-lived join token for exactly the requested
    /// channel/uid/role. Local crypto only, no network I/O.
    ///
    /// Fails with [`ProviderError::MissingCredentials`] when the vendor
    /// credentials are absent.
    async fn generate_token(
        &self,
        channel_name: &str,
        uid: u32,
        role: StreamRole,
    ) -> Result<StreamToken>;

    /// Create or configure a channel. Idempotent: calling twice for the same
    /// name returns structurally identical descriptors.
    ///
    /// May suspend on a vendor management API; such failures are propagated
    /// without retry.
    async fn create_channel(
        &self,
        channel_name: &str,
        _options: ChannelOptions,
    ) -> Result<ChannelDescriptor> {
        Err(ProviderError::NotImplemented {
            provider: self.name(),
            operation: "create_channel",
        })
    }

    /// Best-effort liveness query. Must not fail for a channel that was
    /// never created.
    async fn get_channel_info(&self, channel_name: &str) -> Result<ChannelInfo> {
        let _ = channel_name;
        Err(ProviderError::NotImplemented {
            provider: self.name(),
            operation: "get_channel_info",
        })
    }

    /// Advisory end-of-channel signal. Providers whose channels close
    /// themselves when empty accept this as a no-op success.
    async fn end_channel(&self, channel_name: &str) -> Result<ChannelEnded> {
        let _ = channel_name;
        Err(ProviderError::NotImplemented {
            provider: self.name(),
            operation: "end_channel",
        })
    }

    /// Static pricing table, no I/O
    fn pricing(&self) -> PricingTable;

    /// Pure cost estimate, no I/O, no hidden state
    fn calculate_cost(&self, params: &CostParams) -> Result<CostEstimate>;
}
