//! Agora.io Stream Provider
//!
//! Token generation is local HMAC signing; channels are created on the fly
//! by the vendor when users join, so the lifecycle operations here echo
//! configuration instead of calling out.
//!
//! Pricing source: <https://www.agora.io/en/pricing/>

use super::{
    ChannelDescriptor, ChannelEnded, ChannelInfo, ChannelOptions, CostBreakdown, CostEstimate,
    CostParams, PricingTable, PricingTier, ProviderError, Result, StreamProvider, StreamQuality,
    StreamRole, StreamToken, TOKEN_TTL_SECONDS,
};
use crate::config::AgoraConfig;
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

pub const PROVIDER_NAME: &str = "agora";

/// Token format version, matching Agora's AccessToken2 prefix
const TOKEN_VERSION: &str = "007";

/// RTC privilege levels carried in the signed message
const PRIVILEGE_PUBLISHER: u8 = 1;
const PRIVILEGE_SUBSCRIBER: u8 = 2;

const FREE_MINUTES: u64 = 10_000;
const HD_PRICE_PER_MINUTE: f64 = 0.0099; // $0.99 per 1000 minutes
const FULL_HD_PRICE_PER_MINUTE: f64 = 0.0399; // $3.99 per 1000 minutes
const AUDIO_PRICE_PER_MINUTE: f64 = 0.00099;

pub struct AgoraProvider {
    config: AgoraConfig,
}

impl AgoraProvider {
    pub fn new(config: AgoraConfig) -> Self {
        Self { config }
    }

    /// Both the app id and the app certificate are required for signing.
    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.config.app_id, &self.config.app_certificate) {
            (Some(app_id), Some(cert)) if !app_id.is_empty() && !cert.is_empty() => {
                Ok((app_id, cert))
            }
            _ => Err(ProviderError::MissingCredentials {
                provider: PROVIDER_NAME,
            }),
        }
    }
}

/// Build an AccessToken2-style RTC token.
///
/// The signed message binds app id, channel, uid, role privilege and expiry;
/// the token is the version prefix followed by
/// `base64url(HMAC-SHA256(certificate, message) || message)`.
fn build_rtc_token(
    app_id: &str,
    app_certificate: &str,
    channel_name: &str,
    uid: u32,
    role: StreamRole,
    expires_at: i64,
) -> Result<String> {
    let privilege = match role {
        StreamRole::Host => PRIVILEGE_PUBLISHER,
        StreamRole::Audience => PRIVILEGE_SUBSCRIBER,
    };

    let mut message = Vec::new();
    pack_str(&mut message, app_id);
    pack_str(&mut message, channel_name);
    message.extend_from_slice(&uid.to_be_bytes());
    message.push(privilege);
    message.extend_from_slice(&expires_at.to_be_bytes());

    let mut mac = Hmac::<Sha256>::new_from_slice(app_certificate.as_bytes())
        .map_err(|e| ProviderError::TokenSigning(e.to_string()))?;
    mac.update(&message);
    let signature = mac.finalize().into_bytes();

    let mut payload = Vec::with_capacity(signature.len() + message.len());
    payload.extend_from_slice(&signature);
    payload.extend_from_slice(&message);

    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload);
    Ok(format!("{TOKEN_VERSION}{encoded}"))
}

/// Length-prefixed string packing so field boundaries are unambiguous
fn pack_str(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

#[async_trait]
impl StreamProvider for AgoraProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn generate_token(
        &self,
        channel_name: &str,
        uid: u32,
        role: StreamRole,
    ) -> Result<StreamToken> {
        let (app_id, certificate) = self.credentials()?;

        let expires_at = Utc::now().timestamp() + TOKEN_TTL_SECONDS;
        let token = build_rtc_token(app_id, certificate, channel_name, uid, role, expires_at)?;

        Ok(StreamToken {
            token,
            uid,
            channel: channel_name.to_string(),
            role,
            expires_at,
            provider: PROVIDER_NAME.to_string(),
            app_id: Some(app_id.to_string()),
            subdomain: None,
        })
    }

    /// Agora channels exist as soon as someone joins; this only echoes the
    /// effective configuration, which also makes it trivially idempotent.
    async fn create_channel(
        &self,
        channel_name: &str,
        options: ChannelOptions,
    ) -> Result<ChannelDescriptor> {
        let mut config = options;
        config
            .entry("codec".to_string())
            .or_insert_with(|| Value::String("vp8".to_string()));
        config
            .entry("mode".to_string())
            .or_insert_with(|| Value::String("rtc".to_string()));

        Ok(ChannelDescriptor {
            channel_name: channel_name.to_string(),
            provider: PROVIDER_NAME.to_string(),
            config,
        })
    }

    /// Real channel stats need the vendor's channel REST API; without it the
    /// liveness query is answered optimistically and never fails.
    async fn get_channel_info(&self, channel_name: &str) -> Result<ChannelInfo> {
        Ok(ChannelInfo {
            channel_name: channel_name.to_string(),
            provider: PROVIDER_NAME.to_string(),
            active: true,
        })
    }

    /// Agora channels close themselves once the last user leaves, so ending
    /// is an advisory no-op success.
    async fn end_channel(&self, channel_name: &str) -> Result<ChannelEnded> {
        Ok(ChannelEnded {
            channel_name: channel_name.to_string(),
            ended: true,
        })
    }

    fn pricing(&self) -> PricingTable {
        PricingTable {
            provider: PROVIDER_NAME.to_string(),
            currency: "USD".to_string(),
            free_minutes: FREE_MINUTES,
            tiers: vec![
                PricingTier {
                    name: "Free Tier".to_string(),
                    price_per_minute: 0.0,
                    max_minutes: Some(FREE_MINUTES),
                    resolution: None,
                },
                PricingTier {
                    name: "HD Video".to_string(),
                    price_per_minute: HD_PRICE_PER_MINUTE,
                    max_minutes: None,
                    resolution: Some("720p and below".to_string()),
                },
                PricingTier {
                    name: "Full HD Video".to_string(),
                    price_per_minute: FULL_HD_PRICE_PER_MINUTE,
                    max_minutes: None,
                    resolution: Some("1080p and above".to_string()),
                },
            ],
            recording_price_per_minute: None,
            audio_price_per_minute: Some(AUDIO_PRICE_PER_MINUTE),
        }
    }

    fn calculate_cost(&self, params: &CostParams) -> Result<CostEstimate> {
        params.validate()?;

        // One publisher per booth for the whole event; peak viewers are
        // treated as constant for the full duration (worst-case bound).
        let publisher_minutes =
            u64::from(params.number_of_booths) * u64::from(params.duration_minutes);
        let viewer_minutes =
            u64::from(params.peak_concurrent_users) * u64::from(params.duration_minutes);
        let total_minutes = publisher_minutes + viewer_minutes;

        let price_per_minute = match params.quality {
            StreamQuality::FullHd => FULL_HD_PRICE_PER_MINUTE,
            StreamQuality::Hd => HD_PRICE_PER_MINUTE,
        };

        let billable_minutes = total_minutes.saturating_sub(FREE_MINUTES);
        let estimated_cost = billable_minutes as f64 * price_per_minute;

        Ok(CostEstimate {
            provider: PROVIDER_NAME.to_string(),
            breakdown: CostBreakdown {
                publisher_minutes,
                viewer_minutes,
                total_minutes,
                free_minutes: total_minutes.min(FREE_MINUTES),
                billable_minutes,
                price_per_minute,
                quality: params.quality,
                recording: params.recording,
                recording_minutes: 0,
                recording_cost: 0.0,
            },
            estimated_cost,
            currency: "USD".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AgoraProvider {
        AgoraProvider::new(AgoraConfig {
            app_id: Some("test-app-id".to_string()),
            app_certificate: Some("test-certificate".to_string()),
        })
    }

    fn params(viewers: u32, minutes: u32, booths: u32, quality: StreamQuality) -> CostParams {
        CostParams {
            peak_concurrent_users: viewers,
            duration_minutes: minutes,
            number_of_booths: booths,
            quality,
            recording: false,
        }
    }

    #[tokio::test]
    async fn test_generate_token() {
        let provider = provider();
        let now = Utc::now().timestamp();

        let token = provider
            .generate_token("booth-42", 1234, StreamRole::Host)
            .await
            .unwrap();

        assert!(token.token.starts_with(TOKEN_VERSION));
        assert_eq!(token.uid, 1234);
        assert_eq!(token.channel, "booth-42");
        assert_eq!(token.role, StreamRole::Host);
        assert_eq!(token.provider, "agora");
        assert_eq!(token.app_id.as_deref(), Some("test-app-id"));
        assert!(token.expires_at >= now + TOKEN_TTL_SECONDS);
        assert!(token.expires_at <= now + TOKEN_TTL_SECONDS + 5);
    }

    #[tokio::test]
    async fn test_host_and_audience_tokens_differ() {
        let provider = provider();
        let host = provider
            .generate_token("booth-1", 7, StreamRole::Host)
            .await
            .unwrap();
        let audience = provider
            .generate_token("booth-1", 7, StreamRole::Audience)
            .await
            .unwrap();
        assert_ne!(host.token, audience.token);
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let provider = AgoraProvider::new(AgoraConfig::default());
        let err = provider
            .generate_token("booth-1", 1, StreamRole::Audience)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_create_channel_idempotent() {
        let provider = provider();
        let a = provider
            .create_channel("booth-9", ChannelOptions::new())
            .await
            .unwrap();
        let b = provider
            .create_channel("booth-9", ChannelOptions::new())
            .await
            .unwrap();
        assert_eq!(a.channel_name, b.channel_name);
        assert_eq!(a.config, b.config);
        assert_eq!(a.config.get("codec"), Some(&Value::String("vp8".into())));
        assert_eq!(a.config.get("mode"), Some(&Value::String("rtc".into())));
    }

    #[tokio::test]
    async fn test_end_channel_never_created() {
        let provider = provider();
        let ended = provider.end_channel("never-created").await.unwrap();
        assert!(ended.ended);
    }

    #[test]
    fn test_cost_within_free_tier() {
        // 2 booths * 60 min = 120 publisher-minutes; 100 viewers * 60 min =
        // 6000 viewer-minutes; 6120 total stays under the 10000 free minutes.
        let estimate = provider()
            .calculate_cost(&params(100, 60, 2, StreamQuality::Hd))
            .unwrap();

        assert_eq!(estimate.breakdown.publisher_minutes, 120);
        assert_eq!(estimate.breakdown.viewer_minutes, 6000);
        assert_eq!(estimate.breakdown.total_minutes, 6120);
        assert_eq!(estimate.breakdown.billable_minutes, 0);
        assert_eq!(estimate.estimated_cost, 0.0);
    }

    #[test]
    fn test_cost_above_free_tier() {
        // 2000 viewers * 60 min = 120000; + 120 publisher-minutes = 120120;
        // 110120 billable at $0.0099.
        let estimate = provider()
            .calculate_cost(&params(2000, 60, 2, StreamQuality::Hd))
            .unwrap();

        assert_eq!(estimate.breakdown.total_minutes, 120_120);
        assert_eq!(estimate.breakdown.billable_minutes, 110_120);
        assert!((estimate.estimated_cost - 1090.188).abs() < 1e-6);
    }

    #[test]
    fn test_free_tier_boundary() {
        // Exactly the free allowance costs nothing; one minute more costs
        // exactly one minute.
        let provider = provider();

        let at_boundary = provider
            .calculate_cost(&params(0, 100, 100, StreamQuality::Hd))
            .unwrap();
        assert_eq!(at_boundary.breakdown.total_minutes, FREE_MINUTES);
        assert_eq!(at_boundary.estimated_cost, 0.0);

        let one_over = provider
            .calculate_cost(&params(1, 1, 10_000, StreamQuality::Hd))
            .unwrap();
        assert_eq!(one_over.breakdown.total_minutes, FREE_MINUTES + 1);
        assert_eq!(one_over.breakdown.billable_minutes, 1);
        assert!((one_over.estimated_cost - HD_PRICE_PER_MINUTE).abs() < 1e-12);
    }

    #[test]
    fn test_full_hd_tier_is_pricier() {
        let provider = provider();
        let hd = provider
            .calculate_cost(&params(5000, 60, 2, StreamQuality::Hd))
            .unwrap();
        let fullhd = provider
            .calculate_cost(&params(5000, 60, 2, StreamQuality::FullHd))
            .unwrap();
        assert!(fullhd.estimated_cost > hd.estimated_cost);
    }
}
