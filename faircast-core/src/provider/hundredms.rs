//! 100ms.live Stream Provider
//!
//! Join tokens are HS256 JWTs signed with the app secret. Room lifecycle goes
//! through the 100ms management API when a management URL is configured;
//! otherwise the calls are answered locally with the same uniform shapes.
//!
//! Docs: <https://www.100ms.live/docs/server-side/v2/introduction/authentication-and-tokens>
//! Pricing source: <https://www.100ms.live/pricing>

use super::{
    ChannelDescriptor, ChannelEnded, ChannelInfo, ChannelOptions, CostBreakdown, CostEstimate,
    CostParams, PricingTable, PricingTier, ProviderError, Result, StreamProvider, StreamRole,
    StreamToken, TOKEN_TTL_SECONDS,
};
use crate::config::HundredMsConfig;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROVIDER_NAME: &str = "100ms";

/// Management tokens are short-lived; they only authenticate one REST call.
const MANAGEMENT_TOKEN_TTL_SECONDS: i64 = 600;

const FREE_MINUTES: u64 = 10_000;
const VIDEO_PRICE_PER_MINUTE: f64 = 0.0099; // $0.99 per 1000 minutes, all qualities
const RECORDING_PRICE_PER_MINUTE: f64 = 0.004; // $0.40 per 100 minutes

/// App token claims, the layout 100ms expects in join tokens
#[derive(Debug, Serialize, Deserialize)]
struct AppTokenClaims {
    access_key: String,
    room_id: String,
    user_id: String,
    role: String,
    #[serde(rename = "type")]
    token_type: String,
    version: u32,
    jti: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManagementTokenClaims {
    access_key: String,
    #[serde(rename = "type")]
    token_type: String,
    version: u32,
    jti: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

pub struct HundredMsProvider {
    config: HundredMsConfig,
    http: reqwest::Client,
}

impl HundredMsProvider {
    pub fn new(config: HundredMsConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.config.access_key, &self.config.app_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok((key, secret))
            }
            _ => Err(ProviderError::MissingCredentials {
                provider: PROVIDER_NAME,
            }),
        }
    }

    /// 100ms role names: host publishes, everyone else only watches
    fn role_name(role: StreamRole) -> &'static str {
        match role {
            StreamRole::Host => "broadcaster",
            StreamRole::Audience => "viewer",
        }
    }

    fn sign(&self, claims: &impl Serialize, secret: &str) -> Result<String> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| ProviderError::TokenSigning(e.to_string()))
    }

    /// Management token for the REST API
    fn management_token(&self) -> Result<String> {
        let (access_key, secret) = self.credentials()?;
        let now = Utc::now().timestamp();

        let claims = ManagementTokenClaims {
            access_key: access_key.to_string(),
            token_type: "management".to_string(),
            version: 2,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now + MANAGEMENT_TOKEN_TTL_SECONDS,
        };

        self.sign(&claims, secret)
    }

    /// Local descriptor used when no management URL is configured, and as the
    /// uniform shape for management API responses.
    fn local_descriptor(&self, channel_name: &str, options: ChannelOptions) -> ChannelDescriptor {
        let mut config = options;
        if let Some(template_id) = &self.config.template_id {
            config
                .entry("template_id".to_string())
                .or_insert_with(|| Value::String(template_id.clone()));
        }

        ChannelDescriptor {
            channel_name: channel_name.to_string(),
            provider: PROVIDER_NAME.to_string(),
            config,
        }
    }

    async fn management_post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let token = self.management_token()?;
        self.http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))
    }

    async fn management_get(&self, url: &str) -> Result<reqwest::Response> {
        let token = self.management_token()?;
        self.http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))
    }
}

#[async_trait]
impl StreamProvider for HundredMsProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn generate_token(
        &self,
        channel_name: &str,
        uid: u32,
        role: StreamRole,
    ) -> Result<StreamToken> {
        let (access_key, secret) = self.credentials()?;
        let now = Utc::now().timestamp();
        let expires_at = now + TOKEN_TTL_SECONDS;

        let claims = AppTokenClaims {
            access_key: access_key.to_string(),
            room_id: channel_name.to_string(),
            user_id: uid.to_string(),
            role: Self::role_name(role).to_string(),
            token_type: "app".to_string(),
            version: 2,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: expires_at,
        };

        let token = self.sign(&claims, secret)?;

        Ok(StreamToken {
            token,
            uid,
            channel: channel_name.to_string(),
            role,
            expires_at,
            provider: PROVIDER_NAME.to_string(),
            app_id: None,
            subdomain: self.config.subdomain.clone(),
        })
    }

    /// Create a room. `POST /v2/rooms` upserts by name on the vendor side,
    /// which keeps this idempotent on the management path too.
    async fn create_channel(
        &self,
        channel_name: &str,
        options: ChannelOptions,
    ) -> Result<ChannelDescriptor> {
        self.credentials()?;

        if let Some(base) = &self.config.management_url {
            let mut body = serde_json::json!({ "name": channel_name });
            if let Some(template_id) = &self.config.template_id {
                body["template_id"] = Value::String(template_id.clone());
            }
            for (k, v) in &options {
                body[k] = v.clone();
            }

            let resp = self
                .management_post(&format!("{base}/v2/rooms"), &body)
                .await?;
            if !resp.status().is_success() {
                return Err(ProviderError::Api(format!(
                    "room creation failed with status {}",
                    resp.status()
                )));
            }
        }

        Ok(self.local_descriptor(channel_name, options))
    }

    /// Liveness via `GET /v2/active-rooms/{room}`; a 404 simply means the
    /// room is not live, never an error.
    async fn get_channel_info(&self, channel_name: &str) -> Result<ChannelInfo> {
        let active = match &self.config.management_url {
            Some(base) => {
                let resp = self
                    .management_get(&format!("{base}/v2/active-rooms/{channel_name}"))
                    .await?;
                match resp.status() {
                    s if s.is_success() => true,
                    reqwest::StatusCode::NOT_FOUND => false,
                    s => return Err(ProviderError::Api(format!("status {s}"))),
                }
            }
            // No management API configured: answer optimistically
            None => true,
        };

        Ok(ChannelInfo {
            channel_name: channel_name.to_string(),
            provider: PROVIDER_NAME.to_string(),
            active,
        })
    }

    /// Advisory end via `POST /v2/active-rooms/{room}/end-room`; ending a
    /// room that is not live (404) is a no-op success.
    async fn end_channel(&self, channel_name: &str) -> Result<ChannelEnded> {
        if let Some(base) = &self.config.management_url {
            let body = serde_json::json!({ "reason": "event ended", "lock": false });
            let resp = self
                .management_post(
                    &format!("{base}/v2/active-rooms/{channel_name}/end-room"),
                    &body,
                )
                .await?;
            let status = resp.status();
            if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
                return Err(ProviderError::Api(format!("status {status}")));
            }
        }

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
                    name: "Video Minutes".to_string(),
                    price_per_minute: VIDEO_PRICE_PER_MINUTE,
                    max_minutes: None,
                    resolution: Some("all quality levels".to_string()),
                },
            ],
            recording_price_per_minute: Some(RECORDING_PRICE_PER_MINUTE),
            audio_price_per_minute: None,
        }
    }

    fn calculate_cost(&self, params: &CostParams) -> Result<CostEstimate> {
        params.validate()?;

        let publisher_minutes =
            u64::from(params.number_of_booths) * u64::from(params.duration_minutes);
        let viewer_minutes =
            u64::from(params.peak_concurrent_users) * u64::from(params.duration_minutes);
        let total_minutes = publisher_minutes + viewer_minutes;

        // 100ms charges the same rate for every quality level
        let price_per_minute = VIDEO_PRICE_PER_MINUTE;

        let billable_minutes = total_minutes.saturating_sub(FREE_MINUTES);
        let mut estimated_cost = billable_minutes as f64 * price_per_minute;

        // Recording is billed on publisher-minutes only, outside the free tier
        let (recording_minutes, recording_cost) = if params.recording {
            let minutes = publisher_minutes;
            let cost = minutes as f64 * RECORDING_PRICE_PER_MINUTE;
            estimated_cost += cost;
            (minutes, cost)
        } else {
            (0, 0.0)
        };

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
                recording_minutes,
                recording_cost,
            },
            estimated_cost,
            currency: "USD".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StreamQuality;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn provider() -> HundredMsProvider {
        HundredMsProvider::new(HundredMsConfig {
            access_key: Some("test-access-key".to_string()),
            app_secret: Some("test-app-secret".to_string()),
            template_id: Some("template-1".to_string()),
            subdomain: Some("fair".to_string()),
            management_url: None,
        })
    }

    #[tokio::test]
    async fn test_generate_token_claims() {
        let provider = provider();
        let token = provider
            .generate_token("booth-5", 42, StreamRole::Host)
            .await
            .unwrap();

        assert_eq!(token.provider, "100ms");
        assert_eq!(token.subdomain.as_deref(), Some("fair"));

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = false;
        validation.leeway = 60;
        let decoded = decode::<AppTokenClaims>(
            &token.token,
            &DecodingKey::from_secret(b"test-app-secret"),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.access_key, "test-access-key");
        assert_eq!(decoded.claims.room_id, "booth-5");
        assert_eq!(decoded.claims.user_id, "42");
        assert_eq!(decoded.claims.role, "broadcaster");
        assert_eq!(decoded.claims.token_type, "app");
        assert_eq!(decoded.claims.version, 2);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, TOKEN_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_audience_maps_to_viewer() {
        let provider = provider();
        let token = provider
            .generate_token("booth-5", 7, StreamRole::Audience)
            .await
            .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = false;
        validation.leeway = 60;
        let decoded = decode::<AppTokenClaims>(
            &token.token,
            &DecodingKey::from_secret(b"test-app-secret"),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.claims.role, "viewer");
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let provider = HundredMsProvider::new(HundredMsConfig::default());
        let err = provider
            .generate_token("booth-1", 1, StreamRole::Audience)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentials { .. }));

        let err = provider
            .create_channel("booth-1", ChannelOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_create_channel_idempotent_without_management_api() {
        let provider = provider();
        let a = provider
            .create_channel("booth-3", ChannelOptions::new())
            .await
            .unwrap();
        let b = provider
            .create_channel("booth-3", ChannelOptions::new())
            .await
            .unwrap();

        assert_eq!(a.channel_name, "booth-3");
        assert_eq!(a.channel_name, b.channel_name);
        assert_eq!(a.config, b.config);
        assert_eq!(
            a.config.get("template_id"),
            Some(&Value::String("template-1".into()))
        );
    }

    #[tokio::test]
    async fn test_channel_info_and_end_are_stubbed_locally() {
        let provider = provider();
        let info = provider.get_channel_info("booth-3").await.unwrap();
        assert!(info.active);

        let ended = provider.end_channel("never-created").await.unwrap();
        assert!(ended.ended);
    }

    #[test]
    fn test_recording_surcharge_on_publisher_minutes_only() {
        let provider = provider();
        let params = CostParams {
            peak_concurrent_users: 2000,
            duration_minutes: 60,
            number_of_booths: 2,
            quality: StreamQuality::Hd,
            recording: true,
        };

        let estimate = provider.calculate_cost(&params).unwrap();
        assert_eq!(estimate.breakdown.recording_minutes, 120);
        assert!((estimate.breakdown.recording_cost - 0.48).abs() < 1e-9);

        let without = provider
            .calculate_cost(&CostParams {
                recording: false,
                ..params
            })
            .unwrap();
        assert!(
            (estimate.estimated_cost - without.estimated_cost - 0.48).abs() < 1e-9
        );
    }

    #[test]
    fn test_quality_does_not_change_price() {
        let provider = provider();
        let base = CostParams {
            peak_concurrent_users: 5000,
            duration_minutes: 60,
            number_of_booths: 2,
            quality: StreamQuality::Hd,
            recording: false,
        };
        let hd = provider.calculate_cost(&base).unwrap();
        let fullhd = provider
            .calculate_cost(&CostParams {
                quality: StreamQuality::FullHd,
                ..base
            })
            .unwrap();
        assert_eq!(hd.estimated_cost, fullhd.estimated_cost);
    }
}
