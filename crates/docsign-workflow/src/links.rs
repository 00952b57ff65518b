//! Signer link tokens signed with HMAC-SHA256
//!
//! A token is `base64url(claims).base64url(mac)`. The claims carry the
//! collection, the signer and the expiry; the mac binds them to the
//! deployment's link secret.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use docsign_types::{AppConfiguration, CompanyConfiguration, DocumentCollection, Signer};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{PortError, PortResult};
use crate::ports::{LinkGenerator, SignerLink};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkClaims {
    /// Collection id
    pub cid: Uuid,
    /// Signer id
    pub sid: Uuid,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Makes every regenerated link distinct
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkTokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid token signature")]
    Signature,
    #[error("token expired")]
    Expired,
}

pub struct HmacLinkGenerator {
    secret: Vec<u8>,
    expiry: Duration,
    app: AppConfiguration,
}

impl HmacLinkGenerator {
    pub fn new(secret: &str, expiry: std::time::Duration, app: AppConfiguration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            expiry: Duration::from_std(expiry).unwrap_or_else(|_| Duration::days(7)),
            app,
        }
    }

    fn mac(&self) -> PortResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| PortError::rejected("link-generator", format!("HMAC error: {}", e)))
    }

    pub fn encode(&self, claims: &LinkClaims) -> PortResult<String> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| PortError::rejected("link-generator", e.to_string()))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac()?;
        mac.update(payload_b64.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload_b64, signature_b64))
    }

    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<LinkClaims, LinkTokenError> {
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(LinkTokenError::Format)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| LinkTokenError::Format)?;
        let mut mac = self.mac().map_err(|_| LinkTokenError::Signature)?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| LinkTokenError::Signature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| LinkTokenError::Format)?;
        let claims: LinkClaims =
            serde_json::from_slice(&payload).map_err(|_| LinkTokenError::Format)?;

        if claims.exp <= now.timestamp() {
            return Err(LinkTokenError::Expired);
        }
        Ok(claims)
    }
}

#[async_trait]
impl LinkGenerator for HmacLinkGenerator {
    async fn generate_signing_link(
        &self,
        collection: &DocumentCollection,
        signer: &Signer,
        company: &CompanyConfiguration,
    ) -> PortResult<SignerLink> {
        let now = Utc::now();
        let expires_at = now + self.expiry;
        let claims = LinkClaims {
            cid: collection.id,
            sid: signer.id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nonce: Uuid::new_v4().simple().to_string(),
        };
        let token = self.encode(&claims)?;
        let url = format!(
            "{}/{}?lang={}",
            self.app.signing_base_url.trim_end_matches('/'),
            token,
            if company.language.is_empty() {
                "en"
            } else {
                company.language.as_str()
            }
        );

        Ok(SignerLink {
            signer_id: signer.id,
            url,
            token,
            expires_at,
        })
    }
}
