//! HS256 token issuance and verification.
//!
//! # Responsibilities
//! - Sign compact JWS tokens carrying `sub`, `iat`, `exp`, a unique `jti` and
//!   extra claims
//! - Verify signature and structure
//! - Decide validity for a principal (`sub` matches, `exp` in the future)
//!
//! # Design Decisions
//! - `verify` checks the signature but not expiry: logout needs the `exp` of
//!   a token that may already be expired, and the gate reports expiry as its
//!   own outcome
//! - The configured secret is base64; the decoded bytes are the HMAC key

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::principal::Principal;
use super::AuthError;
use crate::config::validation::MIN_SECRET_BYTES;
use crate::config::JwtConfig;

const RESERVED_CLAIMS: [&str; 4] = ["sub", "iat", "exp", "jti"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Subject matches and expiry is strictly after `now`.
    pub fn is_valid_for(&self, identity: &str, now: DateTime<Utc>) -> bool {
        self.sub == identity && self.exp > now.timestamp()
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, AuthError> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or(AuthError::InvalidToken)
    }

    /// Lifetime left at `now`, or `None` once expired. An `exp` outside the
    /// millisecond range is rejected rather than wrapped.
    pub fn remaining(&self, now: DateTime<Utc>) -> Result<Option<Duration>, AuthError> {
        let left_ms = self
            .exp
            .checked_mul(1000)
            .and_then(|exp_ms| exp_ms.checked_sub(now.timestamp_millis()))
            .ok_or(AuthError::InvalidToken)?;
        Ok((left_ms > 0).then(|| Duration::from_millis(left_ms as u64)))
    }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiration: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Result<Self, AuthError> {
        Self::from_secret(
            &config.secret_key,
            Duration::from_secs(config.expiration_secs),
        )
    }

    pub fn from_secret(secret_b64: &str, expiration: Duration) -> Result<Self, AuthError> {
        let key = STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| AuthError::Key(format!("secret is not valid base64: {}", e)))?;
        if key.len() < MIN_SECRET_BYTES {
            return Err(AuthError::Key(format!(
                "secret decodes to {} bytes, at least {} required",
                key.len(),
                MIN_SECRET_BYTES
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            validation,
            expiration,
        })
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    pub fn issue(&self, subject: &str, extra: Map<String, Value>) -> Result<String, AuthError> {
        self.issue_at(subject, extra, Utc::now())
    }

    /// Issue with an explicit clock.
    pub fn issue_at(
        &self,
        subject: &str,
        mut extra: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        for reserved in RESERVED_CLAIMS {
            extra.remove(reserved);
        }
        // Two tokens for one subject in the same second must still differ,
        // or revoking one would revoke both.
        extra.insert("jti".into(), Value::String(Uuid::new_v4().to_string()));
        let iat = now.timestamp();
        let exp = i64::try_from(self.expiration.as_secs())
            .ok()
            .and_then(|secs| iat.checked_add(secs))
            .ok_or_else(|| AuthError::Signing("token expiration out of range".into()))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat,
            exp,
            extra,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature and structure. Expired tokens still verify.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                AuthError::InvalidToken
            })
    }

    pub fn is_valid(&self, token: &str, principal: &Principal) -> bool {
        self.is_valid_at(token, principal, Utc::now())
    }

    pub fn is_valid_at(&self, token: &str, principal: &Principal, now: DateTime<Utc>) -> bool {
        self.verify(token)
            .map(|claims| claims.is_valid_for(&principal.identity, now))
            .unwrap_or(false)
    }

    pub fn extract_subject(&self, token: &str) -> Result<String, AuthError> {
        self.verify(token).map(|claims| claims.sub)
    }

    pub fn extract_expiration(&self, token: &str) -> Result<DateTime<Utc>, AuthError> {
        self.verify(token)?.expires_at()
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Role;
    use serde_json::json;

    fn secret() -> String {
        STANDARD.encode(b"0123456789abcdef0123456789abcdef")
    }

    fn codec() -> TokenCodec {
        TokenCodec::from_secret(&secret(), Duration::from_secs(3600)).unwrap()
    }

    fn alice() -> Principal {
        Principal::new("alice@example.com", "Alice", "A", "hash", Role::User)
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let codec = codec();
        let token = codec.issue("alice@example.com", Map::new()).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.exp, claims.iat + 3600);
        assert!(codec.is_valid(&token, &alice()));
    }

    #[test]
    fn test_extra_claims_cannot_override_reserved() {
        let codec = codec();
        let mut extra = Map::new();
        extra.insert("sub".into(), json!("mallory@example.com"));
        extra.insert("exp".into(), json!(i64::MAX));
        extra.insert("tenant".into(), json!("acme"));

        let token = codec.issue("alice@example.com", extra).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.exp, claims.iat + 3600);
        assert_eq!(claims.extra.get("tenant"), Some(&json!("acme")));
    }

    #[test]
    fn test_tokens_issued_together_differ() {
        let codec = codec();
        let now = Utc::now();
        let a = codec.issue_at("alice@example.com", Map::new(), now).unwrap();
        let b = codec.issue_at("alice@example.com", Map::new(), now).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_token_verifies_but_is_invalid() {
        let codec = codec();
        let issued = Utc::now() - chrono::Duration::hours(2);
        let token = codec.issue_at("alice@example.com", Map::new(), issued).unwrap();

        assert!(codec.verify(&token).is_ok());
        assert!(!codec.is_valid(&token, &alice()));
        assert!(codec.extract_expiration(&token).unwrap() < Utc::now());
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue_at("alice@example.com", Map::new(), now).unwrap();
        let exp = codec.extract_expiration(&token).unwrap();

        assert!(codec.is_valid_at(&token, &alice(), exp - chrono::Duration::seconds(1)));
        assert!(!codec.is_valid_at(&token, &alice(), exp));
    }

    #[test]
    fn test_subject_mismatch_is_invalid() {
        let codec = codec();
        let token = codec.issue("bob@example.com", Map::new()).unwrap();
        assert!(!codec.is_valid(&token, &alice()));
    }

    #[test]
    fn test_tampered_and_foreign_tokens_rejected() {
        let codec = codec();
        let token = codec.issue("alice@example.com", Map::new()).unwrap();

        // Bob's header and payload under Alice's signature.
        let bob = codec.issue("bob@example.com", Map::new()).unwrap();
        let signature = token.rsplit('.').next().unwrap();
        let body = bob.rsplit_once('.').unwrap().0;
        let spliced = format!("{}.{}", body, signature);
        assert!(matches!(codec.verify(&spliced), Err(AuthError::InvalidToken)));

        let other = TokenCodec::from_secret(
            &STANDARD.encode([9u8; 32]),
            Duration::from_secs(3600),
        )
        .unwrap();
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
        assert!(matches!(codec.verify("not.a.jwt"), Err(AuthError::InvalidToken)));
        assert!(!codec.is_valid("garbage", &alice()));
    }

    #[test]
    fn test_wrong_algorithm_rejected() {
        let key = STANDARD.decode(secret()).unwrap();
        let claims = json!({"sub": "alice@example.com", "iat": 0, "exp": i64::MAX / 2});
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(&key),
        )
        .unwrap();
        assert!(codec().verify(&token).is_err());
    }

    #[test]
    fn test_missing_exp_rejected() {
        let key = STANDARD.decode(secret()).unwrap();
        let claims = json!({"sub": "alice@example.com", "iat": 0});
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&key),
        )
        .unwrap();
        assert!(codec().verify(&token).is_err());
    }

    #[test]
    fn test_short_or_invalid_secret_rejected() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            TokenCodec::from_secret(&short, Duration::from_secs(60)),
            Err(AuthError::Key(_))
        ));
        assert!(matches!(
            TokenCodec::from_secret("***", Duration::from_secs(60)),
            Err(AuthError::Key(_))
        ));
    }

    #[test]
    fn test_remaining_lifetime() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue_at("alice@example.com", Map::new(), now).unwrap();
        let claims = codec.verify(&token).unwrap();

        let left = claims.remaining(now).unwrap().unwrap();
        assert!(left <= Duration::from_secs(3600));
        assert!(left > Duration::from_secs(3598));
        assert!(claims
            .remaining(now + chrono::Duration::hours(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_remaining_rejects_out_of_range_exp() {
        let claims = Claims {
            sub: "alice@example.com".into(),
            iat: 0,
            exp: i64::MAX / 100,
            extra: Map::new(),
        };
        assert!(matches!(
            claims.remaining(Utc::now()),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_huge_expiration_does_not_wrap() {
        let codec = TokenCodec::from_secret(&secret(), Duration::from_secs(u64::MAX)).unwrap();
        assert!(matches!(
            codec.issue("alice@example.com", Map::new()),
            Err(AuthError::Signing(_))
        ));

        // Fits in seconds but not in milliseconds.
        let codec =
            TokenCodec::from_secret(&secret(), Duration::from_secs(10_000_000_000_000_000)).unwrap();
        let token = codec.issue("alice@example.com", Map::new()).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert!(matches!(
            claims.remaining(Utc::now()),
            Err(AuthError::InvalidToken)
        ));
    }
}
