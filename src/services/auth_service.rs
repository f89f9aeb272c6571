use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identity carried by a token: the email plus whatever user fields the
/// client sent to `/api/set-token`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityClaims {
    pub email: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IdentityClaims {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into(), fields: Map::new() }
    }
}

// Wire payload: identity plus registered claims.
#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    #[serde(flatten)]
    identity: IdentityClaims,
    iat: i64,
    exp: i64,
    jti: String,
}

const RESERVED: [&str; 3] = ["iat", "exp", "jti"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Stateless HS256 token issuer and verifier.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, claims: IdentityClaims) -> Result<String, TokenError> {
        self.issue_at(claims, Utc::now())
    }

    pub fn issue_at(&self, mut claims: IdentityClaims, now: DateTime<Utc>) -> Result<String, TokenError> {
        for key in RESERVED {
            claims.fields.remove(key);
        }
        // A nested "email" would collide with the top-level one when flattened.
        claims.fields.remove("email");

        let payload = TokenPayload {
            identity: claims,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Checks signature and expiry against `now`; any failure is `Invalid`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        let data = decode::<TokenPayload>(token, &self.decoding, &validation).map_err(|_| TokenError::Invalid)?;
        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Invalid);
        }
        let mut identity = data.claims.identity;
        for key in RESERVED {
            identity.fields.remove(key);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> TokenService {
        TokenService::new("test-secret", 24)
    }

    fn claims() -> IdentityClaims {
        let mut claims = IdentityClaims::new("ana@yoga.io");
        claims.fields.insert("name".into(), json!("Ana"));
        claims.fields.insert("photoUrl".into(), json!("https://img/ana.png"));
        claims
    }

    #[test]
    fn test_round_trip_keeps_claims() {
        let service = service();
        let token = service.issue(claims()).unwrap();
        assert_eq!(service.verify(&token).unwrap(), claims());
    }

    #[test]
    fn test_expires_after_ttl() {
        let service = service();
        let issued = Utc::now();
        let token = service.issue_at(claims(), issued).unwrap();

        assert!(service.verify_at(&token, issued + Duration::hours(23) + Duration::minutes(59)).is_ok());
        assert_eq!(service.verify_at(&token, issued + Duration::hours(24)), Err(TokenError::Invalid));
        assert_eq!(service.verify_at(&token, issued + Duration::hours(25)), Err(TokenError::Invalid));
    }

    #[test]
    fn test_rejects_foreign_signature_and_garbage() {
        let token = TokenService::new("other-secret", 24).issue(claims()).unwrap();
        assert_eq!(service().verify(&token), Err(TokenError::Invalid));
        assert_eq!(service().verify("not.a.token"), Err(TokenError::Invalid));
        assert_eq!(service().verify(""), Err(TokenError::Invalid));
    }

    #[test]
    fn test_caller_supplied_expiry_is_ignored() {
        let service = service();
        let mut forged = claims();
        forged.fields.insert("exp".into(), json!(4_102_444_800_i64));
        let issued = Utc::now();
        let token = service.issue_at(forged, issued).unwrap();

        assert_eq!(service.verify_at(&token, issued + Duration::hours(25)), Err(TokenError::Invalid));
        assert_eq!(service.verify_at(&token, issued).unwrap(), claims());
    }
}
