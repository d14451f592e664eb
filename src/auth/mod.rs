use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::database::models::{User, UserRole};

/// Identity payload carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub store_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, username: String, role: UserRole, store_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        let ttl_days = config::config().security.token_ttl_days;
        Self {
            user_id,
            username,
            role,
            store_id,
            iat: now.timestamp(),
            exp: (now + Duration::days(ttl_days)).timestamp(),
        }
    }

    /// Expiry check mirroring the codec rule: a token is dead once the
    /// clock passes `exp`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Malformed, tampered, or expired. Callers treat this as
    /// "unauthenticated", never as a crash.
    #[error("Invalid token")]
    Invalid,
}

/// Signed-token codec. Two backends exist because token verification also
/// runs inside the request interceptor, which may execute in a restricted
/// runtime; both share the one configured secret and must accept and
/// reject the same token set identically.
pub trait TokenCodec {
    fn encode(&self, claims: &Claims) -> Result<String, TokenError>;
    fn decode(&self, token: &str) -> Result<Claims, TokenError>;
}

/// General-runtime backend over the `jsonwebtoken` crate. Used when
/// minting tokens at sign-in.
pub struct JsonWebTokenCodec {
    secret: String,
}

impl JsonWebTokenCodec {
    pub fn from_config() -> Result<Self, TokenError> {
        Self::with_secret(&config::config().security.jwt_secret)
    }

    pub fn with_secret(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self { secret: secret.to_string() })
    }
}

impl TokenCodec for JsonWebTokenCodec {
    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::default(), claims, &key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::default();
        // No clock leeway: expiry decisions must be deterministic and
        // identical across backends.
        validation.leeway = 0;

        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Restricted-runtime backend: HS256 compact JWTs assembled from hmac +
/// sha2 + base64 primitives only.
pub struct EdgeTokenCodec {
    secret: String,
}

impl EdgeTokenCodec {
    pub fn from_config() -> Result<Self, TokenError> {
        Self::with_secret(&config::config().security.jwt_secret)
    }

    pub fn with_secret(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self { secret: secret.to_string() })
    }

    fn sign(&self, input: &str) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(input.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[derive(Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

impl TokenCodec for EdgeTokenCodec {
    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = JwtHeader { alg: "HS256".to_string(), typ: "JWT".to_string() };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| TokenError::Signing(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(claims).map_err(|e| TokenError::Signing(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.sign(&signing_input)?;

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Invalid);
        };

        let header_json = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| TokenError::Invalid)?;
        let header: JwtHeader =
            serde_json::from_slice(&header_json).map_err(|_| TokenError::Invalid)?;
        if header.alg != "HS256" {
            return Err(TokenError::Invalid);
        }

        let signing_input = format!("{}.{}", header_b64, claims_b64);
        let signature = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| TokenError::Invalid)?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| TokenError::Invalid)?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::Invalid)?;

        let claims_json = URL_SAFE_NO_PAD.decode(claims_b64).map_err(|_| TokenError::Invalid)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| TokenError::Invalid)?;

        if claims.is_expired_at(Utc::now().timestamp()) {
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }
}

/// Mint a bearer token for an authenticated user.
pub fn issue(user: &User, store_id: Option<Uuid>) -> Result<String, TokenError> {
    let claims = Claims::new(user.id, user.username.clone(), user.role, store_id);
    JsonWebTokenCodec::from_config()?.encode(&claims)
}

/// Verify a token in the general server runtime.
pub fn verify(token: &str) -> Result<Claims, TokenError> {
    JsonWebTokenCodec::from_config()?.decode(token)
}

/// Verify a token in the request interceptor.
pub fn verify_edge(token: &str) -> Result<Claims, TokenError> {
    EdgeTokenCodec::from_config()?.decode(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "contract-test-secret";

    fn claims() -> Claims {
        Claims {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
            role: UserRole::Owner,
            store_id: Some(Uuid::new_v4()),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        }
    }

    fn expired_claims() -> Claims {
        Claims {
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
            ..claims()
        }
    }

    fn codecs() -> (JsonWebTokenCodec, EdgeTokenCodec) {
        (
            JsonWebTokenCodec::with_secret(SECRET).unwrap(),
            EdgeTokenCodec::with_secret(SECRET).unwrap(),
        )
    }

    #[test]
    fn round_trip_preserves_identity_fields() {
        let (server, edge) = codecs();
        let original = claims();

        for token in [server.encode(&original).unwrap(), edge.encode(&original).unwrap()] {
            let decoded = server.decode(&token).unwrap();
            assert_eq!(decoded, original);
            assert!(decoded.exp > Utc::now().timestamp());
        }
    }

    #[test]
    fn backends_accept_each_others_tokens() {
        let (server, edge) = codecs();
        let original = claims();

        let from_server = server.encode(&original).unwrap();
        let from_edge = edge.encode(&original).unwrap();

        assert_eq!(edge.decode(&from_server).unwrap(), original);
        assert_eq!(server.decode(&from_edge).unwrap(), original);
    }

    #[test]
    fn backends_reject_the_same_token_set() {
        let (server, edge) = codecs();

        let expired = server.encode(&expired_claims()).unwrap();
        let valid = server.encode(&claims()).unwrap();
        let tampered = {
            // Flip a character inside the payload segment
            let mut parts: Vec<String> = valid.split('.').map(String::from).collect();
            let mut payload = parts[1].clone();
            let replacement = if payload.ends_with('A') { "B" } else { "A" };
            payload.replace_range(payload.len() - 1.., replacement);
            parts[1] = payload;
            parts.join(".")
        };
        let wrong_secret =
            JsonWebTokenCodec::with_secret("other-secret").unwrap().encode(&claims()).unwrap();

        for bad in [expired.as_str(), tampered.as_str(), wrong_secret.as_str(), "", "a.b", "not a token"] {
            assert!(server.decode(bad).is_err(), "server codec accepted {:?}", bad);
            assert!(edge.decode(bad).is_err(), "edge codec accepted {:?}", bad);
        }
    }

    #[test]
    fn expired_rejection_is_deterministic() {
        let (server, edge) = codecs();
        let token = server.encode(&expired_claims()).unwrap();

        for _ in 0..3 {
            assert!(matches!(server.decode(&token), Err(TokenError::Invalid)));
            assert!(matches!(edge.decode(&token), Err(TokenError::Invalid)));
        }
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            JsonWebTokenCodec::with_secret(""),
            Err(TokenError::MissingSecret)
        ));
        assert!(matches!(EdgeTokenCodec::with_secret(""), Err(TokenError::MissingSecret)));
    }

    #[test]
    fn alg_substitution_is_rejected() {
        let (_, edge) = codecs();
        let original = claims();

        // Re-author the header with alg "none", keeping a valid-shaped body
        let claims_json = serde_json::to_vec(&original).unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(claims_json);
        let forged = format!("{}.{}.", header, body);

        assert!(edge.decode(&forged).is_err());
    }
}
