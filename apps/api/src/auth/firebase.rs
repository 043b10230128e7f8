use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::{header::CACHE_CONTROL, Client};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AuthError, IdentityVerifier, VerifiedIdentity};

/// Public keys that sign Firebase Auth ID tokens.
const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

struct CachedKeys {
    keys: Arc<JwkSet>,
    expires_at: Instant,
}

/// Verifies Firebase ID tokens locally against Google's rotating JWKS.
///
/// Keys are cached until the `Cache-Control: max-age` Google sends expires; an
/// unknown `kid` forces one refresh before the token is rejected.
pub struct FirebaseVerifier {
    client: Client,
    project_id: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: String) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        Ok(Self {
            client,
            project_id,
            cache: RwLock::new(None),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("{ISSUER_PREFIX}{}", self.project_id)]);
        validation.set_required_spec_claims(&["exp", "iat", "aud", "iss", "sub"]);
        validation
    }

    async fn keys(&self, force_refresh: bool) -> Result<Arc<JwkSet>, AuthError> {
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock.
        if !force_refresh {
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let fetched = self.fetch_keys().await?;
        let keys = fetched.keys.clone();
        *cache = Some(fetched);
        Ok(keys)
    }

    async fn fetch_keys(&self) -> Result<CachedKeys, AuthError> {
        let response = self
            .client
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::KeyFetch(format!("JWKS endpoint returned {status}")));
        }

        let ttl = parse_max_age(
            response
                .headers()
                .get(CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
        )
        .unwrap_or(DEFAULT_KEY_TTL);

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        info!(
            "Fetched {} token signing keys (cached for {}s)",
            keys.keys.len(),
            ttl.as_secs()
        );
        Ok(CachedKeys {
            keys: Arc::new(keys),
            expires_at: Instant::now() + ttl,
        })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::InvalidCredential(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidCredential(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidCredential("token has no key id".to_string()))?;

        let mut keys = self.keys(false).await?;
        if keys.find(&kid).is_none() {
            debug!("Signing key {kid} not cached, refreshing");
            keys = self.keys(true).await?;
        }
        let jwk = keys.find(&kid).ok_or_else(|| {
            AuthError::InvalidCredential(format!("unknown signing key {kid}"))
        })?;

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::KeyFetch(format!("unusable signing key {kid}: {e}")))?;

        let claims = decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|e| {
                warn!("ID token rejected: {e}");
                AuthError::InvalidCredential(e.to_string())
            })?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidCredential("token has an empty subject".to_string()));
        }

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }

    async fn ping(&self) -> Result<(), AuthError> {
        self.keys(false).await.map(|_| ())
    }
}

/// Extracts `max-age` from a `Cache-Control` header value.
fn parse_max_age(header: Option<&str>) -> Option<Duration> {
    header?
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn verifier() -> FirebaseVerifier {
        FirebaseVerifier::new("aura-test".to_string()).unwrap()
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(
            parse_max_age(Some("public, max-age=19302, must-revalidate, no-transform")),
            Some(Duration::from_secs(19302))
        );
        assert_eq!(parse_max_age(Some("no-cache")), None);
        assert_eq!(parse_max_age(Some("max-age=soon")), None);
        assert_eq!(parse_max_age(None), None);
    }

    #[test]
    fn test_validation_pins_project_audience_and_issuer() {
        let validation = verifier().validation();
        assert_eq!(validation.algorithms, vec![Algorithm::RS256]);
        assert!(validation
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains("aura-test")));
        assert!(validation
            .iss
            .as_ref()
            .is_some_and(|iss| iss.contains("https://securetoken.google.com/aura-test")));
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage_before_fetching_keys() {
        let result = verifier().verify("not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn test_verify_rejects_symmetric_tokens() {
        #[derive(serde::Serialize)]
        struct Claims {
            sub: String,
            exp: i64,
        }
        let token = encode(
            &Header::default(),
            &Claims {
                sub: "uid-1".to_string(),
                exp: 4_102_444_800,
            },
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let result = verifier().verify(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }
}
