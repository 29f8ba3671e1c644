//! Authentication.
//!
//! Clients exchange a username and password for a signed, time-limited bearer token. The
//! credential check is delegated to an external identity provider behind the
//! [IdentityProvider] trait; the gateway never stores credentials. Tokens are HS256 JWTs whose
//! signing secret is read-only process-wide configuration. A token may be revoked before its
//! natural expiry; the revocation set is the only shared mutable state in the gateway.
//!
//! Protected handlers take an [Identity] extractor argument, so token validation runs and
//! short-circuits before any dataset resolution or file access.

use crate::app_state::SharedAppState;
use crate::error::GatewayError;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use hashbrown::HashSet;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

/// A verified identity, bound to a validated token or a successful credential check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    /// Username the identity provider vouched for
    pub username: String,
}

/// Claims carried by a bearer token.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    /// Subject identity
    pub sub: String,
    /// Issued-at, seconds since the Unix epoch
    pub iat: u64,
    /// Expiry, seconds since the Unix epoch
    pub exp: u64,
    /// Token id, used for revocation
    pub jti: String,
}

/// Boundary to the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a credential pair, returning the authenticated identity.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, GatewayError>;
}

/// Identity provider reachable over HTTP with basic authentication.
pub struct HttpIdentityProvider {
    url: Url,
    client: reqwest::Client,
}

impl HttpIdentityProvider {
    /// Return a new HttpIdentityProvider.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpIdentityProvider { url, client })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, GatewayError> {
        let response = self
            .client
            .get(self.url.clone())
            .basic_auth(username, Some(password))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(Identity {
                username: username.to_string(),
            })
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(GatewayError::InvalidCredentials)
        } else {
            Err(GatewayError::UpstreamUnavailable {
                status: status.as_u16(),
            })
        }
    }
}

/// Issues and validates bearer tokens.
pub struct TokenService {
    provider: Arc<dyn IdentityProvider>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
    leeway: Duration,
    revoked: RwLock<HashSet<String>>,
}

/// Returns the current time in seconds since the Unix epoch.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

impl TokenService {
    /// Return a new TokenService.
    ///
    /// # Arguments
    ///
    /// * `provider`: identity provider consulted at issuance
    /// * `secret`: HS256 signing secret
    /// * `lifetime`: token lifespan
    /// * `leeway`: clock skew tolerated when checking expiry
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        secret: &str,
        lifetime: Duration,
        leeway: Duration,
    ) -> Self {
        TokenService {
            provider,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
            leeway,
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// Exchange a credential pair for a signed, time-limited token.
    ///
    /// Returns the token and its lifespan in seconds.
    pub async fn issue(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(String, u64), GatewayError> {
        let identity = self.provider.authenticate(username, password).await?;
        let now = unix_now();
        let claims = Claims {
            sub: identity.username,
            iat: now,
            exp: now + self.lifetime.as_secs(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(GatewayError::TokenInvalid)?;
        Ok((token, self.lifetime.as_secs()))
    }

    /// Validate a presented token, returning the identity it is bound to.
    pub fn validate(&self, token: &str) -> Result<Identity, GatewayError> {
        let claims = self.verify(token)?;
        let revoked = self.revoked.read().expect("revocation set lock poisoned");
        if revoked.contains(&claims.jti) {
            return Err(GatewayError::TokenRevoked);
        }
        Ok(Identity {
            username: claims.sub,
        })
    }

    /// Revoke a presented token before its natural expiry.
    ///
    /// Only tokens that still verify can be revoked; anything else is already unusable.
    pub fn revoke(&self, token: &str) -> Result<(), GatewayError> {
        let claims = self.verify(token)?;
        self.revoked
            .write()
            .expect("revocation set lock poisoned")
            .insert(claims.jti);
        Ok(())
    }

    /// Verify signature and expiry, returning the claims.
    fn verify(&self, token: &str) -> Result<Claims, GatewayError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway.as_secs();
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                if matches!(
                    err.kind(),
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature
                ) {
                    GatewayError::TokenExpired
                } else {
                    GatewayError::TokenInvalid(err)
                }
            })
    }
}

/// Extract a bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(GatewayError::TokenMissing)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(GatewayError::TokenMissing)?;
    Ok(token.to_string())
}

#[async_trait]
impl FromRequestParts<SharedAppState> for Identity {
    type Rejection = GatewayError;

    /// Validate the bearer token presented with the request.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        state.token_service.validate(&token)
    }
}
