//! Admin authentication.
//!
//! Operators log in with a username and password checked against a salted
//! SHA-256 digest. A successful login issues a signed token carried in the
//! `admin-token` cookie (or a Bearer header, for the CLI). Tokens are the
//! hex-encoded JSON claims followed by a hex HMAC-SHA256 over them.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use concierge_admin::{Operator, ADMIN_ROLE};

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

pub const AUTH_COOKIE: &str = "admin-token";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const ADMIN_ID: &str = "1";
const ADMIN_NAME: &str = "Administrator";

type HmacSha256 = Hmac<Sha256>;

/// Hex SHA-256 of `salt` followed by `password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    id: String,
    username: String,
    role: String,
    exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

/// Credentials and signing key for the single configured operator.
#[derive(Clone)]
pub struct AdminAuth {
    username: String,
    password_hash: Option<String>,
    salt: String,
    token_secret: String,
    token_ttl: Duration,
}

impl AdminAuth {
    pub fn new(
        username: impl Into<String>,
        password_hash: Option<String>,
        salt: impl Into<String>,
        token_secret: impl Into<String>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.map(|h| h.to_ascii_lowercase()),
            salt: salt.into(),
            token_secret: token_secret.into(),
            token_ttl,
        }
    }

    /// Login is disabled until a password hash is configured.
    pub fn is_enabled(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<Operator> {
        let expected = self.password_hash.as_deref()?;
        let digest = hash_password(&self.salt, password);
        let user_ok = username == self.username;
        let pass_ok = self.digest_matches(&digest, expected);
        (user_ok && pass_ok).then(|| Operator {
            id: ADMIN_ID.to_string(),
            username: self.username.clone(),
            name: ADMIN_NAME.to_string(),
            role: ADMIN_ROLE.to_string(),
        })
    }

    pub fn issue_token(&self, operator: &Operator, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            id: operator.id.clone(),
            username: operator.username.clone(),
            role: operator.role.clone(),
            exp: (now + self.token_ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac()?;
        mac.update(&payload);
        let sig = mac.finalize().into_bytes();
        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(sig)))
    }

    pub fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Result<Operator, TokenError> {
        let (payload_hex, sig_hex) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = hex::decode(payload_hex).map_err(|_| TokenError::Malformed)?;
        let sig = hex::decode(sig_hex).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        let name = if claims.role == ADMIN_ROLE {
            ADMIN_NAME.to_string()
        } else {
            claims.username.clone()
        };
        Ok(Operator {
            id: claims.id,
            username: claims.username,
            name,
            role: claims.role,
        })
    }

    /// Compares MACs of both digests so the check goes through the
    /// constant-time `verify_slice`.
    fn digest_matches(&self, candidate: &str, expected: &str) -> bool {
        let Ok(mut reference) = self.mac() else {
            return false;
        };
        reference.update(expected.as_bytes());
        let tag = reference.finalize().into_bytes();

        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(candidate.as_bytes());
        mac.verify_slice(&tag).is_ok()
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.token_secret.as_bytes()).map_err(|_| TokenError::BadSignature)
    }

    fn cookie_max_age(&self) -> i64 {
        self.token_ttl.num_seconds()
    }
}

/// Token from the `admin-token` cookie, else a Bearer header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
    })
}

/// Extractor that admits only a valid, unexpired admin token.
pub struct RequireAdmin(pub Operator);

#[async_trait]
impl FromRequestParts<GatewayState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        let operator = authenticated(&parts.headers, state)?;
        if !operator.is_admin() {
            warn!(username = %operator.username, "Non-admin token rejected");
            return Err(ApiError::Forbidden);
        }
        Ok(RequireAdmin(operator))
    }
}

fn authenticated(headers: &HeaderMap, state: &GatewayState) -> ApiResult<Operator> {
    let token = token_from_headers(headers).ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    state.auth.verify_token(&token, Utc::now()).map_err(|e| {
        warn!(reason = ?e, "Rejected admin token");
        ApiError::unauthorized("Invalid token")
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// `POST /api/admin/auth`
pub async fn login(
    State(state): State<GatewayState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(username), Some(password)) = (
        req.username.filter(|u| !u.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Username and password are required"));
    };

    let Some(operator) = state.auth.authenticate(&username, &password) else {
        warn!(%username, "Failed admin login");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    let token = state
        .auth
        .issue_token(&operator, Utc::now())
        .map_err(|e| ApiError::from(anyhow::anyhow!("failed to sign admin token: {e:?}")))?;
    let cookie = format!(
        "{AUTH_COOKIE}={token}; HttpOnly; SameSite=Lax; Max-Age={}; Path=/",
        state.auth.cookie_max_age()
    );
    info!(username = %operator.username, "Admin logged in");
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "success": true, "user": operator })),
    ))
}

/// `DELETE /api/admin/auth`
pub async fn logout() -> impl IntoResponse {
    let cookie = format!("{AUTH_COOKIE}=; HttpOnly; SameSite=Lax; Max-Age=0; Path=/");
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "success": true })),
    )
}

/// `GET /api/admin/auth/verify`
pub async fn verify(State(state): State<GatewayState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let operator = authenticated(&headers, &state)?;
    if !operator.is_admin() {
        return Err(ApiError::Forbidden);
    }
    Ok(Json(json!({ "user": operator })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth() -> AdminAuth {
        AdminAuth::new(
            "admin",
            Some(hash_password("pepper", "rahasia")),
            "pepper",
            "signing-key",
            Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        )
    }

    #[test]
    fn test_hash_password_is_salted_sha256() {
        assert_eq!(
            hash_password("", "abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_password("s1", "abc"), hash_password("s2", "abc"));
    }

    #[test]
    fn test_authenticate() {
        let auth = auth();
        let op = auth.authenticate("admin", "rahasia").unwrap();
        assert!(op.is_admin());
        assert!(auth.authenticate("admin", "salah").is_none());
        assert!(auth.authenticate("root", "rahasia").is_none());

        let disabled = AdminAuth::new("admin", None, "", "k", Duration::hours(1));
        assert!(!disabled.is_enabled());
        assert!(disabled.authenticate("admin", "").is_none());
    }

    #[test]
    fn test_digest_compare_handles_mismatched_lengths() {
        let auth = auth();
        let digest = hash_password("pepper", "rahasia");
        assert!(auth.digest_matches(&digest, &digest));
        assert!(!auth.digest_matches(&digest, &digest[..10]));
        assert!(!auth.digest_matches("", &digest));

        // A truncated hash in the config never lets anyone in.
        let truncated = AdminAuth::new(
            "admin",
            Some(digest[..32].to_string()),
            "pepper",
            "signing-key",
            Duration::hours(1),
        );
        assert!(truncated.authenticate("admin", "rahasia").is_none());

        // Works with an empty signing key too.
        let unkeyed = AdminAuth::new("admin", Some(digest.clone()), "pepper", "", Duration::hours(1));
        assert!(unkeyed.authenticate("admin", "rahasia").is_some());
    }

    #[test]
    fn test_token_roundtrip_and_expiry() {
        let auth = auth();
        let now = Utc::now();
        let op = Operator::admin("admin");
        let token = auth.issue_token(&op, now).unwrap();

        let verified = auth.verify_token(&token, now).unwrap();
        assert_eq!(verified.username, "admin");
        assert!(verified.is_admin());

        assert_eq!(
            auth.verify_token(&token, now + Duration::hours(25)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tampered_or_foreign_tokens_are_rejected() {
        let auth = auth();
        let now = Utc::now();
        let token = auth.issue_token(&Operator::admin("admin"), now).unwrap();

        let other = AdminAuth::new("admin", None, "", "another-key", Duration::hours(1));
        assert_eq!(other.verify_token(&token, now), Err(TokenError::BadSignature));

        let (payload, sig) = token.split_once('.').unwrap();
        let forged_claims = serde_json::json!({
            "id": "1", "username": "admin", "role": "admin", "exp": i64::MAX
        });
        let forged = format!("{}.{}", hex::encode(forged_claims.to_string()), sig);
        assert_eq!(auth.verify_token(&forged, now), Err(TokenError::BadSignature));
        assert_eq!(auth.verify_token(payload, now), Err(TokenError::Malformed));
        assert_eq!(auth.verify_token("zz.zz", now), Err(TokenError::Malformed));
    }

    #[test]
    fn test_token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; admin-token=xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));
    }
}
