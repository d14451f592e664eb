use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::database::models::UserRole;
use crate::error::ApiError;

/// Public API paths that skip authentication entirely.
const EXCLUDED_API_PATHS: &[&str] = &["/api/auth/signin", "/api/auth/onboard", "/api/common"];

/// Role-gated path prefixes.
const ADMIN_ONLY_PATHS: &[&str] = &["/api/admin"];
const OWNER_ONLY_PATHS: &[&str] = &["/api/owner"];

/// Authenticated identity extracted from a verified token and injected
/// into request extensions for downstream handlers.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub store_id: Option<Uuid>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
            store_id: claims.store_id,
        }
    }
}

#[derive(Debug, PartialEq)]
enum RouteClass {
    /// Public — no auth.
    Excluded,
    /// `/api/...` guarded by a bearer token and role prefixes.
    Api,
    /// `/{username}/panel...` guarded by the token cookie and tenant
    /// isolation; failures redirect to sign-in instead of erroring.
    Panel { username: String },
    /// Everything else passes through untouched.
    Unmatched,
}

fn classify(path: &str) -> RouteClass {
    if path.starts_with("/api/") {
        if is_excluded(path) {
            return RouteClass::Excluded;
        }
        return RouteClass::Api;
    }
    if let Some(username) = panel_username(path) {
        return RouteClass::Panel { username: username.to_string() };
    }
    RouteClass::Unmatched
}

fn is_excluded(path: &str) -> bool {
    EXCLUDED_API_PATHS
        .iter()
        .any(|excluded| path == *excluded || path.starts_with(&format!("{}/", excluded)))
}

fn requires_admin(path: &str) -> bool {
    ADMIN_ONLY_PATHS.iter().any(|prefix| path.starts_with(prefix))
}

fn requires_owner(path: &str) -> bool {
    OWNER_ONLY_PATHS.iter().any(|prefix| path.starts_with(prefix))
}

/// Extract the tenant segment from `/{username}/panel[/...]`.
fn panel_username(path: &str) -> Option<&str> {
    let mut segments = path.strip_prefix('/')?.split('/');
    let username = segments.next().filter(|s| !s.is_empty())?;
    match segments.next() {
        Some("panel") => Some(username),
        _ => None,
    }
}

/// Request gatekeeper. Classifies every inbound path and enforces the
/// matching auth policy before handlers run.
pub async fn gatekeeper(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    match classify(&path) {
        RouteClass::Excluded | RouteClass::Unmatched => next.run(request).await,
        RouteClass::Api => match authorize_api(&path, request.headers()) {
            Ok(claims) => {
                tracing::debug!("API access granted for {} on {}", claims.username, path);
                inject_identity(&mut request, claims);
                next.run(request).await
            }
            Err(err) => err.into_response(),
        },
        RouteClass::Panel { username } => match authorize_panel(&username, &jar) {
            Ok(claims) => {
                tracing::debug!("Panel access granted for {}", claims.username);
                inject_identity(&mut request, claims);
                next.run(request).await
            }
            Err(reason) => {
                tracing::debug!("Panel access denied on {}: {}", path, reason);
                redirect_to_signin(&path)
            }
        },
    }
}

fn authorize_api(path: &str, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let token = bearer_token(headers)?;

    let claims = auth::verify_edge(&token).map_err(|_| {
        tracing::debug!("Token verification failed for {}", path);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    // The codec already validates exp; re-check against the clock so a
    // verifier misconfiguration cannot quietly admit stale tokens.
    if claims.is_expired_at(Utc::now().timestamp()) {
        return Err(ApiError::unauthorized("Token has expired"));
    }

    if requires_admin(path) && claims.role != UserRole::Admin {
        tracing::debug!("Role {:?} denied on admin path {}", claims.role, path);
        return Err(ApiError::forbidden("Admin access required"));
    }
    if requires_owner(path) && claims.role != UserRole::Owner {
        tracing::debug!("Role {:?} denied on owner path {}", claims.role, path);
        return Err(ApiError::forbidden("Owner access required"));
    }

    Ok(claims)
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Authorization header is required"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;

    // Tolerate a bare token without the Bearer prefix, as the original
    // clients sometimes sent one.
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("Token is required"));
    }
    Ok(token.to_string())
}

fn authorize_panel(route_username: &str, jar: &CookieJar) -> Result<Claims, &'static str> {
    let token = jar.get("token").map(|c| c.value().to_string()).ok_or("no token cookie")?;

    let claims = auth::verify_edge(&token).map_err(|_| "token verification failed")?;

    if claims.is_expired_at(Utc::now().timestamp()) {
        return Err("token expired");
    }

    // Tenant isolation: a user may only view their own panel, regardless
    // of role.
    if claims.username != route_username {
        tracing::warn!("{} attempted to access {}'s panel", claims.username, route_username);
        return Err("tenant mismatch");
    }

    Ok(claims)
}

/// Send the browser back through sign-in, preserving the originally
/// requested path so it can return after authenticating.
fn redirect_to_signin(path: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    Redirect::to(&format!("/signin?redirect={}", encoded)).into_response()
}

/// Expose the verified identity to handlers: typed extension for Rust
/// consumers, `x-user-*` headers for anything downstream that only sees
/// the raw request.
fn inject_identity(request: &mut Request, claims: Claims) {
    let headers = request.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&claims.user_id.to_string()) {
        headers.insert("x-user-id", v);
    }
    if let Ok(v) = HeaderValue::from_str(claims.role.as_str()) {
        headers.insert("x-user-role", v);
    }
    if let Ok(v) = HeaderValue::from_str(&claims.username) {
        headers.insert("x-username", v);
    }

    request.extensions_mut().insert(AuthUser::from(claims));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_api_and_exclusions() {
        assert_eq!(classify("/api/auth/signin"), RouteClass::Excluded);
        assert_eq!(classify("/api/auth/onboard"), RouteClass::Excluded);
        assert_eq!(classify("/api/common/banners"), RouteClass::Excluded);
        assert_eq!(classify("/api/admin/plans/list"), RouteClass::Api);
        assert_eq!(classify("/api/owner/products"), RouteClass::Api);
    }

    #[test]
    fn classifies_panel_routes() {
        assert_eq!(
            classify("/alice/panel"),
            RouteClass::Panel { username: "alice".to_string() }
        );
        assert_eq!(
            classify("/alice/panel/plan-history"),
            RouteClass::Panel { username: "alice".to_string() }
        );
        assert_eq!(classify("/alice/settings"), RouteClass::Unmatched);
        assert_eq!(classify("/signin"), RouteClass::Unmatched);
        assert_eq!(classify("/"), RouteClass::Unmatched);
    }

    #[test]
    fn role_prefixes() {
        assert!(requires_admin("/api/admin/dashboard/stats"));
        assert!(!requires_admin("/api/owner/products"));
        assert!(requires_owner("/api/owner/products"));
    }
}
