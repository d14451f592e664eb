use axum::{http::StatusCode, response::Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth;
use crate::config;
use crate::database::models::{Store, StoreSummary, User, UserRole};
use crate::database::pool::db_pool;
use crate::error::ApiError;
use crate::services::enrichment;

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/signin - authenticate with username or phone number.
///
/// On success the response body carries the bearer token for API clients,
/// and the `token` / `user-info` cookies are set for browser panel
/// navigation (the browser cannot attach custom headers to a page load).
pub async fn signin(
    jar: CookieJar,
    Json(body): Json<SigninRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(ApiError::bad_request("Username/phone and password are required"));
    };
    if username.trim().is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Username/phone and password are required"));
    }

    let pool = db_pool().await?;
    let lookup = username.trim();

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM \"users\" WHERE \"username\" = $1 OR \"phone_number\" = $1",
    )
    .bind(lookup)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let valid = bcrypt::verify(&password, &user.password_hash)
        .map_err(|e| ApiError::internal_with_detail("Failed to verify credentials", e.to_string()))?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let store = enrichment::find_store_by_owner(pool, user.id).await?;
    let token = auth::issue(&user, store.as_ref().map(|s| s.id))?;

    let jar = session_cookies(jar, &token, &user);

    Ok((
        jar,
        Json(json!({
            "success": true,
            "message": "Login successful",
            "data": {
                "user": user,
                "token": token,
            },
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct OnboardRequest {
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
}

/// POST /api/auth/onboard - register an owner (or admin) and create the
/// default storefront alongside.
pub async fn onboard(
    Json(body): Json<OnboardRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (Some(username), Some(phone_number), Some(password)) =
        (body.username, body.phone_number, body.password)
    else {
        return Err(ApiError::bad_request(
            "Username, phone number, and password are required",
        ));
    };

    let username = username.trim().to_string();
    let phone_number = phone_number.trim().to_string();
    if username.is_empty() || phone_number.is_empty() {
        return Err(ApiError::bad_request(
            "Username, phone number, and password are required",
        ));
    }

    let role = match body.role.as_deref() {
        None => UserRole::Owner,
        Some(raw) => UserRole::parse(raw).ok_or_else(|| {
            ApiError::bad_request("Invalid user role. Must be either \"owner\" or \"admin\"")
        })?,
    };

    if password.len() < 6 {
        return Err(ApiError::bad_request("Password must be at least 6 characters long"));
    }

    if !is_valid_phone(&phone_number) {
        return Err(ApiError::bad_request("Invalid phone number format"));
    }

    let pool = db_pool().await?;

    if let Some(existing) = sqlx::query_as::<_, User>(
        "SELECT * FROM \"users\" WHERE \"username\" = $1 OR \"phone_number\" = $2",
    )
    .bind(&username)
    .bind(&phone_number)
    .fetch_optional(pool)
    .await?
    {
        let field = if existing.username == username { "Username" } else { "Phone number" };
        return Err(ApiError::conflict(format!("{} already exists", field)));
    }

    let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_with_detail("Failed to hash password", e.to_string()))?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO \"users\" (\"username\", \"phone_number\", \"password_hash\", \"role\") \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&username)
    .bind(&phone_number)
    .bind(&password_hash)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique_violation(e, "Username or phone number already exists"))?;

    let email = body.email.filter(|e| !e.trim().is_empty()).unwrap_or_else(|| {
        format!("{}@storehub.example", user.username)
    });

    let store = sqlx::query_as::<_, Store>(
        "INSERT INTO \"stores\" \
         (\"display_name\", \"owner_id\", \"description\", \"email\", \"logo\", \"contact\", \"about\") \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(format!("{}'s Store", user.username))
    .bind(user.id)
    .bind("Premium quality products with exceptional customer service")
    .bind(&email)
    .bind("")
    .bind(default_contact())
    .bind(default_about())
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique_violation(e, "Store name or email already exists"))?;

    let token = auth::issue(&user, Some(store.id))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully and store created",
            "data": {
                "user": user,
                "store": StoreSummary::from(&store),
                "token": token,
            },
        })),
    ))
}

fn session_cookies(jar: CookieJar, token: &str, user: &User) -> CookieJar {
    let security = &config::config().security;
    let max_age = time::Duration::days(security.token_ttl_days);

    let token_cookie = Cookie::build(("token", token.to_string()))
        .path("/")
        .max_age(max_age)
        .http_only(true)
        .secure(security.cookie_secure)
        .same_site(SameSite::Strict)
        .build();

    // Readable by the client app; the token cookie stays http-only.
    let info = json!({
        "id": user.id,
        "username": user.username,
        "role": user.role,
    });
    let encoded: String =
        url::form_urlencoded::byte_serialize(info.to_string().as_bytes()).collect();
    let info_cookie = Cookie::build(("user-info", encoded))
        .path("/")
        .max_age(max_age)
        .secure(security.cookie_secure)
        .same_site(SameSite::Strict)
        .build();

    jar.add(token_cookie).add(info_cookie)
}

/// Optional leading `+`, then 1-16 digits not starting with zero.
fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let mut chars = digits.chars();
    match chars.next() {
        Some(c) if ('1'..='9').contains(&c) => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    rest.len() <= 15 && rest.iter().all(|c| c.is_ascii_digit())
}

/// A concurrent registration can slip past the pre-check; the unique
/// constraint is the authority.
fn map_unique_violation(err: sqlx::Error, message: &str) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return ApiError::conflict(message);
        }
    }
    err.into()
}

fn default_contact() -> Value {
    json!({
        "getInTouchContent": "Our customer support team is here to help you with any questions, concerns, or feedback.",
        "whatsAppSupport": "",
        "emailSupport": "support@storehub.example",
        "available24x7": true,
        "responseTime": "Response within 24 hours",
    })
}

fn default_about() -> Value {
    json!({
        "ourStory": "Founded with a passion for quality and customer satisfaction.",
        "mission": "To provide high-quality products at competitive prices while delivering exceptional customer service.",
        "vision": "To become the most trusted online marketplace.",
        "statistics": {
            "happyCustomers": "0",
            "products": "0",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_validation() {
        assert!(is_valid_phone("15551234567"));
        assert!(is_valid_phone("+15551234567"));
        assert!(!is_valid_phone("05551234567"));
        assert!(!is_valid_phone("+0555"));
        assert!(!is_valid_phone("555-123-4567"));
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("+"));
        assert!(!is_valid_phone("+12345678901234567"));
    }
}
