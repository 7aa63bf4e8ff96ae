use std::str::FromStr;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use drivelane_core::{AccountType, AppError, UserIdentity};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the authenticated email, set by the dealership SSO proxy.
const AUTH_EMAIL_HEADER: &str = "x-auth-email";
/// Header carrying the display name.
const AUTH_NAME_HEADER: &str = "x-auth-name";
/// Header carrying the coarse account type.
const AUTH_ACCOUNT_TYPE_HEADER: &str = "x-auth-account-type";
/// Optional header carrying the dealership city.
const AUTH_CITY_HEADER: &str = "x-auth-city";

/// Builds the caller's identity from the proxy-forwarded headers.
///
/// The proxy terminates authentication; requests reaching this service
/// without the identity headers are rejected outright.
pub async fn require_identity(mut request: Request, next: Next) -> ApiResult<Response> {
    let identity = identity_from_headers(request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn identity_from_headers(headers: &HeaderMap) -> Result<UserIdentity, AppError> {
    let email = required_header(headers, AUTH_EMAIL_HEADER)?;
    let display_name = required_header(headers, AUTH_NAME_HEADER)?;
    let account_type = AccountType::from_str(required_header(headers, AUTH_ACCOUNT_TYPE_HEADER)?)
        .map_err(|error| AppError::Unauthorized(format!("invalid identity headers: {error}")))?;
    let city = headers
        .get(AUTH_CITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(ToOwned::to_owned);

    Ok(UserIdentity::new(email, display_name, account_type, city))
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))
}

pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) {
        let headers = request.headers();

        if let Some(fetch_site) = headers.get("sec-fetch-site") {
            if fetch_site == HeaderValue::from_static("cross-site") {
                return Err(AppError::Unauthorized("cross-site request blocked".to_owned()).into());
            }
        }

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let referer = headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        let allowed_origin = state.frontend_url;
        let origin_is_allowed = origin == allowed_origin;
        let referer_is_allowed = referer.starts_with(&allowed_origin);

        if !origin_is_allowed && !referer_is_allowed {
            return Err(AppError::Unauthorized("origin validation failed".to_owned()).into());
        }
    }

    Ok(next.run(request).await)
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
