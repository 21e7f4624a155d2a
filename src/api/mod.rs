//! API handlers for EAMS REST endpoints

pub mod activities;
pub mod attendance;
pub mod auth;
pub mod enrollments;
pub mod health;
pub mod notifications;
pub mod openapi;
pub mod stats;
pub mod users;
pub mod volunteering;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::{de::DeserializeOwned, Serialize};
use std::net::SocketAddr;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::user::UserClaims,
    AppState,
};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token.trim(), &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// JSON body that may be omitted. An empty body yields `T::default()`,
/// anything else must deserialize or the request is rejected with 400.
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        parse_optional_json(&bytes).map(OptionalJson)
    }
}

fn parse_optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Upper bound applied by every paginated repository query
pub const MAX_PER_PAGE: i64 = 100;

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the current page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>, default_per_page: i64) -> Self {
        Self {
            items,
            total,
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, MAX_PER_PAGE),
        }
    }
}

/// Client address, preferring the first `X-Forwarded-For` hop
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let peer: SocketAddr = "10.0.0.5:51234".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer), "10.0.0.5");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer), "203.0.113.9");
    }

    #[test]
    fn test_optional_json_defaults_only_on_empty_body() {
        use crate::models::attendance::IssueQrToken;

        let empty: IssueQrToken = parse_optional_json(b"").unwrap();
        assert_eq!(empty.max_uses, None);
        let blank: IssueQrToken = parse_optional_json(b"  \n").unwrap();
        assert_eq!(blank.expires_in_hours, None);

        let capped: IssueQrToken = parse_optional_json(br#"{"max_uses": 1}"#).unwrap();
        assert_eq!(capped.max_uses, Some(1));

        assert!(matches!(
            parse_optional_json::<IssueQrToken>(br#"{"max_uses": "1"}"#),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_optional_json::<IssueQrToken>(br#"{"max_uses": 1,"#),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_optional_json_rejects_malformed_request() {
        use crate::models::attendance::IssueQrToken;
        use axum::{body::Body, http::StatusCode, routing::post, Router};
        use tower::ServiceExt;

        async fn handler(OptionalJson(request): OptionalJson<IssueQrToken>) -> String {
            format!("{:?}", request.max_uses)
        }

        let cases = [
            ("", StatusCode::OK),
            (r#"{"max_uses": 3}"#, StatusCode::OK),
            (r#"{"max_uses": "1"}"#, StatusCode::BAD_REQUEST),
            (r#"{"max_uses": 1,"#, StatusCode::BAD_REQUEST),
        ];
        for (body, expected) in cases {
            let app = Router::new().route("/", post(handler));
            let request = axum::http::Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), expected, "body {:?}", body);
        }
    }

    #[test]
    fn test_paginated_response_echoes_effective_paging() {
        use crate::models::user::UserShort;

        let page = PaginatedResponse::<UserShort>::new(Vec::new(), 0, None, None, 20);
        assert_eq!((page.page, page.per_page), (1, 20));

        let page = PaginatedResponse::<UserShort>::new(Vec::new(), 0, Some(0), Some(500), 20);
        assert_eq!((page.page, page.per_page), (1, MAX_PER_PAGE));
    }
}
