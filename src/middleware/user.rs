// src/middleware/user.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
};

// Cabeçalho definido pelo gateway de autenticação na frente da API
pub const USER_ID_HEADER: &str = "x-user-id";

/// Dono dos dados da requisição.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext(pub Uuid);

impl UserContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let value = headers
            .get(USER_ID_HEADER)
            .ok_or(AppError::MissingUserHeader)?;

        let value_str = value.to_str().map_err(|_| AppError::InvalidUserHeader)?;

        Uuid::parse_str(value_str.trim())
            .map(UserContext)
            .map_err(|_| AppError::InvalidUserHeader)
    }
}

impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        UserContext::from_headers(&parts.headers).map_err(|e| {
            let app_state = AppState::from_ref(state);
            e.to_api_error(&Locale::from_headers(&parts.headers), &app_state.i18n_store)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_a_valid_uuid() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(UserContext::from_headers(&headers).unwrap(), UserContext(id));
    }

    #[test]
    fn missing_and_malformed_headers_are_rejected() {
        assert!(matches!(
            UserContext::from_headers(&HeaderMap::new()),
            Err(AppError::MissingUserHeader)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        assert!(matches!(
            UserContext::from_headers(&headers),
            Err(AppError::InvalidUserHeader)
        ));
    }
}
