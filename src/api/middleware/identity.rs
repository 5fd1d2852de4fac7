use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::StatusCode;
use http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::db::models::user::UserId;
use crate::util::env::Var;
use crate::var;

/// Authenticated caller, resolved from the bearer token and attached to the
/// request by [`resolve_caller_ident`]. Award handlers never take a user id
/// from the request body.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    exp: i64,
}

pub async fn resolve_caller_ident(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let headers = req.headers().clone();
    let authorized_header = headers
        .get(AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = strip_bearer(authorized_header).ok_or(StatusCode::UNAUTHORIZED)?;

    let secret = var!(Var::JwtSecret)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user_id = decode_token(token, secret).map_err(|e| {
        tracing::warn!(error = %e, "bearer token rejected");
        StatusCode::UNAUTHORIZED
    })?;

    if !user_id.is_valid() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(CallerIdentity { user_id });
    Ok(next.run(req).await)
}

fn strip_bearer(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

fn decode_token(token: &str, secret: &str) -> Result<UserId, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(UserId(data.claims.sub))
}

#[cfg(test)]
mod test {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn token_for(sub: i64, exp: i64, secret: &str) -> String {
        encode(
            &Header::default(),
            &Claims { sub, exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(strip_bearer("bearer abc"), None);
        assert_eq!(strip_bearer("Basic abc"), None);
        assert_eq!(strip_bearer(""), None);
    }

    #[test]
    fn test_decode_round_trip() {
        let token = token_for(42, far_future(), "sekrit");
        assert_eq!(decode_token(&token, "sekrit").unwrap(), UserId(42));
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let token = token_for(42, far_future(), "sekrit");
        assert!(decode_token(&token, "other").is_err());
    }

    #[test]
    fn test_decode_rejects_expired_token() {
        // well past any validation leeway
        let token = token_for(42, chrono::Utc::now().timestamp() - 86_400, "sekrit");
        assert!(decode_token(&token, "sekrit").is_err());
    }
}
