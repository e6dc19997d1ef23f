use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ErrorMessage, HttpError},
    models::chatmodels::ParticipantRole,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: ParticipantRole,
    pub iat: usize,
    pub exp: usize,
}

/// The identity a bearer token resolves to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: ParticipantRole,
}

pub fn create_token(
    user_id: &str,
    role: ParticipantRole,
    secret: &[u8],
    expires_in_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if user_id.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::minutes(expires_in_minutes)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        role,
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<AuthUser, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => {
            let id = Uuid::parse_str(&token.claims.sub)
                .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;
            Ok(AuthUser {
                id,
                role: token.claims.role,
            })
        }
        Err(_) => Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn token_round_trips_identity_and_role() {
        let user_id = Uuid::new_v4();
        let token = create_token(&user_id.to_string(), ParticipantRole::Client, SECRET, 60).unwrap();

        let user = decode_token(token, SECRET).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.role, ParticipantRole::Client);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(&Uuid::new_v4().to_string(), ParticipantRole::JobSeeker, SECRET, 60).unwrap();
        let err = decode_token(token, b"other-secret").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token(&Uuid::new_v4().to_string(), ParticipantRole::Client, SECRET, -10).unwrap();
        assert!(decode_token(token, SECRET).is_err());
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let token = create_token("not-a-uuid", ParticipantRole::Client, SECRET, 60).unwrap();
        assert!(decode_token(token, SECRET).is_err());
    }
}
