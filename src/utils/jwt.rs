use chrono::{TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenType {
    Login,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Record id of the authenticated user, `user:<key>`.
    pub auth: String,
    pub exp: usize,
    pub iat: usize,
    pub r#type: TokenType,
}

pub struct JWT {
    key_enc: EncodingKey,
    key_dec: DecodingKey,
    duration: TimeDelta,
}

impl JWT {
    pub fn new(secret: String, duration: TimeDelta) -> Self {
        Self {
            duration,
            key_enc: EncodingKey::from_secret(secret.as_ref()),
            key_dec: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn create_by_login(&self, user_id: &str) -> Result<String, String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            auth: user_id.to_string(),
            exp: (now + self.duration).timestamp() as usize,
            iat: now.timestamp() as usize,
            r#type: TokenType::Login,
        };
        encode(&Header::default(), &claims, &self.key_enc).map_err(|err| err.to_string())
    }

    pub fn decode_by_type(&self, token: &str, r#type: TokenType) -> Result<Claims, String> {
        let data = decode::<Claims>(token, &self.key_dec, &Validation::new(Algorithm::HS256))
            .map_err(|err| err.to_string())?
            .claims;

        if data.r#type == r#type {
            Ok(data)
        } else {
            Err("Token type is not equal".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_token_round_trip() {
        let jwt = JWT::new("some-secret".to_string(), TimeDelta::minutes(1));
        let token = jwt.create_by_login("user:someone").unwrap();
        let claims = jwt.decode_by_type(&token, TokenType::Login).unwrap();
        assert_eq!(claims.auth, "user:someone");
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JWT::new("some-secret".to_string(), TimeDelta::minutes(-5));
        let token = jwt.create_by_login("user:someone").unwrap();
        let err = jwt.decode_by_type(&token, TokenType::Login).unwrap_err();
        assert!(err.contains("Expired"), "{err}");
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = JWT::new("one".to_string(), TimeDelta::minutes(1))
            .create_by_login("user:someone")
            .unwrap();
        let other = JWT::new("two".to_string(), TimeDelta::minutes(1));
        assert!(other.decode_by_type(&token, TokenType::Login).is_err());
    }
}
