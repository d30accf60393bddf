//! HS256 JWT による CredentialVerifier 実装
//!
//! クレーム: `userId`（文字列または数値）、`name`（任意）。
//! `exp` は存在する場合のみ検証する。

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::domain::{AuthError, CredentialVerifier, DisplayName, Identity, VerifiedUser};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserIdClaim {
    Text(String),
    Number(i64),
}

impl UserIdClaim {
    fn into_string(self) -> String {
        match self {
            UserIdClaim::Text(value) => value,
            UserIdClaim::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: Option<UserIdClaim>,
    #[serde(default)]
    name: Option<String>,
}

pub struct JwtCredentialVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtCredentialVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl CredentialVerifier for JwtCredentialVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedUser, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        let user_id = data
            .claims
            .user_id
            .map(UserIdClaim::into_string)
            .ok_or(AuthError::MissingIdentity)?;
        let identity = Identity::new(user_id).map_err(|_| AuthError::MissingIdentity)?;
        let display_name = DisplayName::new(data.claims.name.unwrap_or_default());

        Ok(VerifiedUser {
            identity,
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_string_user_id() {
        // テスト項目: 文字列の userId と name から VerifiedUser が得られる
        // given (前提条件):
        let verifier = JwtCredentialVerifier::new(SECRET);
        let token = token(json!({"userId": "u-1", "name": "Alice"}), SECRET);

        // when (操作):
        let user = verifier.verify(&token).unwrap();

        // then (期待する結果):
        assert_eq!(user.identity.as_str(), "u-1");
        assert_eq!(user.display_name.as_str(), "Alice");
    }

    #[test]
    fn test_verify_numeric_user_id_and_default_name() {
        // テスト項目: 数値の userId を受け付け、name が無ければ "Anonymous" になる
        // given (前提条件):
        let verifier = JwtCredentialVerifier::new(SECRET);
        let token = token(json!({"userId": 42}), SECRET);

        // when (操作):
        let user = verifier.verify(&token).unwrap();

        // then (期待する結果):
        assert_eq!(user.identity.as_str(), "42");
        assert_eq!(user.display_name.as_str(), "Anonymous");
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        // テスト項目: 署名鍵が異なるトークンは拒否される
        // given (前提条件):
        let verifier = JwtCredentialVerifier::new(SECRET);
        let token = token(json!({"userId": "u-1"}), "other-secret");

        // when (操作):
        let result = verifier.verify(&token);

        // then (期待する結果):
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        // テスト項目: 期限切れのトークンは拒否される
        // given (前提条件):
        let verifier = JwtCredentialVerifier::new(SECRET);
        let token = token(json!({"userId": "u-1", "exp": 1_000}), SECRET);

        // when (操作):
        let result = verifier.verify(&token);

        // then (期待する結果):
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }

    #[test]
    fn test_verify_requires_user_id() {
        // テスト項目: userId を持たないトークンは拒否される
        // given (前提条件):
        let verifier = JwtCredentialVerifier::new(SECRET);
        let token = token(json!({"name": "Nobody"}), SECRET);

        // when (操作):
        let result = verifier.verify(&token);

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::MissingIdentity));
        assert_eq!(verifier.verify("  "), Err(AuthError::MissingCredential));
    }
}
