//! CredentialVerifier の具体的な実装

pub mod jwt;

pub use jwt::JwtCredentialVerifier;
