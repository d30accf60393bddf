//! Room slug resolution
//!
//! セッション開始時に一度だけ、人間向けのスラッグを relay が使うルーム ID に解決する。
//! 解決できなければ relay に接続する前に `ClientError::RoomNotFound` を返す。

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClientError;

/// 解決済みのルーム
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomInfo {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct LookupEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<LookupData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    room: RoomInfo,
}

/// スラッグ解決の抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn resolve(&self, slug: &str) -> Result<RoomInfo, ClientError>;
}

/// REST API (`GET {api}/rooms/{slug}`) による解決
pub struct HttpRoomDirectory {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRoomDirectory {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl RoomDirectory for HttpRoomDirectory {
    async fn resolve(&self, slug: &str) -> Result<RoomInfo, ClientError> {
        let url = format!("{}/rooms/{}", self.base_url, slug);
        tracing::debug!("Resolving room slug via {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::Lookup(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Lookup(e.to_string()))?;

        parse_lookup_response(slug, status, &body)
    }
}

/// API を持たない構成用。スラッグをそのままルーム ID として使う
pub struct SlugRoomDirectory;

#[async_trait]
impl RoomDirectory for SlugRoomDirectory {
    async fn resolve(&self, slug: &str) -> Result<RoomInfo, ClientError> {
        if slug.is_empty() || slug.chars().count() > 64 {
            return Err(ClientError::RoomNotFound(slug.to_string()));
        }
        Ok(RoomInfo {
            id: slug.to_string(),
            slug: slug.to_string(),
            name: None,
        })
    }
}

/// ステータスコードとレスポンスボディから解決結果を得る
pub fn parse_lookup_response(slug: &str, status: u16, body: &str) -> Result<RoomInfo, ClientError> {
    match status {
        404 => return Err(ClientError::RoomNotFound(slug.to_string())),
        401 | 403 => return Err(ClientError::Unauthorized),
        200..=299 => {}
        other => return Err(ClientError::Lookup(format!("unexpected status {}", other))),
    }

    let envelope: LookupEnvelope =
        serde_json::from_str(body).map_err(|e| ClientError::Lookup(e.to_string()))?;
    if !envelope.success {
        return Err(ClientError::Lookup(
            envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string()),
        ));
    }
    envelope
        .data
        .map(|data| data.room)
        .ok_or_else(|| ClientError::RoomNotFound(slug.to_string()))
}
