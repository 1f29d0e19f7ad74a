//! Remote record store client for the Agenda CRM core
//!
//! The cache store mirrors five collections from a remote record store.
//! This crate defines that collaborator as a capability trait,
//! [`RecordStore`], exposing `select-by-business`, `insert`, `update-by-id`
//! and `delete-by-id` per table, plus [`RestRecordStore`], an
//! implementation against a PostgREST-flavored REST API.
//!
//! Rows cross this boundary as raw JSON values; narrowing into typed
//! records happens in the cache store, so any conforming backend can stand
//! in for the REST one (the test suites use in-memory fakes).

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// 同期対象のテーブル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Businesses,
    Professionals,
    Services,
    Clients,
    Appointments,
}

impl Table {
    /// 全テーブル（全件ロードの巡回用）
    pub const ALL: [Table; 5] = [
        Table::Businesses,
        Table::Professionals,
        Table::Services,
        Table::Clients,
        Table::Appointments,
    ];

    /// リモート側のテーブル名
    pub fn name(&self) -> &'static str {
        match self {
            Table::Businesses => "businesses",
            Table::Professionals => "professionals",
            Table::Services => "services",
            Table::Clients => "clients",
            Table::Appointments => "appointments",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// API エラーの詳細情報
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// エラー型
#[derive(Error, Debug)]
pub enum RecordsError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: ApiErrorDetails,
        status: reqwest::StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError {
        message: String,
        status: reqwest::StatusCode,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// リモートレコードストアのケイパビリティ
///
/// 行は JSON 値のまま受け渡しされる。型への絞り込みはキャッシュ境界で行う。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// テナント配下の全行を取得
    async fn select_by_business(
        &self,
        table: Table,
        business_id: Uuid,
    ) -> Result<Vec<Value>, RecordsError>;

    /// id 指定で単一行を取得
    async fn select_by_id(&self, table: Table, id: Uuid) -> Result<Option<Value>, RecordsError>;

    /// 行を挿入し、採番済みの行表現を返す
    async fn insert(&self, table: Table, record: Value) -> Result<Value, RecordsError>;

    /// id 指定で行を更新し、更新後の行表現を返す
    async fn update_by_id(
        &self,
        table: Table,
        id: Uuid,
        record: Value,
    ) -> Result<Value, RecordsError>;

    /// id 指定で行を削除
    async fn delete_by_id(&self, table: Table, id: Uuid) -> Result<(), RecordsError>;
}

/// PostgREST 互換の REST 実装
pub struct RestRecordStore {
    base_url: String,
    http_client: Client,
    headers: HeaderMap,
}

impl RestRecordStore {
    /// 新しい REST クライアントを作成
    ///
    /// `base_url` はテーブル名を結合できるルート（例:
    /// `https://project.example.co/rest/v1`）を指す。
    pub fn new(base_url: &str, api_key: &str, http_client: Client) -> Result<Self, RecordsError> {
        Url::parse(base_url)?;

        let key_value = HeaderValue::from_str(api_key).map_err(|_| {
            RecordsError::InvalidParameters("api key is not a valid header value".to_string())
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            RecordsError::InvalidParameters("api key is not a valid header value".to_string())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key_value);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            headers,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table.name())
    }

    /// 書き込み時に行表現を要求するヘッダー
    fn write_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(
            reqwest::header::HeaderName::from_static("prefer"),
            HeaderValue::from_static("return=representation"),
        );
        headers
    }

    async fn error_from(response: reqwest::Response) -> RecordsError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());

        // Attempt to parse structured error details first.
        match serde_json::from_str::<ApiErrorDetails>(&error_text) {
            Ok(details) => RecordsError::ApiError { details, status },
            Err(_) => RecordsError::UnparsedApiError {
                message: error_text,
                status,
            },
        }
    }

    /// 書き込みレスポンスから単一行表現を取り出す
    ///
    /// PostgREST は `return=representation` で行の配列を返す。
    async fn read_representation(response: reqwest::Response) -> Result<Value, RecordsError> {
        let body_text = response.text().await.map_err(|e| {
            RecordsError::DeserializationError(format!("Failed to read response body: {}", e))
        })?;

        if body_text.trim().is_empty() {
            return Err(RecordsError::DeserializationError(
                "write returned no representation".to_string(),
            ));
        }

        let value = serde_json::from_str::<Value>(&body_text)
            .map_err(|e| RecordsError::DeserializationError(e.to_string()))?;

        match value {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.remove(0)),
            Value::Array(_) => Err(RecordsError::DeserializationError(
                "write returned an empty row set".to_string(),
            )),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn select_by_business(
        &self,
        table: Table,
        business_id: Uuid,
    ) -> Result<Vec<Value>, RecordsError> {
        debug!("select {} for business {}", table, business_id);
        let url = format!("{}?business_id=eq.{}", self.table_url(table), business_id);

        let response = self
            .http_client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(RecordsError::NetworkError)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RecordsError::DeserializationError(e.to_string()))
    }

    async fn select_by_id(&self, table: Table, id: Uuid) -> Result<Option<Value>, RecordsError> {
        debug!("select {} by id {}", table, id);
        let url = format!("{}?id=eq.{}", self.table_url(table), id);

        let response = self
            .http_client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(RecordsError::NetworkError)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let rows = response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RecordsError::DeserializationError(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: Table, record: Value) -> Result<Value, RecordsError> {
        debug!("insert into {}", table);
        let response = self
            .http_client
            .post(self.table_url(table))
            .headers(self.write_headers())
            .json(&record)
            .send()
            .await
            .map_err(RecordsError::NetworkError)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Self::read_representation(response).await
    }

    async fn update_by_id(
        &self,
        table: Table,
        id: Uuid,
        record: Value,
    ) -> Result<Value, RecordsError> {
        debug!("update {} id {}", table, id);
        let url = format!("{}?id=eq.{}", self.table_url(table), id);

        let response = self
            .http_client
            .patch(&url)
            .headers(self.write_headers())
            .json(&record)
            .send()
            .await
            .map_err(RecordsError::NetworkError)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Self::read_representation(response).await
    }

    async fn delete_by_id(&self, table: Table, id: Uuid) -> Result<(), RecordsError> {
        debug!("delete {} id {}", table, id);
        let url = format!("{}?id=eq.{}", self.table_url(table), id);

        let response = self
            .http_client
            .delete(&url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(RecordsError::NetworkError)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(())
    }
}
