//! Business insight client for the Agenda CRM core
//!
//! Thin client for the text-insight collaborator: it sends today's numbers
//! (appointment count, revenue, top service) to a text-generation endpoint
//! and returns a short tip for the owner. The tip is decorative, so every
//! failure path collapses into a fixed local fallback string instead of an
//! error.

use log::warn;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// 生成に失敗したときの固定の一言
pub const FALLBACK_TIP: &str = "Focus on delivering an excellent experience to every client today!";

/// エラー型（クレート内部用。呼び出し側へはフォールバック文で吸収される）
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Insight error: {0}")]
    InsightError(String),
}

/// インサイト生成の入力
#[derive(Debug, Clone, Serialize)]
pub struct InsightRequest {
    pub appointments_count: usize,
    pub revenue: f64,
    pub top_service: String,
}

/// テキストインサイトのクライアント
pub struct InsightClient {
    endpoint: Option<String>,
    api_key: Option<String>,
    http_client: Client,
}

impl InsightClient {
    /// 新しいクライアントを作成
    pub fn new(endpoint: Option<String>, api_key: Option<String>, http_client: Client) -> Self {
        Self {
            endpoint,
            api_key,
            http_client,
        }
    }

    /// 未構成のクライアント（常にフォールバック文を返す）
    pub fn unconfigured() -> Self {
        Self::new(None, None, Client::new())
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }

    /// 今日の実績から短い一言アドバイスを取得
    ///
    /// 資格情報が無い場合と生成に失敗した場合は [`FALLBACK_TIP`] を返す。
    /// エラーが外へ伝播することはない。
    pub async fn business_insight(&self, request: &InsightRequest) -> String {
        let (endpoint, api_key) = match (&self.endpoint, &self.api_key) {
            (Some(endpoint), Some(api_key)) => (endpoint, api_key),
            _ => return FALLBACK_TIP.to_string(),
        };

        match self.generate(endpoint, api_key, request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => FALLBACK_TIP.to_string(),
            Err(e) => {
                warn!("insight generation failed: {}", e);
                FALLBACK_TIP.to_string()
            }
        }
    }

    async fn generate(
        &self,
        endpoint: &str,
        api_key: &str,
        request: &InsightRequest,
    ) -> Result<String, InsightError> {
        let url = Url::parse(endpoint)?;

        let response = self
            .http_client
            .post(url)
            .header("apikey", api_key)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InsightError::InsightError(error_text));
        }

        let body = response.json::<Value>().await?;
        Ok(body["text"].as_str().unwrap_or_default().to_string())
    }
}
