//! Configuration for the Agenda CRM client

use url::Url;

use crate::error::{Error, Result};

/// 接続設定
///
/// リモートストアの URL と資格情報は省略できる。省略時はデモモードと
/// なり、ローカルのみの永続化で動く（構成の欠落はエラーではない）。
#[derive(Debug, Clone, Default)]
pub struct AgendaConfig {
    /// レコードストアのベース URL（例: `https://project.example.co/rest/v1`）
    pub api_url: Option<Url>,
    pub api_key: Option<String>,
    /// テキストインサイト生成のエンドポイント
    pub insight_url: Option<Url>,
    pub insight_key: Option<String>,
}

impl AgendaConfig {
    /// リモート同期ありの設定を作成
    pub fn new(api_url: &str, api_key: &str) -> Result<Self> {
        let url = Url::parse(api_url)?;
        if api_key.is_empty() {
            return Err(Error::Config("api_key cannot be empty".to_string()));
        }
        Ok(Self {
            api_url: Some(url),
            api_key: Some(api_key.to_string()),
            ..Default::default()
        })
    }

    /// 環境変数から設定を読む
    ///
    /// `AGENDA_API_URL` と `AGENDA_API_KEY` が揃っていなければリモート
    /// ストアは未構成のまま。インサイト用には `AGENDA_INSIGHT_URL` と
    /// `AGENDA_INSIGHT_KEY` を見る。
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("AGENDA_API_URL")
                .ok()
                .and_then(|u| Url::parse(&u).ok()),
            api_key: std::env::var("AGENDA_API_KEY").ok().filter(|k| !k.is_empty()),
            insight_url: std::env::var("AGENDA_INSIGHT_URL")
                .ok()
                .and_then(|u| Url::parse(&u).ok()),
            insight_key: std::env::var("AGENDA_INSIGHT_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }

    /// インサイト生成のエンドポイントを設定
    pub fn with_insight(mut self, url: &str, key: &str) -> Result<Self> {
        self.insight_url = Some(Url::parse(url)?);
        self.insight_key = Some(key.to_string());
        Ok(self)
    }

    /// リモートストアが構成されているか
    pub fn is_configured(&self) -> bool {
        self.api_url.is_some() && self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_configuration_requires_a_key() {
        let result = AgendaConfig::new("https://project.example.co/rest/v1", "");
        assert!(matches!(result, Err(Error::Config(_))));

        let config = AgendaConfig::new("https://project.example.co/rest/v1", "anon").unwrap();
        assert!(config.is_configured());
    }

    #[test]
    fn default_configuration_is_demo_mode() {
        let config = AgendaConfig::default();
        assert!(!config.is_configured());
    }
}
