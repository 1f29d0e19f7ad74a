//! Agenda CRM core
//!
//! Scheduling and CRM core for salon and clinic businesses: a session
//! context, a local cache store mirrored from a remote record store, a pure
//! derived-view engine over that cache and a text-insight client, wired
//! behind a single entry point.
//!
//! The remote store is optional. Without one the whole core runs in demo
//! mode against local state only, which is also what the test suites use.

pub mod config;
pub mod error;

pub use agenda_crm_insight as insight;
pub use agenda_crm_models as models;
pub use agenda_crm_records as records;
pub use agenda_crm_session as session;
pub use agenda_crm_store as store;
pub use agenda_crm_views as views;

pub use config::AgendaConfig;
pub use error::{Error, Result};

use std::sync::Arc;

use reqwest::Client;

use agenda_crm_insight::InsightClient;
use agenda_crm_records::{RecordStore, RestRecordStore};
use agenda_crm_session::SessionContext;
use agenda_crm_store::LocalStore;

/// The main entry point for the Agenda CRM core
pub struct AgendaCrm {
    config: AgendaConfig,
    session: Arc<SessionContext>,
    store: Arc<LocalStore>,
    insight: Arc<InsightClient>,
}

impl AgendaCrm {
    /// 設定からクライアント一式を組み立てる
    ///
    /// リモートストアが未構成ならデモモードのストアになる。
    ///
    /// # 例
    ///
    /// ```
    /// use agenda_crm::{AgendaConfig, AgendaCrm};
    ///
    /// let crm = AgendaCrm::new(AgendaConfig::default()).unwrap();
    /// assert!(!crm.is_configured());
    /// ```
    pub fn new(config: AgendaConfig) -> Result<Self> {
        let http_client = Client::new();
        let session = Arc::new(SessionContext::new());

        let backend: Option<Arc<dyn RecordStore>> = match (&config.api_url, &config.api_key) {
            (Some(url), Some(key)) => Some(Arc::new(RestRecordStore::new(
                url.as_str(),
                key,
                http_client.clone(),
            )?)),
            _ => None,
        };
        let store = Arc::new(match backend {
            Some(backend) => LocalStore::new(backend, session.clone()),
            None => LocalStore::offline(session.clone()),
        });

        let insight = Arc::new(InsightClient::new(
            config.insight_url.as_ref().map(|u| u.to_string()),
            config.insight_key.clone(),
            http_client,
        ));

        Ok(Self {
            config,
            session,
            store,
            insight,
        })
    }

    /// 環境変数から組み立てる（未設定ならデモモード）
    pub fn from_env() -> Result<Self> {
        Self::new(AgendaConfig::from_env())
    }

    pub fn config(&self) -> &AgendaConfig {
        &self.config
    }

    /// リモートストアが構成されているか
    pub fn is_configured(&self) -> bool {
        self.store.is_configured()
    }

    /// セッションコンテキスト
    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// ローカルキャッシュストア
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// テキストインサイトのクライアント
    pub fn insight(&self) -> &Arc<InsightClient> {
        &self.insight
    }

    /// セッションのテナント状態へキャッシュを追従させる
    ///
    /// テナントが紐づいていれば全件ロード、いなければクリア。
    pub async fn refresh(&self) -> Result<()> {
        match self.session.business_id() {
            Some(business_id) => {
                self.store.load_all(business_id).await?;
                Ok(())
            }
            None => {
                self.store.clear();
                Ok(())
            }
        }
    }

    /// サインアウトしてキャッシュを破棄
    pub fn sign_out(&self) {
        self.session.sign_out();
        self.store.clear();
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::AgendaConfig;
    pub use crate::error::Error;
    pub use crate::AgendaCrm;
}
