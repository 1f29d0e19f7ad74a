//! Workspace-level error type

use thiserror::Error;

/// エラー型
///
/// 各サブクレートのエラーをひとつに束ねる。プレゼンテーション層は
/// これだけを扱えばよい。
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(#[from] agenda_crm_session::SessionError),

    #[error("Record store error: {0}")]
    Records(#[from] agenda_crm_records::RecordsError),

    #[error("Store error: {0}")]
    Store(#[from] agenda_crm_store::StoreError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
