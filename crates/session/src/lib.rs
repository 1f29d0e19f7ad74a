//! Session and authorization context for the Agenda CRM core
//!
//! Holds the signed-in identity and its role. The cache store consumes this
//! read-only: the business id scopes every load, and the role decides which
//! appointments a reader may see. Sign-in is the credential-less MVP flow
//! carried over from the original product: the role is inferred from the
//! email and a fresh id is minted per session.

use log::info;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use uuid::Uuid;

/// エラー型
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No user is signed in")]
    NotSignedIn,
}

/// セッションの権限ロール
///
/// `Staff` は自分に紐づく担当者の予約だけを閲覧・管理できる。
/// `Admin` はテナント全体を見る。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

/// サインイン中のユーザー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_id: Option<Uuid>,
    pub role: Role,
}

/// セッションコンテキスト
///
/// 現在の identity を内部可変状態として持つ。初期化完了フラグは
/// 起動時の復元が終わるまでルーティング判断を遅延させるためのもの。
pub struct SessionContext {
    current: RwLock<Option<Identity>>,
    initialized: AtomicBool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// 空のセッションコンテキストを作成
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Option<Identity>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Option<Identity>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }

    /// MVP のサインイン
    ///
    /// メールアドレスに `staff` を含むユーザーはスタッフ、それ以外は
    /// オーナーとして扱う。テナントはまだ紐づかない。
    pub fn sign_in(&self, email: &str) -> Identity {
        let role = if email.contains("staff") {
            Role::Staff
        } else {
            Role::Admin
        };
        let name = email.split('@').next().unwrap_or(email).to_string();

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name,
            business_id: None,
            professional_id: None,
            role,
        };

        info!("signed in as {} ({:?})", identity.email, identity.role);
        *self.write_state() = Some(identity.clone());
        identity
    }

    /// 保存済み identity の復元（起動時のセッション復元に使う）
    pub fn restore(&self, identity: Identity) {
        *self.write_state() = Some(identity);
    }

    /// サインアウトし identity を破棄
    pub fn sign_out(&self) {
        info!("signed out");
        *self.write_state() = None;
    }

    /// 現在の identity
    pub fn current_identity(&self) -> Option<Identity> {
        self.read_state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().is_some()
    }

    /// 紐づいたテナント id（未紐づけなら None）
    pub fn business_id(&self) -> Option<Uuid> {
        self.read_state().as_ref().and_then(|u| u.business_id)
    }

    /// オンボーディング完了後にテナントを紐づける
    pub fn link_business(&self, business_id: Uuid) -> Result<(), SessionError> {
        let mut state = self.write_state();
        let identity = state.as_mut().ok_or(SessionError::NotSignedIn)?;
        identity.business_id = Some(business_id);
        Ok(())
    }

    /// スタッフを担当者レコードに紐づける
    pub fn link_professional(&self, professional_id: Uuid) -> Result<(), SessionError> {
        let mut state = self.write_state();
        let identity = state.as_mut().ok_or(SessionError::NotSignedIn)?;
        identity.professional_id = Some(professional_id);
        Ok(())
    }

    /// 表示名とロールの更新
    pub fn update_profile(&self, name: &str, role: Option<Role>) -> Result<(), SessionError> {
        let mut state = self.write_state();
        let identity = state.as_mut().ok_or(SessionError::NotSignedIn)?;
        identity.name = name.to_string();
        if let Some(role) = role {
            identity.role = role;
        }
        Ok(())
    }

    /// 起動時の復元が終わったことを通知
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}
