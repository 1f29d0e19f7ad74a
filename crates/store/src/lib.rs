//! Local cache store for the Agenda CRM core
//!
//! Holds the in-memory working set for one tenant: the business record plus
//! the professionals, services, clients and appointments collections, all
//! mirrored from a remote record store. Reads are synchronous snapshots;
//! mutations apply optimistically to the cache and then push to the remote
//! backend best-effort, tagging each record with its sync state so that
//! divergence stays observable.
//!
//! The store is an explicitly constructed object owned by the application
//! context. Its lifecycle follows the session: [`LocalStore::load_all`] when
//! a business is selected, [`LocalStore::clear`] when the session loses its
//! business association.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};
use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use agenda_crm_models::{
    narrow, Appointment, AppointmentStatus, Business, Client, ModelError, NewAppointment,
    NewClient, NewProfessional, NewService, Professional, Service, Validate,
    DEFAULT_BRAND_COLOR,
};
use agenda_crm_records::{RecordStore, RecordsError, Table};
use agenda_crm_session::{Role, SessionContext, SessionError};
use agenda_crm_views::conflict::{has_conflict, SlotRequest};
use agenda_crm_views::stats::{summarize, StatsSummary};

/// デモモードで合成する店舗レコードの名前
pub const DEMO_BUSINESS_NAME: &str = "Agenda CRM Demo";
/// デモモードで合成する営業時間テキスト
pub const DEMO_BUSINESS_HOURS: &str = "08:00 - 18:00";

/// 参照先が解決できないときの表示ラベル
pub const UNKNOWN_CLIENT: &str = "Unknown client";
pub const UNKNOWN_SERVICE: &str = "Unknown service";
pub const UNKNOWN_PROFESSIONAL: &str = "Unknown professional";

/// エラー型
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No business is linked to the current session")]
    NoBusinessLinked,

    #[error("Synchronization with the remote store failed")]
    SyncFailed,

    #[error("Initial setup failed: {0}")]
    SetupFailed(String),

    #[error("Record store error: {0}")]
    Records(#[from] RecordsError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Invalid record: {0}")]
    Model(#[from] ModelError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// レコードごとのリモート同期状態
///
/// 楽観更新の直後は `Pending`、リモート書き込みの成否で `Synced` か
/// `Failed` に落ち着く。`Failed` のレコードもローカルの編集内容は残る。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    Pending,
    Failed,
}

#[derive(Default)]
struct CacheState {
    business: Option<Business>,
    professionals: Vec<Professional>,
    services: Vec<Service>,
    clients: Vec<Client>,
    appointments: Vec<Appointment>,
    sync_states: HashMap<Uuid, SyncState>,
}

struct FetchedState {
    business: Option<Business>,
    professionals: Vec<Professional>,
    services: Vec<Service>,
    clients: Vec<Client>,
    appointments: Vec<Appointment>,
}

/// テナント 1 件分のローカルキャッシュストア
pub struct LocalStore {
    state: RwLock<CacheState>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    loading: AtomicBool,
    backend: Option<Arc<dyn RecordStore>>,
    session: Arc<SessionContext>,
}

impl LocalStore {
    /// リモートバックエンド付きで作成
    pub fn new(backend: Arc<dyn RecordStore>, session: Arc<SessionContext>) -> Self {
        Self::with_backend(Some(backend), session)
    }

    /// バックエンドなしのデモ（ローカルのみ）モードで作成
    pub fn offline(session: Arc<SessionContext>) -> Self {
        Self::with_backend(None, session)
    }

    fn with_backend(backend: Option<Arc<dyn RecordStore>>, session: Arc<SessionContext>) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            last_sync: RwLock::new(None),
            loading: AtomicBool::new(false),
            backend,
            session,
        }
    }

    /// リモートストアが構成されているか
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn stamp_sync(&self) {
        let mut guard = self.last_sync.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Utc::now());
    }

    /// 最後に同期が成立した時刻
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// レコードの同期状態（追跡されていなければ `Synced`）
    pub fn sync_state(&self, id: Uuid) -> SyncState {
        self.read_state()
            .sync_states
            .get(&id)
            .copied()
            .unwrap_or(SyncState::Synced)
    }

    fn mark_sync(&self, id: Uuid, state: SyncState) {
        self.write_state().sync_states.insert(id, state);
    }

    fn active_business_id(&self) -> Result<Uuid, StoreError> {
        self.session.business_id().ok_or(StoreError::NoBusinessLinked)
    }

    // ---- loading ----------------------------------------------------------

    /// テナント配下の全コレクションを取り直す
    ///
    /// リモート側の失敗では既存のキャッシュをそのまま残し、
    /// [`StoreError::SyncFailed`] として報告する。デモモードは初回だけ
    /// 店舗レコードを合成し、以降のデータへは触れない。どちらの場合も
    /// 成立時には同期時刻を刻む。
    pub async fn load_all(&self, business_id: Uuid) -> Result<(), StoreError> {
        let backend = match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => {
                let mut state = self.write_state();
                if state.business.is_none() {
                    state.business = Some(Business {
                        id: business_id,
                        name: DEMO_BUSINESS_NAME.to_string(),
                        hours: DEMO_BUSINESS_HOURS.to_string(),
                        branding_color: Some(DEFAULT_BRAND_COLOR.to_string()),
                        logo_url: None,
                    });
                }
                drop(state);
                self.stamp_sync();
                return Ok(());
            }
        };

        self.loading.store(true, Ordering::SeqCst);
        let fetched = self.fetch_all(backend.as_ref(), business_id).await;
        self.loading.store(false, Ordering::SeqCst);

        match fetched {
            Ok(fetched) => {
                let mut state = self.write_state();
                state.business = fetched.business;
                state.professionals = fetched.professionals;
                state.services = fetched.services;
                state.clients = fetched.clients;
                state.appointments = fetched.appointments;
                // A fresh load supersedes any per-record tags.
                state.sync_states.clear();
                drop(state);
                self.stamp_sync();
                Ok(())
            }
            Err(e) => {
                error!("sync failed for business {}: {}", business_id, e);
                Err(StoreError::SyncFailed)
            }
        }
    }

    async fn fetch_all(
        &self,
        backend: &dyn RecordStore,
        business_id: Uuid,
    ) -> Result<FetchedState, RecordsError> {
        let business = backend
            .select_by_id(Table::Businesses, business_id)
            .await?
            .and_then(|row| narrow_row::<Business>(Table::Businesses, row));

        let professionals = narrow_rows(
            Table::Professionals,
            backend
                .select_by_business(Table::Professionals, business_id)
                .await?,
        );
        let services = narrow_rows(
            Table::Services,
            backend
                .select_by_business(Table::Services, business_id)
                .await?,
        );
        let clients = narrow_rows(
            Table::Clients,
            backend
                .select_by_business(Table::Clients, business_id)
                .await?,
        );
        let appointments = narrow_rows(
            Table::Appointments,
            backend
                .select_by_business(Table::Appointments, business_id)
                .await?,
        );

        Ok(FetchedState {
            business,
            professionals,
            services,
            clients,
            appointments,
        })
    }

    /// 全コレクションを空にし同期時刻をリセット
    ///
    /// セッションがテナントとの紐づけを失ったとき（サインアウトや
    /// 未オンボーディングのユーザー）に呼ぶ。
    pub fn clear(&self) {
        *self.write_state() = CacheState::default();
        let mut guard = self.last_sync.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    // ---- remote push helpers ----------------------------------------------

    async fn push_insert(&self, table: Table, id: Uuid, row: Value) {
        match &self.backend {
            None => self.mark_sync(id, SyncState::Synced),
            Some(backend) => match backend.insert(table, row).await {
                Ok(_) => self.mark_sync(id, SyncState::Synced),
                Err(e) => {
                    warn!("{} insert failed, keeping local copy: {}", table, e);
                    self.mark_sync(id, SyncState::Failed);
                }
            },
        }
    }

    async fn push_update(&self, table: Table, id: Uuid, row: Value) {
        match &self.backend {
            None => self.mark_sync(id, SyncState::Synced),
            Some(backend) => match backend.update_by_id(table, id, row).await {
                Ok(_) => self.mark_sync(id, SyncState::Synced),
                Err(e) => {
                    warn!("{} update failed, keeping local copy: {}", table, e);
                    self.mark_sync(id, SyncState::Failed);
                }
            },
        }
    }

    async fn push_delete(&self, table: Table, id: Uuid) {
        match &self.backend {
            None => {
                self.write_state().sync_states.remove(&id);
            }
            Some(backend) => match backend.delete_by_id(table, id).await {
                Ok(_) => {
                    self.write_state().sync_states.remove(&id);
                }
                Err(e) => {
                    // The row is gone locally but still exists remotely; the
                    // tag keeps that divergence visible.
                    warn!("{} delete failed: {}", table, e);
                    self.mark_sync(id, SyncState::Failed);
                }
            },
        }
    }

    // ---- clients ----------------------------------------------------------

    /// 顧客を追加し、採番済みレコードを返す
    ///
    /// 楽観的にローカルへ反映してからリモートへ書き込む。返ってきた
    /// レコードは呼び出し側がすぐ参照できる（予約フォームのクイック追加が
    /// 作成直後の顧客を選択するため）。
    pub async fn add_client(&self, draft: NewClient) -> Result<Client, StoreError> {
        let business_id = self.active_business_id()?;
        let client = draft.into_record(Uuid::new_v4(), business_id);

        {
            let mut state = self.write_state();
            state.clients.push(client.clone());
            state.sync_states.insert(client.id, SyncState::Pending);
        }
        self.push_insert(Table::Clients, client.id, serde_json::to_value(&client)?)
            .await;

        Ok(client)
    }

    /// 顧客を更新（ローカル反映が先、リモートは追従）
    pub async fn update_client(&self, client: Client) -> Result<(), StoreError> {
        {
            let mut state = self.write_state();
            if let Some(slot) = state.clients.iter_mut().find(|c| c.id == client.id) {
                *slot = client.clone();
            }
            state.sync_states.insert(client.id, SyncState::Pending);
        }
        self.push_update(Table::Clients, client.id, serde_json::to_value(&client)?)
            .await;
        Ok(())
    }

    /// 顧客を削除
    ///
    /// 過去の予約レコードは残り、名前解決はプレースホルダーに落ちる。
    pub async fn delete_client(&self, id: Uuid) -> Result<(), StoreError> {
        self.write_state().clients.retain(|c| c.id != id);
        self.push_delete(Table::Clients, id).await;
        Ok(())
    }

    // ---- services ---------------------------------------------------------

    /// メニューを追加し、採番済みレコードを返す
    pub async fn add_service(&self, draft: NewService) -> Result<Service, StoreError> {
        let business_id = self.active_business_id()?;
        let service = draft.into_record(Uuid::new_v4(), business_id);
        service.validate()?;

        {
            let mut state = self.write_state();
            state.services.push(service.clone());
            state.sync_states.insert(service.id, SyncState::Pending);
        }
        self.push_insert(Table::Services, service.id, serde_json::to_value(&service)?)
            .await;

        Ok(service)
    }

    /// メニューを更新
    pub async fn update_service(&self, service: Service) -> Result<(), StoreError> {
        service.validate()?;
        {
            let mut state = self.write_state();
            if let Some(slot) = state.services.iter_mut().find(|s| s.id == service.id) {
                *slot = service.clone();
            }
            state.sync_states.insert(service.id, SyncState::Pending);
        }
        self.push_update(Table::Services, service.id, serde_json::to_value(&service)?)
            .await;
        Ok(())
    }

    /// メニューを削除
    pub async fn delete_service(&self, id: Uuid) -> Result<(), StoreError> {
        self.write_state().services.retain(|s| s.id != id);
        self.push_delete(Table::Services, id).await;
        Ok(())
    }

    // ---- professionals ----------------------------------------------------

    /// 担当者を追加し、採番済みレコードを返す
    pub async fn add_professional(
        &self,
        draft: NewProfessional,
    ) -> Result<Professional, StoreError> {
        let business_id = self.active_business_id()?;
        let professional = draft.into_record(Uuid::new_v4(), business_id);

        {
            let mut state = self.write_state();
            state.professionals.push(professional.clone());
            state.sync_states.insert(professional.id, SyncState::Pending);
        }
        self.push_insert(
            Table::Professionals,
            professional.id,
            serde_json::to_value(&professional)?,
        )
        .await;

        Ok(professional)
    }

    /// 担当者を更新
    pub async fn update_professional(&self, professional: Professional) -> Result<(), StoreError> {
        {
            let mut state = self.write_state();
            if let Some(slot) = state
                .professionals
                .iter_mut()
                .find(|p| p.id == professional.id)
            {
                *slot = professional.clone();
            }
            state.sync_states.insert(professional.id, SyncState::Pending);
        }
        self.push_update(
            Table::Professionals,
            professional.id,
            serde_json::to_value(&professional)?,
        )
        .await;
        Ok(())
    }

    /// 担当者を削除
    pub async fn delete_professional(&self, id: Uuid) -> Result<(), StoreError> {
        self.write_state().professionals.retain(|p| p.id != id);
        self.push_delete(Table::Professionals, id).await;
        Ok(())
    }

    // ---- appointments -----------------------------------------------------

    /// 予約を追加し、採番済みレコードを返す
    ///
    /// 空き確認は作成フローの責務。ここでは確認済みの内容をそのまま
    /// 受け入れる。
    pub async fn add_appointment(&self, draft: NewAppointment) -> Result<Appointment, StoreError> {
        let business_id = self.active_business_id()?;
        let appointment = draft.into_record(Uuid::new_v4(), business_id);

        {
            let mut state = self.write_state();
            state.appointments.push(appointment.clone());
            state.sync_states.insert(appointment.id, SyncState::Pending);
        }
        self.push_insert(
            Table::Appointments,
            appointment.id,
            serde_json::to_value(&appointment)?,
        )
        .await;

        Ok(appointment)
    }

    /// 予約の全項目を更新
    pub async fn update_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        {
            let mut state = self.write_state();
            if let Some(slot) = state
                .appointments
                .iter_mut()
                .find(|a| a.id == appointment.id)
            {
                *slot = appointment.clone();
            }
            state.sync_states.insert(appointment.id, SyncState::Pending);
        }
        self.push_update(
            Table::Appointments,
            appointment.id,
            serde_json::to_value(&appointment)?,
        )
        .await;
        Ok(())
    }

    /// 予約の状態だけを更新（カードの完了ボタンなど）
    pub async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<(), StoreError> {
        let found = {
            let mut state = self.write_state();
            let found = match state.appointments.iter_mut().find(|a| a.id == id) {
                Some(appointment) => {
                    appointment.status = status;
                    true
                }
                None => false,
            };
            if found {
                state.sync_states.insert(id, SyncState::Pending);
            }
            found
        };

        if found {
            self.push_update(
                Table::Appointments,
                id,
                serde_json::json!({ "status": status }),
            )
            .await;
        }
        Ok(())
    }

    /// 予約を削除
    pub async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError> {
        self.write_state().appointments.retain(|a| a.id != id);
        self.push_delete(Table::Appointments, id).await;
        Ok(())
    }

    // ---- business ---------------------------------------------------------

    /// 店舗設定を部分更新し、更新後のレコードを返す
    pub async fn save_business(&self, patch: BusinessPatch) -> Result<Business, StoreError> {
        let business_id = self.active_business_id()?;
        let updated = {
            let mut state = self.write_state();
            let current = state.business.get_or_insert_with(|| Business {
                id: business_id,
                name: String::new(),
                hours: String::new(),
                branding_color: None,
                logo_url: None,
            });
            if let Some(name) = &patch.name {
                current.name = name.clone();
            }
            if let Some(hours) = &patch.hours {
                current.hours = hours.clone();
            }
            if let Some(color) = &patch.branding_color {
                current.branding_color = Some(color.clone());
            }
            if let Some(logo) = &patch.logo_url {
                current.logo_url = Some(logo.clone());
            }
            let updated = current.clone();
            state.sync_states.insert(business_id, SyncState::Pending);
            updated
        };

        self.push_update(
            Table::Businesses,
            business_id,
            serde_json::to_value(&patch)?,
        )
        .await;
        Ok(updated)
    }

    /// オンボーディング: 店舗、最初の担当者、初期メニューを一括作成
    ///
    /// 店舗の作成に失敗したら全体を失敗として返す。担当者とメニューは
    /// ベストエフォートで続行する。担当者のメールはサインイン中の
    /// ユーザーから引き継ぐ。
    pub async fn create_initial_setup(
        &self,
        business_name: &str,
        professional_name: &str,
        services: Vec<NewService>,
    ) -> Result<Uuid, StoreError> {
        let business = Business {
            id: Uuid::new_v4(),
            name: business_name.to_string(),
            hours: DEMO_BUSINESS_HOURS.to_string(),
            branding_color: Some(DEFAULT_BRAND_COLOR.to_string()),
            logo_url: None,
        };

        if let Some(backend) = &self.backend {
            backend
                .insert(Table::Businesses, serde_json::to_value(&business)?)
                .await
                .map_err(|e| StoreError::SetupFailed(e.to_string()))?;
        }

        let email = self
            .session
            .current_identity()
            .map(|identity| identity.email)
            .unwrap_or_else(|| "admin@admin.com".to_string());
        let professional = NewProfessional {
            name: professional_name.to_string(),
            email,
            status: Default::default(),
        }
        .into_record(Uuid::new_v4(), business.id);

        {
            let mut state = self.write_state();
            state.business = Some(business.clone());
            state.professionals.push(professional.clone());
        }
        if let Some(backend) = &self.backend {
            if let Err(e) = backend
                .insert(
                    Table::Professionals,
                    serde_json::to_value(&professional)?,
                )
                .await
            {
                warn!("professional insert failed during setup: {}", e);
                self.mark_sync(professional.id, SyncState::Failed);
            }
        }

        for draft in services {
            let service = draft.into_record(Uuid::new_v4(), business.id);
            self.write_state().services.push(service.clone());
            if let Some(backend) = &self.backend {
                if let Err(e) = backend
                    .insert(Table::Services, serde_json::to_value(&service)?)
                    .await
                {
                    warn!("service insert failed during setup: {}", e);
                    self.mark_sync(service.id, SyncState::Failed);
                }
            }
        }

        self.stamp_sync();
        Ok(business.id)
    }

    // ---- read surface -----------------------------------------------------

    pub fn business(&self) -> Option<Business> {
        self.read_state().business.clone()
    }

    pub fn professionals(&self) -> Vec<Professional> {
        self.read_state().professionals.clone()
    }

    pub fn services(&self) -> Vec<Service> {
        self.read_state().services.clone()
    }

    pub fn clients(&self) -> Vec<Client> {
        self.read_state().clients.clone()
    }

    /// ロールで絞った予約一覧
    ///
    /// スタッフは自分に紐づく担当者の分だけを見る。絞り込みは読み出しの
    /// たびに適用され、キャッシュされない。
    pub fn appointments(&self) -> Vec<Appointment> {
        let all = self.read_state().appointments.clone();
        match self.session.current_identity() {
            Some(identity) if identity.role == Role::Staff => match identity.professional_id {
                Some(professional_id) => all
                    .into_iter()
                    .filter(|a| a.professional_id == professional_id)
                    .collect(),
                None => all,
            },
            _ => all,
        }
    }

    /// 新規予約ピッカー向けの稼働中メニュー
    pub fn active_services(&self) -> Vec<Service> {
        self.read_state()
            .services
            .iter()
            .filter(|s| s.status.is_active())
            .cloned()
            .collect()
    }

    /// 新規予約ピッカー向けの稼働中担当者
    pub fn active_professionals(&self) -> Vec<Professional> {
        self.read_state()
            .professionals
            .iter()
            .filter(|p| p.status.is_active())
            .cloned()
            .collect()
    }

    /// 顧客名の解決（削除済みならプレースホルダー）
    pub fn client_name(&self, id: Uuid) -> String {
        self.read_state()
            .clients
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    /// メニュー名の解決（削除済みならプレースホルダー）
    pub fn service_name(&self, id: Uuid) -> String {
        self.read_state()
            .services
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| UNKNOWN_SERVICE.to_string())
    }

    /// 担当者名の解決（削除済みならプレースホルダー）
    pub fn professional_name(&self, id: Uuid) -> String {
        self.read_state()
            .professionals
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| UNKNOWN_PROFESSIONAL.to_string())
    }

    // ---- derived views ----------------------------------------------------

    /// 現在のスナップショットに対する空き確認
    ///
    /// 比較対象はロールに関係なく全予約。スタッフの画面からでも他人の
    /// 枠とは衝突する。
    pub fn check_conflict(&self, request: &SlotRequest) -> bool {
        let state = self.read_state();
        has_conflict(&state.appointments, &state.services, request)
    }

    /// 今日の件数・未消化件数・売上
    pub fn today_stats(&self, today: NaiveDate) -> StatsSummary {
        let todays: Vec<Appointment> = self
            .appointments()
            .into_iter()
            .filter(|a| a.date == today)
            .collect();
        let state = self.read_state();
        summarize(&todays, &state.services)
    }
}

/// 店舗設定の部分更新
#[derive(Debug, Clone, Default, Serialize)]
pub struct BusinessPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branding_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

fn narrow_row<T>(table: Table, row: Value) -> Option<T>
where
    T: DeserializeOwned + Validate,
{
    match narrow::<T>(row) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("dropping invalid {} row: {}", table, e);
            None
        }
    }
}

/// 行の絞り込み（壊れた行はログを残して捨てる）
fn narrow_rows<T>(table: Table, rows: Vec<Value>) -> Vec<T>
where
    T: DeserializeOwned + Validate,
{
    rows.into_iter()
        .filter_map(|row| narrow_row(table, row))
        .collect()
}
