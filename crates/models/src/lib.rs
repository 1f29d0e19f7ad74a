//! Entity schemas for the Agenda CRM scheduling core
//!
//! This crate defines the five record types mirrored from the remote store
//! (business, professionals, services, clients, appointments) together with
//! their wire spellings. Remote rows are narrowed into these types at the
//! cache boundary via [`narrow`]; rows that fail validation never enter the
//! cache.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 既定のブランドカラー
pub const DEFAULT_BRAND_COLOR: &str = "#4f46e5";

/// エラー型
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// フィールド制約の検証
pub trait Validate {
    /// 型だけでは表せない制約を検証
    fn validate(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

/// JSON 行を型付きレコードへ絞り込む
///
/// # 例
///
/// ```
/// use agenda_crm_models::{narrow, Client};
/// use serde_json::json;
///
/// let row = json!({
///     "id": "7e3a1c52-9f6b-4f0e-b6a7-3d2f0a1b2c3d",
///     "name": "Maria Silva",
///     "whatsapp": "(11) 98888-7777",
///     "business_id": "a31f2660-1dd2-11b2-8000-080020c9a66f"
/// });
/// let client: Client = narrow(row).unwrap();
/// assert_eq!(client.name, "Maria Silva");
/// ```
pub fn narrow<T>(value: serde_json::Value) -> Result<T, ModelError>
where
    T: DeserializeOwned + Validate,
{
    let record: T = serde_json::from_value(value)?;
    record.validate()?;
    Ok(record)
}

/// 稼働状態（新規予約のピッカーに出すかどうか）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Active,
    Inactive,
}

impl ActivityStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// 予約の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// 空き判定・稼働ビューから除外されるか
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// 未消化（保留または確定）か
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

/// リマインダーの送信タイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Reminder {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "24h")]
    DayBefore,
}

/// テナント（店舗）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    /// 営業時間の表示用テキスト（例: "08:00 - 18:00"）
    pub hours: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branding_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl Business {
    /// 設定されたブランドカラー（未設定時は既定色）
    pub fn brand_color(&self) -> &str {
        self.branding_color.as_deref().unwrap_or(DEFAULT_BRAND_COLOR)
    }

    /// ブランドカラー上で可読なテキスト色
    pub fn brand_contrast_color(&self) -> &'static str {
        // Colors without a leading '#' fall back to the default brand hex.
        let hex = match self.brand_color().strip_prefix('#') {
            Some(h) => h,
            None => "4f46e5",
        };
        if hex.len() != 6 {
            return "#ffffff";
        }
        let channel = |range: std::ops::Range<usize>| u32::from_str_radix(&hex[range], 16);
        let (r, g, b) = match (channel(0..2), channel(2..4), channel(4..6)) {
            (Ok(r), Ok(g), Ok(b)) => (r, g, b),
            _ => return "#ffffff",
        };
        // Perceived brightness, ITU-R 601 weights
        let brightness = (r * 299 + g * 587 + b * 114) / 1000;
        if brightness > 128 {
            "#1e293b"
        } else {
            "#ffffff"
        }
    }
}

impl Validate for Business {}

/// 施術担当者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Professional {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub status: ActivityStatus,
    pub business_id: Uuid,
}

impl Validate for Professional {}

/// 提供メニュー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    /// 所要時間（分）
    pub duration: u32,
    pub price: f64,
    #[serde(default)]
    pub status: ActivityStatus,
    pub business_id: Uuid,
}

impl Validate for Service {
    fn validate(&self) -> Result<(), ModelError> {
        if self.duration == 0 {
            return Err(ModelError::InvalidField {
                field: "duration",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ModelError::InvalidField {
                field: "price",
                reason: format!("must be a non-negative amount, got {}", self.price),
            });
        }
        Ok(())
    }
}

/// 顧客
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    /// WhatsApp 形式の連絡先番号
    pub whatsapp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub business_id: Uuid,
}

impl Validate for Client {}

/// 予約
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub professional_id: Uuid,
    pub date: NaiveDate,
    /// 開始時刻（"HH:MM"）
    pub time: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub business_id: Uuid,
}

impl Validate for Appointment {}

/// 新規顧客の下書き（id と business_id はストアが採番する）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub whatsapp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewClient {
    pub fn into_record(self, id: Uuid, business_id: Uuid) -> Client {
        Client {
            id,
            name: self.name,
            whatsapp: self.whatsapp,
            birth_date: self.birth_date,
            notes: self.notes,
            business_id,
        }
    }
}

/// 新規メニューの下書き
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub duration: u32,
    pub price: f64,
    #[serde(default)]
    pub status: ActivityStatus,
}

impl NewService {
    pub fn into_record(self, id: Uuid, business_id: Uuid) -> Service {
        Service {
            id,
            name: self.name,
            duration: self.duration,
            price: self.price,
            status: self.status,
            business_id,
        }
    }
}

/// 新規担当者の下書き
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfessional {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub status: ActivityStatus,
}

impl NewProfessional {
    pub fn into_record(self, id: Uuid, business_id: Uuid) -> Professional {
        Professional {
            id,
            name: self.name,
            email: self.email,
            status: self.status,
            business_id,
        }
    }
}

/// 新規予約の下書き
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub professional_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn into_record(self, id: Uuid, business_id: Uuid) -> Appointment {
        Appointment {
            id,
            client_id: self.client_id,
            service_id: self.service_id,
            professional_id: self.professional_id,
            date: self.date,
            time: self.time,
            status: self.status,
            reminder: self.reminder,
            notes: self.notes,
            business_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn business(color: Option<&str>) -> Business {
        Business {
            id: Uuid::new_v4(),
            name: "Studio Aurora".to_string(),
            hours: "08:00 - 18:00".to_string(),
            branding_color: color.map(|c| c.to_string()),
            logo_url: None,
        }
    }

    #[test]
    fn narrow_appointment_with_defaults() {
        let row = json!({
            "id": "5d2708d0-7ac2-4b7a-9e62-6a3f6f9a2a11",
            "client_id": "3fdc9f4a-a8cb-43b5-92d3-2f6f38c9a001",
            "service_id": "3fdc9f4a-a8cb-43b5-92d3-2f6f38c9a002",
            "professional_id": "3fdc9f4a-a8cb-43b5-92d3-2f6f38c9a003",
            "date": "2024-06-10",
            "time": "09:30",
            "status": "confirmed",
            "business_id": "3fdc9f4a-a8cb-43b5-92d3-2f6f38c9a004"
        });

        let app: Appointment = narrow(row).unwrap();
        assert_eq!(app.status, AppointmentStatus::Confirmed);
        assert_eq!(app.reminder, Reminder::None);
        assert_eq!(app.time, "09:30");
        assert_eq!(app.date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }

    #[test]
    fn narrow_service_without_status_defaults_to_active() {
        let row = json!({
            "id": "5d2708d0-7ac2-4b7a-9e62-6a3f6f9a2a11",
            "name": "Corte",
            "duration": 45,
            "price": 80.0,
            "business_id": "3fdc9f4a-a8cb-43b5-92d3-2f6f38c9a004"
        });

        let service: Service = narrow(row).unwrap();
        assert_eq!(service.status, ActivityStatus::Active);
    }

    #[test]
    fn narrow_rejects_zero_duration_service() {
        let row = json!({
            "id": "5d2708d0-7ac2-4b7a-9e62-6a3f6f9a2a11",
            "name": "Corte",
            "duration": 0,
            "price": 80.0,
            "business_id": "3fdc9f4a-a8cb-43b5-92d3-2f6f38c9a004"
        });

        let result: Result<Service, _> = narrow(row);
        assert!(matches!(
            result,
            Err(ModelError::InvalidField { field: "duration", .. })
        ));
    }

    #[test]
    fn narrow_rejects_negative_price() {
        let row = json!({
            "id": "5d2708d0-7ac2-4b7a-9e62-6a3f6f9a2a11",
            "name": "Corte",
            "duration": 30,
            "price": -1.0,
            "business_id": "3fdc9f4a-a8cb-43b5-92d3-2f6f38c9a004"
        });

        let result: Result<Service, _> = narrow(row);
        assert!(result.is_err());
    }

    #[test]
    fn reminder_wire_spellings() {
        assert_eq!(serde_json::to_string(&Reminder::DayBefore).unwrap(), "\"24h\"");
        let parsed: Reminder = serde_json::from_str("\"1h\"").unwrap();
        assert_eq!(parsed, Reminder::OneHour);
    }

    #[test]
    fn contrast_color_on_dark_brand_is_white() {
        let biz = business(Some("#1e1b4b"));
        assert_eq!(biz.brand_contrast_color(), "#ffffff");
    }

    #[test]
    fn contrast_color_on_bright_brand_is_slate() {
        let biz = business(Some("#fbbf24"));
        assert_eq!(biz.brand_contrast_color(), "#1e293b");
    }

    #[test]
    fn contrast_color_tolerates_malformed_hex() {
        let biz = business(Some("#zzz"));
        assert_eq!(biz.brand_contrast_color(), "#ffffff");
    }

    #[test]
    fn default_brand_color_applies_when_unset() {
        let biz = business(None);
        assert_eq!(biz.brand_color(), DEFAULT_BRAND_COLOR);
        // The default indigo is dark enough for white text.
        assert_eq!(biz.brand_contrast_color(), "#ffffff");
    }
}
