//! Double-booking detection for a professional's day

use agenda_crm_models::{Appointment, Service};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::time::{overlaps, time_to_minutes};

/// 参照先メニューを解決できない既存予約に仮定する所要時間（分）
pub const FALLBACK_DURATION_MIN: u32 = 60;

/// 空き確認の対象スロット
///
/// 予約フォームの状態をそのまま写す。未入力の欄は `None` や 0 のままで
/// よく、その間は衝突なしと判定される（評価不能のため）。
#[derive(Debug, Clone, Default)]
pub struct SlotRequest {
    pub professional_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    /// 開始時刻（"HH:MM"）
    pub time: String,
    pub duration_minutes: u32,
    /// 編集中の予約自身（自分との衝突を無視する）
    pub exclude: Option<Uuid>,
}

/// 同じ担当者・同じ日の既存予約との時間重複を判定
///
/// キャンセル済みと `exclude` の予約は比較対象にならない。既存予約の
/// 所要時間は参照先メニューから引き、メニューが消えている場合は
/// [`FALLBACK_DURATION_MIN`] を仮定する。副作用はない。
pub fn has_conflict(
    appointments: &[Appointment],
    services: &[Service],
    request: &SlotRequest,
) -> bool {
    let (professional_id, date) = match (request.professional_id, request.date) {
        (Some(p), Some(d)) => (p, d),
        _ => return false,
    };
    if request.time.is_empty() || request.duration_minutes == 0 {
        return false;
    }

    let new_start = time_to_minutes(&request.time);
    let new_end = new_start + request.duration_minutes;

    appointments.iter().any(|existing| {
        if existing.professional_id != professional_id
            || existing.date != date
            || Some(existing.id) == request.exclude
            || existing.status.is_cancelled()
        {
            return false;
        }
        let duration = services
            .iter()
            .find(|s| s.id == existing.service_id)
            .map(|s| s.duration)
            .unwrap_or(FALLBACK_DURATION_MIN);
        let existing_start = time_to_minutes(&existing.time);
        overlaps(new_start, new_end, existing_start, existing_start + duration)
    })
}
