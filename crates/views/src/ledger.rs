//! Financial ledger views over completed appointments

use agenda_crm_models::{Appointment, AppointmentStatus, Service};
use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::stats::{growth_percent, service_price};

/// 会計ビューの絞り込み条件
///
/// 日付は両端を含む。担当者は省略可能（省略時は全員）。
#[derive(Debug, Clone, Copy)]
pub struct LedgerFilter {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub professional: Option<Uuid>,
}

impl LedgerFilter {
    fn matches(&self, appointment: &Appointment) -> bool {
        appointment.status == AppointmentStatus::Completed
            && appointment.date >= self.start
            && appointment.date <= self.end
            && self
                .professional
                .map_or(true, |p| appointment.professional_id == p)
    }

    /// 同じ日数で直前に接する期間
    ///
    /// 今期の開始前日を終端とし、両端含みの日数を揃える。
    pub fn preceding(&self) -> LedgerFilter {
        let days = (self.end - self.start).num_days() + 1;
        let end = self.start - Duration::days(1);
        LedgerFilter {
            start: end - Duration::days(days - 1),
            end,
            professional: self.professional,
        }
    }
}

/// 期間内の入金履歴（完了済みのみ、新しい日付が先）
pub fn completed_payments(appointments: &[Appointment], filter: &LedgerFilter) -> Vec<Appointment> {
    let mut list: Vec<Appointment> = appointments
        .iter()
        .filter(|a| filter.matches(a))
        .cloned()
        .collect();
    list.sort_by(|a, b| b.date.cmp(&a.date));
    list
}

/// 期間内の受領合計
pub fn total_received(
    appointments: &[Appointment],
    services: &[Service],
    filter: &LedgerFilter,
) -> f64 {
    appointments
        .iter()
        .filter(|a| filter.matches(a))
        .map(|a| service_price(services, a.service_id))
        .sum()
}

/// 直前の同じ長さの期間と比べた売上の伸び（％）
pub fn growth_trend(
    appointments: &[Appointment],
    services: &[Service],
    filter: &LedgerFilter,
) -> i64 {
    let current = total_received(appointments, services, filter);
    let previous = total_received(appointments, services, &filter.preceding());
    growth_percent(previous, current)
}
