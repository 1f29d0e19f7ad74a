//! Aggregation over filtered appointment sets

use agenda_crm_models::{Appointment, AppointmentStatus, Service};
use std::collections::HashMap;
use uuid::Uuid;

/// 予約リストの集計値
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsSummary {
    /// 対象の総件数
    pub count: usize,
    /// 未消化（保留＋確定）の件数
    pub pending_count: usize,
    /// 完了済み予約の売上合計
    pub revenue: f64,
}

/// 件数・未消化件数・売上を一度に集計
///
/// 売上は完了済み予約の参照先メニュー価格の合計。価格を解決できない
/// 予約は 0 円として数える。
pub fn summarize(appointments: &[Appointment], services: &[Service]) -> StatsSummary {
    let mut summary = StatsSummary {
        count: appointments.len(),
        ..Default::default()
    };
    for appointment in appointments {
        if appointment.status.is_open() {
            summary.pending_count += 1;
        }
        if appointment.status == AppointmentStatus::Completed {
            summary.revenue += service_price(services, appointment.service_id);
        }
    }
    summary
}

/// メニュー価格の解決（見つからなければ 0）
pub fn service_price(services: &[Service], service_id: Uuid) -> f64 {
    services
        .iter()
        .find(|s| s.id == service_id)
        .map(|s| s.price)
        .unwrap_or(0.0)
}

/// 前期比の伸び率（％、四捨五入）
///
/// 前期が 0 のときは、今期に売上があれば +100、なければ 0。
pub fn growth_percent(previous: f64, current: f64) -> i64 {
    if previous == 0.0 {
        return if current > 0.0 { 100 } else { 0 };
    }
    (((current - previous) / previous) * 100.0).round() as i64
}

/// 客単価の表示用文字列（小数 2 桁、0 件なら "0.00"）
pub fn ticket_average(revenue: f64, count: usize) -> String {
    if count == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", revenue / count as f64)
}

/// 件数が最も多いメニュー名（インサイト生成の入力になる）
pub fn top_service_name(appointments: &[Appointment], services: &[Service]) -> Option<String> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for appointment in appointments {
        *counts.entry(appointment.service_id).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, hits)| *hits)
        .and_then(|(id, _)| services.iter().find(|s| s.id == id))
        .map(|s| s.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_crm_models::Reminder;
    use chrono::NaiveDate;

    fn service(id: Uuid, price: f64) -> Service {
        Service {
            id,
            name: "Corte".to_string(),
            duration: 30,
            price,
            status: Default::default(),
            business_id: Uuid::new_v4(),
        }
    }

    fn booking(service: Uuid, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            service_id: service,
            professional_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            time: "09:00".to_string(),
            status,
            reminder: Reminder::None,
            notes: None,
            business_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn revenue_counts_completed_only() {
        let service_id = Uuid::new_v4();
        let services = [service(service_id, 100.0)];
        let apps = [
            booking(service_id, AppointmentStatus::Completed),
            booking(service_id, AppointmentStatus::Completed),
            booking(service_id, AppointmentStatus::Pending),
            booking(service_id, AppointmentStatus::Cancelled),
        ];

        let summary = summarize(&apps, &services);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.revenue, 200.0);
    }

    #[test]
    fn pending_means_open_not_finished() {
        let service_id = Uuid::new_v4();
        let services = [service(service_id, 100.0)];
        let apps = [
            booking(service_id, AppointmentStatus::Pending),
            booking(service_id, AppointmentStatus::Confirmed),
            booking(service_id, AppointmentStatus::Completed),
            booking(service_id, AppointmentStatus::Cancelled),
        ];

        let summary = summarize(&apps, &services);
        assert_eq!(summary.pending_count, 2);
    }

    #[test]
    fn missing_service_price_counts_as_zero() {
        let apps = [booking(Uuid::new_v4(), AppointmentStatus::Completed)];
        let summary = summarize(&apps, &[]);
        assert_eq!(summary.revenue, 0.0);
    }

    #[test]
    fn growth_handles_zero_baselines() {
        assert_eq!(growth_percent(0.0, 0.0), 0);
        assert_eq!(growth_percent(0.0, 150.0), 100);
        assert_eq!(growth_percent(200.0, 250.0), 25);
        assert_eq!(growth_percent(200.0, 150.0), -25);
    }

    #[test]
    fn ticket_average_formats_two_decimals() {
        assert_eq!(ticket_average(0.0, 0), "0.00");
        assert_eq!(ticket_average(250.0, 3), "83.33");
        assert_eq!(ticket_average(100.0, 2), "50.00");
    }

    #[test]
    fn top_service_is_the_most_booked() {
        let corte = Uuid::new_v4();
        let barba = Uuid::new_v4();
        let services = [
            Service {
                name: "Corte".to_string(),
                ..service(corte, 80.0)
            },
            Service {
                name: "Barba".to_string(),
                ..service(barba, 40.0)
            },
        ];
        let apps = [
            booking(corte, AppointmentStatus::Completed),
            booking(barba, AppointmentStatus::Completed),
            booking(barba, AppointmentStatus::Pending),
        ];

        assert_eq!(top_service_name(&apps, &services), Some("Barba".to_string()));
    }
}
