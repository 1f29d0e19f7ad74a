//! Date-range classification for appointment lists

use agenda_crm_models::Appointment;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// 予約リストの期間指定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    Tomorrow,
    NextSevenDays,
    Custom(NaiveDate),
}

/// 解決済みの半開区間 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// 1 日だけの区間
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day + Duration::days(1),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

impl DateRange {
    /// 基準日から具体的な区間へ解決
    ///
    /// 週モードは `[today, today + 7)` の 7 日間。
    pub fn resolve(&self, today: NaiveDate) -> DateSpan {
        match self {
            DateRange::Today => DateSpan::single_day(today),
            DateRange::Tomorrow => DateSpan::single_day(today + Duration::days(1)),
            DateRange::NextSevenDays => DateSpan {
                start: today,
                end: today + Duration::days(7),
            },
            DateRange::Custom(day) => DateSpan::single_day(*day),
        }
    }
}

/// 区間内の予約（日付昇順、同日内は時刻順）
pub fn appointments_in(span: DateSpan, appointments: &[Appointment]) -> Vec<Appointment> {
    let mut list: Vec<Appointment> = appointments
        .iter()
        .filter(|a| span.contains(a.date))
        .cloned()
        .collect();
    list.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
    list
}

/// 週表示のための日毎グルーピング
pub fn group_by_day(
    span: DateSpan,
    appointments: &[Appointment],
) -> BTreeMap<NaiveDate, Vec<Appointment>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<Appointment>> = BTreeMap::new();
    for appointment in appointments_in(span, appointments) {
        grouped.entry(appointment.date).or_default().push(appointment);
    }
    grouped
}

/// カレンダーの 1 日分の稼働スケジュール（キャンセル除外、時刻順）
pub fn day_schedule(day: NaiveDate, appointments: &[Appointment]) -> Vec<Appointment> {
    let mut list: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.date == day && !a.status.is_cancelled())
        .cloned()
        .collect();
    list.sort_by(|a, b| a.time.cmp(&b.time));
    list
}
