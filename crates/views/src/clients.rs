//! Client recency classification, search and birthday detection

use agenda_crm_models::{Appointment, AppointmentStatus, Client};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 最終来店からの経過による顧客の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    /// 来店履歴なし
    New,
    /// 30 日以内
    Active,
    /// 31〜60 日
    Warning,
    /// 61〜90 日
    Inactive,
    /// 90 日超
    Risk,
}

/// 状態付きの顧客ビュー
#[derive(Debug, Clone, PartialEq)]
pub struct ClientView {
    pub client: Client,
    pub last_visit: Option<NaiveDate>,
    pub activity: Activity,
}

/// 最終来店日からの経過日数で顧客を分類
///
/// 来店は完了済み予約だけを数える。保存されない派生値なので、
/// 読み出しのたびに再計算してよい。
pub fn classify(
    client_id: Uuid,
    appointments: &[Appointment],
    today: NaiveDate,
) -> (Option<NaiveDate>, Activity) {
    let last_visit = appointments
        .iter()
        .filter(|a| a.client_id == client_id && a.status == AppointmentStatus::Completed)
        .map(|a| a.date)
        .max();

    match last_visit {
        None => (None, Activity::New),
        Some(last) => {
            let days = (today - last).num_days();
            let activity = if days <= 30 {
                Activity::Active
            } else if days <= 60 {
                Activity::Warning
            } else if days <= 90 {
                Activity::Inactive
            } else {
                Activity::Risk
            };
            (Some(last), activity)
        }
    }
}

/// 顧客一覧へ状態を付与
pub fn with_activity(
    clients: &[Client],
    appointments: &[Appointment],
    today: NaiveDate,
) -> Vec<ClientView> {
    clients
        .iter()
        .map(|client| {
            let (last_visit, activity) = classify(client.id, appointments, today);
            ClientView {
                client: client.clone(),
                last_visit,
                activity,
            }
        })
        .collect()
}

/// 名前または番号（数字のみ比較）での部分一致
///
/// 大文字小文字は区別しない。空の検索語は全件にマッチする。
pub fn matches_search(client: &Client, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    if client.name.to_lowercase().contains(&term) {
        return true;
    }
    let digits: String = client
        .whatsapp
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.contains(&term)
}

/// 検索語と状態フィルターの合成（AND、どちらも省略可能）
pub fn filter_clients(
    views: &[ClientView],
    term: &str,
    activity: Option<Activity>,
) -> Vec<ClientView> {
    views
        .iter()
        .filter(|view| activity.map_or(true, |a| view.activity == a))
        .filter(|view| matches_search(&view.client, term))
        .cloned()
        .collect()
}

/// 今週（日曜始まり）に誕生日を迎える顧客
///
/// 生年は見ず、今年の月日へ写して判定する。結果は月・日順。
pub fn weekly_birthdays(clients: &[Client], today: NaiveDate) -> Vec<Client> {
    let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
    let week_end = week_start + Duration::days(6);

    let mut matches: Vec<(u32, u32, Client)> = clients
        .iter()
        .filter_map(|client| {
            let birth = client.birth_date?;
            // Feb 29 has no slot in a non-leap current year and is skipped.
            let this_year = NaiveDate::from_ymd_opt(today.year(), birth.month(), birth.day())?;
            if week_start <= this_year && this_year <= week_end {
                Some((birth.month(), birth.day(), client.clone()))
            } else {
                None
            }
        })
        .collect();

    matches.sort_by_key(|(month, day, _)| (*month, *day));
    matches.into_iter().map(|(_, _, client)| client).collect()
}
