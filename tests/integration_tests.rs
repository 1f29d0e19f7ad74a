use chrono::{Duration, NaiveDate};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agenda_crm::insight::FALLBACK_TIP;
use agenda_crm::models::{AppointmentStatus, NewAppointment, NewClient, NewService, Reminder};
use agenda_crm::prelude::*;
use agenda_crm::store::SyncState;
use agenda_crm::views::clients::{classify, Activity};
use agenda_crm::views::conflict::SlotRequest;
use agenda_crm::views::ledger::{growth_trend, LedgerFilter};
use agenda_crm::views::range::{group_by_day, DateRange};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// デモモードでのオンボーディングから会計までの一連の流れ
#[tokio::test]
async fn demo_mode_end_to_end() {
    let crm = AgendaCrm::new(AgendaConfig::default()).unwrap();
    assert!(!crm.is_configured());

    // サインインとオンボーディング
    let session = crm.session();
    session.sign_in("dona@example.com");
    let business_id = crm
        .store()
        .create_initial_setup(
            "Studio Aurora",
            "Ana",
            vec![NewService {
                name: "Corte".to_string(),
                duration: 60,
                price: 80.0,
                status: Default::default(),
            }],
        )
        .await
        .unwrap();
    session.link_business(business_id).unwrap();
    crm.refresh().await.unwrap();

    assert_eq!(crm.store().business().unwrap().name, "Studio Aurora");
    let service = crm.store().active_services()[0].clone();
    let professional = crm.store().active_professionals()[0].clone();

    // 予約フォームのクイック追加: 返ってきた顧客をそのまま使える
    let client = crm
        .store()
        .add_client(NewClient {
            name: "Maria Silva".to_string(),
            whatsapp: "(11) 98888-7777".to_string(),
            birth_date: None,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(crm.store().sync_state(client.id), SyncState::Synced);

    let today = day(2024, 6, 10);
    let first = crm
        .store()
        .add_appointment(NewAppointment {
            client_id: client.id,
            service_id: service.id,
            professional_id: professional.id,
            date: today,
            time: "09:00".to_string(),
            status: AppointmentStatus::Confirmed,
            reminder: Reminder::OneHour,
            notes: None,
        })
        .await
        .unwrap();

    // 同じ枠は衝突、背中合わせは空き
    let slot = |time: &str| SlotRequest {
        professional_id: Some(professional.id),
        date: Some(today),
        time: time.to_string(),
        duration_minutes: 30,
        exclude: None,
    };
    assert!(crm.store().check_conflict(&slot("09:30")));
    assert!(!crm.store().check_conflict(&slot("10:00")));

    crm.store()
        .add_appointment(NewAppointment {
            client_id: client.id,
            service_id: service.id,
            professional_id: professional.id,
            date: today,
            time: "10:00".to_string(),
            status: AppointmentStatus::Pending,
            reminder: Reminder::None,
            notes: None,
        })
        .await
        .unwrap();

    // 完了が売上へ乗る
    crm.store()
        .update_appointment_status(first.id, AppointmentStatus::Completed)
        .await
        .unwrap();
    let stats = crm.store().today_stats(today);
    assert_eq!(stats.count, 2);
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.revenue, 80.0);

    // 週ビューは日付昇順に並ぶ
    let span = DateRange::NextSevenDays.resolve(today);
    let grouped = group_by_day(span, &crm.store().appointments());
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[&today].len(), 2);

    // 会計: 前週が空なので伸び率は +100%
    let ledger = LedgerFilter {
        start: today,
        end: today,
        professional: None,
    };
    let trend = growth_trend(
        &crm.store().appointments(),
        &crm.store().services(),
        &ledger,
    );
    assert_eq!(trend, 100);

    // 最終来店からの経過で顧客が分類される
    let (_, activity) = classify(client.id, &crm.store().appointments(), today);
    assert_eq!(activity, Activity::Active);
    let (_, later) = classify(
        client.id,
        &crm.store().appointments(),
        today + Duration::days(95),
    );
    assert_eq!(later, Activity::Risk);

    // インサイトは未構成なのでフォールバック文
    let tip = crm
        .insight()
        .business_insight(&agenda_crm::insight::InsightRequest {
            appointments_count: stats.count,
            revenue: stats.revenue,
            top_service: "Corte".to_string(),
        })
        .await;
    assert_eq!(tip, FALLBACK_TIP);

    // サインアウトでキャッシュが消える
    crm.sign_out();
    assert!(crm.store().business().is_none());
    assert!(crm.store().clients().is_empty());
}

/// リモートストア構成時のロードと書き込み
#[tokio::test]
async fn configured_mode_loads_and_writes_through() {
    // モックサーバーの起動
    let mock_server = MockServer::start().await;
    let business_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/businesses"))
        .and(query_param("id", format!("eq.{}", business_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": business_id,
            "name": "Studio Aurora",
            "hours": "09:00 - 19:00",
            "branding_color": "#0f766e"
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/professionals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "name": "Ana",
            "email": "ana@example.com",
            "status": "active",
            "business_id": business_id
        }])))
        .mount(&mock_server)
        .await;

    for table in ["services", "clients", "appointments"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}", table)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "name": "Maria",
            "whatsapp": "11 98888-7777",
            "business_id": business_id
        }])))
        .mount(&mock_server)
        .await;

    let config = AgendaConfig::new(&mock_server.uri(), "test-anon-key").unwrap();
    let crm = AgendaCrm::new(config).unwrap();
    assert!(crm.is_configured());

    crm.session().sign_in("dona@example.com");
    crm.session().link_business(business_id).unwrap();
    crm.refresh().await.unwrap();

    let business = crm.store().business().unwrap();
    assert_eq!(business.name, "Studio Aurora");
    assert_eq!(business.brand_color(), "#0f766e");
    assert_eq!(crm.store().professionals().len(), 1);
    assert!(crm.store().last_sync().is_some());

    let created = crm
        .store()
        .add_client(NewClient {
            name: "Maria".to_string(),
            whatsapp: "11 98888-7777".to_string(),
            birth_date: None,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(crm.store().sync_state(created.id), SyncState::Synced);
}

/// リモート停止時は既存スナップショットが残る
#[tokio::test]
async fn outage_degrades_to_a_stale_snapshot() {
    let mock_server = MockServer::start().await;
    let business_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let config = AgendaConfig::new(&mock_server.uri(), "test-anon-key").unwrap();
    let crm = AgendaCrm::new(config).unwrap();
    crm.session().sign_in("dona@example.com");
    crm.session().link_business(business_id).unwrap();

    let result = crm.refresh().await;
    assert!(result.is_err());
    assert!(crm.store().last_sync().is_none());
    assert!(crm.store().business().is_none());
}
