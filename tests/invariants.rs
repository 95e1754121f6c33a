mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::TestApp;
use rental_bookings::controllers::booking_controller::BookingController;
use rental_bookings::dto::booking_dto::CreateBookingRequest;
use rental_bookings::models::auth::{AuthenticatedUser, UserRole};
use rental_bookings::models::booking::{Booking, BookingStatus, PaymentStatus};
use rental_bookings::models::earnings::EarningsRange;
use rental_bookings::repositories::{BookingChange, BookingStore, InMemoryStore};
use rental_bookings::services::availability_service::{windows_overlap, BlockingPolicy};
use rental_bookings::services::booking_state_machine::{Actor, Transition};
use rental_bookings::services::earnings_service::EarningsService;
use rental_bookings::services::pending_reaper::PendingReaper;
use rental_bookings::utils::errors::AppError;

fn create_request(app: &TestApp, start: &str, end: &str) -> CreateBookingRequest {
    serde_json::from_value(app.booking_body(start, end)).unwrap()
}

fn paid_booking(agency_id: Uuid, vehicle_id: Uuid, start: DateTime<Utc>, total: rust_decimal::Decimal) -> Booking {
    Booking {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        vehicle_id,
        agency_id,
        start_date: start,
        end_date: start + Duration::days(1),
        pickup_location: "Goa".into(),
        dropoff_location: "Goa".into(),
        daily_rate: total,
        number_of_days: 1,
        subtotal: total,
        tax_amount: dec!(0),
        discount_amount: dec!(0),
        total_amount: total,
        security_deposit: dec!(0),
        status: BookingStatus::Confirmed,
        payment_status: PaymentStatus::Completed,
        odometer_start: None,
        odometer_end: None,
        notes: None,
        created_at: start,
        updated_at: start,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_for_same_window_admit_one() {
    let app = TestApp::new().await;
    let controller = Arc::new(BookingController::new(&app.state));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let controller = controller.clone();
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: UserRole::Customer,
        };
        let request = create_request(&app, "2025-06-01T10:00", "2025-06-03T10:00");
        handles.push(tokio::spawn(async move {
            controller.create(user, request, None).await
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(app.store.all_bookings().await.len(), 1);
}

#[tokio::test]
async fn test_random_intervals_never_overlap() {
    let store = InMemoryStore::new();
    let mut rng = StdRng::seed_from_u64(0x5eed_b00c);
    let vehicles: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let origin = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let policy = BlockingPolicy::GraceWindow(Duration::minutes(2));
    let mut now = origin;

    // Time moves on between steps, so pending bookings regularly outlive the
    // grace window and get overridden by newer ones
    for _ in 0..400 {
        now += Duration::seconds(rng.gen_range(0..90));
        let vehicle_id = vehicles[rng.gen_range(0..vehicles.len())];
        let start = origin + Duration::hours(rng.gen_range(0..24 * 30));
        let end = start + Duration::hours(rng.gen_range(1..96));
        let mut booking = paid_booking(Uuid::new_v4(), vehicle_id, start, dec!(100));
        booking.end_date = end;
        booking.status = BookingStatus::Pending;
        booking.payment_status = PaymentStatus::Pending;
        booking.created_at = now;

        match store.insert_booking(booking, policy, now).await {
            Ok(_) | Err(AppError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    // Confirm, activate or cancel in random order; claims on a held window fail
    let mut all = store.all_bookings().await;
    all.shuffle(&mut rng);
    let mut refused = 0;
    for booking in &all {
        now += Duration::seconds(rng.gen_range(0..90));
        let transitions = match rng.gen_range(0..4) {
            0 => vec![BookingStatus::Cancelled],
            1 => vec![BookingStatus::Confirmed, BookingStatus::Active],
            _ => vec![BookingStatus::Confirmed],
        };
        for target in transitions {
            let change = BookingChange {
                actor: Actor::Agency(booking.agency_id),
                transition: Transition::SetStatus(target),
                payment: None,
                now,
            };
            match store.apply_transition(booking.id, change).await {
                Ok(_) => {}
                Err(AppError::Conflict(_)) => {
                    refused += 1;
                    break;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    let stored = store.all_bookings().await;
    assert!(stored.iter().any(|b| b.status.holds_vehicle()));
    assert!(refused > 0, "no overridden pending booking was exercised");
    for vehicle_id in &vehicles {
        let holding: Vec<&Booking> = stored
            .iter()
            .filter(|b| b.vehicle_id == *vehicle_id && b.status.holds_vehicle())
            .collect();
        for (i, a) in holding.iter().enumerate() {
            for b in holding.iter().skip(i + 1) {
                assert!(
                    !windows_overlap(a.start_date, a.end_date, b.start_date, b.end_date),
                    "bookings {} and {} overlap",
                    a.id,
                    b.id
                );
            }
        }
    }
}

#[tokio::test]
async fn test_stale_pending_stops_blocking_after_grace() {
    let app = TestApp::new().await;
    let created = Utc::now() - Duration::minutes(10);
    let mut stale = paid_booking(
        app.agency.id,
        app.vehicle.id,
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        dec!(2000),
    );
    stale.status = BookingStatus::Pending;
    stale.payment_status = PaymentStatus::Pending;
    stale.created_at = created;
    app.store.put_booking(stale.clone()).await;

    // Strict availability still reports it
    let uri = format!(
        "/api/bookings/availability?vehicle_id={}&start_date=2025-06-01T12:00&end_date=2025-06-01T18:00",
        app.vehicle.id
    );
    let (_, body) = app.send("GET", &uri, Some(&app.customer_token()), None, &[]).await;
    assert_eq!(body["isBooked"], true);

    let (_, body) = app
        .send("GET", &format!("{}&mode=listing", uri), Some(&app.customer_token()), None, &[])
        .await;
    assert_eq!(body["isBooked"], false);

    // A new booking may take the window
    app.create_booking("2025-06-01T10:00", "2025-06-02T10:00").await;
}

#[tokio::test]
async fn test_reaper_cancels_only_stale_unpaid() {
    let store = InMemoryStore::new();
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let start = now + Duration::days(5);

    let mut stale = paid_booking(Uuid::new_v4(), Uuid::new_v4(), start, dec!(500));
    stale.status = BookingStatus::Pending;
    stale.payment_status = PaymentStatus::Pending;
    stale.created_at = now - Duration::minutes(45);

    let mut fresh = stale.clone();
    fresh.id = Uuid::new_v4();
    fresh.created_at = now - Duration::minutes(5);

    let mut paid = stale.clone();
    paid.id = Uuid::new_v4();
    paid.status = BookingStatus::Confirmed;
    paid.payment_status = PaymentStatus::Completed;

    for booking in [&stale, &fresh, &paid] {
        store.put_booking(booking.clone()).await;
    }

    let reaper = PendingReaper::new(
        Arc::new(store.clone()),
        Duration::minutes(30),
        std::time::Duration::from_secs(60),
    );
    assert_eq!(reaper.run_once(now).await.unwrap(), 1);

    let status = |id: Uuid| {
        let store = store.clone();
        async move { store.find_booking(id).await.unwrap().unwrap().status }
    };
    assert_eq!(status(stale.id).await, BookingStatus::Cancelled);
    assert_eq!(status(fresh.id).await, BookingStatus::Pending);
    assert_eq!(status(paid.id).await, BookingStatus::Confirmed);

    // Nothing left to do
    assert_eq!(reaper.run_once(now).await.unwrap(), 0);
}

#[tokio::test]
async fn test_month_earnings_growth() {
    let app = TestApp::new().await;
    let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();

    for (start, total) in [
        (Utc.with_ymd_and_hms(2026, 5, 3, 9, 0, 0).unwrap(), dec!(500)),
        (Utc.with_ymd_and_hms(2026, 5, 12, 9, 0, 0).unwrap(), dec!(1500)),
        (Utc.with_ymd_and_hms(2026, 4, 18, 9, 0, 0).unwrap(), dec!(1000)),
    ] {
        app.store
            .put_booking(paid_booking(app.agency.id, app.vehicle.id, start, total))
            .await;
    }

    let service = EarningsService::new(Arc::new(app.store.clone()), Arc::new(app.store.clone()));
    let report = service
        .report(app.agency.user_id, EarningsRange::Month, now)
        .await
        .unwrap();

    assert_eq!(report.summary.total_earnings, dec!(2000));
    assert_eq!(report.summary.total_bookings, 2);
    assert_eq!(report.summary.growth_rate, 100.0);
    assert_eq!(report.summary.previous_earnings, dec!(1000));

    let not_an_owner = service
        .report(Uuid::new_v4(), EarningsRange::Month, now)
        .await;
    assert!(matches!(not_an_owner, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_earnings_endpoint_shape() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send("GET", "/api/agencies/earnings?range=week", Some(&app.owner_token()), None, &[])
        .await;
    assert_eq!(status.as_u16(), 200, "{}", body);
    assert_eq!(body["range"], "week");
    assert_eq!(body["monthlyTrend"].as_array().unwrap().len(), 6);
    assert_eq!(body["summary"]["totalBookings"], json!(0));

    let (status, body) = app
        .send("GET", "/api/agencies/earnings", Some(&app.customer_token()), None, &[])
        .await;
    assert_eq!(status.as_u16(), 404);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = app
        .send("GET", "/api/agencies/earnings?range=decade", Some(&app.owner_token()), None, &[])
        .await;
    assert_eq!(status.as_u16(), 400);
}
