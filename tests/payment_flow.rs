mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::{token, TestApp, GATEWAY_SECRET};
use rental_bookings::controllers::payment_controller::PaymentController;
use rental_bookings::dto::payment_dto::CreatePaymentOrderRequest;
use rental_bookings::models::auth::{AuthenticatedUser, UserRole};
use rental_bookings::models::booking::{Booking, BookingStatus, PaymentStatus};
use rental_bookings::models::payment::PaymentRecordStatus;
use rental_bookings::repositories::BookingStore;
use rental_bookings::services::payment_gateway::GatewayError;
use rental_bookings::services::payment_signature::PaymentSignatureVerifier;
use rental_bookings::utils::errors::AppError;

const START: &str = "2025-06-01T10:00";
const END: &str = "2025-06-03T10:00";

async fn open_order(app: &TestApp, booking_id: Uuid) -> String {
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["order"]["id"].as_str().unwrap().to_string()
}

fn verify_body(booking_id: Uuid, order_id: &str, payment_id: &str, secret: &str) -> serde_json::Value {
    let signature = PaymentSignatureVerifier::new(secret).sign(order_id, payment_id);
    json!({
        "bookingId": booking_id,
        "razorpay_order_id": order_id,
        "razorpay_payment_id": payment_id,
        "razorpay_signature": signature,
        "method": "upi",
        "email": "asha@example.com",
        "contact": "+919900000000"
    })
}

/// Unpaid pending booking on the app's vehicle, created long enough ago to
/// be past the grace window
async fn abandoned_booking(app: &TestApp, customer_id: Uuid) -> Booking {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
    let created = Utc::now() - Duration::minutes(10);
    let booking = Booking {
        id: Uuid::new_v4(),
        customer_id,
        vehicle_id: app.vehicle.id,
        agency_id: app.agency.id,
        start_date: start,
        end_date: start + Duration::days(2),
        pickup_location: "Bengaluru Airport".into(),
        dropoff_location: "Bengaluru Airport".into(),
        daily_rate: dec!(1000),
        number_of_days: 2,
        subtotal: dec!(2000),
        tax_amount: dec!(0),
        discount_amount: dec!(0),
        total_amount: dec!(2000),
        security_deposit: dec!(0),
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        odometer_start: None,
        odometer_end: None,
        notes: None,
        created_at: created,
        updated_at: created,
    };
    app.store.put_booking(booking.clone()).await;
    booking
}

#[tokio::test]
async fn test_create_order_sends_minor_units() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id })),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keyId"], common::GATEWAY_KEY_ID);
    assert_eq!(body["bookingId"], json!(booking_id));

    let requests = app.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, 200_000);
    assert_eq!(requests[0].currency, "INR");
    assert_eq!(requests[0].receipt, format!("b_{}", booking_id));
    assert_eq!(requests[0].payment_capture, 1);
    assert_eq!(requests[0].notes["booking_id"], json!(booking_id));

    let payments = app.store.payments_for_booking(booking_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentRecordStatus::Created);
    assert_eq!(payments[0].amount_minor, 200_000);
}

#[tokio::test]
async fn test_order_amount_override_must_be_positive() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id, "amountPaise": 0 })),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_AMOUNT");
    assert!(app.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_order_for_someone_elses_booking_is_forbidden() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;
    let stranger = token(Uuid::new_v4(), UserRole::Customer);

    let (status, _) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&stranger),
            Some(json!({ "bookingId": booking_id })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": Uuid::new_v4() })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_gateway_outage_leaves_no_payment_row() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;
    app.gateway.push_error(GatewayError::Timeout);

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "GATEWAY_UNAVAILABLE");

    app.gateway.push_error(GatewayError::Rejected {
        status: 400,
        body: "{\"error\":\"BAD_REQUEST_ERROR\"}".to_string(),
    });
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "GATEWAY_REJECTED");

    assert!(app.store.payments_for_booking(booking_id).await.unwrap().is_empty());
    let booking = app.store.find_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_verify_with_valid_signature_confirms() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;
    let order_id = open_order(&app, booking_id).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(verify_body(booking_id, &order_id, "pay_001", GATEWAY_SECRET)),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["paymentStatus"], "completed");

    let payments = app.store.payments_for_booking(booking_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].gateway_order_id, order_id);
    assert_eq!(payments[0].status, PaymentRecordStatus::Paid);
    assert_eq!(payments[0].gateway_payment_id.as_deref(), Some("pay_001"));
    assert_eq!(payments[0].method.as_deref(), Some("upi"));

    // A second verification for the same booking is refused
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(verify_body(booking_id, &order_id, "pay_001", GATEWAY_SECRET)),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_verify_with_wrong_secret_leaves_booking_untouched() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;
    let order_id = open_order(&app, booking_id).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(verify_body(booking_id, &order_id, "pay_001", "attacker-secret")),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    let booking = app.store.find_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, PaymentStatus::Pending);
    let payments = app.store.payments_for_booking(booking_id).await.unwrap();
    assert_eq!(payments[0].status, PaymentRecordStatus::Created);
}

#[tokio::test]
async fn test_verify_checks_ownership_before_signature() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;
    let stranger = token(Uuid::new_v4(), UserRole::Customer);

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&stranger),
            Some(verify_body(booking_id, "order_x", "pay_x", "whatever")),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_verify_lists_missing_fields() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": Uuid::new_v4(), "razorpay_order_id": "order_1" })),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELDS");
    assert_eq!(
        body["details"]["fields"],
        json!(["razorpay_payment_id", "razorpay_signature"])
    );
}

#[tokio::test]
async fn test_verify_without_recorded_order_creates_payment() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;

    let (status, _) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(verify_body(booking_id, "order_untracked", "pay_9", GATEWAY_SECRET)),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let payments = app.store.payments_for_booking(booking_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].gateway_order_id, "order_untracked");
    assert_eq!(payments[0].amount_minor, 200_000);
    assert_eq!(payments[0].status, PaymentRecordStatus::Paid);
}

#[tokio::test]
async fn test_cancel_after_payment_marks_refunded() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;
    let order_id = open_order(&app, booking_id).await;
    let (status, _) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(verify_body(booking_id, &order_id, "pay_001", GATEWAY_SECRET)),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/bookings/{}/cancel", booking_id);
    let (status, body) = app.send("PUT", &uri, Some(&app.customer_token()), None, &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["paymentStatus"], "refunded");

    let booking = app.store.find_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(
        (booking.status, booking.payment_status),
        (BookingStatus::Cancelled, PaymentStatus::Refunded)
    );
}

#[tokio::test]
async fn test_fail_payment_cancels_booking() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/fail",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id, "reason": "card declined" })),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["paymentStatus"], "failed");

    let payments = app.store.payments_for_booking(booking_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].gateway_order_id, format!("failed_{}", booking_id));
    assert_eq!(payments[0].status, PaymentRecordStatus::Failed);
    assert_eq!(payments[0].notes, Some(json!({ "reason": "card declined" })));

    // No new order on a cancelled booking
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_fail_is_refused_after_capture() {
    let app = TestApp::new().await;
    let booking_id = app.create_booking(START, END).await;
    let order_id = open_order(&app, booking_id).await;
    app.send(
        "POST",
        "/api/bookings/payment/verify",
        Some(&app.customer_token()),
        Some(verify_body(booking_id, &order_id, "pay_001", GATEWAY_SECRET)),
        &[],
    )
    .await;

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/fail",
            Some(&app.customer_token()),
            Some(json!({ "bookingId": booking_id, "razorpay_order_id": order_id })),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
    let booking = app.store.find_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_order_id_of_another_booking_conflicts() {
    let app = TestApp::new().await;
    let first = app.create_booking(START, END).await;
    let second = app.create_booking("2025-07-01T10:00", "2025-07-03T10:00").await;
    let order_id = open_order(&app, first).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(verify_body(second, &order_id, "pay_002", GATEWAY_SECRET)),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    let booking = app.store.find_booking(second).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_idempotent_order_creation() {
    let app = TestApp::with_idempotency().await;
    let booking_id = app.create_booking(START, END).await;
    let key = [("Idempotency-Key", "order-attempt-000000001")];
    let body = json!({ "bookingId": booking_id });

    let (status, first) = app
        .send("POST", "/api/bookings/payment/order", Some(&app.customer_token()), Some(body.clone()), &key)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = app
        .send("POST", "/api/bookings/payment/order", Some(&app.customer_token()), Some(body), &key)
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first["order"]["id"], second["order"]["id"]);
    assert_eq!(app.gateway.requests().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_with_same_key_reach_gateway_once() {
    let app = TestApp::with_idempotency().await;
    let booking_id = app.create_booking(START, END).await;
    let controller = Arc::new(PaymentController::new(&app.state));
    let user = AuthenticatedUser {
        user_id: app.customer_id,
        role: UserRole::Customer,
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let controller = controller.clone();
        let request = CreatePaymentOrderRequest {
            booking_id: Some(booking_id.to_string()),
            amount_paise: None,
        };
        handles.push(tokio::spawn(async move {
            controller
                .create_order(user, request, Some("order-attempt-concurrent-1".to_string()))
                .await
        }));
    }

    let mut order_ids = Vec::new();
    let mut in_progress = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(response) => order_ids.push(response.order["id"].clone()),
            Err(AppError::Conflict(_)) => in_progress += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(app.gateway.requests().len(), 1);
    assert!(!order_ids.is_empty());
    assert!(order_ids.iter().all(|id| *id == order_ids[0]));
    assert_eq!(order_ids.len() + in_progress, 8);
}

#[tokio::test]
async fn test_failed_order_frees_idempotency_key() {
    let app = TestApp::with_idempotency().await;
    let booking_id = app.create_booking(START, END).await;
    let key = [("Idempotency-Key", "order-attempt-000000002")];
    let body = json!({ "bookingId": booking_id });

    app.gateway.push_error(GatewayError::Timeout);
    let (status, _) = app
        .send("POST", "/api/bookings/payment/order", Some(&app.customer_token()), Some(body.clone()), &key)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, response) = app
        .send("POST", "/api/bookings/payment/order", Some(&app.customer_token()), Some(body), &key)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", response);
    assert_eq!(app.gateway.requests().len(), 2);
}

#[tokio::test]
async fn test_abandoned_booking_cannot_confirm_over_newer_booking() {
    let app = TestApp::new().await;
    let late_customer = Uuid::new_v4();
    let late_token = token(late_customer, UserRole::Customer);
    let stale = abandoned_booking(&app, late_customer).await;

    // Past the grace window, a new booking may take the same dates
    let fresh = app.create_booking(START, END).await;

    // The late customer had already opened an order
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&late_token),
            Some(json!({ "bookingId": stale.id })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let stale_order = body["order"]["id"].as_str().unwrap().to_string();

    let fresh_order = open_order(&app, fresh).await;
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&app.customer_token()),
            Some(verify_body(fresh, &fresh_order, "pay_fresh", GATEWAY_SECRET)),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "confirmed");

    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/verify",
            Some(&late_token),
            Some(verify_body(stale.id, &stale_order, "pay_stale", GATEWAY_SECRET)),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    assert_eq!(body["code"], "CONFLICT");

    let stored = app.store.find_booking(stale.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
    assert_eq!(stored.payment_status, PaymentStatus::Pending);

    // A new order is refused before reaching the gateway
    let orders_before = app.gateway.requests().len();
    let (status, body) = app
        .send(
            "POST",
            "/api/bookings/payment/order",
            Some(&late_token),
            Some(json!({ "bookingId": stale.id })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(app.gateway.requests().len(), orders_before);

    let confirmed: Vec<Booking> = app
        .store
        .all_bookings()
        .await
        .into_iter()
        .filter(|b| b.vehicle_id == app.vehicle.id && b.status.holds_vehicle())
        .collect();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, fresh);
}
