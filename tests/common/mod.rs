#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use rental_bookings::cache::InMemoryIdempotencyStore;
use rental_bookings::config::environment::{BookingPolicyConfig, EnvironmentConfig, GatewayConfig};
use rental_bookings::models::agency::Agency;
use rental_bookings::models::auth::UserRole;
use rental_bookings::models::vehicle::{Vehicle, VehicleStatus};
use rental_bookings::repositories::InMemoryStore;
use rental_bookings::routes::create_router;
use rental_bookings::services::payment_gateway::{
    GatewayError, GatewayOrder, OrderRequest, PaymentGateway,
};
use rental_bookings::state::AppState;
use rental_bookings::utils::jwt::{generate_token, JwtConfig};

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const GATEWAY_KEY_ID: &str = "rzp_test_key";
pub const GATEWAY_SECRET: &str = "integration-gateway-secret";

/// Gateway double: pops scripted results, otherwise acknowledges every order
#[derive(Default)]
pub struct MockGateway {
    scripted: Mutex<VecDeque<Result<GatewayOrder, GatewayError>>>,
    requests: Mutex<Vec<OrderRequest>>,
}

impl MockGateway {
    pub fn push_error(&self, error: GatewayError) {
        self.scripted.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<OrderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn key_id(&self) -> &str {
        GATEWAY_KEY_ID
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if let Some(result) = self.scripted.lock().unwrap().pop_front() {
            return result;
        }

        let raw = json!({
            "id": format!("order_test_{}", count),
            "entity": "order",
            "amount": request.amount,
            "currency": request.currency,
            "receipt": request.receipt,
            "status": "created",
            "notes": request.notes,
        });
        let mut order: GatewayOrder = serde_json::from_value(raw.clone()).unwrap();
        order.raw = raw;
        Ok(order)
    }
}

pub fn test_config() -> EnvironmentConfig {
    EnvironmentConfig {
        environment: "test".to_string(),
        port: 0,
        host: "127.0.0.1".to_string(),
        log_level: "debug".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 3600,
        cors_origins: vec!["*".to_string()],
        redis_url: None,
        idempotency_ttl: 60,
        gateway: GatewayConfig {
            base_url: "http://gateway.invalid".to_string(),
            key_id: GATEWAY_KEY_ID.to_string(),
            key_secret: GATEWAY_SECRET.to_string(),
            timeout: Duration::from_secs(1),
        },
        booking: BookingPolicyConfig::default(),
    }
}

pub struct TestApp {
    pub store: InMemoryStore,
    pub gateway: Arc<MockGateway>,
    pub state: AppState,
    pub agency: Agency,
    pub vehicle: Vehicle,
    pub customer_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(false).await
    }

    pub async fn with_idempotency() -> Self {
        Self::build(true).await
    }

    async fn build(idempotency: bool) -> Self {
        let store = InMemoryStore::new();
        let gateway = Arc::new(MockGateway::default());

        let agency = agency(Uuid::new_v4());
        let vehicle = vehicle(&agency, "Maruti", "Swift", "car");
        store.add_agency(agency.clone()).await;
        store.add_vehicle(vehicle.clone()).await;

        let mut state = AppState::new(
            test_config(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            gateway.clone(),
        );
        if idempotency {
            state = state.with_idempotency(Arc::new(InMemoryIdempotencyStore::new()));
        }

        Self {
            store,
            gateway,
            state,
            agency,
            vehicle,
            customer_id: Uuid::new_v4(),
        }
    }

    pub fn customer_token(&self) -> String {
        token(self.customer_id, UserRole::Customer)
    }

    pub fn owner_token(&self) -> String {
        token(self.agency.user_id, UserRole::Agency)
    }

    /// Send one request through the full router
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = create_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Scenario 1 booking body for this app's vehicle
    pub fn booking_body(&self, start: &str, end: &str) -> Value {
        json!({
            "vehicleId": self.vehicle.id,
            "agencyId": self.agency.id,
            "startDate": start,
            "endDate": end,
            "pickupLocation": "Bengaluru Airport",
            "dailyRate": 1000,
            "totalAmount": 2000
        })
    }

    /// Create a booking through the API and return its id
    pub async fn create_booking(&self, start: &str, end: &str) -> Uuid {
        let (status, body) = self
            .send(
                "POST",
                "/api/bookings",
                Some(&self.customer_token()),
                Some(self.booking_body(start, end)),
                &[],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }
}

pub fn token(user_id: Uuid, role: UserRole) -> String {
    let config = JwtConfig {
        secret: JWT_SECRET.to_string(),
        expiration: 3600,
    };
    generate_token(user_id, role, &config).unwrap()
}

pub fn agency(owner_id: Uuid) -> Agency {
    Agency {
        id: Uuid::new_v4(),
        user_id: owner_id,
        agency_name: "Coastal Wheels".to_string(),
        is_verified: true,
        is_active: true,
        total_vehicles: 0,
        total_bookings: 0,
        total_earnings: dec!(0),
        rating: dec!(4.5),
        created_at: Utc::now(),
    }
}

pub fn vehicle(agency: &Agency, make: &str, model: &str, vehicle_type: &str) -> Vehicle {
    Vehicle {
        id: Uuid::new_v4(),
        owner_id: agency.user_id,
        agency_id: Some(agency.id),
        make: make.to_string(),
        model: model.to_string(),
        vehicle_type: vehicle_type.to_string(),
        daily_rate: dec!(1000),
        weekly_rate: None,
        monthly_rate: None,
        is_available: true,
        status: VehicleStatus::Available,
        created_at: Utc::now(),
    }
}
