//! Reservation manager
//!
//! Creation, listing, availability and the direct status endpoints. Every
//! status change is delegated to the store, which runs the state machine
//! under the booking lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::cache::{IdempotencyGuard, IdempotencyStore};
use crate::dto::booking_dto::{
    AvailabilityQuery, AvailabilityResponse, AvailabilitySearchRequest, AvailabilitySearchResponse,
    BookingDetailResponse, BookingListQuery, BookingListResponse, BookingResponse,
    CreateBookingRequest, UpdatePaymentStatusRequest, UpdateStatusRequest, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};
use crate::dto::ApiResponse;
use crate::models::auth::AuthenticatedUser;
use crate::models::booking::{Booking, BookingFilters, BookingScope, BookingStatus, NewBooking, PaymentStatus};
use crate::models::vehicle::Vehicle;
use crate::repositories::{BookingChange, BookingStore, CatalogLookup};
use crate::services::availability_service::{AvailabilityService, BlockingPolicy};
use crate::services::booking_state_machine::{Actor, Transition};
use crate::services::pricing_service::{PricingInput, PricingService};
use crate::state::AppState;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::{parse_timestamp, parse_uuid, RequiredFields};

pub type CreateBookingResponse = ApiResponse<BookingResponse>;

pub struct BookingController {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn CatalogLookup>,
    availability: AvailabilityService,
    pricing: PricingService,
    pending_grace: Duration,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    idempotency_ttl: u64,
}

impl BookingController {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            catalog: state.catalog.clone(),
            availability: AvailabilityService::new(state.store.clone()),
            pricing: PricingService::new(state.config.booking.enforce_server_pricing),
            pending_grace: state.config.booking.pending_grace,
            idempotency: state.idempotency.clone(),
            idempotency_ttl: state.config.idempotency_ttl,
        }
    }

    pub async fn create(
        &self,
        user: AuthenticatedUser,
        request: CreateBookingRequest,
        idempotency_key: Option<String>,
    ) -> AppResult<CreateBookingResponse> {
        let guard = match (&self.idempotency, idempotency_key) {
            (Some(store), Some(key)) => Some(IdempotencyGuard::new(
                store.clone(),
                user.user_id,
                "bookings",
                &key,
                &request,
                self.idempotency_ttl,
            )?),
            (None, Some(_)) => {
                debug!("Idempotency-Key ignored, no idempotency store configured");
                None
            }
            _ => None,
        };

        let Some(guard) = guard else {
            return self.create_response(user.user_id, &request).await;
        };
        if let Some(previous) = guard.begin::<CreateBookingResponse>().await? {
            return Ok(previous);
        }

        match self.create_response(user.user_id, &request).await {
            Ok(response) => {
                if let Err(e) = guard.record(&response).await {
                    warn!("⚠️ Booking created but idempotency record failed: {}", e);
                }
                Ok(response)
            }
            Err(err) => {
                if let Err(e) = guard.release().await {
                    warn!("⚠️ Could not release idempotency key after failed booking: {}", e);
                }
                Err(err)
            }
        }
    }

    async fn create_response(
        &self,
        customer_id: Uuid,
        request: &CreateBookingRequest,
    ) -> AppResult<CreateBookingResponse> {
        let booking = self.create_booking(customer_id, request).await?;
        let vehicle = self.catalog.find_vehicle(booking.vehicle_id).await?;
        Ok(ApiResponse::success_with_message(
            BookingResponse::from_booking(booking, vehicle.as_ref()),
            "Booking created successfully",
        ))
    }

    async fn create_booking(&self, customer_id: Uuid, request: &CreateBookingRequest) -> AppResult<Booking> {
        // An inverted range wins over every other complaint
        let start = request.start_date.as_deref().and_then(|v| parse_timestamp("startDate", v).ok());
        let end = request.end_date.as_deref().and_then(|v| parse_timestamp("endDate", v).ok());
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                return Err(AppError::InvalidRange(
                    "End date must be after start date".to_string(),
                ));
            }
        }

        RequiredFields::new()
            .check_text("vehicleId", &request.vehicle_id)
            .check_text("agencyId", &request.agency_id)
            .check_text("startDate", &request.start_date)
            .check_text("endDate", &request.end_date)
            .check_text("pickupLocation", &request.pickup_location)
            .check("dailyRate", &request.daily_rate)
            .check("totalAmount", &request.total_amount)
            .validation_result()?;
        request.validate()?;

        let vehicle_id = parse_uuid("vehicleId", request.vehicle_id.as_deref().unwrap_or_default())?;
        let agency_id = parse_uuid("agencyId", request.agency_id.as_deref().unwrap_or_default())?;
        let start = parse_timestamp("startDate", request.start_date.as_deref().unwrap_or_default())?;
        let end = parse_timestamp("endDate", request.end_date.as_deref().unwrap_or_default())?;

        let vehicle = self
            .catalog
            .find_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;
        let agency = self
            .catalog
            .find_agency(agency_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agency not found".to_string()))?;

        if let Some(owner) = vehicle.agency_id {
            if owner != agency.id {
                return Err(AppError::Validation(format!(
                    "Vehicle {} does not belong to agency {}",
                    vehicle.id, agency.id
                )));
            }
        }

        let pricing = self.pricing.resolve(
            &PricingInput {
                daily_rate: request.daily_rate.unwrap_or_default(),
                total_amount: request.total_amount.unwrap_or_default(),
                number_of_days: request.number_of_days,
                subtotal: request.subtotal,
                tax_amount: request.tax,
                discount_amount: request.discount,
                security_deposit: request.security_deposit,
            },
            start,
            end,
        )?;

        let pickup_location = request.pickup_location.clone().unwrap_or_default();
        let dropoff_location = request
            .dropoff_location
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| pickup_location.clone());

        let now = Utc::now();
        let booking = NewBooking {
            customer_id,
            vehicle_id: vehicle.id,
            agency_id: agency.id,
            start_date: start,
            end_date: end,
            pickup_location,
            dropoff_location,
            pricing,
            notes: request.notes.clone(),
        }
        .into_booking(now);

        let booking = self
            .store
            .insert_booking(booking, BlockingPolicy::GraceWindow(self.pending_grace), now)
            .await?;

        info!(
            "📅 Booking {} created: vehicle {} [{} - {}) total {}",
            booking.id, booking.vehicle_id, booking.start_date, booking.end_date, booking.total_amount
        );
        Ok(booking)
    }

    pub async fn list(
        &self,
        user: AuthenticatedUser,
        query: BookingListQuery,
    ) -> AppResult<BookingListResponse> {
        let agency = self.catalog.find_agency_by_owner(user.user_id).await?;
        let scope = BookingScope {
            customer_id: user.user_id,
            agency_id: agency.map(|a| a.id),
        };

        let filters = BookingFilters {
            status: query
                .status
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<BookingStatus>().map_err(AppError::Validation))
                .transpose()?,
            vehicle_type: query.vehicle_type.filter(|s| !s.trim().is_empty()),
            search: query.q.filter(|s| !s.trim().is_empty()),
            start_from: query
                .start_date
                .as_deref()
                .map(|v| parse_timestamp("start_date", v))
                .transpose()?,
            start_to: query
                .end_date
                .as_deref()
                .map(|v| parse_timestamp("end_date", v))
                .transpose()?,
            limit: query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
        };

        let bookings = self.store.list_bookings(&scope, &filters).await?;
        let vehicles = self.vehicles_for(&bookings).await?;

        Ok(BookingListResponse {
            bookings: bookings
                .into_iter()
                .map(|b| {
                    let vehicle = vehicles.get(&b.vehicle_id);
                    BookingResponse::from_booking(b, vehicle)
                })
                .collect(),
        })
    }

    /// Visible to the booking's customer and to the owner of its agency
    pub async fn get(&self, user: AuthenticatedUser, id: Uuid) -> AppResult<BookingDetailResponse> {
        let booking = self
            .store
            .find_booking(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.customer_id != user.user_id {
            let agency = self.catalog.find_agency_by_owner(user.user_id).await?;
            if agency.map(|a| a.id) != Some(booking.agency_id) {
                return Err(AppError::Unauthorized(format!(
                    "User {} cannot view booking {}",
                    user.user_id, id
                )));
            }
        }

        let payments = self.store.payments_for_booking(id).await?;
        let vehicle = self.catalog.find_vehicle(booking.vehicle_id).await?;

        Ok(BookingDetailResponse {
            booking: BookingResponse::from_booking(booking, vehicle.as_ref()),
            payments: payments.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn check_availability(&self, query: AvailabilityQuery) -> AppResult<AvailabilityResponse> {
        RequiredFields::new()
            .check_text("vehicle_id", &query.vehicle_id)
            .check_text("start_date", &query.start_date)
            .check_text("end_date", &query.end_date)
            .validation_result()?;

        let vehicle_id = parse_uuid("vehicle_id", query.vehicle_id.as_deref().unwrap_or_default())?;
        let start = parse_timestamp("start_date", query.start_date.as_deref().unwrap_or_default())?;
        let end = parse_timestamp("end_date", query.end_date.as_deref().unwrap_or_default())?;

        let policy = match query.mode.as_deref().map(str::trim) {
            None | Some("") | Some("strict") => BlockingPolicy::AllActive,
            Some("listing") => BlockingPolicy::GraceWindow(self.pending_grace),
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "mode must be 'strict' or 'listing', got '{}'",
                    other
                )))
            }
        };

        let report = self
            .availability
            .check(vehicle_id, start, end, policy, Utc::now())
            .await?;
        Ok(AvailabilityResponse::from_report(&report, start, end))
    }

    pub async fn search_availability(
        &self,
        request: AvailabilitySearchRequest,
    ) -> AppResult<AvailabilitySearchResponse> {
        request.validate()?;
        let start = parse_timestamp("startDate", &request.start_date)?;
        let end = parse_timestamp("endDate", &request.end_date)?;

        let available = self
            .availability
            .available_vehicles(&request.vehicle_ids, start, end, self.pending_grace, Utc::now())
            .await?;

        Ok(AvailabilitySearchResponse {
            available_vehicle_ids: available,
            start_date: start,
            end_date: end,
        })
    }

    /// Agency owners move the lifecycle status along the graph
    pub async fn update_status(
        &self,
        user: AuthenticatedUser,
        id: Uuid,
        request: UpdateStatusRequest,
    ) -> AppResult<ApiResponse<BookingResponse>> {
        let target: BookingStatus = request
            .status
            .as_deref()
            .ok_or_else(|| AppError::Validation("status is required".to_string()))?
            .parse()
            .map_err(AppError::Validation)?;

        // Callers without an agency fall back to a customer actor, which the
        // state machine refuses after the booking is found
        let actor = match self.catalog.find_agency_by_owner(user.user_id).await? {
            Some(agency) => Actor::Agency(agency.id),
            None => Actor::Customer(user.user_id),
        };

        let booking = self
            .transition(id, actor, Transition::SetStatus(target))
            .await?;
        self.respond(booking, "Booking status updated").await
    }

    pub async fn update_payment_status(
        &self,
        user: AuthenticatedUser,
        id: Uuid,
        request: UpdatePaymentStatusRequest,
    ) -> AppResult<ApiResponse<BookingResponse>> {
        let target: PaymentStatus = request
            .payment_status
            .as_deref()
            .ok_or_else(|| AppError::Validation("paymentStatus is required".to_string()))?
            .parse()
            .map_err(AppError::Validation)?;

        let booking = self
            .transition(id, Actor::Customer(user.user_id), Transition::SetPaymentStatus(target))
            .await?;
        self.respond(booking, "Payment status updated").await
    }

    pub async fn cancel(&self, user: AuthenticatedUser, id: Uuid) -> AppResult<ApiResponse<BookingResponse>> {
        let booking = self
            .transition(id, Actor::Customer(user.user_id), Transition::Cancel)
            .await?;
        if booking.payment_status == PaymentStatus::Refunded {
            info!("💸 Booking {} cancelled after payment, marked refunded", id);
        }
        self.respond(booking, "Booking cancelled successfully").await
    }

    async fn transition(&self, id: Uuid, actor: Actor, transition: Transition) -> AppResult<Booking> {
        let outcome = self
            .store
            .apply_transition(
                id,
                BookingChange {
                    actor,
                    transition,
                    payment: None,
                    now: Utc::now(),
                },
            )
            .await?;

        info!(
            "🔄 Booking {} {}: status={} payment={}",
            id,
            transition.name(),
            outcome.booking.status,
            outcome.booking.payment_status
        );
        Ok(outcome.booking)
    }

    async fn respond(&self, booking: Booking, message: &str) -> AppResult<ApiResponse<BookingResponse>> {
        let vehicle = self.catalog.find_vehicle(booking.vehicle_id).await?;
        Ok(ApiResponse::success_with_message(
            BookingResponse::from_booking(booking, vehicle.as_ref()),
            message,
        ))
    }

    async fn vehicles_for(&self, bookings: &[Booking]) -> AppResult<HashMap<Uuid, Vehicle>> {
        let mut ids: Vec<Uuid> = bookings.iter().map(|b| b.vehicle_id).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self
            .catalog
            .find_vehicles(&ids)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect())
    }
}
