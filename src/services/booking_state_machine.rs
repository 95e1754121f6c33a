//! Booking state machine
//!
//! Pure rules for the two status axes of a booking. Stores call `authorize`
//! and `next_state` while holding the booking lock, so every mutation of
//! `status` / `payment_status` goes through here.
//!
//! ```text
//! pending ──► confirmed ──► active ──► completed
//!    │            │           │
//!    └────────────┴───────────┴──► cancelled
//! ```
//!
//! Payment axis: `pending → completed | failed`, `failed → pending` (new
//! order), `completed → refunded`.

use uuid::Uuid;

use crate::models::booking::{Booking, BookingStatus, PaymentStatus};
use crate::utils::errors::{AppError, AppResult};

/// Who is asking for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A customer, by user id
    Customer(Uuid),
    /// The owner of an agency, by agency id
    Agency(Uuid),
    /// Background jobs
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new gateway order was created for the booking
    OpenPaymentOrder,
    /// Signed gateway callback verified
    ConfirmPayment,
    /// Customer reported a failed or abandoned payment
    FailPayment,
    /// Customer cancellation
    Cancel,
    /// Agency moves the lifecycle status
    SetStatus(BookingStatus),
    /// Customer moves the payment status
    SetPaymentStatus(PaymentStatus),
    /// Stale unpaid pending booking released by the reaper
    Expire,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::OpenPaymentOrder => "open_payment_order",
            Transition::ConfirmPayment => "confirm_payment",
            Transition::FailPayment => "fail_payment",
            Transition::Cancel => "cancel",
            Transition::SetStatus(_) => "set_status",
            Transition::SetPaymentStatus(_) => "set_payment_status",
            Transition::Expire => "expire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingState {
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
}

impl From<&Booking> for BookingState {
    fn from(booking: &Booking) -> Self {
        Self {
            status: booking.status,
            payment_status: booking.payment_status,
        }
    }
}

/// Check the actor's right to request `transition` on `booking`
pub fn authorize(booking: &Booking, actor: &Actor, transition: &Transition) -> AppResult<()> {
    let allowed = match transition {
        Transition::SetStatus(_) => matches!(actor, Actor::Agency(id) if *id == booking.agency_id),
        Transition::Expire => matches!(actor, Actor::System),
        Transition::OpenPaymentOrder
        | Transition::ConfirmPayment
        | Transition::FailPayment
        | Transition::Cancel
        | Transition::SetPaymentStatus(_) => {
            matches!(actor, Actor::Customer(id) if *id == booking.customer_id)
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "Not allowed to {} booking {}",
            transition.name(),
            booking.id
        )))
    }
}

/// Lifecycle edges
pub fn status_edge_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, Active)
            | (Active, Completed)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
            | (Active, Cancelled)
    )
}

/// Payment axis edges
pub fn payment_edge_allowed(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Pending, Completed) | (Pending, Failed) | (Failed, Pending) | (Completed, Refunded)
    )
}

/// Cancelling a paid booking turns the payment into a refund
fn cancelled(current: BookingState) -> BookingState {
    BookingState {
        status: BookingStatus::Cancelled,
        payment_status: match current.payment_status {
            PaymentStatus::Completed => PaymentStatus::Refunded,
            other => other,
        },
    }
}

fn unpaid(payment_status: PaymentStatus) -> bool {
    matches!(payment_status, PaymentStatus::Pending | PaymentStatus::Failed)
}

fn invalid(current: BookingState, transition: &Transition) -> AppError {
    AppError::InvalidTransition(format!(
        "Cannot {} a booking that is {} with payment {}",
        transition.name().replace('_', " "),
        current.status,
        current.payment_status
    ))
}

/// Compute the state after `transition`, or refuse it
pub fn next_state(current: BookingState, transition: &Transition) -> AppResult<BookingState> {
    let next = match *transition {
        Transition::OpenPaymentOrder
            if current.status == BookingStatus::Pending && unpaid(current.payment_status) =>
        {
            BookingState {
                status: current.status,
                payment_status: PaymentStatus::Pending,
            }
        }
        Transition::ConfirmPayment
            if current.status == BookingStatus::Pending && unpaid(current.payment_status) =>
        {
            BookingState {
                status: BookingStatus::Confirmed,
                payment_status: PaymentStatus::Completed,
            }
        }
        Transition::FailPayment if current.payment_status == PaymentStatus::Completed => {
            return Err(AppError::InvalidTransition(
                "Payment already completed; cancel the booking to get a refund".to_string(),
            ));
        }
        Transition::FailPayment
            if !current.status.is_terminal() && unpaid(current.payment_status) =>
        {
            BookingState {
                status: BookingStatus::Cancelled,
                payment_status: PaymentStatus::Failed,
            }
        }
        Transition::Cancel if !current.status.is_terminal() => cancelled(current),
        Transition::Expire
            if current.status == BookingStatus::Pending && unpaid(current.payment_status) =>
        {
            cancelled(current)
        }
        Transition::SetStatus(target) if target == current.status => current,
        Transition::SetStatus(BookingStatus::Cancelled)
            if status_edge_allowed(current.status, BookingStatus::Cancelled) =>
        {
            cancelled(current)
        }
        Transition::SetStatus(target) if status_edge_allowed(current.status, target) => {
            BookingState {
                status: target,
                payment_status: current.payment_status,
            }
        }
        Transition::SetPaymentStatus(target) if target == current.payment_status => current,
        // A pending booking is only paid through a verified gateway callback
        Transition::SetPaymentStatus(PaymentStatus::Completed)
            if current.status == BookingStatus::Pending =>
        {
            return Err(AppError::InvalidTransition(
                "Payment of a pending booking is completed by payment verification only".to_string(),
            ));
        }
        Transition::SetPaymentStatus(target)
            if current.status != BookingStatus::Cancelled
                && payment_edge_allowed(current.payment_status, target) =>
        {
            BookingState {
                status: current.status,
                payment_status: target,
            }
        }
        _ => return Err(invalid(current, transition)),
    };

    Ok(next)
}

/// Whether the transition needs the vehicle's window to be free of other
/// holding bookings: the booking starts holding the vehicle, or a new
/// payment order is opened for it.
pub fn claims_window(current: &Booking, next: &BookingState, transition: &Transition) -> bool {
    match transition {
        Transition::OpenPaymentOrder => true,
        _ => next.status.holds_vehicle() && !current.status.holds_vehicle(),
    }
}

/// `authorize` then `next_state`, as done by stores under the booking lock
pub fn plan(booking: &Booking, actor: &Actor, transition: &Transition) -> AppResult<BookingState> {
    authorize(booking, actor, transition)?;
    next_state(BookingState::from(booking), transition)
}
