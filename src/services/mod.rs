//! Business services
//!
//! Availability, pricing, the booking state machine, payment gateway
//! integration and earnings analytics.

pub mod availability_service;
pub mod booking_state_machine;
pub mod earnings_service;
pub mod payment_gateway;
pub mod payment_signature;
pub mod pending_reaper;
pub mod pricing_service;
