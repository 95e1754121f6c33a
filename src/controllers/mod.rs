pub mod booking_controller;
pub mod earnings_controller;
pub mod payment_controller;
