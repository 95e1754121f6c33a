pub mod api_response;
pub mod booking_dto;
pub mod earnings_dto;
pub mod payment_dto;

pub use api_response::ApiResponse;
