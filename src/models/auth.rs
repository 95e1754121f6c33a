//! Authenticated principal
//!
//! Identity and role come from the JWT issued by the accounts service. The
//! role is informational; rights over a booking are decided by ownership.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// System roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Agency,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Agency => "agency",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(UserRole::Customer),
            "agency" => Some(UserRole::Agency),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// User injected into request extensions by the auth middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
}
