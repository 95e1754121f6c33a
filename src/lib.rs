//! Vehicle rental booking engine
//!
//! Availability, reservations, payment orders, the booking state machine and
//! agency earnings behind an axum API.

pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
