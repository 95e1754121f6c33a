//! Shared application state
//!
//! Stores, gateway and idempotency cache behind trait objects so the router
//! runs unchanged against Postgres/Razorpay or the in-memory test doubles.

use std::sync::Arc;

use crate::cache::IdempotencyStore;
use crate::config::environment::EnvironmentConfig;
use crate::repositories::{BookingStore, CatalogLookup};
use crate::services::payment_gateway::PaymentGateway;
use crate::services::payment_signature::PaymentSignatureVerifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub store: Arc<dyn BookingStore>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub signatures: PaymentSignatureVerifier,
    /// Absent when no Redis is configured; idempotency keys are then ignored
    pub idempotency: Option<Arc<dyn IdempotencyStore>>,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn CatalogLookup>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let signatures = PaymentSignatureVerifier::new(config.gateway.key_secret.clone());
        Self {
            config: Arc::new(config),
            store,
            catalog,
            gateway,
            signatures,
            idempotency: None,
        }
    }

    pub fn with_idempotency(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = Some(store);
        self
    }
}
