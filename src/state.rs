//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::{InMemoryRouteRepository, RouteRepository};
use crate::services::notification_service::{spawn_notification_worker, EventPublisher};
use crate::services::optimization_service::{BasicStrategy, OptimizationStrategy};
use crate::services::route_lifecycle::{AllowAllStartGuard, StartGuard};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub routes: Arc<dyn RouteRepository>,
    pub optimizer: Arc<dyn OptimizationStrategy>,
    pub start_guard: Arc<dyn StartGuard>,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(config: EnvironmentConfig, routes: Arc<dyn RouteRepository>, events: EventPublisher) -> Self {
        Self {
            config,
            routes,
            optimizer: Arc::new(BasicStrategy::default()),
            start_guard: Arc::new(AllowAllStartGuard),
            events,
        }
    }

    /// Estado completo sobre el repositorio en memoria, con su propio worker
    /// de notificaciones. Requiere un runtime de tokio activo.
    pub fn in_memory() -> Self {
        let (events, receiver) = EventPublisher::channel();
        spawn_notification_worker(receiver);
        Self::new(
            EnvironmentConfig::default(),
            Arc::new(InMemoryRouteRepository::new()),
            events,
        )
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn OptimizationStrategy>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_start_guard(mut self, start_guard: Arc<dyn StartGuard>) -> Self {
        self.start_guard = start_guard;
        self
    }
}
