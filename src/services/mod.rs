//! Services module
//!
//! Lógica de negocio del agregado de rutas. Salvo la optimización (que
//! delega en una estrategia asíncrona) son funciones puras sobre `Route`
//! que reciben el instante actual.

pub mod navigation_service;
pub mod notification_service;
pub mod optimization_service;
pub mod route_lifecycle;
pub mod stop_sequencer;

pub use navigation_service::generate_navigation_url;
pub use notification_service::{EventPublisher, RouteEvent};
pub use optimization_service::{BasicStrategy, OptimizationStrategy};
pub use route_lifecycle::{AllowAllStartGuard, StartGuard};
