//! Modelos del sistema
//!
//! Este módulo contiene los modelos de dominio del agregado de rutas.

pub mod route;

pub use route::{Route, RouteOptimization, RouteStatus, RouteStop, StopPriority, StopStatus};
