//! Adaptador de optimización de rutas
//!
//! `optimize` captura las métricas actuales de la ruta, delega el cálculo en
//! una `OptimizationStrategy` y registra la comparación antes/después. Los
//! ahorros son `original - optimizado` con signo: una estrategia que empeora
//! la ruta produce ahorros negativos y se reportan tal cual.
//!
//! `BasicStrategy` es una estimación: no reordena paradas ni calcula caminos
//! reales. Un motor de rutas de verdad (vecino más cercano, 2-opt sobre una
//! matriz de distancias, un proveedor externo) se conecta implementando el
//! trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Route, RouteOptimization, RouteStatus, RouteStop};
use crate::services::notification_service::RouteEvent;
use crate::utils::errors::{internal_error, invalid_transition, AppError, AppResult};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Métricas producidas por una estrategia
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationMetrics {
    /// Kilómetros
    pub distance: Decimal,
    /// Minutos
    pub duration: i32,
    /// Litros
    pub fuel: Decimal,
}

#[async_trait]
pub trait OptimizationStrategy: Send + Sync {
    /// Etiqueta guardada en `RouteOptimization.algorithm`
    fn name(&self) -> &'static str;

    /// true solo si las métricas vienen de un cálculo de rutas real
    fn is_authoritative(&self) -> bool {
        false
    }

    async fn compute(&self, stops: &[RouteStop]) -> AppResult<OptimizationMetrics>;
}

/// Estrategia básica de estimación
#[derive(Debug, Clone)]
pub struct BasicStrategy {
    pub average_speed_kmh: f64,
    pub dwell_minutes_per_stop: i32,
    /// Distancia asumida para un tramo sin coordenadas
    pub fallback_leg_km: f64,
    pub fuel_litres_per_km: f64,
}

impl Default for BasicStrategy {
    fn default() -> Self {
        Self {
            average_speed_kmh: 40.0,
            dwell_minutes_per_stop: 5,
            fallback_leg_km: 5.0,
            fuel_litres_per_km: 0.08,
        }
    }
}

impl BasicStrategy {
    fn path_length_km(&self, stops: &[RouteStop]) -> f64 {
        let mut ordered: Vec<&RouteStop> = stops.iter().collect();
        ordered.sort_by_key(|s| s.stop_order);

        ordered
            .windows(2)
            .map(|leg| match (leg[0].coordinates(), leg[1].coordinates()) {
                (Some(from), Some(to)) => haversine_km(from, to),
                _ => self.fallback_leg_km,
            })
            .sum()
    }
}

#[async_trait]
impl OptimizationStrategy for BasicStrategy {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn compute(&self, stops: &[RouteStop]) -> AppResult<OptimizationMetrics> {
        let distance_km = self.path_length_km(stops);
        let driving_minutes = if self.average_speed_kmh > 0.0 {
            (distance_km / self.average_speed_kmh * 60.0).round() as i32
        } else {
            0
        };
        let duration = driving_minutes + self.dwell_minutes_per_stop * stops.len() as i32;

        Ok(OptimizationMetrics {
            distance: to_decimal(distance_km)?,
            duration,
            fuel: to_decimal(distance_km * self.fuel_litres_per_km)?,
        })
    }
}

/// Distancia de círculo máximo entre dos puntos (lat, lng) en km
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

fn to_decimal(value: f64) -> AppResult<Decimal> {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(2))
        .ok_or_else(|| internal_error("Valor no representable como decimal"))
}

/// Optimizar una ruta con la estrategia dada
///
/// Upsert: la ruta conserva un único registro de optimización, que se
/// reemplaza en cada invocación.
pub async fn optimize(
    route: &mut Route,
    strategy: &dyn OptimizationStrategy,
    optimized_by: &str,
    now: DateTime<Utc>,
) -> AppResult<(RouteOptimization, RouteEvent)> {
    if !matches!(
        route.status,
        RouteStatus::Draft | RouteStatus::Planned | RouteStatus::Optimized
    ) {
        return Err(invalid_transition(route.status, "optimize"));
    }
    if route.stops.is_empty() {
        return Err(AppError::NoStops(route.id));
    }

    let original_distance = route.total_distance;
    let original_duration = route.estimated_duration;
    let original_fuel = route.fuel_estimate;

    tracing::info!(
        "🚀 Optimizando ruta {} ({} paradas) con estrategia '{}'",
        route.id,
        route.stops.len(),
        strategy.name()
    );
    let optimized = strategy.compute(&route.stops).await?;

    let optimization = RouteOptimization {
        id: route.optimization.as_ref().map(|o| o.id).unwrap_or_else(Uuid::new_v4),
        route_id: route.id,
        original_distance,
        original_duration,
        original_fuel,
        optimized_distance: optimized.distance,
        optimized_duration: optimized.duration,
        optimized_fuel: optimized.fuel,
        distance_saved: original_distance - optimized.distance,
        time_saved: original_duration - optimized.duration,
        fuel_saved: original_fuel - optimized.fuel,
        algorithm: strategy.name().to_string(),
        optimized_at: now,
        optimized_by: optimized_by.to_string(),
    };

    if optimization.distance_saved < Decimal::ZERO {
        tracing::warn!(
            "⚠️ La optimización de la ruta {} aumenta la distancia en {} km",
            route.id,
            -optimization.distance_saved
        );
    }

    route.status = RouteStatus::Optimized;
    route.total_distance = optimized.distance;
    route.estimated_duration = optimized.duration;
    route.fuel_estimate = optimized.fuel;
    route.updated_at = now;
    route.optimization = Some(optimization.clone());

    tracing::info!(
        "✅ Ruta {} optimizada: {} km (ahorro {} km, {} min)",
        route.id,
        optimized.distance,
        optimization.distance_saved,
        optimization.time_saved
    );

    let event = RouteEvent::Optimized {
        route_id: route.id,
        at: now,
        distance_saved: optimization.distance_saved,
    };
    Ok((optimization, event))
}
