use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Route, RouteOptimization, RouteStatus, RouteStop, StopPriority, StopStatus};
use crate::services::navigation_service::Waypoint;
use crate::utils::validation::{validate_non_negative_decimal, validate_not_blank, validate_phone};

// Parada enviada por el cliente al crear una ruta o agregar una parada
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StopRequest {
    #[validate(custom = "validate_not_blank", length(max = 500))]
    pub address: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,

    pub estimated_arrival: Option<DateTime<Utc>>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub priority: Option<StopPriority>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,

    #[validate(length(max = 200))]
    pub contact_name: Option<String>,

    #[validate(custom = "validate_phone")]
    pub contact_phone: Option<String>,
}

// Request para crear una ruta
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRouteRequest {
    #[validate(custom = "validate_not_blank", length(max = 200))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(custom = "validate_not_blank")]
    pub vehicle_id: String,

    #[validate(custom = "validate_not_blank")]
    pub driver_id: String,

    #[validate(length(max = 500))]
    pub start_address: Option<String>,

    #[validate(length(max = 500))]
    pub destination_address: Option<String>,

    /// Solo draft o planned; por defecto planned
    pub status: Option<RouteStatus>,

    #[serde(default)]
    pub stops: Vec<StopRequest>,
}

// Request para actualizar una ruta. Un string vacío en vehicle_id o
// driver_id desasigna.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRouteRequest {
    #[validate(custom = "validate_not_blank", length(max = 200))]
    pub name: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,

    #[validate(length(max = 500))]
    pub start_address: Option<String>,

    #[validate(length(max = 500))]
    pub destination_address: Option<String>,

    #[validate(custom = "validate_non_negative_decimal")]
    pub total_distance: Option<Decimal>,

    #[validate(range(min = 0))]
    pub estimated_duration: Option<i32>,

    #[validate(custom = "validate_non_negative_decimal")]
    pub fuel_estimate: Option<Decimal>,

    /// Versión que el cliente leyó; si no coincide, 409
    pub version: Option<i64>,
}

// Nuevo orden para una parada existente
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StopOrderAssignment {
    pub stop_id: Uuid,
    pub stop_order: i32,
}

// Request para reordenar todas las paradas de una ruta
#[derive(Debug, Deserialize)]
pub struct ReorderStopsRequest {
    pub stops: Vec<StopOrderAssignment>,
}

// Request para actualizar el estado de una parada
#[derive(Debug, Deserialize)]
pub struct UpdateStopStatusRequest {
    pub status: StopStatus,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
}

// Filtros para búsqueda de rutas
#[derive(Debug, Default, Deserialize)]
pub struct RouteFilters {
    pub status: Option<String>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// Parada mínima para previsualizar un enlace de navegación
#[derive(Debug, Clone, Deserialize)]
pub struct NavigationStop {
    pub stop_order: i32,
    pub address: String,
}

impl Waypoint for NavigationStop {
    fn stop_order(&self) -> i32 {
        self.stop_order
    }

    fn address(&self) -> &str {
        &self.address
    }
}

#[derive(Debug, Deserialize)]
pub struct NavigationPreviewRequest {
    pub start_address: Option<String>,
    #[serde(default)]
    pub stops: Vec<NavigationStop>,
    pub destination_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NavigationPreviewResponse {
    /// Vacío cuando no hay ningún waypoint: "sin previsualización"
    pub url: String,
    pub waypoints: usize,
}

// Response de ruta
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub start_address: Option<String>,
    pub destination_address: Option<String>,
    pub status: RouteStatus,
    pub total_distance: Decimal,
    pub estimated_duration: i32,
    pub fuel_estimate: Decimal,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub actual_duration_seconds: Option<i64>,
    pub navigation_url: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub stops: Vec<RouteStop>,
    pub optimization: Option<RouteOptimization>,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        let mut stops = route.stops;
        stops.sort_by_key(|s| s.stop_order);

        Self {
            id: route.id.to_string(),
            name: route.name,
            description: route.description,
            vehicle_id: route.vehicle_id,
            driver_id: route.driver_id,
            start_address: route.start_address,
            destination_address: route.destination_address,
            status: route.status,
            total_distance: route.total_distance,
            estimated_duration: route.estimated_duration,
            fuel_estimate: route.fuel_estimate,
            start_time: route.start_time,
            end_time: route.end_time,
            actual_duration_seconds: route.actual_duration_seconds,
            navigation_url: route.navigation_url,
            created_by: route.created_by,
            created_at: route.created_at,
            updated_at: route.updated_at,
            version: route.version,
            stops,
            optimization: route.optimization,
        }
    }
}

// Response de la optimización
#[derive(Debug, Serialize)]
pub struct OptimizeRouteResponse {
    pub route: RouteResponse,
    pub optimization: RouteOptimization,
    /// false cuando las métricas vienen de una estimación y no de un motor de rutas
    pub authoritative: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CanStartResponse {
    pub route_id: String,
    pub can_start: bool,
}
