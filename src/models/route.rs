//! Modelo de Route
//!
//! Este módulo contiene el agregado Route: la ruta, sus paradas ordenadas
//! y el resultado de optimización asociado (1:1). Las referencias a
//! vehículo, conductor y usuario son identificadores opacos de entidades
//! externas; la ruta solo es dueña de sus paradas y de su optimización.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normaliza variantes heredadas ("InProgress", "in_progress", "in-progress")
fn normalize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Estado de la ruta - enumeración canónica del núcleo
///
/// Las capas externas han usado "Active", "planned", "in_progress"...;
/// todas se traducen aquí y se emiten siempre en snake_case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum RouteStatus {
    Draft,
    Planned,
    InProgress,
    Completed,
    Cancelled,
    Optimized,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Draft => "draft",
            RouteStatus::Planned => "planned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
            RouteStatus::Optimized => "optimized",
        }
    }

    /// Completed y Cancelled no admiten más eventos
    pub fn is_terminal(&self) -> bool {
        matches!(self, RouteStatus::Completed | RouteStatus::Cancelled)
    }
}

impl FromStr for RouteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "draft" => Ok(RouteStatus::Draft),
            "planned" | "active" => Ok(RouteStatus::Planned),
            "inprogress" => Ok(RouteStatus::InProgress),
            "completed" => Ok(RouteStatus::Completed),
            "cancelled" | "canceled" => Ok(RouteStatus::Cancelled),
            "optimized" => Ok(RouteStatus::Optimized),
            _ => Err(format!("Unknown route status '{}'", s)),
        }
    }
}

impl TryFrom<String> for RouteStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado de una parada
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum StopStatus {
    #[default]
    Pending,
    Current,
    Completed,
    Skipped,
}

impl StopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopStatus::Pending => "pending",
            StopStatus::Current => "current",
            StopStatus::Completed => "completed",
            StopStatus::Skipped => "skipped",
        }
    }

    /// Paradas todavía abiertas (no visitadas ni descartadas)
    pub fn is_open(&self) -> bool {
        matches!(self, StopStatus::Pending | StopStatus::Current)
    }
}

impl FromStr for StopStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(StopStatus::Pending),
            "current" | "inprogress" => Ok(StopStatus::Current),
            "completed" | "done" => Ok(StopStatus::Completed),
            "skipped" => Ok(StopStatus::Skipped),
            _ => Err(format!("Unknown stop status '{}'", s)),
        }
    }
}

impl TryFrom<String> for StopStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prioridad de una parada
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum StopPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl StopPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopPriority::High => "high",
            StopPriority::Medium => "medium",
            StopPriority::Low => "low",
        }
    }
}

impl FromStr for StopPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "high" => Ok(StopPriority::High),
            "medium" | "normal" => Ok(StopPriority::Medium),
            "low" => Ok(StopPriority::Low),
            _ => Err(format!("Unknown stop priority '{}'", s)),
        }
    }
}

impl TryFrom<String> for StopPriority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parada de una ruta
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub stop_order: i32,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub priority: StopPriority,
    pub status: StopStatus,
    pub notes: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

impl RouteStop {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Resultado de optimización registrado para una ruta (uno por ruta)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteOptimization {
    pub id: Uuid,
    pub route_id: Uuid,
    pub original_distance: Decimal,
    pub original_duration: i32,
    pub original_fuel: Decimal,
    pub optimized_distance: Decimal,
    pub optimized_duration: i32,
    pub optimized_fuel: Decimal,
    /// original - optimizado; puede ser negativo si la estrategia empeora
    pub distance_saved: Decimal,
    pub time_saved: i32,
    pub fuel_saved: Decimal,
    pub algorithm: String,
    pub optimized_at: DateTime<Utc>,
    pub optimized_by: String,
}

/// Route principal - agregado completo con paradas y optimización
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub start_address: Option<String>,
    pub destination_address: Option<String>,
    pub status: RouteStatus,
    /// Kilómetros
    pub total_distance: Decimal,
    /// Minutos
    pub estimated_duration: i32,
    /// Litros
    pub fuel_estimate: Decimal,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub actual_duration_seconds: Option<i64>,
    pub navigation_url: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Contador de bloqueo optimista, incrementado en cada guardado
    pub version: i64,
    pub stops: Vec<RouteStop>,
    pub optimization: Option<RouteOptimization>,
}

impl Route {
    /// Ruta vacía en estado inicial; las paradas se agregan con el secuenciador
    pub fn new(name: String, status: RouteStatus, created_by: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description: None,
            vehicle_id: None,
            driver_id: None,
            start_address: None,
            destination_address: None,
            status,
            total_distance: Decimal::ZERO,
            estimated_duration: 0,
            fuel_estimate: Decimal::ZERO,
            start_time: None,
            end_time: None,
            actual_duration_seconds: None,
            navigation_url: String::new(),
            created_by,
            created_at: now,
            updated_at: now,
            version: 1,
            stops: Vec::new(),
            optimization: None,
        }
    }

    pub fn has_vehicle(&self) -> bool {
        self.vehicle_id.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    pub fn has_driver(&self) -> bool {
        self.driver_id.as_deref().is_some_and(|d| !d.trim().is_empty())
    }

    pub fn find_stop(&self, stop_id: Uuid) -> Option<&RouteStop> {
        self.stops.iter().find(|s| s.id == stop_id)
    }

    pub fn current_stop(&self) -> Option<&RouteStop> {
        self.stops.iter().find(|s| s.status == StopStatus::Current)
    }

    pub fn max_stop_order(&self) -> i32 {
        self.stops.iter().map(|s| s.stop_order).max().unwrap_or(0)
    }

    pub fn sort_stops(&mut self) {
        self.stops.sort_by_key(|s| s.stop_order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_status_accepts_legacy_spellings() {
        for raw in ["Active", "active", "planned", "Planned"] {
            assert_eq!(raw.parse::<RouteStatus>().unwrap(), RouteStatus::Planned);
        }
        for raw in ["InProgress", "in_progress", "in-progress", "IN_PROGRESS"] {
            assert_eq!(raw.parse::<RouteStatus>().unwrap(), RouteStatus::InProgress);
        }
        assert_eq!("Draft".parse::<RouteStatus>().unwrap(), RouteStatus::Draft);
        assert_eq!("Optimized".parse::<RouteStatus>().unwrap(), RouteStatus::Optimized);
        assert!("paused".parse::<RouteStatus>().is_err());
    }

    #[test]
    fn test_route_status_serializes_snake_case() {
        let json = serde_json::to_string(&RouteStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let status: RouteStatus = serde_json::from_str("\"Active\"").unwrap();
        assert_eq!(status, RouteStatus::Planned);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RouteStatus::Completed.is_terminal());
        assert!(RouteStatus::Cancelled.is_terminal());
        assert!(!RouteStatus::Optimized.is_terminal());
        assert!(!RouteStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_new_route_defaults() {
        let route = Route::new("Tournée Nord".to_string(), RouteStatus::Draft, "system".to_string(), Utc::now());
        assert_eq!(route.version, 1);
        assert_eq!(route.total_distance, Decimal::ZERO);
        assert_eq!(route.max_stop_order(), 0);
        assert!(!route.has_vehicle());
        assert!(route.navigation_url.is_empty());
    }
}
