//! Ciclo de vida de la ruta
//!
//! Máquina de estados sobre `Route.status`:
//!
//! | Desde                     | Evento     | Hacia      |
//! |---------------------------|------------|------------|
//! | draft/planned/optimized   | start()    | in_progress|
//! | in_progress               | complete() | completed  |
//! | cualquiera no terminal    | cancel()   | cancelled  |
//!
//! Completed y Cancelled son terminales. Cada transición devuelve el
//! `RouteEvent` que el controlador publica.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Route, RouteStatus, StopStatus};
use crate::services::notification_service::RouteEvent;
use crate::utils::errors::{internal_error, invalid_transition, validation_error, AppResult};

/// Hook de capacidad: ¿pasó la ruta la inspección previa al viaje?
///
/// La inspección vive en un servicio externo; el núcleo solo consulta.
#[async_trait]
pub trait StartGuard: Send + Sync {
    async fn can_start(&self, route: &Route) -> bool;
}

/// Guard por defecto, sin servicio de inspección conectado
pub struct AllowAllStartGuard;

#[async_trait]
impl StartGuard for AllowAllStartGuard {
    async fn can_start(&self, _route: &Route) -> bool {
        true
    }
}

/// Iniciar la ruta
pub fn start(route: &mut Route, now: DateTime<Utc>) -> AppResult<RouteEvent> {
    if !matches!(
        route.status,
        RouteStatus::Draft | RouteStatus::Planned | RouteStatus::Optimized
    ) {
        return Err(invalid_transition(route.status, "start"));
    }
    if !route.has_vehicle() {
        return Err(validation_error("vehicle_id", "La ruta no tiene vehículo asignado"));
    }
    if !route.has_driver() {
        return Err(validation_error("driver_id", "La ruta no tiene conductor asignado"));
    }

    route.status = RouteStatus::InProgress;
    route.start_time = Some(now);
    route.end_time = None;
    route.actual_duration_seconds = None;
    route.updated_at = now;

    // La primera parada pendiente pasa a ser la actual
    if route.current_stop().is_none() {
        route.sort_stops();
        if let Some(stop) = route.stops.iter_mut().find(|s| s.status == StopStatus::Pending) {
            stop.status = StopStatus::Current;
        }
    }

    tracing::info!("🚚 Ruta {} iniciada", route.id);
    Ok(RouteEvent::Started {
        route_id: route.id,
        at: now,
    })
}

/// Completar la ruta; la duración real es exactamente `end - start`
pub fn complete(route: &mut Route, now: DateTime<Utc>) -> AppResult<RouteEvent> {
    if route.status != RouteStatus::InProgress {
        return Err(invalid_transition(route.status, "complete"));
    }
    let start_time = route
        .start_time
        .ok_or_else(|| internal_error("Ruta en curso sin hora de inicio"))?;

    let actual_duration_seconds = (now - start_time).num_seconds();

    route.status = RouteStatus::Completed;
    route.end_time = Some(now);
    route.actual_duration_seconds = Some(actual_duration_seconds);
    route.updated_at = now;
    skip_open_stops(route);

    tracing::info!(
        "🏁 Ruta {} completada en {} segundos",
        route.id,
        actual_duration_seconds
    );
    Ok(RouteEvent::Completed {
        route_id: route.id,
        at: now,
        actual_duration_seconds,
    })
}

/// Cancelar la ruta; no toca start/end, solo `updated_at`
pub fn cancel(route: &mut Route, now: DateTime<Utc>) -> AppResult<RouteEvent> {
    if route.status.is_terminal() {
        return Err(invalid_transition(route.status, "cancel"));
    }

    route.status = RouteStatus::Cancelled;
    route.updated_at = now;
    skip_open_stops(route);

    tracing::info!("🛑 Ruta {} cancelada", route.id);
    Ok(RouteEvent::Cancelled {
        route_id: route.id,
        at: now,
    })
}

fn skip_open_stops(route: &mut Route) {
    for stop in route.stops.iter_mut().filter(|s| s.status.is_open()) {
        stop.status = StopStatus::Skipped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RouteStop, StopPriority};
    use crate::utils::errors::AppError;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn stop(route_id: Uuid, order: i32) -> RouteStop {
        RouteStop {
            id: Uuid::new_v4(),
            route_id,
            stop_order: order,
            address: format!("Stop {}", order),
            latitude: None,
            longitude: None,
            estimated_arrival: None,
            estimated_departure: None,
            actual_arrival: None,
            actual_departure: None,
            priority: StopPriority::Medium,
            status: StopStatus::Pending,
            notes: None,
            contact_name: None,
            contact_phone: None,
        }
    }

    fn assigned_route() -> Route {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let mut route = Route::new("Lyon".to_string(), RouteStatus::Planned, "tester".to_string(), t0);
        route.vehicle_id = Some("VAN-12".to_string());
        route.driver_id = Some("driver-7".to_string());
        route.stops = vec![stop(route.id, 1), stop(route.id, 2)];
        route
    }

    #[test]
    fn test_start_sets_start_time_and_current_stop() {
        let mut route = assigned_route();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

        let event = start(&mut route, now).unwrap();

        assert_eq!(route.status, RouteStatus::InProgress);
        assert_eq!(route.start_time, Some(now));
        assert_eq!(route.stops[0].status, StopStatus::Current);
        assert_eq!(route.stops[1].status, StopStatus::Pending);
        assert_eq!(event, RouteEvent::Started { route_id: route.id, at: now });
    }

    #[test]
    fn test_start_requires_vehicle_and_driver() {
        let mut route = assigned_route();
        route.driver_id = None;
        let err = start(&mut route, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(route.status, RouteStatus::Planned);

        let mut route = assigned_route();
        route.vehicle_id = Some("  ".to_string());
        assert!(start(&mut route, Utc::now()).is_err());
    }

    #[test]
    fn test_start_on_completed_route_fails() {
        let mut route = assigned_route();
        route.status = RouteStatus::Completed;
        let err = start(&mut route, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_start_from_optimized_and_draft() {
        for status in [RouteStatus::Draft, RouteStatus::Optimized] {
            let mut route = assigned_route();
            route.status = status;
            assert!(start(&mut route, Utc::now()).is_ok());
        }
    }

    #[test]
    fn test_complete_computes_exact_duration() {
        let mut route = assigned_route();
        let started = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let ended = started + Duration::seconds(2 * 3600 + 17 * 60 + 42);

        start(&mut route, started).unwrap();
        let event = complete(&mut route, ended).unwrap();

        assert_eq!(route.status, RouteStatus::Completed);
        assert_eq!(route.end_time, Some(ended));
        assert_eq!(
            route.actual_duration_seconds,
            Some((ended - started).num_seconds())
        );
        assert!(route.stops.iter().all(|s| s.status == StopStatus::Skipped));
        assert!(matches!(event, RouteEvent::Completed { actual_duration_seconds: 8262, .. }));
    }

    #[test]
    fn test_complete_requires_in_progress() {
        let mut route = assigned_route();
        let err = complete(&mut route, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
        assert!(route.end_time.is_none());
    }

    #[test]
    fn test_cancel_keeps_timestamps() {
        let mut route = assigned_route();
        let now = Utc::now();
        cancel(&mut route, now).unwrap();

        assert_eq!(route.status, RouteStatus::Cancelled);
        assert!(route.start_time.is_none());
        assert!(route.end_time.is_none());
        assert_eq!(route.updated_at, now);
    }

    #[test]
    fn test_cancel_in_progress_route() {
        let mut route = assigned_route();
        let started = Utc::now();
        start(&mut route, started).unwrap();
        cancel(&mut route, started + Duration::minutes(5)).unwrap();

        assert_eq!(route.start_time, Some(started));
        assert!(route.end_time.is_none());
    }

    #[test]
    fn test_terminal_routes_reject_every_event() {
        for status in [RouteStatus::Completed, RouteStatus::Cancelled] {
            let mut route = assigned_route();
            route.status = status;
            assert!(start(&mut route, Utc::now()).is_err());
            assert!(complete(&mut route, Utc::now()).is_err());
            assert!(cancel(&mut route, Utc::now()).is_err());
            assert_eq!(route.status, status);
        }
    }

    #[tokio::test]
    async fn test_allow_all_guard() {
        let route = assigned_route();
        assert!(AllowAllStartGuard.can_start(&route).await);
    }
}
