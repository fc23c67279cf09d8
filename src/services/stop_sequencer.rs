//! Secuenciador de paradas
//!
//! Mantiene la lista ordenada de paradas de una ruta: alta, baja,
//! reordenación y estado por parada. Tras cada cambio el orden queda
//! contiguo `1..N` y el enlace de navegación se regenera.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dto::route_dto::{StopOrderAssignment, StopRequest};
use crate::models::{Route, RouteStop, StopStatus};
use crate::services::navigation_service::generate_navigation_url;
use crate::utils::errors::{invalid_transition, not_found_error, validation_error, AppResult};
use crate::utils::validation::validate_coordinates;

/// Construir una parada nueva a partir del input del cliente
pub fn build_stop(route_id: Uuid, stop_order: i32, input: StopRequest) -> AppResult<RouteStop> {
    let address = input.address.trim().to_string();
    if address.is_empty() {
        return Err(validation_error("address", "La dirección de la parada es requerida"));
    }

    match (input.latitude, input.longitude) {
        (Some(lat), Some(lng)) => {
            if validate_coordinates(lat, lng).is_err() {
                return Err(validation_error("coordinates", "Coordenadas fuera de rango"));
            }
        }
        (None, None) => {}
        _ => {
            return Err(validation_error(
                "coordinates",
                "Latitud y longitud deben enviarse juntas",
            ))
        }
    }

    Ok(RouteStop {
        id: Uuid::new_v4(),
        route_id,
        stop_order,
        address,
        latitude: input.latitude,
        longitude: input.longitude,
        estimated_arrival: input.estimated_arrival,
        estimated_departure: input.estimated_departure,
        actual_arrival: None,
        actual_departure: None,
        priority: input.priority.unwrap_or_default(),
        status: StopStatus::Pending,
        notes: input.notes,
        contact_name: input.contact_name,
        contact_phone: input.contact_phone,
    })
}

/// Agregar una parada al final de la ruta (`stop_order = max + 1`)
pub fn add_stop(route: &mut Route, input: StopRequest, now: DateTime<Utc>) -> AppResult<&[RouteStop]> {
    ensure_mutable(route, "add a stop")?;

    let stop = build_stop(route.id, route.max_stop_order() + 1, input)?;
    tracing::debug!("➕ Parada {} agregada a ruta {}", stop.stop_order, route.id);
    route.stops.push(stop);

    touch(route, now);
    Ok(route.stops.as_slice())
}

/// Quitar la parada con el orden indicado y compactar las siguientes
pub fn remove_stop(route: &mut Route, stop_order: i32, now: DateTime<Utc>) -> AppResult<RouteStop> {
    ensure_mutable(route, "remove a stop")?;

    let index = route
        .stops
        .iter()
        .position(|s| s.stop_order == stop_order)
        .ok_or_else(|| not_found_error("Stop", &format!("{}#{}", route.id, stop_order)))?;

    let removed = route.stops.remove(index);
    for stop in route.stops.iter_mut().filter(|s| s.stop_order > stop_order) {
        stop.stop_order -= 1;
    }

    tracing::debug!("➖ Parada {} eliminada de ruta {}", stop_order, route.id);
    touch(route, now);
    Ok(removed)
}

/// Reordenar paradas; el mapeo debe ser una biyección de las paradas sobre `1..N`
pub fn reorder_stops(
    route: &mut Route,
    mapping: &[StopOrderAssignment],
    now: DateTime<Utc>,
) -> AppResult<()> {
    ensure_mutable(route, "reorder stops")?;

    let total = route.stops.len();
    if mapping.len() != total {
        return Err(validation_error(
            "stops",
            format!("Se esperaban {} paradas en el nuevo orden, llegaron {}", total, mapping.len()),
        ));
    }

    let known: HashSet<Uuid> = route.stops.iter().map(|s| s.id).collect();
    let mut seen_ids = HashSet::with_capacity(total);
    let mut seen_orders = HashSet::with_capacity(total);

    for assignment in mapping {
        if !known.contains(&assignment.stop_id) {
            return Err(validation_error(
                "stops",
                format!("La parada {} no pertenece a la ruta", assignment.stop_id),
            ));
        }
        if !seen_ids.insert(assignment.stop_id) {
            return Err(validation_error(
                "stops",
                format!("La parada {} aparece más de una vez", assignment.stop_id),
            ));
        }
        if assignment.stop_order < 1 || assignment.stop_order as usize > total {
            return Err(validation_error(
                "stops",
                format!("Orden {} fuera del rango 1..{}", assignment.stop_order, total),
            ));
        }
        if !seen_orders.insert(assignment.stop_order) {
            return Err(validation_error(
                "stops",
                format!("El orden {} está repetido", assignment.stop_order),
            ));
        }
    }

    for assignment in mapping {
        if let Some(stop) = route.stops.iter_mut().find(|s| s.id == assignment.stop_id) {
            stop.stop_order = assignment.stop_order;
        }
    }

    touch(route, now);
    Ok(())
}

fn stop_transition_allowed(from: StopStatus, to: StopStatus) -> bool {
    matches!(
        (from, to),
        (StopStatus::Pending, StopStatus::Current)
            | (StopStatus::Pending, StopStatus::Completed)
            | (StopStatus::Pending, StopStatus::Skipped)
            | (StopStatus::Current, StopStatus::Completed)
            | (StopStatus::Current, StopStatus::Skipped)
    )
}

/// Cambiar el estado de una parada. No modifica el estado de la ruta.
pub fn update_stop_status(
    route: &mut Route,
    stop_id: Uuid,
    status: StopStatus,
    actual_arrival: Option<DateTime<Utc>>,
    actual_departure: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AppResult<&RouteStop> {
    ensure_mutable(route, "update a stop")?;

    let route_id = route.id;
    let current_id = route.current_stop().map(|s| s.id);

    let stop = route
        .stops
        .iter_mut()
        .find(|s| s.id == stop_id)
        .ok_or_else(|| not_found_error("Stop", &stop_id.to_string()))?;

    if !stop_transition_allowed(stop.status, status) {
        return Err(invalid_transition(
            format!("stop {}", stop.status),
            &format!("mark stop as {}", status),
        ));
    }

    if status == StopStatus::Current && current_id.is_some_and(|id| id != stop_id) {
        return Err(invalid_transition(
            format!("stop {}", stop.status),
            "mark a second stop as current",
        ));
    }

    let arrival = actual_arrival.or(stop.actual_arrival);
    if let (Some(arrival), Some(departure)) = (arrival, actual_departure) {
        if departure < arrival {
            return Err(validation_error(
                "actual_departure",
                "La salida no puede ser anterior a la llegada",
            ));
        }
    }

    match status {
        StopStatus::Current => {
            stop.actual_arrival = Some(arrival.unwrap_or(now));
        }
        StopStatus::Completed => {
            stop.actual_arrival = arrival;
            stop.actual_departure = Some(actual_departure.unwrap_or(now));
        }
        StopStatus::Skipped => {
            stop.actual_arrival = arrival;
            stop.actual_departure = actual_departure.or(stop.actual_departure);
        }
        StopStatus::Pending => {}
    }
    stop.status = status;

    tracing::debug!("📍 Parada {} de ruta {} → {}", stop_id, route_id, status);

    route.updated_at = now;
    route
        .find_stop(stop_id)
        .ok_or_else(|| not_found_error("Stop", &stop_id.to_string()))
}

/// Regenerar el enlace de navegación a partir del estado actual
pub fn refresh_navigation_url(route: &mut Route) {
    route.navigation_url = generate_navigation_url(
        route.start_address.as_deref(),
        &route.stops,
        route.destination_address.as_deref(),
    );
}

fn ensure_mutable(route: &Route, event: &str) -> AppResult<()> {
    if route.status.is_terminal() {
        return Err(invalid_transition(route.status, event));
    }
    Ok(())
}

fn touch(route: &mut Route, now: DateTime<Utc>) {
    route.sort_stops();
    refresh_navigation_url(route);
    route.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteStatus;
    use crate::utils::errors::AppError;

    fn input(address: &str) -> StopRequest {
        StopRequest {
            address: address.to_string(),
            latitude: None,
            longitude: None,
            estimated_arrival: None,
            estimated_departure: None,
            priority: None,
            notes: None,
            contact_name: None,
            contact_phone: None,
        }
    }

    fn route_with(addresses: &[&str]) -> Route {
        let mut route = Route::new("Test".to_string(), RouteStatus::Planned, "tester".to_string(), Utc::now());
        for address in addresses {
            add_stop(&mut route, input(address), Utc::now()).unwrap();
        }
        route
    }

    fn orders(route: &Route) -> Vec<i32> {
        route.stops.iter().map(|s| s.stop_order).collect()
    }

    #[test]
    fn test_add_stop_appends_with_next_order() {
        let mut route = route_with(&["A", "B"]);
        let stops = add_stop(&mut route, input("C"), Utc::now()).unwrap();
        assert_eq!(stops.len(), 3);
        assert_eq!(stops[2].stop_order, 3);
        assert_eq!(stops[2].address, "C");
        assert_eq!(route.navigation_url, "https://www.google.com/maps/dir/A/B/C");
    }

    #[test]
    fn test_add_stop_rejects_blank_address() {
        let mut route = route_with(&[]);
        let err = add_stop(&mut route, input("   "), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(route.stops.is_empty());
    }

    #[test]
    fn test_add_stop_rejects_half_coordinates() {
        let mut route = route_with(&[]);
        let mut stop = input("A");
        stop.latitude = Some(48.85);
        let err = add_stop(&mut route, stop, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_remove_stop_keeps_orders_contiguous() {
        for n in 1..=6 {
            for target in 1..=n {
                let addresses: Vec<String> = (1..=n).map(|i| format!("S{}", i)).collect();
                let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
                let mut route = route_with(&refs);

                let removed = remove_stop(&mut route, target, Utc::now()).unwrap();
                assert_eq!(removed.address, format!("S{}", target));
                assert_eq!(orders(&route), (1..n).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_remove_last_stop_leaves_empty_route() {
        let mut route = route_with(&["Only"]);
        remove_stop(&mut route, 1, Utc::now()).unwrap();
        assert!(route.stops.is_empty());
        assert_eq!(route.navigation_url, "");
    }

    #[test]
    fn test_remove_unknown_stop_is_not_found() {
        let mut route = route_with(&["A"]);
        let err = remove_stop(&mut route, 5, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_reorder_then_navigation_follows_new_order() {
        let mut route = route_with(&["A", "B", "C"]);
        let ids: Vec<Uuid> = route.stops.iter().map(|s| s.id).collect();

        let mapping = vec![
            StopOrderAssignment { stop_id: ids[0], stop_order: 3 },
            StopOrderAssignment { stop_id: ids[1], stop_order: 1 },
            StopOrderAssignment { stop_id: ids[2], stop_order: 2 },
        ];
        reorder_stops(&mut route, &mapping, Utc::now()).unwrap();

        assert_eq!(orders(&route), vec![1, 2, 3]);
        assert_eq!(route.navigation_url, "https://www.google.com/maps/dir/B/C/A");
    }

    #[test]
    fn test_reorder_rejects_non_bijection() {
        let mut route = route_with(&["A", "B", "C"]);
        let ids: Vec<Uuid> = route.stops.iter().map(|s| s.id).collect();

        let duplicated_order = vec![
            StopOrderAssignment { stop_id: ids[0], stop_order: 1 },
            StopOrderAssignment { stop_id: ids[1], stop_order: 1 },
            StopOrderAssignment { stop_id: ids[2], stop_order: 2 },
        ];
        let out_of_range = vec![
            StopOrderAssignment { stop_id: ids[0], stop_order: 1 },
            StopOrderAssignment { stop_id: ids[1], stop_order: 2 },
            StopOrderAssignment { stop_id: ids[2], stop_order: 4 },
        ];
        let missing = vec![
            StopOrderAssignment { stop_id: ids[0], stop_order: 1 },
            StopOrderAssignment { stop_id: ids[1], stop_order: 2 },
        ];
        let foreign = vec![
            StopOrderAssignment { stop_id: ids[0], stop_order: 1 },
            StopOrderAssignment { stop_id: ids[1], stop_order: 2 },
            StopOrderAssignment { stop_id: Uuid::new_v4(), stop_order: 3 },
        ];

        for mapping in [duplicated_order, out_of_range, missing, foreign] {
            let before = route.clone();
            let err = reorder_stops(&mut route, &mapping, Utc::now()).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
            assert_eq!(route, before);
        }
    }

    #[test]
    fn test_stop_mutations_rejected_on_terminal_route() {
        let mut route = route_with(&["A"]);
        route.status = RouteStatus::Completed;
        let err = add_stop(&mut route, input("B"), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_only_one_current_stop() {
        let mut route = route_with(&["A", "B"]);
        let first = route.stops[0].id;
        let second = route.stops[1].id;

        update_stop_status(&mut route, first, StopStatus::Current, None, None, Utc::now()).unwrap();
        let err = update_stop_status(&mut route, second, StopStatus::Current, None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));

        update_stop_status(&mut route, first, StopStatus::Completed, None, None, Utc::now()).unwrap();
        update_stop_status(&mut route, second, StopStatus::Current, None, None, Utc::now()).unwrap();
        assert_eq!(route.current_stop().map(|s| s.id), Some(second));
    }

    #[test]
    fn test_stop_status_stamps_times() {
        let mut route = route_with(&["A"]);
        let id = route.stops[0].id;
        let arrived = Utc::now();

        update_stop_status(&mut route, id, StopStatus::Current, Some(arrived), None, arrived).unwrap();
        let later = arrived + chrono::Duration::minutes(7);
        let stop = update_stop_status(&mut route, id, StopStatus::Completed, None, None, later).unwrap();

        assert_eq!(stop.actual_arrival, Some(arrived));
        assert_eq!(stop.actual_departure, Some(later));
        assert_eq!(route.status, RouteStatus::Planned);
    }

    #[test]
    fn test_completed_stop_is_final() {
        let mut route = route_with(&["A"]);
        let id = route.stops[0].id;
        update_stop_status(&mut route, id, StopStatus::Completed, None, None, Utc::now()).unwrap();
        let err = update_stop_status(&mut route, id, StopStatus::Current, None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }
}
