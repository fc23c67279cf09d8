//! Generación de enlaces de navegación
//!
//! Construye el deep-link de Google Maps a partir de las direcciones
//! ordenadas de una ruta. Función pura: mismo input, mismo enlace.

use crate::models::RouteStop;

const DIRECTIONS_BASE_URL: &str = "https://www.google.com/maps/dir";
const SEARCH_BASE_URL: &str = "https://www.google.com/maps/search";

/// Cualquier cosa con orden y dirección puede ser un waypoint
pub trait Waypoint {
    fn stop_order(&self) -> i32;
    fn address(&self) -> &str;
}

impl Waypoint for RouteStop {
    fn stop_order(&self) -> i32 {
        self.stop_order
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// Construir el enlace de navegación para una secuencia de paradas
///
/// Waypoints: dirección de salida (si hay), paradas por `stop_order`
/// ascendente con dirección no vacía, y destino solo si difiere del último
/// waypoint. Con 2 o más waypoints devuelve un enlace de indicaciones, con
/// uno un enlace de búsqueda y sin ninguno un string vacío.
pub fn generate_navigation_url<W: Waypoint>(
    start_address: Option<&str>,
    stops: &[W],
    destination_address: Option<&str>,
) -> String {
    let waypoints = collect_waypoints(start_address, stops, destination_address);

    match waypoints.len() {
        0 => String::new(),
        1 => format!("{}/{}", SEARCH_BASE_URL, urlencoding::encode(waypoints[0])),
        _ => {
            let path = waypoints
                .iter()
                .map(|w| urlencoding::encode(w).into_owned())
                .collect::<Vec<_>>()
                .join("/");
            format!("{}/{}", DIRECTIONS_BASE_URL, path)
        }
    }
}

/// Waypoints ordenados sin codificar
pub fn collect_waypoints<'a, W: Waypoint>(
    start_address: Option<&'a str>,
    stops: &'a [W],
    destination_address: Option<&'a str>,
) -> Vec<&'a str> {
    let mut waypoints = Vec::with_capacity(stops.len() + 2);

    if let Some(start) = non_blank(start_address) {
        waypoints.push(start);
    }

    let mut ordered: Vec<&W> = stops.iter().collect();
    ordered.sort_by_key(|s| s.stop_order());
    waypoints.extend(ordered.into_iter().filter_map(|s| non_blank(Some(s.address()))));

    if let Some(destination) = non_blank(destination_address) {
        if waypoints.last() != Some(&destination) {
            waypoints.push(destination);
        }
    }

    waypoints
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StopPriority, StopStatus};
    use uuid::Uuid;

    fn stop(order: i32, address: &str) -> RouteStop {
        RouteStop {
            id: Uuid::new_v4(),
            route_id: Uuid::nil(),
            stop_order: order,
            address: address.to_string(),
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

    #[test]
    fn test_destination_equal_to_last_stop_is_not_duplicated() {
        let stops = vec![stop(1, "B"), stop(2, "C")];
        let url = generate_navigation_url(Some("A"), &stops, Some("C"));
        assert_eq!(url, "https://www.google.com/maps/dir/A/B/C");
    }

    #[test]
    fn test_single_waypoint_uses_search_link() {
        let url = generate_navigation_url::<RouteStop>(Some(""), &[], Some("Z"));
        assert_eq!(url, "https://www.google.com/maps/search/Z");
    }

    #[test]
    fn test_no_waypoints_returns_empty_string() {
        assert_eq!(generate_navigation_url::<RouteStop>(Some(""), &[], Some("")), "");
        assert_eq!(generate_navigation_url::<RouteStop>(None, &[], None), "");
    }

    #[test]
    fn test_stops_are_sorted_by_order() {
        let stops = vec![stop(3, "Third"), stop(1, "First"), stop(2, "Second")];
        let url = generate_navigation_url(None, &stops, None);
        assert_eq!(url, "https://www.google.com/maps/dir/First/Second/Third");
    }

    #[test]
    fn test_addresses_are_percent_encoded() {
        let stops = vec![stop(1, "10 Rue de Rivoli, Paris")];
        let url = generate_navigation_url(Some("Gare du Nord"), &stops, None);
        assert_eq!(
            url,
            "https://www.google.com/maps/dir/Gare%20du%20Nord/10%20Rue%20de%20Rivoli%2C%20Paris"
        );
    }

    #[test]
    fn test_blank_stop_addresses_are_skipped() {
        let stops = vec![stop(1, "A"), stop(2, "  "), stop(3, "B")];
        let waypoints = collect_waypoints(None, &stops, Some("D"));
        assert_eq!(waypoints, vec!["A", "B", "D"]);
    }

    #[test]
    fn test_is_deterministic() {
        let stops = vec![stop(2, "Y"), stop(1, "X")];
        let first = generate_navigation_url(Some("S"), &stops, Some("T"));
        let second = generate_navigation_url(Some("S"), &stops, Some("T"));
        assert_eq!(first, second);
    }
}
