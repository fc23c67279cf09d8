//! Repositorio del agregado Route
//!
//! La ruta se persiste completa (ruta + paradas + optimización) en cada
//! guardado. `save` aplica bloqueo optimista: solo escribe si la versión
//! almacenada coincide con `route.version`, y la incrementa.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Route, RouteStatus};
use crate::utils::errors::AppResult;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 100;

/// Filtros ya validados para listar rutas
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    pub status: Option<RouteStatus>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for RouteQuery {
    fn default() -> Self {
        Self {
            status: None,
            vehicle_id: None,
            driver_id: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl RouteQuery {
    pub fn matches(&self, route: &Route) -> bool {
        self.status.map_or(true, |s| route.status == s)
            && self
                .vehicle_id
                .as_deref()
                .map_or(true, |v| route.vehicle_id.as_deref() == Some(v))
            && self
                .driver_id
                .as_deref()
                .map_or(true, |d| route.driver_id.as_deref() == Some(d))
    }
}

#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn insert(&self, route: &Route) -> AppResult<()>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Route>>;

    /// Más recientes primero
    async fn list(&self, query: &RouteQuery) -> AppResult<Vec<Route>>;

    /// Reemplaza el agregado si nadie lo modificó desde que se leyó.
    /// Devuelve la ruta con la versión nueva; `ConcurrencyConflict` si no.
    async fn save(&self, route: &Route) -> AppResult<Route>;

    /// true si existía
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}
