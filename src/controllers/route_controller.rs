//! Controlador de rutas
//!
//! Orquesta cada operación sobre el agregado: cargar, mutar con los
//! servicios puros, guardar con control de versión y, solo si el guardado
//! tuvo éxito, publicar el evento correspondiente.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::route_dto::{
    CanStartResponse, CreateRouteRequest, NavigationPreviewRequest, NavigationPreviewResponse,
    OptimizeRouteResponse, ReorderStopsRequest, RouteFilters, RouteResponse, StopRequest,
    UpdateRouteRequest, UpdateStopStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::{Route, RouteStatus, RouteStop};
use crate::repositories::route_repository::{RouteQuery, RouteRepository, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::services::navigation_service::{collect_waypoints, generate_navigation_url};
use crate::services::notification_service::{EventPublisher, RouteEvent};
use crate::services::optimization_service::{self, OptimizationStrategy};
use crate::services::route_lifecycle::{self, StartGuard};
use crate::services::stop_sequencer;
use crate::state::AppState;
use crate::utils::errors::{invalid_transition, not_found_error, validation_error, AppError, AppResult};

pub struct RouteController {
    repository: Arc<dyn RouteRepository>,
    optimizer: Arc<dyn OptimizationStrategy>,
    start_guard: Arc<dyn StartGuard>,
    events: EventPublisher,
}

impl RouteController {
    pub fn new(state: &AppState) -> Self {
        Self {
            repository: Arc::clone(&state.routes),
            optimizer: Arc::clone(&state.optimizer),
            start_guard: Arc::clone(&state.start_guard),
            events: state.events.clone(),
        }
    }

    async fn load(&self, id: Uuid) -> AppResult<Route> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Route", &id.to_string()))
    }

    /// Guardar y, si el guardado tuvo éxito, publicar el evento
    async fn commit(&self, route: &Route, event: Option<RouteEvent>) -> AppResult<Route> {
        let saved = self.repository.save(route).await?;
        if let Some(event) = event {
            self.events.publish(event);
        }
        Ok(saved)
    }

    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateRouteRequest,
        created_by: &str,
    ) -> AppResult<ApiResponse<RouteResponse>> {
        request.validate()?;
        for stop in &request.stops {
            stop.validate()?;
        }
        if request.stops.is_empty() {
            return Err(validation_error("stops", "La ruta necesita al menos una parada"));
        }

        let status = match request.status {
            None => RouteStatus::Planned,
            Some(s @ (RouteStatus::Draft | RouteStatus::Planned)) => s,
            Some(other) => {
                return Err(validation_error(
                    "status",
                    format!("Una ruta nueva no puede crearse en estado '{}'", other),
                ))
            }
        };

        let now = Utc::now();
        let mut route = Route::new(request.name.trim().to_string(), status, created_by.to_string(), now);
        route.description = request.description;
        route.vehicle_id = Some(request.vehicle_id.trim().to_string());
        route.driver_id = Some(request.driver_id.trim().to_string());
        route.start_address = non_empty(request.start_address);
        route.destination_address = non_empty(request.destination_address);

        for (index, stop) in request.stops.into_iter().enumerate() {
            let stop = stop_sequencer::build_stop(route.id, index as i32 + 1, stop)?;
            route.stops.push(stop);
        }
        stop_sequencer::refresh_navigation_url(&mut route);

        self.repository.insert(&route).await?;
        log::info!("✅ Ruta {} creada con {} paradas", route.id, route.stops.len());

        Ok(ApiResponse::success_with_message(
            RouteResponse::from(route),
            "Ruta creada exitosamente".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<RouteResponse> {
        self.load(id).await.map(RouteResponse::from)
    }

    pub async fn list(&self, filters: RouteFilters) -> AppResult<Vec<RouteResponse>> {
        let status = match non_empty(filters.status) {
            Some(raw) => Some(
                raw.parse::<RouteStatus>()
                    .map_err(|e| validation_error("status", e))?,
            ),
            None => None,
        };

        let query = RouteQuery {
            status,
            vehicle_id: non_empty(filters.vehicle_id),
            driver_id: non_empty(filters.driver_id),
            limit: filters.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
            offset: filters.offset.unwrap_or(0).max(0),
        };

        let routes = self.repository.list(&query).await?;
        Ok(routes.into_iter().map(RouteResponse::from).collect())
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateRouteRequest,
    ) -> AppResult<ApiResponse<RouteResponse>> {
        request.validate()?;

        let mut route = self.load(id).await?;
        if let Some(expected) = request.version {
            if expected != route.version {
                return Err(AppError::ConcurrencyConflict {
                    route_id: id,
                    expected,
                    actual: route.version,
                });
            }
        }
        if route.status.is_terminal() {
            return Err(invalid_transition(route.status, "update"));
        }

        apply_patch(&mut route, request);
        route.updated_at = Utc::now();
        stop_sequencer::refresh_navigation_url(&mut route);

        let saved = self.commit(&route, None).await?;
        Ok(ApiResponse::success_with_message(
            RouteResponse::from(saved),
            "Ruta actualizada exitosamente".to_string(),
        ))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.repository.delete(id).await? {
            return Err(not_found_error("Route", &id.to_string()));
        }
        log::info!("🗑️ Ruta {} eliminada", id);
        Ok(())
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn add_stop(&self, id: Uuid, request: StopRequest) -> AppResult<ApiResponse<Vec<RouteStop>>> {
        request.validate()?;

        let mut route = self.load(id).await?;
        stop_sequencer::add_stop(&mut route, request, Utc::now())?;

        let saved = self.commit(&route, None).await?;
        Ok(ApiResponse::success_with_message(
            saved.stops,
            "Parada agregada exitosamente".to_string(),
        ))
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_stop(&self, id: Uuid, stop_order: i32) -> AppResult<ApiResponse<Vec<RouteStop>>> {
        let mut route = self.load(id).await?;
        stop_sequencer::remove_stop(&mut route, stop_order, Utc::now())?;

        let saved = self.commit(&route, None).await?;
        Ok(ApiResponse::success_with_message(
            saved.stops,
            "Parada eliminada exitosamente".to_string(),
        ))
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn reorder_stops(
        &self,
        id: Uuid,
        request: ReorderStopsRequest,
    ) -> AppResult<ApiResponse<Vec<RouteStop>>> {
        let mut route = self.load(id).await?;
        stop_sequencer::reorder_stops(&mut route, &request.stops, Utc::now())?;

        let saved = self.commit(&route, None).await?;
        Ok(ApiResponse::success_with_message(
            saved.stops,
            "Paradas reordenadas exitosamente".to_string(),
        ))
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn update_stop_status(
        &self,
        id: Uuid,
        stop_id: Uuid,
        request: UpdateStopStatusRequest,
    ) -> AppResult<ApiResponse<RouteResponse>> {
        let mut route = self.load(id).await?;
        stop_sequencer::update_stop_status(
            &mut route,
            stop_id,
            request.status,
            request.actual_arrival,
            request.actual_departure,
            Utc::now(),
        )?;

        let saved = self.commit(&route, None).await?;
        Ok(ApiResponse::success(RouteResponse::from(saved)))
    }

    pub async fn can_start(&self, id: Uuid) -> AppResult<CanStartResponse> {
        let route = self.load(id).await?;
        Ok(CanStartResponse {
            route_id: route.id.to_string(),
            can_start: self.start_guard.can_start(&route).await,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn start(&self, id: Uuid) -> AppResult<ApiResponse<RouteResponse>> {
        let mut route = self.load(id).await?;
        if !self.start_guard.can_start(&route).await {
            log::warn!("🚫 Ruta {} sin inspección previa al viaje", id);
            return Err(AppError::InspectionRequired(id));
        }

        let event = route_lifecycle::start(&mut route, Utc::now())?;
        let saved = self.commit(&route, Some(event)).await?;
        Ok(ApiResponse::success_with_message(
            RouteResponse::from(saved),
            "Ruta iniciada".to_string(),
        ))
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, id: Uuid) -> AppResult<ApiResponse<RouteResponse>> {
        let mut route = self.load(id).await?;
        let event = route_lifecycle::complete(&mut route, Utc::now())?;
        let saved = self.commit(&route, Some(event)).await?;
        Ok(ApiResponse::success_with_message(
            RouteResponse::from(saved),
            "Ruta completada".to_string(),
        ))
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> AppResult<ApiResponse<RouteResponse>> {
        let mut route = self.load(id).await?;
        let event = route_lifecycle::cancel(&mut route, Utc::now())?;
        let saved = self.commit(&route, Some(event)).await?;
        Ok(ApiResponse::success_with_message(
            RouteResponse::from(saved),
            "Ruta cancelada".to_string(),
        ))
    }

    #[tracing::instrument(skip(self))]
    pub async fn optimize(&self, id: Uuid, optimized_by: &str) -> AppResult<ApiResponse<OptimizeRouteResponse>> {
        let mut route = self.load(id).await?;
        let (optimization, event) =
            optimization_service::optimize(&mut route, self.optimizer.as_ref(), optimized_by, Utc::now())
                .await?;
        let saved = self.commit(&route, Some(event)).await?;

        let authoritative = self.optimizer.is_authoritative();
        let note = (!authoritative).then(|| {
            format!(
                "Métricas estimadas con la estrategia '{}'; el orden de paradas no cambia",
                self.optimizer.name()
            )
        });

        Ok(ApiResponse::success_with_message(
            OptimizeRouteResponse {
                route: RouteResponse::from(saved),
                optimization,
                authoritative,
                note,
            },
            "Ruta optimizada".to_string(),
        ))
    }
}

/// Previsualización sin ruta persistida
pub fn navigation_preview(request: NavigationPreviewRequest) -> NavigationPreviewResponse {
    let start = request.start_address.as_deref();
    let destination = request.destination_address.as_deref();

    NavigationPreviewResponse {
        url: generate_navigation_url(start, &request.stops, destination),
        waypoints: collect_waypoints(start, &request.stops, destination).len(),
    }
}

fn apply_patch(route: &mut Route, patch: UpdateRouteRequest) {
    if let Some(name) = patch.name {
        route.name = name.trim().to_string();
    }
    if let Some(description) = patch.description {
        route.description = Some(description);
    }
    // "" desasigna
    if let Some(vehicle_id) = patch.vehicle_id {
        route.vehicle_id = non_empty(Some(vehicle_id));
    }
    if let Some(driver_id) = patch.driver_id {
        route.driver_id = non_empty(Some(driver_id));
    }
    if let Some(start_address) = patch.start_address {
        route.start_address = non_empty(Some(start_address));
    }
    if let Some(destination_address) = patch.destination_address {
        route.destination_address = non_empty(Some(destination_address));
    }
    if let Some(total_distance) = patch.total_distance {
        route.total_distance = total_distance;
    }
    if let Some(estimated_duration) = patch.estimated_duration {
        route.estimated_duration = estimated_duration;
    }
    if let Some(fuel_estimate) = patch.fuel_estimate {
        route.fuel_estimate = fuel_estimate;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
