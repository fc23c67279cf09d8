use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::route_controller::{self, RouteController};
use crate::dto::route_dto::{
    CanStartResponse, CreateRouteRequest, NavigationPreviewRequest, NavigationPreviewResponse,
    OptimizeRouteResponse, ReorderStopsRequest, RouteFilters, RouteResponse, StopRequest,
    UpdateRouteRequest, UpdateStopStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::RouteStop;
use crate::state::AppState;
use crate::utils::errors::AppError;

const USER_HEADER: &str = "x-user-id";
const DEFAULT_USER: &str = "system";

pub fn create_route_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_route).get(list_routes))
        .route("/navigation-preview", post(navigation_preview))
        .route("/:id", get(get_route).put(update_route).delete(delete_route))
        .route("/:id/stops", post(add_stop).put(reorder_stops))
        .route("/:id/stops/:stop", delete(remove_stop))
        .route("/:id/stops/:stop/status", put(update_stop_status))
        .route("/:id/can-start", get(can_start))
        .route("/:id/start", post(start_route))
        .route("/:id/complete", post(complete_route))
        .route("/:id/cancel", post(cancel_route))
        .route("/:id/optimize", post(optimize_route))
}

/// Usuario que actúa, tomado de `x-user-id`
fn acting_user(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

async fn create_route(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRouteRequest>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.create(request, &acting_user(&headers)).await?;
    Ok(Json(response))
}

async fn list_routes(
    State(state): State<AppState>,
    Query(filters): Query<RouteFilters>,
) -> Result<Json<Vec<RouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.list(filters).await?;
    Ok(Json(response))
}

async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteResponse>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.get_by_id(id).await?;
    Ok(Json(response))
}

async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRouteRequest>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.update(id, request).await?;
    Ok(Json(response))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let controller = RouteController::new(&state);
    controller.delete(id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Ruta eliminada exitosamente"
    })))
}

async fn add_stop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StopRequest>,
) -> Result<Json<ApiResponse<Vec<RouteStop>>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.add_stop(id, request).await?;
    Ok(Json(response))
}

async fn reorder_stops(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReorderStopsRequest>,
) -> Result<Json<ApiResponse<Vec<RouteStop>>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.reorder_stops(id, request).await?;
    Ok(Json(response))
}

async fn remove_stop(
    State(state): State<AppState>,
    Path((id, stop_order)): Path<(Uuid, i32)>,
) -> Result<Json<ApiResponse<Vec<RouteStop>>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.remove_stop(id, stop_order).await?;
    Ok(Json(response))
}

async fn update_stop_status(
    State(state): State<AppState>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateStopStatusRequest>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.update_stop_status(id, stop_id, request).await?;
    Ok(Json(response))
}

async fn can_start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CanStartResponse>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.can_start(id).await?;
    Ok(Json(response))
}

async fn start_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.start(id).await?;
    Ok(Json(response))
}

async fn complete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.complete(id).await?;
    Ok(Json(response))
}

async fn cancel_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.cancel(id).await?;
    Ok(Json(response))
}

async fn optimize_route(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OptimizeRouteResponse>>, AppError> {
    let controller = RouteController::new(&state);
    let response = controller.optimize(id, &acting_user(&headers)).await?;
    Ok(Json(response))
}

async fn navigation_preview(
    Json(request): Json<NavigationPreviewRequest>,
) -> Json<NavigationPreviewResponse> {
    Json(route_controller::navigation_preview(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_acting_user_defaults_to_system() {
        let mut headers = HeaderMap::new();
        assert_eq!(acting_user(&headers), "system");

        headers.insert(USER_HEADER, HeaderValue::from_static("  "));
        assert_eq!(acting_user(&headers), "system");

        headers.insert(USER_HEADER, HeaderValue::from_static("dispatcher-3"));
        assert_eq!(acting_user(&headers), "dispatcher-3");
    }
}
