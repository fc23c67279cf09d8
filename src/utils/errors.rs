//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid state transition: cannot {event} from status '{from}'")]
    InvalidStateTransition { from: String, event: String },

    #[error("Route {0} has no stops")]
    NoStops(Uuid),

    #[error("Concurrency conflict on route {route_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        route_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Pre-trip inspection required for route {0}")]
    InspectionRequired(Uuid),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl AppError {
    /// Código estable que viaja en el cuerpo de la respuesta
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DB_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            AppError::NoStops(_) => "NO_STOPS",
            AppError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            AppError::InspectionRequired(_) => "INSPECTION_REQUIRED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) | AppError::NoStops(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition { .. }
            | AppError::ConcurrencyConflict { .. }
            | AppError::InspectionRequired(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = Some(self.code().to_string());

        let error_response = match self {
            AppError::Database(e) => {
                tracing::error!("❌ Database error: {}", e);
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "An error occurred while accessing the database".to_string(),
                    details: Some(json!({ "sql_error": e.to_string() })),
                    code,
                }
            }

            AppError::Validation(e) => {
                tracing::warn!("⚠️ Validation error: {}", e);
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: "The provided data is invalid".to_string(),
                    details: Some(json!(e)),
                    code,
                }
            }

            AppError::NotFound(msg) => {
                tracing::warn!("🔍 Resource not found: {}", msg);
                ErrorResponse {
                    error: "Not Found".to_string(),
                    message: msg,
                    details: None,
                    code,
                }
            }

            AppError::BadRequest(msg) => {
                tracing::warn!("⚠️ Bad request: {}", msg);
                ErrorResponse {
                    error: "Bad Request".to_string(),
                    message: msg,
                    details: None,
                    code,
                }
            }

            AppError::InvalidStateTransition { from, event } => {
                let message = format!("Cannot {} from status '{}'", event, from);
                tracing::warn!("🚫 {}", message);
                ErrorResponse {
                    error: "Invalid State Transition".to_string(),
                    message,
                    details: Some(json!({ "from": from, "event": event })),
                    code,
                }
            }

            e @ AppError::NoStops(_) => {
                tracing::warn!("⚠️ {}", e);
                ErrorResponse {
                    error: "No Stops".to_string(),
                    message: e.to_string(),
                    details: None,
                    code,
                }
            }

            AppError::ConcurrencyConflict {
                route_id,
                expected,
                actual,
            } => {
                tracing::warn!(
                    "🔒 Conflicto de versión en ruta {}: esperada {}, actual {}",
                    route_id,
                    expected,
                    actual
                );
                ErrorResponse {
                    error: "Concurrency Conflict".to_string(),
                    message: "The route was modified by another request, reload and retry".to_string(),
                    details: Some(json!({
                        "route_id": route_id,
                        "expected_version": expected,
                        "current_version": actual
                    })),
                    code,
                }
            }

            e @ AppError::InspectionRequired(_) => {
                tracing::warn!("🛑 {}", e);
                ErrorResponse {
                    error: "Inspection Required".to_string(),
                    message: e.to_string(),
                    details: None,
                    code,
                }
            }

            AppError::Internal(msg) => {
                tracing::error!("❌ Internal error: {}", msg);
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "An unexpected error occurred".to_string(),
                    details: Some(json!({ "internal_error": msg })),
                    code,
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: impl Into<Cow<'static, str>>) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.message = Some(message.into());

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para transiciones de estado ilegales
pub fn invalid_transition(from: impl ToString, event: &str) -> AppError {
    AppError::InvalidStateTransition {
        from: from.to_string(),
        event: event.to_string(),
    }
}

/// Función helper para crear errores internos
pub fn internal_error(message: &str) -> AppError {
    AppError::Internal(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            not_found_error("Route", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            invalid_transition("completed", "start").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NoStops(Uuid::nil()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            validation_error("address", "empty").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_concurrency_conflict_is_409() {
        let err = AppError::ConcurrencyConflict {
            route_id: Uuid::nil(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CONCURRENCY_CONFLICT");
    }
}
