//! DTOs de la API
//!
//! Requests y responses que cruzan la capa HTTP.

pub mod api_response;
pub mod route_dto;

pub use api_response::ApiResponse;
