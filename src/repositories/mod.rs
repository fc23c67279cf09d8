pub mod memory_route_repository;
pub mod pg_route_repository;
pub mod route_repository;

pub use memory_route_repository::InMemoryRouteRepository;
pub use pg_route_repository::PgRouteRepository;
pub use route_repository::{RouteQuery, RouteRepository};
