//! Repositorio en memoria
//!
//! Usado cuando no hay `DATABASE_URL` y en los tests. Mismo contrato que el
//! de PostgreSQL, incluido el control de versión.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::route_repository::{RouteQuery, RouteRepository};
use crate::models::Route;
use crate::utils::errors::{not_found_error, AppError, AppResult};

#[derive(Default)]
pub struct InMemoryRouteRepository {
    routes: RwLock<HashMap<Uuid, Route>>,
}

impl InMemoryRouteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RouteRepository for InMemoryRouteRepository {
    async fn insert(&self, route: &Route) -> AppResult<()> {
        let mut routes = self.routes.write().await;
        if routes.contains_key(&route.id) {
            return Err(AppError::BadRequest(format!("Route '{}' already exists", route.id)));
        }
        routes.insert(route.id, route.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Route>> {
        Ok(self.routes.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &RouteQuery) -> AppResult<Vec<Route>> {
        let routes = self.routes.read().await;
        let mut matching: Vec<Route> = routes.values().filter(|r| query.matches(r)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn save(&self, route: &Route) -> AppResult<Route> {
        let mut routes = self.routes.write().await;
        let stored = routes
            .get(&route.id)
            .ok_or_else(|| not_found_error("Route", &route.id.to_string()))?;

        if stored.version != route.version {
            return Err(AppError::ConcurrencyConflict {
                route_id: route.id,
                expected: route.version,
                actual: stored.version,
            });
        }

        let mut saved = route.clone();
        saved.version += 1;
        routes.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.routes.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::route_dto::StopRequest;
    use crate::models::RouteStatus;
    use crate::services::stop_sequencer;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn stop_input(address: &str) -> StopRequest {
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

    fn new_route(name: &str) -> Route {
        Route::new(name.to_string(), RouteStatus::Planned, "tester".to_string(), Utc::now())
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let repo = InMemoryRouteRepository::new();
        let route = new_route("A");
        repo.insert(&route).await.unwrap();

        let saved = repo.save(&route).await.unwrap();
        assert_eq!(saved.version, 2);
        assert_eq!(repo.find_by_id(route.id).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_concurrent_add_stop_loser_gets_conflict() {
        let repo = InMemoryRouteRepository::new();
        let route = new_route("A");
        repo.insert(&route).await.unwrap();

        let mut first = repo.find_by_id(route.id).await.unwrap().unwrap();
        let mut second = repo.find_by_id(route.id).await.unwrap().unwrap();

        stop_sequencer::add_stop(&mut first, stop_input("Rue A"), Utc::now()).unwrap();
        stop_sequencer::add_stop(&mut second, stop_input("Rue B"), Utc::now()).unwrap();

        repo.save(&first).await.unwrap();
        let err = repo.save(&second).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::ConcurrencyConflict { expected: 1, actual: 2, .. }
        ));

        let stored = repo.find_by_id(route.id).await.unwrap().unwrap();
        assert_eq!(stored.stops.len(), 1);
        assert_eq!(stored.stops[0].address, "Rue A");
    }

    #[tokio::test]
    async fn test_parallel_saves_exactly_one_wins() {
        let repo = Arc::new(InMemoryRouteRepository::new());
        let route = new_route("A");
        repo.insert(&route).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = Arc::clone(&repo);
            let mut copy = route.clone();
            handles.push(tokio::spawn(async move {
                stop_sequencer::add_stop(&mut copy, stop_input(&format!("Stop {}", i)), Utc::now())
                    .unwrap();
                repo.save(&copy).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(AppError::ConcurrencyConflict { .. }) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(repo.find_by_id(route.id).await.unwrap().unwrap().stops.len(), 1);
    }

    #[tokio::test]
    async fn test_save_unknown_route_is_not_found() {
        let repo = InMemoryRouteRepository::new();
        let err = repo.save(&new_route("ghost")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let repo = InMemoryRouteRepository::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut route = new_route(&format!("R{}", i));
            route.created_at = base + Duration::seconds(i);
            route.vehicle_id = Some(if i % 2 == 0 { "VAN-1" } else { "VAN-2" }.to_string());
            repo.insert(&route).await.unwrap();
        }

        let query = RouteQuery {
            vehicle_id: Some("VAN-1".to_string()),
            ..RouteQuery::default()
        };
        let names: Vec<String> = repo.list(&query).await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["R4", "R2", "R0"]);

        let page = RouteQuery {
            limit: 2,
            offset: 1,
            ..RouteQuery::default()
        };
        let names: Vec<String> = repo.list(&page).await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["R3", "R2"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryRouteRepository::new();
        let route = new_route("A");
        repo.insert(&route).await.unwrap();
        assert!(repo.delete(route.id).await.unwrap());
        assert!(!repo.delete(route.id).await.unwrap());
        assert!(repo.find_by_id(route.id).await.unwrap().is_none());
    }
}
