//! Repositorio PostgreSQL del agregado Route
//!
//! Tablas `routes`, `route_stops` y `route_optimizations` (ver
//! `migrations/`). Cada escritura del agregado ocurre en una transacción:
//! o se aplica completa o no se aplica.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::route_repository::{RouteQuery, RouteRepository};
use crate::models::{Route, RouteOptimization, RouteStatus, RouteStop, StopPriority, StopStatus};
use crate::utils::errors::{not_found_error, AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    vehicle_id: Option<String>,
    driver_id: Option<String>,
    start_address: Option<String>,
    destination_address: Option<String>,
    status: String,
    total_distance: Decimal,
    estimated_duration: i32,
    fuel_estimate: Decimal,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    actual_duration_seconds: Option<i64>,
    navigation_url: String,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RouteStopRow {
    id: Uuid,
    route_id: Uuid,
    stop_order: i32,
    address: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    estimated_arrival: Option<DateTime<Utc>>,
    estimated_departure: Option<DateTime<Utc>>,
    actual_arrival: Option<DateTime<Utc>>,
    actual_departure: Option<DateTime<Utc>>,
    priority: String,
    status: String,
    notes: Option<String>,
    contact_name: Option<String>,
    contact_phone: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct RouteOptimizationRow {
    id: Uuid,
    route_id: Uuid,
    original_distance: Decimal,
    original_duration: i32,
    original_fuel: Decimal,
    optimized_distance: Decimal,
    optimized_duration: i32,
    optimized_fuel: Decimal,
    distance_saved: Decimal,
    time_saved: i32,
    fuel_saved: Decimal,
    algorithm: String,
    optimized_at: DateTime<Utc>,
    optimized_by: String,
}

impl TryFrom<RouteStopRow> for RouteStop {
    type Error = AppError;

    fn try_from(row: RouteStopRow) -> Result<Self, Self::Error> {
        Ok(RouteStop {
            id: row.id,
            route_id: row.route_id,
            stop_order: row.stop_order,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            estimated_arrival: row.estimated_arrival,
            estimated_departure: row.estimated_departure,
            actual_arrival: row.actual_arrival,
            actual_departure: row.actual_departure,
            priority: row.priority.parse::<StopPriority>().map_err(AppError::Internal)?,
            status: row.status.parse::<StopStatus>().map_err(AppError::Internal)?,
            notes: row.notes,
            contact_name: row.contact_name,
            contact_phone: row.contact_phone,
        })
    }
}

impl From<RouteOptimizationRow> for RouteOptimization {
    fn from(row: RouteOptimizationRow) -> Self {
        RouteOptimization {
            id: row.id,
            route_id: row.route_id,
            original_distance: row.original_distance,
            original_duration: row.original_duration,
            original_fuel: row.original_fuel,
            optimized_distance: row.optimized_distance,
            optimized_duration: row.optimized_duration,
            optimized_fuel: row.optimized_fuel,
            distance_saved: row.distance_saved,
            time_saved: row.time_saved,
            fuel_saved: row.fuel_saved,
            algorithm: row.algorithm,
            optimized_at: row.optimized_at,
            optimized_by: row.optimized_by,
        }
    }
}

fn assemble(
    row: RouteRow,
    stops: Vec<RouteStopRow>,
    optimization: Option<RouteOptimizationRow>,
) -> AppResult<Route> {
    let mut stops = stops
        .into_iter()
        .map(RouteStop::try_from)
        .collect::<AppResult<Vec<_>>>()?;
    stops.sort_by_key(|s| s.stop_order);

    Ok(Route {
        id: row.id,
        name: row.name,
        description: row.description,
        vehicle_id: row.vehicle_id,
        driver_id: row.driver_id,
        start_address: row.start_address,
        destination_address: row.destination_address,
        status: row.status.parse::<RouteStatus>().map_err(AppError::Internal)?,
        total_distance: row.total_distance,
        estimated_duration: row.estimated_duration,
        fuel_estimate: row.fuel_estimate,
        start_time: row.start_time,
        end_time: row.end_time,
        actual_duration_seconds: row.actual_duration_seconds,
        navigation_url: row.navigation_url,
        created_by: row.created_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
        stops,
        optimization: optimization.map(RouteOptimization::from),
    })
}

pub struct PgRouteRepository {
    pool: PgPool,
}

impl PgRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_stops(tx: &mut Transaction<'_, Postgres>, stops: &[RouteStop]) -> AppResult<()> {
        for stop in stops {
            sqlx::query(
                r#"
                INSERT INTO route_stops (
                    id, route_id, stop_order, address, latitude, longitude,
                    estimated_arrival, estimated_departure, actual_arrival, actual_departure,
                    priority, status, notes, contact_name, contact_phone
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(stop.id)
            .bind(stop.route_id)
            .bind(stop.stop_order)
            .bind(&stop.address)
            .bind(stop.latitude)
            .bind(stop.longitude)
            .bind(stop.estimated_arrival)
            .bind(stop.estimated_departure)
            .bind(stop.actual_arrival)
            .bind(stop.actual_departure)
            .bind(stop.priority.as_str())
            .bind(stop.status.as_str())
            .bind(&stop.notes)
            .bind(&stop.contact_name)
            .bind(&stop.contact_phone)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn upsert_optimization(
        tx: &mut Transaction<'_, Postgres>,
        optimization: &RouteOptimization,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO route_optimizations (
                id, route_id, original_distance, original_duration, original_fuel,
                optimized_distance, optimized_duration, optimized_fuel,
                distance_saved, time_saved, fuel_saved, algorithm, optimized_at, optimized_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (route_id) DO UPDATE SET
                original_distance = EXCLUDED.original_distance,
                original_duration = EXCLUDED.original_duration,
                original_fuel = EXCLUDED.original_fuel,
                optimized_distance = EXCLUDED.optimized_distance,
                optimized_duration = EXCLUDED.optimized_duration,
                optimized_fuel = EXCLUDED.optimized_fuel,
                distance_saved = EXCLUDED.distance_saved,
                time_saved = EXCLUDED.time_saved,
                fuel_saved = EXCLUDED.fuel_saved,
                algorithm = EXCLUDED.algorithm,
                optimized_at = EXCLUDED.optimized_at,
                optimized_by = EXCLUDED.optimized_by
            "#,
        )
        .bind(optimization.id)
        .bind(optimization.route_id)
        .bind(optimization.original_distance)
        .bind(optimization.original_duration)
        .bind(optimization.original_fuel)
        .bind(optimization.optimized_distance)
        .bind(optimization.optimized_duration)
        .bind(optimization.optimized_fuel)
        .bind(optimization.distance_saved)
        .bind(optimization.time_saved)
        .bind(optimization.fuel_saved)
        .bind(&optimization.algorithm)
        .bind(optimization.optimized_at)
        .bind(&optimization.optimized_by)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RouteRepository for PgRouteRepository {
    async fn insert(&self, route: &Route) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO routes (
                id, name, description, vehicle_id, driver_id, start_address, destination_address,
                status, total_distance, estimated_duration, fuel_estimate, start_time, end_time,
                actual_duration_seconds, navigation_url, created_by, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(route.id)
        .bind(&route.name)
        .bind(&route.description)
        .bind(&route.vehicle_id)
        .bind(&route.driver_id)
        .bind(&route.start_address)
        .bind(&route.destination_address)
        .bind(route.status.as_str())
        .bind(route.total_distance)
        .bind(route.estimated_duration)
        .bind(route.fuel_estimate)
        .bind(route.start_time)
        .bind(route.end_time)
        .bind(route.actual_duration_seconds)
        .bind(&route.navigation_url)
        .bind(&route.created_by)
        .bind(route.created_at)
        .bind(route.updated_at)
        .bind(route.version)
        .execute(&mut *tx)
        .await?;

        Self::insert_stops(&mut tx, &route.stops).await?;
        if let Some(optimization) = &route.optimization {
            Self::upsert_optimization(&mut tx, optimization).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>("SELECT * FROM routes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stops = sqlx::query_as::<_, RouteStopRow>(
            "SELECT * FROM route_stops WHERE route_id = $1 ORDER BY stop_order",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let optimization = sqlx::query_as::<_, RouteOptimizationRow>(
            "SELECT * FROM route_optimizations WHERE route_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        assemble(row, stops, optimization).map(Some)
    }

    async fn list(&self, query: &RouteQuery) -> AppResult<Vec<Route>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT * FROM routes
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR vehicle_id = $2)
              AND ($3::text IS NULL OR driver_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(query.status.map(|s| s.as_str()))
        .bind(&query.vehicle_id)
        .bind(&query.driver_id)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let mut stops_by_route: HashMap<Uuid, Vec<RouteStopRow>> = HashMap::new();
        for stop in sqlx::query_as::<_, RouteStopRow>(
            "SELECT * FROM route_stops WHERE route_id = ANY($1) ORDER BY route_id, stop_order",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?
        {
            stops_by_route.entry(stop.route_id).or_default().push(stop);
        }

        let mut optimizations: HashMap<Uuid, RouteOptimizationRow> = sqlx::query_as::<_, RouteOptimizationRow>(
            "SELECT * FROM route_optimizations WHERE route_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|o| (o.route_id, o))
        .collect();

        rows.into_iter()
            .map(|row| {
                let stops = stops_by_route.remove(&row.id).unwrap_or_default();
                let optimization = optimizations.remove(&row.id);
                assemble(row, stops, optimization)
            })
            .collect()
    }

    async fn save(&self, route: &Route) -> AppResult<Route> {
        let mut tx = self.pool.begin().await?;

        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE routes
            SET name = $3, description = $4, vehicle_id = $5, driver_id = $6,
                start_address = $7, destination_address = $8, status = $9,
                total_distance = $10, estimated_duration = $11, fuel_estimate = $12,
                start_time = $13, end_time = $14, actual_duration_seconds = $15,
                navigation_url = $16, updated_at = $17, version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(route.id)
        .bind(route.version)
        .bind(&route.name)
        .bind(&route.description)
        .bind(&route.vehicle_id)
        .bind(&route.driver_id)
        .bind(&route.start_address)
        .bind(&route.destination_address)
        .bind(route.status.as_str())
        .bind(route.total_distance)
        .bind(route.estimated_duration)
        .bind(route.fuel_estimate)
        .bind(route.start_time)
        .bind(route.end_time)
        .bind(route.actual_duration_seconds)
        .bind(&route.navigation_url)
        .bind(route.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_version) = new_version else {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM routes WHERE id = $1")
                .bind(route.id)
                .fetch_optional(&mut *tx)
                .await?;

            return Err(match actual {
                Some(actual) => AppError::ConcurrencyConflict {
                    route_id: route.id,
                    expected: route.version,
                    actual,
                },
                None => not_found_error("Route", &route.id.to_string()),
            });
        };

        sqlx::query("DELETE FROM route_stops WHERE route_id = $1")
            .bind(route.id)
            .execute(&mut *tx)
            .await?;
        Self::insert_stops(&mut tx, &route.stops).await?;

        match &route.optimization {
            Some(optimization) => Self::upsert_optimization(&mut tx, optimization).await?,
            None => {
                sqlx::query("DELETE FROM route_optimizations WHERE route_id = $1")
                    .bind(route.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        tracing::debug!("💾 Ruta {} guardada (versión {})", route.id, new_version);

        let mut saved = route.clone();
        saved.version = new_version;
        Ok(saved)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
