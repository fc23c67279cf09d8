use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fleet_routing::config::{DatabaseConfig, EnvironmentConfig};
use fleet_routing::create_app;
use fleet_routing::repositories::{InMemoryRouteRepository, PgRouteRepository, RouteRepository};
use fleet_routing::services::notification_service::{spawn_notification_worker, EventPublisher};
use fleet_routing::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    info!("🚚 Fleet Routing - API de rutas ({})", config.environment);
    info!("================================================");

    let routes: Arc<dyn RouteRepository> = match &config.database_url {
        Some(url) => {
            let pool = DatabaseConfig::new(url.as_str())
                .create_pool()
                .await
                .context("Error conectando a la base de datos")?;
            DatabaseConfig::run_migrations(&pool)
                .await
                .context("Error aplicando migraciones")?;
            info!("✅ PostgreSQL conectado y migrado");
            Arc::new(PgRouteRepository::new(pool))
        }
        None => {
            warn!("⚠️ DATABASE_URL no definido: usando repositorio en memoria");
            Arc::new(InMemoryRouteRepository::new())
        }
    };

    let (events, receiver) = EventPublisher::channel();
    let worker = spawn_notification_worker(receiver);

    let app = create_app(AppState::new(config.clone(), routes, events));

    let addr: SocketAddr = config
        .server_url()
        .parse()
        .with_context(|| format!("Dirección inválida: {}", config.server_url()))?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health");
    info!("   POST/GET        /api/route");
    info!("   GET/PUT/DELETE  /api/route/:id");
    info!("   POST/PUT        /api/route/:id/stops");
    info!("   DELETE          /api/route/:id/stops/:stop_order");
    info!("   PUT             /api/route/:id/stops/:stop_id/status");
    info!("   GET             /api/route/:id/can-start");
    info!("   POST            /api/route/:id/start | complete | cancel | optimize");
    info!("   POST            /api/route/navigation-preview");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    // El router (y con él el último publicador) ya se soltó: el worker drena y termina
    if let Err(e) = worker.await {
        error!("❌ Worker de notificaciones terminó con error: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
