use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use chrono::Utc;
use dotenvy::dotenv;
use serde_json::json;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use fuel_quota_system::config::database::DatabaseConfig;
use fuel_quota_system::config::environment::EnvironmentConfig;
use fuel_quota_system::middleware::cors::cors_middleware;
use fuel_quota_system::routes::quota_routes::create_quota_router;
use fuel_quota_system::services::quota_reset_sweep::next_monthly_run;
use fuel_quota_system::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("⛽ Fuel Quota Management System");
    info!("================================");

    let config = EnvironmentConfig::default();

    // Inicializar base de datos
    let pool = match DatabaseConfig::default().create_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    let app_state = AppState::new(pool, config.clone());

    // Scheduler mensual: el timer vive afuera del ledger y solo invoca
    // run_monthly_sweep una vez por mes calendario
    let scheduler_state = app_state.clone();
    tokio::spawn(async move {
        monthly_sweep_scheduler(scheduler_state).await;
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/quota", create_quota_router())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_middleware(&config))
        .with_state(app_state);

    let addr: SocketAddr = config.server_url().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("   GET  /api/quota/check/:vehicle_id/:fuel_type - Consultar saldo");
    info!("   POST /api/quota/pump - Registrar despacho de combustible");
    info!("   POST /api/quota/reset/:vehicle_id/:fuel_type - Reset administrativo");
    info!("   POST /api/quota/sweep - Disparar barrido mensual");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Endpoint de health check
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "service": "fuel-quota",
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Loop del scheduler: duerme hasta el primer día del mes siguiente (00:01
/// UTC) y dispara el barrido de reasignación
async fn monthly_sweep_scheduler(state: AppState) {
    loop {
        let next_run = next_monthly_run(Utc::now());
        let wait = (next_run - Utc::now())
            .to_std()
            .unwrap_or_else(|_| std::time::Duration::from_secs(60));

        info!("⏰ Próximo barrido mensual programado para {}", next_run);
        tokio::time::sleep(wait).await;

        match state.sweep.run_monthly_sweep().await {
            Ok(summary) => info!(
                "✅ Barrido mensual completado: {}/{} vehículos (fallidos: {})",
                summary.succeeded, summary.total, summary.failed
            ),
            Err(e) => error!("❌ Error en el barrido mensual: {}", e),
        }
    }
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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
