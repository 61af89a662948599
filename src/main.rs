use std::net::SocketAddr;

use elearning_service::config::Config;
use elearning_service::seed::{self, AdminAction};
use elearning_service::AppState;
use tracing_subscriber::EnvFilter;

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "elearning_service=debug,tower_http=debug,sea_orm=info".into());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format.as_str())
            .unwrap_or("text"),
    );

    let config = config.map_err(|e| {
        tracing::error!("Failed to load configuration: {e}");
        e
    })?;

    let db = elearning_service::db::pool::connect(&config)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {e}");
            e
        })?;
    tracing::info!("Connected to database");

    elearning_service::db::migration::run(&db).await?;
    tracing::info!("Migrations applied");

    // seed [admin_email] [admin_password]
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("seed") {
        let email = args
            .get(2)
            .map(String::as_str)
            .unwrap_or(seed::DEFAULT_ADMIN_EMAIL);
        let password = args.get(3).map(String::as_str);
        let demo_password = std::env::var("SEED_DEFAULT_PASSWORD")
            .unwrap_or_else(|_| seed::DEFAULT_DEMO_PASSWORD.to_string());

        let report = seed::bootstrap(&db, email, password, &demo_password).await?;

        match &report.admin {
            AdminAction::Created { generated_password } => {
                println!("Created admin user: {}", report.admin_email);
                if let Some(pw) = generated_password {
                    println!("  Generated password: {pw}");
                    println!("  (Save this password; it won't be shown again!)");
                }
            }
            AdminAction::Promoted => println!("Promoted {} to ADMIN.", report.admin_email),
            AdminAction::AlreadyAdmin => {
                println!("User {} is already an admin.", report.admin_email)
            }
        }
        if report.demo_catalog {
            println!("Seeded demo teacher, student and course.");
        }

        db.close().await?;
        return Ok(());
    }

    let jwt = elearning_service::auth::jwt::JwtManager::new(&config)?;

    let state = AppState {
        db: db.clone(),
        jwt,
        config: config.clone(),
    };

    let app = elearning_service::routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await?;
    tracing::info!("Database connection closed");

    Ok(())
}
