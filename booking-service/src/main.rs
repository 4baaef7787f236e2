use booking_service::{LogFormat, ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(log_format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "booking_service=debug,booking_flow=debug,tower_http=debug".into()
    });

    match log_format {
        LogFormat::Pretty => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    init_tracing(config.log_format);

    let app = create_app(&config).await;
    let listener = TcpListener::bind(&config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!(jump_policy = ?config.jump_policy, "Booking service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Start a booking: POST http://{}/wizard", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
