use optimg::config::OptimgConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Optimg standalone server entry point.
///
/// Initializes tracing, validates configuration, and starts an HTTP server
/// answering image optimization requests.
///
/// # Configuration
/// Environment variables:
/// - `OPTIMG_CACHE_DIR`: cache directory (default: "./cache")
/// - `OPTIMG_MAX_INPUT_SIZE`: source image size limit in bytes (default: 8MB)
/// - `PORT`: HTTP listen port (default: 8080)
/// - `RUST_LOG`: Logging verbosity (default: "optimg=debug,tower_http=debug")
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with environment-based filtering
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "optimg=debug,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting optimg server");

    let mut cfg = OptimgConfig {
        cache_dir: std::env::var("OPTIMG_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./cache")),
        ..OptimgConfig::default()
    };
    if let Ok(max) = std::env::var("OPTIMG_MAX_INPUT_SIZE") {
        cfg.max_input_size = max.parse()?;
    }
    cfg.validate()?;

    let app = optimg::router(cfg)?;

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    // Bind to 0.0.0.0 for external access (required for containerized deployment)
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
