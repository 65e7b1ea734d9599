//! vfarm coordinator binary.

use std::future::IntoFuture;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vfarm_coordinator::{loops, routes, AppState, CoordinatorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("vfarm=info".parse().expect("valid directive")),
        )
        .init();

    let config = CoordinatorConfig::from_env();
    info!(?config, "starting vfarm coordinator");

    let state = AppState::new(config.clone());

    tokio::spawn(loops::dispatch_loop(state.clone()));
    tokio::spawn(loops::timeout_loop(state.clone()));

    // Ctrl-C cancels the root token, which stops the loops, fires every
    // stream's close signal and drains both servers.
    {
        let state = state.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
            state.shutdown.cancel();
            state.conns.close_all();
        });
    }

    let stream_listener = TcpListener::bind(config.stream_addr())
        .await
        .with_context(|| format!("failed to bind stream port at {}", config.stream_addr()))?;
    let http_listener = TcpListener::bind(config.http_addr())
        .await
        .with_context(|| format!("failed to bind http port at {}", config.http_addr()))?;

    info!(
        stream = %config.stream_addr(),
        http = %config.http_addr(),
        "coordinator listening"
    );

    let stream_server = axum::serve(
        stream_listener,
        routes::create_stream_router(state.clone()),
    )
    .with_graceful_shutdown(state.shutdown.clone().cancelled_owned());

    let http_server = axum::serve(http_listener, routes::create_api_router(state.clone()))
        .with_graceful_shutdown(state.shutdown.clone().cancelled_owned());

    tokio::try_join!(stream_server.into_future(), http_server.into_future())
        .context("server error")?;

    info!("coordinator shutdown complete");
    Ok(())
}
