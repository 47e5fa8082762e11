//! DiyLed hub server binary.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal;

use diyled_hub::{
    AppRegistry, ConfigStore, Discovery, Handler, HttpDeviceClient, JsonConfig, MqttBridge,
    ServerState, Store, router, server_id,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = JsonConfig::open(&config_path)?;
    let server_config = config.document().server.clone();
    let store = Store::new(Box::new(config));

    let server_id = server_id();
    info!(
        "Starting diyled-hub v{} as uuid:{server_id}",
        env!("CARGO_PKG_VERSION")
    );

    let mqtt = if server_config.mqtt.enabled {
        Some(Arc::new(MqttBridge::connect(&server_config.mqtt)))
    } else {
        None
    };
    let devices = Arc::new(HttpDeviceClient::new(server_id.clone())?);
    let handler = Arc::new(Handler::new(store, devices, mqtt, server_id.clone()));
    let apps = Arc::new(AppRegistry::bind().await?);
    let discovery = Arc::new(Discovery::new(
        handler.clone(),
        apps.clone(),
        server_id,
        server_config.port,
    )?);

    {
        let discovery = discovery.clone();
        tokio::spawn(async move {
            if let Err(e) = discovery.run().await {
                error!("UDP listener stopped: {e}");
            }
        });
    }
    tokio::spawn(discovery.clone().search_loop());

    let state = ServerState {
        handler,
        apps,
        discovery,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
