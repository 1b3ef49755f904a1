use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::{Server, ServerMessage};
use server::store::Database;
use server::world::{MapInfo, World};
use shared::Vec3;

/// Main-method of the application.
/// Parses command-line arguments, opens the database, loads the map and runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Parse command line arguments
    let config = ServerConfig::parse();
    info!("Starting server with {:?}", config);

    let store = Database::open(&config.database)?;
    let world = World::with_map(MapInfo::new(
        &config.map,
        config.spawn_point(),
        Vec3::zero(),
    ));

    let mut server = Server::new(&config, store, world).await?;

    // Handle shutdown gracefully
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                let _ = shutdown.send(ServerMessage::Shutdown);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;

    info!("Server stopped");
    Ok(())
}
