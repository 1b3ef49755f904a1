//! Process-wide server settings, parsed once from the command line.

use clap::Parser;
use shared::Vec3;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "27015")]
    pub port: u16,

    /// Maximum number of concurrently connected players
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_players: u32,

    /// Seconds a fresh connection may wait before it must authenticate
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_pre_auth_wait: u64,

    /// Maximum distance at which objects are simulated around a player
    #[arg(long, default_value = "10.0")]
    pub max_object_distance: f32,

    /// Interval between player-list syncs, in milliseconds
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..))]
    pub position_sync_ms: u64,

    /// Map loaded at startup
    #[arg(short, long, default_value = "level")]
    pub map: String,

    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    pub spawn_x: f32,
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    pub spawn_y: f32,
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    pub spawn_z: f32,

    /// Path of the persistence file
    #[arg(short, long, default_value = "database.json")]
    pub database: PathBuf,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..))]
    pub tick_rate: u32,

    /// Seconds of silence before a peer is dropped by the transport
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    pub client_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["server"])
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pre_auth_window(&self) -> Duration {
        Duration::from_secs(self.max_pre_auth_wait)
    }

    pub fn position_sync_interval(&self) -> Duration {
        Duration::from_millis(self.position_sync_ms)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout)
    }

    pub fn spawn_point(&self) -> Vec3 {
        Vec3::new(self.spawn_x, self.spawn_y, self.spawn_z)
    }
}
