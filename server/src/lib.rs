//! # Outpost Server Library
//!
//! Connection lifecycle core for the multiplayer game server. A client must
//! walk the same path every time before it can take part in the world:
//! connect, authenticate within a bounded window, receive a player entity,
//! load the world, and finally activate. Every way out of that path ends in
//! a single forced-disconnect routine that tells the client why and releases
//! everything the server holds for it.
//!
//! ## Core Responsibilities
//!
//! ### Admission
//! New connections enter a pre-auth state and get a fixed window to present
//! a token. Timing out, presenting no token, presenting an unknown token or
//! arriving before the world is loaded all end in a disconnect with a
//! human-readable reason.
//!
//! ### Player Lifecycle
//! A successful authentication spawns a player entity at the map's spawn
//! point, announces it to every client and starts a per-connection player
//! list sync. Disconnects remove the entity and stop every timer tied to it.
//!
//! ### Persistence
//! Credentials, character rows and world objects live in a file-backed
//! store. Character saves write through to disk.
//!
//! ## Architecture Design
//!
//! ### Deterministic Core
//! [`manager::ConnectionManager`] owns all lifecycle state and never reads
//! the clock itself. Callers pass `now` into every operation, which keeps the
//! timeout and sync logic testable without sleeping.
//!
//! ### UDP Transport
//! [`network::Server`] binds the socket, assigns connection slots and feeds
//! packets into the core from a single event loop. Outgoing traffic is queued
//! through [`rpc::Outbound`] and delivered by a dedicated sender task.
//!
//! ## Module Organization
//!
//! - `auth`: pre-auth timers and token admission
//! - `broadcaster`: world-init payloads and periodic player lists
//! - `client_manager`: socket address to connection slot mapping
//! - `config`: command-line configuration
//! - `connection`: per-connection lifecycle state
//! - `manager`: RPC routing and the forced-disconnect path
//! - `network`: UDP server loop
//! - `players`: spawned player entities
//! - `rpc`: outbound message queue abstraction
//! - `scheduler`: instant-driven one-shot and repeating timers
//! - `store`: persistence interface and JSON-file database
//! - `world`: loaded map and readiness
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::store::Database;
//! use server::world::{MapInfo, World};
//! use shared::Vec3;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::parse();
//!     let store = Database::open(&config.database)?;
//!     let world = World::with_map(MapInfo::new(&config.map, config.spawn_point(), Vec3::zero()));
//!
//!     let mut server = Server::new(&config, store, world).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod broadcaster;
pub mod client_manager;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod network;
pub mod players;
pub mod rpc;
pub mod scheduler;
pub mod store;
pub mod world;
