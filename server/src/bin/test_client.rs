//! Headless probe that walks a full client session against a running server.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{error, info, warn};
use shared::codec;
use shared::{
    ClientBound, Packet, PlayerSyncItem, ServerBound, WorldObject, MAX_DATAGRAM_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:27015")]
    server: SocketAddr,
    /// Auth token to present; omit to test the missing-token path
    #[arg(short, long)]
    token: Option<String>,
    /// Character row to request once the world is loaded
    #[arg(short, long, default_value = "1")]
    character: i64,
    /// Number of player lists to wait for before disconnecting
    #[arg(short, long, default_value = "5")]
    lists: u32,
}

type ProbeResult<T> = Result<T, Box<dyn std::error::Error>>;

struct Probe {
    socket: UdpSocket,
    server: SocketAddr,
    buffer: Vec<u8>,
}

impl Probe {
    async fn connect(server: SocketAddr) -> ProbeResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        info!("Client socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            server,
            buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    async fn send(&self, packet: &Packet) -> ProbeResult<()> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server).await?;
        Ok(())
    }

    async fn rpc(&self, message: ServerBound) -> ProbeResult<()> {
        info!("-> {:?}", message);
        self.send(&Packet::ServerBound(message)).await
    }

    async fn recv(&mut self) -> ProbeResult<Packet> {
        let (len, _) = timeout(Duration::from_secs(15), self.socket.recv_from(&mut self.buffer))
            .await??;
        Ok(deserialize::<Packet>(&self.buffer[..len])?)
    }

    /// Waits for the next client-bound RPC, stopping early on a forced disconnect
    async fn next_message(&mut self) -> ProbeResult<ClientBound> {
        loop {
            match self.recv().await? {
                Packet::ClientBound(ClientBound::ForceDisconnect { reason }) => {
                    return Err(format!("Disconnected by server: {}", reason).into());
                }
                Packet::ClientBound(message) => return Ok(message),
                other => warn!("Ignoring {:?}", other),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> ProbeResult<()> {
    let mut probe = Probe::connect(args.server).await?;

    info!("Sending connection request to {}", args.server);
    probe
        .send(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })
        .await?;

    match probe.recv().await? {
        Packet::Connected { client_id } => info!("Connection accepted with client ID: {}", client_id),
        Packet::Rejected { reason } => return Err(format!("Rejected: {}", reason).into()),
        other => return Err(format!("Expected Connected but got: {:?}", other).into()),
    }

    loop {
        match probe.next_message().await? {
            ClientBound::BeginAuth => break,
            other => warn!("Waiting for auth request, got {:?}", other),
        }
    }

    probe
        .rpc(ServerBound::Authenticate {
            token: args.token.clone(),
        })
        .await?;

    loop {
        match probe.next_message().await? {
            ClientBound::Handshake {
                map_id,
                position,
                rotation,
            } => {
                info!("Handshake: map '{}' spawn {} facing {}", map_id, position, rotation);
                break;
            }
            ClientBound::PuppetCreated { entity_id, .. } => {
                info!("Puppet {} created", entity_id)
            }
            other => warn!("Waiting for handshake, got {:?}", other),
        }
    }

    probe
        .rpc(ServerBound::WorldLoaded {
            character_id: args.character,
        })
        .await?;

    loop {
        match probe.next_message().await? {
            ClientBound::WorldInit { objects, character } => {
                let objects: Vec<WorldObject> = codec::decompress(&objects)?;
                info!("World init: {} objects, character {}", objects.len(), character);
                break;
            }
            other => info!("Before world init: {:?}", other),
        }
    }

    probe.rpc(ServerBound::ObjectsInitialized).await?;
    probe.rpc(ServerBound::Activate).await?;

    let mut received = 0;
    while received < args.lists {
        match probe.next_message().await? {
            ClientBound::PlayerList { players } => {
                let players: Vec<PlayerSyncItem> = codec::decompress(&players)?;
                received += 1;
                info!("Player list {}: {} others", received, players.len());
                for item in players {
                    info!("  Player {} at {} (t={})", item.player_id, item.position, item.timestamp);
                }
                probe.send(&Packet::Heartbeat).await?;
            }
            other => info!("Received {:?}", other),
        }
    }

    info!("Sending disconnect request");
    probe.send(&Packet::Disconnect).await?;

    info!("Test client finished");
    Ok(())
}
