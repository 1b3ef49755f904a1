//! Server network layer handling UDP communications and the server tick
//!
//! The slot table is owned by the main loop. Outbound work queued by the
//! connection core is resolved to addresses right after each event, in order,
//! so an id freed by a disconnect is never confused with its next owner.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::connection::ConnectionState;
use crate::manager::ConnectionManager;
use crate::rpc::Outbound;
use crate::store::PersistenceStore;
use crate::world::World;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

type Outbox = mpsc::UnboundedSender<Outbound>;

/// Main server coordinating networking and the connection core
pub struct Server<S: PersistenceStore> {
    socket: Arc<UdpSocket>,
    clients: ClientManager,
    manager: ConnectionManager<S, Outbox>,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    packet_tx: mpsc::UnboundedSender<(Packet, SocketAddr)>,
    packet_rx: Option<mpsc::UnboundedReceiver<(Packet, SocketAddr)>>,
}

impl<S: PersistenceStore + Send + 'static> Server<S> {
    pub async fn new(
        config: &ServerConfig,
        store: S,
        world: World,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.bind_address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (packet_tx, packet_rx) = mpsc::unbounded_channel();

        let clients = ClientManager::new(config.max_players as usize, config.client_timeout());
        let manager = ConnectionManager::new(config, store, outbound_tx, world, Instant::now());

        Ok(Server {
            socket,
            clients,
            manager,
            tick_duration: config.tick_duration(),
            server_tx,
            server_rx,
            outbound_rx,
            packet_tx,
            packet_rx: Some(packet_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sending `ServerMessage::Shutdown` on this handle stops [`Server::run`].
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn manager(&self) -> &ConnectionManager<S, Outbox> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectionManager<S, Outbox> {
        &mut self.manager
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that writes addressed packets to the socket
    fn spawn_network_sender(&mut self) {
        let Some(mut packet_rx) = self.packet_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some((packet, addr)) = packet_rx.recv().await {
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn queue_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.packet_tx.send((packet, addr)) {
            error!("Failed to queue packet for {}: {}", addr, e);
        }
    }

    /// Resolves queued outbound work against the current slot table
    fn flush_outbound(&mut self) {
        while let Ok(outbound) = self.outbound_rx.try_recv() {
            match outbound {
                Outbound::Send { to, message } => match self.clients.addr_of(to) {
                    Some(addr) => self.queue_packet(Packet::ClientBound(message), addr),
                    None => debug!("Dropping message for departed client {}", to),
                },
                Outbound::Broadcast { message } => {
                    for (_, addr) in self.clients.get_client_addrs() {
                        self.queue_packet(Packet::ClientBound(message.clone()), addr);
                    }
                }
                Outbound::Terminate { id } => {
                    self.clients.remove_client(&id);
                }
            }
        }
    }

    /// Drops silent peers. Connections still waiting to authenticate are
    /// left to the pre-auth timer so they receive its disconnect notice.
    fn check_timeouts(&mut self) {
        let manager = &self.manager;
        let timed_out = self.clients.check_timeouts(|id| {
            manager.connections().state(id) == Some(ConnectionState::PreAuth)
        });

        for client_id in timed_out {
            info!("Client {} timed out", client_id);
            self.manager.on_disconnect(client_id);
        }
    }

    /// Processes incoming packets
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let reason = "Protocol version mismatch.".to_string();
                    self.queue_packet(Packet::Rejected { reason }, addr);
                    return;
                }

                // Remove existing connection if present
                if let Some(existing_id) = self.clients.find_client_by_addr(addr) {
                    info!("Replacing existing client {} from {}", existing_id, addr);
                    self.clients.remove_client(&existing_id);
                    self.manager.on_disconnect(existing_id);
                }

                match self.clients.add_client(addr) {
                    Some(client_id) => {
                        self.queue_packet(Packet::Connected { client_id }, addr);
                        self.manager.on_connect(client_id, Instant::now());
                    }
                    None => {
                        warn!("Server full, rejecting {}", addr);
                        let reason = "Server full.".to_string();
                        self.queue_packet(Packet::Rejected { reason }, addr);
                    }
                }
            }

            Packet::Heartbeat => {
                self.clients.touch_addr(addr);
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.clients.find_client_by_addr(addr) {
                    self.clients.remove_client(&client_id);
                    self.manager.on_disconnect(client_id);
                }
            }

            Packet::ServerBound(message) => match self.clients.touch_addr(addr) {
                Some(client_id) => self.manager.dispatch(client_id, message, Instant::now()),
                None => warn!("RPC {:?} from unconnected address {}", message.tag(), addr),
            },

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));
        timeout_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.manager.tick(Instant::now());
                    ticks += 1;

                    if ticks % 300 == 0 {
                        debug!(
                            "Tick {}: {} connections, {} players",
                            ticks,
                            self.manager.connections().len(),
                            self.manager.players().len()
                        );
                    }
                },

                // Monitor client health
                _ = timeout_interval.tick() => {
                    self.check_timeouts();
                },
            }

            self.flush_outbound();
        }

        self.flush_outbound();
        self.manager.shutdown()?;
        Ok(())
    }
}
