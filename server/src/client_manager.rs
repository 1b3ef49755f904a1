//! Transport-level peer table for the UDP server
//!
//! This module tracks which socket addresses currently hold a connection slot:
//! - Slot assignment and capacity enforcement (`max_players`)
//! - Address lookup for routing inbound datagrams to a connection id
//! - Silence detection so vanished peers surface as disconnects
//!
//! Ids are small integers handed out lowest-free-first, so an id is unique
//! only while its connection lives and is reused after a disconnect.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A peer holding a connection slot
#[derive(Debug)]
pub struct Client {
    /// Connection id assigned by the transport
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Records activity from this peer
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing has been heard from this peer within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages connection slots and address routing
///
/// The ClientManager knows nothing about authentication or players; it only
/// answers "which connection sent this datagram" and "where do I send this".
pub struct ClientManager {
    /// Connected clients indexed by their connection id
    clients: HashMap<u32, Client>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Silence after which a client is considered gone
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            timeout,
        }
    }

    /// Attempts to give `addr` a connection slot
    ///
    /// Returns Some(client_id) if successful, None if the server is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = (1..).find(|id| !self.clients.contains_key(id))?;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Frees a client's slot. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} released slot for {}", client.id, client.addr);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the client at `addr` as alive and returns its id
    pub fn touch_addr(&mut self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .values_mut()
            .find(|client| client.addr == addr)
            .map(|client| {
                client.touch();
                client.id
            })
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Checks for and removes timed-out clients, skipping ids for which
    /// `exempt` returns true
    ///
    /// Returns the removed ids, sorted, so the caller can run disconnect cleanup.
    pub fn check_timeouts(&mut self, exempt: impl Fn(u32) -> bool) -> Vec<u32> {
        let timeout = self.timeout;
        let mut timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(id, client)| client.is_timed_out(timeout) && !exempt(**id))
            .map(|(id, _)| *id)
            .collect();
        timed_out.sort_unstable();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
