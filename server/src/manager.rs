//! Connection lifecycle and RPC routing.
//!
//! The manager owns every piece of server-side state for connected clients and
//! is driven from a single loop: transport events call [`ConnectionManager::on_connect`],
//! [`ConnectionManager::on_disconnect`] and [`ConnectionManager::dispatch`],
//! and every server tick calls [`ConnectionManager::tick`]. No two of these
//! ever run at the same time, so no locking happens below this type.
//!
//! Every terminal failure goes through [`ConnectionManager::force_disconnect`],
//! which notifies the client, cleans up, and asks the transport to drop it.

use crate::auth::AuthenticationGate;
use crate::broadcaster::{BroadcastError, WorldStateBroadcaster};
use crate::config::ServerConfig;
use crate::connection::{ConnectionState, ConnectionTable};
use crate::error::DisconnectReason;
use crate::players::PlayerDirectory;
use crate::rpc::RpcChannel;
use crate::store::{PersistenceStore, StoreError};
use crate::world::World;
use log::{debug, error, info, warn};
use shared::{CharacterSnapshot, ClientBound, MessageTag, ServerBound, Vec3};
use std::collections::HashMap;
use std::time::Instant;

/// Handler for one message tag. The sender id is always passed explicitly.
pub type Handler<S, R> = fn(&mut ConnectionManager<S, R>, u32, ServerBound, Instant);

pub struct ConnectionManager<S: PersistenceStore, R: RpcChannel> {
    store: S,
    channel: R,
    world: World,
    connections: ConnectionTable,
    gate: AuthenticationGate,
    players: PlayerDirectory,
    broadcaster: WorldStateBroadcaster,
    handlers: HashMap<MessageTag, Handler<S, R>>,
    max_object_distance: f32,
    started: Instant,
}

impl<S: PersistenceStore, R: RpcChannel> ConnectionManager<S, R> {
    pub fn new(config: &ServerConfig, store: S, channel: R, world: World, now: Instant) -> Self {
        let mut handlers: HashMap<MessageTag, Handler<S, R>> = HashMap::new();
        handlers.insert(MessageTag::Authenticate, Self::on_authenticate);
        handlers.insert(MessageTag::WorldLoaded, Self::on_world_loaded);
        handlers.insert(MessageTag::ObjectsInitialized, Self::on_objects_initialized);
        handlers.insert(MessageTag::Activate, Self::on_activate);
        handlers.insert(MessageTag::SaveCharacter, Self::on_save_character);

        Self {
            store,
            channel,
            world,
            connections: ConnectionTable::new(),
            gate: AuthenticationGate::new(config.pre_auth_window()),
            players: PlayerDirectory::new(),
            broadcaster: WorldStateBroadcaster::new(config.position_sync_interval()),
            handlers,
            max_object_distance: config.max_object_distance,
            started: now,
        }
    }

    /// Replaces or adds the handler for `tag`.
    pub fn register(&mut self, tag: MessageTag, handler: Handler<S, R>) {
        self.handlers.insert(tag, handler);
    }

    /// Removes the handler for `tag`; messages with that tag are then ignored.
    pub fn unregister(&mut self, tag: MessageTag) -> bool {
        self.handlers.remove(&tag).is_some()
    }

    pub fn on_connect(&mut self, id: u32, now: Instant) {
        if self.connections.get(id).is_some() {
            warn!("Connection {} reused while still open, cleaning up", id);
            self.on_disconnect(id);
        }

        info!("Client {} connected", id);
        self.connections.open(id, now);
        self.connections.transition(id, ConnectionState::PreAuth);
        self.gate.open(id, now);
        self.channel.send(id, ClientBound::BeginAuth);
    }

    /// Drops every trace of `id`. Returns false if it was already gone.
    pub fn on_disconnect(&mut self, id: u32) -> bool {
        self.players.remove(id);
        self.gate.cancel(id);
        self.broadcaster.forget(id);

        match self.connections.close(id) {
            Some(_) => {
                info!("Client {} disconnected", id);
                true
            }
            None => false,
        }
    }

    pub fn force_disconnect(&mut self, id: u32, reason: DisconnectReason) {
        if self.connections.get(id).is_none() {
            debug!("Ignoring disconnect of unknown client {} ({})", id, reason);
            return;
        }

        info!("Client {} disconnect reason: {}", id, reason);
        self.channel.send(
            id,
            ClientBound::ForceDisconnect {
                reason: reason.to_string(),
            },
        );
        self.on_disconnect(id);
        self.channel.terminate(id);
    }

    /// Routes `message` to the handler registered for its tag.
    pub fn dispatch(&mut self, sender: u32, message: ServerBound, now: Instant) {
        if self.connections.get(sender).is_none() {
            warn!("Dropping {:?} from unknown client {}", message.tag(), sender);
            return;
        }

        match self.handlers.get(&message.tag()).copied() {
            Some(handler) => handler(self, sender, message, now),
            None => debug!("No handler for {:?}, ignoring", message.tag()),
        }
    }

    /// Fires expired pre-auth timers, then runs due player-list syncs.
    pub fn tick(&mut self, now: Instant) {
        for id in self.gate.expired(now) {
            if self.connections.state(id) == Some(ConnectionState::PreAuth) {
                self.force_disconnect(id, DisconnectReason::AuthTimeout);
            } else {
                debug!("Stale pre-auth timer for {}", id);
            }
        }

        let timestamp = self.timestamp(now);
        for id in self.broadcaster.due_syncs(now) {
            if self.connections.state(id) != Some(ConnectionState::Active) {
                self.broadcaster.stop_sync(id);
                continue;
            }
            if let Err(e) =
                self.broadcaster
                    .sync_player_list(id, &self.players, timestamp, &mut self.channel)
            {
                error!("Player list sync for {} failed: {}", id, e);
            }
        }
    }

    /// Milliseconds since the manager was created.
    pub fn timestamp(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.started).as_millis() as u64
    }

    /// Initialized players within simulation distance of `point`.
    pub fn players_near(&self, point: &Vec3) -> Vec<u32> {
        self.connections
            .ids_in(ConnectionState::Active)
            .into_iter()
            .filter(|id| {
                self.players
                    .get(*id)
                    .is_some_and(|player| player.simulates(point, self.max_object_distance))
            })
            .collect()
    }

    fn on_authenticate(&mut self, sender: u32, message: ServerBound, now: Instant) {
        if let ServerBound::Authenticate { token } = message {
            self.authenticate(sender, token.as_deref(), now);
        }
    }

    fn on_world_loaded(&mut self, sender: u32, message: ServerBound, _now: Instant) {
        if let ServerBound::WorldLoaded { character_id } = message {
            self.world_loaded(sender, character_id);
        }
    }

    fn on_objects_initialized(&mut self, sender: u32, _message: ServerBound, _now: Instant) {
        info!("Client {} finished loading world objects", sender);
    }

    fn on_activate(&mut self, sender: u32, _message: ServerBound, _now: Instant) {
        let activated = match self.world.map() {
            Some(map) => self.players.activate(sender, map),
            None => false,
        };
        if !activated {
            debug!("Ignoring activate from {} without a player", sender);
        }
    }

    fn on_save_character(&mut self, sender: u32, message: ServerBound, _now: Instant) {
        if let ServerBound::SaveCharacter { character_id, body } = message {
            self.save_character(sender, character_id, body);
        }
    }

    fn authenticate(&mut self, sender: u32, token: Option<&str>, now: Instant) {
        info!("Client {} trying to authenticate", sender);

        let in_pre_auth = self.connections.state(sender) == Some(ConnectionState::PreAuth);
        let credential = match self.gate.admit(
            sender,
            token,
            &self.store,
            self.world.is_ready(),
            in_pre_auth,
        ) {
            Ok(credential) => credential,
            Err(reason) => {
                self.force_disconnect(sender, reason);
                return;
            }
        };

        let Some(map) = self.world.map().cloned() else {
            self.force_disconnect(sender, DisconnectReason::ServerNotReady);
            return;
        };

        self.connections
            .transition(sender, ConnectionState::Authenticated);
        info!("Client {} authenticated as {}", sender, credential.id);

        let timestamp = self.timestamp(now);
        let player =
            self.players
                .create_player(sender, credential.id, &map, timestamp, &mut self.channel);
        let (position, rotation) = (player.position, player.rotation);

        self.connections.transition(sender, ConnectionState::Active);
        self.broadcaster.start_sync(sender, now);

        self.channel.send(
            sender,
            ClientBound::Handshake {
                map_id: map.id,
                position,
                rotation,
            },
        );
    }

    fn world_loaded(&mut self, sender: u32, character_id: i64) {
        if self.connections.state(sender) != Some(ConnectionState::Active) {
            warn!("Client {} reported world loaded before spawning", sender);
            return;
        }
        if self.broadcaster.world_sent(sender) {
            warn!("Client {} reported world loaded twice, ignoring", sender);
            return;
        }

        info!("Client {} loaded the world, character {}", sender, character_id);

        match self
            .broadcaster
            .send_world_init(sender, character_id, &self.store, &mut self.channel)
        {
            Ok(count) => info!("Sent {} world objects to client {}", count, sender),
            Err(BroadcastError::Disconnect(reason)) => self.force_disconnect(sender, reason),
            Err(e) => error!("World init for client {} failed: {}", sender, e),
        }
    }

    // The character id is not checked against the sender's account.
    fn save_character(&mut self, sender: u32, character_id: i64, body: String) {
        if !self.players.contains(sender) {
            debug!("Ignoring save from {} without a player", sender);
            return;
        }

        info!("Client {} saving character {}", sender, character_id);

        match self.store.update_character(CharacterSnapshot {
            id: character_id,
            body,
        }) {
            Ok(true) => debug!("Character {} saved", character_id),
            Ok(false) => debug!("Character {} does not exist, save ignored", character_id),
            Err(e) => error!("Failed to save character {}: {}", character_id, e),
        }
    }

    /// Closes the store. Call once when the server stops.
    pub fn shutdown(&mut self) -> Result<(), StoreError> {
        info!(
            "Shutting down with {} connections, {} players",
            self.connections.len(),
            self.players.len()
        );
        self.store.close()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn channel(&self) -> &R {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut R {
        &mut self.channel
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn players(&self) -> &PlayerDirectory {
        &self.players
    }

    pub fn gate(&self) -> &AuthenticationGate {
        &self.gate
    }

    pub fn broadcaster(&self) -> &WorldStateBroadcaster {
        &self.broadcaster
    }
}
