//! World-init handoff and per-connection player-list sync.
//!
//! Each active connection runs on its own sync schedule; ticks are not
//! barrier-synchronized across connections.

use crate::error::DisconnectReason;
use crate::players::PlayerDirectory;
use crate::rpc::RpcChannel;
use crate::scheduler::TaskScheduler;
use crate::store::PersistenceStore;
use log::{debug, trace};
use shared::codec::{self, CodecError};
use shared::ClientBound;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("{0}")]
    Disconnect(DisconnectReason),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to serialize character: {0}")]
    Character(#[from] serde_json::Error),
}

pub struct WorldStateBroadcaster {
    sync: TaskScheduler,
    interval: Duration,
    /// Connections that already received their world init.
    world_sent: HashSet<u32>,
}

impl WorldStateBroadcaster {
    pub fn new(interval: Duration) -> Self {
        Self {
            sync: TaskScheduler::new(),
            interval,
            world_sent: HashSet::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn start_sync(&mut self, id: u32, now: Instant) {
        self.sync.schedule_every(id, now, self.interval);
    }

    pub fn stop_sync(&mut self, id: u32) -> bool {
        self.sync.cancel(id)
    }

    pub fn is_syncing(&self, id: u32) -> bool {
        self.sync.is_pending(id)
    }

    pub fn due_syncs(&mut self, now: Instant) -> Vec<u32> {
        self.sync.due(now)
    }

    pub fn world_sent(&self, id: u32) -> bool {
        self.world_sent.contains(&id)
    }

    /// Drops the sync schedule and world-init marker of a departed connection.
    pub fn forget(&mut self, id: u32) {
        self.sync.cancel(id);
        self.world_sent.remove(&id);
    }

    /// Sends the compressed world-object list and the JSON character row.
    /// Returns the number of objects sent.
    pub fn send_world_init<S: PersistenceStore, R: RpcChannel>(
        &mut self,
        id: u32,
        character_id: i64,
        store: &S,
        channel: &mut R,
    ) -> Result<usize, BroadcastError> {
        let character = store
            .character(character_id)
            .ok_or(BroadcastError::Disconnect(DisconnectReason::CharacterNotFound))?;

        let objects = store.world_objects();
        let packed = codec::compress(&objects)?;
        let character = serde_json::to_string(&character)?;

        debug!(
            "World init for {}: {} objects, {} compressed bytes",
            id,
            objects.len(),
            packed.len()
        );

        channel.send(
            id,
            ClientBound::WorldInit {
                objects: packed,
                character,
            },
        );
        self.world_sent.insert(id);
        Ok(objects.len())
    }

    /// Sends `id` the positions of every other player.
    pub fn sync_player_list<R: RpcChannel>(
        &self,
        id: u32,
        players: &PlayerDirectory,
        timestamp: u64,
        channel: &mut R,
    ) -> Result<usize, BroadcastError> {
        let list = players.list_excluding(id, timestamp);
        let packed = codec::compress(&list)?;

        trace!("Player list for {}: {} entries", id, list.len());

        channel.send(id, ClientBound::PlayerList { players: packed });
        Ok(list.len())
    }
}
