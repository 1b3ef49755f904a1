//! Registry of spawned player entities, keyed by connection id.

use crate::rpc::RpcChannel;
use crate::world::MapInfo;
use log::info;
use shared::{ClientBound, PlayerSyncItem, Vec3};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntity {
    /// Same as the owning connection id.
    pub network_id: u32,
    pub auth_id: i64,
    pub position: Vec3,
    pub rotation: Vec3,
    /// Set once the client has loaded the world and been placed at spawn.
    pub initialized: bool,
}

impl PlayerEntity {
    pub fn new(network_id: u32, auth_id: i64) -> Self {
        Self {
            network_id,
            auth_id,
            position: Vec3::zero(),
            rotation: Vec3::zero(),
            initialized: false,
        }
    }

    pub fn teleport(&mut self, position: Vec3, rotation: Vec3) {
        self.position = position;
        self.rotation = rotation;
    }

    /// Only initialized players take part in distance-based simulation.
    pub fn simulates(&self, point: &Vec3, max_distance: f32) -> bool {
        self.initialized && self.position.distance(point) <= max_distance
    }
}

#[derive(Debug, Default)]
pub struct PlayerDirectory {
    players: HashMap<u32, PlayerEntity>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns an entity for `id` at the map's spawn point and announces the
    /// new puppet to every connected client, owner included.
    pub fn create_player<R: RpcChannel>(
        &mut self,
        id: u32,
        auth_id: i64,
        map: &MapInfo,
        timestamp: u64,
        channel: &mut R,
    ) -> &PlayerEntity {
        let mut player = PlayerEntity::new(id, auth_id);
        player.teleport(map.spawn_position, map.spawn_rotation);

        info!(
            "Created player {} (auth {}) at {}",
            id, auth_id, player.position
        );

        channel.broadcast(ClientBound::PuppetCreated {
            entity_id: id,
            timestamp,
            position: player.position,
            rotation: player.rotation,
        });

        self.players.insert(id, player);
        &self.players[&id]
    }

    /// Moves the player back to spawn and marks it initialized. Returns false
    /// when `id` owns no entity.
    pub fn activate(&mut self, id: u32, map: &MapInfo) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.teleport(map.spawn_position, map.spawn_rotation);
                player.initialized = true;
                info!("Activated player {}", id);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u32) -> Option<PlayerEntity> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!("Removed player {}", id);
        }
        removed
    }

    /// Every other player, stamped with `timestamp`, ordered by id.
    pub fn list_excluding(&self, id: u32, timestamp: u64) -> Vec<PlayerSyncItem> {
        let mut list: Vec<PlayerSyncItem> = self
            .players
            .values()
            .filter(|player| player.network_id != id)
            .map(|player| PlayerSyncItem {
                player_id: player.network_id,
                position: player.position,
                rotation: player.rotation,
                timestamp,
            })
            .collect();
        list.sort_by_key(|item| item.player_id);
        list
    }

    pub fn get(&self, id: u32) -> Option<&PlayerEntity> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut PlayerEntity> {
        self.players.get_mut(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.players.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Outbound;
    use assert_approx_eq::assert_approx_eq;

    fn map() -> MapInfo {
        MapInfo::new("level", Vec3::new(4.0, 1.0, -2.0), Vec3::new(0.0, 90.0, 0.0))
    }

    #[test]
    fn test_create_player_at_spawn() {
        let mut directory = PlayerDirectory::new();
        let mut channel: Vec<Outbound> = Vec::new();

        let player = directory.create_player(5, 7, &map(), 1_000, &mut channel);
        assert_eq!(player.network_id, 5);
        assert_eq!(player.auth_id, 7);
        assert!(!player.initialized);
        assert_approx_eq!(player.position.x, 4.0, 0.0001);
        assert_approx_eq!(player.rotation.y, 90.0, 0.0001);
        assert!(directory.contains(5));
    }

    #[test]
    fn test_create_player_replaces_existing_entity() {
        let mut directory = PlayerDirectory::new();
        let mut channel: Vec<Outbound> = Vec::new();
        directory.create_player(5, 7, &map(), 0, &mut channel);
        directory.activate(5, &map());

        let player = directory.create_player(5, 9, &map(), 0, &mut channel);
        assert_eq!(player.auth_id, 9);
        assert!(!player.initialized);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_create_player_broadcasts_puppet() {
        let mut directory = PlayerDirectory::new();
        let mut channel: Vec<Outbound> = Vec::new();
        directory.create_player(5, 7, &map(), 1_000, &mut channel);

        assert_eq!(
            channel,
            vec![Outbound::Broadcast {
                message: ClientBound::PuppetCreated {
                    entity_id: 5,
                    timestamp: 1_000,
                    position: Vec3::new(4.0, 1.0, -2.0),
                    rotation: Vec3::new(0.0, 90.0, 0.0),
                }
            }]
        );
    }

    #[test]
    fn test_activate_resets_to_spawn() {
        let mut directory = PlayerDirectory::new();
        let mut channel: Vec<Outbound> = Vec::new();
        directory.create_player(5, 7, &map(), 0, &mut channel);
        directory
            .get_mut(5)
            .unwrap()
            .teleport(Vec3::new(100.0, 0.0, 0.0), Vec3::zero());

        assert!(directory.activate(5, &map()));
        let player = directory.get(5).unwrap();
        assert!(player.initialized);
        assert_eq!(player.position, Vec3::new(4.0, 1.0, -2.0));
    }

    #[test]
    fn test_activate_unknown_is_ignored() {
        let mut directory = PlayerDirectory::new();
        assert!(!directory.activate(42, &map()));
        assert!(directory.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut directory = PlayerDirectory::new();
        let mut channel: Vec<Outbound> = Vec::new();
        directory.create_player(5, 7, &map(), 0, &mut channel);

        assert!(directory.remove(5).is_some());
        assert!(directory.remove(5).is_none());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_list_excluding_skips_self() {
        let mut directory = PlayerDirectory::new();
        let mut channel: Vec<Outbound> = Vec::new();
        for id in [3, 1, 2] {
            directory.create_player(id, id as i64 * 10, &map(), 0, &mut channel);
        }

        let list = directory.list_excluding(2, 777);
        let ids: Vec<u32> = list.iter().map(|item| item.player_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(list.iter().all(|item| item.timestamp == 777));

        assert!(directory.list_excluding(1, 0).iter().all(|i| i.player_id != 1));
    }

    #[test]
    fn test_list_excluding_single_player_is_empty() {
        let mut directory = PlayerDirectory::new();
        let mut channel: Vec<Outbound> = Vec::new();
        directory.create_player(1, 1, &map(), 0, &mut channel);

        assert!(directory.list_excluding(1, 0).is_empty());
        assert_eq!(directory.list_excluding(99, 0).len(), 1);
    }

    #[test]
    fn test_simulation_range_requires_initialized() {
        let mut player = PlayerEntity::new(1, 1);
        let origin = Vec3::zero();
        assert!(!player.simulates(&origin, 10.0));

        player.initialized = true;
        assert!(player.simulates(&origin, 10.0));

        player.teleport(Vec3::new(20.0, 0.0, 0.0), Vec3::zero());
        assert!(!player.simulates(&origin, 10.0));
    }
}
