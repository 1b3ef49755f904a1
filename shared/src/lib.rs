use serde::{Deserialize, Serialize};

pub mod codec;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Position or euler rotation in world space.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Persistent non-player entity, bulk-exported to joining clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WorldObject {
    pub id: i64,
    pub state: String,
}

/// Saved character row. The body is opaque to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CharacterSnapshot {
    pub id: i64,
    pub body: String,
}

/// One remote player as seen by a periodic sync.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSyncItem {
    pub player_id: u32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub timestamp: u64,
}

/// Routing key for server-bound RPCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    Authenticate,
    WorldLoaded,
    ObjectsInitialized,
    Activate,
    SaveCharacter,
}

/// RPCs a client may call on the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerBound {
    Authenticate { token: Option<String> },
    WorldLoaded { character_id: i64 },
    ObjectsInitialized,
    Activate,
    SaveCharacter { character_id: i64, body: String },
}

impl ServerBound {
    pub fn tag(&self) -> MessageTag {
        match self {
            ServerBound::Authenticate { .. } => MessageTag::Authenticate,
            ServerBound::WorldLoaded { .. } => MessageTag::WorldLoaded,
            ServerBound::ObjectsInitialized => MessageTag::ObjectsInitialized,
            ServerBound::Activate => MessageTag::Activate,
            ServerBound::SaveCharacter { .. } => MessageTag::SaveCharacter,
        }
    }
}

/// RPCs the server calls on a client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientBound {
    BeginAuth,
    Handshake {
        map_id: String,
        position: Vec3,
        rotation: Vec3,
    },
    ForceDisconnect {
        reason: String,
    },
    PuppetCreated {
        entity_id: u32,
        timestamp: u64,
        position: Vec3,
        rotation: Vec3,
    },
    /// `objects` is a compressed `Vec<WorldObject>`, `character` the JSON row.
    WorldInit {
        objects: Vec<u8>,
        character: String,
    },
    /// `players` is a compressed `Vec<PlayerSyncItem>`.
    PlayerList {
        players: Vec<u8>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect { client_version: u32 },
    Heartbeat,
    Disconnect,

    Connected { client_id: u32 },
    Rejected { reason: String },

    ServerBound(ServerBound),
    ClientBound(ClientBound),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vec3_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 12.0);
        assert_approx_eq!(a.distance(&b), 13.0, 0.0001);
        assert_approx_eq!(b.distance(&a), 13.0, 0.0001);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_vec3_display() {
        assert_eq!(Vec3::new(1.0, -2.5, 0.125).to_string(), "(1.00, -2.50, 0.13)");
    }

    #[test]
    fn test_message_tags() {
        let cases = vec![
            (ServerBound::Authenticate { token: None }, MessageTag::Authenticate),
            (ServerBound::WorldLoaded { character_id: 1 }, MessageTag::WorldLoaded),
            (ServerBound::ObjectsInitialized, MessageTag::ObjectsInitialized),
            (ServerBound::Activate, MessageTag::Activate),
            (
                ServerBound::SaveCharacter {
                    character_id: 3,
                    body: "X".to_string(),
                },
                MessageTag::SaveCharacter,
            ),
        ];

        for (message, tag) in cases {
            assert_eq!(message.tag(), tag);
        }
    }

    #[test]
    fn test_packet_serialization_authenticate() {
        let packet = Packet::ServerBound(ServerBound::Authenticate {
            token: Some("abc".to_string()),
        });
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::ServerBound(ServerBound::Authenticate { token }) => {
                assert_eq!(token.as_deref(), Some("abc"))
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_missing_token() {
        let packet = Packet::ServerBound(ServerBound::Authenticate { token: None });
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_packet_serialization_handshake() {
        let packet = Packet::ClientBound(ClientBound::Handshake {
            map_id: "level".to_string(),
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, 90.0, 0.0),
        });

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::ClientBound(ClientBound::Handshake {
                map_id,
                position,
                rotation,
            }) => {
                assert_eq!(map_id, "level");
                assert_approx_eq!(position.z, 3.0, 0.0001);
                assert_approx_eq!(rotation.y, 90.0, 0.0001);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
