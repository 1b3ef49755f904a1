use log::info;
use shared::Vec3;

/// Identity and spawn placement of the loaded map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    pub id: String,
    pub spawn_position: Vec3,
    pub spawn_rotation: Vec3,
}

impl MapInfo {
    pub fn new(id: impl Into<String>, spawn_position: Vec3, spawn_rotation: Vec3) -> Self {
        Self {
            id: id.into(),
            spawn_position,
            spawn_rotation,
        }
    }
}

/// The server accepts players only while a map is loaded.
#[derive(Debug, Default)]
pub struct World {
    map: Option<MapInfo>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(map: MapInfo) -> Self {
        let mut world = Self::new();
        world.load_map(map);
        world
    }

    pub fn load_map(&mut self, map: MapInfo) {
        info!("Map '{}' loaded, spawn at {}", map.id, map.spawn_position);
        self.map = Some(map);
        info!("Server is ready");
    }

    pub fn unload_map(&mut self) -> Option<MapInfo> {
        let map = self.map.take();
        if let Some(map) = &map {
            info!("Map '{}' unloaded", map.id);
        }
        map
    }

    pub fn map(&self) -> Option<&MapInfo> {
        self.map.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.map.is_some()
    }
}
