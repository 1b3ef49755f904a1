//! Key-indexed persistence for credentials, characters and world objects.
//!
//! The store is opened once at startup and handed to the connection manager;
//! nothing reaches it through global state. Each call is atomic on its own and
//! `update_character` is last-write-wins.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::{CharacterSnapshot, WorldObject};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An issued access token for one account.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: i64,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("store file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait PersistenceStore {
    fn credential_by_token(&self, token: &str) -> Option<Credential>;

    fn character(&self, id: i64) -> Option<CharacterSnapshot>;

    /// Replaces the body of an existing row. Returns `Ok(false)` and leaves
    /// the store untouched when no row has this id.
    fn update_character(&mut self, snapshot: CharacterSnapshot) -> Result<bool, StoreError>;

    fn world_objects(&self) -> Vec<WorldObject>;

    fn insert_credential(&mut self, credential: Credential) -> Result<(), StoreError>;

    fn insert_character(&mut self, snapshot: CharacterSnapshot) -> Result<(), StoreError>;

    fn insert_world_object(&mut self, object: WorldObject) -> Result<(), StoreError>;

    fn close(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    credentials: BTreeMap<i64, Credential>,
    characters: BTreeMap<i64, CharacterSnapshot>,
    world_objects: BTreeMap<i64, WorldObject>,
}

/// Table store backed by a single JSON document.
pub struct Database {
    tables: Tables,
    path: Option<PathBuf>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            tables: Tables::default(),
            path: None,
        }
    }

    /// Loads the document at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Tables::default()
        };

        info!(
            "Opened database at {} ({} credentials, {} characters, {} world objects)",
            path.display(),
            tables.credentials.len(),
            tables.characters.len(),
            tables.world_objects.len()
        );

        Ok(Self {
            tables,
            path: Some(path),
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&self.tables)?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, contents)?;
        fs::rename(&staging, path)?;
        debug!("Flushed database to {}", path.display());
        Ok(())
    }
}

impl PersistenceStore for Database {
    fn credential_by_token(&self, token: &str) -> Option<Credential> {
        self.tables
            .credentials
            .values()
            .find(|credential| credential.token == token)
            .cloned()
    }

    fn character(&self, id: i64) -> Option<CharacterSnapshot> {
        self.tables.characters.get(&id).cloned()
    }

    fn update_character(&mut self, snapshot: CharacterSnapshot) -> Result<bool, StoreError> {
        match self.tables.characters.get_mut(&snapshot.id) {
            Some(row) => {
                row.body = snapshot.body;
                self.flush()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn world_objects(&self) -> Vec<WorldObject> {
        self.tables.world_objects.values().cloned().collect()
    }

    fn insert_credential(&mut self, credential: Credential) -> Result<(), StoreError> {
        self.tables.credentials.insert(credential.id, credential);
        self.flush()
    }

    fn insert_character(&mut self, snapshot: CharacterSnapshot) -> Result<(), StoreError> {
        self.tables.characters.insert(snapshot.id, snapshot);
        self.flush()
    }

    fn insert_world_object(&mut self, object: WorldObject) -> Result<(), StoreError> {
        self.tables.world_objects.insert(object.id, object);
        self.flush()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.flush()?;
        if let Some(path) = self.path.take() {
            info!("Closed database at {}", path.display());
        }
        Ok(())
    }
}
