//! Authoritative record of every live connection and where it is in the
//! admission state machine.

use log::debug;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    PreAuth,
    Authenticated,
    Active,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub id: u32,
    pub state: ConnectionState,
    pub joined_at: Instant,
}

impl ConnectionRecord {
    pub fn new(id: u32, joined_at: Instant) -> Self {
        Self {
            id,
            state: ConnectionState::Connecting,
            joined_at,
        }
    }
}

/// One record per live connection, keyed by the transport-assigned id.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    records: HashMap<u32, ConnectionRecord>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh record in `Connecting`. An id still in the table is
    /// replaced, since the transport only reuses ids after a disconnect.
    pub fn open(&mut self, id: u32, now: Instant) {
        self.records.insert(id, ConnectionRecord::new(id, now));
    }

    pub fn get(&self, id: u32) -> Option<&ConnectionRecord> {
        self.records.get(&id)
    }

    pub fn state(&self, id: u32) -> Option<ConnectionState> {
        self.records.get(&id).map(|record| record.state)
    }

    /// Returns false if there is no record for `id`.
    pub fn transition(&mut self, id: u32, state: ConnectionState) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                debug!("Connection {} {:?} -> {:?}", id, record.state, state);
                record.state = state;
                true
            }
            None => false,
        }
    }

    /// Removes the record, returning it marked `Disconnected`.
    pub fn close(&mut self, id: u32) -> Option<ConnectionRecord> {
        self.records.remove(&id).map(|mut record| {
            record.state = ConnectionState::Disconnected;
            record
        })
    }

    pub fn ids_in(&self, state: ConnectionState) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .records
            .values()
            .filter(|record| record.state == state)
            .map(|record| record.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
