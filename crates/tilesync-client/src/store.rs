//! Ownership store -- the consumer-owned `tile -> country` mapping.

use crate::tiles::TileIndex;
use crate::{CountryCode, Ownerships, TileId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipStore {
    bindings: Ownerships,
}

impl OwnershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything and take the snapshot as the new state.
    pub fn replace(&mut self, snapshot: Ownerships) {
        self.bindings = snapshot;
    }

    /// Apply one update. Last applied wins; returns the previous owner.
    pub fn apply(&mut self, tile_id: TileId, country_id: CountryCode) -> Option<CountryCode> {
        self.bindings.insert(tile_id, country_id)
    }

    pub fn owner(&self, tile_id: TileId) -> Option<&str> {
        self.bindings.get(&tile_id).map(String::as_str)
    }

    /// Owner of a rendering tile, resolved through the index.
    pub fn owner_of(&self, index: &TileIndex, tile: &str) -> Option<&str> {
        index.id_of(tile).and_then(|id| self.owner(id))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &str)> {
        self.bindings.iter().map(|(id, c)| (*id, c.as_str()))
    }

    pub fn snapshot(&self) -> Ownerships {
        self.bindings.clone()
    }
}
