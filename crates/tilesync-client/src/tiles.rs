//! Tile index -- stable lookup between rendering tile ids and protocol ids.
//!
//! The renderer names tiles with opaque strings; the protocol uses integers.
//! The index is built once at load time and never changes for the session.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::TileId;

#[derive(Debug, thiserror::Error)]
pub enum TileIndexError {
    #[error("duplicate tile {0:?}")]
    DuplicateTile(String),
    #[error("duplicate tile id {0}")]
    DuplicateId(TileId),
    #[error("too many tiles for the id space")]
    TooManyTiles,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct TileIndex {
    by_name: HashMap<String, TileId>,
    by_id: BTreeMap<TileId, String>,
}

/// On-disk form: an ordered list (position is the id) or explicit pairs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndexFile {
    Ordered { tiles: Vec<String> },
    Pairs { pairs: Vec<TilePair> },
}

#[derive(Debug, Deserialize)]
struct TilePair {
    tile: String,
    id: TileId,
}

impl TileIndex {
    /// Assign ids by position.
    pub fn from_ids<I, S>(tiles: I) -> Result<Self, TileIndexError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pairs = Vec::new();
        for (position, tile) in tiles.into_iter().enumerate() {
            let id = TileId::try_from(position).map_err(|_| TileIndexError::TooManyTiles)?;
            pairs.push((tile.into(), id));
        }
        Self::from_pairs(pairs)
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, TileIndexError>
    where
        I: IntoIterator<Item = (S, TileId)>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for (tile, id) in pairs {
            let tile = tile.into();
            if index.by_id.contains_key(&id) {
                return Err(TileIndexError::DuplicateId(id));
            }
            if index.by_name.contains_key(&tile) {
                return Err(TileIndexError::DuplicateTile(tile));
            }
            index.by_name.insert(tile.clone(), id);
            index.by_id.insert(id, tile);
        }
        Ok(index)
    }

    pub fn from_json(json: &str) -> Result<Self, TileIndexError> {
        match serde_json::from_str(json)? {
            IndexFile::Ordered { tiles } => Self::from_ids(tiles),
            IndexFile::Pairs { pairs } => Self::from_pairs(pairs.into_iter().map(|p| (p.tile, p.id))),
        }
    }

    pub fn load(path: &Path) -> Result<Self, TileIndexError> {
        let index = Self::from_json(&std::fs::read_to_string(path)?)?;
        tracing::info!(path = %path.display(), tiles = index.len(), "loaded tile index");
        Ok(index)
    }

    pub fn id_of(&self, tile: &str) -> Option<TileId> {
        self.by_name.get(tile).copied()
    }

    pub fn tile_of(&self, id: TileId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
