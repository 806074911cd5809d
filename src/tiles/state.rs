use crate::core::geo::TileKey;
use crate::prelude::HashMap;

/// Loading state of a single tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Tile record tracked by the control thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub key: TileKey,
    pub state: TileState,
}

impl Tile {
    pub fn new(key: TileKey) -> Self {
        Self {
            key,
            state: TileState::Idle,
        }
    }
}

/// Tile-state store for one tile source, keyed by [`TileKey`]
#[derive(Debug, Default)]
pub struct TileStore {
    tiles: HashMap<TileKey, Tile>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the record for `key`, creating an idle one on first use
    pub fn get_or_create(&mut self, key: TileKey) -> &mut Tile {
        self.tiles.entry(key).or_insert_with(|| Tile::new(key))
    }

    pub fn get(&self, key: &TileKey) -> Option<&Tile> {
        self.tiles.get(key)
    }

    pub fn state(&self, key: &TileKey) -> Option<TileState> {
        self.get(key).map(|tile| tile.state)
    }

    pub fn set_state(&mut self, key: TileKey, state: TileState) {
        self.get_or_create(key).state = state;
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
