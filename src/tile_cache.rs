//! LRU cache of resident tiles over a disk-backed grid.
//!
//! Presents the grid as a random-access array of nodes while keeping only a
//! bounded working set in RAM. Emits `tracing` events on every residency
//! state transition; the library itself never installs a subscriber, that
//! is the embedding binary's job.

use std::collections::HashMap;

use tracing::debug;

use crate::backing_store::{BackingStore, BackingStoreMeta};
use crate::config::GridConfig;
use crate::error::CubeError;
use crate::node::Node;
use crate::tile::{Tile, TileKey};

/// Presents a bounded-RAM, disk-backed view of the full node grid.
pub struct TileCache {
    rows: usize,
    cols: usize,
    tile_side: usize,
    capacity: usize,
    resident: HashMap<TileKey, Tile>,
    store: BackingStore,
    clock: u64,
}

impl TileCache {
    /// Opens the backing store directory (creating it if necessary) and
    /// writes fresh metadata for `config`. Use [`TileCache::reopen`]
    /// instead when resuming a previously-finalised grid.
    pub fn new(config: &GridConfig) -> Result<Self, CubeError> {
        let store = BackingStore::open_or_create(&config.backing_store_dir)?;
        store.write_metadata(&BackingStoreMeta::from(config))?;
        Ok(Self {
            rows: config.rows,
            cols: config.cols,
            tile_side: config.tile_side,
            capacity: config.cache_capacity_tiles,
            resident: HashMap::new(),
            store,
            clock: 0,
        })
    }

    /// Reopens an existing backing store without rewriting metadata,
    /// trusting the directory's own `meta.txt` (produced by a prior
    /// [`TileCache::finalise`]). Used by the persistence round-trip tests
    /// and by any caller resuming a paused survey.
    pub fn reopen(config: &GridConfig) -> Result<Self, CubeError> {
        let store = BackingStore::open_or_create(&config.backing_store_dir)?;
        if store.read_metadata()?.is_none() {
            store.write_metadata(&BackingStoreMeta::from(config))?;
        }
        Ok(Self {
            rows: config.rows,
            cols: config.cols,
            tile_side: config.tile_side,
            capacity: config.cache_capacity_tiles,
            resident: HashMap::new(),
            store,
            clock: 0,
        })
    }

    fn tile_key_for(&self, row: usize, col: usize) -> TileKey {
        TileKey {
            tile_row: row / self.tile_side,
            tile_col: col / self.tile_side,
        }
    }

    fn local_coords(&self, row: usize, col: usize) -> (usize, usize) {
        (row % self.tile_side, col % self.tile_side)
    }

    /// Ensures the tile containing `(row, col)` is resident, loading it
    /// from the backing store (or creating it fresh if never persisted) on
    /// miss, evicting under capacity pressure first if necessary.
    fn ensure_resident(&mut self, key: TileKey) -> Result<(), CubeError> {
        if self.resident.contains_key(&key) {
            return Ok(());
        }

        if self.resident.len() >= self.capacity {
            self.evict_one()?;
        }

        let tile = match self.store.read_tile(key, self.tile_side)? {
            Some(tile) => {
                debug!(tile_row = key.tile_row, tile_col = key.tile_col, "tile loaded from backing store");
                tile
            }
            None => {
                debug!(tile_row = key.tile_row, tile_col = key.tile_col, "tile created fresh (never persisted)");
                Tile::new_empty(key.tile_row * self.tile_side, key.tile_col * self.tile_side, self.tile_side, 0)
            }
        };
        self.resident.insert(key, tile);
        Ok(())
    }

    /// Evicts the least-recently-used clean tile, or, if every resident
    /// tile is dirty, writes and evicts the least-recently-used tile.
    fn evict_one(&mut self) -> Result<(), CubeError> {
        let clean_victim = self
            .resident
            .iter()
            .filter(|(_, t)| !t.dirty)
            .min_by_key(|(_, t)| t.last_used)
            .map(|(k, _)| *k);

        let victim_key = match clean_victim {
            Some(k) => k,
            None => self
                .resident
                .iter()
                .min_by_key(|(_, t)| t.last_used)
                .map(|(k, _)| *k)
                .expect("evict_one called on an empty cache"),
        };

        let tile = self.resident.remove(&victim_key).unwrap();
        if tile.dirty {
            self.store.write_tile(&tile)?;
            debug!(tile_row = victim_key.tile_row, tile_col = victim_key.tile_col, "dirty tile written on eviction");
        } else {
            debug!(tile_row = victim_key.tile_row, tile_col = victim_key.tile_col, "clean tile evicted");
        }
        Ok(())
    }

    /// Read-only node access. Does not mark the containing tile dirty.
    pub fn get_node(&mut self, row: usize, col: usize) -> Result<&Node, CubeError> {
        debug_assert!(row < self.rows && col < self.cols);
        let key = self.tile_key_for(row, col);
        self.ensure_resident(key)?;
        self.clock += 1;
        let clock = self.clock;
        let (local_row, local_col) = self.local_coords(row, col);
        let tile = self.resident.get_mut(&key).expect("just ensured resident");
        tile.last_used = clock;
        Ok(tile.node(local_row, local_col))
    }

    /// Writable node access. Marks the containing tile dirty.
    pub fn get_node_mut(&mut self, row: usize, col: usize) -> Result<&mut Node, CubeError> {
        debug_assert!(row < self.rows && col < self.cols);
        let key = self.tile_key_for(row, col);
        self.ensure_resident(key)?;
        self.clock += 1;
        let clock = self.clock;
        let (local_row, local_col) = self.local_coords(row, col);
        let tile = self.resident.get_mut(&key).expect("just ensured resident");
        tile.last_used = clock;
        tile.dirty = true;
        Ok(tile.node_mut(local_row, local_col))
    }

    /// Writes every dirty resident tile to the backing store, leaving the
    /// cache consistent (every resident tile's backing-store copy equals
    /// its in-RAM copy).
    pub fn flush(&mut self) -> Result<(), CubeError> {
        for tile in self.resident.values_mut() {
            if tile.dirty {
                self.store.write_tile(tile)?;
                tile.dirty = false;
            }
        }
        Ok(())
    }

    /// Flush plus closing the backing store. Consumes the cache: no
    /// further access is possible without reopening via
    /// [`TileCache::reopen`].
    pub fn finalise(mut self) -> Result<(), CubeError> {
        self.flush()
    }

    pub fn resident_tile_count(&self) -> usize {
        self.resident.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}
