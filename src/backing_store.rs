//! On-disk representation of tiles not currently resident in RAM.
//!
//! One directory per grid: an ASCII `meta.txt` key=value metadata file, and
//! one binary file per persisted tile, named by tile row/column. All
//! multi-byte fields are explicit little-endian, written via `byteorder`.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config::{CubeParams, GridConfig};
use crate::error::CubeError;
use crate::hypothesis::Hypothesis;
use crate::node::Node;
use crate::tile::{Tile, TileKey};

const TILE_FORMAT_VERSION: u8 = 2;
const META_FORMAT_VERSION: u32 = 1;

/// Grid geometry as persisted in `meta.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackingStoreMeta {
    pub version: u32,
    pub rows: usize,
    pub cols: usize,
    pub node_spacing: f64,
    pub origin_east: f64,
    pub origin_north: f64,
    pub tile_side: usize,
}

impl From<&GridConfig> for BackingStoreMeta {
    fn from(config: &GridConfig) -> Self {
        Self {
            version: META_FORMAT_VERSION,
            rows: config.rows,
            cols: config.cols,
            node_spacing: config.node_spacing,
            origin_east: config.origin_east,
            origin_north: config.origin_north,
            tile_side: config.tile_side,
        }
    }
}

/// The directory-backed store of persisted tiles for one grid.
#[derive(Debug, Clone)]
pub struct BackingStore {
    dir: PathBuf,
}

impl BackingStore {
    /// Opens (creating if necessary) the backing-store directory.
    pub fn open_or_create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.txt")
    }

    fn tile_path(&self, key: TileKey) -> PathBuf {
        self.dir
            .join(format!("tile_{}_{}.bin", key.tile_row, key.tile_col))
    }

    pub fn write_metadata(&self, meta: &BackingStoreMeta) -> io::Result<()> {
        let mut f = BufWriter::new(File::create(self.meta_path())?);
        writeln!(f, "version = {}", meta.version)?;
        writeln!(f, "rows = {}", meta.rows)?;
        writeln!(f, "cols = {}", meta.cols)?;
        writeln!(f, "node_spacing = {}", meta.node_spacing)?;
        writeln!(f, "origin_east = {}", meta.origin_east)?;
        writeln!(f, "origin_north = {}", meta.origin_north)?;
        writeln!(f, "tile_side = {}", meta.tile_side)?;
        f.flush()
    }

    pub fn read_metadata(&self) -> io::Result<Option<BackingStoreMeta>> {
        let path = self.meta_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let mut version = META_FORMAT_VERSION;
        let mut rows = 0usize;
        let mut cols = 0usize;
        let mut node_spacing = 0.0f64;
        let mut origin_east = 0.0f64;
        let mut origin_north = 0.0f64;
        let mut tile_side = 0usize;

        for line in contents.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "version" => version = value.parse().unwrap_or(version),
                "rows" => rows = value.parse().unwrap_or(0),
                "cols" => cols = value.parse().unwrap_or(0),
                "node_spacing" => node_spacing = value.parse().unwrap_or(0.0),
                "origin_east" => origin_east = value.parse().unwrap_or(0.0),
                "origin_north" => origin_north = value.parse().unwrap_or(0.0),
                "tile_side" => tile_side = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        Ok(Some(BackingStoreMeta {
            version,
            rows,
            cols,
            node_spacing,
            origin_east,
            origin_north,
            tile_side,
        }))
    }

    /// Writes `tile` to its backing file, atomically at tile granularity
    /// (write to a temp file in the same directory, then rename).
    pub fn write_tile(&self, tile: &Tile) -> Result<(), CubeError> {
        let key = tile.key();
        let final_path = self.tile_path(key);
        let tmp_path = final_path.with_extension("bin.tmp");

        {
            let mut w = BufWriter::new(File::create(&tmp_path)?);
            encode_tile(tile, &mut w)?;
            w.flush()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Reads the tile at `key`, or `Ok(None)` if no such tile was ever
    /// persisted (a cache miss on a never-touched tile is not an error;
    /// the cache creates a fresh empty tile in that case).
    pub fn read_tile(&self, key: TileKey, side: usize) -> Result<Option<Tile>, CubeError> {
        let path = self.tile_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut r = BufReader::new(File::open(&path)?);
        let tile = decode_tile(&mut r, side)?;
        Ok(Some(tile))
    }
}

fn encode_tile<W: Write>(tile: &Tile, w: &mut W) -> Result<(), CubeError> {
    let key = tile.key();
    w.write_u32::<LittleEndian>(key.tile_row as u32)?;
    w.write_u32::<LittleEndian>(key.tile_col as u32)?;
    w.write_u32::<LittleEndian>((tile.side * tile.side) as u32)?;
    w.write_u8(TILE_FORMAT_VERSION)?;

    for node in tile.nodes() {
        if node.hypotheses.is_empty() {
            w.write_u8(0)?;
            continue;
        }
        w.write_u8(node.hypotheses.len() as u8)?;
        for h in &node.hypotheses {
            w.write_f32::<LittleEndian>(h.current_mean as f32)?;
            w.write_f32::<LittleEndian>(h.current_variance as f32)?;
            w.write_f32::<LittleEndian>(h.predicted_mean as f32)?;
            w.write_f32::<LittleEndian>(h.predicted_variance as f32)?;
            w.write_f32::<LittleEndian>(h.cumulative_score as f32)?;
            w.write_u32::<LittleEndian>(h.n_updates)?;
        }
        let queue = node.monitor_queue_snapshot();
        w.write_u8(queue.len() as u8)?;
        for e in queue {
            w.write_f32::<LittleEndian>(e as f32)?;
        }
        w.write_f32::<LittleEndian>(node.cusum_state() as f32)?;
    }
    Ok(())
}

fn decode_tile<R: Read>(r: &mut R, side: usize) -> Result<Tile, CubeError> {
    let tile_row = r.read_u32::<LittleEndian>()? as usize;
    let tile_col = r.read_u32::<LittleEndian>()? as usize;
    let node_count = r.read_u32::<LittleEndian>()? as usize;
    let version = r.read_u8()?;

    if version != TILE_FORMAT_VERSION {
        return Err(CubeError::CorruptTile {
            row: tile_row as u32,
            col: tile_col as u32,
            reason: format!("unsupported tile format version {version}"),
        });
    }
    if node_count != side * side {
        return Err(CubeError::CorruptTile {
            row: tile_row as u32,
            col: tile_col as u32,
            reason: format!(
                "node count mismatch: header says {node_count}, expected {}",
                side * side
            ),
        });
    }

    let mut tile = Tile::new_empty(tile_row * side, tile_col * side, side, 0);
    for node in tile.nodes_mut() {
        let n_hypotheses = r.read_u8()?;
        if n_hypotheses == 0 {
            continue;
        }
        let mut hypotheses = Vec::with_capacity(n_hypotheses as usize);
        for _ in 0..n_hypotheses {
            let current_mean = r.read_f32::<LittleEndian>()? as f64;
            let current_variance = r.read_f32::<LittleEndian>()? as f64;
            let predicted_mean = r.read_f32::<LittleEndian>()? as f64;
            let predicted_variance = r.read_f32::<LittleEndian>()? as f64;
            let cumulative_score = r.read_f32::<LittleEndian>()? as f64;
            let n_updates = r.read_u32::<LittleEndian>()?;
            hypotheses.push(Hypothesis {
                current_mean,
                current_variance,
                predicted_mean,
                predicted_variance,
                cumulative_score,
                n_updates,
            });
        }
        let queue_len = r.read_u8()?;
        let mut queue = VecDeque::with_capacity(queue_len as usize);
        for _ in 0..queue_len {
            queue.push_back(r.read_f32::<LittleEndian>()? as f64);
        }
        let cusum_state = r.read_f32::<LittleEndian>()? as f64;
        *node = Node::restore(hypotheses, queue, cusum_state);
    }
    Ok(tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeTracker;

    #[test]
    fn tile_round_trips_through_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackingStore::open_or_create(dir.path()).unwrap();

        let mut tile = Tile::new_empty(0, 0, 4, 0);
        let params = CubeParams::default();
        NodeTracker::update(tile.node_mut(1, 2), -20.0, 0.25, 1.0, &params);
        NodeTracker::update(tile.node_mut(1, 2), -20.4, 0.25, 1.0, &params);

        store.write_tile(&tile).unwrap();
        let loaded = store.read_tile(tile.key(), 4).unwrap().unwrap();

        assert_eq!(loaded.node(1, 2).hypotheses.len(), 1);
        assert!((loaded.node(1, 2).hypotheses[0].current_mean - (-20.2)).abs() < 1e-5);
        assert!(!loaded.node(0, 0).is_touched());
    }

    #[test]
    fn missing_tile_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackingStore::open_or_create(dir.path()).unwrap();
        let result = store.read_tile(TileKey { tile_row: 3, tile_col: 3 }, 4).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn metadata_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackingStore::open_or_create(dir.path()).unwrap();
        let config = GridConfig {
            rows: 64,
            cols: 64,
            node_spacing: 2.5,
            origin_east: 100.0,
            origin_north: -50.0,
            tile_side: 16,
            ..GridConfig::default()
        };
        let meta = BackingStoreMeta::from(&config);
        store.write_metadata(&meta).unwrap();
        let loaded = store.read_metadata().unwrap().unwrap();
        assert_eq!(loaded, meta);
    }
}
