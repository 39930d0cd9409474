//! A fixed-size rectangular block of nodes managed as a unit for paging.
//!
//! Owns its node array by value, as a contiguous row-major `Vec`.

use crate::node::Node;

/// A `side`-by-`side` block of nodes, addressed by tile-local `(row, col)`.
#[derive(Debug, Clone)]
pub struct Tile {
    pub origin_row: usize,
    pub origin_col: usize,
    pub side: usize,
    nodes: Vec<Node>,
    pub dirty: bool,
    pub last_used: u64,
}

impl Tile {
    /// Creates a tile with an empty `Node` at every position. An empty
    /// `Node` holds no hypotheses and costs one empty `Vec` + `VecDeque`,
    /// not a heap allocation, until first touched.
    pub fn new_empty(origin_row: usize, origin_col: usize, side: usize, last_used: u64) -> Self {
        Self {
            origin_row,
            origin_col,
            side,
            nodes: (0..side * side).map(|_| Node::new()).collect(),
            dirty: false,
            last_used,
        }
    }

    #[inline]
    fn local_index(&self, local_row: usize, local_col: usize) -> usize {
        local_row * self.side + local_col
    }

    pub fn node(&self, local_row: usize, local_col: usize) -> &Node {
        &self.nodes[self.local_index(local_row, local_col)]
    }

    pub fn node_mut(&mut self, local_row: usize, local_col: usize) -> &mut Node {
        let idx = self.local_index(local_row, local_col);
        &mut self.nodes[idx]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Global grid key for this tile, used as the backing-store filename
    /// and as the LRU map key.
    pub fn key(&self) -> TileKey {
        TileKey {
            tile_row: self.origin_row / self.side,
            tile_col: self.origin_col / self.side,
        }
    }
}

/// Identifies a tile by its position in tile-space (not node-space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub tile_row: usize,
    pub tile_col: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tile_has_untouched_nodes() {
        let tile = Tile::new_empty(0, 0, 4, 0);
        for node in tile.nodes() {
            assert!(!node.is_touched());
        }
        assert!(!tile.dirty);
    }

    #[test]
    fn local_index_addresses_row_major() {
        let tile = Tile::new_empty(0, 0, 4, 0);
        assert_eq!(tile.local_index(1, 2), 6);
    }

    #[test]
    fn key_derives_from_origin_and_side() {
        let tile = Tile::new_empty(512, 256, 256, 0);
        let key = tile.key();
        assert_eq!(key.tile_row, 2);
        assert_eq!(key.tile_col, 1);
    }
}
