/// Sparse coordinate → entity store.
///
/// The world keeps three of these (tiles, actors, items) over the same
/// coordinate space. A missing key means "nothing of this category here";
/// for the tile layer the resolver reads that as a blocking void.

use std::collections::HashMap;

use super::coord::Coord;
use super::tile::{Tagged, TileType};

#[derive(Clone, Debug, PartialEq)]
pub struct Layer<T> {
    cells: HashMap<Coord, T>,
}

impl<T> Default for Layer<T> {
    fn default() -> Self {
        Layer { cells: HashMap::new() }
    }
}

impl<T> Layer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, at: Coord) -> Option<&T> {
        self.cells.get(&at)
    }

    pub fn get_mut(&mut self, at: Coord) -> Option<&mut T> {
        self.cells.get_mut(&at)
    }

    pub fn contains(&self, at: Coord) -> bool {
        self.cells.contains_key(&at)
    }

    /// Place an entity, returning whatever was there before.
    pub fn insert(&mut self, at: Coord, value: T) -> Option<T> {
        self.cells.insert(at, value)
    }

    pub fn remove(&mut self, at: Coord) -> Option<T> {
        self.cells.remove(&at)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All occupied coordinates in row-major order.
    pub fn positions(&self) -> Vec<Coord> {
        let mut out: Vec<Coord> = self.cells.keys().copied().collect();
        out.sort_by_key(|c| c.row_major());
        out
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.cells.values()
    }
}

impl<T: Tagged> Layer<T> {
    /// Coordinates holding an entity of `kind`, row-major.
    pub fn find(&self, kind: TileType) -> Vec<Coord> {
        let mut out: Vec<Coord> = self
            .cells
            .iter()
            .filter(|(_, v)| v.tile_type() == kind)
            .map(|(c, _)| *c)
            .collect();
        out.sort_by_key(|c| c.row_major());
        out
    }

    pub fn type_at(&self, at: Coord) -> Option<TileType> {
        self.get(at).map(Tagged::tile_type)
    }
}
