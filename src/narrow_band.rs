//! Sparse tracking of the embedding's boundary cells.
//!
//! The narrow band maps boundary positions to cells carrying a deferred
//! toggle flag. Operators stage flips against the frozen embedding with
//! [`BandOps::toggle_cell`]; [`BandOps::update`] then commits every staged
//! flip at once and re-seeds the neighbors of flipped cells, so results never
//! depend on scan order. [`BandOps::cleanup`] prunes cells whose neighborhood
//! has become uniform.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::grid::{is_boundary, offset_of, Coord, GridView, GridViewMut, Position};

/// Narrow-band cell: `toggle` marks it for flipping at the next commit.
#[derive(Debug, Default, Clone)]
pub struct Cell {
    pub toggle: bool,
}

/// Map from boundary position to cell. Positions hash by flat offset.
pub type CellMap<const D: usize> = HashMap<Position<D>, Cell>;

/// Common surface of the plain and the statistics-carrying narrow band.
///
/// Morphological operators and image attachments act through this trait, so
/// one `morph_op` serves both band types.
pub trait BandOps<'a, const D: usize> {
    /// The binary embedding the band evolves in place.
    fn embedding(&self) -> &GridViewMut<'a, u8, D>;

    /// Current cell map (may be a superset of the true boundary between
    /// operator calls; `cleanup` tightens it).
    fn cells(&self) -> &CellMap<D>;

    /// Stage a flip of `position` for the next `update`. Inserts the cell if
    /// absent. Callers must pass interior positions only.
    fn toggle_cell(&mut self, position: &Position<D>);

    /// Commit every staged flip, clear the toggles, and insert every interior
    /// neighbor of a flipped cell into the map (existing entries untouched).
    fn update(&mut self);

    /// Remove cells whose embedding value matches all of their neighbors.
    fn cleanup(&mut self);
}

/// Construction scan, parallel over the leading axis: each worker collects
/// the boundary positions of its slab, the results are merged into one map.
fn create_cell_map<const D: usize>(embedding: &GridViewMut<'_, u8, D>) -> CellMap<D> {
    let shape = *embedding.shape();
    let stride = *embedding.stride();
    let slab_len: usize = shape[1..].iter().product();
    let interior_rows = 1..(shape[0] as isize - 1).max(1);

    let slabs: Vec<Vec<Position<D>>> = interior_rows
        .into_par_iter()
        .map(|row| {
            let mut found = Vec::new();
            for k in 0..slab_len {
                let mut coord: Coord<D> = [0; D];
                coord[0] = row;
                let mut rem = k;
                for i in (1..D).rev() {
                    coord[i] = (rem % shape[i]) as isize;
                    rem /= shape[i];
                }
                if is_boundary(&coord, &shape) {
                    continue;
                }
                let position = Position {
                    coord,
                    offset: offset_of(&coord, &stride),
                };
                let val = embedding.get(position.offset);
                for neighbor in embedding.neighborhood(&position).iter() {
                    if embedding.get(neighbor.offset) != val {
                        found.push(position);
                        break;
                    }
                }
            }
            found
        })
        .collect();

    let mut cells = CellMap::new();
    for slab in slabs {
        for position in slab {
            cells.insert(position, Cell::default());
        }
    }
    cells
}

/// The sparse set of boundary cells of a binary embedding.
pub struct NarrowBand<'a, const D: usize> {
    embedding: GridViewMut<'a, u8, D>,
    cells: CellMap<D>,
}

impl<'a, const D: usize> NarrowBand<'a, D> {
    /// Scan the embedding and collect every interior position with at least
    /// one differing neighbor.
    pub fn new(embedding: GridViewMut<'a, u8, D>) -> Self {
        let cells = create_cell_map(&embedding);
        NarrowBand { embedding, cells }
    }
}

impl<'a, const D: usize> BandOps<'a, D> for NarrowBand<'a, D> {
    fn embedding(&self) -> &GridViewMut<'a, u8, D> {
        &self.embedding
    }

    fn cells(&self) -> &CellMap<D> {
        &self.cells
    }

    fn toggle_cell(&mut self, position: &Position<D>) {
        self.cells.entry(*position).or_default().toggle = true;
    }

    fn update(&mut self) {
        let mut seeded: Vec<Position<D>> = Vec::new();
        for (position, cell) in self.cells.iter_mut() {
            if !cell.toggle {
                continue;
            }
            let flipped = 1 - self.embedding.get(position.offset);
            self.embedding.set(position.offset, flipped);
            cell.toggle = false;

            for neighbor in self.embedding.neighborhood(position).iter() {
                // Boundary pixels never enter the narrow band.
                if is_boundary(&neighbor.coord, self.embedding.shape()) {
                    continue;
                }
                seeded.push(neighbor);
            }
        }
        for neighbor in seeded {
            self.cells.entry(neighbor).or_default();
        }
    }

    fn cleanup(&mut self) {
        let embedding = &self.embedding;
        self.cells.retain(|position, _| {
            let val = embedding.get(position.offset);
            embedding
                .neighborhood(position)
                .iter()
                .any(|neighbor| embedding.get(neighbor.offset) != val)
        });
    }
}

/// Narrow band that also maintains the running interior/exterior intensity
/// statistics the Chan–Vese attachment needs, updated on every flip.
pub struct AcweNarrowBand<'a, const D: usize> {
    band: NarrowBand<'a, D>,
    image: GridView<'a, f64, D>,
    count_in: i64,
    count_out: i64,
    sum_in: f64,
    sum_out: f64,
}

impl<'a, const D: usize> AcweNarrowBand<'a, D> {
    pub fn new(embedding: GridViewMut<'a, u8, D>, image: GridView<'a, f64, D>) -> Self {
        assert_eq!(
            embedding.shape(),
            image.shape(),
            "embedding and image must have the same shape"
        );
        let mut band = AcweNarrowBand {
            band: NarrowBand::new(embedding),
            image,
            count_in: 0,
            count_out: 0,
            sum_in: 0.0,
            sum_out: 0.0,
        };
        band.init_averages();
        band
    }

    /// Full-grid scan seeding the statistics. Flips only happen at interior
    /// cells, so the scan set stays consistent across incremental updates.
    fn init_averages(&mut self) {
        for position in self.band.embedding.positions() {
            let image_val = self.image.get_at(&position.coord);
            if self.band.embedding.get(position.offset) == 0 {
                self.count_out += 1;
                self.sum_out += image_val;
            } else {
                self.count_in += 1;
                self.sum_in += image_val;
            }
        }
    }

    /// Mean image intensity over the region where the embedding is 1.
    /// Requires a non-empty interior.
    pub fn average_inside(&self) -> f64 {
        self.sum_in / self.count_in as f64
    }

    /// Mean image intensity over the region where the embedding is 0.
    /// Requires a non-empty exterior.
    pub fn average_outside(&self) -> f64 {
        self.sum_out / self.count_out as f64
    }

    pub fn count_in(&self) -> i64 {
        self.count_in
    }

    pub fn count_out(&self) -> i64 {
        self.count_out
    }

    pub fn sum_in(&self) -> f64 {
        self.sum_in
    }

    pub fn sum_out(&self) -> f64 {
        self.sum_out
    }

    pub fn image(&self) -> &GridView<'a, f64, D> {
        &self.image
    }
}

impl<'a, const D: usize> BandOps<'a, D> for AcweNarrowBand<'a, D> {
    fn embedding(&self) -> &GridViewMut<'a, u8, D> {
        &self.band.embedding
    }

    fn cells(&self) -> &CellMap<D> {
        &self.band.cells
    }

    fn toggle_cell(&mut self, position: &Position<D>) {
        self.band.toggle_cell(position);
    }

    fn update(&mut self) {
        let mut seeded: Vec<Position<D>> = Vec::new();
        for (position, cell) in self.band.cells.iter_mut() {
            if !cell.toggle {
                continue;
            }
            let flipped = 1 - self.band.embedding.get(position.offset);
            self.band.embedding.set(position.offset, flipped);

            let image_val = self.image.get_at(&position.coord);
            if flipped == 0 {
                self.count_in -= 1;
                self.count_out += 1;
                self.sum_in -= image_val;
                self.sum_out += image_val;
            } else {
                self.count_out -= 1;
                self.count_in += 1;
                self.sum_out -= image_val;
                self.sum_in += image_val;
            }
            debug_assert!(self.count_in >= 0 && self.count_out >= 0);

            cell.toggle = false;
            for neighbor in self.band.embedding.neighborhood(position).iter() {
                if is_boundary(&neighbor.coord, self.band.embedding.shape()) {
                    continue;
                }
                seeded.push(neighbor);
            }
        }
        for neighbor in seeded {
            self.band.cells.entry(neighbor).or_default();
        }
    }

    fn cleanup(&mut self) {
        self.band.cleanup();
    }
}
