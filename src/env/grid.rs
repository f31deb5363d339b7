use std::collections::{HashSet, VecDeque};

use log::{debug, warn};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use super::{offset, Pos, NEIGHBORS_4, NEIGHBORS_8};

const WALL_ATTEMPTS: usize = 3000;
const PALLET_ATTEMPTS: usize = 1000;
const SAMPLE_ATTEMPTS: usize = 1000;

/// Returned by [`GridWorld::random_free_pos`] when sampling gives up
pub const FALLBACK_POS: Pos = (1, 1);

/// How much of a requested layout was actually placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutReport {
    pub walls_requested: usize,
    pub walls_placed: usize,
    pub pallets_requested: usize,
    pub pallets_placed: usize,
}

impl LayoutReport {
    pub fn is_complete(&self) -> bool {
        self.walls_placed == self.walls_requested && self.pallets_placed == self.pallets_requested
    }
}

/// A rectangular maze of free cells, permanent walls and destructible pallets
///
/// Every layout produced by [`GridWorld::generate_random_layout`] keeps all free cells
/// 4-connected. Pallets count as free for connectivity; they block movement only until
/// broken.
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: i32,
    height: i32,
    walls: HashSet<Pos>,
    pallets: HashSet<Pos>,
    rng: StdRng,
}

impl GridWorld {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            walls: HashSet::new(),
            pallets: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Replace the wall set, leaving pallets untouched
    pub fn with_walls(mut self, walls: impl IntoIterator<Item = Pos>) -> Self {
        self.walls = walls.into_iter().collect();
        self
    }

    /// Replace the active pallet set
    pub fn with_pallets(mut self, pallets: impl IntoIterator<Item = Pos>) -> Self {
        self.pallets = pallets.into_iter().collect();
        self
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn walls(&self) -> &HashSet<Pos> {
        &self.walls
    }

    pub fn active_pallets(&self) -> &HashSet<Pos> {
        &self.pallets
    }

    pub fn in_bounds(&self, (r, c): Pos) -> bool {
        r >= 0 && r < self.height && c >= 0 && c < self.width
    }

    pub fn is_border(&self, (r, c): Pos) -> bool {
        r == 0 || c == 0 || r == self.height - 1 || c == self.width - 1
    }

    pub fn is_wall(&self, pos: Pos) -> bool {
        self.walls.contains(&pos)
    }

    pub fn is_pallet_active(&self, pos: Pos) -> bool {
        self.pallets.contains(&pos)
    }

    /// Deactivate a pallet for the rest of the episode
    pub fn break_pallet(&mut self, pos: Pos) {
        self.pallets.remove(&pos);
    }

    /// In bounds and not a wall; active pallets count as free
    pub fn is_free(&self, pos: Pos) -> bool {
        self.in_bounds(pos) && !self.walls.contains(&pos)
    }

    pub fn free_cell_count(&self) -> usize {
        (self.width * self.height) as usize - self.walls.len()
    }

    /// Breadth-first traversal over free 4-neighbours
    ///
    /// Empty if `start` itself is blocked.
    pub fn flood_fill(&self, start: Pos) -> HashSet<Pos> {
        let mut visited = HashSet::new();
        if !self.is_free(start) {
            return visited;
        }

        visited.insert(start);
        let mut queue = VecDeque::from([start]);
        while let Some(pos) = queue.pop_front() {
            for delta in NEIGHBORS_4 {
                let next = offset(pos, delta);
                if self.is_free(next) && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited
    }

    /// Rejection-sample a free cell not in `exclude`
    ///
    /// Falls back to [`FALLBACK_POS`] once the attempt budget is spent.
    pub fn random_free_pos(&mut self, exclude: &HashSet<Pos>, allow_border: bool) -> Pos {
        for _ in 0..SAMPLE_ATTEMPTS {
            let pos = (
                self.rng.gen_range(0..self.height),
                self.rng.gen_range(0..self.width),
            );
            if !allow_border && self.is_border(pos) {
                continue;
            }
            if !self.walls.contains(&pos) && !exclude.contains(&pos) {
                return pos;
            }
        }

        warn!("free cell sampling exhausted after {SAMPLE_ATTEMPTS} attempts, using {FALLBACK_POS:?}");
        FALLBACK_POS
    }

    /// Row-major scan for an interior free cell outside `exclude`
    pub fn first_free_interior(&self, exclude: &HashSet<Pos>) -> Option<Pos> {
        (1..self.height - 1)
            .flat_map(|r| (1..self.width - 1).map(move |c| (r, c)))
            .find(|pos| self.is_free(*pos) && !exclude.contains(pos))
    }

    fn has_adjacent_pallet(&self, pos: Pos) -> bool {
        NEIGHBORS_8
            .iter()
            .any(|&delta| self.pallets.contains(&offset(pos, delta)))
    }

    /// Bresenham line of sight from `start` to `end`
    ///
    /// Blocked if any rasterized cell, including `end`, is a wall. Pallets do not block sight.
    pub fn has_line_of_sight(&self, start: Pos, end: Pos) -> bool {
        let (x0, y0) = start;
        let (x1, y1) = end;
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 > x1 { -1 } else { 1 };
        let sy = if y0 > y1 { -1 } else { 1 };
        let (mut x, mut y) = (x0, y0);

        if dx > dy {
            let mut err = dx as f32 / 2.0;
            while x != x1 {
                if self.walls.contains(&(x, y)) {
                    return false;
                }
                err -= dy as f32;
                if err < 0.0 {
                    y += sy;
                    err += dx as f32;
                }
                x += sx;
            }
        } else {
            let mut err = dy as f32 / 2.0;
            while y != y1 {
                if self.walls.contains(&(x, y)) {
                    return false;
                }
                err -= dx as f32;
                if err < 0.0 {
                    x += sx;
                    err += dy as f32;
                }
                y += sy;
            }
        }

        !self.walls.contains(&(x, y))
    }

    /// Regenerate walls and pallets for a new episode
    ///
    /// Walls go on interior cells one at a time, and any placement that would cut off a
    /// free cell is undone. Pallets prefer chokepoints (interior cells walled on both sides
    /// of one axis) and never touch another pallet, even diagonally. Both phases run under
    /// an attempt budget and settle for fewer obstacles when it runs out.
    pub fn generate_random_layout(
        &mut self,
        wall_count: usize,
        pallet_count: usize,
        reserved: &HashSet<Pos>,
    ) -> LayoutReport {
        self.walls.clear();
        self.pallets.clear();

        if self.width >= 3 && self.height >= 3 {
            self.place_walls(wall_count, reserved);
            self.place_pallets(pallet_count, reserved);
        }

        let report = LayoutReport {
            walls_requested: wall_count,
            walls_placed: self.walls.len(),
            pallets_requested: pallet_count,
            pallets_placed: self.pallets.len(),
        };
        if report.is_complete() {
            debug!("layout generated: {report:?}");
        } else {
            warn!("layout generation fell short of the request: {report:?}");
        }

        report
    }

    fn place_walls(&mut self, wall_count: usize, reserved: &HashSet<Pos>) {
        let mut attempts = 0;
        while self.walls.len() < wall_count && attempts < WALL_ATTEMPTS {
            attempts += 1;
            let pos = (
                self.rng.gen_range(1..self.height - 1),
                self.rng.gen_range(1..self.width - 1),
            );
            if reserved.contains(&pos) || !self.walls.insert(pos) {
                continue;
            }

            let walls = self.walls.clone();
            let start = self.random_free_pos(&walls, true);
            if self.flood_fill(start).len() < self.free_cell_count() {
                self.walls.remove(&pos);
            }
        }
    }

    fn place_pallets(&mut self, pallet_count: usize, reserved: &HashSet<Pos>) {
        let mut chokepoints = Vec::new();
        for r in 1..self.height - 1 {
            for c in 1..self.width - 1 {
                let pos = (r, c);
                if self.walls.contains(&pos) || reserved.contains(&pos) {
                    continue;
                }
                let horizontal = self.walls.contains(&(r, c - 1)) && self.walls.contains(&(r, c + 1));
                let vertical = self.walls.contains(&(r - 1, c)) && self.walls.contains(&(r + 1, c));
                if horizontal || vertical {
                    chokepoints.push(pos);
                }
            }
        }

        chokepoints.shuffle(&mut self.rng);
        for pos in chokepoints {
            if self.pallets.len() >= pallet_count {
                break;
            }
            if !self.has_adjacent_pallet(pos) {
                self.pallets.insert(pos);
            }
        }

        let mut attempts = 0;
        while self.pallets.len() < pallet_count && attempts < PALLET_ATTEMPTS {
            attempts += 1;
            let exclude = self
                .walls
                .iter()
                .chain(&self.pallets)
                .chain(reserved)
                .copied()
                .collect::<HashSet<_>>();
            let pos = self.random_free_pos(&exclude, false);
            // The sampling fallback cell is not checked against `exclude`
            if exclude.contains(&pos) || self.is_border(pos) || !self.is_free(pos) {
                continue;
            }
            if !self.has_adjacent_pallet(pos) {
                self.pallets.insert(pos);
            }
        }
    }
}
