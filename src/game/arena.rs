//! Maze Arena Generation
//!
//! Seeded, one-shot builder for the arena topology:
//!
//! 1. Lay an `rows x cols` grid of cells and a perimeter boundary
//! 2. Enumerate every right-neighbour and below-neighbour wall
//! 3. Shuffle the candidates with the arena's own PRNG
//! 4. Kruskal over the shuffled list carves a perfect maze
//! 5. Classify the uncarved walls into removed / falling / rising / static
//! 6. Sample spawn points from random cell centers
//!
//! Identical configuration always yields an identical layout.

use serde::{Serialize, Deserialize};
use tracing::info;

use crate::core::fixed::{Fixed, FIXED_HALF, to_fixed, fixed_mul};
use crate::core::vec2::FixedVec2;
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, StateHasher};
use crate::game::collision::Aabb;

/// Largest arena side length (in units) that keeps every coordinate
/// difference inside the Q16.16 range.
pub const MAX_ARENA_EXTENT: f64 = 8000.0;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Match-start parameters for the generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// PRNG seed shared by every peer
    pub seed: u64,
    /// Grid rows (Z direction)
    pub rows: u32,
    /// Grid columns (X direction)
    pub cols: u32,
    /// Distance between neighbouring cell centers
    pub cell_size: f64,
    /// Wall thickness
    pub wall_thickness: f64,
    /// Percent of uncarved walls removed outright (adds loops)
    pub removed_percent: u32,
    /// Percent of uncarved walls that retract while occupied
    pub falling_percent: u32,
    /// Percent of uncarved walls that extend while occupied
    pub rising_percent: u32,
    /// Number of spawn points to sample
    pub spawn_count: u32,
    /// Height above the cell floor at which vehicles appear
    pub spawn_elevation: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            seed: 10,
            rows: 10,
            cols: 10,
            cell_size: 15.0,
            wall_thickness: 3.0,
            removed_percent: 10,
            falling_percent: 10,
            rising_percent: 10,
            spawn_count: 10,
            spawn_elevation: 0.75,
        }
    }
}

/// Configuration that cannot produce an arena. Reported before generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArenaConfigError {
    /// Zero rows or columns.
    #[error("grid must be at least 1x1, got {rows}x{cols}")]
    EmptyGrid {
        /// Requested rows
        rows: u32,
        /// Requested columns
        cols: u32,
    },

    /// Cell size zero, negative or not finite.
    #[error("cell size must be positive, got {0}")]
    NonPositiveCellSize(f64),

    /// Wall thicker than a cell, or negative.
    #[error("wall thickness {thickness} must be in [0, {cell_size})")]
    InvalidWallThickness {
        /// Requested thickness
        thickness: f64,
        /// Configured cell size
        cell_size: f64,
    },

    /// Removed + falling + rising exceeds 100 %.
    #[error("wall fractions sum to {0}%, more than 100%")]
    WallFractionsExceed(u32),

    /// Grid too large for fixed-point coordinates.
    #[error("arena extent {0} exceeds the fixed-point coordinate limit")]
    ArenaTooLarge(f64),
}

impl ArenaConfig {
    /// Reject configurations that cannot be generated.
    pub fn validate(&self) -> Result<(), ArenaConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ArenaConfigError::EmptyGrid { rows: self.rows, cols: self.cols });
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(ArenaConfigError::NonPositiveCellSize(self.cell_size));
        }
        if !self.wall_thickness.is_finite()
            || self.wall_thickness < 0.0
            || self.wall_thickness >= self.cell_size
        {
            return Err(ArenaConfigError::InvalidWallThickness {
                thickness: self.wall_thickness,
                cell_size: self.cell_size,
            });
        }
        let total = self.removed_percent
            .saturating_add(self.falling_percent)
            .saturating_add(self.rising_percent);
        if total > 100 {
            return Err(ArenaConfigError::WallFractionsExceed(total));
        }
        let extent = (self.rows.max(self.cols) as f64 + 1.0) * self.cell_size;
        if extent > MAX_ARENA_EXTENT {
            return Err(ArenaConfigError::ArenaTooLarge(extent));
        }
        Ok(())
    }
}

// =============================================================================
// DISJOINT SET
// =============================================================================

/// Union-find over node indices, stored as a flat parent array.
#[derive(Clone, Debug)]
pub struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    /// Every node starts as its own root.
    pub fn new(len: usize) -> Self {
        Self { parent: (0..len).collect() }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// True if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of `node`'s set, pointing every visited node straight at it.
    pub fn find_root(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = node;
        while current != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`. False if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find_root(a);
        let root_b = self.find_root(b);
        if root_a == root_b {
            return false;
        }
        self.parent[root_a] = root_b;
        true
    }

    /// Number of distinct sets.
    pub fn component_count(&mut self) -> usize {
        (0..self.parent.len()).filter(|&n| self.find_root(n) == n).count()
    }
}

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Orientation of a cell's wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Wall running along X, separating a cell from the one above it
    X,
    /// Wall running along Z, separating a cell from the one to its left
    Z,
}

/// Generation outcome for one candidate wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallKind {
    /// Removed by the spanning tree
    Carved,
    /// Removed in post-processing
    Removed,
    /// Permanent wall
    Static,
    /// Extends while occupied
    Rising,
    /// Retracts while occupied
    Falling,
}

impl WallKind {
    /// True if the wall still exists after generation.
    pub fn is_present(self) -> bool {
        !matches!(self, WallKind::Carved | WallKind::Removed)
    }
}

/// A grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeNode {
    /// Index `row * cols + col`
    pub id: usize,
    /// Cell center on the ground plane
    pub position: FixedVec2,
}

/// A candidate wall between two neighbouring cells.
///
/// The wall belongs to `node2`: a right-neighbour edge is `node2`'s Z wall,
/// a below-neighbour edge is `node2`'s X wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeEdge {
    /// Lower-index cell
    pub node1: usize,
    /// Higher-index cell, owner of the wall
    pub node2: usize,
    /// Orientation of the wall
    pub axis: Axis,
    /// Generation outcome
    pub kind: WallKind,
    /// Wall footprint
    pub bounds: Aabb,
}

/// Where a vehicle appears on (re)spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Ground-plane position
    pub position: FixedVec2,
    /// Height above the floor
    pub elevation: Fixed,
}

/// Counts describing a generated layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySummary {
    /// Number of cells
    pub cell_count: usize,
    /// Number of candidate walls
    pub candidate_count: usize,
    /// Walls carved by the spanning tree
    pub carved_count: usize,
    /// Walls removed in post-processing
    pub removed_count: usize,
    /// Retracting walls
    pub falling_count: usize,
    /// Extending walls
    pub rising_count: usize,
    /// Permanent walls
    pub static_count: usize,
    /// Connected components of the carved-only graph
    pub carved_components: usize,
}

/// Immutable arena topology produced at match start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MazeLayout {
    /// Seed the layout was generated from
    pub seed: u64,
    /// Grid rows
    pub rows: u32,
    /// Grid columns
    pub cols: u32,
    /// Cell pitch
    pub cell_size: Fixed,
    /// Cells in id order
    pub nodes: Vec<MazeNode>,
    /// Candidate walls in shuffle order
    pub edges: Vec<MazeEdge>,
    /// Boundary boxes around the grid
    pub perimeter: Vec<Aabb>,
    /// Sampled spawn points
    pub spawn_points: Vec<SpawnPoint>,
    /// Generation counts
    pub summary: TopologySummary,
}

impl MazeLayout {
    /// Hash of the topology, for checking peers generated the same arena.
    pub fn layout_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_arena_layout();
        hasher.update_u64(self.seed);
        hasher.update_u32(self.rows);
        hasher.update_u32(self.cols);
        for edge in &self.edges {
            hasher.update_u32(edge.node1 as u32);
            hasher.update_u32(edge.node2 as u32);
            hasher.update_u8(edge.kind as u8);
        }
        for spawn in &self.spawn_points {
            hasher.update_vec2(spawn.position);
            hasher.update_fixed(spawn.elevation);
        }
        hasher.finalize()
    }

    /// Edges still standing after generation.
    pub fn present_edges(&self) -> impl Iterator<Item = &MazeEdge> {
        self.edges.iter().filter(|e| e.kind.is_present())
    }

    /// Drivable floor inside the perimeter.
    pub fn floor_bounds(&self) -> Aabb {
        let half_cell = fixed_mul(self.cell_size, FIXED_HALF);
        let min = FixedVec2::new(-half_cell, -half_cell);
        let max = FixedVec2::new(
            self.cell_size * self.cols as Fixed - half_cell,
            self.cell_size * self.rows as Fixed - half_cell,
        );
        Aabb { min, max }
    }
}

// =============================================================================
// GENERATOR
// =============================================================================

/// One-shot maze builder owning the arena PRNG.
pub struct ArenaGenerator {
    config: ArenaConfig,
    rng: DeterministicRng,
    cell_size: Fixed,
    wall_thickness: Fixed,
}

impl ArenaGenerator {
    /// Validate the configuration and seed the generator.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaConfigError> {
        config.validate()?;
        let rng = DeterministicRng::new(config.seed);
        let cell_size = to_fixed(config.cell_size);
        let wall_thickness = to_fixed(config.wall_thickness);
        Ok(Self { config, rng, cell_size, wall_thickness })
    }

    /// Validate and generate in one call.
    pub fn generate_from(config: &ArenaConfig) -> Result<MazeLayout, ArenaConfigError> {
        Ok(Self::new(config.clone())?.generate())
    }

    /// Run every generation step. Consumes the generator and its PRNG.
    pub fn generate(mut self) -> MazeLayout {
        let rows = self.config.rows as usize;
        let cols = self.config.cols as usize;

        // 1. Cells and boundary
        let nodes = self.build_nodes(rows, cols);
        let perimeter = self.build_perimeter(rows, cols);

        // 2. Candidate walls
        let mut edges = self.candidate_edges(&nodes, rows, cols);

        // 3. Uniform shuffle
        self.rng.shuffle(&mut edges);

        // 4. Spanning tree
        let carved_count = carve_spanning_tree(&mut edges, nodes.len());

        // 5. Post-processing
        classify_uncarved(
            &mut edges,
            nodes.len(),
            self.config.removed_percent,
            self.config.falling_percent,
            self.config.rising_percent,
        );

        // 6. Spawn points
        let spawn_points = self.sample_spawn_points(&nodes);

        let mut summary = TopologySummary {
            cell_count: nodes.len(),
            candidate_count: edges.len(),
            carved_count,
            carved_components: carved_components(&edges, nodes.len()),
            ..TopologySummary::default()
        };
        for edge in &edges {
            match edge.kind {
                WallKind::Carved => {}
                WallKind::Removed => summary.removed_count += 1,
                WallKind::Falling => summary.falling_count += 1,
                WallKind::Rising => summary.rising_count += 1,
                WallKind::Static => summary.static_count += 1,
            }
        }

        info!(
            "Generated {}x{} arena (seed {}): {} carved, {} removed, {} falling, {} rising, {} static",
            rows, cols, self.config.seed,
            summary.carved_count, summary.removed_count,
            summary.falling_count, summary.rising_count, summary.static_count,
        );

        MazeLayout {
            seed: self.config.seed,
            rows: self.config.rows,
            cols: self.config.cols,
            cell_size: self.cell_size,
            nodes,
            edges,
            perimeter,
            spawn_points,
            summary,
        }
    }

    fn build_nodes(&self, rows: usize, cols: usize) -> Vec<MazeNode> {
        let mut nodes = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                nodes.push(MazeNode {
                    id: row * cols + col,
                    position: FixedVec2::new(
                        self.cell_size * col as Fixed,
                        self.cell_size * row as Fixed,
                    ),
                });
            }
        }
        nodes
    }

    fn build_perimeter(&self, rows: usize, cols: usize) -> Vec<Aabb> {
        let half_cell = fixed_mul(self.cell_size, FIXED_HALF);
        let half_thick = fixed_mul(self.wall_thickness, FIXED_HALF);
        let width = self.cell_size * cols as Fixed;
        let depth = self.cell_size * rows as Fixed;
        let min_x = -half_cell;
        let min_z = -half_cell;
        let max_x = min_x + width;
        let max_z = min_z + depth;
        let mid_x = min_x + (width >> 1);
        let mid_z = min_z + (depth >> 1);
        let span_x = (width >> 1) + self.wall_thickness;
        let span_z = (depth >> 1) + self.wall_thickness;

        vec![
            Aabb::from_center(FixedVec2::new(min_x - half_thick, mid_z), half_thick, span_z),
            Aabb::from_center(FixedVec2::new(max_x + half_thick, mid_z), half_thick, span_z),
            Aabb::from_center(FixedVec2::new(mid_x, min_z - half_thick), span_x, half_thick),
            Aabb::from_center(FixedVec2::new(mid_x, max_z + half_thick), span_x, half_thick),
        ]
    }

    /// Right neighbour then below neighbour for every cell:
    /// `rows * (cols - 1) + cols * (rows - 1)` walls.
    fn candidate_edges(&self, nodes: &[MazeNode], rows: usize, cols: usize) -> Vec<MazeEdge> {
        let half_cell = fixed_mul(self.cell_size, FIXED_HALF);
        let half_thick = fixed_mul(self.wall_thickness, FIXED_HALF);
        let mut edges = Vec::with_capacity(rows * cols.saturating_sub(1) + cols * rows.saturating_sub(1));

        for row in 0..rows {
            for col in 0..cols {
                let current = row * cols + col;
                let here = nodes[current].position;

                if col + 1 < cols {
                    let center = FixedVec2::new(here.x + half_cell, here.z);
                    edges.push(MazeEdge {
                        node1: current,
                        node2: current + 1,
                        axis: Axis::Z,
                        kind: WallKind::Static,
                        bounds: Aabb::from_center(center, half_thick, half_cell),
                    });
                }

                if row + 1 < rows {
                    let center = FixedVec2::new(here.x, here.z + half_cell);
                    edges.push(MazeEdge {
                        node1: current,
                        node2: current + cols,
                        axis: Axis::X,
                        kind: WallKind::Static,
                        bounds: Aabb::from_center(center, half_cell, half_thick),
                    });
                }
            }
        }
        edges
    }

    /// Spawn points sit at cell centers on the ground plane, lifted only by
    /// `spawn_elevation`. No half-cell depth shift is applied.
    fn sample_spawn_points(&mut self, nodes: &[MazeNode]) -> Vec<SpawnPoint> {
        let elevation = to_fixed(self.config.spawn_elevation);
        (0..self.config.spawn_count)
            .filter_map(|_| self.rng.choose(nodes).map(|node| SpawnPoint {
                position: node.position,
                elevation,
            }))
            .collect()
    }
}

/// Kruskal over the already-shuffled edges. Returns the carved count.
fn carve_spanning_tree(edges: &mut [MazeEdge], node_count: usize) -> usize {
    let mut forest = DisjointSet::new(node_count);
    let mut carved = 0;
    for edge in edges.iter_mut() {
        if forest.union(edge.node1, edge.node2) {
            edge.kind = WallKind::Carved;
            carved += 1;
        }
    }
    carved
}

/// Assign removed, then falling, then rising in shuffle order, skipping
/// carved walls. Each count is `floor(percent * uncarved / 100)`.
fn classify_uncarved(
    edges: &mut [MazeEdge],
    node_count: usize,
    removed_percent: u32,
    falling_percent: u32,
    rising_percent: u32,
) {
    let uncarved = edges.len().saturating_sub(node_count.saturating_sub(1));
    let quota = |percent: u32| percent as usize * uncarved / 100;

    let mut plan = [
        (WallKind::Removed, quota(removed_percent)),
        (WallKind::Falling, quota(falling_percent)),
        (WallKind::Rising, quota(rising_percent)),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .peekable();

    let mut assigned = 0;
    for edge in edges.iter_mut().filter(|e| e.kind != WallKind::Carved) {
        let Some(&(kind, count)) = plan.peek() else {
            break;
        };
        edge.kind = kind;
        assigned += 1;
        if assigned == count {
            plan.next();
            assigned = 0;
        }
    }
}

fn carved_components(edges: &[MazeEdge], node_count: usize) -> usize {
    let mut forest = DisjointSet::new(node_count);
    for edge in edges.iter().filter(|e| e.kind == WallKind::Carved) {
        forest.union(edge.node1, edge.node2);
    }
    forest.component_count()
}

// =============================================================================
// TESTS
// =============================================================================
