use glam::Vec3;

const MIN_CELL_SIZE: f32 = 1.0e-3;
const MAX_CELLS: usize = 1 << 21;
const MIN_CELLS: usize = 64;
const CELLS_PER_AGENT: usize = 8;
const INVALID_INDEX: usize = usize::MAX;
// Buckets are a hair wider than the requested cell so rounding in cell
// coordinates cannot push an in-range pair two buckets apart.
const BUCKET_SLACK: f32 = 1.0e-3;

/// Uniform 3D bucket grid over a snapshot of agent positions.
///
/// Buckets are stored as intrusive linked lists (`head` per cell, `next` per
/// agent), so a rebuild allocates nothing once the grid has warmed up. The
/// grid covers the bounding box of the last snapshot; when that box would need
/// more buckets than a small multiple of the agent count the bucket edge is
/// doubled until it fits, which keeps queries exact at the cost of scanning
/// more candidates.
pub struct NeighborGrid {
    cell_size: f32,
    bucket_size: f32,
    origin: Vec3,
    cols: usize,
    rows: usize,
    layers: usize,
    head: Vec<usize>,
    next: Vec<usize>,
    cached: Vec<Vec3>,
}

impl NeighborGrid {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = sanitize_cell_size(cell_size);
        Self {
            cell_size,
            bucket_size: cell_size,
            origin: Vec3::ZERO,
            cols: 1,
            rows: 1,
            layers: 1,
            head: vec![INVALID_INDEX],
            next: Vec::new(),
            cached: Vec::new(),
        }
    }

    /// Takes effect on the next `rebuild`.
    pub fn set_cell_size(&mut self, cell_size: f32) {
        self.cell_size = sanitize_cell_size(cell_size);
    }

    pub fn rebuild(&mut self, positions: &[Vec3]) {
        let count = positions.len();
        self.cached.clear();
        self.cached.extend_from_slice(positions);
        self.next.clear();
        self.next.resize(count, INVALID_INDEX);

        self.ensure_layout(positions);
        self.head.fill(INVALID_INDEX);

        for (i, &position) in positions.iter().enumerate() {
            let cell = self.cell_index_for_position(position);
            self.next[i] = self.head[cell];
            self.head[cell] = i;
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.head.len()
    }

    /// Calls `callback(j)` for every cached point `j != i` whose distance from
    /// point `i` is at most `radius`.
    pub fn for_each_neighbor<F>(&self, i: usize, radius: f32, mut callback: F)
    where
        F: FnMut(usize),
    {
        if i >= self.cached.len() {
            return;
        }

        let radius = radius.max(0.0);
        let radius_sq = radius * radius;
        let widest = self.cols.max(self.rows).max(self.layers) as isize;
        let cell_radius = ((radius / self.bucket_size).ceil() as isize).min(widest);

        let position = self.cached[i];
        let [base_x, base_y, base_z] = self.cell_coords(position);

        let min_x = (base_x - cell_radius).max(0);
        let max_x = (base_x + cell_radius).min(self.cols as isize - 1);
        let min_y = (base_y - cell_radius).max(0);
        let max_y = (base_y + cell_radius).min(self.rows as isize - 1);
        let min_z = (base_z - cell_radius).max(0);
        let max_z = (base_z + cell_radius).min(self.layers as isize - 1);

        for cell_z in min_z..=max_z {
            for cell_y in min_y..=max_y {
                for cell_x in min_x..=max_x {
                    let cell = (cell_z as usize * self.rows + cell_y as usize) * self.cols
                        + cell_x as usize;
                    self.scan_cell(cell, i, position, radius_sq, &mut callback);
                }
            }
        }
    }

    fn ensure_layout(&mut self, positions: &[Vec3]) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for position in positions.iter().filter(|p| p.is_finite()) {
            min = min.min(*position);
            max = max.max(*position);
        }
        if !(min.is_finite() && max.is_finite()) {
            min = Vec3::ZERO;
            max = Vec3::ZERO;
        }

        let mut extent = max - min;
        if !extent.is_finite() {
            extent = Vec3::ZERO;
        }
        let budget = positions
            .len()
            .saturating_mul(CELLS_PER_AGENT)
            .clamp(MIN_CELLS, MAX_CELLS);
        let mut bucket_size = self.cell_size * (1.0 + BUCKET_SLACK);
        let (cols, rows, layers) = loop {
            let cols = cells_along(extent.x, bucket_size);
            let rows = cells_along(extent.y, bucket_size);
            let layers = cells_along(extent.z, bucket_size);
            let cells = cols.saturating_mul(rows).saturating_mul(layers);
            if cells <= budget {
                break (cols, rows, layers);
            }
            bucket_size *= 2.0;
        };

        self.origin = min;
        self.bucket_size = bucket_size;
        self.cols = cols;
        self.rows = rows;
        self.layers = layers;
        self.head.resize(cols * rows * layers, INVALID_INDEX);
    }

    fn cell_coords(&self, position: Vec3) -> [isize; 3] {
        let local = (position - self.origin) / self.bucket_size;
        [
            (local.x.floor() as isize).clamp(0, self.cols as isize - 1),
            (local.y.floor() as isize).clamp(0, self.rows as isize - 1),
            (local.z.floor() as isize).clamp(0, self.layers as isize - 1),
        ]
    }

    fn cell_index_for_position(&self, position: Vec3) -> usize {
        let [x, y, z] = self.cell_coords(position);
        (z as usize * self.rows + y as usize) * self.cols + x as usize
    }

    fn scan_cell<F>(&self, cell: usize, i: usize, position: Vec3, radius_sq: f32, callback: &mut F)
    where
        F: FnMut(usize),
    {
        let mut candidate = self.head[cell];

        while candidate != INVALID_INDEX {
            if candidate != i && (self.cached[candidate] - position).length_squared() <= radius_sq
            {
                callback(candidate);
            }

            candidate = self.next[candidate];
        }
    }
}

fn cells_along(extent: f32, bucket_size: f32) -> usize {
    (extent / bucket_size).floor().min(MAX_CELLS as f32) as usize + 1
}

fn sanitize_cell_size(cell_size: f32) -> f32 {
    if cell_size.is_finite() {
        cell_size.max(MIN_CELL_SIZE)
    } else {
        MIN_CELL_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::{NeighborGrid, CELLS_PER_AGENT};
    use glam::Vec3;

    fn sorted_neighbors(grid: &NeighborGrid, i: usize, radius: f32) -> Vec<usize> {
        let mut neighbors = Vec::new();
        grid.for_each_neighbor(i, radius, |j| neighbors.push(j));
        neighbors.sort_unstable();
        neighbors
    }

    #[test]
    fn finds_neighbors_in_known_layout() {
        let positions = vec![
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.5, 1.2, 0.8),
            Vec3::new(8.0, 8.0, 8.0),
            Vec3::new(2.7, 1.1, 1.0),
        ];

        let mut grid = NeighborGrid::new(2.0);
        grid.rebuild(&positions);

        assert_eq!(sorted_neighbors(&grid, 0, 2.0), vec![1, 3]);
        assert_eq!(sorted_neighbors(&grid, 2, 2.0), Vec::<usize>::new());
    }

    #[test]
    fn checks_across_cell_boundaries() {
        let positions = vec![
            Vec3::new(1.9, 1.0, -3.0),
            Vec3::new(2.1, 1.0, -3.0),
            Vec3::new(5.0, 5.0, 5.0),
        ];

        let mut grid = NeighborGrid::new(2.0);
        grid.rebuild(&positions);

        assert_eq!(sorted_neighbors(&grid, 0, 0.25), vec![1]);
        assert_eq!(sorted_neighbors(&grid, 1, 0.25), vec![0]);
    }

    #[test]
    fn radius_larger_than_cell_still_exact() {
        let positions: Vec<Vec3> = (0..20).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let mut grid = NeighborGrid::new(1.0);
        grid.rebuild(&positions);

        assert_eq!(sorted_neighbors(&grid, 10, 3.0), vec![7, 8, 9, 11, 12, 13]);
    }

    #[test]
    fn sparse_world_coarsens_buckets_without_losing_pairs() {
        let positions = vec![
            Vec3::new(-1.0e6, 0.0, 0.0),
            Vec3::new(1.0e6, 1.0e6, 1.0e6),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
        ];
        let mut grid = NeighborGrid::new(0.5);
        grid.rebuild(&positions);

        assert_eq!(sorted_neighbors(&grid, 2, 0.5), vec![3]);
        assert_eq!(sorted_neighbors(&grid, 0, 0.5), Vec::<usize>::new());
    }

    #[test]
    fn small_radius_over_sparse_layout_keeps_bucket_count_bounded() {
        let positions: Vec<Vec3> = (0..100)
            .map(|i| {
                Vec3::new(
                    ((i * 37) % 200) as f32 - 100.0,
                    ((i * 53) % 200) as f32 - 100.0,
                    ((i * 71) % 200) as f32 - 100.0,
                )
            })
            .collect();
        let mut grid = NeighborGrid::new(0.1);
        grid.rebuild(&positions);

        assert!(grid.bucket_count() <= positions.len() * CELLS_PER_AGENT);

        for radius in [0.1, 40.0] {
            for i in 0..positions.len() {
                let expected: Vec<usize> = (0..positions.len())
                    .filter(|&j| {
                        j != i && (positions[j] - positions[i]).length_squared() <= radius * radius
                    })
                    .collect();
                assert_eq!(sorted_neighbors(&grid, i, radius), expected);
            }
        }
    }
}
