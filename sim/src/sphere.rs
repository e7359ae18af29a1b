use nestflight_shared::math::DVec3;
use rand::seq::SliceRandom;
use rand::Rng;

/// PI * (3 - sqrt(5)), the spiral step between consecutive cells
const SPIRAL_STEP: f64 = 2.399963229728653;

/// Unit directions of `count` roughly equal-area cells, pole to pole.
pub fn spiral_cells(count: usize) -> Vec<DVec3> {
    let n = count as f64;
    (0..count)
        .map(|i| {
            let k = i as f64 + 0.5;
            let y = 1.0 - 2.0 * k / n;
            let ring = (1.0 - y * y).sqrt();
            let (sin, cos) = (i as f64 * SPIRAL_STEP).sin_cos();
            DVec3::new(cos * ring, y, sin * ring).normalize()
        })
        .collect()
}

/// Hands out surface cells for nests and obstacles so no two objects share one.
pub struct SurfacePlacement {
    directions: Vec<DVec3>,
    /// Shuffled once; allocation pops from the back
    unused: Vec<usize>,
}

impl SurfacePlacement {
    pub fn new(cell_count: usize, rng: &mut impl Rng) -> Self {
        let mut unused: Vec<usize> = (0..cell_count).collect();
        unused.shuffle(rng);
        Self {
            directions: spiral_cells(cell_count),
            unused,
        }
    }

    /// Next free cell, or None once the sphere is full.
    pub fn allocate(&mut self) -> Option<usize> {
        self.unused.pop()
    }

    /// Unit direction from the world centre through a cell.
    pub fn direction(&self, cell: usize) -> DVec3 {
        self.directions[cell]
    }

    pub fn available_count(&self) -> usize {
        self.unused.len()
    }

    pub fn total_count(&self) -> usize {
        self.directions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn cells_are_unit_directions() {
        let cells = spiral_cells(64);
        assert_eq!(cells.len(), 64);
        assert!(cells.iter().all(|c| (c.length() - 1.0).abs() < 1e-9));
    }

    #[test]
    fn neighbours_keep_their_distance() {
        // Equal-area cells on a unit sphere are about sqrt(4*PI/n) apart
        let cells = spiral_cells(200);
        let expected = (4.0 * std::f64::consts::PI / 200.0).sqrt();
        for (i, a) in cells.iter().enumerate() {
            let nearest = cells
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| a.distance(*b))
                .fold(f64::INFINITY, f64::min);
            assert!(
                nearest > expected * 0.5,
                "cell {} has a neighbour at {}",
                i,
                nearest
            );
        }
    }

    #[test]
    fn both_hemispheres_are_covered() {
        let cells = spiral_cells(31);
        let north = cells.iter().filter(|c| c.y > 0.0).count();
        let south = cells.iter().filter(|c| c.y < 0.0).count();
        assert_eq!(north, 15);
        assert_eq!(south, 15);
    }

    #[test]
    fn every_cell_handed_out_once() {
        let mut placement = SurfacePlacement::new(40, &mut ChaCha8Rng::seed_from_u64(9));
        let mut seen = HashSet::new();
        while let Some(cell) = placement.allocate() {
            assert!(seen.insert(cell));
        }
        assert_eq!(seen.len(), 40);
        assert_eq!(placement.available_count(), 0);
        assert_eq!(placement.total_count(), 40);
    }

    #[test]
    fn allocation_order_is_not_pole_to_pole() {
        let mut placement = SurfacePlacement::new(500, &mut ChaCha8Rng::seed_from_u64(9));
        let mut heights = Vec::new();
        for _ in 0..8 {
            let cell = placement.allocate().unwrap();
            heights.push(placement.direction(cell).y);
        }
        let descending = heights.windows(2).all(|w| w[0] >= w[1]);
        let ascending = heights.windows(2).all(|w| w[0] <= w[1]);
        assert!(!descending && !ascending);
    }
}
