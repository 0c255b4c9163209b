#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for point-of-interest proximity queries.
//!
//! Bulk loads planar `[easting, northing]` points into an R-tree and
//! answers closed-radius counts and nearest-neighbor distances. Distances
//! are plain Euclidean in the input's linear unit; the index performs no
//! geodesic correction, so inputs must already be projected.
//!
//! An empty point set never builds a tree. Queries against it return the
//! fallback values directly (zero counts, no nearest neighbor).

use geo::{Distance, Euclidean, Point};
use rstar::RTree;

/// Pre-built R-tree over a fixed set of planar points.
///
/// Constructed once per point subset and queried read-only for every
/// target location.
pub struct PointIndex {
    tree: Option<RTree<[f64; 2]>>,
}

impl PointIndex {
    /// Bulk loads `points` into an R-tree.
    ///
    /// An empty input yields an index with no tree; every query against it
    /// short-circuits.
    #[must_use]
    pub fn build(points: Vec<[f64; 2]>) -> Self {
        if points.is_empty() {
            log::debug!("Skipping R-tree construction for empty point set");
            return Self { tree: None };
        }

        let tree = RTree::bulk_load(points);
        log::debug!("Built R-tree with {} points", tree.size());

        Self { tree: Some(tree) }
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.as_ref().map_or(0, RTree::size)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_none()
    }

    /// Counts indexed points within `radius` of `query`, boundary included.
    ///
    /// A negative radius matches nothing.
    #[must_use]
    pub fn count_within(&self, query: [f64; 2], radius: f64) -> usize {
        let Some(tree) = &self.tree else {
            return 0;
        };
        if radius < 0.0 {
            return 0;
        }

        tree.locate_within_distance(query, radius * radius).count()
    }

    /// Distance from `query` to the closest indexed point, or `None` when
    /// the index is empty.
    #[must_use]
    pub fn nearest_distance(&self, query: [f64; 2]) -> Option<f64> {
        let tree = self.tree.as_ref()?;
        let nearest = tree.nearest_neighbor(&query)?;

        Some(euclidean(query, *nearest))
    }
}

/// Planar Euclidean distance between two `[x, y]` points.
#[must_use]
pub fn euclidean(a: [f64; 2], b: [f64; 2]) -> f64 {
    Euclidean.distance(Point::new(a[0], a[1]), Point::new(b[0], b[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn brute_force_count(points: &[[f64; 2]], query: [f64; 2], radius: f64) -> usize {
        points
            .iter()
            .filter(|p| {
                let dx = p[0] - query[0];
                let dy = p[1] - query[1];
                dx * dx + dy * dy <= radius * radius
            })
            .count()
    }

    #[test]
    fn empty_index_short_circuits() {
        let index = PointIndex::build(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.count_within([0.0, 0.0], 1_000_000.0), 0);
        assert_eq!(index.nearest_distance([0.0, 0.0]), None);
    }

    #[test]
    fn counts_only_points_inside_radius() {
        let index = PointIndex::build(vec![[500.0, 0.0], [1500.0, 0.0]]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.count_within([0.0, 0.0], 1000.0), 1);
        assert_eq!(index.count_within([1000.0, 0.0], 500.0), 2);
    }

    #[test]
    fn radius_boundary_is_closed() {
        let index = PointIndex::build(vec![[1000.0, 0.0], [0.0, 1000.001]]);
        assert_eq!(index.count_within([0.0, 0.0], 1000.0), 1);
    }

    #[test]
    fn zero_radius_counts_coincident_points() {
        let index = PointIndex::build(vec![[10.0, 10.0], [10.0, 10.0], [11.0, 10.0]]);
        assert_eq!(index.count_within([10.0, 10.0], 0.0), 2);
    }

    #[test]
    fn negative_radius_matches_nothing() {
        let index = PointIndex::build(vec![[0.0, 0.0]]);
        assert_eq!(index.count_within([0.0, 0.0], -1.0), 0);
    }

    #[test]
    fn nearest_distance_picks_closest_point() {
        let index = PointIndex::build(vec![[0.0, 0.0], [3000.0, 4000.0]]);
        assert_eq!(index.nearest_distance([0.0, 0.0]), Some(0.0));
        assert_eq!(index.nearest_distance([2000.0, 0.0]), Some(2000.0));
        assert_eq!(index.nearest_distance([3000.0, 4750.0]), Some(750.0));
    }

    #[test]
    fn euclidean_is_planar() {
        assert!((euclidean([0.0, 0.0], [3.0, 4.0]) - 5.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_count_matches_brute_force(
            points in prop::collection::vec((-5000.0..5000.0f64, -5000.0..5000.0f64), 0..60),
            queries in prop::collection::vec((-5000.0..5000.0f64, -5000.0..5000.0f64), 1..10),
            radius in 0.0..4000.0f64,
        ) {
            let points: Vec<[f64; 2]> = points.into_iter().map(|(x, y)| [x, y]).collect();
            let index = PointIndex::build(points.clone());

            for (x, y) in queries {
                let query = [x, y];
                prop_assert_eq!(
                    index.count_within(query, radius),
                    brute_force_count(&points, query, radius)
                );
            }
        }

        #[test]
        fn prop_nearest_matches_brute_force(
            points in prop::collection::vec((-5000.0..5000.0f64, -5000.0..5000.0f64), 1..60),
            x in -5000.0..5000.0f64,
            y in -5000.0..5000.0f64,
        ) {
            let points: Vec<[f64; 2]> = points.into_iter().map(|(px, py)| [px, py]).collect();
            let expected = points
                .iter()
                .map(|p| euclidean([x, y], *p))
                .fold(f64::INFINITY, f64::min);
            let index = PointIndex::build(points);

            let actual = index.nearest_distance([x, y]);
            prop_assert!(actual.is_some());
            prop_assert!((actual.unwrap_or(f64::NAN) - expected).abs() < 1e-9);
        }
    }
}
