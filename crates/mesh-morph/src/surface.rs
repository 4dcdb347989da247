//! Closest-point queries against a fixed triangle surface.
//!
//! [`SurfaceIndex`] buckets the triangles of a mesh into a uniform grid so
//! that the remesher can pull relaxed vertices back onto the input surface
//! without scanning every triangle.

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::Mesh;
use crate::types::Triangle;

type Cell = (i64, i64, i64);

/// Uniform-grid index over the triangles of a mesh.
#[derive(Debug, Clone)]
pub struct SurfaceIndex {
    triangles: Vec<Triangle>,
    cells: HashMap<Cell, Vec<u32>>,
    cell_size: f64,
    min_cell: Cell,
    max_cell: Cell,
}

impl SurfaceIndex {
    /// Index every (fan-triangulated) face of `mesh`.
    ///
    /// The cell size is the mean longest edge of the triangles, so a typical
    /// triangle overlaps at most eight cells.
    pub fn build(mesh: &Mesh) -> Self {
        let triangles: Vec<Triangle> = mesh.triangles().collect();

        let mean_extent = if triangles.is_empty() {
            0.0
        } else {
            triangles.iter().map(Triangle::max_edge_length).sum::<f64>() / triangles.len() as f64
        };
        let cell_size = if mean_extent.is_finite() && mean_extent > 0.0 {
            mean_extent
        } else {
            1.0
        };

        let mut cells: HashMap<Cell, Vec<u32>> = HashMap::new();
        let mut min_cell = (i64::MAX, i64::MAX, i64::MAX);
        let mut max_cell = (i64::MIN, i64::MIN, i64::MIN);

        for (ti, tri) in triangles.iter().enumerate() {
            let lo = cell_of(&tri.v0.inf(&tri.v1).inf(&tri.v2), cell_size);
            let hi = cell_of(&tri.v0.sup(&tri.v1).sup(&tri.v2), cell_size);
            min_cell = (min_cell.0.min(lo.0), min_cell.1.min(lo.1), min_cell.2.min(lo.2));
            max_cell = (max_cell.0.max(hi.0), max_cell.1.max(hi.1), max_cell.2.max(hi.2));

            for x in lo.0..=hi.0 {
                for y in lo.1..=hi.1 {
                    for z in lo.2..=hi.2 {
                        cells.entry((x, y, z)).or_default().push(ti as u32);
                    }
                }
            }
        }

        Self {
            triangles,
            cells,
            cell_size,
            min_cell,
            max_cell,
        }
    }

    /// Number of indexed triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Closest point on the indexed surface, None if it has no triangles.
    ///
    /// Cells are visited in rings of growing Chebyshev distance around the
    /// query cell. Every point within `r * cell_size` of the query lies in a
    /// cell of ring `r` or closer, so the search stops once the best distance
    /// found is inside that radius.
    pub fn closest_point(&self, p: &Point3<f64>) -> Option<Point3<f64>> {
        if self.triangles.is_empty() {
            return None;
        }

        let c = cell_of(p, self.cell_size);
        let reach = [
            (c.0 - self.min_cell.0).abs(),
            (self.max_cell.0 - c.0).abs(),
            (c.1 - self.min_cell.1).abs(),
            (self.max_cell.1 - c.1).abs(),
            (c.2 - self.min_cell.2).abs(),
            (self.max_cell.2 - c.2).abs(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        let mut best: Option<(f64, Point3<f64>)> = None;
        for r in 0..=reach {
            for dx in -r..=r {
                for dy in -r..=r {
                    for dz in -r..=r {
                        if dx.abs().max(dy.abs()).max(dz.abs()) != r {
                            continue;
                        }
                        let Some(bucket) = self.cells.get(&(c.0 + dx, c.1 + dy, c.2 + dz)) else {
                            continue;
                        };
                        for &ti in bucket {
                            let q = closest_point_on_triangle(p, &self.triangles[ti as usize]);
                            let d2 = (q - p).norm_squared();
                            if best.is_none_or(|(b, _)| d2 < b) {
                                best = Some((d2, q));
                            }
                        }
                    }
                }
            }

            let radius = r as f64 * self.cell_size;
            if let Some((d2, _)) = best
                && d2 <= radius * radius
            {
                break;
            }
        }

        best.map(|(_, q)| q)
    }
}

fn cell_of(p: &Point3<f64>, cell_size: f64) -> Cell {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Closest point to `p` on a triangle, by Voronoi region of the vertices,
/// edges and interior.
pub fn closest_point_on_triangle(p: &Point3<f64>, tri: &Triangle) -> Point3<f64> {
    let (a, b, c) = (tri.v0, tri.v1, tri.v2);
    let ab = b - a;
    let ac = c - a;

    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}
