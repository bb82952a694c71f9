//! Vertex ordering for hierarchies that share one base buffer per patch.
//!
//! Half-edge collapse never moves a surviving vertex, so every level of a
//! patch can index one growing buffer. Ordering that buffer so vertices
//! still used by coarse levels come first makes each level's vertex set a
//! prefix of it.

use mesh_types::VertexBuffer;
use tracing::debug;

/// Reorder `base` so every level uses a prefix of it.
///
/// Vertices are banded by the coarsest level that uses them, coarsest band
/// first; within a band they keep the order in which levels first used
/// them. Indices in `levels` are rewritten to the new order.
///
/// Returns, per level, the length of the prefix that level needs.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn optimize_shared_layout(
    base: &mut VertexBuffer,
    levels: &mut [&mut Vec<u32>],
) -> Vec<usize> {
    let vertex_count = base.len();
    let mut last_used = vec![0usize; vertex_count];
    let mut first_seen: Vec<u32> = Vec::with_capacity(vertex_count);
    let mut seen = vec![false; vertex_count];

    for (level, indices) in levels.iter().enumerate() {
        for &i in indices.iter() {
            let i = i as usize;
            if i >= vertex_count {
                continue;
            }
            last_used[i] = level;
            if !seen[i] {
                seen[i] = true;
                first_seen.push(i as u32);
            }
        }
    }
    // Vertices no level references go last
    first_seen.extend((0..vertex_count as u32).filter(|&i| !seen[i as usize]));

    let mut order = first_seen;
    order.sort_by_key(|&i| std::cmp::Reverse(last_used[i as usize]));

    let mut new_index = vec![0u32; vertex_count];
    for (new, &old) in order.iter().enumerate() {
        new_index[old as usize] = new as u32;
    }
    for indices in levels.iter_mut() {
        for i in indices.iter_mut() {
            if let Some(&mapped) = new_index.get(*i as usize) {
                *i = mapped;
            }
        }
    }
    base.permute(&order);

    let bounds: Vec<usize> = (0..levels.len())
        .map(|level| {
            order
                .iter()
                .take_while(|&&i| seen[i as usize] && last_used[i as usize] >= level)
                .count()
        })
        .collect();

    debug!(
        vertices = vertex_count,
        levels = levels.len(),
        coarsest = bounds.last().copied().unwrap_or(0),
        "Optimized shared vertex layout"
    );
    bounds
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use mesh_types::{AttributeLayout, Vertex};

    fn buffer(n: usize) -> VertexBuffer {
        let mut buffer = VertexBuffer::new(AttributeLayout::POSITION_ONLY);
        for i in 0..n {
            buffer.push(&Vertex::from_coords(i as f64, 0.0, 0.0));
        }
        buffer
    }

    #[test]
    fn coarse_vertices_move_to_the_front() {
        let mut base = buffer(6);
        let mut l0 = vec![0, 1, 2, 2, 3, 4, 4, 5, 0];
        let mut l1 = vec![2, 4, 5];
        let mut l2 = vec![5, 4, 2];

        let bounds = optimize_shared_layout(&mut base, &mut [&mut l0, &mut l1, &mut l2]);
        assert_eq!(bounds, vec![6, 3, 3]);

        // Every level only indexes its prefix
        for (indices, &bound) in [&l0, &l1, &l2].iter().zip(&bounds) {
            assert!(indices.iter().all(|&i| (i as usize) < bound));
        }
        // Positions travel with their vertices
        assert_eq!(base.position(l1[0] as usize).unwrap().x, 2.0);
        assert_eq!(base.position(l2[0] as usize).unwrap().x, 5.0);
    }

    #[test]
    fn late_vertices_stay_inside_their_levels_prefix() {
        // Vertex 3 only appears from level 1 on
        let mut base = buffer(4);
        let mut l0 = vec![0, 1, 2];
        let mut l1 = vec![0, 3, 2];
        let mut l2 = vec![3, 2, 0];

        let bounds = optimize_shared_layout(&mut base, &mut [&mut l0, &mut l1, &mut l2]);
        assert_eq!(bounds, vec![4, 3, 3]);
        for (indices, &bound) in [&l0, &l1, &l2].iter().zip(&bounds) {
            assert!(indices.iter().all(|&i| (i as usize) < bound));
        }
        assert_eq!(base.position(l1[1] as usize).unwrap().x, 3.0);
    }
}
