//! Error metrics and the collapse cost policy.
//!
//! A metric keeps per-ring error state keyed by ring representative and
//! answers three questions: what a candidate collapse costs, where a
//! full-edge collapse should place its generated vertex, and how the state
//! of two rings combines once a collapse is applied.
//!
//! The cost policy in front of the metric forbids collapses that would
//! move a locked border vertex, drag a more complex vertex into a simpler
//! one, or pinch the surface at a shared neighbour.

// Grid dimensions don't overflow in practice
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use hashbrown::HashMap;
use mesh_types::{Point3, Triangle, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{LodError, LodResult};
use crate::model::{Model, VertexId};
use crate::params::{ErrorMetric, OperatorKind, QuadricConfig};
use crate::quadric::Quadric;

/// Finite stand-in for costs that overflow or are numerically undefined.
///
/// Saturated collapses still sort after every ordinary collapse but stay
/// eligible, unlike forbidden collapses which cost `f64::INFINITY`.
pub const SATURATED_COST: f64 = 1.0e30;

// ============================================================================
// Permission grid
// ============================================================================

/// Visibility weights sampled on a regular voxel grid.
///
/// Each cell holds a non-negative weight: how visible a change inside that
/// cell is. Moving a vertex costs the distance moved times the largest
/// weight met along the way. Cells holding `f32::INFINITY` are forbidden,
/// as is everything outside the grid.
///
/// # Example
///
/// ```
/// use mesh_lod::PermissionGrid;
/// use mesh_types::Point3;
///
/// // 2x1x1 cells: the left cell is invisible, the right one is forbidden
/// let cells = vec![0.0, f32::INFINITY];
/// let grid = PermissionGrid::new(Point3::origin(), 1.0, [2, 1, 1], cells).unwrap();
///
/// assert_eq!(grid.move_cost(&Point3::new(0.2, 0.5, 0.5), &Point3::new(0.8, 0.5, 0.5)), 0.0);
/// assert!(grid.move_cost(&Point3::new(0.5, 0.5, 0.5), &Point3::new(1.5, 0.5, 0.5)).is_infinite());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PermissionGrid {
    origin: Point3<f64>,
    cell_size: f64,
    dims: [usize; 3],
    weights: Vec<f32>,
}

impl PermissionGrid {
    /// Create a grid. `weights` is indexed `x + dims[0] * (y + dims[1] * z)`.
    ///
    /// # Errors
    ///
    /// Returns [`LodError::InvalidPermissionGrid`] if the cell size is not
    /// positive, a dimension is zero, the weight count does not match the
    /// dimensions, or a weight is negative or NaN.
    pub fn new(
        origin: Point3<f64>,
        cell_size: f64,
        dims: [usize; 3],
        weights: Vec<f32>,
    ) -> LodResult<Self> {
        let invalid = |reason: String| Err(LodError::InvalidPermissionGrid { reason });

        if !cell_size.is_finite() || cell_size <= 0.0 {
            return invalid(format!("cell size {cell_size} must be finite and > 0"));
        }
        if dims.contains(&0) {
            return invalid(format!("dimensions {dims:?} must be non-zero"));
        }
        let expected = dims[0] * dims[1] * dims[2];
        if weights.len() != expected {
            return invalid(format!("expected {expected} weights, got {}", weights.len()));
        }
        if let Some(index) = weights.iter().position(|w| w.is_nan() || *w < 0.0) {
            return invalid(format!("weight {index} is negative or NaN"));
        }

        Ok(Self {
            origin,
            cell_size,
            dims,
            weights,
        })
    }

    /// Minimum corner of the grid.
    #[must_use]
    pub const fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    /// Edge length of one cell.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of cells along each axis.
    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Weight of the cell containing `p`, or `None` outside the grid.
    #[must_use]
    pub fn weight_at(&self, p: &Point3<f64>) -> Option<f32> {
        let local = (p - self.origin) / self.cell_size;
        let mut cell = [0usize; 3];
        for axis in 0..3 {
            let c = local[axis].floor();
            if c < 0.0 || c >= self.dims[axis] as f64 {
                return None;
            }
            cell[axis] = c as usize;
        }
        let index = cell[0] + self.dims[0] * (cell[1] + self.dims[1] * cell[2]);
        self.weights.get(index).copied()
    }

    /// Cost of moving a vertex from `from` to `to`.
    ///
    /// The segment is sampled every half cell.
    #[must_use]
    pub fn move_cost(&self, from: &Point3<f64>, to: &Point3<f64>) -> f64 {
        let delta = to - from;
        let distance = delta.norm();
        let steps = (distance / (self.cell_size * 0.5)).ceil().max(1.0) as usize;

        let mut max_weight = 0.0_f32;
        for k in 0..=steps {
            let p = from + delta * (k as f64 / steps as f64);
            match self.weight_at(&p) {
                Some(w) => max_weight = max_weight.max(w),
                None => return f64::INFINITY,
            }
        }

        if max_weight.is_infinite() {
            f64::INFINITY
        } else {
            distance * f64::from(max_weight)
        }
    }
}

// ============================================================================
// Per-ring metric state
// ============================================================================

/// Sphere enclosing the original vertices merged into a ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoundingSphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl BoundingSphere {
    /// Radius needed around `p` to enclose this sphere.
    fn reach(&self, p: &Point3<f64>) -> f64 {
        (p - self.center).norm() + self.radius
    }

    /// Center of the smallest sphere enclosing both spheres.
    fn enclosing_center(&self, other: &Self) -> Point3<f64> {
        let axis = other.center - self.center;
        let d = axis.norm();
        if d + other.radius <= self.radius || d < f64::EPSILON {
            return self.center;
        }
        if d + self.radius <= other.radius {
            return other.center;
        }
        let radius = (d + self.radius + other.radius) * 0.5;
        self.center + axis * ((radius - self.radius) / d)
    }
}

/// Error state for every live ring, dispatched on the metric kind.
#[derive(Debug, Clone)]
pub(crate) enum MetricState {
    Sphere(HashMap<VertexId, BoundingSphere>),
    Quadric {
        quadrics: HashMap<VertexId, Quadric>,
        config: QuadricConfig,
    },
    PermissionGrid(PermissionGrid),
}

impl MetricState {
    pub fn new(metric: &ErrorMetric, config: QuadricConfig) -> Self {
        match metric {
            ErrorMetric::Sphere => Self::Sphere(HashMap::new()),
            ErrorMetric::Quadric => Self::Quadric {
                quadrics: HashMap::new(),
                config,
            },
            ErrorMetric::PermissionGrid(grid) => Self::PermissionGrid(grid.clone()),
        }
    }

    /// Initialize the state of every ring representative.
    pub fn init(&mut self, model: &Model) {
        match self {
            Self::Sphere(spheres) => {
                spheres.clear();
                for rep in model.representatives() {
                    if let Some(center) = model.position(rep) {
                        spheres.insert(rep, BoundingSphere { center, radius: 0.0 });
                    }
                }
            }
            Self::Quadric { quadrics, config } => {
                quadrics.clear();
                for rep in model.representatives() {
                    quadrics.insert(rep, ring_quadric(model, rep, config));
                }
            }
            Self::PermissionGrid(_) => {}
        }
    }

    /// Geometric cost of merging rings `a` and `b` into a vertex at `p`.
    pub fn cost_at(&self, model: &Model, a: VertexId, b: VertexId, p: &Point3<f64>) -> f64 {
        match self {
            Self::Sphere(spheres) => {
                let sa = sphere_of(spheres, model, a);
                let sb = sphere_of(spheres, model, b);
                sa.reach(p).max(sb.reach(p))
            }
            Self::Quadric { quadrics, .. } => {
                let q = quadric_of(quadrics, a) + quadric_of(quadrics, b);
                let cost = q.evaluate(p).sqrt();
                if cost.is_finite() { cost } else { SATURATED_COST }
            }
            Self::PermissionGrid(grid) => {
                let (Some(pa), Some(pb)) = (model.position(a), model.position(b)) else {
                    return f64::INFINITY;
                };
                grid.move_cost(&pa, p).max(grid.move_cost(&pb, p))
            }
        }
    }

    /// Position for the vertex generated by merging rings `a` and `b`.
    pub fn generate(&self, model: &Model, a: VertexId, b: VertexId) -> Point3<f64> {
        let (Some(pa), Some(pb)) = (model.position(a), model.position(b)) else {
            return model.position(a).or_else(|| model.position(b)).unwrap_or_else(Point3::origin);
        };
        let midpoint = nalgebra::center(&pa, &pb);

        match self {
            Self::Sphere(spheres) => {
                sphere_of(spheres, model, a).enclosing_center(&sphere_of(spheres, model, b))
            }
            Self::Quadric { quadrics, .. } => {
                let q = quadric_of(quadrics, a) + quadric_of(quadrics, b);
                q.optimal_point().unwrap_or_else(|| {
                    best_of(&[pa, pb, midpoint], |p| q.evaluate(p))
                })
            }
            Self::PermissionGrid(_) => {
                best_of(&[midpoint, pa, pb], |p| self.cost_at(model, a, b, p))
            }
        }
    }

    /// Combine the state of rings `a` and `b` into `into`, placed at `p`.
    pub fn merge(
        &mut self,
        model: &Model,
        a: VertexId,
        b: VertexId,
        into: VertexId,
        p: &Point3<f64>,
    ) {
        match self {
            Self::Sphere(spheres) => {
                let sa = sphere_of(spheres, model, a);
                let sb = sphere_of(spheres, model, b);
                let radius = sa.reach(p).max(sb.reach(p));
                spheres.remove(&a);
                spheres.remove(&b);
                spheres.insert(into, BoundingSphere { center: *p, radius });
            }
            Self::Quadric { quadrics, .. } => {
                let q = quadric_of(quadrics, a) + quadric_of(quadrics, b);
                quadrics.remove(&a);
                quadrics.remove(&b);
                quadrics.insert(into, q);
            }
            Self::PermissionGrid(_) => {}
        }
    }

    /// Move the state of `from` to `to` (a ring representative change).
    pub fn transfer(&mut self, from: VertexId, to: Option<VertexId>) {
        match self {
            Self::Sphere(spheres) => {
                if let Some(state) = spheres.remove(&from) {
                    if let Some(to) = to {
                        spheres.insert(to, state);
                    }
                }
            }
            Self::Quadric { quadrics, .. } => {
                if let Some(state) = quadrics.remove(&from) {
                    if let Some(to) = to {
                        quadrics.insert(to, state);
                    }
                }
            }
            Self::PermissionGrid(_) => {}
        }
    }
}

fn sphere_of(
    spheres: &HashMap<VertexId, BoundingSphere>,
    model: &Model,
    v: VertexId,
) -> BoundingSphere {
    spheres.get(&v).copied().unwrap_or_else(|| BoundingSphere {
        center: model.position(v).unwrap_or_else(Point3::origin),
        radius: 0.0,
    })
}

fn quadric_of(quadrics: &HashMap<VertexId, Quadric>, v: VertexId) -> Quadric {
    quadrics.get(&v).copied().unwrap_or_default()
}

fn best_of(candidates: &[Point3<f64>], cost: impl Fn(&Point3<f64>) -> f64) -> Point3<f64> {
    let mut best = candidates[0];
    let mut best_cost = cost(&best);
    for p in &candidates[1..] {
        let c = cost(p);
        if c < best_cost {
            best = *p;
            best_cost = c;
        }
    }
    best
}

/// Sum of face-plane quadrics around a ring, plus border constraints.
fn ring_quadric(model: &Model, rep: VertexId, config: &QuadricConfig) -> Quadric {
    let own = model.representative(rep);

    let mut edge_uses: HashMap<VertexId, u32> = HashMap::new();
    for tri in model.ring_triangles(rep).filter_map(|t| model.triangle(t)) {
        for &corner in &tri.corners {
            let r = model.representative(corner);
            if r != own {
                *edge_uses.entry(r).or_insert(0) += 1;
            }
        }
    }

    let mut q = Quadric::default();
    for tri in model.ring_triangles(rep).filter_map(|t| model.triangle(t)) {
        let Some(points) = tri
            .corners
            .iter()
            .map(|&c| model.position(c))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        let triangle = Triangle::new(points[0], points[1], points[2]);
        let Some(normal) = triangle.normal() else {
            continue;
        };
        let weight = if config.area_weighted { triangle.area() } else { 1.0 };
        q += Quadric::through_point(&normal, &points[0]).scaled(weight);

        if config.border_weight <= 0.0 {
            continue;
        }
        let Some(k) = tri.corners.iter().position(|&c| model.representative(c) == own) else {
            continue;
        };
        for offset in [1, 2] {
            let other = tri.corners[(k + offset) % 3];
            if edge_uses.get(&model.representative(other)) != Some(&1) {
                continue;
            }
            let edge: Vector3<f64> = points[(k + offset) % 3] - points[k];
            let Some(constraint) = edge.cross(&normal).try_normalize(f64::EPSILON) else {
                continue;
            };
            let weight = if config.area_weighted {
                edge.norm_squared()
            } else {
                1.0
            };
            q += Quadric::through_point(&constraint, &points[k])
                .scaled(weight * config.border_weight);
        }
    }
    q
}

// ============================================================================
// Cost policy
// ============================================================================

/// Which endpoints of a full-edge collapse may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Both endpoints move to a generated position.
    MoveBoth,
    /// The source moves onto the destination.
    MoveSource,
    /// The destination moves onto the source.
    MoveDestination,
    /// Neither may move; the collapse is forbidden.
    MoveNeither,
}

/// A costed candidate collapse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CollapsePlan {
    pub cost: f64,
    pub target: Point3<f64>,
    pub kind: MoveKind,
}

impl CollapsePlan {
    fn forbidden(target: Point3<f64>) -> Self {
        Self {
            cost: f64::INFINITY,
            target,
            kind: MoveKind::MoveNeither,
        }
    }
}

/// Corner/edge/interior rank: non-empty ring members plus the border flag.
pub(crate) fn complexity(model: &Model, v: VertexId) -> usize {
    model.nonempty_coincident_count(v) + usize::from(model.is_on_border(v))
}

/// Check whether merging rings `a` and `b` would pinch the surface.
///
/// Every ring adjacent to both must be the third corner of a triangle
/// spanning the collapsed edge.
pub(crate) fn pinches(model: &Model, a: VertexId, b: VertexId) -> bool {
    let ra = model.representative(a);
    let rb = model.representative(b);

    let mut spanning: Vec<VertexId> = Vec::new();
    for tri in model.ring_triangles(a).filter_map(|t| model.triangle(t)) {
        let reps = tri.corners.map(|c| model.representative(c));
        if reps.contains(&rb) {
            spanning.extend(reps.iter().copied().filter(|&r| r != ra && r != rb));
        }
    }

    let nb = model.neighbor_reps(b);
    model
        .neighbor_reps(a)
        .into_iter()
        .filter(|r| *r != rb && nb.binary_search(r).is_ok())
        .any(|r| !spanning.contains(&r))
}

/// Decide which endpoints of a full-edge collapse may move.
pub(crate) fn classify_full_edge(
    model: &Model,
    border_lock: bool,
    a: VertexId,
    b: VertexId,
) -> MoveKind {
    let fixed_a = border_lock && model.is_on_border(a);
    let fixed_b = border_lock && model.is_on_border(b);
    match (fixed_a, fixed_b) {
        (true, true) => return MoveKind::MoveNeither,
        (true, false) => return MoveKind::MoveDestination,
        (false, true) => return MoveKind::MoveSource,
        (false, false) => {}
    }
    match complexity(model, a).cmp(&complexity(model, b)) {
        std::cmp::Ordering::Less => MoveKind::MoveSource,
        std::cmp::Ordering::Greater => MoveKind::MoveDestination,
        std::cmp::Ordering::Equal => MoveKind::MoveBoth,
    }
}

/// Cost and placement of collapsing `src` with `dst`.
///
/// Forbidden collapses cost `f64::INFINITY`; everything else is priced by
/// the metric.
pub(crate) fn plan_collapse(
    model: &Model,
    metric: &MetricState,
    operator: OperatorKind,
    border_lock: bool,
    src: VertexId,
    dst: VertexId,
) -> CollapsePlan {
    let (Some(ps), Some(pd)) = (model.position(src), model.position(dst)) else {
        return CollapsePlan::forbidden(Point3::origin());
    };
    if model.same_ring(src, dst) || !model.rings_adjacent(src, dst) || pinches(model, src, dst) {
        return CollapsePlan::forbidden(pd);
    }

    let (kind, target) = match operator {
        OperatorKind::HalfEdge => {
            if border_lock && model.is_on_border(src) {
                return CollapsePlan::forbidden(pd);
            }
            if complexity(model, src) > complexity(model, dst) {
                return CollapsePlan::forbidden(pd);
            }
            (MoveKind::MoveSource, pd)
        }
        OperatorKind::FullEdge => match classify_full_edge(model, border_lock, src, dst) {
            MoveKind::MoveNeither => return CollapsePlan::forbidden(pd),
            MoveKind::MoveSource => (MoveKind::MoveSource, pd),
            MoveKind::MoveDestination => (MoveKind::MoveDestination, ps),
            MoveKind::MoveBoth => (MoveKind::MoveBoth, metric.generate(model, src, dst)),
        },
    };

    let cost = metric.cost_at(model, src, dst, &target);
    CollapsePlan {
        cost: if cost.is_nan() { SATURATED_COST } else { cost },
        target,
        kind,
    }
}
