//! Greedy cost-ordered collapse scheduler.
//!
//! Every pair of adjacent ring representatives gets an operation (both
//! directions for half-edge collapse, one for full-edge collapse). The
//! cheapest operation is applied, the neighbourhood it touched is re-costed,
//! and the loop repeats until the queue holds only forbidden operations or
//! the hierarchy builder has every level it asked for.

// Operation handles don't overflow in practice
#![allow(clippy::cast_possible_truncation)]

use hashbrown::{HashMap, HashSet};
use mesh_types::{Point3, Vertex, VertexAttributes};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::builder::HierarchyBuilder;
use crate::error::{LodError, LodResult};
use crate::metric::{CollapsePlan, MetricState, MoveKind, plan_collapse};
use crate::model::{Model, TriangleId, VertexId};
use crate::params::{LodParams, OperatorKind};
use crate::queue::{OpId, OpQueue};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Operation {
    source: VertexId,
    destination: VertexId,
    cost: f64,
}

/// What one applied collapse did to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapseRecord {
    /// Source ring representative of the applied operation.
    pub source: VertexId,
    /// Destination ring representative of the applied operation.
    pub destination: VertexId,
    /// Representative of the merged ring, or `None` if nothing survived.
    pub survivor: Option<VertexId>,
    /// Cost the operation was applied at.
    pub cost: f64,
    /// Which endpoints moved.
    pub kind: MoveKind,
    /// Triangles removed: those spanning the edge plus resulting duplicates.
    pub triangles_destroyed: usize,
    /// Triangles whose corners were rewritten.
    pub triangles_changed: usize,
    /// Vertices materialized for the surviving ring.
    pub vertices_created: usize,
}

/// Incremental simplifier over a [`Model`].
///
/// # Example
///
/// ```
/// use mesh_lod::{LodParams, Model, Simplifier};
/// use mesh_types::icosphere;
///
/// let model = Model::from_mesh(&icosphere(1)).unwrap();
/// let mut simplifier = Simplifier::new(model, &LodParams::default()).unwrap();
///
/// let record = simplifier.step().unwrap();
/// assert!(record.triangles_destroyed >= 2);
/// assert_eq!(simplifier.model().triangle_count(), 80 - record.triangles_destroyed);
/// ```
#[derive(Debug)]
pub struct Simplifier {
    model: Model,
    operator: OperatorKind,
    metric: MetricState,
    border_lock: bool,
    ops: Vec<Option<Operation>>,
    incident: HashMap<VertexId, SmallVec<[OpId; 8]>>,
    queue: OpQueue,
    collapses: usize,
}

impl Simplifier {
    /// Initialize metric state and queue every candidate collapse.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or the model has no
    /// triangles.
    pub fn new(model: Model, params: &LodParams) -> LodResult<Self> {
        params.validate()?;
        if model.triangle_count() == 0 {
            return Err(LodError::NoTriangles);
        }

        let mut metric = MetricState::new(&params.metric, params.quadric);
        metric.init(&model);

        let mut simplifier = Self {
            queue: OpQueue::with_capacity(model.vertex_count() * 6),
            model,
            operator: params.operator,
            metric,
            border_lock: params.border_lock,
            ops: Vec::new(),
            incident: HashMap::new(),
            collapses: 0,
        };
        simplifier.init_queue();
        Ok(simplifier)
    }

    fn init_queue(&mut self) {
        let reps: Vec<VertexId> = self.model.representatives().collect();
        for rep in reps {
            for neighbor in self.model.neighbor_reps(rep) {
                if self.operator == OperatorKind::FullEdge && neighbor < rep {
                    continue;
                }
                self.create_op(rep, neighbor);
            }
        }
        debug!(
            operations = self.queue.len(),
            blocked = self.blocked_operations(),
            operator = %self.operator,
            "Initialized collapse queue"
        );
    }

    fn create_op(&mut self, source: VertexId, destination: VertexId) {
        let plan = self.plan(source, destination);
        let id = OpId(self.ops.len() as u32);
        self.ops.push(Some(Operation {
            source,
            destination,
            cost: plan.cost,
        }));
        self.attach(id, source);
        self.attach(id, destination);
        self.queue.push(id, plan.cost);
    }

    fn attach(&mut self, id: OpId, v: VertexId) {
        let list = self.incident.entry(v).or_default();
        if !list.contains(&id) {
            list.push(id);
        }
    }

    fn plan(&self, source: VertexId, destination: VertexId) -> CollapsePlan {
        plan_collapse(
            &self.model,
            &self.metric,
            self.operator,
            self.border_lock,
            source,
            destination,
        )
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The live model.
    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// Consume the simplifier, returning the model.
    #[must_use]
    pub fn into_model(self) -> Model {
        self.model
    }

    /// The collapse operator in use.
    #[must_use]
    pub const fn operator(&self) -> OperatorKind {
        self.operator
    }

    /// Number of collapses applied so far.
    #[must_use]
    pub const fn collapses_performed(&self) -> usize {
        self.collapses
    }

    /// Number of pending operations that are currently forbidden.
    #[must_use]
    pub fn blocked_operations(&self) -> usize {
        self.ops
            .iter()
            .flatten()
            .filter(|op| op.cost.is_infinite())
            .count()
    }

    /// Number of pending operations.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.queue.len()
    }

    /// Cost of the cheapest pending operation.
    #[must_use]
    pub fn peek_cost(&self) -> Option<f64> {
        self.queue.peek().map(|(_, cost)| cost)
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Apply the cheapest legal collapse.
    ///
    /// Returns `None` once only forbidden operations remain.
    pub fn step(&mut self) -> Option<CollapseRecord> {
        let (id, op, plan) = self.next_candidate()?;
        Some(self.apply(id, op, plan))
    }

    /// Collapse until the builder has every level or nothing legal remains.
    pub fn run(&mut self, builder: &mut HierarchyBuilder) {
        builder.observe_initial(&self.model);
        while !builder.is_done() {
            let Some((id, op, plan)) = self.next_candidate() else {
                break;
            };
            if !builder.before_apply(&self.model, plan.cost) {
                break;
            }
            let record = self.apply(id, op, plan);
            builder.after_apply(&self.model, &record);
        }
        debug!(
            collapses = self.collapses,
            triangles = self.model.triangle_count(),
            blocked = self.blocked_operations(),
            exhausted = self.queue.is_empty(),
            "Simplification stopped"
        );
    }

    /// Pop operations until one whose fresh cost is no worse than its queued
    /// cost turns up; stale ones are re-queued at their fresh cost.
    fn next_candidate(&mut self) -> Option<(OpId, Operation, CollapsePlan)> {
        while let Some((id, cached)) = self.queue.peek() {
            if cached.is_infinite() {
                return None;
            }
            self.queue.pop();
            let Some(op) = self.ops.get(id.index()).copied().flatten() else {
                continue;
            };
            let plan = self.plan(op.source, op.destination);
            if plan.cost > cached {
                self.ops[id.index()] = Some(Operation {
                    cost: plan.cost,
                    ..op
                });
                self.queue.push(id, plan.cost);
                continue;
            }
            return Some((id, op, plan));
        }
        None
    }

    // ========================================================================
    // Applying a collapse
    // ========================================================================

    fn apply(&mut self, id: OpId, op: Operation, plan: CollapsePlan) -> CollapseRecord {
        self.ops[id.index()] = None;
        let (s, d) = (op.source, op.destination);
        debug_assert!(
            self.model.is_representative(s) && self.model.is_representative(d),
            "collapse endpoints {s} and {d} must be ring representatives"
        );

        let (from, into) = if plan.kind == MoveKind::MoveDestination {
            (d, s)
        } else {
            (s, d)
        };

        let touched = self.touched_reps(from, into);
        let affected = self.detach_operations(&touched);

        // Triangles spanning the edge degenerate; each one pairs a member of
        // the vanishing ring with the member across the edge
        let mut destroyed = 0;
        let mut partners: HashMap<VertexId, VertexId> = HashMap::new();
        let from_tris: Vec<TriangleId> = self.model.ring_triangles(from).collect();
        for t in from_tris {
            let Some(tri) = self.model.triangle(t).copied() else {
                continue;
            };
            let Some(across) = tri.corners.iter().copied().find(|&c| self.model.same_ring(c, into))
            else {
                continue;
            };
            if let Some(own) = tri
                .corners
                .iter()
                .copied()
                .find(|&c| self.model.same_ring(c, from))
            {
                partners.entry(own).or_insert(across);
            }
            self.model.remove_triangle(t);
            destroyed += 1;
        }

        let mut created = 0;
        let (anchor, changed) = if plan.kind == MoveKind::MoveBoth {
            self.relocate_both(from, into, &partners, plan.target, &mut created)
        } else {
            self.relocate_into(from, into, &partners, plan.target, &mut created)
        };

        if let Some(anchor) = anchor {
            destroyed += self.remove_duplicates(anchor);
        }

        match anchor.map(|a| self.model.representative(a)) {
            Some(rep) => self.metric.merge(&self.model, s, d, rep, &plan.target),
            None => {
                self.metric.transfer(s, None);
                self.metric.transfer(d, None);
            }
        }

        let mut forward = self.collect_empty(&touched, anchor);
        let survivor = anchor.and_then(|a| resolve(&self.model, &forward, a));
        forward.insert(from, survivor);
        if plan.kind == MoveKind::MoveBoth {
            forward.insert(into, survivor);
        }

        self.requeue(affected, &forward);
        self.collapses += 1;

        trace!(
            source = %s,
            destination = %d,
            cost = plan.cost,
            destroyed,
            created,
            triangles = self.model.triangle_count(),
            "Applied collapse"
        );

        CollapseRecord {
            source: s,
            destination: d,
            survivor,
            cost: plan.cost,
            kind: plan.kind,
            triangles_destroyed: destroyed,
            triangles_changed: changed,
            vertices_created: created,
        }
    }

    /// Representatives of every ring sharing a triangle with `a` or `b`.
    fn touched_reps(&self, a: VertexId, b: VertexId) -> Vec<VertexId> {
        let mut reps: Vec<VertexId> = self
            .model
            .ring_triangles(a)
            .chain(self.model.ring_triangles(b))
            .filter_map(|t| self.model.triangle(t))
            .flat_map(|tri| tri.corners)
            .map(|c| self.model.representative(c))
            .collect();
        reps.push(self.model.representative(a));
        reps.push(self.model.representative(b));
        reps.sort_unstable();
        reps.dedup();
        reps
    }

    /// Pull every live operation incident to `reps` out of the queue.
    fn detach_operations(&mut self, reps: &[VertexId]) -> Vec<OpId> {
        let mut affected = Vec::new();
        for rep in reps {
            if let Some(list) = self.incident.remove(rep) {
                affected.extend(
                    list.into_iter()
                        .filter(|id| self.ops.get(id.index()).is_some_and(Option::is_some)),
                );
            }
        }
        affected.sort_unstable();
        affected.dedup();
        for &id in &affected {
            self.queue.remove(id);
        }
        affected
    }

    /// Move the triangles of the `from` ring onto the `into` ring.
    ///
    /// A member goes to the `into` member with identical attributes, else to
    /// its partner across the collapsed edge, else to a new member created
    /// with its own attributes. Returns the survivor anchor and the number of
    /// triangles rewritten.
    fn relocate_into(
        &mut self,
        from: VertexId,
        into: VertexId,
        partners: &HashMap<VertexId, VertexId>,
        position: Point3<f64>,
        created: &mut usize,
    ) -> (Option<VertexId>, usize) {
        let mut anchor = Some(into);
        let mut rewritten = 0;
        let members: Vec<VertexId> = self.model.ring(from).collect();
        for member in members {
            let tris: SmallVec<[TriangleId; 8]> =
                SmallVec::from_slice(self.model.vertex_triangles(member));
            let Some(attributes) = self.model.vertex(member).map(|v| v.vertex.attributes) else {
                continue;
            };
            if tris.is_empty() {
                continue;
            }

            let partner = partners
                .get(&member)
                .copied()
                .filter(|&p| self.model.contains_vertex(p));
            let target = match self.find_member(into, &attributes).or(partner) {
                Some(target) => target,
                None => self.find_or_materialize(&mut anchor, attributes, position, created),
            };
            rewritten += self.repoint(member, &tris, target);
        }
        (anchor, rewritten)
    }

    /// Move the triangles of both rings onto a new ring at `position`.
    ///
    /// Members of the `into` ring blend their attributes with their partner
    /// across the edge; `from` members follow their partner or keep their own
    /// attributes.
    fn relocate_both(
        &mut self,
        from: VertexId,
        into: VertexId,
        partners: &HashMap<VertexId, VertexId>,
        position: Point3<f64>,
        created: &mut usize,
    ) -> (Option<VertexId>, usize) {
        let (Some(ps), Some(pd)) = (self.model.position(from), self.model.position(into)) else {
            return (None, 0);
        };
        let edge = pd - ps;
        let t = if edge.norm_squared() > 0.0 {
            ((position - ps).dot(&edge) / edge.norm_squared()).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let partner_of_into: HashMap<VertexId, VertexId> =
            partners.iter().map(|(&f, &i)| (i, f)).collect();

        let mut anchor = None;
        let mut moved: HashMap<VertexId, VertexId> = HashMap::new();
        let mut rewritten = 0;

        let members: Vec<VertexId> = self.model.ring(into).collect();
        for member in members {
            let tris: SmallVec<[TriangleId; 8]> =
                SmallVec::from_slice(self.model.vertex_triangles(member));
            let Some(own) = self.model.vertex(member).map(|v| v.vertex) else {
                continue;
            };
            if tris.is_empty() {
                continue;
            }
            let partner = partner_of_into
                .get(&member)
                .and_then(|&f| self.model.vertex(f));
            let attributes = match partner {
                Some(partner) => partner.vertex.lerp(&own, t).attributes,
                None => own.attributes,
            };
            let target = self.find_or_materialize(&mut anchor, attributes, position, created);
            moved.insert(member, target);
            rewritten += self.repoint(member, &tris, target);
        }

        let members: Vec<VertexId> = self.model.ring(from).collect();
        for member in members {
            let tris: SmallVec<[TriangleId; 8]> =
                SmallVec::from_slice(self.model.vertex_triangles(member));
            let Some(attributes) = self.model.vertex(member).map(|v| v.vertex.attributes) else {
                continue;
            };
            if tris.is_empty() {
                continue;
            }
            let target = match partners.get(&member).and_then(|p| moved.get(p)) {
                Some(&target) => target,
                None => self.find_or_materialize(&mut anchor, attributes, position, created),
            };
            rewritten += self.repoint(member, &tris, target);
        }

        (anchor, rewritten)
    }

    fn repoint(&mut self, member: VertexId, tris: &[TriangleId], target: VertexId) -> usize {
        tris.iter()
            .filter(|&&t| self.model.replace_corner(t, member, target))
            .count()
    }

    fn find_member(&self, ring: VertexId, attributes: &VertexAttributes) -> Option<VertexId> {
        self.model.ring(ring).find(|&m| {
            self.model
                .vertex(m)
                .is_some_and(|v| v.vertex.attributes == *attributes)
        })
    }

    /// The member of the `anchor` ring with `attributes`, creating it (and
    /// the ring, if there is no anchor yet) when missing.
    fn find_or_materialize(
        &mut self,
        anchor: &mut Option<VertexId>,
        attributes: VertexAttributes,
        position: Point3<f64>,
        created: &mut usize,
    ) -> VertexId {
        if let Some(existing) = anchor.and_then(|a| self.find_member(a, &attributes)) {
            return existing;
        }
        let id = self.model.add_vertex(Vertex {
            position,
            attributes,
        });
        match *anchor {
            Some(a) => self.model.link_coincident(a, id),
            None => *anchor = Some(id),
        }
        *created += 1;
        id
    }

    /// Remove triangles around `anchor` whose rings repeat another
    /// triangle's, keeping the oldest.
    fn remove_duplicates(&mut self, anchor: VertexId) -> usize {
        let mut tris: Vec<TriangleId> = self.model.ring_triangles(anchor).collect();
        tris.sort_unstable();
        tris.dedup();

        let mut seen: HashSet<[VertexId; 3]> = HashSet::with_capacity(tris.len());
        let mut removed = 0;
        for t in tris {
            let Some(mut key) = self
                .model
                .triangle(t)
                .map(|tri| tri.corners.map(|c| self.model.representative(c)))
            else {
                continue;
            };
            key.sort_unstable();
            if !seen.insert(key) {
                self.model.remove_triangle(t);
                removed += 1;
            }
        }
        removed
    }

    /// Drop ring members left without triangles.
    ///
    /// Returns where each ring representative that changed now forwards to
    /// (`None` if its whole ring is gone), moving metric state along.
    fn collect_empty(
        &mut self,
        touched: &[VertexId],
        anchor: Option<VertexId>,
    ) -> HashMap<VertexId, Option<VertexId>> {
        let mut forward = HashMap::new();
        for &ring in touched.iter().chain(anchor.as_ref()) {
            if !self.model.contains_vertex(ring) {
                continue;
            }
            let members: Vec<VertexId> = self.model.ring(ring).collect();
            let Some(&old_rep) = members.iter().min() else {
                continue;
            };
            let (empty, live): (Vec<VertexId>, Vec<VertexId>) = members
                .into_iter()
                .partition(|&m| self.model.vertex_triangles(m).is_empty());
            if empty.is_empty() {
                continue;
            }
            for v in empty {
                self.model.remove_vertex(v);
            }
            let new_rep = live.into_iter().min();
            if new_rep != Some(old_rep) {
                forward.insert(old_rep, new_rep);
                self.metric.transfer(old_rep, new_rep);
            }
        }
        forward
    }

    /// Rewrite affected operations through `forward`, drop the ones that
    /// collapsed onto themselves or repeat another, and re-cost the rest.
    fn requeue(&mut self, affected: Vec<OpId>, forward: &HashMap<VertexId, Option<VertexId>>) {
        let mut pairs: HashSet<(VertexId, VertexId)> = HashSet::with_capacity(affected.len());
        for id in affected {
            let Some(op) = self.ops.get(id.index()).copied().flatten() else {
                continue;
            };
            let endpoints = resolve(&self.model, forward, op.source)
                .zip(resolve(&self.model, forward, op.destination));
            let Some((mut a, mut b)) = endpoints else {
                self.ops[id.index()] = None;
                continue;
            };
            if self.operator == OperatorKind::FullEdge && b < a {
                std::mem::swap(&mut a, &mut b);
            }
            if a == b || !self.model.rings_adjacent(a, b) || !pairs.insert((a, b)) {
                self.ops[id.index()] = None;
                continue;
            }

            let plan = self.plan(a, b);
            self.ops[id.index()] = Some(Operation {
                source: a,
                destination: b,
                cost: plan.cost,
            });
            self.attach(id, a);
            self.attach(id, b);
            self.queue.push(id, plan.cost);
        }
    }
}

fn resolve(
    model: &Model,
    forward: &HashMap<VertexId, Option<VertexId>>,
    v: VertexId,
) -> Option<VertexId> {
    match forward.get(&v) {
        Some(&target) => target,
        None => model.contains_vertex(v).then(|| model.representative(v)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::params::ErrorMetric;
    use mesh_types::{IndexedMesh, grid_plane, icosphere, tetrahedron};

    fn params(operator: OperatorKind, metric: ErrorMetric) -> LodParams {
        LodParams::default().with_operator(operator).with_metric(metric)
    }

    fn run_to_end(simplifier: &mut Simplifier) -> Vec<CollapseRecord> {
        let mut records = Vec::new();
        while let Some(record) = simplifier.step() {
            assert!(simplifier.model().check_triangles());
            assert!(simplifier.model().check_rings());
            records.push(record);
        }
        records
    }

    #[test]
    fn queue_holds_one_or_two_ops_per_edge() {
        // Tetrahedron: 6 edges
        let model = Model::from_mesh(&tetrahedron()).unwrap();
        let half = Simplifier::new(model.clone(), &LodParams::half_edge()).unwrap();
        assert_eq!(half.pending_operations(), 12);

        let full = Simplifier::new(model, &LodParams::full_edge()).unwrap();
        assert_eq!(full.operator(), OperatorKind::FullEdge);
        assert_eq!(full.pending_operations(), 6);
    }

    #[test]
    fn tetrahedron_collapse_filters_duplicate() {
        let model = Model::from_mesh(&tetrahedron()).unwrap();
        let mut simplifier =
            Simplifier::new(model, &params(OperatorKind::HalfEdge, ErrorMetric::Sphere)).unwrap();

        let record = simplifier.step().unwrap();
        // Two spanning triangles plus one of the resulting duplicate pair
        assert_eq!(record.triangles_destroyed, 3);
        assert_eq!(simplifier.model().triangle_count(), 1);
        assert_eq!(record.survivor, Some(record.destination));
        assert!(simplifier.model().check_triangles());
        assert!(!simplifier.model().contains_vertex(record.source));
    }

    #[test]
    fn half_edge_keeps_destination_in_place() {
        let model = Model::from_mesh(&icosphere(1)).unwrap();
        let mut simplifier = Simplifier::new(model.clone(), &LodParams::half_edge()).unwrap();

        for _ in 0..20 {
            let record = simplifier.step().unwrap();
            let survivor = record.survivor.unwrap();
            assert_eq!(survivor, record.destination);
            assert_eq!(
                simplifier.model().position(survivor),
                model.position(record.destination)
            );
        }
        assert_eq!(simplifier.collapses_performed(), 20);
    }

    #[test]
    fn half_edge_runs_to_exhaustion_on_grid() {
        let model = Model::from_mesh(&grid_plane(4, 4)).unwrap();
        let mut simplifier =
            Simplifier::new(model, &params(OperatorKind::HalfEdge, ErrorMetric::Quadric)).unwrap();

        let records = run_to_end(&mut simplifier);
        assert!(!records.is_empty());
        assert!(simplifier.peek_cost().is_none_or(f64::is_infinite));

        let model = simplifier.into_model();
        assert!(model.triangle_count() < 32);
        assert_eq!(model.to_indexed_mesh().face_count(), model.triangle_count());
    }

    #[test]
    fn full_edge_runs_to_exhaustion_on_sphere() {
        let model = Model::from_mesh(&icosphere(1)).unwrap();
        let mut simplifier =
            Simplifier::new(model, &params(OperatorKind::FullEdge, ErrorMetric::Quadric)).unwrap();

        let records = run_to_end(&mut simplifier);
        assert!(!records.is_empty());
        assert!(records.iter().any(|r| r.vertices_created > 0));
        assert!(simplifier.model().triangle_count() < 80);
    }

    #[test]
    fn full_edge_sphere_metric_generates_vertices() {
        let model = Model::from_mesh(&icosphere(1)).unwrap();
        let mut simplifier =
            Simplifier::new(model, &params(OperatorKind::FullEdge, ErrorMetric::Sphere)).unwrap();

        // Every vertex of a closed sphere has equal rank, so both endpoints move
        let record = simplifier.step().unwrap();
        assert_eq!(record.kind, MoveKind::MoveBoth);
        assert_eq!(record.vertices_created, 1);
        let survivor = record.survivor.unwrap();
        assert!(!simplifier.model().contains_vertex(record.source));
        assert!(!simplifier.model().contains_vertex(record.destination));
        assert!(simplifier.model().contains_vertex(survivor));
    }

    #[test]
    fn attribute_seams_materialize_coincident_vertices() {
        // Two quads side by side whose shared column is split in texture space
        //
        // 3---4|5---6
        // |   ||    |
        // 0---1|2---7
        let mut mesh = IndexedMesh::new();
        let positions = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [2.0, 1.0, 0.0],
            [2.0, 0.0, 0.0],
        ];
        let uvs = [
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [1.0, 0.0],
        ];
        for (p, uv) in positions.iter().zip(uvs) {
            mesh.vertices.push(Vertex::from(*p).with_tex_coord(uv));
        }
        mesh.faces = vec![[0, 1, 4], [0, 4, 3], [2, 7, 6], [2, 6, 5]];

        let mut model = Model::from_mesh(&mesh).unwrap();
        crate::weld::weld_vertices(&mut model, 0.0).unwrap();
        assert_eq!(model.ring_size(VertexId(1)), 2);

        let mut simplifier =
            Simplifier::new(model, &params(OperatorKind::HalfEdge, ErrorMetric::Sphere)).unwrap();
        let records = run_to_end(&mut simplifier);
        assert!(!records.is_empty());
        assert!(simplifier.model().check_rings());
    }

    #[test]
    fn border_lock_keeps_border_vertices() {
        let model = Model::from_mesh(&grid_plane(5, 5)).unwrap();
        let border: Vec<VertexId> = model
            .vertex_ids()
            .filter(|&v| model.is_on_border(v))
            .collect();

        let mut simplifier = Simplifier::new(
            model,
            &LodParams::half_edge()
                .with_metric(ErrorMetric::Sphere)
                .with_border_lock(true),
        )
        .unwrap();
        let records = run_to_end(&mut simplifier);

        assert!(!records.is_empty());
        for record in &records {
            assert!(!border.contains(&record.source));
        }
        for v in border {
            assert!(simplifier.model().contains_vertex(v));
        }
        assert!(simplifier.blocked_operations() > 0);
    }

    #[test]
    fn rejects_empty_model() {
        let model = Model::new(mesh_types::AttributeLayout::POSITION_ONLY);
        assert!(matches!(
            Simplifier::new(model, &LodParams::default()),
            Err(LodError::NoTriangles)
        ));
    }
}
