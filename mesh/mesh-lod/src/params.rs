//! Parameters for hierarchy construction.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{LodError, LodResult};
use crate::metric::PermissionGrid;

/// The collapse operator used by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OperatorKind {
    /// The source vertex disappears; the destination survives in place.
    #[default]
    HalfEdge,
    /// Both endpoints are replaced by a generated vertex.
    FullEdge,
}

impl OperatorKind {
    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Self::HalfEdge => 0,
            Self::FullEdge => 1,
        }
    }

    pub(crate) const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::HalfEdge),
            1 => Some(Self::FullEdge),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HalfEdge => f.write_str("half-edge"),
            Self::FullEdge => f.write_str("full-edge"),
        }
    }
}

/// The error metric that ranks candidate collapses.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorMetric {
    /// Radius of the sphere enclosing every original vertex merged so far.
    Sphere,
    /// Accumulated plane quadrics; cost is the root of the quadric error.
    #[default]
    Quadric,
    /// Externally computed visibility weights on a voxel grid.
    PermissionGrid(PermissionGrid),
}

impl ErrorMetric {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sphere => "sphere",
            Self::Quadric => "quadric",
            Self::PermissionGrid(_) => "permission-grid",
        }
    }
}

/// When the hierarchy builder takes a snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SnapshotPolicy {
    /// Snapshot whenever the triangle count has dropped by this fraction
    /// relative to the previous snapshot. Must be in `(0, 1)`.
    PercentReduction(f64),
    /// Snapshot when the triangle count first falls to or below each entry.
    /// Entries must strictly decrease.
    TriangleCounts(Vec<usize>),
    /// Snapshot before the first collapse whose cost meets or exceeds each
    /// entry. Entries must strictly increase.
    ErrorThresholds(Vec<f64>),
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::PercentReduction(0.5)
    }
}

/// Tuning for the quadric metric.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuadricConfig {
    /// Weight each face plane by the face area. Default: true
    pub area_weighted: bool,

    /// Weight of the perpendicular constraint planes added along border
    /// edges. Zero disables them. Default: 1.0
    pub border_weight: f64,
}

impl Default for QuadricConfig {
    fn default() -> Self {
        Self {
            area_weighted: true,
            border_weight: 1.0,
        }
    }
}

impl QuadricConfig {
    /// Set the border constraint weight (negative values clamp to zero).
    #[must_use]
    pub fn with_border_weight(mut self, weight: f64) -> Self {
        self.border_weight = weight.max(0.0);
        self
    }

    /// Set area weighting.
    #[must_use]
    pub const fn with_area_weighted(mut self, area_weighted: bool) -> Self {
        self.area_weighted = area_weighted;
        self
    }
}

/// Parameters for [`build_hierarchy`](crate::build_hierarchy).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LodParams {
    /// Collapse operator. Default: half-edge
    pub operator: OperatorKind,

    /// Error metric. Default: quadric
    pub metric: ErrorMetric,

    /// Snapshot policy. Default: 50% reduction per level
    pub policy: SnapshotPolicy,

    /// Distance under which vertices are welded before simplification.
    /// Zero welds only exactly coincident positions. Default: 0.0
    pub weld_tolerance: f64,

    /// Forbid collapses that move a border vertex. Default: false
    pub border_lock: bool,

    /// Quadric metric tuning.
    pub quadric: QuadricConfig,
}

impl LodParams {
    /// Half-edge collapse with the default metric and policy.
    #[must_use]
    pub fn half_edge() -> Self {
        Self::default()
    }

    /// Full-edge collapse with the default metric and policy.
    #[must_use]
    pub fn full_edge() -> Self {
        Self {
            operator: OperatorKind::FullEdge,
            ..Default::default()
        }
    }

    /// Snapshot at each of the given (strictly decreasing) triangle counts.
    #[must_use]
    pub fn with_triangle_counts(counts: Vec<usize>) -> Self {
        Self {
            policy: SnapshotPolicy::TriangleCounts(counts),
            ..Default::default()
        }
    }

    /// Snapshot at each of the given (strictly increasing) error thresholds.
    #[must_use]
    pub fn with_error_thresholds(thresholds: Vec<f64>) -> Self {
        Self {
            policy: SnapshotPolicy::ErrorThresholds(thresholds),
            ..Default::default()
        }
    }

    /// Snapshot every time the triangle count drops by `percent`.
    #[must_use]
    pub fn with_percent_reduction(percent: f64) -> Self {
        Self {
            policy: SnapshotPolicy::PercentReduction(percent),
            ..Default::default()
        }
    }

    /// Set the collapse operator.
    #[must_use]
    pub fn with_operator(mut self, operator: OperatorKind) -> Self {
        self.operator = operator;
        self
    }

    /// Set the error metric.
    #[must_use]
    pub fn with_metric(mut self, metric: ErrorMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the snapshot policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the weld tolerance.
    #[must_use]
    pub fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    /// Set border locking.
    #[must_use]
    pub fn with_border_lock(mut self, lock: bool) -> Self {
        self.border_lock = lock;
        self
    }

    /// Set the quadric tuning.
    #[must_use]
    pub fn with_quadric(mut self, quadric: QuadricConfig) -> Self {
        self.quadric = quadric;
        self
    }

    /// Check the parameters for configuration errors.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found: a negative or
    /// non-finite weld tolerance, a percent outside `(0, 1)`, or a manual
    /// snapshot specification that is empty or wrongly ordered.
    pub fn validate(&self) -> LodResult<()> {
        if !self.weld_tolerance.is_finite() || self.weld_tolerance < 0.0 {
            return Err(LodError::InvalidTolerance(self.weld_tolerance));
        }

        match &self.policy {
            SnapshotPolicy::PercentReduction(p) => {
                if !(*p > 0.0 && *p < 1.0) {
                    return Err(LodError::InvalidPercent(*p));
                }
            }
            SnapshotPolicy::TriangleCounts(counts) => {
                if counts.is_empty() {
                    return Err(LodError::EmptySnapshotSpec);
                }
                if let Some(index) = counts.windows(2).position(|w| w[1] >= w[0]) {
                    return Err(LodError::TriangleSpecNotDecreasing { index: index + 1 });
                }
            }
            SnapshotPolicy::ErrorThresholds(thresholds) => {
                if thresholds.is_empty() {
                    return Err(LodError::EmptySnapshotSpec);
                }
                if let Some(index) = thresholds.iter().position(|t| !t.is_finite() || *t < 0.0) {
                    return Err(LodError::ErrorSpecNotIncreasing { index });
                }
                if let Some(index) = thresholds.windows(2).position(|w| w[1] <= w[0]) {
                    return Err(LodError::ErrorSpecNotIncreasing { index: index + 1 });
                }
            }
        }

        Ok(())
    }
}
