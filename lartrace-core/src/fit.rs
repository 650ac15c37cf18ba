//! Local trajectory fits over 2-D clusters.
//!
//! The consolidation engine only needs two things from a fit: the projection
//! of a point onto the fitted trajectory and the decomposition of a point into
//! longitudinal and transverse coordinates. [`TrajectoryFit`] captures that
//! seam; [`LinearTrajectoryFit`] is a straight-line implementation.

use crate::error::{Error, Result};
use crate::{CartesianVector, Cluster};

/// A trajectory fitted to a cluster.
pub trait TrajectoryFit {
    /// The fitted cluster.
    fn cluster(&self) -> &Cluster;

    /// Projects `position` onto the trajectory.
    ///
    /// Returns `None` when the position falls outside the fit's domain.
    fn global_fit_projection(&self, position: &CartesianVector) -> Option<CartesianVector>;

    /// Longitudinal and transverse coordinates of `position`.
    fn local_position(&self, position: &CartesianVector) -> (f32, f32);
}

/// Total least-squares straight line through a cluster in the (x, z) plane.
///
/// The projection domain is the longitudinal extent of the fitted hits.
#[derive(Debug, Clone)]
pub struct LinearTrajectoryFit<'a> {
    cluster: &'a Cluster,
    origin: CartesianVector,
    axis: CartesianVector,
    min_l: f32,
    max_l: f32,
}

impl<'a> LinearTrajectoryFit<'a> {
    /// Fits a line to the cluster's ordered hits.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(cluster: &'a Cluster) -> Result<Self> {
        let hits = cluster.ordered_hits();
        if hits.len() < 2 {
            return Err(Error::InvalidParameter(format!(
                "cannot fit cluster {} with {} hits",
                cluster.id,
                hits.len()
            )));
        }

        let n = hits.len() as f32;
        let (sum_x, sum_z) = hits.iter().fold((0.0, 0.0), |(sx, sz), hit| {
            (sx + hit.position.x, sz + hit.position.z)
        });
        let origin = CartesianVector::in_view(sum_x / n, sum_z / n);

        // Cov = | cxx  cxz |
        //       | cxz  czz |
        let (mut cxx, mut czz, mut cxz) = (0.0_f32, 0.0_f32, 0.0_f32);
        for hit in hits {
            let dx = hit.position.x - origin.x;
            let dz = hit.position.z - origin.z;
            cxx += dx * dx;
            czz += dz * dz;
            cxz += dx * dz;
        }

        let half_trace = 0.5 * (cxx + czz);
        let root = ((0.5 * (cxx - czz)).powi(2) + cxz * cxz).sqrt();
        let lambda = half_trace + root;

        let direction = if cxz.abs() > f32::EPSILON {
            CartesianVector::in_view(lambda - czz, cxz)
        } else if cxx > czz {
            CartesianVector::in_view(1.0, 0.0)
        } else {
            CartesianVector::in_view(0.0, 1.0)
        };

        if lambda < f32::EPSILON {
            return Err(Error::InvalidParameter(format!(
                "cluster {} has no spatial extent",
                cluster.id
            )));
        }

        let mut axis = direction
            .unit_vector()
            .ok_or_else(|| Error::InvalidParameter("degenerate fit direction".to_string()))?;
        if axis.z < 0.0 || (axis.z == 0.0 && axis.x < 0.0) {
            axis = axis * -1.0;
        }

        let mut min_l = f32::MAX;
        let mut max_l = f32::MIN;
        for hit in hits {
            let l = (hit.position - origin).dot(&axis);
            min_l = min_l.min(l);
            max_l = max_l.max(l);
        }

        Ok(Self {
            cluster,
            origin,
            axis,
            min_l,
            max_l,
        })
    }

    /// Unit direction of the fitted line, oriented towards increasing z.
    #[must_use]
    pub fn axis(&self) -> CartesianVector {
        self.axis
    }

    /// Longitudinal extent of the fitted hits.
    #[must_use]
    pub fn longitudinal_range(&self) -> (f32, f32) {
        (self.min_l, self.max_l)
    }
}

impl TrajectoryFit for LinearTrajectoryFit<'_> {
    fn cluster(&self) -> &Cluster {
        self.cluster
    }

    fn global_fit_projection(&self, position: &CartesianVector) -> Option<CartesianVector> {
        let (l, _) = self.local_position(position);
        if l < self.min_l || l > self.max_l {
            return None;
        }
        Some(self.origin + self.axis * l)
    }

    fn local_position(&self, position: &CartesianVector) -> (f32, f32) {
        let displacement = *position - self.origin;
        let l = displacement.dot(&self.axis);
        let t = self.axis.z * displacement.x - self.axis.x * displacement.z;
        (l, t)
    }
}
