//! Two-dimensional hit clusters and their geometric queries.

use crate::error::{Error, Result};
use crate::{CaloHit, CartesianVector, HitId, HitType};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identity of a cluster within an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group of hits from a single view.
///
/// Every hit, ordered or isolated, carries the cluster's `hit_type`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Cluster identity.
    pub id: ClusterId,
    hit_type: HitType,
    ordered_hits: Vec<CaloHit>,
    #[cfg_attr(feature = "serde", serde(default))]
    isolated_hits: Vec<CaloHit>,
}

impl Cluster {
    /// Creates an empty cluster of the given view.
    #[must_use]
    pub fn empty(id: u32, hit_type: HitType) -> Self {
        Self {
            id: ClusterId(id),
            hit_type,
            ordered_hits: Vec::new(),
            isolated_hits: Vec::new(),
        }
    }

    /// Creates a cluster from hits, rejecting hits of any other view.
    pub fn new(id: u32, hit_type: HitType, hits: impl IntoIterator<Item = CaloHit>) -> Result<Self> {
        let mut cluster = Self::empty(id, hit_type);
        for hit in hits {
            cluster.add_hit(hit)?;
        }
        Ok(cluster)
    }

    /// Checks that every hit matches the cluster's view.
    ///
    /// Needed for clusters built without going through [`Cluster::add_hit`],
    /// e.g. deserialized ones.
    pub fn validate(&self) -> Result<()> {
        if self.all_hits().all(|hit| hit.hit_type == self.hit_type) {
            Ok(())
        } else {
            Err(Error::MixedHitTypes { cluster: self.id })
        }
    }

    /// The cluster's view.
    #[inline]
    #[must_use]
    pub fn hit_type(&self) -> HitType {
        self.hit_type
    }

    /// Adds a hit to the ordered list.
    pub fn add_hit(&mut self, hit: CaloHit) -> Result<()> {
        if hit.hit_type != self.hit_type {
            return Err(Error::MixedHitTypes { cluster: self.id });
        }
        self.ordered_hits.push(hit);
        Ok(())
    }

    /// Adds a hit to the isolated list.
    pub fn add_isolated_hit(&mut self, hit: CaloHit) -> Result<()> {
        if hit.hit_type != self.hit_type {
            return Err(Error::MixedHitTypes { cluster: self.id });
        }
        self.isolated_hits.push(hit);
        Ok(())
    }

    /// Removes a hit from the ordered list. Returns false if absent.
    pub fn remove_hit(&mut self, id: HitId) -> bool {
        let before = self.ordered_hits.len();
        self.ordered_hits.retain(|hit| hit.id != id);
        before != self.ordered_hits.len()
    }

    /// Ordered hits.
    #[inline]
    #[must_use]
    pub fn ordered_hits(&self) -> &[CaloHit] {
        &self.ordered_hits
    }

    /// Isolated hits.
    #[inline]
    #[must_use]
    pub fn isolated_hits(&self) -> &[CaloHit] {
        &self.isolated_hits
    }

    /// Ordered hits followed by isolated hits.
    pub fn all_hits(&self) -> impl Iterator<Item = &CaloHit> {
        self.ordered_hits.iter().chain(self.isolated_hits.iter())
    }

    /// Number of ordered hits.
    #[inline]
    #[must_use]
    pub fn n_hits(&self) -> usize {
        self.ordered_hits.len()
    }

    /// Returns true if the cluster has no ordered hits.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered_hits.is_empty()
    }

    /// Compares the volume identifiers of the first hit of each cluster.
    ///
    /// Clusters are never mixed across volumes, so the first hit speaks for the
    /// whole cluster. Empty clusters, and hits without volume information, never veto.
    #[must_use]
    pub fn is_volume_compatible(&self, other: &Cluster) -> bool {
        let first = |cluster: &Cluster| cluster.ordered_hits.first().and_then(|hit| hit.volume);
        match (first(self), first(other)) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => true,
        }
    }

    /// Squared diagonal of the ordered hits' bounding box.
    #[must_use]
    pub fn length_squared(&self) -> f32 {
        let Some(first) = self.ordered_hits.first() else {
            return 0.0;
        };

        let mut min = first.position;
        let mut max = first.position;
        for hit in &self.ordered_hits[1..] {
            let p = hit.position;
            min = CartesianVector::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = CartesianVector::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }

        (max - min).magnitude_squared()
    }

    /// Diagonal of the ordered hits' bounding box.
    #[must_use]
    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Position of the ordered hit closest to `point`.
    #[must_use]
    pub fn closest_position(&self, point: &CartesianVector) -> Option<CartesianVector> {
        self.ordered_hits
            .iter()
            .map(|hit| hit.position)
            .min_by(|a, b| a.distance_squared(point).total_cmp(&b.distance_squared(point)))
    }

    /// Smallest hit-to-hit distance between two clusters.
    #[must_use]
    pub fn closest_distance(&self, other: &Cluster) -> Option<f32> {
        self.ordered_hits
            .iter()
            .flat_map(|a| {
                other
                    .ordered_hits
                    .iter()
                    .map(move |b| a.position.distance_squared(&b.position))
            })
            .min_by(f32::total_cmp)
            .map(f32::sqrt)
    }
}
