//! Track consolidation: move shower-cluster hits that lie along a track onto the track.
//!
//! For a candidate hit J of a short cluster, I is the nearest hit of the
//! track cluster and K the projection of J onto the track's local trajectory:
//!
//! ```text
//!                  o J
//!  o o o o o o - - x - - - - o o o o o o o
//!           I      K
//! ```
//!
//! J is associated when |JK|^2 < min(max_transverse^2, |IJ|^2, |KI|^2), i.e.
//! it sits on the extrapolated track rather than merely near its hits.

use lartrace_core::error::Result;
use lartrace_core::{CaloHit, Cluster, ClusterId, LinearTrajectoryFit, TrajectoryFit};
use log::{debug, trace};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cluster to the hits it gains or loses.
pub type ClusterToHitMap = BTreeMap<ClusterId, Vec<CaloHit>>;

/// Track consolidation configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ConsolidationConfig {
    /// Maximum distance between a hit and its projection onto the track (cm).
    pub max_transverse_displacement: f32,
    /// Longitudinal span of associated hits above which they are transferred (cm).
    pub min_associated_span: f32,
    /// Fraction of a cluster's hits above which the associated hits are transferred.
    pub min_associated_fraction: f32,
    /// Veto cluster pairs read out in different TPC volumes.
    pub check_volume_associations: bool,
    /// Clusters longer than this are track candidates (cm).
    pub min_track_length: f32,
    /// Clusters shorter than this are shower candidates (cm).
    pub max_cluster_length: f32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_transverse_displacement: 1.0,
            min_associated_span: 1.0,
            min_associated_fraction: 0.5,
            check_volume_associations: false,
            min_track_length: 7.5,
            max_cluster_length: 15.0,
        }
    }
}

impl ConsolidationConfig {
    /// Sets the maximum transverse displacement.
    #[must_use]
    pub fn with_max_transverse_displacement(mut self, value: f32) -> Self {
        self.max_transverse_displacement = value;
        self
    }

    /// Sets the minimum associated span.
    #[must_use]
    pub fn with_min_associated_span(mut self, value: f32) -> Self {
        self.min_associated_span = value;
        self
    }

    /// Sets the minimum associated fraction.
    #[must_use]
    pub fn with_min_associated_fraction(mut self, value: f32) -> Self {
        self.min_associated_fraction = value;
        self
    }

    /// Enables or disables the volume veto.
    #[must_use]
    pub fn with_volume_check(mut self, enabled: bool) -> Self {
        self.check_volume_associations = enabled;
        self
    }

    /// Sets the track and shower candidate length cuts.
    #[must_use]
    pub fn with_length_cuts(mut self, min_track_length: f32, max_cluster_length: f32) -> Self {
        self.min_track_length = min_track_length;
        self.max_cluster_length = max_cluster_length;
        self
    }
}

/// Hits to move between clusters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReclusterPlan {
    /// Hits each track cluster gains.
    pub hits_to_add: ClusterToHitMap,
    /// Hits each shower cluster loses.
    pub hits_to_remove: ClusterToHitMap,
}

impl ReclusterPlan {
    /// Returns true if no hit moves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits_to_remove.values().all(Vec::is_empty)
    }

    /// Number of hits that move.
    #[must_use]
    pub fn n_transferred(&self) -> usize {
        self.hits_to_remove.values().map(Vec::len).sum()
    }

    /// Folds another plan into this one, appending hits for clusters present in both.
    pub fn merge(&mut self, other: ReclusterPlan) {
        for (cluster, hits) in other.hits_to_add {
            self.hits_to_add.entry(cluster).or_default().extend(hits);
        }
        for (cluster, hits) in other.hits_to_remove {
            self.hits_to_remove.entry(cluster).or_default().extend(hits);
        }
    }

    fn is_removed(&self, cluster: ClusterId, hit: &CaloHit) -> bool {
        self.hits_to_remove
            .get(&cluster)
            .is_some_and(|hits| hits.iter().any(|removed| removed.id == hit.id))
    }

    /// Moves the hits. Clusters emptied by the move are dropped.
    pub fn apply(&self, clusters: &mut Vec<Cluster>) -> Result<()> {
        for cluster in clusters.iter_mut() {
            if let Some(hits) = self.hits_to_remove.get(&cluster.id) {
                for hit in hits {
                    cluster.remove_hit(hit.id);
                }
            }
        }

        for cluster in clusters.iter_mut() {
            if let Some(hits) = self.hits_to_add.get(&cluster.id) {
                for hit in hits {
                    cluster.add_hit(*hit)?;
                }
            }
        }

        clusters.retain(|cluster| {
            !(cluster.is_empty() && self.hits_to_remove.contains_key(&cluster.id))
        });
        Ok(())
    }
}

/// Track consolidation.
#[derive(Clone, Debug, Default)]
pub struct TrackConsolidation {
    config: ConsolidationConfig,
}

impl TrackConsolidation {
    /// Create with custom configuration.
    #[must_use]
    pub fn new(config: ConsolidationConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Plans hit transfers from each short cluster to each fitted track.
    ///
    /// A short cluster is only considered against tracks with at least twice
    /// its squared length.
    pub fn reclustered_hits<F: TrajectoryFit>(
        &self,
        track_fits: &[F],
        shower_clusters: &[&Cluster],
    ) -> ReclusterPlan {
        let mut plan = ReclusterPlan::default();

        for fit in track_fits {
            let cluster_i = fit.cluster();
            let length_squared_i = cluster_i.length_squared();

            for &cluster_j in shower_clusters {
                if cluster_i.id == cluster_j.id {
                    continue;
                }

                if 2.0 * cluster_j.length_squared() > length_squared_i {
                    continue;
                }

                self.reclustered_hits_for_pair(fit, cluster_j, &mut plan);
            }
        }

        debug!(
            "planned transfer of {} hits into {} track clusters",
            plan.n_transferred(),
            plan.hits_to_add.len()
        );
        plan
    }

    /// Plans hit transfers from `cluster_j` to the cluster of `fit_i`.
    #[allow(clippy::cast_precision_loss)]
    pub fn reclustered_hits_for_pair<F: TrajectoryFit>(
        &self,
        fit_i: &F,
        cluster_j: &Cluster,
        plan: &mut ReclusterPlan,
    ) {
        let cluster_i = fit_i.cluster();

        if self.config.check_volume_associations && !cluster_i.is_volume_compatible(cluster_j) {
            trace!(
                "clusters {} and {} are in different volumes",
                cluster_i.id,
                cluster_j.id
            );
            return;
        }

        let max_transverse_squared =
            self.config.max_transverse_displacement * self.config.max_transverse_displacement;
        let mut associated_hits = Vec::new();
        let mut l_range: Option<(f32, f32)> = None;

        for hit_j in cluster_j.ordered_hits() {
            let position_j = hit_j.position;
            let Some(position_i) = cluster_i.closest_position(&position_j) else {
                continue;
            };
            let Some(position_k) = fit_i.global_fit_projection(&position_j) else {
                continue;
            };
            let (r_l, _) = fit_i.local_position(&position_k);

            let rsq_ij = (position_i - position_j).magnitude_squared();
            let rsq_jk = (position_j - position_k).magnitude_squared();
            let rsq_ki = (position_k - position_i).magnitude_squared();

            if rsq_jk < max_transverse_squared.min(rsq_ij.min(rsq_ki)) {
                l_range = Some(l_range.map_or((r_l, r_l), |(min_l, max_l)| {
                    (min_l.min(r_l), max_l.max(r_l))
                }));
                associated_hits.push(*hit_j);
            }
        }

        let associated_span = l_range.map_or(0.0, |(min_l, max_l)| max_l - min_l);
        let associated_fraction = if associated_hits.is_empty() {
            0.0
        } else {
            associated_hits.len() as f32 / cluster_j.n_hits() as f32
        };

        if associated_span > self.config.min_associated_span
            || associated_fraction > self.config.min_associated_fraction
        {
            trace!(
                "moving {} hits from cluster {} to {} (span {associated_span}, fraction {associated_fraction})",
                associated_hits.len(),
                cluster_j.id,
                cluster_i.id
            );
            for hit in associated_hits {
                if plan.is_removed(cluster_j.id, &hit) {
                    continue;
                }
                plan.hits_to_add.entry(cluster_i.id).or_default().push(hit);
                plan.hits_to_remove.entry(cluster_j.id).or_default().push(hit);
            }
        }
    }

    /// Full pass over the clusters of one view: fit tracks, plan and apply transfers.
    ///
    /// Clusters are considered longest-first (by hit count, then id). Returns
    /// the applied plan.
    pub fn run(&self, clusters: &mut Vec<Cluster>) -> Result<ReclusterPlan> {
        let plan = {
            let mut sorted: Vec<&Cluster> = clusters.iter().collect();
            sorted.sort_by(|lhs, rhs| rhs.n_hits().cmp(&lhs.n_hits()).then(lhs.id.cmp(&rhs.id)));

            let min_track_squared = self.config.min_track_length * self.config.min_track_length;
            let max_shower_squared = self.config.max_cluster_length * self.config.max_cluster_length;

            let mut track_fits = Vec::new();
            for &cluster in &sorted {
                if cluster.length_squared() <= min_track_squared {
                    continue;
                }
                match LinearTrajectoryFit::new(cluster) {
                    Ok(fit) => track_fits.push(fit),
                    Err(error) => debug!("skipping track candidate {}: {error}", cluster.id),
                }
            }

            let showers: Vec<&Cluster> = sorted
                .into_iter()
                .filter(|cluster| cluster.length_squared() < max_shower_squared)
                .collect();

            self.reclustered_hits(&track_fits, &showers)
        };

        plan.apply(clusters)?;
        Ok(plan)
    }
}
