//! Delta-ray identification: parent/daughter association between pfos.
//!
//! A daughter is a short pfo lying close to a much longer one in every 2-D
//! view. Each daughter keeps its single best candidate parent; the resulting
//! map is walked to check that every chain terminates before any link is
//! committed to the pfo hierarchy.

use lartrace_core::error::{Error, Result};
use lartrace_core::{Pfo, PfoArena, PfoId};
use log::{debug, trace};
use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Daughter to its best candidate parent.
pub type PfoAssociationMap = BTreeMap<PfoId, PfoId>;

/// Delta-ray association configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AssociationConfig {
    /// Maximum mean closest-approach distance between daughter and parent clusters (cm).
    pub max_displacement: f32,
    /// Veto cluster pairs read out in different TPC volumes.
    pub check_volume_associations: bool,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            max_displacement: 3.0,
            check_volume_associations: false,
        }
    }
}

impl AssociationConfig {
    /// Sets the maximum displacement.
    #[must_use]
    pub fn with_max_displacement(mut self, max_displacement: f32) -> Self {
        self.max_displacement = max_displacement;
        self
    }

    /// Enables or disables the volume veto.
    #[must_use]
    pub fn with_volume_check(mut self, enabled: bool) -> Self {
        self.check_volume_associations = enabled;
        self
    }

    /// Squared maximum displacement.
    #[must_use]
    pub fn max_displacement_squared(&self) -> f32 {
        self.max_displacement * self.max_displacement
    }
}

/// A daughter with its immediate parent and the root of its association chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The associated daughter.
    pub daughter: PfoId,
    /// Its best candidate parent.
    pub parent: PfoId,
    /// Last node reached by following parent entries.
    pub root: PfoId,
}

/// Delta-ray parent/daughter association.
#[derive(Clone, Debug, Default)]
pub struct DeltaRayIdentification {
    config: AssociationConfig,
}

impl DeltaRayIdentification {
    /// Create with custom configuration.
    #[must_use]
    pub fn new(config: AssociationConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    /// Tests whether `daughter` can hang off `parent`.
    ///
    /// Every 2-D daughter cluster needs a same-view parent cluster at least
    /// twice as long and close by. Returns the mean squared closest-approach
    /// distance over the matched views, or `None` if the pair is incompatible.
    #[allow(clippy::cast_precision_loss)]
    pub fn is_associated(&self, daughter: &Pfo, parent: &Pfo) -> Result<Option<f32>> {
        if daughter.id == parent.id {
            return Ok(None);
        }

        let max_displacement_squared = self.config.max_displacement_squared();
        let mut sum_views = 0_usize;
        let mut sum_delta_squared = 0.0_f32;

        for daughter_cluster in daughter.two_d_clusters() {
            let daughter_length_squared = daughter_cluster.length_squared();
            let mut found_match = false;

            for parent_cluster in &parent.clusters {
                if parent_cluster.hit_type() != daughter_cluster.hit_type() {
                    continue;
                }

                if self.config.check_volume_associations
                    && !daughter_cluster.is_volume_compatible(parent_cluster)
                {
                    continue;
                }

                // The parent must be at least twice as long as the daughter.
                if 4.0 * daughter_length_squared > parent_cluster.length_squared() {
                    break;
                }

                let Some(delta) = parent_cluster.closest_distance(daughter_cluster) else {
                    break;
                };
                let delta_squared = delta * delta;

                if delta_squared > 5.0 * max_displacement_squared {
                    break;
                }

                sum_delta_squared += delta_squared;
                sum_views += 1;
                found_match = true;
            }

            if !found_match {
                return Ok(None);
            }
        }

        if sum_views == 0 {
            return Err(Error::NoMatchedViews {
                daughter: daughter.id,
            });
        }

        let mean_delta_squared = sum_delta_squared / sum_views as f32;
        if mean_delta_squared > max_displacement_squared {
            return Ok(None);
        }

        Ok(Some(mean_delta_squared))
    }

    /// Finds the best parent for every pfo in `pfos`.
    ///
    /// The best parent has the smallest displacement; the first candidate in
    /// input order wins ties. Pfos without a compatible parent get no entry.
    pub fn build_association_map(
        &self,
        arena: &PfoArena,
        pfos: &[PfoId],
    ) -> Result<PfoAssociationMap> {
        let mut association_map = PfoAssociationMap::new();

        for &daughter_id in pfos {
            let daughter = arena.get(daughter_id)?;
            let mut best: Option<(PfoId, f32)> = None;

            for &parent_id in pfos {
                if parent_id == daughter_id {
                    continue;
                }

                let Some(displacement) = self.is_associated(daughter, arena.get(parent_id)?)?
                else {
                    continue;
                };
                trace!("pfo {daughter_id} -> {parent_id}: displacement^2 {displacement}");

                if best.is_none_or(|(_, best_displacement)| displacement < best_displacement) {
                    best = Some((parent_id, displacement));
                }
            }

            if let Some((parent_id, _)) = best {
                association_map.insert(daughter_id, parent_id);
            }
        }

        debug!(
            "{} of {} pfos have a candidate parent",
            association_map.len(),
            pfos.len()
        );
        Ok(association_map)
    }

    /// Resolves every entry of the association map.
    ///
    /// Fails if a chain of parent entries never terminates.
    pub fn resolve_roots(association_map: &PfoAssociationMap) -> Result<Vec<ResolvedLink>> {
        association_map
            .iter()
            .map(|(&daughter, &parent)| {
                let root = Self::root_parent(association_map, daughter)?
                    .ok_or(Error::MissingParent { pfo: daughter })?;
                Ok(ResolvedLink {
                    daughter,
                    parent,
                    root,
                })
            })
            .collect()
    }

    /// Follows parent entries from `pfo` until a node has none.
    ///
    /// Returns `None` if `pfo` itself has no entry.
    fn root_parent(association_map: &PfoAssociationMap, pfo: PfoId) -> Result<Option<PfoId>> {
        let mut visited = HashSet::from([pfo]);
        let mut current = pfo;
        let mut root = None;

        while let Some(&parent) = association_map.get(&current) {
            if !visited.insert(parent) {
                return Err(Error::AssociationCycle { pfo });
            }
            root = Some(parent);
            current = parent;
        }

        Ok(root)
    }

    /// Commits every association as a parent/daughter link.
    ///
    /// Links are written to a copy of the arena that replaces it only once
    /// every link has been accepted, so any failure leaves the arena
    /// untouched. Returns the linked daughters in id order.
    pub fn build_parent_daughter_links(
        arena: &mut PfoArena,
        association_map: &PfoAssociationMap,
    ) -> Result<Vec<PfoId>> {
        let links = Self::resolve_roots(association_map)?;
        let mut staged = arena.clone();
        let mut daughters = Vec::with_capacity(links.len());

        for link in links {
            trace!(
                "linking pfo {} under {} (chain root {})",
                link.daughter,
                link.parent,
                link.root
            );
            staged.set_parent_daughter(link.parent, link.daughter)?;
            daughters.push(link.daughter);
        }

        *arena = staged;
        Ok(daughters)
    }

    /// Full pass: associate, resolve and link. Returns the linked daughters.
    pub fn run(&self, arena: &mut PfoArena, pfos: &[PfoId]) -> Result<Vec<PfoId>> {
        let association_map = self.build_association_map(arena, pfos)?;
        let daughters = Self::build_parent_daughter_links(arena, &association_map)?;
        debug!("identified {} delta-ray daughters", daughters.len());
        Ok(daughters)
    }
}
