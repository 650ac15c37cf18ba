//! Particle-flow objects and the arena that owns their hierarchy.
//!
//! Parent/daughter links are stored as index pairs, so the hierarchy can be
//! walked with visited sets instead of chasing references.

use crate::error::{Error, Result};
use crate::mc::is_neutrino_pdg;
use crate::Cluster;
use std::collections::HashSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a pfo within its [`PfoArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PfoId(pub usize);

impl fmt::Display for PfoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reconstructed particle hypothesis.
#[derive(Debug, Clone)]
pub struct Pfo {
    /// Arena index.
    pub id: PfoId,
    /// Particle hypothesis as a PDG code.
    pub pdg: i32,
    /// Clusters owned by this pfo, 2-D and 3-D.
    pub clusters: Vec<Cluster>,
    parent: Option<PfoId>,
    daughters: Vec<PfoId>,
}

impl Pfo {
    /// Returns true for neutrino hypotheses.
    #[inline]
    #[must_use]
    pub fn is_neutrino(&self) -> bool {
        is_neutrino_pdg(self.pdg)
    }

    /// The parent, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<PfoId> {
        self.parent
    }

    /// Daughters in link order.
    #[inline]
    #[must_use]
    pub fn daughters(&self) -> &[PfoId] {
        &self.daughters
    }

    /// Clusters from the 2-D views.
    pub fn two_d_clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters
            .iter()
            .filter(|cluster| !cluster.hit_type().is_three_d())
    }

    /// Number of ordered hits across 2-D clusters.
    #[must_use]
    pub fn n_two_d_hits(&self) -> usize {
        self.two_d_clusters().map(Cluster::n_hits).sum()
    }
}

/// Owns every pfo of an event.
#[derive(Debug, Clone, Default)]
pub struct PfoArena {
    pfos: Vec<Pfo>,
}

impl PfoArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parentless pfo.
    pub fn add(&mut self, pdg: i32, clusters: Vec<Cluster>) -> PfoId {
        let id = PfoId(self.pfos.len());
        self.pfos.push(Pfo {
            id,
            pdg,
            clusters,
            parent: None,
            daughters: Vec::new(),
        });
        id
    }

    /// Number of pfos.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pfos.len()
    }

    /// Returns true if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pfos.is_empty()
    }

    /// All ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = PfoId> + '_ {
        self.pfos.iter().map(|pfo| pfo.id)
    }

    /// Looks up a pfo.
    pub fn get(&self, id: PfoId) -> Result<&Pfo> {
        self.pfos.get(id.0).ok_or(Error::UnknownPfo { pfo: id })
    }

    /// Returns true if `id` names a neutrino.
    pub fn is_neutrino(&self, id: PfoId) -> Result<bool> {
        Ok(self.get(id)?.is_neutrino())
    }

    /// A final-state pfo is a parentless non-neutrino, or a direct daughter of a neutrino.
    pub fn is_final_state(&self, id: PfoId) -> Result<bool> {
        let pfo = self.get(id)?;
        match pfo.parent {
            None => Ok(!pfo.is_neutrino()),
            Some(parent) => self.is_neutrino(parent),
        }
    }

    /// Every pfo reachable from `inputs` through daughter links, inputs included.
    ///
    /// Depth-first in input and link order; each pfo appears once.
    pub fn all_downstream(&self, inputs: &[PfoId]) -> Result<Vec<PfoId>> {
        let mut seen = HashSet::new();
        let mut output = Vec::new();

        for &input in inputs {
            let mut stack = vec![input];
            while let Some(id) = stack.pop() {
                if !seen.insert(id) {
                    continue;
                }
                let pfo = self.get(id)?;
                output.push(id);
                stack.extend(pfo.daughters.iter().rev().copied());
            }
        }

        Ok(output)
    }

    /// Links `daughter` under `parent`.
    ///
    /// A daughter takes at most one parent, and a link that would close a loop
    /// is refused.
    pub fn set_parent_daughter(&mut self, parent: PfoId, daughter: PfoId) -> Result<()> {
        if parent == daughter {
            return Err(Error::SelfRelationship { pfo: parent });
        }
        self.get(parent)?;
        if self.get(daughter)?.parent.is_some() {
            return Err(Error::AlreadyHasParent { daughter });
        }
        if self.all_downstream(&[daughter])?.contains(&parent) {
            return Err(Error::AssociationCycle { pfo: daughter });
        }

        self.pfos[daughter.0].parent = Some(parent);
        self.pfos[parent.0].daughters.push(daughter);
        Ok(())
    }
}
