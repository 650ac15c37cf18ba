//! Simulated truth particles, their hierarchy and per-hit truth weights.

use crate::error::{Error, LookupError, Result};
use crate::{CaloHit, CartesianVector, HitId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identity of a truth particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct McId(pub u32);

impl fmt::Display for McId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps each truth particle to a related particle (typically its primary).
pub type McRelationMap = BTreeMap<McId, McId>;

/// A simulated truth particle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct McParticle {
    /// Particle identity.
    pub id: McId,
    /// PDG particle code.
    pub pdg: i32,
    /// Total energy (GeV).
    pub energy: f32,
    /// Momentum (GeV/c).
    pub momentum: CartesianVector,
    /// Production vertex.
    pub vertex: CartesianVector,
    /// End point.
    pub endpoint: CartesianVector,
    /// Parent particle, if any.
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<McId>,
    /// Generator interaction code; only present for generator-level records.
    #[cfg_attr(feature = "serde", serde(default))]
    pub nuance_code: Option<i32>,
}

impl McParticle {
    /// Creates a particle at rest at the origin; use the builder methods to fill in kinematics.
    #[must_use]
    pub fn new(id: u32, pdg: i32) -> Self {
        Self {
            id: McId(id),
            pdg,
            energy: 0.0,
            momentum: CartesianVector::default(),
            vertex: CartesianVector::default(),
            endpoint: CartesianVector::default(),
            parent: None,
            nuance_code: None,
        }
    }

    /// Sets the momentum and energy.
    #[must_use]
    pub fn with_momentum(mut self, momentum: CartesianVector, energy: f32) -> Self {
        self.momentum = momentum;
        self.energy = energy;
        self
    }

    /// Sets the vertex and end point.
    #[must_use]
    pub fn with_endpoints(mut self, vertex: CartesianVector, endpoint: CartesianVector) -> Self {
        self.vertex = vertex;
        self.endpoint = endpoint;
        self
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(McId(parent));
        self
    }

    /// Sets the generator interaction code.
    #[must_use]
    pub fn with_nuance_code(mut self, code: i32) -> Self {
        self.nuance_code = Some(code);
        self
    }

    /// Returns true if generator-level information is attached.
    #[inline]
    #[must_use]
    pub fn has_extended_info(&self) -> bool {
        self.nuance_code.is_some()
    }

    /// Returns true for (anti)neutrinos of any flavour.
    #[inline]
    #[must_use]
    pub fn is_neutrino(&self) -> bool {
        is_neutrino_pdg(self.pdg)
    }

    /// Distance from vertex to end point.
    #[must_use]
    pub fn track_length(&self) -> f32 {
        (self.endpoint - self.vertex).magnitude()
    }
}

/// Returns true for the PDG codes of the three neutrino flavours.
#[inline]
#[must_use]
pub fn is_neutrino_pdg(pdg: i32) -> bool {
    matches!(pdg.abs(), 12 | 14 | 16)
}

/// Human readable name for a PDG code.
#[must_use]
pub fn particle_name(pdg: i32) -> String {
    let name = match pdg {
        11 => "e-",
        -11 => "e+",
        13 => "mu-",
        -13 => "mu+",
        12 => "nu_e",
        -12 => "nu_e_bar",
        14 => "nu_mu",
        -14 => "nu_mu_bar",
        16 => "nu_tau",
        -16 => "nu_tau_bar",
        22 => "gamma",
        111 => "pi0",
        211 => "pi+",
        -211 => "pi-",
        321 => "K+",
        -321 => "K-",
        2112 => "neutron",
        2212 => "proton",
        _ => return pdg.to_string(),
    };
    name.to_string()
}

/// Orders particles by descending momentum magnitude, then ascending id.
///
/// A total order, so sorts using it are reproducible regardless of input order.
#[must_use]
pub fn momentum_order(lhs: &McParticle, rhs: &McParticle) -> Ordering {
    rhs.momentum
        .magnitude_squared()
        .total_cmp(&lhs.momentum.magnitude_squared())
        .then_with(|| lhs.id.cmp(&rhs.id))
}

/// Externally owned store of truth particles.
#[derive(Debug, Clone, Default)]
pub struct McStore {
    particles: BTreeMap<McId, McParticle>,
}

impl McStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a particle, replacing any earlier record with the same id.
    pub fn insert(&mut self, particle: McParticle) {
        self.particles.insert(particle.id, particle);
    }

    /// Looks up a particle.
    #[must_use]
    pub fn get(&self, id: McId) -> Option<&McParticle> {
        self.particles.get(&id)
    }

    /// Looks up a particle, failing if absent.
    pub fn particle(&self, id: McId) -> Result<&McParticle> {
        self.get(id)
            .ok_or_else(|| Error::NotFound(format!("truth particle {id}")))
    }

    /// Number of particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Iterates particles in id order.
    pub fn iter(&self) -> impl Iterator<Item = &McParticle> {
        self.particles.values()
    }

    /// Returns true if `id` names a neutrino.
    #[must_use]
    pub fn is_neutrino(&self, id: McId) -> bool {
        self.get(id).is_some_and(McParticle::is_neutrino)
    }

    /// Walks parent links to the top of the chain.
    pub fn root_particle(&self, id: McId) -> Result<McId> {
        self.walk_up(id, |_| false)
    }

    /// Walks parent links until the parent is absent or a neutrino.
    pub fn primary_particle(&self, id: McId) -> Result<McId> {
        self.walk_up(id, |parent| parent.is_neutrino())
    }

    fn walk_up(&self, id: McId, stop_at_parent: impl Fn(&McParticle) -> bool) -> Result<McId> {
        let mut visited = HashSet::new();
        let mut current = self.particle(id)?;

        while let Some(parent_id) = current.parent {
            if !visited.insert(current.id) {
                return Err(Error::InvalidParameter(format!(
                    "truth hierarchy above particle {id} is cyclic"
                )));
            }
            let parent = self.particle(parent_id)?;
            if stop_at_parent(parent) {
                break;
            }
            current = parent;
        }

        Ok(current.id)
    }

    /// Maps every non-neutrino particle to its primary ancestor.
    pub fn primary_relation_map(&self) -> Result<McRelationMap> {
        let mut map = McRelationMap::new();
        for particle in self.iter().filter(|particle| !particle.is_neutrino()) {
            map.insert(particle.id, self.primary_particle(particle.id)?);
        }
        Ok(map)
    }

    /// Sorts ids with [`momentum_order`]; ids absent from the store sort last by id.
    #[must_use]
    pub fn sorted_by_momentum(&self, mut ids: Vec<McId>) -> Vec<McId> {
        ids.sort_by(|a, b| match (self.get(*a), self.get(*b)) {
            (Some(lhs), Some(rhs)) => momentum_order(lhs, rhs),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        });
        ids
    }
}

impl FromIterator<McParticle> for McStore {
    fn from_iter<I: IntoIterator<Item = McParticle>>(iter: I) -> Self {
        let mut store = Self::new();
        for particle in iter {
            store.insert(particle);
        }
        store
    }
}

/// Capability: resolve the truth particle that deposited most of a hit's charge.
pub trait MainParticleLookup {
    /// Returns the dominant contributor, [`LookupError::NotFound`] if the hit has
    /// no truth, or [`LookupError::Failure`] if its truth record is unusable.
    fn main_particle(&self, hit: &CaloHit) -> std::result::Result<McId, LookupError>;
}

/// Per-hit truth weights.
#[derive(Debug, Clone, Default)]
pub struct HitWeightTable {
    weights: HashMap<HitId, Vec<(McId, f32)>>,
}

impl HitWeightTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `particle` contributed `weight` to `hit`.
    pub fn add(&mut self, hit: HitId, particle: McId, weight: f32) {
        self.weights.entry(hit).or_default().push((particle, weight));
    }

    /// Weights recorded for a hit.
    #[must_use]
    pub fn weights(&self, hit: HitId) -> &[(McId, f32)] {
        self.weights.get(&hit).map(Vec::as_slice).unwrap_or_default()
    }
}

impl MainParticleLookup for HitWeightTable {
    fn main_particle(&self, hit: &CaloHit) -> std::result::Result<McId, LookupError> {
        let weights = self.weights(hit.id);
        if weights.is_empty() {
            return Err(LookupError::NotFound);
        }

        let mut best: Option<(McId, f32)> = None;
        for &(particle, weight) in weights {
            if !weight.is_finite() {
                return Err(LookupError::Failure(format!(
                    "non-finite weight {weight} for particle {particle}"
                )));
            }
            let better = match best {
                None => true,
                Some((best_particle, best_weight)) => match weight.total_cmp(&best_weight) {
                    Ordering::Greater => true,
                    Ordering::Equal => particle < best_particle,
                    Ordering::Less => false,
                },
            };
            if better {
                best = Some((particle, weight));
            }
        }

        best.map(|(particle, _)| particle).ok_or(LookupError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HitType;

    fn store() -> McStore {
        // nu(1) -> mu(2) -> e(3) ; nu(1) -> p(4) ; cosmic mu(5) -> e(6)
        [
            McParticle::new(1, 14),
            McParticle::new(2, 13)
                .with_parent(1)
                .with_momentum(CartesianVector::new(0.0, 0.0, 2.0), 2.1),
            McParticle::new(3, 11).with_parent(2),
            McParticle::new(4, 2212)
                .with_parent(1)
                .with_momentum(CartesianVector::new(0.5, 0.0, 0.0), 1.1),
            McParticle::new(5, -13).with_momentum(CartesianVector::new(0.0, 3.0, 0.0), 3.0),
            McParticle::new(6, 11).with_parent(5),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_primary_relation_map() {
        let map = store().primary_relation_map().unwrap();
        assert_eq!(map.get(&McId(2)), Some(&McId(2)));
        assert_eq!(map.get(&McId(3)), Some(&McId(2)));
        assert_eq!(map.get(&McId(4)), Some(&McId(4)));
        assert_eq!(map.get(&McId(6)), Some(&McId(5)));
        assert!(!map.contains_key(&McId(1)));
    }

    #[test]
    fn test_root_particle() {
        let store = store();
        assert_eq!(store.root_particle(McId(3)).unwrap(), McId(1));
        assert_eq!(store.root_particle(McId(6)).unwrap(), McId(5));
        assert!(store.root_particle(McId(99)).is_err());
    }

    #[test]
    fn test_cyclic_hierarchy_is_rejected() {
        let store: McStore = [
            McParticle::new(1, 13).with_parent(2),
            McParticle::new(2, 13).with_parent(1),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            store.root_particle(McId(1)),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_sorted_by_momentum() {
        let store = store();
        let sorted = store.sorted_by_momentum(vec![McId(4), McId(3), McId(2), McId(5), McId(6)]);
        // Zero-momentum particles 3 and 6 tie and fall back to id order.
        assert_eq!(sorted, vec![McId(5), McId(2), McId(4), McId(3), McId(6)]);
    }

    #[test]
    fn test_main_particle_lookup() {
        let mut table = HitWeightTable::new();
        table.add(HitId(1), McId(2), 0.3);
        table.add(HitId(1), McId(3), 0.7);
        table.add(HitId(2), McId(4), 0.5);
        table.add(HitId(2), McId(3), 0.5);
        table.add(HitId(3), McId(4), f32::NAN);

        let hit = |id| CaloHit::new(id, HitType::ViewW, 0.0, 0.0, 1.0);
        assert_eq!(table.main_particle(&hit(1)), Ok(McId(3)));
        assert_eq!(table.main_particle(&hit(2)), Ok(McId(3)));
        assert!(matches!(table.main_particle(&hit(3)), Err(LookupError::Failure(_))));
        assert_eq!(table.main_particle(&hit(4)), Err(LookupError::NotFound));
    }

    #[test]
    fn test_particle_name() {
        assert_eq!(particle_name(13), "mu-");
        assert_eq!(particle_name(1_000_180_400), "1000180400");
    }
}
