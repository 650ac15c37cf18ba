//! Calorimetric hit types.

use crate::CartesianVector;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identity of a hit within an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitId(pub u32);

impl fmt::Display for HitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The readout view a hit (or cluster) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HitType {
    /// Induction plane U.
    ViewU,
    /// Induction plane V.
    ViewV,
    /// Collection plane W.
    ViewW,
    /// 3-D composite built from the three wire views.
    ThreeD,
}

impl HitType {
    /// All 2-D wire views, in readout order.
    pub const TWO_D_VIEWS: [HitType; 3] = [HitType::ViewU, HitType::ViewV, HitType::ViewW];

    /// Returns true for the 3-D composite type.
    #[inline]
    #[must_use]
    pub fn is_three_d(self) -> bool {
        matches!(self, HitType::ThreeD)
    }
}

impl fmt::Display for HitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HitType::ViewU => "U",
            HitType::ViewV => "V",
            HitType::ViewW => "W",
            HitType::ThreeD => "3D",
        };
        f.write_str(name)
    }
}

/// TPC volume and sub-volume a hit was read out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolumeId {
    /// TPC volume identifier.
    pub tpc_volume: u32,
    /// Sub-volume identifier within the TPC volume.
    pub sub_volume: u32,
}

impl VolumeId {
    /// Creates a new volume identifier.
    #[inline]
    #[must_use]
    pub fn new(tpc_volume: u32, sub_volume: u32) -> Self {
        Self {
            tpc_volume,
            sub_volume,
        }
    }
}

/// A single calorimetric hit.
///
/// Hits are immutable; identity is carried by `id`, so copies of a hit held
/// by different clusters or contribution lists refer to the same deposit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CaloHit {
    /// Hit identity.
    pub id: HitId,
    /// Position; `y == 0` for 2-D hits.
    pub position: CartesianVector,
    /// Deposited energy (GeV).
    pub energy: f32,
    /// Readout view.
    pub hit_type: HitType,
    /// Volume identifiers, if the readout provides them.
    #[cfg_attr(feature = "serde", serde(default))]
    pub volume: Option<VolumeId>,
}

impl CaloHit {
    /// Creates a 2-D hit without volume information.
    #[must_use]
    pub fn new(id: u32, hit_type: HitType, x: f32, z: f32, energy: f32) -> Self {
        Self {
            id: HitId(id),
            position: CartesianVector::in_view(x, z),
            energy,
            hit_type,
            volume: None,
        }
    }

    /// Attaches volume identifiers.
    #[must_use]
    pub fn with_volume(mut self, tpc_volume: u32, sub_volume: u32) -> Self {
        self.volume = Some(VolumeId::new(tpc_volume, sub_volume));
        self
    }

    /// Returns true if the hit carries volume identifiers.
    #[inline]
    #[must_use]
    pub fn has_volume_info(&self) -> bool {
        self.volume.is_some()
    }
}

/// Counts the hits of the given type.
#[must_use]
pub fn count_hits_by_type(hit_type: HitType, hits: &[CaloHit]) -> usize {
    hits.iter().filter(|hit| hit.hit_type == hit_type).count()
}
