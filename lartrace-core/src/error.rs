//! Error types for lartrace-core.

use crate::{ClusterId, HitId, McId, PfoId};
use thiserror::Error;

/// Result type alias for lartrace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for lartrace operations.
///
/// Every variant is fatal for the pass that raised it. Tolerated misses
/// (a hit with no truth, a daughter with no compatible parent) never
/// surface as an `Error`; they are absorbed into empty results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A non-neutrino object was passed where a neutrino is required.
    #[error("pfo {pfo} is not a neutrino")]
    NotNeutrino { pfo: PfoId },

    /// A 3-D hit was passed where only 2-D hits are valid.
    #[error("hit {hit} is a 3D hit")]
    ThreeDimensionalHit { hit: HitId },

    /// A cluster mixes hit types.
    #[error("cluster {cluster} contains hits of more than one type")]
    MixedHitTypes { cluster: ClusterId },

    /// Invalid parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A daughter survived the per-cluster checks without a single matched view.
    #[error("association of pfo {daughter} accumulated no matched views")]
    NoMatchedViews { daughter: PfoId },

    /// A parent-chain walk revisited a node.
    #[error("association chain starting at pfo {pfo} does not terminate")]
    AssociationCycle { pfo: PfoId },

    /// A daughter listed in the association map resolved to no parent.
    #[error("no parent recorded for associated pfo {pfo}")]
    MissingParent { pfo: PfoId },

    /// The same truth particle appeared in two independently ranked maps.
    #[error("truth particle {particle} is already present in the ordered list")]
    DuplicateTruthParticle { particle: McId },

    /// The truth lookup failed for a reason other than "not found".
    #[error("truth lookup failed for hit {hit}: {reason}")]
    TruthLookupFailure { hit: HitId, reason: String },

    /// The daughter already has a parent.
    #[error("pfo {daughter} already has a parent")]
    AlreadyHasParent { daughter: PfoId },

    /// Attempted to make a pfo its own parent.
    #[error("pfo {pfo} cannot be its own parent")]
    SelfRelationship { pfo: PfoId },

    /// Unknown pfo identifier.
    #[error("unknown pfo {pfo}")]
    UnknownPfo { pfo: PfoId },

    /// A requested entry was absent where its presence is required.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Outcome of a per-hit truth lookup that did not produce a particle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    /// The hit has no truth information; tolerated by callers.
    #[error("no truth contribution recorded")]
    NotFound,

    /// The truth information is unusable.
    #[error("{0}")]
    Failure(String),
}
