//! lartrace-core: Core types for liquid-argon TPC reconstruction bookkeeping.
//!
//! This crate provides the data model shared by the matching, association
//! and consolidation algorithms: hits, clusters, truth particles, the
//! particle-flow object arena and the local trajectory fit.
//!

pub mod cluster;
pub mod error;
pub mod fit;
pub mod geometry;
pub mod hit;
pub mod mc;
pub mod pfo;

pub use cluster::{Cluster, ClusterId};
pub use error::{Error, LookupError, Result};
pub use fit::{LinearTrajectoryFit, TrajectoryFit};
pub use geometry::CartesianVector;
pub use hit::{count_hits_by_type, CaloHit, HitId, HitType, VolumeId};
pub use mc::{
    is_neutrino_pdg, momentum_order, particle_name, HitWeightTable, MainParticleLookup, McId,
    McParticle, McRelationMap, McStore,
};
pub use pfo::{Pfo, PfoArena, PfoId};
