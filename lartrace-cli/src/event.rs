//! JSON event records.

use lartrace_core::{
    CaloHit, Cluster, HitId, HitType, HitWeightTable, McId, McParticle, McStore, PfoArena, PfoId,
};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::Result;

/// One truth weight of one hit.
#[derive(Debug, Clone, Deserialize)]
pub struct HitWeightRecord {
    pub hit: HitId,
    pub particle: McId,
    pub weight: f32,
}

/// A pfo as stored on disk; `parent` indexes into the event's pfo list.
#[derive(Debug, Clone, Deserialize)]
pub struct PfoRecord {
    pub pdg: i32,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

/// Event record as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    pub hits: Vec<CaloHit>,
    pub mc_particles: Vec<McParticle>,
    pub hit_weights: Vec<HitWeightRecord>,
    pub pfos: Vec<PfoRecord>,
    /// 2-D clusters not (yet) owned by any pfo.
    pub clusters: Vec<Cluster>,
}

/// A loaded, validated event.
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub hits: Vec<CaloHit>,
    pub mc_store: McStore,
    pub weights: HitWeightTable,
    pub arena: PfoArena,
    pub clusters: Vec<Cluster>,
}

impl Event {
    /// Reads and validates an event file.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let record: EventRecord = serde_json::from_reader(reader)?;
        Self::from_record(record)
    }

    /// Validates clusters and builds the pfo hierarchy.
    pub fn from_record(record: EventRecord) -> Result<Self> {
        for cluster in record
            .clusters
            .iter()
            .chain(record.pfos.iter().flat_map(|pfo| pfo.clusters.iter()))
        {
            cluster.validate()?;
        }

        let mut weights = HitWeightTable::new();
        for entry in &record.hit_weights {
            weights.add(entry.hit, entry.particle, entry.weight);
        }

        let mut arena = PfoArena::new();
        let mut links = Vec::new();
        for pfo in record.pfos {
            let id = arena.add(pfo.pdg, pfo.clusters);
            if let Some(parent) = pfo.parent {
                links.push((PfoId(parent), id));
            }
        }
        for (parent, daughter) in links {
            arena.set_parent_daughter(parent, daughter)?;
        }

        Ok(Self {
            hits: record.hits,
            mc_store: record.mc_particles.into_iter().collect(),
            weights,
            arena,
            clusters: record.clusters,
        })
    }

    /// Parentless neutrino pfos.
    pub fn neutrino_pfos(&self) -> Vec<PfoId> {
        self.arena
            .ids()
            .filter(|&id| {
                self.arena
                    .get(id)
                    .is_ok_and(|pfo| pfo.is_neutrino() && pfo.parent().is_none())
            })
            .collect()
    }

    /// Free-standing 2-D clusters grouped by view.
    pub fn clusters_by_view(&self) -> Vec<(HitType, Vec<Cluster>)> {
        HitType::TWO_D_VIEWS
            .iter()
            .map(|&view| {
                let clusters = self
                    .clusters
                    .iter()
                    .filter(|cluster| cluster.hit_type() == view)
                    .cloned()
                    .collect();
                (view, clusters)
            })
            .collect()
    }
}
