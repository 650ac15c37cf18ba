//! Truth attribution: hits to truth particles, pfos to truth particles.
//!
//! All tables are keyed by ordered maps, and every best-match selection runs
//! over an explicitly sorted key list, so results never depend on the order
//! in which callers supplied their inputs.

use lartrace_core::error::{Error, LookupError, Result};
use lartrace_core::{
    CaloHit, HitId, MainParticleLookup, McId, McRelationMap, McStore, PfoArena, PfoId,
};
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};

/// A list of hits, in contribution order.
pub type CaloHitList = Vec<CaloHit>;
/// Set of hit identities a matching pass is restricted to.
pub type HitSet = HashSet<HitId>;
/// Hit to (primary) truth particle.
pub type HitToMcMap = BTreeMap<HitId, McId>;
/// Hit to the pfo it was clustered into.
pub type HitToPfoMap = BTreeMap<HitId, PfoId>;
/// Truth particle to the hits it contributed.
pub type McContributionMap = BTreeMap<McId, CaloHitList>;
/// Pfo to the hits it contributed.
pub type PfoContributionMap = BTreeMap<PfoId, CaloHitList>;
/// Truth particle to its best-matched pfo.
pub type McToPfoMap = BTreeMap<McId, PfoId>;
/// Truth particle to every pfo sharing hits with it.
pub type McToPfoMatchingMap = BTreeMap<McId, PfoContributionMap>;

/// Both directions of the hit/truth attribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TruthHitMatches {
    /// Each hit's primary truth particle.
    pub hit_to_primary: HitToMcMap,
    /// Each primary truth particle's hits.
    pub primary_to_hits: McContributionMap,
}

/// Both directions of the hit/pfo attribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PfoHitMatches {
    /// Each hit's pfo.
    pub hit_to_pfo: HitToPfoMap,
    /// Each pfo's hits.
    pub pfo_to_hits: PfoContributionMap,
}

/// Result of matching pfos to truth particles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PfoMatches {
    /// Best pfo per truth particle.
    pub best_pfo: McToPfoMap,
    /// Hits shared between each truth particle and its best pfo.
    pub best_pfo_hits: McContributionMap,
    /// Every truth particle/pfo overlap.
    pub all_matches: McToPfoMatchingMap,
}

/// Builds a [`HitSet`] from a hit list.
#[must_use]
pub fn hit_set(hits: &[CaloHit]) -> HitSet {
    hits.iter().map(|hit| hit.id).collect()
}

/// Picks the key with the strictly largest count; the first key wins ties.
fn first_largest<K: Copy>(order: &[K], count: impl Fn(K) -> usize) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for &key in order {
        let n = count(key);
        if n > best.map_or(0, |(_, best_n)| best_n) {
            best = Some((key, n));
        }
    }
    best.map(|(key, _)| key)
}

/// Sorts pfos by descending 2-D hit count, ties broken by id.
fn sorted_by_n_hits(arena: &PfoArena, ids: impl IntoIterator<Item = PfoId>) -> Result<Vec<PfoId>> {
    let mut keyed = ids
        .into_iter()
        .map(|id| Ok((arena.get(id)?.n_two_d_hits(), id)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|(lhs_n, lhs_id), (rhs_n, rhs_id)| rhs_n.cmp(lhs_n).then(lhs_id.cmp(rhs_id)));
    Ok(keyed.into_iter().map(|(_, id)| id).collect())
}

/// Selects the pfos that matching should target.
///
/// With `primary_only`, final-state pfos are kept, and a parentless neutrino
/// is replaced by its daughters. Otherwise every pfo downstream of the inputs
/// is kept, except neutrinos. Output follows input traversal order.
pub fn extract_target_pfos(
    arena: &PfoArena,
    inputs: &[PfoId],
    primary_only: bool,
) -> Result<Vec<PfoId>> {
    let mut output = Vec::new();

    if primary_only {
        for &id in inputs {
            let pfo = arena.get(id)?;
            if arena.is_final_state(id)? {
                output.push(id);
            } else if pfo.parent().is_none() && pfo.is_neutrino() {
                output.extend_from_slice(pfo.daughters());
            }
        }
    } else {
        for id in arena.all_downstream(inputs)? {
            if !arena.is_neutrino(id)? {
                output.push(id);
            }
        }
    }

    Ok(output)
}

/// Gathers the ordered and isolated hits of every 2-D cluster of the given pfos.
pub fn collect_hits(arena: &PfoArena, pfos: &[PfoId]) -> Result<CaloHitList> {
    let mut hits = CaloHitList::new();
    for &id in pfos {
        for cluster in arena.get(id)?.two_d_clusters() {
            for hit in cluster.all_hits() {
                if hit.hit_type.is_three_d() {
                    return Err(Error::ThreeDimensionalHit { hit: hit.id });
                }
                hits.push(*hit);
            }
        }
    }
    Ok(hits)
}

/// Attributes each hit to the primary ancestor of its main truth contributor.
///
/// Hits without truth, or whose contributor has no primary, are skipped.
/// Any other lookup failure aborts the pass.
pub fn attribute_hits_to_truth(
    hits: &[CaloHit],
    mc_to_primary: &McRelationMap,
    lookup: &impl MainParticleLookup,
) -> Result<TruthHitMatches> {
    let mut matches = TruthHitMatches::default();

    for hit in hits {
        let particle = match lookup.main_particle(hit) {
            Ok(particle) => particle,
            Err(LookupError::NotFound) => continue,
            Err(LookupError::Failure(reason)) => {
                return Err(Error::TruthLookupFailure {
                    hit: hit.id,
                    reason,
                })
            }
        };

        let Some(&primary) = mc_to_primary.get(&particle) else {
            continue;
        };

        matches.primary_to_hits.entry(primary).or_default().push(*hit);
        matches.hit_to_primary.insert(hit.id, primary);
    }

    debug!(
        "attributed {} of {} hits to {} primaries",
        matches.hit_to_primary.len(),
        hits.len(),
        matches.primary_to_hits.len()
    );
    Ok(matches)
}

/// Attributes the hits in `hit_set` to the pfos that clustered them.
///
/// With `collapse_to_primary`, only final-state pfos are keyed, and each one
/// collects the hits of all its descendants.
pub fn attribute_hits_to_pfos(
    hit_set: &HitSet,
    arena: &PfoArena,
    pfos: &[PfoId],
    collapse_to_primary: bool,
) -> Result<PfoHitMatches> {
    let mut matches = PfoHitMatches::default();

    for &id in pfos {
        let sources = if collapse_to_primary {
            if !arena.is_final_state(id)? {
                continue;
            }
            arena.all_downstream(&[id])?
        } else {
            vec![id]
        };

        let mut pfo_hits = CaloHitList::new();
        for source in sources {
            for cluster in arena.get(source)?.two_d_clusters() {
                for hit in cluster.all_hits() {
                    if hit.hit_type.is_three_d() {
                        return Err(Error::ThreeDimensionalHit { hit: hit.id });
                    }
                    if !hit_set.contains(&hit.id) {
                        continue;
                    }
                    matches.hit_to_pfo.insert(hit.id, id);
                    pfo_hits.push(*hit);
                }
            }
        }

        matches.pfo_to_hits.entry(id).or_default().extend(pfo_hits);
    }

    Ok(matches)
}

/// Matches each primary truth particle to the pfo sharing most of its hits.
///
/// Pfos are visited by descending hit count (ties by id), and the first pfo
/// with the strictly largest overlap wins.
pub fn attribute_pfos_to_truth(
    hit_set: &HitSet,
    arena: &PfoArena,
    pfo_to_hits: &PfoContributionMap,
    hit_to_primary: &HitToMcMap,
    mc_store: &McStore,
) -> Result<PfoMatches> {
    let mut matches = PfoMatches::default();

    for pfo in sorted_by_n_hits(arena, pfo_to_hits.keys().copied())? {
        for hit in &pfo_to_hits[&pfo] {
            if hit.hit_type.is_three_d() {
                return Err(Error::ThreeDimensionalHit { hit: hit.id });
            }
            if !hit_set.contains(&hit.id) {
                continue;
            }
            let Some(&primary) = hit_to_primary.get(&hit.id) else {
                continue;
            };
            matches
                .all_matches
                .entry(primary)
                .or_default()
                .entry(pfo)
                .or_default()
                .push(*hit);
        }
    }

    let particles = mc_store.sorted_by_momentum(matches.all_matches.keys().copied().collect());
    for primary in particles {
        let contributions = &matches.all_matches[&primary];
        let candidates = sorted_by_n_hits(arena, contributions.keys().copied())?;

        if let Some(best) = first_largest(&candidates, |pfo| contributions[&pfo].len()) {
            matches.best_pfo.insert(primary, best);
            matches
                .best_pfo_hits
                .insert(primary, contributions[&best].clone());
        }
    }

    debug!(
        "matched {} of {} primaries to pfos",
        matches.best_pfo.len(),
        matches.all_matches.len()
    );
    Ok(matches)
}

/// Matches each reconstructed neutrino to the truth neutrino behind most of its hits.
///
/// Every input must be a neutrino pfo. Hits whose primary does not descend
/// from a truth neutrino, or whose ancestry is missing from `mc_store`, are
/// ignored; a pfo left without contributors is omitted from the output.
pub fn attribute_neutrino_truth(
    hit_set: &HitSet,
    arena: &PfoArena,
    neutrinos: &[PfoId],
    hit_to_primary: &HitToMcMap,
    mc_store: &McStore,
) -> Result<McToPfoMap> {
    let mut output = McToPfoMap::new();

    for &neutrino_pfo in neutrinos {
        if !arena.is_neutrino(neutrino_pfo)? {
            return Err(Error::NotNeutrino { pfo: neutrino_pfo });
        }

        let downstream = arena.all_downstream(&[neutrino_pfo])?;
        let mut contributions = McContributionMap::new();

        for hit in collect_hits(arena, &downstream)? {
            if !hit_set.contains(&hit.id) {
                continue;
            }
            let Some(&primary) = hit_to_primary.get(&hit.id) else {
                continue;
            };
            let truth_neutrino = match mc_store.root_particle(primary) {
                Ok(root) => root,
                Err(Error::NotFound(_)) => continue,
                Err(error) => return Err(error),
            };
            if !mc_store.is_neutrino(truth_neutrino) {
                continue;
            }
            contributions.entry(truth_neutrino).or_default().push(hit);
        }

        let particles = mc_store.sorted_by_momentum(contributions.keys().copied().collect());
        match first_largest(&particles, |particle| contributions[&particle].len()) {
            Some(best) => {
                output.insert(best, neutrino_pfo);
            }
            None => warn!("neutrino pfo {neutrino_pfo} has no truth neutrino contribution"),
        }
    }

    Ok(output)
}

/// Orders the particles of each map by descending hit count (ties by id) and concatenates.
///
/// The maps must be disjoint; a particle appearing twice is an error.
pub fn rank_truth_particles(maps: &[McContributionMap]) -> Result<Vec<McId>> {
    let mut ordered = Vec::new();

    for map in maps {
        let mut entries: Vec<(McId, usize)> =
            map.iter().map(|(&particle, hits)| (particle, hits.len())).collect();
        entries.sort_by(|(lhs_id, lhs_n), (rhs_id, rhs_n)| rhs_n.cmp(lhs_n).then(lhs_id.cmp(rhs_id)));
        ordered.extend(entries.into_iter().map(|(particle, _)| particle));
    }

    let mut seen = HashSet::with_capacity(ordered.len());
    if let Some(&particle) = ordered.iter().find(|particle| !seen.insert(**particle)) {
        return Err(Error::DuplicateTruthParticle { particle });
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lartrace_core::{CartesianVector, Cluster, HitType, HitWeightTable, McParticle};

    fn hits(first_id: u32, n: u32, hit_type: HitType) -> Vec<CaloHit> {
        (first_id..first_id + n)
            .map(|id| CaloHit::new(id, hit_type, 0.0, id as f32, 1.0))
            .collect()
    }

    fn cluster(id: u32, hits: &[CaloHit]) -> Cluster {
        Cluster::new(id, hits[0].hit_type, hits.iter().copied()).unwrap()
    }

    #[test]
    fn test_first_largest_keeps_first_on_ties() {
        let order = [3, 1, 2];
        assert_eq!(first_largest(&order, |k| if k == 3 { 1 } else { 4 }), Some(1));
        assert_eq!(first_largest(&order, |_| 0), None);
    }

    #[test]
    fn test_extract_primary_targets() {
        let mut arena = PfoArena::new();
        let nu = arena.add(12, Vec::new());
        let e = arena.add(11, Vec::new());
        let p = arena.add(2212, Vec::new());
        let delta = arena.add(11, Vec::new());
        let cosmic = arena.add(13, Vec::new());
        arena.set_parent_daughter(nu, e).unwrap();
        arena.set_parent_daughter(nu, p).unwrap();
        arena.set_parent_daughter(cosmic, delta).unwrap();

        let targets = extract_target_pfos(&arena, &[cosmic, nu, delta], true).unwrap();
        assert_eq!(targets, vec![cosmic, e, p]);

        let targets = extract_target_pfos(&arena, &[nu, cosmic], false).unwrap();
        assert_eq!(targets, vec![e, p, cosmic, delta]);
    }

    #[test]
    fn test_hit_truth_lookup_failure_aborts() {
        let hits = hits(0, 3, HitType::ViewW);
        let mut table = HitWeightTable::new();
        table.add(HitId(0), McId(1), 1.0);
        table.add(HitId(2), McId(1), f32::INFINITY);
        let primaries: McRelationMap = [(McId(1), McId(1))].into_iter().collect();

        let result = attribute_hits_to_truth(&hits, &primaries, &table);
        assert!(matches!(
            result,
            Err(Error::TruthLookupFailure { hit: HitId(2), .. })
        ));
    }

    #[test]
    fn test_hits_to_pfos_collapsed() {
        let mut arena = PfoArena::new();
        let mu_hits = hits(0, 4, HitType::ViewU);
        let delta_hits = hits(10, 2, HitType::ViewU);
        let mu = arena.add(13, vec![cluster(1, &mu_hits)]);
        let delta = arena.add(11, vec![cluster(2, &delta_hits)]);
        arena.set_parent_daughter(mu, delta).unwrap();

        let mut all = mu_hits.clone();
        all.extend(delta_hits.iter().copied());
        let set = hit_set(&all[1..]);

        let flat = attribute_hits_to_pfos(&set, &arena, &[mu, delta], false).unwrap();
        assert_eq!(flat.pfo_to_hits[&mu].len(), 3);
        assert_eq!(flat.pfo_to_hits[&delta].len(), 2);
        assert_eq!(flat.hit_to_pfo[&HitId(10)], delta);

        let collapsed = attribute_hits_to_pfos(&set, &arena, &[mu, delta], true).unwrap();
        assert_eq!(collapsed.pfo_to_hits.len(), 1);
        assert_eq!(collapsed.pfo_to_hits[&mu].len(), 5);
        assert_eq!(collapsed.hit_to_pfo[&HitId(10)], mu);
    }

    #[test]
    fn test_pfo_truth_rejects_three_d_hits() {
        let mut arena = PfoArena::new();
        let three_d = hits(0, 2, HitType::ThreeD);
        let pfo = arena.add(13, vec![cluster(1, &three_d)]);
        let contributions: PfoContributionMap = [(pfo, three_d.clone())].into_iter().collect();

        let result = attribute_pfos_to_truth(
            &hit_set(&three_d),
            &arena,
            &contributions,
            &HitToMcMap::new(),
            &McStore::new(),
        );
        assert_eq!(result, Err(Error::ThreeDimensionalHit { hit: HitId(0) }));
    }

    #[test]
    fn test_neutrino_truth_requires_neutrino_pfo() {
        let mut arena = PfoArena::new();
        let mu = arena.add(13, Vec::new());
        let result = attribute_neutrino_truth(
            &HitSet::new(),
            &arena,
            &[mu],
            &HitToMcMap::new(),
            &McStore::new(),
        );
        assert_eq!(result, Err(Error::NotNeutrino { pfo: mu }));
    }

    #[test]
    fn test_neutrino_truth_picks_largest_contributor() {
        let store: McStore = [
            McParticle::new(1, 14).with_momentum(CartesianVector::new(0.0, 0.0, 1.0), 1.0),
            McParticle::new(2, 13).with_parent(1),
            McParticle::new(3, 12).with_momentum(CartesianVector::new(0.0, 0.0, 2.0), 2.0),
            McParticle::new(4, 11).with_parent(3),
            McParticle::new(5, 13),
        ]
        .into_iter()
        .collect();

        let mu_hits = hits(0, 5, HitType::ViewW);
        let e_hits = hits(10, 3, HitType::ViewW);
        let cosmic_hits = hits(20, 8, HitType::ViewW);

        let mut arena = PfoArena::new();
        let nu = arena.add(14, Vec::new());
        let empty_nu = arena.add(12, Vec::new());
        let mut clusters = vec![cluster(1, &mu_hits), cluster(2, &e_hits)];
        clusters.push(cluster(3, &cosmic_hits));
        let daughter = arena.add(13, clusters);
        arena.set_parent_daughter(nu, daughter).unwrap();

        let mut hit_to_primary = HitToMcMap::new();
        for hit in &mu_hits {
            hit_to_primary.insert(hit.id, McId(2));
        }
        for hit in &e_hits {
            hit_to_primary.insert(hit.id, McId(4));
        }
        for hit in &cosmic_hits {
            hit_to_primary.insert(hit.id, McId(5));
        }
        let mut all = mu_hits.clone();
        all.extend(e_hits.iter().chain(cosmic_hits.iter()).copied());

        let output =
            attribute_neutrino_truth(&hit_set(&all), &arena, &[nu, empty_nu], &hit_to_primary, &store)
                .unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[&McId(1)], nu);
    }

    #[test]
    fn test_neutrino_truth_skips_unknown_particles() {
        let store: McStore = [
            McParticle::new(1, 14),
            McParticle::new(2, 13).with_parent(1),
        ]
        .into_iter()
        .collect();

        let mu_hits = hits(0, 3, HitType::ViewW);
        let stray_hits = hits(10, 1, HitType::ViewW);

        let mut arena = PfoArena::new();
        let nu = arena.add(14, Vec::new());
        let daughter = arena.add(13, vec![cluster(1, &mu_hits), cluster(2, &stray_hits)]);
        arena.set_parent_daughter(nu, daughter).unwrap();

        let mut hit_to_primary = HitToMcMap::new();
        for hit in &mu_hits {
            hit_to_primary.insert(hit.id, McId(2));
        }
        hit_to_primary.insert(stray_hits[0].id, McId(99));

        let mut all = mu_hits.clone();
        all.extend_from_slice(&stray_hits);

        let output =
            attribute_neutrino_truth(&hit_set(&all), &arena, &[nu], &hit_to_primary, &store)
                .unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[&McId(1)], nu);
    }

    /// Two truth neutrinos with three hits each in one neutrino pfo.
    fn tied_neutrinos(p_first: f32, p_second: f32, reverse_clusters: bool) -> McToPfoMap {
        let store: McStore = [
            McParticle::new(1, 14).with_momentum(CartesianVector::new(0.0, 0.0, p_first), p_first),
            McParticle::new(2, 13).with_parent(1),
            McParticle::new(3, 12).with_momentum(CartesianVector::new(0.0, 0.0, p_second), p_second),
            McParticle::new(4, 11).with_parent(3),
        ]
        .into_iter()
        .collect();

        let mu_hits = hits(0, 3, HitType::ViewW);
        let e_hits = hits(10, 3, HitType::ViewW);

        let mut clusters = vec![cluster(1, &mu_hits), cluster(2, &e_hits)];
        if reverse_clusters {
            clusters.reverse();
        }

        let mut arena = PfoArena::new();
        let nu = arena.add(14, Vec::new());
        let daughter = arena.add(13, clusters);
        arena.set_parent_daughter(nu, daughter).unwrap();

        let mut hit_to_primary = HitToMcMap::new();
        for hit in &mu_hits {
            hit_to_primary.insert(hit.id, McId(2));
        }
        for hit in &e_hits {
            hit_to_primary.insert(hit.id, McId(4));
        }
        let mut all = mu_hits.clone();
        all.extend_from_slice(&e_hits);

        attribute_neutrino_truth(&hit_set(&all), &arena, &[nu], &hit_to_primary, &store).unwrap()
    }

    #[test]
    fn test_neutrino_truth_ties_go_to_higher_momentum() {
        for reverse in [false, true] {
            let output = tied_neutrinos(1.0, 2.0, reverse);
            assert_eq!(output.keys().copied().collect::<Vec<_>>(), vec![McId(3)]);

            let output = tied_neutrinos(2.0, 1.0, reverse);
            assert_eq!(output.keys().copied().collect::<Vec<_>>(), vec![McId(1)]);
        }
    }

    #[test]
    fn test_rank_orders_by_count_then_id() {
        let h = hits(0, 6, HitType::ViewV);
        let first: McContributionMap = [
            (McId(7), h[0..1].to_vec()),
            (McId(3), h[1..3].to_vec()),
            (McId(5), h[3..5].to_vec()),
        ]
        .into_iter()
        .collect();
        let second: McContributionMap = [(McId(1), h[5..6].to_vec())].into_iter().collect();

        let ranked = rank_truth_particles(&[first, second]).unwrap();
        assert_eq!(ranked, vec![McId(3), McId(5), McId(7), McId(1)]);
    }

    #[test]
    fn test_rank_rejects_duplicates_across_maps() {
        let h = hits(0, 2, HitType::ViewV);
        let first: McContributionMap = [(McId(1), h[0..1].to_vec())].into_iter().collect();
        let second: McContributionMap =
            [(McId(2), h.clone()), (McId(1), h[1..2].to_vec())].into_iter().collect();

        assert_eq!(
            rank_truth_particles(&[first, second]),
            Err(Error::DuplicateTruthParticle { particle: McId(1) })
        );
    }
}
