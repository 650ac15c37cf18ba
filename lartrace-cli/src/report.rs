//! Plain-text summaries of matching and association results.

use lartrace_algorithms::{McContributionMap, PfoMatches, ReclusterPlan, ResolvedLink};
use lartrace_core::{count_hits_by_type, particle_name, Error, HitType, McId, McStore, Result};

const HEADER: &str = "    ID  NUANCE        TYPE         E      dist nGoodHits     U     V     W";

/// Renders one row per truth particle, in the order given.
///
/// Every particle in `contributions` must appear in `ordered`.
pub fn render_truth_table(
    contributions: &McContributionMap,
    ordered: &[McId],
    mc_store: &McStore,
) -> Result<String> {
    if let Some(missing) = contributions.keys().find(|&id| !ordered.contains(id)) {
        return Err(Error::NotFound(format!(
            "truth particle {missing} absent from ordered list"
        )));
    }

    let mut out = format!("{HEADER}\n");

    for &id in ordered {
        let Some(hits) = contributions.get(&id) else {
            continue;
        };
        let particle = mc_store.particle(id)?;
        let nuance = particle
            .nuance_code
            .map_or_else(|| "-".to_string(), |code| code.to_string());

        out.push_str(&format!(
            "{:>6} {:>7} {:>11} {:>9.3} {:>9.2} {:>9} {:>5} {:>5} {:>5}\n",
            id.0,
            nuance,
            particle_name(particle.pdg),
            particle.energy,
            particle.track_length(),
            hits.len(),
            count_hits_by_type(HitType::ViewU, hits),
            count_hits_by_type(HitType::ViewV, hits),
            count_hits_by_type(HitType::ViewW, hits),
        ));
    }

    Ok(out)
}

/// Renders the best pfo of each truth particle, in the order given.
pub fn render_matches(matches: &PfoMatches, ordered: &[McId]) -> String {
    ordered
        .iter()
        .map(|id| match (matches.best_pfo.get(id), matches.best_pfo_hits.get(id)) {
            (Some(pfo), Some(hits)) => {
                format!("truth {id} -> pfo {pfo} ({} shared hits)\n", hits.len())
            }
            _ => format!("truth {id} -> unmatched\n"),
        })
        .collect()
}

/// Renders committed parent/daughter links.
pub fn render_links(links: &[ResolvedLink]) -> String {
    links
        .iter()
        .map(|link| {
            format!(
                "pfo {} -> parent {} (root {})\n",
                link.daughter, link.parent, link.root
            )
        })
        .collect()
}

/// Renders a hit-transfer plan, one line per cluster.
pub fn render_plan(plan: &ReclusterPlan) -> String {
    let gains = plan
        .hits_to_add
        .iter()
        .map(|(cluster, hits)| format!("cluster {cluster} gains {} hits\n", hits.len()));
    let losses = plan
        .hits_to_remove
        .iter()
        .map(|(cluster, hits)| format!("cluster {cluster} loses {} hits\n", hits.len()));
    gains.chain(losses).collect()
}
