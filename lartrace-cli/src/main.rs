//! lartrace command-line interface.
//!
//! Runs truth matching, delta-ray association and track consolidation over
//! JSON event records.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

mod config;
mod event;
mod report;

use clap::{Args, Parser, Subcommand};
use config::RunConfig;
use event::Event;
use lartrace_algorithms::{
    attribute_hits_to_pfos, attribute_hits_to_truth, attribute_neutrino_truth,
    attribute_pfos_to_truth, extract_target_pfos, hit_set, rank_truth_particles,
    DeltaRayIdentification, ReclusterPlan, TrackConsolidation,
};
use lartrace_core::PfoId;
use log::info;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] lartrace_core::Error),
}

/// Truth matching and pfo association for LArTPC events.
#[derive(Parser)]
#[command(name = "lartrace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Input options shared by every command.
#[derive(Args)]
struct InputArgs {
    /// Event record (JSON)
    #[arg(short, long)]
    event: PathBuf,

    /// Run configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl InputArgs {
    /// Loads the event and the run configuration.
    fn load(&self) -> Result<(Event, RunConfig)> {
        let run_config = RunConfig::load(self.config.as_deref())?;
        let event = Event::load(&self.event)?;

        if self.verbose {
            eprintln!("Event: {}", self.event.display());
            eprintln!("  hits: {}", event.hits.len());
            eprintln!("  truth particles: {}", event.mc_store.len());
            eprintln!("  pfos: {}", event.arena.len());
            eprintln!("  free clusters: {}", event.clusters.len());
        }

        Ok((event, run_config))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Match reconstructed pfos to truth particles
    Match {
        #[command(flatten)]
        input: InputArgs,

        /// Match final-state pfos only, with descendants folded in
        #[arg(long)]
        primary_only: bool,
    },

    /// Attach delta-ray pfos to their parent tracks
    DeltaRays {
        #[command(flatten)]
        input: InputArgs,

        /// Maximum mean displacement between daughter and parent (cm)
        #[arg(long)]
        max_displacement: Option<f32>,

        /// Veto associations across TPC volumes
        #[arg(long)]
        check_volumes: bool,
    },

    /// Move shower hits onto nearby track clusters
    Consolidate {
        #[command(flatten)]
        input: InputArgs,

        /// Maximum transverse displacement from the track (cm)
        #[arg(long)]
        max_transverse_displacement: Option<f32>,

        /// Minimum longitudinal span of associated hits (cm)
        #[arg(long)]
        min_associated_span: Option<f32>,

        /// Minimum fraction of associated hits
        #[arg(long)]
        min_associated_fraction: Option<f32>,

        /// Veto transfers across TPC volumes
        #[arg(long)]
        check_volumes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Match {
            input,
            primary_only,
        } => {
            let (event, _) = input.load()?;
            let primaries = event.mc_store.primary_relation_map()?;
            let truth = attribute_hits_to_truth(&event.hits, &primaries, &event.weights)?;

            let all_pfos: Vec<PfoId> = event.arena.ids().collect();
            let targets = extract_target_pfos(&event.arena, &all_pfos, primary_only)?;
            let hits = hit_set(&event.hits);
            let pfo_hits = attribute_hits_to_pfos(&hits, &event.arena, &targets, primary_only)?;
            let matches = attribute_pfos_to_truth(
                &hits,
                &event.arena,
                &pfo_hits.pfo_to_hits,
                &truth.hit_to_primary,
                &event.mc_store,
            )?;
            let neutrinos = attribute_neutrino_truth(
                &hits,
                &event.arena,
                &event.neutrino_pfos(),
                &truth.hit_to_primary,
                &event.mc_store,
            )?;

            let ordered = rank_truth_particles(std::slice::from_ref(&truth.primary_to_hits))?;
            print!(
                "{}",
                report::render_truth_table(&truth.primary_to_hits, &ordered, &event.mc_store)?
            );
            println!();
            print!("{}", report::render_matches(&matches, &ordered));
            for (particle, pfo) in &neutrinos {
                println!("neutrino {particle} -> pfo {pfo}");
            }

            info!(
                "matched {} of {} primaries over {} target pfos",
                matches.best_pfo.len(),
                ordered.len(),
                targets.len()
            );
        }

        Commands::DeltaRays {
            input,
            max_displacement,
            check_volumes,
        } => {
            let (mut event, run_config) = input.load()?;
            let mut association = run_config.association;
            if let Some(value) = max_displacement {
                association = association.with_max_displacement(value);
            }
            if check_volumes {
                association = association.with_volume_check(true);
            }
            if input.verbose {
                eprintln!("Association: {:?}", association);
            }

            let candidates: Vec<PfoId> = event
                .arena
                .ids()
                .filter(|&id| {
                    event
                        .arena
                        .get(id)
                        .is_ok_and(|pfo| !pfo.is_neutrino() && pfo.parent().is_none())
                })
                .collect();

            let identification = DeltaRayIdentification::new(association);
            let association_map = identification.build_association_map(&event.arena, &candidates)?;
            let links = DeltaRayIdentification::resolve_roots(&association_map)?;
            let daughters = DeltaRayIdentification::build_parent_daughter_links(
                &mut event.arena,
                &association_map,
            )?;

            print!("{}", report::render_links(&links));
            info!(
                "linked {} delta rays among {} candidates",
                daughters.len(),
                candidates.len()
            );
        }

        Commands::Consolidate {
            input,
            max_transverse_displacement,
            min_associated_span,
            min_associated_fraction,
            check_volumes,
        } => {
            let (event, mut run_config) = input.load()?;
            let consolidation = &mut run_config.consolidation;
            if let Some(value) = max_transverse_displacement {
                consolidation.max_transverse_displacement = value;
            }
            if let Some(value) = min_associated_span {
                consolidation.min_associated_span = value;
            }
            if let Some(value) = min_associated_fraction {
                consolidation.min_associated_fraction = value;
            }
            if check_volumes {
                consolidation.check_volume_associations = true;
            }
            if input.verbose {
                eprintln!("Consolidation: {:?}", consolidation);
            }

            let pass = TrackConsolidation::new(run_config.consolidation);
            let mut total = ReclusterPlan::default();
            for (view, mut clusters) in event.clusters_by_view() {
                if clusters.is_empty() {
                    continue;
                }
                let before = clusters.len();
                let plan = pass.run(&mut clusters)?;
                info!(
                    "view {view}: {} hits transferred, {} of {before} clusters remain",
                    plan.n_transferred(),
                    clusters.len()
                );
                total.merge(plan);
            }

            print!("{}", report::render_plan(&total));
        }
    }

    Ok(())
}
