use lartrace_algorithms::{ConsolidationConfig, ReclusterPlan, TrackConsolidation};
use lartrace_core::{CaloHit, Cluster, HitType, LinearTrajectoryFit};

fn cluster(id: u32, points: &[(f32, f32)]) -> Cluster {
    Cluster::new(
        id,
        HitType::ViewV,
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, z))| CaloHit::new(id * 1000 + i as u32, HitType::ViewV, x, z, 1.0)),
    )
    .unwrap()
}

#[test]
fn test_admissibility_is_strict() {
    // Track hits at z = 0, 10, 20: the fit origin sits at z = 10 and projections are exact.
    let track = cluster(1, &[(0.0, 0.0), (0.0, 10.0), (0.0, 20.0)]);
    // |JK|^2 = 1, |IJ|^2 = 26, |KI|^2 = 25.
    let candidate = cluster(2, &[(1.0, 5.0)]);
    let fit = LinearTrajectoryFit::new(&track).unwrap();

    let at_boundary = TrackConsolidation::new(
        ConsolidationConfig::default().with_max_transverse_displacement(1.0),
    );
    let plan = at_boundary.reclustered_hits(&[fit.clone()], &[&candidate]);
    assert!(plan.is_empty());

    let inside = TrackConsolidation::new(
        ConsolidationConfig::default().with_max_transverse_displacement(1.01),
    );
    let plan = inside.reclustered_hits(&[fit], &[&candidate]);
    assert_eq!(plan.n_transferred(), 1);
}

fn fraction_setup() -> (Cluster, Cluster) {
    let track_points: Vec<(f32, f32)> = (0..=40)
        .filter(|z| !(11..=19).contains(z))
        .map(|z| (0.0, z as f32))
        .collect();
    let track = cluster(1, &track_points);

    let mut shower_points: Vec<(f32, f32)> = (12..=16).map(|z| (0.1, z as f32)).collect();
    shower_points.extend((12..=16).map(|z| (5.0, z as f32)));
    (track, cluster(2, &shower_points))
}

#[test]
fn test_half_associated_is_not_enough() {
    let (track, shower) = fraction_setup();
    let fit = LinearTrajectoryFit::new(&track).unwrap();

    let config = ConsolidationConfig::default()
        .with_min_associated_span(100.0)
        .with_min_associated_fraction(0.5);
    let plan = TrackConsolidation::new(config.clone()).reclustered_hits(&[fit.clone()], &[&shower]);
    assert!(plan.is_empty());

    let plan = TrackConsolidation::new(config.with_min_associated_fraction(0.49))
        .reclustered_hits(&[fit], &[&shower]);
    assert_eq!(plan.n_transferred(), 5);
}

#[test]
fn test_span_alone_triggers_transfer() {
    let (track, shower) = fraction_setup();
    let fit = LinearTrajectoryFit::new(&track).unwrap();

    // Span of the five gap hits is 4 cm.
    let config = ConsolidationConfig::default()
        .with_min_associated_span(3.5)
        .with_min_associated_fraction(0.9);
    let plan = TrackConsolidation::new(config).reclustered_hits(&[fit], &[&shower]);
    assert_eq!(plan.n_transferred(), 5);
}

#[test]
fn test_consolidation_is_idempotent() {
    let (track, mut shower) = fraction_setup();
    let algo = TrackConsolidation::new(ConsolidationConfig::default());

    let plan = {
        let fit = LinearTrajectoryFit::new(&track).unwrap();
        algo.reclustered_hits(&[fit], &[&shower])
    };
    assert_eq!(plan.n_transferred(), 5);

    for hit in &plan.hits_to_remove[&shower.id] {
        assert!(shower.remove_hit(hit.id));
    }
    let mut track = track;
    for hit in &plan.hits_to_add[&track.id] {
        track.add_hit(*hit).unwrap();
    }

    let fit = LinearTrajectoryFit::new(&track).unwrap();
    let again = algo.reclustered_hits(&[fit], &[&shower]);
    assert_eq!(again, ReclusterPlan::default());

    let emptied = Cluster::empty(shower.id.0, HitType::ViewV);
    let fit = LinearTrajectoryFit::new(&track).unwrap();
    assert!(algo.reclustered_hits(&[fit], &[&emptied]).is_empty());
}
