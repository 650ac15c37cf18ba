use lartrace_algorithms::{AssociationConfig, DeltaRayIdentification, PfoAssociationMap};
use lartrace_core::{CaloHit, Cluster, Error, HitType, PfoArena, PfoId};

/// Straight cluster along z, hits 1 cm apart, optionally tagged with a volume.
fn segment(id: u32, x: f32, z0: f32, length: u32, volume: Option<u32>) -> Cluster {
    Cluster::new(
        id,
        HitType::ViewU,
        (0..=length).map(|i| {
            let hit = CaloHit::new(id * 1000 + i, HitType::ViewU, x, z0 + i as f32, 1.0);
            volume.map_or(hit, |v| hit.with_volume(v, 0))
        }),
    )
    .unwrap()
}

#[test]
fn test_length_ratio_below_two_is_rejected() {
    let mut arena = PfoArena::new();
    let short_parent = arena.add(13, vec![segment(1, 0.0, 0.0, 10, None)]);
    let exact_parent = arena.add(13, vec![segment(2, 0.0, 0.0, 12, None)]);
    let daughter = arena.add(11, vec![segment(3, 0.5, 2.0, 6, None)]);

    let algo = DeltaRayIdentification::default();
    let daughter_pfo = arena.get(daughter).unwrap();

    let result = algo
        .is_associated(daughter_pfo, arena.get(short_parent).unwrap())
        .unwrap();
    assert_eq!(result, None);

    let result = algo
        .is_associated(daughter_pfo, arena.get(exact_parent).unwrap())
        .unwrap();
    assert_eq!(result, Some(0.25));
}

#[test]
fn test_volume_mismatch_never_associates() {
    let mut arena = PfoArena::new();
    let parent = arena.add(13, vec![segment(1, 0.0, 0.0, 30, Some(0))]);
    let daughter = arena.add(11, vec![segment(2, 0.2, 10.0, 3, Some(1))]);

    let open = DeltaRayIdentification::default();
    let map = open.build_association_map(&arena, &[parent, daughter]).unwrap();
    assert_eq!(map.get(&daughter), Some(&parent));

    let guarded = DeltaRayIdentification::new(AssociationConfig::default().with_volume_check(true));
    let map = guarded
        .build_association_map(&arena, &[parent, daughter])
        .unwrap();
    assert!(map.is_empty());
}

#[test]
fn test_three_node_cycle_is_fatal() {
    let mut arena = PfoArena::new();
    let a = arena.add(13, Vec::new());
    let b = arena.add(13, Vec::new());
    let c = arena.add(13, Vec::new());
    let map: PfoAssociationMap = [(a, b), (b, c), (c, a)].into_iter().collect();

    let result = DeltaRayIdentification::build_parent_daughter_links(&mut arena, &map);
    assert_eq!(result, Err(Error::AssociationCycle { pfo: a }));

    // Nothing is committed when resolution fails.
    for id in [a, b, c] {
        assert_eq!(arena.get(id).unwrap().parent(), None);
    }
}

#[test]
fn test_run_links_chains_to_immediate_parents() {
    let mut arena = PfoArena::new();
    let muon = arena.add(13, vec![segment(1, 0.0, 0.0, 40, None)]);
    let electron = arena.add(11, vec![segment(2, 1.0, 10.0, 12, None)]);
    let delta = arena.add(11, vec![segment(3, 1.5, 14.0, 2, None)]);
    let ids: Vec<PfoId> = arena.ids().collect();

    let algo = DeltaRayIdentification::default();
    let daughters = algo.run(&mut arena, &ids).unwrap();

    assert_eq!(daughters, vec![electron, delta]);
    assert_eq!(arena.get(electron).unwrap().parent(), Some(muon));
    assert_eq!(arena.get(delta).unwrap().parent(), Some(electron));
    assert_eq!(arena.get(muon).unwrap().daughters(), &[electron]);
}

#[test]
fn test_failed_link_leaves_arena_untouched() {
    let mut arena = PfoArena::new();
    let muon = arena.add(13, vec![segment(1, 0.0, 0.0, 40, None)]);
    let delta = arena.add(11, vec![segment(2, 1.0, 10.0, 2, None)]);
    let owner = arena.add(13, Vec::new());
    let other = arena.add(11, vec![segment(3, 1.5, 20.0, 2, None)]);
    arena.set_parent_daughter(owner, other).unwrap();

    let result = DeltaRayIdentification::default().run(&mut arena, &[muon, delta, other]);
    assert_eq!(result, Err(Error::AlreadyHasParent { daughter: other }));

    // The delta link was accepted before the failure but must not be kept.
    assert_eq!(arena.get(delta).unwrap().parent(), None);
    assert!(arena.get(muon).unwrap().daughters().is_empty());
    assert_eq!(arena.get(other).unwrap().parent(), Some(owner));
}
