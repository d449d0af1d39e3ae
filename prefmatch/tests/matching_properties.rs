//! Cross-crate behavior of the matching pipeline.
//!
//! Component behavior is covered by the inline `#[cfg(test)]` modules. These
//! tests drive the public facade end to end:
//!
//! 1. Identifier stability and collision disambiguation
//! 2. Validation before mutation (single and bulk)
//! 3. Bulk replacement semantics
//! 4. Missing-component penalty ordering
//! 5. Empty-index and reset behavior
//! 6. HNSW and exact engines agreeing on self-matches

use std::sync::Arc;

use prefmatch::{
    AddVectorRequest, BulkLoadRequest, EngineKind, FlatEngine, HnswEngine, IdentifierRegistry,
    IndexCoordinator, MatchConfig, MatchError, MatchService, PreferenceSchema, QueryRequest,
    UserVector, sha256_prefix,
};
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════
// Test helpers
// ═══════════════════════════════════════════════════════════════════════════

fn flat(dimension: usize) -> IndexCoordinator<FlatEngine> {
    let config = MatchConfig::default()
        .with_dimension(dimension)
        .with_engine(EngineKind::Flat);
    IndexCoordinator::new(FlatEngine::new(dimension), &config).expect("flat coordinator")
}

fn hnsw(dimension: usize) -> IndexCoordinator<HnswEngine> {
    let config = MatchConfig::default().with_dimension(dimension);
    let engine = HnswEngine::from_match_config(&config).expect("hnsw engine");
    IndexCoordinator::new(engine, &config).expect("hnsw coordinator")
}

/// Deterministic pseudo-random vectors in `[0, 1)`.
fn lcg_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    #[allow(clippy::cast_precision_loss)]
                    let unit = (state >> 40) as f32 / (1_u64 << 24) as f32;
                    unit
                })
                .collect()
        })
        .collect()
}

fn users(prefix: &str, vectors: Vec<Vec<f32>>) -> Vec<UserVector> {
    vectors
        .into_iter()
        .enumerate()
        .map(|(i, vector)| UserVector::new(format!("{prefix}{i}"), vector))
        .collect()
}

/// Every base key lands on the same slot; suffixed retries hash normally.
fn colliding_hasher(key: &str) -> u64 {
    if key.contains('#') { sha256_prefix(key) } else { 7 }
}

// ═══════════════════════════════════════════════════════════════════════════
// Concrete scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn missing_component_is_discounted_and_ranked_second() {
    let coordinator = flat(4);
    coordinator.insert_one("a", vec![1.0, 0.0, 0.0, 0.0]).expect("a");
    coordinator.insert_one("b", vec![1.0, 0.0, 0.0, -1.0]).expect("b");

    let ranked = coordinator.search(&[1.0, 0.0, 0.0, 0.0], 2).expect("search");
    assert_eq!(ranked.user_ids, vec!["a", "b"]);
    assert!(ranked.scores[0].abs() < 1e-6);
    // Raw squared distance of b is 1.0; one missing component scales by 0.9.
    assert!((ranked.scores[1] - 0.9).abs() < 1e-6);
}

#[test]
fn empty_bulk_load_then_query_is_empty() {
    let config = MatchConfig::default()
        .with_dimension(3)
        .with_engine(EngineKind::Flat);
    let service = MatchService::new(Arc::new(
        IndexCoordinator::from_config(&config).expect("coordinator"),
    ));
    service
        .add_vector(AddVectorRequest {
            user_id: "before".into(),
            vector: vec![0.0, 0.0, 0.0],
        })
        .expect("add");

    let response = service
        .bulk_load(BulkLoadRequest {
            user_vectors: Vec::new(),
        })
        .expect("bulk");
    assert_eq!(response.loaded, 0);
    assert_eq!(response.message, "Loaded 0 user vectors");

    let result = service
        .query(&QueryRequest {
            vector: vec![0.3, -1.0, 0.9],
            top_k: Some(5),
        })
        .expect("query");
    assert!(result.user_ids.is_empty());
    assert!(result.scores.is_empty());
    let json = serde_json::to_value(&result).expect("encode");
    assert_eq!(json, serde_json::json!({"user_ids": [], "scores": []}));
}

// ═══════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn reinserting_a_user_keeps_its_internal_id() {
    let coordinator = flat(2);
    let first = coordinator.insert_one("alice", vec![0.0, 0.0]).expect("first");
    let second = coordinator.insert_one("alice", vec![1.0, 1.0]).expect("second");
    assert_eq!(first, second);
    assert_eq!(coordinator.stats().engine_size, 1);

    let ranked = coordinator.search(&[1.0, 1.0], 1).expect("search");
    assert_eq!(ranked.user_ids, vec!["alice"]);
    assert!(ranked.scores[0].abs() < 1e-6);
}

#[test]
fn forced_collisions_still_return_every_user() {
    let config = MatchConfig::default()
        .with_dimension(2)
        .with_engine(EngineKind::Flat);
    let registry = IdentifierRegistry::with_hasher(
        config.id_space,
        config.max_id_attempts,
        colliding_hasher,
    );
    let coordinator =
        IndexCoordinator::with_registry(FlatEngine::new(2), registry, &config).expect("coordinator");

    let mut ids = Vec::new();
    for (name, x) in [("x", 0.0_f32), ("y", 1.0), ("z", 2.0)] {
        ids.push(coordinator.insert_one(name, vec![x, 0.0]).expect("insert"));
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    let ranked = coordinator.search(&[0.0, 0.0], 3).expect("search");
    assert_eq!(ranked.user_ids, vec!["x", "y", "z"]);
}

#[test]
fn exhausted_id_space_rejects_bulk_and_keeps_prior_index() {
    let config = MatchConfig::default()
        .with_dimension(1)
        .with_engine(EngineKind::Flat)
        .with_id_space(1);
    let coordinator =
        IndexCoordinator::new(FlatEngine::new(1), &config).expect("coordinator");
    coordinator.insert_one("only", vec![0.5]).expect("insert");

    let err = coordinator
        .insert_bulk(vec![
            UserVector::new("p", vec![0.0]),
            UserVector::new("q", vec![1.0]),
        ])
        .unwrap_err();
    assert!(matches!(err, MatchError::IdentifierSpaceExhausted { .. }));

    let ranked = coordinator.search(&[0.5], 5).expect("search");
    assert_eq!(ranked.user_ids, vec!["only"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Validation before mutation
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn short_vector_is_rejected_without_changing_results() {
    let coordinator = flat(3);
    coordinator.insert_one("a", vec![0.0, 0.0, 0.0]).expect("a");
    coordinator.insert_one("b", vec![1.0, 0.0, 0.0]).expect("b");
    let before = coordinator.search(&[0.0, 0.0, 0.0], 5).expect("before");

    let err = coordinator.insert_one("c", vec![0.0, 0.0]).unwrap_err();
    assert!(matches!(
        err,
        MatchError::InvalidVectorSize { expected: 3, found: 2, .. }
    ));
    let err = coordinator.insert_one("a", vec![9.0, 9.0]).unwrap_err();
    assert!(matches!(err, MatchError::InvalidVectorSize { .. }));

    let after = coordinator.search(&[0.0, 0.0, 0.0], 5).expect("after");
    assert_eq!(before, after);
}

#[test]
fn bulk_with_one_bad_entry_changes_nothing() {
    let coordinator = flat(2);
    coordinator
        .insert_bulk(users("old", vec![vec![0.0, 0.0], vec![1.0, 0.0]]))
        .expect("initial");
    let before = coordinator.search(&[0.0, 0.0], 5).expect("before");

    let mut batch = users("new", vec![vec![0.0, 1.0], vec![1.0, 1.0]]);
    batch.push(UserVector::new("broken", vec![0.0, 0.0, 0.0]));
    let err = coordinator.insert_bulk(batch).unwrap_err();
    match err {
        MatchError::InvalidVectorSize { user_id, .. } => assert_eq!(user_id, "broken"),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(coordinator.search(&[0.0, 0.0], 5).expect("after"), before);
}

#[test]
fn wrong_query_size_is_an_error() {
    let coordinator = flat(4);
    coordinator.insert_one("a", vec![0.0; 4]).expect("a");
    assert!(matches!(
        coordinator.search(&[0.0; 3], 1).unwrap_err(),
        MatchError::QueryDimensionMismatch { expected: 4, found: 3 }
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// Bulk replacement, reset, empty index
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn second_bulk_load_fully_replaces_the_first() {
    let coordinator = flat(4);
    let first = users("v1-", lcg_vectors(40, 4, 11));
    let second = users("v2-", lcg_vectors(30, 4, 29));
    let queries = lcg_vectors(10, 4, 47);

    coordinator.insert_bulk(first).expect("first");
    let summary = coordinator.insert_bulk(second).expect("second");
    assert_eq!(summary.loaded, 30);

    for query in &queries {
        let ranked = coordinator.search(query, 100).expect("search");
        assert_eq!(ranked.len(), 30);
        assert!(ranked.user_ids.iter().all(|id| id.starts_with("v2-")));
    }
    let stats = coordinator.stats();
    assert_eq!(stats.engine_size, 30);
    assert_eq!(stats.registered_ids, 30);
    assert_eq!(stats.stored_vectors, 30);
}

#[test]
fn empty_index_queries_return_empty_before_and_after_reset() {
    let coordinator = flat(2);
    assert!(coordinator.search(&[0.0, 0.0], 10).expect("fresh").is_empty());

    coordinator.insert_one("a", vec![0.0, 0.0]).expect("a");
    assert_eq!(coordinator.search(&[0.0, 0.0], 10).expect("loaded").len(), 1);

    coordinator.reset();
    assert!(coordinator.search(&[0.0, 0.0], 10).expect("reset").is_empty());
    let stats = coordinator.stats();
    assert_eq!(stats.engine_size, 0);
    assert_eq!(stats.registered_ids, 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Engines
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn hnsw_finds_each_inserted_vector_first() {
    let coordinator = hnsw(8);
    let vectors = lcg_vectors(200, 8, 3);
    coordinator
        .insert_bulk(users("u", vectors.clone()))
        .expect("bulk");

    let mut exact_hits = 0;
    for (i, vector) in vectors.iter().enumerate().step_by(10) {
        let ranked = coordinator.search(vector, 5).expect("search");
        assert!(!ranked.is_empty());
        if ranked.user_ids[0] == format!("u{i}") {
            exact_hits += 1;
            assert!(ranked.scores[0].abs() < 1e-5);
        }
    }
    assert!(exact_hits >= 18, "only {exact_hits}/20 self matches");
}

#[test]
fn encoded_answers_match_their_owner() {
    let coordinator = flat(8);
    let schema = PreferenceSchema::default_roommate();
    let answers = [
        [Some(0.0), Some(4.0), Some(2.0), Some(1.0), Some(0.0), Some(0.0), Some(2.0), Some(1.0)],
        [Some(1.0), Some(1.0), None, Some(2.0), Some(2.0), Some(2.0), None, Some(4.0)],
        [Some(1.0), Some(2.0), Some(0.0), Some(0.0), Some(1.0), Some(1.0), Some(1.0), Some(0.0)],
    ];
    for (i, row) in answers.iter().enumerate() {
        let vector = schema.encode(row).expect("encode");
        coordinator.insert_one(&format!("r{i}"), vector).expect("insert");
    }
    let query = schema.encode(&answers[2]).expect("encode");
    let ranked = coordinator.search(&query, 3).expect("search");
    assert_eq!(ranked.user_ids[0], "r2");
}

// ═══════════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn results_are_bounded_and_ascending(
        vectors in prop::collection::vec(
            prop::collection::vec(prop_oneof![Just(-1.0_f32), 0.0_f32..2.0], 3),
            0..40,
        ),
        query in prop::collection::vec(prop_oneof![Just(-1.0_f32), 0.0_f32..2.0], 3),
        top_k in 0_usize..20,
    ) {
        let coordinator = flat(3);
        let count = vectors.len();
        coordinator.insert_bulk(users("p", vectors)).expect("bulk");

        let ranked = coordinator.search(&query, top_k).expect("search");
        prop_assert_eq!(ranked.user_ids.len(), ranked.scores.len());
        prop_assert!(ranked.len() <= top_k);
        prop_assert_eq!(ranked.len(), top_k.min(count));
        prop_assert!(ranked.scores.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(ranked.scores.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn missing_components_lower_the_score_of_an_equal_distance_user(
        shift in 0.0_f32..2.0,
        missing in 1_usize..4,
    ) {
        // `holey` carries `missing` unknown components; `full` is placed at
        // the same raw squared distance from the origin with none.
        let coordinator = flat(4);
        let mut holey = vec![0.0_f32; 4];
        holey[0] = shift;
        for slot in holey.iter_mut().skip(1).take(missing) {
            *slot = -1.0;
        }
        let raw: f32 = holey.iter().map(|v| v * v).sum();
        let full = vec![raw.sqrt(), 0.0, 0.0, 0.0];

        coordinator.insert_one("full", full).expect("full");
        coordinator.insert_one("holey", holey).expect("holey");
        let ranked = coordinator.search(&[0.0; 4], 2).expect("search");
        prop_assert_eq!(ranked.rank_of("holey"), Some(0));
        prop_assert!(ranked.scores[0] < ranked.scores[1]);
    }
}
