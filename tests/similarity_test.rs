use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rostergraph::algo::{ego_network, find_top_k, SimilarityConfig};
use rostergraph::graph::{BuildOptions, EdgeRecord, GraphStore, NodeRecord, StorageStrategy};
use rostergraph_algorithms::AdjacencyView;

fn players(n: u32) -> Vec<NodeRecord> {
    (1..=n).map(|i| NodeRecord::new(i, format!("P{}", i))).collect()
}

fn build(n: u32, edges: Vec<EdgeRecord>, strategy: StorageStrategy) -> GraphStore {
    let options = BuildOptions {
        strategy,
        ..Default::default()
    };
    GraphStore::build(players(n), edges, options).unwrap()
}

/// Random graph with weights 1..=5, duplicates accumulate
fn random_graph(n: u32, edges: usize, seed: u64, strategy: StorageStrategy) -> GraphStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(edges);
    while records.len() < edges {
        let a = rng.gen_range(1..=n);
        let b = rng.gen_range(1..=n);
        if a != b {
            records.push(EdgeRecord::new(a, b, rng.gen_range(1..=5)));
        }
    }
    build(n, records, strategy)
}

#[test]
fn test_four_node_scenario() {
    let edges = vec![
        EdgeRecord::new(1, 2, 3),
        EdgeRecord::new(2, 3, 1),
        EdgeRecord::new(1, 3, 2),
    ];
    for strategy in [StorageStrategy::Dense, StorageStrategy::Sparse] {
        let store = build(4, edges.clone(), strategy);
        assert_eq!(store.storage(), strategy);

        // Node 4 has weighted degree 0: nothing to search with threshold 1
        let all: Vec<usize> = (0..4).collect();
        let pairs = find_top_k(store.adjacency(), 3, &all, &SimilarityConfig::default());
        assert!(pairs.is_empty());

        // Ego of node 1 with K = 2
        let ego = ego_network(store.adjacency(), 0, 2);
        let fractions: Vec<f64> = ego.fractions(store.node_count()).map(|(_, f)| f).collect();
        assert_eq!(fractions, vec![0.5, 0.75]);
    }
}

#[test]
fn test_best_unconnected_pair_comes_first() {
    // 1 and 4 played with exactly the same teammates, the same number of seasons
    let edges = vec![
        EdgeRecord::new(1, 2, 3),
        EdgeRecord::new(1, 3, 2),
        EdgeRecord::new(4, 2, 3),
        EdgeRecord::new(4, 3, 2),
        EdgeRecord::new(5, 2, 1),
        EdgeRecord::new(6, 5, 1),
    ];
    let store = build(6, edges, StorageStrategy::Auto);
    let all: Vec<usize> = (0..6).collect();
    let pairs = find_top_k(store.adjacency(), 0, &all, &SimilarityConfig::default());

    assert_eq!(pairs[0].source, 1);
    assert_eq!(pairs[0].target, 4);
    assert!((pairs[0].score - 2.0).abs() < 1e-12);
    // 2 and 3 are teammates of 1, never candidates
    assert!(pairs.iter().all(|p| p.target != 2 && p.target != 3));
}

#[test]
fn test_adjacency_is_symmetric() {
    let store = random_graph(40, 200, 7, StorageStrategy::Sparse);
    let view = store.adjacency();
    for i in 0..view.node_count() {
        for (j, w) in view.row(i).nonzero() {
            assert_eq!(view.weight(j, i), w, "asymmetric weight at ({}, {})", i, j);
        }
    }
}

#[test]
fn test_top_k_properties_on_random_graphs() {
    for seed in 0..5 {
        let store = random_graph(60, 240, seed, StorageStrategy::Auto);
        let view = store.adjacency();
        let all: Vec<usize> = (0..store.node_count()).collect();
        let config = SimilarityConfig {
            top_k: 5,
            degree_threshold: 1,
        };

        for source in 0..store.node_count() {
            let pairs = find_top_k(view, source, &all, &config);
            assert!(pairs.len() <= 5);
            for window in pairs.windows(2) {
                assert!(window[0].score >= window[1].score);
            }
            for pair in &pairs {
                let target = (pair.target - 1) as usize;
                assert_ne!(target, source);
                assert_eq!(view.weight(source, target), 0);
                assert!((0.0..=2.0).contains(&pair.score));
            }
            // Deterministic
            assert_eq!(pairs, find_top_k(view, source, &all, &config));
        }
    }
}

#[test]
fn test_dense_and_sparse_agree() {
    let dense = random_graph(50, 300, 11, StorageStrategy::Dense);
    let sparse = random_graph(50, 300, 11, StorageStrategy::Sparse);
    let all: Vec<usize> = (0..50).collect();
    let config = SimilarityConfig::default();

    for source in 0..50 {
        let a = find_top_k(dense.adjacency(), source, &all, &config);
        let b = find_top_k(sparse.adjacency(), source, &all, &config);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.target, y.target);
            assert!((x.score - y.score).abs() < 1e-12);
        }
        assert_eq!(
            ego_network(dense.adjacency(), source, 4),
            ego_network(sparse.adjacency(), source, 4)
        );
    }
}

#[test]
fn test_ego_counts_are_monotone() {
    let store = random_graph(80, 120, 3, StorageStrategy::Sparse);
    for source in 0..store.node_count() {
        let counts = ego_network(store.adjacency(), source, 6).counts;
        assert_eq!(counts.len(), 6);
        for window in counts.windows(2) {
            assert!(window[0] <= window[1]);
        }
        assert!(counts.iter().all(|&c| c <= store.node_count()));
    }
}
