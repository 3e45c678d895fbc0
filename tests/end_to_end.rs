//! Integration tests for the diversity analyses and the request layer.

use approx::assert_relative_eq;
use microbiome_diversity::prelude::*;
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

/// The 4 sample x 3 feature example table with groups A, A, B, B.
fn create_example_table() -> FeatureTable {
    let mut table_file = NamedTempFile::new().unwrap();
    writeln!(table_file, "# Constructed from biom file").unwrap();
    writeln!(table_file, "#OTU ID\ts1\ts2\ts3\ts4\ttaxonomy").unwrap();
    writeln!(table_file, "f1\t10\t8\t0\t0\tk__Bacteria; p__Firmicutes").unwrap();
    writeln!(table_file, "f2\t0\t2\t5\t4\tk__Bacteria; p__Bacteroidetes").unwrap();
    writeln!(table_file, "f3\t0\t0\t5\t6\tk__Bacteria; p__Firmicutes").unwrap();
    table_file.flush().unwrap();

    let mut metadata_file = NamedTempFile::new().unwrap();
    writeln!(metadata_file, "sample-id\tgroup\tph").unwrap();
    writeln!(metadata_file, "#q2:types\tcategorical\tnumeric").unwrap();
    writeln!(metadata_file, "s1\tA\t6.1").unwrap();
    writeln!(metadata_file, "s2\tA\t6.4").unwrap();
    writeln!(metadata_file, "s3\tB\t7.0").unwrap();
    writeln!(metadata_file, "s4\tB\t7.2").unwrap();
    metadata_file.flush().unwrap();

    let table = FeatureTable::from_tsv(table_file.path()).unwrap();
    let metadata = Metadata::from_tsv(metadata_file.path()).unwrap();
    table.with_metadata(metadata).unwrap()
}

/// Create synthetic counts for two groups with different richness.
fn create_synthetic_table() -> FeatureTable {
    let n_features = 30;
    let n_samples = 24;

    let mut rng_seed = 7u64;
    let simple_rand = |seed: &mut u64| -> f64 {
        *seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        ((*seed >> 16) & 0x7FFF) as f64 / 32768.0
    };

    let mut rows = Vec::with_capacity(n_samples);
    for sample in 0..n_samples {
        let rich = sample >= n_samples / 2;
        // Poor samples carry only the first 8 features
        let present = if rich { n_features } else { 8 };
        let row: Vec<f64> = (0..n_features)
            .map(|feat| {
                if feat < present {
                    (20.0 + 80.0 * simple_rand(&mut rng_seed)).round()
                } else {
                    0.0
                }
            })
            .collect();
        rows.push(row);
    }

    let sample_ids: Vec<String> = (0..n_samples).map(|i| format!("sample_{}", i)).collect();
    let feature_ids: Vec<String> = (0..n_features).map(|i| format!("asv_{}", i)).collect();
    let metadata = Metadata::from_groups(
        "group",
        sample_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), if i < n_samples / 2 { "poor" } else { "rich" })),
    );
    FeatureTable::from_rows(sample_ids, feature_ids, rows)
        .unwrap()
        .with_metadata(metadata)
        .unwrap()
}

#[test]
fn test_example_table_end_to_end() {
    let table = create_example_table();
    assert_eq!(table.n_samples(), 4);
    assert_eq!(table.n_features(), 3);
    assert_eq!(table.lineages().len(), 3);

    let options = AlphaOptions::new(AlphaMetric::Shannon).grouped_by("group");
    let alpha = compute_alpha(&table, &options, &ComparisonConfig::default()).unwrap();
    assert_eq!(alpha.profile.get("s1"), Some(0.0));
    assert_relative_eq!(alpha.profile.get("s3").unwrap(), 2.0f64.ln(), epsilon = 1e-12);

    let comparison = alpha.comparison.unwrap();
    assert!(comparison.p_value.is_finite());
    assert!((0.0..=1.0).contains(&comparison.p_value));

    let distances = compute_distances(&table, DistanceMetric::BrayCurtis).unwrap();
    assert_relative_eq!(distances.between("s1", "s3").unwrap(), 1.0);

    let ordination = compute_ordination(&distances, 2, &OrdinationConfig::default()).unwrap();
    assert_eq!(ordination.axes.len(), 4);
    let total: f64 = ordination.retained().map(|a| a.proportion_explained).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-9);
}

#[test]
fn test_request_responses_have_two_fields() {
    let table = create_example_table();
    let config = EngineConfig::default();
    let requests = vec![
        AnalysisRequest::alpha(AlphaMetric::Simpson),
        AnalysisRequest::Alpha {
            metric: AlphaMetric::Chao1,
            group_column: Some("group".to_string()),
            test: Some(TestKind::MannWhitney),
        },
        AnalysisRequest::Beta {
            metric: DistanceMetric::Jaccard,
            axes: 3,
            group_column: Some("group".to_string()),
        },
        AnalysisRequest::Distances {
            metric: DistanceMetric::BrayCurtis,
        },
        AnalysisRequest::rarefaction(None),
        AnalysisRequest::Taxonomy {
            lineages: None,
            rank: TaxonomicRank::Phylum,
            top_n: 5,
            per_sample: true,
        },
    ];

    for result in run_batch(&table, &requests, &config) {
        let response = result.unwrap();
        let json = serde_json::to_value(&response).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("data"));
        assert!(obj.contains_key("visualization_spec"));
    }
}

#[test]
fn test_tests_agree_on_separated_groups() {
    let table = create_synthetic_table();
    let config = ComparisonConfig::default();

    let kw = compute_alpha(
        &table,
        &AlphaOptions::new(AlphaMetric::Observed).grouped_by("group"),
        &config,
    )
    .unwrap()
    .comparison
    .unwrap();
    let mw = compute_alpha(
        &table,
        &AlphaOptions::new(AlphaMetric::Observed)
            .grouped_by("group")
            .with_test(TestKind::MannWhitney),
        &config,
    )
    .unwrap()
    .comparison
    .unwrap();

    assert!(kw.significant);
    assert!(mw.significant);
    assert_eq!(kw.highest_median_group.as_deref(), Some("rich"));
    assert_eq!(mw.highest_median_group.as_deref(), Some("rich"));
}

#[test]
fn test_results_are_deterministic() {
    let table = create_synthetic_table();
    let config = EngineConfig::default();
    let request = AnalysisRequest::Beta {
        metric: DistanceMetric::BrayCurtis,
        axes: 2,
        group_column: Some("group".to_string()),
    };

    let first = run_request(&table, &request, &config).unwrap();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let single = pool.install(|| run_request(&table, &request, &config).unwrap());
    assert_eq!(first.data, single.data);

    let first = run_request(&table, &AnalysisRequest::rarefaction(None), &config).unwrap();
    let single = pool.install(|| run_request(&table, &AnalysisRequest::rarefaction(None), &config).unwrap());
    assert_eq!(first.data, single.data);
}

#[test]
fn test_rarefaction_identities() {
    let table = create_synthetic_table();
    let totals = table.sample_totals();
    let curve = analyze_rarefaction(&table, None, &RarefactionConfig::default()).unwrap();

    for (sample, total) in curve.samples.iter().zip(&totals) {
        assert_eq!(sample.total as f64, *total);
        for pair in sample.points.windows(2) {
            assert!(pair[1].expected >= pair[0].expected - 1e-12);
        }
    }

    // Evaluating a sample at its own total recovers its observed richness
    let first = &curve.samples[0];
    let depths = [0, first.total];
    let exact = analyze_rarefaction(&table, Some(&depths[..]), &RarefactionConfig::default()).unwrap();
    let sample = exact.sample(&first.sample_id).unwrap();
    assert_eq!(sample.expected_at(0), Some(0.0));
    assert_eq!(sample.expected_at(first.total), Some(first.observed as f64));
}

#[test]
fn test_errors_are_reported() {
    let table = create_example_table();
    let config = EngineConfig::default();

    let err = run_request(
        &table,
        &AnalysisRequest::Alpha {
            metric: AlphaMetric::Shannon,
            group_column: Some("site".to_string()),
            test: None,
        },
        &config,
    )
    .unwrap_err();
    assert_eq!(err.kind(), "unknown_metadata_column");

    let values: BTreeMap<String, f64> = [("s1".to_string(), 1.0), ("s3".to_string(), 2.0)].into_iter().collect();
    let err = run_request(
        &table,
        &AnalysisRequest::Compare {
            values,
            group_column: "group".to_string(),
            test: TestKind::MannWhitney,
        },
        &config,
    )
    .unwrap_err();
    assert_eq!(err.kind(), "insufficient_group_size");
}

#[test]
fn test_config_yaml_drives_analysis() {
    let yaml = "rarefaction:\n  depth_steps: 4\nvisualization:\n  max_curves: 1\n";
    let config = EngineConfig::from_yaml(yaml).unwrap();
    let table = create_synthetic_table();
    let response = run_request(&table, &AnalysisRequest::rarefaction(None), &config).unwrap();
    assert!(response.data["depths"].as_array().unwrap().len() <= 4);
    let spec = response.visualization_spec.unwrap();
    assert_eq!(spec.traces.len(), 1);
}
