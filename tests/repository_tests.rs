use halloffame::{
    HallOfFameError, ParamMatch, Repository, StrategyQuery, Tier,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tempfile::TempDir;

fn metrics(sharpe: f64) -> HashMap<String, f64> {
    HashMap::from([("sharpe_ratio".to_string(), sharpe)])
}

fn params(entries: &[(&str, Value)]) -> HashMap<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn repo() -> (TempDir, Repository) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let repository = Repository::with_defaults(dir.path()).unwrap();
    (dir, repository)
}

#[test]
fn missing_sharpe_is_rejected_before_any_io() {
    let (_dir, mut repo) = repo();
    let result = repo.add_strategy(
        "turtle",
        HashMap::new(),
        HashMap::from([("annual_return".to_string(), 0.3)]),
        None,
        None,
    );
    assert!(matches!(result, Err(HallOfFameError::MissingMetric(_))));
    assert_eq!(repo.get_statistics().total, 0);
    assert_eq!(repo.get_statistics().backup_count, 0);
}

#[test]
fn genome_id_format_and_champion_metric() {
    let (_dir, mut repo) = repo();
    let id = repo
        .add_strategy(
            "turtle",
            params(&[("n", json!(10))]),
            metrics(2.3),
            Some("rsi(close, 14) crossover threshold".to_string()),
            None,
        )
        .unwrap();
    assert!(id.starts_with("turtle_"));
    assert!(id.ends_with("_2.30"));

    let champions = repo.get_champions(Some(1), None);
    assert_eq!(champions.len(), 1);
    assert_eq!(champions[0].metrics["sharpe_ratio"], 2.3);
    assert_eq!(champions[0].parameters["n"], json!(10));
}

#[test]
fn current_champion_tracks_best_of_champions_tier_only() {
    let (_dir, mut repo) = repo();
    assert!(repo.get_current_champion().is_none());

    repo.add_strategy("a", HashMap::new(), metrics(2.5), None, None)
        .unwrap();
    repo.add_strategy("b", HashMap::new(), metrics(3.0), None, None)
        .unwrap();
    repo.add_strategy("c", HashMap::new(), metrics(2.8), None, None)
        .unwrap();

    let champion = repo.get_current_champion().unwrap();
    assert_eq!(champion.sharpe_ratio(), Some(3.0));

    // A new contender never displaces the champion.
    repo.add_strategy("d", HashMap::new(), metrics(1.8), None, None)
        .unwrap();
    assert_eq!(
        repo.get_current_champion().unwrap().sharpe_ratio(),
        Some(3.0)
    );
}

#[test]
fn identical_code_is_rejected_as_duplicate() {
    let (_dir, mut repo) = repo();
    let code = "rsi(close, 14) crossover sma(close, 20) stop_loss(0.02)";
    let first = repo
        .add_strategy("turtle", HashMap::new(), metrics(2.1), Some(code.to_string()), None)
        .unwrap();

    let second = repo.add_strategy(
        "breakout",
        HashMap::new(),
        metrics(1.6),
        Some(code.to_string()),
        None,
    );
    match second {
        Err(HallOfFameError::Duplicate {
            nearest_id,
            similarity,
            shared_features,
        }) => {
            assert_eq!(nearest_id, first);
            assert!(similarity > 0.9);
            assert!(shared_features.contains(&"indicator:rsi".to_string()));
        }
        other => panic!("expected Duplicate, got {:?}", other.map(|_| ())),
    }
    // Rejection leaves no trace.
    assert_eq!(repo.get_statistics().total, 1);
}

#[test]
fn disjoint_feature_sets_both_succeed() {
    let (_dir, mut repo) = repo();
    repo.add_strategy(
        "turtle",
        HashMap::new(),
        metrics(2.1),
        Some("rsi(close, 14) threshold".to_string()),
        None,
    )
    .unwrap();
    repo.add_strategy(
        "flow",
        HashMap::new(),
        metrics(1.7),
        Some("obv(volume) take_profit(0.05)".to_string()),
        None,
    )
    .unwrap();
    assert_eq!(repo.get_statistics().total, 2);
}

#[test]
fn strategies_without_code_skip_deduplication() {
    let (_dir, mut repo) = repo();
    repo.add_strategy("a", HashMap::new(), metrics(2.1), None, None)
        .unwrap();
    repo.add_strategy("b", HashMap::new(), metrics(2.2), None, None)
        .unwrap();
    assert_eq!(repo.get_statistics().total, 2);
}

#[test]
fn indices_stay_consistent_across_tiers() {
    let (_dir, mut repo) = repo();
    let entries = [
        ("turtle", 2.6),
        ("turtle", 1.7),
        ("breakout", 2.1),
        ("breakout", 0.4),
        ("meanrev", 1.2),
    ];
    let mut ids = Vec::new();
    for (template, sharpe) in entries {
        ids.push(
            repo.add_strategy(template, HashMap::new(), metrics(sharpe), None, None)
                .unwrap(),
        );
    }

    for id in &ids {
        assert!(repo.get_by_id(id).is_some(), "missing {}", id);
    }

    let champions = repo.get_champions(None, None);
    let contenders = repo.get_contenders(None, None);
    let archive = repo.get_archive(None, None);
    assert_eq!(champions.len(), 2);
    assert_eq!(contenders.len(), 2);
    assert_eq!(archive.len(), 1);
    assert_eq!(champions.len() + contenders.len() + archive.len(), ids.len());
    assert!(champions
        .iter()
        .all(|g| g.sharpe_ratio().unwrap() >= 2.0));
    assert!(contenders
        .iter()
        .all(|g| (1.5..2.0).contains(&g.sharpe_ratio().unwrap())));

    assert_eq!(repo.get_by_template("turtle", None, None).len(), 2);
    assert_eq!(repo.get_by_template("meanrev", None, None).len(), 1);
    assert_eq!(repo.get_by_template("unknown", None, None).len(), 0);

    let stats = repo.get_statistics();
    assert_eq!(stats.per_template["turtle"], 2);
    assert_eq!(stats.per_template["breakout"], 2);
    assert_eq!(stats.champions.count, 2);
    assert_eq!(stats.champions.best_sharpe, Some(2.6));
}

#[test]
fn sharpe_buckets_are_finer_than_tiers() {
    let (_dir, mut repo) = repo();
    repo.add_strategy("a", HashMap::new(), metrics(2.7), None, None)
        .unwrap();
    repo.add_strategy("b", HashMap::new(), metrics(2.2), None, None)
        .unwrap();
    repo.add_strategy("c", HashMap::new(), metrics(1.1), None, None)
        .unwrap();

    assert_eq!(repo.get_by_sharpe_bucket("2.5+", None, None).unwrap().len(), 1);
    assert_eq!(
        repo.get_by_sharpe_bucket("2.0-2.5", None, None).unwrap().len(),
        1
    );
    assert_eq!(
        repo.get_by_sharpe_bucket("1.0-1.5", None, None).unwrap().len(),
        1
    );
    assert_eq!(repo.get_by_sharpe_bucket("<1.0", None, None).unwrap().len(), 0);

    // Unknown label is a caller bug and fails loudly.
    assert!(matches!(
        repo.get_by_sharpe_bucket("5.0+", None, None),
        Err(HallOfFameError::InvalidQueryArgument(_))
    ));
}

#[test]
fn tier_listings_sort_descending_with_stable_ties() {
    let (_dir, mut repo) = repo();
    let mut champ_metrics = metrics(2.4);
    champ_metrics.insert("annual_return".to_string(), 0.10);
    repo.add_strategy("a", HashMap::new(), champ_metrics, None, None)
        .unwrap();

    let mut champ_metrics = metrics(2.9);
    champ_metrics.insert("annual_return".to_string(), 0.30);
    repo.add_strategy("b", HashMap::new(), champ_metrics, None, None)
        .unwrap();

    let mut champ_metrics = metrics(2.6);
    champ_metrics.insert("annual_return".to_string(), 0.20);
    repo.add_strategy("c", HashMap::new(), champ_metrics, None, None)
        .unwrap();

    let by_sharpe: Vec<f64> = repo
        .get_champions(None, None)
        .iter()
        .map(|g| g.sharpe_ratio().unwrap())
        .collect();
    assert_eq!(by_sharpe, vec![2.9, 2.6, 2.4]);

    let by_return: Vec<f64> = repo
        .get_champions(Some(2), Some("annual_return"))
        .iter()
        .map(|g| g.metric("annual_return").unwrap())
        .collect();
    assert_eq!(by_return, vec![0.30, 0.20]);

    // Equal sort keys keep insertion order.
    repo.add_strategy("x", HashMap::new(), metrics(1.0), None, None)
        .unwrap();
    repo.add_strategy("y", HashMap::new(), metrics(1.0), None, None)
        .unwrap();
    let archive: Vec<String> = repo
        .get_archive(None, None)
        .iter()
        .map(|g| g.template_name.clone())
        .collect();
    assert_eq!(archive, vec!["x".to_string(), "y".to_string()]);
}

#[test]
fn query_similar_ranks_most_similar_first() {
    let (_dir, mut repo) = repo();
    let near = repo
        .add_strategy(
            "turtle",
            HashMap::new(),
            metrics(2.1),
            Some("rsi(close, 14) crossover threshold".to_string()),
            None,
        )
        .unwrap();
    repo.add_strategy(
        "flow",
        HashMap::new(),
        metrics(1.1),
        Some("obv(volume) take_profit(0.05)".to_string()),
        None,
    )
    .unwrap();

    let hits = repo.query_similar("rsi(close, 14) crossover threshold", 0.5, None);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].genome.genome_id, near);
    assert!(hits[0].distance < 1e-9);
    assert!(hits[0].similarity > 0.999);
    assert_eq!(hits[0].tier, Tier::Champions);
    assert!(hits[0]
        .shared_features
        .contains(&"filter:crossover".to_string()));

    // Tier filter excludes the only match.
    let hits = repo.query_similar(
        "rsi(close, 14) crossover threshold",
        0.5,
        Some(&[Tier::Archive]),
    );
    assert!(hits.is_empty());
}

#[test]
fn read_side_queries_compose_with_and_semantics() {
    let (_dir, mut repo) = repo();
    let mut m = metrics(2.2);
    m.insert("max_drawdown".to_string(), -0.08);
    repo.add_strategy(
        "turtle",
        params(&[("n", json!(10)), ("hold_days", json!(5))]),
        m,
        Some("rsi(close, 14) crossover threshold".to_string()),
        None,
    )
    .unwrap();

    let mut m = metrics(1.6);
    m.insert("max_drawdown".to_string(), -0.25);
    repo.add_strategy(
        "turtle",
        params(&[("n", json!(20)), ("hold_days", json!(9))]),
        m,
        Some("macd(close) trailing_stop(0.03)".to_string()),
        None,
    )
    .unwrap();

    assert_eq!(repo.query_by_metric_range("sharpe_ratio", 2.0, 3.0).len(), 1);
    assert_eq!(
        repo.query_by_metric_range("max_drawdown", -0.1, 0.0).len(),
        1
    );
    assert_eq!(repo.query_by_metric_range("unknown", 0.0, 1.0).len(), 0);

    assert_eq!(
        repo.query_by_parameters(&[("n".to_string(), ParamMatch::Exact(json!(10)))])
            .len(),
        1
    );
    assert_eq!(
        repo.query_by_parameters(&[(
            "hold_days".to_string(),
            ParamMatch::Range { min: 4.0, max: 10.0 }
        )])
        .len(),
        2
    );

    assert_eq!(
        repo.query_by_factor_pattern(&["indicator:rsi".to_string()]).len(),
        1
    );
    assert_eq!(repo.query_by_code_pattern("trailing_stop").len(), 1);

    // AND-composition: sharpe range matches both, parameter narrows to one.
    let query = StrategyQuery {
        metric_ranges: vec![halloffame::MetricRange {
            metric: "sharpe_ratio".to_string(),
            min: 1.0,
            max: 3.0,
        }],
        parameters: vec![("n".to_string(), ParamMatch::Exact(json!(20)))],
        code_pattern: Some("macd".to_string()),
        tiers: Some(vec![Tier::Contenders]),
        ..Default::default()
    };
    let hits = repo.query_advanced(&query);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].parameters["n"], json!(20));
}

#[test]
fn reopened_repository_restores_state_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let champion_id;
    {
        let mut repo = Repository::with_defaults(dir.path()).unwrap();
        champion_id = repo
            .add_strategy(
                "turtle",
                params(&[("n", json!(10))]),
                metrics(2.5),
                Some("rsi(close, 14) crossover threshold".to_string()),
                None,
            )
            .unwrap();
        repo.add_strategy("b", HashMap::new(), metrics(1.7), None, None)
            .unwrap();
        repo.add_strategy("c", HashMap::new(), metrics(0.3), None, None)
            .unwrap();
    }

    let mut repo = Repository::with_defaults(dir.path()).unwrap();
    let stats = repo.get_statistics();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.champions.count, 1);
    assert_eq!(stats.contenders.count, 1);
    assert_eq!(stats.archive.count, 1);
    assert_eq!(
        repo.get_by_id(&champion_id).unwrap().parameters["n"],
        json!(10)
    );
    assert_eq!(
        repo.get_current_champion().unwrap().genome_id,
        champion_id
    );

    // Factor vectors were rebuilt at startup: dedup still works.
    let result = repo.add_strategy(
        "clone",
        HashMap::new(),
        metrics(2.0),
        Some("rsi(close, 14) crossover threshold".to_string()),
        None,
    );
    assert!(matches!(result, Err(HallOfFameError::Duplicate { .. })));
}

#[test]
fn corrupt_file_does_not_abort_startup() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut repo = Repository::with_defaults(dir.path()).unwrap();
        repo.add_strategy("turtle", HashMap::new(), metrics(2.5), None, None)
            .unwrap();
    }
    std::fs::write(dir.path().join("champions/corrupt.json"), "{not json").unwrap();

    let repo = Repository::with_defaults(dir.path()).unwrap();
    assert_eq!(repo.get_statistics().champions.count, 1);
}

#[test]
fn repositories_on_different_roots_do_not_interfere() {
    let (_dir_a, mut repo_a) = repo();
    let (_dir_b, repo_b) = repo();

    repo_a
        .add_strategy("turtle", HashMap::new(), metrics(2.5), None, None)
        .unwrap();
    assert_eq!(repo_a.get_statistics().total, 1);
    assert_eq!(repo_b.get_statistics().total, 0);
    assert!(repo_b.get_current_champion().is_none());
}
