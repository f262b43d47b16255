//! End-to-end analysis scenarios on synthetic panels.
//!
//! Each scenario builds source series the way the normalizers would, runs
//! them through the integrator and checks one engine's observable result.

use chrono::NaiveDate;
use pricewave_core::analysis::{
    gender_gap, misery_index, summarize_gap, BreakConfig, LagConfig, LagCorrelationEngine,
    StructuralBreakTester,
};
use pricewave_core::domain::{MonthlySeries, YearMonth};
use pricewave_core::normalize::{Article, BatchWindow, KeywordSet, TextFearIndexer};
use pricewave_core::panel::{IntegrationOptions, PanelIntegrator};
use pricewave_core::{AnalysisError, Period, Scope};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn ym(s: &str) -> YearMonth {
    s.parse().unwrap()
}

fn series(name: &str, start: &str, values: &[f64]) -> MonthlySeries {
    let start = ym(start);
    MonthlySeries::from_points(
        name,
        values.iter().enumerate().map(|(i, v)| (start.offset(i as i64), *v)),
    )
}

fn noise(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

#[test]
fn follower_shifted_three_months_peaks_at_lag_three() {
    // GIVEN a leader of independent noise and a follower equal to it three
    // months later
    let leader = noise(7, 120);
    let mut follower = vec![f64::NAN; 3];
    follower.extend_from_slice(&leader[..117]);

    let panel = PanelIntegrator::default()
        .integrate(vec![
            series("gas_price", "2016-01", &leader),
            series("cpi_energy_index", "2016-01", &follower),
        ])
        .unwrap();

    // WHEN the lag engine scans 0..=6
    let scan = LagCorrelationEngine::default()
        .scan(&panel, "gas_price", "cpi_energy_index")
        .unwrap();

    // THEN lag 3 wins with r ≈ 1 and every other lag is far weaker
    let best = scan.best().unwrap();
    assert_eq!(best.lag, 3);
    assert!((best.correlation - 1.0).abs() < 1e-9);
    for r in scan.successes().filter(|r| r.lag != 3) {
        assert!(r.correlation.abs() < 0.5, "lag {} r = {}", r.lag, r.correlation);
    }
}

#[test]
fn correlation_collapses_after_boundary() {
    // GIVEN a pair that moves together before 2020-01 and independently after
    let n = 96; // 2016-01 ..= 2023-12
    let a = noise(11, n);
    let independent = noise(12, n);
    let boundary_idx = ym("2016-01").months_until(ym("2020-01")) as usize;
    let b: Vec<f64> = (0..n)
        .map(|i| if i < boundary_idx { a[i] } else { independent[i] })
        .collect();

    let panel = PanelIntegrator::default()
        .integrate(vec![series("a", "2016-01", &a), series("b", "2016-01", &b)])
        .unwrap();

    // WHEN the break tester splits at 2020-01
    let test = StructuralBreakTester::new(BreakConfig::default())
        .test(&panel, "a", "b")
        .unwrap();

    // THEN pre ≈ 1, post near 0, the difference is large and negative and
    // the sample sizes are the partition sizes
    let (pre, post) = test.partitions().unwrap();
    assert_eq!(pre.period, Period::Pre);
    assert_eq!(pre.sample_size, 48);
    assert_eq!(post.sample_size, 48);
    assert!((pre.correlation - 1.0).abs() < 1e-9);
    assert!(post.correlation.abs() < 0.5);
    assert!(test.difference.unwrap() < -0.5);
    assert_eq!(test.regime_shift, Some(true));
}

#[test]
fn gender_gap_feeds_back_into_the_engines() {
    // GIVEN women's and men's unemployment over three years
    let women: Vec<f64> = (0..36).map(|i| 6.0 + (i % 7) as f64 * 0.1).collect();
    let men: Vec<f64> = vec![4.0; 36];
    let panel = PanelIntegrator::default()
        .integrate(vec![
            series("unemployment_women", "2018-01", &women),
            series("unemployment_men", "2018-01", &men),
            series("unemployment_total", "2018-01", &women),
        ])
        .unwrap();

    // WHEN the gap is derived and added to the panel
    let gap = gender_gap(
        "gender_gap",
        panel.get("unemployment_women").unwrap(),
        panel.get("unemployment_men").unwrap(),
    );
    let panel = panel.with_metric(gap).unwrap();

    // THEN months with 6.0 and 4.0 give exactly 2.0, and the gap is usable
    // by the lag engine like any other metric
    let gap = panel.get("gender_gap").unwrap();
    assert_eq!(gap.get(ym("2018-01")), Some(2.0));
    assert!(panel.is_derived("gender_gap"));

    let summary = summarize_gap(gap).unwrap();
    assert_eq!(summary.months, 36);
    assert_eq!(summary.max_month, ym("2018-07"));

    let scan = LagCorrelationEngine::default()
        .scan(&panel, "gender_gap", "unemployment_total")
        .unwrap();
    assert_eq!(scan.best().unwrap().lag, 0);
}

#[test]
fn misery_index_sums_unemployment_and_inflation() {
    let cpi: Vec<f64> = (0..24).map(|i| 100.0 + i as f64).collect();
    let panel = PanelIntegrator::default()
        .integrate(vec![
            series("cpi_total", "2019-01", &cpi),
            series("unemployment_total", "2019-01", &[5.0; 24]),
        ])
        .unwrap();
    let misery = misery_index(
        "misery_index",
        panel.get("unemployment_total").unwrap(),
        panel.get("cpi_total_yoy").unwrap(),
    );
    // 2020-01: 112 vs 100 → 12% + 5
    assert!((misery.get(ym("2020-01")).unwrap() - 17.0).abs() < 1e-9);
    assert_eq!(misery.get(ym("2019-06")), None);
}

#[test]
fn insufficient_lags_are_reported_per_combination() {
    // GIVEN only 14 overlapping months
    let panel = PanelIntegrator::default()
        .integrate(vec![
            series("a", "2020-01", &noise(1, 14)),
            series("b", "2020-01", &noise(2, 14)),
        ])
        .unwrap();

    let scan = LagCorrelationEngine::new(LagConfig {
        max_lag: 6,
        min_pairs: 12,
    })
    .scan(&panel, "a", "b")
    .unwrap();

    // THEN lags 0..=2 succeed and 3..=6 fail, each naming its lag and counts
    assert_eq!(scan.successes().count(), 3);
    let failures: Vec<_> = scan.failures().cloned().collect();
    assert_eq!(failures.len(), 4);
    assert_eq!(
        failures[0],
        AnalysisError::InsufficientData {
            series_a: "a".into(),
            series_b: "b".into(),
            scope: Scope::Lag { lag: 3 },
            available: 11,
            required: 12,
        }
    );
}

#[test]
fn fear_index_joins_panel_with_other_sources() {
    // GIVEN news from two overlapping batches and a gas price series
    let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
    let articles = vec![
        Article {
            id: Some("a1".into()),
            publish_date: date("2022-03-02"),
            title: "Inflation hits families".into(),
            text: "Inflation and recession worries".into(),
            batch: BatchWindow::Historical,
        },
        Article {
            id: Some("a1".into()),
            publish_date: date("2022-03-02"),
            title: "Inflation hits families".into(),
            text: "Inflation and recession worries".into(),
            batch: BatchWindow::Recent,
        },
        Article {
            id: None,
            publish_date: date("2022-04-11"),
            title: "Calm markets".into(),
            text: "nothing notable".into(),
            batch: BatchWindow::Recent,
        },
    ];
    let fear = TextFearIndexer::new("fear_index", KeywordSet::new(["inflation", "recession"]))
        .index(&articles);
    assert_eq!(fear.duplicates_dropped, 1);

    let opts = IntegrationOptions::default();
    let panel = PanelIntegrator::new(opts)
        .integrate(vec![fear.total, series("gas_price", "2022-01", &[3.0, 3.2, 3.9, 4.1, 4.4])])
        .unwrap();

    // THEN the shared index is the overlap and hit counts survive alignment
    assert_eq!(panel.start(), ym("2022-03"));
    assert_eq!(panel.end(), ym("2022-04"));
    let idx = panel.get("fear_index").unwrap();
    assert_eq!(idx.slots(), &[Some(3.0), Some(0.0)]);
}

#[test]
fn fear_index_counts_copy_once_whichever_batch_carries_the_id() {
    // GIVEN the historical copy without an id and the recent copy with one
    let date = NaiveDate::from_ymd_opt(2023, 9, 14).unwrap();
    let historical = Article {
        id: None,
        publish_date: date,
        title: "Recession fears grow".into(),
        text: "recession and layoff talk".into(),
        batch: BatchWindow::Historical,
    };
    let recent = Article {
        id: Some("nyt://article/77".into()),
        batch: BatchWindow::Recent,
        ..historical.clone()
    };
    let indexer = TextFearIndexer::new("fear_index", KeywordSet::new(["recession", "layoff"]));

    // WHEN both batch orders are indexed
    let hist_first = indexer.index([&historical, &recent]);
    let recent_first = indexer.index([&recent, &historical]);

    // THEN both count the story once with identical totals
    for fear in [&hist_first, &recent_first] {
        assert_eq!(fear.articles_counted, 1);
        assert_eq!(fear.duplicates_dropped, 1);
        assert_eq!(fear.total.get(ym("2023-09")), Some(2.0));
    }
    assert_eq!(hist_first.total, recent_first.total);
}
