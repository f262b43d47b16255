//! Property tests for normalization and integration invariants.
//!
//! Uses proptest to verify:
//! 1. Normalized months are strictly increasing and independent of input order
//! 2. Melting N years yields at most 12·N values, exactly the numeric cells,
//!    and rebuilding the grid recovers them
//! 3. YoY equals `(v[t] - v[t-12]) / v[t-12] * 100` and is missing for the
//!    first twelve months

use chrono::NaiveDate;
use pricewave_core::domain::{MonthlySeries, RawObservation, YearMonth};
use pricewave_core::normalize::{
    AggregationRule, Cell, MatrixMelter, SeriesNormalizer, YearMonthGrid,
};
use pricewave_core::panel::{IntegrationOptions, PanelIntegrator};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_rule() -> impl Strategy<Value = AggregationRule> {
    prop_oneof![
        Just(AggregationRule::Mean),
        Just(AggregationRule::Last),
        Just(AggregationRule::First),
        Just(AggregationRule::Sum),
        Just(AggregationRule::Median),
    ]
}

/// Daily observations scattered over roughly four years.
fn arb_observations() -> impl Strategy<Value = Vec<RawObservation>> {
    prop::collection::vec((0i64..1500, -50.0..200.0_f64), 1..200).prop_map(|raw| {
        let base = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
        raw.into_iter()
            .map(|(day, v)| {
                RawObservation::new(
                    base + chrono::Duration::days(day),
                    (v * 1000.0).round() / 1000.0,
                    "prop",
                )
            })
            .collect()
    })
}

/// Cell text: numbers, blanks and the placeholders seen in labor tables.
fn arb_cell_text() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (0.0..20.0_f64).prop_map(|v| format!("{:.1}", v)),
        1 => Just(String::new()),
        1 => Just("-".to_string()),
        1 => Just("(NA)".to_string()),
    ]
}

fn arb_table() -> impl Strategy<Value = (Vec<String>, Vec<Vec<String>>)> {
    prop::collection::vec(prop::collection::vec(arb_cell_text(), 12), 1..8).prop_map(|cells| {
        let mut header = vec!["Year".to_string()];
        header.extend(
            ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
                .iter()
                .map(|s| s.to_string()),
        );
        let rows = cells
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut r = vec![(2016 + i).to_string()];
                r.extend(row);
                r
            })
            .collect();
        (header, rows)
    })
}

// ── 1. Normalizer ordering ───────────────────────────────────────────

proptest! {
    #[test]
    fn normalized_months_strictly_increase(obs in arb_observations(), rule in arb_rule()) {
        let series = SeriesNormalizer::new(rule).normalize("gas_price", &obs);
        let months: Vec<YearMonth> = series.observed().map(|(m, _)| m).collect();
        prop_assert!(!months.is_empty());
        for pair in months.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn normalizer_ignores_input_order(
        obs in arb_observations(),
        rule in arb_rule(),
        seed in any::<u64>(),
    ) {
        let normalizer = SeriesNormalizer::new(rule);
        let forward = normalizer.normalize("gas_price", &obs);

        let mut shuffled = obs.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
        let backward = normalizer.normalize("gas_price", &shuffled);
        prop_assert_eq!(forward, backward);
    }
}

// ── 2. Melt cardinality and round trip ───────────────────────────────

proptest! {
    #[test]
    fn melt_emits_exactly_numeric_cells((header, rows) in arb_table()) {
        let grid = YearMonthGrid::from_table("unemployment_total", &header, &rows).unwrap();
        let series = MatrixMelter::default().melt(&grid);

        let numeric = rows
            .iter()
            .flat_map(|r| r[1..].iter())
            .filter(|c| matches!(Cell::parse(c), Cell::Value(_)))
            .count();
        prop_assert!(series.observed_count() <= 12 * rows.len());
        prop_assert_eq!(series.observed_count(), numeric);

        let rebuilt = YearMonthGrid::from_series(&series);
        for (year, row) in grid.years().iter().zip(grid.rows()) {
            for (i, cell) in row.iter().enumerate() {
                if let Cell::Value(v) = cell {
                    prop_assert_eq!(rebuilt.cell(*year, i as u32 + 1), Some(&Cell::Value(*v)));
                }
            }
        }
    }
}

// ── 3. YoY formula ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn yoy_matches_formula(values in prop::collection::vec(50.0..300.0_f64, 13..60)) {
        let start = YearMonth::first_of_year(2016);
        let cpi = MonthlySeries::from_slots(
            "cpi_total",
            start,
            values.iter().map(|v| Some(*v)).collect(),
        );
        let panel = PanelIntegrator::new(IntegrationOptions::default())
            .integrate(vec![cpi])
            .unwrap();
        let yoy = panel.get("cpi_total_yoy").unwrap();

        for (t, slot) in yoy.slots().iter().enumerate() {
            if t < 12 {
                prop_assert_eq!(*slot, None);
            } else {
                let expected = (values[t] - values[t - 12]) / values[t - 12] * 100.0;
                prop_assert_eq!(*slot, Some(expected));
            }
        }
    }
}
