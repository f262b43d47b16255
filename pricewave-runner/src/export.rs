//! Reporting and export — CSV, JSON, and Markdown artifact generation.
//!
//! - **CSV**: the panel itself (one row per month), lag results, the chain
//!   x lag matrix and break-test partitions
//! - **Panel metadata**: a `<panel>.meta.json` sidecar next to each panel CSV
//!   recording which columns are derived, plus the panel fingerprint
//! - **JSON**: the full `StudyReport` and `BuildReport`, with schema versioning
//! - **Markdown**: a human-readable study summary
//!
//! Persisted study reports carry a `schema_version`. Versions newer than this
//! build understands are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::warn;

use pricewave_core::domain::YearMonth;
use pricewave_core::panel::{Panel, YOY_SUFFIX};
use pricewave_core::AnalysisError;

use crate::pipeline::{BuildReport, PanelBuild, PanelSummary};
use crate::study::{StudyOutput, StudyReport, SCHEMA_VERSION};

pub const PANEL_CSV: &str = "panel.csv";
pub const STUDY_PANEL_CSV: &str = "study_panel.csv";
pub const BUILD_REPORT_JSON: &str = "build_report.json";
pub const LAG_RESULTS_CSV: &str = "lag_results.csv";
pub const CHAIN_MATRIX_CSV: &str = "chain_matrix.csv";
pub const BREAK_RESULTS_CSV: &str = "break_results.csv";
pub const REPORT_JSON: &str = "report.json";
pub const REPORT_MD: &str = "report.md";

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn record(wtr: &mut csv::Writer<Vec<u8>>, fields: &[&str]) -> Result<()> {
    wtr.write_record(fields)?;
    Ok(())
}

fn cell(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn status(err: &AnalysisError) -> String {
    err.to_string()
}

// ─── Panel CSV ──────────────────────────────────────────────────────

/// Panel as CSV: `month,<metric>...` in sorted metric order, missing cells
/// empty, values printed with round-trip precision.
pub fn export_panel_csv(panel: &Panel) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["month".to_string()];
    header.extend(panel.metric_names().map(str::to_string));
    wtr.write_record(&header)?;

    for (month, row) in panel.rows() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(month.to_string());
        record.extend(row.into_iter().map(cell));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Read a panel written by `export_panel_csv`.
///
/// `derived` names the derived columns, normally taken from the metadata
/// sidecar. Without it, columns ending in `_yoy` are flagged as derived.
pub fn import_panel_csv(content: &str, derived: Option<&[String]>) -> Result<Panel> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let header = rdr.headers().context("panel CSV has no header")?.clone();
    match header.get(0) {
        Some(h) if h.eq_ignore_ascii_case("month") => {}
        other => bail!("panel CSV must start with a 'month' column, found {other:?}"),
    }
    let names: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut months = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("panel CSV row {}", i + 1))?;
        let month: YearMonth = record
            .get(0)
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("panel CSV row {}: bad month", i + 1))?;
        months.push(month);
        for (k, column) in columns.iter_mut().enumerate() {
            let raw = record.get(k + 1).unwrap_or_default();
            let value = if raw.is_empty() {
                None
            } else {
                Some(raw.parse::<f64>().with_context(|| {
                    format!(
                        "panel CSV row {} column '{}': '{raw}' is not a number",
                        i + 1,
                        names[k]
                    )
                })?)
            };
            column.push(value);
        }
    }

    let derived: Vec<String> = match derived {
        Some(names) => names.to_vec(),
        None => names
            .iter()
            .filter(|n| n.ends_with(YOY_SUFFIX))
            .cloned()
            .collect(),
    };
    let panel = Panel::from_columns(months, names.into_iter().zip(columns).collect(), &derived)
        .context("panel CSV does not form a monthly panel")?;
    Ok(panel)
}

pub fn load_panel_csv(path: &Path) -> Result<Panel> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let meta_path = panel_meta_path(path);
    let meta = if meta_path.exists() {
        let json = std::fs::read_to_string(&meta_path)
            .with_context(|| format!("failed to read {}", meta_path.display()))?;
        Some(import_panel_meta(&json).with_context(|| {
            format!("invalid panel metadata {}", meta_path.display())
        })?)
    } else {
        None
    };
    let panel = import_panel_csv(&content, meta.as_ref().map(|m| m.derived.as_slice()))
        .with_context(|| format!("invalid panel file {}", path.display()))?;
    if let Some(meta) = &meta {
        if meta.fingerprint != panel.fingerprint() {
            warn!(
                panel = %path.display(),
                "panel CSV no longer matches its metadata fingerprint"
            );
        }
    }
    Ok(panel)
}

/// Sidecar path for a panel CSV: `panel.csv` -> `panel.meta.json`.
pub fn panel_meta_path(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("meta.json")
}

pub fn export_panel_meta(panel: &Panel) -> Result<String> {
    serde_json::to_string_pretty(&PanelSummary::of(panel))
        .context("failed to serialize panel metadata")
}

pub fn import_panel_meta(json: &str) -> Result<PanelSummary> {
    serde_json::from_str(json).context("failed to deserialize panel metadata")
}

// ─── Study CSVs ─────────────────────────────────────────────────────

/// Columns: series_a, series_b, lag, correlation, pairs, status
pub fn export_lag_results_csv(report: &StudyReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["series_a", "series_b", "lag", "correlation", "pairs", "status"])?;

    for chain in &report.chains {
        match &chain.scan {
            Ok(scan) => {
                for (lag, result) in scan.lags.iter().enumerate() {
                    match result {
                        Ok(r) => record(&mut wtr, &[
                            r.series_a.as_str(),
                            r.series_b.as_str(),
                            &r.lag.to_string(),
                            &format!("{:.6}", r.correlation),
                            &r.pairs.to_string(),
                            "ok",
                        ])?,
                        Err(e) => record(&mut wtr, &[
                            scan.series_a.as_str(),
                            scan.series_b.as_str(),
                            &lag.to_string(),
                            "",
                            "",
                            &status(e),
                        ])?,
                    }
                }
            }
            Err(e) => record(&mut wtr, &[
                chain.leader.as_str(),
                chain.follower.as_str(),
                "",
                "",
                "",
                &status(e),
            ])?,
        }
    }
    finish(wtr)
}

/// One row per chain link, one column per lag; failed lags are empty.
pub fn export_chain_matrix_csv(report: &StudyReport, max_lag: usize) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["link".to_string()];
    header.extend((0..=max_lag).map(|l| format!("lag_{l}")));
    header.push("best_lag".to_string());
    wtr.write_record(&header)?;

    for chain in &report.chains {
        let mut record = vec![chain.label.clone()];
        let scan = chain.scan.as_ref().ok();
        record.extend((0..=max_lag).map(|lag| {
            scan.and_then(|s| s.correlation_at(lag))
                .map(|r| format!("{r:.6}"))
                .unwrap_or_default()
        }));
        record.push(chain.best_lag().map(|l| l.to_string()).unwrap_or_default());
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Columns: series_a, series_b, period, correlation, sample_size, status
pub fn export_break_results_csv(report: &StudyReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "series_a",
        "series_b",
        "period",
        "correlation",
        "sample_size",
        "status",
    ])?;

    for test in report.breaks.iter().filter_map(|b| b.as_ref().ok()) {
        for (period, part) in [("pre", &test.pre), ("post", &test.post)] {
            match part {
                Ok(r) => record(&mut wtr, &[
                    r.series_a.as_str(),
                    r.series_b.as_str(),
                    period,
                    &format!("{:.6}", r.correlation),
                    &r.sample_size.to_string(),
                    "ok",
                ])?,
                Err(e) => record(&mut wtr, &[
                    test.series_a.as_str(),
                    test.series_b.as_str(),
                    period,
                    "",
                    "",
                    &status(e),
                ])?,
            }
        }
    }
    for err in report.breaks.iter().filter_map(|b| b.as_ref().err()) {
        record(&mut wtr, &["", "", "", "", "", &status(err)])?;
    }
    finish(wtr)
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &StudyReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize StudyReport to JSON")
}

/// Deserialize a `StudyReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<StudyReport> {
    let report: StudyReport =
        serde_json::from_str(json).context("failed to deserialize StudyReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

pub fn export_build_report_json(report: &BuildReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BuildReport to JSON")
}

// ─── Markdown report ────────────────────────────────────────────────

fn opt(v: Option<f64>, digits: usize) -> String {
    v.map(|v| format!("{v:.digits$}")).unwrap_or_else(|| "n/a".into())
}

/// Markdown summary of a study.
pub fn generate_report(report: &StudyReport) -> String {
    let mut md = String::with_capacity(4096);

    md.push_str("# Price Wave Study\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Period | {} to {} ({} months) |\n",
        report.start, report.end, report.months
    ));
    md.push_str(&format!("| Config Hash | {} |\n", report.config_hash));
    md.push_str(&format!("| Panel Fingerprint | {} |\n", report.panel_fingerprint));
    md.push('\n');

    md.push_str("## Descriptive Statistics\n\n");
    md.push_str("| Metric | N | Mean | Median | Std | Skew | CV |\n");
    md.push_str("| --- | ---: | ---: | ---: | ---: | ---: | ---: |\n");
    for d in &report.descriptive {
        md.push_str(&format!(
            "| {} | {} | {:.3} | {:.3} | {} | {} | {} |\n",
            d.metric,
            d.count,
            d.mean,
            d.median,
            opt(d.std, 3),
            opt(d.skewness, 3),
            opt(d.cv, 3)
        ));
    }
    md.push('\n');

    md.push_str("## Causal Chain\n\n");
    md.push_str("| Link | Leader | Follower | Best Lag | r |\n");
    md.push_str("| --- | --- | --- | ---: | ---: |\n");
    for c in &report.chains {
        let best = c.scan.as_ref().ok().and_then(|s| s.best());
        match (&c.scan, best) {
            (_, Some(b)) => md.push_str(&format!(
                "| {} | {} | {} | {} | {:.3} |\n",
                c.label, c.leader, c.follower, b.lag, b.correlation
            )),
            (Err(e), None) => md.push_str(&format!(
                "| {} | {} | {} | n/a | {e} |\n",
                c.label, c.leader, c.follower
            )),
            (Ok(_), None) => md.push_str(&format!(
                "| {} | {} | {} | n/a | no lag had enough data |\n",
                c.label, c.leader, c.follower
            )),
        }
    }
    md.push('\n');

    md.push_str("## Structural Breaks\n\n");
    for b in &report.breaks {
        match b {
            Ok(t) => {
                md.push_str(&format!(
                    "- **{} vs {}** at {}: pre {}, post {}, change {}",
                    t.series_a,
                    t.series_b,
                    t.boundary,
                    opt(t.pre.as_ref().ok().map(|r| r.correlation), 3),
                    opt(t.post.as_ref().ok().map(|r| r.correlation), 3),
                    opt(t.difference, 3),
                ));
                if t.regime_shift == Some(true) {
                    md.push_str(" (regime shift)");
                }
                md.push('\n');
            }
            Err(e) => md.push_str(&format!("- {e}\n")),
        }
    }
    md.push('\n');

    if !report.regressions.is_empty() {
        md.push_str("## Sensitivity\n\n");
        for r in &report.regressions {
            match r {
                Ok(f) => md.push_str(&format!(
                    "- {} on {}: slope {:.4}, intercept {:.4}, R² {:.3} (n = {})\n",
                    f.y, f.x, f.slope, f.intercept, f.r_squared, f.n
                )),
                Err(e) => md.push_str(&format!("- {e}\n")),
            }
        }
        md.push('\n');
    }

    if let Some(g) = &report.gender_gap {
        md.push_str("## Gender Gap\n\n");
        md.push_str(&format!(
            "Mean gap {:.2} over {} months; maximum {:.2} in {}.\n\n",
            g.mean_gap, g.months, g.max_gap, g.max_month
        ));
    }

    let failures = report.failures();
    if !failures.is_empty() {
        md.push_str("## Skipped Combinations\n\n");
        for f in failures {
            md.push_str(&format!("- {f}\n"));
        }
        md.push('\n');
    }

    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))
}

/// Panel CSV plus its metadata sidecar.
fn write_panel(dir: &Path, name: &str, panel: &Panel) -> Result<PathBuf> {
    let path = dir.join(name);
    write(dir, name, &export_panel_csv(panel)?)?;
    let meta_path = panel_meta_path(&path);
    std::fs::write(&meta_path, export_panel_meta(panel)?)
        .with_context(|| format!("failed to write {}", meta_path.display()))?;
    Ok(path)
}

/// Write `panel.csv`, its metadata and `build_report.json` under
/// `output_dir`.
///
/// Returns the path of the panel file.
pub fn save_build_artifacts(build: &PanelBuild, output_dir: &Path) -> Result<PathBuf> {
    ensure_dir(output_dir)?;
    let panel_path = write_panel(output_dir, PANEL_CSV, &build.panel)?;
    write(
        output_dir,
        BUILD_REPORT_JSON,
        &export_build_report_json(&build.report)?,
    )?;
    Ok(panel_path)
}

/// Write the study CSVs, `report.json`, `report.md` and the panel with
/// derived metrics under `output_dir`.
pub fn save_study_artifacts(output: &StudyOutput, max_lag: usize, output_dir: &Path) -> Result<()> {
    ensure_dir(output_dir)?;
    let report = &output.report;
    write_panel(output_dir, STUDY_PANEL_CSV, &output.panel)?;
    write(output_dir, LAG_RESULTS_CSV, &export_lag_results_csv(report)?)?;
    write(
        output_dir,
        CHAIN_MATRIX_CSV,
        &export_chain_matrix_csv(report, max_lag)?,
    )?;
    write(output_dir, BREAK_RESULTS_CSV, &export_break_results_csv(report)?)?;
    write(output_dir, REPORT_JSON, &export_json(report)?)?;
    write(output_dir, REPORT_MD, &generate_report(report))?;
    Ok(())
}

/// Load `report.json` from an artifact directory. Rejects unknown schema
/// versions.
pub fn load_report(dir: &Path) -> Result<StudyReport> {
    let path = dir.join(REPORT_JSON);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    fn panel() -> Panel {
        Panel::from_columns(
            YearMonth::range_inclusive(ym("2021-01"), ym("2021-03")),
            vec![
                ("cpi_total".into(), vec![Some(261.582), Some(263.014), None]),
                ("cpi_total_yoy".into(), vec![None, Some(1.676_215_3), Some(0.1 + 0.2)]),
            ],
            &["cpi_total_yoy".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn panel_csv_layout() {
        let csv = export_panel_csv(&panel()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "month,cpi_total,cpi_total_yoy");
        assert_eq!(lines[1], "2021-01,261.582,");
        assert_eq!(lines[3], "2021-03,,0.30000000000000004");
    }

    #[test]
    fn panel_csv_reads_back_identically() {
        let original = panel();
        let back = import_panel_csv(&export_panel_csv(&original).unwrap(), None).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.fingerprint(), original.fingerprint());
        assert!(back.is_derived("cpi_total_yoy"));
    }

    #[test]
    fn panel_csv_rejects_non_numeric_cells() {
        let err = import_panel_csv("month,a\n2020-01,abc\n", None).unwrap_err();
        assert!(format!("{err:#}").contains("'abc' is not a number"));
    }

    #[test]
    fn panel_csv_rejects_missing_month_column() {
        assert!(import_panel_csv("date,a\n2020-01,1\n", None).is_err());
    }

    #[test]
    fn metadata_carries_derived_flags_without_a_suffix() {
        // GIVEN a panel with a derived column that has no `_yoy` suffix
        let base = panel();
        let misery = base
            .get("cpi_total")
            .unwrap()
            .map_values("misery_index", |v| v / 100.0);
        let original = base.with_metric(misery).unwrap();
        assert!(original.is_derived("misery_index"));

        // WHEN read back through the metadata sidecar
        let csv = export_panel_csv(&original).unwrap();
        let meta = import_panel_meta(&export_panel_meta(&original).unwrap()).unwrap();
        let back = import_panel_csv(&csv, Some(meta.derived.as_slice())).unwrap();

        // THEN every derived flag survives, not only the suffixed ones
        assert!(back.is_derived("misery_index"));
        assert!(back.is_derived("cpi_total_yoy"));
        assert!(!back.is_derived("cpi_total"));
        assert_eq!(meta.fingerprint, back.fingerprint());

        // AND the suffix guess alone would lose it
        let guessed = import_panel_csv(&csv, None).unwrap();
        assert!(!guessed.is_derived("misery_index"));
    }

    #[test]
    fn sidecar_sits_next_to_the_panel() {
        assert_eq!(
            panel_meta_path(Path::new("out/study_panel.csv")),
            PathBuf::from("out/study_panel.meta.json")
        );
    }
}
