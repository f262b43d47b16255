//! Wide year x month CSV tables (unemployment rates).

use std::path::Path;

use tracing::debug;

use pricewave_core::domain::{MonthlySeries, YearMonth};
use pricewave_core::normalize::{MatrixMelter, YearMonthGrid};

use super::SourceError;

/// Read a `Year,Jan,...,Dec[,Annual]` table and melt it to a monthly series.
///
/// Rows where every cell is blank are skipped. Cells after
/// `reported_through` are ignored.
pub fn decode_labor(
    path: &Path,
    content: &str,
    metric: &str,
    reported_through: Option<YearMonth>,
) -> Result<MonthlySeries, SourceError> {
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let grid = YearMonthGrid::from_table(metric, &header, &rows).map_err(|source| {
        SourceError::Table {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let series = MatrixMelter::new(reported_through).melt(&grid);
    debug!(metric, years = grid.years().len(), path = %path.display(), "decoded labor table");
    Ok(series)
}
