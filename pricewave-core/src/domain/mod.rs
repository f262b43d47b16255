//! Domain types for the monthly integration engine

pub mod month;
pub mod observation;
pub mod series;

pub use month::{MonthParseError, YearMonth};
pub use observation::RawObservation;
pub use series::MonthlySeries;
