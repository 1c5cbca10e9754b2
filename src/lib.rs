//! # Kiosk Report
//!
//! Turns kiosk malfunction logs exported as spreadsheets into period-over-period
//! incident analytics.
//!
//! - **Normalization**: sheets are merged, column aliases resolved, timestamps
//!   parsed and calendar labels (month, Sunday-start week, quarter) derived.
//! - **Period resolution**: a [`Selection`] yields the current subset and the
//!   comparable prior subset (previous week within the month, previous month,
//!   or previous quarter with year rollover).
//! - **Aggregation**: totals, per-category deltas, rankings and patterns.
//! - **Narrative**: short markdown findings built from the aggregates.

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod loader;
pub mod narrative;
pub mod normalize;
pub mod output;
pub mod period;
pub mod report;
pub mod session;
pub mod types;
pub mod util;

pub use aggregate::{aggregate, top_n_devices};
pub use cache::RecordCache;
pub use error::{ReportError, Result};
pub use loader::{load_and_normalize, load_sheets, LoadReport};
pub use normalize::{canonicalize, normalize, NormalizeConfig, NormalizeReport};
pub use period::{resolve, PeriodResolver, Resolution};
pub use report::{build_report, DashboardReport};
pub use session::Session;
pub use types::*;
