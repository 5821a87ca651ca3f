//! File I/O for the Microval workspace.
//!
//! - **Tables**: tab-delimited merged abundance profiles with metadata rows,
//!   via the `tsv` feature (enabled by default)
//! - **Results**: per-fold AUC log, mean ROC curve table and a JSON run
//!   summary, via the `tsv` feature

#[cfg(feature = "tsv")]
pub mod table;

#[cfg(feature = "tsv")]
pub mod sink;

// Re-exports for convenience.
#[cfg(feature = "tsv")]
pub use table::{parse_row_list, parse_table_str, read_table};
#[cfg(feature = "tsv")]
pub use sink::{
    create_output, summary_json, write_curve_tsv, write_summary,
    write_summary_json, AucLogWriter, PlotStyle, AUC_LOG_HEADER,
};
