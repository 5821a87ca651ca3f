//! Result writers: per-fold AUC log, mean curve table, and run summary.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use ::csv::{Writer, WriterBuilder};
use microval_core::{MicrovalError, Result};
use microval_ml::{AggregateCurve, CvReport, FoldResult};
use serde_json::json;

/// Header of the per-fold AUC log.
pub const AUC_LOG_HEADER: [&str; 3] = ["repeat", "fold", "roc_auc"];

/// Create (or truncate) an output file, naming the path in any I/O error.
pub fn create_output(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    File::create(path).map_err(|e| {
        MicrovalError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

fn csv_err(e: ::csv::Error) -> MicrovalError {
    MicrovalError::Other(format!("TSV write failed: {}", e))
}

/// Tab-delimited `repeat / fold / roc_auc` stream, one row per valid fold.
pub struct AucLogWriter<W: Write> {
    writer: Writer<W>,
}

impl AucLogWriter<File> {
    /// Create (or truncate) a log file and write its header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(create_output(path)?)
    }
}

impl<W: Write> AucLogWriter<W> {
    /// Wrap any writer and emit the header row.
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(inner);
        writer.write_record(AUC_LOG_HEADER).map_err(csv_err)?;
        Ok(Self { writer })
    }

    /// Append one fold's AUC.
    pub fn write_fold(&mut self, result: &FoldResult) -> Result<()> {
        self.writer
            .write_record([
                result.trial.to_string(),
                result.fold.to_string(),
                result.auc.to_string(),
            ])
            .map_err(csv_err)
    }

    /// Append every fold of a report.
    pub fn write_report(&mut self, report: &CvReport) -> Result<()> {
        for result in &report.results {
            self.write_fold(result)?;
        }
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| MicrovalError::Io(e.into_error()))
    }
}

/// Write the mean curve and its ±1 std band, one grid point per row.
pub fn write_curve_tsv<W: Write>(inner: W, curve: &AggregateCurve) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(inner);
    writer
        .write_record(["fpr", "mean_tpr", "std_tpr", "tpr_lower", "tpr_upper"])
        .map_err(csv_err)?;
    let lower = curve.tpr_lower();
    let upper = curve.tpr_upper();
    for (i, (fpr, mean, std)) in curve.points().enumerate() {
        writer
            .write_record([
                fpr.to_string(),
                mean.to_string(),
                std.to_string(),
                lower[i].to_string(),
                upper[i].to_string(),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

/// Presentation settings handed to whatever draws the mean ROC figure.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub font_family: String,
    pub font_size: f64,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".into(),
            font_size: 11.0,
        }
    }
}

/// Scalar statistics, run counts and plot settings as a JSON document.
pub fn summary_json(curve: &AggregateCurve, report: &CvReport, style: &PlotStyle) -> String {
    let skipped: Vec<_> = report
        .skipped
        .iter()
        .map(|s| json!({ "repeat": s.trial, "fold": s.fold }))
        .collect();
    json!({
        "mean_auc": curve.mean_auc,
        "std_auc": curve.std_auc,
        "mean_curve_auc": curve.mean_curve_auc,
        "n_folds": curve.n_folds,
        "grid_size": curve.fpr.len(),
        "skipped_folds": skipped,
        "cancelled": report.cancelled,
        "plot": {
            "font_family": style.font_family,
            "font_size": style.font_size,
        },
    })
    .to_string()
}

/// Write [`summary_json`] and a trailing newline to any writer.
pub fn write_summary<W: Write>(
    mut inner: W,
    curve: &AggregateCurve,
    report: &CvReport,
    style: &PlotStyle,
) -> Result<()> {
    inner.write_all(summary_json(curve, report, style).as_bytes())?;
    inner.write_all(b"\n")?;
    inner.flush()?;
    Ok(())
}

/// [`write_summary`] to a file path.
pub fn write_summary_json(
    path: impl AsRef<Path>,
    curve: &AggregateCurve,
    report: &CvReport,
    style: &PlotStyle,
) -> Result<()> {
    write_summary(create_output(path)?, curve, report, style)
}
