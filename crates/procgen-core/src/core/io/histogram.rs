use crate::core::models::data1d::Data1D;
use crate::core::models::histogram::Histogram1D;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistogramExportError {
    #[error("CSV writing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
}

#[derive(Debug, Serialize)]
struct HistogramRow {
    bin_centre: f64,
    count: u64,
}

#[derive(Debug, Serialize)]
struct DataRow {
    x: f64,
    value: f64,
}

/// Writes a histogram as `bin_centre,count` rows with a header.
pub fn write_histogram_csv(
    histogram: &Histogram1D,
    writer: impl std::io::Write,
) -> Result<(), csv::Error> {
    write_rows(histogram, &mut csv::Writer::from_writer(writer))
}

pub fn write_histogram_csv_path(
    histogram: &Histogram1D,
    path: &Path,
) -> Result<(), HistogramExportError> {
    let mut csv_writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    write_rows(histogram, &mut csv_writer).map_err(|e| csv_error(path, e))
}

/// Writes processed data as `x,value` rows with a header.
pub fn write_data1d_csv(data: &Data1D, writer: impl std::io::Write) -> Result<(), csv::Error> {
    write_data_rows(data, &mut csv::Writer::from_writer(writer))
}

pub fn write_data1d_csv_path(data: &Data1D, path: &Path) -> Result<(), HistogramExportError> {
    let mut csv_writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    write_data_rows(data, &mut csv_writer).map_err(|e| csv_error(path, e))
}

fn csv_error(path: &Path, source: csv::Error) -> HistogramExportError {
    HistogramExportError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

fn write_data_rows<W: std::io::Write>(
    data: &Data1D,
    csv_writer: &mut csv::Writer<W>,
) -> Result<(), csv::Error> {
    for (x, value) in data.points() {
        csv_writer.serialize(DataRow { x, value })?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn write_rows<W: std::io::Write>(
    histogram: &Histogram1D,
    csv_writer: &mut csv::Writer<W>,
) -> Result<(), csv::Error> {
    for (bin_centre, &count) in histogram.bin_centres().into_iter().zip(histogram.counts()) {
        csv_writer.serialize(HistogramRow { bin_centre, count })?;
    }
    csv_writer.flush()?;
    Ok(())
}
