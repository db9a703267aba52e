use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GraphError, GraphResult};
use crate::generator::GraphData;
use crate::settings::{TestSettings, TestSettingsForm};
use crate::validation::validate_form;

/// File formats a generated graph can be exported to
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raster chart image
    Png,
    /// Vector chart image
    Svg,
    /// Test settings, for regenerating the graph later
    Json,
    /// Generated points as comma-separated values
    Csv,
    /// Generated points as an Excel workbook
    Xlsx,
}

impl ExportFormat {
    /// MIME type sent as `Content-Type` for a download
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    /// Download file name derived from the test start
    ///
    /// # Arguments
    /// * `settings` - Settings of the exported test; only the start is used
    ///
    /// # Returns
    /// * `String` - e.g. `pressure-test-20251031-100000.png`
    pub fn file_name(&self, settings: &TestSettings) -> String {
        format!(
            "pressure-test-{}.{}",
            settings.start_date_time.format("%Y%m%d-%H%M%S"),
            self.extension()
        )
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = GraphError;

    /// Parses a format name, ignoring case
    ///
    /// # Examples
    /// ```
    /// use pressure_graph::downloader::ExportFormat;
    ///
    /// assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
    /// assert!("pdf".parse::<ExportFormat>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(GraphError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Convert generated points to CSV format
///
/// This function exports the generated series as CSV (Comma-Separated Values).
/// The first row is a `time,pressure` header; times use ISO 8601 with
/// millisecond precision and pressures three decimals.
///
/// # Arguments
/// * `graph` - The generated graph to export
///
/// # Returns
/// * `String` - CSV content, one row per point
///
/// # Examples
/// ```
/// use pressure_graph::downloader::to_csv;
/// use pressure_graph::generator::generate;
/// use pressure_graph::settings::{TestSettings, resolve_date_time};
///
/// let settings = TestSettings::new(
///     resolve_date_time("2025-10-31", "10:00:00").unwrap(),
///     resolve_date_time("2025-10-31", "14:00:00").unwrap(),
///     50.0,
///     60.0,
/// );
/// let csv = to_csv(&generate(&settings).unwrap());
/// assert!(csv.starts_with("time,pressure\n2025-10-31T10:00:00.000,0.000\n"));
/// ```
pub fn to_csv(graph: &GraphData) -> String {
    let mut csv_content = String::from("time,pressure\n");
    for point in &graph.points {
        csv_content.push_str(&format!(
            "{},{:.3}\n",
            point.time.format("%Y-%m-%dT%H:%M:%S%.3f"),
            point.pressure
        ));
    }
    csv_content
}

/// Convert generated points to XLSX format
///
/// This function exports the generated series as an Excel workbook using the
/// rust_xlsxwriter library. One row per point after a header row: timestamp,
/// hours since the test start, and pressure.
///
/// # Arguments
/// * `graph` - The generated graph to export
///
/// # Returns
/// * `GraphResult<Vec<u8>>` - XLSX file content as bytes
///
/// # Errors
/// * [`GraphError::Render`] if the workbook cannot be written
#[cfg(feature = "web")]
pub fn to_xlsx(graph: &GraphData) -> GraphResult<Vec<u8>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let xlsx_err = |e: rust_xlsxwriter::XlsxError| GraphError::Render(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    worksheet.write_string(0, 0, "Time").map_err(xlsx_err)?;
    worksheet.write_string(0, 1, "Hours").map_err(xlsx_err)?;
    worksheet.write_string(0, 2, "Pressure").map_err(xlsx_err)?;

    for (row, (point, (hours, _))) in graph
        .points
        .iter()
        .zip(graph.hour_series())
        .enumerate()
    {
        let row = (row + 1) as u32;
        let time = point.time.format("%Y-%m-%d %H:%M:%S").to_string();
        worksheet.write_string(row, 0, &time).map_err(xlsx_err)?;
        worksheet.write_number(row, 1, hours).map_err(xlsx_err)?;
        worksheet.write_number(row, 2, point.pressure).map_err(xlsx_err)?;
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(xlsx_err)
}

/// Serializes settings in the string-based form clients submit
///
/// The output can be fed back to [`settings_from_json`] to regenerate the
/// same test.
///
/// # Arguments
/// * `settings` - Settings to export
///
/// # Returns
/// * `GraphResult<String>` - Pretty-printed JSON
pub fn settings_to_json(settings: &TestSettings) -> GraphResult<String> {
    Ok(serde_json::to_string_pretty(&settings.to_form())?)
}

/// Loads settings from an exported JSON file, validating them
///
/// # Arguments
/// * `json` - Contents of a file written by [`settings_to_json`]
///
/// # Returns
/// * `GraphResult<TestSettings>` - The resolved settings
///
/// # Errors
/// * [`GraphError::Json`] if the text is not a settings document
/// * [`GraphError::Validation`] if any field is rejected
pub fn settings_from_json(json: &str) -> GraphResult<TestSettings> {
    let form: TestSettingsForm = serde_json::from_str(json)?;
    Ok(validate_form(&form)?)
}

/// Produces the exported file for `format`
///
/// Image formats render `graph`; JSON exports the settings; CSV and XLSX
/// export the generated points.
///
/// # Arguments
/// * `format` - Requested export format
/// * `settings` - Settings the graph was generated from
/// * `graph` - The generated points
/// * `options` - Chart size and labels for image formats
///
/// # Returns
/// * `GraphResult<Vec<u8>>` - File content ready to be sent as a download
#[cfg(feature = "web")]
pub fn export(
    format: ExportFormat,
    settings: &TestSettings,
    graph: &GraphData,
    options: &crate::render::GraphOptions,
) -> GraphResult<Vec<u8>> {
    use crate::render::{render_png, render_svg};

    match format {
        ExportFormat::Png => render_png(graph, settings, options),
        ExportFormat::Svg => Ok(render_svg(graph, settings, options)?.into_bytes()),
        ExportFormat::Json => Ok(settings_to_json(settings)?.into_bytes()),
        ExportFormat::Csv => Ok(to_csv(graph).into_bytes()),
        ExportFormat::Xlsx => to_xlsx(graph),
    }
}
