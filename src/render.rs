#![cfg(feature = "web")]
use plotters::coord::Shift;
use plotters::prelude::*;
use std::io::Cursor;

use crate::error::{GraphError, GraphResult};
use crate::generator::{GraphData, generate};
use crate::settings::{PressureStage, TestSettings, offset_millis, resolve_date_time};

/// Configuration options for graph rendering
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title override; the settings' title is used when `None`
    pub title: Option<String>,

    /// Label for the X-axis
    pub x_label: String,

    /// Pressure unit shown on the Y-axis and in the info box
    pub pressure_unit: String,

    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: None,
            x_label: "Time".to_string(),
            pressure_unit: "MPa".to_string(),
            width: 1200,
            height: 800,
        }
    }
}

/// Axis extents of a pressure chart
///
/// X values are hours since the test start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChartBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl ChartBounds {
    /// Fraction of the test window added as padding on each side of the time axis
    pub const TIME_BUFFER: f64 = 0.05;

    /// Computes chart extents for a generated graph
    ///
    /// The time axis covers the test window plus a 5% buffer on each side; the
    /// pressure axis starts at 0 and ends at the smallest multiple of 5 that is
    /// at least 1.1 times the highest pressure.
    pub fn for_graph(graph: &GraphData) -> Self {
        let total_hours = (graph.end_date_time - graph.start_date_time).num_milliseconds()
            as f64
            / 3_600_000.0;
        let buffer = total_hours * Self::TIME_BUFFER;
        Self {
            x_min: -buffer,
            x_max: total_hours + buffer,
            y_max: pressure_axis_max(graph.max_pressure()),
        }
    }
}

/// Upper end of the pressure axis for a given peak pressure
///
/// # Examples
/// ```
/// use pressure_graph::render::pressure_axis_max;
///
/// assert_eq!(pressure_axis_max(50.0), 55.0);
/// assert_eq!(pressure_axis_max(60.0), 70.0);
/// assert_eq!(pressure_axis_max(0.0), 5.0);
/// ```
pub fn pressure_axis_max(max_pressure: f64) -> f64 {
    // 1.1 / 5 as 11 / 50 keeps exact multiples (e.g. 50 -> 55) from rounding up.
    let steps = (max_pressure * 11.0 / 50.0 - 1e-9).ceil();
    (steps * 5.0).max(5.0)
}

/// Text lines shown in the chart's info box
pub fn info_lines(settings: &TestSettings, unit: &str) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Start: {}",
            settings.start_date_time.format("%Y-%m-%d %H:%M:%S")
        ),
        format!("End: {}", settings.end_date_time.format("%Y-%m-%d %H:%M:%S")),
        format!("Working pressure: {} {}", settings.working_pressure, unit),
        format!("Hold duration: {} min", settings.pressure_hold_duration),
        format!("Intermediate stages: {}", settings.intermediate_tests.len()),
    ];
    if let Some(equipment) = &settings.equipment {
        lines.push(format!("Equipment: {}", equipment));
    }
    if let Some(number) = &settings.test_number {
        lines.push(format!("Test no.: {}", number));
    }
    if let Some(temperature) = settings.temperature {
        lines.push(format!("Temperature: {} °C", temperature));
    }
    lines
}

fn render_err<E: std::fmt::Display>(e: E) -> GraphError {
    GraphError::Render(e.to_string())
}

/// Draws the complete chart onto any plotters backend
fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    graph: &GraphData,
    settings: &TestSettings,
    options: &GraphOptions,
) -> GraphResult<()> {
    root.fill(&WHITE).map_err(render_err)?;

    let bounds = ChartBounds::for_graph(graph);
    let title = options
        .title
        .clone()
        .unwrap_or_else(|| settings.display_title());
    let start = graph.start_date_time;
    let time_label = |hours: &f64| {
        offset_millis(start, hours * 3_600_000.0)
            .format("%H:%M")
            .to_string()
    };
    let y_label = format!("Pressure ({})", options.pressure_unit);

    let mut chart = ChartBuilder::on(root)
        .caption(&title, ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(bounds.x_min..bounds.x_max, 0.0..bounds.y_max)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&y_label)
        .x_label_formatter(&time_label)
        .x_labels(12)
        .y_labels(10)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(
            AreaSeries::new(graph.hour_series(), 0.0, BLUE.mix(0.2))
                .border_style(BLUE.stroke_width(2)),
        )
        .map_err(render_err)?;

    // Info box in the top-right corner of the plotting area
    let lines = info_lines(settings, &options.pressure_unit);
    let (width, _) = root.dim_in_pixel();
    let box_width = 300;
    let line_height = 18;
    let x0 = width as i32 - box_width - 40;
    let y0 = 60;
    let y1 = y0 + line_height * lines.len() as i32 + 12;
    root.draw(&Rectangle::new(
        [(x0, y0), (x0 + box_width, y1)],
        WHITE.mix(0.85).filled(),
    ))
    .map_err(render_err)?;
    root.draw(&Rectangle::new(
        [(x0, y0), (x0 + box_width, y1)],
        BLACK.stroke_width(1),
    ))
    .map_err(render_err)?;
    for (i, line) in lines.iter().enumerate() {
        root.draw(&Text::new(
            line.clone(),
            (x0 + 8, y0 + 6 + line_height * i as i32),
            ("sans-serif", 14).into_font(),
        ))
        .map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    Ok(())
}

/// Renders a graph as PNG bytes
///
/// Draws into an in-memory RGB buffer and encodes it with the `image` crate,
/// so no temporary files are involved.
pub fn render_png(
    graph: &GraphData,
    settings: &TestSettings,
    options: &GraphOptions,
) -> GraphResult<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_chart(&root, graph, settings, options)?;
    }

    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| GraphError::Render("Bitmap buffer has the wrong size".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(render_err)?;
    Ok(png)
}

/// Renders a graph as an SVG document
pub fn render_svg(
    graph: &GraphData,
    settings: &TestSettings,
    options: &GraphOptions,
) -> GraphResult<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw_chart(&root, graph, settings, options)?;
    }
    Ok(svg)
}

/// Creates example graphs for demonstration purposes
///
/// Generates one plain profile and one with intermediate stages, and saves
/// each as PNG and SVG in the "graph_output" directory.
///
/// # Returns
/// * A vector of tuples containing the example name and file path
pub fn create_example_graphs() -> Vec<(String, String)> {
    let mut result = Vec::new();

    let output_dir = "graph_output";
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        log::warn!("Couldn't create {}: {}", output_dir, e);
        return result;
    }

    let (Some(start), Some(end)) = (
        resolve_date_time("2025-10-31", "10:00:00"),
        resolve_date_time("2025-10-31", "18:00:00"),
    ) else {
        return result;
    };

    let mut plain = TestSettings::new(start, end, 50.0, 60.0);
    plain.title = Some("Example Pressure Test".to_string());

    let mut staged = plain
        .clone()
        .with_stage(
            PressureStage::new("stage-1", 2.0, 30.0)
                .with_pressure(60.0)
                .with_target_pressure(20.0),
        )
        .with_stage(
            PressureStage::new("stage-2", 5.0, 45.0)
                .with_pressure(70.0)
                .with_hold_drift(-5.0),
        );
    staged.title = Some("Example Staged Pressure Test".to_string());
    staged.equipment = Some("Pipeline DN300".to_string());

    let options = GraphOptions::default();
    for (name, settings) in [("plain", &plain), ("staged", &staged)] {
        let graph = match generate(settings) {
            Ok(graph) => graph,
            Err(e) => {
                log::warn!("Skipping example {}: {}", name, e);
                continue;
            }
        };

        let png_path = format!("{}/{}_graph.png", output_dir, name);
        match render_png(&graph, settings, &options)
            .and_then(|png| std::fs::write(&png_path, png).map_err(GraphError::from))
        {
            Ok(()) => result.push((format!("{} (png)", name), png_path)),
            Err(e) => log::warn!("Failed to write {}: {}", png_path, e),
        }

        let svg_path = format!("{}/{}_graph.svg", output_dir, name);
        match render_svg(&graph, settings, &options)
            .and_then(|svg| std::fs::write(&svg_path, svg).map_err(GraphError::from))
        {
            Ok(()) => result.push((format!("{} (svg)", name), svg_path)),
            Err(e) => log::warn!("Failed to write {}: {}", svg_path, e),
        }
    }

    result
}
