#![cfg(not(tarpaulin_include))]

use pressure_graph::downloader::{settings_from_json, to_csv};
use pressure_graph::generator::generate;
use std::env;
use std::fs;
use std::time::Instant;

/// Generates a pressure profile from an exported settings file and writes
/// the points as CSV to stdout or to an output file.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        let program = args.first().map(String::as_str).unwrap_or("profile_cli");
        eprintln!("Usage: {} <settings.json> [output.csv]", program);
        std::process::exit(2);
    }

    let started = Instant::now();
    let json = fs::read_to_string(&args[1])?;
    let settings = settings_from_json(&json)?;
    let graph = generate(&settings)?;
    let csv = to_csv(&graph);

    match args.get(2) {
        Some(path) => {
            fs::write(path, csv)?;
            eprintln!(
                "Wrote {} points to {} in {:.1} ms",
                graph.points.len(),
                path,
                started.elapsed().as_secs_f64() * 1000.0
            );
        }
        None => print!("{}", csv),
    }

    Ok(())
}
