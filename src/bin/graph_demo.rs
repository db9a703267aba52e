#![cfg(not(tarpaulin_include))]

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let graphs = pressure_graph::render::create_example_graphs();

    for (name, file_path) in graphs {
        println!("Created {} graph at {}", name, file_path);
    }

    Ok(())
}
