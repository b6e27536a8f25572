//! meshview - interactive viewer window

use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();

    for arg in &args[1..] {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&args[0]);
                return;
            }
            "-V" | "--version" => {
                println!("meshview {} ({})", env!("CARGO_PKG_VERSION"), env!("MESHVIEW_BUILD_DATE"));
                return;
            }
            "--reset-settings" => {
                meshview::Settings::default().save();
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = meshview::viewer::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("meshview - interactive 3D viewer");
    println!();
    println!("Usage: {} [options]", prog);
    println!();
    println!("Options:");
    println!("  --reset-settings  Overwrite saved settings with defaults");
    println!("  -V, --version     Show version");
    println!("  -h, --help        Show this help");
    println!();
    println!("Environment:");
    println!("  RUST_LOG=meshview=debug  Log filter");
    println!("  MESHVIEW_TRACE=1         Write a Chrome trace to trace.json");
    println!();
    println!("Mouse: drag rotate, right/middle drag pan, wheel zoom, click select,");
    println!("       shift+click add, ctrl+click remove, shift/ctrl+drag box select/deselect");
}
