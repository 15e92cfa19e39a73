use std::env;
use std::process::ExitCode;

use polysched::frontend::toy::{ToyCodeGenerator, ToyFrontend};
use polysched::{Driver, SessionConfig};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: polysched <fixture.c> [options]");
        println!();
        println!("Options:");
        println!("  --tile <n>      Tile the first Band reached by descending into child 0 repeatedly");
        println!("  --dump          Print the full schedule tree after transformation");
        println!("  -o <path>       Write generated code to <path> instead of stdout");
        println!();
        println!("<fixture.c> is one of: gemm.c, matmul.c, two_loops.c, nested_ijk.c");
        return ExitCode::FAILURE;
    }

    let source_path = &args[1];
    let dump = args.contains(&"--dump".to_string());

    let mut tile_size: Option<i64> = None;
    if let Some(idx) = args.iter().position(|a| a == "--tile") {
        if idx + 1 < args.len() {
            tile_size = args[idx + 1].parse().ok();
        }
    }

    let mut out_path: Option<&str> = None;
    if let Some(idx) = args.iter().position(|a| a == "-o") {
        if idx + 1 < args.len() {
            out_path = Some(&args[idx + 1]);
        }
    }

    let mut driver = Driver::new(ToyFrontend, ToyCodeGenerator, SessionConfig::default());
    let loaded = match driver.init_scops(source_path) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("failed to load {source_path}: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("loaded {loaded} SCoP(s) from {source_path}");

    if let Some(tile_size) = tile_size {
        // Descend to the first Band reachable via child 0.
        while driver.get_type(0).map(|t| t != polysched::NodeType::Band).unwrap_or(false) {
            if driver.goto_child(0, 0).is_err() {
                break;
            }
        }
        match driver.tile(0, tile_size) {
            Ok(1) => println!("tile({tile_size}) committed"),
            Ok(_) => println!("tile({tile_size}) rolled back: illegal"),
            Err(e) => eprintln!("tile({tile_size}) failed: {e}"),
        }
    }

    if dump {
        if let Ok(text) = driver.print_schedule_node(0) {
            print!("{text}");
        }
    }

    let tmp;
    let target = match out_path {
        Some(p) => p,
        None => {
            tmp = std::env::temp_dir().join("polysched_out.c");
            tmp.to_str().unwrap()
        }
    };
    match driver.generate_code(target) {
        Ok(0) => {
            println!("generated code written to {target}");
            ExitCode::SUCCESS
        }
        Ok(_) | Err(_) => {
            eprintln!("failed to generate code");
            ExitCode::FAILURE
        }
    }
}
