//! OrderLog command-line binary. See `soup_orderlog::orders::bulk` for docs.

use soup_orderlog::logging;
use soup_orderlog::orders::bulk;
use std::io::{self, Read};

fn main() {
    logging::init();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        bulk::print_usage();
        std::process::exit(i32::from(args.len() < 2));
    }
    if let Err(e) = run(&args[1]) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cmd: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut log = bulk::open_default_log()?;
    let mut input = String::new();
    if cmd != "export" {
        io::stdin().read_to_string(&mut input)?;
    }
    let now = chrono::Local::now().naive_local();
    let output = match cmd {
        "list" => serde_json::to_string_pretty(&bulk::list_from_json(&log, &input)?)?,
        "lanes" => serde_json::to_string_pretty(&bulk::lanes_from_json(&log, &input)?)?,
        "import" => serde_json::to_string_pretty(&bulk::import_from_json(&log, &input)?)?,
        "export" => serde_json::to_string_pretty(&bulk::export(&log))?,
        "set-status" => {
            serde_json::to_string_pretty(&bulk::set_status_from_json(&mut log, &input, now)?)?
        }
        "set-color" => serde_json::to_string_pretty(&bulk::set_color_from_json(&mut log, &input)?)?,
        "edit" => serde_json::to_string_pretty(&bulk::edit_from_json(&mut log, &input)?)?,
        other => {
            eprintln!("Unknown command: {other}");
            bulk::print_usage();
            std::process::exit(1);
        }
    };
    println!("{output}");
    Ok(())
}
