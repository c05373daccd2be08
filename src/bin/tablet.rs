//! Binary entry point for the tablet CLI.
//!
//! ```bash
//! tablet ./users.db     # open or create a database file
//! tablet --version
//! tablet --help
//! ```

use std::env;
use std::path::PathBuf;

use eyre::{bail, Result, WrapErr};
use tracing_subscriber::EnvFilter;

use tablet::btree::Table;
use tablet::cli::Repl;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    for arg in &args[1..] {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("tablet {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other if other.starts_with('-') => {
                bail!("Unknown option: {other}");
            }
            path => {
                if db_path.is_some() {
                    bail!("Multiple database paths specified");
                }
                db_path = Some(PathBuf::from(path));
            }
        }
    }

    let Some(db_path) = db_path else {
        print_usage();
        return Ok(());
    };

    let table = Table::open(&db_path)
        .wrap_err_with(|| format!("failed to open database at {}", db_path.display()))?;

    let repl = Repl::new(table)?;
    repl.run()
}

fn print_usage() {
    println!("tablet - a single-table embedded database");
    println!();
    println!("USAGE:");
    println!("    tablet [OPTIONS] <DATABASE_PATH>");
    println!();
    println!("ARGS:");
    println!("    <DATABASE_PATH>    Path to the database file (created if absent)");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help         Print help information");
    println!("    -v, --version      Print version information");
}
