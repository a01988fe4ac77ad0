pub mod cli;
pub mod config;
pub mod executor;
pub mod planner;
pub mod platform;

/// Run the command line interface and return an exit code.
pub fn run_cli() -> i32 {
    match cli::run() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    }
}
