mod config;
mod db;
mod error;
mod models;
mod reset;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    config::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    let config = config::Config::load()?;
    tracing::debug!(path = %config.db_path.display(), "opening database");
    let mut db = db::Database::open(&config.db_path)?;

    if args.len() < 2 {
        run::print_usage();
        return Ok(());
    }
    run::as_cli(&args, &mut db)
}
