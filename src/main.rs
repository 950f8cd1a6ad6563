use std::path::Path;

use joyride::{app, config, game::chart, game::gameplay::Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let config = config::load(Path::new(config::CONFIG_PATH))?;
    log::set_max_level(config.log_level.as_level_filter());

    let entries = match std::env::args().nth(1) {
        Some(path) => chart::load(Path::new(&path))?,
        None => {
            log::info!("No chart given; playing the built-in demo chart.");
            chart::demo_chart()
        }
    };
    let mut session = Session::new(&config, &entries)?;
    let summary = app::run(&mut session, &app::RunOptions::default());
    println!(
        "score {:.0}  best combo {}  hits {}  misses {}  rotations {}",
        summary.score.score,
        summary.score.highest_combo,
        summary.hits,
        summary.misses,
        summary.rotations
    );
    Ok(())
}
