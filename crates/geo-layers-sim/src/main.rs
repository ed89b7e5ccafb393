mod error;
mod logging;
mod scenario;
mod settings;
mod simulation;

use error::SimError;
use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::from_cli();
    logging::setup_logging();

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<(), SimError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(SimError::Runtime)?;

    let summary = rt.block_on(simulation::run(settings))?;

    if settings.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        tracing::info!(
            "Final state: {} of {} points active, t={:.0} ({:.0}%), {} fps",
            summary.active_points,
            summary.total_points,
            summary.final_time_ms,
            summary.final_progress * 100.0,
            summary.fps
        );
    }
    Ok(())
}
