use std::process::ExitCode;

fn main() -> ExitCode {
    match journey_tui::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
