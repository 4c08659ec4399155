use std::process::ExitCode;

fn main() -> ExitCode {
    match gizmod::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("gizmod: {error}");
            ExitCode::FAILURE
        }
    }
}
