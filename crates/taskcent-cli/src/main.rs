use std::process::ExitCode;

fn main() -> ExitCode {
    match taskcent_core::run(std::env::args_os().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("taskcent: {err:#}");
            ExitCode::FAILURE
        }
    }
}
