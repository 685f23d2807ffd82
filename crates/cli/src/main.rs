use std::process::ExitCode;

fn main() -> ExitCode {
    approvo_cli::run()
}
