use std::io::{self, Write};
use std::process::ExitCode;

use actord::{ActorComponents, run_actor};

fn main() -> ExitCode {
    match run_actor(ActorComponents::new()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(io::stderr().lock(), "actord: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
