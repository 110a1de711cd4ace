use std::process;

use bundr::commands::ExitCodeError;

#[tokio::main]
async fn main() {
    if let Err(err) = bundr::run().await {
        // A child launched by `run` already wrote its own output; just
        // mirror its exit code.
        if let Some(exit) = err.downcast_ref::<ExitCodeError>() {
            process::exit(exit.0);
        }
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}
