//! Entry point for the `celestrak` binary.

use std::process::ExitCode;

use celestrak_cli::{run, Cli, Exit};
use celestrak_log::LogConfig;
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log = LogConfig::from_env().with_verbosity(cli.verbose, if cli.quiet { 2 } else { 0 });
    if let Err(e) = celestrak_log::init(log) {
        eprintln!("warning: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            eprintln!("error: {e}");
            e.exit().into()
        }
    }
}
