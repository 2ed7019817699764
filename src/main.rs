use std::time::Instant;

use clap::Parser;
use ncanim::cli::{execute, Cli};
use ncanim::log::{show_farewell_with_timing, show_greeting};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // No banners around commands that stream their payload to stdout, so
    // redirecting `template`/`completions`/`info --format json` stays clean.
    let banners = !cli.quiet && !cli.command.emits_payload_on_stdout();
    let start_time = Instant::now();
    if banners {
        show_greeting(cli.command.name());
    }

    execute(cli)?;

    if banners {
        show_farewell_with_timing(start_time.elapsed());
    }
    Ok(())
}
