//! `fitspreview`: render quick-look PNGs of FITS image extensions.

mod commands;

use std::process::ExitCode;

use argh::FromArgs;

#[derive(FromArgs, Debug)]
/// Quick-look previews of FITS image extensions
struct TopLevel {
    /// enable debug logging (RUST_LOG takes precedence)
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Commands {
    Render(commands::render::RenderCmd),
    Extnames(commands::extnames::ExtnamesCmd),
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli: TopLevel = argh::from_env();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Render(cmd) => commands::render::handle_render_command(cmd),
        Commands::Extnames(cmd) => commands::extnames::handle_extnames_command(cmd),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
