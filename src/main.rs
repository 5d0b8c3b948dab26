use std::path::PathBuf;

use clap::Parser;
use facemoji::{
    app::App,
    result::Result,
    setting::{Mode, Setting},
    tracing::{get_subscriber, init_subscriber},
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file, created with defaults when missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(value_enum)]
    mode: Mode,
}

fn main() -> Result<()> {
    let args = Args::parse();
    // Tracing
    init_subscriber(get_subscriber("facemoji", "info", std::io::stdout))?;
    // Get Setting
    let setting = match args.config {
        Some(path) => Setting::from_path(path)?,
        None => Setting::get()?,
    };
    // Open devices and run
    App::new(args.mode, &setting)
        .and_then(App::run)
        .inspect_err(|err| tracing::error!("{}", err))
}
