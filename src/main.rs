use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod entities;
mod export;
mod gate;
mod inputter;
mod model;
mod paginator;
mod row;
mod search;
mod source;
mod table;
mod ui;
mod viewport;

use controller::Controller;
use domain::{CompassConfig, CompassError, Role};
use model::{Model, Status};
use source::{SessionRequest, spawn_loader};
use ui::CompassUI;

#[derive(Parser, Debug)]
#[command(name = "compass", version, about = "Browse patient, hospital and staff records")]
struct Args {
    /// Directory holding patients, hospitals and users files
    #[arg(short, long, default_value = "data")]
    data_dir: String,

    /// Sign in with this role (doctor, nurse, asha, admin)
    #[arg(short, long)]
    role: Option<String>,

    /// Sign in as the user with this email; the role comes from the users file
    #[arg(short, long)]
    user: Option<String>,

    /// Route to open first, e.g. /admin/patients
    #[arg(long)]
    route: Option<String>,

    #[arg(long, default_value_t = 150)]
    debounce_ms: u64,

    /// Lower bound for rows per page
    #[arg(long, default_value_t = 4)]
    min_rows: usize,

    #[arg(long, default_value_t = 32)]
    max_column_width: usize,

    #[arg(long, default_value = ".")]
    export_dir: String,

    #[arg(long, default_value = "compass.log")]
    log_file: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            ratatui::restore();
            error!("Exiting with {}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn expand(path: &str) -> Result<PathBuf, CompassError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| CompassError::PathExpansion(format!("{path}: {e}")))
}

fn init_logging(log_file: &Path) -> Result<(), CompassError> {
    let file = File::create(log_file)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("COMPASS_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), CompassError> {
    init_logging(&expand(&args.log_file)?)?;

    let role = args.role.as_deref().map(str::parse::<Role>).transpose()?;
    let config = CompassConfig::default()
        .with_data_dir(expand(&args.data_dir)?)
        .with_export_dir(expand(&args.export_dir)?)
        .with_resize_debounce(Duration::from_millis(args.debounce_ms))
        .with_min_rows(args.min_rows)
        .with_max_column_width(args.max_column_width)
        .with_start_route(args.route);
    info!("Starting compass with {:?}", config);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&config, size.width, size.height)?;
    model.start_loading(spawn_loader(
        config.data_dir.clone(),
        SessionRequest {
            role,
            user: args.user,
        },
    ));
    let mut ui = CompassUI::new(&config);
    let controller = Controller::new(&config);

    while model.status != Status::Quitting {
        terminal.draw(|f| ui.draw(&model, f))?;
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye");
    Ok(())
}
