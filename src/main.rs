use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use cdir::controller::Controller;
use cdir::domain::{DEFAULT_LOAD_DELAY, DEFAULT_PAGE_SIZE, DirConfig, DirError};
use cdir::loader::{DataSource, expand_path};
use cdir::logging;
use cdir::model::{Model, Status};
use cdir::ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about = "A tui based company directory viewer.")]
struct Args {
    /// Company data file (json, csv, parquet, arrow). The bundled directory is shown if omitted.
    #[arg(conflicts_with = "url")]
    file: Option<String>,

    /// Fetch the directory from a service, e.g. http://localhost:3001/companies
    #[arg(long)]
    url: Option<String>,

    /// Companies per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Artificial delay before loading. Defaults to 1000ms for the bundled directory, 0 otherwise.
    #[arg(long)]
    load_delay_ms: Option<u64>,

    /// How long to wait for terminal events per frame
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Log file, filter with RUST_LOG
    #[arg(long, default_value = "cdir.log")]
    log_file: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = logging::init(&args.log_file) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<(), DirError> {
    let source = match (args.file, args.url) {
        (Some(file), _) => DataSource::File(expand_path(&file)?),
        (None, Some(url)) => DataSource::Http(url),
        (None, None) => DataSource::Bundled,
    };
    let load_delay = match (args.load_delay_ms, &source) {
        (Some(ms), _) => Duration::from_millis(ms),
        (None, DataSource::Bundled) => DEFAULT_LOAD_DELAY,
        (None, _) => Duration::ZERO,
    };

    let cfg = DirConfig::default()
        .with_page_size(args.page_size)
        .with_event_poll_time(args.poll_ms)
        .with_load_delay(load_delay);
    cfg.validate()?;
    info!("Starting cdir with {:?}", cfg);

    let mut model = Model::init(&cfg, source)?;
    let ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &ui, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    model: &mut Model,
    ui: &TableUI,
    controller: &Controller,
) -> Result<(), DirError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
