//! cortex-lens - question answering and dashboards over a cloud warehouse.

mod cli;

use cli::{Cli, Command, ImagesCommand};
use cortex_lens::config::Config;
use cortex_lens::dashboards::{ImagingView, TrialDashboard, TrialOptions};
use cortex_lens::error::{LensError, Result};
use cortex_lens::logging;
use cortex_lens::present::{
    present, render_candidates, render_diagnostics, render_presentation, render_section, AskReport,
    Diagnostics, OutputFormat,
};
use cortex_lens::rag::{AskSession, QueryBuilder, Question};
use cortex_lens::reference::TableCache;
use cortex_lens::warehouse::{self, MockWarehouse, WarehouseClient};
use serde::Serialize;
use tracing::{error, info, warn};

/// Width used for tables in text output.
const OUTPUT_WIDTH: usize = 120;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e.message());
            std::process::exit(1);
        }
    }
}

/// Runs one command. Returns `false` when a question ended in failure.
async fn run(cli: Cli) -> Result<bool> {
    let format = cli.parse_output_format().map_err(LensError::config)?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let warehouse: Box<dyn WarehouseClient> = if cli.mock_db {
        info!("Using demo warehouse");
        Box::new(MockWarehouse::demo())
    } else {
        let connection = cli.resolve_connection(&config)?.ok_or_else(|| {
            LensError::config(
                "No warehouse connection configured. Use --url, --connection, \
                 SNOWFLAKE_* environment variables, or --mock-db",
            )
        })?;
        info!("Connection: {}", connection.display_string());
        warehouse::connect(&connection).await?
    };

    let outcome = dispatch(cli.command, &config, warehouse.as_ref(), format).await;

    if let Err(e) = warehouse.close().await {
        warn!("Failed to close warehouse client: {}", e);
    }
    outcome
}

async fn dispatch(
    command: Command,
    config: &Config,
    warehouse: &dyn WarehouseClient,
    format: OutputFormat,
) -> Result<bool> {
    match command {
        Command::Ask {
            question,
            expand,
            diagnostics,
            retrieve_only,
        } => {
            let Some(question) = Question::new(&question.join(" ")) else {
                return Ok(true);
            };
            let session = AskSession::new(warehouse, QueryBuilder::new(&config.search.service)?);

            if retrieve_only {
                let chunks = session.retrieve(&question).await?;
                match format {
                    OutputFormat::Text => println!("{}", render_candidates(&chunks)),
                    OutputFormat::Json => println!("{}", to_json(&chunks)?),
                }
                return Ok(true);
            }

            let submission = session.ask(question).await?;
            let presentation = present(&submission);
            match format {
                OutputFormat::Text => {
                    if let Some(plan) = submission.plan().filter(|_| diagnostics) {
                        println!("{}\n", render_diagnostics(&Diagnostics::from_plan(plan)));
                    }
                    println!("{}", render_presentation(&presentation, expand));
                }
                OutputFormat::Json => {
                    println!("{}", AskReport::new(&submission, diagnostics).to_json()?)
                }
            }
            Ok(!presentation.is_failure())
        }

        Command::Trial {
            section,
            search,
            event_type,
        } => {
            let cache = TableCache::new();
            let dashboard = TrialDashboard::new(warehouse, &cache, config.trial.clone());
            let options = TrialOptions { search, event_type };

            let sections = match section {
                Some(which) => vec![dashboard.section(which, &options).await?],
                None => dashboard.all_sections(&options).await?,
            };
            match format {
                OutputFormat::Text => {
                    let rendered: Vec<String> = sections
                        .iter()
                        .map(|s| render_section(s, OUTPUT_WIDTH))
                        .collect();
                    println!("{}", rendered.join("\n\n"));
                }
                OutputFormat::Json => println!("{}", to_json(&sections)?),
            }
            Ok(true)
        }

        Command::Images { action } => {
            let view = ImagingView::new(warehouse, config.imaging.clone());
            match action {
                ImagesCommand::List => {
                    let paths = view.list().await?;
                    match format {
                        OutputFormat::Text if paths.is_empty() => {
                            println!("No images found under {}/", config.imaging.folder)
                        }
                        OutputFormat::Text => println!("{}", paths.join("\n")),
                        OutputFormat::Json => println!("{}", to_json(&paths)?),
                    }
                }
                ImagesCommand::Diagnose { path } => {
                    let diagnosis = view.diagnose(&path).await?;
                    match (format, diagnosis) {
                        (OutputFormat::Text, Some(d)) => {
                            println!("{}", render_section(&d.to_section(), OUTPUT_WIDTH))
                        }
                        (OutputFormat::Text, None) => println!("No prediction available."),
                        (OutputFormat::Json, d) => println!("{}", to_json(&d)?),
                    }
                }
            }
            Ok(true)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| LensError::internal(format!("Failed to encode output: {e}")))
}
