//! bq-insight - SQL in, LLM analysis and QA review out.

use bq_insight::cli::Cli;
use bq_insight::config::Config;
use bq_insight::error::Result;
use bq_insight::{app, logging, server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());

    // Precedence: flags > file > environment > defaults
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_defaults();
    cli.apply_to(&mut config);
    config.validate()?;

    let app = app::build_app(&config)?;
    server::serve(app, &config.server.bind_address()).await
}
