//! Command-line argument parsing for bq-insight.

use crate::config::Config;
use crate::llm::LlmProvider;
use crate::pipeline::PipelineMode;
use crate::warehouse::WarehouseBackend;
use clap::Parser;
use std::path::PathBuf;

/// HTTP service that runs SQL on BigQuery and returns an LLM analysis and QA review.
#[derive(Parser, Debug)]
#[command(name = "bq-insight")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to bind (overrides HOST and server.host)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (overrides PORT and server.port)
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Pipeline mode: prefetched or tool_bound
    #[arg(long, value_name = "MODE")]
    pub mode: Option<PipelineMode>,

    /// Use the in-memory mock warehouse instead of BigQuery
    #[arg(long)]
    pub mock_warehouse: bool,

    /// LLM provider to use: openai or mock
    #[arg(long, value_name = "PROVIDER")]
    pub llm: Option<LlmProvider>,

    /// Disable per-stage memory
    #[arg(long)]
    pub no_memory: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies flag overrides on top of the loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
        }
        if self.mock_warehouse {
            config.warehouse.backend = WarehouseBackend::Mock;
        }
        if let Some(provider) = self.llm {
            config.llm.provider = provider;
        }
        if self.no_memory {
            config.pipeline.memory = false;
        }
    }
}
