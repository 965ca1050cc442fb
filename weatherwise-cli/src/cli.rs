use anyhow::Context as _;
use clap::{Parser, Subcommand};
use inquire::Password;
use tokio::signal;
use tracing::warn;
use weatherwise_core::{Config, Context, MAX_HORIZON_DAYS, Pipeline, ProviderId, provider};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherwise", version, about = "Multi-source weather summary and forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "meteostat".
        provider: String,
    },

    /// List known providers and whether they are ready to use.
    Providers,

    /// Fetch every provider and show the consensus summary.
    Summary {
        /// Location name, e.g. "Warsaw".
        location: String,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run the full pipeline and show the temperature forecast.
    Forecast {
        /// Location name, e.g. "Warsaw".
        location: String,

        /// Forecast horizon in days; defaults to the configured value.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HORIZON_DAYS)))]
        days: Option<u32>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Providers => {
                let config = Config::load()?;
                let clients = provider::registry(&config)?;
                output::print_providers(&clients);
                Ok(())
            }
            Command::Summary { location, json } => {
                let (ctx, pipeline) = build_pipeline()?;
                cancel_on_ctrl_c(&ctx);

                let (fetch, summary) = pipeline.summarize(&location).await?;
                if json {
                    let value = serde_json::json!({ "fetch": fetch, "summary": summary });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else {
                    output::print_fetch(&fetch);
                    output::print_summary(&summary);
                }
                Ok(())
            }
            Command::Forecast { location, days, json } => {
                let (ctx, mut pipeline) = build_pipeline()?;
                cancel_on_ctrl_c(&ctx);

                if let Some(days) = days {
                    pipeline = pipeline.with_horizon(days);
                }

                let report = pipeline.run(&location).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    output::print_fetch(&report.fetch);
                    output::print_summary(&report.summary);
                    output::print_forecast(&report);
                }
                Ok(())
            }
        }
    }
}

fn build_pipeline() -> anyhow::Result<(Context, Pipeline)> {
    let config = Config::load()?;
    let clients = provider::registry(&config)?;
    let ctx = Context::new(config);
    let pipeline = Pipeline::new(&ctx, clients)?;
    Ok((ctx, pipeline))
}

/// Ctrl-C stops waiting on slow providers; whatever already arrived is kept.
fn cancel_on_ctrl_c(ctx: &Context) {
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupted, using partial results");
            cancel.cancel();
        }
    });
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    if !id.requires_api_key() {
        println!("Provider '{id}' needs no credentials.");
        return Ok(());
    }

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let mut config = Config::load()?;
    config.upsert_provider_api_key(id, api_key);
    config.save()?;

    println!("Saved credentials for '{id}' to {}", Config::config_file_path()?.display());
    Ok(())
}
