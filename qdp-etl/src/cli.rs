//! Command-line interface
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qdp_common::config::{EtlConfig, InsertMode};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use crate::db::connect_store;
use crate::services::export_files::find_latest_export;
use crate::services::{
    MappingFetcher, PipelineOptions, QualtricsApi, SurveyPipeline, Transformer,
};

/// Survey export, transform and load
#[derive(Parser, Debug)]
#[command(name = "qdp-etl")]
#[command(about = "Export survey responses and load them into the reporting database")]
#[command(version)]
pub struct Cli {
    /// TOML config file (default: platform config dir, qdp/config.toml)
    #[arg(long, global = true, env = "QDP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment file loaded before configuration (default: ./.env if present)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Export, transform and load each survey
    Run {
        /// Survey id to process (repeatable; default: configured list)
        #[arg(long = "survey")]
        surveys: Vec<String>,

        /// Load the newest export already on disk instead of exporting
        #[arg(long)]
        skip_export: bool,

        /// Roll back a survey's whole load on the first failing row
        #[arg(long)]
        strict: bool,
    },

    /// Export and download responses only
    Export {
        #[arg(long = "survey")]
        surveys: Vec<String>,
    },

    /// Fetch survey definitions and load code → label mappings
    Mappings {
        #[arg(long = "survey")]
        surveys: Vec<String>,

        /// Print the extracted mappings without loading them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the selected response records of an export file
    Transform {
        #[arg(long)]
        survey: String,

        /// Export file to read (default: newest export for the survey)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Verify the database is reachable and has the required tables
    CheckDb,
}

impl Cli {
    /// Apply command-line overrides on top of resolved configuration
    pub fn apply_overrides(&self, config: &mut EtlConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Command::Run { strict: true, .. } = self.command {
            config.load.insert_mode = InsertMode::Strict;
        }
    }
}

/// Survey ids from the command line, else from configuration
pub fn resolve_surveys(cli_surveys: &[String], config: &EtlConfig) -> Result<Vec<String>> {
    if !cli_surveys.is_empty() {
        return Ok(cli_surveys.to_vec());
    }
    Ok(config.require_survey_ids()?.to_vec())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[derive(Serialize)]
struct DbCheck<'a> {
    backend: &'a str,
    ok: bool,
    missing_tables: Vec<String>,
}

/// Execute a parsed command against resolved configuration
pub async fn execute(command: &Command, config: &EtlConfig) -> Result<ExitCode> {
    match command {
        Command::Run {
            surveys,
            skip_export,
            ..
        } => {
            let surveys = resolve_surveys(surveys, config)?;
            let store = connect_store(&config.database)
                .await
                .context("Failed to connect to database")?;
            let mut options = PipelineOptions::from_config(config);
            options.skip_export = *skip_export;
            let pipeline = SurveyPipeline::new(
                QualtricsApi::from_config(&config.qualtrics)?,
                store,
                Transformer::from_config(&config.fields),
                options,
            );

            info!(surveys = surveys.len(), insert_mode = %config.load.insert_mode, "Starting run");
            let summary = pipeline.run_all(&surveys).await;
            print_json(&summary)?;
            Ok(exit_code(summary.all_succeeded()))
        }

        Command::Export { surveys } => {
            let surveys = resolve_surveys(surveys, config)?;
            let store = connect_store(&config.database)
                .await
                .context("Failed to connect to database")?;
            let pipeline = SurveyPipeline::from_config(config, store)?;
            let summary = pipeline.export_all(&surveys).await;
            print_json(&summary)?;
            Ok(exit_code(summary.all_succeeded()))
        }

        Command::Mappings { surveys, dry_run } => {
            let surveys = resolve_surveys(surveys, config)?;
            if *dry_run {
                let fetcher = MappingFetcher::new(QualtricsApi::from_config(&config.qualtrics)?);
                let transformer = Transformer::from_config(&config.fields);
                let mut previews = serde_json::Map::new();
                for survey_id in &surveys {
                    let questions = fetcher
                        .fetch_question_definitions(survey_id)
                        .await
                        .with_context(|| format!("Failed to fetch definition of {}", survey_id))?;
                    let data = transformer.extract_mappings(&questions);
                    previews.insert(survey_id.clone(), serde_json::to_value(&data)?);
                }
                print_json(&previews)?;
                return Ok(ExitCode::SUCCESS);
            }

            let store = connect_store(&config.database)
                .await
                .context("Failed to connect to database")?;
            let pipeline = SurveyPipeline::from_config(config, store)?;
            let summary = pipeline.mappings_all(&surveys).await;
            print_json(&summary)?;
            Ok(exit_code(summary.all_succeeded()))
        }

        Command::Transform { survey, file } => {
            let path = match file {
                Some(path) => path.clone(),
                None => find_latest_export(&config.export.destination_dir, survey)?,
            };
            let records = Transformer::from_config(&config.fields)
                .transform_file(&path)
                .with_context(|| format!("Failed to transform {}", path.display()))?;
            info!(survey_id = %survey, file = %path.display(), records = records.len(), "Transformed export");
            print_json(&records)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::CheckDb => {
            let store = connect_store(&config.database)
                .await
                .context("Failed to connect to database")?;
            let missing_tables = store.check_required_tables().await?;
            let check = DbCheck {
                backend: store.backend_name(),
                ok: missing_tables.is_empty(),
                missing_tables,
            };
            print_json(&check)?;
            Ok(exit_code(check.ok))
        }
    }
}
