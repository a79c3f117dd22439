//! civica: operator CLI for the report picture pipeline.
//!
//! Reads its configuration from the environment (a `.env` file is honored)
//! and prints every result as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use civica_cli::{read_upload, Services};
use civica_core::models::ContentHash;
use civica_core::Config;
use civica_infra::{init_tracing, LogFormat};
use civica_services::AttachRequest;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "civica", about = "Report picture pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload pictures and attach them to a report
    Attach {
        /// Report UUID
        #[arg(long)]
        report: Uuid,
        /// Severity tag written on the stored objects
        #[arg(long, default_value = "unknown")]
        severity: String,
        /// Report status tag written on the stored objects
        #[arg(long, default_value = "open")]
        status: String,
        /// Declared content type for every file (default: from extension)
        #[arg(long)]
        content_type: Option<String>,
        /// Picture files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Detach a picture from its report and delete its object
    Detach {
        #[arg(long)]
        report: Uuid,
        /// Picture id (content hash)
        picture: String,
    },
    /// Promote a picture to the verified bucket and set its flags
    Verify {
        #[arg(long)]
        report: Uuid,
        picture: String,
        #[arg(long)]
        validated: bool,
        #[arg(long)]
        validated_by_users: bool,
    },
    /// List pictures of a report or of an uploader
    List {
        #[arg(long, conflicts_with = "uploader", required_unless_present = "uploader")]
        report: Option<Uuid>,
        #[arg(long)]
        uploader: Option<Uuid>,
    },
    /// Show one picture, by id or by report and key
    Show {
        /// Picture id (content hash)
        #[arg(required_unless_present = "key")]
        picture: Option<String>,
        #[arg(long, requires = "key")]
        report: Option<Uuid>,
        #[arg(long, requires = "report")]
        key: Option<String>,
    },
    /// Print content type, size and tags of a staged object
    Metadata {
        /// Object key
        key: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    init_tracing(config.log_format().parse::<LogFormat>().unwrap_or_default())?;

    tracing::debug!(environment = %config.environment(), "Configuration loaded");
    let services = Services::from_config(&config).await?;

    match cli.command {
        Commands::Attach {
            report,
            severity,
            status,
            content_type,
            files,
        } => {
            tracing::info!(report_id = %report, files = files.len(), "Attaching pictures");
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                uploads.push(read_upload(path, content_type.as_deref()).await?);
            }
            let outcome = services
                .attach
                .attach(AttachRequest {
                    report_id: report,
                    severity,
                    status,
                    files: uploads,
                })
                .await?;
            print_json(&outcome)?;
        }
        Commands::Detach { report, picture } => {
            tracing::info!(report_id = %report, picture_id = %picture, "Detaching picture");
            let id = ContentHash::from_hex(picture)?;
            let outcome = services.detach.detach(&id, report).await?;
            print_json(&outcome)?;
        }
        Commands::Verify {
            report,
            picture,
            validated,
            validated_by_users,
        } => {
            tracing::info!(report_id = %report, picture_id = %picture, "Verifying picture");
            let id = ContentHash::from_hex(picture)?;
            let record = services
                .verification
                .verify_picture(&id, report, validated, validated_by_users)
                .await?;
            print_json(&record)?;
        }
        Commands::List { report, uploader } => {
            let pictures = match (report, uploader) {
                (Some(report), _) => services.queries.pictures_for_report(report).await?,
                (None, Some(uploader)) => services.queries.pictures_by_uploader(uploader).await?,
                (None, None) => anyhow::bail!("Either --report or --uploader is required"),
            };
            print_json(&pictures)?;
        }
        Commands::Show {
            picture,
            report,
            key,
        } => {
            let record = match (picture, report, key) {
                (_, Some(report), Some(key)) => {
                    services.queries.picture_by_report_and_key(report, &key).await?
                }
                (Some(picture), _, _) => {
                    services
                        .queries
                        .get_picture(&ContentHash::from_hex(picture)?)
                        .await?
                }
                _ => anyhow::bail!("Provide a picture id, or --report together with --key"),
            };
            print_json(&record)?;
        }
        Commands::Metadata { key } => {
            let info = services.queries.object_metadata(&key).await?;
            print_json(&info)?;
        }
    }

    Ok(())
}
