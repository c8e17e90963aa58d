use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use radreport_lib::catalog::TemplateCatalog;
use radreport_lib::config::{self, ServiceConfig};
use radreport_lib::export::{export_document, export_pdf_to_file};
use radreport_lib::layout::{layout_with, wrap_text, PageGeometry, A4_WRAP_COLUMNS};
use radreport_lib::models::TemplateId;
use radreport_lib::providers::{study_uid_from_url, HttpBackend};
use radreport_lib::save::{SaveCoordinator, SaveOutcome};
use radreport_lib::session::ReportSession;
use radreport_lib::upload::UploadPipeline;

#[derive(Parser)]
#[command(name = "radreport")]
#[command(version, about = "Compose, paginate and upload radiology reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available report templates
    Templates {
        /// Use the stock templates instead of the backend catalog
        #[arg(long)]
        builtin: bool,
    },
    /// Print the header and merged draft for a study
    Preview(DraftArgs),
    /// Write the report PDF locally
    Export {
        #[command(flatten)]
        draft: DraftArgs,
        /// Output directory (defaults to ~/Radreport/exports)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render the report and upload it to the document store
    Save(DraftArgs),
}

#[derive(Args)]
struct DraftArgs {
    /// Viewer URL carrying `StudyInstanceUIDs`
    #[arg(long)]
    study_url: String,
    /// Template id
    #[arg(long)]
    template: String,
    /// Replace the merged draft with the contents of this file
    #[arg(long)]
    body_file: Option<PathBuf>,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    radreport_lib::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let service = ServiceConfig::from_env();

    match cli.command {
        Commands::Templates { builtin } => {
            let catalog = if builtin {
                TemplateCatalog::builtin()
            } else {
                TemplateCatalog::load(&HttpBackend::new(&service)?).await?
            };
            if catalog.is_empty() {
                println!("No templates found.");
            }
            for template in catalog.templates() {
                println!("{:<28}{}", template.id.as_str(), template.name);
            }
        }
        Commands::Preview(args) => {
            let backend = HttpBackend::new(&service)?;
            let session = open_session(&backend, &args).await?;
            match session.preview() {
                Some(preview) => println!("{preview}"),
                None => println!("Draft is empty."),
            }
        }
        Commands::Export { draft, out } => {
            let backend = HttpBackend::new(&service)?;
            let session = open_session(&backend, &draft).await?;
            let request = session.save_request()?;

            let body = wrap_text(&request.body_text, A4_WRAP_COLUMNS);
            let document = layout_with(&body, &request.metadata, &PageGeometry::a4())?;
            let exported = export_document(&document, &request.template_name)?;
            let dir = out.unwrap_or_else(config::exports_dir);
            let path = export_pdf_to_file(&exported.bytes, &exported.file_name, &dir)?;
            println!(
                "Wrote {} ({} pages, {} bytes)",
                path.display(),
                document.page_count(),
                exported.size_bytes()
            );
        }
        Commands::Save(args) => {
            let backend = Arc::new(HttpBackend::new(&service)?);
            let session = open_session(backend.as_ref(), &args).await?;
            let request = session.save_request()?;

            let coordinator = SaveCoordinator::new(UploadPipeline::new(backend.clone()));
            match coordinator.save(request).await {
                SaveOutcome::Completed(report) if report.is_saved() => {
                    let remote_ref = report
                        .upload
                        .as_ref()
                        .and_then(|u| u.remote_ref.as_deref())
                        .unwrap_or("-");
                    println!(
                        "Saved {} ({} pages, ref {remote_ref})",
                        report.file_name.as_deref().unwrap_or_default(),
                        report.page_count
                    );
                }
                SaveOutcome::Completed(report) => {
                    let message = report.message.unwrap_or_else(|| "save failed".into());
                    return Err(message.into());
                }
                SaveOutcome::Queued { snapshot_id } => {
                    return Err(format!("save {snapshot_id} was queued and not run").into());
                }
            }
        }
    }

    Ok(())
}

async fn open_session(backend: &HttpBackend, args: &DraftArgs) -> CliResult<ReportSession> {
    let study_uid = study_uid_from_url(&args.study_url)
        .ok_or_else(|| format!("No StudyInstanceUIDs in {}", args.study_url))?;

    let mut session = ReportSession::start(backend, backend, &study_uid).await;
    if !session.catalog().is_available() {
        return Err("Template catalog is unavailable".into());
    }
    session.select_template(Some(&TemplateId::from(args.template.as_str())))?;

    if let Some(path) = &args.body_file {
        let body = std::fs::read_to_string(path)?;
        session.edit_text(body)?;
    }
    Ok(session)
}
