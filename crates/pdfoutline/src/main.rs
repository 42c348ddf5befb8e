use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;
use outline::{HeuristicsConfig, OcrCapability};

mod error;
mod extract;
mod show;
mod prelude;
mod profile;
mod text;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Extract the title and H1-H3 heading outline of PDF documents"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// TOML file overriding the heading detection thresholds
    #[clap(long, env = "PDFOUTLINE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Run OCR (tesseract) on pages that carry images but no text
    #[clap(long, env = "PDFOUTLINE_OCR", global = true, default_value = "false")]
    ocr: bool,

    /// Tesseract language code(s) used with --ocr, e.g. `eng+deu`
    #[clap(long, env = "PDFOUTLINE_OCR_LANG", global = true, default_value = "eng")]
    ocr_lang: String,

    /// Whether to display additional information.
    #[clap(long, env = "PDFOUTLINE_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    /// Thresholds from `--config`, or the defaults when no file is given or
    /// the file does not exist.
    pub fn heuristics(&self) -> Result<HeuristicsConfig> {
        match &self.config {
            Some(path) if path.exists() => HeuristicsConfig::load(path)
                .wrap_err_with(|| f!("Failed to load config from {}", path.display())),
            Some(path) => {
                log::warn!("config {} not found, using defaults", path.display());
                Ok(HeuristicsConfig::default())
            }
            None => Ok(HeuristicsConfig::default()),
        }
    }

    pub fn ocr(&self) -> OcrCapability {
        if self.ocr {
            OcrCapability::detect(&self.ocr_lang)
        } else {
            OcrCapability::Absent
        }
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Extract outlines of one or more PDFs as JSON
    Extract(crate::extract::App),

    /// Show the outline of a single PDF as a table
    Outline(crate::show::App),

    /// Classify a PDF as a form or a report
    Profile(crate::profile::App),

    /// Print the plain text of every page
    Text(crate::text::App),
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let app = App::parse();

    init_logging(app.global.verbose);
    color_eyre::install()?;

    match app.command {
        SubCommands::Extract(sub_app) => crate::extract::run(sub_app, app.global).await,
        SubCommands::Outline(sub_app) => crate::show::run(sub_app, app.global).await,
        SubCommands::Profile(sub_app) => crate::profile::run(sub_app, app.global).await,
        SubCommands::Text(sub_app) => crate::text::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}

/// Run blocking PDF work off the async runtime.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Task(e.to_string()).into())
}
