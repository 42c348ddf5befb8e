use std::path::PathBuf;

use outline::document_profile;

use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct App {
    /// Path to the PDF file
    path: PathBuf,
}

pub async fn run(app: App, _global: crate::Global) -> Result<()> {
    let path = app.path.clone();
    let profile = crate::run_blocking(move || document_profile(&path))
        .await?
        .wrap_err_with(|| f!("Failed to classify {}", app.path.display()))?;

    println!("{}", profile);
    Ok(())
}
