use std::path::PathBuf;

use outline::extract_text;

use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct App {
    /// Path to the PDF file
    path: PathBuf,
}

pub async fn run(app: App, _global: crate::Global) -> Result<()> {
    let path = app.path.clone();
    let text = crate::run_blocking(move || extract_text(&path))
        .await?
        .wrap_err_with(|| f!("Failed to read text from {}", app.path.display()))?;

    println!("{}", text);
    Ok(())
}
