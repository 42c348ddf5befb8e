use std::path::PathBuf;

use colored::Colorize;
use outline::{try_extract_outline, HeadingLevel, Outline};

use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct App {
    /// Path to the PDF file
    path: PathBuf,

    /// Print the raw JSON result instead of a table
    #[arg(long)]
    json: bool,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let config = global.heuristics()?;
    let ocr = global.ocr();

    let path = app.path.clone();
    let outline = crate::run_blocking(move || try_extract_outline(&path, &config, &ocr))
        .await?
        .wrap_err_with(|| f!("Failed to extract outline from {}", app.path.display()))?;

    if app.json {
        println!("{}", serde_json::to_string_pretty(&outline)?);
    } else {
        output_table(&outline);
    }

    Ok(())
}

fn indent(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "",
        HeadingLevel::H2 => "  ",
        HeadingLevel::H3 => "    ",
    }
}

fn output_table(outline: &Outline) {
    if outline.title.is_empty() {
        println!("{}", "(untitled)".bright_black());
    } else {
        println!("{}", outline.title.bold().bright_white());
    }

    if outline.outline.is_empty() {
        println!("No headings found.");
        return;
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "Level".bold().cyan(),
        "Page".bold().cyan(),
        "Heading".bold().cyan()
    ]);
    for entry in &outline.outline {
        let level = match entry.level {
            HeadingLevel::H1 => entry.level.to_string().green(),
            HeadingLevel::H2 => entry.level.to_string().yellow(),
            HeadingLevel::H3 => entry.level.to_string().bright_black(),
        };
        table.add_row(prettytable::row![
            level,
            entry.page.to_string().bright_blue(),
            f!("{}{}", indent(entry.level), entry.text)
        ]);
    }
    table.printstd();
}
