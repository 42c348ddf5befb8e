use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::{stream, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use outline::{extract_outline_or_default, Outline};
use serde::ser::{Serialize, Serializer};

use crate::prelude::{println, *};

#[derive(Debug, clap::Args)]
pub struct App {
    /// PDF files to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Maximum number of documents processed at once (default: CPU count)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Write one `<stem>.json` per input into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

/// `{file: outline}` in input order.
struct Results<'a>(&'a [(PathBuf, Outline)]);

impl Serialize for Results<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|(path, outline)| (path.display().to_string(), outline)),
        )
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(bar)
}

/// Destination for the outline of `input` inside `dir`.
pub fn output_path(dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    dir.join(f!("{}.json", stem))
}

/// Fail when two different inputs would write the same file in `dir`,
/// e.g. `a/report.pdf` and `b/report.pdf`.
pub fn check_output_collisions(dir: &Path, inputs: &[PathBuf]) -> std::result::Result<(), Error> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    for input in inputs {
        let target = output_path(dir, input);
        match claimed.get(&target) {
            Some(first) if *first != input.as_path() => {
                return Err(Error::Output {
                    path: target.display().to_string(),
                    reason: f!(
                        "both {} and {} map to this file",
                        first.display(),
                        input.display()
                    ),
                });
            }
            Some(_) => {}
            None => {
                claimed.insert(target, input);
            }
        }
    }
    Ok(())
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let jobs = match app.jobs {
        Some(0) => return Err(Error::InvalidJobs.into()),
        Some(n) => n,
        None => default_jobs(),
    };
    if let Some(dir) = &app.output_dir {
        check_output_collisions(dir, &app.paths)?;
    }
    let config = global.heuristics()?;
    let ocr = global.ocr();

    let progress = match &app.output_dir {
        Some(_) => Some(progress_bar(app.paths.len())?),
        None => None,
    };

    log::debug!("extracting {} documents, {} at a time", app.paths.len(), jobs);
    let mut results: Vec<(usize, PathBuf, Outline)> =
        stream::iter(app.paths.into_iter().enumerate())
            .map(|(idx, path)| {
                let config = config.clone();
                let ocr = ocr.clone();
                async move {
                    let input = path.clone();
                    let outline = crate::run_blocking(move || {
                        extract_outline_or_default(&input, &config, &ocr)
                    })
                    .await?;
                    Ok::<_, color_eyre::eyre::Report>((idx, path, outline))
                }
            })
            .buffer_unordered(jobs)
            .inspect_ok(|(_, path, _)| {
                if let Some(bar) = &progress {
                    bar.set_message(path.display().to_string());
                    bar.inc(1);
                }
            })
            .try_collect()
            .await?;

    results.sort_by_key(|(idx, _, _)| *idx);
    let results: Vec<(PathBuf, Outline)> = results
        .into_iter()
        .map(|(_, path, outline)| (path, outline))
        .collect();

    match app.output_dir {
        Some(dir) => {
            write_outputs(&dir, &results)?;
            if let Some(bar) = progress {
                bar.finish_with_message(f!("wrote {} files to {}", results.len(), dir.display()));
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&Results(&results))?),
    }

    Ok(())
}

fn write_outputs(dir: &Path, results: &[(PathBuf, Outline)]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| f!("Failed to create output directory {}", dir.display()))?;

    for (input, outline) in results {
        let target = output_path(dir, input);
        let json = serde_json::to_string_pretty(outline)?;
        std::fs::write(&target, json).map_err(|e| Error::Output {
            path: target.display().to_string(),
            reason: e.to_string(),
        })?;
        log::debug!("{} -> {}", input.display(), target.display());
    }

    Ok(())
}
