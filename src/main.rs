use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use story_from_zip::config::Config;
use story_from_zip::{convert, LocalMediaStore, PublishState};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Story archive: one HTML file and an optional `assets/` folder.
    #[arg(long)]
    zip: PathBuf,

    /// Where to write the story JSON (stdout if omitted).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory imported media is copied into.
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// URL the media directory is served under.
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, value_enum)]
    status: Option<PublishState>,

    /// Also write the rewritten HTML here.
    #[arg(long)]
    html_out: Option<PathBuf>,

    /// JSON config file; flags take precedence over its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    page_width: Option<f64>,

    #[arg(long)]
    page_height: Option<f64>,

    /// Publisher name recorded in the story.
    #[arg(long)]
    publisher: Option<String>,

    /// Parent directory for the temporary working directory.
    #[arg(long)]
    work_root: Option<PathBuf>,
}

impl Args {
    fn flag_config(&self) -> Config {
        Config {
            media_dir: self.media_dir.clone(),
            base_url: self.base_url.clone(),
            status: self.status,
            page_width: self.page_width,
            page_height: self.page_height,
            publisher: self.publisher.clone(),
            work_root: self.work_root.clone(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    let file_config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("load {}", path.display()))?,
        None => Config::default(),
    };
    let config = file_config.overlay(args.flag_config());

    let media_dir = config.media_dir();
    let mut store = LocalMediaStore::new(&media_dir, config.base_url())
        .with_context(|| format!("open media dir {}", media_dir.display()))?;

    let mut conversion = convert(&args.zip, &config.convert_options(), &mut store)
        .with_context(|| format!("convert {}", args.zip.display()))?;

    for failure in &conversion.asset_errors {
        warn!("asset {} was not imported: {}", failure.path, failure.message);
    }
    if conversion.document.title.is_empty() {
        conversion.document.title = conversion.fallback_title(&args.zip);
    }

    let json = serde_json::to_string_pretty(&conversion.document).context("serialize story")?;
    match &args.out {
        Some(path) => fs::write(path, json).with_context(|| format!("write {}", path.display()))?,
        None => println!("{json}"),
    }
    if let Some(path) = &args.html_out {
        fs::write(path, &conversion.html).with_context(|| format!("write {}", path.display()))?;
    }

    info!(
        "converted '{}' ({} page(s), {:?}, {} asset failure(s))",
        conversion.document.title,
        conversion.document.pages.len(),
        conversion.publish_state,
        conversion.asset_errors.len()
    );
    Ok(())
}
