//! One conversion run: archive → assets → rewritten HTML → story document.

use crate::archive::extract_story;
use crate::assets::{import_assets, AssetFailure, MediaStore};
use crate::builder::{PageGeometry, StoryBuilder};
use crate::dom::{find_elem, parse_to_dom, text_content};
use crate::error::ConversionError;
use crate::model::StoryDocument;
use crate::normalize::StoryNormalizer;
use crate::rewrite::rewrite_html;
use clap::ValueEnum;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Requested status of the post the caller creates. Not interpreted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    #[default]
    Draft,
    Publish,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOptions {
    pub publish_state: PublishState,
    pub geometry: PageGeometry,
    /// Parent of the per-run working directory; the system temp dir if unset.
    pub work_root: Option<PathBuf>,
    pub publisher_name: String,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: StoryDocument,
    /// Rewritten markup, stored by callers as the post body.
    pub html: String,
    pub asset_errors: Vec<AssetFailure>,
    pub publish_state: PublishState,
}

impl Conversion {
    /// Title for a story whose markup has no heading: the `<title>` element,
    /// else one derived from the archive's file name.
    pub fn fallback_title(&self, zip_path: &Path) -> String {
        let dom = parse_to_dom(&self.html);
        find_elem(&dom.document, "title")
            .map(|t| text_content(&t).trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title_from_filename(zip_path))
    }
}

/// `my_first-story.zip` → `My First Story`.
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default();
    let mut out = String::with_capacity(stem.len());
    let mut at_word_start = true;
    for ch in stem.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    out
}

fn working_dir(root: Option<&Path>) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("story_");
    match root {
        Some(root) => {
            fs::create_dir_all(root)?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
}

/// Reads the story markup. Bytes that are not UTF-8 (a legacy `é`, say)
/// become U+FFFD rather than failing the run.
fn read_html(path: &Path) -> Result<String, ConversionError> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(html) => Ok(html),
        Err(err) => {
            warn!(
                "{} is not valid UTF-8, replacing undecodable bytes",
                path.display()
            );
            Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
        }
    }
}

/// Converts the story archive at `zip_path`, importing its assets into
/// `store`. The working directory is removed before this returns, whatever
/// the outcome.
pub fn convert(
    zip_path: &Path,
    options: &ConvertOptions,
    store: &mut dyn MediaStore,
) -> Result<Conversion, ConversionError> {
    let work_dir = working_dir(options.work_root.as_deref())?;
    info!(
        "converting {} in {}",
        zip_path.display(),
        work_dir.path().display()
    );

    let story = extract_story(zip_path, work_dir.path())?;
    info!("story entry point: {}", story.html_file.display());

    let import = import_assets(story.assets_dir.as_deref(), store);
    let html = rewrite_html(&read_html(&story.html_file)?, &import.path_map)?;

    let store: &dyn MediaStore = store;
    let mut document = StoryBuilder::new(options.geometry)
        .with_media_store(store)
        .build(&html)?;
    document.publisher.name = options.publisher_name.clone();
    StoryNormalizer::new(&import.path_map)
        .with_media_store(store)
        .normalize(&mut document);

    let work_path = work_dir.path().to_path_buf();
    if let Err(err) = work_dir.close() {
        warn!("could not remove {}: {err}", work_path.display());
    }

    Ok(Conversion {
        document,
        html,
        asset_errors: import.failures(),
        publish_state: options.publish_state,
    })
}
