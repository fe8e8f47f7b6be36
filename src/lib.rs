//! Converts a zipped web story (one HTML file plus an `assets/` folder) into
//! a page-and-element story document, importing its media along the way.

pub mod archive;
pub mod assets;
pub mod builder;
pub mod config;
pub mod dom;
pub mod error;
pub mod model;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod rewrite;
pub mod style;

pub use assets::{AssetFailure, ImportedMedia, LocalMediaStore, MediaStore};
pub use builder::{PageGeometry, StoryBuilder};
pub use error::{ConfigError, ConversionError, MediaStoreError};
pub use model::{Element, Fill, Page, StoryDocument, STORY_SCHEMA_VERSION};
pub use normalize::StoryNormalizer;
pub use pipeline::{convert, title_from_filename, Conversion, ConvertOptions, PublishState};
