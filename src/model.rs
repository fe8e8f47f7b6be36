//! The story document handed to the editor, as JSON-serializable types.
//!
//! Color fields accept the loose shapes exporters produce (bare strings,
//! records without a `color`, partial `{r,g,b}` records) so a raw document can
//! be deserialized as-is and repaired by [`crate::normalize`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version stamped on every normalized document.
pub const STORY_SCHEMA_VERSION: u32 = 47;

pub const DEFAULT_PAGE_DURATION_SECS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDocument {
    pub version: u32,
    pub auto_advance: bool,
    pub default_page_duration: u32,
    #[serde(default)]
    pub current_story_styles: StoryStyles,
    #[serde(default)]
    pub background_audio: BackgroundAudio,
    #[serde(default)]
    pub fonts: Vec<Font>,
    #[serde(default)]
    pub publisher: Publisher,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub featured_media: FeaturedMedia,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl StoryDocument {
    pub fn new(title: impl Into<String>, publisher_name: impl Into<String>) -> Self {
        Self {
            version: STORY_SCHEMA_VERSION,
            auto_advance: true,
            default_page_duration: DEFAULT_PAGE_DURATION_SECS,
            current_story_styles: StoryStyles::default(),
            background_audio: BackgroundAudio::default(),
            fonts: Vec::new(),
            publisher: Publisher {
                name: publisher_name.into(),
                logo: PublisherLogo::default(),
            },
            title: title.into(),
            excerpt: String::new(),
            featured_media: FeaturedMedia::default(),
            pages: Vec::new(),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.pages.iter().flat_map(|p| p.elements.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryStyles {
    #[serde(default)]
    pub colors: Vec<ColorValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundAudio {
    pub resource: Option<AudioResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResource {
    pub src: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub name: String,
    #[serde(default)]
    pub logo: PublisherLogo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherLogo {
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub src: Option<String>,
    #[serde(default)]
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedMedia {
    pub id: u64,
    pub height: u32,
    pub width: u32,
    pub url: String,
    pub needs_proxy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Fill>,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<PageAnimation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_audio: Option<PageBackgroundAudio>,
}

impl Page {
    pub fn new(id: impl Into<String>, background: &str) -> Self {
        Self {
            id: id.into(),
            background_color: Some(Fill::solid(background)),
            elements: Vec::new(),
            animations: Vec::new(),
            background_audio: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBackgroundAudio {
    #[serde(rename = "loop", default)]
    pub looped: bool,
    pub resource: Option<AudioResource>,
}

/// Page-level record of an element's entrance animation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAnimation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub targets: Vec<String>,
    pub duration: u32,
    pub delay: u32,
}

/// A color as written in the document: a CSS string, an `{r,g,b,a}` record,
/// or anything else an exporter left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Css(String),
    Rgba(Rgba),
    Other(Value),
}

impl ColorValue {
    pub fn css(s: &str) -> Self {
        ColorValue::Css(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const OPAQUE_BLACK: Rgba = Rgba { r: 0, g: 0, b: 0, a: 1.0 };

    pub fn black(a: f64) -> Self {
        Rgba { r: 0, g: 0, b: 0, a }
    }

    pub fn to_css(self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }
}

/// Background/fill of a page or element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fill {
    Linear(LinearGradient),
    Solid(SolidColor),
    /// A bare CSS string where an object was expected.
    Bare(String),
    Malformed(Value),
}

impl Fill {
    pub fn solid(color: &str) -> Self {
        Fill::Solid(SolidColor {
            color: ColorValue::css(color),
        })
    }

    /// The CSS string of a solid fill, if that is what this is.
    pub fn solid_css(&self) -> Option<&str> {
        match self {
            Fill::Solid(SolidColor {
                color: ColorValue::Css(c),
            }) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidColor {
    pub color: ColorValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientKind {
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    #[serde(rename = "type")]
    pub kind: GradientKind,
    pub stops: Vec<GradientStop>,
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub color: ColorValue,
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for Mask {
    fn default() -> Self {
        Mask {
            kind: "rectangle".to_string(),
        }
    }
}

/// Entrance animation, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    pub name: String,
    pub duration: u32,
    pub delay: u32,
}

/// Fields shared by every element variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementBase {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation_angle: f64,
    #[serde(default)]
    pub mask: Mask,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<u32>,
}

impl ElementBase {
    pub fn new(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width,
            height,
            rotation_angle: 0.0,
            mask: Mask::default(),
            animation: None,
            background_color: None,
            opacity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: u64,
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_background: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    pub service: String,
    pub fallbacks: Vec<String>,
    pub weight: u32,
}

impl Font {
    pub fn google(family: &str, weight: u32) -> Self {
        Font {
            family: family.to_string(),
            service: "fonts.google.com".to_string(),
            fallbacks: vec!["sans-serif".to_string()],
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub tag_name: String,
    pub content: String,
    pub font: Font,
    pub font_size: u32,
    pub line_height: f64,
    pub text_align: String,
    pub color: Fill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeElement {
    #[serde(flatten)]
    pub base: ElementBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Image(MediaElement),
    Video(MediaElement),
    Text(TextElement),
    Shape(ShapeElement),
}

impl Element {
    pub fn base(&self) -> &ElementBase {
        match self {
            Element::Image(m) | Element::Video(m) => &m.base,
            Element::Text(t) => &t.base,
            Element::Shape(s) => &s.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ElementBase {
        match self {
            Element::Image(m) | Element::Video(m) => &mut m.base,
            Element::Text(t) => &mut t.base,
            Element::Shape(s) => &mut s.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Element::Image(m) | Element::Video(m) => Some(&m.resource),
            _ => None,
        }
    }
}
