//! Best-effort repair pass over a built story document.
//!
//! Running it twice gives the same result as running it once.

use crate::assets::MediaStore;
use crate::model::{
    AudioResource, ColorValue, Element, Fill, GradientStop, Page, Resource, Rgba, SolidColor,
    StoryDocument, STORY_SCHEMA_VERSION,
};
use crate::paths::{resolve_asset, PathMap};
use log::{debug, info};
use serde_json::Value;

const PAGE_FALLBACK: &str = "#ffffff";
const FILL_FALLBACK: &str = "#ffffff";
const TEXT_FALLBACK: &str = "#FFFFFF";

/// Recovers an `{r,g,b[,a]}` record with numeric channels. Channels are
/// clamped; a missing alpha is opaque.
fn salvage_rgba(value: &Value) -> Option<Rgba> {
    let obj = value.as_object()?;
    let channel = |key: &str| -> Option<u8> {
        obj.get(key)
            .and_then(Value::as_f64)
            .map(|n| n.clamp(0.0, 255.0).round() as u8)
    };
    let a = match obj.get("a") {
        None => 1.0,
        Some(v) => v.as_f64()?.clamp(0.0, 1.0),
    };
    Some(Rgba {
        r: channel("r")?,
        g: channel("g")?,
        b: channel("b")?,
        a,
    })
}

/// A color as a CSS string, if it can be read as one.
fn css_string(color: &ColorValue) -> Option<String> {
    match color {
        ColorValue::Css(s) => Some(s.clone()),
        ColorValue::Rgba(c) => Some(c.to_css()),
        ColorValue::Other(v) => salvage_rgba(v).map(Rgba::to_css),
    }
}

/// Page backgrounds always end up as `{color: "<css>"}`.
pub fn normalize_page_fill(fill: Option<Fill>) -> Fill {
    let color = match fill {
        None => None,
        Some(Fill::Bare(s)) => Some(s),
        Some(Fill::Solid(SolidColor { color })) => css_string(&color),
        Some(Fill::Linear(gradient)) => gradient.stops.first().and_then(|s| css_string(&s.color)),
        Some(Fill::Malformed(_)) => None,
    };
    match color {
        Some(c) => Fill::solid(&c),
        None => {
            debug!("page background replaced with {PAGE_FALLBACK}");
            Fill::solid(PAGE_FALLBACK)
        }
    }
}

fn normalize_stop(stop: GradientStop) -> GradientStop {
    let color = match stop.color {
        ColorValue::Other(v) => match salvage_rgba(&v) {
            Some(c) => ColorValue::Rgba(c),
            None => {
                debug!("gradient stop color {v} replaced with opaque black");
                ColorValue::Rgba(Rgba::OPAQUE_BLACK)
            }
        },
        ok => ok,
    };
    GradientStop {
        color,
        position: stop.position,
    }
}

/// Element fills and text colors: object form, gradient stops either a
/// string or a full record.
pub fn normalize_fill(fill: Fill, fallback: &str) -> Fill {
    match fill {
        Fill::Bare(s) => Fill::solid(&s),
        Fill::Solid(SolidColor {
            color: ColorValue::Other(v),
        }) => match salvage_rgba(&v) {
            Some(c) => Fill::Solid(SolidColor {
                color: ColorValue::Rgba(c),
            }),
            None => Fill::solid(fallback),
        },
        Fill::Solid(solid) => Fill::Solid(solid),
        Fill::Linear(mut gradient) => {
            gradient.stops = gradient.stops.into_iter().map(normalize_stop).collect();
            Fill::Linear(gradient)
        }
        Fill::Malformed(v) => {
            debug!("fill {v} replaced with {fallback}");
            Fill::solid(fallback)
        }
    }
}

pub struct StoryNormalizer<'a> {
    path_map: &'a PathMap,
    media: Option<&'a dyn MediaStore>,
}

impl<'a> StoryNormalizer<'a> {
    pub fn new(path_map: &'a PathMap) -> Self {
        Self {
            path_map,
            media: None,
        }
    }

    pub fn with_media_store(mut self, store: &'a dyn MediaStore) -> Self {
        self.media = Some(store);
        self
    }

    pub fn normalize(&self, doc: &mut StoryDocument) {
        doc.version = STORY_SCHEMA_VERSION;

        if doc.pages.is_empty() {
            debug!("document has no pages, adding an empty one");
            doc.pages.push(Page::new("page-1", PAGE_FALLBACK));
        }

        if let Some(resource) = doc.background_audio.resource.as_mut() {
            self.fix_audio(resource);
        }
        for page in &mut doc.pages {
            self.normalize_page(page);
        }

        info!("normalized story ({} page(s))", doc.pages.len());
    }

    fn normalize_page(&self, page: &mut Page) {
        page.background_color = Some(normalize_page_fill(page.background_color.take()));

        if let Some(resource) = page
            .background_audio
            .as_mut()
            .and_then(|a| a.resource.as_mut())
        {
            self.fix_audio(resource);
        }

        for element in &mut page.elements {
            if let Some(fill) = element.base_mut().background_color.take() {
                element.base_mut().background_color = Some(normalize_fill(fill, FILL_FALLBACK));
            }
            match element {
                Element::Image(m) | Element::Video(m) => self.fix_resource(&mut m.resource),
                Element::Text(t) => {
                    let color = std::mem::replace(&mut t.color, Fill::solid(TEXT_FALLBACK));
                    t.color = normalize_fill(color, TEXT_FALLBACK);
                }
                Element::Shape(_) => {}
            }
        }
    }

    /// Maps a leftover relative reference through the path map.
    fn fix_url(&self, url: &mut String) {
        if let Some(mapped) = resolve_asset(self.path_map, url) {
            debug!("re-resolved {url} -> {mapped}");
            *url = mapped.to_string();
        }
    }

    fn lookup_id(&self, url: &str) -> u64 {
        self.media
            .and_then(|m| m.resolve_url_to_media_id(url))
            .unwrap_or(0)
    }

    fn fix_resource(&self, resource: &mut Resource) {
        self.fix_url(&mut resource.src);
        if resource.id == 0 {
            resource.id = self.lookup_id(&resource.src);
        }
        if let Some(poster) = resource.poster.as_mut() {
            self.fix_url(poster);
            if resource.poster_id.unwrap_or(0) == 0 {
                resource.poster_id = Some(self.lookup_id(poster));
            }
        }
    }

    fn fix_audio(&self, resource: &mut AudioResource) {
        self.fix_url(&mut resource.src);
        if resource.id == 0 {
            resource.id = self.lookup_id(&resource.src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::MemoryStore;
    use crate::model::{GradientKind, LinearGradient};
    use serde_json::json;

    fn messy() -> StoryDocument {
        serde_json::from_value(json!({
            "version": 3,
            "autoAdvance": true,
            "defaultPageDuration": 7,
            "pages": [
                {"id": "a", "backgroundColor": "#123456", "elements": [
                    {"type": "text", "id": "t", "x": 0, "y": 0, "width": 1, "height": 1,
                     "tagName": "p", "content": "x",
                     "font": {"family": "Roboto", "service": "fonts.google.com", "fallbacks": [], "weight": 400},
                     "fontSize": 24, "lineHeight": 1.3, "textAlign": "left", "color": "red"},
                    {"type": "shape", "id": "s", "x": 0, "y": 0, "width": 1, "height": 1,
                     "backgroundColor": {"type": "linear", "rotation": 90, "stops": [
                        {"color": "#fff", "position": 0},
                        {"color": {"r": 1, "g": 2, "b": 3}, "position": 0.5},
                        {"color": 7, "position": 1}
                     ]}},
                    {"type": "image", "id": "i", "x": 0, "y": 0, "width": 1, "height": 1,
                     "resource": {"id": 0, "src": "images/photo.jpg"}}
                ]},
                {"id": "b", "backgroundColor": {"opacity": 1}},
                {"id": "c", "backgroundColor": {"color": true}},
                {"id": "d", "backgroundColor": {"color": {"r": 10, "g": 20, "b": 30, "a": 0.5}}},
                {"id": "e"}
            ]
        }))
        .unwrap()
    }

    fn store() -> (PathMap, MemoryStore) {
        let mut map = PathMap::new();
        map.insert(
            "assets/img/photo.jpg".to_string(),
            "https://media.test/uploads/photo.jpg".to_string(),
        );
        let mut store = MemoryStore::default();
        store
            .urls
            .insert("https://media.test/uploads/photo.jpg".to_string(), 42);
        (map, store)
    }

    fn normalized() -> StoryDocument {
        let (map, store) = store();
        let mut doc = messy();
        StoryNormalizer::new(&map)
            .with_media_store(&store)
            .normalize(&mut doc);
        doc
    }

    #[test]
    fn page_backgrounds_become_color_strings() {
        let doc = normalized();
        let colors: Vec<Option<&str>> = doc
            .pages
            .iter()
            .map(|p| p.background_color.as_ref().and_then(Fill::solid_css))
            .collect();
        assert_eq!(
            colors,
            vec![
                Some("#123456"),
                Some("#ffffff"),
                Some("#ffffff"),
                Some("rgba(10,20,30,0.5)"),
                Some("#ffffff"),
            ]
        );
    }

    #[test]
    fn gradient_stops_are_strings_or_full_records() {
        let doc = normalized();
        let Element::Shape(shape) = &doc.pages[0].elements[1] else {
            panic!("expected shape");
        };
        let Some(Fill::Linear(gradient)) = &shape.base.background_color else {
            panic!("expected gradient");
        };
        let stops: Vec<&ColorValue> = gradient.stops.iter().map(|s| &s.color).collect();
        assert_eq!(stops[0], &ColorValue::css("#fff"));
        assert_eq!(stops[1], &ColorValue::Rgba(Rgba { r: 1, g: 2, b: 3, a: 1.0 }));
        assert_eq!(stops[2], &ColorValue::Rgba(Rgba::OPAQUE_BLACK));
        assert_eq!(gradient.rotation, 90.0);
    }

    #[test]
    fn text_color_is_wrapped() {
        let doc = normalized();
        let Element::Text(text) = &doc.pages[0].elements[0] else {
            panic!("expected text");
        };
        assert_eq!(text.color, Fill::solid("red"));
    }

    #[test]
    fn leftover_asset_paths_are_resolved() {
        let doc = normalized();
        let resource = doc.pages[0].elements[2].resource().unwrap();
        assert_eq!(resource.src, "https://media.test/uploads/photo.jpg");
        assert_eq!(resource.id, 42);
    }

    #[test]
    fn stamps_version() {
        assert_eq!(normalized().version, STORY_SCHEMA_VERSION);
    }

    #[test]
    fn running_twice_changes_nothing() {
        let (map, store) = store();
        let normalizer = StoryNormalizer::new(&map).with_media_store(&store);
        let mut once = messy();
        normalizer.normalize(&mut once);
        let mut twice = once.clone();
        normalizer.normalize(&mut twice);
        assert_eq!(once, twice);

        let json = serde_json::to_value(&twice).unwrap();
        let reparsed: StoryDocument = serde_json::from_value(json).unwrap();
        assert_eq!(reparsed, once);
    }

    #[test]
    fn empty_document_gets_a_page() {
        let map = PathMap::new();
        let mut doc = StoryDocument::new("", "");
        StoryNormalizer::new(&map).normalize(&mut doc);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].id, "page-1");
        assert_eq!(doc.pages[0].background_color, Some(Fill::solid("#ffffff")));
        assert_eq!(doc.title, "");
    }

    #[test]
    fn element_fill_branches() {
        assert_eq!(normalize_fill(Fill::Bare("blue".into()), FILL_FALLBACK), Fill::solid("blue"));
        assert_eq!(
            normalize_fill(Fill::Malformed(json!({"x": 1})), FILL_FALLBACK),
            Fill::solid("#ffffff")
        );
        assert_eq!(
            normalize_fill(
                Fill::Solid(SolidColor {
                    color: ColorValue::Other(json!([1, 2]))
                }),
                TEXT_FALLBACK
            ),
            Fill::solid("#FFFFFF")
        );
        let gradient = Fill::Linear(LinearGradient {
            kind: GradientKind::Linear,
            stops: vec![],
            rotation: 0.0,
        });
        assert_eq!(normalize_fill(gradient.clone(), FILL_FALLBACK), gradient);
    }
}
