//! Turns rewritten story markup into a raw [`StoryDocument`].
//!
//! Pages are `amp-story-page` elements or `div`/`section` elements with the
//! `page` class; without any, the body is a single page. Within a page the
//! elements are collected in a fixed order: fill-layer backgrounds, the
//! gradient overlay, content images, videos, `h1`, `h2`, `p`, then shapes.

use crate::assets::MediaStore;
use crate::dom::{
    attr_get, attr_nonempty, class_contains, descendants, descendants_by_tag, find_elem, has_class,
    inner_html, is_tag, parse_to_dom, text_content,
};
use crate::error::ConversionError;
use crate::model::{
    Animation, AudioResource, ColorValue, Element, ElementBase, Fill, Font, GradientKind,
    GradientStop, LinearGradient, MediaElement, Page, PageAnimation, PageBackgroundAudio, Resource,
    Rgba, ShapeElement, StoryDocument, TextElement,
};
use crate::paths::extension_of;
use crate::style::{
    font_weight, leading_number, parse_css_time, parse_inline_style, percent_fraction,
    primary_font_family, rotation_degrees,
};
use log::{debug, info};
use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

const IMAGE_TAGS: &[&str] = &["amp-img", "img"];
const VIDEO_TAGS: &[&str] = &["amp-video", "video"];
const TITLE_TAGS: &[&str] = &["h1", "h2", "h3", "h4"];
/// Only these become shapes; inline highlights inside text never do.
const SHAPE_TAGS: &[&str] = &["div"];

/// Coordinate space elements are positioned in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: 412.0,
            height: 732.0,
        }
    }
}

struct TextStyle {
    font_size: u32,
    weight: u32,
    /// Top of the first element of this kind, as a fraction of page height.
    top: f64,
}

fn text_style(tag: &str) -> TextStyle {
    match tag {
        "h1" => TextStyle { font_size: 56, weight: 700, top: 0.8 },
        "h2" => TextStyle { font_size: 44, weight: 700, top: 0.8 },
        _ => TextStyle { font_size: 24, weight: 400, top: 0.88 },
    }
}

/// Per-page state while elements are collected.
struct PageDraft {
    page: Page,
    counter: usize,
    placed_images: HashSet<String>,
}

impl PageDraft {
    fn next_fallback_id(&mut self, kind: &str) -> String {
        self.counter += 1;
        format!("{}-{}-{}", self.page.id, kind, self.counter)
    }
}

pub fn is_page_container(h: &Handle) -> bool {
    is_tag(h, &["amp-story-page"]) || (is_tag(h, &["div", "section"]) && has_class(h, "page"))
}

fn is_fill_layer(h: &Handle) -> bool {
    is_tag(h, &["amp-story-grid-layer"])
        && attr_get(h, "template")
            .map(|t| t.trim().eq_ignore_ascii_case("fill"))
            .unwrap_or(false)
}

fn is_gradient_overlay(h: &Handle) -> bool {
    is_tag(h, &["div"]) && class_contains(h, "overlay-gradient")
}

/// Outermost page containers under `root`, in document order.
pub fn find_page_containers(root: &Handle) -> Vec<Handle> {
    fn walk(node: &Handle, out: &mut Vec<Handle>) {
        for c in node.children.borrow().iter() {
            if is_page_container(c) {
                out.push(c.clone());
            } else {
                walk(c, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

/// Text of the first non-empty `h1`..`h4` in the document.
pub fn first_heading_title(root: &Handle) -> Option<String> {
    descendants(root)
        .iter()
        .filter(|h| is_tag(h, TITLE_TAGS))
        .map(|h| text_content(h).split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty())
}

/// `image/jpeg`, `video/mp4`, ... from the file extension of `src`.
pub fn mime_guess(kind: &str, src: &str) -> String {
    let ext = extension_of(src);
    let subtype = match (kind, ext.as_str()) {
        (_, "") => return String::new(),
        (_, "jpg") | (_, "jpe") => "jpeg",
        (_, "svg") => "svg+xml",
        ("video", "mov") => "quicktime",
        ("audio", "mp3") => "mpeg",
        ("audio", "m4a") => "mp4",
        (_, other) => other,
    };
    format!("{kind}/{subtype}")
}

fn dimension_attr(el: &Handle, name: &str) -> Option<u32> {
    attr_get(el, name)
        .and_then(|v| leading_number(&v))
        .filter(|n| *n >= 1.0)
        .map(|n| n.round() as u32)
}

fn entrance_animation(el: &Handle) -> Option<Animation> {
    let name = attr_nonempty(el, "animate-in")?;
    Some(Animation {
        name,
        duration: parse_css_time(&attr_get(el, "animate-in-duration").unwrap_or_default()),
        delay: parse_css_time(&attr_get(el, "animate-in-delay").unwrap_or_default()),
    })
}

/// A flat `background`/`background-color` value, ignoring images and
/// gradients.
fn flat_background(styles: &HashMap<String, String>) -> Option<String> {
    let value = styles
        .get("background-color")
        .or_else(|| styles.get("background"))?;
    let low = value.to_ascii_lowercase();
    if low.contains("url(") || low.contains("gradient(") {
        return None;
    }
    Some(value.clone())
}

pub struct StoryBuilder<'a> {
    geometry: PageGeometry,
    media: Option<&'a dyn MediaStore>,
    used_ids: HashSet<String>,
}

impl<'a> StoryBuilder<'a> {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            media: None,
            used_ids: HashSet::new(),
        }
    }

    /// Store used to look up media ids for resource URLs.
    pub fn with_media_store(mut self, store: &'a dyn MediaStore) -> Self {
        self.media = Some(store);
        self
    }

    pub fn build(&mut self, html: &str) -> Result<StoryDocument, ConversionError> {
        if html.trim().is_empty() {
            return Err(ConversionError::HtmlParseError("empty html".to_string()));
        }
        self.used_ids.clear();

        let dom = parse_to_dom(html);
        let title = first_heading_title(&dom.document).unwrap_or_default();
        let mut doc = StoryDocument::new(title, "");

        let body = find_elem(&dom.document, "body").unwrap_or_else(|| dom.document.clone());
        let containers = find_page_containers(&body);
        if containers.is_empty() {
            debug!("no page containers, using the body as one page");
            doc.pages.push(self.build_page(&body, 1, false));
        } else {
            for (i, container) in containers.iter().enumerate() {
                doc.pages.push(self.build_page(container, i + 1, true));
            }
        }

        info!(
            "built {} page(s) with {} element(s)",
            doc.pages.len(),
            doc.elements().count()
        );
        Ok(doc)
    }

    fn media_id(&self, url: &str) -> u64 {
        self.media
            .and_then(|m| m.resolve_url_to_media_id(url))
            .unwrap_or(0)
    }

    fn claim_page_id(&mut self, preferred: Option<String>, index: usize) -> String {
        if let Some(id) = preferred {
            if self.used_ids.insert(id.clone()) {
                return id;
            }
            debug!("page id '{id}' already used");
        }
        let base = format!("page-{index}");
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used_ids.insert(candidate.clone()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        candidate
    }

    fn claim_element_id(&mut self, draft: &mut PageDraft, el: Option<&Handle>, kind: &str) -> String {
        if let Some(id) = el.and_then(|e| attr_nonempty(e, "id")) {
            if self.used_ids.insert(id.clone()) {
                return id;
            }
            debug!("element id '{id}' already used, generating one");
        }
        loop {
            let candidate = draft.next_fallback_id(kind);
            if self.used_ids.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn build_page(&mut self, container: &Handle, index: usize, explicit: bool) -> Page {
        let preferred = if explicit { attr_nonempty(container, "id") } else { None };
        let id = self.claim_page_id(preferred, index);
        let default_bg = if explicit { "#000000" } else { "#FFFFFF" };
        let bg = attr_nonempty(container, "background-color").unwrap_or_else(|| default_bg.to_string());

        let mut page = Page::new(id, &bg);
        if let Some(src) = attr_nonempty(container, "background-audio") {
            page.background_audio = Some(PageBackgroundAudio {
                looped: false,
                resource: Some(AudioResource {
                    id: self.media_id(&src),
                    mime_type: mime_guess("audio", &src),
                    src,
                }),
            });
        }

        let mut draft = PageDraft {
            page,
            counter: 0,
            placed_images: HashSet::new(),
        };

        let all = descendants(container);
        let fill_layers: Vec<Handle> = all.iter().filter(|h| is_fill_layer(h)).cloned().collect();
        let in_fill: Vec<Handle> = fill_layers.iter().flat_map(descendants).collect();
        let inside_fill = |h: &Handle| in_fill.iter().any(|x| Rc::ptr_eq(x, h));

        for layer in &fill_layers {
            for img in descendants_by_tag(layer, IMAGE_TAGS) {
                self.add_background_image(&mut draft, &img);
            }
        }

        if let Some(overlay) = all.iter().find(|h| is_gradient_overlay(h)) {
            self.add_gradient_overlay(&mut draft, overlay);
        }

        for img in all.iter().filter(|&h| is_tag(h, IMAGE_TAGS) && !inside_fill(h)) {
            self.add_content_image(&mut draft, img);
        }

        for video in all.iter().filter(|&h| is_tag(h, VIDEO_TAGS) && !inside_fill(h)) {
            self.add_video(&mut draft, video);
        }

        for tag in ["h1", "h2", "p"] {
            let mut idx = 0;
            for el in all.iter().filter(|h| is_tag(h, &[tag])) {
                if self.add_text(&mut draft, el, tag, idx) {
                    idx += 1;
                }
            }
        }

        for el in &all {
            if !is_tag(el, SHAPE_TAGS) || is_page_container(el) || is_gradient_overlay(el) {
                continue;
            }
            self.add_shape(&mut draft, el);
        }

        debug!(
            "page {}: {} element(s)",
            draft.page.id,
            draft.page.elements.len()
        );
        draft.page
    }

    /// Applies inline geometry and animation, then appends the element.
    fn place(&mut self, draft: &mut PageDraft, el: &Handle, mut element: Element, inline_geometry: bool) {
        if inline_geometry {
            self.apply_inline_geometry(el, element.base_mut());
        }
        if let Some(animation) = entrance_animation(el) {
            let id = element.id().to_string();
            draft.page.animations.push(PageAnimation {
                id: format!("{id}-anim"),
                kind: animation.name.clone(),
                targets: vec![id],
                duration: animation.duration,
                delay: animation.delay,
            });
            element.base_mut().animation = Some(animation);
        }
        draft.page.elements.push(element);
    }

    /// `left`/`top`/`width`/`height` percentages and `rotate()`; width and
    /// height fall back to 20% of the page once any position is given.
    fn apply_inline_geometry(&self, el: &Handle, base: &mut ElementBase) {
        let Some(style) = attr_get(el, "style") else {
            return;
        };
        let styles = parse_inline_style(&style);
        let fraction = |key: &str| styles.get(key).and_then(|v| percent_fraction(v));

        if ["left", "top", "width", "height"].iter().any(|k| styles.contains_key(*k)) {
            let PageGeometry { width, height } = self.geometry;
            base.x = fraction("left").unwrap_or(0.0) * width;
            base.y = fraction("top").unwrap_or(0.0) * height;
            base.width = fraction("width").unwrap_or(0.2) * width;
            base.height = fraction("height").unwrap_or(0.2) * height;
        }
        if let Some(deg) = styles.get("transform").and_then(|t| rotation_degrees(t)) {
            base.rotation_angle = deg;
        }
    }

    fn image_resource(&self, el: &Handle, src: &str, default_size: (u32, u32)) -> Resource {
        Resource {
            id: self.media_id(src),
            src: src.to_string(),
            alt: attr_get(el, "alt").unwrap_or_default(),
            mime_type: mime_guess("image", src),
            width: dimension_attr(el, "width").unwrap_or(default_size.0),
            height: dimension_attr(el, "height").unwrap_or(default_size.1),
            poster: None,
            poster_id: None,
        }
    }

    fn add_background_image(&mut self, draft: &mut PageDraft, img: &Handle) {
        let Some(src) = attr_nonempty(img, "src") else {
            return;
        };
        let id = self.claim_element_id(draft, Some(img), "bg");
        let PageGeometry { width, height } = self.geometry;
        let element = Element::Image(MediaElement {
            base: ElementBase::new(id, 0.0, 0.0, width, height),
            resource: self.image_resource(img, &src, (1080, 1920)),
            scale: Some(100),
            focal_x: Some(50.0),
            focal_y: Some(50.0),
            is_background: Some(true),
        });
        draft.placed_images.insert(src);
        self.place(draft, img, element, false);
    }

    fn add_gradient_overlay(&mut self, draft: &mut PageDraft, overlay: &Handle) {
        let id = self.claim_element_id(draft, Some(overlay), "gradient");
        let PageGeometry { width, height } = self.geometry;
        let mut base = ElementBase::new(id, 0.0, (height * 0.3).round(), width, (height * 0.7).round());
        base.opacity = Some(100);
        base.background_color = Some(Fill::Linear(LinearGradient {
            kind: GradientKind::Linear,
            stops: [(0.0, 0.0), (0.55, 0.5), (0.8, 1.0)]
                .into_iter()
                .map(|(alpha, position)| GradientStop {
                    color: ColorValue::Rgba(Rgba::black(alpha)),
                    position,
                })
                .collect(),
            rotation: 180.0,
        }));
        self.place(draft, overlay, Element::Shape(ShapeElement { base }), false);
    }

    fn add_content_image(&mut self, draft: &mut PageDraft, img: &Handle) {
        let Some(src) = attr_nonempty(img, "src") else {
            return;
        };
        if draft.placed_images.contains(&src) {
            debug!("skipping duplicate image {src}");
            return;
        }

        let PageGeometry { width, height } = self.geometry;
        let aspect = match (dimension_attr(img, "width"), dimension_attr(img, "height")) {
            (Some(w), Some(h)) => w as f64 / h as f64,
            _ => 1.5,
        };
        let el_width = 0.8 * width;
        let el_height = (el_width / aspect).round();

        let id = self.claim_element_id(draft, Some(img), "img");
        let element = Element::Image(MediaElement {
            base: ElementBase::new(id, 0.1 * width, 0.4 * height, el_width.round(), el_height),
            resource: self.image_resource(img, &src, (400, 300)),
            scale: Some(100),
            focal_x: Some(50.0),
            focal_y: Some(50.0),
            is_background: None,
        });
        draft.placed_images.insert(src);
        self.place(draft, img, element, true);
    }

    fn add_video(&mut self, draft: &mut PageDraft, video: &Handle) {
        let src = attr_nonempty(video, "src").or_else(|| {
            descendants_by_tag(video, &["source"])
                .iter()
                .find_map(|s| attr_nonempty(s, "src"))
        });
        let Some(src) = src else {
            debug!("skipping video without a source");
            return;
        };

        let PageGeometry { width, height } = self.geometry;
        let (res_w, res_h) = (dimension_attr(video, "width"), dimension_attr(video, "height"));
        let aspect = match (res_w, res_h) {
            (Some(w), Some(h)) => w as f64 / h as f64,
            _ => 9.0 / 16.0,
        };
        let el_width = 0.8 * width;
        let poster = attr_nonempty(video, "poster");
        let poster_id = poster.as_deref().map(|p| self.media_id(p));

        let id = self.claim_element_id(draft, Some(video), "video");
        let element = Element::Video(MediaElement {
            base: ElementBase::new(
                id,
                0.1 * width,
                0.1 * height,
                el_width.round(),
                (el_width / aspect).round(),
            ),
            resource: Resource {
                id: self.media_id(&src),
                mime_type: mime_guess("video", &src),
                alt: attr_get(video, "alt").unwrap_or_default(),
                width: res_w.unwrap_or(0),
                height: res_h.unwrap_or(0),
                src,
                poster,
                poster_id,
            },
            scale: None,
            focal_x: None,
            focal_y: None,
            is_background: None,
        });
        self.place(draft, video, element, true);
    }

    /// Returns false when the element had no text and was dropped.
    fn add_text(&mut self, draft: &mut PageDraft, el: &Handle, tag: &str, idx: usize) -> bool {
        if text_content(el).trim().is_empty() {
            debug!("dropping empty <{tag}>");
            return false;
        }
        let content = inner_html(el).trim().to_string();

        let defaults = text_style(tag);
        let styles = attr_get(el, "style")
            .map(|s| parse_inline_style(&s))
            .unwrap_or_default();

        let family = styles
            .get("font-family")
            .and_then(|f| primary_font_family(f))
            .unwrap_or_else(|| "Roboto".to_string());
        let weight = styles
            .get("font-weight")
            .and_then(|w| font_weight(w))
            .unwrap_or(defaults.weight);
        let font_size = styles
            .get("font-size")
            .and_then(|v| leading_number(v))
            .filter(|n| *n > 0.0)
            .map(|n| n.round() as u32)
            .unwrap_or(defaults.font_size);
        let line_height = styles
            .get("line-height")
            .and_then(|v| leading_number(v))
            .filter(|n| *n > 0.0)
            .unwrap_or(1.3);
        let text_align = styles
            .get("text-align")
            .cloned()
            .unwrap_or_else(|| "left".to_string());
        let color = styles
            .get("color")
            .map(String::as_str)
            .unwrap_or("#FFFFFF");

        let PageGeometry { width, height } = self.geometry;
        let y = (defaults.top + 0.03 * idx as f64) * height;
        let id = self.claim_element_id(draft, Some(el), tag);
        let element = Element::Text(TextElement {
            base: ElementBase::new(id, 0.05 * width, y, 0.9 * width, 0.1 * height),
            tag_name: tag.to_string(),
            content,
            font: Font::google(&family, weight),
            font_size,
            line_height,
            text_align,
            color: Fill::solid(color),
        });
        self.place(draft, el, element, true);
        true
    }

    fn add_shape(&mut self, draft: &mut PageDraft, el: &Handle) {
        let Some(style) = attr_get(el, "style") else {
            return;
        };
        let Some(color) = flat_background(&parse_inline_style(&style)) else {
            return;
        };
        let PageGeometry { width, height } = self.geometry;
        let id = self.claim_element_id(draft, Some(el), "shape");
        let mut base = ElementBase::new(id, 0.0, 0.0, 0.2 * width, 0.2 * height);
        base.background_color = Some(Fill::solid(&color));
        self.place(draft, el, Element::Shape(ShapeElement { base }), true);
    }
}
