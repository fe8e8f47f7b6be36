//! Points media references in the story markup at imported URLs.

use crate::dom::{
    attr_get, attr_set, descendants, find_elem, is_tag, node_children, outer_html, parse_to_dom,
};
use crate::error::ConversionError;
use crate::paths::{basename, is_absolute_reference, resolve_asset, PathMap};
use crate::style::replace_style_urls;
use log::debug;
use markup5ever_rcdom::Handle;

/// Attributes whose whole value is a media reference.
pub const MEDIA_ATTRIBUTES: &[&str] = &[
    "src",
    "poster",
    "background-audio",
    "publisher-logo-src",
    "poster-portrait-src",
    "poster-square-src",
    "poster-landscape-src",
];

pub const AMP_CDN: &str = "https://cdn.ampproject.org";

/// CDN location for a bundled copy of the AMP runtime (`v0.js`) or one of
/// its extensions (`amp-*.js`). Those scripts are never imported as media.
pub fn amp_runtime_url(value: &str) -> Option<String> {
    if is_absolute_reference(value) {
        return None;
    }
    match basename(value) {
        "v0.js" => Some(format!("{AMP_CDN}/v0.js")),
        name if name.starts_with("amp-") && name.ends_with(".js") => {
            Some(format!("{AMP_CDN}/v0/{name}"))
        }
        _ => None,
    }
}

/// Rewrites the URL of each `srcset` candidate the path map knows, keeping
/// its width or density descriptor. `None` when nothing matched.
pub fn rewrite_srcset(srcset: &str, path_map: &PathMap) -> Option<String> {
    let mut hits = 0;
    let candidates: Vec<String> = srcset
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|candidate| {
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, rest)) => (url, rest.trim()),
                None => (candidate, ""),
            };
            match resolve_asset(path_map, url) {
                Some(new_url) => {
                    hits += 1;
                    if descriptor.is_empty() {
                        new_url.to_string()
                    } else {
                        format!("{new_url} {descriptor}")
                    }
                }
                None => candidate.to_string(),
            }
        })
        .collect();
    (hits > 0).then(|| candidates.join(", "))
}

/// Rewrites media references in place and returns how many were changed.
pub fn rewrite_references(root: &Handle, path_map: &PathMap) -> usize {
    let mut changed = 0;
    for el in descendants(root) {
        for attr in MEDIA_ATTRIBUTES {
            let Some(value) = attr_get(&el, attr) else {
                continue;
            };
            if let Some(url) = resolve_asset(path_map, &value) {
                debug!("{attr}: {value} -> {url}");
                attr_set(&el, attr, url);
                changed += 1;
            } else if *attr == "src" && is_tag(&el, &["script"]) {
                if let Some(url) = amp_runtime_url(&value) {
                    debug!("script: {value} -> {url}");
                    attr_set(&el, attr, &url);
                    changed += 1;
                }
            }
        }

        if let Some(srcset) = attr_get(&el, "srcset") {
            if let Some(new_srcset) = rewrite_srcset(&srcset, path_map) {
                debug!("srcset: {srcset} -> {new_srcset}");
                attr_set(&el, "srcset", &new_srcset);
                changed += 1;
            }
        }

        let Some(style) = attr_get(&el, "style") else {
            continue;
        };
        if !style.to_ascii_lowercase().contains("url(") {
            continue;
        }
        let mut hits = 0;
        let new_style = replace_style_urls(&style, |target| {
            let url = resolve_asset(path_map, target)?;
            hits += 1;
            Some(url.to_string())
        });
        if hits > 0 {
            debug!("style url(): {hits} reference(s) rewritten");
            attr_set(&el, "style", &new_style);
            changed += hits;
        }
    }
    changed
}

/// Parses `html`, rewrites every asset reference found in `path_map` and
/// serializes the result.
///
/// A full document (anything with an `<html` tag) is written back with its
/// doctype and wrapper. A fragment comes back as a fragment.
pub fn rewrite_html(html: &str, path_map: &PathMap) -> Result<String, ConversionError> {
    if html.trim().is_empty() {
        return Err(ConversionError::HtmlParseError("empty html".to_string()));
    }

    let dom = parse_to_dom(html);
    let changed = rewrite_references(&dom.document, path_map);
    debug!("rewrote {changed} media reference(s)");

    if html.to_ascii_lowercase().contains("<html") {
        return Ok(outer_html(&dom.document));
    }

    let mut out = String::new();
    for section in ["head", "body"] {
        if let Some(node) = find_elem(&dom.document, section) {
            for child in node_children(&node) {
                out.push_str(&outer_html(&child));
            }
        }
    }
    Ok(out)
}
