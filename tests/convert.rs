use std::fs;
use std::io::Write;
use std::path::Path;
use story_from_zip::{convert, ConvertOptions, ConversionError, Element, LocalMediaStore, PublishState};
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn zip_of(entries: &[(&str, &[u8])]) -> NamedTempFile {
    let temp = NamedTempFile::new().unwrap();
    let mut zip = ZipWriter::new(temp.reopen().unwrap());
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(*name, opts).unwrap();
        zip.write_all(contents).unwrap();
    }
    zip.finish().unwrap();
    temp
}

struct Env {
    work: TempDir,
    media: TempDir,
    store: LocalMediaStore,
}

fn env() -> Env {
    let work = TempDir::new().unwrap();
    let media = TempDir::new().unwrap();
    let store = LocalMediaStore::new(media.path(), "https://site.test/media").unwrap();
    Env { work, media, store }
}

fn options(work: &Path) -> ConvertOptions {
    ConvertOptions {
        publish_state: PublishState::Publish,
        work_root: Some(work.to_path_buf()),
        publisher_name: "Site".to_string(),
        ..ConvertOptions::default()
    }
}

const STORY: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Trip</title>
  <script async src="assets/v0.js"></script>
</head>
<body>
<amp-story standalone>
  <amp-story-page id="cover" background-audio="assets/audio/theme.mp3">
    <amp-story-grid-layer template="fill">
      <amp-img src="assets/images/cover.jpg" width="1080" height="1920" alt="Cover"></amp-img>
    </amp-story-grid-layer>
    <div class="overlay-gradient"></div>
    <amp-story-grid-layer template="vertical">
      <h1 class="page-title" animate-in="fade-in" animate-in-duration="0.5s">Road Trip</h1>
      <p class="page-description">Five days, <b>two</b> cars.</p>
      <p></p>
    </amp-story-grid-layer>
  </amp-story-page>
  <amp-story-page id="day-1">
    <amp-story-grid-layer template="vertical">
      <amp-img src="photos/desert.png" width="600" height="400"></amp-img>
      <amp-video poster="assets/images/poster.jpg" width="720" height="1280">
        <source src="assets/video/drive.mp4" type="video/mp4">
      </amp-video>
      <h2>Day one</h2>
    </amp-story-grid-layer>
  </amp-story-page>
</amp-story>
</body>
</html>"#;

#[test]
fn converts_a_nested_export_end_to_end() {
    let zip = zip_of(&[
        ("trip-export/road_trip.html", STORY.as_bytes()),
        ("trip-export/assets/images/cover.jpg", b"jpg"),
        ("trip-export/assets/images/desert.png", b"png"),
        ("trip-export/assets/images/poster.jpg", b"jpg"),
        ("trip-export/assets/video/drive.mp4", b"mp4"),
        ("trip-export/assets/audio/theme.mp3", b"mp3"),
        ("trip-export/assets/readme.txt", b"txt"),
    ]);
    let mut env = env();

    let result = convert(zip.path(), &options(env.work.path()), &mut env.store).unwrap();

    assert!(result.asset_errors.is_empty());
    assert_eq!(result.publish_state, PublishState::Publish);
    assert!(result.html.starts_with("<!DOCTYPE html>"));
    assert!(result.html.contains(r#"src="https://site.test/media/cover.jpg""#));
    assert!(result.html.contains(r#"src="https://site.test/media/desert.png""#));
    assert!(result.html.contains(r#"src="https://cdn.ampproject.org/v0.js""#));
    assert!(env.media.path().join("drive.mp4").exists());
    assert!(!env.media.path().join("readme.txt").exists());
    assert_eq!(fs::read_dir(env.work.path()).unwrap().count(), 0);

    let doc = &result.document;
    assert_eq!(doc.version, 47);
    assert_eq!(doc.title, "Road Trip");
    assert_eq!(doc.publisher.name, "Site");
    assert_eq!(doc.pages.len(), 2);

    let cover = &doc.pages[0];
    assert_eq!(cover.id, "cover");
    let audio = cover.background_audio.as_ref().unwrap().resource.as_ref().unwrap();
    assert_eq!(audio.src, "https://site.test/media/theme.mp3");
    assert_ne!(audio.id, 0);

    let kinds: Vec<&str> = cover
        .elements
        .iter()
        .map(|e| match e {
            Element::Image(_) => "image",
            Element::Video(_) => "video",
            Element::Text(_) => "text",
            Element::Shape(_) => "shape",
        })
        .collect();
    assert_eq!(kinds, vec!["image", "shape", "text", "text"]);
    let Element::Text(title) = &cover.elements[2] else {
        panic!("expected heading");
    };
    assert_eq!(title.content, "Road Trip");
    assert_eq!(title.base.animation.as_ref().map(|a| a.duration), Some(500));
    assert_eq!(cover.animations.len(), 1);

    let day = &doc.pages[1];
    let Element::Image(photo) = &day.elements[0] else {
        panic!("expected image");
    };
    assert_eq!(photo.resource.src, "https://site.test/media/desert.png");
    assert_ne!(photo.resource.id, 0);
    let Element::Video(video) = &day.elements[1] else {
        panic!("expected video");
    };
    assert_eq!(video.resource.src, "https://site.test/media/drive.mp4");
    assert_eq!(video.resource.poster.as_deref(), Some("https://site.test/media/poster.jpg"));
    assert_ne!(video.resource.poster_id, Some(0));

    let json = serde_json::to_value(doc).unwrap();
    assert_eq!(json["pages"][1]["backgroundColor"]["color"], "#000000");
    assert_eq!(json["pages"][0]["elements"][1]["backgroundColor"]["type"], "linear");
}

#[test]
fn archive_without_assets_converts() {
    let zip = zip_of(&[("index.html", b"<h2>Plain</h2><p>No media here.</p>")]);
    let mut env = env();

    let result = convert(zip.path(), &options(env.work.path()), &mut env.store).unwrap();

    assert!(result.asset_errors.is_empty());
    assert_eq!(result.html, "<h2>Plain</h2><p>No media here.</p>");
    let page = &result.document.pages[0];
    assert_eq!(page.id, "page-1");
    assert_eq!(page.elements.len(), 2);
    assert_eq!(fs::read_dir(env.media.path()).unwrap().count(), 0);
}

#[test]
fn fatal_errors_are_classified_and_clean_up() {
    let mut env = env();

    let none = zip_of(&[("assets/a.jpg", b"jpg"), ("notes.txt", b"x")]);
    let err = convert(none.path(), &options(env.work.path()), &mut env.store).unwrap_err();
    assert!(matches!(err, ConversionError::NoHtmlFile));

    let not_zip = NamedTempFile::new().unwrap();
    fs::write(not_zip.path(), b"plain text").unwrap();
    let err = convert(not_zip.path(), &options(env.work.path()), &mut env.store).unwrap_err();
    assert!(matches!(err, ConversionError::InvalidArchive(_)));

    assert_eq!(fs::read_dir(env.work.path()).unwrap().count(), 0);
}
