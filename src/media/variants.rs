use super::types::{ExtractResult, MediaType, VideoVariant};
use crate::error::AppError;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Preferred quality order, best first. Heights outside this table rank last.
const QUALITY_ORDER: [u64; 5] = [1080, 720, 480, 360, 240];

/// Containers accepted as downloadable video.
const VIDEO_EXTS: [&str; 2] = ["mp4", "webm"];

/// Turns the engine's raw metadata into an ordered, deduplicated
/// [`ExtractResult`].
///
/// An empty variant list is a valid outcome (the post holds a gif, photos,
/// or nothing); only missing metadata is an error.
pub fn resolve_extraction(info: &Value) -> Result<ExtractResult, AppError> {
    if info.is_null() {
        return Err(AppError::Extraction(
            "engine returned no metadata".to_string(),
        ));
    }

    // Thread/playlist-like containers resolve to their first item only.
    let info = first_entry(info);

    let empty = Vec::new();
    let formats = info["formats"].as_array().unwrap_or(&empty);
    let video_formats: Vec<&Value> = formats.iter().filter(|f| is_video_format(f)).collect();

    let media_type = classify(info, &video_formats);
    debug!(?media_type, formats = video_formats.len(), "classified post");

    let variants = rank(dedupe(labeled_variants(&video_formats)));

    Ok(ExtractResult {
        content_id: info["id"].as_str().unwrap_or("video").to_string(),
        title: info["title"].as_str().unwrap_or_default().to_string(),
        uploader: info["uploader"]
            .as_str()
            .or_else(|| info["channel"].as_str())
            .or_else(|| info["uploader_id"].as_str())
            .map(|s| s.to_string()),
        upload_date: info["upload_date"].as_str().map(|s| s.to_string()),
        description: info["description"].as_str().map(|s| s.to_string()),
        media_type,
        variants,
    })
}

fn first_entry(info: &Value) -> &Value {
    match info["entries"].as_array() {
        Some(entries) => entries.iter().find(|e| !e.is_null()).unwrap_or(info),
        None => info,
    }
}

fn is_video_format(format: &Value) -> bool {
    let has_codec = format["vcodec"].as_str().is_some_and(|v| v != "none");
    let ext = format["ext"].as_str().unwrap_or_default();
    has_codec && VIDEO_EXTS.contains(&ext)
}

fn classify(info: &Value, video_formats: &[&Value]) -> MediaType {
    if !video_formats.is_empty() {
        return MediaType::Video;
    }
    let is_gif = info["is_animated_gif"].as_bool().unwrap_or(false)
        || info["animated_gif"].as_bool().unwrap_or(false);
    if is_gif {
        return MediaType::Gif;
    }
    let has_images = info["thumbnails"].as_array().is_some_and(|a| !a.is_empty())
        || info["media_urls"].as_array().is_some_and(|a| !a.is_empty());
    if has_images {
        return MediaType::Photo;
    }
    MediaType::None
}

/// Formats without a known height cannot be labeled and are dropped.
fn labeled_variants(formats: &[&Value]) -> Vec<VideoVariant> {
    formats
        .iter()
        .filter_map(|f| {
            let height = f["height"].as_u64()?;
            let format_id = match &f["format_id"] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(VideoVariant {
                format_id,
                quality_label: format!("{height}p"),
                ext: f["ext"].as_str().unwrap_or("mp4").to_string(),
                filesize: f["filesize"]
                    .as_u64()
                    .or_else(|| f["filesize_approx"].as_u64()),
            })
        })
        .collect()
}

/// Keeps one variant per quality label: the one with the larger known
/// filesize. When both are unknown the first encountered stays.
fn dedupe(variants: Vec<VideoVariant>) -> Vec<VideoVariant> {
    let mut best: HashMap<String, VideoVariant> = HashMap::new();
    for v in variants {
        let replace = match best.get(&v.quality_label) {
            None => true,
            Some(existing) => v.filesize.unwrap_or(0) > existing.filesize.unwrap_or(0),
        };
        if replace {
            best.insert(v.quality_label.clone(), v);
        }
    }
    best.into_values().collect()
}

fn rank(mut variants: Vec<VideoVariant>) -> Vec<VideoVariant> {
    variants.sort_by_key(|v| (order_score(&v.quality_label), std::cmp::Reverse(v.filesize.unwrap_or(0))));
    variants
}

fn order_score(quality_label: &str) -> usize {
    let height: u64 = quality_label
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0);
    QUALITY_ORDER
        .iter()
        .position(|&h| h == height)
        .unwrap_or(QUALITY_ORDER.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video_format(format_id: &str, height: u64, filesize: Option<u64>) -> Value {
        json!({
            "format_id": format_id,
            "vcodec": "h264",
            "ext": "mp4",
            "height": height,
            "filesize": filesize,
        })
    }

    #[test]
    fn test_dedupe_keeps_larger_filesize() {
        let info = json!({
            "id": "1",
            "title": "t",
            "formats": [
                video_format("a", 720, Some(100)),
                video_format("b", 720, Some(200)),
            ],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.variants[0].format_id, "b");
        assert_eq!(result.variants[0].filesize, Some(200));
    }

    #[test]
    fn test_dedupe_unknown_filesize_keeps_first() {
        let info = json!({
            "id": "1",
            "formats": [
                video_format("first", 480, None),
                video_format("second", 480, None),
            ],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.variants[0].format_id, "first");
    }

    #[test]
    fn test_rank_follows_preference_table() {
        let info = json!({
            "id": "1",
            "formats": [
                video_format("a", 360, Some(1)),
                video_format("b", 1080, Some(3)),
                video_format("c", 240, Some(2)),
            ],
        });
        let result = resolve_extraction(&info).unwrap();
        let labels: Vec<&str> = result.variants.iter().map(|v| v.quality_label.as_str()).collect();
        assert_eq!(labels, ["1080p", "360p", "240p"]);
    }

    #[test]
    fn test_unrecognized_heights_rank_last_by_filesize() {
        let info = json!({
            "id": "1",
            "formats": [
                video_format("tiny", 96, Some(10)),
                video_format("odd", 54, Some(50)),
                video_format("hd", 720, Some(5)),
            ],
        });
        let result = resolve_extraction(&info).unwrap();
        let ids: Vec<&str> = result.variants.iter().map(|v| v.format_id.as_str()).collect();
        assert_eq!(ids, ["hd", "odd", "tiny"]);
    }

    #[test]
    fn test_formats_without_height_are_dropped() {
        let info = json!({
            "id": "1",
            "formats": [
                { "format_id": "audio", "vcodec": "h264", "ext": "mp4" },
                video_format("v", 480, Some(7)),
            ],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.variants[0].format_id, "v");
    }

    #[test]
    fn test_audio_only_and_foreign_containers_are_not_video() {
        let info = json!({
            "id": "1",
            "formats": [
                { "format_id": "a", "vcodec": "none", "ext": "mp4", "height": 0 },
                { "format_id": "b", "vcodec": "h264", "ext": "m3u8", "height": 720 },
            ],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.media_type, MediaType::None);
        assert!(result.variants.is_empty());
    }

    #[test]
    fn test_photo_only_post_is_not_an_error() {
        let info = json!({
            "id": "99",
            "title": "pics",
            "thumbnails": [{ "url": "https://pbs.example/1.jpg" }],
            "formats": [],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.media_type, MediaType::Photo);
        assert!(result.variants.is_empty());
    }

    #[test]
    fn test_gif_flag_classifies_gif() {
        let info = json!({
            "id": "7",
            "is_animated_gif": true,
            "thumbnails": [{ "url": "https://pbs.example/1.jpg" }],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.media_type, MediaType::Gif);
    }

    #[test]
    fn test_playlist_resolves_first_entry() {
        let info = json!({
            "id": "thread",
            "entries": [
                null,
                {
                    "id": "42",
                    "title": "first real item",
                    "formats": [video_format("x", 720, Some(9))],
                },
                { "id": "43", "formats": [] },
            ],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.content_id, "42");
        assert_eq!(result.media_type, MediaType::Video);
        assert_eq!(result.variants.len(), 1);
    }

    #[test]
    fn test_null_metadata_is_extraction_failure() {
        let err = resolve_extraction(&Value::Null).unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[test]
    fn test_metadata_fields_carried_over() {
        let info = json!({
            "id": "42",
            "title": "a video",
            "uploader": "someone",
            "upload_date": "20240105",
            "description": "words",
            "formats": [video_format("f", 720, Some(1))],
        });
        let result = resolve_extraction(&info).unwrap();
        assert_eq!(result.content_id, "42");
        assert_eq!(result.title, "a video");
        assert_eq!(result.uploader.as_deref(), Some("someone"));
        assert_eq!(result.upload_date.as_deref(), Some("20240105"));
        assert_eq!(result.description.as_deref(), Some("words"));
    }
}
