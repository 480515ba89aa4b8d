/// What kind of media a resolved post carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Gif,
    Photo,
    None,
}

/// One downloadable encoding of a post's video.
///
/// `format_id` is opaque to us; only the extraction engine interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct VideoVariant {
    pub format_id: String,
    /// Derived from vertical resolution, e.g. "720p".
    pub quality_label: String,
    pub ext: String,
    pub filesize: Option<u64>,
}

/// Resolved metadata for one post. Constructed per resolution call, never
/// mutated or persisted.
#[derive(Debug)]
#[allow(dead_code)]
pub struct ExtractResult {
    pub content_id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
    pub media_type: MediaType,
    /// At most one variant per quality label, best first.
    pub variants: Vec<VideoVariant>,
}
