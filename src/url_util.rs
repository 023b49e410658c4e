//! URL normalization and MIME/type classification (component A).
//!
//! Everything here is pure and synchronous: resolve against a document base,
//! classify by extension, and never panic on malformed input.

use url::Url;

/// Coarse type tag attached to every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    ImageKnown,
    ImageUnknown,
    Svg,
    Pdf,
    Archive,
    Table,
    Unknown,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "avif", "jxl", "tiff", "tif",
];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz"];

/// Normalize a raw URL string found in markup (`src`, `style`, `srcset` entries, ...)
/// against a document base URL.
///
/// Strips surrounding quotes, accepts `data:` URLs verbatim (when `allow_data` is
/// set), and resolves protocol-relative (`//host/path`) and relative forms against
/// `base`. Returns `None` rather than erroring on anything that doesn't resolve to
/// an absolute URL — detectors treat a `None` as "skip this one".
pub fn normalize_url(raw: &str, base: &Url, allow_data: bool) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("data:") {
        if !allow_data {
            return None;
        }
        if !rest.starts_with("image/") {
            return None;
        }
        return Some(trimmed.to_string());
    }

    let resolved = if let Some(rest) = trimmed.strip_prefix("//") {
        Url::parse(&format!("{}://{}", base.scheme(), rest)).ok()
    } else {
        base.join(trimmed).ok()
    }?;

    if resolved.scheme() != "http" && resolved.scheme() != "https" && resolved.scheme() != "data" {
        return None;
    }

    Some(resolved.to_string())
}

/// Idempotence: re-normalizing an already-normalized URL returns the same string.
pub fn is_normalized(raw: &str, base: &Url, allow_data: bool) -> bool {
    normalize_url(raw, base, allow_data).as_deref() == Some(raw)
}

fn extension_of(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    let ext = last_segment.rsplit('.').next()?;
    if ext == last_segment || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Classify a resolved URL (or data URL) by extension/MIME prefix.
pub fn classify_media_type(url: &str) -> MediaType {
    if let Some(rest) = url.strip_prefix("data:") {
        if rest.starts_with("image/svg") {
            return MediaType::Svg;
        }
        if rest.starts_with("image/") {
            return MediaType::ImageKnown;
        }
        return MediaType::Unknown;
    }

    match extension_of(url) {
        Some(ext) if ext == "svg" => MediaType::Svg,
        Some(ext) if ext == "pdf" => MediaType::Pdf,
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => MediaType::ImageKnown,
        Some(ext) if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) => MediaType::Archive,
        Some(_) => MediaType::ImageUnknown,
        None => MediaType::Unknown,
    }
}

/// True if `url` shares a scheme+host+port with `document_url`.
pub fn is_same_origin(url: &str, document_url: &Url) -> bool {
    match Url::parse(url) {
        Ok(u) => {
            u.scheme() == document_url.scheme()
                && u.host_str() == document_url.host_str()
                && u.port_or_known_default() == document_url.port_or_known_default()
        }
        Err(_) => false,
    }
}

/// Parse a `srcset` attribute and select the widest candidate `>= 1200w`, else the
/// largest by descriptor, else the first listed.
pub fn pick_from_srcset(srcset: &str) -> Option<String> {
    let mut best: Option<(String, u32)> = None;
    let mut first: Option<String> = None;

    for entry in srcset.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut parts = entry.split_whitespace();
        let url = parts.next()?.to_string();
        if first.is_none() {
            first = Some(url.clone());
        }
        let descriptor = parts.next().unwrap_or("0w");
        let width: u32 = descriptor
            .trim_end_matches(|c: char| c.is_alphabetic())
            .parse()
            .unwrap_or(0);

        best = match best {
            Some((_, w)) if w >= width => best,
            _ => Some((url, width)),
        };
    }

    if let Some((url, width)) = &best {
        if *width >= 1200 {
            return Some(url.clone());
        }
    }
    best.map(|(url, _)| url).or(first)
}
