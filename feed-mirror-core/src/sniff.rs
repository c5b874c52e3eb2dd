//! Content sniffing: choose a file extension from the leading bytes of a
//! download, falling back to the suffixes of the source URL.
//!
//! Servers regularly mislabel feeds (gzip served as `text/xml`, XML behind an
//! extension-less path), so the bytes win over anything the URL claims.

use url::Url;

/// Number of leading bytes needed to recognise every supported signature.
pub const SNIFF_LEN: usize = 5;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const XML_DECLARATION: &[u8] = b"<?xml";

pub const GZIP_XML_EXTENSION: &str = ".xml.gz";
pub const XML_EXTENSION: &str = ".xml";
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Returns the canonical extension (with leading dot) for a downloaded file.
pub fn detect_extension(prefix: &[u8], url: &str) -> String {
    if prefix.starts_with(&GZIP_MAGIC) {
        return GZIP_XML_EXTENSION.to_string();
    }
    if prefix.starts_with(XML_DECLARATION) {
        return XML_EXTENSION.to_string();
    }
    url_suffixes(url).unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// All dot-suffixes of the last path segment, e.g. `.tar.gz` for
/// `/files/archive.tar.gz`. Query strings and fragments are ignored.
pub fn url_suffixes(url: &str) -> Option<String> {
    let name = last_path_segment(url)?;
    // A leading dot marks a hidden file, not an extension.
    let name = name.trim_start_matches('.');
    let (_, suffixes) = name.split_once('.')?;
    let parts: Vec<&str> = suffixes.split('.').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().map(|p| format!(".{p}")).collect())
}

/// Last non-empty segment of the URL path, or `None` for bare hosts.
pub fn last_path_segment(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Not an absolute URL; treat it as a bare path.
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}
