//! Pure string transforms over source addresses.
//!
//! Nothing in here performs I/O. Addresses are treated as opaque strings split
//! into `base` (scheme, authority, path), query and fragment; parsing through
//! `url::Url` is only used to read the scheme, because re-serialising a parsed
//! URL would normalise parts of the address the caller handed us.

use url::Url;

/// Extension appended to extension-less addresses for adaptive delivery
pub const ADAPTIVE_MANIFEST_EXTENSION: &str = "m3u8";

const TRANSPORT_STREAM_OUTPUTS: &[&str] = &["ts", "mpegts"];

/// Single-file formats the native path can play without a manifest
pub const PROGRESSIVE_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mkv", "webm", "mov", "avi", "mp3", "aac", "ogg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AddressParts<'a> {
    base: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> AddressParts<'a> {
    fn split(address: &'a str) -> Self {
        let (rest, fragment) = match address.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (address, None),
        };
        let (base, query) = match rest.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (rest, None),
        };
        Self { base, query, fragment }
    }

    fn join(base: &str, query: Option<&str>, fragment: Option<&str>) -> String {
        let mut out = String::with_capacity(base.len() + 16);
        out.push_str(base);
        if let Some(query) = query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }

    /// Path portion after the authority, if any
    fn path(&self) -> Option<&'a str> {
        let after_scheme = match self.base.find("://") {
            Some(pos) => &self.base[pos + 3..],
            None => self.base,
        };
        after_scheme.find('/').map(|pos| &after_scheme[pos..])
    }

    fn last_segment(&self) -> Option<&'a str> {
        self.path()
            .and_then(|path| path.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
    }
}

fn extension_of(segment: &str) -> Option<&str> {
    let (stem, ext) = segment.rsplit_once('.')?;
    let plausible = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= 5
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then_some(ext)
}

/// Lower-cased file extension of the address' last path segment
pub fn file_extension(address: &str) -> Option<String> {
    AddressParts::split(address.trim())
        .last_segment()
        .and_then(extension_of)
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_progressive_file(address: &str) -> bool {
    file_extension(address)
        .map(|ext| PROGRESSIVE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Address uses plain `http` and would be blocked by a secure-only host
pub fn is_insecure(address: &str) -> bool {
    Url::parse(address.trim())
        .map(|url| url.scheme().eq_ignore_ascii_case("http"))
        .unwrap_or(false)
}

/// Rewrite a transport-stream output marker into the adaptive-segment one.
///
/// Two markers are recognised: an `output=ts` / `output=mpegts` query
/// parameter, and a `.ts` last segment under a `/live/` path.
pub fn normalize_transport_marker(address: &str) -> String {
    let trimmed = address.trim();
    let parts = AddressParts::split(trimmed);

    let query = parts.query.map(|query| {
        query
            .split('&')
            .map(|param| match param.split_once('=') {
                Some((key, value))
                    if key.eq_ignore_ascii_case("output")
                        && TRANSPORT_STREAM_OUTPUTS
                            .iter()
                            .any(|marker| value.eq_ignore_ascii_case(marker)) =>
                {
                    format!("{}={}", key, ADAPTIVE_MANIFEST_EXTENSION)
                }
                _ => param.to_string(),
            })
            .collect::<Vec<_>>()
            .join("&")
    });

    let base = match (parts.path(), parts.last_segment()) {
        (Some(path), Some(segment))
            if path.contains("/live/")
                && extension_of(segment).is_some_and(|ext| ext.eq_ignore_ascii_case("ts")) =>
        {
            let stem_len = parts.base.len() - "ts".len();
            format!("{}{}", &parts.base[..stem_len], ADAPTIVE_MANIFEST_EXTENSION)
        }
        _ => parts.base.to_string(),
    };

    AddressParts::join(&base, query.as_deref(), parts.fragment)
}

/// Append the manifest extension when the address has neither an extension
/// nor a query component
pub fn ensure_manifest_extension(address: &str) -> String {
    let trimmed = address.trim();
    let parts = AddressParts::split(trimmed);

    let needs_extension = parts.query.is_none()
        && parts
            .last_segment()
            .map(|segment| extension_of(segment).is_none())
            .unwrap_or(false);

    if !needs_extension {
        return trimmed.to_string();
    }

    let base = format!("{}.{}", parts.base, ADAPTIVE_MANIFEST_EXTENSION);
    AddressParts::join(&base, None, parts.fragment)
}

/// Full adaptive normalisation: transport marker, then manifest extension
pub fn normalize_adaptive(address: &str) -> String {
    ensure_manifest_extension(&normalize_transport_marker(address))
}

/// Place `address` inside a relay template.
///
/// `{url}` receives the percent-encoded address and `{raw}` the address as
/// is; a template with neither gets the encoded address appended.
pub fn wrap_in_relay(template: &str, address: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(address.as_bytes()).collect();

    if template.contains("{url}") {
        template.replace("{url}", &encoded)
    } else if template.contains("{raw}") {
        template.replace("{raw}", address)
    } else {
        format!("{}{}", template, encoded)
    }
}
