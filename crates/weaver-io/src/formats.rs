use std::collections::HashMap;
use std::sync::OnceLock;

/// EDAM ontology fallback for scientific formats the IANA registry doesn't
/// usefully cover, pinned from the original implementation's `EDAM_MAPPING`.
fn edam_mapping() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        HashMap::from([
            ("application/x-hdf5", "http://edamontology.org/format_3590"),
            ("application/json", "http://edamontology.org/format_3464"),
            ("application/x-netcdf", "http://edamontology.org/format_3650"),
            ("text/plain", "http://edamontology.org/format_1964"),
        ])
    })
}

fn extension_mapping() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| {
        HashMap::from([
            ("application/x-netcdf", "nc"),
            ("application/x-hdf5", "hdf5"),
            ("text/plain", "*"),
        ])
    })
}

/// Resolves a MIME type to a format IRI: IANA media-types reference first
/// (when network lookups are enabled), falling back to the EDAM ontology
/// mapping for the handful of scientific formats IANA doesn't register.
/// Returns `None` when neither source recognizes the MIME type.
pub async fn mime_to_format_iri(
    client: &reqwest::Client,
    mime: &str,
    allow_network: bool,
) -> Option<String> {
    let clean = clean_mime_type(mime);
    if allow_network {
        let url = format!("https://www.iana.org/assignments/media-types/{clean}");
        if let Ok(resp) = client.head(&url).send().await {
            if resp.status().is_success() {
                return Some(url);
            }
        }
    }
    edam_mapping().get(clean.as_str()).map(|s| s.to_string())
}

/// Strips any namespace prefix a caller may have attached to a MIME type
/// (e.g. `iana:application/json` -> `application/json`).
pub fn clean_mime_type(mime: &str) -> String {
    mime.rsplit(':').next().unwrap_or(mime).to_string()
}

/// Maps a MIME type to the file extension that staging should use when it
/// can't otherwise infer one from a URL path, pinned from
/// `CONTENT_TYPE_EXTENSION_MAPPING`. `"*"` means "accept any extension" (used
/// for `text/plain`, which is also the complex-I/O default format).
pub fn get_extension(mime: &str) -> String {
    let clean = clean_mime_type(mime);
    if let Some(ext) = extension_mapping().get(clean.as_str()) {
        return ext.to_string();
    }
    clean.rsplit('/').next().unwrap_or("bin").to_string()
}
