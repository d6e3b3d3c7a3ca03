//! Canonical conversions between the three I/O dialects: package (CWL-like),
//! WPS, and OGC API — Processes. See `convert` for the dialect converters and
//! `formats` for MIME/format-IRI and extension resolution.

pub mod convert;
pub mod formats;

pub use convert::{api_to_wps, merge, package_to_wps, wps_to_api, wps_to_package, ConvertError};
pub use formats::{get_extension, mime_to_format_iri};
