use weaver_contracts::io::{ApiIo, IoDirection, IoKind, PackageIo, PackageType, WpsIo, MAX_SIZE_SENTINEL};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConvertError {
    #[error("unsupported package type at {locator}: {detail}")]
    UnsupportedType { locator: String, detail: String },
}

/// Deterministically maps a package-dialect I/O entry to its WPS-dialect
/// equivalent. `direction` only affects whether `mode` is emitted (inputs
/// carry a transmission mode, outputs do not).
pub fn package_to_wps(io: &PackageIo, direction: IoDirection) -> Result<WpsIo, ConvertError> {
    let (kind, data_type, mut allowed, mut formats, max_occurs, mode) = match &io.kind {
        PackageType::Enum { symbols } => (
            IoKind::Literal,
            Some("string".to_string()),
            symbols.iter().cloned().map(serde_json::Value::String).collect(),
            Vec::new(),
            1,
            Some("SIMPLE".to_string()),
        ),
        PackageType::Array { items } => {
            let inner = package_to_wps(&PackageIo::new(io.id.clone(), (**items).clone()), direction)?;
            (inner.kind, inner.data_type, inner.allowed_values, inner.supported_formats, MAX_SIZE_SENTINEL, inner.mode)
        }
        PackageType::File | PackageType::Directory => (
            IoKind::Complex,
            Some(if matches!(io.kind, PackageType::Directory) { "directory".to_string() } else { "file".to_string() }),
            Vec::new(),
            io.format.clone(),
            1,
            if matches!(direction, IoDirection::Input) { Some("SIMPLE".to_string()) } else { None },
        ),
        PackageType::String => (IoKind::Literal, Some("string".to_string()), Vec::new(), Vec::new(), 1, None),
        PackageType::Int => (IoKind::Literal, Some("int".to_string()), Vec::new(), Vec::new(), 1, None),
        PackageType::Long => (IoKind::Literal, Some("long".to_string()), Vec::new(), Vec::new(), 1, None),
        PackageType::Float => (IoKind::Literal, Some("float".to_string()), Vec::new(), Vec::new(), 1, None),
        PackageType::Double => (IoKind::Literal, Some("double".to_string()), Vec::new(), Vec::new(), 1, None),
        PackageType::Boolean => (IoKind::Literal, Some("boolean".to_string()), Vec::new(), Vec::new(), 1, None),
        PackageType::Null | PackageType::Any => (IoKind::Literal, Some("anyValue".to_string()), Vec::new(), Vec::new(), 1, None),
    };

    // Complex I/O must always carry at least one format, defaulting to
    // text/plain, so downstream validation never sees an empty format list.
    if kind == IoKind::Complex && formats.is_empty() {
        formats.push("text/plain".to_string());
    }
    if !io.allowed_values.is_empty() {
        allowed = io.allowed_values.clone();
    }

    Ok(WpsIo {
        identifier: io.id.clone(),
        title: io.label.clone(),
        abstract_: io.doc.clone(),
        kind,
        data_type,
        min_occurs: if io.default.is_some() { 0 } else { 1 },
        max_occurs,
        allowed_values: allowed,
        supported_formats: formats,
        mode,
        keywords: Vec::new(),
        metadata: Default::default(),
    })
}

/// Renames fields to the OGC API — Processes JSON convention and replaces the
/// unbounded sentinel with the literal string `"unbounded"`. Carries every
/// WPS-dialect field the API JSON shape has room for, so `api_to_wps` is a
/// faithful inverse and the `package -> wps -> api -> wps -> package` round
/// trip in Testable Property #4 holds.
pub fn wps_to_api(io: &WpsIo) -> ApiIo {
    ApiIo {
        id: io.identifier.clone(),
        title: io.title.clone(),
        description: io.abstract_.clone(),
        formats: io.supported_formats.clone(),
        min_occurs: io.min_occurs,
        max_occurs: if io.max_occurs == MAX_SIZE_SENTINEL {
            "unbounded".to_string()
        } else {
            io.max_occurs.to_string()
        },
        metadata: io.metadata.clone(),
        kind: io.kind,
        data_type: io.data_type.clone(),
        allowed_values: io.allowed_values.clone(),
        mode: io.mode.clone(),
        keywords: io.keywords.clone(),
    }
}

/// Inverse of `wps_to_api`: parses the `"unbounded"` sentinel back to
/// `MAX_SIZE_SENTINEL` and restores the WPS field names.
pub fn api_to_wps(io: &ApiIo) -> WpsIo {
    WpsIo {
        identifier: io.id.clone(),
        title: io.title.clone(),
        abstract_: io.description.clone(),
        kind: io.kind,
        data_type: io.data_type.clone(),
        min_occurs: io.min_occurs,
        max_occurs: if io.max_occurs == "unbounded" {
            MAX_SIZE_SENTINEL
        } else {
            io.max_occurs.parse().unwrap_or(1)
        },
        allowed_values: io.allowed_values.clone(),
        supported_formats: io.formats.clone(),
        mode: io.mode.clone(),
        keywords: io.keywords.clone(),
        metadata: io.metadata.clone(),
    }
}

/// Inverse of `package_to_wps`: reconstructs the package-dialect type from a
/// WPS-dialect entry. `default` is not recoverable — the dialect only ever
/// carried whether one was present (`min_occurs == 0`), never its value — so
/// this sets a `null` placeholder in that case rather than fabricating one.
pub fn wps_to_package(io: &WpsIo) -> PackageIo {
    let is_enum = io.kind == IoKind::Literal && io.mode.as_deref() == Some("SIMPLE") && !io.allowed_values.is_empty();
    let scalar = if is_enum {
        PackageType::Enum {
            symbols: io.allowed_values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        }
    } else {
        match (io.kind, io.data_type.as_deref()) {
            (IoKind::Complex, Some("directory")) => PackageType::Directory,
            (IoKind::Complex, _) => PackageType::File,
            (_, Some("string")) => PackageType::String,
            (_, Some("int")) => PackageType::Int,
            (_, Some("long")) => PackageType::Long,
            (_, Some("float")) => PackageType::Float,
            (_, Some("double")) => PackageType::Double,
            (_, Some("boolean")) => PackageType::Boolean,
            _ => PackageType::Any,
        }
    };

    let kind = if io.max_occurs == MAX_SIZE_SENTINEL { PackageType::Array { items: Box::new(scalar) } } else { scalar };

    PackageIo {
        id: io.identifier.clone(),
        kind,
        label: io.title.clone(),
        doc: io.abstract_.clone(),
        default: if io.min_occurs == 0 { Some(serde_json::Value::Null) } else { None },
        format: io.supported_formats.clone(),
        allowed_values: if is_enum { Vec::new() } else { io.allowed_values.clone() },
        input_binding: None,
        output_binding: None,
    }
}

/// Reconciles a WPS-declared I/O list against the package-derived one, per
/// spec.md §4.1:
/// - package-derived entries absent from the WPS list are added as-is
/// - WPS-declared entries absent from the package list are dropped
/// - for matched ids, the package-derived `type` wins; user-provided
///   `title`, `abstract`, `metadata`, `keywords`, `allowed_values`,
///   `supported_formats` from the WPS-declared side override only when
///   present (and, for `allowed_values`, only when the declared values are
///   type-compatible with the package-derived `data_type`).
///
/// Operates on the WPS dialect on both sides — the OGC API — Processes JSON
/// dialect (`ApiIo`) has no `allowed_values`/`keywords` fields to carry a
/// user override in, so merging there would silently drop them.
pub fn merge(wps_declared: &[WpsIo], cwl_derived: &[PackageIo], direction: IoDirection) -> Result<Vec<WpsIo>, ConvertError> {
    let mut out = Vec::with_capacity(cwl_derived.len());
    for pkg_io in cwl_derived {
        let derived = package_to_wps(pkg_io, direction)?;
        match wps_declared.iter().find(|w| w.identifier == pkg_io.id) {
            None => out.push(derived),
            Some(declared) => {
                let mut merged = derived;
                if declared.title.is_some() {
                    merged.title = declared.title.clone();
                }
                if declared.abstract_.is_some() {
                    merged.abstract_ = declared.abstract_.clone();
                }
                if !declared.keywords.is_empty() {
                    merged.keywords = declared.keywords.clone();
                }
                if !declared.metadata.is_empty() {
                    merged.metadata = declared.metadata.clone();
                }
                if !declared.supported_formats.is_empty() {
                    merged.supported_formats = declared.supported_formats.clone();
                }
                if !declared.allowed_values.is_empty() && declared.data_type == merged.data_type {
                    merged.allowed_values = declared.allowed_values.clone();
                }
                out.push(merged);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_contracts::io::PackageIo;

    #[test]
    fn array_type_gets_unbounded_max_occurs() {
        let io = PackageIo::new("files", PackageType::Array { items: Box::new(PackageType::File) });
        let wps = package_to_wps(&io, IoDirection::Input).unwrap();
        assert_eq!(wps.max_occurs, MAX_SIZE_SENTINEL);
        assert_eq!(wps.kind, IoKind::Complex);
    }

    #[test]
    fn file_without_format_defaults_to_text_plain() {
        let io = PackageIo::new("f", PackageType::File);
        let wps = package_to_wps(&io, IoDirection::Input).unwrap();
        assert_eq!(wps.supported_formats, vec!["text/plain".to_string()]);
    }

    #[test]
    fn enum_produces_literal_with_allowed_values_and_simple_mode() {
        let io = PackageIo::new(
            "choice",
            PackageType::Enum { symbols: vec!["a".into(), "b".into()] },
        );
        let wps = package_to_wps(&io, IoDirection::Input).unwrap();
        assert_eq!(wps.kind, IoKind::Literal);
        assert_eq!(wps.mode.as_deref(), Some("SIMPLE"));
        assert_eq!(wps.allowed_values.len(), 2);
    }

    #[test]
    fn wps_to_api_renames_unbounded_sentinel() {
        let io = PackageIo::new("files", PackageType::Array { items: Box::new(PackageType::File) });
        let wps = package_to_wps(&io, IoDirection::Input).unwrap();
        let api = wps_to_api(&wps);
        assert_eq!(api.max_occurs, "unbounded");
        assert_eq!(api.id, "files");
    }

    #[test]
    fn merge_is_identity_when_declared_equals_derived() {
        let io = PackageIo::new("x", PackageType::String);
        let derived = vec![io.clone()];
        let declared = vec![package_to_wps(&io, IoDirection::Input).unwrap()];
        let merged = merge(&declared, &derived, IoDirection::Input).unwrap();
        assert_eq!(merged, declared);
    }

    #[test]
    fn merge_drops_wps_only_entries_and_adds_cwl_only_entries() {
        let cwl = vec![PackageIo::new("kept", PackageType::String)];
        let wps_declared = vec![WpsIo {
            identifier: "dropped".to_string(),
            title: None,
            abstract_: None,
            kind: IoKind::Literal,
            data_type: Some("string".to_string()),
            min_occurs: 1,
            max_occurs: 1,
            allowed_values: Vec::new(),
            supported_formats: Vec::new(),
            mode: None,
            keywords: Vec::new(),
            metadata: Default::default(),
        }];
        let merged = merge(&wps_declared, &cwl, IoDirection::Input).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].identifier, "kept");
    }

    #[test]
    fn merge_overrides_allowed_values_only_when_type_compatible() {
        let cwl = vec![PackageIo::new("choice", PackageType::String)];
        let mut declared = package_to_wps(&cwl[0], IoDirection::Input).unwrap();
        declared.allowed_values = vec![serde_json::json!("good")];
        let merged = merge(&[declared], &cwl, IoDirection::Input).unwrap();
        assert_eq!(merged[0].allowed_values, vec![serde_json::json!("good")]);
    }

    #[test]
    fn merge_ignores_allowed_values_override_when_type_mismatches() {
        let cwl = vec![PackageIo::new("choice", PackageType::String)];
        let mut declared = package_to_wps(&cwl[0], IoDirection::Input).unwrap();
        declared.data_type = Some("int".to_string());
        declared.allowed_values = vec![serde_json::json!(1)];
        let merged = merge(&[declared], &cwl, IoDirection::Input).unwrap();
        assert!(merged[0].allowed_values.is_empty());
    }

    #[test]
    fn merge_overrides_keywords_when_present() {
        let cwl = vec![PackageIo::new("x", PackageType::String)];
        let mut declared = package_to_wps(&cwl[0], IoDirection::Input).unwrap();
        declared.keywords = vec!["geo".to_string()];
        let merged = merge(&[declared], &cwl, IoDirection::Input).unwrap();
        assert_eq!(merged[0].keywords, vec!["geo".to_string()]);
    }

    /// Testable Property #4: `package -> wps -> api -> wps -> package` is
    /// identity modulo field ordering. Complex-typed cases are given an
    /// explicit format up front, since the text/plain default-fill (§4.1) is
    /// a one-way enrichment, not something the round trip is expected to undo.
    #[test]
    fn full_dialect_round_trip_is_identity() {
        let mut file_io = PackageIo::new("f", PackageType::File);
        file_io.format = vec!["text/plain".to_string()];
        let mut dir_io = PackageIo::new("d", PackageType::Directory);
        dir_io.format = vec!["text/plain".to_string()];
        let mut files_io = PackageIo::new("files", PackageType::Array { items: Box::new(PackageType::File) });
        files_io.format = vec!["text/plain".to_string()];

        let cases = vec![
            PackageIo::new("s", PackageType::String),
            PackageIo::new("i", PackageType::Int),
            PackageIo::new("b", PackageType::Boolean),
            file_io,
            dir_io,
            files_io,
            PackageIo::new("choice", PackageType::Enum { symbols: vec!["a".to_string(), "b".to_string()] }),
        ];

        for original in cases {
            let wps1 = package_to_wps(&original, IoDirection::Input).unwrap();
            let api = wps_to_api(&wps1);
            let wps2 = api_to_wps(&api);
            let round_tripped = wps_to_package(&wps2);
            assert_eq!(round_tripped, original, "round trip mismatch for input `{}`", original.id);
        }
    }
}
