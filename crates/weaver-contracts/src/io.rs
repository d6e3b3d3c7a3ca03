use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;
use std::collections::HashMap;
use std::fmt;

/// Sentinel used by the package dialect for an unbounded array/maxOccurs.
/// The WPS dialect carries this literal integer; the API dialect renders it
/// as the string `"unbounded"`.
pub const MAX_SIZE_SENTINEL: u32 = u32::MAX;

/// The base scalar/complex types a package description may declare for an
/// input or output, per the package I/O dialect.
///
/// The wire shape is CWL's, not an internally-tagged enum: a bare scalar
/// string (`"string"`, `"File"`, `"Directory"`, ...), an array suffix
/// (`"File[]"`), or a map (`{type: array, items: "File"}` / `{type: enum,
/// symbols: [...]}`) — so `Serialize`/`Deserialize` are hand-written below
/// rather than derived.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Null,
    Any,
    File,
    Directory,
    Array { items: Box<PackageType> },
    Enum { symbols: Vec<String> },
}

impl PackageType {
    /// True for the complex (file-like) sentinels that require a format list.
    pub fn is_complex(&self) -> bool {
        matches!(self, PackageType::File | PackageType::Directory)
    }

    /// The bare scalar spelling for every variant except `Array`/`Enum`,
    /// which have no single-string representation. CWL's own capitalization
    /// is preserved for `File`/`Directory`.
    fn scalar_name(&self) -> Option<&'static str> {
        match self {
            PackageType::String => Some("string"),
            PackageType::Int => Some("int"),
            PackageType::Long => Some("long"),
            PackageType::Float => Some("float"),
            PackageType::Double => Some("double"),
            PackageType::Boolean => Some("boolean"),
            PackageType::Null => Some("null"),
            PackageType::Any => Some("Any"),
            PackageType::File => Some("File"),
            PackageType::Directory => Some("Directory"),
            PackageType::Array { .. } | PackageType::Enum { .. } => None,
        }
    }

    /// The string a scalar or `"T[]"` array type round-trips through; `None`
    /// only for an `Enum`, which has no string form.
    fn type_string(&self) -> Option<String> {
        match self {
            PackageType::Array { items } => items.type_string().map(|inner| format!("{inner}[]")),
            other => other.scalar_name().map(str::to_string),
        }
    }

    /// Parses a bare scalar (`"string"`, `"File"`) or an array suffix
    /// (`"File[]"`), the two string-shaped forms the package dialect allows.
    fn parse_type_str(s: &str) -> Result<PackageType, String> {
        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(PackageType::Array { items: Box::new(Self::parse_type_str(inner)?) });
        }
        match s {
            "string" => Ok(PackageType::String),
            "int" => Ok(PackageType::Int),
            "long" => Ok(PackageType::Long),
            "float" => Ok(PackageType::Float),
            "double" => Ok(PackageType::Double),
            "boolean" => Ok(PackageType::Boolean),
            "null" => Ok(PackageType::Null),
            "Any" => Ok(PackageType::Any),
            "File" => Ok(PackageType::File),
            "Directory" => Ok(PackageType::Directory),
            other => Err(format!("unknown package I/O type: {other}")),
        }
    }
}

impl Serialize for PackageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PackageType::Enum { symbols } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "enum")?;
                map.serialize_entry("symbols", symbols)?;
                map.end()
            }
            other => match other.type_string() {
                Some(s) => serializer.serialize_str(&s),
                None => unreachable!("every non-Enum PackageType has a string form"),
            },
        }
    }
}

impl<'de> Deserialize<'de> for PackageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PackageTypeVisitor;

        impl<'de> Visitor<'de> for PackageTypeVisitor {
            type Value = PackageType;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(
                    "a package I/O type: a bare scalar (\"string\", \"File\", ...), an array suffix (\"File[]\"), \
                     or a {type: array, items: \"T\"} / {type: enum, symbols: [...]} map",
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                PackageType::parse_type_str(v).map_err(de::Error::custom)
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut type_field: Option<String> = None;
                let mut items: Option<String> = None;
                let mut symbols: Option<Vec<String>> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "type" => type_field = Some(map.next_value()?),
                        "items" => items = Some(map.next_value()?),
                        "symbols" => symbols = Some(map.next_value()?),
                        _ => {
                            let _: de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                let type_field = type_field.ok_or_else(|| de::Error::missing_field("type"))?;

                match type_field.as_str() {
                    "array" => {
                        let items = items.ok_or_else(|| de::Error::missing_field("items"))?;
                        let inner = PackageType::parse_type_str(&items).map_err(de::Error::custom)?;
                        Ok(PackageType::Array { items: Box::new(inner) })
                    }
                    "enum" => {
                        let symbols = symbols.ok_or_else(|| de::Error::missing_field("symbols"))?;
                        Ok(PackageType::Enum { symbols })
                    }
                    other => PackageType::parse_type_str(other).map_err(de::Error::custom),
                }
            }
        }

        deserializer.deserialize_any(PackageTypeVisitor)
    }
}

/// How a command-line tool input is rendered onto its `baseCommand`, per the
/// package dialect's `inputBinding` clause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InputBinding {
    /// Sort key among an application's inputs; ties break on declaration order.
    pub position: Option<i32>,
    /// A named flag (`--input-file`) prepended before the value; positional
    /// when absent.
    pub prefix: Option<String>,
}

/// Where a command-line tool output is discovered after the process exits,
/// per the package dialect's `outputBinding` clause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OutputBinding {
    /// A glob pattern, relative to the step's working directory.
    pub glob: Option<String>,
}

/// One input or output entry as declared by a package description (CWL-like).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PackageIo {
    pub id: String,
    /// A bare scalar (`"string"`, `"File"`, ...), an array suffix
    /// (`"File[]"`), or a `{type, items}` / `{type, symbols}` map — see
    /// `PackageType`'s hand-written `Deserialize`.
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub kind: PackageType,
    pub label: Option<String>,
    pub doc: Option<String>,
    pub default: Option<serde_json::Value>,
    /// MIME types this I/O accepts/produces; only meaningful for complex types.
    pub format: Vec<String>,
    pub allowed_values: Vec<serde_json::Value>,
    #[serde(default)]
    pub input_binding: Option<InputBinding>,
    #[serde(default)]
    pub output_binding: Option<OutputBinding>,
}

impl PackageIo {
    pub fn new(id: impl Into<String>, kind: PackageType) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            doc: None,
            default: None,
            format: Vec::new(),
            allowed_values: Vec::new(),
            input_binding: None,
            output_binding: None,
        }
    }
}

/// Whether an `Io` instance is being interpreted as a process input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IoDirection {
    Input,
    Output,
}

/// Discriminant for the three WPS I/O shapes (`LiteralInput`, `ComplexInput`,
/// `BoundingBoxInput`, and their output counterparts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IoKind {
    Literal,
    Complex,
    BoundingBox,
}

/// The value carried by a realized input or output: exactly one of `href` or
/// `value` is set per the data model invariant (`data` may be a JSON array of
/// such entries, handled one level up by the caller).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IoValue {
    Href {
        href: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Value {
        value: serde_json::Value,
    },
}

impl IoValue {
    pub fn href(&self) -> Option<&str> {
        match self {
            IoValue::Href { href, .. } => Some(href),
            IoValue::Value { .. } => None,
        }
    }
}

/// A realized I/O entry: an id paired with its value, as threaded through
/// staging and the remote process adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoEntry {
    pub id: String,
    #[serde(flatten)]
    pub value: IoValue,
}

/// Declared WPS-dialect I/O metadata, independent of any realized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WpsIo {
    pub identifier: String,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_: Option<String>,
    pub kind: IoKind,
    pub data_type: Option<String>,
    pub min_occurs: u32,
    pub max_occurs: u32,
    pub allowed_values: Vec<serde_json::Value>,
    pub supported_formats: Vec<String>,
    pub mode: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// OGC API — Processes JSON I/O description. Carries the same fields as
/// `WpsIo` (so `wps_to_api`/`api_to_wps` is a lossless round trip modulo
/// field-ordering) under the API dialect's JSON conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiIo {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub formats: Vec<String>,
    pub min_occurs: u32,
    /// `"unbounded"` or a decimal string, per the dialect's JSON convention.
    pub max_occurs: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default = "default_api_io_kind")]
    pub kind: IoKind,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub allowed_values: Vec<serde_json::Value>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_api_io_kind() -> IoKind {
    IoKind::Literal
}
