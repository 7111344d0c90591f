//! Design document model exchanged with the canvas engine.
//!
//! A [`Document`] is a value snapshot of what the engine holds at one point in
//! time. The coordinator never edits one in place: it reads a fresh export or
//! hands a whole document to import. Fields the coordinator does not care
//! about are kept in `extra` maps so export -> store -> import is lossless.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Name shown for documents that have never been given one.
pub const UNTITLED: &str = "Untitled design";

/// Full structured representation of a design.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<SmolStr>,

    /// Objects in paint order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub objects: Vec<DesignObject>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<Frame>,

    /// Engine-defined background descriptor (colour string or object).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn with_frame(width: f64, height: f64) -> Self {
        Self {
            frame: Some(Frame {
                width,
                height,
                extra: Map::new(),
            }),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// True when there is at least one object worth persisting.
    pub fn has_objects(&self) -> bool {
        !self.objects.is_empty()
    }

    pub fn text_objects(&self) -> impl Iterator<Item = &DesignObject> {
        self.objects.iter().filter(|o| o.kind.is_text_bearing())
    }

    /// Name for titles and download file names.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNTITLED,
        }
    }

    /// File name offered when the document is downloaded as JSON.
    pub fn download_file_name(&self) -> String {
        format!("{}.json", self.display_name())
    }
}

/// Canvas frame size. Accepts the short `w`/`h` spelling on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(alias = "w")]
    pub width: f64,
    #[serde(alias = "h")]
    pub height: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One object on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignObject {
    #[serde(rename = "type")]
    pub kind: ObjectKind,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMetadata,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DesignObject {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            metadata: ObjectMetadata::default(),
            extra: Map::new(),
        }
    }

    /// Text object rendered with a web font.
    pub fn text(family: &str, font_url: &str) -> Self {
        let mut object = Self::new(ObjectKind::StaticText);
        object.metadata.font_family = Some(family.into());
        object.metadata.font_url = Some(font_url.to_string());
        object
    }

    /// Attach preview parameter names.
    pub fn with_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<SmolStr>,
    {
        self.metadata.keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-object metadata the coordinator reads. Everything else rides in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(rename = "fontFamily", default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<SmolStr>,

    #[serde(rename = "fontURL", default, skip_serializing_if = "Option::is_none")]
    pub font_url: Option<String>,

    /// Preview parameter names this object is templated on.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub keys: Vec<SmolStr>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Engines write `null` where a collection or mapping is empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Engine object type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "SmolStr", into = "SmolStr")]
pub enum ObjectKind {
    StaticText,
    DynamicText,
    StaticImage,
    StaticVector,
    StaticPath,
    Group,
    Background,
    /// Any tag this crate has no special handling for.
    Other(SmolStr),
}

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::StaticText => "StaticText",
            Self::DynamicText => "DynamicText",
            Self::StaticImage => "StaticImage",
            Self::StaticVector => "StaticVector",
            Self::StaticPath => "StaticPath",
            Self::Group => "Group",
            Self::Background => "Background",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Text-bearing objects reference fonts that must load before import.
    pub fn is_text_bearing(&self) -> bool {
        matches!(self, Self::StaticText | Self::DynamicText)
    }
}

impl From<SmolStr> for ObjectKind {
    fn from(tag: SmolStr) -> Self {
        match tag.as_str() {
            "StaticText" => Self::StaticText,
            "DynamicText" => Self::DynamicText,
            "StaticImage" => Self::StaticImage,
            "StaticVector" => Self::StaticVector,
            "StaticPath" => Self::StaticPath,
            "Group" => Self::Group,
            "Background" => Self::Background,
            _ => Self::Other(tag),
        }
    }
}

impl From<ObjectKind> for SmolStr {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Other(tag) => tag,
            known => SmolStr::new(known.as_str()),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
