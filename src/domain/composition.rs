//! Composition descriptors and the render kinds they can produce.
//!
//! Descriptors are owned by whatever registry supplies them; the render core
//! only reads them to validate input props and to pass dimensions on to the
//! engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::DomainError;

const MAX_COMPOSITION_ID_LEN: usize = 128;

/// The kind of artifact a render produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionKind {
    Still,
    Video,
}

impl CompositionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CompositionKind::Still => "still",
            CompositionKind::Video => "video",
        }
    }

    /// File extension (without the dot) of artifacts of this kind.
    pub fn extension(self) -> &'static str {
        match self {
            CompositionKind::Still => "png",
            CompositionKind::Video => "mp4",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(CompositionKind::Still),
            "mp4" => Some(CompositionKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for CompositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video codecs the engine is asked to encode with. Both land in an MP4 container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    H264,
    H265,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::H264 => "h264",
            Codec::H265 => "h265",
        }
    }
}

impl FromStr for Codec {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "h264" => Ok(Codec::H264),
            "h265" | "hevc" => Ok(Codec::H265),
            other => Err(DomainError::validation(format!(
                "unsupported codec `{other}` (expected h264 or h265)"
            ))),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type a schema entry accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionDescriptor {
    pub id: String,
    pub kind: CompositionKind,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_duration")]
    pub duration_in_frames: u32,
    #[serde(default)]
    pub schema: BTreeMap<String, ParamSpec>,
    #[serde(default)]
    pub default_props: Map<String, Value>,
}

fn default_fps() -> u32 {
    30
}

fn default_duration() -> u32 {
    1
}

impl CompositionDescriptor {
    /// Overlay `input` on the default props. Keys in `input` win; the merge is shallow.
    pub fn merge_props(&self, input: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.default_props.clone();
        for (key, value) in input {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Check `props` against the parameter schema, collecting every violation.
    pub fn check_props(&self, props: &Map<String, Value>) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        for (name, spec) in &self.schema {
            match props.get(name) {
                Some(value) if !spec.param_type.matches(value) => problems.push(format!(
                    "`{name}` must be of type {}",
                    spec.param_type.as_str()
                )),
                Some(_) => {}
                None if spec.required => problems.push(format!("`{name}` is required")),
                None => {}
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Reject composition identifiers that cannot safely become a filename prefix.
pub fn validate_composition_id(id: &str) -> Result<(), DomainError> {
    if id.trim().is_empty() {
        return Err(DomainError::validation("compositionId must not be empty"));
    }
    if id.len() > MAX_COMPOSITION_ID_LEN {
        return Err(DomainError::validation(format!(
            "compositionId exceeds {MAX_COMPOSITION_ID_LEN} bytes"
        )));
    }
    if id.starts_with('.')
        || id.contains("..")
        || id
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch.is_control())
    {
        return Err(DomainError::validation(format!(
            "compositionId `{id}` contains forbidden characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> CompositionDescriptor {
        serde_json::from_value(json!({
            "id": "Intro",
            "kind": "still",
            "width": 1280,
            "height": 720,
            "schema": {
                "title": { "type": "string", "required": true },
                "count": { "type": "integer" }
            },
            "defaultProps": { "title": "Hello" }
        }))
        .expect("valid descriptor")
    }

    #[test]
    fn merge_prefers_input_props() {
        let descriptor = descriptor();
        let input = json!({ "title": "Custom", "extra": true });
        let merged = descriptor.merge_props(input.as_object().expect("object"));
        assert_eq!(merged["title"], "Custom");
        assert_eq!(merged["extra"], true);
    }

    #[test]
    fn check_props_reports_type_and_presence() {
        let descriptor = descriptor();
        let bad = json!({ "count": 1.5 });
        let problems = descriptor
            .check_props(bad.as_object().expect("object"))
            .expect_err("should fail");
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("`title` is required")));
        assert!(problems.iter().any(|p| p.contains("`count` must be of type integer")));

        let merged = descriptor.merge_props(&Map::new());
        assert!(descriptor.check_props(&merged).is_ok());
    }

    #[test]
    fn descriptor_defaults_fill_timing() {
        let descriptor = descriptor();
        assert_eq!(descriptor.fps, 30);
        assert_eq!(descriptor.duration_in_frames, 1);
    }

    #[test]
    fn codec_parsing_accepts_known_names() {
        assert_eq!("H264".parse::<Codec>(), Ok(Codec::H264));
        assert_eq!("hevc".parse::<Codec>(), Ok(Codec::H265));
        assert!("vp9".parse::<Codec>().is_err());
    }

    #[test]
    fn kind_extension_round_trip() {
        assert_eq!(CompositionKind::from_extension("PNG"), Some(CompositionKind::Still));
        assert_eq!(CompositionKind::Video.extension(), "mp4");
        assert_eq!(CompositionKind::from_extension("webm"), None);
    }

    #[test]
    fn composition_ids_are_filename_safe() {
        assert!(validate_composition_id("Intro").is_ok());
        assert!(validate_composition_id("lower_third-v2").is_ok());
        assert!(validate_composition_id("").is_err());
        assert!(validate_composition_id("../etc").is_err());
        assert!(validate_composition_id("a/b").is_err());
        assert!(validate_composition_id(".hidden").is_err());
    }
}
