//! Remote documents and the flattened state derived from them
//!
//! Remote documents (`CompositionDoc`, `LayerDoc`, `ClipDoc`) are decoded
//! leniently: malformed parts degrade to absent values or unrecognized nodes
//! instead of failing the whole document. Derived state (`LayerState`,
//! `ClipSlot`, `AggregatedUpdate`) is what consumers read.

use crate::value::{unwrap_envelope, Param};
use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque identifier assigned by the remote system
///
/// The remote usually sends numbers; strings are accepted too. Either way the
/// identifier is kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

/// Layer identifier
pub type LayerId = ResourceId;

/// Clip identifier
pub type ClipId = ResourceId;

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        ResourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        ResourceId(id.to_string())
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => Ok(ResourceId(n.to_string())),
            Value::String(s) if !s.trim().is_empty() => Ok(ResourceId(s)),
            other => Err(de::Error::custom(format!(
                "expected numeric or string identifier, got {}",
                other
            ))),
        }
    }
}

/// Layer identifier → display name, in discovery order
///
/// Names carry the group ancestry: `"GroupA - GroupB - LayerName"`.
pub type LayerMap = IndexMap<LayerId, String>;

// ============================================================================
// Remote documents
// ============================================================================

/// Root document of `GET /composition`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompositionDoc {
    #[serde(default)]
    pub name: Param<String>,
    #[serde(default, deserialize_with = "deserialize_nodes")]
    pub layers: Vec<Node>,
    #[serde(default, deserialize_with = "deserialize_nodes")]
    pub layergroups: Vec<Node>,
}

/// One node of the composition tree
///
/// The remote does not tag node kinds. A node with a `clips` list is a layer;
/// otherwise a node with `layers` or `layergroups` is a group; anything else
/// is unrecognized and skipped by the walker.
#[derive(Debug, Clone)]
pub enum Node {
    Layer(LayerNode),
    Group(GroupNode),
    Unrecognized,
}

#[derive(Debug, Clone, Default)]
pub struct LayerNode {
    pub id: Param<LayerId>,
    pub name: Param<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupNode {
    pub name: Param<String>,
    pub layers: Vec<Node>,
    pub layergroups: Vec<Node>,
}

impl Node {
    pub fn from_value(value: &Value) -> Node {
        let Some(obj) = value.as_object() else {
            return Node::Unrecognized;
        };

        if obj.contains_key("clips") {
            Node::Layer(LayerNode {
                id: Param::from_json(obj.get("id")),
                name: Param::from_json(obj.get("name")),
            })
        } else if obj.contains_key("layers") || obj.contains_key("layergroups") {
            Node::Group(GroupNode {
                name: Param::from_json(obj.get("name")),
                layers: node_list(obj.get("layers")),
                layergroups: node_list(obj.get("layergroups")),
            })
        } else {
            Node::Unrecognized
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Node::from_value(&raw))
    }
}

/// Node list, bare or inside a `value` envelope
fn node_list(raw: Option<&Value>) -> Vec<Node> {
    match raw.map(unwrap_envelope) {
        Some(Value::Array(items)) => items.iter().map(Node::from_value).collect(),
        _ => Vec::new(),
    }
}

fn deserialize_nodes<'de, D>(deserializer: D) -> Result<Vec<Node>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(node_list(Some(&raw)))
}

/// Document of `GET /composition/layers/by-id/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerDoc {
    #[serde(default)]
    pub id: Param<LayerId>,
    #[serde(default)]
    pub name: Param<String>,
    #[serde(default)]
    pub bypassed: Param<bool>,
    #[serde(default)]
    pub solo: Param<bool>,
    #[serde(default, deserialize_with = "deserialize_clip_object")]
    pub active_clip: Option<ClipDoc>,
    /// Clip slots in column order; `None` marks an empty slot
    #[serde(default, deserialize_with = "deserialize_slots")]
    pub clips: Vec<Option<ClipDoc>>,
}

/// A clip, either inline in a layer or from `GET /composition/clips/by-id/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipDoc {
    #[serde(default)]
    pub id: Param<ClipId>,
    #[serde(default)]
    pub name: Param<String>,
    #[serde(default, deserialize_with = "deserialize_params")]
    pub params: Option<ClipParams>,
}

/// Nested clip parameter block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipParams {
    #[serde(default)]
    pub name: Param<String>,
}

impl ClipDoc {
    /// Decode a clip object; `null`, `{}` and non-objects are no clip
    pub fn from_value(value: &Value) -> Option<ClipDoc> {
        match value {
            Value::Object(map) if !map.is_empty() => ClipDoc::deserialize(value).ok(),
            _ => None,
        }
    }

    /// Name from the direct field, else from `params.name`
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .get()
            .or_else(|| self.params.as_ref().and_then(|p| p.name.get()))
            .map(String::as_str)
    }
}

fn deserialize_clip_object<'de, D>(deserializer: D) -> Result<Option<ClipDoc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(ClipDoc::from_value(&raw))
}

fn deserialize_slots<'de, D>(deserializer: D) -> Result<Vec<Option<ClipDoc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match unwrap_envelope(&raw) {
        Value::Array(items) => Ok(items.iter().map(ClipDoc::from_value).collect()),
        _ => Ok(Vec::new()),
    }
}

fn deserialize_params<'de, D>(deserializer: D) -> Result<Option<ClipParams>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(ClipParams::deserialize(&raw).ok())
}

// ============================================================================
// Derived state
// ============================================================================

/// Active clip name reported when a layer has no active clip
pub const EMPTY_CLIP_NAME: &str = "Empty";

/// Active clip name reported when the active clip carries no name
pub const UNNAMED_CLIP_NAME: &str = "Unnamed Clip";

/// Per-layer snapshot for one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerState {
    pub active_clip_id: Option<ClipId>,
    pub active_clip_name: String,
    pub is_bypassed: bool,
    pub is_solo: bool,
}

impl Default for LayerState {
    fn default() -> Self {
        Self {
            active_clip_id: None,
            active_clip_name: EMPTY_CLIP_NAME.to_string(),
            is_bypassed: false,
            is_solo: false,
        }
    }
}

/// One position in a layer's clip sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSlot {
    pub layer_id: LayerId,
    /// Layer display name as recorded at discovery
    pub layer_name: String,
    /// 1-based column
    pub column_index: usize,
    pub clip_id: Option<ClipId>,
    pub clip_name: String,
}

/// Output of one successful update cycle
///
/// Holds no timestamps, so two cycles over an unchanged remote compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedUpdate {
    pub composition_name: String,
    /// States of the layers polled this cycle, in layer map order
    pub layers: IndexMap<LayerId, LayerState>,
    /// Slots of all polled layers, rebuilt from scratch every cycle
    pub clip_slots: Vec<ClipSlot>,
    /// Layers skipped this cycle after a non-success status
    pub skipped_layers: Vec<LayerId>,
}

impl AggregatedUpdate {
    /// Aggregate of a cycle that found nothing to poll
    pub fn empty(composition_name: impl Into<String>) -> Self {
        Self {
            composition_name: composition_name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_id_accepts_numbers_and_strings() {
        let id: ResourceId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id, ResourceId::from(42));
        let id: ResourceId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(id.as_str(), "abc");
        assert!(serde_json::from_value::<ResourceId>(json!(true)).is_err());
        assert!(serde_json::from_value::<ResourceId>(json!("")).is_err());
    }

    #[test]
    fn test_node_shapes() {
        assert!(matches!(
            Node::from_value(&json!({"id": 1, "clips": []})),
            Node::Layer(_)
        ));
        assert!(matches!(
            Node::from_value(&json!({"name": "G", "layers": []})),
            Node::Group(_)
        ));
        assert!(matches!(
            Node::from_value(&json!({"layergroups": []})),
            Node::Group(_)
        ));
        assert!(matches!(
            Node::from_value(&json!({"name": "odd"})),
            Node::Unrecognized
        ));
        assert!(matches!(Node::from_value(&json!(7)), Node::Unrecognized));
    }

    #[test]
    fn test_layer_doc_slots_keep_columns() {
        let doc: LayerDoc = serde_json::from_value(json!({
            "id": 7,
            "bypassed": {"value": true},
            "clips": [
                {"id": 1, "name": {"value": "A"}},
                null,
                {},
                {"id": 4, "params": {"name": {"value": "D"}}}
            ]
        }))
        .unwrap();

        assert_eq!(doc.clips.len(), 4);
        assert!(doc.clips[1].is_none());
        assert!(doc.clips[2].is_none());
        assert_eq!(doc.clips[0].as_ref().unwrap().display_name(), Some("A"));
        assert_eq!(doc.clips[3].as_ref().unwrap().display_name(), Some("D"));
        assert!(doc.bypassed.get_or(false));
        assert!(doc.active_clip.is_none());
    }

    #[test]
    fn test_malformed_lists_decode_empty() {
        let doc: CompositionDoc =
            serde_json::from_value(json!({"name": "Show", "layers": {"not": "a list"}}))
                .unwrap();
        assert!(doc.layers.is_empty());
        assert!(doc.layergroups.is_empty());

        let doc: LayerDoc = serde_json::from_value(json!({"clips": "none", "params": 3}))
            .unwrap();
        assert!(doc.clips.is_empty());
    }

    #[test]
    fn test_wrapped_lists_are_unwrapped() {
        let doc: CompositionDoc = serde_json::from_value(json!({
            "layers": {"value": [{"id": 1, "name": "A", "clips": []}]},
            "layergroups": {"value": [
                {"name": "G", "layers": {"value": [{"id": 2, "clips": {"value": []}}]}}
            ]}
        }))
        .unwrap();
        assert_eq!(doc.layers.len(), 1);
        assert!(matches!(doc.layers[0], Node::Layer(_)));
        match &doc.layergroups[0] {
            Node::Group(group) => {
                assert_eq!(group.layers.len(), 1);
                assert!(matches!(group.layers[0], Node::Layer(_)));
            }
            other => panic!("expected group, got {:?}", other),
        }

        let doc: LayerDoc = serde_json::from_value(json!({
            "clips": {"value": [{"id": 5, "name": "A"}, null]}
        }))
        .unwrap();
        assert_eq!(doc.clips.len(), 2);
        assert_eq!(doc.clips[0].as_ref().unwrap().display_name(), Some("A"));
    }

    #[test]
    fn test_name_only_under_params() {
        let clip = ClipDoc::from_value(&json!({
            "id": 5,
            "params": {"name": {"value": "Loop"}}
        }))
        .unwrap();
        assert_eq!(clip.display_name(), Some("Loop"));

        // Direct name wins over the nested one
        let clip = ClipDoc::from_value(&json!({
            "name": "Direct",
            "params": {"name": "Nested"}
        }))
        .unwrap();
        assert_eq!(clip.display_name(), Some("Direct"));
    }
}
