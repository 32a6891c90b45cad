//! Composition tree walker
//!
//! Flattens the nested group/layer tree into a [`LayerMap`]. Traversal is
//! depth-first; at every level the direct layer list is visited before the
//! group list, each in source order. Layer names are prefixed with their
//! ancestor group names joined by [`GROUP_SEPARATOR`].

use crate::model::{CompositionDoc, GroupNode, LayerMap, LayerNode, Node};

/// Joins ancestor group names and the layer name
pub const GROUP_SEPARATOR: &str = " - ";

/// Name used for a group without one
pub const DEFAULT_GROUP_NAME: &str = "Group";

/// Walk `doc` and insert every newly seen layer into `layers`
///
/// Identifiers already present keep their existing name, so a second
/// occurrence in the same tree (or a layer seen by an earlier walk) is
/// ignored. Layers without an identifier and unrecognized nodes are skipped.
/// Returns the number of layers inserted.
pub fn walk_composition(doc: &CompositionDoc, layers: &mut LayerMap) -> usize {
    let before = layers.len();
    walk_level(&doc.layers, &doc.layergroups, "", layers);
    layers.len() - before
}

/// Flatten `doc` into a fresh [`LayerMap`]
pub fn flatten_composition(doc: &CompositionDoc) -> LayerMap {
    let mut layers = LayerMap::new();
    walk_composition(doc, &mut layers);
    layers
}

fn walk_level(layer_list: &[Node], group_list: &[Node], prefix: &str, layers: &mut LayerMap) {
    for node in layer_list.iter().chain(group_list) {
        match node {
            Node::Layer(layer) => visit_layer(layer, prefix, layers),
            Node::Group(group) => visit_group(group, prefix, layers),
            Node::Unrecognized => {
                tracing::trace!(prefix = %prefix, "Skipping unrecognized composition node");
            }
        }
    }
}

fn visit_group(group: &GroupNode, prefix: &str, layers: &mut LayerMap) {
    let name = group.name.get_or(DEFAULT_GROUP_NAME.to_string());
    let prefix = qualify(prefix, &name);
    walk_level(&group.layers, &group.layergroups, &prefix, layers);
}

fn visit_layer(layer: &LayerNode, prefix: &str, layers: &mut LayerMap) {
    let Some(id) = layer.id.get() else {
        tracing::debug!(prefix = %prefix, "Skipping layer without identifier");
        return;
    };

    if layers.contains_key(id) {
        return;
    }

    let name = layer.name.get_or(format!("Layer {}", id));
    layers.insert(id.clone(), qualify(prefix, &name));
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", prefix, GROUP_SEPARATOR, name)
    }
}
