use std::collections::{BTreeMap, BTreeSet};

use super::{AttributeSpec, HostRegistrar, NodeSchema, RegistrationError};

#[derive(Debug, Default, Clone)]
struct RegisteredNode {
    type_id: u32,
    attributes: BTreeSet<&'static str>,
    short_names: BTreeSet<&'static str>,
    affects: Vec<(String, String)>,
}

/// In-memory host used natively and in tests.
///
/// Inherited attributes of a node's base class are known from the moment the
/// node is registered, so dependencies may target `outputGeom` directly.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    nodes: BTreeMap<&'static str, RegisteredNode>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.nodes.contains_key(type_name)
    }

    #[must_use]
    pub fn has_attribute(&self, type_name: &str, attribute: &str) -> bool {
        self.nodes
            .get(type_name)
            .is_some_and(|node| node.attributes.contains(attribute) || node.short_names.contains(attribute))
    }

    #[must_use]
    pub fn dependencies(&self, type_name: &str) -> &[(String, String)] {
        self.nodes
            .get(type_name)
            .map(|node| node.affects.as_slice())
            .unwrap_or_default()
    }

    fn node_mut(&mut self, node: &NodeSchema) -> Result<&mut RegisteredNode, RegistrationError> {
        self.nodes
            .get_mut(node.type_name)
            .ok_or_else(|| RegistrationError::UnknownNode(node.type_name.to_string()))
    }
}

impl HostRegistrar for SchemaRegistry {
    fn register_node(&mut self, node: &NodeSchema) -> Result<(), RegistrationError> {
        let id_taken = self.nodes.values().any(|existing| existing.type_id == node.type_id);
        if id_taken || self.nodes.contains_key(node.type_name) {
            return Err(RegistrationError::DuplicateNode {
                type_name: node.type_name.to_string(),
                type_id: node.type_id,
            });
        }

        let mut registered = RegisteredNode {
            type_id: node.type_id,
            ..RegisteredNode::default()
        };
        for attr in node.inherited {
            registered.attributes.insert(attr.long_name);
            registered.short_names.insert(attr.short_name);
        }
        self.nodes.insert(node.type_name, registered);
        Ok(())
    }

    fn add_attribute(
        &mut self,
        node: &NodeSchema,
        attribute: &AttributeSpec,
    ) -> Result<(), RegistrationError> {
        let registered = self.node_mut(node)?;
        if registered.attributes.contains(attribute.long_name)
            || registered.short_names.contains(attribute.short_name)
        {
            return Err(RegistrationError::DuplicateAttribute {
                node: node.type_name.to_string(),
                attribute: attribute.long_name.to_string(),
            });
        }
        registered.attributes.insert(attribute.long_name);
        registered.short_names.insert(attribute.short_name);
        Ok(())
    }

    fn attribute_affects(
        &mut self,
        node: &NodeSchema,
        input: &str,
        output: &str,
    ) -> Result<(), RegistrationError> {
        let registered = self.node_mut(node)?;
        for name in [input, output] {
            if !registered.attributes.contains(name) {
                return Err(RegistrationError::UnknownAttribute {
                    node: node.type_name.to_string(),
                    attribute: name.to_string(),
                });
            }
        }
        registered.affects.push((input.to_string(), output.to_string()));
        Ok(())
    }
}
