//! Immutable attribute schema for the two node types and best-effort
//! registration against a host.
//!
//! The schema is built once and handed to evaluation by reference; nothing in
//! here is mutated after construction. [`register_plugin`] walks every node,
//! attribute and dependency and records each outcome independently so a
//! single rejected attribute does not hide the rest of the report.

mod registry;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

pub use registry::SchemaRegistry;

// ====================================================================
// Attribute description
// ====================================================================

/// Data type of a host attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Bool,
    Int,
    Enum,
    Double,
    /// Unit attribute in scene distance units.
    Distance,
    DoubleArray,
    IntArray,
    PointArray,
    VectorArray,
    NurbsCurve,
    NurbsSurface,
    Mesh,
    Compound,
}

impl AttributeKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Enum => "enum",
            Self::Double => "double",
            Self::Distance => "distance",
            Self::DoubleArray => "doubleArray",
            Self::IntArray => "intArray",
            Self::PointArray => "pointArray",
            Self::VectorArray => "vectorArray",
            Self::NurbsCurve => "nurbsCurve",
            Self::NurbsSurface => "nurbsSurface",
            Self::Mesh => "mesh",
            Self::Compound => "compound",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeRole {
    Input,
    Output,
    /// Hidden cached value, computed like an output but not meant for users.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AttributeFlags {
    pub storable: bool,
    pub keyable: bool,
    pub hidden: bool,
    pub readable: bool,
    pub writable: bool,
    pub connectable: bool,
    pub array: bool,
}

impl AttributeFlags {
    const INPUT: Self = Self {
        storable: true,
        keyable: false,
        hidden: false,
        readable: true,
        writable: true,
        connectable: true,
        array: false,
    };

    const OUTPUT: Self = Self {
        storable: false,
        keyable: false,
        hidden: false,
        readable: true,
        writable: false,
        connectable: true,
        array: false,
    };

    const INTERNAL: Self = Self {
        storable: false,
        keyable: false,
        hidden: true,
        readable: false,
        writable: false,
        connectable: false,
        array: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumField {
    pub label: &'static str,
    pub value: i16,
}

/// One attribute declaration, including compound children and enum fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeSpec {
    pub long_name: &'static str,
    pub short_name: &'static str,
    pub kind: AttributeKind,
    pub role: AttributeRole,
    pub default: Option<f64>,
    pub min: Option<f64>,
    pub flags: AttributeFlags,
    pub children: &'static [AttributeSpec],
    pub fields: &'static [EnumField],
}

impl AttributeSpec {
    #[must_use]
    pub const fn new(
        long_name: &'static str,
        short_name: &'static str,
        kind: AttributeKind,
        role: AttributeRole,
    ) -> Self {
        let flags = match role {
            AttributeRole::Input => AttributeFlags::INPUT,
            AttributeRole::Output => AttributeFlags::OUTPUT,
            AttributeRole::Internal => AttributeFlags::INTERNAL,
        };
        Self {
            long_name,
            short_name,
            kind,
            role,
            default: None,
            min: None,
            flags,
            children: &[],
            fields: &[],
        }
    }

    #[must_use]
    pub const fn input(long_name: &'static str, short_name: &'static str, kind: AttributeKind) -> Self {
        Self::new(long_name, short_name, kind, AttributeRole::Input)
    }

    #[must_use]
    pub const fn output(long_name: &'static str, short_name: &'static str, kind: AttributeKind) -> Self {
        Self::new(long_name, short_name, kind, AttributeRole::Output)
    }

    #[must_use]
    pub const fn internal(
        long_name: &'static str,
        short_name: &'static str,
        kind: AttributeKind,
    ) -> Self {
        Self::new(long_name, short_name, kind, AttributeRole::Internal)
    }

    #[must_use]
    pub const fn with_default(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub const fn with_min(mut self, value: f64) -> Self {
        self.min = Some(value);
        self
    }

    #[must_use]
    pub const fn with_children(mut self, children: &'static [AttributeSpec]) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub const fn with_fields(mut self, fields: &'static [EnumField]) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub const fn keyable(mut self) -> Self {
        self.flags.keyable = true;
        self
    }

    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.flags.hidden = true;
        self
    }

    #[must_use]
    pub const fn array(mut self) -> Self {
        self.flags.array = true;
        self
    }

    #[must_use]
    pub const fn storable(mut self, storable: bool) -> Self {
        self.flags.storable = storable;
        self
    }

    #[must_use]
    pub const fn writable(mut self, writable: bool) -> Self {
        self.flags.writable = writable;
        self
    }

    #[must_use]
    pub const fn connectable(mut self, connectable: bool) -> Self {
        self.flags.connectable = connectable;
        self
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.long_name == name || self.short_name == name
    }

    /// Value that lies below the declared minimum is clamped up to it.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        match self.min {
            Some(min) if value < min => min,
            _ => value,
        }
    }
}

/// Which host base class a node derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Dependency,
    /// Deformers inherit `outputGeom`, `envelope` and per-vertex weights.
    Deformer,
}

/// Outputs recomputed when any of `inputs` changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffectsGroup {
    pub output: &'static str,
    pub inputs: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSchema {
    pub type_name: &'static str,
    pub type_id: u32,
    pub kind: NodeKind,
    pub attributes: &'static [AttributeSpec],
    /// Attributes supplied by the host base class. Dependencies may name them.
    pub inherited: &'static [AttributeSpec],
    pub affects: &'static [AffectsGroup],
    pub paintable_weights: bool,
}

impl NodeSchema {
    /// Finds an attribute by long or short name, searching compound children.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&'static AttributeSpec> {
        find_attribute(self.attributes, name).or_else(|| find_attribute(self.inherited, name))
    }

    /// Parent compound of `name`, if it is a child attribute.
    #[must_use]
    pub fn parent_of(&self, name: &str) -> Option<&'static AttributeSpec> {
        self.attributes
            .iter()
            .find(|attr| attr.children.iter().any(|child| child.matches(name)))
    }

    /// Long names of every output that depends on `input`.
    ///
    /// A child attribute also invalidates everything its compound parent
    /// affects.
    #[must_use]
    pub fn affected_outputs(&self, input: &str) -> Vec<&'static str> {
        let Some(attribute) = self.attribute(input) else {
            return Vec::new();
        };
        let parent = self.parent_of(attribute.long_name).map(|parent| parent.long_name);

        self.affects
            .iter()
            .filter(|group| {
                group.inputs.iter().any(|name| {
                    *name == attribute.long_name || parent.is_some_and(|parent| *name == parent)
                })
            })
            .map(|group| group.output)
            .collect()
    }

    /// Every `(input, output)` dependency pair in declaration order.
    pub fn affects_pairs(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.affects
            .iter()
            .flat_map(|group| group.inputs.iter().map(move |input| (*input, group.output)))
    }

    /// Number of attributes including compound children.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attributes.iter().map(|attr| 1 + attr.children.len()).sum()
    }
}

fn find_attribute(attributes: &'static [AttributeSpec], name: &str) -> Option<&'static AttributeSpec> {
    for attr in attributes {
        if attr.matches(name) {
            return Some(attr);
        }
        if let Some(child) = attr.children.iter().find(|child| child.matches(name)) {
            return Some(child);
        }
    }
    None
}

// ====================================================================
// Muscle node
// ====================================================================

pub const MUSCLE_TYPE_NAME: &str = "hrGeneralMuscle";
pub const MUSCLE_TYPE_ID: u32 = 0x127;

const CONNECTION_CHILDREN: &[AttributeSpec] = &[
    AttributeSpec::input("connectionSurface", "conS", AttributeKind::NurbsSurface).hidden(),
    AttributeSpec::input("connectionU", "conU", AttributeKind::Double)
        .with_default(0.0)
        .hidden()
        .connectable(false),
    AttributeSpec::input("connectionV", "conV", AttributeKind::Double)
        .with_default(0.0)
        .hidden()
        .connectable(false),
    AttributeSpec::input("connectionUp", "conUp", AttributeKind::Int)
        .with_default(0.0)
        .hidden()
        .connectable(false),
    AttributeSpec::input("connectionFlip", "conF", AttributeKind::Bool)
        .with_default(0.0)
        .hidden()
        .connectable(false),
];

const ORIGIN_VECTOR_CHILDREN: &[AttributeSpec] = &[
    AttributeSpec::input("originVectorX", "ovx", AttributeKind::Distance).with_default(0.0).keyable(),
    AttributeSpec::input("originVectorY", "ovy", AttributeKind::Distance).with_default(0.0).keyable(),
    AttributeSpec::input("originVectorZ", "ovz", AttributeKind::Distance).with_default(0.0).keyable(),
];

const INSERTION_VECTOR_CHILDREN: &[AttributeSpec] = &[
    AttributeSpec::input("insertionVectorX", "ivx", AttributeKind::Distance)
        .with_default(0.0)
        .keyable(),
    AttributeSpec::input("insertionVectorY", "ivy", AttributeKind::Distance)
        .with_default(0.0)
        .keyable(),
    AttributeSpec::input("insertionVectorZ", "ivz", AttributeKind::Distance)
        .with_default(0.0)
        .keyable(),
];

const fn rest_knob(long_name: &'static str, short_name: &'static str) -> AttributeSpec {
    AttributeSpec::input(long_name, short_name, AttributeKind::Distance)
        .with_default(1.0)
        .with_min(0.0)
        .keyable()
}

const MUSCLE_ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::input("calculateVolume", "vol", AttributeKind::Bool)
        .with_default(0.0)
        .keyable(),
    AttributeSpec::input("connectionPt", "conP", AttributeKind::Compound)
        .with_children(CONNECTION_CHILDREN)
        .array()
        .hidden()
        .connectable(false),
    AttributeSpec::input("originVectorPt", "ov", AttributeKind::Compound)
        .with_children(ORIGIN_VECTOR_CHILDREN)
        .keyable(),
    AttributeSpec::input("originVectorLock", "oLk", AttributeKind::Bool)
        .with_default(0.0)
        .keyable(),
    AttributeSpec::input("insertionVectorPt", "iv", AttributeKind::Compound)
        .with_children(INSERTION_VECTOR_CHILDREN)
        .keyable(),
    AttributeSpec::input("insertionVectorLock", "iLk", AttributeKind::Bool)
        .with_default(0.0)
        .keyable(),
    rest_knob("restHeightO", "rHo"),
    rest_knob("restHeightOv", "rHov"),
    rest_knob("restWidthOv", "rWov"),
    rest_knob("restHeightIv", "rHiv"),
    rest_knob("restWidthIv", "rWiv"),
    rest_knob("restHeightI", "rHi"),
    AttributeSpec::output("muscleLength", "mL", AttributeKind::Distance).with_default(0.0),
    AttributeSpec::internal("internalMuscleHeights", "iRh", AttributeKind::DoubleArray),
    AttributeSpec::internal("internalMuscleWidths", "iRw", AttributeKind::DoubleArray),
    AttributeSpec::internal("internalMuscleLength", "iRl", AttributeKind::Distance)
        .with_default(0.0)
        .storable(true)
        .writable(true),
    AttributeSpec::internal("internalInitialVolumes", "iIv", AttributeKind::DoubleArray),
    AttributeSpec::internal("internalWhichUp", "iwu", AttributeKind::IntArray),
    AttributeSpec::internal("internalMuscleLocks", "iml", AttributeKind::IntArray),
    AttributeSpec::internal("internalMusclePositions", "iMp", AttributeKind::PointArray),
    AttributeSpec::internal("internalMuscleXsections", "iXs", AttributeKind::NurbsCurve),
    AttributeSpec::internal("internalVPoints", "iVp", AttributeKind::VectorArray),
    AttributeSpec::internal("internalMuscleCurve", "icv", AttributeKind::NurbsCurve),
    AttributeSpec::output("muscleSurface", "ms", AttributeKind::NurbsSurface),
];

/// Inputs that move the attachment points or the volume stations.
const MUSCLE_GEOMETRY_INPUTS: &[&str] = &[
    "connectionPt",
    "connectionSurface",
    "connectionU",
    "connectionV",
    "connectionUp",
    "connectionFlip",
    "originVectorPt",
    "insertionVectorPt",
    "originVectorLock",
    "insertionVectorLock",
];

const MUSCLE_SURFACE_INPUTS: &[&str] = &[
    "calculateVolume",
    "connectionPt",
    "connectionSurface",
    "connectionU",
    "connectionV",
    "connectionUp",
    "connectionFlip",
    "originVectorPt",
    "insertionVectorPt",
    "restHeightO",
    "restHeightOv",
    "restWidthOv",
    "restHeightIv",
    "restWidthIv",
    "restHeightI",
    "originVectorLock",
    "insertionVectorLock",
];

// Heights and widths are reported volume-scaled, so the geometry moves them too.
const MUSCLE_HEIGHT_INPUTS: &[&str] = &[
    "restHeightO",
    "restHeightOv",
    "restHeightIv",
    "restHeightI",
    "calculateVolume",
    "connectionPt",
    "connectionSurface",
    "connectionU",
    "connectionV",
    "connectionUp",
    "connectionFlip",
    "originVectorPt",
    "insertionVectorPt",
    "originVectorLock",
    "insertionVectorLock",
];

const MUSCLE_WIDTH_INPUTS: &[&str] = &[
    "restWidthOv",
    "restWidthIv",
    "calculateVolume",
    "connectionPt",
    "connectionSurface",
    "connectionU",
    "connectionV",
    "connectionUp",
    "connectionFlip",
    "originVectorPt",
    "insertionVectorPt",
    "originVectorLock",
    "insertionVectorLock",
];

const MUSCLE_REST_LENGTH_INPUTS: &[&str] = &[
    "calculateVolume",
    "connectionPt",
    "connectionSurface",
    "connectionU",
    "connectionV",
    "connectionUp",
    "connectionFlip",
    "originVectorPt",
    "insertionVectorPt",
    "originVectorLock",
    "insertionVectorLock",
];

const MUSCLE_UP_VECTOR_INPUTS: &[&str] = &[
    "connectionPt",
    "connectionSurface",
    "connectionU",
    "connectionV",
    "connectionUp",
    "connectionFlip",
];

const MUSCLE_AFFECTS: &[AffectsGroup] = &[
    AffectsGroup {
        output: "muscleSurface",
        inputs: MUSCLE_SURFACE_INPUTS,
    },
    AffectsGroup {
        output: "internalMuscleHeights",
        inputs: MUSCLE_HEIGHT_INPUTS,
    },
    AffectsGroup {
        output: "internalMuscleWidths",
        inputs: MUSCLE_WIDTH_INPUTS,
    },
    AffectsGroup {
        output: "internalMuscleLength",
        inputs: MUSCLE_REST_LENGTH_INPUTS,
    },
    AffectsGroup {
        output: "internalMusclePositions",
        inputs: MUSCLE_GEOMETRY_INPUTS,
    },
    AffectsGroup {
        output: "internalWhichUp",
        inputs: &["connectionPt", "connectionUp"],
    },
    AffectsGroup {
        output: "internalMuscleCurve",
        inputs: MUSCLE_GEOMETRY_INPUTS,
    },
    AffectsGroup {
        output: "internalVPoints",
        inputs: MUSCLE_UP_VECTOR_INPUTS,
    },
    AffectsGroup {
        output: "internalMuscleLocks",
        inputs: &["originVectorLock", "insertionVectorLock"],
    },
    AffectsGroup {
        output: "muscleLength",
        inputs: MUSCLE_GEOMETRY_INPUTS,
    },
];

pub const MUSCLE_NODE: NodeSchema = NodeSchema {
    type_name: MUSCLE_TYPE_NAME,
    type_id: MUSCLE_TYPE_ID,
    kind: NodeKind::Dependency,
    attributes: MUSCLE_ATTRIBUTES,
    inherited: &[],
    affects: MUSCLE_AFFECTS,
    paintable_weights: false,
};

// ====================================================================
// Vertex snap deformer
// ====================================================================

pub const VERT_SNAP_TYPE_NAME: &str = "vertSnapDeformer";
pub const VERT_SNAP_TYPE_ID: u32 = 0x7269b;

const BIND_FIELDS: &[EnumField] = &[
    EnumField {
        label: "Off",
        value: 0,
    },
    EnumField {
        label: "Re-Set Bind",
        value: 1,
    },
    EnumField {
        label: "Bound",
        value: 2,
    },
];

const VERT_SNAP_ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::input("vertSnapInput", "vsnpin", AttributeKind::Mesh).storable(false),
    AttributeSpec::input("initialize", "inl", AttributeKind::Enum)
        .with_fields(BIND_FIELDS)
        .with_default(0.0)
        .keyable(),
    AttributeSpec::input("vtxIndexMap", "vtximp", AttributeKind::Int).array(),
];

const DEFORMER_INHERITED: &[AttributeSpec] = &[
    AttributeSpec::input("envelope", "en", AttributeKind::Double)
        .with_default(1.0)
        .keyable(),
    AttributeSpec::output("outputGeom", "og", AttributeKind::Mesh).array(),
];

const VERT_SNAP_AFFECTS: &[AffectsGroup] = &[AffectsGroup {
    output: "outputGeom",
    inputs: &["vertSnapInput", "initialize", "vtxIndexMap"],
}];

pub const VERT_SNAP_NODE: NodeSchema = NodeSchema {
    type_name: VERT_SNAP_TYPE_NAME,
    type_id: VERT_SNAP_TYPE_ID,
    kind: NodeKind::Deformer,
    attributes: VERT_SNAP_ATTRIBUTES,
    inherited: DEFORMER_INHERITED,
    affects: VERT_SNAP_AFFECTS,
    paintable_weights: true,
};

// ====================================================================
// Plugin
// ====================================================================

/// Every node this crate registers, with name and id lookups built once.
#[derive(Debug, Clone)]
pub struct PluginSchema {
    nodes: Vec<NodeSchema>,
    by_name: HashMap<&'static str, usize>,
    by_id: HashMap<u32, usize>,
}

impl Default for PluginSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::from_nodes(vec![MUSCLE_NODE, VERT_SNAP_NODE])
    }

    #[must_use]
    pub fn from_nodes(nodes: Vec<NodeSchema>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            by_name.entry(node.type_name).or_insert(index);
            by_id.entry(node.type_id).or_insert(index);
        }
        Self {
            nodes,
            by_name,
            by_id,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeSchema] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, type_name: &str) -> Option<&NodeSchema> {
        self.by_name.get(type_name).map(|&index| &self.nodes[index])
    }

    #[must_use]
    pub fn node_by_id(&self, type_id: u32) -> Option<&NodeSchema> {
        self.by_id.get(&type_id).map(|&index| &self.nodes[index])
    }

    #[must_use]
    pub fn muscle(&self) -> &NodeSchema {
        self.node(MUSCLE_TYPE_NAME).unwrap_or(&MUSCLE_NODE)
    }

    #[must_use]
    pub fn vert_snap(&self) -> &NodeSchema {
        self.node(VERT_SNAP_TYPE_NAME).unwrap_or(&VERT_SNAP_NODE)
    }
}

// ====================================================================
// Registration
// ====================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("node `{type_name}` (id {type_id:#x}) is already registered")]
    DuplicateNode { type_name: String, type_id: u32 },
    #[error("attribute `{attribute}` already exists on `{node}`")]
    DuplicateAttribute { node: String, attribute: String },
    #[error("node `{0}` is not registered")]
    UnknownNode(String),
    #[error("attribute `{attribute}` is not declared on `{node}`")]
    UnknownAttribute { node: String, attribute: String },
    #[error("host rejected `{step}`: {message}")]
    Host { step: String, message: String },
}

/// Host side of plugin registration.
pub trait HostRegistrar {
    fn register_node(&mut self, node: &NodeSchema) -> Result<(), RegistrationError>;

    fn add_attribute(
        &mut self,
        node: &NodeSchema,
        attribute: &AttributeSpec,
    ) -> Result<(), RegistrationError>;

    fn attribute_affects(
        &mut self,
        node: &NodeSchema,
        input: &str,
        output: &str,
    ) -> Result<(), RegistrationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub node: &'static str,
    pub step: String,
    pub error: RegistrationError,
}

/// Outcome of [`register_plugin`]. Every step runs, failures are collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub nodes_registered: usize,
    pub attributes_added: usize,
    pub dependencies_declared: usize,
    pub failures: Vec<RegistrationFailure>,
}

impl RegistrationReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn failures(&self) -> &[RegistrationFailure] {
        &self.failures
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "nodes={} attributes={} dependencies={} failures={}",
            self.nodes_registered,
            self.attributes_added,
            self.dependencies_declared,
            self.failures.len()
        );
        for failure in &self.failures {
            summary.push_str(&format!("\n  {}: {}: {}", failure.node, failure.step, failure.error));
        }
        summary
    }

    fn record(&mut self, node: &'static str, step: String, result: Result<(), RegistrationError>) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                log::warn!("failed to register {step} of {node}: {error}");
                self.failures.push(RegistrationFailure { node, step, error });
                false
            }
        }
    }
}

/// Registers every node of `schema` with `host`.
///
/// Compound children are added before their parent, mirroring how hosts
/// expect a compound to be assembled.
pub fn register_plugin<H: HostRegistrar + ?Sized>(host: &mut H, schema: &PluginSchema) -> RegistrationReport {
    let mut report = RegistrationReport::default();

    for node in schema.nodes() {
        let registered = host.register_node(node);
        if report.record(node.type_name, "registerNode".to_string(), registered) {
            report.nodes_registered += 1;
        }

        for attribute in node.attributes {
            for child in attribute.children {
                let added = host.add_attribute(node, child);
                if report.record(node.type_name, format!("addAttribute({})", child.long_name), added) {
                    report.attributes_added += 1;
                }
            }
            let added = host.add_attribute(node, attribute);
            if report.record(node.type_name, format!("addAttribute({})", attribute.long_name), added) {
                report.attributes_added += 1;
            }
        }

        for (input, output) in node.affects_pairs() {
            let declared = host.attribute_affects(node, input, output);
            if report.record(node.type_name, format!("attributeAffects({input}, {output})"), declared) {
                report.dependencies_declared += 1;
            }
        }
    }

    crate::debug_log!("plugin registration: {}", report.summary());
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn muscle_schema_lists_every_knob() {
        let node = &MUSCLE_NODE;
        for name in [
            "calculateVolume",
            "conP",
            "conS",
            "ov",
            "ivz",
            "oLk",
            "iLk",
            "rHo",
            "rHov",
            "rHiv",
            "rHi",
            "rWov",
            "rWiv",
            "mL",
            "ms",
            "iIv",
            "iXs",
        ] {
            assert!(node.attribute(name).is_some(), "missing attribute {name}");
        }

        let knob = node.attribute("restWidthIv").expect("rest width");
        assert_eq!(knob.default, Some(1.0));
        assert_eq!(knob.min, Some(0.0));
        assert_eq!(knob.clamp(-2.0), 0.0);
        assert!(knob.flags.keyable);

        let length = node.attribute("muscleLength").expect("length output");
        assert!(!length.flags.writable);
        assert!(!length.flags.storable);
    }

    #[test]
    fn connection_compound_is_a_hidden_array() {
        let conp = MUSCLE_NODE.attribute("connectionPt").expect("compound");
        assert_eq!(conp.kind, AttributeKind::Compound);
        assert!(conp.flags.array);
        assert!(conp.flags.hidden);
        assert_eq!(conp.children.len(), 5);
        assert_eq!(
            MUSCLE_NODE.parent_of("conUp").map(|attr| attr.long_name),
            Some("connectionPt")
        );
    }

    #[test]
    fn child_inputs_invalidate_parent_dependencies() {
        let outputs = MUSCLE_NODE.affected_outputs("ovx");
        assert!(outputs.contains(&"muscleSurface"));
        assert!(outputs.contains(&"internalMuscleCurve"));
        assert!(outputs.contains(&"muscleLength"));
        assert!(!outputs.contains(&"internalMuscleLocks"));

        let locks = MUSCLE_NODE.affected_outputs("oLk");
        assert!(locks.contains(&"internalMuscleLocks"));
        assert!(locks.contains(&"internalMuscleLength"));

        let heights = MUSCLE_NODE.affected_outputs("rHov");
        assert_eq!(heights, vec!["muscleSurface", "internalMuscleHeights"]);

        assert!(MUSCLE_NODE.affected_outputs("doesNotExist").is_empty());
    }

    #[test]
    fn deformer_schema_matches_host_contract() {
        let node = &VERT_SNAP_NODE;
        assert_eq!(node.type_id, 0x7269b);
        assert_eq!(node.kind, NodeKind::Deformer);
        assert!(node.paintable_weights);

        let init = node.attribute("inl").expect("initialize");
        let labels: Vec<_> = init.fields.iter().map(|field| field.label).collect();
        assert_eq!(labels, vec!["Off", "Re-Set Bind", "Bound"]);

        assert!(node.attribute("outputGeom").is_some());
        assert_eq!(node.affected_outputs("vtximp"), vec!["outputGeom"]);
    }

    #[test]
    fn plugin_lookups() {
        let plugin = PluginSchema::new();
        assert_eq!(plugin.nodes().len(), 2);
        assert_eq!(plugin.node_by_id(0x00127).map(|n| n.type_name), Some("hrGeneralMuscle"));
        assert_eq!(plugin.vert_snap().type_name, "vertSnapDeformer");
        assert!(plugin.node("nope").is_none());
    }

    struct RejectingHost {
        reject: &'static str,
        calls: usize,
    }

    impl HostRegistrar for RejectingHost {
        fn register_node(&mut self, _node: &NodeSchema) -> Result<(), RegistrationError> {
            self.calls += 1;
            Ok(())
        }

        fn add_attribute(
            &mut self,
            _node: &NodeSchema,
            attribute: &AttributeSpec,
        ) -> Result<(), RegistrationError> {
            self.calls += 1;
            if attribute.long_name == self.reject {
                return Err(RegistrationError::Host {
                    step: attribute.long_name.to_string(),
                    message: "rejected".to_string(),
                });
            }
            Ok(())
        }

        fn attribute_affects(
            &mut self,
            _node: &NodeSchema,
            _input: &str,
            _output: &str,
        ) -> Result<(), RegistrationError> {
            self.calls += 1;
            Ok(())
        }
    }

    #[test]
    fn one_failed_attribute_does_not_abort_registration() {
        let plugin = PluginSchema::new();
        let mut host = RejectingHost {
            reject: "restHeightO",
            calls: 0,
        };
        let report = register_plugin(&mut host, &plugin);

        assert!(!report.is_success());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.nodes_registered, 2);
        let total_attributes: usize = plugin.nodes().iter().map(NodeSchema::attribute_count).sum();
        assert_eq!(report.attributes_added, total_attributes - 1);
        let total_pairs: usize = plugin.nodes().iter().map(|n| n.affects_pairs().count()).sum();
        assert_eq!(report.dependencies_declared, total_pairs);
        assert_eq!(host.calls, 2 + total_attributes + total_pairs);
        assert!(report.summary().contains("restHeightO"));
    }
}
