//! static node declarations consumed by a host ui or graph runtime.
//!
//! the registry is read-only data fixed at compile time; the host binds the
//! stable id to [`crate::WeightMapExtractor`] and renders parameter
//! controls from the schema.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeMetadata {
    /// stable identifier the host maps to the implementation
    pub id: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    pub params: &'static [ParamSpec],
    pub outputs: &'static [&'static str],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamKind {
    Int {
        default: i64,
        min: i64,
        max: i64,
        step: i64,
    },
    Float {
        default: f64,
        min: f64,
        max: f64,
        step: f64,
    },
    Bool {
        default: bool,
    },
}

pub const SEMANTIC_MASK_TO_WEIGHT_MAP: NodeMetadata = NodeMetadata {
    id: "SemanticMaskToWeightMap",
    display_name: "Semantic → Weight Map",
    category: "Autonomy/Conditioning",
    params: &[
        ParamSpec {
            name: "class_id",
            kind: ParamKind::Int {
                default: -1,
                min: -1,
                max: 255,
                step: 1,
            },
        },
        ParamSpec {
            name: "sigma",
            kind: ParamKind::Float {
                default: 2.0,
                min: 0.0,
                max: 64.0,
                step: 0.1,
            },
        },
        ParamSpec {
            name: "invert",
            kind: ParamKind::Bool { default: false },
        },
        ParamSpec {
            name: "edge_soften",
            kind: ParamKind::Bool { default: true },
        },
    ],
    outputs: &["weight_mask", "weight_preview"],
};

/// every node this crate declares
pub fn nodes() -> &'static [NodeMetadata] {
    &[SEMANTIC_MASK_TO_WEIGHT_MAP]
}

/// looks a node up by its stable id
pub fn lookup(id: &str) -> Option<&'static NodeMetadata> {
    nodes().iter().find(|node| node.id == id)
}
