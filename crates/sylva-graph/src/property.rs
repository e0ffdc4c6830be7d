//! Property values and the well-known property keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A value stored on a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
    IntList(Vec<i64>),
}

impl PropertyValue {
    /// Converts a parser attribute into a storable value.
    ///
    /// Returns `None` for `null` and for objects, which have no flat
    /// representation. Mixed arrays are stored as text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Object(_) => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => {
                let ints: Option<Vec<i64>> = items.iter().map(Value::as_i64).collect();
                match ints {
                    Some(ints) if !items.is_empty() => Some(Self::IntList(ints)),
                    _ => Some(Self::TextList(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect(),
                    )),
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::from(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::from(s.as_str()),
            Self::TextList(items) => Value::from(items.clone()),
            Self::IntList(items) => Value::from(items.clone()),
        }
    }

    /// The terms this value contributes to an index. Scalars give one
    /// term, lists give one term per element.
    pub fn index_terms(&self) -> Vec<String> {
        match self {
            Self::TextList(items) => items.clone(),
            Self::IntList(items) => items.iter().map(i64::to_string).collect(),
            scalar => vec![scalar.to_string()],
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
            Self::TextList(items) => write!(f, "{}", items.join(", ")),
            Self::IntList(items) => {
                let parts: Vec<String> = items.iter().map(i64::to_string).collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// Property keys understood by the node records.
pub mod keys {
    // every tree node
    pub const NAME: &str = "name";
    pub const ORIGINAL_LABEL: &str = "original_label";
    pub const BRANCH_LENGTH: &str = "branch_length";
    pub const IS_WITHIN_INGROUP: &str = "is_within_ingroup";
    pub const OTT_ID: &str = "ot:ottId";

    // tree roots only
    pub const IS_ROOT: &str = "is_root";
    pub const TREE_ID: &str = "tree_id";
    pub const ROOTING_IS_SET: &str = "rooting_is_set";
    pub const INGROUP_IS_SET: &str = "ingroup_is_set";
    pub const ORIGINAL_TIP_NAMES: &str = "original_tip_names";
    pub const MAPPED_TIP_NAMES: &str = "mapped_tip_names";
    pub const MAPPED_TIP_NAMES_FOLDED: &str = "mapped_tip_names_folded";
    pub const MAPPED_TIP_OTT_IDS: &str = "mapped_tip_ott_ids";
    pub const BRANCH_LENGTH_MODE: &str = "ot:branchLengthMode";
    pub const INGROUP_CLADE: &str = "ot:inGroupClade";
    pub const FOCAL_CLADE: &str = "ot:focalClade";

    // tree roots and sources
    pub const SOURCE_ID: &str = "source_id";
    pub const LOCATION: &str = "location";
    pub const TAG: &str = "ot:tag";

    // sources only
    pub const CURATOR_NAME: &str = "ot:curatorName";
    pub const DATA_DEPOSIT: &str = "ot:dataDeposit";
    pub const PUBLICATION_REFERENCE: &str = "ot:studyPublicationReference";
    pub const STUDY_ID: &str = "ot:studyId";
    pub const STUDY_PUBLICATION: &str = "ot:studyPublication";
    pub const STUDY_YEAR: &str = "ot:studyYear";
}

/// Tree properties exposed by metadata projections.
pub const VISIBLE_TREE_PROPERTIES: &[&str] = &[
    keys::TREE_ID,
    keys::TAG,
    keys::INGROUP_CLADE,
    keys::BRANCH_LENGTH_MODE,
    keys::ROOTING_IS_SET,
    keys::INGROUP_IS_SET,
];

/// Source properties exposed by metadata projections. Location and
/// source id are internal and never listed here.
pub const VISIBLE_SOURCE_PROPERTIES: &[&str] = &[
    keys::CURATOR_NAME,
    keys::DATA_DEPOSIT,
    keys::PUBLICATION_REFERENCE,
    keys::STUDY_ID,
    keys::STUDY_PUBLICATION,
    keys::TAG,
    keys::STUDY_YEAR,
];

pub const VISIBLE_OTU_PROPERTIES: &[&str] = &[
    keys::ORIGINAL_LABEL,
    keys::NAME,
    keys::IS_WITHIN_INGROUP,
];

pub const EDITABLE_TREE_PROPERTIES: &[&str] =
    &[keys::TAG, keys::INGROUP_CLADE, keys::BRANCH_LENGTH_MODE];

pub const EDITABLE_SOURCE_PROPERTIES: &[&str] = &[
    keys::CURATOR_NAME,
    keys::DATA_DEPOSIT,
    keys::PUBLICATION_REFERENCE,
    keys::STUDY_ID,
    keys::STUDY_PUBLICATION,
    keys::TAG,
    keys::STUDY_YEAR,
];
