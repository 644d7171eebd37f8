//! The normalized result model shared by every converter.
//!
//! Field names follow the SARIF v2.1.0 property names so a serialized
//! [`ConversionRun`] slots directly into a `run` object, but the model is
//! deliberately schema-version-agnostic: version-specific serializers
//! consume a [`ConversionRun`] rather than these types dictating a schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity of a normalized result.
///
/// Unrecognized native severity tokens never fail conversion; each format
/// maps them to a documented default, which is [`Level::Warning`] unless the
/// format says otherwise.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Note,
    #[default]
    Warning,
    Error,
}

/// The nature of a result. Code findings are [`ResultKind::Fail`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultKind {
    Pass,
    #[default]
    Fail,
    Open,
    Review,
    Informational,
    NotApplicable,
}

/// A source region. Every field is optional; formats populate what they
/// carry. A region with only a start denotes a single point, so the end
/// accessors default to the start.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Region {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
}

impl Region {
    /// A region covering a single line.
    #[inline]
    pub fn from_line(start_line: u32) -> Self {
        Self {
            start_line: Some(start_line),
            ..Default::default()
        }
    }

    /// The end line, defaulting to the start for single-point regions.
    #[inline]
    pub fn end_line(&self) -> Option<u32> {
        self.end_line.or(self.start_line)
    }

    /// The end column, defaulting to the start column.
    #[inline]
    pub fn end_column(&self) -> Option<u32> {
        self.end_column.or(self.start_column)
    }
}

/// A file plus an optional region within it. Owned by the result that
/// references it, never shared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalLocation {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

impl PhysicalLocation {
    #[inline]
    pub fn new(uri: impl Into<String>, region: Option<Region>) -> Self {
        Self {
            uri: uri.into(),
            region,
        }
    }
}

/// One location attached to a result: a physical address, a logical-location
/// table index, or both.
///
/// The index is a weak back-reference into [`ConversionRun::logical_locations`];
/// nodes are never duplicated into results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_location: Option<PhysicalLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_location_index: Option<usize>,
}

impl Location {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.physical_location.is_none() && self.logical_location_index.is_none()
    }
}

/// How load-bearing a code flow step is for understanding the result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepImportance {
    Essential,
    #[default]
    Important,
    Unimportant,
}

/// One step in a code flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub location: PhysicalLocation,
    pub importance: StepImportance,
}

/// An ordered source-to-sink (or call path) trace. One flow, one thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFlow {
    pub steps: Vec<FlowStep>,
}

impl CodeFlow {
    /// A single-threaded flow with every step tagged essential.
    pub fn essential(locations: impl IntoIterator<Item = PhysicalLocation>) -> Self {
        Self {
            steps: locations
                .into_iter()
                .map(|location| FlowStep {
                    location,
                    importance: StepImportance::Essential,
                })
                .collect(),
        }
    }
}

pub type Locations = smallvec::SmallVec<[Location; 1]>;
pub type Properties = BTreeMap<String, String>;

/// A normalized diagnostic. Produced once per native record, immutable
/// thereafter, owned by the log writer until serialized.
///
/// A record with no locations is a tool-level notification rather than a
/// code finding (e.g. an analysis engine crash report).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub level: Level,
    pub kind: ResultKind,
    pub message: String,
    #[serde(skip_serializing_if = "Locations::is_empty")]
    pub locations: Locations,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_flow: Option<CodeFlow>,
}

impl ResultRecord {
    #[inline]
    pub fn is_notification(&self) -> bool {
        self.locations.is_empty()
    }
}

/// The hierarchy level a logical location node sits at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Module,
    Namespace,
    Package,
    Type,
    Member,
    Resource,
}

/// One node in the deduplicated logical-location table.
///
/// `parent_index` points back into the same table; a root node has none.
/// Nodes are append-only and never mutated after insertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalLocation {
    pub name: String,
    pub fully_qualified_name: String,
    pub kind: LocationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_index: Option<usize>,
}

/// Identity of the tool whose log was converted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ToolInfo {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// The aggregate produced by one conversion: everything handed to (or
/// buffered by) a log writer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionRun {
    pub tool: ToolInfo,
    pub results: Vec<ResultRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logical_locations: Vec<LogicalLocation>,
}
