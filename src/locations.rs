//! The logical location resolver.
//!
//! Results address code both physically (file + region) and logically
//! (`Namespace.Type.Member` and friends). The logical addresses repeat
//! heavily across a log, so they are interned into an append-only table of
//! parent-indexed nodes and results carry only the leaf index.

use crate::model::{LocationKind, LogicalLocation};
use std::collections::BTreeMap;

/// One element of a logical path, outermost first.
#[derive(Copy, Clone, Debug)]
pub struct Segment<'s> {
    pub name: &'s str,
    pub kind: LocationKind,
    /// Joins this segment to its parent in the fully qualified name,
    /// overriding the table's default. FxCop joins a module to its children
    /// with `!` while the rest of the path uses `.`; most formats use a
    /// single delimiter throughout.
    pub separator: Option<&'static str>,
}

impl<'s> Segment<'s> {
    #[inline]
    pub fn new(name: &'s str, kind: LocationKind) -> Self {
        Self {
            name,
            kind,
            separator: None,
        }
    }

    #[inline]
    pub fn joined_by(mut self, separator: &'static str) -> Self {
        self.separator = Some(separator);
        self
    }
}

/// Deduplicated, parent-indexed table of [`LogicalLocation`] nodes.
///
/// Indices are stable once assigned; nodes are never mutated after
/// insertion. The table lives for one conversion run and is not shared
/// across concurrent conversions.
pub struct LogicalLocationTable {
    nodes: Vec<LogicalLocation>,
    /// (parent, name, kind) -> node index, so insertion is idempotent via
    /// structural lookup rather than reference identity
    lookup: BTreeMap<(Option<usize>, String, LocationKind), usize>,
    delimiter: &'static str,
}

impl LogicalLocationTable {
    /// `delimiter` is the default fully-qualified-name join: `.` for
    /// namespace-style paths, `\` for path-style, `!` for module-style.
    pub fn new(delimiter: &'static str) -> Self {
        Self {
            nodes: Vec::new(),
            lookup: BTreeMap::new(),
            delimiter,
        }
    }

    /// Walks `path` from the root, reusing any node that already exists with
    /// the same (parent, name, kind) and appending the rest. Returns the
    /// index of the leaf segment, or `None` for an empty path.
    ///
    /// Two logically-equal paths always resolve to the same leaf index.
    pub fn insert(&mut self, path: &[Segment<'_>]) -> Option<usize> {
        let mut parent: Option<usize> = None;

        for segment in path {
            let key = (parent, segment.name.to_owned(), segment.kind);

            let index = match self.lookup.get(&key) {
                Some(existing) => *existing,
                None => {
                    let fully_qualified_name = match parent {
                        None => segment.name.to_owned(),
                        Some(pi) => {
                            let sep = segment.separator.unwrap_or(self.delimiter);
                            format!("{}{sep}{}", self.nodes[pi].fully_qualified_name, segment.name)
                        }
                    };

                    let index = self.nodes.len();
                    self.nodes.push(LogicalLocation {
                        name: segment.name.to_owned(),
                        fully_qualified_name,
                        kind: segment.kind,
                        parent_index: parent,
                    });
                    self.lookup.insert(key, index);
                    index
                }
            };

            parent = Some(index);
        }

        parent
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&LogicalLocation> {
        self.nodes.get(index)
    }

    #[inline]
    pub fn nodes(&self) -> &[LogicalLocation] {
        &self.nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Consumes the table for handing its nodes to a log writer.
    #[inline]
    pub fn into_nodes(self) -> Vec<LogicalLocation> {
        self.nodes
    }
}
