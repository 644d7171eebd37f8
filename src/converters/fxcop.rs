//! FxCop report converter.
//!
//! FxCop logs nest scope containers (`Targets`/`Target`, `Modules`/`Module`,
//! `Namespaces`/`Namespace`, `Types`/`Type`, `Members`/`Member`) around
//! `Message` elements, with the actual findings as `Issue` leaves. The
//! converter walks the tree once, carrying the enclosing scope, and streams a
//! result per issue. Engine exceptions under `Exceptions` become
//! location-less notification results.

use crate::error::{Error, FormatError};
use crate::locations::{LogicalLocationTable, Segment};
use crate::model::{
    Level, Location, LocationKind, Locations, PhysicalLocation, Properties, Region, ResultKind,
    ResultRecord, ToolInfo,
};
use crate::writer::LogWriter;
use crate::xml::{Element, XmlCursor};
use std::io::BufRead;

pub const TOOL_NAME: &str = "FxCop";

/// FxCop emits project-relative paths behind an MSBuild macro.
const PROJECT_DIR_PREFIX: &str = "$(ProjectDir)/";

const NO_MESSAGE: &str = "The FxCop report does not contain a message for this issue.";

/// The scope FxCop accumulates along the containment walk; every issue is
/// normalized against the scope active when its `Issue` element opens.
#[derive(Default)]
struct Scope {
    target: Option<String>,
    module: Option<String>,
    resource: Option<String>,
    namespace: Option<String>,
    type_name: Option<String>,
    member: Option<String>,
    check_id: Option<String>,
    category: Option<String>,
    fix_category: Option<String>,
    status: Option<String>,
}

impl Scope {
    fn clear_message(&mut self) {
        self.check_id = None;
        self.category = None;
        self.fix_category = None;
        self.status = None;
    }
}

pub struct FxCopConverter {
    locations: LogicalLocationTable,
}

impl FxCopConverter {
    pub fn new() -> Self {
        Self {
            // namespace-style paths; the module→child hop overrides with `!`
            locations: LogicalLocationTable::new("."),
        }
    }

    fn read_children<R: BufRead>(
        &mut self,
        cursor: &mut XmlCursor<R>,
        parent: &str,
        scope: &mut Scope,
        output: &mut dyn LogWriter,
    ) -> Result<(), Error> {
        while let Some(child) = cursor.next_child(parent)? {
            match child.name.as_str() {
                "Targets" | "Modules" | "Resources" | "Namespaces" | "Types" | "Members"
                | "Messages" | "Exceptions" => {
                    let name = child.name.clone();
                    self.read_children(cursor, &name, scope, output)?;
                }
                "Target" => {
                    scope.target = Some(child.require_attr("Name")?.to_owned());
                    self.read_children(cursor, "Target", scope, output)?;
                    scope.target = None;
                }
                "Module" => {
                    scope.module = Some(child.require_attr("Name")?.to_owned());
                    self.read_children(cursor, "Module", scope, output)?;
                    scope.module = None;
                }
                "Resource" => {
                    scope.resource = Some(child.require_attr("Name")?.to_owned());
                    self.read_children(cursor, "Resource", scope, output)?;
                    scope.resource = None;
                }
                "Namespace" => {
                    scope.namespace = Some(child.require_attr("Name")?.to_owned());
                    self.read_children(cursor, "Namespace", scope, output)?;
                    scope.namespace = None;
                }
                "Type" => {
                    scope.type_name = Some(child.require_attr("Name")?.to_owned());
                    self.read_children(cursor, "Type", scope, output)?;
                    scope.type_name = None;
                }
                "Member" => {
                    scope.member = Some(child.require_attr("Name")?.to_owned());
                    self.read_children(cursor, "Member", scope, output)?;
                    scope.member = None;
                }
                "Message" => {
                    scope.check_id = child.attr("CheckId").map(str::to_owned);
                    scope.category = child.attr("Category").map(str::to_owned);
                    scope.fix_category = child.attr("FixCategory").map(str::to_owned);
                    scope.status = child.attr("Status").map(str::to_owned);
                    self.read_children(cursor, "Message", scope, output)?;
                    scope.clear_message();
                }
                "Issue" => {
                    let result = self.read_issue(cursor, &child, scope)?;
                    output.write_results(std::slice::from_ref(&result))?;
                }
                "Exception" => {
                    let result = Self::read_exception(cursor, &child)?;
                    output.write_results(std::slice::from_ref(&result))?;
                }
                _ => cursor.skip_element(&child.name)?,
            }
        }

        Ok(())
    }

    fn read_issue<R: BufRead>(
        &mut self,
        cursor: &mut XmlCursor<R>,
        issue: &Element,
        scope: &Scope,
    ) -> Result<ResultRecord, Error> {
        let certainty = issue.attr("Certainty").map(str::to_owned);
        let native_level = issue.attr("Level").map(str::to_owned);
        let path = issue.attr("Path").map(str::to_owned);
        let file = issue.attr("File").map(str::to_owned);
        let line = issue.attr_i64("Line")?;

        let text = cursor.element_text(issue)?;
        let message = if text.is_empty() {
            NO_MESSAGE.to_owned()
        } else {
            text
        };

        let (level, maps_directly) = match native_level.as_deref() {
            Some("Error") => (Level::Error, true),
            Some("CriticalError") => (Level::Error, false),
            Some("Warning") | None => (Level::Warning, true),
            Some("CriticalWarning") => (Level::Warning, false),
            Some("Information") => (Level::Note, false),
            Some(other) => {
                log::warn!(
                    "unrecognized FxCop issue level {other:?}, defaulting to {}",
                    Level::Warning
                );
                (Level::Warning, false)
            }
        };

        let region = match line {
            None => None,
            Some(line) => match u32::try_from(line) {
                Ok(line) if line > 0 => Some(Region::from_line(line)),
                _ => {
                    return Err(FormatError::InvalidValue {
                        offset: issue.offset,
                        field: "Issue@Line".to_owned(),
                        value: line.to_string(),
                        expected: "a positive line number",
                    }
                    .into());
                }
            },
        };

        // a path without a file is not addressable; fall back to the target
        let uri = match &file {
            Some(file) => {
                let combined = match &path {
                    Some(path) => format!("{path}/{file}"),
                    None => file.clone(),
                };
                Some(
                    combined
                        .strip_prefix(PROJECT_DIR_PREFIX)
                        .map(str::to_owned)
                        .unwrap_or(combined),
                )
            }
            None => scope.target.clone(),
        };

        let mut raw_path: Vec<(&str, LocationKind)> = Vec::new();
        if let Some(module) = scope.module.as_deref() {
            raw_path.push((module, LocationKind::Module));
        }
        if let Some(resource) = scope.resource.as_deref() {
            raw_path.push((resource, LocationKind::Resource));
        }
        if let Some(namespace) = scope.namespace.as_deref() {
            raw_path.push((namespace, LocationKind::Namespace));
        }
        if let Some(type_name) = scope.type_name.as_deref() {
            raw_path.push((type_name, LocationKind::Type));
        }
        if let Some(member) = scope.member.as_deref() {
            // FxCop decorates member names like `#.ctor()`
            raw_path.push((member.trim_matches('#'), LocationKind::Member));
        }

        let mut segments = Vec::with_capacity(raw_path.len());
        for (i, (name, kind)) in raw_path.iter().enumerate() {
            let mut segment = Segment::new(name, *kind);
            if i > 0 && raw_path[i - 1].1 == LocationKind::Module {
                segment = segment.joined_by("!");
            }
            segments.push(segment);
        }
        let logical_location_index = self.locations.insert(&segments);

        let physical_location = uri.map(|uri| PhysicalLocation::new(uri, region));

        let mut locations = Locations::new();
        if physical_location.is_some() || logical_location_index.is_some() {
            locations.push(Location {
                physical_location,
                logical_location_index,
            });
        }

        let mut properties = Properties::new();
        if let Some(category) = &scope.category {
            properties.insert("Category".to_owned(), category.clone());
        }
        if let Some(fix_category) = &scope.fix_category {
            properties.insert("FixCategory".to_owned(), fix_category.clone());
        }
        if let Some(certainty) = certainty {
            properties.insert("Certainty".to_owned(), certainty);
        }
        if !maps_directly {
            if let Some(native_level) = native_level {
                properties.insert("Level".to_owned(), native_level);
            }
        }

        let kind = match scope.status.as_deref() {
            Some("Excluded" | "ExcludedInSource" | "ExcludedInProject") => {
                ResultKind::NotApplicable
            }
            _ => ResultKind::Fail,
        };

        Ok(ResultRecord {
            rule_id: scope.check_id.clone(),
            level,
            kind,
            message,
            locations,
            properties,
            code_flow: None,
        })
    }

    /// An analysis engine exception; it names the failing check and target
    /// but carries no source location, so it surfaces as a notification.
    fn read_exception<R: BufRead>(
        cursor: &mut XmlCursor<R>,
        exception: &Element,
    ) -> Result<ResultRecord, Error> {
        let kind = exception.attr("Kind").map(str::to_owned);
        let check_id = exception.attr("CheckId").map(str::to_owned);
        let target = exception.attr("Target").map(str::to_owned);

        let mut exception_type = None;
        let mut exception_message = None;

        while let Some(child) = cursor.next_child("Exception")? {
            match child.name.as_str() {
                "Type" => exception_type = Some(cursor.element_text(&child)?),
                "ExceptionMessage" => exception_message = Some(cursor.element_text(&child)?),
                _ => cursor.skip_element(&child.name)?,
            }
        }

        let mut message = match (&kind, &check_id) {
            (Some(kind), Some(check_id)) => format!("{kind} check {check_id} raised an exception"),
            (Some(kind), None) => format!("{kind} raised an exception"),
            _ => "The analysis engine raised an exception".to_owned(),
        };
        if let Some(target) = &target {
            message.push_str(&format!(" while analyzing {target}"));
        }
        if let Some(exception_type) = exception_type.filter(|t| !t.is_empty()) {
            message.push_str(&format!(": {exception_type}"));
        }
        if let Some(text) = exception_message.filter(|t| !t.is_empty()) {
            message.push_str(&format!(": {text}"));
        }

        Ok(ResultRecord {
            rule_id: check_id,
            message,
            ..Default::default()
        })
    }
}

impl Default for FxCopConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::registry::Converter for FxCopConverter {
    fn tool_name(&self) -> &'static str {
        TOOL_NAME
    }

    fn convert(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn LogWriter,
    ) -> Result<(), Error> {
        let mut cursor = XmlCursor::new(input);
        let report = cursor.expect_start("FxCopReport")?;

        output.initialize(&ToolInfo {
            name: TOOL_NAME.to_owned(),
            version: report.attr("Version").map(str::to_owned),
        })?;
        output.open_results()?;

        let mut scope = Scope::default();
        self.read_children(&mut cursor, "FxCopReport", &mut scope, output)?;

        output.close_results()?;
        if !self.locations.is_empty() {
            output.write_logical_locations(self.locations.nodes())?;
        }

        Ok(())
    }
}
