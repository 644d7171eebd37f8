//! Android Studio (IntelliJ inspection) converter.
//!
//! Inspection exports are a flat `problems` container of `problem` elements
//! whose children appear in no fixed order. Problems address code physically
//! (`file` + `line`) and logically (`module`/`package`/`entry_point`), so
//! this is the one built-in converter that fills the logical location table
//! up front and writes it before the result stream.

use crate::error::{Error, FormatError};
use crate::locations::{LogicalLocationTable, Segment};
use crate::model::{
    Level, Location, LocationKind, PhysicalLocation, Properties, Region, ResultRecord, ToolInfo,
};
use crate::writer::LogWriter;
use crate::xml::{Element, XmlCursor};
use std::io::BufRead;

pub const TOOL_NAME: &str = "AndroidStudio";

/// Inspection exports address files via an IDE path macro.
const PROJECT_DIR_URI_PREFIX: &str = "file://$PROJECT_DIR$/";

/// One `problem` element, fields in whatever order the export emitted them.
#[derive(Default)]
struct Problem {
    file: Option<String>,
    line: Option<u32>,
    module: Option<String>,
    package: Option<String>,
    entry_point_type: Option<String>,
    entry_point_name: Option<String>,
    severity: Option<String>,
    attribute_key: Option<String>,
    problem_class: Option<String>,
    hints: Vec<String>,
    description: Option<String>,
}

pub struct AndroidStudioConverter {
    locations: LogicalLocationTable,
}

impl AndroidStudioConverter {
    pub fn new() -> Self {
        Self {
            // IntelliJ renders logical paths like module\package\Class
            locations: LogicalLocationTable::new("\\"),
        }
    }

    fn read_problem<R: BufRead>(
        cursor: &mut XmlCursor<R>,
        problem: &Element,
    ) -> Result<Problem, Error> {
        let mut parsed = Problem::default();

        while let Some(child) = cursor.next_child("problem")? {
            match child.name.as_str() {
                "file" => parsed.file = Some(cursor.element_text(&child)?),
                "line" => {
                    let text = cursor.element_text(&child)?;
                    let line =
                        text.trim()
                            .parse::<i64>()
                            .map_err(|_| FormatError::InvalidValue {
                                offset: child.offset,
                                field: "line".to_owned(),
                                value: text.clone(),
                                expected: "an integer",
                            })?;
                    // file-level findings are reported as line 0; clamp to 1
                    parsed.line = Some(u32::try_from(line.max(1)).unwrap_or(u32::MAX));
                }
                "module" => parsed.module = Some(cursor.element_text(&child)?),
                "package" => parsed.package = Some(cursor.element_text(&child)?),
                "entry_point" => {
                    parsed.entry_point_type = child.attr("TYPE").map(str::to_owned);
                    parsed.entry_point_name = child.attr("FQNAME").map(str::to_owned);
                    cursor.skip_element("entry_point")?;
                }
                "problem_class" => {
                    parsed.severity = child.attr("severity").map(str::to_owned);
                    parsed.attribute_key = child.attr("attribute_key").map(str::to_owned);
                    parsed.problem_class = Some(cursor.element_text(&child)?);
                }
                "hints" => {
                    while let Some(hint) = cursor.next_child("hints")? {
                        if hint.name == "hint" {
                            if let Some(value) = hint.attr("value") {
                                parsed.hints.push(value.to_owned());
                            }
                            cursor.skip_element("hint")?;
                        } else {
                            cursor.skip_element(&hint.name)?;
                        }
                    }
                }
                "description" => parsed.description = Some(cursor.element_text(&child)?),
                _ => cursor.skip_element(&child.name)?,
            }
        }

        if parsed.problem_class.is_none() {
            return Err(FormatError::MissingField {
                offset: problem.offset,
                element: "problem".to_owned(),
                field: "problem_class".to_owned(),
            }
            .into());
        }
        // a line means nothing without the file it indexes into
        if parsed.line.is_some() && parsed.file.is_none() {
            return Err(FormatError::MissingField {
                offset: problem.offset,
                element: "problem".to_owned(),
                field: "file".to_owned(),
            }
            .into());
        }

        Ok(parsed)
    }

    fn normalize(&mut self, problem: &Problem) -> ResultRecord {
        let class = problem.problem_class.as_deref().unwrap_or_default();

        let level = match problem.severity.as_deref() {
            Some("ERROR") => Level::Error,
            Some("WARNING") | None => Level::Warning,
            Some("WEAK WARNING" | "INFO" | "INFORMATION" | "TYPO") => Level::Note,
            Some(other) => {
                log::warn!(
                    "unrecognized inspection severity {other:?}, defaulting to {}",
                    Level::Warning
                );
                Level::Warning
            }
        };

        let description = problem
            .description
            .clone()
            .unwrap_or_else(|| format!("Unknown problem of class {class}"));
        let mut message = description.clone();
        for hint in &problem.hints {
            // some inspections restate the description verbatim as a hint
            if *hint == description {
                continue;
            }
            message.push_str(&format!("\nHint: {hint}"));
        }

        let entry_type = problem.entry_point_type.as_deref();
        let entry_name = problem.entry_point_name.as_deref();

        // file-typed entry points stand in for a missing <file> element
        let entry_file = (entry_type == Some("file")).then_some(entry_name).flatten();
        let physical_location = problem.file.as_deref().or(entry_file).map(|file| {
            let uri = file.strip_prefix(PROJECT_DIR_URI_PREFIX).unwrap_or(file);
            PhysicalLocation::new(uri, problem.line.map(Region::from_line))
        });

        let mut segments = Vec::new();
        if let Some(module) = problem.module.as_deref() {
            segments.push(Segment::new(module, LocationKind::Module));
        }
        if let Some(package) = problem.package.as_deref() {
            segments.push(Segment::new(package, LocationKind::Package));
        }
        match (entry_type, entry_name) {
            (Some("class"), Some(name)) => segments.push(Segment::new(name, LocationKind::Type)),
            (Some("method"), Some(name)) => segments.push(Segment::new(name, LocationKind::Member)),
            (Some("file") | None, _) | (_, None) => {}
            (Some(other), Some(_)) => {
                log::debug!("ignoring entry point of unrecognized type {other:?}");
            }
        }
        let logical_location_index = self.locations.insert(&segments);

        let mut record = ResultRecord {
            rule_id: Some(class.to_owned()),
            level,
            message,
            ..Default::default()
        };
        if physical_location.is_some() || logical_location_index.is_some() {
            record.locations.push(Location {
                physical_location,
                logical_location_index,
            });
        }

        let mut properties = Properties::new();
        if let Some(severity) = &problem.severity {
            properties.insert("severity".to_owned(), severity.clone());
        }
        if let Some(attribute_key) = &problem.attribute_key {
            properties.insert("attributeKey".to_owned(), attribute_key.clone());
        }
        record.properties = properties;

        record
    }
}

impl Default for AndroidStudioConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::registry::Converter for AndroidStudioConverter {
    fn tool_name(&self) -> &'static str {
        TOOL_NAME
    }

    fn convert(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn LogWriter,
    ) -> Result<(), Error> {
        let mut cursor = XmlCursor::new(input);
        cursor.expect_start("problems")?;

        let mut problems = Vec::new();
        while let Some(child) = cursor.next_child("problems")? {
            if child.name == "problem" {
                problems.push(Self::read_problem(&mut cursor, &child)?);
            } else {
                log::debug!("skipping <{}> inside <problems>", child.name);
                cursor.skip_element(&child.name)?;
            }
        }

        let results: Vec<ResultRecord> = problems
            .iter()
            .map(|problem| self.normalize(problem))
            .collect();

        output.initialize(&ToolInfo::new(TOOL_NAME))?;
        if !self.locations.is_empty() {
            output.write_logical_locations(self.locations.nodes())?;
        }
        output.open_results()?;
        output.write_results(&results)?;
        output.close_results()?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::Converter;
    use crate::writer::ObjectWriter;

    fn convert(xml: &str) -> crate::model::ConversionRun {
        let mut writer = ObjectWriter::new();
        AndroidStudioConverter::new()
            .convert(&mut xml.as_bytes(), &mut writer)
            .unwrap();
        writer.into_run()
    }

    fn problems(body: &str) -> String {
        format!("<problems><problem>{body}</problem></problems>")
    }

    #[test]
    fn problem_fields_are_order_insensitive() {
        let run = convert(&problems(
            r#"
            <description>Hardcoded string</description>
            <line>12</line>
            <problem_class severity="WARNING" attribute_key="WARNING_ATTRIBUTES">HardCodedStringLiteral</problem_class>
            <file>file://$PROJECT_DIR$/app/src/Main.java</file>"#,
        ));

        let result = &run.results[0];
        assert_eq!(run.tool.name, "AndroidStudio");
        assert_eq!(result.rule_id.as_deref(), Some("HardCodedStringLiteral"));
        assert_eq!(result.level, Level::Warning);
        assert_eq!(result.message, "Hardcoded string");
        assert_eq!(result.properties["severity"], "WARNING");
        assert_eq!(result.properties["attributeKey"], "WARNING_ATTRIBUTES");

        let physical = result.locations[0].physical_location.as_ref().unwrap();
        assert_eq!(physical.uri, "app/src/Main.java");
        assert_eq!(physical.region.as_ref().unwrap().start_line, Some(12));
    }

    #[test]
    fn zero_and_negative_lines_clamp_to_one() {
        for line in ["0", "-4"] {
            let run = convert(&problems(&format!(
                r#"
                <file>a.java</file>
                <line>{line}</line>
                <problem_class severity="ERROR">Broken</problem_class>"#
            )));
            let physical = run.results[0].locations[0]
                .physical_location
                .as_ref()
                .unwrap();
            assert_eq!(physical.region.as_ref().unwrap().start_line, Some(1));
        }
    }

    #[test]
    fn line_without_file_is_rejected() {
        let mut writer = ObjectWriter::new();
        let err = AndroidStudioConverter::new()
            .convert(
                &mut problems(
                    r#"<line>3</line><problem_class severity="ERROR">C</problem_class>"#,
                )
                .as_bytes(),
                &mut writer,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::MissingField { field, .. }) if field == "file"
        ));
    }

    #[test]
    fn missing_problem_class_is_rejected() {
        let mut writer = ObjectWriter::new();
        let err = AndroidStudioConverter::new()
            .convert(
                &mut problems("<file>a.java</file>").as_bytes(),
                &mut writer,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::MissingField { field, .. }) if field == "problem_class"
        ));
    }

    #[test]
    fn logical_path_spans_module_package_and_entry_point() {
        let run = convert(&problems(
            r#"
            <module>app</module>
            <package>com.example</package>
            <entry_point TYPE="method" FQNAME="com.example.Widget.render()"/>
            <problem_class severity="WARNING">UnusedDeclaration</problem_class>
            <description>Method is never used</description>"#,
        ));

        let result = &run.results[0];
        let index = result.locations[0].logical_location_index.unwrap();
        let leaf = &run.logical_locations[index];
        assert_eq!(leaf.kind, LocationKind::Member);
        assert_eq!(
            leaf.fully_qualified_name,
            "app\\com.example\\com.example.Widget.render()"
        );

        // module and package chain above the entry point
        let package = &run.logical_locations[leaf.parent_index.unwrap()];
        assert_eq!(package.kind, LocationKind::Package);
        assert_eq!(run.logical_locations[package.parent_index.unwrap()].name, "app");
    }

    #[test]
    fn file_entry_point_stands_in_for_a_missing_file() {
        let run = convert(&problems(
            r#"
            <entry_point TYPE="file" FQNAME="file://$PROJECT_DIR$/res/layout/main.xml"/>
            <problem_class severity="WARNING">UnusedResources</problem_class>
            <description>Unused layout</description>"#,
        ));
        let physical = run.results[0].locations[0]
            .physical_location
            .as_ref()
            .unwrap();
        assert_eq!(physical.uri, "res/layout/main.xml");
        assert!(physical.region.is_none());
    }

    #[test]
    fn hints_append_without_restating_the_description() {
        let run = convert(&problems(
            r#"
            <file>a.java</file>
            <problem_class severity="WEAK WARNING">Simplify</problem_class>
            <description>Expression can be simplified</description>
            <hints>
              <hint value="Expression can be simplified"/>
              <hint value="Replace with constant"/>
            </hints>"#,
        ));
        let result = &run.results[0];
        assert_eq!(result.level, Level::Note);
        assert_eq!(
            result.message,
            "Expression can be simplified\nHint: Replace with constant"
        );
    }

    #[test]
    fn unknown_severity_defaults_to_warning() {
        let run = convert(&problems(
            r#"
            <file>a.java</file>
            <problem_class severity="SERVER PROBLEM">Odd</problem_class>
            <description>d</description>"#,
        ));
        assert_eq!(run.results[0].level, Level::Warning);
        assert_eq!(run.results[0].properties["severity"], "SERVER PROBLEM");
    }

    #[test]
    fn missing_description_falls_back_to_the_class() {
        let run = convert(&problems(
            r#"<file>a.java</file><problem_class severity="ERROR">Broken</problem_class>"#,
        ));
        assert_eq!(run.results[0].message, "Unknown problem of class Broken");
    }

    #[test]
    fn problems_sharing_a_module_share_table_nodes() {
        let run = convert(
            r#"<problems>
              <problem>
                <module>app</module>
                <entry_point TYPE="class" FQNAME="com.example.A"/>
                <problem_class severity="WARNING">W1</problem_class>
              </problem>
              <problem>
                <module>app</module>
                <entry_point TYPE="class" FQNAME="com.example.B"/>
                <problem_class severity="WARNING">W2</problem_class>
              </problem>
            </problems>"#,
        );

        // one shared module node, two class leaves
        assert_eq!(run.logical_locations.len(), 3);
        assert_eq!(
            run.results[0].locations[0].logical_location_index,
            Some(1)
        );
        assert_eq!(
            run.results[1].locations[0].logical_location_index,
            Some(2)
        );
    }
}
