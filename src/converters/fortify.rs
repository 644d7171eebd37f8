//! Fortify report converter.
//!
//! Fortify report XML wraps its findings in arbitrarily nested report
//! sections, but every finding is an `Issue` element with a fixed child
//! order: category and kingdom first, optional abstracts and priority, then
//! the mandatory `Primary` trace location and an optional `Source`. The
//! converter scans for issues wherever they appear and parses each one
//! strictly.

use crate::error::{Error, FormatError};
use crate::model::{
    CodeFlow, Level, Location, PhysicalLocation, Properties, Region, ResultRecord, ToolInfo,
};
use crate::writer::LogWriter;
use crate::xml::{Element, Node, XmlCursor};
use regex::Regex;
use std::collections::BTreeSet;
use std::io::BufRead;

pub const TOOL_NAME: &str = "Fortify";

pub struct FortifyConverter {
    /// Fortify cites CWE mappings as free text, e.g. "CWE ID 79, CWE ID 80".
    cwe_pattern: Regex,
}

impl FortifyConverter {
    pub fn new() -> Self {
        Self {
            cwe_pattern: Regex::new(r"CWE ID (\d+)").unwrap(),
        }
    }

    /// Recursively descends report sections, emitting a result per `Issue`.
    fn scan<R: BufRead>(
        &self,
        cursor: &mut XmlCursor<R>,
        parent: &str,
        output: &mut dyn LogWriter,
    ) -> Result<(), Error> {
        while let Some(child) = cursor.next_child(parent)? {
            if child.name == "Issue" {
                let result = self.read_issue(cursor, &child)?;
                output.write_results(std::slice::from_ref(&result))?;
            } else {
                let name = child.name.clone();
                self.scan(cursor, &name, output)?;
            }
        }

        Ok(())
    }

    fn read_issue<R: BufRead>(
        &self,
        cursor: &mut XmlCursor<R>,
        issue: &Element,
    ) -> Result<ResultRecord, Error> {
        let fortify_rule_id = issue.attr("ruleID").map(str::to_owned);

        let category = required_text(cursor, "Category")?;
        // folder is a UI grouping, required by the format but not meaningful
        required_text(cursor, "Folder")?;
        let kingdom = required_text(cursor, "Kingdom")?;

        let abstract_text = optional_text(cursor, "Abstract")?;
        let abstract_custom = optional_text(cursor, "AbstractCustom")?;
        let priority = optional_text(cursor, "Friority")?;

        // analyst annotations, zero or more of each
        loop {
            let name = match cursor.peek()? {
                Node::Start(next) if next.name == "Tag" || next.name == "Comment" => {
                    next.name.clone()
                }
                _ => break,
            };
            cursor.next_node()?;
            cursor.skip_element(&name)?;
        }

        let primary_element = cursor.expect_start("Primary")?;
        let primary = read_path_element(cursor, &primary_element)?;

        let source = match cursor.peek()? {
            Node::Start(next) if next.name == "Source" => {
                let element = cursor.expect_start("Source")?;
                Some(read_path_element(cursor, &element)?)
            }
            _ => None,
        };

        // remaining children: pick out the CWE mapping, skip the rest
        let mut cwe_ids = BTreeSet::new();
        while let Some(child) = cursor.next_child("Issue")? {
            if child.name == "ExternalCategory" && child.attr("type") == Some("CWE") {
                let text = cursor.element_text(&child)?;
                cwe_ids.extend(
                    self.cwe_pattern
                        .captures_iter(&text)
                        .filter_map(|capture| capture[1].parse::<u32>().ok()),
                );
            } else {
                cursor.skip_element(&child.name)?;
            }
        }

        let message = match (abstract_text, abstract_custom) {
            (Some(general), Some(custom)) => format!("{general}\n{custom}"),
            (Some(general), None) => general,
            (None, Some(custom)) => custom,
            (None, None) => format!("Fortify reported a {category} issue."),
        };

        let level = match priority.as_deref() {
            Some("Critical" | "High") => Level::Error,
            Some("Medium") | None => Level::Warning,
            Some("Low") => Level::Note,
            Some(other) => {
                log::warn!(
                    "unrecognized Fortify priority {other:?}, defaulting to {}",
                    Level::Warning
                );
                Level::Warning
            }
        };

        let mut properties = Properties::new();
        properties.insert("kingdom".to_owned(), kingdom);
        if let Some(priority) = priority {
            properties.insert("priority".to_owned(), priority);
        }
        if let Some(rule_id) = fortify_rule_id {
            properties.insert("fortifyRuleId".to_owned(), rule_id);
        }
        if !cwe_ids.is_empty() {
            let joined = cwe_ids
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            properties.insert("cwe".to_owned(), joined);
        }

        // a source turns the finding into a two-step source→sink flow; the
        // sink stays the primary location either way
        let code_flow =
            source.map(|source| CodeFlow::essential([source, primary.clone()]));

        let mut record = ResultRecord {
            rule_id: Some(category),
            level,
            message,
            properties,
            code_flow,
            ..Default::default()
        };
        record.locations.push(Location {
            physical_location: Some(primary),
            logical_location_index: None,
        });

        Ok(record)
    }
}

impl Default for FortifyConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::registry::Converter for FortifyConverter {
    fn tool_name(&self) -> &'static str {
        TOOL_NAME
    }

    fn convert(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn LogWriter,
    ) -> Result<(), Error> {
        let mut cursor = XmlCursor::new(input);
        cursor.expect_start("ReportDefinition")?;

        output.initialize(&ToolInfo::new(TOOL_NAME))?;
        output.open_results()?;
        self.scan(&mut cursor, "ReportDefinition", output)?;
        output.close_results()?;

        Ok(())
    }
}

fn required_text<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    name: &str,
) -> Result<String, FormatError> {
    let element = cursor.expect_start(name)?;
    cursor.element_text(&element)
}

fn optional_text<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    name: &str,
) -> Result<Option<String>, FormatError> {
    if !matches!(cursor.peek()?, Node::Start(next) if next.name == name) {
        return Ok(None);
    }

    let element = cursor.expect_start(name)?;
    cursor.element_text(&element).map(Some)
}

/// A Fortify trace location: `FilePath` is mandatory, `LineStart` optional.
fn read_path_element<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    element: &Element,
) -> Result<PhysicalLocation, Error> {
    let mut file_path = None;
    let mut line = None;

    while let Some(child) = cursor.next_child(&element.name)? {
        match child.name.as_str() {
            "FilePath" => file_path = Some(cursor.element_text(&child)?),
            "LineStart" => {
                let text = cursor.element_text(&child)?;
                let parsed =
                    text.trim()
                        .parse::<u32>()
                        .map_err(|_| FormatError::InvalidValue {
                            offset: child.offset,
                            field: "LineStart".to_owned(),
                            value: text.clone(),
                            expected: "a line number",
                        })?;
                line = Some(parsed);
            }
            _ => cursor.skip_element(&child.name)?,
        }
    }

    let file_path = file_path.ok_or_else(|| FormatError::MissingField {
        offset: element.offset,
        element: element.name.clone(),
        field: "FilePath".to_owned(),
    })?;

    Ok(PhysicalLocation::new(file_path, line.map(Region::from_line)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::StepImportance;
    use crate::registry::Converter;
    use crate::writer::ObjectWriter;

    fn convert(xml: &str) -> crate::model::ConversionRun {
        let mut writer = ObjectWriter::new();
        FortifyConverter::new()
            .convert(&mut xml.as_bytes(), &mut writer)
            .unwrap();
        writer.into_run()
    }

    fn issue(body: &str) -> String {
        format!(
            r#"<ReportDefinition><ReportSection><SubSection>
              <Issue ruleID="R1">{body}</Issue>
            </SubSection></ReportSection></ReportDefinition>"#
        )
    }

    const MINIMAL_BODY: &str = r#"
        <Category>SQL Injection</Category>
        <Folder>High</Folder>
        <Kingdom>Input Validation</Kingdom>
        <Primary><FilePath>src/db.rs</FilePath><LineStart>40</LineStart></Primary>"#;

    #[test]
    fn minimal_issue_uses_the_fallback_message() {
        let run = convert(&issue(MINIMAL_BODY));
        let result = &run.results[0];

        assert_eq!(run.tool.name, "Fortify");
        assert_eq!(result.rule_id.as_deref(), Some("SQL Injection"));
        assert_eq!(result.message, "Fortify reported a SQL Injection issue.");
        assert_eq!(result.properties["kingdom"], "Input Validation");
        assert_eq!(result.properties["fortifyRuleId"], "R1");
        // no Friority element, documented default applies
        assert_eq!(result.level, Level::Warning);
        assert!(result.code_flow.is_none());

        let physical = result.locations[0].physical_location.as_ref().unwrap();
        assert_eq!(physical.uri, "src/db.rs");
        assert_eq!(physical.region.as_ref().unwrap().start_line, Some(40));
    }

    #[test]
    fn both_abstracts_concatenate_with_a_newline() {
        let run = convert(&issue(
            r#"
            <Category>XSS</Category>
            <Folder>High</Folder>
            <Kingdom>Encoding</Kingdom>
            <Abstract>Unsanitized input.</Abstract>
            <AbstractCustom>Seen in the login form.</AbstractCustom>
            <Primary><FilePath>a.jsp</FilePath></Primary>"#,
        ));
        assert_eq!(
            run.results[0].message,
            "Unsanitized input.\nSeen in the login form."
        );
    }

    #[test]
    fn priority_maps_to_level() {
        for (priority, level) in [
            ("Critical", Level::Error),
            ("High", Level::Error),
            ("Medium", Level::Warning),
            ("Low", Level::Note),
            ("Unheard-of", Level::Warning),
        ] {
            let run = convert(&issue(&format!(
                r#"
                <Category>C</Category>
                <Folder>F</Folder>
                <Kingdom>K</Kingdom>
                <Friority>{priority}</Friority>
                <Primary><FilePath>a.c</FilePath></Primary>"#
            )));
            assert_eq!(run.results[0].level, level, "priority {priority}");
            assert_eq!(run.results[0].properties["priority"], priority);
        }
    }

    #[test]
    fn source_and_sink_become_an_essential_code_flow() {
        let run = convert(&issue(
            r#"
            <Category>SQL Injection</Category>
            <Folder>High</Folder>
            <Kingdom>Input Validation</Kingdom>
            <Primary><FilePath>sink.rs</FilePath><LineStart>9</LineStart></Primary>
            <Source><FilePath>source.rs</FilePath><LineStart>2</LineStart></Source>"#,
        ));
        let result = &run.results[0];

        let flow = result.code_flow.as_ref().unwrap();
        assert_eq!(flow.steps.len(), 2);
        assert_eq!(flow.steps[0].location.uri, "source.rs");
        assert_eq!(flow.steps[1].location.uri, "sink.rs");
        assert!(flow
            .steps
            .iter()
            .all(|step| step.importance == StepImportance::Essential));

        // the sink remains the primary location
        assert_eq!(
            result.locations[0].physical_location.as_ref().unwrap().uri,
            "sink.rs"
        );
    }

    #[test]
    fn cwe_ids_are_extracted_sorted_and_deduplicated() {
        let run = convert(&issue(
            r#"
            <Category>C</Category>
            <Folder>F</Folder>
            <Kingdom>K</Kingdom>
            <Primary><FilePath>a.c</FilePath></Primary>
            <ExternalCategory type="CWE">Relates to CWE ID 352, CWE ID 79 and CWE ID 352</ExternalCategory>"#,
        ));
        assert_eq!(run.results[0].properties["cwe"], "79, 352");
    }

    #[test]
    fn non_cwe_external_category_is_ignored() {
        let run = convert(&issue(
            r#"
            <Category>C</Category>
            <Folder>F</Folder>
            <Kingdom>K</Kingdom>
            <Primary><FilePath>a.c</FilePath></Primary>
            <ExternalCategory type="OWASP">A1</ExternalCategory>"#,
        ));
        assert!(!run.results[0].properties.contains_key("cwe"));
    }

    #[test]
    fn missing_category_is_a_format_error() {
        let mut writer = ObjectWriter::new();
        let err = FortifyConverter::new()
            .convert(
                &mut issue("<Kingdom>K</Kingdom>").as_bytes(),
                &mut writer,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn analyst_tags_and_unknown_trailers_are_skipped() {
        let run = convert(&issue(
            r#"
            <Category>C</Category>
            <Folder>F</Folder>
            <Kingdom>K</Kingdom>
            <Tag><Name>Audited</Name></Tag>
            <Comment>looks real</Comment>
            <Primary><FilePath>a.c</FilePath></Primary>
            <TraceDiagramPath>diagram.png</TraceDiagramPath>"#,
        ));
        assert_eq!(run.results.len(), 1);
    }
}
