//! Code analysis tool
//!
//! Scans a source file for lines carrying a given kind of marker (work
//! left to do, panicking calls, unsafe code) and reports each hit.

use super::{parameter_schema, read_source, MAX_SOURCE_SIZE};
use crate::tools::{text_result, Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Kind of marker to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Todo,
    Panic,
    Unsafe,
}

impl CheckType {
    fn markers(self) -> &'static [&'static str] {
        match self {
            CheckType::Todo => &["TODO", "FIXME", "XXX", "todo!("],
            CheckType::Panic => &["panic!(", "unwrap()", "expect(", "unreachable!(", "unimplemented!("],
            CheckType::Unsafe => &["unsafe "],
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckType::Todo => "todo",
            CheckType::Panic => "panic",
            CheckType::Unsafe => "unsafe",
        };
        f.write_str(name)
    }
}

/// Parameters for `analyze_code`
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeCodeParams {
    /// Path of the source file to analyze
    pub file_path: String,
    /// Which markers to report
    pub check_type: CheckType,
}

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub text: String,
}

/// Find lines containing any of the check's markers (1-based line numbers)
pub fn scan_lines(source: &str, check: CheckType) -> Vec<Finding> {
    let markers = check.markers();
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| markers.iter().any(|marker| line.contains(marker)))
        .map(|(index, line)| Finding {
            line: index + 1,
            text: line.trim().to_string(),
        })
        .collect()
}

fn format_report(file_path: &str, check: CheckType, findings: &[Finding]) -> String {
    let mut report = format!(
        "Analyzed {file_path} for {check} issues: found {}.",
        findings.len()
    );
    for finding in findings {
        report.push_str(&format!("\n{}: {}", finding.line, finding.text));
    }
    report
}

/// `analyze_code` builtin
pub struct AnalyzeCodeTool {
    max_file_size: u64,
}

impl Default for AnalyzeCodeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzeCodeTool {
    pub fn new() -> Self {
        Self {
            max_file_size: MAX_SOURCE_SIZE,
        }
    }
}

#[async_trait]
impl Tool for AnalyzeCodeTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "analyze_code".to_string(),
            description: "Analyze code for patterns and issues".to_string(),
            parameters: parameter_schema::<AnalyzeCodeParams>(),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let params: AnalyzeCodeParams = serde_json::from_value(parameters.clone())
            .map_err(|e| ToolError::ValidationError(e.to_string()))?;

        let source = read_source(Path::new(&params.file_path), self.max_file_size).await?;
        let findings = scan_lines(&source, params.check_type);

        Ok(text_result(format_report(
            &params.file_path,
            params.check_type,
            &findings,
        )))
    }
}
