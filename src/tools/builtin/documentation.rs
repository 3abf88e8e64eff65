//! Documentation generation tool
//!
//! Collects `///` item docs and `//!` module docs from a Rust source file
//! and renders them as markdown or plain text.

use super::{parameter_schema, read_source, MAX_SOURCE_SIZE};
use crate::tools::{text_result, Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Output format for generated documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    Markdown,
    Text,
}

/// Parameters for `generate_docs`
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateDocsParams {
    /// Path of the source file to document
    pub file_path: String,
    /// Rendering format
    pub format: DocFormat,
}

/// Extracted documentation for one file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileDocs {
    pub module: Vec<String>,
    pub items: Vec<ItemDoc>,
}

/// Doc comment attached to an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDoc {
    pub signature: String,
    pub doc: Vec<String>,
}

fn doc_line<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

/// Pull module docs and item docs out of source text
///
/// Attributes between a doc block and its item are skipped; the first
/// non-attribute line is taken as the item signature (trailing `{` removed).
pub fn extract_docs(source: &str) -> FileDocs {
    let mut docs = FileDocs::default();
    let mut pending: Vec<String> = Vec::new();

    for raw in source.lines() {
        let line = raw.trim();

        if let Some(text) = doc_line(line, "//!") {
            docs.module.push(text.to_string());
            continue;
        }

        if let Some(text) = doc_line(line, "///") {
            pending.push(text.to_string());
            continue;
        }

        if pending.is_empty() || line.starts_with("#[") {
            continue;
        }

        if line.is_empty() {
            // Detached doc block
            pending.clear();
            continue;
        }

        let signature = line
            .trim_end_matches('{')
            .trim_end_matches(';')
            .trim_end()
            .to_string();
        docs.items.push(ItemDoc {
            signature,
            doc: std::mem::take(&mut pending),
        });
    }

    docs
}

/// Render extracted docs
pub fn render(file_path: &str, docs: &FileDocs, format: DocFormat) -> String {
    let mut out = String::new();
    match format {
        DocFormat::Markdown => {
            out.push_str(&format!("# {file_path}\n"));
            if !docs.module.is_empty() {
                out.push('\n');
                out.push_str(&docs.module.join("\n"));
                out.push('\n');
            }
            for item in &docs.items {
                out.push_str(&format!("\n## `{}`\n\n", item.signature));
                out.push_str(&item.doc.join("\n"));
                out.push('\n');
            }
        }
        DocFormat::Text => {
            out.push_str(file_path);
            out.push('\n');
            for line in &docs.module {
                out.push_str(line);
                out.push('\n');
            }
            for item in &docs.items {
                out.push_str(&format!("\n{}\n", item.signature));
                for line in &item.doc {
                    out.push_str(&format!("    {line}\n"));
                }
            }
        }
    }
    out
}

/// `generate_docs` builtin
pub struct GenerateDocsTool {
    max_file_size: u64,
}

impl Default for GenerateDocsTool {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerateDocsTool {
    pub fn new() -> Self {
        Self {
            max_file_size: MAX_SOURCE_SIZE,
        }
    }
}

#[async_trait]
impl Tool for GenerateDocsTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "generate_docs".to_string(),
            description: "Generate documentation from code".to_string(),
            parameters: parameter_schema::<GenerateDocsParams>(),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let params: GenerateDocsParams = serde_json::from_value(parameters.clone())
            .map_err(|e| ToolError::ValidationError(e.to_string()))?;

        let source = read_source(Path::new(&params.file_path), self.max_file_size).await?;
        let docs = extract_docs(&source);

        Ok(text_result(render(&params.file_path, &docs, params.format)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = r#"//! Widget helpers

/// A widget
///
/// Widgets are small.
#[derive(Debug)]
pub struct Widget {
    size: u8,
}

/// Orphaned comment

fn private() {}

/// Build a widget
pub fn build(size: u8) -> Widget {
    Widget { size }
}
"#;

    #[test]
    fn test_extract_module_and_item_docs() {
        let docs = extract_docs(SOURCE);

        assert_eq!(docs.module, vec!["Widget helpers"]);
        assert_eq!(docs.items.len(), 2);
        assert_eq!(docs.items[0].signature, "pub struct Widget");
        assert_eq!(docs.items[0].doc, vec!["A widget", "", "Widgets are small."]);
        assert_eq!(docs.items[1].signature, "pub fn build(size: u8) -> Widget");
    }

    #[test]
    fn test_render_markdown() {
        let rendered = render("src/widget.rs", &extract_docs(SOURCE), DocFormat::Markdown);

        assert!(rendered.starts_with("# src/widget.rs\n"));
        assert!(rendered.contains("## `pub struct Widget`"));
        assert!(rendered.contains("Build a widget"));
    }

    #[test]
    fn test_render_text_indents_docs() {
        let rendered = render("src/widget.rs", &extract_docs(SOURCE), DocFormat::Text);

        assert!(rendered.contains("\npub fn build(size: u8) -> Widget\n    Build a widget\n"));
        assert!(!rendered.contains('#'));
    }

    #[test]
    fn test_source_without_docs() {
        let docs = extract_docs("fn main() {}\n");
        assert_eq!(docs, FileDocs::default());
    }

    #[tokio::test]
    async fn test_execute_renders_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.rs");
        std::fs::write(&path, SOURCE).unwrap();

        let result = GenerateDocsTool::new()
            .execute(&json!({"file_path": path.to_str().unwrap(), "format": "markdown"}))
            .await
            .unwrap();

        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("## `pub fn build(size: u8) -> Widget`"));
    }
}
