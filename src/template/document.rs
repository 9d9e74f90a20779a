//! Hybrid template documents.
//!
//! ````text
//! A {style} picture of {subject}.
//!
//! ```template.subject
//! a {color} cat
//! ```
//!
//! ```json
//! {"templates": {"data": {"style": ["watercolor", "ink"], "color": ["red"]}}}
//! ```
//! ````
//!
//! Text outside fenced blocks becomes the entrypoint. `template.<name>`
//! blocks become string data entries and must precede the single JSON block.

use tracing::debug;

use super::{DataValue, Entrypoint, Template};
use crate::{PromptError, PromptResult};

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";
const TEMPLATE_FENCE: &str = "```template.";

#[derive(Debug, PartialEq)]
enum Block {
    Outside,
    Json,
    Named(String),
}

pub fn parse_document(text: &str) -> PromptResult<Template> {
    let mut block = Block::Outside;
    let mut json_seen = false;
    let mut json_lines = Vec::new();
    let mut named_lines: Vec<&str> = Vec::new();
    let mut entry_lines = Vec::new();
    let mut named: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.starts_with(JSON_FENCE) {
            if json_seen {
                return Err(PromptError::template(
                    "Multiple JSON code blocks found in template document.",
                ));
            }
            if let Block::Named(name) = std::mem::replace(&mut block, Block::Json) {
                named.push((name, named_lines.join("\n").trim().to_string()));
                named_lines.clear();
            }
            json_seen = true;
            continue;
        }
        if let Some(name) = stripped.strip_prefix(TEMPLATE_FENCE) {
            if json_seen {
                return Err(PromptError::template(
                    "Template blocks must be before the JSON block.",
                ));
            }
            let next = Block::Named(name.trim().to_string());
            if let Block::Named(previous) = std::mem::replace(&mut block, next) {
                named.push((previous, named_lines.join("\n").trim().to_string()));
                named_lines.clear();
            }
            continue;
        }
        if stripped.starts_with(FENCE) && block != Block::Outside {
            if let Block::Named(name) = std::mem::replace(&mut block, Block::Outside) {
                named.push((name, named_lines.join("\n").trim().to_string()));
                named_lines.clear();
            }
            continue;
        }
        match block {
            Block::Outside => entry_lines.push(line),
            Block::Json => json_lines.push(line),
            Block::Named(_) => named_lines.push(line),
        }
    }

    if block != Block::Outside {
        return Err(PromptError::template(
            "Unclosed code block in template document.",
        ));
    }
    let json = json_lines.join("\n");
    let json = json.trim();
    if json.is_empty() {
        return Err(PromptError::template(
            "No JSON code block found in template document.",
        ));
    }
    let mut template: Template = serde_json::from_str(json).map_err(|e| {
        PromptError::template(format!(
            "Failed to parse JSON code block in template document: {}",
            e
        ))
    })?;

    let entrypoint = entry_lines.join("\n");
    let entrypoint = entrypoint.trim();
    if entrypoint.is_empty() {
        return Err(PromptError::template(
            "No entrypoint content found outside the JSON code block.",
        ));
    }
    template.entrypoint = Some(Entrypoint::Text(entrypoint.to_string()));

    debug!("Parsed document with {} named template blocks", named.len());
    for (name, body) in named {
        template.templates.data.insert(name, DataValue::Text(body));
    }
    Ok(template)
}
