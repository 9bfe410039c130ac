//! Prompt-injection middleware.
//!
//! Takes a request envelope carrying `params.prompt` (and optionally
//! `params.system`), or the same two fields at the top level, recalls context
//! for the prompt, and prepends a markdown memory section to `system`. The
//! caller's original system text (or content blocks) is kept verbatim after
//! the section.

use serde_json::Value;

use crate::db::Database;
use crate::error::{MemoryError, Result};
use crate::memory::search::{get_context, ContextOptions, RecallContext};
use crate::memory::types::Memory;

/// Render recalled context as a system-prompt section. Empty context renders
/// as an empty string.
pub fn format_context(ctx: &RecallContext) -> String {
    if ctx.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Memory");
    if !ctx.rules.is_empty() {
        out.push_str("\n\n### Rules (always follow)\n");
        for rule in &ctx.rules {
            out.push_str(&format!("\n- {}", one_line(&rule.content)));
        }
    }
    if !ctx.memories.is_empty() {
        out.push_str("\n\n### Relevant memories\n");
        for memory in &ctx.memories {
            out.push_str(&format!("\n- {}", describe(memory)));
        }
    }
    out
}

fn describe(memory: &Memory) -> String {
    let mut line = format!("[{}] {}", memory.memory_type, one_line(&memory.content));
    if !memory.tags.is_empty() {
        line.push_str(&format!(" (tags: {})", memory.tags.join(", ")));
    }
    line
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The object holding `prompt`/`system`: `params` when present, else the root.
fn target_object(envelope: &mut Value) -> Result<&mut serde_json::Map<String, Value>> {
    let root = envelope
        .as_object_mut()
        .ok_or_else(|| MemoryError::validation("request envelope must be a JSON object"))?;
    if root.get("params").is_some_and(Value::is_object) {
        root.get_mut("params")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| MemoryError::validation("params must be a JSON object"))
    } else {
        Ok(root)
    }
}

/// The prompt text of an envelope, if it carries one.
pub fn extract_prompt(envelope: &Value) -> Option<&str> {
    let fields = match envelope.get("params") {
        Some(params) if params.is_object() => params,
        _ => envelope,
    };
    fields
        .get("prompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Merge `ctx` into the envelope's `system` field.
///
/// A string `system` becomes the formatted section, a blank line, then the
/// original text. An array of content blocks gets the section as a leading
/// text block, the original blocks following untouched. With no original it
/// is just the section; with nothing recalled the envelope is returned
/// unchanged. Any other `system` shape is rejected.
pub fn apply_context(mut envelope: Value, ctx: &RecallContext) -> Result<Value> {
    let section = format_context(ctx);
    let fields = target_object(&mut envelope)?;
    if section.is_empty() {
        return Ok(envelope);
    }

    let system = match fields.remove("system") {
        None | Some(Value::Null) => Value::String(section),
        Some(Value::String(original)) if original.is_empty() => Value::String(section),
        Some(Value::String(original)) => Value::String(format!("{section}\n\n{original}")),
        Some(Value::Array(blocks)) => {
            let mut merged = Vec::with_capacity(blocks.len() + 1);
            merged.push(serde_json::json!({"type": "text", "text": section}));
            merged.extend(blocks);
            Value::Array(merged)
        }
        Some(_) => {
            return Err(MemoryError::validation(
                "system must be a string or an array of content blocks",
            ))
        }
    };
    fields.insert("system".into(), system);
    Ok(envelope)
}

/// Recall context for the envelope's prompt and inject it.
pub fn inject_context(db: &dyn Database, envelope: Value, opts: &ContextOptions) -> Result<Value> {
    let ctx = get_context(db, extract_prompt(&envelope), opts)?;
    tracing::debug!(
        rules = ctx.rules.len(),
        memories = ctx.memories.len(),
        "injecting context into prompt"
    );
    apply_context(envelope, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::memory::store::{add, AddOptions};
    use crate::memory::types::MemoryType;
    use serde_json::json;

    fn seeded() -> std::sync::Arc<dyn Database> {
        let db = open_memory_database().unwrap();
        let rule = AddOptions {
            memory_type: Some(MemoryType::Rule),
            ..Default::default()
        };
        add(db.as_ref(), "Always run cargo fmt", &rule).unwrap();
        add(db.as_ref(), "The API uses axum", &AddOptions::default()).unwrap();
        db
    }

    #[test]
    fn enveloped_system_keeps_original_after_section() {
        let db = seeded();
        let envelope = json!({
            "method": "complete",
            "params": {"prompt": "how is the API built?", "system": "You are terse.\nBe kind."}
        });

        let out = inject_context(db.as_ref(), envelope, &ContextOptions::default()).unwrap();
        let system = out["params"]["system"].as_str().unwrap();
        assert!(system.starts_with("## Memory"));
        assert!(system.contains("Always run cargo fmt"));
        assert!(system.contains("[note] The API uses axum"));
        assert!(system.ends_with("\n\nYou are terse.\nBe kind."));
        assert_eq!(out["method"], "complete");
        assert_eq!(out["params"]["prompt"], "how is the API built?");
    }

    #[test]
    fn unenveloped_shape_is_supported() {
        let db = seeded();
        let out = inject_context(
            db.as_ref(),
            json!({"prompt": "axum"}),
            &ContextOptions::default(),
        )
        .unwrap();
        let system = out["system"].as_str().unwrap();
        assert!(system.starts_with("## Memory"));
        assert!(!system.ends_with("\n\n"));
    }

    #[test]
    fn empty_context_leaves_envelope_unchanged() {
        let db = open_memory_database().unwrap();
        let envelope = json!({"params": {"prompt": "hi", "system": "orig"}});
        let out = inject_context(db.as_ref(), envelope.clone(), &ContextOptions::default()).unwrap();
        assert_eq!(out, envelope);
    }

    #[test]
    fn content_block_system_keeps_original_blocks() {
        let db = seeded();
        let original = json!([{"type": "text", "text": "ORIGINAL INSTRUCTIONS"}]);
        let envelope = json!({"params": {"prompt": "hi", "system": original}});

        let out = inject_context(db.as_ref(), envelope, &ContextOptions::default()).unwrap();
        let blocks = out["params"]["system"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["type"], "text");
        assert!(blocks[0]["text"].as_str().unwrap().starts_with("## Memory"));
        assert_eq!(blocks[1], original[0]);
    }

    #[test]
    fn unsupported_system_shape_is_rejected() {
        let db = seeded();
        let envelope = json!({"params": {"prompt": "hi", "system": {"text": "keep me"}}});
        let err = inject_context(db.as_ref(), envelope, &ContextOptions::default()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn non_object_envelope_is_rejected() {
        let err = apply_context(json!("text"), &RecallContext::default()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn prompt_extraction() {
        assert_eq!(extract_prompt(&json!({"params": {"prompt": " x "}})), Some("x"));
        assert_eq!(extract_prompt(&json!({"prompt": "y"})), Some("y"));
        assert_eq!(extract_prompt(&json!({"params": {"prompt": 3}})), None);
        assert_eq!(extract_prompt(&json!({})), None);
    }
}
