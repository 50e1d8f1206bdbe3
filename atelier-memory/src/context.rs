//! Context assembly for generation prompts
//!
//! Before a generation, the orchestrator asks memory for everything that
//! should shape the new code: recent decisions, matching preferences, the
//! most similar snippets, and active constraints. Sections are concatenated
//! under delimited headers and capped to a character budget so the memory
//! never crowds out the actual request in the LLM context window.

use crate::domain::MemoryRecord;
use crate::store::ProjectMemory;

const SECTION_DECISIONS: &str = "=== RECENT DECISIONS ===";
const SECTION_PREFERENCES: &str = "=== PREFERENCES ===";
const SECTION_CODE: &str = "=== SIMILAR CODE ===";
const SECTION_CONSTRAINTS: &str = "=== ACTIVE CONSTRAINTS ===";

/// Assemble the memory context for a new generation request.
///
/// Returns an empty string for an empty collection.
pub fn context_for_generation(memory: &ProjectMemory, new_spec: &str, char_budget: usize) -> String {
    if memory.is_empty() {
        return String::new();
    }

    let mut sections: Vec<String> = Vec::new();

    let decisions = memory.recent_decisions(3);
    if !decisions.is_empty() {
        let mut lines = vec![SECTION_DECISIONS.to_string()];
        for stored in decisions {
            if let MemoryRecord::Decision {
                title, reasoning, ..
            } = &stored.record
            {
                lines.push(format!("- {}: {}", title, reasoning));
            }
        }
        sections.push(lines.join("\n"));
    }

    let preferences = memory.search_preferences(new_spec, 5);
    if !preferences.is_empty() {
        let mut lines = vec![SECTION_PREFERENCES.to_string()];
        for hit in preferences {
            if let MemoryRecord::Preference {
                category,
                key,
                value,
            } = &hit.record
            {
                lines.push(format!("- [{}] {} = {}", category, key, value));
            }
        }
        sections.push(lines.join("\n"));
    }

    let code = memory.search_code(new_spec, 3, None);
    if !code.is_empty() {
        let mut lines = vec![SECTION_CODE.to_string()];
        for hit in code {
            if let MemoryRecord::Code {
                filepath, snippet, ..
            } = &hit.record
            {
                let head: String = snippet.lines().take(12).collect::<Vec<_>>().join("\n");
                lines.push(format!("--- {} (score {:.2})\n{}", filepath, hit.score, head));
            }
        }
        sections.push(lines.join("\n"));
    }

    let constraints = memory.constraints();
    if !constraints.is_empty() {
        let mut lines = vec![SECTION_CONSTRAINTS.to_string()];
        for record in constraints {
            if let MemoryRecord::Constraint {
                description,
                severity,
            } = record
            {
                lines.push(format!("- ({:?}) {}", severity, description));
            }
        }
        sections.push(lines.join("\n"));
    }

    truncate_to_budget(sections.join("\n\n"), char_budget)
}

fn truncate_to_budget(text: String, budget: usize) -> String {
    if text.len() <= budget {
        return text;
    }
    let end = (0..=budget).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
    text[..end].to_string()
}
