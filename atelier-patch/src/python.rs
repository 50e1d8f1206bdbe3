//! Python AST comparison via tree-sitter

use std::collections::BTreeMap;
use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::{Patch, PatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefKind {
    Function,
    Class,
}

#[derive(Debug, Clone)]
struct Definition {
    kind: DefKind,
    start_byte: usize,
    end_byte: usize,
}

/// Whether structured patches can be generated for this path
pub fn supports_structured_patch(filepath: &str) -> bool {
    filepath.ends_with(".py")
}

fn python_parser() -> Result<Parser, PatchError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| PatchError::Parse(format!("Failed to load Python grammar: {}", e)))?;
    Ok(parser)
}

/// Harvest top-level function and class definitions by name.
///
/// Decorated definitions count as their inner definition; the byte range
/// spans the decorators so extraction and replacement keep them intact.
fn top_level_definitions(source: &str) -> Result<BTreeMap<String, Definition>, PatchError> {
    let mut parser = python_parser()?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| PatchError::Parse("Failed to parse Python source".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(PatchError::Parse("Python source has syntax errors".to_string()));
    }

    let mut definitions = BTreeMap::new();
    let mut cursor = root.walk();

    for child in root.named_children(&mut cursor) {
        let (def_node, range_node) = match child.kind() {
            "function_definition" | "class_definition" => (child, child),
            "decorated_definition" => match child.child_by_field_name("definition") {
                Some(inner) => (inner, child),
                None => continue,
            },
            _ => continue,
        };

        let kind = match def_node.kind() {
            "function_definition" => DefKind::Function,
            "class_definition" => DefKind::Class,
            _ => continue,
        };

        if let Some(name) = definition_name(&def_node, source) {
            definitions.insert(
                name,
                Definition {
                    kind,
                    start_byte: range_node.start_byte(),
                    end_byte: range_node.end_byte(),
                },
            );
        }
    }

    Ok(definitions)
}

fn definition_name(node: &Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| source[n.byte_range()].to_string())
}

fn segment<'a>(source: &'a str, def: &Definition) -> &'a str {
    &source[def.start_byte..def.end_byte]
}

/// Produce the minimal patch turning `old_content` into `new_content`.
///
/// Exactly one added definition yields an Add; exactly one definition whose
/// source changed yields a Replace. Deletions, multiple changes, syntax
/// errors on either side, and unsupported languages all yield FullReplace.
pub fn generate_patch(old_content: &str, new_content: &str, filepath: &str) -> Patch {
    if !supports_structured_patch(filepath) {
        return Patch::full_replace(new_content);
    }

    let (old_defs, new_defs) = match (
        top_level_definitions(old_content),
        top_level_definitions(new_content),
    ) {
        (Ok(old), Ok(new)) => (old, new),
        _ => {
            debug!(filepath, "Syntax error on one side, using full replacement");
            return Patch::full_replace(new_content);
        }
    };

    let added: Vec<&String> = new_defs.keys().filter(|n| !old_defs.contains_key(*n)).collect();
    let removed: Vec<&String> = old_defs.keys().filter(|n| !new_defs.contains_key(*n)).collect();
    let modified: Vec<&String> = old_defs
        .keys()
        .filter(|name| {
            new_defs.get(*name).is_some_and(|new_def| {
                segment(new_content, new_def) != segment(old_content, &old_defs[*name])
            })
        })
        .collect();

    if removed.is_empty() && modified.is_empty() && added.len() == 1 {
        let name = added[0].clone();
        let def = &new_defs[&name];
        let source = segment(new_content, def).to_string();
        return match def.kind {
            DefKind::Function => Patch::FunctionAdd { name, source },
            DefKind::Class => Patch::ClassAdd { name, source },
        };
    }

    if removed.is_empty() && added.is_empty() && modified.len() == 1 {
        let name = modified[0].clone();
        let def = &new_defs[&name];
        let source = segment(new_content, def).to_string();
        return match def.kind {
            DefKind::Function => Patch::FunctionReplace { name, source },
            DefKind::Class => Patch::ClassReplace { name, source },
        };
    }

    debug!(
        filepath,
        added = added.len(),
        removed = removed.len(),
        modified = modified.len(),
        "Change too wide for a structured patch"
    );
    Patch::full_replace(new_content)
}

/// Splice a replacement definition into the old content by byte range.
pub(crate) fn replace_definition(
    old_content: &str,
    name: &str,
    source: &str,
) -> Result<String, PatchError> {
    let definitions = top_level_definitions(old_content)?;
    let def = definitions
        .get(name)
        .ok_or_else(|| PatchError::Inapplicable(format!("No top-level definition '{}'", name)))?;

    let mut result = String::with_capacity(old_content.len() + source.len());
    result.push_str(&old_content[..def.start_byte]);
    result.push_str(source);
    result.push_str(&old_content[def.end_byte..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply_patch;

    #[test]
    fn test_function_replace_detected_and_applied() {
        let old = "def calculate(x):\n    return x * 2\n";
        let new = "def calculate(x):\n    return x * 3\n";

        let patch = generate_patch(old, new, "main.py");
        assert_eq!(patch.target(), Some("calculate"));
        assert!(matches!(patch, Patch::FunctionReplace { .. }));

        let applied = apply_patch(old, &patch).unwrap();
        assert_eq!(applied, new);
    }

    #[test]
    fn test_function_add_detected_and_applied() {
        let old = "def foo():\n    pass\n";
        let new = "def foo():\n    pass\n\n\ndef bar():\n    return 42\n";

        let patch = generate_patch(old, new, "main.py");
        assert_eq!(patch.target(), Some("bar"));
        assert!(matches!(patch, Patch::FunctionAdd { .. }));

        let applied = apply_patch(old, &patch).unwrap();
        let defs = top_level_definitions(&applied).unwrap();
        assert!(defs.contains_key("foo"));
        assert!(defs.contains_key("bar"));
    }

    #[test]
    fn test_class_replace() {
        let old = "class Store:\n    limit = 10\n";
        let new = "class Store:\n    limit = 20\n";

        let patch = generate_patch(old, new, "models.py");
        assert!(matches!(patch, Patch::ClassReplace { .. }));
        assert_eq!(apply_patch(old, &patch).unwrap(), new);
    }

    #[test]
    fn test_replace_touches_only_the_target() {
        let old = "def first():\n    return 1\n\n\ndef second():\n    return 2\n";
        let new = "def first():\n    return 1\n\n\ndef second():\n    return 22\n";

        let patch = generate_patch(old, new, "main.py");
        assert_eq!(patch.target(), Some("second"));

        let applied = apply_patch(old, &patch).unwrap();
        assert_eq!(applied, new);
        // The untouched definition keeps its exact bytes
        assert!(applied.starts_with("def first():\n    return 1\n"));
    }

    #[test]
    fn test_patch_safety_applied_output_parses() {
        let old = "def handler(req):\n    return req\n";
        let new = "def handler(req):\n    return validate(req)\n";

        let patch = generate_patch(old, new, "routes.py");
        let applied = apply_patch(old, &patch).unwrap();
        assert!(top_level_definitions(&applied).is_ok());
    }

    #[test]
    fn test_multiple_changes_fall_back_to_full_replace() {
        let old = "def a():\n    return 1\n\n\ndef b():\n    return 2\n";
        let new = "def a():\n    return 10\n\n\ndef b():\n    return 20\n";

        let patch = generate_patch(old, new, "main.py");
        assert!(matches!(patch, Patch::FullReplace { .. }));
    }

    #[test]
    fn test_deletion_falls_back_to_full_replace() {
        let old = "def a():\n    return 1\n\n\ndef b():\n    return 2\n";
        let new = "def a():\n    return 1\n";

        let patch = generate_patch(old, new, "main.py");
        assert!(matches!(patch, Patch::FullReplace { .. }));
    }

    #[test]
    fn test_syntax_error_falls_back_to_full_replace() {
        let old = "def g(:\n";
        let new = "def g():\n    return 1\n";

        let patch = generate_patch(old, new, "bad.py");
        assert!(matches!(patch, Patch::FullReplace { .. }));
    }

    #[test]
    fn test_unsupported_language_falls_back() {
        let patch = generate_patch("const a = 1;", "const a = 2;", "app.jsx");
        assert!(matches!(patch, Patch::FullReplace { .. }));
    }

    #[test]
    fn test_decorated_definition_keeps_decorators() {
        let old = "@app.get('/items')\ndef list_items():\n    return []\n";
        let new = "@app.get('/items')\ndef list_items():\n    return ITEMS\n";

        let patch = generate_patch(old, new, "main.py");
        assert_eq!(patch.target(), Some("list_items"));

        let applied = apply_patch(old, &patch).unwrap();
        assert_eq!(applied, new);
        assert!(applied.starts_with("@app.get('/items')"));
    }

    #[test]
    fn test_replace_missing_target_is_inapplicable() {
        let result = replace_definition("def a():\n    pass\n", "zzz", "def zzz():\n    pass");
        assert!(matches!(result, Err(PatchError::Inapplicable(_))));
    }
}
