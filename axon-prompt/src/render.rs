//! `{name}` placeholder substitution and variable extraction (spec §6).

use std::collections::{HashMap, HashSet};

use regex::Regex;

fn placeholder_pattern() -> Regex {
    // `\w` excludes `-` and `.`, so `{x-y}`/`{x.y}` never match and are
    // left untouched as literal text, per spec §6.
    Regex::new(r"\{(\w+)\}").expect("static pattern is valid")
}

/// Substitute every `{name}` placeholder found in `template` with the
/// matching entry in `vars`. Placeholders with no matching entry are left
/// as literal text.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let pattern = placeholder_pattern();
    pattern
        .replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            vars.get(key).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// The distinct `{\w+}` variable names referenced by `template`, in first-
/// occurrence order. `{x-y}` and `{x.y}` style tokens are never extracted.
pub fn extract_variables(template: &str) -> Vec<String> {
    let pattern = placeholder_pattern();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in pattern.captures_iter(template) {
        let name = caps[1].to_string();
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_known_placeholders() {
        let rendered = render("Hello {name}, you are {role}.", &vars(&[("name", "Ava"), ("role", "assistant")]));
        assert_eq!(rendered, "Hello Ava, you are assistant.");
    }

    #[test]
    fn leaves_undefined_placeholders_literal() {
        let rendered = render("Hello {name}, {unknown} stays.", &vars(&[("name", "Ava")]));
        assert_eq!(rendered, "Hello Ava, {unknown} stays.");
    }

    #[test]
    fn does_not_substitute_hyphenated_or_dotted_tokens() {
        let rendered = render("{x-y} and {x.y} and {name}", &vars(&[("name", "Ava"), ("x-y", "nope"), ("x.y", "nope")]));
        assert_eq!(rendered, "{x-y} and {x.y} and Ava");
    }

    #[test]
    fn extract_variables_deduplicates_and_preserves_first_occurrence_order() {
        let vars = extract_variables("{b} then {a} then {b} again");
        assert_eq!(vars, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn extract_variables_excludes_hyphenated_and_dotted_tokens() {
        let vars = extract_variables("{core_memory} {x-y} {x.y} {name}");
        assert_eq!(vars, vec!["core_memory".to_string(), "name".to_string()]);
    }
}
