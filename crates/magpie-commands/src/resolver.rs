//! Message-text resolution against one guild's trigger map.
//!
//! Two policies, in order: an exact hit on the first token after the
//! leading `!` marker, then containment of the longest registered
//! trigger name anywhere in the normalized text. Trigger names are
//! stored case-folded, so both policies compare lowercase-to-lowercase.

use std::collections::BTreeMap;

/// Reserved leading marker for explicit custom-command invocation.
pub const TRIGGER_MARKER: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A matched trigger borrowed from the guild map.
pub struct ResolvedCommand<'a> {
    pub name: &'a str,
    pub response: &'a str,
}

/// Trims and case-folds message text before matching.
pub fn normalize_message_text(text: &str) -> String {
    text.trim().to_lowercase()
}

fn prefix_candidate(normalized: &str) -> Option<&str> {
    let rest = normalized.strip_prefix(TRIGGER_MARKER)?;
    if rest.is_empty() {
        return None;
    }
    rest.split_whitespace().next()
}

/// Resolves `text` against `triggers`; `None` means no match, not an error.
pub fn resolve_in_map<'a>(
    triggers: &'a BTreeMap<String, String>,
    text: &str,
) -> Option<ResolvedCommand<'a>> {
    if triggers.is_empty() {
        return None;
    }
    let normalized = normalize_message_text(text);

    if let Some(candidate) = prefix_candidate(&normalized) {
        if let Some((name, response)) = triggers.get_key_value(candidate) {
            return Some(ResolvedCommand { name, response });
        }
    }

    // Longest name first so a short trigger cannot shadow a longer one
    // that contains it; equal lengths break toward the smaller name.
    let mut candidates: Vec<&String> = triggers.keys().collect();
    candidates.sort_by(|left, right| {
        right
            .chars()
            .count()
            .cmp(&left.chars().count())
            .then_with(|| left.cmp(right))
    });
    for name in candidates {
        if normalized.contains(name.as_str()) {
            let response = triggers.get(name)?;
            return Some(ResolvedCommand { name, response });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{normalize_message_text, resolve_in_map, ResolvedCommand};
    use std::collections::BTreeMap;

    fn triggers(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, response)| (name.to_string(), response.to_string()))
            .collect()
    }

    #[test]
    fn unit_normalize_message_text_trims_and_folds_case() {
        assert_eq!(normalize_message_text("  !Greet ALL  "), "!greet all");
    }

    #[test]
    fn functional_prefix_policy_matches_first_token_after_marker() {
        let map = triggers(&[("greet", "hello there")]);

        let resolved = resolve_in_map(&map, "!greet everyone").expect("prefix match");
        assert_eq!(
            resolved,
            ResolvedCommand {
                name: "greet",
                response: "hello there"
            }
        );
    }

    #[test]
    fn functional_prefix_policy_short_circuits_substring_policy() {
        let map = triggers(&[("cat", "A"), ("category", "B")]);

        let resolved = resolve_in_map(&map, "!cat please").expect("prefix match");
        assert_eq!(resolved.response, "A");
    }

    #[test]
    fn functional_substring_policy_prefers_longest_trigger() {
        let map = triggers(&[("cat", "A"), ("category", "B")]);

        let resolved = resolve_in_map(&map, "this is a category").expect("substring match");
        assert_eq!(resolved.response, "B");
    }

    #[test]
    fn unit_substring_policy_breaks_length_ties_lexicographically() {
        let map = triggers(&[("beta", "second"), ("alfa", "first")]);

        let resolved = resolve_in_map(&map, "alfa and beta both appear").expect("substring match");
        assert_eq!(resolved.name, "alfa");
    }

    #[test]
    fn unit_marker_alone_is_not_a_candidate() {
        let map = triggers(&[("greet", "hello")]);
        assert!(resolve_in_map(&map, "!").is_none());
        assert!(resolve_in_map(&map, "   !   ").is_none());
    }

    #[test]
    fn unit_no_match_returns_none() {
        let map = triggers(&[("greet", "hello")]);
        assert!(resolve_in_map(&map, "nothing to see here").is_none());
        assert!(resolve_in_map(&triggers(&[]), "!greet").is_none());
    }

    #[test]
    fn functional_substring_policy_is_case_insensitive() {
        let map = triggers(&[("lore", "the lore")]);

        let resolved = resolve_in_map(&map, "Tell me the LORE already").expect("substring match");
        assert_eq!(resolved.response, "the lore");
    }
}
