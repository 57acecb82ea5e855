//! Identifier normalization.
//!
//! States, machines and triggers are addressed by a canonical kebab-case key
//! derived from their display name, so `"My First State"`, `"myFirstState"`
//! and `"my_first_state"` all resolve to `my-first-state`.

/// Separator between a state id and a trigger id in a local trigger key.
pub const KEY_SEPARATOR: char = ':';

/// Normalize a display name into its canonical lookup key.
///
/// Words are split on any non-alphanumeric character, on case changes
/// (`gotoThree` → `goto-three`, `XMLHttp` → `xml-http`) and on letter/digit
/// boundaries (`goto3` → `goto-3`). Apostrophes are dropped rather than
/// treated as separators. The result is lowercase and joined with `-`.
///
/// # Example
///
/// ```rust
/// use fusium::core::normalize_id;
///
/// assert_eq!(normalize_id("my first state"), "my-first-state");
/// assert_eq!(normalize_id("gotoThree"), "goto-three");
/// assert_eq!(normalize_id("__Next__"), "next");
/// ```
pub fn normalize_id(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !is_apostrophe(*c)).collect();

    let mut words = Vec::new();
    for chunk in cleaned.split(|c: char| !c.is_alphanumeric()) {
        split_words(chunk, &mut words);
    }
    words.join("-")
}

/// Build the key under which a state stores a local transition.
///
/// ```rust
/// use fusium::core::local_trigger_key;
///
/// assert_eq!(local_trigger_key("idle", "Start Work"), "idle:start-work");
/// ```
pub fn local_trigger_key(state_id: &str, trigger_id: &str) -> String {
    format!("{state_id}{KEY_SEPARATOR}{}", normalize_id(trigger_id))
}

/// Recover the normalized trigger id from a local or global trigger key.
pub fn bare_trigger(key: &str) -> &str {
    key.rsplit_once(KEY_SEPARATOR).map_or(key, |(_, trigger)| trigger)
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}')
}

fn split_words(chunk: &str, words: &mut Vec<String>) {
    let chars: Vec<char> = chunk.chars().collect();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && !current.is_empty() && is_boundary(chars[i - 1], c, chars.get(i + 1).copied())
        {
            words.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
}

fn is_boundary(prev: char, c: char, next: Option<char>) -> bool {
    (prev.is_lowercase() && c.is_uppercase())
        || (prev.is_uppercase() && c.is_uppercase() && next.is_some_and(char::is_lowercase))
        || (prev.is_alphabetic() && c.is_numeric())
        || (prev.is_numeric() && c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_become_dashes() {
        assert_eq!(normalize_id("my first state machine"), "my-first-state-machine");
    }

    #[test]
    fn camel_case_is_split() {
        assert_eq!(normalize_id("gotoThree"), "goto-three");
        assert_eq!(normalize_id("GotoThree"), "goto-three");
    }

    #[test]
    fn acronyms_keep_together() {
        assert_eq!(normalize_id("XMLHttpRequest"), "xml-http-request");
        assert_eq!(normalize_id("ABC"), "abc");
    }

    #[test]
    fn digits_are_separate_words() {
        assert_eq!(normalize_id("goto3"), "goto-3");
        assert_eq!(normalize_id("state 2b"), "state-2-b");
    }

    #[test]
    fn separators_are_collapsed_and_trimmed() {
        assert_eq!(normalize_id("  --Next__Step!! "), "next-step");
        assert_eq!(normalize_id("a.b/c"), "a-b-c");
    }

    #[test]
    fn apostrophes_are_dropped() {
        assert_eq!(normalize_id("don't stop"), "dont-stop");
    }

    #[test]
    fn empty_and_symbol_only_names_normalize_to_empty() {
        assert_eq!(normalize_id(""), "");
        assert_eq!(normalize_id("--- ***"), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_id("My First-State_Machine2");
        assert_eq!(normalize_id(&once), once);
    }

    #[test]
    fn local_key_prefixes_state_id() {
        assert_eq!(local_trigger_key("my-first-state", "next"), "my-first-state:next");
        assert_eq!(local_trigger_key("s1", "Go Back"), "s1:go-back");
    }

    #[test]
    fn bare_trigger_strips_state_prefix() {
        assert_eq!(bare_trigger("my-first-state:next"), "next");
        assert_eq!(bare_trigger("goto-3"), "goto-3");
    }
}
