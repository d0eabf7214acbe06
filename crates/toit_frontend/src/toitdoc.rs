// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Toitdoc scanning used by the type & deprecation checker: recognizing
//! a leading `Deprecated.`/`Deprecated:` paragraph and extracting the
//! message it sets on the declaration.

/// If `toitdoc`'s first paragraph opens with `Deprecated.` or
/// `Deprecated:`, returns the paragraph with that marker stripped and
/// trimmed — the synthetic deprecation message attached to the
/// declaration. Otherwise returns `None`.
#[must_use]
pub fn deprecation_message(toitdoc: &str) -> Option<&str> {
    let first_paragraph = toitdoc.split("\n\n").next().unwrap_or(toitdoc).trim();
    for marker in ["Deprecated.", "Deprecated:"] {
        if let Some(rest) = first_paragraph.strip_prefix(marker) {
            let message = rest.trim();
            return Some(if message.is_empty() { first_paragraph } else { message });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_both_markers() {
        assert_eq!(deprecation_message("Deprecated. Use `bar` instead."), Some("Use `bar` instead."));
        assert_eq!(deprecation_message("Deprecated: use `bar` instead."), Some("use `bar` instead."));
    }

    #[test]
    fn ignores_unmarked_toitdoc() {
        assert_eq!(deprecation_message("Computes the frobnication factor."), None);
    }

    #[test]
    fn only_the_first_paragraph_is_considered() {
        let toitdoc = "A regular summary.\n\nDeprecated. Not actually, this is a later paragraph.";
        assert_eq!(deprecation_message(toitdoc), None);
    }

    #[test]
    fn bare_marker_with_no_trailing_text_returns_the_paragraph() {
        assert_eq!(deprecation_message("Deprecated."), Some("Deprecated."));
    }
}
