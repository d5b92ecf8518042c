//! Key/entry name transforms.
//!
//! Managed keys are `camelCase`; external entry names are `dash-case`.
//! [`to_dash_case`] is the canonical transform used when a schema is
//! finalized; [`to_camel_case`] is its inverse for well-formed names.

/// Convert a `camelCase` key to its `dash-case` external name.
///
/// A dash is inserted between any letter and a following uppercase
/// letter, then the whole name is lowercased: `fooBar` → `foo-bar`,
/// `innerHTML` → `inner-h-t-m-l`.
#[must_use]
pub fn to_dash_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    let mut prev_alpha = false;
    for ch in name.chars() {
        if prev_alpha && ch.is_ascii_uppercase() {
            out.push('-');
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
        prev_alpha = ch.is_ascii_alphabetic();
    }
    out
}

/// Convert a `dash-case` entry name back to a `camelCase` key.
///
/// A dash followed by a letter is dropped and the letter uppercased;
/// any other dash is kept as-is.
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        match chars.peek() {
            Some(&next) if ch == '-' && next.is_ascii_alphabetic() => {
                chars.next();
                out.extend(next.to_uppercase());
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_case_simple() {
        assert_eq!(to_dash_case("fooBar"), "foo-bar");
        assert_eq!(to_dash_case("disabled"), "disabled");
    }

    #[test]
    fn dash_case_leading_capital() {
        assert_eq!(to_dash_case("FooBar"), "foo-bar");
    }

    #[test]
    fn dash_case_consecutive_capitals() {
        assert_eq!(to_dash_case("innerABC"), "inner-a-b-c");
    }

    #[test]
    fn dash_case_preserves_existing_dashes() {
        assert_eq!(to_dash_case("foo-bar"), "foo-bar");
    }

    #[test]
    fn camel_case_simple() {
        assert_eq!(to_camel_case("foo-bar"), "fooBar");
        assert_eq!(to_camel_case("disabled"), "disabled");
    }

    #[test]
    fn camel_case_ignores_dash_before_non_letter() {
        assert_eq!(to_camel_case("foo-1"), "foo-1");
    }

    #[test]
    fn transforms_invert_for_well_formed_names() {
        for key in ["fooBar", "aButtonLabel", "count"] {
            assert_eq!(to_camel_case(&to_dash_case(key)), key);
        }
    }
}
