//! Identifier handling: snake-casing, quoting and pascal-casing.
//!
//! Identifiers are strings provided by the caller, trusted to name a table
//! or column but never free-form SQL. [`quote_ident`] is the single place
//! that policy is enforced; every other part of the crate that needs to put
//! a bare name into SQL text goes through it.

/// Quote an identifier per the policy:
///
/// - already-quoted (`"..."`) passes through unchanged.
/// - otherwise, if it contains an uppercase ASCII letter anywhere, split on
///   `.`, snake-case each segment, quote each, rejoin with `.`.
/// - otherwise, replace `.` with `"."` and wrap the whole thing in quotes.
///
/// This collapses mixed-case identifiers to snake_case quoted form and
/// leaves pre-quoted or already-snake identifiers untouched.
///
/// Note the uppercase check looks at the *entire* string, not per dot
/// segment — a caller mixing a pre-snake table with a PascalCase column in
/// one dotted string will have both segments snake-cased. This mirrors the
/// source system's behavior rather than a more "obvious" per-segment check;
/// see the open item in `SPEC_FULL.md`/spec.md §9.
pub fn quote_ident(name: &str) -> String {
    if name.starts_with('"') && name.ends_with('"') && name.len() >= 2 {
        return name.to_string();
    }

    if name.chars().any(|c| c.is_ascii_uppercase()) {
        name.split('.')
            .map(|seg| format!("\"{}\"", to_snake_case(seg)))
            .collect::<Vec<_>>()
            .join(".")
    } else {
        format!("\"{}\"", name.replace('.', "\".\""))
    }
}

/// Convert a string to snake_case.
///
/// Inserts an underscore before an uppercase letter that follows a
/// lowercase letter or digit (so `userId` -> `user_id`, `HTTPStatus` ->
/// `http_status` is *not* attempted — consecutive uppercase letters are
/// left together other than the final one in a run that starts a new word,
/// matching common camelCase-to-snake_case conversion).
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev_is_lower_or_digit = i > 0
                && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase());
            let prev_is_upper = i > 0 && chars[i - 1].is_ascii_uppercase();
            if i > 0 && (prev_is_lower_or_digit || (prev_is_upper && next_is_lower)) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a snake_case (or any) identifier to PascalCase, used for
/// generated enum type names (spec.md §6/§8 scenario 7).
pub fn to_pascal_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '-')
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Convert a snake_case row key to camelCase, the default JSON row key
/// transform applied by [`crate::exec::run`] (spec.md §4.8).
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_passthrough_already_quoted() {
        assert_eq!(quote_ident(r#""Weird Name""#), r#""Weird Name""#);
    }

    #[test]
    fn quote_plain_lowercase() {
        assert_eq!(quote_ident("users"), r#""users""#);
    }

    #[test]
    fn quote_dotted_lowercase() {
        assert_eq!(quote_ident("a.b"), r#""a"."b""#);
    }

    #[test]
    fn quote_mixed_case_snake_cases_and_dots() {
        assert_eq!(quote_ident("userId"), r#""user_id""#);
        assert_eq!(quote_ident("Table.userId"), r#""table"."user_id""#);
    }

    #[test]
    fn snake_case_basic() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("HTMLParser"), "html_parser");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn pascal_case_basic() {
        assert_eq!(to_pascal_case("order_status"), "OrderStatus");
        assert_eq!(to_pascal_case("status"), "Status");
    }

    #[test]
    fn camel_case_basic() {
        assert_eq!(to_camel_case("created_at"), "createdAt");
        assert_eq!(to_camel_case("id"), "id");
    }
}
