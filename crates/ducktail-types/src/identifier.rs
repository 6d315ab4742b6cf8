//! Identifier sanitizer for names spliced into generated SQL.
//!
//! Attachment names, object and table names, and unique-key lists are
//! interpolated as bare identifiers, so they are restricted to
//! `[A-Za-z0-9_.]+` (target-side names additionally allow `,` for
//! composite keys). Free-form `query` text is never passed through here;
//! it is a trust boundary the caller must police.

use crate::error::ConfigError;

fn check(name: &str, allow_comma: bool) -> Result<&str, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyIdentifier);
    }
    for ch in name.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || (allow_comma && ch == ',');
        if !ok {
            return Err(ConfigError::InvalidIdentifier {
                value: name.to_string(),
                invalid: ch,
            });
        }
    }
    Ok(name)
}

/// Validate `name` as a bare SQL identifier and return it unchanged.
///
/// # Errors
///
/// Returns [`ConfigError::EmptyIdentifier`] for `""` and
/// [`ConfigError::InvalidIdentifier`] for any character outside
/// `[A-Za-z0-9_.]`.
pub fn sanitize(name: &str) -> Result<&str, ConfigError> {
    check(name, false)
}

/// Like [`sanitize`], but also accepts `,` for composite key lists.
///
/// # Errors
///
/// Same as [`sanitize`], with `,` permitted.
pub fn sanitize_target(name: &str) -> Result<&str, ConfigError> {
    check(name, true)
}

/// Split a comma-separated key list (`"id,region"`) into sanitized columns.
///
/// # Errors
///
/// Fails if the list or any element is empty or contains a disallowed
/// character.
pub fn split_key_list(keys: &str) -> Result<Vec<&str>, ConfigError> {
    sanitize_target(keys)?;
    keys.split(',').map(sanitize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("orders")]
    #[case("public.orders")]
    #[case("pgsrc")]
    #[case("_tmp_2024")]
    #[case("db.schema.Table_1")]
    fn accepts_plain_identifiers(#[case] name: &str) {
        assert_eq!(sanitize(name).unwrap(), name);
    }

    #[rstest]
    #[case("a;DROP TABLE")]
    #[case("")]
    #[case("my table")]
    #[case("my-table")]
    #[case("x'y")]
    #[case("a,b")]
    fn rejects_unsafe_identifiers(#[case] name: &str) {
        assert!(sanitize(name).is_err(), "{name:?} should be rejected");
    }

    #[test]
    fn empty_is_its_own_error() {
        assert_eq!(sanitize(""), Err(ConfigError::EmptyIdentifier));
    }

    #[test]
    fn target_allows_comma() {
        assert_eq!(sanitize_target("id,region").unwrap(), "id,region");
        assert!(sanitize_target("id, region").is_err());
    }

    #[test]
    fn key_list_splits_and_rejects_empty_parts() {
        assert_eq!(split_key_list("id,region").unwrap(), vec!["id", "region"]);
        assert_eq!(split_key_list("id").unwrap(), vec!["id"]);
        assert_eq!(split_key_list("id,,x"), Err(ConfigError::EmptyIdentifier));
        assert_eq!(split_key_list(","), Err(ConfigError::EmptyIdentifier));
    }

    proptest! {
        #[test]
        fn allowed_alphabet_round_trips_unchanged(name in "[A-Za-z0-9_.]{1,40}") {
            prop_assert_eq!(sanitize(&name).unwrap(), name.as_str());
        }

        #[test]
        fn any_disallowed_char_is_rejected(
            prefix in "[A-Za-z0-9_.]{0,10}",
            bad in "[ ;'\"\\-()*/=]",
            suffix in "[A-Za-z0-9_.]{0,10}",
        ) {
            let name = format!("{prefix}{bad}{suffix}");
            let rejected = matches!(sanitize(&name), Err(ConfigError::InvalidIdentifier { .. }));
            prop_assert!(rejected);
        }
    }
}
