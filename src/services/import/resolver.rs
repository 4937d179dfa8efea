//! Column-to-field resolution.
//!
//! Import files name their columns every which way. A caller-supplied
//! mapping gets first say, then an ordered table of known header
//! spellings per canonical field. Resolution never fails; a field that
//! cannot be found comes back empty and is left to validation.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::parser::RawRow;

/// Known header spellings per canonical field, probed in order.
static FIELD_FALLBACKS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        (
            "firstName",
            &["firstName", "firstname", "First Name", "FIRST_NAME", "first_name"][..],
        ),
        (
            "lastName",
            &["lastName", "lastname", "Last Name", "LAST_NAME", "last_name"][..],
        ),
        (
            "phone",
            &["phone", "Phone", "Phone Number", "PHONE", "phone_number"][..],
        ),
        ("email", &["email", "Email", "EMAIL", "E-mail"][..]),
        (
            "leadSource",
            &["leadSource", "Lead Source", "lead_source", "source"][..],
        ),
        (
            "alt_phone",
            &["alt_phone", "altPhone", "Alt Phone", "alternate_phone"][..],
        ),
        ("tag", &["tag", "Tag", "tags"][..]),
        ("platform", &["platform", "Platform"][..]),
        ("activity", &["activity", "Activity"][..]),
    ])
});

/// Raw field values for one row after header resolution, before
/// validation. Everything is a trimmed string, empty means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFields {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub lead_source: String,
    pub alt_phone: String,
    pub tag: String,
    pub platform: String,
    pub activity: String,
}

pub fn resolve_row(row: &RawRow, mapping: Option<&HashMap<String, String>>) -> ResolvedFields {
    ResolvedFields {
        first_name: resolve_field(row, mapping, "firstName"),
        last_name: resolve_field(row, mapping, "lastName"),
        phone: resolve_field(row, mapping, "phone"),
        email: resolve_field(row, mapping, "email"),
        lead_source: resolve_field(row, mapping, "leadSource"),
        alt_phone: resolve_field(row, mapping, "alt_phone"),
        tag: resolve_field(row, mapping, "tag"),
        platform: resolve_field(row, mapping, "platform"),
        activity: resolve_field(row, mapping, "activity"),
    }
}

/// Resolve one canonical field. An explicit mapping entry wins first,
/// either naming a source column or standing in as a literal value when
/// it names none. A mapped column that exists but is empty falls
/// through to the fallback spellings.
pub fn resolve_field(
    row: &RawRow,
    mapping: Option<&HashMap<String, String>>,
    field: &str,
) -> String {
    if let Some(target) = mapping.and_then(|m| m.get(field)) {
        let target = target.trim();
        match row.get(target) {
            Some(value) if !value.trim().is_empty() => return value.trim().to_string(),
            Some(_) => {}
            None if !target.is_empty() => return target.to_string(),
            None => {}
        }
    }

    for header in FIELD_FALLBACKS.get(field).copied().unwrap_or(&[]) {
        if let Some(value) = row.get(*header) {
            if !value.trim().is_empty() {
                return value.trim().to_string();
            }
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn mapping_points_at_source_column() {
        let r = row(&[("Contact", "Jane"), ("firstName", "WRONG")]);
        let m = mapping(&[("firstName", "Contact")]);
        assert_eq!(resolve_field(&r, Some(&m), "firstName"), "Jane");
    }

    #[test]
    fn mapping_value_without_matching_column_is_a_literal() {
        let r = row(&[("First Name", "Jane")]);
        let m = mapping(&[("leadSource", "Facebook Ads")]);
        assert_eq!(resolve_field(&r, Some(&m), "leadSource"), "Facebook Ads");
    }

    #[test]
    fn empty_mapped_column_falls_through_to_spellings() {
        let r = row(&[("Contact", ""), ("firstname", "Jane")]);
        let m = mapping(&[("firstName", "Contact")]);
        assert_eq!(resolve_field(&r, Some(&m), "firstName"), "Jane");
    }

    #[test]
    fn fallback_spellings_probe_in_order() {
        // "firstname" precedes "First Name" in the table
        let r = row(&[("First Name", "FromSpaced"), ("firstname", "FromLower")]);
        assert_eq!(resolve_field(&r, None, "firstName"), "FromLower");
    }

    #[test]
    fn unresolvable_field_is_empty() {
        let r = row(&[("Unrelated", "x")]);
        assert_eq!(resolve_field(&r, None, "email"), "");
    }

    #[test]
    fn resolves_whole_row() {
        let r = row(&[
            ("First Name", "Jane"),
            ("Last Name", "Doe"),
            ("Phone", "555-010-0100"),
            ("Email", "JANE@X.COM"),
        ]);
        let fields = resolve_row(&r, None);
        assert_eq!(fields.first_name, "Jane");
        assert_eq!(fields.last_name, "Doe");
        assert_eq!(fields.phone, "555-010-0100");
        assert_eq!(fields.email, "JANE@X.COM");
        assert_eq!(fields.lead_source, "");
    }
}
