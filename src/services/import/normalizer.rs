//! Row validation and normalization.

use crate::types::import::{ImportError, LeadCandidate};

use super::resolver::ResolvedFields;

/// Least digits a phone may carry after stripping formatting.
pub const MIN_PHONE_DIGITS: usize = 10;

/// Validate one resolved row into an insertable candidate, or reject it
/// with its 1-based data row number. A bad email never rejects the row;
/// the field is dropped instead.
pub fn normalize_row(fields: ResolvedFields, row_number: u32) -> Result<LeadCandidate, ImportError> {
    if fields.first_name.is_empty() || fields.last_name.is_empty() || fields.phone.is_empty() {
        return Err(ImportError {
            row: row_number,
            reason: "Missing required field: first name, last name and phone are mandatory"
                .to_string(),
        });
    }

    let phone = match normalize_phone(&fields.phone) {
        Some(digits) => digits,
        None => {
            return Err(ImportError {
                row: row_number,
                reason: format!("Invalid phone number: fewer than {} digits", MIN_PHONE_DIGITS),
            })
        }
    };

    Ok(LeadCandidate {
        source_row: row_number,
        first_name: fields.first_name,
        last_name: fields.last_name,
        phone,
        email: normalize_email(&fields.email),
        alt_phone: optional(fields.alt_phone),
        lead_source: optional(fields.lead_source),
        tag: optional(fields.tag),
        platform: optional(fields.platform),
        activity: optional(fields.activity),
        star: 1,
    })
}

/// Strip everything but digits; `None` when what remains is too short
/// to be a dialable number.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        None
    } else {
        Some(digits)
    }
}

/// Trimmed, lowercased and shape-checked (`local@domain.tld`).
/// `None` for anything that does not look like an address.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    let (host, tld) = domain.rsplit_once('.')?;
    if host.is_empty() || tld.is_empty() {
        return None;
    }
    Some(email)
}

fn optional(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(first: &str, last: &str, phone: &str, email: &str) -> ResolvedFields {
        ResolvedFields {
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_complete_row() {
        let candidate =
            normalize_row(fields("Jane", "Doe", "(555) 010-0100", "JANE@X.COM"), 1).unwrap();
        assert_eq!(candidate.phone, "5550100100");
        assert_eq!(candidate.email.as_deref(), Some("jane@x.com"));
        assert_eq!(candidate.star, 1);
        assert_eq!(candidate.lead_source, None);
        assert_eq!(candidate.source_row, 1);
    }

    #[test]
    fn rejects_missing_first_name() {
        let err = normalize_row(fields("", "Doe", "5550100100", ""), 3).unwrap_err();
        assert_eq!(err.row, 3);
        assert!(err.reason.contains("Missing required field"));
    }

    #[test]
    fn rejects_short_phone() {
        let err = normalize_row(fields("Jane", "Doe", "555-0100", ""), 2).unwrap_err();
        assert_eq!(err.row, 2);
        assert!(err.reason.contains("phone number"));
    }

    #[test]
    fn bad_email_is_dropped_not_fatal() {
        let candidate = normalize_row(fields("Jane", "Doe", "5550100100", "not-an-email"), 1).unwrap();
        assert_eq!(candidate.email, None);
    }

    #[test]
    fn phone_strips_formatting() {
        assert_eq!(
            normalize_phone("+1 (555) 010-0100").as_deref(),
            Some("15550100100")
        );
        assert_eq!(normalize_phone("555-0100"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn email_shape_checks() {
        assert_eq!(normalize_email("  JANE@X.COM  ").as_deref(), Some("jane@x.com"));
        assert_eq!(normalize_email("a@b"), None);
        assert_eq!(normalize_email("a b@x.com"), None);
        assert_eq!(normalize_email("@x.com"), None);
        assert_eq!(normalize_email("a@x."), None);
        assert_eq!(normalize_email(""), None);
    }
}
