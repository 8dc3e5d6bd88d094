//! Small helpers shared by the public and admin form payloads

/// Fails with the label of the first field that is blank.
pub(crate) fn require_fields(fields: &[(&str, &str)]) -> Result<(), String> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((label, _)) => Err(format!("{} is required", label)),
        None => Ok(()),
    }
}

pub(crate) fn require_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err("Email must be a valid address".to_string()),
    }
}

/// Splits the comma separated text a form collects into trimmed entries.
pub(crate) fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Document keys end up inside storage paths, so only plain tokens are accepted.
pub(crate) fn is_document_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_blank_field_is_reported() {
        let err = require_fields(&[("Name", "Asha"), ("Email", "  "), ("Phone", "")]).unwrap_err();
        assert_eq!(err, "Email is required");
        assert!(require_fields(&[("Name", "Asha")]).is_ok());
    }

    #[test]
    fn team_member_text_is_split_and_trimmed() {
        assert_eq!(split_list(" Ravi ,Meena,, "), vec!["Ravi", "Meena"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn keys_with_separators_are_refused() {
        assert!(is_document_key("3f2a-bc_01"));
        assert!(!is_document_key("../messages"));
        assert!(!is_document_key("a/b"));
        assert!(!is_document_key(""));
    }

    #[test]
    fn email_needs_both_sides_of_the_at() {
        assert!(require_email("a@b.in").is_ok());
        assert!(require_email("a@").is_err());
        assert!(require_email("plain").is_err());
    }
}
