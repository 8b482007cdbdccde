//! `{{placeholder}}` substitution shared by email and WhatsApp templates.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::contacts::Contact;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Invalid placeholder regex")
});

/// Variables drawn from a contact. Missing optional fields render as empty.
pub fn contact_variables(contact: &Contact) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("firstName".to_string(), contact.first_name.clone());
    vars.insert("lastName".to_string(), contact.last_name.clone());
    vars.insert("fullName".to_string(), contact.full_name());
    vars.insert("email".to_string(), contact.email.clone());
    vars.insert(
        "phone".to_string(),
        contact.phone.clone().unwrap_or_default(),
    );
    vars.insert(
        "company".to_string(),
        contact.company.clone().unwrap_or_default(),
    );
    vars.insert(
        "position".to_string(),
        contact.position.clone().unwrap_or_default(),
    );
    vars
}

/// Replaces known placeholders; unknown ones are left as written.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Contact fields first, caller-supplied variables on top.
pub fn merged_variables(
    contact: Option<&Contact>,
    extra: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut vars = contact.map(contact_variables).unwrap_or_default();
    vars.extend(extra);
    vars
}

/// Placeholder names used by a template, in first-seen order.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_REGEX.captures_iter(template) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::CreateContactRequest;
    use chrono::Utc;

    fn contact() -> Contact {
        Contact::from_request(
            CreateContactRequest {
                first_name: Some("Siti".into()),
                last_name: Some("Rahma".into()),
                email: Some("siti@example.com".into()),
                company: Some("Toko Maju".into()),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_render_contact_fields() {
        let vars = contact_variables(&contact());
        assert_eq!(
            render("Hi {{firstName}} from {{ company }}!", &vars),
            "Hi Siti from Toko Maju!"
        );
        assert_eq!(render("{{fullName}}", &vars), "Siti Rahma");
    }

    #[test]
    fn test_unknown_placeholders_untouched() {
        let vars = contact_variables(&contact());
        assert_eq!(
            render("Code: {{promoCode}} / {{ phone }}", &vars),
            "Code: {{promoCode}} / "
        );
    }

    #[test]
    fn test_extra_variables_override() {
        let c = contact();
        let mut extra = HashMap::new();
        extra.insert("promoCode".to_string(), "HEMAT10".to_string());
        extra.insert("firstName".to_string(), "Bu Siti".to_string());
        let vars = merged_variables(Some(&c), extra);
        assert_eq!(render("{{firstName}}: {{promoCode}}", &vars), "Bu Siti: HEMAT10");
    }

    #[test]
    fn test_placeholders_listed_once() {
        assert_eq!(
            placeholders("{{a}} {{b}} {{a}} {not}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
