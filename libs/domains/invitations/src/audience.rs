//! Audience resolution: raw email input or a saved contact list in, a
//! deduplicated set of deliverable addresses out.

use crate::error::{InvitationError, InvitationResult};
use crate::models::{ContactList, SkipCounts};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .unwrap()
});

/// Trimmed, lowercased form used for comparison and storage.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(normalized: &str) -> bool {
    normalized.len() <= 254 && EMAIL.is_match(normalized)
}

/// Classification of a raw input list. Every input lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEmails {
    /// Normalized, first occurrence wins, input order kept.
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
    /// Raw entries whose normalized form was already in `valid`.
    pub duplicates: Vec<String>,
}

impl ResolvedEmails {
    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len() + self.duplicates.len()
    }
}

/// Members of a contact list mapped to addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedList {
    pub list_name: String,
    /// Members in the list, with or without an address.
    pub total: usize,
    pub emails: ResolvedEmails,
    pub missing_email_count: usize,
}

/// Stateless resolver bounded by a per-request member cap.
#[derive(Debug, Clone, Copy)]
pub struct AudienceResolver {
    limit: usize,
}

impl AudienceResolver {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn check_limit(&self, total: usize) -> InvitationResult<()> {
        if total > self.limit {
            return Err(InvitationError::ListTooLarge {
                total,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// The cap applies to distinct valid addresses, so repeats and typos in
    /// the raw input do not count against it.
    pub fn resolve_emails<S: AsRef<str>>(&self, input: &[S]) -> InvitationResult<ResolvedEmails> {
        let resolved = classify(input.iter().map(|s| s.as_ref()));
        self.check_limit(resolved.valid.len())?;
        Ok(resolved)
    }

    pub fn resolve_list(&self, list: &ContactList) -> InvitationResult<ResolvedList> {
        self.check_limit(list.members.len())?;

        let mut missing_email_count = 0;
        let addresses: Vec<&str> = list
            .members
            .iter()
            .filter_map(|member| match member.email.as_deref().map(str::trim) {
                Some(email) if !email.is_empty() => Some(email),
                _ => {
                    missing_email_count += 1;
                    None
                }
            })
            .collect();

        Ok(ResolvedList {
            list_name: list.name.clone(),
            total: list.members.len(),
            emails: classify(addresses.into_iter()),
            missing_email_count,
        })
    }
}

fn classify<'a>(input: impl Iterator<Item = &'a str>) -> ResolvedEmails {
    let mut resolved = ResolvedEmails::default();
    let mut seen = HashSet::new();

    for raw in input {
        let email = normalize_email(raw);
        if !is_valid_email(&email) {
            resolved.invalid.push(raw.to_string());
        } else if !seen.insert(email.clone()) {
            resolved.duplicates.push(raw.to_string());
        } else {
            resolved.valid.push(email);
        }
    }
    resolved
}

/// Drop addresses already invited to the thread. Returns the remaining
/// addresses and how many were removed.
pub fn exclude_already_invited(valid: Vec<String>, invited: &HashSet<String>) -> (Vec<String>, usize) {
    let before = valid.len();
    let remaining: Vec<String> = valid
        .into_iter()
        .filter(|email| !invited.contains(&normalize_email(email)))
        .collect();
    let removed = before - remaining.len();
    (remaining, removed)
}

impl From<&ResolvedEmails> for SkipCounts {
    fn from(resolved: &ResolvedEmails) -> Self {
        SkipCounts {
            invalid_email: resolved.invalid.len(),
            duplicate_input: resolved.duplicates.len(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactMember;
    use uuid::Uuid;

    fn list(members: Vec<Option<&str>>) -> ContactList {
        ContactList {
            id: Uuid::now_v7(),
            name: "Design team".to_string(),
            members: members
                .into_iter()
                .map(|email| ContactMember {
                    name: None,
                    email: email.map(String::from),
                })
                .collect(),
        }
    }

    #[test]
    fn test_case_insensitive_dedup() {
        let resolver = AudienceResolver::new(1000);
        let resolved = resolver.resolve_emails(&["a@x.com", "A@x.com", "bad"]).unwrap();

        assert_eq!(resolved.valid, vec!["a@x.com"]);
        assert_eq!(resolved.duplicates, vec!["A@x.com"]);
        assert_eq!(resolved.invalid, vec!["bad"]);
        assert_eq!(resolved.total(), 3);
    }

    #[test]
    fn test_every_input_is_accounted_for() {
        let resolver = AudienceResolver::new(1000);
        let input = vec![
            " Bob@Example.com ",
            "bob@example.com",
            "",
            "no-at-sign",
            "two@@example.com",
            "carol@example.co.uk",
            "CAROL@example.co.uk",
            "dave@localhost",
        ];
        let resolved = resolver.resolve_emails(&input).unwrap();

        assert_eq!(resolved.total(), input.len());
        assert_eq!(resolved.valid, vec!["bob@example.com", "carol@example.co.uk"]);
        let unique: HashSet<_> = resolved.valid.iter().collect();
        assert_eq!(unique.len(), resolved.valid.len());
    }

    /// Every sequence of up to four entries drawn from a mix of valid,
    /// case-variant, padded and malformed addresses.
    #[test]
    fn test_classification_holds_for_all_short_inputs() {
        const SHAPES: [&str; 7] = ["a@x.com", "A@X.COM", " a@x.com ", "b@y.org", "bad", "", "c@@x.com"];
        let resolver = AudienceResolver::new(1000);

        let mut layer: Vec<Vec<&str>> = vec![vec![]];
        let mut inputs = layer.clone();
        for _ in 0..4 {
            layer = layer
                .iter()
                .flat_map(|input| {
                    SHAPES.iter().map(move |shape| {
                        let mut next = input.clone();
                        next.push(*shape);
                        next
                    })
                })
                .collect();
            inputs.extend(layer.iter().cloned());
        }
        assert_eq!(inputs.len(), 1 + 7 + 49 + 343 + 2401);

        for input in &inputs {
            let resolved = resolver.resolve_emails(input).unwrap();

            assert_eq!(resolved.total(), input.len(), "{:?}", input);

            let unique: HashSet<&String> = resolved.valid.iter().collect();
            assert_eq!(unique.len(), resolved.valid.len(), "{:?}", input);

            let first_seen: Vec<String> = input
                .iter()
                .map(|raw| normalize_email(raw))
                .filter(|email| is_valid_email(email))
                .fold(Vec::new(), |mut seen, email| {
                    if !seen.contains(&email) {
                        seen.push(email);
                    }
                    seen
                });
            assert_eq!(resolved.valid, first_seen, "{:?}", input);

            assert!(resolved.invalid.iter().all(|raw| !is_valid_email(&normalize_email(raw))));
            assert!(
                resolved
                    .duplicates
                    .iter()
                    .all(|raw| resolved.valid.contains(&normalize_email(raw)))
            );
        }
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("first last@example.org"));
        assert!(!is_valid_email("@example.org"));
        assert!(!is_valid_email("user@-example.org"));
    }

    #[test]
    fn test_raw_input_over_limit_is_rejected() {
        let resolver = AudienceResolver::new(2);
        let err = resolver.resolve_emails(&["a@x.com", "b@x.com", "c@x.com"]).unwrap_err();
        assert!(matches!(err, InvitationError::ListTooLarge { total: 3, limit: 2 }));
    }

    #[test]
    fn test_limit_counts_distinct_valid_addresses() {
        let resolver = AudienceResolver::new(1000);
        let mut input: Vec<String> = (0..1001)
            .map(|i| if i % 2 == 0 { "a@x.com" } else { "B@x.com" }.to_string())
            .collect();
        input.push("not-an-email".to_string());

        let resolved = resolver.resolve_emails(&input).unwrap();
        assert_eq!(resolved.valid, vec!["a@x.com", "b@x.com"]);
        assert_eq!(resolved.duplicates.len(), 999);
        assert_eq!(resolved.total(), 1002);

        let distinct: Vec<String> = (0..1001).map(|i| format!("user{}@x.com", i)).collect();
        let err = resolver.resolve_emails(&distinct).unwrap_err();
        assert!(matches!(
            err,
            InvitationError::ListTooLarge {
                total: 1001,
                limit: 1000
            }
        ));
    }

    #[test]
    fn test_list_with_1001_members_is_rejected() {
        let resolver = AudienceResolver::new(1000);
        let emails: Vec<String> = (0..1001).map(|i| format!("user{}@x.com", i)).collect();
        let big = list(emails.iter().map(|e| Some(e.as_str())).collect());

        let err = resolver.resolve_list(&big).unwrap_err();
        assert!(matches!(
            err,
            InvitationError::ListTooLarge {
                total: 1001,
                limit: 1000
            }
        ));
    }

    #[test]
    fn test_list_counts_missing_emails() {
        let resolver = AudienceResolver::new(1000);
        let resolved = resolver
            .resolve_list(&list(vec![
                Some("a@x.com"),
                None,
                Some("   "),
                Some("A@X.com"),
                Some("broken"),
            ]))
            .unwrap();

        assert_eq!(resolved.total, 5);
        assert_eq!(resolved.missing_email_count, 2);
        assert_eq!(resolved.emails.valid, vec!["a@x.com"]);
        assert_eq!(resolved.emails.duplicates.len(), 1);
        assert_eq!(resolved.emails.invalid.len(), 1);
        assert_eq!(resolved.list_name, "Design team");
    }

    #[test]
    fn test_exclude_already_invited() {
        let invited: HashSet<String> = ["a@x.com".to_string()].into();
        let (remaining, removed) =
            exclude_already_invited(vec!["a@x.com".into(), "b@x.com".into()], &invited);
        assert_eq!(remaining, vec!["b@x.com"]);
        assert_eq!(removed, 1);
    }
}
