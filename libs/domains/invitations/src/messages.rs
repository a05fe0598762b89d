//! User-facing English copy: error messages and `message_for_chat` sentences.

use crate::models::{ActionSummary, ActionType, Decision, ExecutionResult, PendingStatus, SkipCounts};

pub fn invalid_source_type(value: &str) -> String {
    format!("\"{}\" is not a valid source. Use \"emails\" or \"list\".", value)
}

pub fn no_valid_emails(total: usize, skipped: &SkipCounts) -> String {
    match skip_phrase(skipped) {
        Some(reasons) => format!("None of the {} entries can be invited ({}).", total, reasons),
        None => "No email addresses were provided.".to_string(),
    }
}

pub fn list_too_large(total: usize, limit: usize) -> String {
    format!(
        "This audience has {} recipients; the limit is {}. Split it into smaller lists.",
        total, limit
    )
}

pub fn list_not_found() -> String {
    "That contact list does not exist.".to_string()
}

pub fn thread_not_found() -> String {
    "That thread does not exist.".to_string()
}

pub fn pending_action_not_found() -> String {
    "No pending action matches this token.".to_string()
}

pub fn already_processed(status: PendingStatus) -> String {
    format!("This action was already {}.", status)
}

pub fn expired() -> String {
    "This confirmation has expired. Prepare the action again.".to_string()
}

pub fn cancelled() -> String {
    "This action was cancelled and cannot be executed.".to_string()
}

pub fn not_confirmed() -> String {
    "Confirm this action before executing it.".to_string()
}

pub fn invalid_decision(decision: &str, allowed: &[Decision]) -> String {
    let allowed: Vec<String> = allowed.iter().map(|d| format!("\"{}\"", d)).collect();
    format!("\"{}\" is not a valid decision here. Use {}.", decision, allowed.join(" or "))
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

/// "2 invalid, 1 duplicate" or `None` when nothing was skipped.
fn skip_phrase(skipped: &SkipCounts) -> Option<String> {
    let parts: Vec<String> = [
        (skipped.invalid_email, "invalid"),
        (skipped.duplicate_input, "duplicate"),
        (skipped.missing_email, "without an email"),
        (skipped.already_invited, "already invited"),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{} {}", n, label))
    .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
}

pub fn prepared(summary: &ActionSummary) -> String {
    let head = match summary.action_type {
        ActionType::SendInvites => format!(
            "Ready to create \"{}\" and invite {}.",
            summary.title,
            plural(summary.valid, "person", "people")
        ),
        ActionType::AddInvites => format!(
            "Ready to invite {} to \"{}\".",
            plural(summary.valid, "person", "people"),
            summary.title
        ),
        ActionType::AddSlots => format!(
            "Ready to propose {} on \"{}\".",
            plural(summary.valid, "new time", "new times"),
            summary.title
        ),
    };

    let source = summary
        .list_name
        .as_ref()
        .map(|name| format!(" Recipients come from the list \"{}\".", name))
        .unwrap_or_default();

    let skipped = skip_phrase(&summary.skipped)
        .map(|reasons| format!(" Skipped: {}.", reasons))
        .unwrap_or_default();

    let ask = match summary.action_type {
        ActionType::AddSlots => " Reply add or cancel.",
        _ => " Reply send, cancel or new_thread.",
    };

    format!("{}{}{}{}", head, source, skipped, ask)
}

pub fn decided(decision: Decision, summary: &ActionSummary) -> String {
    match decision {
        Decision::Cancel => "Cancelled. Nothing was sent.".to_string(),
        Decision::NewThread => format!(
            "Confirmed. {} will be invited to a new thread \"{}\".",
            plural(summary.valid, "person", "people"),
            summary.title
        ),
        Decision::Send => format!(
            "Confirmed. Sending {} for \"{}\".",
            plural(summary.valid, "invitation", "invitations"),
            summary.title
        ),
        Decision::Add => format!(
            "Confirmed. Adding {} to \"{}\".",
            plural(summary.valid, "time", "times"),
            summary.title
        ),
    }
}

pub fn executed(action_type: ActionType, title: &str, result: &ExecutionResult) -> String {
    let what = match action_type {
        ActionType::AddSlots => format!(
            "Added {} to \"{}\" and notified {}.",
            plural(result.inserted, "time", "times"),
            title,
            plural(result.deliveries.email_queued, "invitee", "invitees")
        ),
        _ => format!(
            "Invited {} to \"{}\"; {} on the way.",
            plural(result.inserted, "person", "people"),
            title,
            plural(result.deliveries.email_queued, "email is", "emails are")
        ),
    };

    let mut tail = String::new();
    if result.skipped > 0 {
        tail.push_str(&format!(" {} already there.", plural(result.skipped, "entry was", "entries were")));
    }
    if result.failed > 0 {
        tail.push_str(&format!(" {} could not be saved.", plural(result.failed, "entry", "entries")));
    }
    format!("{}{}", what, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryCounts;

    fn summary(action_type: ActionType) -> ActionSummary {
        ActionSummary {
            action_type,
            title: "Team sync".to_string(),
            list_name: None,
            total: 3,
            valid: 1,
            preview: vec![],
            skipped: SkipCounts {
                invalid_email: 1,
                duplicate_input: 1,
                ..Default::default()
            },
            slots: vec![],
        }
    }

    #[test]
    fn test_prepared_message() {
        let msg = prepared(&summary(ActionType::SendInvites));
        assert_eq!(
            msg,
            "Ready to create \"Team sync\" and invite 1 person. Skipped: 1 invalid, 1 duplicate. Reply send, cancel or new_thread."
        );
    }

    #[test]
    fn test_no_valid_emails_message() {
        assert_eq!(
            no_valid_emails(0, &SkipCounts::default()),
            "No email addresses were provided."
        );
        let skipped = SkipCounts {
            already_invited: 2,
            ..Default::default()
        };
        assert_eq!(
            no_valid_emails(2, &skipped),
            "None of the 2 entries can be invited (2 already invited)."
        );
    }

    #[test]
    fn test_executed_message() {
        let result = ExecutionResult {
            inserted: 3,
            skipped: 0,
            failed: 0,
            deliveries: DeliveryCounts {
                email_queued: 3,
                in_app_created: 1,
            },
        };
        assert_eq!(
            executed(ActionType::SendInvites, "Team sync", &result),
            "Invited 3 people to \"Team sync\"; 3 emails are on the way."
        );
    }

    #[test]
    fn test_invalid_decision_message() {
        assert_eq!(
            invalid_decision("send", ActionType::AddSlots.allowed_decisions()),
            "\"send\" is not a valid decision here. Use \"add\" or \"cancel\"."
        );
    }
}
