//! Email template rendering.
//!
//! HTML templates go through Handlebars' default escaping, so every
//! interpolated user string (names, titles, free-text messages) is
//! HTML-escaped. Text templates are rendered by a second registry without
//! escaping.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{EmailJob, EmailKind, EmailPayload, SlotSummary};
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::debug;

/// Rendered email bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

#[derive(Clone)]
pub struct TemplateEngine {
    html: Arc<Handlebars<'static>>,
    text: Arc<Handlebars<'static>>,
}

impl TemplateEngine {
    /// Registers the layout and one html/text template pair per [`EmailKind`].
    pub fn new() -> NotificationResult<Self> {
        let mut html = Handlebars::new();
        html.register_partial("layout", LAYOUT_HTML)
            .map_err(|e| NotificationError::TemplateError(format!("Failed to register layout: {}", e)))?;

        let mut text = Handlebars::new();
        text.register_escape_fn(handlebars::no_escape);

        for kind in EmailKind::iter() {
            let (html_source, text_source) = sources(kind);
            html.register_template_string(kind.as_ref(), html_source)
                .map_err(|e| NotificationError::TemplateError(format!("Failed to register {}_html: {}", kind, e)))?;
            text.register_template_string(kind.as_ref(), text_source)
                .map_err(|e| NotificationError::TemplateError(format!("Failed to register {}_text: {}", kind, e)))?;
        }

        Ok(Self {
            html: Arc::new(html),
            text: Arc::new(text),
        })
    }

    pub fn render(&self, job: &EmailJob) -> NotificationResult<RenderedEmail> {
        let kind = job.kind();
        debug!(job_id = %job.job_id, kind = %kind, "Rendering email");

        let context = context(&job.payload)?;
        Ok(RenderedEmail {
            html: self.html.render(kind.as_ref(), &context)?,
            text: self.text.render(kind.as_ref(), &context)?,
        })
    }
}

/// Template data: the payload's fields plus preformatted dates.
fn context(payload: &EmailPayload) -> NotificationResult<Value> {
    let context = match payload {
        EmailPayload::Otp(d) => to_value(d)?,
        EmailPayload::Invite(d) => to_value(d)?,
        EmailPayload::Broadcast(d) => to_value(d)?,
        EmailPayload::ThreadMessage(d) => to_value(d)?,
        EmailPayload::Reminder(d) => to_value(d)?,
        EmailPayload::Finalized(d) => {
            let mut value = to_value(d)?;
            value["when"] = json!(format_range(&d.start_at, &d.end_at));
            value
        }
        EmailPayload::AdditionalSlots(d) => {
            let mut value = to_value(d)?;
            value["slot_labels"] = json!(d.slots.iter().map(slot_label).collect::<Vec<_>>());
            value
        }
        EmailPayload::OneOnOne(d) => to_value(d)?,
    };
    Ok(context)
}

fn to_value<T: Serialize>(data: &T) -> NotificationResult<Value> {
    Ok(serde_json::to_value(data)?)
}

fn format_range(start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
    if start.date_naive() == end.date_naive() {
        format!(
            "{} to {} UTC",
            start.format("%a %b %-d, %Y %H:%M"),
            end.format("%H:%M")
        )
    } else {
        format!(
            "{} to {} UTC",
            start.format("%a %b %-d, %Y %H:%M"),
            end.format("%a %b %-d, %Y %H:%M")
        )
    }
}

fn slot_label(slot: &SlotSummary) -> String {
    format_range(&slot.start_at, &slot.end_at)
}

fn sources(kind: EmailKind) -> (&'static str, &'static str) {
    match kind {
        EmailKind::Otp => (OTP_HTML, OTP_TEXT),
        EmailKind::Invite => (INVITE_HTML, INVITE_TEXT),
        EmailKind::Broadcast => (BROADCAST_HTML, BROADCAST_TEXT),
        EmailKind::ThreadMessage => (THREAD_MESSAGE_HTML, THREAD_MESSAGE_TEXT),
        EmailKind::Reminder => (REMINDER_HTML, REMINDER_TEXT),
        EmailKind::Finalized => (FINALIZED_HTML, FINALIZED_TEXT),
        EmailKind::AdditionalSlots => (ADDITIONAL_SLOTS_HTML, ADDITIONAL_SLOTS_TEXT),
        EmailKind::OneOnOne => (ONE_ON_ONE_HTML, ONE_ON_ONE_TEXT),
    }
}

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1.0"></head>
<body style="margin:0;padding:24px;background:#f5f5f4;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;color:#1c1917;">
<div style="max-width:560px;margin:0 auto;background:#ffffff;border-radius:8px;padding:32px;">
{{> @partial-block}}
</div>
<p style="max-width:560px;margin:16px auto 0;font-size:12px;color:#78716c;text-align:center;">Sent by Rally</p>
</body>
</html>"#;

const OTP_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">Your sign-in code</h1>
<p style="font-size:32px;letter-spacing:6px;font-weight:bold;">{{code}}</p>
<p>The code expires in {{expires_in_minutes}} minutes. If you did not request it, ignore this email.</p>
{{/layout}}"#;

const OTP_TEXT: &str = "Your sign-in code: {{code}}

The code expires in {{expires_in_minutes}} minutes. If you did not request it, ignore this email.
";

const INVITE_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">{{inviter_name}} invited you to &ldquo;{{thread_title}}&rdquo;</h1>
{{#if message}}<blockquote style="border-left:3px solid #d6d3d1;margin:16px 0;padding-left:12px;">{{message}}</blockquote>{{/if}}
<p>Pick the times that work for you.</p>
<p><a href="{{invite_url}}" style="display:inline-block;background:#1c1917;color:#ffffff;padding:12px 20px;border-radius:6px;text-decoration:none;">Share availability</a></p>
{{/layout}}"#;

const INVITE_TEXT: &str = "{{inviter_name}} invited you to \"{{thread_title}}\".
{{#if message}}
{{message}}
{{/if}}
Share your availability: {{invite_url}}
";

const BROADCAST_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">Update on &ldquo;{{thread_title}}&rdquo;</h1>
<p><strong>{{sender_name}}</strong> wrote:</p>
<blockquote style="border-left:3px solid #d6d3d1;margin:16px 0;padding-left:12px;">{{message}}</blockquote>
<p><a href="{{thread_url}}">Open the thread</a></p>
{{/layout}}"#;

const BROADCAST_TEXT: &str = "{{sender_name}} posted an update on \"{{thread_title}}\":

{{message}}

Open the thread: {{thread_url}}
";

const THREAD_MESSAGE_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">New message in &ldquo;{{thread_title}}&rdquo;</h1>
<p><strong>{{sender_name}}</strong>:</p>
<blockquote style="border-left:3px solid #d6d3d1;margin:16px 0;padding-left:12px;">{{message}}</blockquote>
<p><a href="{{thread_url}}">Reply in Rally</a></p>
{{/layout}}"#;

const THREAD_MESSAGE_TEXT: &str = "New message from {{sender_name}} in \"{{thread_title}}\":

{{message}}

Reply: {{thread_url}}
";

const REMINDER_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">{{inviter_name}} is still waiting for your availability</h1>
<p>&ldquo;{{thread_title}}&rdquo; needs your times before it can be scheduled.</p>
<p><a href="{{invite_url}}" style="display:inline-block;background:#1c1917;color:#ffffff;padding:12px 20px;border-radius:6px;text-decoration:none;">Share availability</a></p>
{{/layout}}"#;

const REMINDER_TEXT: &str = "{{inviter_name}} is still waiting for your availability for \"{{thread_title}}\".

Share your availability: {{invite_url}}
";

const FINALIZED_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">&ldquo;{{thread_title}}&rdquo; is scheduled</h1>
<p>{{organizer_name}} picked a time:</p>
<p style="font-size:18px;font-weight:bold;">{{when}}</p>
<p><a href="{{thread_url}}">View details</a></p>
{{/layout}}"#;

const FINALIZED_TEXT: &str = "\"{{thread_title}}\" is scheduled.

{{organizer_name}} picked: {{when}}

Details: {{thread_url}}
";

const ADDITIONAL_SLOTS_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">New times for &ldquo;{{thread_title}}&rdquo;</h1>
<p>{{organizer_name}} proposed more options:</p>
<ul>
{{#each slot_labels}}<li>{{this}}</li>
{{/each}}</ul>
<p><a href="{{invite_url}}" style="display:inline-block;background:#1c1917;color:#ffffff;padding:12px 20px;border-radius:6px;text-decoration:none;">Update availability</a></p>
{{/layout}}"#;

const ADDITIONAL_SLOTS_TEXT: &str = "{{organizer_name}} proposed more times for \"{{thread_title}}\":
{{#each slot_labels}}
- {{this}}
{{/each}}

Update your availability: {{invite_url}}
";

const ONE_ON_ONE_HTML: &str = r#"{{#> layout}}
<h1 style="font-size:20px;">{{organizer_name}} would like to meet with you</h1>
<p>&ldquo;{{thread_title}}&rdquo;</p>
{{#if message}}<blockquote style="border-left:3px solid #d6d3d1;margin:16px 0;padding-left:12px;">{{message}}</blockquote>{{/if}}
<p><a href="{{booking_url}}" style="display:inline-block;background:#1c1917;color:#ffffff;padding:12px 20px;border-radius:6px;text-decoration:none;">Pick a time</a></p>
{{/layout}}"#;

const ONE_ON_ONE_TEXT: &str = "{{organizer_name}} would like to meet with you: \"{{thread_title}}\".
{{#if message}}
{{message}}
{{/if}}
Pick a time: {{booking_url}}
";
