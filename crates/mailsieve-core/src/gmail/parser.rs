use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};

use crate::gmail::types::{Message, MessagePart};

/// The fields of a provider message that rules can inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMail {
    /// Raw `From` header, display name included.
    pub sender: Option<String>,
    pub subject: Option<String>,
    /// First `text/plain` part found in a depth-first walk, or the first
    /// `text/html` part rendered to text when there is no plain part.
    pub body: Option<String>,
    /// `Date` header, falling back to the provider's internal timestamp.
    pub received_at: Option<DateTime<Utc>>,
}

pub fn parse_message(message: &Message) -> ParsedMail {
    let payload = message.payload.as_ref();

    let sender = header_value(payload, "From");
    let subject = header_value(payload, "Subject");
    let received_at = header_value(payload, "Date")
        .as_deref()
        .and_then(parse_date_header)
        .or_else(|| {
            message
                .internal_date
                .as_deref()
                .and_then(parse_internal_date)
        });

    let body = payload.and_then(extract_body);

    ParsedMail {
        sender,
        subject,
        body,
        received_at,
    }
}

fn header_value(payload: Option<&MessagePart>, name: &str) -> Option<String> {
    payload.and_then(|p| {
        p.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    })
}

/// Parses an RFC 2822 date, tolerating a trailing zone comment such as
/// `(UTC)` or `(PDT)`.
pub fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    let without_comment = match trimmed.rfind(" (") {
        Some(idx) if trimmed.ends_with(')') => &trimmed[..idx],
        _ => trimmed,
    };

    DateTime::parse_from_rfc2822(without_comment)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_internal_date(value: &str) -> Option<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Maximum depth for MIME tree traversal to prevent stack overflow from malicious emails
const MAX_MIME_DEPTH: usize = 50;

// Gmail emits base64url, with or without trailing `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Default)]
struct Bodies {
    plain: Option<String>,
    html: Option<String>,
}

fn extract_body(payload: &MessagePart) -> Option<String> {
    let mut bodies = Bodies::default();
    collect_bodies(payload, &mut bodies, 0);

    bodies
        .plain
        .or_else(|| bodies.html.as_deref().map(strip_html))
}

fn collect_bodies(part: &MessagePart, bodies: &mut Bodies, depth: usize) {
    if depth > MAX_MIME_DEPTH || bodies.plain.is_some() {
        return;
    }

    let decoded = || {
        part.body
            .as_ref()
            .and_then(|body| body.data.as_deref())
            .and_then(decode_body)
    };
    match part.mime_type.as_deref() {
        Some(mime) if mime.eq_ignore_ascii_case("text/plain") => {
            bodies.plain = decoded();
        }
        Some(mime) if mime.eq_ignore_ascii_case("text/html") && bodies.html.is_none() => {
            bodies.html = decoded();
        }
        _ => {}
    }

    for child in &part.parts {
        collect_bodies(child, bodies, depth + 1);
    }
}

fn strip_html(html: &str) -> String {
    let mut bytes = std::io::Cursor::new(html.as_bytes());
    html2text::from_read(&mut bytes, 80)
        .trim()
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_body(data: &str) -> Option<String> {
    URL_SAFE_LENIENT
        .decode(data)
        .or_else(|_| STANDARD_LENIENT.decode(data))
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
