//! Info page shown at `/`.

use std::env;
use std::fs;

use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

/// Asia/Seoul: UTC+09:00 all year round
const SEOUL_OFFSET_SECS: i32 = 9 * 3600;

/// Host identity and the current local time.
#[derive(Debug, Clone)]
pub struct InfoPage {
    pub host: String,
    pub date: String,
}

impl InfoPage {
    /// Builds the page for `host` at `now`, rendered in Seoul time.
    pub fn at(host: impl Into<String>, now: DateTime<Utc>) -> Self {
        let date = match FixedOffset::east_opt(SEOUL_OFFSET_SECS) {
            Some(seoul) => now
                .with_timezone(&seoul)
                .to_rfc3339_opts(SecondsFormat::Secs, false),
            None => now.to_rfc3339_opts(SecondsFormat::Secs, false),
        };
        Self {
            host: host.into(),
            date,
        }
    }

    pub fn now(host: impl Into<String>) -> Self {
        Self::at(host, Utc::now())
    }

    pub fn render(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{host}</title>\n\
             <link rel=\"icon\" href=\"/favicon.ico\">\n</head>\n<body>\n\
             <h1>{host}</h1>\n<p>{date}</p>\n\
             <script src=\"/counter.js\"></script>\n</body>\n</html>\n",
            host = escape(&self.host),
            date = escape(&self.date),
        )
    }
}

impl IntoResponse for InfoPage {
    fn into_response(self) -> Response {
        Html(self.render()).into_response()
    }
}

/// Name of the machine serving the request.
///
/// Looks at `HOSTNAME` first, then `/etc/hostname`.
pub fn hostname() -> String {
    env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
