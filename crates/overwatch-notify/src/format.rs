//! Formatting shared by the channels.

use chrono::{DateTime, Utc};

/// Formats a timestamp as RFC 1123, e.g. `Fri, 01 Mar 2024 10:05:00 UTC`.
#[must_use]
pub fn rfc1123(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S UTC").to_string()
}

/// The one-line summary: `` `reason` event for `subject` on `cluster` ``.
#[must_use]
pub fn headline(reason: &str, subject: &str, cluster: &str) -> String {
    format!("`{reason}` event for `{subject}` on `{cluster}`")
}

/// Derives the service name from an involved object.
///
/// Pod names lose their generated suffix: three dash segments when the third
/// from last is `deployment`, two otherwise. Names with too few segments and
/// other kinds are returned unchanged.
#[must_use]
pub fn service_name(kind: &str, name: &str) -> String {
    if kind != "Pod" {
        return name.to_string();
    }

    let parts: Vec<&str> = name.split('-').collect();
    let drop = if parts.len() > 3 && parts[parts.len() - 3] == "deployment" {
        3
    } else {
        2
    };

    if parts.len() <= drop {
        return name.to_string();
    }
    parts[..parts.len() - drop].join("-")
}
