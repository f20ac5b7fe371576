//! Minimal M3U/EXTINF reader and writer.
//!
//! Only `#EXTINF` + URL pairs are understood; every other directive is
//! skipped. The display name is the text after the last comma that sits
//! outside a quoted attribute, `tvg-id="..."` becomes the guide id.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

use crate::model::{Candidate, ChannelIdentity, ChannelSelection, RankedSource};

const URL_SCHEMES: [&str; 5] = ["http://", "https://", "rtmp://", "rtsp://", "udp://"];

fn is_stream_url(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    URL_SCHEMES.iter().any(|s| lower.starts_with(s))
}

/// Split an EXTINF line into `(attributes, title)`.
fn split_extinf(line: &str) -> (&str, &str) {
    let body = line.strip_prefix("#EXTINF:").unwrap_or(line);
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, ch) in body.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => split_at = Some(i),
            _ => {}
        }
    }
    match split_at {
        Some(i) => (&body[..i], body[i + 1..].trim()),
        None => (body, ""),
    }
}

fn attribute<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    static RE_ATTR: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).expect("attribute regex"));
    RE_ATTR
        .captures_iter(attrs)
        .find(|c| c.get(1).is_some_and(|k| k.as_str().eq_ignore_ascii_case(key)))
        .and_then(|c| c.get(2))
        .map(|v| v.as_str().trim())
        .filter(|v| !v.is_empty())
}

/// Parse playlist text into candidates, in file order.
pub fn parse_playlist(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut pending: Option<ChannelIdentity> = None;

    for raw in text.lines() {
        let line = raw.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }
        if line.starts_with("#EXTINF") {
            let (attrs, title) = split_extinf(line);
            let name = if title.is_empty() {
                attribute(attrs, "tvg-name").unwrap_or_default()
            } else {
                title
            };
            pending = (!name.is_empty()).then(|| {
                let id = ChannelIdentity::new(name);
                match attribute(attrs, "tvg-id") {
                    Some(guide) => id.with_guide_id(guide),
                    None => id,
                }
            });
        } else if line.starts_with('#') {
            continue;
        } else if is_stream_url(line) {
            if let Some(identity) = pending.take() {
                out.push(Candidate::new(identity, line));
            }
        }
    }
    out
}

fn write_entry(out: &mut String, sel: &ChannelSelection, src: &RankedSource, group: &str) {
    let id = &sel.identity;
    let _ = write!(out, "#EXTINF:-1");
    if let Some(guide) = &id.guide_id {
        let _ = write!(out, " tvg-id=\"{guide}\"");
    }
    let _ = writeln!(out, " group-title=\"{group}\",{}", id.name);
    let _ = writeln!(out, "{}", src.url);
}

/// Render selections back to playlist text: per channel, primary sources
/// then backup sources, each in rank order.
pub fn render_selection(selections: &[ChannelSelection]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for sel in selections {
        for src in &sel.selection.primary {
            write_entry(&mut out, sel, src, "primary");
        }
        for src in &sel.selection.backup {
            write_entry(&mut out, sel, src, "backup");
        }
    }
    out
}
