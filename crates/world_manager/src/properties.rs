//! Line-oriented `key=value` store for `server.properties`
//!
//! Writes never reformat the file: comments, blank lines, unknown keys and
//! their ordering survive. Only the lines whose key is being written are
//! replaced, and keys the file did not have yet are appended at the end.

use crate::error::{WorldError, WorldResult};
use crate::fs_util;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Parsed `server.properties` content.
pub type Properties = BTreeMap<String, String>;

/// Key the server uses to locate its dimension folders.
pub const LEVEL_NAME_KEY: &str = "level-name";

/// The only value `level-name` may take; every world keeps its dimensions in
/// `world`, `world_nether` and `world_the_end`.
pub const LEVEL_NAME: &str = "world";

/// Splits a line into `(key, value)`, or `None` for comments, blank lines and
/// malformed entries.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parses properties text. Malformed lines are skipped, later duplicates win.
pub fn parse(contents: &str) -> Properties {
    contents
        .lines()
        .filter_map(parse_line)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Renders `props` on top of `existing` file content.
///
/// Lines whose key is in `props` are rewritten as `key=value` in place (every
/// occurrence, if the file repeats a key); everything else is kept verbatim.
/// Keys missing from the file are appended in key order.
pub fn render(existing: Option<&str>, props: &Properties) -> String {
    let mut lines = Vec::new();
    let mut written = BTreeSet::new();

    for line in existing.into_iter().flat_map(str::lines) {
        match parse_line(line) {
            Some((key, _)) if props.contains_key(key) => {
                lines.push(format!("{key}={}", props[key]));
                written.insert(key.to_string());
            }
            _ => lines.push(line.to_string()),
        }
    }

    for (key, value) in props {
        if !written.contains(key.as_str()) {
            lines.push(format!("{key}={value}"));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Rejects entries that cannot survive a write/read cycle.
pub fn validate(props: &Properties) -> WorldResult<()> {
    for (key, value) in props {
        let reason = if key.is_empty() {
            Some("key is empty")
        } else if key.trim() != key {
            Some("key has surrounding whitespace")
        } else if key.starts_with('#') {
            Some("key would be read back as a comment")
        } else if key.contains('=') {
            Some("key contains '='")
        } else if key.contains(['\n', '\r']) || value.contains(['\n', '\r']) {
            Some("line breaks are not allowed")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(WorldError::InvalidProperty {
                key: key.clone(),
                reason,
            });
        }
    }
    Ok(())
}

/// Reads a properties file, failing with [`WorldError::PropertiesMissing`]
/// when it does not exist.
pub async fn read(path: &Path) -> WorldResult<Properties> {
    read_optional(path)
        .await?
        .ok_or_else(|| WorldError::PropertiesMissing(path.to_path_buf()))
}

/// Reads a properties file, returning `None` when it does not exist.
pub async fn read_optional(path: &Path) -> WorldResult<Option<Properties>> {
    Ok(fs_util::read_optional(path).await?.map(|c| parse(&c)))
}

/// Writes `props` into `path` without disturbing the rest of the file.
pub async fn write(path: &Path, props: &Properties) -> WorldResult<()> {
    validate(props)?;

    let existing = fs_util::read_optional(path).await?;
    let rendered = render(existing.as_deref(), props);
    fs_util::write_atomic(path, rendered.as_bytes()).await?;

    debug!("Wrote {} properties to {}", props.len(), path.display());
    Ok(())
}

/// Forces `level-name` to its fixed value.
pub fn pin_level_name(props: &mut Properties) {
    props.insert(LEVEL_NAME_KEY.to_string(), LEVEL_NAME.to_string());
}
