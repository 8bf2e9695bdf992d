//! Submission artifact discovery.
//!
//! Scans a directory of `{year}.{model}.{timestamp}.submission.csv`
//! files and picks the newest artifact per (year, model) for grading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ARTIFACT_SUFFIX: &str = ".submission.csv";

/// Parse `{year}.{model}.{YYYYMMDD_HHMMSS}` out of an artifact name.
fn parse_artifact_name(name: &str) -> Option<(i32, String, String)> {
    let stem = name.strip_suffix(ARTIFACT_SUFFIX)?;
    let (year, rest) = stem.split_once('.')?;
    let year: i32 = year.parse().ok()?;
    let (model, timestamp) = rest.rsplit_once('.')?;
    if model.is_empty() || timestamp.len() != 15 {
        return None;
    }
    Some((year, model.to_string(), timestamp.to_string()))
}

/// The newest artifact per (year, model), keyed in ascending order.
///
/// File-name timestamps sort lexically, so the maximum is the most
/// recent write. Files that do not follow the artifact naming are
/// ignored; a missing directory yields an empty map.
pub(crate) fn latest_artifacts(
    dir: &Path,
    year: Option<i32>,
) -> std::io::Result<BTreeMap<(i32, String), PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e),
    };

    let mut latest: BTreeMap<(i32, String), (String, PathBuf)> = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some((file_year, model, timestamp)) = parse_artifact_name(name) else {
            continue;
        };
        if year.is_some_and(|wanted| wanted != file_year) {
            continue;
        }
        match latest.get(&(file_year, model.clone())) {
            Some((newest, _)) if *newest >= timestamp => {}
            _ => {
                latest.insert((file_year, model), (timestamp, entry.path()));
            }
        }
    }

    Ok(latest
        .into_iter()
        .map(|(key, (_, path))| (key, path))
        .collect())
}
