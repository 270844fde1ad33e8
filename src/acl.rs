//! # Access-Control List Cache
//!
//! The kiosk keeps the full member list in memory so authorization works
//! with the network down. The list is persisted as a tab-separated tag file
//!
//! ```text
//! tag<TAB>allowed|denied<TAB>level<TAB>member<TAB>nickname<TAB>warning
//! ```
//!
//! rewritten atomically (write temp, rename) after every successful refresh
//! from the management API. An older whitespace-separated 4-field format
//! (tag, access, level, member) still parses so upgraded kiosks keep their
//! cached list.
//!
//! Refresh failures are logged and leave the previous list in place; the
//! caller decides how often to retry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::AccessInfo;

/// Errors from loading, refreshing, or persisting the list.
#[derive(Error, Debug)]
pub enum AclError {
    /// HTTP request failed (network, server, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Tag file operations failed (permissions, disk space, corruption)
    #[error("tag file IO: {0}")]
    Io(#[from] io::Error),
}

/// One member credential as held in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AclRecord {
    pub tag: u64,
    pub level: i32,
    pub member: String,
    pub nickname: String,
    pub warning: String,
    pub allowed: bool,
}

impl From<&AclRecord> for AccessInfo {
    fn from(record: &AclRecord) -> Self {
        AccessInfo {
            member: record.member.clone(),
            nickname: record.nickname.clone(),
            warning: record.warning.clone(),
            allowed: record.allowed,
        }
    }
}

/// Wire format of the management API's ACL endpoint.
#[derive(Debug, Deserialize)]
struct ApiEntry {
    #[serde(default)]
    raw_tag_id: String,
    #[serde(default)]
    allowed: String,
    #[serde(default)]
    warning: String,
    #[serde(default)]
    member: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    level: i32,
}

/// Connection settings for the management API.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub url: String,
    pub resource: String,
    pub username: String,
    pub password: String,
}

/// Thread-safe credential cache backed by the tag file.
pub struct AclCache {
    records: RwLock<Vec<AclRecord>>,
    tag_file: PathBuf,
}

impl AclCache {
    pub fn new<P: Into<PathBuf>>(tag_file: P) -> Self {
        AclCache {
            records: RwLock::new(Vec::new()),
            tag_file: tag_file.into(),
        }
    }

    /// Find a tag. Returns a copy of the record so the lock is never held
    /// across caller work.
    pub fn lookup(&self, tag: u64) -> Option<AclRecord> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|r| r.tag == tag)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Load the tag file into memory, creating an empty file (and its parent
    /// directory) when missing. Returns the number of records loaded.
    pub fn load(&self) -> Result<usize, AclError> {
        if let Some(dir) = self.tag_file.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        if !self.tag_file.exists() {
            fs::File::create(&self.tag_file)?;
        }

        let contents = fs::read_to_string(&self.tag_file)?;
        let records: Vec<AclRecord> = contents.lines().filter_map(parse_line).collect();
        let count = records.len();
        *self.records.write().unwrap() = records;
        log::info!("acl: loaded {count} tags from {}", self.tag_file.display());
        Ok(count)
    }

    /// Fetch the list from the management API, swap it in, and rewrite the
    /// tag file atomically. Returns the number of records fetched.
    pub async fn refresh(&self, api: &ApiSettings) -> Result<usize, AclError> {
        let url = format!("{}/api/v1/resources/{}/acl", api.url, api.resource);
        let client = reqwest::Client::new();
        let entries: Vec<ApiEntry> = client
            .get(&url)
            .basic_auth(&api.username, Some(&api.password))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let records: Vec<AclRecord> = entries
            .into_iter()
            .filter_map(|entry| {
                let tag = entry.raw_tag_id.parse::<u64>().ok()?;
                Some(AclRecord {
                    tag,
                    level: entry.level,
                    member: entry.member,
                    nickname: entry.nickname,
                    warning: entry.warning,
                    allowed: entry.allowed == "allowed",
                })
            })
            .collect();

        self.persist(&records)?;
        let count = records.len();
        *self.records.write().unwrap() = records;
        log::info!("acl: refreshed {count} tags from {url}");
        Ok(count)
    }

    /// Write the tag file via a temp file and rename so readers never see a
    /// half-written list.
    fn persist(&self, records: &[AclRecord]) -> Result<(), AclError> {
        let tmp = self.tag_file.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for r in records {
                let access = if r.allowed { "allowed" } else { "denied" };
                writeln!(
                    file,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    r.tag, access, r.level, r.member, r.nickname, r.warning
                )?;
            }
        }
        fs::rename(&tmp, &self.tag_file)?;
        Ok(())
    }

    /// Path of the backing tag file.
    pub fn tag_file(&self) -> &Path {
        &self.tag_file
    }
}

/// Parse one tag-file line, accepting both formats. Unparseable lines are
/// skipped.
fn parse_line(line: &str) -> Option<AclRecord> {
    let line = line.trim_end();
    if line.is_empty() {
        return None;
    }

    let tabs: Vec<&str> = line.split('\t').collect();
    if tabs.len() >= 6 {
        return Some(AclRecord {
            tag: tabs[0].parse().ok()?,
            allowed: tabs[1] == "allowed",
            level: tabs[2].parse().unwrap_or(0),
            member: tabs[3].to_string(),
            nickname: tabs[4].to_string(),
            warning: tabs[5].to_string(),
        });
    }

    // Legacy whitespace-separated format: tag access level member
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() >= 4 {
        return Some(AclRecord {
            tag: fields[0].parse().ok()?,
            allowed: fields[1] == "allowed",
            level: fields[2].parse().unwrap_or(0),
            member: fields[3].to_string(),
            nickname: String::new(),
            warning: String::new(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(tag: u64, member: &str) -> AclRecord {
        AclRecord {
            tag,
            level: 2,
            member: member.to_string(),
            nickname: "Mo".to_string(),
            warning: "payment due".to_string(),
            allowed: true,
        }
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let cache = AclCache::new(dir.path().join("tags"));
        let records = vec![record(42, "m.smith"), record(7, "j.doe")];
        cache.persist(&records).unwrap();

        assert_eq!(cache.load().unwrap(), 2);
        assert_eq!(cache.lookup(42).unwrap(), records[0]);
        assert_eq!(cache.lookup(7).unwrap(), records[1]);
        assert!(cache.lookup(1).is_none());
    }

    #[test]
    fn legacy_four_field_format_still_parses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tags");
        fs::write(&path, "12345 allowed 3 m.smith\n999 denied 0 j.doe\n").unwrap();

        let cache = AclCache::new(&path);
        assert_eq!(cache.load().unwrap(), 2);

        let smith = cache.lookup(12345).unwrap();
        assert!(smith.allowed);
        assert_eq!(smith.level, 3);
        assert_eq!(smith.member, "m.smith");
        assert_eq!(smith.nickname, "");

        let doe = cache.lookup(999).unwrap();
        assert!(!doe.allowed);
    }

    #[test]
    fn blank_and_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tags");
        fs::write(
            &path,
            "\nnot-a-tag\tallowed\t0\tx\ty\tz\n42\tallowed\t1\tm.smith\t\t\n",
        )
        .unwrap();

        let cache = AclCache::new(&path);
        assert_eq!(cache.load().unwrap(), 1);
        assert!(cache.lookup(42).unwrap().allowed);
    }

    #[test]
    fn load_creates_a_missing_tag_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("tags");
        let cache = AclCache::new(&path);
        assert_eq!(cache.load().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn warning_with_spaces_survives_the_round_trip() {
        let dir = tempdir().unwrap();
        let cache = AclCache::new(dir.path().join("tags"));
        let mut r = record(5, "m.smith");
        r.warning = "training required for laser".to_string();
        cache.persist(&[r.clone()]).unwrap();
        cache.load().unwrap();
        assert_eq!(cache.lookup(5).unwrap().warning, r.warning);
    }
}
