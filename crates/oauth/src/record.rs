//! On-disk token record schema and file naming/scanning/atomic persistence
//! (spec §4.4 "Token file naming", §6 "OAuth token file schema").

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OAuthError;

/// `{access_token, refresh_token?, token_type, expires_at (epoch ms),
/// scope, resource_url?, id_token?, provider_metadata?}` (spec §6).
///
/// Holds plain `String`s rather than `secrecy::SecretString`: this is the
/// literal serialized file contents spec §6 names, and `secrecy` only
/// implements `Deserialize` (never `Serialize`, by design) so the token
/// can't accidentally be logged — the record is wrapped into a
/// [`crate::AccessToken`] carrying a `SecretString` the moment it's handed
/// to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<Value>,
}

impl TokenRecord {
    /// Whether `now` (epoch milliseconds) is at or past `expires_at`.
    pub fn is_expired_at(&self, now_epoch_ms: i64) -> bool {
        now_epoch_ms >= self.expires_at
    }
}

/// The parsed pieces of a `{providerType}-oauth-{sequence}-{alias}.json`
/// file name (spec §4.4 "Token file naming").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFileName {
    pub provider_type: String,
    pub sequence: u32,
    pub alias: String,
}

impl TokenFileName {
    pub fn path(&self, token_dir: &Path) -> PathBuf {
        token_dir.join(format!("{}-oauth-{}-{}.json", self.provider_type, self.sequence, self.alias))
    }

    /// Parses a bare file name (no directory component) back into its
    /// three parts, or `None` if it doesn't match the naming convention.
    fn parse(file_name: &str) -> Option<TokenFileName> {
        let stem = file_name.strip_suffix(".json")?;
        let (provider_type, rest) = stem.split_once("-oauth-")?;
        let (sequence, alias) = rest.split_once('-')?;
        let sequence: u32 = sequence.parse().ok()?;
        if provider_type.is_empty() || alias.is_empty() {
            return None;
        }
        Some(TokenFileName { provider_type: provider_type.to_string(), sequence, alias: alias.to_string() })
    }
}

/// Lists every `TokenFileName` under `token_dir` that parses successfully.
/// Missing directories are treated as empty rather than an error, since a
/// fresh install has no `auth/` directory yet.
fn scan(token_dir: &Path) -> std::io::Result<Vec<TokenFileName>> {
    let entries = match fs::read_dir(token_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(file_name) = entry.file_name().to_str().and_then(TokenFileName::parse) {
            names.push(file_name);
        }
    }
    Ok(names)
}

/// Finds the existing file for `(provider_type, alias)` with the lowest
/// sequence number, if one exists. Scanning (rather than remembering the
/// path from a prior run) is what lets a file created by hand, or by a
/// previous process instance, be picked up.
pub fn find(token_dir: &Path, provider_type: &str, alias: &str) -> std::io::Result<Option<TokenFileName>> {
    let mut matches: Vec<TokenFileName> =
        scan(token_dir)?.into_iter().filter(|name| name.provider_type == provider_type && name.alias == alias).collect();
    matches.sort_by_key(|name| name.sequence);
    Ok(matches.into_iter().next())
}

/// Allocates a fresh `TokenFileName` for `(provider_type, alias)` using the
/// lowest sequence number not already used by any file for this provider
/// type, so concurrently configured aliases for the same provider never
/// collide on a file name (spec §4.4: "a new file is created with the
/// lowest unused sequence number for that (provider, alias) pair").
pub fn allocate(token_dir: &Path, provider_type: &str, alias: &str) -> std::io::Result<TokenFileName> {
    let used: std::collections::HashSet<u32> =
        scan(token_dir)?.into_iter().filter(|name| name.provider_type == provider_type).map(|name| name.sequence).collect();
    let sequence = (0..).find(|n| !used.contains(n)).expect("u32 range is not exhausted");
    Ok(TokenFileName { provider_type: provider_type.to_string(), sequence, alias: alias.to_string() })
}

/// Reads and parses a token record from `path`.
pub fn read(path: &Path) -> Result<TokenRecord, OAuthError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|err| OAuthError::InvalidTokenFile { path: path.display().to_string(), detail: err.to_string() })
}

/// Serializes `record` and writes it to `path` atomically: the new
/// contents land in a temp file in the same directory, then `rename`
/// replaces the target in one filesystem operation, so a reader never
/// observes a partially written file (spec §4.4 "Successful writes to the
/// token file are atomic (write-then-rename)").
pub fn write_atomic(path: &Path, record: &TokenRecord) -> Result<(), OAuthError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let body = serde_json::to_vec_pretty(record).expect("TokenRecord always serializes");
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut temp, &body)?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_file_name() {
        let parsed = TokenFileName::parse("qwen-oauth-0-primary.json").unwrap();
        assert_eq!(parsed.provider_type, "qwen");
        assert_eq!(parsed.sequence, 0);
        assert_eq!(parsed.alias, "primary");
    }

    #[test]
    fn alias_may_contain_hyphens() {
        let parsed = TokenFileName::parse("anthropic-oauth-2-ci-machine.json").unwrap();
        assert_eq!(parsed.alias, "ci-machine");
    }

    #[test]
    fn rejects_names_without_the_oauth_marker() {
        assert!(TokenFileName::parse("config.json").is_none());
        assert!(TokenFileName::parse("qwen-primary.json").is_none());
    }

    #[test]
    fn find_picks_lowest_matching_sequence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("qwen-oauth-3-primary.json"), "{}").unwrap();
        fs::write(dir.path().join("qwen-oauth-1-primary.json"), "{}").unwrap();
        fs::write(dir.path().join("qwen-oauth-0-other.json"), "{}").unwrap();

        let found = find(dir.path(), "qwen", "primary").unwrap().unwrap();
        assert_eq!(found.sequence, 1);
    }

    #[test]
    fn find_returns_none_for_missing_directory() {
        let missing = PathBuf::from("/nonexistent/routecodex-auth-dir");
        assert!(find(&missing, "qwen", "primary").unwrap().is_none());
    }

    #[test]
    fn allocate_skips_used_sequences_for_the_provider_type() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("qwen-oauth-0-primary.json"), "{}").unwrap();
        fs::write(dir.path().join("qwen-oauth-1-secondary.json"), "{}").unwrap();

        let allocated = allocate(dir.path(), "qwen", "tertiary").unwrap();
        assert_eq!(allocated.sequence, 2);
    }

    #[test]
    fn write_atomic_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qwen-oauth-0-primary.json");
        let record = TokenRecord {
            access_token: "tok".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: 1_700_000_000_000,
            scope: Some("chat".to_string()),
            resource_url: None,
            id_token: None,
            provider_metadata: None,
        };

        write_atomic(&path, &record).unwrap();
        let read_back = read(&path).unwrap();

        assert_eq!(read_back.access_token, "tok");
        assert_eq!(read_back.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn is_expired_at_compares_against_expires_at() {
        let record = TokenRecord {
            access_token: "tok".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: 1_000,
            scope: None,
            resource_url: None,
            id_token: None,
            provider_metadata: None,
        };

        assert!(!record.is_expired_at(999));
        assert!(record.is_expired_at(1_000));
        assert!(record.is_expired_at(1_001));
    }
}
