//! Local resume cache: one JSON file per session token, overwritten on every
//! change. This is a best-effort convenience for surviving a restart, not a
//! durable store; the server stays authoritative.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::SessionToken;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ResumeSnapshot {
    #[serde(default)]
    pub(crate) current_question_index: usize,
    #[serde(default)]
    pub(crate) answers: BTreeMap<u32, String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResumeStore {
    dir: PathBuf,
}

impl ResumeStore {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // The file name is a digest of the token so the opaque token never lands
    // on disk in the clear.
    fn entry_path(&self, token: &SessionToken) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(token.as_str().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    pub(crate) async fn load(&self, token: &SessionToken) -> Option<ResumeSnapshot> {
        let path = self.entry_path(token);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "discarding unreadable resume entry"
                );
                None
            }
        }
    }

    /// Best effort: a failed write is logged and otherwise ignored.
    pub(crate) async fn save(&self, token: &SessionToken, snapshot: &ResumeSnapshot) {
        let serialized = match serde_json::to_string(snapshot) {
            Ok(serialized) => serialized,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize resume entry");
                return;
            }
        };
        if let Err(err) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!(
                error = %err,
                dir = %self.dir.display(),
                "failed to create resume directory"
            );
            return;
        }
        let path = self.entry_path(token);
        if let Err(err) = tokio::fs::write(&path, serialized).await {
            tracing::warn!(error = %err, path = %path.display(), "failed to write resume entry");
        }
    }

    pub(crate) async fn delete(&self, token: &SessionToken) {
        let path = self.entry_path(token);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "failed to delete resume entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> ResumeStore {
        ResumeStore::new(std::env::temp_dir().join(format!("cbt-resume-{}", uuid::Uuid::new_v4())))
    }

    fn snapshot() -> ResumeSnapshot {
        ResumeSnapshot {
            current_question_index: 4,
            answers: BTreeMap::from([(1, "A".to_string()), (5, "C".to_string())]),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = temp_store();
        let token = SessionToken::new("round-trip-token");

        store.save(&token, &snapshot()).await;
        assert_eq!(store.load(&token).await, Some(snapshot()));

        store.delete(&token).await;
        assert_eq!(store.load(&token).await, None);
    }

    #[tokio::test]
    async fn save_overwrites_the_previous_entry() {
        let store = temp_store();
        let token = SessionToken::new("overwrite-token");

        store.save(&token, &snapshot()).await;
        let newer = ResumeSnapshot {
            current_question_index: 0,
            answers: BTreeMap::from([(1, "B".to_string())]),
        };
        store.save(&token, &newer).await;

        assert_eq!(store.load(&token).await, Some(newer));
    }

    #[tokio::test]
    async fn unreadable_entries_are_discarded() {
        let store = temp_store();
        let token = SessionToken::new("corrupt-token");

        store.save(&token, &snapshot()).await;
        let path = store.entry_path(&token);
        tokio::fs::write(&path, "{not json").await.unwrap();

        assert_eq!(store.load(&token).await, None);
    }

    #[tokio::test]
    async fn entry_file_name_does_not_expose_the_token() {
        let store = temp_store();
        let token = SessionToken::new("very-secret-token");

        let path = store.entry_path(&token);
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!file_name.contains("very-secret-token"));
        assert!(file_name.ends_with(".json"));
        // SHA-256 hex plus the extension.
        assert_eq!(file_name.len(), 64 + 5);
    }

    #[tokio::test]
    async fn delete_of_a_missing_entry_is_silent() {
        let store = temp_store();
        store.delete(&SessionToken::new("never-saved")).await;
    }
}
