//! Persistent chat history, keyed by session key.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::core::config::io::project_dirs;
use crate::core::error::HistoryError;
use crate::core::message::Message;

pub trait MessageRepository: Send + Sync {
    fn save_message(&self, session_key: &str, message: &Message) -> Result<(), HistoryError>;

    /// Messages stored under the key in insertion order; empty for an unknown
    /// key.
    fn load_chat_history(&self, session_key: &str) -> Result<Vec<Message>, HistoryError>;

    /// Remove every message stored under the key. Deleting an unknown key is
    /// not an error.
    fn delete_chat_history(&self, session_key: &str) -> Result<(), HistoryError>;

    /// Keys with stored history, oldest first.
    fn list_session_keys(&self) -> Result<Vec<String>, HistoryError>;
}

/// Handle to the persistence layer. Acquire with [`DbManager::open`] and
/// release with [`DbManager::close`].
#[derive(Clone)]
pub struct DbManager {
    pub message_repo: Arc<dyn MessageRepository>,
}

impl DbManager {
    pub fn open(dir: &Path) -> Result<Self, HistoryError> {
        let repo = JsonFileRepository::open(dir)?;
        Ok(Self {
            message_repo: Arc::new(repo),
        })
    }

    /// Open the store under the platform data directory.
    pub fn open_default() -> Result<Self, HistoryError> {
        Self::open(&default_history_dir()?)
    }

    pub fn in_memory() -> Self {
        Self {
            message_repo: Arc::new(MemoryRepository::default()),
        }
    }

    pub fn close(self) {
        debug!("closing history store");
        drop(self.message_repo);
    }
}

pub fn default_history_dir() -> Result<PathBuf, HistoryError> {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("chats"))
        .ok_or(HistoryError::NoDataDir)
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredChat {
    session_key: String,
    messages: Vec<Message>,
}

/// One `<encoded key>.json` file per session.
pub struct JsonFileRepository {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    pub fn open(dir: &Path) -> Result<Self, HistoryError> {
        fs::create_dir_all(dir).map_err(|source| HistoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!(dir = %dir.display(), "opened history store");
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, session_key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(session_key)))
    }

    /// The stored chat for `session_key`. A file whose recorded key differs
    /// is never treated as this session's history.
    fn read_session(&self, session_key: &str) -> Result<(PathBuf, Option<StoredChat>), HistoryError> {
        let path = self.path_for(session_key);
        match self.read(&path)? {
            Some(chat) if chat.session_key != session_key => Err(HistoryError::KeyMismatch {
                path,
                expected: session_key.to_string(),
                found: chat.session_key,
            }),
            chat => Ok((path, chat)),
        }
    }

    fn read(&self, path: &Path) -> Result<Option<StoredChat>, HistoryError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| HistoryError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    fn write(&self, path: &Path, chat: &StoredChat) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_vec_pretty(chat).map_err(|source| HistoryError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let mut temp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp.write_all(&json).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

impl MessageRepository for JsonFileRepository {
    fn save_message(&self, session_key: &str, message: &Message) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let (path, chat) = self.read_session(session_key)?;
        let mut chat = chat.unwrap_or_else(|| StoredChat {
            session_key: session_key.to_string(),
            messages: Vec::new(),
        });
        chat.messages.push(message.clone());
        self.write(&path, &chat)?;
        debug!(session_key, count = chat.messages.len(), "saved message");
        Ok(())
    }

    fn load_chat_history(&self, session_key: &str) -> Result<Vec<Message>, HistoryError> {
        let (_, chat) = self.read_session(session_key)?;
        Ok(chat.map(|chat| chat.messages).unwrap_or_default())
    }

    fn delete_chat_history(&self, session_key: &str) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let (path, chat) = self.read_session(session_key)?;
        if chat.is_none() {
            return Ok(());
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(session_key, "deleted chat history");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(HistoryError::Io { path, source }),
        }
    }

    fn list_session_keys(&self) -> Result<Vec<String>, HistoryError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| HistoryError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut keys = BTreeSet::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(chat) = self.read(&path)? {
                keys.insert(chat.session_key);
            }
        }
        Ok(keys.into_iter().collect())
    }
}

/// File stem for a session key. Lowercase ASCII letters, digits, `-` and `_`
/// are kept; every other byte becomes `%XX`, so distinct keys never share a
/// file, even on case-insensitive file systems.
pub fn encode_key(session_key: &str) -> String {
    let mut encoded = String::with_capacity(session_key.len());
    for byte in session_key.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[derive(Default)]
pub struct MemoryRepository {
    chats: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryRepository {
    fn chats(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Message>>> {
        self.chats.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl MessageRepository for MemoryRepository {
    fn save_message(&self, session_key: &str, message: &Message) -> Result<(), HistoryError> {
        self.chats()
            .entry(session_key.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    fn load_chat_history(&self, session_key: &str) -> Result<Vec<Message>, HistoryError> {
        Ok(self.chats().get(session_key).cloned().unwrap_or_default())
    }

    fn delete_chat_history(&self, session_key: &str) -> Result<(), HistoryError> {
        self.chats().remove(session_key);
        Ok(())
    }

    fn list_session_keys(&self) -> Result<Vec<String>, HistoryError> {
        let mut keys: Vec<String> = self.chats().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(repo: &dyn MessageRepository) {
        repo.save_message("abc123", &Message::user("Hello")).unwrap();
        repo.save_message("abc123", &Message::assistant("Hi there!"))
            .unwrap();
        repo.save_message("other", &Message::user("Unrelated")).unwrap();

        assert_eq!(
            repo.load_chat_history("abc123").unwrap(),
            vec![Message::user("Hello"), Message::assistant("Hi there!")]
        );
        assert_eq!(repo.list_session_keys().unwrap(), vec!["abc123", "other"]);

        repo.delete_chat_history("abc123").unwrap();
        assert!(repo.load_chat_history("abc123").unwrap().is_empty());
        assert_eq!(repo.load_chat_history("other").unwrap().len(), 1);
        assert_eq!(repo.list_session_keys().unwrap(), vec!["other"]);

        repo.delete_chat_history("never-existed").unwrap();
    }

    #[test]
    fn memory_repository_round_trip() {
        exercise(&MemoryRepository::default());
    }

    #[test]
    fn json_repository_round_trip() {
        let dir = tempdir().unwrap();
        let repo = JsonFileRepository::open(&dir.path().join("chats")).unwrap();
        exercise(&repo);
    }

    #[test]
    fn json_repository_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = DbManager::open(dir.path()).unwrap();
            db.message_repo
                .save_message("2024-01-01_10-00-00-000000", &Message::user("Hello"))
                .unwrap();
            db.close();
        }
        let db = DbManager::open(dir.path()).unwrap();
        assert_eq!(
            db.message_repo
                .load_chat_history("2024-01-01_10-00-00-000000")
                .unwrap(),
            vec![Message::user("Hello")]
        );
    }

    #[test]
    fn unsafe_keys_are_encoded_but_listed_verbatim() {
        let dir = tempdir().unwrap();
        let repo = JsonFileRepository::open(dir.path()).unwrap();
        repo.save_message("../escape me", &Message::user("x")).unwrap();

        assert!(dir.path().join("%2E%2E%2Fescape%20me.json").exists());
        assert_eq!(repo.list_session_keys().unwrap(), vec!["../escape me"]);
    }

    #[test]
    fn similar_keys_keep_separate_histories() {
        let dir = tempdir().unwrap();
        let repo = JsonFileRepository::open(dir.path()).unwrap();
        repo.save_message("team.a", &Message::user("from team.a")).unwrap();
        repo.save_message("Team_A", &Message::user("from Team_A")).unwrap();

        assert!(repo.load_chat_history("team_a").unwrap().is_empty());

        repo.delete_chat_history("team_a").unwrap();
        assert_eq!(
            repo.load_chat_history("team.a").unwrap(),
            vec![Message::user("from team.a")]
        );

        repo.save_message("team_a", &Message::user("from team_a")).unwrap();
        assert_eq!(
            repo.load_chat_history("team.a").unwrap(),
            vec![Message::user("from team.a")]
        );
        assert_eq!(
            repo.load_chat_history("Team_A").unwrap(),
            vec![Message::user("from Team_A")]
        );
        assert_eq!(
            repo.list_session_keys().unwrap(),
            vec!["Team_A", "team.a", "team_a"]
        );
    }

    #[test]
    fn file_recorded_under_another_key_is_rejected() {
        let dir = tempdir().unwrap();
        let repo = JsonFileRepository::open(dir.path()).unwrap();
        repo.save_message("other", &Message::user("x")).unwrap();
        fs::rename(dir.path().join("other.json"), dir.path().join("mine.json")).unwrap();

        let err = repo.load_chat_history("mine").unwrap_err();
        assert!(matches!(err, HistoryError::KeyMismatch { .. }));
        assert!(repo.save_message("mine", &Message::user("y")).is_err());
        assert!(repo.delete_chat_history("mine").is_err());
        assert!(dir.path().join("mine.json").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let repo = JsonFileRepository::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        assert!(matches!(
            repo.load_chat_history("broken"),
            Err(HistoryError::Corrupt { .. })
        ));
    }
}
