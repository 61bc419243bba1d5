//! One chat turn from user input to persisted transcript.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::backends::ImageAttachment;
use crate::core::dispatcher::BackendDispatcher;
use crate::core::error::ChatError;
use crate::core::message::Message;
use crate::core::session::{Session, SessionKeySource};
use crate::history::DbManager;

pub struct ChatService {
    dispatcher: BackendDispatcher,
    db: DbManager,
    keys: Arc<dyn SessionKeySource>,
}

impl ChatService {
    pub fn new(dispatcher: BackendDispatcher, db: DbManager, keys: Arc<dyn SessionKeySource>) -> Self {
        Self {
            dispatcher,
            db,
            keys,
        }
    }

    pub fn dispatcher(&self) -> &BackendDispatcher {
        &self.dispatcher
    }

    pub fn db(&self) -> &DbManager {
        &self.db
    }

    /// Append the user message, ask the backend, append the reply, and return
    /// the transcript to render. On failure the user message stays in the
    /// transcript and nothing else is appended.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        user_input: &str,
        image: Option<ImageAttachment>,
    ) -> Result<Vec<Message>, ChatError> {
        if user_input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let session_key = session.get_session_key(self.keys.as_ref());

        let user_message = Message::user(user_input);
        session.messages.push(user_message.clone());
        self.db.message_repo.save_message(&session_key, &user_message)?;

        let reply = match self
            .dispatcher
            .chat(session, user_input, &session.messages, image.as_ref())
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%session_key, error = %err, "turn failed");
                return Err(err);
            }
        };

        let assistant_message = Message::assistant(reply);
        session.messages.push(assistant_message.clone());
        self.db
            .message_repo
            .save_message(&session_key, &assistant_message)?;
        session.resolve_session_key(self.keys.as_ref());

        Ok(session.messages.clone())
    }

    /// Erase everything stored under the current key and start a fresh
    /// session.
    pub fn delete_chat_session_history(&self, session: &mut Session) -> Result<(), ChatError> {
        if let Some(key) = session.current_session_key() {
            self.db.message_repo.delete_chat_history(key)?;
            info!(session_key = key, "chat session history deleted");
        }
        session.start_new_session();
        Ok(())
    }

    /// Continue a stored conversation.
    pub fn load_session(&self, session: &mut Session, session_key: &str) -> Result<usize, ChatError> {
        let messages = self.db.message_repo.load_chat_history(session_key)?;
        let count = messages.len();
        session.messages = messages;
        session.session_key = session_key.to_string();
        session.new_session_key = None;
        info!(session_key, count, "loaded chat session");
        Ok(count)
    }

    pub fn list_sessions(&self) -> Result<Vec<String>, ChatError> {
        Ok(self.db.message_repo.list_session_keys()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SessionDefaults;
    use crate::core::models::Endpoint;
    use crate::core::session::NEW_SESSION;
    use crate::utils::test_utils::{test_catalog, CountingKeys, MockBackend, MockFactory};

    fn service(backend: MockBackend) -> (ChatService, Arc<CountingKeys>) {
        let keys = Arc::new(CountingKeys::default());
        let dispatcher =
            BackendDispatcher::new(Arc::new(MockFactory::new(backend)), test_catalog());
        (
            ChatService::new(dispatcher, DbManager::in_memory(), keys.clone()),
            keys,
        )
    }

    fn session() -> Session {
        Session::new(&SessionDefaults::default())
    }

    #[tokio::test]
    async fn hello_turn_produces_two_message_transcript() {
        let (service, _) = service(MockBackend::replying(Endpoint::Gemini, "Hi there!"));
        let mut session = session();

        let transcript = service.run_turn(&mut session, "Hello", None).await.unwrap();

        assert_eq!(
            transcript,
            vec![Message::user("Hello"), Message::assistant("Hi there!")]
        );
        assert_eq!(session.messages, transcript);
        assert_eq!(session.session_key, "key-1");
        assert_eq!(
            service.db().message_repo.load_chat_history("key-1").unwrap(),
            transcript
        );
    }

    #[tokio::test]
    async fn later_turns_reuse_the_resolved_key() {
        let (service, keys) = service(MockBackend::replying(Endpoint::Gemini, "ok"));
        let mut session = session();

        service.run_turn(&mut session, "one", None).await.unwrap();
        service.run_turn(&mut session, "two", None).await.unwrap();

        assert_eq!(keys.issued(), 1);
        assert_eq!(
            service.db().message_repo.load_chat_history("key-1").unwrap().len(),
            4
        );
    }

    #[tokio::test]
    async fn failed_turn_keeps_user_message_only() {
        let (service, _) = service(MockBackend::failing(Endpoint::Gemini, "overloaded"));
        let mut session = session();

        let err = service.run_turn(&mut session, "Hello", None).await.unwrap_err();

        assert!(matches!(err, ChatError::Upstream { .. }));
        assert_eq!(session.messages, vec![Message::user("Hello")]);
        assert_eq!(session.session_key, NEW_SESSION);
    }

    #[tokio::test]
    async fn unsupported_backend_appends_no_reply() {
        let backend = MockBackend::replying(Endpoint::Gemini, "unused");
        let (service, _) = service(backend.clone());
        let mut session = session();
        session.endpoint_to_use = "mistral".into();

        let err = service.run_turn(&mut session, "Hello", None).await.unwrap_err();
        assert!(matches!(err, ChatError::UnsupportedBackend { .. }));
        assert_eq!(session.messages.len(), 1);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn delete_clears_history_and_forces_new_key() {
        let (service, _) = service(MockBackend::replying(Endpoint::Gemini, "Hi there!"));
        let repo = &service.db().message_repo;
        repo.save_message("abc123", &Message::user("Hello")).unwrap();
        repo.save_message("abc123", &Message::assistant("Hi there!"))
            .unwrap();

        let mut session = session();
        service.load_session(&mut session, "abc123").unwrap();
        assert_eq!(session.messages.len(), 2);

        service.delete_chat_session_history(&mut session).unwrap();

        assert!(repo.load_chat_history("abc123").unwrap().is_empty());
        assert!(session.messages.is_empty());
        assert_eq!(session.session_key, NEW_SESSION);

        service.run_turn(&mut session, "Hello again", None).await.unwrap();
        assert_ne!(session.session_key, "abc123");
        assert_ne!(session.session_key, NEW_SESSION);
        assert!(repo.load_chat_history("abc123").unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_before_first_reply_removes_pending_key() {
        let (service, _) = service(MockBackend::failing(Endpoint::Gemini, "down"));
        let mut session = session();
        let _ = service.run_turn(&mut session, "Hello", None).await;
        let pending = session.current_session_key().unwrap().to_string();
        assert_eq!(
            service.db().message_repo.load_chat_history(&pending).unwrap().len(),
            1
        );

        service.delete_chat_session_history(&mut session).unwrap();
        assert!(service
            .db()
            .message_repo
            .load_chat_history(&pending)
            .unwrap()
            .is_empty());
        assert_eq!(session.current_session_key(), None);
    }
}
