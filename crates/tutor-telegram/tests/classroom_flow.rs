//! Instructor invites a student, the student chats and uploads notes, the
//! instructor runs reports.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tutor_agent::{ChatModel, ModelConfig, PromptMessage};
use tutor_core::Settings;
use tutor_memory::{ChunkStore, EmbeddingGenerator, LocalStore};
use tutor_models::{Role, Vote, VoteOutcome};
use tutor_persistence::Database;
use tutor_telegram::{BotError, BotState, GroupReport, InviteBook};

/// Labels classifier calls, summarises report calls, echoes the rest.
#[derive(Default)]
struct Classroom {
    calls: Mutex<usize>,
}

#[async_trait]
impl ChatModel for Classroom {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        _config: &ModelConfig,
    ) -> tutor_agent::Result<String> {
        *self.calls.lock().unwrap() += 1;
        let system = &messages[0].content;
        let last = &messages[messages.len() - 1].content;
        if system.contains("Reply with \"General\" or \"Guidance\"") {
            return Ok(if last.contains("my code") { "Guidance" } else { "General" }.into());
        }
        if messages.len() == 2 && last.contains("@ada") {
            return Ok("Ada keeps mixing up ohms and amps.".into());
        }
        Ok(format!("answer to: {}", last))
    }
}

async fn setup(dir: &TempDir) -> (BotState, Arc<Classroom>) {
    let settings = Settings {
        admin_handles: vec!["prof".into()],
        ..Settings::default()
    };
    let model = Arc::new(Classroom::default());
    let db = Arc::new(Database::open(dir.path().join("db")));
    let store: Arc<dyn ChunkStore> =
        Arc::new(LocalStore::new(dir.path().join("documents")).await.unwrap());
    let invites = InviteBook::open(dir.path().join("invites.json"), settings.invite_ttl_secs);
    let state = BotState::new(
        db,
        model.clone(),
        store,
        EmbeddingGenerator::hash_based(16),
        invites,
        settings,
    )
    .unwrap();
    (state, model)
}

#[tokio::test]
async fn test_classroom_day() {
    let dir = TempDir::new().unwrap();
    let (state, model) = setup(&dir).await;

    // The configured instructor is an admin on first contact.
    let prof = state.resolve_user(100, Some("@Prof")).unwrap();
    assert!(prof.is_admin());
    let code = state.create_invite(&prof, "lab1", Role::Student).await.unwrap();

    // A new student is turned away until registered.
    let ada = state.resolve_user(1, Some("ada")).unwrap();
    assert!(matches!(state.ask(&ada, "hi").await, Err(BotError::NotAuthenticated)));
    let ada = state.register(&ada, &code.to_lowercase()).await.unwrap();
    assert_eq!(ada.role, Role::Student);

    // Notes uploaded by the student become retrieval context.
    let (_, report) = state
        .ingest_upload(&ada, "ohm.txt", b"Ohm's law: V = I * R", None)
        .await
        .unwrap();
    assert_eq!(report.chunks, 1);

    let reply = state.ask(&ada, "what is ohm's law").await.unwrap();
    assert!(reply.text.starts_with("answer to:"));
    assert!(!reply.cached);

    let (record, outcome) = state.vote(&reply.feedback_id, prof.id, Vote::Like).unwrap();
    assert_eq!(outcome, VoteOutcome::Recorded);
    assert_eq!(record.likes, 1);

    // A later reply in a fresh conversation comes from the cache.
    let ada = state.resolve_user(1, Some("ada")).unwrap();
    let next = state.new_conversation(&ada).unwrap();
    assert_eq!(next, 2);
    let ada = state.resolve_user(1, Some("ada")).unwrap();
    assert_eq!(ada.conversation_id, 2);
    let calls_before = *model.calls.lock().unwrap();
    let cached = state.ask(&ada, "What is  Ohm's law").await.unwrap();
    assert!(cached.cached);
    // only the classifier ran
    assert_eq!(*model.calls.lock().unwrap(), calls_before + 1);

    let conversations = state.conversations(&ada).unwrap();
    assert_eq!(conversations.len(), 2);

    // Instructor reports over the lab group.
    let rollcall = state.rollcall(&prof, "lab1").await.unwrap();
    assert_eq!(rollcall.entries.len(), 1);
    assert_eq!(rollcall.active_count(), 1);

    assert!(matches!(
        state.rollcall(&ada, "lab1").await,
        Err(BotError::NotAdmin)
    ));
    assert!(matches!(
        state.group_report(&prof, "", GroupReport::Sitrep).await,
        Err(BotError::NoGroup("sitrep"))
    ));
}

#[tokio::test]
async fn test_admin_invite_promotes_student() {
    let dir = TempDir::new().unwrap();
    let (state, _) = setup(&dir).await;

    let prof = state.resolve_user(100, Some("prof")).unwrap();
    let code = state.create_invite(&prof, "lab2", Role::Admin).await.unwrap();

    let ta = state.resolve_user(7, Some("ta")).unwrap();
    let ta = state.register(&ta, &code).await.unwrap();
    assert!(ta.is_admin());
    assert_eq!(ta.lab_group.as_deref(), Some("lab2"));

    // The TA's own group is used when none is given.
    let report = state.rollcall(&ta, "").await.unwrap();
    assert_eq!(report.group, "lab2");
    assert!(report.entries.is_empty());
}
