//! Shared state for the Telegram bot.
//!
//! Everything handlers need lives here: the database, the conversation
//! pipeline, report generation, document ingestion and pending invites.
//! Methods take plain ids and strings so the bot logic can be exercised
//! without a Telegram connection.

use std::sync::Arc;

use tracing::{info, warn};
use tutor_agent::{
    ChatModel, ConversationPipeline, ModelConfig, OpenRouterClient, PipelineReply,
    ReportGenerator, RollcallReport,
};
use tutor_core::Settings;
use tutor_memory::{
    ChunkStore, Collection, EmbeddingGenerator, IngestReport, Ingestor, LocalStore, SourceSummary,
};
use tutor_models::{
    Conversation, ConversationId, FeedbackId, FeedbackRecord, Role, User, UserId, Vote, VoteOutcome,
};
use tutor_persistence::Database;

use crate::error::{BotError, Result};
use crate::invites::InviteBook;

/// Which instructor report to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupReport {
    Misconceptions,
    Sitrep,
}

impl GroupReport {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Misconceptions => "misconceptions",
            Self::Sitrep => "sitrep",
        }
    }
}

/// Documents visible to a user.
#[derive(Debug, Clone, Default)]
pub struct DocumentListing {
    pub own: Vec<SourceSummary>,
    pub global: Vec<SourceSummary>,
}

/// Shared state for the Telegram bot, accessible across all handlers.
pub struct BotState {
    db: Arc<Database>,
    store: Arc<dyn ChunkStore>,
    pipeline: ConversationPipeline,
    reports: ReportGenerator,
    ingestor: Ingestor,
    invites: InviteBook,
    settings: Settings,
}

impl BotState {
    /// Assemble the state from its parts.
    pub fn new(
        db: Arc<Database>,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn ChunkStore>,
        embedder: EmbeddingGenerator,
        invites: InviteBook,
        settings: Settings,
    ) -> Result<Self> {
        let pipeline = ConversationPipeline::new(
            db.clone(),
            model.clone(),
            store.clone(),
            embedder.clone(),
            &settings,
        );
        let reports = ReportGenerator::new(db.clone(), model, settings.report_days);
        let ingestor = Ingestor::new(
            store.clone(),
            embedder,
            settings.chunk_size,
            settings.chunk_overlap,
        )?;

        Ok(Self {
            db,
            store,
            pipeline,
            reports,
            ingestor,
            invites,
            settings,
        })
    }

    /// Build the production state: OpenRouter model and on-disk stores
    /// under the state directory.
    pub async fn from_env(settings: Settings) -> Result<Self> {
        let model_config = ModelConfig::from_env();
        let client = OpenRouterClient::from_env()?;
        let embedder = EmbeddingGenerator::from_env();
        if !embedder.is_real() {
            warn!("Document search runs on hash embeddings; set OPENAI_API_KEY or OPENROUTER_API_KEY");
        }

        let db_dir = tutor_core::db_dir();
        let db = Arc::new(Database::open(&db_dir));
        let store: Arc<dyn ChunkStore> = Arc::new(LocalStore::new(tutor_core::documents_dir()).await?);
        let invites = InviteBook::open(tutor_core::invites_file(), settings.invite_ttl_secs);

        info!(model = %model_config.model, db = %db_dir.display(), "Bot state ready");
        let mut state = Self::new(db, Arc::new(client), store, embedder, invites, settings)?;
        state.pipeline = state.pipeline.with_model_config(model_config.clone());
        state.reports = state.reports.with_model_config(model_config);
        Ok(state)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Load (or create) the user behind a Telegram account and refresh
    /// their handle and last-seen time. Listed admin handles are promoted
    /// on first contact.
    pub fn resolve_user(&self, id: i64, handle: Option<&str>) -> Result<User> {
        let users = self.db.users();
        let mut user = match users.get(UserId(id))? {
            Some(user) => user,
            None => {
                info!(user_id = id, handle = ?handle, "New user");
                User::new(id, handle.map(str::to_string))
            }
        };

        if let Some(handle) = handle {
            user.handle = Some(handle.trim_start_matches('@').to_string());
        }
        if !user.is_admin()
            && user
                .handle
                .as_deref()
                .is_some_and(|h| self.settings.is_admin_handle(h))
        {
            info!(user_id = id, "Promoting configured admin handle");
            user.authenticate(Role::Admin, None);
        }

        user.last_seen = chrono::Utc::now();
        users.upsert(&user)?;
        Ok(user)
    }

    /// Redeem an invite code for the user.
    pub async fn register(&self, user: &User, code: &str) -> Result<User> {
        let invite = self.invites.consume(code).await?;
        let mut user = user.clone();
        // An admin registering with a student code stays admin.
        let role = if user.is_admin() { Role::Admin } else { invite.role };
        user.authenticate(role, Some(invite.lab_group.clone()));
        if let Err(e) = self.db.users().upsert(&user) {
            warn!(user_id = %user.id, error = %e, "Registration not saved, restoring invite");
            self.invites.restore(code, invite).await?;
            return Err(e.into());
        }
        info!(
            user_id = %user.id,
            group = %invite.lab_group,
            role = %role,
            "User registered"
        );
        Ok(user)
    }

    /// Create an invite for a lab group. Admin only.
    pub async fn create_invite(&self, admin: &User, lab_group: &str, role: Role) -> Result<String> {
        require_admin(admin)?;
        let lab_group = lab_group.trim();
        if lab_group.is_empty() {
            return Err(BotError::NoGroup("invite"));
        }
        self.invites.create(lab_group, role, admin.id).await
    }

    /// Start a new conversation.
    pub fn new_conversation(&self, user: &User) -> Result<ConversationId> {
        require_authenticated(user)?;
        Ok(self.db.advance_conversation(user.id)?)
    }

    /// All conversations of the user, oldest first.
    pub fn conversations(&self, user: &User) -> Result<Vec<Conversation>> {
        require_authenticated(user)?;
        Ok(self.db.chats().list_conversations(user.id)?)
    }

    pub async fn ask(&self, user: &User, text: &str) -> Result<PipelineReply> {
        require_authenticated(user)?;
        Ok(self.pipeline.handle_message(user, text).await?)
    }

    pub async fn teach(&self, user: &User, topic: &str) -> Result<PipelineReply> {
        require_authenticated(user)?;
        Ok(self.pipeline.teach(user, topic).await?)
    }

    pub async fn learning_style(&self, user: &User) -> Result<String> {
        require_authenticated(user)?;
        Ok(self.pipeline.learning_style(user).await?)
    }

    /// Record a 👍 / 👎 on a reply.
    pub fn vote(
        &self,
        feedback_id: &FeedbackId,
        voter: UserId,
        vote: Vote,
    ) -> Result<(FeedbackRecord, VoteOutcome)> {
        Ok(self.db.feedback().vote(feedback_id, voter, vote)?)
    }

    /// Group named in the command, else the admin's own group.
    fn report_group(&self, admin: &User, arg: &str, command: &'static str) -> Result<String> {
        require_admin(admin)?;
        let arg = arg.trim();
        if !arg.is_empty() {
            return Ok(arg.to_string());
        }
        admin.lab_group.clone().ok_or(BotError::NoGroup(command))
    }

    pub async fn rollcall(&self, admin: &User, group: &str) -> Result<RollcallReport> {
        let group = self.report_group(admin, group, "rollcall")?;
        Ok(self.reports.rollcall(&group).await?)
    }

    pub async fn group_report(&self, admin: &User, group: &str, report: GroupReport) -> Result<String> {
        let group = self.report_group(admin, group, report.command())?;
        let text = match report {
            GroupReport::Misconceptions => self.reports.misconceptions(&group).await?,
            GroupReport::Sitrep => self.reports.sitrep(&group).await?,
        };
        Ok(text)
    }

    /// Store an uploaded file. Admin uploads captioned with "global" go to
    /// the shared corpus, everything else to the uploader's collection.
    pub async fn ingest_upload(
        &self,
        user: &User,
        filename: &str,
        bytes: &[u8],
        caption: Option<&str>,
    ) -> Result<(Collection, IngestReport)> {
        require_authenticated(user)?;
        self.check_upload_size(bytes.len() as u64)?;

        let wants_global = caption.is_some_and(|c| c.to_lowercase().contains("global"));
        let collection = if wants_global && user.is_admin() {
            Collection::Global
        } else {
            Collection::User(user.id)
        };

        let report = self.ingestor.ingest(collection, filename, bytes).await?;
        Ok((collection, report))
    }

    /// Reject files above the configured limit before downloading them.
    pub fn check_upload_size(&self, size: u64) -> Result<()> {
        let limit = self.settings.max_upload_bytes;
        if size > limit {
            return Err(BotError::UploadTooLarge { size, limit });
        }
        Ok(())
    }

    pub async fn documents(&self, user: &User) -> Result<DocumentListing> {
        require_authenticated(user)?;
        Ok(DocumentListing {
            own: self.store.list_sources(&Collection::User(user.id)).await?,
            global: self.store.list_sources(&Collection::Global).await?,
        })
    }

    /// Delete the user's own documents, returning the number of chunks removed.
    pub async fn clear_documents(&self, user: &User) -> Result<usize> {
        require_authenticated(user)?;
        Ok(self.store.clear(&Collection::User(user.id)).await?)
    }

    /// Delete the global corpus. Admin only.
    pub async fn clear_global(&self, admin: &User) -> Result<usize> {
        require_admin(admin)?;
        Ok(self.store.clear(&Collection::Global).await?)
    }
}

fn require_authenticated(user: &User) -> Result<()> {
    if user.authenticated {
        Ok(())
    } else {
        Err(BotError::NotAuthenticated)
    }
}

fn require_admin(user: &User) -> Result<()> {
    require_authenticated(user)?;
    if user.is_admin() {
        Ok(())
    } else {
        Err(BotError::NotAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tutor_agent::PromptMessage;

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(
            &self,
            messages: &[PromptMessage],
            _config: &ModelConfig,
        ) -> tutor_agent::Result<String> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            // classifier calls carry the label prompt; answer them with a label
            if messages[0].content.contains("Reply with \"General\" or \"Guidance\"") {
                return Ok("General".to_string());
            }
            Ok(format!("echo: {}", last))
        }
    }

    async fn state(dir: &TempDir, settings: Settings) -> BotState {
        let db = Arc::new(Database::open(dir.path().join("db")));
        let store: Arc<dyn ChunkStore> =
            Arc::new(LocalStore::new(dir.path().join("docs")).await.unwrap());
        let invites = InviteBook::open(dir.path().join("invites.json"), 3600);
        BotState::new(
            db,
            Arc::new(Echo),
            store,
            EmbeddingGenerator::hash_based(8),
            invites,
            settings,
        )
        .unwrap()
    }

    fn admin_settings() -> Settings {
        Settings {
            admin_handles: vec!["prof".to_string()],
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_user_creates_and_promotes() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, admin_settings()).await;

        let student = state.resolve_user(1, Some("ada")).unwrap();
        assert!(!student.authenticated);

        let prof = state.resolve_user(2, Some("Prof")).unwrap();
        assert!(prof.is_admin());
        assert!(state.db().users().require(UserId(2)).unwrap().is_admin());

        let renamed = state.resolve_user(1, Some("ada_l")).unwrap();
        assert_eq!(renamed.handle.as_deref(), Some("ada_l"));
    }

    #[tokio::test]
    async fn test_invite_and_register() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, admin_settings()).await;
        let prof = state.resolve_user(2, Some("prof")).unwrap();
        let ada = state.resolve_user(1, Some("ada")).unwrap();

        assert!(matches!(
            state.create_invite(&ada, "lab1", Role::Student).await,
            Err(BotError::NotAuthenticated)
        ));

        let code = state.create_invite(&prof, "lab1", Role::Student).await.unwrap();
        let ada = state.register(&ada, &code).await.unwrap();
        assert!(ada.authenticated);
        assert_eq!(ada.lab_group.as_deref(), Some("lab1"));
        assert!(!ada.is_admin());

        assert!(matches!(
            state.create_invite(&ada, "lab1", Role::Student).await,
            Err(BotError::NotAdmin)
        ));
        assert!(matches!(
            state.register(&ada, &code).await,
            Err(BotError::InvalidInviteCode)
        ));
    }

    #[tokio::test]
    async fn test_failed_registration_keeps_invite() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, admin_settings()).await;
        let prof = state.resolve_user(2, Some("prof")).unwrap();
        let code = state.create_invite(&prof, "lab1", Role::Student).await.unwrap();

        // A file where the users directory belongs makes the save fail.
        let users_dir = dir.path().join("db").join("users");
        std::fs::remove_dir_all(&users_dir).unwrap();
        std::fs::write(&users_dir, b"").unwrap();

        let ada = User::new(1, Some("ada".to_string()));
        assert!(matches!(
            state.register(&ada, &code).await,
            Err(BotError::Persistence(_))
        ));
        assert_eq!(state.invites.pending().await, 1);

        std::fs::remove_file(&users_dir).unwrap();
        let ada = state.register(&ada, &code).await.unwrap();
        assert!(ada.authenticated);
        assert_eq!(state.invites.pending().await, 0);
    }

    #[tokio::test]
    async fn test_unregistered_user_is_turned_away() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Settings::default()).await;
        let user = state.resolve_user(1, None).unwrap();

        assert!(matches!(state.ask(&user, "hi").await, Err(BotError::NotAuthenticated)));
        assert!(matches!(state.new_conversation(&user), Err(BotError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_ask_and_vote() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, admin_settings()).await;
        let prof = state.resolve_user(2, Some("prof")).unwrap();

        let reply = state.ask(&prof, "hello").await.unwrap();
        assert_eq!(reply.text, "echo: hello");

        let (record, outcome) = state.vote(&reply.feedback_id, UserId(2), Vote::Like).unwrap();
        assert_eq!(outcome, VoteOutcome::Recorded);
        assert_eq!(record.likes, 1);
        let (_, outcome) = state.vote(&reply.feedback_id, UserId(2), Vote::Like).unwrap();
        assert_eq!(outcome, VoteOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_uploads_go_to_the_right_collection() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, admin_settings()).await;
        let prof = state.resolve_user(2, Some("prof")).unwrap();
        let code = state.create_invite(&prof, "lab1", Role::Student).await.unwrap();
        let ada = state.resolve_user(1, Some("ada")).unwrap();
        let ada = state.register(&ada, &code).await.unwrap();

        let (collection, _) = state
            .ingest_upload(&prof, "syllabus.txt", b"Week 1: circuits", Some("for global use"))
            .await
            .unwrap();
        assert_eq!(collection, Collection::Global);

        // students cannot write to the global corpus
        let (collection, _) = state
            .ingest_upload(&ada, "notes.txt", b"my notes", Some("global"))
            .await
            .unwrap();
        assert_eq!(collection, Collection::User(ada.id));

        let listing = state.documents(&ada).await.unwrap();
        assert_eq!(listing.own.len(), 1);
        assert_eq!(listing.global.len(), 1);

        assert_eq!(state.clear_documents(&ada).await.unwrap(), 1);
        assert!(matches!(state.clear_global(&ada).await, Err(BotError::NotAdmin)));
        assert_eq!(state.clear_global(&prof).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            max_upload_bytes: 4,
            ..admin_settings()
        };
        let state = state(&dir, settings).await;
        let prof = state.resolve_user(2, Some("prof")).unwrap();

        assert!(matches!(
            state.ingest_upload(&prof, "big.txt", b"too long", None).await,
            Err(BotError::UploadTooLarge { size: 8, limit: 4 })
        ));
    }

    #[tokio::test]
    async fn test_report_group_resolution() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, admin_settings()).await;
        let prof = state.resolve_user(2, Some("prof")).unwrap();

        assert!(matches!(
            state.group_report(&prof, "", GroupReport::Sitrep).await,
            Err(BotError::NoGroup("sitrep"))
        ));

        let text = state
            .group_report(&prof, "lab1", GroupReport::Misconceptions)
            .await
            .unwrap();
        assert!(text.starts_with("No student activity in lab1"));

        let rollcall = state.rollcall(&prof, " lab1 ").await.unwrap();
        assert_eq!(rollcall.group, "lab1");
    }
}
