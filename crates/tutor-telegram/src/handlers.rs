//! Command handlers for the Telegram bot.

use std::sync::Arc;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode,
};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};
use tutor_agent::PipelineReply;
use tutor_memory::{Collection, SourceSummary};
use tutor_models::{FeedbackId, Role, User, Vote, VoteOutcome};

use crate::error::BotError;
use crate::state::{BotState, GroupReport};

/// Telegram rejects messages longer than 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Prefix of feedback callback data.
const FEEDBACK_PREFIX: &str = "fb";

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and get help")]
    Start,

    #[command(description = "Show help message")]
    Help,

    #[command(description = "Register with an invite code: /register <CODE>")]
    Register(String),

    #[command(description = "Show your role, lab group and conversation")]
    Whoami,

    #[command(description = "Start a new conversation")]
    Newchat,

    #[command(description = "List your conversations")]
    History,

    #[command(description = "Get a short lesson: /teach <topic>")]
    Teach(String),

    #[command(description = "Analyse your learning style")]
    Style,

    #[command(description = "List your uploaded documents and the course material")]
    Docs,

    #[command(description = "Delete your uploaded documents")]
    Cleardocs,

    #[command(description = "Instructors: create an invite code: /invite <group> [admin]")]
    Invite(String),

    #[command(description = "Instructors: who was active: /rollcall [group]")]
    Rollcall(String),

    #[command(description = "Instructors: common misconceptions: /misconceptions [group]")]
    Misconceptions(String),

    #[command(description = "Instructors: situation report: /sitrep [group]")]
    Sitrep(String),

    #[command(description = "Instructors: delete the shared course material")]
    Clearglobal,
}

/// Escape text for Telegram HTML messages.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Split `text` into pieces of at most `limit` characters, preferring to
/// break at newlines.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = match rest[..hard].rfind('\n') {
            Some(i) if i > 0 => i,
            _ => hard,
        };
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches('\n');
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Callback data for a vote button.
pub fn feedback_data(vote: Vote, id: &FeedbackId) -> String {
    format!("{}:{}:{}", FEEDBACK_PREFIX, vote.as_str(), id)
}

/// Parse `fb:<like|dislike>:<id>` callback data.
pub fn parse_feedback_data(data: &str) -> Option<(Vote, FeedbackId)> {
    let mut parts = data.splitn(3, ':');
    if parts.next()? != FEEDBACK_PREFIX {
        return None;
    }
    let vote = Vote::parse(parts.next()?)?;
    let id = parts.next().filter(|id| !id.is_empty())?;
    Some((vote, FeedbackId::from_string(id)))
}

/// 👍 / 👎 buttons for a reply.
pub fn feedback_keyboard(id: &FeedbackId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("👍", feedback_data(Vote::Like, id)),
        InlineKeyboardButton::callback("👎", feedback_data(Vote::Dislike, id)),
    ]])
}

/// Parse `/invite` arguments: a group, optionally followed by `admin`.
pub fn parse_invite_args(arg: &str) -> Option<(String, Role)> {
    let mut words = arg.split_whitespace();
    let group = words.next()?.to_string();
    let role = match words.next() {
        None => Role::Student,
        Some(w) if w.eq_ignore_ascii_case("admin") => Role::Admin,
        Some(_) => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some((group, role))
}

fn render_sources(title: &str, sources: &[SourceSummary]) -> String {
    if sources.is_empty() {
        return format!("<b>{}:</b> none", title);
    }
    let mut text = format!("<b>{}:</b>", title);
    for source in sources {
        text.push_str(&format!(
            "\n• {} ({} chunks, {})",
            html_escape(&source.source),
            source.chunks,
            source.uploaded_at.format("%Y-%m-%d")
        ));
    }
    text
}

/// Send a possibly long plain-text reply.
async fn send_long(bot: &Bot, chat: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in split_message(text, MAX_MESSAGE_CHARS) {
        bot.send_message(chat, chunk).await?;
    }
    Ok(())
}

/// Send a pipeline reply with vote buttons on the last piece.
async fn send_reply(bot: &Bot, chat: ChatId, reply: &PipelineReply) -> ResponseResult<()> {
    let chunks = split_message(&reply.text, MAX_MESSAGE_CHARS);
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i == last {
            bot.send_message(chat, chunk)
                .reply_markup(feedback_keyboard(&reply.feedback_id))
                .await?;
        } else {
            bot.send_message(chat, chunk).await?;
        }
    }
    Ok(())
}

/// Report a domain error to the user.
async fn send_error(bot: &Bot, chat: ChatId, err: &BotError) -> ResponseResult<()> {
    match err {
        BotError::NotAuthenticated
        | BotError::NotAdmin
        | BotError::NoGroup(_)
        | BotError::InvalidInviteCode
        | BotError::InviteExpired
        | BotError::UploadTooLarge { .. } => {
            debug!(chat_id = %chat, error = %err, "Rejected request");
        }
        _ => error!(chat_id = %chat, error = %err, "Request failed"),
    }
    bot.send_message(chat, format!("❌ {}", err)).await?;
    Ok(())
}

/// Look up the sender, creating the user on first contact.
fn caller(state: &BotState, msg: &Message) -> Option<Result<User, BotError>> {
    let from = msg.from.as_ref()?;
    Some(state.resolve_user(from.id.0 as i64, from.username.as_deref()))
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message, user: User) -> ResponseResult<()> {
    let status = if user.authenticated {
        format!(
            "You are registered as <b>{}</b>{}.",
            user.role,
            user.lab_group
                .as_deref()
                .map(|g| format!(" in lab group <b>{}</b>", html_escape(g)))
                .unwrap_or_default()
        )
    } else {
        "You are not registered yet. Ask your instructor for an invite code and send \
        <code>/register CODE</code>."
            .to_string()
    };

    let welcome = format!(
        "Welcome to Tutorbot! 🎓\n\n\
        I answer questions about your course, help you work through exercises \
        and can use your own notes as context.\n\n\
        <b>Getting Started:</b>\n\
        1. Ask a question in plain text\n\
        2. Upload PDFs, slides or notes to search them\n\
        3. Rate answers with 👍 / 👎\n\
        4. Use /newchat to start over\n\n\
        {}\n\n\
        Type /help for all commands.",
        status
    );

    bot.send_message(msg.chat.id, welcome)
        .parse_mode(ParseMode::Html)
        .await?;

    info!(chat_id = %msg.chat.id, user_id = %user.id, "User started bot");
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    let help_text = Command::descriptions().to_string();
    bot.send_message(msg.chat.id, help_text).await?;
    Ok(())
}

/// Handle the /register command - redeem an invite code.
pub async fn handle_register(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
    code: String,
) -> ResponseResult<()> {
    if code.trim().is_empty() {
        bot.send_message(
            msg.chat.id,
            "Please provide an invite code.\n\n\
            <b>Usage:</b> <code>/register CODE</code>\n\n\
            Your instructor can create one with <code>/invite</code>.",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    match state.register(&user, &code).await {
        Ok(user) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Registered as <b>{}</b> in lab group <b>{}</b>.\n\nAsk me anything!",
                    user.role,
                    html_escape(user.lab_group.as_deref().unwrap_or("-"))
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            Ok(())
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /whoami command.
pub async fn handle_whoami(bot: Bot, msg: Message, user: User) -> ResponseResult<()> {
    let text = format!(
        "<b>User:</b> {}\n\
        <b>Registered:</b> {}\n\
        <b>Role:</b> {}\n\
        <b>Lab group:</b> {}\n\
        <b>Conversation:</b> #{}",
        html_escape(&user.display_name()),
        if user.authenticated { "✅ yes" } else { "❌ no" },
        user.role,
        html_escape(user.lab_group.as_deref().unwrap_or("none")),
        user.conversation_id
    );
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /newchat command.
pub async fn handle_newchat(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
) -> ResponseResult<()> {
    match state.new_conversation(&user) {
        Ok(id) => {
            bot.send_message(msg.chat.id, format!("🆕 Started conversation #{}", id))
                .await?;
            Ok(())
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /history command - list conversations.
pub async fn handle_history(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
) -> ResponseResult<()> {
    let conversations = match state.conversations(&user) {
        Ok(c) => c,
        Err(e) => return send_error(&bot, msg.chat.id, &e).await,
    };

    if conversations.is_empty() {
        bot.send_message(msg.chat.id, "No conversations yet. Just send me a message!")
            .await?;
        return Ok(());
    }

    let mut text = String::from("<b>Your conversations:</b>\n");
    for conversation in &conversations {
        let marker = if conversation.id == user.conversation_id { " ← current" } else { "" };
        let last = conversation
            .last_activity()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        text.push_str(&format!(
            "\n#{}: {} messages, last {}{}",
            conversation.id,
            conversation.len(),
            last,
            marker
        ));
    }

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /teach command.
pub async fn handle_teach(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
    topic: String,
) -> ResponseResult<()> {
    if topic.trim().is_empty() {
        bot.send_message(
            msg.chat.id,
            "What should I teach?\n\n<b>Usage:</b> <code>/teach recursion</code>",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    match state.teach(&user, &topic).await {
        Ok(reply) => send_reply(&bot, msg.chat.id, &reply).await,
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /style command.
pub async fn handle_style(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
) -> ResponseResult<()> {
    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    match state.learning_style(&user).await {
        Ok(text) => send_long(&bot, msg.chat.id, &text).await,
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /docs command.
pub async fn handle_docs(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
) -> ResponseResult<()> {
    match state.documents(&user).await {
        Ok(listing) => {
            let text = format!(
                "{}\n\n{}",
                render_sources("Your documents", &listing.own),
                render_sources("Course material", &listing.global)
            );
            bot.send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .await?;
            Ok(())
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /cleardocs command.
pub async fn handle_cleardocs(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
) -> ResponseResult<()> {
    match state.clear_documents(&user).await {
        Ok(0) => {
            bot.send_message(msg.chat.id, "You have no uploaded documents.").await?;
            Ok(())
        }
        Ok(n) => {
            bot.send_message(msg.chat.id, format!("🗑 Deleted {} chunks from your documents.", n))
                .await?;
            Ok(())
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /invite command - admins create one-time codes.
pub async fn handle_invite(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
    arg: String,
) -> ResponseResult<()> {
    let Some((group, role)) = parse_invite_args(&arg) else {
        bot.send_message(
            msg.chat.id,
            "<b>Usage:</b> <code>/invite GROUP</code> or <code>/invite GROUP admin</code>",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    match state.create_invite(&user, &group, role).await {
        Ok(code) => {
            let hours = state.settings().invite_ttl_secs / 3600;
            bot.send_message(
                msg.chat.id,
                format!(
                    "🎟 Invite for <b>{}</b> ({}):\n\n<code>/register {}</code>\n\n\
                    Single use, valid for {} hours.",
                    html_escape(&group),
                    role,
                    code,
                    hours
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            Ok(())
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /rollcall command.
pub async fn handle_rollcall(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
    group: String,
) -> ResponseResult<()> {
    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    match state.rollcall(&user, &group).await {
        Ok(report) => send_long(&bot, msg.chat.id, &report.render()).await,
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle /misconceptions and /sitrep.
pub async fn handle_group_report(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
    group: String,
    report: GroupReport,
) -> ResponseResult<()> {
    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    match state.group_report(&user, &group, report).await {
        Ok(text) => send_long(&bot, msg.chat.id, &text).await,
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle the /clearglobal command.
pub async fn handle_clearglobal(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    user: User,
) -> ResponseResult<()> {
    match state.clear_global(&user).await {
        Ok(n) => {
            info!(user_id = %user.id, chunks = n, "Cleared global collection");
            bot.send_message(msg.chat.id, format!("🗑 Deleted {} chunks of course material.", n))
                .await?;
            Ok(())
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle a plain text message - run it through the pipeline.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user = match caller(&state, &msg) {
        Some(Ok(user)) => user,
        Some(Err(e)) => return send_error(&bot, msg.chat.id, &e).await,
        None => return Ok(()),
    };

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    match state.ask(&user, text).await {
        Ok(reply) => {
            debug!(
                chat_id = %msg.chat.id,
                user_id = %user.id,
                responder = %reply.responder,
                cached = reply.cached,
                "Reply generated"
            );
            send_reply(&bot, msg.chat.id, &reply).await
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle an uploaded document - download and ingest it.
pub async fn handle_document(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let user = match caller(&state, &msg) {
        Some(Ok(user)) => user,
        Some(Err(e)) => return send_error(&bot, msg.chat.id, &e).await,
        None => return Ok(()),
    };
    if !user.authenticated {
        return send_error(&bot, msg.chat.id, &BotError::NotAuthenticated).await;
    }
    if let Err(e) = state.check_upload_size(u64::from(doc.file.size)) {
        return send_error(&bot, msg.chat.id, &e).await;
    }

    let filename = doc.file_name.clone().unwrap_or_else(|| "upload.txt".to_string());
    bot.send_chat_action(msg.chat.id, ChatAction::UploadDocument)
        .await?;

    let file = bot.get_file(doc.file.id.clone()).await?;
    let mut bytes = Vec::new();
    if let Err(e) = bot.download_file(&file.path, &mut bytes).await {
        warn!(file = %filename, error = %e, "Document download failed");
        let err = BotError::DownloadFailed(e.to_string());
        return send_error(&bot, msg.chat.id, &err).await;
    }

    match state
        .ingest_upload(&user, &filename, &bytes, msg.caption())
        .await
    {
        Ok((collection, report)) => {
            let target = match collection {
                Collection::Global => "the course material",
                Collection::User(_) => "your documents",
            };
            bot.send_message(
                msg.chat.id,
                format!(
                    "📄 Added {} ({}, {} chunks) to {}.",
                    report.source, report.kind, report.chunks, target
                ),
            )
            .await?;
            Ok(())
        }
        Err(e) => send_error(&bot, msg.chat.id, &e).await,
    }
}

/// Handle a 👍 / 👎 button press.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let Some((vote, id)) = q.data.as_deref().and_then(parse_feedback_data) else {
        debug!(data = ?q.data, "Ignoring unknown callback");
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let voter = tutor_models::UserId(q.from.id.0 as i64);
    let answer = match state.vote(&id, voter, vote) {
        Ok((record, outcome)) => {
            info!(feedback_id = %id, voter = %voter, vote = vote.as_str(), ?outcome, "Vote");
            match outcome {
                VoteOutcome::Unchanged => "You already voted this way".to_string(),
                VoteOutcome::Recorded | VoteOutcome::Switched => {
                    format!("Thanks! 👍 {} · 👎 {}", record.likes, record.dislikes)
                }
            }
        }
        Err(e) => {
            warn!(feedback_id = %id, error = %e, "Vote failed");
            "Could not record your vote".to_string()
        }
    };

    bot.answer_callback_query(q.id.clone()).text(answer).await?;
    Ok(())
}

/// Reply to a `/command` that did not parse.
pub async fn handle_unknown(bot: Bot, msg: Message) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        let command = text.split_whitespace().next().unwrap_or(text);
        info!(cmd = %command, "Unrecognized command");
        bot.send_message(
            msg.chat.id,
            format!("Unknown command: {}\n\nUse /help to see available commands.", command),
        )
        .await?;
    }
    Ok(())
}

/// Dispatch a parsed command.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    if let Command::Help = cmd {
        return handle_help(bot, msg).await;
    }
    let user = match caller(&state, &msg) {
        Some(Ok(user)) => user,
        Some(Err(e)) => return send_error(&bot, msg.chat.id, &e).await,
        None => return Ok(()),
    };

    match cmd {
        Command::Start => handle_start(bot, msg, user).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Register(code) => handle_register(bot, msg, state, user, code).await,
        Command::Whoami => handle_whoami(bot, msg, user).await,
        Command::Newchat => handle_newchat(bot, msg, state, user).await,
        Command::History => handle_history(bot, msg, state, user).await,
        Command::Teach(topic) => handle_teach(bot, msg, state, user, topic).await,
        Command::Style => handle_style(bot, msg, state, user).await,
        Command::Docs => handle_docs(bot, msg, state, user).await,
        Command::Cleardocs => handle_cleardocs(bot, msg, state, user).await,
        Command::Invite(arg) => handle_invite(bot, msg, state, user, arg).await,
        Command::Rollcall(group) => handle_rollcall(bot, msg, state, user, group).await,
        Command::Misconceptions(group) => {
            handle_group_report(bot, msg, state, user, group, GroupReport::Misconceptions).await
        }
        Command::Sitrep(group) => {
            handle_group_report(bot, msg, state, user, group, GroupReport::Sitrep).await
        }
        Command::Clearglobal => handle_clearglobal(bot, msg, state, user).await,
    }
}
