//! Lab-group reports for instructors: rollcall, misconceptions and sitrep.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use tutor_models::{ChatMessage, Role, User, UserId};
use tutor_persistence::Database;

use crate::client::{ChatModel, PromptMessage};
use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::responder::ResponderKind;

/// Most recent group messages sent to the model per report.
const MAX_REPORT_MESSAGES: usize = 200;

/// One student's line in a rollcall.
#[derive(Debug, Clone, PartialEq)]
pub struct RollcallEntry {
    pub user_id: UserId,
    pub name: String,
    pub last_active: Option<DateTime<Utc>>,
    /// Wrote something within the report window.
    pub active: bool,
}

/// Attendance of a lab group over the report window.
#[derive(Debug, Clone, PartialEq)]
pub struct RollcallReport {
    pub group: String,
    pub days: i64,
    pub entries: Vec<RollcallEntry>,
    /// Model summary of what active students worked on.
    pub summary: Option<String>,
}

impl RollcallReport {
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }

    /// Plain-text rendering for chat.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return format!("No registered students in {}.", self.group);
        }

        let mut out = format!(
            "Rollcall for {} (last {} days): {}/{} active\n\n",
            self.group,
            self.days,
            self.active_count(),
            self.entries.len()
        );
        for entry in &self.entries {
            let mark = if entry.active { "✅" } else { "❌" };
            let seen = entry
                .last_active
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            out.push_str(&format!("{} {} (last active: {})\n", mark, entry.name, seen));
        }
        if let Some(summary) = &self.summary {
            out.push('\n');
            out.push_str(summary);
        }
        out
    }
}

/// Builds instructor reports from stored conversations.
pub struct ReportGenerator {
    db: Arc<Database>,
    model: Arc<dyn ChatModel>,
    config: ModelConfig,
    days: i64,
}

impl ReportGenerator {
    pub fn new(db: Arc<Database>, model: Arc<dyn ChatModel>, days: i64) -> Self {
        Self {
            db,
            model,
            config: ModelConfig::default(),
            days: days.max(1),
        }
    }

    pub fn with_model_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    fn since(&self) -> DateTime<Utc> {
        Utc::now() - Duration::days(self.days)
    }

    fn students(&self, group: &str) -> Result<Vec<User>> {
        if group.trim().is_empty() {
            return Err(AgentError::InvalidInput("no lab group given".into()));
        }
        Ok(self
            .db
            .users()
            .list_group(group.trim())?
            .into_iter()
            .filter(|u| u.role == Role::Student)
            .collect())
    }

    /// Who in the group was active, plus a summary of their work.
    pub async fn rollcall(&self, group: &str) -> Result<RollcallReport> {
        let students = self.students(group)?;
        let since = self.since();

        let mut entries = Vec::with_capacity(students.len());
        for student in &students {
            let last_active = self.db.chats().last_activity(student.id)?;
            entries.push(RollcallEntry {
                user_id: student.id,
                name: student.display_name(),
                last_active,
                active: last_active.is_some_and(|t| t >= since),
            });
        }

        let active: Vec<User> = students
            .into_iter()
            .filter(|s| entries.iter().any(|e| e.user_id == s.id && e.active))
            .collect();

        let summary = if active.is_empty() {
            None
        } else {
            match self.summarise(ResponderKind::Rollcall, &active, since).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(group = %group, error = %e, "Rollcall summary failed");
                    None
                }
            }
        };

        let report = RollcallReport {
            group: group.trim().to_string(),
            days: self.days,
            entries,
            summary,
        };
        info!(
            group = %report.group,
            students = report.entries.len(),
            active = report.active_count(),
            "Rollcall generated"
        );
        Ok(report)
    }

    /// Misconceptions visible in the group's recent questions.
    pub async fn misconceptions(&self, group: &str) -> Result<String> {
        self.group_report(ResponderKind::Misconception, group).await
    }

    /// Situation report for the group.
    pub async fn sitrep(&self, group: &str) -> Result<String> {
        self.group_report(ResponderKind::Sitrep, group).await
    }

    async fn group_report(&self, kind: ResponderKind, group: &str) -> Result<String> {
        let students = self.students(group)?;
        let report = self.summarise(kind, &students, self.since()).await?;
        info!(group = %group.trim(), report = %kind, generated = report.is_some(), "Group report");
        Ok(report.unwrap_or_else(|| {
            format!(
                "No student activity in {} over the last {} days.",
                group.trim(),
                self.days
            )
        }))
    }

    /// Run `kind`'s prompt over the students' recent messages.
    ///
    /// `None` when they wrote nothing in the window.
    async fn summarise(
        &self,
        kind: ResponderKind,
        students: &[User],
        since: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let ids: Vec<UserId> = students.iter().map(|s| s.id).collect();
        let recent = self.db.chats().recent_human_messages(&ids, since)?;
        if recent.is_empty() {
            return Ok(None);
        }

        let names: HashMap<UserId, String> =
            students.iter().map(|s| (s.id, s.display_name())).collect();
        let prompt = [
            PromptMessage::system(kind.system_prompt()),
            PromptMessage::user(transcript(&recent, &names)),
        ];
        let text = self.model.reply(&prompt, &self.config).await?;
        Ok(Some(text))
    }
}

/// `[name] message` lines, newest `MAX_REPORT_MESSAGES` only.
fn transcript(messages: &[(UserId, ChatMessage)], names: &HashMap<UserId, String>) -> String {
    let start = messages.len().saturating_sub(MAX_REPORT_MESSAGES);
    messages[start..]
        .iter()
        .map(|(id, m)| {
            let name = names.get(id).cloned().unwrap_or_else(|| id.to_string());
            format!("[{}] {}", name, m.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
