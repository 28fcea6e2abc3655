//! Feedback on generated responses.
//!
//! Every response the bot sends is stored together with the prompt that
//! produced it. Users vote on it with the 👍 / 👎 buttons; well-rated pairs can
//! be served again for the same question.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::FeedbackId;
use crate::user::UserId;

/// A single vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    /// Parse the callback-data form (`like` / `dislike`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

/// What a vote did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote from this voter.
    Recorded,
    /// The voter changed their mind; the old count was decremented.
    Switched,
    /// The voter repeated their previous vote.
    Unchanged,
}

/// A cached prompt/response pair with its votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    pub prompt: String,
    /// `prompt` after [`normalize_prompt`], used for cache lookups.
    pub normalized_prompt: String,
    pub response: String,
    pub likes: u32,
    pub dislikes: u32,
    #[serde(default)]
    pub like_voters: BTreeSet<UserId>,
    #[serde(default)]
    pub dislike_voters: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Creates a record with no votes.
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            id: FeedbackId::new(),
            normalized_prompt: normalize_prompt(&prompt),
            prompt,
            response: response.into(),
            likes: 0,
            dislikes: 0,
            like_voters: BTreeSet::new(),
            dislike_voters: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Apply a vote. A voter is in at most one voter set at a time.
    pub fn vote(&mut self, voter: UserId, vote: Vote) -> VoteOutcome {
        let (same, same_count, other, other_count) = match vote {
            Vote::Like => (
                &mut self.like_voters,
                &mut self.likes,
                &mut self.dislike_voters,
                &mut self.dislikes,
            ),
            Vote::Dislike => (
                &mut self.dislike_voters,
                &mut self.dislikes,
                &mut self.like_voters,
                &mut self.likes,
            ),
        };

        if same.contains(&voter) {
            return VoteOutcome::Unchanged;
        }

        let switched = other.remove(&voter);
        if switched {
            *other_count = other_count.saturating_sub(1);
        }
        same.insert(voter);
        *same_count += 1;

        if switched {
            VoteOutcome::Switched
        } else {
            VoteOutcome::Recorded
        }
    }

    /// likes / (likes + dislikes), or 0.0 with no votes.
    pub fn ratio(&self) -> f64 {
        let total = self.likes + self.dislikes;
        if total == 0 {
            0.0
        } else {
            f64::from(self.likes) / f64::from(total)
        }
    }

    /// Total number of votes.
    pub fn votes(&self) -> u32 {
        self.likes + self.dislikes
    }
}

/// Trim, lowercase and collapse internal whitespace.
pub fn normalize_prompt(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
