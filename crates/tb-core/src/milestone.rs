//! # Milestone Tracker
//!
//! Pure rules for upvote thresholds. A milestone, once reached, stays reached;
//! the display status of a post is derived from the reached set every time
//! and never trusted from storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed thresholds, ascending.
pub const THRESHOLDS: [i64; 3] = [10, 100, 1000];

/// One threshold's state on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub threshold: i64,
    pub reached: bool,
    pub reached_at: Option<DateTime<Utc>>,
    /// Implies `reached`. Set once by the action dispatcher.
    pub action_triggered: bool,
}

/// Lifecycle status shown for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum PostStatus {
    #[default]
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "milestone_10")]
    Milestone10,
    #[serde(rename = "milestone_100")]
    Milestone100,
    #[serde(rename = "milestone_1000")]
    Milestone1000,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Milestone10 => "milestone_10",
            PostStatus::Milestone100 => "milestone_100",
            PostStatus::Milestone1000 => "milestone_1000",
        }
    }

    fn for_threshold(threshold: i64) -> Self {
        match threshold {
            t if t >= 1000 => PostStatus::Milestone1000,
            t if t >= 100 => PostStatus::Milestone100,
            t if t >= 10 => PostStatus::Milestone10,
            _ => PostStatus::Active,
        }
    }
}

/// Result of running the tracker over a post.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub milestones: Vec<Milestone>,
    /// True when at least one threshold went from not-reached to reached.
    pub changed: bool,
    pub status: PostStatus,
}

/// Walks the thresholds in ascending order and records every newly reached one.
pub fn track(upvotes: i64, existing: &[Milestone], now: DateTime<Utc>) -> Progress {
    let mut milestones = existing.to_vec();
    let mut changed = false;

    for threshold in THRESHOLDS {
        if upvotes < threshold {
            continue;
        }
        match milestones.iter_mut().find(|m| m.threshold == threshold) {
            Some(m) if m.reached => {}
            Some(m) => {
                m.reached = true;
                m.reached_at = Some(now);
                changed = true;
            }
            None => {
                milestones.push(Milestone {
                    threshold,
                    reached: true,
                    reached_at: Some(now),
                    action_triggered: false,
                });
                changed = true;
            }
        }
    }

    let status = status_of(&milestones);
    Progress {
        milestones,
        changed,
        status,
    }
}

/// Highest reached threshold, regardless of record order.
pub fn status_of(milestones: &[Milestone]) -> PostStatus {
    milestones
        .iter()
        .filter(|m| m.reached)
        .map(|m| PostStatus::for_threshold(m.threshold))
        .max()
        .unwrap_or_default()
}

/// The external action bound to a threshold.
pub fn action_for(threshold: i64) -> &'static str {
    match threshold {
        10 => "consultation scheduled",
        100 => "incorporation paperwork initiated",
        1000 => "trademark/registration begun",
        _ => "milestone acknowledged",
    }
}
