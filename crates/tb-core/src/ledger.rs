//! # Ledger rules
//!
//! The pure half of voting: how one vote event changes a post's ledger, tally
//! and milestones, and which mirror change the voter's history needs. Storage
//! and retry live in the services crate; nothing here does I/O.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::milestone;
use crate::models::{Account, Direction, LedgerEntry, Post, VoteRecord};

/// What a vote did to the caller's ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    /// No previous entry; one was added.
    Cast,
    /// Same direction as before; the entry was removed.
    Withdrawn,
    /// Opposite direction; the entry was flipped.
    Changed,
}

/// The change the voter's personal history must receive to mirror the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorChange {
    Upsert(VoteRecord),
    Remove(Uuid),
}

/// Effect of [`apply_to_post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostVote {
    pub outcome: VoteOutcome,
    pub mirror: MirrorChange,
    pub milestones_updated: bool,
}

fn bump(post: &mut Post, direction: Direction, delta: i64) {
    match direction {
        Direction::Up => post.upvotes += delta,
        Direction::Down => post.downvotes += delta,
    }
}

/// Applies one vote event to `post` in place.
///
/// Counters, score, milestones and status are all brought up to date, so the
/// post can be written back as a single document.
pub fn apply_to_post(
    post: &mut Post,
    actor: Uuid,
    direction: Direction,
    now: DateTime<Utc>,
) -> PostVote {
    let existing = post.voters.iter().position(|e| e.account_id == actor);

    let (outcome, mirror) = match existing {
        None => {
            post.voters.push(LedgerEntry {
                account_id: actor,
                direction,
            });
            bump(post, direction, 1);
            (
                VoteOutcome::Cast,
                MirrorChange::Upsert(VoteRecord {
                    post_id: post.id,
                    direction,
                }),
            )
        }
        Some(idx) if post.voters[idx].direction == direction => {
            post.voters.swap_remove(idx);
            bump(post, direction, -1);
            (VoteOutcome::Withdrawn, MirrorChange::Remove(post.id))
        }
        Some(idx) => {
            let previous = post.voters[idx].direction;
            post.voters[idx].direction = direction;
            bump(post, previous, -1);
            bump(post, direction, 1);
            (
                VoteOutcome::Changed,
                MirrorChange::Upsert(VoteRecord {
                    post_id: post.id,
                    direction,
                }),
            )
        }
    };

    post.recompute_score();
    let progress = milestone::track(post.upvotes, &post.milestones, now);
    post.milestones = progress.milestones;
    post.status = progress.status;
    post.updated_at = now;

    PostVote {
        outcome,
        mirror,
        milestones_updated: progress.changed,
    }
}

/// Applies a mirror change to the account's history. Idempotent: re-applying
/// the same change leaves the history as it is and returns `false`.
pub fn apply_to_account(account: &mut Account, change: MirrorChange) -> bool {
    match change {
        MirrorChange::Upsert(record) => {
            match account.votes.iter_mut().find(|v| v.post_id == record.post_id) {
                Some(v) if v.direction == record.direction => false,
                Some(v) => {
                    v.direction = record.direction;
                    true
                }
                None => {
                    account.votes.push(record);
                    true
                }
            }
        }
        MirrorChange::Remove(post_id) => {
            let before = account.votes.len();
            account.votes.retain(|v| v.post_id != post_id);
            account.votes.len() != before
        }
    }
}
