//! Prometheus counters for the voting pipeline, rendered in text exposition format.

use std::fmt::{self, Write};

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue, LabelValueEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use tb_core::VoteOutcome;
use tb_services::VoteResult;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum OutcomeLabel {
    Cast,
    Withdrawn,
    Changed,
}

impl OutcomeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeLabel::Cast => "cast",
            OutcomeLabel::Withdrawn => "withdrawn",
            OutcomeLabel::Changed => "changed",
        }
    }
}

/// Label values follow the lowercase snake_case used elsewhere in the exposition.
impl EncodeLabelValue for OutcomeLabel {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
        encoder.write_str(self.as_str())
    }
}

impl From<VoteOutcome> for OutcomeLabel {
    fn from(outcome: VoteOutcome) -> Self {
        match outcome {
            VoteOutcome::Cast => OutcomeLabel::Cast,
            VoteOutcome::Withdrawn => OutcomeLabel::Withdrawn,
            VoteOutcome::Changed => OutcomeLabel::Changed,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct VoteLabels {
    pub outcome: OutcomeLabel,
}

pub struct Metrics {
    registry: Registry,
    votes: Family<VoteLabels, Counter>,
    milestones_reached: Counter,
    actions_triggered: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("tallyboard");
        let votes = Family::<VoteLabels, Counter>::default();
        let milestones_reached = Counter::default();
        let actions_triggered = Counter::default();

        registry.register("votes", "Votes applied, by outcome", votes.clone());
        registry.register(
            "milestones_reached",
            "Upvote thresholds crossed for the first time",
            milestones_reached.clone(),
        );
        registry.register(
            "milestone_actions_triggered",
            "Milestone actions dispatched",
            actions_triggered.clone(),
        );

        Self {
            registry,
            votes,
            milestones_reached,
            actions_triggered,
        }
    }

    pub fn record_vote(&self, result: &VoteResult) {
        self.votes
            .get_or_create(&VoteLabels {
                outcome: result.outcome.into(),
            })
            .inc();
        self.milestones_reached
            .inc_by(result.new_milestones.len() as u64);
    }

    pub fn record_trigger(&self) {
        self.actions_triggered.inc();
    }

    pub fn render(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_core::milestone::PostStatus;
    use uuid::Uuid;

    #[test]
    fn votes_and_milestones_show_up_in_the_exposition() {
        let metrics = Metrics::new();
        metrics.record_vote(&VoteResult {
            post_id: Uuid::nil(),
            upvotes: 10,
            downvotes: 0,
            score: 10,
            status: PostStatus::Milestone10,
            outcome: VoteOutcome::Cast,
            your_vote: None,
            milestones_updated: true,
            new_milestones: vec![10],
        });
        metrics.record_trigger();

        let text = metrics.render().unwrap();
        assert!(text.contains("tallyboard_votes_total{outcome=\"cast\"} 1"));
        assert!(text.contains("tallyboard_milestones_reached_total 1"));
        assert!(text.contains("tallyboard_milestone_actions_triggered_total 1"));
    }

    #[test]
    fn outcome_labels_are_lowercase() {
        let metrics = Metrics::new();
        for (outcome, upvotes) in [(VoteOutcome::Withdrawn, 0), (VoteOutcome::Changed, 1)] {
            metrics.record_vote(&VoteResult {
                post_id: Uuid::nil(),
                upvotes,
                downvotes: 0,
                score: upvotes,
                status: PostStatus::Active,
                outcome,
                your_vote: None,
                milestones_updated: false,
                new_milestones: vec![],
            });
        }

        let text = metrics.render().unwrap();
        assert!(text.contains("tallyboard_votes_total{outcome=\"withdrawn\"} 1"));
        assert!(text.contains("tallyboard_votes_total{outcome=\"changed\"} 1"));
        assert!(!text.contains("Withdrawn"));
    }
}
