use serde::Serialize;

use crate::model::notice::Notice;

use super::{
    countdown::Urgency,
    selection::Selection,
    submission::BallotSubmission,
    workflow::{BallotState, BallotWorkflow, SubmitPhase},
};

/// Everything the ballot page shows, as of one request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotView {
    pub state: BallotState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<&'static str>,
    pub selections: Selection,
    pub progress: ProgressView,
    pub can_submit: bool,
    pub timer: TimerView,
    pub notices: Vec<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<BallotSubmission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub selected: usize,
    pub total: usize,
    pub percent: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerView {
    pub remaining: u32,
    pub display: String,
    pub urgency: Urgency,
}

impl BallotView {
    /// Render the ballot, draining its pending notices.
    pub fn render(workflow: &mut BallotWorkflow) -> Self {
        let progress = workflow.progress();
        let countdown = workflow.countdown();
        let phase = match workflow.state() {
            BallotState::Submitting(SubmitPhase::Pending) => Some("pending"),
            BallotState::Submitting(SubmitPhase::Accepted) => Some("accepted"),
            _ => None,
        };
        Self {
            state: workflow.state(),
            phase,
            selections: workflow.selection().clone(),
            progress: ProgressView {
                selected: progress.selected,
                total: progress.total,
                percent: progress.percent(),
                text: progress.text(),
            },
            can_submit: workflow.can_submit(),
            timer: TimerView {
                remaining: countdown.remaining(),
                display: countdown.display(),
                urgency: countdown.urgency(),
            },
            redirect: workflow.redirect(),
            submission: workflow.submission().cloned(),
            notices: workflow.take_notices(),
        }
    }
}
