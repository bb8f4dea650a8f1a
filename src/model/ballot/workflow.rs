use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::model::{notice::Notice, store::StoreError};

use super::{
    countdown::{Countdown, CountdownSpec, Tick},
    position::{OptionId, OptionLabel, Position},
    selection::{Progress, Selection},
    submission::BallotSubmission,
};

/// Where a submission is between confirmation and persistence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubmitPhase {
    /// Confirmed, waiting for acknowledgement.
    Pending,
    /// Acknowledged, waiting to be persisted.
    Accepted,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BallotState {
    Selecting,
    Reviewing,
    Submitting(SubmitPhase),
    Submitted,
    /// Time ran out with a complete ballot; submission proceeds unattended.
    AutoSubmitting,
    /// Time ran out with required positions empty. Terminal.
    Blocked,
}

impl BallotState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Selecting => "selecting",
            Self::Reviewing => "reviewing",
            Self::Submitting(_) => "submitting",
            Self::Submitted => "submitted",
            Self::AutoSubmitting => "auto_submitting",
            Self::Blocked => "blocked",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Blocked)
    }
}

impl Display for BallotState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BallotState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {action} while the ballot is {state}")]
    WrongState {
        action: &'static str,
        state: BallotState,
    },
    #[error("Required positions not selected: {}", list(.0))]
    Incomplete(Vec<Position>),
    #[error("Ballot could not be saved: {0}")]
    NotPersisted(#[source] StoreError),
}

fn list(positions: &[Position]) -> String {
    positions
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// What expiry of the countdown did to the ballot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// The ballot was complete and will be submitted without the voter.
    AutoSubmit,
    /// The ballot was incomplete and can no longer be submitted.
    Blocked,
    /// A submission was already under way or done.
    Ignored,
}

/// One line of the read-only review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    pub position: Position,
    pub title: &'static str,
    pub option: OptionId,
    pub label: OptionLabel,
}

/// A snapshot of the ballot as it would be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub entries: Vec<ReviewEntry>,
    pub can_submit: bool,
}

/// Redirect target once a ballot has been submitted.
pub const RESULTS_PAGE: &str = "/results";

/// A single voter's ballot, from first selection to submission.
///
/// This is a pure state machine: timing is driven from outside by calling
/// [`tick`](Self::tick), [`acknowledge`](Self::acknowledge) and
/// [`finalize`](Self::finalize) at the appropriate moments. Persistence
/// happens outside as well, between [`prepare`](Self::prepare) and
/// `finalize`.
#[derive(Debug)]
pub struct BallotWorkflow {
    state: BallotState,
    selection: Selection,
    countdown: Countdown,
    submission: Option<BallotSubmission>,
    notices: Vec<Notice>,
}

impl BallotWorkflow {
    pub fn new(countdown: CountdownSpec) -> Self {
        Self {
            state: BallotState::Selecting,
            selection: Selection::new(),
            countdown: Countdown::new(countdown),
            submission: None,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> BallotState {
        self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn progress(&self) -> Progress {
        self.selection.progress()
    }

    /// Are the required positions filled?
    pub fn can_submit(&self) -> bool {
        self.selection.is_complete()
    }

    /// The persisted submission, once submitted.
    pub fn submission(&self) -> Option<&BallotSubmission> {
        self.submission.as_ref()
    }

    /// Where the voter should go next, if anywhere.
    pub fn redirect(&self) -> Option<&'static str> {
        (self.state == BallotState::Submitted).then_some(RESULTS_PAGE)
    }

    /// Drain the notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn check_state(
        &self,
        action: &'static str,
        allowed: impl Fn(BallotState) -> bool,
    ) -> Result<(), WorkflowError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(WorkflowError::WrongState {
                action,
                state: self.state,
            })
        }
    }

    /// Choose `option` for `position`, replacing any earlier choice.
    pub fn select(
        &mut self,
        position: Position,
        option: OptionId,
    ) -> Result<Option<OptionId>, WorkflowError> {
        self.check_state("select", |s| s == BallotState::Selecting)?;
        debug!("Selected `{option}` for {position}");
        let previous = self.selection.choose(position, option);
        self.notices
            .push(Notice::success(format!("Vote recorded for {position}")));
        Ok(previous)
    }

    /// Withdraw the choice for `position`.
    pub fn clear(&mut self, position: Position) -> Result<Option<OptionId>, WorkflowError> {
        self.check_state("clear a selection", |s| s == BallotState::Selecting)?;
        Ok(self.selection.clear(position))
    }

    /// Snapshot the selections for review. Moves a selecting ballot into review.
    pub fn review(&mut self) -> Result<Review, WorkflowError> {
        self.check_state("review", |s| {
            matches!(
                s,
                BallotState::Selecting | BallotState::Reviewing | BallotState::AutoSubmitting
            )
        })?;
        if self.state == BallotState::Selecting {
            self.state = BallotState::Reviewing;
        }
        let entries = self
            .selection
            .iter()
            .map(|(&position, option)| ReviewEntry {
                position,
                title: position.title(),
                option: option.clone(),
                label: OptionLabel::resolve(position, option),
            })
            .collect();
        Ok(Review {
            entries,
            can_submit: self.can_submit(),
        })
    }

    /// Leave review and go back to selecting. Nothing is discarded.
    pub fn edit(&mut self) -> Result<(), WorkflowError> {
        self.check_state("edit", |s| s == BallotState::Reviewing)?;
        self.state = BallotState::Selecting;
        Ok(())
    }

    /// Commit to submitting the reviewed ballot.
    pub fn confirm(&mut self) -> Result<(), WorkflowError> {
        self.check_state("confirm", |s| {
            matches!(s, BallotState::Reviewing | BallotState::AutoSubmitting)
        })?;
        let missing = self.selection.missing_required();
        if !missing.is_empty() {
            return Err(WorkflowError::Incomplete(missing));
        }
        self.state = BallotState::Submitting(SubmitPhase::Pending);
        self.notices.push(Notice::info("Submitting your ballot..."));
        Ok(())
    }

    /// The submission has been accepted and is awaiting persistence.
    pub fn acknowledge(&mut self) -> Result<(), WorkflowError> {
        self.check_state("acknowledge", |s| {
            s == BallotState::Submitting(SubmitPhase::Pending)
        })?;
        self.state = BallotState::Submitting(SubmitPhase::Accepted);
        self.notices.push(Notice::info("Ballot received, recording..."));
        Ok(())
    }

    /// The submission to persist for an accepted ballot.
    pub fn prepare(&self, submitted_at: DateTime<Utc>) -> Result<BallotSubmission, WorkflowError> {
        self.check_state("prepare a submission", |s| {
            s == BallotState::Submitting(SubmitPhase::Accepted)
        })?;
        Ok(BallotSubmission::new(self.selection.clone(), submitted_at))
    }

    /// Record the outcome of persisting `submission`. Only a successful write
    /// completes the ballot; on failure the voter is sent back to confirm again.
    pub fn finalize(
        &mut self,
        submission: BallotSubmission,
        persisted: Result<(), StoreError>,
    ) -> Result<&BallotSubmission, WorkflowError> {
        self.check_state("finalize", |s| {
            s == BallotState::Submitting(SubmitPhase::Accepted)
        })?;
        if let Err(e) = persisted {
            warn!("Ballot submission was not persisted: {e}");
            self.state = if self.countdown.is_expired() {
                BallotState::AutoSubmitting
            } else {
                BallotState::Reviewing
            };
            self.notices.push(Notice::error(
                "Your ballot could not be saved. Please try submitting again.",
            ));
            return Err(WorkflowError::NotPersisted(e));
        }
        self.state = BallotState::Submitted;
        self.notices
            .push(Notice::success("Ballot submitted successfully!"));
        Ok(self.submission.insert(submission))
    }

    /// Advance the countdown by one second. Returns what expiry did, on the
    /// tick that runs the clock out.
    pub fn tick(&mut self) -> Option<Expiry> {
        match self.countdown.tick() {
            Tick::Running(Some(urgency)) => {
                debug!(
                    "Ballot countdown at {} is now {urgency:?}",
                    self.countdown.display()
                );
                None
            }
            Tick::Running(None) | Tick::Finished => None,
            Tick::Expired => Some(self.expire()),
        }
    }

    fn expire(&mut self) -> Expiry {
        match self.state {
            BallotState::Selecting | BallotState::Reviewing => {
                if self.can_submit() {
                    self.state = BallotState::AutoSubmitting;
                    self.notices.push(Notice::warning(
                        "Time expired! Auto-submitting your ballot...",
                    ));
                    Expiry::AutoSubmit
                } else {
                    self.state = BallotState::Blocked;
                    self.notices.push(Notice::error(
                        "Time expired! Required votes were not completed.",
                    ));
                    Expiry::Blocked
                }
            }
            _ => Expiry::Ignored,
        }
    }
}
