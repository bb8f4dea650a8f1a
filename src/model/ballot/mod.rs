pub use countdown::{Countdown, CountdownSpec, Urgency};
pub use position::{OptionId, OptionLabel, Position, UnknownPosition};
pub use selection::{Progress, Selection};
pub use sessions::{BallotSessions, BallotSessionsFairing, BallotTiming};
pub use submission::BallotSubmission;
pub use view::BallotView;
pub use workflow::{BallotState, BallotWorkflow, Review, SubmitPhase, WorkflowError};

pub mod countdown;
pub mod position;
pub mod selection;
pub mod sessions;
pub mod submission;
pub mod view;
pub mod workflow;
