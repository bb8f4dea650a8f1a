use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{sync::Mutex, time::Duration},
    Build, Orbit, Rocket,
};

use crate::{
    config::Config,
    model::{store::Storage, user::UserId},
    scheduled_task::ScheduledTask,
};

use super::{
    countdown::CountdownSpec,
    view::BallotView,
    workflow::{BallotWorkflow, Expiry, WorkflowError},
};

/// Cosmetic delays applied while submitting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BallotTiming {
    /// Between the countdown running out and an unattended submission starting.
    pub auto_submit_delay: Duration,
    /// Between confirmation and acknowledgement.
    pub acknowledge_delay: Duration,
    /// Between acknowledgement and persistence.
    pub persist_delay: Duration,
}

const TICK: Duration = Duration::from_secs(1);

/// A workflow together with its in-flight submission, if any.
struct Ballot {
    workflow: BallotWorkflow,
    submission: Option<ScheduledTask<()>>,
}

type SharedBallot = Arc<Mutex<Ballot>>;

/// A voter's ballot and the countdown driving it.
struct ActiveBallot {
    ballot: SharedBallot,
    countdown: ScheduledTask<()>,
}

impl ActiveBallot {
    /// Stop every timer belonging to this ballot.
    async fn shut_down(self) {
        self.countdown.cancel().await;
        if let Some(submission) = self.ballot.lock().await.submission.take() {
            submission.cancel().await;
        }
    }
}

/// The ballots of all signed-in voters, one per voter.
pub struct BallotSessions {
    ballots: Mutex<HashMap<UserId, ActiveBallot>>,
    storage: Storage,
    countdown: CountdownSpec,
    timing: BallotTiming,
}

impl BallotSessions {
    pub fn new(storage: Storage, countdown: CountdownSpec, timing: BallotTiming) -> Self {
        Self {
            ballots: Default::default(),
            storage,
            countdown,
            timing,
        }
    }

    /// Get the voter's ballot, starting a fresh one with a full countdown if
    /// they have none.
    async fn open(&self, voter: UserId) -> SharedBallot {
        let mut ballots = self.ballots.lock().await;
        if let Some(active) = ballots.get(&voter) {
            return active.ballot.clone();
        }
        info!("Starting ballot for voter {voter}");
        let ballot = Arc::new(Mutex::new(Ballot {
            workflow: BallotWorkflow::new(self.countdown),
            submission: None,
        }));
        let countdown = self.start_countdown(voter, ballot.clone());
        ballots.insert(
            voter,
            ActiveBallot {
                ballot: ballot.clone(),
                countdown,
            },
        );
        ballot
    }

    /// Does the voter currently have a ballot open?
    pub async fn is_open(&self, voter: UserId) -> bool {
        self.ballots.lock().await.contains_key(&voter)
    }

    /// Run `action` against the voter's workflow, opening the ballot if needed.
    pub async fn with_workflow<R>(
        &self,
        voter: UserId,
        action: impl FnOnce(&mut BallotWorkflow) -> R,
    ) -> R {
        let ballot = self.open(voter).await;
        let mut ballot = ballot.lock().await;
        action(&mut ballot.workflow)
    }

    /// Render the voter's ballot, opening it if needed.
    pub async fn view(&self, voter: UserId) -> BallotView {
        self.with_workflow(voter, BallotView::render).await
    }

    /// Confirm the voter's reviewed ballot and start submitting it.
    pub async fn confirm(&self, voter: UserId) -> Result<BallotView, WorkflowError> {
        let shared = self.open(voter).await;
        let mut ballot = shared.lock().await;
        ballot.workflow.confirm()?;
        info!("Voter {voter} confirmed their ballot");
        let submit = submit(shared.clone(), self.storage.clone(), voter, self.timing);
        ballot.submission = Some(ScheduledTask::after(submit, self.timing.acknowledge_delay));
        Ok(BallotView::render(&mut ballot.workflow))
    }

    /// Discard the voter's ballot and cancel its timers.
    /// Returns whether there was one.
    pub async fn end(&self, voter: UserId) -> bool {
        let active = self.ballots.lock().await.remove(&voter);
        match active {
            Some(active) => {
                active.shut_down().await;
                debug!("Ended ballot for voter {voter}");
                true
            }
            None => false,
        }
    }

    /// Discard every ballot.
    pub async fn end_all(&self) {
        let ballots: Vec<_> = self.ballots.lock().await.drain().collect();
        let count = ballots.len();
        for (_, active) in ballots {
            active.shut_down().await;
        }
        if count > 0 {
            warn!("Abandoned {count} open ballots");
        }
    }

    fn start_countdown(&self, voter: UserId, ballot: SharedBallot) -> ScheduledTask<()> {
        let storage = self.storage.clone();
        let timing = self.timing;
        ScheduledTask::every(TICK, move || {
            let ballot = ballot.clone();
            let storage = storage.clone();
            async move {
                let mut guard = ballot.lock().await;
                match guard.workflow.tick() {
                    None if guard.workflow.state().is_terminal() => ControlFlow::Break(()),
                    None => ControlFlow::Continue(()),
                    Some(Expiry::AutoSubmit) => {
                        info!("Ballot time expired for voter {voter}, auto-submitting");
                        let auto = auto_submit(ballot.clone(), storage, voter, timing);
                        guard.submission =
                            Some(ScheduledTask::after(auto, timing.auto_submit_delay));
                        ControlFlow::Break(())
                    }
                    Some(Expiry::Blocked) => {
                        warn!("Ballot time expired for voter {voter} with required votes missing");
                        ControlFlow::Break(())
                    }
                    Some(Expiry::Ignored) => ControlFlow::Break(()),
                }
            }
        })
    }
}

/// Submit a ballot whose countdown ran out, without the voter's involvement.
async fn auto_submit(ballot: SharedBallot, storage: Storage, voter: UserId, timing: BallotTiming) {
    {
        let mut guard = ballot.lock().await;
        let confirmed = guard
            .workflow
            .review()
            .and_then(|review| {
                debug!("Auto-submitting {} selections", review.entries.len());
                guard.workflow.confirm()
            });
        if let Err(e) = confirmed {
            warn!("Auto-submission for voter {voter} abandoned: {e}");
            return;
        }
    }
    rocket::tokio::time::sleep(timing.acknowledge_delay).await;
    submit(ballot, storage, voter, timing).await
}

/// Acknowledge a confirmed ballot, wait, then persist it.
async fn submit(ballot: SharedBallot, storage: Storage, voter: UserId, timing: BallotTiming) {
    if let Err(e) = ballot.lock().await.workflow.acknowledge() {
        warn!("Submission for voter {voter} abandoned: {e}");
        return;
    }
    rocket::tokio::time::sleep(timing.persist_delay).await;
    let mut guard = ballot.lock().await;
    let submission = match guard.workflow.prepare(Utc::now()) {
        Ok(submission) => submission,
        Err(e) => {
            warn!("Submission for voter {voter} abandoned: {e}");
            return;
        }
    };
    let persisted = submission.persist(&storage, voter).await;
    match guard.workflow.finalize(submission, persisted) {
        Ok(submission) => info!(
            "Voter {voter} submitted their ballot at {}",
            submission.timestamp()
        ),
        Err(e) => warn!("Submission for voter {voter} failed: {e}"),
    }
}

/// A fairing that places a `BallotSessions` into managed state and abandons
/// every open ballot on shutdown. Depends on `Config` and `Storage` being
/// managed already.
pub struct BallotSessionsFairing;

#[rocket::async_trait]
impl Fairing for BallotSessionsFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ballot Sessions",
            kind: Kind::Ignite | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (config, storage) = match (rocket.state::<Config>(), rocket.state::<Storage>()) {
            (Some(config), Some(storage)) => (config, storage.clone()),
            _ => {
                error!("Config and storage must be available before ballot sessions");
                return Err(rocket);
            }
        };
        let sessions = BallotSessions::new(storage, config.countdown(), config.timing());
        Ok(rocket.manage(sessions))
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        if let Some(sessions) = rocket.state::<BallotSessions>() {
            sessions.end_all().await;
        }
    }
}
