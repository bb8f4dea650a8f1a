use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::sync::{Mutex, RwLock},
    tokio::time::Duration,
    Build, Orbit, Rocket,
};
use serde::Serialize;

use crate::{config::Config, scheduled_task::ScheduledTask};

use super::ballot::{OptionLabel, Position};

/// Number of elections currently running.
pub const ACTIVE_ELECTIONS: u32 = 3;
/// Number of voters on the register.
pub const REGISTERED_VOTERS: u64 = 1_247_832;
/// Number of ballots cast so far.
pub const BALLOTS_CAST: u64 = 892_456;

/// Published vote counts per position and option.
const TALLIES: &[(Position, &str, u64)] = &[
    (Position::President, "johnson", 452_310),
    (Position::President, "williams", 398_127),
    (Position::President, "davis", 42_019),
    (Position::Senate, "martinez", 461_872),
    (Position::Senate, "thompson", 430_584),
    (Position::Proposition, "yes", 503_211),
    (Position::Proposition, "no", 389_245),
];

const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub option: &'static str,
    pub label: &'static str,
    pub votes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    pub position: Position,
    pub title: &'static str,
    pub total_votes: u64,
    pub tallies: Vec<Tally>,
}

impl Race {
    fn for_position(position: Position) -> Self {
        let counts: Vec<_> = TALLIES
            .iter()
            .filter(|(p, _, _)| *p == position)
            .map(|(_, option, votes)| (*option, *votes))
            .collect();
        let total_votes: u64 = counts.iter().map(|(_, votes)| votes).sum();
        let tallies = counts
            .into_iter()
            .map(|(option, votes)| Tally {
                option,
                label: OptionLabel::options(position)
                    .find(|(id, _)| *id == option)
                    .map(|(_, label)| label)
                    .unwrap_or(option),
                votes,
                percent: percent(votes, total_votes),
            })
            .collect();
        Self {
            position,
            title: position.title(),
            total_votes,
            tallies,
        }
    }

    /// The option with the most votes.
    pub fn leader(&self) -> Option<&Tally> {
        self.tallies.iter().max_by_key(|t| t.votes)
    }
}

/// Percentage rounded to one decimal place.
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub races: Vec<Race>,
    pub ballots_cast: u64,
    pub last_updated: DateTime<Utc>,
    pub last_updated_text: String,
    pub refreshes: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub active_elections: u32,
    pub registered_voters: u64,
    pub ballots_cast: u64,
    pub turnout: f64,
}

impl SiteStats {
    pub fn current() -> Self {
        Self {
            active_elections: ACTIVE_ELECTIONS,
            registered_voters: REGISTERED_VOTERS,
            ballots_cast: BALLOTS_CAST,
            turnout: percent(BALLOTS_CAST, REGISTERED_VOTERS),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBar {
    pub label: &'static str,
    pub percent: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: SiteStats,
    pub activity: Vec<ActivityBar>,
}

impl Dashboard {
    pub fn current() -> Self {
        Self {
            stats: SiteStats::current(),
            activity: DAYS
                .into_iter()
                .zip(0..)
                .map(|(label, i)| ActivityBar {
                    label,
                    percent: 20 + i * 10,
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
struct Refresh {
    last_updated: DateTime<Utc>,
    count: u32,
}

/// The published results, refreshed periodically. The figures themselves never
/// change; a refresh only moves the "last updated" time.
pub struct ResultsBoard {
    refresh: Arc<RwLock<Refresh>>,
    refresher: Mutex<Option<ScheduledTask<()>>>,
}

impl ResultsBoard {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            refresh: Arc::new(RwLock::new(Refresh {
                last_updated: now,
                count: 0,
            })),
            refresher: Mutex::new(None),
        }
    }

    /// Start refreshing every `period`, replacing any earlier schedule.
    pub async fn start(&self, period: Duration) {
        let refresh = self.refresh.clone();
        let task = ScheduledTask::every(period, move || {
            let refresh = refresh.clone();
            async move {
                let mut refresh = refresh.write().await;
                refresh.last_updated = Utc::now();
                refresh.count += 1;
                debug!("Results updated ({} refreshes)", refresh.count);
                ControlFlow::Continue(())
            }
        });
        *self.refresher.lock().await = Some(task);
    }

    /// Stop refreshing.
    pub async fn stop(&self) {
        if let Some(task) = self.refresher.lock().await.take() {
            task.cancel().await;
        }
    }

    pub async fn view(&self, now: DateTime<Utc>) -> ResultsView {
        let refresh = self.refresh.read().await;
        ResultsView {
            races: Position::ALL.into_iter().map(Race::for_position).collect(),
            ballots_cast: BALLOTS_CAST,
            last_updated: refresh.last_updated,
            last_updated_text: since(refresh.last_updated, now),
            refreshes: refresh.count,
        }
    }
}

/// How long ago `then` was, as shown next to the results.
fn since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match (now - then).num_minutes() {
        m if m < 1 => "Just now".to_string(),
        1 => "1 minute ago".to_string(),
        m => format!("{m} minutes ago"),
    }
}

/// A fairing that manages the `ResultsBoard` and refreshes it while the server
/// is running. Must be attached after `ConfigFairing`.
pub struct ResultsFairing;

#[rocket::async_trait]
impl Fairing for ResultsFairing {
    fn info(&self) -> Info {
        Info {
            name: "Results refresh",
            kind: Kind::Ignite | Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        Ok(rocket.manage(ResultsBoard::new(Utc::now())))
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        match (rocket.state::<Config>(), rocket.state::<ResultsBoard>()) {
            (Some(config), Some(board)) => {
                let period = config.results_refresh();
                board.start(period).await;
                info!("Refreshing results every {}s", period.as_secs());
            }
            _ => error!("Results board is not managed, results will not refresh"),
        }
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        if let Some(board) = rocket.state::<ResultsBoard>() {
            board.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_race_adds_up_to_the_ballots_cast() {
        for position in Position::ALL {
            let race = Race::for_position(position);
            assert_eq!(BALLOTS_CAST, race.total_votes, "{position}");
            let share: f64 = race.tallies.iter().map(|t| t.percent).sum();
            assert!((share - 100.0).abs() < 0.2, "{position}: {share}");
        }
    }

    #[test]
    fn races_are_labelled() {
        let president = Race::for_position(Position::President);
        assert_eq!("President", president.title);
        let leader = president.leader().unwrap();
        assert_eq!("johnson", leader.option);
        assert_eq!("Sarah Johnson (Democratic)", leader.label);
        assert_eq!(50.7, leader.percent);
    }

    #[test]
    fn dashboard_figures() {
        let dashboard = Dashboard::current();
        assert_eq!(3, dashboard.stats.active_elections);
        assert_eq!(1_247_832, dashboard.stats.registered_voters);
        assert_eq!(892_456, dashboard.stats.ballots_cast);
        assert_eq!(71.5, dashboard.stats.turnout);
        let activity: Vec<_> = dashboard.activity.iter().map(|bar| bar.percent).collect();
        assert_eq!(vec![20, 30, 40, 50, 60, 70, 80], activity);
    }

    #[test]
    fn last_updated_text() {
        let then = Utc::now();
        assert_eq!("Just now", since(then, then + chrono::Duration::seconds(59)));
        assert_eq!("1 minute ago", since(then, then + chrono::Duration::seconds(90)));
        assert_eq!("4 minutes ago", since(then, then + chrono::Duration::minutes(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn board_refreshes_periodically() {
        let board = ResultsBoard::new(Utc::now());
        board.start(Duration::from_secs(120)).await;
        assert_eq!(0, board.view(Utc::now()).await.refreshes);

        rocket::tokio::time::sleep(Duration::from_secs(241)).await;
        assert_eq!(2, board.view(Utc::now()).await.refreshes);

        board.stop().await;
        rocket::tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(2, board.view(Utc::now()).await.refreshes);
    }
}
