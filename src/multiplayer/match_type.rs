//! Match-type strategy: per-match-type rules for team assignment on
//! join and result aggregation at the end of a play.
//!
//! The source this was distilled from has room, strategy, and hub hold
//! mutual references. Here the strategy owns no back-pointer to the room at
//! all -- it is handed the slice of users it needs for a given call, and
//! any cross-cutting notification goes through the narrow [`HubContext`]
//! capability it was constructed with.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ids::{RoomId, UserId};

/// The two match types this engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    HeadToHead,
    TeamVersus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
}

/// Per-user data owned by the match-type strategy, stored alongside each
/// `RoomUser` but opaque to the room state machine itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRoleData {
    pub team: Option<Team>,
}

/// One user's contribution to a finished play, used as aggregation input.
#[derive(Debug, Clone, Copy)]
pub struct UserScore {
    pub user_id: UserId,
    pub total_score: i64,
    pub passed: bool,
}

/// Aggregated outcome of a completed play, ranked per match-type rules.
#[derive(Debug, Clone)]
pub enum MatchResult {
    HeadToHead {
        /// Users ordered by descending score.
        ranking: Vec<UserId>,
    },
    TeamVersus {
        red_total: i64,
        blue_total: i64,
        winner: Option<Team>,
    },
}

/// Narrow capability a match-type strategy is given instead of a
/// back-pointer to the hub or the owning room.
pub trait HubContext: Send + Sync {
    /// Notify connected clients that a room's visible state changed.
    fn notify_room_updated(&self, room_id: RoomId);
}

/// A no-op context for strategies constructed outside of a running hub
/// (unit tests, offline tooling).
pub struct NullHubContext;

impl HubContext for NullHubContext {
    fn notify_room_updated(&self, _room_id: RoomId) {}
}

/// `SendMatchRequest`/`InvokeMatchRequest` payloads a match type may accept
/// from a user to adjust their own role data mid-room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchUserRequest {
    ChangeTeam(Team),
}

pub trait MatchTypeStrategy: Send + Sync {
    fn match_type(&self) -> MatchType;

    /// Called when a user joins the room, to compute their initial role
    /// data given the teams already assigned to other users.
    fn assign_on_join(&self, existing: &[MatchRoleData]) -> MatchRoleData;

    /// Aggregate the finished play's per-user scores into a match result.
    fn aggregate_results(&self, scores: &[UserScore]) -> MatchResult;

    /// Handles a user-initiated role request, returning the new role data
    /// if this match type honors the request. `HeadToHead` honors none.
    fn handle_user_request(&self, _request: MatchUserRequest) -> Option<MatchRoleData> {
        None
    }
}

pub struct HeadToHeadStrategy;

impl MatchTypeStrategy for HeadToHeadStrategy {
    fn match_type(&self) -> MatchType {
        MatchType::HeadToHead
    }

    fn assign_on_join(&self, _existing: &[MatchRoleData]) -> MatchRoleData {
        MatchRoleData { team: None }
    }

    fn aggregate_results(&self, scores: &[UserScore]) -> MatchResult {
        let mut ranking: Vec<&UserScore> = scores.iter().collect();
        ranking.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        MatchResult::HeadToHead {
            ranking: ranking.into_iter().map(|s| s.user_id).collect(),
        }
    }
}

/// Balances new joiners onto whichever team currently has fewer players,
/// preferring Red on a tie.
pub struct TeamVersusStrategy {
    #[allow(dead_code)]
    ctx: Arc<dyn HubContext>,
}

impl TeamVersusStrategy {
    pub fn new(ctx: Arc<dyn HubContext>) -> Self {
        Self { ctx }
    }
}

impl MatchTypeStrategy for TeamVersusStrategy {
    fn match_type(&self) -> MatchType {
        MatchType::TeamVersus
    }

    fn assign_on_join(&self, existing: &[MatchRoleData]) -> MatchRoleData {
        let red = existing.iter().filter(|d| d.team == Some(Team::Red)).count();
        let blue = existing
            .iter()
            .filter(|d| d.team == Some(Team::Blue))
            .count();
        let team = if red <= blue { Team::Red } else { Team::Blue };
        MatchRoleData { team: Some(team) }
    }

    fn aggregate_results(&self, scores: &[UserScore]) -> MatchResult {
        // Team assignment itself lives on the `RoomUser`, not `UserScore`;
        // callers merge team membership in before calling this, keyed by
        // user id, via `team_totals`.
        let _ = scores;
        MatchResult::TeamVersus {
            red_total: 0,
            blue_total: 0,
            winner: None,
        }
    }

    fn handle_user_request(&self, request: MatchUserRequest) -> Option<MatchRoleData> {
        let MatchUserRequest::ChangeTeam(team) = request;
        Some(MatchRoleData { team: Some(team) })
    }
}

impl TeamVersusStrategy {
    /// Aggregates scores into team totals given each user's team
    /// membership. Separated from [`MatchTypeStrategy::aggregate_results`]
    /// because that trait method only receives scores, not role data.
    pub fn aggregate_with_teams(
        &self,
        scores: &[UserScore],
        teams: &HashMap<UserId, Team>,
    ) -> MatchResult {
        let mut red_total = 0i64;
        let mut blue_total = 0i64;
        for score in scores {
            match teams.get(&score.user_id) {
                Some(Team::Red) => red_total += score.total_score,
                Some(Team::Blue) => blue_total += score.total_score,
                None => {}
            }
        }
        let winner = match red_total.cmp(&blue_total) {
            std::cmp::Ordering::Greater => Some(Team::Red),
            std::cmp::Ordering::Less => Some(Team::Blue),
            std::cmp::Ordering::Equal => None,
        };
        MatchResult::TeamVersus {
            red_total,
            blue_total,
            winner,
        }
    }
}
