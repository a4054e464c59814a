//! Leaderboard domain types shared by the live-update payloads and the HTTP API.
//!
//! Date and time types are re-exported from [`chrono`] so users don't need to add
//! it to their `Cargo.toml`.

use bon::Builder;
/// Date and time types for timestamps in API responses and live events.
pub use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A leaderboard member.
///
/// Display-oriented fields (`change`, `followers`, `balance`, ...) are kept as the
/// preformatted strings the server sends.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[builder(into)]
    pub id: String,
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub handle: String,
    /// Current position on the leaderboard, 1-based
    pub rank: u32,
    #[builder(into)]
    pub joined_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub last_active: Option<String>,
    #[serde(default)]
    #[builder(into, default)]
    pub change: String,
    #[serde(default)]
    #[builder(into, default)]
    pub followers: String,
    #[serde(default)]
    #[builder(into, default)]
    pub engaged: String,
    #[serde(default)]
    #[builder(into, default)]
    pub percentage: String,
    #[serde(default)]
    #[builder(into, default)]
    pub balance: String,
    #[serde(default)]
    #[builder(into, default)]
    pub balance_usd: String,
    #[serde(default)]
    #[builder(into, default)]
    pub profile_image: String,
    #[serde(default)]
    #[builder(into, default)]
    pub twitter_url: String,
}

/// What happened to a member between two snapshots.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    RankChanged,
}

/// One membership change event.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct MemberChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub member: Member,
    /// Rank before the change, present for `rank_changed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_rank: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// A member that moved on the leaderboard.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct RankChange {
    pub member: Member,
    pub previous_rank: u32,
    /// Omitted by the `/changes` endpoint, where `member.rank` is the new rank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_rank: Option<u32>,
}

impl RankChange {
    /// Rank after the move.
    #[must_use]
    pub fn current_rank(&self) -> u32 {
        self.new_rank.unwrap_or(self.member.rank)
    }

    /// Positive when the member climbed, negative when they dropped.
    #[must_use]
    pub fn delta(&self) -> i64 {
        i64::from(self.previous_rank) - i64::from(self.current_rank())
    }
}

/// Window a [`ChangesSummary`] covers.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Joins, removals and rank movements over a time window.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct ChangesSummary {
    #[serde(default)]
    #[builder(default)]
    pub new_members: Vec<Member>,
    #[serde(default)]
    #[builder(default)]
    pub removed_members: Vec<Member>,
    #[serde(default)]
    #[builder(default)]
    pub rank_changes: Vec<RankChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

impl ChangesSummary {
    /// `true` when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_members.is_empty()
            && self.removed_members.is_empty()
            && self.rank_changes.is_empty()
    }
}

/// Aggregate statistics of the scraping backend.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Backend uptime in seconds
    pub uptime: f64,
    /// Backend memory usage in bytes
    pub memory_usage: f64,
    /// Live-update clients currently connected to the backend
    pub ws_clients: u64,
    pub total_members: u64,
    pub total_changes: u64,
    pub history_snapshots: u64,
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn member(rank: u32) -> Member {
        Member::builder()
            .id("1")
            .name("Alice")
            .handle("@alice")
            .rank(rank)
            .joined_at("2024-01-01")
            .build()
    }

    #[test]
    fn member_change_deserializes_camel_case() {
        let change: MemberChange = serde_json::from_value(json!({
            "type": "rank_changed",
            "member": {
                "id": "42",
                "name": "Bob",
                "handle": "@bob",
                "rank": 3,
                "joinedAt": "2024-01-01",
                "change": "+2",
                "followers": "1.2K",
                "engaged": "300",
                "percentage": "1.5%",
                "balance": "10",
                "balanceUsd": "$10",
                "profileImage": "https://example.com/bob.png",
                "twitterUrl": "https://x.com/bob"
            },
            "previousRank": 5,
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(change.change_type, ChangeType::RankChanged);
        assert_eq!(change.member.balance_usd, "$10");
        assert_eq!(change.member.last_active, None);
        assert_eq!(change.previous_rank, Some(5));
    }

    #[test]
    fn change_type_display_matches_wire_name() {
        assert_eq!(ChangeType::RankChanged.to_string(), "rank_changed");
        assert_eq!(ChangeType::Added.to_string(), "added");
    }

    #[test]
    fn rank_change_delta_uses_member_rank_without_new_rank() {
        let climbed = RankChange::builder()
            .member(member(2))
            .previous_rank(7)
            .build();
        let dropped = RankChange::builder()
            .member(member(2))
            .previous_rank(1)
            .new_rank(4)
            .build();

        assert_eq!(climbed.delta(), 5);
        assert_eq!(dropped.current_rank(), 4);
        assert_eq!(dropped.delta(), -3);
    }

    #[test]
    fn changes_summary_defaults_missing_lists() {
        let summary: ChangesSummary =
            serde_json::from_value(json!({ "newMembers": [] })).unwrap();

        assert!(summary.is_empty());
        assert_eq!(summary.time_range, None);
    }
}
