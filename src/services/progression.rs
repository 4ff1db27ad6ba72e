//! Badge and XP progression
//!
//! Every recorded action earns a fixed amount of XP and may cross one of the
//! badge thresholds for that action. Each badge is worth a flat bonus and is
//! awarded at most once. Level is derived from XP.
//!
//! Records are updated with a version check so concurrent actions for the
//! same farmer cannot overwrite each other's XP.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::db::schemas::{BadgeCategory, EarnedBadge, GamificationDoc};
use crate::store::GamificationStore;
use crate::types::enums::string_enum;
use crate::types::{FarmError, Result};

/// XP added per badge awarded
pub const BADGE_XP: i64 = 50;

/// Attempts before a contended update gives up
const MAX_ATTEMPTS: usize = 3;

string_enum! {
    /// Actions that feed progression
    pub enum Action {
        AdvisoryQuery => "advisory_query",
        PracticeAdopted => "practice_adopted",
        DailyActive => "daily_active",
    }
}

impl Action {
    /// XP granted for the action itself
    pub fn base_xp(&self) -> i64 {
        match self {
            Self::AdvisoryQuery => 10,
            Self::PracticeAdopted => 25,
            Self::DailyActive => 5,
        }
    }
}

/// Static badge definition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDef {
    pub badge_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: BadgeCategory,
    pub action: Action,
    pub threshold: i64,
}

impl BadgeDef {
    fn earned(&self, at: DateTime<Utc>) -> EarnedBadge {
        EarnedBadge {
            badge_id: self.badge_id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            category: self.category,
            earned_at: at,
        }
    }
}

pub static BADGES: &[BadgeDef] = &[
    BadgeDef {
        badge_id: "first_query",
        name: "First Question",
        description: "Asked your first advisory question",
        icon: "help_outline",
        category: BadgeCategory::Knowledge,
        action: Action::AdvisoryQuery,
        threshold: 1,
    },
    BadgeDef {
        badge_id: "curious_farmer",
        name: "Curious Farmer",
        description: "Asked 10 advisory questions",
        icon: "quiz",
        category: BadgeCategory::Knowledge,
        action: Action::AdvisoryQuery,
        threshold: 10,
    },
    BadgeDef {
        badge_id: "expert_advisor",
        name: "Expert Advisor",
        description: "Asked 50 advisory questions",
        icon: "school",
        category: BadgeCategory::Knowledge,
        action: Action::AdvisoryQuery,
        threshold: 50,
    },
    BadgeDef {
        badge_id: "first_practice",
        name: "Sustainable Starter",
        description: "Adopted your first sustainable practice",
        icon: "eco",
        category: BadgeCategory::Sustainability,
        action: Action::PracticeAdopted,
        threshold: 1,
    },
    BadgeDef {
        badge_id: "green_thumb",
        name: "Green Thumb",
        description: "Adopted 5 sustainable practices",
        icon: "park",
        category: BadgeCategory::Sustainability,
        action: Action::PracticeAdopted,
        threshold: 5,
    },
    BadgeDef {
        badge_id: "sustainability_champion",
        name: "Sustainability Champion",
        description: "Adopted 20 sustainable practices",
        icon: "nature",
        category: BadgeCategory::Sustainability,
        action: Action::PracticeAdopted,
        threshold: 20,
    },
    BadgeDef {
        badge_id: "active_member",
        name: "Active Member",
        description: "Used the platform for 7 consecutive days",
        icon: "schedule",
        category: BadgeCategory::Achievement,
        action: Action::DailyActive,
        threshold: 7,
    },
    BadgeDef {
        badge_id: "dedicated_farmer",
        name: "Dedicated Farmer",
        description: "Used the platform for 30 consecutive days",
        icon: "calendar_today",
        category: BadgeCategory::Achievement,
        action: Action::DailyActive,
        threshold: 30,
    },
];

/// `floor(sqrt(xp / 100)) + 1`
pub fn level_for_xp(xp: i64) -> i32 {
    let xp = xp.max(0) as f64;
    (xp / 100.0).sqrt().floor() as i32 + 1
}

/// XP still missing for the next level, and percent progress through the
/// current one
pub fn level_progress(xp: i64, level: i32) -> (i64, i64) {
    let level = i64::from(level.max(1));
    let current_floor = (level - 1).pow(2) * 100;
    let next_floor = level.pow(2) * 100;
    let needed = next_floor - xp;
    let progress =
        ((xp - current_floor) as f64 / (next_floor - current_floor) as f64 * 100.0).round();
    (needed, progress as i64)
}

/// Result of one recorded action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub leveled_up: bool,
    pub new_level: i32,
    pub xp_gained: i64,
    pub badges_earned: Vec<EarnedBadge>,
}

/// Apply one action to a record in place.
///
/// `recount` replaces the stored advisory counter when given; the other
/// actions maintain their own counters.
pub fn apply_action(
    record: &mut GamificationDoc,
    action: Action,
    recount: Option<i64>,
    now: DateTime<Utc>,
) -> ActionOutcome {
    let level_before = record.level;

    let count = match action {
        Action::AdvisoryQuery => {
            record.stats.advisory_queries =
                recount.unwrap_or(record.stats.advisory_queries + 1);
            record.stats.advisory_queries
        }
        Action::PracticeAdopted => {
            record.stats.practices_adopted += 1;
            record.stats.practices_adopted
        }
        Action::DailyActive => {
            let last = record.last_daily_active.map(|d| d.to_chrono().date_naive());
            let today = now.date_naive();
            record.stats.days_active = match last {
                _ if record.stats.days_active == 0 => 1,
                Some(day) if day == today => record.stats.days_active,
                Some(day) if day.succ_opt() == Some(today) => record.stats.days_active + 1,
                _ => 1,
            };
            record.last_daily_active = Some(bson::DateTime::from_chrono(now));
            record.stats.days_active
        }
    };

    let mut xp_gained = action.base_xp();
    let mut badges_earned = Vec::new();
    for badge in BADGES.iter().filter(|b| b.action == action && count >= b.threshold) {
        if record.badges.iter().any(|b| b.badge_id == badge.badge_id) {
            continue;
        }
        let earned = badge.earned(now);
        record.badges.push(earned.clone());
        badges_earned.push(earned);
        xp_gained += BADGE_XP;
    }

    record.xp += xp_gained;
    record.level = level_for_xp(record.xp);
    record.last_activity = Some(bson::DateTime::from_chrono(now));

    ActionOutcome {
        leveled_up: record.level > level_before,
        new_level: record.level,
        xp_gained,
        badges_earned,
    }
}

/// Fetch a farmer's record, creating it on first use
pub async fn load_or_create(
    store: &dyn GamificationStore,
    farmer_id: &ObjectId,
) -> Result<GamificationDoc> {
    if let Some(record) = store.find_by_farmer(farmer_id).await? {
        return Ok(record);
    }

    match store.insert(GamificationDoc::new(*farmer_id)).await {
        Ok(record) => Ok(record),
        // Another request created it first
        Err(FarmError::Conflict(_)) => store
            .find_by_farmer(farmer_id)
            .await?
            .ok_or_else(|| FarmError::Internal("progression record vanished".into())),
        Err(e) => Err(e),
    }
}

/// Record an action against the stored record, retrying on version conflicts
pub async fn record_action(
    store: &dyn GamificationStore,
    farmer_id: &ObjectId,
    action: Action,
    recount: Option<i64>,
) -> Result<ActionOutcome> {
    for attempt in 1..=MAX_ATTEMPTS {
        let mut record = load_or_create(store, farmer_id).await?;
        let outcome = apply_action(&mut record, action, recount, Utc::now());

        if store.save_versioned(&record).await? {
            debug!(
                farmer = %farmer_id,
                action = %action,
                xp = outcome.xp_gained,
                "Recorded progression action"
            );
            return Ok(outcome);
        }

        warn!(farmer = %farmer_id, attempt, "Progression record changed concurrently, retrying");
    }

    Err(FarmError::Conflict(
        "Progress is being updated, please retry".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryGamificationStore;
    use chrono::Duration;

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(399), 2);
        assert_eq!(level_for_xp(400), 3);
        assert_eq!(level_for_xp(-10), 1);
    }

    #[test]
    fn test_level_progress() {
        assert_eq!(level_progress(0, 1), (100, 0));
        assert_eq!(level_progress(50, 1), (50, 50));
        assert_eq!(level_progress(250, 2), (150, 50));
    }

    #[test]
    fn test_first_query_awards_badge_once() {
        let mut record = GamificationDoc::new(ObjectId::new());
        let now = Utc::now();

        let first = apply_action(&mut record, Action::AdvisoryQuery, Some(1), now);
        assert_eq!(first.xp_gained, 10 + BADGE_XP);
        assert_eq!(first.badges_earned.len(), 1);
        assert_eq!(first.badges_earned[0].badge_id, "first_query");

        let again = apply_action(&mut record, Action::AdvisoryQuery, Some(1), now);
        assert_eq!(again.xp_gained, 10);
        assert!(again.badges_earned.is_empty());
        assert_eq!(record.badges.len(), 1);
        assert_eq!(record.xp, 70);
    }

    #[test]
    fn test_count_jumping_past_threshold_still_awards() {
        let mut record = GamificationDoc::new(ObjectId::new());
        let outcome = apply_action(&mut record, Action::AdvisoryQuery, Some(12), Utc::now());
        let ids: Vec<_> = outcome.badges_earned.iter().map(|b| b.badge_id.as_str()).collect();
        assert_eq!(ids, vec!["first_query", "curious_farmer"]);
        assert_eq!(outcome.xp_gained, 10 + 2 * BADGE_XP);
        assert!(outcome.leveled_up);
        assert_eq!(outcome.new_level, 2);
        assert_eq!(record.stats.advisory_queries, 12);
    }

    #[test]
    fn test_practice_counter_increments() {
        let mut record = GamificationDoc::new(ObjectId::new());
        for _ in 0..5 {
            apply_action(&mut record, Action::PracticeAdopted, None, Utc::now());
        }
        assert_eq!(record.stats.practices_adopted, 5);
        let ids: Vec<_> = record.badges.iter().map(|b| b.badge_id.as_str()).collect();
        assert_eq!(ids, vec!["first_practice", "green_thumb"]);
    }

    #[test]
    fn test_daily_streak() {
        let mut record = GamificationDoc::new(ObjectId::new());
        let day0 = Utc::now();

        apply_action(&mut record, Action::DailyActive, None, day0);
        assert_eq!(record.stats.days_active, 1);

        // Same day does not extend the streak
        apply_action(&mut record, Action::DailyActive, None, day0);
        assert_eq!(record.stats.days_active, 1);

        for day in 1..7 {
            apply_action(&mut record, Action::DailyActive, None, day0 + Duration::days(day));
        }
        assert_eq!(record.stats.days_active, 7);
        assert!(record.badges.iter().any(|b| b.badge_id == "active_member"));

        // A gap resets it
        apply_action(&mut record, Action::DailyActive, None, day0 + Duration::days(9));
        assert_eq!(record.stats.days_active, 1);
    }

    #[test]
    fn test_other_actions_do_not_break_streak() {
        let mut record = GamificationDoc::new(ObjectId::new());
        let day0 = Utc::now();
        let day1 = day0 + Duration::days(1);

        apply_action(&mut record, Action::DailyActive, None, day0);
        apply_action(&mut record, Action::PracticeAdopted, None, day1);
        apply_action(&mut record, Action::AdvisoryQuery, Some(1), day1);
        apply_action(&mut record, Action::DailyActive, None, day1);
        assert_eq!(record.stats.days_active, 2);

        // Activity on a missed day is not a check-in
        apply_action(&mut record, Action::PracticeAdopted, None, day1 + Duration::days(1));
        apply_action(&mut record, Action::DailyActive, None, day1 + Duration::days(2));
        assert_eq!(record.stats.days_active, 1);
    }

    #[tokio::test]
    async fn test_record_action_persists() {
        let store = MemoryGamificationStore::default();
        let farmer = ObjectId::new();

        let outcome = record_action(&store, &farmer, Action::PracticeAdopted, None)
            .await
            .unwrap();
        assert_eq!(outcome.xp_gained, 25 + BADGE_XP);

        let stored = store.find_by_farmer(&farmer).await.unwrap().unwrap();
        assert_eq!(stored.xp, 75);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.badges.len(), 1);
    }
}
