//! Gamification document schema
//!
//! One progression record per farmer: XP, derived level, earned badges and
//! activity counters. `version` guards concurrent read-modify-write cycles.

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{Identified, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::enums::string_enum;

/// Collection name for progression records
pub const GAMIFICATION_COLLECTION: &str = "gamification";

string_enum! {
    pub enum BadgeCategory {
        Sustainability => "sustainability",
        Knowledge => "knowledge",
        Community => "community",
        Achievement => "achievement",
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBadge {
    pub badge_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub earned_at: chrono::DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub achievement_id: String,
    pub name: String,
    pub description: String,
    pub completed_at: chrono::DateTime<Utc>,
    #[serde(default)]
    pub xp_reward: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    #[serde(default)]
    pub advisory_queries: i64,
    #[serde(default)]
    pub practices_adopted: i64,
    /// Current run of consecutive active days
    #[serde(default)]
    pub days_active: i64,
    #[serde(default)]
    pub community_contributions: i64,
}

/// Progression record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GamificationDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub farmer_id: ObjectId,

    #[serde(default)]
    pub xp: i64,

    #[serde(default = "default_level")]
    pub level: i32,

    #[serde(default)]
    pub badges: Vec<EarnedBadge>,

    #[serde(default)]
    pub achievements: Vec<Achievement>,

    #[serde(default)]
    pub stats: ActivityStats,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime>,

    /// Last `daily_active` check-in; the streak is counted from this alone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_daily_active: Option<DateTime>,

    /// Incremented on every successful save
    #[serde(default)]
    pub version: i64,
}

fn default_level() -> i32 {
    1
}

impl GamificationDoc {
    /// Fresh record: level 1, no XP, no badges
    pub fn new(farmer_id: ObjectId) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            farmer_id,
            xp: 0,
            level: 1,
            badges: Vec::new(),
            achievements: Vec::new(),
            stats: ActivityStats::default(),
            last_activity: Some(DateTime::now()),
            last_daily_active: None,
            version: 0,
        }
    }
}

impl IntoIndexes for GamificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "farmer_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("farmer_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "xp": -1 },
                Some(IndexOptions::builder().name("xp_desc".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for GamificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Identified for GamificationDoc {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
