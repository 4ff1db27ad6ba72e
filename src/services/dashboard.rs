//! Dashboard aggregation
//!
//! Summary numbers, a merged activity feed and mock weather for the
//! signed-in farmer.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::db::schemas::{AdvisoryDoc, PracticeDoc};
use crate::store::{FarmerFilter, Stores};
use crate::types::Result;

pub const DEFAULT_ACTIVITY_LIMIT: usize = 10;

/// How many recent advisories feed the activity list
const RECENT_ADVISORIES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_farmers: u64,
    pub active_practices: u64,
    pub advisory_queries: u64,
    pub sustainability_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    pub time: String,
    pub icon: &'static str,
    pub color: &'static str,
    #[serde(skip)]
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weather {
    pub temperature: i64,
    pub humidity: i64,
    pub rainfall: i64,
    #[serde(rename = "windSpeed")]
    pub wind_speed: i64,
    pub condition: &'static str,
    pub location: &'static str,
}

/// "Just now", "5 minutes ago", "1 day ago"...
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let (count, unit) = if elapsed.num_minutes() < 1 {
        return "Just now".to_string();
    } else if elapsed.num_hours() < 1 {
        (elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        (elapsed.num_hours(), "hour")
    } else {
        (elapsed.num_days(), "day")
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{} {}{} ago", count, unit, plural)
}

/// Rounded mean of each implemented practice's mean impact; 0 without any
pub fn sustainability_score(practices: &[PracticeDoc]) -> i64 {
    let scores: Vec<f64> = practices
        .iter()
        .filter(|p| p.is_implemented())
        .map(|p| p.environmental_impact.mean())
        .collect();
    if scores.is_empty() {
        return 0;
    }
    (scores.iter().sum::<f64>() / scores.len() as f64).round() as i64
}

pub async fn stats(stores: &Stores, farmer_id: &bson::oid::ObjectId) -> Result<DashboardStats> {
    let total_farmers = stores.farmers.count(&FarmerFilter::active()).await?;
    let advisory_queries = stores.advisories.count_for_farmer(farmer_id).await?;
    let owned = stores.practices.list_by_owner(farmer_id).await?;

    Ok(DashboardStats {
        total_farmers,
        active_practices: owned.iter().filter(|p| p.is_implemented()).count() as u64,
        advisory_queries,
        sustainability_score: sustainability_score(&owned),
    })
}

fn advisory_activity(advisory: &AdvisoryDoc, now: DateTime<Utc>) -> Activity {
    let at = advisory.metadata.created().unwrap_or(now);
    let preview: String = advisory.query.chars().take(50).collect();
    Activity {
        id: advisory._id.map(|id| id.to_hex()).unwrap_or_default(),
        kind: "advisory",
        message: format!("AI recommendation: {}...", preview),
        time: time_ago(at, now),
        icon: "Science",
        color: "#4caf50",
        at,
    }
}

fn practice_activity(practice: &PracticeDoc, now: DateTime<Utc>) -> Activity {
    let at = practice
        .implementation
        .as_ref()
        .and_then(|i| i.implementation_date)
        .or_else(|| practice.metadata.updated())
        .unwrap_or(now);
    Activity {
        id: practice._id.map(|id| id.to_hex()).unwrap_or_default(),
        kind: "practice",
        message: format!("Implemented: {}", practice.title),
        time: time_ago(at, now),
        icon: "Eco",
        color: "#2e7d32",
        at,
    }
}

/// Recent advisories and implemented practices, newest first
pub async fn activities(
    stores: &Stores,
    farmer_id: &bson::oid::ObjectId,
    limit: usize,
) -> Result<Vec<Activity>> {
    let now = Utc::now();
    let advisories = stores
        .advisories
        .list_for_farmer(farmer_id, 0, RECENT_ADVISORIES)
        .await?;
    let practices = stores.practices.list_by_owner(farmer_id).await?;

    let mut feed: Vec<Activity> = advisories
        .iter()
        .map(|a| advisory_activity(a, now))
        .chain(
            practices
                .iter()
                .filter(|p| p.is_implemented())
                .map(|p| practice_activity(p, now)),
        )
        .collect();

    feed.sort_by(|a, b| b.at.cmp(&a.at));
    feed.truncate(limit);
    Ok(feed)
}

pub fn mock_weather() -> Weather {
    const CONDITIONS: &[&str] = &["Sunny", "Cloudy", "Rainy", "Partly Cloudy"];
    let mut rng = rand::thread_rng();
    Weather {
        temperature: rng.gen_range(15..=35),
        humidity: rng.gen_range(40..=70),
        rainfall: rng.gen_range(0..=20),
        wind_speed: rng.gen_range(5..=20),
        condition: CONDITIONS.choose(&mut rng).copied().unwrap_or("Sunny"),
        location: "Farm Location",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{
        AdvisoryKind, CostLevel, Difficulty, EnvironmentalImpact, Implementation,
        PracticeCategory,
    };
    use bson::oid::ObjectId;
    use chrono::Duration;

    fn practice(owner: ObjectId, title: &str, implemented: bool, impact: i32) -> PracticeDoc {
        let mut p = PracticeDoc::new(
            title.into(),
            "desc".into(),
            PracticeCategory::SoilHealth,
            Difficulty::Beginner,
            CostLevel::Low,
        );
        p.created_by = Some(owner);
        p.environmental_impact = EnvironmentalImpact {
            carbon_reduction: impact,
            water_conservation: impact,
            soil_health: impact,
            biodiversity: impact,
        };
        p.implementation = Some(Implementation {
            is_implemented: implemented,
            implementation_date: Some(Utc::now() - Duration::hours(3)),
            progress: 100,
            notes: String::new(),
        });
        p
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(20), now), "Just now");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(2), now), "2 hours ago");
        assert_eq!(time_ago(now - Duration::days(1), now), "1 day ago");
        assert_eq!(time_ago(now - Duration::days(9), now), "9 days ago");
    }

    #[test]
    fn test_sustainability_score_ignores_unimplemented() {
        let owner = ObjectId::new();
        let practices = vec![
            practice(owner, "a", true, 80),
            practice(owner, "b", true, 65),
            practice(owner, "c", false, 10),
        ];
        assert_eq!(sustainability_score(&practices), 73);
        assert_eq!(sustainability_score(&[]), 0);
    }

    #[test]
    fn test_weather_ranges() {
        for _ in 0..50 {
            let w = mock_weather();
            assert!((15..=35).contains(&w.temperature));
            assert!((40..=70).contains(&w.humidity));
            assert!((0..=20).contains(&w.rainfall));
            assert!((5..=20).contains(&w.wind_speed));
        }
    }

    #[tokio::test]
    async fn test_activity_feed_is_merged_newest_first() {
        let stores = Stores::memory();
        let farmer = ObjectId::new();

        stores
            .practices
            .insert(practice(farmer, "Drip irrigation", true, 70))
            .await
            .unwrap();
        stores
            .practices
            .insert(practice(farmer, "Not yet", false, 70))
            .await
            .unwrap();
        stores
            .advisories
            .insert(AdvisoryDoc::processing(
                farmer,
                AdvisoryKind::Text,
                "How do I keep aphids off my cabbage without spraying chemicals?".into(),
            ))
            .await
            .unwrap();

        let feed = activities(&stores, &farmer, DEFAULT_ACTIVITY_LIMIT)
            .await
            .unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].kind, "advisory");
        assert_eq!(
            feed[0].message,
            "AI recommendation: How do I keep aphids off my cabbage without sprayi..."
        );
        assert_eq!(feed[1].message, "Implemented: Drip irrigation");
        assert_eq!(feed[1].time, "3 hours ago");

        let stats = stats(&stores, &farmer).await.unwrap();
        assert_eq!(stats.active_practices, 1);
        assert_eq!(stats.advisory_queries, 1);
        assert_eq!(stats.sustainability_score, 70);
    }
}
