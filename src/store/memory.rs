//! In-memory stores for dev mode and tests
//!
//! Same contracts as the MongoDB stores: metadata is stamped on insert,
//! soft-deleted documents are invisible and listings are newest first.

use std::cmp::Reverse;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{
    AdvisoryStore, CategorySummary, CommunicationStore, FarmerFilter, FarmerStore,
    GamificationStore, LeaderboardSort, PracticeFacets, PracticeFilter, PracticeSort,
    PracticeStore,
};
use crate::db::schemas::{
    AdvisoryDoc, CommunicationDoc, FarmerDoc, GamificationDoc, Metadata, PracticeDoc,
};
use crate::db::{Identified, MutMetadata};
use crate::types::{FarmError, Result};

/// Documents the generic map can hold
pub trait Stored: Identified + MutMetadata + Clone + Send + Sync + 'static {
    fn metadata(&self) -> &Metadata;
}

macro_rules! impl_stored {
    ($($doc:ty),+) => {
        $(impl Stored for $doc {
            fn metadata(&self) -> &Metadata {
                &self.metadata
            }
        })+
    };
}

impl_stored!(FarmerDoc, AdvisoryDoc, PracticeDoc, GamificationDoc, CommunicationDoc);

/// A DashMap keyed by `_id`
pub struct MemoryCollection<T: Stored> {
    docs: DashMap<ObjectId, T>,
}

impl<T: Stored> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }
}

impl<T: Stored> MemoryCollection<T> {
    /// Assign an id if missing and stamp fresh metadata
    pub fn insert(&self, mut item: T) -> T {
        let id = item.id().unwrap_or_else(ObjectId::new);
        item.set_id(id);

        item.mut_metadata().stamp_created(DateTime::now());

        self.docs.insert(id, item.clone());
        item
    }

    pub fn get(&self, id: &ObjectId) -> Option<T> {
        self.docs
            .get(id)
            .filter(|d| !d.metadata().is_deleted)
            .map(|d| d.value().clone())
    }

    /// Replace a live document; false when it does not exist
    pub fn replace(&self, item: &T) -> bool {
        let Some(id) = item.id() else {
            return false;
        };
        match self.docs.get_mut(&id) {
            Some(mut stored) if !stored.metadata().is_deleted => {
                let created_at = stored.metadata().created_at;
                let mut next = item.clone();
                next.mut_metadata().stamp_replaced(created_at);
                *stored = next;
                true
            }
            _ => false,
        }
    }

    pub fn soft_delete(&self, id: &ObjectId) -> bool {
        match self.docs.get_mut(id) {
            Some(mut stored) if !stored.metadata().is_deleted => {
                stored.mut_metadata().mark_deleted(DateTime::now());
                true
            }
            _ => false,
        }
    }

    /// Live documents matching `pred`, newest first
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut found: Vec<T> = self
            .docs
            .iter()
            .filter(|d| !d.metadata().is_deleted && pred(d.value()))
            .map(|d| d.value().clone())
            .collect();
        found.sort_by_key(|d| Reverse((d.metadata().created_at, d.id())));
        found
    }

    /// Mutate a live document in place; `None` when missing or rejected by `pred`
    pub fn update(
        &self,
        id: &ObjectId,
        pred: impl Fn(&T) -> bool,
        apply: impl FnOnce(&mut T),
    ) -> Option<T> {
        let mut stored = self.docs.get_mut(id)?;
        if stored.metadata().is_deleted || !pred(stored.value()) {
            return None;
        }
        apply(stored.value_mut());
        stored.mut_metadata().updated_at = Some(DateTime::now());
        Some(stored.value().clone())
    }

    pub fn count(&self, pred: impl Fn(&T) -> bool) -> u64 {
        self.docs
            .iter()
            .filter(|d| !d.metadata().is_deleted && pred(d.value()))
            .count() as u64
    }
}

fn page<T>(items: Vec<T>, skip: u64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(skip as usize)
        .take(limit.max(0) as usize)
        .collect()
}

// =============================================================================
// Farmers
// =============================================================================

#[derive(Default)]
pub struct MemoryFarmerStore {
    docs: MemoryCollection<FarmerDoc>,
    /// Unique index on email
    emails: DashMap<String, ObjectId>,
}

#[async_trait]
impl FarmerStore for MemoryFarmerStore {
    async fn insert(&self, farmer: FarmerDoc) -> Result<FarmerDoc> {
        match self.emails.entry(farmer.email.clone()) {
            Entry::Occupied(_) => Err(FarmError::Conflict("Duplicate key".into())),
            Entry::Vacant(slot) => {
                let stored = self.docs.insert(farmer);
                slot.insert(stored._id.unwrap_or_else(ObjectId::new));
                Ok(stored)
            }
        }
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<FarmerDoc>> {
        Ok(self.docs.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<FarmerDoc>> {
        Ok(self
            .emails
            .get(email)
            .and_then(|id| self.docs.get(id.value())))
    }

    async fn save(&self, farmer: &FarmerDoc) -> Result<()> {
        if !self.docs.replace(farmer) {
            return Err(FarmError::NotFound("Farmer not found".into()));
        }
        Ok(())
    }

    async fn count(&self, filter: &FarmerFilter) -> Result<u64> {
        Ok(self.docs.count(|f| filter.matches(f)))
    }

    async fn find_matching(&self, filter: &FarmerFilter) -> Result<Vec<FarmerDoc>> {
        Ok(self.docs.find(|f| filter.matches(f)))
    }
}

// =============================================================================
// Advisories
// =============================================================================

#[derive(Default)]
pub struct MemoryAdvisoryStore {
    docs: MemoryCollection<AdvisoryDoc>,
}

#[async_trait]
impl AdvisoryStore for MemoryAdvisoryStore {
    async fn insert(&self, advisory: AdvisoryDoc) -> Result<AdvisoryDoc> {
        Ok(self.docs.insert(advisory))
    }

    async fn save(&self, advisory: &AdvisoryDoc) -> Result<()> {
        if !self.docs.replace(advisory) {
            return Err(FarmError::NotFound("Advisory not found".into()));
        }
        Ok(())
    }

    async fn find_for_farmer(
        &self,
        id: &ObjectId,
        farmer_id: &ObjectId,
    ) -> Result<Option<AdvisoryDoc>> {
        Ok(self.docs.get(id).filter(|a| a.farmer_id == *farmer_id))
    }

    async fn list_for_farmer(
        &self,
        farmer_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<AdvisoryDoc>> {
        let all = self.docs.find(|a| a.farmer_id == *farmer_id);
        Ok(page(all, skip, limit))
    }

    async fn count_for_farmer(&self, farmer_id: &ObjectId) -> Result<u64> {
        Ok(self.docs.count(|a| a.farmer_id == *farmer_id))
    }
}

// =============================================================================
// Practices
// =============================================================================

#[derive(Default)]
pub struct MemoryPracticeStore {
    docs: MemoryCollection<PracticeDoc>,
}

#[async_trait]
impl PracticeStore for MemoryPracticeStore {
    async fn insert(&self, practice: PracticeDoc) -> Result<PracticeDoc> {
        Ok(self.docs.insert(practice))
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<PracticeDoc>> {
        Ok(self.docs.get(id))
    }

    async fn save(&self, practice: &PracticeDoc) -> Result<()> {
        if !self.docs.replace(practice) {
            return Err(FarmError::NotFound("Practice not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.docs.soft_delete(id))
    }

    async fn record_adoption(&self, id: &ObjectId) -> Result<Option<PracticeDoc>> {
        Ok(self.docs.update(
            id,
            |p| p.is_active,
            |p| p.adoption_stats.total_adoptions += 1,
        ))
    }

    async fn search(
        &self,
        filter: &PracticeFilter,
        sort: PracticeSort,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<PracticeDoc>> {
        // `find` is newest first; the stable sorts below keep that as tiebreak
        let mut found = self.docs.find(|p| filter.matches(p));
        match sort {
            PracticeSort::Newest => {}
            PracticeSort::Rating => found.sort_by(|a, b| {
                b.adoption_stats
                    .average_rating
                    .total_cmp(&a.adoption_stats.average_rating)
            }),
            PracticeSort::Adoptions => {
                found.sort_by_key(|p| Reverse(p.adoption_stats.total_adoptions))
            }
        }
        Ok(page(found, skip, limit))
    }

    async fn count(&self, filter: &PracticeFilter) -> Result<u64> {
        Ok(self.docs.count(|p| filter.matches(p)))
    }

    async fn category_summary(&self) -> Result<Vec<CategorySummary>> {
        let mut groups: Vec<(String, i64, f64)> = Vec::new();
        for practice in self.docs.find(|p| p.is_active) {
            let key = practice.category.as_str();
            let rating = practice.adoption_stats.average_rating;
            match groups.iter_mut().find(|(k, _, _)| k == key) {
                Some((_, count, sum)) => {
                    *count += 1;
                    *sum += rating;
                }
                None => groups.push((key.to_string(), 1, rating)),
            }
        }

        let mut summary: Vec<CategorySummary> = groups
            .into_iter()
            .map(|(id, count, sum)| CategorySummary {
                id,
                count,
                average_rating: sum / count as f64,
            })
            .collect();
        summary.sort_by_key(|s| Reverse(s.count));
        Ok(summary)
    }

    async fn facets(&self) -> Result<PracticeFacets> {
        let mut facets = PracticeFacets::default();
        for practice in self.docs.find(|p| p.is_active) {
            facets.categories.push(practice.category.as_str().to_string());
            facets.difficulties.push(practice.difficulty.as_str().to_string());
            facets.costs.push(practice.cost.as_str().to_string());
        }
        Ok(facets.normalized())
    }

    async fn suggest(&self, query: &str, limit: i64) -> Result<Vec<PracticeDoc>> {
        let needle = query.to_lowercase();
        let hit = |s: &String| s.to_lowercase().contains(&needle);
        let found = self.docs.find(|p| {
            p.is_active
                && (hit(&p.title)
                    || p.tags.iter().any(hit)
                    || p.applicable_crops.iter().any(hit))
        });
        Ok(page(found, 0, limit))
    }

    async fn list_by_owner(&self, owner: &ObjectId) -> Result<Vec<PracticeDoc>> {
        Ok(self.docs.find(|p| p.is_owned_by(owner)))
    }
}

// =============================================================================
// Gamification
// =============================================================================

/// Keyed by farmer id, which doubles as the unique index
#[derive(Default)]
pub struct MemoryGamificationStore {
    by_farmer: DashMap<ObjectId, GamificationDoc>,
}

#[async_trait]
impl GamificationStore for MemoryGamificationStore {
    async fn find_by_farmer(&self, farmer_id: &ObjectId) -> Result<Option<GamificationDoc>> {
        Ok(self
            .by_farmer
            .get(farmer_id)
            .filter(|r| !r.metadata.is_deleted)
            .map(|r| r.value().clone()))
    }

    async fn insert(&self, mut record: GamificationDoc) -> Result<GamificationDoc> {
        match self.by_farmer.entry(record.farmer_id) {
            Entry::Occupied(_) => Err(FarmError::Conflict("Duplicate key".into())),
            Entry::Vacant(slot) => {
                record._id = Some(record._id.unwrap_or_else(ObjectId::new));
                record.metadata.stamp_created(DateTime::now());
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn save_versioned(&self, record: &GamificationDoc) -> Result<bool> {
        let Some(mut stored) = self.by_farmer.get_mut(&record.farmer_id) else {
            return Ok(false);
        };
        if stored.version != record.version {
            return Ok(false);
        }

        let mut next = record.clone();
        next.version += 1;
        next.metadata.stamp_replaced(stored.metadata.created_at);
        *stored = next;
        Ok(true)
    }

    async fn leaderboard(
        &self,
        sort: LeaderboardSort,
        limit: i64,
    ) -> Result<Vec<GamificationDoc>> {
        let mut all: Vec<GamificationDoc> = self
            .by_farmer
            .iter()
            .filter(|r| !r.metadata.is_deleted)
            .map(|r| r.value().clone())
            .collect();

        match sort {
            LeaderboardSort::Xp => all.sort_by_key(|r| Reverse(r.xp)),
            LeaderboardSort::Level => all.sort_by_key(|r| Reverse((r.level, r.xp))),
            LeaderboardSort::Badges => all.sort_by_key(|r| Reverse((r.badges.len(), r.xp))),
        }
        Ok(page(all, 0, limit))
    }
}

// =============================================================================
// Communications
// =============================================================================

#[derive(Default)]
pub struct MemoryCommunicationStore {
    docs: MemoryCollection<CommunicationDoc>,
}

#[async_trait]
impl CommunicationStore for MemoryCommunicationStore {
    async fn insert(&self, record: CommunicationDoc) -> Result<CommunicationDoc> {
        Ok(self.docs.insert(record))
    }

    async fn list_for_farmer(
        &self,
        farmer_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<CommunicationDoc>> {
        let all = self.docs.find(|c| c.farmer_id == *farmer_id);
        Ok(page(all, skip, limit))
    }

    async fn count_for_farmer(&self, farmer_id: &ObjectId) -> Result<u64> {
        Ok(self.docs.count(|c| c.farmer_id == *farmer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{
        AdvisoryKind, CostLevel, Difficulty, FarmDetails, Location, PracticeCategory, Preferences,
    };

    fn farmer(email: &str) -> FarmerDoc {
        FarmerDoc::new(
            "Ravi".into(),
            email.into(),
            "hash".into(),
            "+919812345678".into(),
            Location {
                country: "India".into(),
                state: "Punjab".into(),
                city: "Ludhiana".into(),
                coordinates: None,
            },
            FarmDetails::default(),
            Preferences::default(),
        )
    }

    #[tokio::test]
    async fn test_farmer_email_is_unique() {
        let store = MemoryFarmerStore::default();
        let first = store.insert(farmer("ravi@example.com")).await.unwrap();
        assert!(first._id.is_some());
        assert!(first.metadata.created_at.is_some());

        let err = store.insert(farmer("ravi@example.com")).await.unwrap_err();
        assert!(matches!(err, FarmError::Conflict(_)));

        let found = store.find_by_email("ravi@example.com").await.unwrap().unwrap();
        assert_eq!(found._id, first._id);
    }

    #[tokio::test]
    async fn test_advisories_are_owner_scoped_and_paged() {
        let store = MemoryAdvisoryStore::default();
        let owner = ObjectId::new();
        let other = ObjectId::new();

        let mut ids = Vec::new();
        for i in 0..3 {
            let stored = store
                .insert(AdvisoryDoc::processing(owner, AdvisoryKind::Text, format!("q{i}")))
                .await
                .unwrap();
            ids.push(stored._id.unwrap());
        }

        assert!(store.find_for_farmer(&ids[0], &other).await.unwrap().is_none());
        assert!(store.find_for_farmer(&ids[0], &owner).await.unwrap().is_some());

        let page = store.list_for_farmer(&owner, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(store.count_for_farmer(&owner).await.unwrap(), 3);
        assert_eq!(store.count_for_farmer(&other).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_soft_deleted_practice_is_hidden() {
        let store = MemoryPracticeStore::default();
        let practice = store
            .insert(PracticeDoc::new(
                "Mulching".into(),
                "Cover the soil".into(),
                PracticeCategory::SoilHealth,
                Difficulty::Beginner,
                CostLevel::Low,
            ))
            .await
            .unwrap();
        let id = practice._id.unwrap();

        assert!(store.delete(&id).await.unwrap());
        assert!(store.find_by_id(&id).await.unwrap().is_none());
        assert!(!store.delete(&id).await.unwrap());
        assert_eq!(store.count(&PracticeFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_adoption_counter_and_facets() {
        let store = MemoryPracticeStore::default();
        let mulch = store
            .insert(PracticeDoc::new(
                "Mulching".into(),
                "Cover the soil".into(),
                PracticeCategory::SoilHealth,
                Difficulty::Beginner,
                CostLevel::Low,
            ))
            .await
            .unwrap();
        let mut retired = PracticeDoc::new(
            "Flood irrigation".into(),
            "Retired entry".into(),
            PracticeCategory::WaterManagement,
            Difficulty::Advanced,
            CostLevel::High,
        );
        retired.is_active = false;
        let retired = store.insert(retired).await.unwrap();

        let id = mulch._id.unwrap();
        store.record_adoption(&id).await.unwrap();
        let adopted = store.record_adoption(&id).await.unwrap().unwrap();
        assert_eq!(adopted.adoption_stats.total_adoptions, 2);
        assert!(store
            .record_adoption(&retired._id.unwrap())
            .await
            .unwrap()
            .is_none());

        let facets = store.facets().await.unwrap();
        assert_eq!(facets.categories, vec!["soil_health"]);
        assert_eq!(facets.difficulties, vec!["beginner"]);
        assert_eq!(facets.costs, vec!["low"]);
    }

    #[tokio::test]
    async fn test_versioned_save_rejects_stale_writes() {
        let store = MemoryGamificationStore::default();
        let farmer_id = ObjectId::new();
        let record = store.insert(GamificationDoc::new(farmer_id)).await.unwrap();

        let mut first = record.clone();
        first.xp = 10;
        assert!(store.save_versioned(&first).await.unwrap());

        let mut stale = record;
        stale.xp = 99;
        assert!(!store.save_versioned(&stale).await.unwrap());

        let stored = store.find_by_farmer(&farmer_id).await.unwrap().unwrap();
        assert_eq!(stored.xp, 10);
        assert_eq!(stored.version, 1);

        let dup = store.insert(GamificationDoc::new(farmer_id)).await;
        assert!(matches!(dup, Err(FarmError::Conflict(_))));
    }
}
