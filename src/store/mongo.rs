//! MongoDB-backed stores
//!
//! Each store opens its typed collection once at startup, which also applies
//! the schema's indexes.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;

use super::{
    AdvisoryStore, CategorySummary, CommunicationStore, FarmerFilter, FarmerStore,
    GamificationStore, LeaderboardSort, PracticeFacets, PracticeFilter, PracticeSort,
    PracticeStore,
};
use crate::db::escape_regex;
use crate::db::schemas::{
    AdvisoryDoc, CommunicationDoc, FarmerDoc, GamificationDoc, PracticeDoc,
    ADVISORY_COLLECTION, COMMUNICATION_COLLECTION, FARMER_COLLECTION, GAMIFICATION_COLLECTION,
    PRACTICE_COLLECTION,
};
use crate::db::{Identified, MongoClient, MongoCollection};
use crate::types::{FarmError, Result};

fn newest_first(skip: u64, limit: i64) -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "metadata.created_at": -1, "_id": -1 })
        .skip(skip)
        .limit(limit)
        .build()
}

fn require_id<T: Identified>(item: &T) -> Result<ObjectId> {
    item.id()
        .ok_or_else(|| FarmError::Internal("document has no _id".into()))
}

// =============================================================================
// Farmers
// =============================================================================

pub struct MongoFarmerStore {
    collection: MongoCollection<FarmerDoc>,
}

impl MongoFarmerStore {
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(FARMER_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl FarmerStore for MongoFarmerStore {
    async fn insert(&self, mut farmer: FarmerDoc) -> Result<FarmerDoc> {
        let id = self.collection.insert_one(farmer.clone()).await?;
        farmer.set_id(id);
        Ok(farmer)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<FarmerDoc>> {
        self.collection.find_one(doc! { "_id": id }).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<FarmerDoc>> {
        self.collection.find_one(doc! { "email": email }).await
    }

    async fn save(&self, farmer: &FarmerDoc) -> Result<()> {
        let id = require_id(farmer)?;
        if !self
            .collection
            .replace_one(doc! { "_id": id }, farmer.clone())
            .await?
        {
            return Err(FarmError::NotFound("Farmer not found".into()));
        }
        Ok(())
    }

    async fn count(&self, filter: &FarmerFilter) -> Result<u64> {
        self.collection.count(filter.to_document()).await
    }

    async fn find_matching(&self, filter: &FarmerFilter) -> Result<Vec<FarmerDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": -1 })
            .build();
        self.collection
            .find_many(filter.to_document(), Some(options))
            .await
    }
}

// =============================================================================
// Advisories
// =============================================================================

pub struct MongoAdvisoryStore {
    collection: MongoCollection<AdvisoryDoc>,
}

impl MongoAdvisoryStore {
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(ADVISORY_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl AdvisoryStore for MongoAdvisoryStore {
    async fn insert(&self, mut advisory: AdvisoryDoc) -> Result<AdvisoryDoc> {
        let id = self.collection.insert_one(advisory.clone()).await?;
        advisory.set_id(id);
        Ok(advisory)
    }

    async fn save(&self, advisory: &AdvisoryDoc) -> Result<()> {
        let id = require_id(advisory)?;
        if !self
            .collection
            .replace_one(doc! { "_id": id }, advisory.clone())
            .await?
        {
            return Err(FarmError::NotFound("Advisory not found".into()));
        }
        Ok(())
    }

    async fn find_for_farmer(
        &self,
        id: &ObjectId,
        farmer_id: &ObjectId,
    ) -> Result<Option<AdvisoryDoc>> {
        self.collection
            .find_one(doc! { "_id": id, "farmer_id": farmer_id })
            .await
    }

    async fn list_for_farmer(
        &self,
        farmer_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<AdvisoryDoc>> {
        self.collection
            .find_many(
                doc! { "farmer_id": farmer_id },
                Some(newest_first(skip, limit)),
            )
            .await
    }

    async fn count_for_farmer(&self, farmer_id: &ObjectId) -> Result<u64> {
        self.collection
            .count(doc! { "farmer_id": farmer_id })
            .await
    }
}

// =============================================================================
// Practices
// =============================================================================

pub struct MongoPracticeStore {
    collection: MongoCollection<PracticeDoc>,
}

impl MongoPracticeStore {
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(PRACTICE_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl PracticeStore for MongoPracticeStore {
    async fn insert(&self, mut practice: PracticeDoc) -> Result<PracticeDoc> {
        let id = self.collection.insert_one(practice.clone()).await?;
        practice.set_id(id);
        Ok(practice)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<PracticeDoc>> {
        self.collection.find_one(doc! { "_id": id }).await
    }

    async fn save(&self, practice: &PracticeDoc) -> Result<()> {
        let id = require_id(practice)?;
        if !self
            .collection
            .replace_one(doc! { "_id": id }, practice.clone())
            .await?
        {
            return Err(FarmError::NotFound("Practice not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool> {
        let result = self.collection.soft_delete(doc! { "_id": id }).await?;
        Ok(result.modified_count > 0)
    }

    async fn record_adoption(&self, id: &ObjectId) -> Result<Option<PracticeDoc>> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "is_active": true },
                doc! {
                    "$inc": { "adoption_stats.totalAdoptions": 1 },
                    "$currentDate": { "metadata.updated_at": true },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Ok(None);
        }
        self.collection.find_one(doc! { "_id": id }).await
    }

    async fn search(
        &self,
        filter: &PracticeFilter,
        sort: PracticeSort,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<PracticeDoc>> {
        let options = FindOptions::builder()
            .sort(sort.to_document())
            .skip(skip)
            .limit(limit)
            .build();
        self.collection
            .find_many(filter.to_document(), Some(options))
            .await
    }

    async fn count(&self, filter: &PracticeFilter) -> Result<u64> {
        self.collection.count(filter.to_document()).await
    }

    async fn category_summary(&self) -> Result<Vec<CategorySummary>> {
        self.collection
            .aggregate(vec![
                doc! { "$match": { "is_active": true } },
                doc! { "$group": {
                    "_id": "$category",
                    "count": { "$sum": 1 },
                    "averageRating": { "$avg": "$adoption_stats.averageRating" },
                } },
                doc! { "$sort": { "count": -1, "_id": 1 } },
            ])
            .await
    }

    async fn facets(&self) -> Result<PracticeFacets> {
        let groups: Vec<PracticeFacets> = self
            .collection
            .aggregate(vec![
                doc! { "$match": { "is_active": true } },
                doc! { "$group": {
                    "_id": null,
                    "categories": { "$addToSet": "$category" },
                    "difficulties": { "$addToSet": "$difficulty" },
                    "costs": { "$addToSet": "$cost" },
                } },
            ])
            .await?;
        Ok(groups.into_iter().next().unwrap_or_default().normalized())
    }

    async fn suggest(&self, query: &str, limit: i64) -> Result<Vec<PracticeDoc>> {
        let pattern = doc! { "$regex": escape_regex(query), "$options": "i" };
        let filter = doc! {
            "is_active": true,
            "$or": [
                { "title": pattern.clone() },
                { "tags": pattern.clone() },
                { "applicable_crops": pattern },
            ],
        };
        let options = FindOptions::builder().limit(limit).build();
        self.collection.find_many(filter, Some(options)).await
    }

    async fn list_by_owner(&self, owner: &ObjectId) -> Result<Vec<PracticeDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": -1, "_id": -1 })
            .build();
        self.collection
            .find_many(doc! { "created_by": owner }, Some(options))
            .await
    }
}

// =============================================================================
// Gamification
// =============================================================================

pub struct MongoGamificationStore {
    collection: MongoCollection<GamificationDoc>,
}

impl MongoGamificationStore {
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(GAMIFICATION_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl GamificationStore for MongoGamificationStore {
    async fn find_by_farmer(&self, farmer_id: &ObjectId) -> Result<Option<GamificationDoc>> {
        self.collection
            .find_one(doc! { "farmer_id": farmer_id })
            .await
    }

    async fn insert(&self, mut record: GamificationDoc) -> Result<GamificationDoc> {
        let id = self.collection.insert_one(record.clone()).await?;
        record.set_id(id);
        Ok(record)
    }

    async fn save_versioned(&self, record: &GamificationDoc) -> Result<bool> {
        let id = require_id(record)?;
        let mut next = record.clone();
        next.version = record.version + 1;

        self.collection
            .replace_one(doc! { "_id": id, "version": record.version }, next)
            .await
    }

    async fn leaderboard(
        &self,
        sort: LeaderboardSort,
        limit: i64,
    ) -> Result<Vec<GamificationDoc>> {
        let mut pipeline = match sort {
            LeaderboardSort::Xp => vec![doc! { "$sort": { "xp": -1, "_id": 1 } }],
            LeaderboardSort::Level => {
                vec![doc! { "$sort": { "level": -1, "xp": -1, "_id": 1 } }]
            }
            LeaderboardSort::Badges => vec![
                doc! { "$addFields": { "badge_count": { "$size": "$badges" } } },
                doc! { "$sort": { "badge_count": -1, "xp": -1, "_id": 1 } },
            ],
        };
        pipeline.push(doc! { "$limit": limit });
        self.collection.aggregate(pipeline).await
    }
}

// =============================================================================
// Communications
// =============================================================================

pub struct MongoCommunicationStore {
    collection: MongoCollection<CommunicationDoc>,
}

impl MongoCommunicationStore {
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: client.collection(COMMUNICATION_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl CommunicationStore for MongoCommunicationStore {
    async fn insert(&self, mut record: CommunicationDoc) -> Result<CommunicationDoc> {
        let id = self.collection.insert_one(record.clone()).await?;
        record.set_id(id);
        Ok(record)
    }

    async fn list_for_farmer(
        &self,
        farmer_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<CommunicationDoc>> {
        self.collection
            .find_many(
                doc! { "farmer_id": farmer_id },
                Some(newest_first(skip, limit)),
            )
            .await
    }

    async fn count_for_farmer(&self, farmer_id: &ObjectId) -> Result<u64> {
        self.collection
            .count(doc! { "farmer_id": farmer_id })
            .await
    }
}
