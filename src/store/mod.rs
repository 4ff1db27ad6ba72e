//! Persistence seam
//!
//! Handlers talk to the store traits below, never to a driver. Two
//! implementations exist: MongoDB for production and an in-memory map set
//! for dev mode and tests. Both hide soft-deleted documents.

pub mod memory;
pub mod mongo;

use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

use crate::db::escape_regex;
use crate::db::schemas::{
    AdvisoryDoc, CommunicationDoc, CostLevel, Difficulty, FarmerDoc, GamificationDoc,
    PracticeCategory, PracticeDoc,
};
use crate::db::MongoClient;
use crate::types::Result;

// =============================================================================
// Query shapes
// =============================================================================

/// Catalog filter; only active practices are ever listed
#[derive(Debug, Clone, Default)]
pub struct PracticeFilter {
    pub category: Option<PracticeCategory>,
    pub difficulty: Option<Difficulty>,
    pub cost: Option<CostLevel>,
    /// Case-insensitive substring of any applicable crop
    pub crop: Option<String>,
    /// Case-insensitive substring of any applicable region's country
    pub country: Option<String>,
    /// Free text; any word may match
    pub search: Option<String>,
    pub featured_only: bool,
}

impl PracticeFilter {
    pub fn featured() -> Self {
        Self {
            featured_only: true,
            ..Self::default()
        }
    }

    /// In-process evaluation, mirrors `to_document`
    pub fn matches(&self, practice: &PracticeDoc) -> bool {
        if !practice.is_active {
            return false;
        }
        if self.featured_only && !practice.is_featured {
            return false;
        }
        if self.category.is_some_and(|c| c != practice.category) {
            return false;
        }
        if self.difficulty.is_some_and(|d| d != practice.difficulty) {
            return false;
        }
        if self.cost.is_some_and(|c| c != practice.cost) {
            return false;
        }
        if let Some(crop) = &self.crop {
            if !practice
                .applicable_crops
                .iter()
                .any(|c| contains_ci(c, crop))
            {
                return false;
            }
        }
        if let Some(country) = &self.country {
            if !practice
                .applicable_regions
                .iter()
                .any(|r| contains_ci(&r.country, country))
            {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let mut haystack = vec![practice.title.as_str(), practice.description.as_str()];
            if let Some(detail) = &practice.detailed_description {
                haystack.push(detail.as_str());
            }
            haystack.extend(practice.tags.iter().map(String::as_str));

            let hit = search
                .split_whitespace()
                .any(|word| haystack.iter().any(|h| contains_ci(h, word)));
            if !hit {
                return false;
            }
        }
        true
    }

    /// MongoDB filter document
    pub fn to_document(&self) -> Document {
        let mut filter = doc! { "is_active": true };

        if self.featured_only {
            filter.insert("is_featured", true);
        }
        if let Some(category) = self.category {
            filter.insert("category", category.as_str());
        }
        if let Some(difficulty) = self.difficulty {
            filter.insert("difficulty", difficulty.as_str());
        }
        if let Some(cost) = self.cost {
            filter.insert("cost", cost.as_str());
        }
        if let Some(crop) = &self.crop {
            filter.insert("applicable_crops", regex_ci(crop));
        }
        if let Some(country) = &self.country {
            filter.insert("applicable_regions.country", regex_ci(country));
        }
        if let Some(search) = &self.search {
            filter.insert("$text", doc! { "$search": search.as_str() });
        }

        filter
    }
}

/// Catalog ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PracticeSort {
    #[default]
    Newest,
    Rating,
    Adoptions,
}

impl PracticeSort {
    /// Unknown values keep the default ordering
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("rating") => Self::Rating,
            Some("adoptions") => Self::Adoptions,
            _ => Self::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Rating => "rating",
            Self::Adoptions => "adoptions",
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            Self::Newest => doc! { "metadata.created_at": -1, "_id": -1 },
            Self::Rating => doc! { "adoption_stats.averageRating": -1, "_id": -1 },
            Self::Adoptions => doc! { "adoption_stats.totalAdoptions": -1, "_id": -1 },
        }
    }
}

/// Leaderboard ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderboardSort {
    #[default]
    Xp,
    Level,
    Badges,
}

impl LeaderboardSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("level") => Self::Level,
            Some("badges") => Self::Badges,
            _ => Self::Xp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xp => "xp",
            Self::Level => "level",
            Self::Badges => "badges",
        }
    }
}

/// Recipient selection for broadcasts and head counts
#[derive(Debug, Clone, Default)]
pub struct FarmerFilter {
    pub ids: Option<Vec<ObjectId>>,
    pub country: Option<String>,
    pub state: Option<String>,
    /// Exact member of `farmDetails.crops`
    pub crop: Option<String>,
    pub active_only: bool,
}

impl FarmerFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, farmer: &FarmerDoc) -> bool {
        if self.active_only && !farmer.is_active {
            return false;
        }
        if let Some(ids) = &self.ids {
            if !farmer._id.is_some_and(|id| ids.contains(&id)) {
                return false;
            }
        }
        if self
            .country
            .as_ref()
            .is_some_and(|c| *c != farmer.location.country)
        {
            return false;
        }
        if self
            .state
            .as_ref()
            .is_some_and(|s| *s != farmer.location.state)
        {
            return false;
        }
        if let Some(crop) = &self.crop {
            if !farmer.farm_details.crops.contains(crop) {
                return false;
            }
        }
        true
    }

    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();

        if self.active_only {
            filter.insert("is_active", true);
        }
        if let Some(ids) = &self.ids {
            filter.insert("_id", doc! { "$in": ids.clone() });
        }
        if let Some(country) = &self.country {
            filter.insert("location.country", country.as_str());
        }
        if let Some(state) = &self.state {
            filter.insert("location.state", state.as_str());
        }
        if let Some(crop) = &self.crop {
            filter.insert("farm_details.crops", crop.as_str());
        }

        filter
    }
}

/// Per-category catalog summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub count: i64,
    #[serde(default)]
    pub average_rating: f64,
}

/// Distinct values present among active practices, for filter pickers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeFacets {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub difficulties: Vec<String>,
    #[serde(default)]
    pub costs: Vec<String>,
}

impl PracticeFacets {
    /// Sorted, deduplicated
    pub fn normalized(mut self) -> Self {
        for values in [&mut self.categories, &mut self.difficulties, &mut self.costs] {
            values.sort();
            values.dedup();
        }
        self
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn regex_ci(pattern: &str) -> Document {
    doc! { "$regex": escape_regex(pattern), "$options": "i" }
}

// =============================================================================
// Store traits
// =============================================================================

#[async_trait]
pub trait FarmerStore: Send + Sync {
    /// Insert a new farmer; a taken email is `Conflict`
    async fn insert(&self, farmer: FarmerDoc) -> Result<FarmerDoc>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<FarmerDoc>>;
    /// Lookup by normalized (trimmed, lowercased) email
    async fn find_by_email(&self, email: &str) -> Result<Option<FarmerDoc>>;
    async fn save(&self, farmer: &FarmerDoc) -> Result<()>;
    async fn count(&self, filter: &FarmerFilter) -> Result<u64>;
    async fn find_matching(&self, filter: &FarmerFilter) -> Result<Vec<FarmerDoc>>;
}

#[async_trait]
pub trait AdvisoryStore: Send + Sync {
    async fn insert(&self, advisory: AdvisoryDoc) -> Result<AdvisoryDoc>;
    async fn save(&self, advisory: &AdvisoryDoc) -> Result<()>;
    /// Owner-scoped lookup
    async fn find_for_farmer(
        &self,
        id: &ObjectId,
        farmer_id: &ObjectId,
    ) -> Result<Option<AdvisoryDoc>>;
    /// Newest first
    async fn list_for_farmer(
        &self,
        farmer_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<AdvisoryDoc>>;
    async fn count_for_farmer(&self, farmer_id: &ObjectId) -> Result<u64>;
}

#[async_trait]
pub trait PracticeStore: Send + Sync {
    async fn insert(&self, practice: PracticeDoc) -> Result<PracticeDoc>;
    /// Live lookup regardless of `is_active`
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<PracticeDoc>>;
    async fn save(&self, practice: &PracticeDoc) -> Result<()>;
    /// Soft delete; false when nothing matched
    async fn delete(&self, id: &ObjectId) -> Result<bool>;
    /// Bump `totalAdoptions` of an active practice in place, returning the
    /// updated document
    async fn record_adoption(&self, id: &ObjectId) -> Result<Option<PracticeDoc>>;
    async fn search(
        &self,
        filter: &PracticeFilter,
        sort: PracticeSort,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<PracticeDoc>>;
    async fn count(&self, filter: &PracticeFilter) -> Result<u64>;
    /// Active practices grouped by category, largest group first
    async fn category_summary(&self) -> Result<Vec<CategorySummary>>;
    async fn facets(&self) -> Result<PracticeFacets>;
    /// Active practices whose title, tags or crops contain `query`
    async fn suggest(&self, query: &str, limit: i64) -> Result<Vec<PracticeDoc>>;
    /// Newest first
    async fn list_by_owner(&self, owner: &ObjectId) -> Result<Vec<PracticeDoc>>;
}

#[async_trait]
pub trait GamificationStore: Send + Sync {
    async fn find_by_farmer(&self, farmer_id: &ObjectId) -> Result<Option<GamificationDoc>>;
    /// One record per farmer; a second insert is `Conflict`
    async fn insert(&self, record: GamificationDoc) -> Result<GamificationDoc>;
    /// Store `record` only if the stored version still equals `record.version`.
    /// The stored copy gets `version + 1`. Returns false on a lost race.
    async fn save_versioned(&self, record: &GamificationDoc) -> Result<bool>;
    async fn leaderboard(&self, sort: LeaderboardSort, limit: i64)
        -> Result<Vec<GamificationDoc>>;
}

#[async_trait]
pub trait CommunicationStore: Send + Sync {
    async fn insert(&self, record: CommunicationDoc) -> Result<CommunicationDoc>;
    /// Newest first
    async fn list_for_farmer(
        &self,
        farmer_id: &ObjectId,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<CommunicationDoc>>;
    async fn count_for_farmer(&self, farmer_id: &ObjectId) -> Result<u64>;
}

// =============================================================================
// Store bundle
// =============================================================================

/// Handles for every collection, shared by all requests
#[derive(Clone)]
pub struct Stores {
    pub farmers: Arc<dyn FarmerStore>,
    pub advisories: Arc<dyn AdvisoryStore>,
    pub practices: Arc<dyn PracticeStore>,
    pub gamification: Arc<dyn GamificationStore>,
    pub communications: Arc<dyn CommunicationStore>,
    backend: &'static str,
}

impl Stores {
    /// Process-local stores; contents vanish on exit
    pub fn memory() -> Self {
        Self {
            farmers: Arc::new(memory::MemoryFarmerStore::default()),
            advisories: Arc::new(memory::MemoryAdvisoryStore::default()),
            practices: Arc::new(memory::MemoryPracticeStore::default()),
            gamification: Arc::new(memory::MemoryGamificationStore::default()),
            communications: Arc::new(memory::MemoryCommunicationStore::default()),
            backend: "memory",
        }
    }

    /// Open every collection (applying indexes) on a connected client
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            farmers: Arc::new(mongo::MongoFarmerStore::open(client).await?),
            advisories: Arc::new(mongo::MongoAdvisoryStore::open(client).await?),
            practices: Arc::new(mongo::MongoPracticeStore::open(client).await?),
            gamification: Arc::new(mongo::MongoGamificationStore::open(client).await?),
            communications: Arc::new(mongo::MongoCommunicationStore::open(client).await?),
            backend: "mongodb",
        })
    }

    /// `mongodb` or `memory`
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}
