//! Practice document schema
//!
//! Catalog entry for a sustainable technique. Adoption and rating counters
//! live on the document and are updated in place.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{Identified, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::enums::string_enum;

/// Collection name for practices
pub const PRACTICE_COLLECTION: &str = "practices";

string_enum! {
    pub enum PracticeCategory {
        SoilHealth => "soil_health",
        WaterManagement => "water_management",
        CropRotation => "crop_rotation",
        PestManagement => "pest_management",
        OrganicFarming => "organic_farming",
        EnergyEfficiency => "energy_efficiency",
        WasteManagement => "waste_management",
        Biodiversity => "biodiversity",
        ClimateAdaptation => "climate_adaptation",
    }
}

string_enum! {
    pub enum Difficulty {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
    }
}

string_enum! {
    pub enum CostLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

string_enum! {
    pub enum ResourceKind {
        Article => "article",
        Video => "video",
        Document => "document",
        Website => "website",
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeStep {
    pub step_number: i32,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PracticeVideo {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PracticeResource {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Region {
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climate: Option<String>,
}

/// Impact scores, each 0..=100
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalImpact {
    #[serde(default)]
    pub carbon_reduction: i32,
    #[serde(default)]
    pub water_conservation: i32,
    #[serde(default)]
    pub soil_health: i32,
    #[serde(default)]
    pub biodiversity: i32,
}

impl EnvironmentalImpact {
    /// Mean of the four scores
    pub fn mean(&self) -> f64 {
        f64::from(
            self.carbon_reduction + self.water_conservation + self.soil_health + self.biodiversity,
        ) / 4.0
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionStats {
    #[serde(default)]
    pub total_adoptions: i64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub total_ratings: i64,
}

impl AdoptionStats {
    /// Fold one rating into the running average
    pub fn record_rating(&mut self, rating: i32) {
        let total = self.average_rating * self.total_ratings as f64;
        self.total_ratings += 1;
        self.average_rating = (total + f64::from(rating)) / self.total_ratings as f64;
    }
}

/// Owner-maintained implementation progress
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    pub is_implemented: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub notes: String,
}

/// Practice document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PracticeDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
    pub category: PracticeCategory,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    pub cost: CostLevel,

    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub steps: Vec<PracticeStep>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<PracticeVideo>,
    #[serde(default)]
    pub resources: Vec<PracticeResource>,

    /// Lowercased on write
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub applicable_crops: Vec<String>,
    #[serde(default)]
    pub applicable_regions: Vec<Region>,

    #[serde(default)]
    pub environmental_impact: EnvironmentalImpact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic_benefit: Option<i32>,
    #[serde(default)]
    pub adoption_stats: AdoptionStats,

    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Implementation>,
}

fn default_true() -> bool {
    true
}

impl PracticeDoc {
    /// Minimal active practice; callers fill the optional sections
    pub fn new(
        title: String,
        description: String,
        category: PracticeCategory,
        difficulty: Difficulty,
        cost: CostLevel,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            title,
            description,
            detailed_description: None,
            category,
            difficulty,
            estimated_time: None,
            cost,
            benefits: Vec::new(),
            requirements: Vec::new(),
            steps: Vec::new(),
            images: Vec::new(),
            videos: Vec::new(),
            resources: Vec::new(),
            tags: Vec::new(),
            applicable_crops: Vec::new(),
            applicable_regions: Vec::new(),
            environmental_impact: EnvironmentalImpact::default(),
            economic_benefit: None,
            adoption_stats: AdoptionStats::default(),
            is_active: true,
            is_featured: false,
            created_by: None,
            implementation: None,
        }
    }

    pub fn is_implemented(&self) -> bool {
        self.implementation
            .as_ref()
            .is_some_and(|i| i.is_implemented)
    }

    pub fn is_owned_by(&self, farmer_id: &ObjectId) -> bool {
        self.created_by.as_ref() == Some(farmer_id)
    }
}

impl IntoIndexes for PracticeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! {
                    "title": "text",
                    "description": "text",
                    "detailed_description": "text",
                    "tags": "text",
                },
                Some(
                    IndexOptions::builder()
                        .name("practice_text".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "is_active": 1, "category": 1 },
                Some(
                    IndexOptions::builder()
                        .name("active_category".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "created_by": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_recent".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PracticeDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Identified for PracticeDoc {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
