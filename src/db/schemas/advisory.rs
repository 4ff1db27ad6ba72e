//! Advisory document schema
//!
//! One record per farmer question. Created in `processing`, settled once by
//! the responder, afterwards only feedback changes.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{Identified, IntoIndexes, MutMetadata};
use crate::db::schemas::{Location, Metadata};
use crate::types::enums::string_enum;

/// Collection name for advisories
pub const ADVISORY_COLLECTION: &str = "advisories";

/// Model label recorded on successful responses
pub const DEFAULT_AI_MODEL: &str = "huggingface-transformers";

string_enum! {
    pub enum AdvisoryKind {
        Text => "text",
        Image => "image",
        General => "general",
    }
}

string_enum! {
    pub enum AdvisoryStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

string_enum! {
    pub enum Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

string_enum! {
    pub enum AdvisoryCategory {
        DiseaseDetection => "disease_detection",
        PestIdentification => "pest_identification",
        NutrientDeficiency => "nutrient_deficiency",
        SoilAnalysis => "soil_analysis",
        CropManagement => "crop_management",
        WeatherAdvice => "weather_advice",
        GeneralQuestion => "general_question",
    }
}

/// Stored upload attached to an image advisory
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryImage {
    pub filename: String,
    pub original_name: String,
    /// Server-side path; never returned to clients
    pub path: String,
    pub size: i64,
    pub mime_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryResponse {
    pub text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub related_practices: Vec<String>,
    #[serde(default = "default_ai_model")]
    pub ai_model: String,
}

fn default_confidence() -> f64 {
    0.8
}

fn default_ai_model() -> String {
    DEFAULT_AI_MODEL.to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CropInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planting_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub rating: i32,
    pub helpful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Advisory document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AdvisoryDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub farmer_id: ObjectId,

    #[serde(rename = "type")]
    pub kind: AdvisoryKind,

    #[serde(default)]
    pub query: String,

    #[serde(default)]
    pub images: Vec<AdvisoryImage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdvisoryResponse>,

    pub status: AdvisoryStatus,

    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<AdvisoryCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_info: Option<CropInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,

    /// Milliseconds spent producing the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<i64>,
}

impl AdvisoryDoc {
    /// A fresh advisory, already marked as being processed
    pub fn processing(farmer_id: ObjectId, kind: AdvisoryKind, query: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            farmer_id,
            kind,
            query,
            images: Vec::new(),
            response: None,
            status: AdvisoryStatus::Processing,
            priority: Priority::Medium,
            category: None,
            location: None,
            crop_info: None,
            feedback: None,
            processing_time: None,
        }
    }
}

impl IntoIndexes for AdvisoryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "farmer_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("farmer_recent".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("status_recent".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "category": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("category_recent".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "query": "text", "response.text": "text" },
                Some(
                    IndexOptions::builder()
                        .name("advisory_text".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AdvisoryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Identified for AdvisoryDoc {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_defaults() {
        let response: AdvisoryResponse = serde_json::from_str(r#"{"text": "ok"}"#).unwrap();
        assert_eq!(response.confidence, 0.8);
        assert_eq!(response.ai_model, DEFAULT_AI_MODEL);
    }

    #[test]
    fn test_kind_stored_as_type() {
        let advisory = AdvisoryDoc::processing(ObjectId::new(), AdvisoryKind::Text, "q".into());
        let stored = bson::to_document(&advisory).unwrap();
        assert_eq!(stored.get_str("type").unwrap(), "text");
        assert_eq!(stored.get_str("status").unwrap(), "processing");
        assert_eq!(stored.get_str("priority").unwrap(), "medium");
    }
}
