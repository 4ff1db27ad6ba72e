//! Client-facing shapes of stored documents
//!
//! Documents keep snake_case top-level fields in the database; responses are
//! camelCase with hex ids. Views borrow from the document they render and
//! leave out anything a client must never see (password hashes, upload
//! paths).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::schemas::{
    AdoptionStats, AdvisoryCategory, AdvisoryDoc, AdvisoryImage, AdvisoryKind, AdvisoryResponse,
    AdvisoryStatus, Channel, CommunicationDoc, CostLevel, CropInfo, DeliveryStatus, Difficulty,
    EnvironmentalImpact, FarmDetails, FarmerDoc, Feedback, Implementation, Location,
    PracticeCategory, PracticeDoc, PracticeResource, PracticeStep, PracticeVideo, Preferences,
    Priority, Region,
};

use super::common::hex_id;

/// Public path of a stored advisory image
pub fn advisory_image_url(filename: &str) -> String {
    format!("/uploads/advisory/{}", filename)
}

// =============================================================================
// Farmer
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerView<'a> {
    pub id: String,
    pub name: &'a str,
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    pub location: &'a Location,
    pub farm_details: &'a FarmDetails,
    pub preferences: &'a Preferences,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl<'a> FarmerView<'a> {
    /// What register and login hand back
    pub fn summary(farmer: &'a FarmerDoc) -> Self {
        Self {
            id: farmer.id_hex(),
            name: &farmer.name,
            email: &farmer.email,
            phone: None,
            location: &farmer.location,
            farm_details: &farmer.farm_details,
            preferences: &farmer.preferences,
            last_login: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Summary plus contact details and timestamps
    pub fn full(farmer: &'a FarmerDoc) -> Self {
        Self {
            phone: Some(&farmer.phone),
            last_login: farmer.last_login.map(|d| d.to_chrono()),
            created_at: farmer.metadata.created(),
            updated_at: farmer.metadata.updated(),
            ..Self::summary(farmer)
        }
    }
}

// =============================================================================
// Advisory
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView<'a> {
    pub filename: &'a str,
    pub original_name: &'a str,
    pub size: i64,
    pub mime_type: &'a str,
    pub url: String,
}

impl<'a> From<&'a AdvisoryImage> for ImageView<'a> {
    fn from(image: &'a AdvisoryImage) -> Self {
        Self {
            filename: &image.filename,
            original_name: &image.original_name,
            size: image.size,
            mime_type: &image.mime_type,
            url: advisory_image_url(&image.filename),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryView<'a> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AdvisoryKind,
    pub query: &'a str,
    pub images: Vec<ImageView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<&'a AdvisoryResponse>,
    pub status: AdvisoryStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<AdvisoryCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<&'a Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_info: Option<&'a CropInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<&'a Feedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a AdvisoryDoc> for AdvisoryView<'a> {
    fn from(advisory: &'a AdvisoryDoc) -> Self {
        Self {
            id: hex_id(advisory._id),
            kind: advisory.kind,
            query: &advisory.query,
            images: advisory.images.iter().map(ImageView::from).collect(),
            response: advisory.response.as_ref(),
            status: advisory.status,
            priority: advisory.priority,
            category: advisory.category,
            location: advisory.location.as_ref(),
            crop_info: advisory.crop_info.as_ref(),
            feedback: advisory.feedback.as_ref(),
            processing_time: advisory.processing_time,
            created_at: advisory.metadata.created(),
            updated_at: advisory.metadata.updated(),
        }
    }
}

// =============================================================================
// Practice
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeView<'a> {
    pub id: String,
    pub title: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<&'a str>,
    pub category: PracticeCategory,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<&'a str>,
    pub cost: CostLevel,
    pub benefits: &'a [String],
    pub requirements: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<&'a [PracticeStep]>,
    pub images: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos: Option<&'a [PracticeVideo]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<&'a [PracticeResource]>,
    pub tags: &'a [String],
    pub applicable_crops: &'a [String],
    pub applicable_regions: &'a [Region],
    pub environmental_impact: &'a EnvironmentalImpact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economic_benefit: Option<i32>,
    pub adoption_stats: &'a AdoptionStats,
    pub is_active: bool,
    pub is_featured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<&'a Implementation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl<'a> PracticeView<'a> {
    pub fn full(practice: &'a PracticeDoc) -> Self {
        Self {
            id: hex_id(practice._id),
            title: &practice.title,
            description: &practice.description,
            detailed_description: practice.detailed_description.as_deref(),
            category: practice.category,
            difficulty: practice.difficulty,
            estimated_time: practice.estimated_time.as_deref(),
            cost: practice.cost,
            benefits: &practice.benefits,
            requirements: &practice.requirements,
            steps: Some(&practice.steps),
            images: &practice.images,
            videos: Some(&practice.videos),
            resources: Some(&practice.resources),
            tags: &practice.tags,
            applicable_crops: &practice.applicable_crops,
            applicable_regions: &practice.applicable_regions,
            environmental_impact: &practice.environmental_impact,
            economic_benefit: practice.economic_benefit,
            adoption_stats: &practice.adoption_stats,
            is_active: practice.is_active,
            is_featured: practice.is_featured,
            created_by: practice.created_by.map(|id| id.to_hex()),
            implementation: practice.implementation.as_ref(),
            created_at: practice.metadata.created(),
            updated_at: practice.metadata.updated(),
        }
    }

    /// Catalog listing entry; the long-form sections are left out
    pub fn summary(practice: &'a PracticeDoc) -> Self {
        Self {
            detailed_description: None,
            steps: None,
            videos: None,
            resources: None,
            ..Self::full(practice)
        }
    }
}

// =============================================================================
// Communication
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationView<'a> {
    pub id: String,
    #[serde(rename = "type")]
    pub channel: Channel,
    pub to: &'a str,
    pub from: &'a str,
    pub message: &'a str,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a CommunicationDoc> for CommunicationView<'a> {
    fn from(record: &'a CommunicationDoc) -> Self {
        Self {
            id: hex_id(record._id),
            channel: record.channel,
            to: &record.to,
            from: &record.from,
            message: &record.body,
            status: record.status,
            sid: record.provider_sid.as_deref(),
            error: record.error.as_deref(),
            broadcast_id: record.broadcast_id.as_deref(),
            created_at: record.metadata.created(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Metadata;
    use bson::oid::ObjectId;

    #[test]
    fn test_farmer_view_never_carries_the_hash() {
        let mut farmer = FarmerDoc::new(
            "Asha".into(),
            "asha@example.com".into(),
            "$argon2id$v=19$secret".into(),
            "+919876543210".into(),
            Location::default(),
            FarmDetails::default(),
            Preferences::default(),
        );
        farmer._id = Some(ObjectId::new());

        let json = serde_json::to_string(&FarmerView::full(&farmer)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(json.contains("\"farmDetails\""));
        assert!(json.contains("\"phone\""));

        let summary = serde_json::to_value(FarmerView::summary(&farmer)).unwrap();
        assert!(summary.get("phone").is_none());
        assert_eq!(summary["id"], farmer.id_hex());
    }

    #[test]
    fn test_advisory_view_hides_upload_path() {
        let mut advisory =
            AdvisoryDoc::processing(ObjectId::new(), AdvisoryKind::Image, "spots".into());
        advisory.metadata = Metadata::new();
        advisory.images.push(AdvisoryImage {
            filename: "image-1-2.png".into(),
            original_name: "leaf.png".into(),
            path: "/srv/uploads/advisory/image-1-2.png".into(),
            size: 10,
            mime_type: "image/png".into(),
        });

        let json = serde_json::to_value(AdvisoryView::from(&advisory)).unwrap();
        let image = &json["images"][0];
        assert!(image.get("path").is_none());
        assert_eq!(image["url"], "/uploads/advisory/image-1-2.png");
        assert_eq!(json["type"], "image");
        assert_eq!(json["status"], "processing");
    }

    #[test]
    fn test_practice_summary_drops_long_form() {
        let mut practice = PracticeDoc::new(
            "Cover crops".into(),
            "Keep soil covered".into(),
            PracticeCategory::SoilHealth,
            Difficulty::Beginner,
            CostLevel::Low,
        );
        practice.detailed_description = Some("Long text".into());

        let full = serde_json::to_value(PracticeView::full(&practice)).unwrap();
        assert_eq!(full["detailedDescription"], "Long text");
        assert!(full["steps"].is_array());

        let summary = serde_json::to_value(PracticeView::summary(&practice)).unwrap();
        assert!(summary.get("detailedDescription").is_none());
        assert!(summary.get("steps").is_none());
        assert_eq!(summary["adoptionStats"]["totalAdoptions"], 0);
    }
}
