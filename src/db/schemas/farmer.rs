//! Farmer document schema
//!
//! Identity, credentials, farm attributes and notification/language
//! preferences. Farmers are deactivated, never removed.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{Identified, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::enums::string_enum;
use crate::types::{FarmError, Result};

/// Collection name for farmers
pub const FARMER_COLLECTION: &str = "farmers";

string_enum! {
    /// Unit for `FarmDetails::land_size`
    pub enum LandUnit {
        Acres => "acres",
        Hectares => "hectares",
        SquareMeters => "square_meters",
    }
}

impl Default for LandUnit {
    fn default() -> Self {
        Self::Acres
    }
}

string_enum! {
    /// Supported interface languages
    pub enum Language {
        En => "en",
        Hi => "hi",
        Es => "es",
        Fr => "fr",
        De => "de",
        Zh => "zh",
        Ar => "ar",
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::En
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: String,
    pub state: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FarmDetails {
    #[serde(default)]
    pub land_size: f64,
    #[serde(default)]
    pub land_size_unit: LandUnit,
    #[serde(default)]
    pub crops: Vec<String>,
    #[serde(default)]
    pub farming_experience: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub sms: bool,
    #[serde(default)]
    pub whatsapp: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email: true,
            sms: true,
            whatsapp: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub notifications: NotificationPrefs,
}

/// Farmer document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FarmerDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    /// Trimmed, lowercased email; unique
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    pub phone: String,

    pub location: Location,

    #[serde(default)]
    pub farm_details: FarmDetails,

    #[serde(default)]
    pub preferences: Preferences,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime>,
}

fn default_true() -> bool {
    true
}

impl FarmerDoc {
    /// Create a new, active farmer document
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        phone: String,
        location: Location,
        farm_details: FarmDetails,
        preferences: Preferences,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            email,
            password_hash,
            phone,
            location,
            farm_details,
            preferences,
            is_active: true,
            last_login: None,
        }
    }

    /// Hex id, empty for documents that were never stored
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }

    /// Id of a farmer loaded from a store
    pub fn stored_id(&self) -> Result<ObjectId> {
        self._id
            .ok_or_else(|| FarmError::Internal("farmer document has no _id".into()))
    }
}

impl IntoIndexes for FarmerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "location.country": 1, "location.state": 1 },
                Some(
                    IndexOptions::builder()
                        .name("location_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for FarmerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Identified for FarmerDoc {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
