//! MongoDB document schemas
//!
//! Each schema declares its collection name, its indexes and its metadata
//! accessors. Nested value objects use camelCase names because they are
//! returned to clients as-is.

pub mod advisory;
pub mod communication;
pub mod farmer;
pub mod gamification;
pub mod metadata;
pub mod practice;

pub use advisory::{
    AdvisoryCategory, AdvisoryDoc, AdvisoryImage, AdvisoryKind, AdvisoryResponse, AdvisoryStatus,
    CropInfo, Feedback, Priority, ADVISORY_COLLECTION, DEFAULT_AI_MODEL,
};
pub use communication::{Channel, CommunicationDoc, DeliveryStatus, COMMUNICATION_COLLECTION};
pub use farmer::{
    Coordinates, FarmDetails, FarmerDoc, Language, LandUnit, Location, NotificationPrefs,
    Preferences, FARMER_COLLECTION,
};
pub use gamification::{
    Achievement, ActivityStats, BadgeCategory, EarnedBadge, GamificationDoc,
    GAMIFICATION_COLLECTION,
};
pub use metadata::Metadata;
pub use practice::{
    AdoptionStats, CostLevel, Difficulty, EnvironmentalImpact, Implementation, PracticeCategory,
    PracticeDoc, PracticeResource, PracticeStep, PracticeVideo, Region, ResourceKind,
    PRACTICE_COLLECTION,
};
