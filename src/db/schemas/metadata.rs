//! Bookkeeping embedded in every stored document
//!
//! Deletion is soft: readers skip documents with `is_deleted` set.

use bson::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Fresh, live metadata stamped now
    pub fn new() -> Self {
        let mut metadata = Self::default();
        metadata.stamp_created(DateTime::now());
        metadata
    }

    /// Reset to a newly inserted, live document
    pub fn stamp_created(&mut self, now: DateTime) {
        self.is_deleted = false;
        self.deleted_at = None;
        self.created_at = Some(now);
        self.updated_at = Some(now);
    }

    /// Stamp a replacement, keeping the original creation time
    pub fn stamp_replaced(&mut self, created_at: Option<DateTime>) {
        self.created_at = created_at;
        self.updated_at = Some(DateTime::now());
    }

    pub fn mark_deleted(&mut self, now: DateTime) {
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = Some(now);
    }

    pub fn created(&self) -> Option<chrono::DateTime<Utc>> {
        self.created_at.map(|d| d.to_chrono())
    }

    pub fn updated(&self) -> Option<chrono::DateTime<Utc>> {
        self.updated_at.map(|d| d.to_chrono())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_keeps_creation_time() {
        let original = Metadata::new();
        let mut next = Metadata::default();
        next.stamp_replaced(original.created_at);

        assert_eq!(next.created_at, original.created_at);
        assert!(next.updated_at.is_some());
        assert!(!next.is_deleted);
    }

    #[test]
    fn test_mark_deleted() {
        let mut metadata = Metadata::new();
        let now = DateTime::now();
        metadata.mark_deleted(now);

        assert!(metadata.is_deleted);
        assert_eq!(metadata.deleted_at, Some(now));
        assert_eq!(metadata.updated_at, Some(now));
    }
}
