//! Communication log schema
//!
//! One record per outbound message, including each recipient of a broadcast.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{Identified, IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::enums::string_enum;

/// Collection name for the outbound message log
pub const COMMUNICATION_COLLECTION: &str = "communications";

string_enum! {
    pub enum Channel {
        Sms => "sms",
        Whatsapp => "whatsapp",
        Email => "email",
    }
}

string_enum! {
    pub enum DeliveryStatus {
        Sent => "sent",
        Queued => "queued",
        Failed => "failed",
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommunicationDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Farmer who sent (or, for broadcasts, received) the message
    pub farmer_id: ObjectId,

    pub channel: Channel,
    pub to: String,
    pub from: String,
    pub body: String,
    pub status: DeliveryStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_sid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_id: Option<String>,
}

impl IntoIndexes for CommunicationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "farmer_id": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("farmer_recent".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CommunicationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Identified for CommunicationDoc {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }
}
