//! Persistence layer
//!
//! MongoDB client wrapper and the document schemas stored in it.

pub mod mongo;
pub mod schemas;

pub use mongo::{escape_regex, Identified, IntoIndexes, MongoClient, MongoCollection, MutMetadata};
