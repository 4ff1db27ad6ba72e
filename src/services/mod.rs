//! Domain services behind the HTTP routes
//!
//! - `advisor`: canned advisory answers behind the `Advisor` seam
//! - `progression`: XP, levels and badges with version-checked writes
//! - `digital_twin`: closed-form crop estimates
//! - `localization`: language catalog and detection
//! - `messaging`: Twilio or demo-mode SMS/WhatsApp
//! - `uploads`: multipart parsing and local image storage
//! - `dashboard`: summary stats and activity feed

pub mod advisor;
pub mod dashboard;
pub mod digital_twin;
pub mod localization;
pub mod messaging;
pub mod progression;
pub mod uploads;

pub use advisor::{Advisor, KeywordAdvisor};
pub use messaging::Messenger;
pub use progression::Action;
pub use uploads::UploadDir;
