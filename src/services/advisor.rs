//! Advisory responder
//!
//! Stands in for a hosted model: text queries are routed by keyword to a
//! canned answer, images get one of two canned diagnoses at random. The
//! `Advisor` trait is the seam a real model client would plug into.

use std::path::Path;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::db::schemas::{
    AdvisoryCategory, AdvisoryResponse, CropInfo, Location, DEFAULT_AI_MODEL,
};
use crate::types::{FarmError, Result};

/// Stored on text advisories the responder could not answer
pub const TEXT_FAILURE: &str =
    "Sorry, I encountered an error processing your query. Please try again later.";

/// Stored on image advisories the responder could not answer
pub const IMAGE_FAILURE: &str =
    "Sorry, I encountered an error analyzing your image. Please try again with a clearer image.";

/// One canned answer
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: &'static str,
    pub confidence: f64,
    pub recommendations: &'static [&'static str],
    pub category: AdvisoryCategory,
}

impl Answer {
    pub fn to_response(&self) -> AdvisoryResponse {
        AdvisoryResponse {
            text: self.text.to_string(),
            confidence: self.confidence,
            recommendations: self.recommendations.iter().map(|r| r.to_string()).collect(),
            related_practices: Vec::new(),
            ai_model: DEFAULT_AI_MODEL.to_string(),
        }
    }
}

/// Response recorded when answering failed
pub fn failure_response(text: &str) -> AdvisoryResponse {
    AdvisoryResponse {
        text: text.to_string(),
        confidence: 0.0,
        recommendations: Vec::new(),
        related_practices: Vec::new(),
        ai_model: "error".to_string(),
    }
}

#[async_trait]
pub trait Advisor: Send + Sync {
    async fn answer_text(
        &self,
        query: &str,
        location: &Location,
        crop_info: Option<&CropInfo>,
    ) -> Result<Answer>;

    async fn answer_image(&self, image: &Path, query: &str) -> Result<Answer>;
}

pub const DISEASE: Answer = Answer {
    text: "Based on your description, this appears to be a fungal disease. I recommend applying a copper-based fungicide and ensuring proper air circulation around your plants.",
    confidence: 0.85,
    recommendations: &[
        "Apply copper-based fungicide every 7-10 days",
        "Improve air circulation by pruning dense foliage",
        "Water at the base of plants to avoid wetting leaves",
        "Remove and dispose of infected plant material",
    ],
    category: AdvisoryCategory::DiseaseDetection,
};

pub const PEST: Answer = Answer {
    text: "This looks like aphid damage. These small insects feed on plant sap and can spread diseases. Here are some effective control methods.",
    confidence: 0.90,
    recommendations: &[
        "Spray with neem oil solution",
        "Introduce beneficial insects like ladybugs",
        "Use insecticidal soap",
        "Remove heavily infested plant parts",
    ],
    category: AdvisoryCategory::PestIdentification,
};

pub const NUTRIENT: Answer = Answer {
    text: "Your plants are showing signs of nutrient deficiency. Based on the symptoms, this appears to be a nitrogen deficiency.",
    confidence: 0.80,
    recommendations: &[
        "Apply nitrogen-rich fertilizer",
        "Test soil pH and adjust if necessary",
        "Add organic matter like compost",
        "Consider crop rotation to improve soil health",
    ],
    category: AdvisoryCategory::NutrientDeficiency,
};

pub const WEATHER: Answer = Answer {
    text: "Based on your location and current weather patterns, here are some recommendations for your farming activities.",
    confidence: 0.75,
    recommendations: &[
        "Monitor soil moisture levels regularly",
        "Consider mulching to retain soil moisture",
        "Adjust irrigation schedule based on rainfall",
        "Protect young plants from extreme weather",
    ],
    category: AdvisoryCategory::WeatherAdvice,
};

pub const EARLY_BLIGHT: Answer = Answer {
    text: "I can see signs of early blight on your tomato plants. The dark spots with concentric rings are characteristic of this fungal disease.",
    confidence: 0.88,
    recommendations: &[
        "Remove affected leaves immediately",
        "Apply copper fungicide",
        "Improve air circulation",
        "Avoid overhead watering",
    ],
    category: AdvisoryCategory::DiseaseDetection,
};

pub const HEALTHY_CORN: Answer = Answer {
    text: "Your corn plants appear healthy with good growth. The leaves show normal green coloration without signs of nutrient deficiency.",
    confidence: 0.92,
    recommendations: &[
        "Continue current care routine",
        "Monitor for pest activity",
        "Ensure adequate spacing between plants",
        "Consider side-dressing with nitrogen fertilizer",
    ],
    category: AdvisoryCategory::GeneralQuestion,
};

const IMAGE_ANSWERS: &[Answer] = &[EARLY_BLIGHT, HEALTHY_CORN];

/// Keyword routing, first matching rule wins
pub fn classify(query: &str) -> &'static Answer {
    const RULES: &[(&[&str], &Answer)] = &[
        (&["disease", "fungus", "mold"], &DISEASE),
        (&["pest", "insect", "bug"], &PEST),
        (&["nutrient", "deficiency", "yellow"], &NUTRIENT),
    ];

    let query = query.to_lowercase();
    RULES
        .iter()
        .find(|(words, _)| words.iter().any(|w| query.contains(w)))
        .map(|(_, answer)| *answer)
        .unwrap_or(&WEATHER)
}

/// The built-in mock responder
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordAdvisor;

#[async_trait]
impl Advisor for KeywordAdvisor {
    async fn answer_text(
        &self,
        query: &str,
        _location: &Location,
        _crop_info: Option<&CropInfo>,
    ) -> Result<Answer> {
        Ok(classify(query).clone())
    }

    async fn answer_image(&self, _image: &Path, _query: &str) -> Result<Answer> {
        IMAGE_ANSWERS
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| FarmError::Internal("no image answers configured".into()))
    }
}
