//! Shared types for the hotel enricher.
//!
//! These types form the data model used across the store, the LLM
//! clients and the batch engine, so that none of those modules need
//! to depend on each other's internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rating assumed for a property that has none on record.
pub const DEFAULT_RATING: f64 = 3.0;

/// Lowest rating a review may carry.
pub const MIN_RATING: f64 = 1.0;

/// Highest rating a review may carry.
pub const MAX_RATING: f64 = 5.0;

/// Width of the title column.
pub const MAX_TITLE_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// A hotel listing as stored in the `hotels` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub id: i64,
    /// External listing identifier (unique).
    pub hotel_id: String,
    pub property_title: String,
    pub city_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub room_type: String,
    /// Nightly price, when known.
    pub price: Option<f64>,
    /// Aggregate rating on a 1–5 scale, when known.
    pub rating: Option<f64>,
    /// Remote image URL.
    pub image: String,
    pub local_image_path: Option<String>,
    pub description: Option<String>,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({})", self.id, self.property_title, self.city_name)
    }
}

/// Fields needed to insert a new property. The store assigns the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProperty {
    pub hotel_id: String,
    pub property_title: String,
    pub city_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub room_type: String,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub image: String,
    pub local_image_path: Option<String>,
    pub description: Option<String>,
}

impl NewProperty {
    /// Helper to build a sample listing with sensible defaults.
    pub fn sample(hotel_id: &str, title: &str, city: &str) -> Self {
        Self {
            hotel_id: hotel_id.to_string(),
            property_title: title.to_string(),
            city_name: city.to_string(),
            address: format!("1 Main Street, {city}"),
            latitude: 0.0,
            longitude: 0.0,
            room_type: "Double Room".to_string(),
            price: Some(120.0),
            rating: Some(4.0),
            image: format!("https://img.example.com/{hotel_id}.jpg"),
            local_image_path: None,
            description: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// The four enrichment jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Overwrite every property's title.
    RewriteTitles,
    /// Fill in missing descriptions.
    Descriptions,
    /// Add a summary to described properties that have none.
    Summaries,
    /// Add a rating + review to properties that have none.
    Reviews,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::RewriteTitles => write!(f, "rewrite-titles"),
            JobKind::Descriptions => write!(f, "generate-descriptions"),
            JobKind::Summaries => write!(f, "generate-summaries"),
            JobKind::Reviews => write!(f, "generate-reviews"),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt input
// ---------------------------------------------------------------------------

/// Everything a prompt template may mention about a property.
///
/// Optional fields render as `N/A` (or `Not available` for the
/// description) so that every template can be filled from any listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyData {
    pub title: String,
    pub city: String,
    pub room_type: Option<String>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub description: Option<String>,
}

impl PropertyData {
    pub fn price_label(&self) -> String {
        self.price
            .map(|p| format!("{p:.2}"))
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn rating_label(&self) -> String {
        self.rating
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn room_type_label(&self) -> &str {
        self.room_type.as_deref().unwrap_or("N/A")
    }

    pub fn description_label(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => "Not available",
        }
    }

    /// Rating the review parser falls back to when the model gives none.
    pub fn fallback_rating(&self) -> f64 {
        self.rating.unwrap_or(DEFAULT_RATING)
    }
}

impl From<&Property> for PropertyData {
    fn from(p: &Property) -> Self {
        let room_type = Some(p.room_type.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        Self {
            title: p.property_title.clone(),
            city: p.city_name.clone(),
            room_type,
            price: p.price,
            rating: p.rating,
            description: p.description.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived artifacts
// ---------------------------------------------------------------------------

/// A generated summary attached to one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Summary {
    pub id: i64,
    pub property_id: i64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A generated review attached to one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub property_id: i64,
    /// Always within `[MIN_RATING, MAX_RATING]`.
    pub rating: f64,
    pub review: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Clamp a rating into the accepted review range.
pub fn clamp_rating(rating: f64) -> f64 {
    rating.clamp(MIN_RATING, MAX_RATING)
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("Property not found: {0}")]
    PropertyNotFound(i64),

    #[error("Rating {0} outside [1, 5]")]
    InvalidRating(f64),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
