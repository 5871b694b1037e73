//! Prompt templates for the four enrichment jobs.

use crate::types::PropertyData;

pub fn title_prompt(data: &PropertyData) -> String {
    format!(
        "Rewrite this hotel property title to be more engaging and descriptive:\n\
         Current Title: {}\n\
         Location: {}\n\
         Room Type: {}\n\
         Rating: {}/5\n\
         \n\
         Rules:\n\
         1. Keep it concise but descriptive\n\
         2. Include the location if relevant\n\
         3. Highlight any unique features\n\
         4. Maintain professionalism\n\
         5. Return only the new title, no additional text\n",
        data.title,
        data.city,
        data.room_type_label(),
        data.rating_label(),
    )
}

pub fn description_prompt(data: &PropertyData) -> String {
    format!(
        "Generate an engaging hotel description:\n\
         Hotel: {}\n\
         Location: {}\n\
         Room Type: {}\n\
         Rating: {}/5\n\
         Price: ${} per night\n\
         \n\
         Write 2-3 paragraphs highlighting location, amenities, and value proposition.\n",
        data.title,
        data.city,
        data.room_type_label(),
        data.rating_label(),
        data.price_label(),
    )
}

pub fn summary_prompt(data: &PropertyData) -> String {
    format!(
        "Create a brief summary for this hotel:\n\
         Name: {}\n\
         Location: {}\n\
         Price: ${}\n\
         Rating: {}/5\n\
         Description: {}\n\
         \n\
         Create a concise 2-3 sentence summary highlighting key features.\n",
        data.title,
        data.city,
        data.price_label(),
        data.rating_label(),
        data.description_label(),
    )
}

/// The reply format requested here is what `review::parse_review` expects.
pub fn review_prompt(data: &PropertyData) -> String {
    format!(
        "Generate a hotel review:\n\
         Name: {}\n\
         Location: {}\n\
         Price: ${}\n\
         Current Rating: {:.1}/5\n\
         \n\
         Format your response EXACTLY like this:\n\
         RATING: [single number 1-5]\n\
         REVIEW: [detailed review text]\n\
         \n\
         Note: The rating should be just a single number between 1 and 5.",
        data.title,
        data.city,
        data.price_label(),
        data.fallback_rating(),
    )
}
