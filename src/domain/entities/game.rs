use serde::{Deserialize, Serialize};

use crate::domain::value_objects::PlayerBounds;

/// Slugs that collide with fixed routes
const RESERVED_SLUGS: &[&str] = &["new"];

/// Game entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub summary: String,
    pub organizer_id: String,
    pub content_warnings: Vec<String>,
    pub bounds: PlayerBounds,
    pub created_at: i64,
}

impl Game {
    /// Create a new game owned by `organizer_id`
    pub fn new(
        id: String,
        slug: String,
        name: String,
        summary: String,
        organizer_id: String,
        content_warnings: Vec<String>,
        bounds: PlayerBounds,
    ) -> Self {
        Self {
            id,
            slug,
            name,
            summary,
            organizer_id,
            content_warnings,
            bounds,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Check if the given player runs this game
    pub fn is_organized_by(&self, player_id: &str) -> bool {
        self.organizer_id == player_id
    }
}

/// Turn a game name into its URL slug.
///
/// Returns `None` when nothing usable is left or the slug is reserved.
pub fn slugify(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    if slug.is_empty() || RESERVED_SLUGS.contains(&slug.as_str()) {
        None
    } else {
        Some(slug)
    }
}
