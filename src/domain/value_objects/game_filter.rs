//! Structured filter for the game listing.
//!
//! A [`GameFilter`] is what the caller asks for; [`GamePredicate`] is the
//! composed condition a repository evaluates. Repositories translate the
//! predicate at a single boundary (bound SQL parameters for SQLite, direct
//! evaluation in memory), so no filter value is ever spliced into a query.

use serde::Deserialize;

use crate::domain::entities::Game;

/// Content warnings a game may carry (and a player may filter out)
pub const ALLOWED_CONTENT_WARNINGS: &[&str] = &[
    "animals in peril",
    "apocalypses",
    "betrayal",
    "body horror",
    "bugs",
    "clowns",
    "cosmic horror",
    "discrimination against ancestry",
    "discrimination against culture",
    "discrimination against disabled people",
    "discrimination against gender",
    "discrimination against religion",
    "discrimination against sexuality",
    "discrimination against weight",
    "domestic violence",
    "drowning",
    "earthquake",
    "financial instability",
    "fire",
    "flood",
    "gore",
    "hate speech",
    "human sacrifice",
    "imperialism or colonialism",
    "injury to body parts",
    "involuntary commitment",
    "lovecraftian \"insanity\"",
    "military violence",
    "mind control",
    "police violence",
    "pregnancy complications",
    "prison",
    "rats",
    "serial killers",
    "sexual content",
    "sexual violence",
    "sharks",
    "shipwrecks",
    "snakes",
    "spider",
    "storms",
    "terrorism",
    "torture",
    "tsunami",
    "undead",
    "violence against animals",
    "violence against children",
    "violence against elders",
    "wildfire",
];

const MAX_TEXT_LEN: usize = 1000;

pub fn is_allowed_content_warning(cw: &str) -> bool {
    ALLOWED_CONTENT_WARNINGS.contains(&cw)
}

/// Filter requested for the game listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFilter {
    /// Hide games carrying any of these warnings
    #[serde(default)]
    pub content_warnings: Vec<String>,
    /// Only games the viewer has (or has not) entered
    pub entered: Option<bool>,
    /// Only games the viewer runs (or does not run)
    pub running: Option<bool>,
    /// Free text matched against name and summary
    pub text: Option<String>,
}

impl GameFilter {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(cw) = self
            .content_warnings
            .iter()
            .find(|cw| !is_allowed_content_warning(cw))
        {
            return Err(format!("Unknown content warning: {}", cw));
        }
        if self.content_warnings.len() > ALLOWED_CONTENT_WARNINGS.len() {
            return Err("Too many content warnings".to_string());
        }
        if self.text.as_ref().map_or(false, |t| t.len() > MAX_TEXT_LEN) {
            return Err(format!("Search text is limited to {} characters", MAX_TEXT_LEN));
        }
        Ok(())
    }

    /// Compose the predicate for `viewer`.
    ///
    /// Status flags only mean something for a signed-in viewer and are dropped
    /// otherwise. Returns `None` when nothing filters, so callers can skip the
    /// condition entirely.
    pub fn to_predicate(&self, viewer: Option<&str>) -> Option<GamePredicate> {
        let mut parts = Vec::new();

        for cw in &self.content_warnings {
            parts.push(GamePredicate::LacksContentWarning(cw.clone()));
        }

        if let Some(viewer) = viewer {
            let mut status = Vec::new();
            if let Some(running) = self.running {
                status.push(GamePredicate::OrganizedBy(viewer.to_string()).negate_unless(running));
            }
            if let Some(entered) = self.entered {
                status.push(GamePredicate::EnteredBy(viewer.to_string()).negate_unless(entered));
            }
            match status.len() {
                0 => {}
                1 => parts.extend(status),
                _ => parts.push(GamePredicate::Any(status)),
            }
        }

        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(GamePredicate::TextMatches(text.to_string()));
        }

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(GamePredicate::All(parts)),
        }
    }
}

/// Composable condition over games
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GamePredicate {
    All(Vec<GamePredicate>),
    Any(Vec<GamePredicate>),
    Not(Box<GamePredicate>),
    LacksContentWarning(String),
    OrganizedBy(String),
    /// The player has an entry on at least one slot of the game
    EnteredBy(String),
    /// Case-insensitive substring of name or summary
    TextMatches(String),
}

impl GamePredicate {
    fn negate_unless(self, keep: bool) -> Self {
        if keep {
            self
        } else {
            GamePredicate::Not(Box::new(self))
        }
    }

    /// Evaluate against a game. `has_entered(player_id, game)` answers the
    /// one question a game row cannot answer by itself.
    pub fn matches<F>(&self, game: &Game, has_entered: &F) -> bool
    where
        F: Fn(&str, &Game) -> bool,
    {
        match self {
            GamePredicate::All(parts) => parts.iter().all(|p| p.matches(game, has_entered)),
            GamePredicate::Any(parts) => parts.iter().any(|p| p.matches(game, has_entered)),
            GamePredicate::Not(inner) => !inner.matches(game, has_entered),
            GamePredicate::LacksContentWarning(cw) => !game.content_warnings.contains(cw),
            GamePredicate::OrganizedBy(player_id) => game.is_organized_by(player_id),
            GamePredicate::EnteredBy(player_id) => has_entered(player_id, game),
            GamePredicate::TextMatches(text) => {
                let needle = text.to_lowercase();
                game.name.to_lowercase().contains(&needle)
                    || game.summary.to_lowercase().contains(&needle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::PlayerBounds;

    fn game(name: &str, organizer: &str, cws: &[&str]) -> Game {
        Game::new(
            format!("id-{}", name),
            name.to_lowercase(),
            name.to_string(),
            format!("A game called {}", name),
            organizer.to_string(),
            cws.iter().map(|s| s.to_string()).collect(),
            PlayerBounds::unbounded(),
        )
    }

    fn never_entered(_: &str, _: &Game) -> bool {
        false
    }

    #[test]
    fn test_empty_filter_has_no_predicate() {
        assert_eq!(GameFilter::default().to_predicate(Some("alice")), None);
        let blank_text = GameFilter {
            text: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(blank_text.to_predicate(None), None);
    }

    #[test]
    fn test_status_flags_need_a_viewer() {
        let filter = GameFilter {
            running: Some(true),
            entered: Some(false),
            ..Default::default()
        };
        assert_eq!(filter.to_predicate(None), None);
        assert_eq!(
            filter.to_predicate(Some("alice")),
            Some(GamePredicate::Any(vec![
                GamePredicate::OrganizedBy("alice".into()),
                GamePredicate::Not(Box::new(GamePredicate::EnteredBy("alice".into()))),
            ]))
        );
    }

    #[test]
    fn test_content_warning_exclusion() {
        let filter = GameFilter {
            content_warnings: vec!["gore".into(), "sharks".into()],
            ..Default::default()
        };
        let predicate = filter.to_predicate(None).unwrap();

        assert!(predicate.matches(&game("Heist", "bob", &["prison"]), &never_entered));
        assert!(!predicate.matches(&game("Jaws", "bob", &["sharks"]), &never_entered));
        assert!(!predicate.matches(&game("Splatter", "bob", &["gore", "fire"]), &never_entered));
    }

    #[test]
    fn test_text_is_case_insensitive_on_name_and_summary() {
        let filter = GameFilter {
            text: Some("CTHULHU".into()),
            ..Default::default()
        };
        let predicate = filter.to_predicate(None).unwrap();
        assert!(predicate.matches(&game("Call of Cthulhu", "bob", &[]), &never_entered));
        assert!(!predicate.matches(&game("Blades", "bob", &[]), &never_entered));
    }

    #[test]
    fn test_entered_uses_callback() {
        let filter = GameFilter {
            entered: Some(true),
            ..Default::default()
        };
        let predicate = filter.to_predicate(Some("alice")).unwrap();
        let g = game("Heist", "bob", &[]);
        assert!(predicate.matches(&g, &|player: &str, _: &Game| player == "alice"));
        assert!(!predicate.matches(&g, &never_entered));
    }

    #[test]
    fn test_validate_rejects_unknown_warning() {
        let filter = GameFilter {
            content_warnings: vec!["spiders and more".into()],
            ..Default::default()
        };
        assert!(filter.validate().is_err());
        let ok = GameFilter {
            content_warnings: vec!["lovecraftian \"insanity\"".into()],
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }
}
