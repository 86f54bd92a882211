use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Strength context of play. Canonical labels follow the season-summary
/// provider (`all`, `5on5`, `5on4`, `4on5`, `other`); the game-level export
/// names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameState {
    All,
    FiveOnFive,
    PowerPlay,
    PenaltyKill,
    Other,
}

impl GameState {
    pub fn label(self) -> &'static str {
        match self {
            GameState::All => "all",
            GameState::FiveOnFive => "5on5",
            GameState::PowerPlay => "5on4",
            GameState::PenaltyKill => "4on5",
            GameState::Other => "other",
        }
    }
}

impl FromStr for GameState {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let state = match raw.trim().to_ascii_lowercase().as_str() {
            "all" | "as" | "all-strengths" => GameState::All,
            "5on5" | "5v5" | "ev" => GameState::FiveOnFive,
            "5on4" | "pp" | "power-play" => GameState::PowerPlay,
            "4on5" | "pk" | "penalty-kill" => GameState::PenaltyKill,
            "other" => GameState::Other,
            _ => return Err(PipelineError::UnknownGameState(raw.to_string())),
        };
        Ok(state)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::GameState;

    #[test]
    fn aliases_map_to_canonical_labels() {
        assert_eq!("5v5".parse::<GameState>().unwrap().label(), "5on5");
        assert_eq!("PP".parse::<GameState>().unwrap(), GameState::PowerPlay);
        assert_eq!("all".parse::<GameState>().unwrap().label(), "all");
        assert!("3on3".parse::<GameState>().is_err());
    }
}
