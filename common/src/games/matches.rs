use serde::{Deserialize, Serialize};

use crate::games::rock_paper_scissors::RPSMove;
use crate::wire;

/// Snapshot of a chifumi match as returned by `GET /matches/{id}`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(rename = "_id", default, deserialize_with = "wire::id")]
    pub id: String,
    #[serde(default, deserialize_with = "wire::optional_label")]
    pub player1: Option<String>,
    #[serde(default, deserialize_with = "wire::optional_label")]
    pub player2: Option<String>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default, deserialize_with = "wire::optional_id")]
    pub current_turn_id: Option<String>,
    #[serde(default, deserialize_with = "wire::count")]
    pub player1_wins: u32,
    #[serde(default, deserialize_with = "wire::count")]
    pub player2_wins: u32,
    #[serde(default, deserialize_with = "wire::optional_label")]
    pub winner: Option<String>,
}

/// One round of a match
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Turn {
    #[serde(rename = "_id", deserialize_with = "wire::id")]
    pub id: String,
    #[serde(default)]
    pub moves: Vec<Move>,
    #[serde(default, deserialize_with = "wire::optional_reference_id")]
    pub winner: Option<String>,
}

/// A single player's choice within a turn
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Move {
    #[serde(rename = "playerId", deserialize_with = "wire::reference_id")]
    pub player_id: String,
    #[serde(rename = "move")]
    pub choice: RPSMove,
}

impl Match {
    /// Placeholder used when a turn starts before the first snapshot arrived
    pub fn pending(id: &str, current_turn_id: Option<String>) -> Self {
        Match {
            id: id.to_string(),
            current_turn_id,
            ..Match::default()
        }
    }

    pub fn turn(&self, turn_id: &str) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.id == turn_id)
    }

    /// The turn referenced by `current_turn_id`, if it is in the turn list
    pub fn current_turn(&self) -> Option<&Turn> {
        self.current_turn_id.as_deref().and_then(|id| self.turn(id))
    }

    /// 1-based position of a turn in the match
    pub fn turn_position(&self, turn_id: &str) -> Option<usize> {
        self.turns.iter().position(|turn| turn.id == turn_id).map(|idx| idx + 1)
    }

    /// Whether `player_id` already has a recorded move in `turn_id`
    pub fn has_played(&self, turn_id: &str, player_id: &str) -> bool {
        self.turn(turn_id)
            .map(|turn| turn.move_of(player_id).is_some())
            .unwrap_or(false)
    }

    /// Score as (player1_wins, player2_wins)
    pub fn wins(&self) -> (u32, u32) {
        (self.player1_wins, self.player2_wins)
    }
}

impl Turn {
    pub fn move_of(&self, player_id: &str) -> Option<&Move> {
        self.moves.iter().find(|m| m.player_id == player_id)
    }
}
