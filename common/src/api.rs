use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::games::rock_paper_scissors::RPSMove;
use crate::wire;

// REST bodies

/// Turn number picked by the player alongside their move (1 to 3)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct TurnSelector(u8);

impl TurnSelector {
    pub const MAX: u8 = 3;

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for TurnSelector {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=Self::MAX).contains(&value) {
            Ok(TurnSelector(value))
        } else {
            Err(format!("Turn must be between 1 and {}", Self::MAX))
        }
    }
}

impl fmt::Display for TurnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlayTurnRequest {
    #[serde(rename = "move")]
    pub choice: RPSMove,
    pub turn: TurnSelector,
}

/// Body of non-OK responses
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a 400 answer to a move submission
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlayTurnRejection {
    #[serde(default)]
    pub turn: Option<String>,
    #[serde(rename = "match", default)]
    pub match_reason: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

impl PlayTurnRejection {
    /// The turn-level reason wins over the match-level one, which wins over the user-level one
    pub fn reason(&self) -> Option<&str> {
        self.turn
            .as_deref()
            .or(self.match_reason.as_deref())
            .or(self.user.as_deref())
    }
}

// Event stream

/// Which seat an event refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerSlot {
    One,
    Two,
}

/// A push notification from `GET /matches/{id}/subscribe`
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    PlayerJoined { slot: PlayerSlot, user: String },
    NewTurn { turn_id: String },
    TurnEnded { winner: Option<String> },
    PlayerMoved { slot: PlayerSlot, turn: String },
    MatchEnded { winner: Option<String> },
    /// Any tag this client does not know about
    Unknown { kind: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct JoinPayload {
    #[serde(deserialize_with = "wire::label")]
    user: String,
}

#[derive(Deserialize)]
struct NewTurnPayload {
    #[serde(rename = "turnId", deserialize_with = "wire::id")]
    turn_id: String,
}

#[derive(Deserialize)]
struct MovedPayload {
    #[serde(deserialize_with = "wire::id")]
    turn: String,
}

#[derive(Deserialize)]
struct WinnerPayload {
    #[serde(default, deserialize_with = "wire::optional_label")]
    winner: Option<String>,
}

impl StreamEvent {
    /// Decode the `data` field of one SSE frame: `{ "type": ..., "payload": ... }`
    pub fn decode(data: &str) -> Result<StreamEvent, DecodeError> {
        let envelope: Envelope = serde_json::from_str(data)?;
        let kind = envelope.kind.as_str();

        let event = match kind {
            "PLAYER1_JOIN" | "PLAYER2_JOIN" => {
                let payload: JoinPayload = payload(kind, envelope.payload)?;
                StreamEvent::PlayerJoined { slot: slot_of(kind), user: payload.user }
            }
            "NEW_TURN" => {
                let payload: NewTurnPayload = payload(kind, envelope.payload)?;
                StreamEvent::NewTurn { turn_id: payload.turn_id }
            }
            "TURN_ENDED" => {
                let payload: WinnerPayload = payload(kind, envelope.payload)?;
                StreamEvent::TurnEnded { winner: payload.winner }
            }
            "PLAYER1_MOVED" | "PLAYER2_MOVED" => {
                let payload: MovedPayload = payload(kind, envelope.payload)?;
                StreamEvent::PlayerMoved { slot: slot_of(kind), turn: payload.turn }
            }
            "MATCH_ENDED" => {
                let payload: WinnerPayload = payload(kind, envelope.payload)?;
                StreamEvent::MatchEnded { winner: payload.winner }
            }
            _ => StreamEvent::Unknown { kind: envelope.kind.clone() },
        };

        Ok(event)
    }

    /// Wire tag of this event, used in logs
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::PlayerJoined { slot: PlayerSlot::One, .. } => "PLAYER1_JOIN",
            StreamEvent::PlayerJoined { slot: PlayerSlot::Two, .. } => "PLAYER2_JOIN",
            StreamEvent::NewTurn { .. } => "NEW_TURN",
            StreamEvent::TurnEnded { .. } => "TURN_ENDED",
            StreamEvent::PlayerMoved { slot: PlayerSlot::One, .. } => "PLAYER1_MOVED",
            StreamEvent::PlayerMoved { slot: PlayerSlot::Two, .. } => "PLAYER2_MOVED",
            StreamEvent::MatchEnded { .. } => "MATCH_ENDED",
            StreamEvent::Unknown { kind } => kind,
        }
    }
}

fn slot_of(kind: &str) -> PlayerSlot {
    if kind.starts_with("PLAYER2") {
        PlayerSlot::Two
    } else {
        PlayerSlot::One
    }
}

fn payload<T: DeserializeOwned>(kind: &str, value: serde_json::Value) -> Result<T, DecodeError> {
    // A missing payload reads as an empty object so optional fields still decode
    let value = if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value
    };

    serde_json::from_value(value).map_err(|source| DecodeError::Payload {
        kind: kind.to_string(),
        source,
    })
}
