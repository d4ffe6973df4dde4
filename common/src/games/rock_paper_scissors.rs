use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A player's choice, lowercase on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RPSMove {
    Rock,
    Paper,
    Scissors,
}

impl fmt::Display for RPSMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RPSMove::Rock => write!(f, "rock"),
            RPSMove::Paper => write!(f, "paper"),
            RPSMove::Scissors => write!(f, "scissors"),
        }
    }
}

impl FromStr for RPSMove {
    type Err = String;

    /// Accepts the full name or its first letter, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rock" | "r" => Ok(RPSMove::Rock),
            "paper" | "p" => Ok(RPSMove::Paper),
            "scissors" | "s" => Ok(RPSMove::Scissors),
            other => Err(format!("Unknown move '{other}', expected rock, paper or scissors")),
        }
    }
}
