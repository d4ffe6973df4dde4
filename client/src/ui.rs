use std::io::{self, Write};

use chifumi_common::{Match, RPSMove, TurnSelector};
use colored::*;

use crate::event_stream::ConnectionState;
use crate::store::MatchStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play(RPSMove, TurnSelector),
    Refresh,
    Help,
    Quit,
}

pub const HELP: &str = "Commands: <rock|paper|scissors> <turn 1-3>, refresh, help, quit";

/// Parse one line of input. Moves accept their first letter as a shorthand.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Err("Empty command".to_string());
    };

    let command = match first.to_lowercase().as_str() {
        "refresh" => Command::Refresh,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => {
            let choice: RPSMove = first.parse()?;
            let turn = words
                .next()
                .ok_or_else(|| format!("Which turn? Usage: {choice} <1-{}>", TurnSelector::MAX))?;
            let number: u8 = turn
                .parse()
                .map_err(|_| format!("Invalid turn '{turn}', expected 1-{}", TurnSelector::MAX))?;
            let turn = TurnSelector::try_from(number)?;
            Command::Play(choice, turn)
        }
    };

    if let Some(extra) = words.next() {
        return Err(format!("Unexpected argument '{extra}'"));
    }
    Ok(command)
}

pub fn clear_screen() -> io::Result<()> {
    print!("\x1B[2J\x1B[1;1H");
    io::stdout().flush()?;
    Ok(())
}

fn connection_label(state: ConnectionState) -> ColoredString {
    match state {
        ConnectionState::Connected => "live".green(),
        ConnectionState::Connecting => "connecting".yellow(),
        ConnectionState::Reconnecting => "reconnecting".yellow(),
        ConnectionState::Disconnected | ConnectionState::Closed => "offline".red(),
    }
}

fn player_label(name: Option<&str>) -> String {
    name.unwrap_or("waiting...").to_string()
}

fn render_turns(game_match: &Match, user_id: &str) {
    for (index, turn) in game_match.turns.iter().enumerate() {
        let marker = if game_match.current_turn_id.as_deref() == Some(turn.id.as_str()) {
            ">".bright_yellow()
        } else {
            " ".normal()
        };

        let mine = turn
            .move_of(user_id)
            .map(|m| m.choice.to_string())
            .unwrap_or_else(|| "-".to_string());
        let played = turn.moves.len();
        let outcome = match &turn.winner {
            Some(winner) if winner == user_id => "won".green(),
            Some(winner) => format!("winner: {winner}").red(),
            None if played == 2 => "draw".dimmed(),
            None => format!("{played}/2 moves").dimmed(),
        };

        println!("  {marker} Turn {} ({}): you played {mine}, {outcome}", index + 1, turn.id.dimmed());
    }
}

/// Draw the whole match view
pub fn render(store: &MatchStateStore, connection: ConnectionState, user_id: &str) {
    clear_screen().ok();

    println!();
    println!("{}", "CHIFUMI".bright_cyan().bold());
    match store.match_id() {
        Some(id) => println!("{}", format!("Match {id}").dimmed()),
        None => println!("{}", "No match selected".dimmed()),
    }
    println!("Stream: {}", connection_label(connection));
    println!();

    if let Some(game_match) = store.snapshot() {
        let (p1_wins, p2_wins) = store.wins();
        println!(
            "  {} {} - {} {}",
            player_label(game_match.player1.as_deref()).bold(),
            p1_wins.to_string().bright_yellow(),
            p2_wins.to_string().bright_yellow(),
            player_label(game_match.player2.as_deref()).bold(),
        );
        println!();
        render_turns(game_match, user_id);
        if let Some(winner) = &game_match.winner {
            println!();
            println!("{}", format!("Winner: {winner}").bright_green().bold());
        }
    } else if store.is_loading() {
        println!("{}", "Loading match...".dimmed());
    }

    println!();
    println!("{}", store.status().cyan());
    if let Some(error) = store.error() {
        println!("{}", error.red());
    }
    println!();
    println!("{}", HELP.dimmed());
}
