use std::fmt;
use std::sync::Arc;

use chifumi_common::{PlayTurnRequest, RPSMove, TurnSelector};
use tracing::{info, warn};

use crate::api::{MatchApi, PlayTurnReply};
use crate::error::ApiError;
use crate::state::SessionState;
use crate::store::MatchStateStore;

pub const NO_CURRENT_TURN: &str = "No current turn available.";
pub const ALREADY_PLAYED: &str = "You have already played your move for this turn.";
pub const DEFAULT_REJECTION: &str = "Failed to play turn.";

/// Why a move was not taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Local: the match has no current turn
    NoCurrentTurn,
    /// Local: this user already has a move in the current turn
    AlreadyPlayed,
    /// The server's reason, verbatim
    Server(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoCurrentTurn => write!(f, "{NO_CURRENT_TURN}"),
            Rejection::AlreadyPlayed => write!(f, "{ALREADY_PLAYED}"),
            Rejection::Server(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued by the server; the result arrives on the event stream
    Accepted,
    Rejected(Rejection),
}

/// A move that passed the local checks, ready to be posted
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMove {
    pub match_id: String,
    pub turn_id: String,
    pub request: PlayTurnRequest,
}

/// Local preconditions, checked before anything goes over the wire.
///
/// The turn selector is the player's own pick and is sent as chosen, even
/// when it does not match the position of the current turn.
pub fn check_preconditions(
    store: &MatchStateStore,
    user_id: &str,
    choice: RPSMove,
    turn: TurnSelector,
) -> Result<PreparedMove, Rejection> {
    let (match_id, game_match) = store.match_id().zip(store.snapshot()).ok_or(Rejection::NoCurrentTurn)?;
    let turn_id = game_match.current_turn_id.clone().ok_or(Rejection::NoCurrentTurn)?;

    if game_match.has_played(&turn_id, user_id) {
        return Err(Rejection::AlreadyPlayed);
    }

    if let Some(position) = game_match.turn_position(&turn_id) {
        if position != usize::from(turn.number()) {
            warn!(turn_id = %turn_id, position, selected = turn.number(), "selected turn differs from the current turn");
        }
    }

    Ok(PreparedMove {
        match_id: match_id.to_string(),
        turn_id,
        request: PlayTurnRequest { choice, turn },
    })
}

pub struct MoveSubmitter<A> {
    api: Arc<A>,
    user_id: String,
}

impl<A> Clone for MoveSubmitter<A> {
    fn clone(&self) -> Self {
        MoveSubmitter {
            api: self.api.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

impl<A: MatchApi> MoveSubmitter<A> {
    pub fn new(api: Arc<A>, session: &SessionState) -> Self {
        MoveSubmitter {
            api,
            user_id: session.user_id.clone(),
        }
    }

    pub fn prepare(&self, store: &MatchStateStore, choice: RPSMove, turn: TurnSelector) -> Result<PreparedMove, Rejection> {
        check_preconditions(store, &self.user_id, choice, turn)
    }

    /// Post a prepared move and interpret the answer
    pub async fn send(&self, prepared: PreparedMove) -> Result<SubmitOutcome, ApiError> {
        let reply = self
            .api
            .play_turn(&prepared.match_id, &prepared.turn_id, &prepared.request)
            .await?;

        match reply {
            PlayTurnReply::Accepted => {
                info!(match_id = %prepared.match_id, turn_id = %prepared.turn_id, choice = %prepared.request.choice, "move accepted");
                Ok(SubmitOutcome::Accepted)
            }
            PlayTurnReply::Rejected(body) => {
                let reason = body.reason().unwrap_or(DEFAULT_REJECTION).to_string();
                info!(match_id = %prepared.match_id, turn_id = %prepared.turn_id, reason = %reason, "move rejected");
                Ok(SubmitOutcome::Rejected(Rejection::Server(reason)))
            }
            PlayTurnReply::Other(status) => Err(ApiError::Server { status, message: None }),
        }
    }

    pub async fn submit(
        &self,
        store: &MatchStateStore,
        choice: RPSMove,
        turn: TurnSelector,
    ) -> Result<SubmitOutcome, ApiError> {
        match self.prepare(store, choice, turn) {
            Ok(prepared) => self.send(prepared).await,
            Err(rejection) => {
                info!(reason = %rejection, "move rejected locally");
                Ok(SubmitOutcome::Rejected(rejection))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMatchApi;
    use chifumi_common::{Match, PlayTurnRejection};

    fn turn(number: u8) -> TurnSelector {
        TurnSelector::try_from(number).unwrap()
    }

    fn store_with(json: &str) -> MatchStateStore {
        let mut store = MatchStateStore::new();
        store.activate("m1");
        let (epoch, _) = store.begin_load().unwrap();
        store.finish_load(epoch, Ok(serde_json::from_str::<Match>(json).unwrap()));
        store
    }

    fn submitter(api: &Arc<FakeMatchApi>) -> MoveSubmitter<FakeMatchApi> {
        MoveSubmitter::new(api.clone(), &SessionState::new("http://localhost", "secret", "u1"))
    }

    #[tokio::test]
    async fn test_no_current_turn_is_rejected_locally() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(r#"{"turns": [], "currentTurnId": null}"#);

        let outcome = submitter(&api).submit(&store, RPSMove::Rock, turn(1)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::NoCurrentTurn));
        assert_eq!(Rejection::NoCurrentTurn.to_string(), "No current turn available.");
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_loaded_is_rejected_locally() {
        let api = FakeMatchApi::new(Match::default());
        let store = MatchStateStore::new();

        let outcome = submitter(&api).submit(&store, RPSMove::Rock, turn(1)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::NoCurrentTurn));
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_already_played_is_rejected_locally() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(
            r#"{"currentTurnId": "t1", "turns": [{"_id": "t1", "moves": [{"playerId": "u1", "move": "paper"}]}]}"#,
        );

        let outcome = submitter(&api).submit(&store, RPSMove::Rock, turn(1)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::AlreadyPlayed));
        assert_eq!(Rejection::AlreadyPlayed.to_string(), ALREADY_PLAYED);
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_already_played_with_populated_player() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(
            r#"{"currentTurnId": "t1", "turns": [{"_id": "t1", "moves": [{"playerId": {"_id": "u1", "username": "alice"}, "move": "rock"}]}]}"#,
        );

        let outcome = submitter(&api).submit(&store, RPSMove::Paper, turn(1)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::AlreadyPlayed));
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_opponent_move_does_not_block() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(
            r#"{"currentTurnId": "t1", "turns": [{"_id": "t1", "moves": [{"playerId": "u2", "move": "paper"}]}]}"#,
        );

        let outcome = submitter(&api).submit(&store, RPSMove::Scissors, turn(1)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_accepted_move_posts_current_turn() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(r#"{"currentTurnId": "t1", "turns": [{"_id": "t1", "moves": []}]}"#);

        let outcome = submitter(&api).submit(&store, RPSMove::Paper, turn(2)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Accepted);
        // the selector goes out as picked even though t1 is the first turn
        assert_eq!(
            api.submissions(),
            vec![(
                "m1".to_string(),
                "t1".to_string(),
                PlayTurnRequest { choice: RPSMove::Paper, turn: turn(2) }
            )]
        );
    }

    #[tokio::test]
    async fn test_current_turn_not_yet_listed_is_sent() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(r#"{"currentTurnId": "t2", "turns": [{"_id": "t1"}]}"#);

        let outcome = submitter(&api).submit(&store, RPSMove::Rock, turn(2)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted);
        assert_eq!(api.submissions()[0].1, "t2");
    }

    #[tokio::test]
    async fn test_server_rejection_reasons() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(r#"{"currentTurnId": "t1", "turns": [{"_id": "t1"}]}"#);
        let submitter = submitter(&api);

        api.set_reply(Ok(PlayTurnReply::Rejected(PlayTurnRejection {
            turn: None,
            match_reason: Some("Match already ended".to_string()),
            user: Some("User not in match".to_string()),
        })));
        let outcome = submitter.submit(&store, RPSMove::Rock, turn(1)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::Server("Match already ended".to_string())));

        api.set_reply(Ok(PlayTurnReply::Rejected(PlayTurnRejection::default())));
        let outcome = submitter.submit(&store, RPSMove::Rock, turn(1)).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::Server(DEFAULT_REJECTION.to_string())));
    }

    #[tokio::test]
    async fn test_unexpected_answers_are_errors() {
        let api = FakeMatchApi::new(Match::default());
        let store = store_with(r#"{"currentTurnId": "t1", "turns": [{"_id": "t1"}]}"#);
        let submitter = submitter(&api);

        api.set_reply(Ok(PlayTurnReply::Other(500)));
        let err = submitter.submit(&store, RPSMove::Rock, turn(1)).await.unwrap_err();
        assert_eq!(err, ApiError::Server { status: 500, message: None });

        api.set_reply(Err(ApiError::Network("connection reset".to_string())));
        let err = submitter.submit(&store, RPSMove::Rock, turn(1)).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
