use std::future::Future;

use chifumi_common::{ErrorResponse, Match, PlayTurnRejection, PlayTurnRequest, HEADER_AUTH};
use reqwest::StatusCode;

use crate::error::ApiError;
use crate::state::SessionState;

/// How the server answered a move submission
#[derive(Debug, Clone, PartialEq)]
pub enum PlayTurnReply {
    /// 202: the result will arrive on the event stream
    Accepted,
    /// 400 with the structured reason body
    Rejected(PlayTurnRejection),
    /// Any other status
    Other(u16),
}

/// Match REST endpoints
pub trait MatchApi: Send + Sync + 'static {
    /// `GET /matches/{id}`
    fn fetch_match(&self, match_id: &str) -> impl Future<Output = Result<Match, ApiError>> + Send;

    /// `POST /matches/{id}/turns/{turn_id}`
    fn play_turn(
        &self,
        match_id: &str,
        turn_id: &str,
        request: &PlayTurnRequest,
    ) -> impl Future<Output = Result<PlayTurnReply, ApiError>> + Send;
}

pub struct HttpMatchApi {
    client: reqwest::Client,
    session: SessionState,
}

impl HttpMatchApi {
    pub fn new(session: SessionState) -> Self {
        Self::with_client(reqwest::Client::new(), session)
    }

    pub fn with_client(client: reqwest::Client, session: SessionState) -> Self {
        HttpMatchApi { client, session }
    }
}

impl MatchApi for HttpMatchApi {
    async fn fetch_match(&self, match_id: &str) -> Result<Match, ApiError> {
        let url = self.session.url(&format!("/matches/{match_id}"));

        let response = self
            .client
            .get(&url)
            .header(HEADER_AUTH, self.session.authorization())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let response_text = response.text().await?;
            return serde_json::from_str(&response_text).map_err(|e| ApiError::Decode(e.to_string()));
        }

        // an error body that is not JSON counts as a broken server, not as a refusal
        let body: ErrorResponse = response.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message: body.message },
            StatusCode::NOT_FOUND => ApiError::NotFound { message: body.message },
            _ => ApiError::Server {
                status: status.as_u16(),
                message: body.message,
            },
        })
    }

    async fn play_turn(
        &self,
        match_id: &str,
        turn_id: &str,
        request: &PlayTurnRequest,
    ) -> Result<PlayTurnReply, ApiError> {
        let url = self.session.url(&format!("/matches/{match_id}/turns/{turn_id}"));

        let response = self
            .client
            .post(&url)
            .header(HEADER_AUTH, self.session.authorization())
            .json(request)
            .send()
            .await?;

        Ok(match response.status() {
            StatusCode::ACCEPTED => PlayTurnReply::Accepted,
            StatusCode::BAD_REQUEST => PlayTurnReply::Rejected(
                response.json().await.map_err(|e| ApiError::Decode(e.to_string()))?,
            ),
            other => PlayTurnReply::Other(other.as_u16()),
        })
    }
}
