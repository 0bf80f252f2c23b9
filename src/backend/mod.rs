mod client;
mod error;
mod wire;

use async_trait::async_trait;

pub(crate) use client::BackendClient;
pub(crate) use error::BackendError;

use crate::domain::{ResultSummary, SessionToken};

/// Session-side surface of the API, behind a trait so the runner can be
/// driven against an in-memory transport in tests.
#[async_trait]
pub(crate) trait SessionTransport: Send + Sync + 'static {
    async fn record_answer(
        &self,
        token: &SessionToken,
        question_number: u32,
        option: &str,
    ) -> Result<(), BackendError>;

    async fn clear_answer(
        &self,
        token: &SessionToken,
        question_number: u32,
    ) -> Result<(), BackendError>;

    async fn complete_session(&self, token: &SessionToken) -> Result<ResultSummary, BackendError>;
}

#[async_trait]
impl SessionTransport for BackendClient {
    async fn record_answer(
        &self,
        token: &SessionToken,
        question_number: u32,
        option: &str,
    ) -> Result<(), BackendError> {
        BackendClient::record_answer(self, token, question_number, option).await
    }

    async fn clear_answer(
        &self,
        token: &SessionToken,
        question_number: u32,
    ) -> Result<(), BackendError> {
        BackendClient::clear_answer(self, token, question_number).await
    }

    async fn complete_session(&self, token: &SessionToken) -> Result<ResultSummary, BackendError> {
        BackendClient::complete_session(self, token).await
    }
}
