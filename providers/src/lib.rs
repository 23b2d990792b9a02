//! Generation backend client.
//!
//! The orchestration core consumes the backend as a black box: a request
//! carrying the prompt, the current file snapshot, recent history, an
//! optional image and the project config goes out; a [`GenerationResult`]
//! comes back. Prompt construction, model selection and schema enforcement
//! all live on the other side of this boundary.
//!
//! [`GenerationBackend`] is the seam the engine is generic over; the
//! shipped implementation is [`HttpBackend`], a JSON-over-HTTP client with
//! the retry policy in [`retry`].

mod http;
pub mod retry;

pub use http::HttpBackend;

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

use atelier_types::{GenerationRequest, GenerationResult};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Failure talking to the generation backend.
///
/// All variants are category (a) failures in the orchestration core's error
/// taxonomy: surfaced to the user, queue cleared, file store untouched.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("generation backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("could not reach the generation backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation backend returned an unparseable response: {0}")]
    Malformed(String),
}

/// One outbound generation call. No streaming: the whole result arrives at
/// once or the call fails.
pub trait GenerationBackend: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResult, BackendError>> + Send;
}

/// Shared hardened HTTP client: connect timeout, no redirects, TLS only.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .https_only(true)
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("failed to build hardened HTTP client, using defaults: {e}");
                reqwest::Client::new()
            })
    })
}

/// Read an error body without trusting the server about its size.
pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(mut body) => {
            if body.len() > MAX_ERROR_BODY_BYTES {
                body.truncate(MAX_ERROR_BODY_BYTES);
            }
            body
        }
        Err(e) => format!("<error body unavailable: {e}>"),
    }
}
