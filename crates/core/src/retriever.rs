use crate::framework::TrainingFrameworkDocument;
use reqwest::{StatusCode, Url};

pub const DEFAULT_FLOWS_BASE_URL: &str = "http://127.0.0.1:6970";

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Training framework request failed with status {status}")]
    RetrievalFailed { status: StatusCode },
    #[error("Malformed training framework: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("Invalid flows base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("No session id to fetch a training framework for")]
    EmptySessionId,
}

/// HTTP client for the `GET /flows/{session_id}` endpoint.
#[derive(Debug, Clone)]
pub struct FlowClient {
    client: reqwest::Client,
    base_url: Url,
}

impl FlowClient {
    pub fn new(base_url: &str) -> Result<Self, RetrievalError> {
        let parsed =
            Url::parse(base_url).map_err(|e| RetrievalError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(RetrievalError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn flow_url(&self, session_id: &str) -> Result<Url, RetrievalError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RetrievalError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("flows")
            .push(session_id);
        Ok(url)
    }

    /// Fetches the training framework produced for a finished session.
    ///
    /// Single request, no retries. Non-2xx responses are failures and are
    /// never parsed as a document.
    pub async fn fetch(&self, session_id: &str) -> Result<TrainingFrameworkDocument, RetrievalError> {
        if session_id.trim().is_empty() {
            return Err(RetrievalError::EmptySessionId);
        }
        let url = self.flow_url(session_id)?;
        tracing::debug!("fetching training framework: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("training framework request for {} failed: {}", session_id, status);
            return Err(RetrievalError::RetrievalFailed { status });
        }

        let body = response.text().await?;
        let document: TrainingFrameworkDocument = serde_json::from_str(&body)?;
        tracing::info!(
            "training framework for {} received: {:?} ({} steps)",
            session_id,
            document.title,
            document.steps.len()
        );
        Ok(document)
    }
}

#[derive(Debug, Default)]
pub enum RetrievalState {
    #[default]
    Idle,
    Loading,
    Loaded(TrainingFrameworkDocument),
    Failed(RetrievalError),
}

impl RetrievalState {
    pub fn data(&self) -> Option<&TrainingFrameworkDocument> {
        match self {
            RetrievalState::Loaded(document) => Some(document),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RetrievalError> {
        match self {
            RetrievalState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RetrievalState::Loading)
    }
}

/// Identifies one issued fetch; only the newest ticket may update the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    session_id: String,
}

impl FetchTicket {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Loading/error/data state for the training framework of one session id.
///
/// A fetch is issued once per distinct non-empty id. Responses for an id
/// that has since been replaced are discarded.
#[derive(Debug, Default)]
pub struct ArtifactRetriever {
    session_id: Option<String>,
    generation: u64,
    state: RetrievalState,
}

impl ArtifactRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RetrievalState {
        &self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Starts loading `session_id`, unless it is empty or already current.
    pub fn request(&mut self, session_id: &str) -> Option<FetchTicket> {
        if session_id.trim().is_empty() {
            tracing::debug!("no session id yet, nothing to fetch");
            return None;
        }
        if self.session_id.as_deref() == Some(session_id) {
            return None;
        }
        self.session_id = Some(session_id.to_string());
        Some(self.issue())
    }

    /// Re-issues the request for the current id after a failure.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        match (&self.state, &self.session_id) {
            (RetrievalState::Failed(_), Some(_)) => Some(self.issue()),
            _ => None,
        }
    }

    fn issue(&mut self) -> FetchTicket {
        self.generation += 1;
        self.state = RetrievalState::Loading;
        FetchTicket {
            generation: self.generation,
            session_id: self.session_id.clone().unwrap_or_default(),
        }
    }

    /// Applies a finished fetch. Returns `false` when the response was stale.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<TrainingFrameworkDocument, RetrievalError>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!("discarding stale response for {}", ticket.session_id);
            return false;
        }
        self.state = match result {
            Ok(document) => RetrievalState::Loaded(document),
            Err(error) => {
                tracing::error!("Fetch Error: {}", error);
                RetrievalState::Failed(error)
            }
        };
        true
    }

    /// Requests and awaits the fetch inline.
    pub async fn load(&mut self, client: &FlowClient, session_id: &str) -> &RetrievalState {
        if let Some(ticket) = self.request(session_id) {
            let result = client.fetch(ticket.session_id()).await;
            self.complete(ticket, result);
        }
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(title: &str) -> TrainingFrameworkDocument {
        TrainingFrameworkDocument {
            title: title.to_string(),
            description: String::new(),
            usage: String::new(),
            usage_context: String::new(),
            steps: Vec::new(),
        }
    }

    #[test]
    fn test_empty_ids_are_never_requested() {
        let mut retriever = ArtifactRetriever::new();
        assert!(retriever.request("").is_none());
        assert!(retriever.request("   ").is_none());
        assert!(matches!(retriever.state(), RetrievalState::Idle));
    }

    #[test]
    fn test_the_same_id_is_requested_once() {
        let mut retriever = ArtifactRetriever::new();
        let ticket = retriever.request("abc123").unwrap();
        assert!(retriever.state().is_loading());
        assert!(retriever.request("abc123").is_none());

        assert!(retriever.complete(ticket, Ok(document("X"))));
        assert!(retriever.request("abc123").is_none());
        assert_eq!(retriever.state().data().unwrap().title, "X");
    }

    #[test]
    fn test_late_response_for_a_replaced_id_is_discarded() {
        let mut retriever = ArtifactRetriever::new();
        let first = retriever.request("A").unwrap();
        let second = retriever.request("B").unwrap();

        assert!(retriever.complete(second, Ok(document("from B"))));
        assert!(!retriever.complete(first, Ok(document("from A"))));

        assert_eq!(retriever.session_id(), Some("B"));
        assert_eq!(retriever.state().data().unwrap().title, "from B");
    }

    #[test]
    fn test_late_error_for_a_replaced_id_is_discarded() {
        let mut retriever = ArtifactRetriever::new();
        let first = retriever.request("A").unwrap();
        let second = retriever.request("B").unwrap();

        assert!(!retriever.complete(
            first,
            Err(RetrievalError::RetrievalFailed {
                status: StatusCode::INTERNAL_SERVER_ERROR
            })
        ));
        assert!(retriever.state().is_loading());
        assert!(retriever.complete(second, Ok(document("from B"))));
    }

    #[test]
    fn test_retry_only_after_failure() {
        let mut retriever = ArtifactRetriever::new();
        assert!(retriever.retry().is_none());

        let ticket = retriever.request("abc123").unwrap();
        retriever.complete(
            ticket,
            Err(RetrievalError::RetrievalFailed {
                status: StatusCode::BAD_GATEWAY,
            }),
        );
        assert!(matches!(
            retriever.state().error(),
            Some(RetrievalError::RetrievalFailed { status }) if *status == StatusCode::BAD_GATEWAY
        ));

        let retry = retriever.retry().unwrap();
        assert_eq!(retry.session_id(), "abc123");
        assert!(retriever.state().is_loading());
        assert!(retriever.retry().is_none());
    }

    #[test]
    fn test_flow_url_escapes_the_session_id() {
        let client = FlowClient::new("http://127.0.0.1:6970/").unwrap();
        assert_eq!(
            client.flow_url("abc123").unwrap().as_str(),
            "http://127.0.0.1:6970/flows/abc123"
        );
        assert_eq!(
            client.flow_url("a/b c").unwrap().as_str(),
            "http://127.0.0.1:6970/flows/a%2Fb%20c"
        );
    }

    #[test]
    fn test_base_url_must_be_hierarchical() {
        assert!(matches!(
            FlowClient::new("mailto:someone@example.com"),
            Err(RetrievalError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            FlowClient::new("not a url"),
            Err(RetrievalError::InvalidBaseUrl(_))
        ));
    }
}
