use crate::types::Principal;

/// Per-request context carrying routing and identity information.
/// Threaded from the transport layer through dispatch into every handler.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Identifier used to correlate log lines for this request.
    pub request_id: String,
    /// Name of the dataset the request is addressed to.
    pub dataset: String,
    /// Name of the endpoint within that dataset.
    pub endpoint: String,
    /// Authenticated principal, if the request is authenticated.
    pub principal: Option<Principal>,
}

impl RequestContext {
    #[must_use]
    pub fn new(dataset: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Attaches an authenticated user to the context.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.principal = Some(Principal::new(user));
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// User name of the authenticated principal, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.id.as_str())
    }
}
