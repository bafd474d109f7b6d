/// Who is placing the order, injected by the host application
pub trait SessionContext: Send + Sync {
    fn user_id(&self) -> Option<String>;

    fn auth_token(&self) -> Option<String>;

    /// User id to attach to orders; only trusted alongside a live token
    fn authenticated_user(&self) -> Option<String> {
        match self.auth_token() {
            Some(token) if !token.trim().is_empty() => {
                self.user_id().filter(|id| !id.trim().is_empty())
            }
            _ => None,
        }
    }
}

/// No signed-in user
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSession;

impl SessionContext for AnonymousSession {
    fn user_id(&self) -> Option<String> {
        None
    }

    fn auth_token(&self) -> Option<String> {
        None
    }
}

/// Fixed credentials, for hosts that resolve the session up front
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user_id: Option<String>,
    auth_token: Option<String>,
}

impl StaticSession {
    pub fn new(user_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            auth_token: Some(auth_token.into()),
        }
    }
}

impl SessionContext for StaticSession {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn auth_token(&self) -> Option<String> {
        self.auth_token.clone()
    }
}
