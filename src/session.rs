//! Auth/session seam. Authentication itself happens elsewhere; the core only
//! needs the id of whoever is acting.

use uuid::Uuid;

pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<Uuid>;
}

/// Session with a fixed identity, e.g. taken from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticSession {
    user_id: Option<Uuid>,
}

impl StaticSession {
    pub fn signed_in(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<Uuid> {
        self.user_id
    }
}
