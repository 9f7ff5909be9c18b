//! Mutable state of the messaging session.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use hotdesk_protocol::messages::UserStatusUpdate;
use hotdesk_protocol::types::AuthenticatedUser;

use crate::client::SocketClient;
use crate::types::ConnectionState;

/// Everything the manager mutates, guarded by a single lock.
pub(crate) struct Session {
    /// Bumped by every teardown. Events, losses and attempt results
    /// carrying an older generation are stale and ignored.
    pub(crate) generation: u64,
    pub(crate) state: ConnectionState,
    pub(crate) token: Option<String>,
    pub(crate) client: Option<SocketClient>,
    /// Pending retry timer or in-flight connection attempt.
    pub(crate) pending_attempt: Option<CancellationToken>,
    pub(crate) attempts: u32,
    pub(crate) user: Option<AuthenticatedUser>,
    pub(crate) online: HashSet<String>,
    pub(crate) error: Option<String>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            generation: 0,
            state: ConnectionState::Disconnected,
            token: None,
            client: None,
            pending_attempt: None,
            attempts: 0,
            user: None,
            online: HashSet::new(),
            error: None,
        }
    }

    /// Ends the current session: invalidates its generation, cancels any
    /// pending attempt, closes the transport and clears the derived state.
    ///
    /// Returns `true` if a transport was open.
    pub(crate) fn teardown(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        if let Some(token) = self.pending_attempt.take() {
            token.cancel();
        }
        let had_client = match self.client.take() {
            Some(client) => {
                client.close();
                true
            }
            None => false,
        };
        self.user = None;
        self.online.clear();
        had_client
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.state == ConnectionState::Connected && self.user.is_some()
    }

    /// Applies a presence change. Removing an absent user is a no-op.
    pub(crate) fn apply_presence(&mut self, update: &UserStatusUpdate) {
        if update.is_online {
            self.online.insert(update.user_id.clone());
        } else {
            self.online.remove(&update.user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(user_id: &str, is_online: bool) -> UserStatusUpdate {
        UserStatusUpdate {
            user_id: user_id.into(),
            is_online,
        }
    }

    #[test]
    fn presence_insert_and_remove() {
        let mut session = Session::new();
        session.apply_presence(&presence("u1", true));
        session.apply_presence(&presence("u2", true));
        assert!(session.online.contains("u1"));

        session.apply_presence(&presence("u1", false));
        assert!(!session.online.contains("u1"));
        assert!(session.online.contains("u2"));
    }

    #[test]
    fn removing_absent_user_is_noop() {
        let mut session = Session::new();
        session.apply_presence(&presence("ghost", false));
        session.apply_presence(&presence("ghost", false));
        assert!(session.online.is_empty());
    }

    #[test]
    fn teardown_clears_derived_state() {
        let mut session = Session::new();
        let token = CancellationToken::new();
        session.pending_attempt = Some(token.clone());
        session.user = Some(AuthenticatedUser {
            id: "u1".into(),
            name: String::new(),
            email: String::new(),
            avatar: String::new(),
            role: String::new(),
        });
        session.apply_presence(&presence("u2", true));
        let before = session.generation;

        assert!(!session.teardown());

        assert!(token.is_cancelled());
        assert!(session.pending_attempt.is_none());
        assert!(session.user.is_none());
        assert!(session.online.is_empty());
        assert_eq!(session.generation, before + 1);
    }

    #[test]
    fn authenticated_requires_connected_state() {
        let mut session = Session::new();
        session.user = Some(AuthenticatedUser {
            id: "u1".into(),
            name: String::new(),
            email: String::new(),
            avatar: String::new(),
            role: String::new(),
        });
        assert!(!session.is_authenticated());
        session.state = ConnectionState::Connected;
        assert!(session.is_authenticated());
    }
}
