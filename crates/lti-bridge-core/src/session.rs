//! Request-scoped session state.
//!
//! The HTTP layer resolves the session cookie into a [`RequestSession`] before
//! dispatch and persists [`RequestSession::change`] afterwards.

use crate::model::AccountId;

/// Session operations the resolver and the capability gate rely on.
pub trait SessionStore {
    fn current_session(&self) -> Option<AccountId>;
    fn start_session(&mut self, account: AccountId);
    fn end_session(&mut self);
}

/// What happened to the session during one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Unchanged,
    Started(AccountId),
    Ended,
}

#[derive(Debug, Clone)]
pub struct RequestSession {
    current: Option<AccountId>,
    change: SessionChange,
}

impl RequestSession {
    pub fn anonymous() -> Self {
        Self {
            current: None,
            change: SessionChange::Unchanged,
        }
    }

    pub fn for_account(account: AccountId) -> Self {
        Self {
            current: Some(account),
            change: SessionChange::Unchanged,
        }
    }

    pub fn change(&self) -> SessionChange {
        self.change
    }
}

impl Default for RequestSession {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl SessionStore for RequestSession {
    fn current_session(&self) -> Option<AccountId> {
        self.current
    }

    fn start_session(&mut self, account: AccountId) {
        self.current = Some(account);
        self.change = SessionChange::Started(account);
    }

    fn end_session(&mut self) {
        self.current = None;
        self.change = SessionChange::Ended;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_then_start_reports_started() {
        let mut s = RequestSession::for_account(AccountId(1));
        s.end_session();
        assert_eq!(s.change(), SessionChange::Ended);
        s.start_session(AccountId(2));
        assert_eq!(s.current_session(), Some(AccountId(2)));
        assert_eq!(s.change(), SessionChange::Started(AccountId(2)));
    }

    #[test]
    fn test_untouched_session_is_unchanged() {
        let s = RequestSession::for_account(AccountId(5));
        assert_eq!(s.change(), SessionChange::Unchanged);
        assert_eq!(RequestSession::anonymous().current_session(), None);
    }
}
