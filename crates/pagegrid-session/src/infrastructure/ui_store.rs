//! Injectable UI state shared by every page of the client.
//!
//! Holds what sits outside any single page: whether the sidebar is open and
//! who is signed in.  Components read the current value with [`UiStore::get`]
//! or watch it with [`UiStore::subscribe`]; every change goes through
//! [`UiStore::update`].
//!
//! # Why a `watch` channel? (for beginners)
//!
//! `tokio::sync::watch` keeps exactly one current value and wakes every
//! receiver when it changes.  Receivers that fall behind only ever see the
//! latest value, which is what UI state needs.  Each store is an ordinary
//! value, so tests can create as many independent stores as they like.

use pagegrid_core::UserContext;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub sidebar_open: bool,
    /// `None` until someone signs in.
    pub user: Option<UserContext>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            user: None,
        }
    }
}

#[derive(Debug)]
pub struct UiStore {
    tx: watch::Sender<UiState>,
}

impl UiStore {
    pub fn new(initial: UiState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// A copy of the current state.
    pub fn get(&self) -> UiState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.tx.subscribe()
    }

    /// Applies `change` and notifies every subscriber.
    pub fn update(&self, change: impl FnOnce(&mut UiState)) {
        self.tx.send_modify(change);
    }

    pub fn toggle_sidebar(&self) {
        self.update(|state| state.sidebar_open = !state.sidebar_open);
    }

    pub fn sign_in(&self, user: UserContext) {
        self.update(|state| state.user = Some(user));
    }

    pub fn sign_out(&self) {
        self.update(|state| state.user = None);
    }
}

impl Default for UiStore {
    fn default() -> Self {
        Self::new(UiState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagegrid_core::Role;

    #[test]
    fn test_default_state_has_open_sidebar_and_no_user() {
        let store = UiStore::default();
        assert_eq!(store.get(), UiState::default());
        assert!(store.get().sidebar_open);
    }

    #[test]
    fn test_stores_are_independent() {
        let first = UiStore::default();
        let second = UiStore::default();

        first.toggle_sidebar();

        assert!(!first.get().sidebar_open);
        assert!(second.get().sidebar_open);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        // Arrange
        let store = UiStore::default();
        let mut rx = store.subscribe();

        // Act
        store.sign_in(UserContext::new("alice", Role::Admin));

        // Assert
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().user.as_ref().map(|u| u.username.as_str()),
            Some("alice")
        );
    }

    #[test]
    fn test_sign_out_clears_user() {
        let store = UiStore::default();
        store.sign_in(UserContext::new("bob", Role::User));

        store.sign_out();

        assert!(store.get().user.is_none());
    }
}
