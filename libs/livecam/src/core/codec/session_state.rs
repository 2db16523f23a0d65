// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use parking_lot::Mutex;

/// Lifecycle shared by encode and resample sessions.
///
/// `Uninitialized -> Configuring -> Ready <-> Encoding`, or `Failed` from
/// `Configuring`. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    Configuring,
    Ready,
    /// A frame is inside the encoder or converter.
    Encoding,
    Failed,
}

impl SessionState {
    /// Accepts work.
    pub fn is_ready(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Encoding)
    }

    pub fn is_failed(self) -> bool {
        self == SessionState::Failed
    }
}

/// Session state readable from any thread.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<SessionState>,
    component: &'static str,
}

impl StateCell {
    pub(crate) fn new(component: &'static str) -> Self {
        Self {
            state: Mutex::new(SessionState::Uninitialized),
            component,
        }
    }

    pub(crate) fn get(&self) -> SessionState {
        *self.state.lock()
    }

    pub(crate) fn set(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state != next {
            tracing::trace!("[{}] {:?} -> {:?}", self.component, *state, next);
            *state = next;
        }
    }

    /// Move from `from` to `to` only if currently in `from`.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state == from {
            tracing::trace!("[{}] {:?} -> {:?}", self.component, from, to);
            *state = to;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_only_from_expected_state() {
        let cell = StateCell::new("Test");
        assert!(!cell.transition(SessionState::Ready, SessionState::Encoding));
        assert!(cell.transition(SessionState::Uninitialized, SessionState::Configuring));
        cell.set(SessionState::Ready);
        assert!(cell.get().is_ready());
        assert!(cell.transition(SessionState::Ready, SessionState::Encoding));
        assert!(cell.get().is_ready());
    }
}
