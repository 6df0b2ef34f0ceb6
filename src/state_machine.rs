use std::fmt;

/// Ownership state of the platform media-routing slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Claiming,
    Active,
    Stale,
}

#[derive(Debug, Clone)]
pub struct StateTransitionError {
    from: SessionState,
    to: SessionState,
    message: String,
}

impl fmt::Display for StateTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid session transition from {:?} to {:?}: {}",
            self.from, self.to, self.message
        )
    }
}

impl std::error::Error for StateTransitionError {}

/// State machine for media session ownership with validation
pub struct SessionStateMachine {
    current_state: SessionState,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: SessionState::Inactive,
        }
    }

    pub fn current(&self) -> SessionState {
        self.current_state
    }

    /// Validate and perform state transition
    pub fn transition_to(&mut self, new_state: SessionState) -> Result<(), StateTransitionError> {
        if !is_valid_transition(self.current_state, new_state) {
            log::error!(
                "[SESSION] Transition INVALID: {:?} -> {:?}",
                self.current_state,
                new_state
            );
            return Err(StateTransitionError {
                from: self.current_state,
                to: new_state,
                message: "Transition not allowed by session rules".to_string(),
            });
        }

        let old_state = self.current_state;
        self.current_state = new_state;

        match (old_state, new_state) {
            (SessionState::Active, SessionState::Stale) => {
                log::info!("[SESSION] Quiet window elapsed, session may have been evicted");
            }
            (SessionState::Stale, SessionState::Claiming) => {
                log::info!("[SESSION] Re-claiming stale session");
            }
            (_, SessionState::Inactive) if old_state != SessionState::Inactive => {
                log::info!("[SESSION] Session released from {:?}", old_state);
            }
            (a, b) if a != b => {
                log::debug!("[SESSION] {:?} -> {:?}", a, b);
            }
            _ => {}
        }

        Ok(())
    }

    /// Check if a claim sequence may start from the current state
    pub fn can_claim(&self) -> bool {
        matches!(
            self.current_state,
            SessionState::Inactive | SessionState::Active | SessionState::Stale
        )
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.current_state, SessionState::Active)
    }
}

/// Pure transition rule table
pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    match (from, to) {
        // From Inactive
        (SessionState::Inactive, SessionState::Claiming) => true,

        // From Claiming
        (SessionState::Claiming, SessionState::Active) => true,
        (SessionState::Claiming, SessionState::Inactive) => true, // Teardown mid-claim

        // From Active
        (SessionState::Active, SessionState::Claiming) => true, // Refresh while owned
        (SessionState::Active, SessionState::Stale) => true,
        (SessionState::Active, SessionState::Inactive) => true,

        // From Stale
        (SessionState::Stale, SessionState::Claiming) => true,
        (SessionState::Stale, SessionState::Inactive) => true,

        // Same state transitions (no-op)
        (a, b) if a == b => true,

        _ => false,
    }
}
