//! Terminal state of a task attempt

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Final state of one task attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    /// Task returned normally
    Success,

    /// Task raised an error, exceeded its deadline, or asked to be failed
    Failed,

    /// Task was stopped by an external kill request
    Killed,
}

impl TerminalState {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalState::Success)
    }

    /// Get display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            TerminalState::Success => "SUCCESS",
            TerminalState::Failed => "FAILED",
            TerminalState::Killed => "KILLED",
        }
    }

    fn to_raw(self) -> u8 {
        match self {
            TerminalState::Success => 1,
            TerminalState::Failed => 2,
            TerminalState::Killed => 3,
        }
    }

    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(TerminalState::Success),
            2 => Some(TerminalState::Failed),
            3 => Some(TerminalState::Killed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for TerminalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(TerminalState::Success),
            "FAILED" => Ok(TerminalState::Failed),
            "KILLED" => Ok(TerminalState::Killed),
            other => Err(format!("unknown terminal state '{}'", other)),
        }
    }
}

/// Write-once register holding the terminal state
///
/// Unset means the attempt is still running. The first successful
/// `try_set` wins; every later writer gets the winning state back.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

const RUNNING: u8 = 0;

impl StateCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(RUNNING))
    }

    pub fn get(&self) -> Option<TerminalState> {
        TerminalState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }

    /// Claim the cell for `state`, or return the state already stored
    pub fn try_set(&self, state: TerminalState) -> Result<(), TerminalState> {
        match self
            .0
            .compare_exchange(RUNNING, state.to_raw(), Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(existing) => Err(TerminalState::from_raw(existing).unwrap_or(state)),
        }
    }

    /// Claim the cell for `candidate` and return whatever state it now holds
    pub fn settle(&self, candidate: TerminalState) -> TerminalState {
        match self.try_set(candidate) {
            Ok(()) => candidate,
            Err(existing) => existing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_cell_starts_running() {
        let cell = StateCell::new();
        assert!(!cell.is_set());
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn test_cell_write_once() {
        let cell = StateCell::new();
        assert_eq!(cell.try_set(TerminalState::Success), Ok(()));
        assert_eq!(
            cell.try_set(TerminalState::Killed),
            Err(TerminalState::Success)
        );
        assert_eq!(cell.settle(TerminalState::Failed), TerminalState::Success);
        assert_eq!(cell.get(), Some(TerminalState::Success));
    }

    #[test]
    fn test_cell_single_winner_under_race() {
        let cell = Arc::new(StateCell::new());
        let candidates = [
            TerminalState::Success,
            TerminalState::Failed,
            TerminalState::Killed,
        ];

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let cell = Arc::clone(&cell);
                let state = candidates[i % candidates.len()];
                thread::spawn(move || cell.try_set(state).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(cell.is_set());
    }

    #[test]
    fn test_state_parse_and_display() {
        assert_eq!("failed".parse::<TerminalState>(), Ok(TerminalState::Failed));
        assert!("WARNING".parse::<TerminalState>().is_err());
        assert_eq!(TerminalState::Killed.to_string(), "KILLED");
        assert_eq!(
            serde_json::to_string(&TerminalState::Success).unwrap(),
            "\"SUCCESS\""
        );
    }
}
