use rust_fsm::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a single point grant.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GrantStage {
    Received,
    Checked,
    Written,
    Logged,
    Refused,
    RolledBack,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GrantEvent {
    /// No earlier record for the same student, activity and day.
    Clear,
    /// A duplicate exists but the override code matched.
    Overridden,
    Duplicate,
    CellWritten,
    AuditAppended,
    /// The audit append failed and the cell was put back.
    AuditFailed,
}

pub struct GrantFlow;

impl StateMachineImpl for GrantFlow {
    type Input = GrantEvent;
    type State = GrantStage;
    type Output = ();
    const INITIAL_STATE: Self::State = GrantStage::Received;

    fn transition(state: &Self::State, input: &Self::Input) -> Option<Self::State> {
        match (state, input) {
            (GrantStage::Received, GrantEvent::Clear | GrantEvent::Overridden) => {
                Some(GrantStage::Checked)
            }
            (GrantStage::Received, GrantEvent::Duplicate) => Some(GrantStage::Refused),
            (GrantStage::Checked, GrantEvent::CellWritten) => Some(GrantStage::Written),
            (GrantStage::Written, GrantEvent::AuditAppended) => Some(GrantStage::Logged),
            (GrantStage::Written, GrantEvent::AuditFailed) => Some(GrantStage::RolledBack),
            _ => None,
        }
    }

    fn output(_state: &Self::State, _input: &Self::Input) -> Option<Self::Output> {
        None
    }
}

impl GrantStage {
    /// True once nothing further can happen to the grant.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GrantStage::Logged | GrantStage::Refused | GrantStage::RolledBack
        )
    }

    /// Advance, or stay put when the event does not apply.
    pub fn advance(self, event: &GrantEvent) -> Result<GrantStage, GrantStage> {
        GrantFlow::transition(&self, event).ok_or(self)
    }
}

impl Default for GrantStage {
    fn default() -> Self {
        GrantFlow::INITIAL_STATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let stage = GrantStage::default()
            .advance(&GrantEvent::Clear)
            .and_then(|s| s.advance(&GrantEvent::CellWritten))
            .and_then(|s| s.advance(&GrantEvent::AuditAppended));
        assert_eq!(stage, Ok(GrantStage::Logged));
        assert!(GrantStage::Logged.is_terminal());
    }

    #[test]
    fn test_duplicate_is_terminal() {
        let stage = GrantStage::Received.advance(&GrantEvent::Duplicate).unwrap();
        assert_eq!(stage, GrantStage::Refused);
        assert_eq!(stage.advance(&GrantEvent::CellWritten), Err(GrantStage::Refused));
    }

    #[test]
    fn test_cannot_write_before_check() {
        assert_eq!(
            GrantStage::Received.advance(&GrantEvent::CellWritten),
            Err(GrantStage::Received)
        );
    }

    #[test]
    fn test_rollback_only_after_write() {
        assert_eq!(
            GrantStage::Written.advance(&GrantEvent::AuditFailed),
            Ok(GrantStage::RolledBack)
        );
        assert!(GrantStage::Checked.advance(&GrantEvent::AuditFailed).is_err());
    }
}
