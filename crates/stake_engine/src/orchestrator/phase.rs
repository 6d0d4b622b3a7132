use std::fmt;

/// Where an intent is in the protocol.
///
/// `Idle → Validating → AllowanceCheck → Approving → Simulating → Submitting
/// → Confirming → Settled | Failed`. `AllowanceCheck` and `Approving` only
/// occur for stake creation, and `Approving` only when the allowance is short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationPhase {
    Idle,
    Validating,
    AllowanceCheck,
    Approving,
    Simulating,
    Submitting,
    Confirming,
    Settled,
    Failed,
}

impl OperationPhase {
    /// Abandoning the intent is still possible; nothing has been submitted.
    pub fn is_cancellable(self) -> bool {
        self < OperationPhase::Submitting
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OperationPhase::Settled | OperationPhase::Failed)
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
