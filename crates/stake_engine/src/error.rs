//! Error types for the stake engine.
//!
//! - [`RejectReason`]: local pre-flight rejections from the lifecycle guard
//! - [`RevertReason`]: the closed set every ledger-reported failure is reduced to
//! - [`LedgerError`]: what ledger and indexer adapters return
//! - [`EngineError`]: everything surfaced to callers
//!
//! Nothing here is fatal: every failure is reported per operation and the
//! engine stays usable for subsequent intents.

use anchor_lang::prelude::Pubkey;
use thiserror::Error;

use crate::constants::LEDGER_ERROR_CODE_OFFSET;
use crate::orchestrator::StakeSlot;
use crate::state::{Amount, StakeId};

/// Why the lifecycle guard refused an intent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("amount is below the minimum stake")]
    BelowMinimum,

    #[error("amount exceeds the maximum stake")]
    AboveMaximum,

    #[error("insufficient token balance")]
    InsufficientBalance,

    #[error("staking period is not one of the allowed durations")]
    InvalidStakingPeriod,

    #[error("stake is not active")]
    StakeNotActive,

    #[error("no yield available to withdraw")]
    NoYieldAvailable,

    #[error("lock period has not ended")]
    LockNotExpired,

    #[error("amount exceeds the staked principal")]
    ExceedsPrincipal,

    #[error("batch contains no entries")]
    EmptyBatch,

    #[error("batch amounts and periods differ in length")]
    BatchLengthMismatch,
}

/// Normalized ledger rejection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevertReason {
    #[error("amount below minimum stake")]
    BelowMinimum,

    #[error("amount above maximum stake")]
    AboveMaximum,

    #[error("lock period not expired")]
    LockNotExpired,

    #[error("unauthorized")]
    Unauthorized,

    #[error("unknown ledger rejection")]
    Unknown,
}

/// Custom error codes of the staking ledger program and what they mean here.
///
/// Codes follow the program's error enum order from the custom error offset;
/// the program has no dedicated cap codes, so caps are only recognized by name.
const LEDGER_ERROR_CODES: &[(u32, RevertReason)] = &[
    // LockPeriodNotEnded
    (LEDGER_ERROR_CODE_OFFSET + 13, RevertReason::LockNotExpired),
    // Unauthorized, InvalidStakeOwner, UnauthorizedStakeAccess
    (LEDGER_ERROR_CODE_OFFSET + 20, RevertReason::Unauthorized),
    (LEDGER_ERROR_CODE_OFFSET + 21, RevertReason::Unauthorized),
    (LEDGER_ERROR_CODE_OFFSET + 22, RevertReason::Unauthorized),
];

/// Ledger error names, compacted to lowercase alphanumerics.
const LEDGER_ERROR_NAMES: &[(&str, RevertReason)] = &[
    ("belowminimum", RevertReason::BelowMinimum),
    ("lessthanminimum", RevertReason::BelowMinimum),
    ("stakebelowmin", RevertReason::BelowMinimum),
    ("abovemaximum", RevertReason::AboveMaximum),
    ("exceedsmaximum", RevertReason::AboveMaximum),
    ("stakeabovemax", RevertReason::AboveMaximum),
    ("locknotexpired", RevertReason::LockNotExpired),
    ("lockperiodnotended", RevertReason::LockNotExpired),
    ("stakestilllocked", RevertReason::LockNotExpired),
    ("unauthorized", RevertReason::Unauthorized),
    ("invalidstakeowner", RevertReason::Unauthorized),
    ("notowner", RevertReason::Unauthorized),
];

impl RevertReason {
    /// Reduce raw ledger error text to the closed set.
    ///
    /// The revert payload (text after `revert` up to the end of that line) is
    /// preferred when present; then known error names are matched, then
    /// custom program error codes.
    pub fn normalize(raw: &str) -> Self {
        let payload = revert_payload(raw).unwrap_or(raw);
        let compact: String = payload
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        for (name, reason) in LEDGER_ERROR_NAMES {
            if compact.contains(name) {
                return *reason;
            }
        }

        if let Some(code) = custom_error_code(raw) {
            for (known, reason) in LEDGER_ERROR_CODES {
                if *known == code {
                    return *reason;
                }
            }
        }

        RevertReason::Unknown
    }
}

fn revert_payload(raw: &str) -> Option<&str> {
    let start = raw.find("revert")? + "revert".len();
    let rest = &raw[start..];
    // "reverted with reason" and similar prefixes carry the reason after a colon
    let rest = rest.strip_prefix("ed").unwrap_or(rest);
    let rest = match rest.find(':') {
        Some(colon) if rest[..colon].chars().all(|c| c.is_ascii_alphabetic() || c == ' ') => {
            &rest[colon + 1..]
        }
        _ => rest,
    };
    let line = rest.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

/// Parses `custom program error: 0x1774` or `Error Number: 6020.`
fn custom_error_code(raw: &str) -> Option<u32> {
    let lower = raw.to_ascii_lowercase();
    if let Some(at) = lower.find("custom program error: 0x") {
        let hex: String = lower[at + "custom program error: 0x".len()..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        return u32::from_str_radix(&hex, 16).ok();
    }
    if let Some(at) = lower.find("error number: ") {
        let dec: String = lower[at + "error number: ".len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        return dec.parse().ok();
    }
    None
}

/// Failure reported by a ledger, indexer, or their adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger evaluated the operation and refused it.
    #[error("ledger rejected the operation: {0}")]
    Rejected(String),

    /// The ledger could not be reached or did not answer.
    #[error("ledger unreachable: {0}")]
    Transport(String),

    #[error("malformed ledger data: {0}")]
    Decode(String),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Error surfaced by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation rejected: {0}")]
    ValidationRejected(RejectReason),

    /// Allowance still below the required amount after a confirmed approval.
    #[error("allowance insufficient")]
    AllowanceInsufficient,

    #[error("approval failed: {0}")]
    ApprovalFailed(Box<EngineError>),

    #[error("simulation reverted: {0}")]
    SimulationReverted(RevertReason),

    /// The ledger confirmed the submission as reverted.
    #[error("operation reverted: {0}")]
    Reverted(RevertReason),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("confirmation timed out")]
    ConfirmationTimedOut,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("operation already in progress for {account} stake {slot}")]
    OperationInProgress { account: Pubkey, slot: StakeSlot },

    #[error("stake {stake_id} not found for {account}")]
    StakeNotFound { account: Pubkey, stake_id: StakeId },

    #[error("invalid cap policy: minimum {minimum} exceeds maximum {maximum}")]
    InvalidCapPolicy { minimum: Amount, maximum: Amount },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("arithmetic overflow")]
    MathOverflow,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("settlement task aborted: {0}")]
    TaskAborted(String),
}

impl EngineError {
    /// Failures for which re-issuing the same intent is safe and useful.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::SubmissionFailed(_) | EngineError::ConfirmationTimedOut => true,
            EngineError::ApprovalFailed(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn upstream(err: LedgerError) -> Self {
        EngineError::UpstreamUnavailable(err.to_string())
    }

    /// Map a failed dry run: a refusal is a revert, anything else means the
    /// ledger could not be asked.
    pub(crate) fn from_simulation(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(raw) => {
                EngineError::SimulationReverted(RevertReason::normalize(&raw))
            }
            other => EngineError::upstream(other),
        }
    }

    pub(crate) fn from_submission(err: LedgerError) -> Self {
        EngineError::SubmissionFailed(err.to_string())
    }
}

impl From<RejectReason> for EngineError {
    fn from(reason: RejectReason) -> Self {
        EngineError::ValidationRejected(reason)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("execution reverted: VMFStaking__BelowMinimum()", RevertReason::BelowMinimum; "evm custom error")]
    #[test_case("Error: revert StakeAboveMaximum\nat call", RevertReason::AboveMaximum; "revert prefix")]
    #[test_case("AnchorError occurred. Error Code: LockPeriodNotEnded. Error Number: 6013.", RevertReason::LockNotExpired; "anchor name")]
    #[test_case("Program failed: custom program error: 0x177d", RevertReason::LockNotExpired; "hex lock code")]
    #[test_case("Program failed: custom program error: 0x1784", RevertReason::Unauthorized; "hex unauthorized code")]
    #[test_case("Error Number: 6022.", RevertReason::Unauthorized; "decimal stake access code")]
    #[test_case("custom program error: 0x1776", RevertReason::Unknown; "insufficient staked balance is not a cap")]
    #[test_case("Error Number: 6007.", RevertReason::Unknown; "no rewards is not a cap")]
    #[test_case("Ownable: caller is not owner", RevertReason::Unauthorized; "not owner")]
    #[test_case("execution reverted: VMFStaking__InvalidStakeAmount()", RevertReason::Unknown; "ambiguous amount error")]
    #[test_case("", RevertReason::Unknown; "empty")]
    fn test_normalize(raw: &str, expected: RevertReason) {
        assert_eq!(RevertReason::normalize(raw), expected);
    }

    #[test]
    fn test_revert_payload_stops_at_line_end() {
        assert_eq!(
            revert_payload("call failed: revert LockNotExpired\nstack: ..."),
            Some("LockNotExpired")
        );
        assert_eq!(revert_payload("no reason here"), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::ConfirmationTimedOut.is_retryable());
        assert!(EngineError::SubmissionFailed("rpc".into()).is_retryable());
        assert!(
            EngineError::ApprovalFailed(Box::new(EngineError::ConfirmationTimedOut)).is_retryable()
        );
        assert!(!EngineError::SimulationReverted(RevertReason::Unknown).is_retryable());
        assert!(!EngineError::ValidationRejected(RejectReason::ZeroAmount).is_retryable());
        assert!(!EngineError::Reverted(RevertReason::Unauthorized).is_retryable());
    }

    #[test]
    fn test_simulation_transport_failure_is_upstream() {
        let err = EngineError::from_simulation(LedgerError::Transport("timeout".into()));
        assert!(matches!(err, EngineError::UpstreamUnavailable(_)));
    }
}
