use bigdecimal::BigDecimal;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::{Operation, ProcessorContext, Stage};
use crate::domain::{AccountId, DeadLetter, TransactionError};
use crate::ports::AccountServiceError;

/// Retry schedule for reversing a balance change that a later step made
/// invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompensationPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after.
    pub backoff: Duration,
}

impl Default for CompensationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl CompensationPolicy {
    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// A reversal still owed to one account: add `delta` to its balance.
pub(crate) struct Reversal {
    pub account_id: AccountId,
    pub delta: BigDecimal,
}

/// Why a reversal was left to an operator.
struct Unapplied {
    reason: String,
    attempts: u32,
}

enum ReversalFailure {
    Remote(AccountServiceError),
    /// Taking the amount back would leave the account below zero.
    WouldOverdraw { balance: BigDecimal },
}

impl fmt::Display for ReversalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReversalFailure::Remote(e) => write!(f, "{e}"),
            ReversalFailure::WouldOverdraw { balance } => {
                write!(f, "reversal would overdraw account (balance {balance})")
            }
        }
    }
}

/// Applies `reversals` in order and returns the error the caller should
/// surface.
///
/// Stops at the first reversal that cannot be applied: that one and every
/// reversal after it become dead letters, and the result is
/// `CompensationFailed`. When everything is reversed, `cause` comes back
/// unchanged.
pub(crate) async fn compensate(
    ctx: &ProcessorContext,
    op: &Operation,
    reversals: Vec<Reversal>,
    cause: TransactionError,
) -> TransactionError {
    let mut pending = reversals.into_iter();

    while let Some(reversal) = pending.next() {
        let unapplied = match reverse(ctx, op, &reversal).await {
            Ok(()) => continue,
            Err(unapplied) => unapplied,
        };

        let failed = std::iter::once((reversal, unapplied.reason, unapplied.attempts))
            .chain(pending.map(|r| (r, "not attempted".to_string(), 0)));
        let dead_letters = dead_letter_all(ctx, op, failed).await;

        return TransactionError::CompensationFailed {
            cause: Box::new(cause),
            dead_letters,
        };
    }

    cause
}

/// Records `reversals` as dead letters without applying any of them.
///
/// Used when a step failed without saying whether it took effect, so
/// reversing could undo something that never happened.
pub(crate) async fn hold(
    ctx: &ProcessorContext,
    op: &Operation,
    reversals: Vec<Reversal>,
    reason: String,
    cause: TransactionError,
) -> TransactionError {
    tracing::warn!(operation_id = %op.id, error = %cause, "{reason}; leaving balances to an operator");
    let held = reversals.into_iter().map(|r| (r, reason.clone(), 0));
    let dead_letters = dead_letter_all(ctx, op, held).await;

    TransactionError::CompensationFailed {
        cause: Box::new(cause),
        dead_letters,
    }
}

async fn dead_letter_all(
    ctx: &ProcessorContext,
    op: &Operation,
    failed: impl Iterator<Item = (Reversal, String, u32)>,
) -> Vec<Uuid> {
    let mut dead_letters = Vec::new();
    for (reversal, reason, attempts) in failed {
        let letter = DeadLetter::new(op.id, reversal.account_id, reversal.delta, reason, attempts);
        if let Err(e) = ctx.dead_letters.push(&letter).await {
            tracing::error!(
                operation_id = %op.id,
                dead_letter_id = %letter.id,
                account_id = letter.account_id,
                delta = %letter.balance_delta,
                error = %e,
                "Failed to persist dead letter"
            );
        }
        dead_letters.push(letter.id);
    }
    dead_letters
}

async fn reverse(ctx: &ProcessorContext, op: &Operation, reversal: &Reversal) -> Result<(), Unapplied> {
    let policy = ctx.compensation;
    let mut last_error = String::new();

    for attempt in 1..=policy.attempts() {
        match try_reverse(ctx, reversal).await {
            Ok(()) => {
                ctx.observer.observe(
                    op,
                    Stage::Compensated {
                        account_id: reversal.account_id,
                        delta: &reversal.delta,
                    },
                );
                return Ok(());
            }
            Err(e @ ReversalFailure::WouldOverdraw { .. }) => {
                tracing::warn!(
                    operation_id = %op.id,
                    account_id = reversal.account_id,
                    delta = %reversal.delta,
                    error = %e,
                    "Compensation refused"
                );
                return Err(Unapplied {
                    reason: e.to_string(),
                    attempts: attempt,
                });
            }
            Err(e) => {
                tracing::warn!(
                    operation_id = %op.id,
                    account_id = reversal.account_id,
                    attempt,
                    error = %e,
                    "Compensation attempt failed"
                );
                last_error = e.to_string();
                if attempt < policy.attempts() {
                    tokio::time::sleep(policy.delay(attempt)).await;
                }
            }
        }
    }

    Err(Unapplied {
        reason: last_error,
        attempts: policy.attempts(),
    })
}

// Re-reads the account so the reversal applies on top of whatever happened
// since the original write, guarded by the fresh version token.
async fn try_reverse(ctx: &ProcessorContext, reversal: &Reversal) -> Result<(), ReversalFailure> {
    let snapshot = ctx
        .accounts
        .fetch_account(reversal.account_id)
        .await
        .map_err(ReversalFailure::Remote)?;
    let restored = &snapshot.balance + &reversal.delta;
    if restored < BigDecimal::from(0) {
        return Err(ReversalFailure::WouldOverdraw {
            balance: snapshot.balance,
        });
    }
    ctx.accounts
        .adjust_balance(reversal.account_id, &restored, snapshot.version.as_ref())
        .await
        .map_err(ReversalFailure::Remote)
}
