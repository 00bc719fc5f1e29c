//! Shipping stage state machine.
//!
//! Admins may move an order to any of the four stages, including backwards or
//! skipping ahead; regressions are reported so callers can log them. Asking
//! for the stage the order is already in is an explicit no-op, which is how
//! the lifecycle avoids mailing the same update twice.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::order::ShippingState;
use crate::types::{ParseStageError, ShippingStage};

/// Validation errors for a stage change request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShippingError {
    /// The request carried no stage at all.
    #[error("no shipping stage selected")]
    NoStageSelected,
    /// The request named a stage that does not exist.
    #[error(transparent)]
    Unrecognized(#[from] ParseStageError),
}

/// A stage change that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageChange {
    pub from: ShippingStage,
    pub to: ShippingStage,
    pub at: DateTime<Utc>,
}

impl StageChange {
    /// Whether the change moved the order to an earlier stage.
    #[must_use]
    pub fn is_regression(&self) -> bool {
        self.to < self.from
    }
}

/// Result of [`advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The order was already in the requested stage; nothing changed.
    AlreadyInStage(ShippingStage),
    /// The order moved to a new stage.
    Moved(StageChange),
}

/// Parse an admin-submitted stage label.
///
/// # Errors
///
/// Returns `ShippingError::NoStageSelected` for a missing or blank value and
/// `ShippingError::Unrecognized` for anything that is not a stage label.
pub fn parse_requested(requested: Option<&str>) -> Result<ShippingStage, ShippingError> {
    let requested = requested
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ShippingError::NoStageSelected)?;
    Ok(requested.parse::<ShippingStage>()?)
}

/// Move `state` to the requested stage at time `now`.
///
/// The stage's timestamp is stamped only the first time the stage is
/// entered; revisiting a stage after a regression keeps the original time.
///
/// # Errors
///
/// Returns a `ShippingError` if `requested` is missing or unrecognized. The
/// state is left untouched in that case.
pub fn advance(
    state: &mut ShippingState,
    requested: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Advance, ShippingError> {
    let target = parse_requested(requested)?;
    Ok(advance_to(state, target, now))
}

/// Move `state` to an already parsed `target` stage.
pub fn advance_to(state: &mut ShippingState, target: ShippingStage, now: DateTime<Utc>) -> Advance {
    let from = state.stage();
    if from == target {
        return Advance::AlreadyInStage(target);
    }

    state.stage = target;
    let slot = state.slot_mut(target);
    if slot.is_none() {
        *slot = Some(now);
    }

    Advance::Moved(StageChange {
        from,
        to: target,
        at: now,
    })
}
