//! Shipping stage enumeration.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not one of the four stage labels.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized shipping stage: {0:?}")]
pub struct ParseStageError(pub String);

/// The fulfillment stage of a paid order.
///
/// Stages are ordered; [`ShippingStage::Delivered`] is terminal. The label is
/// what admins submit and what is stored in `shipping_status`; the index is
/// stored alongside it in `shipping_stage_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ShippingStage {
    #[default]
    Processing,
    Shipped,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
}

impl ShippingStage {
    /// All stages in fulfillment order.
    pub const ALL: [Self; 4] = [
        Self::Processing,
        Self::Shipped,
        Self::InTransit,
        Self::Delivered,
    ];

    /// Human-readable label, as shown to buyers and stored in the database.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::InTransit => "In Transit",
            Self::Delivered => "Delivered",
        }
    }

    /// Fixed ordinal of the stage (0 for `Processing` through 3 for `Delivered`).
    #[must_use]
    pub const fn index(self) -> i16 {
        match self {
            Self::Processing => 0,
            Self::Shipped => 1,
            Self::InTransit => 2,
            Self::Delivered => 3,
        }
    }

    /// Look a stage up by its ordinal.
    #[must_use]
    pub fn from_index(index: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.index() == index)
    }

    /// Whether this is the terminal stage.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for ShippingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ShippingStage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.label() == s.trim())
            .ok_or_else(|| ParseStageError(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip_through_from_str() {
        for stage in ShippingStage::ALL {
            assert_eq!(stage.label().parse::<ShippingStage>(), Ok(stage));
        }
    }

    #[test]
    fn test_index_matches_order() {
        assert_eq!(ShippingStage::Processing.index(), 0);
        assert_eq!(ShippingStage::Delivered.index(), 3);
        assert_eq!(ShippingStage::from_index(2), Some(ShippingStage::InTransit));
        assert_eq!(ShippingStage::from_index(4), None);
        assert!(ShippingStage::Shipped < ShippingStage::InTransit);
    }

    #[test]
    fn test_unrecognized_label() {
        assert_eq!(
            "Lost".parse::<ShippingStage>(),
            Err(ParseStageError("Lost".to_string()))
        );
        // Labels are case sensitive, like the stored column.
        assert!("shipped".parse::<ShippingStage>().is_err());
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&ShippingStage::InTransit).unwrap_or_default();
        assert_eq!(json, "\"In Transit\"");
    }
}
