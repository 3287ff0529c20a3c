//! Market lifecycle phase and operation gating
//!
//! The phase is never derived from a local clock. It is read from the
//! authoritative market and only validated here.

use core::fmt;

use crate::{MarketError, Result};

/// Lifecycle phase, in contract enum order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Pending,
    Open,
    Frozen,
    Settled,
}

/// User-facing market operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Mint,
    PairRedeem,
    Redeem,
}

impl Phase {
    /// Decode the on-chain phase tag
    pub fn from_tag(tag: u64) -> Result<Self> {
        match tag {
            0 => Ok(Phase::Pending),
            1 => Ok(Phase::Open),
            2 => Ok(Phase::Frozen),
            3 => Ok(Phase::Settled),
            other => Err(MarketError::UnknownPhase(other)),
        }
    }

    pub fn tag(self) -> u64 {
        match self {
            Phase::Pending => 0,
            Phase::Open => 1,
            Phase::Frozen => 2,
            Phase::Settled => 3,
        }
    }

    pub fn permits(self, op: Operation) -> bool {
        match op {
            Operation::Mint | Operation::PairRedeem => self == Phase::Open,
            Operation::Redeem => self == Phase::Settled,
        }
    }

    /// Whether an observation of `self` may follow a previous observation.
    ///
    /// The market only moves forward. Two polls can straddle more than one
    /// transition, so skipping ahead is accepted; going back is not.
    pub fn can_follow(self, previous: Phase) -> bool {
        self >= previous
    }
}

/// Gate an operation on the current phase
pub fn ensure_permitted(phase: Phase, op: Operation) -> Result<()> {
    if phase.permits(op) {
        Ok(())
    } else {
        Err(MarketError::OperationNotPermitted { phase, op })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Pending => "Pending",
            Phase::Open => "Open",
            Phase::Frozen => "Frozen",
            Phase::Settled => "Settled",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Mint => "mint",
            Operation::PairRedeem => "pair redeem",
            Operation::Redeem => "redeem",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 4] = [Phase::Pending, Phase::Open, Phase::Frozen, Phase::Settled];

    #[test]
    fn test_tags_round_trip() {
        for phase in ALL {
            assert_eq!(Phase::from_tag(phase.tag()).unwrap(), phase);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(Phase::from_tag(4), Err(MarketError::UnknownPhase(4)));
        assert_eq!(Phase::from_tag(u64::MAX), Err(MarketError::UnknownPhase(u64::MAX)));
    }

    #[test]
    fn test_gating() {
        assert!(Phase::Open.permits(Operation::Mint));
        assert!(Phase::Open.permits(Operation::PairRedeem));
        assert!(!Phase::Open.permits(Operation::Redeem));

        assert!(Phase::Settled.permits(Operation::Redeem));
        assert!(!Phase::Settled.permits(Operation::Mint));

        for phase in [Phase::Pending, Phase::Frozen] {
            for op in [Operation::Mint, Operation::PairRedeem, Operation::Redeem] {
                assert_eq!(
                    ensure_permitted(phase, op),
                    Err(MarketError::OperationNotPermitted { phase, op })
                );
            }
        }
    }

    #[test]
    fn test_observed_order() {
        assert!(Phase::Open.can_follow(Phase::Pending));
        assert!(Phase::Open.can_follow(Phase::Open));
        // Frozen may be missed between two polls
        assert!(Phase::Settled.can_follow(Phase::Open));
        assert!(!Phase::Open.can_follow(Phase::Frozen));
        assert!(!Phase::Pending.can_follow(Phase::Settled));
    }
}
