use crate::domain::memory::{Address, FrameId, MemoryFault};
use crate::error::{HazardError, Result};
use clap::ValueEnum;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Scenario {
    Realloc,
    ShallowCopy,
    LifetimeEscape,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::Realloc,
        Scenario::ShallowCopy,
        Scenario::LifetimeEscape,
    ];
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Realloc => write!(f, "realloc"),
            Scenario::ShallowCopy => write!(f, "shallow-copy"),
            Scenario::LifetimeEscape => write!(f, "lifetime-escape"),
        }
    }
}

/// Variants of the lifetime escape scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Arm {
    RawBuffer,
    OwnedString,
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::RawBuffer => write!(f, "raw buffer"),
            Arm::OwnedString => write!(f, "owned string"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Before,
    After,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Before => write!(f, "before"),
            Step::After => write!(f, "after"),
        }
    }
}

/// Storage identity of a logical slot at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken {
    pub slot: &'static str,
    pub location: Address,
    pub timestamp: Step,
}

impl IdentityToken {
    pub fn capture(slot: &'static str, location: Address, timestamp: Step) -> IdentityToken {
        log::debug!(slot = slot, location:% = location, step:% = timestamp; "identity captured");
        IdentityToken {
            slot,
            location,
            timestamp,
        }
    }

    /// Only tokens taken from the same slot can be compared.
    pub fn differs_from(&self, other: &IdentityToken) -> Result<bool> {
        if self.slot != other.slot {
            return Err(HazardError::IncomparableTokens {
                left: self.slot,
                right: other.slot,
            });
        }
        Ok(self.location != other.location)
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} = {}", self.slot, self.timestamp, self.location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    Shallow,
    Deep,
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyMode::Shallow => write!(f, "shallow"),
            CopyMode::Deep => write!(f, "deep"),
        }
    }
}

/// One step of a scenario, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Constructed {
        binding: &'static str,
        id: u32,
        allocation: Address,
    },
    Copied {
        binding: &'static str,
        from: &'static str,
        id: u32,
        allocation: Address,
        mode: CopyMode,
        new_allocations: usize,
    },
    Printed {
        binding: &'static str,
        id: u32,
        contents: String,
    },
    Released {
        binding: &'static str,
        id: u32,
        allocation: Address,
    },
    ReleaseFaulted {
        binding: &'static str,
        id: u32,
        fault: MemoryFault,
    },
    Reallocated {
        from: Address,
        to: Address,
        capacity: usize,
    },
    FrameEntered {
        frame: FrameId,
    },
    FrameExited {
        frame: FrameId,
        destroyed: Vec<Address>,
    },
    Selected {
        chosen: Address,
        contents: String,
    },
    Overwritten {
        address: Address,
        len: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    NotTriggered,
    StaleReference(MemoryFault),
    DoubleRelease(MemoryFault),
    DanglingRead {
        inside: String,
        outside: String,
        fault: MemoryFault,
    },
}

impl Finding {
    pub fn triggered(&self) -> bool {
        !matches!(self, Finding::NotTriggered)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::NotTriggered => write!(f, "no hazard triggered"),
            Finding::StaleReference(fault) => write!(f, "stale reference, {}", fault),
            Finding::DoubleRelease(fault) => write!(f, "{}", fault),
            Finding::DanglingRead {
                inside, outside, ..
            } => write!(f, "dangling read, inside {:?} outside {:?}", inside, outside),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub arm: Option<Arm>,
    pub before: IdentityToken,
    pub after: IdentityToken,
    pub identity_changed: bool,
    pub finding: Finding,
    pub events: Vec<Event>,
}

impl ScenarioResult {
    pub fn new(
        scenario: Scenario,
        arm: Option<Arm>,
        before: IdentityToken,
        after: IdentityToken,
        finding: Finding,
        events: Vec<Event>,
    ) -> Result<ScenarioResult> {
        let identity_changed = before.differs_from(&after)?;
        Ok(ScenarioResult {
            scenario,
            arm,
            before,
            after,
            identity_changed,
            finding,
            events,
        })
    }

    pub fn label(&self) -> String {
        match self.arm {
            Some(arm) => format!("{} ({})", self.scenario, arm),
            None => self.scenario.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_from_other_slots_are_not_comparable() {
        let before = IdentityToken::capture("v[0]", Address(0x10), Step::Before);
        let after = IdentityToken::capture("result", Address(0x10), Step::After);

        assert!(matches!(
            before.differs_from(&after),
            Err(HazardError::IncomparableTokens { left: "v[0]", right: "result" })
        ));
    }

    #[test]
    fn test_identity_changed_is_derived() {
        let before = IdentityToken::capture("v[0]", Address(0x10), Step::Before);
        let after = IdentityToken::capture("v[0]", Address(0x40), Step::After);

        let result = ScenarioResult::new(
            Scenario::Realloc,
            None,
            before,
            after,
            Finding::NotTriggered,
            vec![],
        )
        .unwrap();
        assert!(result.identity_changed);
        assert_eq!(result.label(), "realloc");
    }
}
