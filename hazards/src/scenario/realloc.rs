use crate::domain::memory::{Address, Memory, MemoryFault};
use crate::domain::models::{Event, Finding, IdentityToken, Scenario, ScenarioResult, Step};
use crate::domain::report::Reporter;
use crate::error::{HazardError, Result};

pub const INITIAL: [i32; 3] = [1, 2, 3];
pub const MIN_INSERTIONS: usize = 32;
pub const MAX_INSERTIONS: usize = 1 << 16;
/// Largest element count a sequence may reserve or grow to.
pub const MAX_CAPACITY: usize = 1 << 20;
const SLOT: &str = "&v[0]";
const ELEMENT: usize = std::mem::size_of::<i32>();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReallocConfig {
    pub insertions: usize,
    /// Capacity reserved up front, never less than the initial element count.
    pub initial_capacity: Option<usize>,
}

impl Default for ReallocConfig {
    fn default() -> Self {
        ReallocConfig {
            insertions: 100,
            initial_capacity: None,
        }
    }
}

/// Growable `i32` sequence stored in the simulated heap. Growth doubles the
/// capacity and always moves the elements to a new block.
#[derive(Debug)]
pub struct Sequence {
    data: Address,
    len: usize,
    capacity: usize,
}

impl Sequence {
    pub fn from_slice(memory: &mut Memory, values: &[i32], capacity: usize) -> Result<Sequence> {
        let capacity = capacity.max(values.len()).max(1);
        let mut sequence = Sequence {
            data: memory.allocate(storage_bytes(capacity)?),
            len: 0,
            capacity,
        };
        for value in values {
            sequence.push(memory, *value)?;
        }
        Ok(sequence)
    }

    /// Appends `value`, returning the old and new storage when it had to move.
    pub fn push(&mut self, memory: &mut Memory, value: i32) -> Result<Option<(Address, Address)>> {
        let mut moved = None;
        if self.len == self.capacity {
            let from = self.data;
            let grown = self.capacity.saturating_mul(2);
            self.data = memory.reallocate(from, storage_bytes(grown)?)?;
            self.capacity = grown;
            moved = Some((from, self.data));
        }
        memory.write(self.data.offset(self.len * ELEMENT), &value.to_le_bytes())?;
        self.len += 1;
        Ok(moved)
    }

    pub fn element_address(&self, index: usize) -> Option<Address> {
        (index < self.len).then(|| self.data.offset(index * ELEMENT))
    }

    pub fn to_vec(&self, memory: &Memory) -> Result<Vec<i32>> {
        let bytes = memory.read(self.data, self.len * ELEMENT)?;
        Ok(bytes.chunks_exact(ELEMENT).map(decode).collect())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn destroy(self, memory: &mut Memory) -> Result<()> {
        Ok(memory.release(self.data)?)
    }
}

/// A reference held into a sequence, unaware of later reallocations.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef {
    address: Address,
}

impl ElementRef {
    pub fn read(&self, memory: &Memory) -> std::result::Result<i32, MemoryFault> {
        memory.read(self.address, ELEMENT).map(|bytes| decode(&bytes))
    }
}

pub fn run(memory: &mut Memory, config: &ReallocConfig, reporter: &mut dyn Reporter) -> Result<ScenarioResult> {
    let count = insertion_count(config.insertions)?;
    let mut events = Vec::new();

    reporter.section("Reallocation: reference invalidated by container growth")?;
    let capacity = config.initial_capacity.unwrap_or(INITIAL.len());
    let mut v = Sequence::from_slice(memory, &INITIAL, capacity)?;
    reporter.line(&format!("before: v = {:?}, capacity = {}", v.to_vec(memory)?, v.capacity()))?;

    let before = IdentityToken::capture(SLOT, first(&v)?, Step::Before);
    let held = ElementRef {
        address: before.location,
    };
    reporter.line(&format!("first (held reference) = {} at {}", held.read(memory)?, before.location))?;

    reporter.line(&format!("pushing {} elements...", config.insertions))?;
    for value in 0..count {
        if let Some((from, to)) = v.push(memory, value)? {
            log::debug!(from:% = from, to:% = to, capacity = v.capacity(); "sequence reallocated");
            events.push(Event::Reallocated {
                from,
                to,
                capacity: v.capacity(),
            });
        }
    }
    reporter.line(&format!(
        "after: len = {}, capacity = {}, reallocations = {}",
        v.len(),
        v.capacity(),
        events.len()
    ))?;

    let after = IdentityToken::capture(SLOT, first(&v)?, Step::After);
    let changed = before.differs_from(&after)?;
    reporter.comparison(SLOT, &before.location.to_string(), &after.location.to_string(), changed)?;

    let finding = if changed {
        match held.read(memory) {
            Err(fault @ MemoryFault::UseAfterFree { .. }) => {
                let stale = match &fault {
                    MemoryFault::UseAfterFree { stale, .. } if stale.len() == ELEMENT => decode(stale).to_string(),
                    _ => "?".to_string(),
                };
                reporter.line(&format!(
                    "first (dangling!) = {} read from released storage at {}, v[0] now lives at {}",
                    stale, before.location, after.location
                ))?;
                log::warn!(scenario:% = Scenario::Realloc; "held reference outlived its storage");
                Finding::StaleReference(fault)
            }
            Err(fault) => return Err(fault.into()),
            Ok(_) => {
                return Err(HazardError::MissingFault {
                    step: "read through held reference",
                    expected: "use after free",
                })
            }
        }
    } else {
        reporter.line("no hazard triggered: storage did not move, the held reference is still valid")?;
        Finding::NotTriggered
    };

    v.destroy(memory)?;
    ScenarioResult::new(Scenario::Realloc, None, before, after, finding, events)
}

fn insertion_count(requested: usize) -> Result<i32> {
    if requested < MIN_INSERTIONS {
        return Err(HazardError::TooFewInsertions {
            requested,
            minimum: MIN_INSERTIONS,
        });
    }
    match i32::try_from(requested) {
        Ok(count) if requested <= MAX_INSERTIONS => Ok(count),
        _ => Err(HazardError::TooManyInsertions {
            requested,
            maximum: MAX_INSERTIONS,
        }),
    }
}

fn storage_bytes(capacity: usize) -> Result<usize> {
    if capacity > MAX_CAPACITY {
        return Err(HazardError::CapacityOverflow {
            requested: capacity,
            maximum: MAX_CAPACITY,
        });
    }
    Ok(capacity * ELEMENT)
}

fn first(v: &Sequence) -> Result<Address> {
    v.element_address(0).ok_or(HazardError::NoElement { index: 0 })
}

fn decode(bytes: &[u8]) -> i32 {
    let mut word = [0; ELEMENT];
    word.copy_from_slice(&bytes[..ELEMENT]);
    i32::from_le_bytes(word)
}
