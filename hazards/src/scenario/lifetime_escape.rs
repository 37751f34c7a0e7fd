use crate::domain::ids::DisplayIds;
use crate::domain::memory::{Address, Memory, MemoryFault};
use crate::domain::models::{Arm, Event, Finding, IdentityToken, Scenario, ScenarioResult, Step};
use crate::domain::report::Reporter;
use crate::domain::resource::OwnedBuffer;
use crate::error::Result;

pub const OUTER: &str = "hello";
pub const INNER: &str = "world!!!";
const LOCAL_BUFFER: usize = 20;
const SLOT: &str = "result";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeConfig {
    /// Scribble over the local before its scope ends so a dangling read
    /// cannot coincidentally show the old text.
    pub overwrite: bool,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        EscapeConfig { overwrite: true }
    }
}

fn second_wins(x_len: usize, y_len: usize) -> bool {
    y_len > x_len
}

/// Returns the longer input, the first one on a tie.
pub fn longest<'a>(x: &'a str, y: &'a str) -> &'a str {
    if second_wins(x.len(), y.len()) {
        y
    } else {
        x
    }
}

/// [`longest`] over strings in simulated memory. The returned address carries
/// no lifetime, which is exactly what lets it escape.
pub fn longest_at(memory: &Memory, x: Address, y: Address) -> std::result::Result<Address, MemoryFault> {
    let (x_len, y_len) = (memory.read_str(x)?.len(), memory.read_str(y)?.len());
    Ok(if second_wins(x_len, y_len) { y } else { x })
}

pub fn run(
    memory: &mut Memory,
    ids: &mut DisplayIds,
    arm: Arm,
    config: &EscapeConfig,
    reporter: &mut dyn Reporter,
) -> Result<ScenarioResult> {
    reporter.section(&format!("Lifetime escape ({}): reference outlives its scope", arm))?;
    match arm {
        Arm::RawBuffer => raw_buffer(memory, config, reporter),
        Arm::OwnedString => owned_string(memory, ids, config, reporter),
    }
}

fn raw_buffer(memory: &mut Memory, config: &EscapeConfig, reporter: &mut dyn Reporter) -> Result<ScenarioResult> {
    let mut events = Vec::new();
    let s1 = memory.place_static(&nul_terminated(OUTER));
    reporter.line(&format!("s1 = {:?} (static) at {}", OUTER, s1))?;

    let frame = memory.enter_frame();
    events.push(Event::FrameEntered { frame });
    let mut buffer = [0u8; LOCAL_BUFFER];
    buffer[..INNER.len()].copy_from_slice(INNER.as_bytes());
    let s2 = memory.place_local(&buffer)?;
    reporter.line(&format!("{{ s2 = [u8; {}] {:?} (local) at {}", LOCAL_BUFFER, INNER, s2))?;

    let result = longest_at(memory, s1, s2)?;
    let (before, inside) = select(memory, result, &mut events, reporter)?;

    if config.overwrite {
        memory.fill(s2, b'X', LOCAL_BUFFER - 1)?;
        memory.write(s2.offset(LOCAL_BUFFER - 1), &[0])?;
        events.push(Event::Overwritten {
            address: s2,
            len: LOCAL_BUFFER - 1,
        });
        reporter.line(&format!("  s2 filled with {} 'X'", LOCAL_BUFFER - 1))?;
    }

    let exit = memory.exit_frame()?;
    reporter.line(&format!("}} frame {} gone, destroyed {:?}", exit.frame, addresses(&exit.destroyed)))?;
    events.push(Event::FrameExited {
        frame: exit.frame,
        destroyed: exit.destroyed,
    });

    let finding = observe(memory, result, &inside, reporter)?;
    let after = IdentityToken::capture(SLOT, result, Step::After);
    ScenarioResult::new(Scenario::LifetimeEscape, Some(Arm::RawBuffer), before, after, finding, events)
}

fn owned_string(
    memory: &mut Memory,
    ids: &mut DisplayIds,
    config: &EscapeConfig,
    reporter: &mut dyn Reporter,
) -> Result<ScenarioResult> {
    let mut events = Vec::new();
    let s1 = OwnedBuffer::new(memory, ids, OUTER)?;
    reporter.line(&format!("s1 = String::from({:?}), buffer at {}", OUTER, s1.data()))?;

    let frame = memory.enter_frame();
    events.push(Event::FrameEntered { frame });
    let s2 = OwnedBuffer::new(memory, ids, INNER)?;
    reporter.line(&format!("{{ s2 = String::from({:?}), buffer at {}", INNER, s2.data()))?;

    let (outer, inner) = (s1.contents(memory)?, s2.contents(memory)?);
    reporter.line(&format!(
        "  borrow-checked longest(&s1, &s2) = {:?}, cannot outlive s2",
        longest(&outer, &inner)
    ))?;

    let result = longest_at(memory, s1.data(), s2.data())?;
    let (before, inside) = select(memory, result, &mut events, reporter)?;

    if config.overwrite {
        memory.fill(s2.data(), b'X', s2.len())?;
        events.push(Event::Overwritten {
            address: s2.data(),
            len: s2.len(),
        });
        reporter.line(&format!("  s2 overwritten with {} 'X'", s2.len()))?;
    }

    // the String is dropped with its scope
    let dropped = s2.destroy(memory)?;
    let mut exit = memory.exit_frame()?;
    exit.destroyed.push(dropped);
    reporter.line(&format!("}} frame {} gone, dropped {:?}", exit.frame, addresses(&exit.destroyed)))?;
    events.push(Event::FrameExited {
        frame: exit.frame,
        destroyed: exit.destroyed,
    });

    let finding = observe(memory, result, &inside, reporter)?;
    let after = IdentityToken::capture(SLOT, result, Step::After);
    s1.destroy(memory)?;
    ScenarioResult::new(Scenario::LifetimeEscape, Some(Arm::OwnedString), before, after, finding, events)
}

fn select(
    memory: &Memory,
    result: Address,
    events: &mut Vec<Event>,
    reporter: &mut dyn Reporter,
) -> Result<(IdentityToken, String)> {
    let before = IdentityToken::capture(SLOT, result, Step::Before);
    let inside = memory.read_str(result)?;
    reporter.line(&format!("  result = longest(s1, s2) -> {}", result))?;
    reporter.line(&format!("  Inside: {}", inside))?;
    events.push(Event::Selected {
        chosen: result,
        contents: inside.clone(),
    });
    Ok((before, inside))
}

fn observe(memory: &Memory, result: Address, inside: &str, reporter: &mut dyn Reporter) -> Result<Finding> {
    match memory.read_str(result) {
        Ok(outside) => {
            reporter.line(&format!("Outside: {}", outside))?;
            reporter.comparison("inside vs outside", inside, &outside, inside != outside)?;
            reporter.line("no hazard triggered: result points at the longer-lived input")?;
            Ok(Finding::NotTriggered)
        }
        Err(fault @ MemoryFault::UseAfterFree { .. }) => {
            let outside = fault.stale_text().unwrap_or_default();
            reporter.line(&format!("Outside (dangling!): {}", outside))?;
            reporter.comparison("inside vs outside", inside, &outside, inside != outside)?;
            log::warn!(scenario:% = Scenario::LifetimeEscape, result:% = result; "reference escaped its frame");
            Ok(Finding::DanglingRead {
                inside: inside.to_string(),
                outside,
                fault,
            })
        }
        Err(fault) => Err(fault.into()),
    }
}

fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

fn addresses(list: &[Address]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}
