use crate::domain::ids::DisplayIds;
use crate::domain::memory::{Memory, MemoryFault};
use crate::domain::models::{CopyMode, Event, Finding, IdentityToken, Scenario, ScenarioResult, Step};
use crate::domain::report::Reporter;
use crate::domain::resource::OwnedBuffer;
use crate::error::Result;

pub const TEXT: &str = "hello";
const SLOT: &str = "buffer data";

pub fn run(memory: &mut Memory, ids: &mut DisplayIds, reporter: &mut dyn Reporter) -> Result<ScenarioResult> {
    let mut events = Vec::new();
    // bindings in construction order, dropped from the back on scope exit
    let mut scope: Vec<(&'static str, OwnedBuffer)> = Vec::new();

    reporter.section("Shallow copy: two owners release one buffer")?;

    reporter.line("--- construct s1 ---")?;
    let s1 = OwnedBuffer::new(memory, ids, TEXT)?;
    let before = IdentityToken::capture(SLOT, s1.data(), Step::Before);
    reporter.line(&format!(
        "[{}] constructor: data={} contents={:?}",
        s1.id(),
        s1.data(),
        s1.contents(memory)?
    ))?;
    events.push(Event::Constructed {
        binding: "s1",
        id: s1.id(),
        allocation: s1.data(),
    });

    reporter.line("--- s2 = s1 (member-wise copy) ---")?;
    let allocations = memory.stats().allocations;
    let s2 = s1.shallow_copy();
    let new_allocations = memory.stats().allocations - allocations;
    reporter.line(&format!(
        "[{}] {} copy: data={} new allocations={}",
        s2.id(),
        CopyMode::Shallow,
        s2.data(),
        new_allocations
    ))?;
    events.push(Event::Copied {
        binding: "s2",
        from: "s1",
        id: s2.id(),
        allocation: s2.data(),
        mode: CopyMode::Shallow,
        new_allocations,
    });
    let after = IdentityToken::capture(SLOT, s2.data(), Step::After);
    let aliased = !before.differs_from(&after)?;
    reporter.comparison("s1.data vs s2.data", &before.location.to_string(), &after.location.to_string(), !aliased)?;
    if aliased {
        reporter.line("both values point at the same buffer, each believes it is the sole owner")?;
    }

    scope.push(("s1", s1));
    scope.push(("s2", s2));

    reporter.line("--- print both ---")?;
    for (binding, value) in &scope {
        let contents = value.contents(memory)?;
        reporter.line(&format!("[{}] {} contents: {:?}", value.id(), binding, contents))?;
        events.push(Event::Printed {
            binding: *binding,
            id: value.id(),
            contents,
        });
    }

    reporter.line("--- end of scope, destructors run ---")?;
    let mut finding = Finding::NotTriggered;
    while let Some((binding, value)) = scope.pop() {
        let (id, data) = (value.id(), value.data());
        reporter.line(&format!("[{}] {} destructor: releasing data={}", id, binding, data))?;
        match value.destroy(memory) {
            Ok(allocation) => {
                reporter.line(&format!("[{}] {} released", id, binding))?;
                events.push(Event::Released {
                    binding,
                    id,
                    allocation,
                });
            }
            Err(fault @ MemoryFault::DoubleRelease { .. }) => {
                log::error!(binding = binding, id = id, data:% = data; "buffer released twice");
                reporter.line(&format!("[{}] {} double release detected: {}", id, binding, fault))?;
                events.push(Event::ReleaseFaulted {
                    binding,
                    id,
                    fault: fault.clone(),
                });
                finding = Finding::DoubleRelease(fault);
            }
            Err(fault) => return Err(fault.into()),
        }
    }

    ScenarioResult::new(Scenario::ShallowCopy, None, before, after, finding, events)
}
