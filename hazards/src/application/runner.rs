use crate::domain::ids::DisplayIds;
use crate::domain::memory::Memory;
use crate::domain::models::{Arm, Scenario, ScenarioResult};
use crate::domain::report::Reporter;
use crate::scenario::lifetime_escape::{self, EscapeConfig};
use crate::scenario::realloc::{self, ReallocConfig};
use crate::scenario::shallow_copy;
use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub scenarios: Vec<Scenario>,
    pub arms: Vec<Arm>,
    pub realloc: ReallocConfig,
    pub escape: EscapeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scenarios: Scenario::ALL.to_vec(),
            arms: vec![Arm::RawBuffer, Arm::OwnedString],
            realloc: ReallocConfig::default(),
            escape: EscapeConfig::default(),
        }
    }
}

/// Runs the selected scenarios in order, each against its own fresh memory.
/// Only `ids` carries over from one scenario to the next.
pub fn run(config: &Config, reporter: &mut dyn Reporter, ids: &mut DisplayIds) -> Result<Vec<ScenarioResult>> {
    let mut results = Vec::new();

    for scenario in &config.scenarios {
        log::info!(scenario:% = scenario; "scenario started");
        match scenario {
            Scenario::Realloc => {
                let result = realloc::run(&mut Memory::new(), &config.realloc, reporter)
                    .with_context(|| format!("{} scenario failed", scenario))?;
                results.push(result);
            }
            Scenario::ShallowCopy => {
                let result = shallow_copy::run(&mut Memory::new(), ids, reporter)
                    .with_context(|| format!("{} scenario failed", scenario))?;
                results.push(result);
            }
            Scenario::LifetimeEscape => {
                for arm in &config.arms {
                    let result = lifetime_escape::run(&mut Memory::new(), ids, *arm, &config.escape, reporter)
                        .with_context(|| format!("{} scenario ({}) failed", scenario, arm))?;
                    results.push(result);
                }
            }
        }
    }

    for result in &results {
        log::info!(
            scenario:% = result.label(),
            triggered = result.finding.triggered(),
            identity_changed = result.identity_changed;
            "scenario finished"
        );
    }
    summary(&results, reporter)?;
    Ok(results)
}

fn summary(results: &[ScenarioResult], reporter: &mut dyn Reporter) -> Result<()> {
    reporter.section("Summary")?;
    for result in results {
        let identity = if result.identity_changed { "moved" } else { "same" };
        reporter.line(&format!(
            "{}: {} -> {} ({}), {}",
            result.label(),
            result.before.location,
            result.after.location,
            identity,
            result.finding
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Finding;
    use crate::domain::report::MockReporter;
    use crate::infra::console::ConsoleReporter;

    fn quiet() -> ConsoleReporter<Vec<u8>> {
        ConsoleReporter::new(Vec::new())
    }

    #[test]
    fn test_runs_every_scenario_and_arm() -> Result<()> {
        let results = run(&Config::default(), &mut quiet(), &mut DisplayIds::new())?;

        let labels: Vec<_> = results.iter().map(|r| r.label()).collect();
        assert_eq!(
            labels,
            vec![
                "realloc",
                "shallow-copy",
                "lifetime-escape (raw buffer)",
                "lifetime-escape (owned string)"
            ]
        );
        assert!(results.iter().all(|r| r.finding.triggered()));
        Ok(())
    }

    #[test]
    fn test_scenarios_do_not_influence_each_other() -> Result<()> {
        let alone = Config {
            scenarios: vec![Scenario::LifetimeEscape],
            ..Config::default()
        };
        let isolated = run(&alone, &mut quiet(), &mut DisplayIds::new())?;
        let combined = run(&Config::default(), &mut quiet(), &mut DisplayIds::new())?;

        let escape: Vec<_> = combined
            .into_iter()
            .filter(|r| r.scenario == Scenario::LifetimeEscape)
            .map(|r| (r.arm, r.identity_changed, r.finding))
            .collect();
        let isolated: Vec<_> = isolated
            .into_iter()
            .map(|r| (r.arm, r.identity_changed, r.finding))
            .collect();
        assert_eq!(escape, isolated);
        Ok(())
    }

    #[test]
    fn test_display_ids_only_increase() -> Result<()> {
        let mut ids = DisplayIds::new();
        run(&Config::default(), &mut quiet(), &mut ids)?;
        let after_first = ids.last();
        run(&Config::default(), &mut quiet(), &mut ids)?;

        // one for s1 in the shallow copy, two per owned string run
        assert_eq!(after_first, 3);
        assert_eq!(ids.last(), 2 * after_first);
        Ok(())
    }

    #[test]
    fn test_realloc_with_room_is_not_triggered() -> Result<()> {
        let config = Config {
            scenarios: vec![Scenario::Realloc],
            realloc: ReallocConfig {
                insertions: 40,
                initial_capacity: Some(64),
            },
            ..Config::default()
        };

        let results = run(&config, &mut quiet(), &mut DisplayIds::new())?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].finding, Finding::NotTriggered);
        Ok(())
    }

    #[test]
    fn test_errors_carry_the_scenario() {
        let config = Config {
            scenarios: vec![Scenario::Realloc],
            realloc: ReallocConfig {
                insertions: 1,
                initial_capacity: None,
            },
            ..Config::default()
        };

        let err = run(&config, &mut quiet(), &mut DisplayIds::new()).unwrap_err();
        assert_eq!(err.to_string(), "realloc scenario failed");
    }

    #[test]
    fn test_summary_lists_each_result() -> Result<()> {
        let mut reporter = MockReporter::new();
        reporter
            .expect_section()
            .withf(|title| title != "Summary")
            .returning(|_| Ok(()));
        reporter.expect_comparison().returning(|_, _, _, _| Ok(()));
        reporter.expect_line().returning(|_| Ok(()));
        reporter
            .expect_section()
            .withf(|title| title == "Summary")
            .times(1)
            .returning(|_| Ok(()));

        let config = Config {
            scenarios: vec![Scenario::ShallowCopy],
            ..Config::default()
        };
        run(&config, &mut reporter, &mut DisplayIds::new())?;
        Ok(())
    }
}
