use crate::application::runner::Config;
use crate::domain::models::{Arm, Scenario};
use crate::scenario::lifetime_escape::EscapeConfig;
use crate::scenario::realloc::{ReallocConfig, MAX_CAPACITY, MAX_INSERTIONS, MIN_INSERTIONS};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArmChoice {
    RawBuffer,
    OwnedString,
    Both,
}

#[derive(Parser, Debug)]
#[command(version, about = "Replays classic native memory hazards against a simulated address space")]
pub struct Args {
    /// Scenarios to run, in order. Runs all of them when omitted
    #[arg(value_enum)]
    pub scenarios: Vec<Scenario>,

    /// Which lifetime escape variant to run
    #[arg(long, value_enum, default_value_t = ArmChoice::Both)]
    pub arm: ArmChoice,

    /// Elements pushed after the initial three
    #[arg(
        long,
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(MIN_INSERTIONS as u64..=MAX_INSERTIONS as u64)
    )]
    pub insertions: u64,

    /// Capacity reserved before pushing; large enough values prevent the reallocation
    #[arg(long, value_parser = clap::value_parser!(u64).range(..=MAX_CAPACITY as u64))]
    pub initial_capacity: Option<u64>,

    /// Leave the escaped local untouched before its scope ends
    #[arg(long)]
    pub no_overwrite: bool,
}

impl Args {
    pub fn into_config(self) -> Config {
        let scenarios = if self.scenarios.is_empty() {
            Scenario::ALL.to_vec()
        } else {
            self.scenarios
        };
        let arms = match self.arm {
            ArmChoice::RawBuffer => vec![Arm::RawBuffer],
            ArmChoice::OwnedString => vec![Arm::OwnedString],
            ArmChoice::Both => vec![Arm::RawBuffer, Arm::OwnedString],
        };

        Config {
            scenarios,
            arms,
            realloc: ReallocConfig {
                insertions: self.insertions as usize,
                initial_capacity: self.initial_capacity.map(|capacity| capacity as usize),
            },
            escape: EscapeConfig {
                overwrite: !self.no_overwrite,
            },
        }
    }
}
