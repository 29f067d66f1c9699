/*!
 * Module Statistics
 * Call counts and time spent per module and lifecycle stage
 */

use crate::core::types::Stage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters for one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatistics {
    pub calls: u64,
    pub time_ns: u64,
}

impl StageStatistics {
    pub fn time(&self) -> Duration {
        Duration::from_nanos(self.time_ns)
    }

    pub fn mean_time(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.time_ns / self.calls)
        }
    }
}

/// Statistics of one module (or of the whole job)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatistics {
    pub name: String,
    pub stages: [StageStatistics; 5],
}

impl ModuleStatistics {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stages: [StageStatistics::default(); 5],
        }
    }

    #[inline]
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        let entry = &mut self.stages[stage.index()];
        entry.calls += 1;
        entry.time_ns = entry
            .time_ns
            .saturating_add(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }

    pub fn stage(&self, stage: Stage) -> &StageStatistics {
        &self.stages[stage.index()]
    }

    pub fn calls(&self, stage: Stage) -> u64 {
        self.stage(stage).calls
    }

    pub fn time(&self, stage: Stage) -> Duration {
        self.stage(stage).time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_mean() {
        let mut stats = ModuleStatistics::new("Progress");
        stats.record(Stage::Event, Duration::from_micros(10));
        stats.record(Stage::Event, Duration::from_micros(30));
        stats.record(Stage::Initialize, Duration::from_micros(5));

        assert_eq!(stats.calls(Stage::Event), 2);
        assert_eq!(stats.calls(Stage::Initialize), 1);
        assert_eq!(stats.calls(Stage::Terminate), 0);
        assert_eq!(stats.time(Stage::Event), Duration::from_micros(40));
        assert_eq!(stats.stage(Stage::Event).mean_time(), Duration::from_micros(20));
        assert_eq!(stats.stage(Stage::EndRun).mean_time(), Duration::ZERO);
    }
}
