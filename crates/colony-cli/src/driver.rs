//! Frame loop and report printing

use anyhow::{Context, Result};
use std::sync::Arc;

use colony_core::{
    AgentProfile, ManualClock, Scheduler, SchedulerConfig, SchedulerReport, TaskStatus,
};

use crate::scenario::{ResolvedTasks, Scenario};

/// Scheduler built from a scenario, on a clock the loop controls
pub struct Run {
    pub scheduler: Scheduler,
    pub clock: ManualClock,
    pub agents: Vec<AgentProfile>,
    pub tasks: ResolvedTasks,
}

impl Run {
    pub fn new(scenario: &Scenario, config: SchedulerConfig) -> Result<Self> {
        let tasks = scenario.resolve()?;
        let clock = ManualClock::default();
        let mut scheduler = Scheduler::with_config(config, Arc::new(clock.clone()));

        for def in &tasks.definitions {
            let key = def.id.map(|id| tasks.key(id).to_string()).unwrap_or_default();
            scheduler
                .create_task(def.clone())
                .with_context(|| format!("creating task '{}'", key))?;
        }

        Ok(Self {
            scheduler,
            clock,
            agents: scenario.agents.clone(),
            tasks,
        })
    }

    /// Run up to `ticks` frames of `dt` seconds; stops once every task ended
    ///
    /// Each frame coordinates idle agents, starts ready tasks, advances the
    /// clock and then updates tasks and the arbiter.
    pub fn simulate(&mut self, ticks: u32, dt: f64) -> u32 {
        for frame in 1..=ticks {
            let coordination = self.scheduler.coordinate(&self.agents);
            for (agent, task) in &coordination.assignments {
                tracing::debug!("frame {}: {} -> '{}'", frame, agent, self.tasks.key(*task));
            }
            self.scheduler.start_ready_tasks();

            self.clock.advance_secs(dt);
            let tick = self.scheduler.tick(dt, &self.agents);
            for task in &tick.tasks.completed {
                tracing::info!("frame {}: '{}' completed", frame, self.tasks.key(*task));
            }
            for task in tick.tasks.failed.iter().chain(&tick.tasks.cancelled) {
                tracing::warn!("frame {}: '{}' ended early", frame, self.tasks.key(*task));
            }

            if self.scheduler.manager().tasks().all(|t| t.is_terminal()) {
                return frame;
            }
        }
        ticks
    }

    pub fn report(&self) -> SchedulerReport {
        self.scheduler.report()
    }

    pub fn print_summary(&self, frames: u32) {
        let report = self.report();
        println!("Simulated {} frame(s)", frames);
        println!();
        println!("TASKS");
        for task in self.scheduler.manager().tasks() {
            let marker = match task.status() {
                TaskStatus::Completed => "✓",
                TaskStatus::Failed | TaskStatus::Cancelled => "✗",
                _ => "·",
            };
            let reason = task
                .status_reason()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default();
            println!(
                "  {} {:<14} {:<12} {:>5.1}%{}",
                marker,
                self.tasks.key(task.id()),
                task.status(),
                task.progress() * 100.0,
                reason
            );
        }

        let stats = &report.tasks;
        println!();
        println!(
            "Completed {}/{} ({:.0}%), average progress {:.0}%",
            stats.count(TaskStatus::Completed),
            stats.total,
            stats.completion_rate * 100.0,
            stats.average_progress * 100.0
        );

        let collab = &report.collaboration;
        println!();
        println!("COLLABORATION");
        println!(
            "  groups: {} total, {} open, {} completed, {} failed",
            collab.total_groups, collab.open_groups, collab.completed_groups, collab.failed_groups
        );
        println!("  completion rate: {:.0}%", collab.completion_rate * 100.0);
        println!("  average group size: {:.1}", collab.average_group_size);
        println!("  resource utilization: {:.0}%", collab.resource_utilization * 100.0);
        for line in &collab.recommendations {
            println!("  - {}", line);
        }
    }
}
