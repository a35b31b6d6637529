//! End-to-end scheduling scenarios
//!
//! Drives the public API the way a host game would: create tasks, assign
//! agents, advance frames, and watch dependents unlock.

use std::sync::Arc;

use colony_core::collaboration::GroupStatus;
use colony_core::error::{DependencyError, ReservationError};
use colony_core::types::{SkillKind, WorkKind};
use colony_core::{
    AgentId, AgentProfile, ManualClock, Position, Scheduler, SchedulerConfig, SchedulerError,
    SchedulerEvent, TaskDefinition, TaskId, TaskManager, TaskStatus,
};
use parking_lot::Mutex;

fn manager() -> (TaskManager, ManualClock) {
    let clock = ManualClock::default();
    let manager = TaskManager::with_config(&SchedulerConfig::default(), Arc::new(clock.clone()));
    (manager, clock)
}

fn quick(name: &str) -> TaskDefinition {
    TaskDefinition::builder(name, WorkKind::Generic)
        .duration(1.0)
        .build()
}

fn after(name: &str, prerequisite: TaskId) -> TaskDefinition {
    TaskDefinition::builder(name, WorkKind::Generic)
        .duration(1.0)
        .after(prerequisite)
        .build()
}

#[test]
fn linear_chain_unlocks_dependent() {
    let (mut manager, _) = manager();
    let a = manager.create_task(quick("A")).unwrap();
    let b = manager.create_task(after("B", a)).unwrap();

    assert_eq!(manager.status_of(a), Some(TaskStatus::Available));
    assert_eq!(manager.status_of(b), Some(TaskStatus::Pending));

    let worker = AgentProfile::new(1);
    assert!(manager.assign_agent(a, &worker).success);
    manager.start_task(a).unwrap();
    manager.complete_task(a).unwrap();

    assert_eq!(manager.status_of(a), Some(TaskStatus::Completed));
    assert_eq!(manager.status_of(b), Some(TaskStatus::Available));
}

#[test]
fn capacity_rejection_keeps_count() {
    let (mut manager, _) = manager();
    let task = manager
        .create_task(
            TaskDefinition::builder("Raise barn", WorkKind::Generic)
                .max_assignees(2)
                .build(),
        )
        .unwrap();

    assert!(manager.assign_agent(task, &AgentProfile::new(1)).success);
    assert!(manager.assign_agent(task, &AgentProfile::new(2)).success);

    let third = manager.assign_agent(task, &AgentProfile::new(3));
    assert!(!third.success);
    assert!(third.report.has_error("capacity_reached"));
    assert_eq!(manager.task(task).unwrap().assigned_agents().len(), 2);
}

#[test]
fn reservation_conflict_until_release() {
    let mut scheduler = Scheduler::with_config(
        SchedulerConfig::default(),
        Arc::new(ManualClock::default()),
    );
    let spot = Position::new(5.0, 5.0);

    scheduler.reserve(spot, AgentId(1), "workbench", 60.0).unwrap();

    let err = scheduler
        .reserve(spot, AgentId(2), "workbench", 60.0)
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Reservation(ReservationError::AlreadyReserved { owner: AgentId(1), .. })
    ));
    assert!(err.to_string().contains("already reserved"));

    scheduler.release(spot, AgentId(1)).unwrap();
    let taken = scheduler
        .reserve(spot, AgentId(2), "workbench", 60.0)
        .unwrap();
    assert_eq!(taken.agent, AgentId(2));
}

#[test]
fn cycle_rejection_keeps_first_edge() {
    let (mut manager, _) = manager();
    let a = manager.create_task(quick("A")).unwrap();
    let b = manager.create_task(quick("B")).unwrap();

    manager.add_dependency(a, b).unwrap();
    let err = manager.add_dependency(b, a).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Dependency(DependencyError::WouldCreateCycle { .. })
    ));

    assert_eq!(manager.graph().edge_count(), 1);
    assert_eq!(manager.graph().prerequisites(a), vec![b]);
    assert!(manager.graph().prerequisites(b).is_empty());
}

#[test]
fn cascading_activation_follows_chain() {
    let (mut manager, clock) = manager();
    let a = manager.create_task(quick("A")).unwrap();
    let b = manager.create_task(after("B", a)).unwrap();
    let c = manager.create_task(after("C", b)).unwrap();

    let available = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&available);
    manager.subscribe(move |event| {
        if let SchedulerEvent::TaskAvailable { task } = event {
            sink.lock().push(*task);
        }
    });

    let agents = vec![AgentProfile::new(1)];
    for (task, expected) in [(a, vec![b]), (b, vec![b, c])] {
        assert!(manager.assign_agent(task, &agents[0]).success);
        manager.start_task(task).unwrap();

        clock.advance_secs(1.0);
        let summary = manager.update_tasks(1.0, &agents);
        assert_eq!(summary.completed, vec![task]);
        assert_eq!(*available.lock(), expected);
    }

    assert_eq!(manager.status_of(c), Some(TaskStatus::Available));
}

#[test]
fn cascade_never_skips_a_link() {
    let (mut manager, _) = manager();
    let a = manager.create_task(quick("A")).unwrap();
    let b = manager.create_task(after("B", a)).unwrap();
    let c = manager.create_task(after("C", b)).unwrap();

    let worker = AgentProfile::new(1);
    manager.assign_agent(a, &worker);
    manager.start_task(a).unwrap();
    manager.complete_task(a).unwrap();

    assert_eq!(manager.status_of(b), Some(TaskStatus::Available));
    assert_eq!(manager.status_of(c), Some(TaskStatus::Pending));
}

#[test]
fn colony_day_with_collaboration() {
    let clock = ManualClock::default();
    let mut scheduler = Scheduler::with_config(SchedulerConfig::default(), Arc::new(clock.clone()));

    let site = scheduler.create_task(quick("Clear site")).unwrap();
    let hall = scheduler
        .create_task(
            TaskDefinition::builder("Build hall", WorkKind::Construction)
                .at(Position::new(0.0, 0.0), 3.0)
                .requires(SkillKind::Construction, 2, 1.0)
                .max_assignees(2)
                .duration(2.0)
                .after(site)
                .build(),
        )
        .unwrap();

    let agents = vec![
        AgentProfile::new(1).with_skill(SkillKind::Construction, 6),
        AgentProfile::new(2).with_skill(SkillKind::Construction, 4),
    ];

    let report = scheduler.coordinate(&agents);
    assert_eq!(report.assignments.len(), 1);
    assert_eq!(scheduler.start_ready_tasks(), vec![site]);

    for _ in 0..2 {
        clock.advance_secs(1.0);
        scheduler.tick(1.0, &agents);
    }
    assert_eq!(scheduler.manager().status_of(site), Some(TaskStatus::Completed));
    assert_eq!(scheduler.manager().status_of(hall), Some(TaskStatus::Available));

    let report = scheduler.coordinate(&agents);
    assert_eq!(report.groups_created, vec![hall]);
    let group = scheduler.arbiter().group(hall).unwrap();
    assert_eq!(group.status, GroupStatus::Active);
    assert_eq!(scheduler.start_ready_tasks(), vec![hall]);

    let mut closing = None;
    for _ in 0..5 {
        clock.advance_secs(1.0);
        let tick = scheduler.tick(1.0, &agents);
        if tick.tasks.completed.contains(&hall) {
            closing = tick.sweep;
            break;
        }
    }

    // the sweep in the finishing frame closes the group
    let sweep = closing.expect("hall should finish and be swept within five frames");
    assert_eq!(sweep.completed_groups, vec![hall]);
    assert_eq!(scheduler.report().collaboration.completion_rate, 1.0);
}
