// tests/property_coordinator.rs

//! Property tests for the run coordinator over random acyclic graphs.

use std::collections::{HashMap, HashSet};

use buildpipe::BuildpipeError;
use buildpipe::graph::{ExecutionPlan, RunCoordinator, TaskState};
use buildpipe::registry::TaskRegistry;
use proptest::prelude::*;

/// A random acyclic dependency structure: task N may only depend on tasks
/// with a lower index, plus a synthetic "all" task depending on everything.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let mut deps: HashSet<usize> = HashSet::new();
                    for d in potential {
                        if i > 0 {
                            deps.insert(d % i);
                        }
                    }
                    let mut deps: Vec<usize> = deps.into_iter().collect();
                    deps.sort();
                    deps
                })
                .collect()
        })
    })
}

fn registry_from(deps: &[Vec<usize>]) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    for (i, dep_ids) in deps.iter().enumerate() {
        let dep_names: Vec<String> = dep_ids.iter().map(|d| format!("task_{d}")).collect();
        let dep_refs: Vec<&str> = dep_names.iter().map(String::as_str).collect();
        registry
            .register_group(format!("task_{i}"), &dep_refs)
            .unwrap();
    }
    let all: Vec<String> = (0..deps.len()).map(|i| format!("task_{i}")).collect();
    let all_refs: Vec<&str> = all.iter().map(String::as_str).collect();
    registry.register_group("all", &all_refs).unwrap();
    registry
}

fn fail(task: &str) -> Result<(), BuildpipeError> {
    Err(BuildpipeError::TaskFailed {
        task: task.to_string(),
        source: anyhow::anyhow!("injected failure"),
    })
}

proptest! {
    /// Every run terminates with all tasks in a terminal state, finishing
    /// each running task in some arbitrary order.
    #[test]
    fn coordinator_always_terminates(
        deps in dag_strategy(10),
        failing in proptest::collection::vec(0..10usize, 0..4),
        pick_last in any::<bool>(),
    ) {
        let registry = registry_from(&deps);
        let plan = ExecutionPlan::resolve(&registry, "all").unwrap();
        let failing: HashSet<String> =
            failing.into_iter().map(|i| format!("task_{i}")).collect();

        let mut coordinator = RunCoordinator::new(plan);
        let mut running = coordinator.initial_ready();
        let mut finish_order: Vec<String> = Vec::new();
        let mut steps = 0usize;

        while !running.is_empty() {
            steps += 1;
            prop_assert!(steps < 1000, "coordinator did not terminate");

            let task = if pick_last {
                running.pop().unwrap()
            } else {
                running.remove(0)
            };
            let result = if failing.contains(&task) { fail(&task) } else { Ok(()) };
            let failed = result.is_err();
            let step = coordinator.on_finished(&task, result);
            finish_order.push(task.clone());

            running.extend(step.newly_ready);
            if step.run_finished {
                prop_assert!(running.is_empty());
                break;
            }
            prop_assert!(!failed || coordinator.is_halted());
        }

        prop_assert!(coordinator.all_terminal());

        // Dependencies finish before their dependents start, so certainly
        // before they finish.
        let pos: HashMap<&String, usize> =
            finish_order.iter().enumerate().map(|(i, n)| (n, i)).collect();
        for (i, dep_ids) in deps.iter().enumerate() {
            let name = format!("task_{i}");
            if let Some(&task_pos) = pos.get(&name) {
                for d in dep_ids {
                    let dep = format!("task_{d}");
                    let dep_pos = pos.get(&dep).copied();
                    prop_assert!(
                        dep_pos.is_some_and(|p| p < task_pos),
                        "{dep} must finish before {name}"
                    );
                }
            }
        }

        // Error retained iff some dispatched task failed.
        let any_failed = finish_order.iter().any(|t| failing.contains(t));
        prop_assert_eq!(coordinator.take_error().is_some(), any_failed);
    }

    /// Without failures every task runs exactly once and succeeds.
    #[test]
    fn clean_runs_complete_every_task(deps in dag_strategy(8)) {
        let registry = registry_from(&deps);
        let plan = ExecutionPlan::resolve(&registry, "all").unwrap();
        let total = deps.len() + 1;

        let mut coordinator = RunCoordinator::new(plan);
        let mut running = coordinator.initial_ready();
        let mut finished = 0usize;

        while let Some(task) = running.pop() {
            let step = coordinator.on_finished(&task, Ok(()));
            finished += 1;
            running.extend(step.newly_ready);
            if step.run_finished {
                break;
            }
        }

        prop_assert_eq!(finished, total);
        for i in 0..deps.len() {
            prop_assert_eq!(
                coordinator.state_of(&format!("task_{i}")),
                Some(TaskState::DoneSuccess)
            );
        }
        prop_assert_eq!(coordinator.state_of("all"), Some(TaskState::DoneSuccess));
    }
}
