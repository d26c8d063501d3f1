use crate::output::{print_json, print_table};
use crate::AppContext;
use agentpm_core::query::QueryService;
use agentpm_core::store::FileStore;
use agentpm_core::validation::validate_epic_completion;
use agentpm_core::xml::format_ts;
use anyhow::Context;

fn load(ctx: &AppContext) -> anyhow::Result<QueryService> {
    let path = ctx.epic_path()?;
    let mut service = QueryService::new();
    service
        .load_from(&FileStore::new(), &path)
        .with_context(|| format!("failed to load epic from {}", path.display()))?;
    Ok(service)
}

pub fn status(ctx: &AppContext) -> anyhow::Result<()> {
    let service = load(ctx)?;
    let rollup = service.status()?;

    if ctx.json {
        return print_json(&rollup);
    }

    println!("Epic: {} — {}", rollup.id, rollup.name);
    println!("Status:     {}", rollup.status);
    println!(
        "Phases:     {}/{} done",
        rollup.completed_phases, rollup.total_phases
    );
    println!(
        "Tests:      {} passing, {} failing",
        rollup.passing_tests, rollup.failing_tests
    );
    println!("Completion: {}%", rollup.completion_percent);
    Ok(())
}

pub fn current(ctx: &AppContext) -> anyhow::Result<()> {
    let service = load(ctx)?;
    let active = service.current()?;

    if ctx.json {
        return print_json(&active);
    }

    match &active.active_phase {
        Some(p) => println!("Active phase: {} ({})", p.id, p.name),
        None => println!("Active phase: (none)"),
    }
    match &active.active_task {
        Some(t) => println!("Active task:  {} ({})", t.id, t.name),
        None => println!("Active task:  (none)"),
    }
    println!("Next action:  {}", active.next_action);
    Ok(())
}

pub fn pending(ctx: &AppContext) -> anyhow::Result<()> {
    let service = load(ctx)?;
    let pending = service.pending()?;

    if ctx.json {
        return print_json(&pending);
    }

    if pending.phases.is_empty() && pending.tasks.is_empty() && pending.tests.is_empty() {
        println!("Nothing pending.");
        return Ok(());
    }

    if !pending.phases.is_empty() {
        println!("Phases:");
        print_table(
            &["ID", "STATUS", "NAME"],
            pending
                .phases
                .iter()
                .map(|p| vec![p.id.clone(), p.status.to_string(), p.name.clone()])
                .collect(),
        );
        println!();
    }
    if !pending.tasks.is_empty() {
        println!("Tasks:");
        print_table(
            &["ID", "PHASE", "STATUS", "NAME"],
            pending
                .tasks
                .iter()
                .map(|t| {
                    vec![
                        t.id.clone(),
                        t.phase_id.clone(),
                        t.status.to_string(),
                        t.name.clone(),
                    ]
                })
                .collect(),
        );
        println!();
    }
    if !pending.tests.is_empty() {
        println!("Tests:");
        print_table(
            &["ID", "TASK", "STATUS", "NAME"],
            pending
                .tests
                .iter()
                .map(|t| {
                    vec![
                        t.id.clone(),
                        t.task_id.clone(),
                        t.test_status.to_string(),
                        t.name.clone(),
                    ]
                })
                .collect(),
        );
    }
    Ok(())
}

pub fn failing(ctx: &AppContext) -> anyhow::Result<()> {
    let service = load(ctx)?;
    let failing = service.failing_tests()?;

    if ctx.json {
        return print_json(&failing);
    }

    if failing.is_empty() {
        println!("All tests passing.");
        return Ok(());
    }

    print_table(
        &["ID", "STATUS", "PHASE", "NAME"],
        failing
            .iter()
            .map(|t| {
                vec![
                    t.id.clone(),
                    t.test_status.to_string(),
                    format!("{} ({})", t.phase_id, t.phase_name),
                    t.name.clone(),
                ]
            })
            .collect(),
    );
    Ok(())
}

pub fn events(ctx: &AppContext, limit: usize) -> anyhow::Result<()> {
    let service = load(ctx)?;
    let events = service.recent_events(limit)?;

    if ctx.json {
        return print_json(&events);
    }

    if events.is_empty() {
        println!("No events logged yet.");
        return Ok(());
    }

    print_table(
        &["TIMESTAMP", "TYPE", "DATA"],
        events
            .iter()
            .map(|e| {
                vec![
                    format_ts(e.timestamp),
                    e.event_type.clone(),
                    e.data.as_str().to_string(),
                ]
            })
            .collect(),
    );
    Ok(())
}

pub fn validate(ctx: &AppContext) -> anyhow::Result<()> {
    let service = load(ctx)?;
    let warnings = service.state_warnings()?;
    let completion = validate_epic_completion(service.epic()?);

    if ctx.json {
        return print_json(&serde_json::json!({
            "warnings": warnings,
            "completion": completion,
        }));
    }

    if warnings.is_empty() {
        println!("No structural issues found.");
    } else {
        println!("Warnings:");
        for w in &warnings {
            println!("  - {}", w.message);
        }
    }

    if completion.is_valid {
        println!("Epic is ready to complete.");
    } else {
        println!("{}", completion.message());
    }
    Ok(())
}
