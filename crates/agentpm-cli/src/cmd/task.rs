use crate::output::{self, print_json};
use crate::AppContext;
use agentpm_core::lifecycle::{CancelTaskRequest, TaskRequest};
use agentpm_core::store::EpicStore;

pub fn start(ctx: &AppContext, id: &str) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = TaskRequest {
        epic_path: path.clone(),
        task_id: id.to_string(),
        timestamp: ctx.time,
    };
    match service.start_task(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Started task {} ({})", result.entity_id, result.entity_name);
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}

pub fn done(ctx: &AppContext, id: &str) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = TaskRequest {
        epic_path: path.clone(),
        task_id: id.to_string(),
        timestamp: ctx.time,
    };
    match service.complete_task(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!(
                    "Completed task {} ({})",
                    result.entity_id, result.entity_name
                );
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}

pub fn cancel(ctx: &AppContext, id: &str, reason: &str) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = CancelTaskRequest {
        epic_path: path.clone(),
        task_id: id.to_string(),
        reason: reason.to_string(),
        timestamp: ctx.time,
    };
    match service.cancel_task(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Cancelled task {}: {reason}", result.entity_id);
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}
