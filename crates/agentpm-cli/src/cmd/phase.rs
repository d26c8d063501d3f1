use crate::output::{self, print_json};
use crate::AppContext;
use agentpm_core::lifecycle::PhaseRequest;
use agentpm_core::store::EpicStore;

pub fn start(ctx: &AppContext, id: &str) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = PhaseRequest {
        epic_path: path.clone(),
        phase_id: id.to_string(),
        timestamp: ctx.time,
    };
    match service.start_phase(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Started phase {} ({})", result.entity_id, result.entity_name);
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
    let req = PhaseRequest {
        epic_path: path.clone(),
        phase_id: id.to_string(),
        timestamp: ctx.time,
    };
    match service.complete_phase(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!(
                    "Completed phase {} ({})",
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
