use crate::output::{self, print_json};
use crate::AppContext;
use agentpm_core::lifecycle::EpicRequest;
use agentpm_core::store::EpicStore;

pub fn start(ctx: &AppContext) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = EpicRequest {
        epic_path: path.clone(),
        timestamp: ctx.time,
    };
    match service.start_epic(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Started epic {} ({})", result.entity_id, result.entity_name);
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}

pub fn done(ctx: &AppContext) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = EpicRequest {
        epic_path: path.clone(),
        timestamp: ctx.time,
    };
    match service.complete_epic(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!(
                    "Completed epic {} ({})",
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
