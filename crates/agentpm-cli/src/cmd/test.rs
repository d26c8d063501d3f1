use crate::output::{self, print_json};
use crate::AppContext;
use agentpm_core::lifecycle::{CancelTestRequest, FailTestRequest, TestRequest};
use agentpm_core::store::EpicStore;

pub fn start(ctx: &AppContext, id: &str) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = TestRequest {
        epic_path: path.clone(),
        test_id: id.to_string(),
        timestamp: ctx.time,
    };
    match service.start_test(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Started test {} ({})", result.entity_id, result.entity_name);
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}

pub fn pass(ctx: &AppContext, id: &str) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = TestRequest {
        epic_path: path.clone(),
        test_id: id.to_string(),
        timestamp: ctx.time,
    };
    match service.pass_test(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Test {} passed", result.entity_id);
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}

pub fn fail(ctx: &AppContext, id: &str, reason: &str) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = FailTestRequest {
        epic_path: path.clone(),
        test_id: id.to_string(),
        reason: reason.to_string(),
        timestamp: ctx.time,
    };
    match service.fail_test(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else if reason.is_empty() {
                println!("Test {} marked failing", result.entity_id);
            } else {
                println!("Test {} marked failing: {reason}", result.entity_id);
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
    let req = CancelTestRequest {
        epic_path: path.clone(),
        test_id: id.to_string(),
        reason: reason.to_string(),
        timestamp: ctx.time,
    };
    match service.cancel_test(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Cancelled test {}: {reason}", result.entity_id);
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}
