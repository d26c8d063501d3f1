use crate::output::{self, print_json};
use crate::AppContext;
use agentpm_core::lifecycle::LogRequest;
use agentpm_core::store::EpicStore;

pub fn run(ctx: &AppContext, message: &str, event_type: Option<&str>) -> anyhow::Result<()> {
    let path = ctx.epic_path()?;
    let service = ctx.service();
    let req = LogRequest {
        epic_path: path.clone(),
        message: message.to_string(),
        event_type: event_type.map(str::to_string),
        timestamp: ctx.time,
    };
    match service.log(&req) {
        Ok(result) => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Logged {} event {}", result.event_type, result.event_id);
            }
            Ok(())
        }
        Err(err) => {
            let epic = service.store().load_epic(&path).ok();
            output::fail(err, epic.as_ref(), ctx.json)
        }
    }
}
