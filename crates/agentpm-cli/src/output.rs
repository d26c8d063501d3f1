use agentpm_core::epic::Epic;
use agentpm_core::hints::{HintContext, HintRegistry};
use agentpm_core::AgentPmError;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let render = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                format!("{:w$}", cell, w = widths.get(i).copied().unwrap_or(0))
            })
            .collect();
        padded.join("  ")
    };

    println!(
        "{}",
        render(headers.iter().map(|h| h.to_string()).collect())
    );
    println!(
        "{}",
        render(widths.iter().map(|&w| "-".repeat(w)).collect())
    );
    for row in rows {
        println!("{}", render(row));
    }
}

/// Render a refused lifecycle operation and exit non-zero. Text mode prints
/// the one-line message plus the registry's hint; JSON mode emits the full
/// structured body on stderr.
pub fn fail(err: AgentPmError, epic: Option<&Epic>, json: bool) -> ! {
    let registry = HintRegistry::new();
    let hint = registry.hint_for(&HintContext {
        error: &err,
        epic,
    });

    if json {
        let body = serde_json::json!({
            "error": {
                "type": err.kind(),
                "message": err.to_string(),
                "suggestion": err.suggestion(),
                "hint": hint,
            }
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
        );
        std::process::exit(1);
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {}", hint.content);
        if let Some(command) = hint.suggested_command {
            eprintln!("  run: agentpm {command}");
        }
    } else if let Some(suggestion) = err.suggestion() {
        eprintln!("hint: {suggestion}");
    }
    std::process::exit(1);
}
