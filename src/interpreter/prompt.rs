//! System 前言：可用动作、已打开的进程、运营方提示

use crate::interpreter::TurnContext;
use crate::process::ProcessDescriptions;
use crate::resources::ActionDict;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Hive, a helpful assistant. You can answer directly or use the available actions.";

fn actions_section(actions: &ActionDict) -> String {
    if actions.is_empty() {
        return "No actions are available.".to_string();
    }
    let mut lines = vec!["Available actions:".to_string()];
    for (handle, def) in actions {
        let mut line = format!(
            "- {}: {}",
            handle,
            def.description.as_deref().unwrap_or("(no description)")
        );
        if let Some(schema) = &def.params_schema {
            line.push_str(&format!(" params={}", schema));
        }
        if let Some(display) = def.pinned_display() {
            line.push_str(&format!(" display={}", display.as_str()));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn processes_section(processes: &ProcessDescriptions) -> String {
    if processes.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Open processes:".to_string()];
    for (pid, desc) in processes {
        lines.push(format!("- {}: {}", pid, desc));
    }
    lines.join("\n")
}

/// 拼接 system 前言
pub fn system_preamble(ctx: &TurnContext, processes: &ProcessDescriptions) -> String {
    let mut sections = vec![ctx.system_prompt.clone(), actions_section(&ctx.actions)];
    let procs = processes_section(processes);
    if !procs.is_empty() {
        sections.push(procs);
    }
    if let Some(hint) = ctx.hint.as_deref().filter(|h| !h.trim().is_empty()) {
        sections.push(format!("Operator hint: {}", hint));
    }
    sections.join("\n\n")
}
