use crate::error::CliError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub key: String,
    pub checkpoint: Option<CheckpointView>,
    pub done_ranges: usize,
}

#[derive(Debug, Serialize)]
pub struct CheckpointView {
    pub file: String,
    pub pos: u32,
}

pub fn print_status(report: &StatusReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Status for `{}`:", report.key);
    println!("-----------------------------");
    match &report.checkpoint {
        Some(cp) => println!("{:<16} {}:{}", "Checkpoint", cp.file, cp.pos),
        None => println!("{:<16} (none — full load not yet handed off)", "Checkpoint"),
    }
    println!("{:<16} {}", "Done ranges", report.done_ranges);
    Ok(())
}
