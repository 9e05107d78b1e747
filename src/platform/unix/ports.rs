//! macOS / Linux port scanning using lsof

use std::collections::HashSet;
use std::process::Command;

use anyhow::{Context, Result, anyhow};

use crate::model::PortRecord;

pub fn scan_ports() -> Result<Vec<PortRecord>> {
    let output = Command::new("lsof")
        .args(["-nP", "-iTCP", "-sTCP:LISTEN", "-Fpcn"])
        .output()
        .context("failed to execute lsof sweep")?;

    // lsof exits 1 with no output when nothing is listening
    if !output.status.success() {
        if output.status.code() == Some(1) && output.stdout.is_empty() {
            return Ok(Vec::new());
        }
        return Err(anyhow!(
            "lsof sweep failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(parse_lsof_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses `lsof -F pcn` field output into sorted, de-duplicated records.
pub fn parse_lsof_output(stdout: &str) -> Vec<PortRecord> {
    let mut current_pid: Option<i32> = None;
    let mut current_cmd: Option<String> = None;
    let mut results: Vec<PortRecord> = Vec::new();
    let mut seen: HashSet<(u16, i32)> = HashSet::new();

    for line in stdout.lines() {
        let Some((tag, val)) = line.get(..1).zip(line.get(1..)) else {
            continue;
        };
        match tag {
            "p" => {
                current_pid = val.trim().parse::<i32>().ok().filter(|pid| *pid > 0);
                current_cmd = None;
            }
            "c" => {
                current_cmd = Some(val.trim().to_string());
            }
            "n" => {
                if let Some(pid) = current_pid
                    && let Some(port) = parse_port_from_lsof(val.trim())
                    && seen.insert((port, pid))
                {
                    let name = current_cmd
                        .clone()
                        .unwrap_or_else(|| format!("PID {}", pid));
                    results.push(PortRecord::new(port, pid, name));
                }
            }
            _ => {}
        }
    }

    results.sort();
    results
}

// Extract a port number from an lsof name field.
// Handles "*:3000", "127.0.0.1:5173", and "[::1]:8000".
pub fn parse_port_from_lsof(name: &str) -> Option<u16> {
    if name.contains("->") {
        return None;
    }
    let (_, digits) = name.rsplit_once(':')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u16>().ok().filter(|port| *port != 0)
}
