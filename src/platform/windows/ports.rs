//! Windows port scanning implementation using netstat

use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};

use crate::model::PortRecord;
use crate::utils::hidden_command;

pub fn scan_ports() -> Result<Vec<PortRecord>> {
    // Run netstat to get listening ports (hidden to prevent console flicker)
    let output = hidden_command("netstat")
        .args(["-ano", "-p", "TCP"])
        .output()
        .context("failed to execute netstat")?;

    if !output.status.success() {
        return Err(anyhow!(
            "netstat failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_netstat_output(&stdout, |pid| {
        get_process_name(pid as u32).unwrap_or_else(|| format!("PID {}", pid))
    }))
}

/// Parses `netstat -ano` output, resolving process names through `name_of`.
pub fn parse_netstat_output(stdout: &str, name_of: impl Fn(i32) -> String) -> Vec<PortRecord> {
    let mut results: Vec<PortRecord> = Vec::new();
    let mut seen: HashSet<(u16, i32)> = HashSet::new();

    for line in stdout.lines() {
        // TCP    0.0.0.0:3000    0.0.0.0:0    LISTENING    1234
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 || parts[0] != "TCP" || parts[3] != "LISTENING" {
            continue;
        }

        let Some(port) = parse_port_from_address(parts[1]) else {
            continue;
        };
        let Ok(pid) = parts[4].parse::<i32>() else {
            continue;
        };

        // Skip PID 0 (System Idle Process)
        if pid == 0 || !seen.insert((port, pid)) {
            continue;
        }

        results.push(PortRecord::new(port, pid, name_of(pid)));
    }

    results.sort();
    results
}

/// Parse port from address like "0.0.0.0:3000" or "[::]:3000" or "127.0.0.1:8080"
fn parse_port_from_address(addr: &str) -> Option<u16> {
    let port = if addr.contains('[') {
        let bracket_pos = addr.rfind(']')?;
        addr[bracket_pos + 1..].strip_prefix(':')?.parse::<u16>().ok()?
    } else {
        addr.rsplit(':').next()?.parse::<u16>().ok()?
    };
    (port != 0).then_some(port)
}

/// Get process name from PID using Windows API
fn get_process_name(pid: u32) -> Option<String> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::ProcessStatus::K32GetModuleBaseNameW;
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_READ,
    };

    unsafe {
        let handle =
            OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_VM_READ, false, pid).ok()?;

        let mut name = [0u16; 260];
        let len = K32GetModuleBaseNameW(handle, None, &mut name);
        let _ = CloseHandle(handle);

        if len > 0 {
            Some(String::from_utf16_lossy(&name[..len as usize]))
        } else {
            None
        }
    }
}
