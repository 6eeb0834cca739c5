//! Reachability diagnostics for a configured remote file system.
//!
//! The probes never authenticate: they resolve the host, open a TCP
//! connection to the protocol port and, for SFTP, read the SSH banner. The
//! resulting [`DiagnosticReport`] tells an administrator whether a failing
//! file store is a network problem or a credentials/configuration problem.

use crate::model::ClientType;
use crate::options::ProtocolConfig;
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pass,
    Fail,
    Skip,
    Warn,
    Info,
}

/// Result of a single probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticStep {
    pub name: String,
    pub status: StepStatus,
    pub message: String,
    pub duration_ms: u64,
    pub detail: Option<String>,
}

impl DiagnosticStep {
    fn new(name: &str, status: StepStatus, message: impl Into<String>, started: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration_ms: started.elapsed().as_millis() as u64,
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub host: String,
    pub port: u16,
    pub client_type: ClientType,
    pub resolved_ip: Option<String>,
    pub steps: Vec<DiagnosticStep>,
    pub summary: String,
    pub root_cause_hint: Option<String>,
    pub total_duration_ms: u64,
}

impl DiagnosticReport {
    pub fn reachable(&self) -> bool {
        !self.steps.iter().any(|s| s.status == StepStatus::Fail)
    }
}

const DNS_STEP: &str = "DNS Resolution";
const TCP_STEP: &str = "TCP Connect";
const BANNER_STEP: &str = "Service Banner";
const ROOT_CAUSE_STEP: &str = "Root Cause Analysis";

/// Run every probe that applies to `config`.
pub fn diagnose(config: &ProtocolConfig, timeout: Duration) -> DiagnosticReport {
    let start = Instant::now();
    let host = config.host();
    let port = config.port();
    let client_type = config.client_type();
    let mut steps = Vec::new();

    let (addr, resolved_ip, _) = probe_dns(host, port, &mut steps);
    if let Some(addr) = addr {
        match probe_tcp(addr, timeout, &mut steps) {
            Some(stream) if client_type == ClientType::Sftp => {
                let banner = probe_banner(&stream, timeout, &mut steps);
                check_ssh_banner(banner.as_deref(), &mut steps);
            }
            Some(_) => steps.push(
                DiagnosticStep::new(BANNER_STEP, StepStatus::Skip, "SMB servers wait for the client to speak first", Instant::now()),
            ),
            None => {}
        }
    }
    finish_report(host, port, client_type, resolved_ip, steps, start)
}

/// Resolve `host` and return the first address. Pushes one step.
pub fn probe_dns(
    host: &str,
    port: u16,
    steps: &mut Vec<DiagnosticStep>,
) -> (Option<SocketAddr>, Option<String>, Vec<String>) {
    let t = Instant::now();
    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            let all: Vec<SocketAddr> = addrs.collect();
            let Some(first) = all.first().copied() else {
                steps.push(
                    DiagnosticStep::new(DNS_STEP, StepStatus::Fail, format!("DNS returned no addresses for {host}"), t)
                        .with_detail("Verify the host name in the remote file system url"),
                );
                return (None, None, Vec::new());
            };
            let ip = first.ip().to_string();
            let all_ips: Vec<String> = all.iter().map(|a| a.ip().to_string()).collect();
            let mut step = DiagnosticStep::new(DNS_STEP, StepStatus::Pass, format!("{host} resolved to {ip}"), t);
            if all_ips.len() > 1 {
                step = step.with_detail(format!("All resolved addresses: {}", all_ips.join(", ")));
            }
            steps.push(step);
            (Some(first), Some(ip), all_ips)
        }
        Err(e) => {
            steps.push(
                DiagnosticStep::new(DNS_STEP, StepStatus::Fail, format!("DNS lookup failed: {e}"), t)
                    .with_detail("Check the host name spelling and the DNS configuration of this server"),
            );
            (None, None, Vec::new())
        }
    }
}

/// TCP connect with timeout. Pushes one step.
pub fn probe_tcp(
    socket_addr: SocketAddr,
    timeout: Duration,
    steps: &mut Vec<DiagnosticStep>,
) -> Option<TcpStream> {
    let t = Instant::now();
    match TcpStream::connect_timeout(&socket_addr, timeout) {
        Ok(stream) => {
            steps.push(DiagnosticStep::new(TCP_STEP, StepStatus::Pass, format!("Connected to {socket_addr}"), t));
            Some(stream)
        }
        Err(e) => {
            let detail = match e.kind() {
                io::ErrorKind::TimedOut => "Timed out: the port may be firewalled or the host is down",
                io::ErrorKind::ConnectionRefused => "Refused: no service is listening on this port",
                _ => "Check firewall rules and that the file server is running",
            };
            steps.push(
                DiagnosticStep::new(TCP_STEP, StepStatus::Fail, format!("TCP connect failed: {e}"), t)
                    .with_detail(detail),
            );
            None
        }
    }
}

/// Read whatever the server sends first, waiting up to `timeout`.
pub fn probe_banner(
    stream: &TcpStream,
    timeout: Duration,
    steps: &mut Vec<DiagnosticStep>,
) -> Option<String> {
    let _ = stream.set_read_timeout(Some(timeout));
    let t = Instant::now();
    let mut buf = [0u8; 512];
    match (&mut &*stream).read(&mut buf) {
        Ok(0) => {
            steps.push(DiagnosticStep::new(
                BANNER_STEP,
                StepStatus::Warn,
                "Server closed the connection without a banner",
                t,
            ));
            None
        }
        Ok(n) => {
            let banner = String::from_utf8_lossy(&buf[..n]).trim().to_string();
            let shown: String = banner.chars().take(120).collect();
            steps.push(DiagnosticStep::new(BANNER_STEP, StepStatus::Pass, format!("Banner: {shown}"), t));
            Some(banner)
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            steps.push(DiagnosticStep::new(
                BANNER_STEP,
                StepStatus::Info,
                "No banner within the timeout",
                t,
            ));
            None
        }
        Err(e) => {
            steps.push(DiagnosticStep::new(BANNER_STEP, StepStatus::Fail, format!("Banner read failed: {e}"), t));
            None
        }
    }
}

fn check_ssh_banner(banner: Option<&str>, steps: &mut Vec<DiagnosticStep>) {
    let t = Instant::now();
    match banner {
        Some(b) if b.starts_with("SSH-2.0") || b.starts_with("SSH-1.99") => {}
        Some(b) => steps.push(
            DiagnosticStep::new(ROOT_CAUSE_STEP, StepStatus::Warn, "The port does not speak SSH", t)
                .with_detail(format!("Expected an SSH-2.0 identification, got '{}'", b.chars().take(40).collect::<String>())),
        ),
        None => steps.push(
            DiagnosticStep::new(ROOT_CAUSE_STEP, StepStatus::Warn, "No SSH identification received", t)
                .with_detail("Another service may be bound to the SFTP port"),
        ),
    }
}

/// Assemble the report from the collected steps.
pub fn finish_report(
    host: &str,
    port: u16,
    client_type: ClientType,
    resolved_ip: Option<String>,
    steps: Vec<DiagnosticStep>,
    start: Instant,
) -> DiagnosticReport {
    let first_fail = steps.iter().find(|s| s.status == StepStatus::Fail);
    let any_warn = steps.iter().any(|s| s.status == StepStatus::Warn);
    let root_cause_hint = steps
        .iter()
        .rev()
        .find(|s| s.name == ROOT_CAUSE_STEP)
        .and_then(|s| s.detail.clone())
        .or_else(|| first_fail.and_then(|s| s.detail.clone()));

    let summary = if let Some(fail) = first_fail {
        format!("{} failed: {}", fail.name, fail.message)
    } else if any_warn {
        format!("{host}:{port} is reachable but reported warnings")
    } else {
        format!("{host}:{port} is reachable; authentication was not attempted")
    };

    DiagnosticReport {
        host: host.to_string(),
        port,
        client_type,
        resolved_ip,
        steps,
        summary,
        root_cause_hint,
        total_duration_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn step(name: &str, status: StepStatus) -> DiagnosticStep {
        DiagnosticStep::new(name, status, "msg", Instant::now())
    }

    #[test]
    fn step_serializes_camel_case() {
        let json = serde_json::to_string(&step(DNS_STEP, StepStatus::Pass)).unwrap();
        assert!(json.contains("\"durationMs\""));
        assert!(json.contains("\"status\":\"pass\""));
    }

    #[test]
    fn probe_dns_resolves_localhost() {
        let mut steps = Vec::new();
        let (addr, ip, all) = probe_dns("localhost", 22, &mut steps);
        assert!(addr.is_some());
        assert!(ip.is_some());
        assert!(!all.is_empty());
        assert_eq!(steps[0].status, StepStatus::Pass);
    }

    #[test]
    fn probe_tcp_fails_on_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut steps = Vec::new();
        assert!(probe_tcp(addr, Duration::from_millis(200), &mut steps).is_none());
        assert_eq!(steps[0].status, StepStatus::Fail);
        assert!(steps[0].detail.is_some());
    }

    #[test]
    fn banner_is_read_from_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").unwrap();
        });
        let mut steps = Vec::new();
        let stream = probe_tcp(addr, Duration::from_secs(2), &mut steps).unwrap();
        let banner = probe_banner(&stream, Duration::from_secs(2), &mut steps);
        server.join().unwrap();
        assert_eq!(banner.as_deref(), Some("SSH-2.0-OpenSSH_9.6"));
        check_ssh_banner(banner.as_deref(), &mut steps);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pass));
    }

    #[test]
    fn non_ssh_banner_sets_root_cause() {
        let mut steps = vec![step(DNS_STEP, StepStatus::Pass)];
        check_ssh_banner(Some("220 ftp ready"), &mut steps);
        let report = finish_report("h", 22, ClientType::Sftp, None, steps, Instant::now());
        assert!(report.reachable());
        assert!(report.summary.contains("warnings"));
        assert!(report.root_cause_hint.unwrap().contains("220 ftp"));
    }

    #[test]
    fn finish_report_names_first_failure() {
        let steps = vec![step(DNS_STEP, StepStatus::Pass), step(TCP_STEP, StepStatus::Fail)];
        let report = finish_report("files", 445, ClientType::Smb2, None, steps, Instant::now());
        assert!(!report.reachable());
        assert!(report.summary.starts_with("TCP Connect failed"));
    }

    #[test]
    fn finish_report_all_pass() {
        let report = finish_report("files", 445, ClientType::Cifs, None, Vec::new(), Instant::now());
        assert!(report.reachable());
        assert!(report.summary.contains("authentication was not attempted"));
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"clientType\":\"CIFS\""));
    }
}
