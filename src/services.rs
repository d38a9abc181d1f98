//! Service detection based on well-known port numbers.
//!
//! Lookups consult the curated known-ports table first, then the system
//! services database, and finally fall back to `"Unknown"`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Service name reported when no table knows the port.
pub const UNKNOWN_SERVICE: &str = "Unknown";

/// Location of the system services database.
const SYSTEM_SERVICES_PATH: &str = "/etc/services";

/// Curated map of well-known ports to service names.
///
/// This is also the port set scanned in common-ports mode.
static KNOWN_PORTS: LazyLock<HashMap<u16, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    m.insert(20, "FTP-Data");
    m.insert(21, "FTP");
    m.insert(22, "SSH");
    m.insert(23, "Telnet");
    m.insert(25, "SMTP");
    m.insert(53, "DNS");
    m.insert(67, "DHCP Server");
    m.insert(68, "DHCP Client");
    m.insert(69, "TFTP");
    m.insert(80, "HTTP");
    m.insert(110, "POP3");
    m.insert(111, "RPCbind");
    m.insert(123, "NTP");
    m.insert(135, "Microsoft RPC");
    m.insert(137, "NetBIOS-NS");
    m.insert(138, "NetBIOS-DGM");
    m.insert(139, "NetBIOS-SSN");
    m.insert(143, "IMAP");
    m.insert(161, "SNMP");
    m.insert(162, "SNMPTRAP");
    m.insert(389, "LDAP");
    m.insert(443, "HTTPS");
    m.insert(445, "Microsoft-DS (SMB)");
    m.insert(500, "ISAKMP");
    m.insert(514, "Syslog");
    m.insert(631, "IPP (CUPS)");
    m.insert(993, "IMAPS");
    m.insert(995, "POP3S");
    m.insert(1080, "SOCKS");
    m.insert(1433, "MSSQL");
    m.insert(1521, "Oracle");
    m.insert(1701, "L2TP");
    m.insert(1723, "PPTP");
    m.insert(3306, "MySQL");
    m.insert(3389, "RDP");
    m.insert(5060, "SIP");
    m.insert(5061, "SIPS");
    m.insert(5432, "PostgreSQL");
    m.insert(5800, "VNC-HTTP");
    m.insert(5900, "VNC");
    m.insert(5901, "VNC-1");
    m.insert(8000, "HTTP-Alt");
    m.insert(8080, "HTTP-Proxy");
    m.insert(8443, "HTTPS-Alt");

    m
});

/// TCP entries of the system services database, loaded on first use.
static SYSTEM_SERVICES: LazyLock<HashMap<u16, String>> =
    LazyLock::new(|| load_services_db(Path::new(SYSTEM_SERVICES_PATH)));

/// Look up the curated name for a port.
pub fn known_service(port: u16) -> Option<&'static str> {
    KNOWN_PORTS.get(&port).copied()
}

/// Look up a port in the system services database.
pub fn system_service(port: u16) -> Option<&'static str> {
    SYSTEM_SERVICES.get(&port).map(String::as_str)
}

/// Resolve the service name for an open port.
///
/// Returns `"Unknown"` if neither table recognizes it.
pub fn service_name(port: u16) -> &'static str {
    known_service(port)
        .or_else(|| system_service(port))
        .unwrap_or(UNKNOWN_SERVICE)
}

/// All ports in the curated table, ascending.
pub fn common_ports() -> Vec<u16> {
    let mut ports: Vec<u16> = KNOWN_PORTS.keys().copied().collect();
    ports.sort_unstable();
    ports
}

fn load_services_db(path: &Path) -> HashMap<u16, String> {
    match fs::read_to_string(path) {
        Ok(content) => parse_services(&content),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "services database unavailable");
            HashMap::new()
        }
    }
}

/// Parse `services(5)` content, keeping the first tcp name per port.
fn parse_services(content: &str) -> HashMap<u16, String> {
    let mut map = HashMap::new();

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((port, proto)) = port_proto.split_once('/') else {
            continue;
        };
        if proto != "tcp" {
            continue;
        }
        if let Ok(port) = port.parse::<u16>() {
            map.entry(port).or_insert_with(|| name.to_string());
        }
    }

    map
}
