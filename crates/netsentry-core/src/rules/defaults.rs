//! Compiled-in signature rules.
//!
//! Shipped rules use literal content patterns only; the regex lane is
//! reserved for user-authored rules.

use super::{IpFilter, ProtocolFilter, RuleAction, Severity, SignatureRule};
use crate::protocols::packet::layout::tcp_flags;

/// TCP services a SYN probe against which is worth flagging.
const SCAN_TARGET_PORTS: [u16; 17] = [
    21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 993, 995, 1433, 3306, 3389, 5432, 8080,
];

/// The shipped rule set, ids 1001–1006.
pub fn default_rules() -> Vec<SignatureRule> {
    vec![
        SignatureRule {
            rule_id: 1001,
            name: "SSH connection probe".to_string(),
            description: "SYN toward SSH from an unestablished peer".to_string(),
            protocol: ProtocolFilter::Tcp,
            src_ip: IpFilter::Any,
            dst_ip: IpFilter::Any,
            src_ports: Vec::new(),
            dst_ports: vec![22],
            tcp_flags_mask: tcp_flags::SYN | tcp_flags::ACK,
            tcp_flags_value: tcp_flags::SYN,
            content_patterns: Vec::new(),
            regex_patterns: Vec::new(),
            severity: Severity::Medium,
            action: RuleAction::Alert,
            enabled: true,
        },
        SignatureRule {
            rule_id: 1002,
            name: "SQL injection attempt".to_string(),
            description: "SQL injection substring in HTTP traffic".to_string(),
            protocol: ProtocolFilter::Tcp,
            src_ip: IpFilter::Any,
            dst_ip: IpFilter::Any,
            src_ports: Vec::new(),
            dst_ports: vec![80, 8080],
            tcp_flags_mask: 0,
            tcp_flags_value: 0,
            content_patterns: vec![
                "' or '1'='1".to_string(),
                "or 1=1".to_string(),
                "union select".to_string(),
                "drop table".to_string(),
                "; --".to_string(),
            ],
            regex_patterns: Vec::new(),
            severity: Severity::High,
            action: RuleAction::Alert,
            enabled: true,
        },
        SignatureRule {
            rule_id: 1003,
            name: "TCP port scan".to_string(),
            description: "SYN without ACK toward a well-known service port".to_string(),
            protocol: ProtocolFilter::Tcp,
            src_ip: IpFilter::Any,
            dst_ip: IpFilter::Any,
            src_ports: Vec::new(),
            dst_ports: SCAN_TARGET_PORTS.to_vec(),
            tcp_flags_mask: tcp_flags::SYN | tcp_flags::ACK,
            tcp_flags_value: tcp_flags::SYN,
            content_patterns: Vec::new(),
            regex_patterns: Vec::new(),
            severity: Severity::Low,
            action: RuleAction::Alert,
            enabled: true,
        },
        SignatureRule {
            rule_id: 1004,
            name: "FTP cleartext credentials".to_string(),
            description: "USER/PASS command on the FTP control channel".to_string(),
            protocol: ProtocolFilter::Tcp,
            src_ip: IpFilter::Any,
            dst_ip: IpFilter::Any,
            src_ports: Vec::new(),
            dst_ports: vec![21],
            tcp_flags_mask: 0,
            tcp_flags_value: 0,
            content_patterns: vec!["USER ".to_string(), "PASS ".to_string()],
            regex_patterns: Vec::new(),
            severity: Severity::Medium,
            action: RuleAction::Alert,
            enabled: true,
        },
        SignatureRule {
            rule_id: 1005,
            name: "DNS query logging".to_string(),
            description: "Any DNS traffic; noisy, off by default".to_string(),
            protocol: ProtocolFilter::Udp,
            src_ip: IpFilter::Any,
            dst_ip: IpFilter::Any,
            src_ports: Vec::new(),
            dst_ports: vec![53],
            tcp_flags_mask: 0,
            tcp_flags_value: 0,
            content_patterns: Vec::new(),
            regex_patterns: Vec::new(),
            severity: Severity::Low,
            action: RuleAction::Log,
            enabled: false,
        },
        SignatureRule {
            rule_id: 1006,
            name: "Telnet session".to_string(),
            description: "Plaintext Telnet to port 23".to_string(),
            protocol: ProtocolFilter::Tcp,
            src_ip: IpFilter::Any,
            dst_ip: IpFilter::Any,
            src_ports: Vec::new(),
            dst_ports: vec![23],
            tcp_flags_mask: 0,
            tcp_flags_value: 0,
            content_patterns: Vec::new(),
            regex_patterns: Vec::new(),
            severity: Severity::Medium,
            action: RuleAction::Alert,
            enabled: true,
        },
    ]
}
