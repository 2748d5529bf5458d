//! Signature rule evaluation.
//!
//! Rules are stateless predicates over a single parsed packet; the only
//! engine state is the rule table, a compiled-regex cache, and match
//! counters. Evaluation applies the cheap predicates first and
//! short-circuits on the first failure.

mod defaults;

pub use defaults::default_rules;

use std::collections::HashMap;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::protocols::packet::{ParsedPacket, Transport};

/// Only this many leading payload octets are searched for content and
/// regex patterns.
pub const CONTENT_WINDOW: usize = 1024;

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// What a matching rule asks for. The engine is passive, so `Drop`
/// still only emits an alert; the action is carried for downstream
/// consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Alert,
    Log,
    Drop,
}

/// Transport requirement of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFilter {
    Any,
    Tcp,
    Udp,
}

/// Source/destination address filter. Only literal addresses and "any"
/// match; CIDR notation is reserved in the schema and never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpFilter {
    Any,
    Literal(String),
    /// Recognized-but-unsupported syntax; never matches.
    Inert(String),
}

impl IpFilter {
    pub fn parse(text: &str) -> Self {
        if text.eq_ignore_ascii_case("any") {
            IpFilter::Any
        } else if text.contains('/') {
            IpFilter::Inert(text.to_string())
        } else {
            IpFilter::Literal(text.to_string())
        }
    }

    fn matches(&self, ip: &str) -> bool {
        match self {
            IpFilter::Any => true,
            IpFilter::Literal(literal) => literal == ip,
            IpFilter::Inert(_) => false,
        }
    }
}

/// Stateless signature over a single packet.
#[derive(Debug, Clone)]
pub struct SignatureRule {
    pub rule_id: u32,
    pub name: String,
    pub description: String,
    pub protocol: ProtocolFilter,
    pub src_ip: IpFilter,
    pub dst_ip: IpFilter,
    /// Empty list means any port.
    pub src_ports: Vec<u16>,
    pub dst_ports: Vec<u16>,
    /// Match iff `flags & mask == value`; a zero mask disables the test.
    pub tcp_flags_mask: u8,
    pub tcp_flags_value: u8,
    /// Case-insensitive substrings; at least one must occur in the
    /// content window.
    pub content_patterns: Vec<String>,
    /// Case-insensitive regexes; at least one must match in the window.
    pub regex_patterns: Vec<String>,
    pub severity: Severity,
    pub action: RuleAction,
    pub enabled: bool,
}

/// Outcome of evaluating one packet against the rule table.
#[derive(Debug)]
struct RuleMatch {
    rule_index: usize,
    matched_content: Option<String>,
}

/// Signature matcher with compiled-regex cache and counters.
pub struct RuleEngine {
    rules: Vec<SignatureRule>,
    regex_cache: HashMap<String, Option<regex::Regex>>,
    match_counts: HashMap<u32, u64>,
    next_alert_id: u64,
    packets_evaluated: u64,
    invalid_regexes: u64,
}

impl RuleEngine {
    pub fn new(rules: Vec<SignatureRule>) -> Self {
        for rule in &rules {
            for filter in [&rule.src_ip, &rule.dst_ip] {
                if let IpFilter::Inert(text) = filter {
                    log::warn!(
                        "rule {}: CIDR filter '{}' is not supported and will never match",
                        rule.rule_id,
                        text
                    );
                }
            }
        }
        Self {
            rules,
            regex_cache: HashMap::new(),
            match_counts: HashMap::new(),
            next_alert_id: 0,
            packets_evaluated: 0,
            invalid_regexes: 0,
        }
    }

    /// Engine pre-loaded with the shipped rule set.
    pub fn with_default_rules() -> Self {
        Self::new(default_rules())
    }

    /// Evaluate every enabled rule against a packet. Each matching rule
    /// emits its own alert; alert ids are monotone for the engine's
    /// lifetime.
    pub fn evaluate(&mut self, packet: &ParsedPacket<'_>) -> Vec<Alert> {
        self.packets_evaluated += 1;

        let mut matches = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.enabled {
                continue;
            }
            if let Some(matched_content) = rule_matches(
                rule,
                packet,
                &mut self.regex_cache,
                &mut self.invalid_regexes,
            ) {
                matches.push(RuleMatch {
                    rule_index: index,
                    matched_content,
                });
            }
        }

        matches
            .into_iter()
            .map(|matched| {
                let rule = &self.rules[matched.rule_index];
                *self.match_counts.entry(rule.rule_id).or_insert(0) += 1;
                self.next_alert_id += 1;
                Alert::from_match(
                    self.next_alert_id,
                    rule,
                    packet,
                    matched.matched_content,
                )
            })
            .collect()
    }

    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    pub fn match_count(&self, rule_id: u32) -> u64 {
        self.match_counts.get(&rule_id).copied().unwrap_or(0)
    }

    pub fn packets_evaluated(&self) -> u64 {
        self.packets_evaluated
    }

    pub fn invalid_regexes(&self) -> u64 {
        self.invalid_regexes
    }
}

/// Apply the predicate chain. Returns `None` on the first failing
/// predicate, `Some(matched_content)` when every predicate holds.
fn rule_matches(
    rule: &SignatureRule,
    packet: &ParsedPacket<'_>,
    regex_cache: &mut HashMap<String, Option<regex::Regex>>,
    invalid_regexes: &mut u64,
) -> Option<Option<String>> {
    match rule.protocol {
        ProtocolFilter::Tcp if !matches!(packet.transport, Transport::Tcp(_)) => return None,
        ProtocolFilter::Udp if !matches!(packet.transport, Transport::Udp(_)) => return None,
        _ => {}
    }

    if !rule.src_ip.matches(&packet.src_ip()) || !rule.dst_ip.matches(&packet.dst_ip()) {
        return None;
    }

    if !rule.src_ports.is_empty() && !rule.src_ports.contains(&packet.src_port()) {
        return None;
    }
    if !rule.dst_ports.is_empty() && !rule.dst_ports.contains(&packet.dst_port()) {
        return None;
    }

    if rule.tcp_flags_mask != 0 {
        let Some(tcp) = packet.tcp() else {
            return None;
        };
        if tcp.flags & rule.tcp_flags_mask != rule.tcp_flags_value {
            return None;
        }
    }

    let mut matched_content = None;
    if !rule.content_patterns.is_empty() {
        if packet.payload.is_empty() {
            return None;
        }
        let window = content_window(packet.payload);
        let haystack = window.to_ascii_lowercase();
        matched_content = rule
            .content_patterns
            .iter()
            .find(|pattern| contains_subslice(&haystack, pattern.to_ascii_lowercase().as_bytes()))
            .cloned();
        matched_content.as_ref()?;
    }

    if !rule.regex_patterns.is_empty() {
        let window = String::from_utf8_lossy(content_window(packet.payload));
        let hit = rule.regex_patterns.iter().any(|pattern| {
            let regex = regex_cache.entry(pattern.clone()).or_insert_with(|| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => Some(regex),
                    Err(err) => {
                        *invalid_regexes += 1;
                        log::warn!("invalid rule regex '{pattern}': {err}");
                        None
                    }
                }
            });
            regex
                .as_ref()
                .map(|regex| regex.is_match(&window))
                .unwrap_or(false)
        });
        if !hit {
            return None;
        }
    }

    Some(matched_content)
}

fn content_window(payload: &[u8]) -> &[u8] {
    &payload[..payload.len().min(CONTENT_WINDOW)]
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::{
        IpFilter, ProtocolFilter, RuleAction, RuleEngine, Severity, SignatureRule,
        contains_subslice,
    };
    use crate::protocols::packet::layout::tcp_flags;
    use crate::protocols::packet::parse_frame;
    use etherparse::PacketBuilder;

    fn rule(rule_id: u32) -> SignatureRule {
        SignatureRule {
            rule_id,
            name: format!("test rule {rule_id}"),
            description: "test".to_string(),
            protocol: ProtocolFilter::Tcp,
            src_ip: IpFilter::Any,
            dst_ip: IpFilter::Any,
            src_ports: Vec::new(),
            dst_ports: Vec::new(),
            tcp_flags_mask: 0,
            tcp_flags_value: 0,
            content_patterns: Vec::new(),
            regex_patterns: Vec::new(),
            severity: Severity::Low,
            action: RuleAction::Alert,
            enabled: true,
        }
    }

    fn tcp_packet_frame(dst_port: u16, syn_only: bool, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([0; 6], [0; 6]).ipv4(
            [10, 0, 0, 50],
            [192, 168, 1, 10],
            64,
        );
        let builder = if syn_only {
            builder.tcp(52342, dst_port, 0, 8192).syn()
        } else {
            builder.tcp(52342, dst_port, 0, 8192).psh().ack(1)
        };
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    #[test]
    fn port_list_filters() {
        let mut with_port = rule(1);
        with_port.dst_ports = vec![22, 23];

        let mut engine = RuleEngine::new(vec![with_port]);
        let hit = tcp_packet_frame(22, true, b"");
        let miss = tcp_packet_frame(80, true, b"");

        assert_eq!(engine.evaluate(&parse_frame(0.0, &hit).unwrap()).len(), 1);
        assert!(engine.evaluate(&parse_frame(0.1, &miss).unwrap()).is_empty());
        assert_eq!(engine.match_count(1), 1);
    }

    #[test]
    fn flag_mask_requires_exact_value() {
        let mut syn_scan = rule(2);
        syn_scan.tcp_flags_mask = tcp_flags::SYN | tcp_flags::ACK;
        syn_scan.tcp_flags_value = tcp_flags::SYN;

        let mut engine = RuleEngine::new(vec![syn_scan]);
        let syn = tcp_packet_frame(80, true, b"");
        let psh_ack = tcp_packet_frame(80, false, b"x");

        assert_eq!(engine.evaluate(&parse_frame(0.0, &syn).unwrap()).len(), 1);
        assert!(
            engine
                .evaluate(&parse_frame(0.1, &psh_ack).unwrap())
                .is_empty()
        );
    }

    #[test]
    fn content_match_is_case_insensitive_and_cited() {
        let mut content = rule(3);
        content.content_patterns = vec!["union select".to_string(), "or 1=1".to_string()];

        let mut engine = RuleEngine::new(vec![content]);
        let frame = tcp_packet_frame(80, false, b"GET /x?q=UNION%20SELECT... UNION SELECT 1");
        let alerts = engine.evaluate(&parse_frame(0.0, &frame).unwrap());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].matched_content.as_deref(), Some("union select"));
    }

    #[test]
    fn content_rules_require_payload() {
        let mut content = rule(4);
        content.content_patterns = vec!["x".to_string()];

        let mut engine = RuleEngine::new(vec![content]);
        let empty = tcp_packet_frame(80, false, b"");
        assert!(engine.evaluate(&parse_frame(0.0, &empty).unwrap()).is_empty());
    }

    #[test]
    fn content_search_is_limited_to_the_window() {
        let mut content = rule(5);
        content.content_patterns = vec!["needle".to_string()];

        let mut payload = vec![b'a'; super::CONTENT_WINDOW];
        payload.extend_from_slice(b"needle");

        let mut engine = RuleEngine::new(vec![content]);
        let frame = tcp_packet_frame(80, false, &payload);
        assert!(engine.evaluate(&parse_frame(0.0, &frame).unwrap()).is_empty());
    }

    #[test]
    fn regex_rules_match_and_bad_regexes_are_counted() {
        let mut with_regex = rule(6);
        with_regex.regex_patterns = vec!["[".to_string(), r"id=\d+".to_string()];

        let mut engine = RuleEngine::new(vec![with_regex]);
        let frame = tcp_packet_frame(80, false, b"GET /item?id=42 HTTP/1.1");
        let alerts = engine.evaluate(&parse_frame(0.0, &frame).unwrap());
        assert_eq!(alerts.len(), 1);
        assert_eq!(engine.invalid_regexes(), 1);

        // The invalid pattern stays cached; the counter does not grow.
        let _ = engine.evaluate(&parse_frame(0.1, &frame).unwrap());
        assert_eq!(engine.invalid_regexes(), 1);
    }

    #[test]
    fn disabled_rules_never_fire() {
        let mut disabled = rule(7);
        disabled.enabled = false;

        let mut engine = RuleEngine::new(vec![disabled]);
        let frame = tcp_packet_frame(80, true, b"");
        assert!(engine.evaluate(&parse_frame(0.0, &frame).unwrap()).is_empty());
    }

    #[test]
    fn ip_literal_and_cidr_semantics() {
        assert_eq!(IpFilter::parse("any"), IpFilter::Any);
        assert_eq!(
            IpFilter::parse("10.0.0.1"),
            IpFilter::Literal("10.0.0.1".to_string())
        );
        assert_eq!(
            IpFilter::parse("10.0.0.0/8"),
            IpFilter::Inert("10.0.0.0/8".to_string())
        );

        let mut with_src = rule(8);
        with_src.src_ip = IpFilter::parse("10.0.0.50");
        let mut with_cidr = rule(9);
        with_cidr.src_ip = IpFilter::parse("10.0.0.0/8");

        let mut engine = RuleEngine::new(vec![with_src, with_cidr]);
        let frame = tcp_packet_frame(80, true, b"");
        let alerts = engine.evaluate(&parse_frame(0.0, &frame).unwrap());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, 8);
    }

    #[test]
    fn alert_ids_are_monotone_across_packets() {
        let mut engine = RuleEngine::new(vec![rule(10)]);
        let frame = tcp_packet_frame(80, true, b"");

        let first = engine.evaluate(&parse_frame(0.0, &frame).unwrap());
        let second = engine.evaluate(&parse_frame(0.1, &frame).unwrap());
        assert!(first[0].alert_id < second[0].alert_id);
    }

    #[test]
    fn multiple_rules_each_emit_an_alert() {
        let mut engine = RuleEngine::new(vec![rule(11), rule(12)]);
        let frame = tcp_packet_frame(80, true, b"");
        let alerts = engine.evaluate(&parse_frame(0.0, &frame).unwrap());
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn subslice_search() {
        assert!(contains_subslice(b"hello world", b"lo wo"));
        assert!(!contains_subslice(b"hello", b"world"));
        assert!(contains_subslice(b"abc", b""));
    }
}
