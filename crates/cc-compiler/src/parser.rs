use std::net::IpAddr;

use regex::RegexBuilder;

use cc_core::engine::DomainConstraint;
use cc_core::types::{PartyMask, RuleAction, RuleFlags, SchemeMask, TypeMask};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedRule {
    pub action: RuleAction,
    pub flags: RuleFlags,
    pub target: ParsedTarget,
    pub type_mask: TypeMask,
    pub party_mask: PartyMask,
    pub scheme_mask: SchemeMask,
    pub domain_constraint: Option<DomainConstraint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParsedTarget {
    /// `||host^` or `||host/rest`; `rest` is the text after the host.
    Host {
        host: String,
        rest: Option<String>,
        right_anchor: bool,
    },
    Pattern {
        anchor: AnchorType,
        text: String,
        right_anchor: bool,
    },
    Regex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnchorType {
    #[default]
    None,
    Left,
    Hostname,
}

/// Why a candidate line produced no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Cosmetic,
    UnsupportedOption,
    EmptyMask,
    BadPattern,
    BadRegex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Blank,
    Comment,
    Rule(ParsedRule),
    Skipped(SkipReason),
}

/// Parsed rules plus line accounting for one list.
#[derive(Debug, Clone, Default)]
pub struct ParsedList {
    pub rules: Vec<ParsedRule>,
    pub lines: usize,
    pub comments: usize,
    pub skipped: usize,
}

impl ParsedList {
    /// Lines that were neither blank nor comments.
    pub fn candidates(&self) -> usize {
        self.rules.len() + self.skipped
    }
}

pub fn parse_lines<I, S>(lines: I) -> ParsedList
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut list = ParsedList::default();

    for line in lines {
        list.lines += 1;
        match parse_line(line.as_ref()) {
            ParsedLine::Blank | ParsedLine::Comment => list.comments += 1,
            ParsedLine::Rule(rule) => list.rules.push(rule),
            ParsedLine::Skipped(reason) => {
                log::trace!("skipping line {:?}: {:?}", line.as_ref(), reason);
                list.skipped += 1;
            }
        }
    }

    list
}

pub fn parse_line(raw_line: &str) -> ParsedLine {
    let mut line = raw_line.trim();
    if line.is_empty() {
        return ParsedLine::Blank;
    }
    if is_comment_line(line) {
        return ParsedLine::Comment;
    }

    if ["##", "#@#", "#?#", "#$#", "#%#"].iter().any(|m| line.contains(m)) {
        return ParsedLine::Skipped(SkipReason::Cosmetic);
    }

    if let Some(hosts_line) = parse_hosts_file_line(line) {
        return hosts_line;
    }

    let mut action = RuleAction::Block;
    if let Some(rest) = line.strip_prefix("@@") {
        action = RuleAction::Allow;
        line = rest.trim_start();
    }

    let (pattern_part, options_text) = split_rule_options(line);
    let options = match options_text {
        Some(options_text) => match parse_options(options_text) {
            Ok(options) => options,
            Err(reason) => return ParsedLine::Skipped(reason),
        },
        None => ParsedOptions::default(),
    };

    let target = match parse_target(pattern_part, options.flags) {
        Ok(target) => target,
        Err(reason) => return ParsedLine::Skipped(reason),
    };

    ParsedLine::Rule(ParsedRule {
        action,
        flags: options.flags,
        target,
        type_mask: options.type_mask,
        party_mask: options.party_mask,
        scheme_mask: options.scheme_mask,
        domain_constraint: options.domain_constraint,
    })
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

fn is_regex_pattern(pattern: &str) -> bool {
    pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/')
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    if is_regex_pattern(line) {
        return (line, None);
    }
    match line.rfind('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

// =============================================================================
// Options
// =============================================================================

#[derive(Clone, Default)]
struct ParsedOptions {
    flags: RuleFlags,
    type_mask: TypeMask,
    party_mask: PartyMask,
    scheme_mask: SchemeMask,
    domain_constraint: Option<DomainConstraint>,
}

fn parse_options(text: &str) -> Result<ParsedOptions, SkipReason> {
    let mut flags = RuleFlags::empty();
    let mut type_include = 0u16;
    let mut type_exclude = 0u16;
    let mut party_include = 0u16;
    let mut party_exclude = 0u16;
    let mut scheme_include = 0u16;
    let mut scheme_exclude = 0u16;
    let mut domain_constraint: Option<DomainConstraint> = None;

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let raw_lower = raw_lower.as_str();

        match raw_lower {
            "important" => {
                flags |= RuleFlags::IMPORTANT;
                continue;
            }
            "match-case" | "match_case" => {
                flags |= RuleFlags::MATCH_CASE;
                continue;
            }
            "badfilter" => {
                flags |= RuleFlags::BADFILTER;
                continue;
            }
            _ => {}
        }

        if let Some(value) = raw_lower
            .strip_prefix("domain=")
            .or_else(|| raw_lower.strip_prefix("from="))
        {
            let parsed = parse_domain_option(value).ok_or(SkipReason::UnsupportedOption)?;
            domain_constraint = Some(merge_constraints(domain_constraint, parsed));
            continue;
        }

        let (negated, name) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower),
        };

        let (include, exclude, mask) = if let Some(mask) = request_type_mask(name) {
            (&mut type_include, &mut type_exclude, mask.bits())
        } else if let Some(mask) = party_mask(name) {
            (&mut party_include, &mut party_exclude, mask.bits() as u16)
        } else if let Some(mask) = scheme_mask(name) {
            (&mut scheme_include, &mut scheme_exclude, mask.bits() as u16)
        } else {
            return Err(SkipReason::UnsupportedOption);
        };

        if negated {
            *exclude |= mask;
        } else {
            *include |= mask;
        }
    }

    let type_bits = finalize_mask(type_include, type_exclude, TypeMask::ALL.bits())
        .ok_or(SkipReason::EmptyMask)?;
    let party_bits = finalize_mask(party_include, party_exclude, PartyMask::ALL.bits() as u16)
        .ok_or(SkipReason::EmptyMask)?;
    let scheme_bits = finalize_mask(scheme_include, scheme_exclude, SchemeMask::ALL.bits() as u16)
        .ok_or(SkipReason::EmptyMask)?;

    Ok(ParsedOptions {
        flags,
        type_mask: TypeMask::from_bits_truncate(type_bits),
        party_mask: PartyMask::from_bits_truncate(party_bits as u8),
        scheme_mask: SchemeMask::from_bits_truncate(scheme_bits as u8),
        domain_constraint,
    })
}

/// Combine include/exclude sets into one mask. `Some(0)` means "any";
/// `None` means the options exclude everything.
fn finalize_mask(include: u16, exclude: u16, all: u16) -> Option<u16> {
    let include = include & all;
    let exclude = exclude & all;
    let mask = if include != 0 { include & !exclude } else { all & !exclude };
    match mask {
        0 => None,
        m if m == all => Some(0),
        m => Some(m),
    }
}

fn merge_constraints(existing: Option<DomainConstraint>, incoming: DomainConstraint) -> DomainConstraint {
    match existing {
        Some(mut current) => {
            current.include.extend(incoming.include);
            current.exclude.extend(incoming.exclude);
            current
        }
        None => incoming,
    }
}

fn parse_domain_option(value: &str) -> Option<DomainConstraint> {
    let mut constraint = DomainConstraint::default();

    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (is_exclude, domain_raw) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let domain = normalize_domain(domain_raw)?.into_boxed_str();
        if is_exclude {
            constraint.exclude.push(domain);
        } else {
            constraint.include.push(domain);
        }
    }

    if constraint.include.is_empty() && constraint.exclude.is_empty() {
        return None;
    }

    Some(constraint)
}

fn request_type_mask(name: &str) -> Option<TypeMask> {
    match name {
        "script" => Some(TypeMask::SCRIPT),
        "image" => Some(TypeMask::IMAGE),
        "stylesheet" | "css" => Some(TypeMask::STYLESHEET),
        "object" => Some(TypeMask::OBJECT),
        "subdocument" | "sub_frame" | "frame" => Some(TypeMask::SUBDOCUMENT),
        "document" | "main_frame" | "doc" => Some(TypeMask::DOCUMENT),
        "xmlhttprequest" | "xhr" | "fetch" => Some(TypeMask::XMLHTTPREQUEST),
        "media" => Some(TypeMask::MEDIA),
        "font" => Some(TypeMask::FONT),
        "ping" | "beacon" => Some(TypeMask::PING),
        "websocket" => Some(TypeMask::WEBSOCKET),
        "csp_report" => Some(TypeMask::CSP_REPORT),
        "other" => Some(TypeMask::OTHER),
        _ => None,
    }
}

fn party_mask(name: &str) -> Option<PartyMask> {
    match name {
        "third-party" | "thirdparty" | "3p" => Some(PartyMask::THIRD_PARTY),
        "first-party" | "firstparty" | "1p" => Some(PartyMask::FIRST_PARTY),
        _ => None,
    }
}

fn scheme_mask(name: &str) -> Option<SchemeMask> {
    match name {
        "http" => Some(SchemeMask::HTTP),
        "https" => Some(SchemeMask::HTTPS),
        "ws" => Some(SchemeMask::WS),
        "wss" => Some(SchemeMask::WSS),
        "data" => Some(SchemeMask::DATA),
        "ftp" => Some(SchemeMask::FTP),
        _ => None,
    }
}

// =============================================================================
// Patterns
// =============================================================================

const HOSTS_FILE_IGNORED: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "0.0.0.0",
];

/// `0.0.0.0 host` lines. Returns `None` when the line is not hosts-file syntax.
fn parse_hosts_file_line(line: &str) -> Option<ParsedLine> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    first.parse::<IpAddr>().ok()?;

    let domain = match normalize_domain(second) {
        Some(domain) => domain,
        None => return Some(ParsedLine::Skipped(SkipReason::BadPattern)),
    };
    if HOSTS_FILE_IGNORED.contains(&domain.as_str()) {
        return Some(ParsedLine::Comment);
    }

    Some(ParsedLine::Rule(ParsedRule {
        action: RuleAction::Block,
        flags: RuleFlags::empty(),
        target: ParsedTarget::Host {
            host: domain,
            rest: None,
            right_anchor: false,
        },
        type_mask: TypeMask::empty(),
        party_mask: PartyMask::empty(),
        scheme_mask: SchemeMask::empty(),
        domain_constraint: None,
    }))
}

fn parse_target(pattern: &str, flags: RuleFlags) -> Result<ParsedTarget, SkipReason> {
    let pattern = pattern.trim();
    if pattern.is_empty() || pattern.contains(char::is_whitespace) {
        return Err(SkipReason::BadPattern);
    }

    if is_regex_pattern(pattern) {
        let source = &pattern[1..pattern.len() - 1];
        RegexBuilder::new(source)
            .case_insensitive(!flags.contains(RuleFlags::MATCH_CASE))
            .build()
            .map_err(|_| SkipReason::BadRegex)?;
        return Ok(ParsedTarget::Regex(source.to_string()));
    }

    let (anchor_type, rest) = if let Some(rest) = pattern.strip_prefix("||") {
        (AnchorType::Hostname, rest)
    } else if let Some(rest) = pattern.strip_prefix('|') {
        (AnchorType::Left, rest)
    } else {
        (AnchorType::None, pattern)
    };

    let (rest, right_anchor) = match rest.strip_suffix('|') {
        Some(stripped) => (stripped, true),
        None => (rest, false),
    };

    if anchor_type == AnchorType::Hostname {
        if let Some(target) = parse_host_anchor_rule(rest, right_anchor) {
            return Ok(target);
        }
    }

    if rest.is_empty() || rest.bytes().all(|b| b == b'*') && anchor_type == AnchorType::Hostname {
        return Err(SkipReason::BadPattern);
    }

    Ok(ParsedTarget::Pattern {
        anchor: anchor_type,
        text: rest.to_string(),
        right_anchor,
    })
}

/// Split `host[/rest]` after a `||` anchor. Returns `None` when the host
/// part is not a complete hostname (wildcards, partial labels, no
/// terminator after the host).
fn parse_host_anchor_rule(text: &str, right_anchor: bool) -> Option<ParsedTarget> {
    let text = text.strip_prefix('.').unwrap_or(text);

    let end = text
        .find(|c: char| matches!(c, '/' | '^' | '*' | '?' | '#' | ':' | '|' | '='))
        .unwrap_or(text.len());

    if text[end..].starts_with('*') {
        return None;
    }

    let host = normalize_domain(&text[..end])?;
    let remainder = &text[end..];

    let rest = match (remainder, right_anchor) {
        // Bare `||host` is a prefix from a label start, so `host.other.tld` matches too.
        ("", false) => return None,
        ("^", false) => None,
        (other, _) => Some(other.to_string()),
    };

    Some(ParsedTarget::Host {
        host,
        rest,
        right_anchor,
    })
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}
