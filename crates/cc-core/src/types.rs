//! Core type definitions for the content classifier
//!
//! Rule polarity, option masks and the closed set of resource types a
//! request can carry.

use std::fmt;

// =============================================================================
// Rule Actions
// =============================================================================

/// Polarity of a compiled rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RuleAction {
    /// Exception rule (@@...) - suppresses matching block rules
    Allow = 0,
    /// Block rule - classifies the request
    Block = 1,
}

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleFlags: u8 {
        /// $important - ignores exception filters
        const IMPORTANT = 1 << 0;
        /// Case-sensitive matching ($match-case)
        const MATCH_CASE = 1 << 1;
        /// $badfilter - disables an identical rule
        const BADFILTER = 1 << 2;
    }
}

// =============================================================================
// Resource Types
// =============================================================================

bitflags::bitflags! {
    /// Resource type bit mask used by `$script`, `$image`, ... options.
    ///
    /// An empty mask on a rule means "any type".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeMask: u16 {
        const CSP_REPORT = 1 << 0;
        const DOCUMENT = 1 << 1;
        const FONT = 1 << 2;
        const IMAGE = 1 << 3;
        const MEDIA = 1 << 4;
        const OBJECT = 1 << 5;
        const PING = 1 << 6;
        const SCRIPT = 1 << 7;
        const STYLESHEET = 1 << 8;
        const SUBDOCUMENT = 1 << 9;
        const WEBSOCKET = 1 << 10;
        const XMLHTTPREQUEST = 1 << 11;
        const OTHER = 1 << 12;

        /// All request types
        const ALL = (1 << 13) - 1;
    }
}

/// The resource type of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    CspReport,
    Document,
    Font,
    Image,
    Media,
    Object,
    Ping,
    Script,
    Stylesheet,
    Subdocument,
    Websocket,
    XmlHttpRequest,
    #[default]
    Other,
}

impl ResourceType {
    /// Parse a request type tag. Unknown tags map to `Other`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "csp_report" => Self::CspReport,
            "document" => Self::Document,
            "font" => Self::Font,
            "image" => Self::Image,
            "media" => Self::Media,
            "object" => Self::Object,
            "ping" => Self::Ping,
            "script" => Self::Script,
            "stylesheet" => Self::Stylesheet,
            "subdocument" => Self::Subdocument,
            "websocket" => Self::Websocket,
            "xmlhttprequest" => Self::XmlHttpRequest,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CspReport => "csp_report",
            Self::Document => "document",
            Self::Font => "font",
            Self::Image => "image",
            Self::Media => "media",
            Self::Object => "object",
            Self::Ping => "ping",
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::Subdocument => "subdocument",
            Self::Websocket => "websocket",
            Self::XmlHttpRequest => "xmlhttprequest",
            Self::Other => "other",
        }
    }

    /// The single mask bit for this type.
    pub fn mask(self) -> TypeMask {
        match self {
            Self::CspReport => TypeMask::CSP_REPORT,
            Self::Document => TypeMask::DOCUMENT,
            Self::Font => TypeMask::FONT,
            Self::Image => TypeMask::IMAGE,
            Self::Media => TypeMask::MEDIA,
            Self::Object => TypeMask::OBJECT,
            Self::Ping => TypeMask::PING,
            Self::Script => TypeMask::SCRIPT,
            Self::Stylesheet => TypeMask::STYLESHEET,
            Self::Subdocument => TypeMask::SUBDOCUMENT,
            Self::Websocket => TypeMask::WEBSOCKET,
            Self::XmlHttpRequest => TypeMask::XMLHTTPREQUEST,
            Self::Other => TypeMask::OTHER,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Party Masks
// =============================================================================

bitflags::bitflags! {
    /// Party (first-party / third-party) mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PartyMask: u8 {
        /// Matches first-party requests
        const FIRST_PARTY = 1 << 0;
        /// Matches third-party requests
        const THIRD_PARTY = 1 << 1;
        /// Matches both
        const ALL = Self::FIRST_PARTY.bits() | Self::THIRD_PARTY.bits();
    }
}

// =============================================================================
// Scheme Masks
// =============================================================================

bitflags::bitflags! {
    /// URL scheme mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const WS = 1 << 2;
        const WSS = 1 << 3;
        const DATA = 1 << 4;
        const FTP = 1 << 5;
        /// All known schemes
        const ALL = (1 << 6) - 1;
    }
}
