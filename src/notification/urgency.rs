//! Priority tiers for notifications
//!
//! The tier is read from the opcode of the inbound message:
//! - PAGE: must be acknowledged, escalates until it is (opcode tag `page`)
//! - URGENT: delivered with high priority (opcode tag `urgent`)
//! - NORMAL: everything else

/// Opcode tag the bridge puts on its own messages
pub const LOOPBACK_TAG: &str = "auto";

/// Priority tier, ordered by urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    Urgent,
    Page,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "NORMAL",
            Priority::Urgent => "URGENT",
            Priority::Page => "PAGE",
        }
    }

    /// Numeric priority understood by the push backend
    pub fn api_value(&self) -> i8 {
        match self {
            Priority::Normal => 0,
            Priority::Urgent => 1,
            Priority::Page => 2,
        }
    }

    /// Human name used in "<tier> sent to <user>" feedback
    pub fn tier_name(&self) -> &'static str {
        match self {
            Priority::Normal => "notification",
            Priority::Urgent => "urgent notification",
            Priority::Page => "page",
        }
    }

    /// Name used when the tier is switched off
    pub fn disabled_label(&self) -> &'static str {
        match self {
            Priority::Normal => "notifications",
            Priority::Urgent => "urgent notifications",
            Priority::Page => "paging",
        }
    }
}

/// Split an opcode into lowercase tags.
///
/// Opcodes like `PAGE`, `urgent.auto` or `page,urgent` are all accepted;
/// anything that is not alphanumeric separates tags.
pub fn opcode_tags(opcode: &str) -> impl Iterator<Item = String> + '_ {
    opcode
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|tag| !tag.is_empty())
        .map(|tag| tag.to_ascii_lowercase())
}

fn has_tag(opcode: &str, wanted: &str) -> bool {
    opcode_tags(opcode).any(|tag| tag == wanted)
}

/// Whether the opcode marks one of our own messages
pub fn is_loopback(opcode: &str) -> bool {
    has_tag(opcode, LOOPBACK_TAG)
}

/// Classify priority from the opcode tags
pub fn get_priority(opcode: &str) -> Priority {
    if has_tag(opcode, "page") {
        Priority::Page
    } else if has_tag(opcode, "urgent") {
        Priority::Urgent
    } else {
        Priority::Normal
    }
}
