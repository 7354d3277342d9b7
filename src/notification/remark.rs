//! 自言自语提醒 - 用户在自己房间里说 "I should really X"，桥回一句 "X!"

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// 回复前的停顿
pub const REMARK_DELAY: Duration = Duration::from_secs(2);

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(?:i,i )?"([^"]+)"$"#).expect("Invalid quoted regex"));
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([^()]+)\)$").expect("Invalid parenthesized regex"));
static EXCLAMATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Oo]+(?:h|ps) ([a-zA-Z0-9 :]+)$").expect("Invalid exclamation regex"));
static SHOULD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^I should (?:really|probably) ([a-z A-Z0-9:]+?)(?: tbh| at some point)?\.*$")
        .expect("Invalid should regex")
});
static SHOULD_BE_DOING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^I should be doing ([a-z A-Z0-9:]+?)(?: tbh| at some point)?\.*$")
        .expect("Invalid should-be-doing regex")
});

/// 去掉引号、括号和口头禅
pub fn normalize(text: &str) -> String {
    let mut message = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(caps) = QUOTED.captures(&message) {
        message = caps[1].to_string();
    }
    if let Some(caps) = PARENTHESIZED.captures(&message) {
        message = caps[1].to_string();
    }
    // 口头禅依次剥离，每一步都看上一步的结果
    if message.starts_with("I suppose ") {
        message = drop_words(&message, 2);
    }
    if message.starts_with("I think ") {
        message = drop_words(&message, 2);
    }
    if starts_with_lower(&message, "okay ") || starts_with_lower(&message, "okay, ") {
        message = drop_words(&message, 1);
    }
    if let Some(caps) = EXCLAMATION.captures(&message) {
        message = caps[1].to_string();
    }
    if starts_with_lower(&message, "maybe ") {
        message = drop_words(&message, 1);
    }
    if starts_with_lower(&message, "speaking of which ") {
        message = drop_words(&message, 3);
    }
    message
}

/// 需要回复时返回回复内容
pub fn respond(text: &str) -> Option<String> {
    let message = normalize(text);

    if let Some(caps) = SHOULD.captures(&message) {
        return Some(format!("{}!", capitalize(&caps[1])));
    }
    if let Some(caps) = SHOULD_BE_DOING.captures(&message) {
        return Some(format!("Do {}!", &caps[1]));
    }
    None
}

fn starts_with_lower(message: &str, prefix: &str) -> bool {
    message.to_lowercase().starts_with(prefix)
}

fn drop_words(message: &str, n: usize) -> String {
    message.splitn(n + 1, ' ').nth(n).unwrap_or("").to_string()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
