// src/cli/setup.rs
//! Setup 命令 - 交互式生成配置
//!
//! 已有配置中的字段作为默认值，未修改的字段原样保留。

use crate::config::{BridgeConfig, DEFAULT_REALM};
use anyhow::{anyhow, Context, Result};
use clap::Args;
use dialoguer::{Confirm, Input};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Setup 命令参数
#[derive(Args)]
pub struct SetupArgs {
    /// 配置文件路径（默认 ~/.config/andromeda/config.json）
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// 使用已有值和默认值，跳过交互式提示（凭据取自环境变量）
    #[arg(long)]
    pub auto: bool,
}

/// 向导收集的字段
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct SetupAnswers {
    user: String,
    realm: String,
    room: String,
    large_room: Option<String>,
    priority_enabled: bool,
    token: String,
    user_key: String,
}

/// 处理 setup 命令
pub fn handle_setup(args: SetupArgs) -> Result<()> {
    let path = args.config.clone().unwrap_or_else(BridgeConfig::default_path);
    println!("andromeda setup\n");

    let existing = read_existing(&path);
    if existing.is_some() {
        println!("检测到已有配置: {}", path.display());
        if !args.auto {
            let overwrite = Confirm::new()
                .with_prompt("是否覆盖现有配置？（会保留未修改的字段）")
                .default(false)
                .interact()
                .unwrap_or(false);
            if !overwrite {
                println!("已取消。");
                return Ok(());
            }
        }
        println!();
    }

    let defaults = defaults_from(&existing);
    let answers = if args.auto {
        let mut answers = defaults;
        if let Ok(token) = std::env::var(crate::config::ENV_PUSH_TOKEN) {
            answers.token = token;
        }
        if let Ok(user_key) = std::env::var(crate::config::ENV_PUSH_USER) {
            answers.user_key = user_key;
        }
        if answers.user.is_empty() {
            return Err(anyhow!("--auto 需要已有配置中的 user"));
        }
        answers
    } else {
        prompt(defaults)?
    };

    let output = merge(existing, &answers);
    write_config(&path, &output)?;

    println!("\n── 下一步 ──\n");
    println!("  检查配置:   andromeda config");
    println!("  试发一条:   andromeda push \"hello\"");
    println!("  启动桥接:   <chat-client> | andromeda run");
    Ok(())
}

/// 读取已有的 config.json
fn read_existing(path: &Path) -> Option<serde_json::Value> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
}

/// 配置键及其 camelCase 别名
const LARGE_ROOM_KEYS: [&str; 2] = ["large_room", "largeRoom"];
const PRIORITY_KEYS: [&str; 2] = ["priority_enabled", "priorityEnabled"];

/// 按顺序取第一个存在的键
fn lookup<'a>(existing: &'a Option<serde_json::Value>, keys: &[&str]) -> Option<&'a serde_json::Value> {
    let obj = existing.as_ref()?;
    keys.iter().find_map(|key| obj.get(*key))
}

fn defaults_from(existing: &Option<serde_json::Value>) -> SetupAnswers {
    let get = |keys: &[&str]| lookup(existing, keys).and_then(|v| v.as_str()).map(String::from);
    let push = |key: &str| {
        existing
            .as_ref()
            .and_then(|e| e.get("push"))
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
            .map(String::from)
    };

    SetupAnswers {
        user: get(&["user"]).unwrap_or_default(),
        realm: get(&["realm"]).unwrap_or_else(|| DEFAULT_REALM.to_string()),
        room: get(&["room"]).unwrap_or_default(),
        large_room: get(&LARGE_ROOM_KEYS),
        priority_enabled: lookup(existing, &PRIORITY_KEYS)
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        token: push("token").unwrap_or_default(),
        user_key: push("user").unwrap_or_default(),
    }
}

fn prompt(defaults: SetupAnswers) -> Result<SetupAnswers> {
    println!("── Step 1/2: 聊天 ──\n");

    let user: String = Input::new()
        .with_prompt("接收通知的用户名")
        .default(defaults.user)
        .interact_text()
        .context("读取 user 失败")?;

    let realm: String = Input::new()
        .with_prompt("Realm")
        .default(defaults.realm)
        .interact_text()
        .context("读取 realm 失败")?;

    let room_default = if defaults.room.is_empty() { user.clone() } else { defaults.room };
    let room: String = Input::new()
        .with_prompt("个人房间")
        .default(room_default)
        .interact_text()
        .context("读取 room 失败")?;

    let large_room: String = Input::new()
        .with_prompt("广播房间（留空表示不使用）")
        .default(defaults.large_room.unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .context("读取 large_room 失败")?;

    let priority_enabled = Confirm::new()
        .with_prompt("允许 urgent 和 page？")
        .default(defaults.priority_enabled)
        .interact()
        .unwrap_or(defaults.priority_enabled);

    println!("\n── Step 2/2: Pushover ──\n");

    let token: String = Input::new()
        .with_prompt("Application token")
        .default(defaults.token)
        .interact_text()
        .context("读取 token 失败")?;

    let user_key: String = Input::new()
        .with_prompt("User key")
        .default(defaults.user_key)
        .interact_text()
        .context("读取 user key 失败")?;

    Ok(SetupAnswers {
        user,
        realm,
        room,
        large_room: Some(large_room).filter(|r| !r.trim().is_empty()),
        priority_enabled,
        token,
        user_key,
    })
}

/// 从已有配置开始，合并新值
fn merge(existing: Option<serde_json::Value>, answers: &SetupAnswers) -> serde_json::Value {
    let mut output = existing
        .filter(|e| e.is_object())
        .unwrap_or_else(|| json!({}));

    if let Some(obj) = output.as_object_mut() {
        // 别名和正式键同时存在会导致加载失败，统一写成 snake_case
        for alias in [LARGE_ROOM_KEYS[1], PRIORITY_KEYS[1]] {
            obj.remove(alias);
        }
        obj.insert("user".to_string(), json!(answers.user));
        obj.insert("realm".to_string(), json!(answers.realm));
        obj.insert("room".to_string(), json!(answers.room));
        match &answers.large_room {
            Some(large) => obj.insert("large_room".to_string(), json!(large)),
            None => obj.remove("large_room"),
        };
        obj.insert("priority_enabled".to_string(), json!(answers.priority_enabled));
        obj.insert(
            "push".to_string(),
            json!({"token": answers.token, "user": answers.user_key}),
        );
    }
    output
}

/// 写入 config.json
fn write_config(path: &Path, output: &serde_json::Value) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("创建配置目录失败")?;
    }
    let content = serde_json::to_string_pretty(output)?;
    fs::write(path, &content).context("写入配置文件失败")?;

    println!("配置已写入: {}", path.display());
    Ok(())
}
