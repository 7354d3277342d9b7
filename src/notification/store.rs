//! 分发历史 - 本地 JSONL 文件读写

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::filter::NormalizedRequest;
use super::urgency::Priority;
use crate::config::BridgeConfig;

/// 历史记录（JSONL 格式）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// ISO8601 时间戳
    pub ts: DateTime<Utc>,
    pub sender: String,
    pub class: String,
    pub instance: String,
    pub priority: Priority,
    /// 结果，如 sent / rate_limited / acknowledged
    pub outcome: String,
}

impl HistoryRecord {
    pub fn new(request: &NormalizedRequest, outcome: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            sender: request.sender.clone(),
            class: request.class.clone(),
            instance: request.instance.clone(),
            priority: request.priority,
            outcome: outcome.into(),
        }
    }
}

const MAX_RECORDS: usize = 200;
const KEEP_AFTER_CLEANUP: usize = 100;
const CLEANUP_CHECK_INTERVAL: usize = 10;

/// 历史存储
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    writes: Arc<AtomicUsize>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 默认存储文件路径
    pub fn default_path() -> PathBuf {
        BridgeConfig::config_dir().join("history.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加记录（带文件锁）
    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        use fs2::FileExt;

        // 确保目录存在
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("无法打开历史文件 {}", self.path.display()))?;

        file.lock_exclusive()?;
        let written = writeln!(file, "{}", serde_json::to_string(record)?);
        file.unlock()?;
        written?;

        self.maybe_cleanup();
        Ok(())
    }

    /// 读取最近 N 条记录
    pub fn read_recent(&self, n: usize) -> Vec<HistoryRecord> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let records = parse_records(BufReader::new(file));
        let start = records.len().saturating_sub(n);
        let mut recent = records[start..].to_vec();
        recent.sort_by_key(|r| r.ts);
        recent
    }

    /// 定期检查并清理
    fn maybe_cleanup(&self) {
        let count = self.writes.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_CHECK_INTERVAL != 0 {
            return;
        }

        if self.line_count() > MAX_RECORDS {
            if let Err(e) = self.cleanup() {
                tracing::warn!(error = %e, "History cleanup failed");
            }
        }
    }

    /// 文件行数（最多几百行，直接数）
    fn line_count(&self) -> usize {
        match File::open(&self.path) {
            Ok(file) => BufReader::new(file).lines().count(),
            Err(_) => 0,
        }
    }

    /// 执行清理（保留最近的记录）
    fn cleanup(&self) -> Result<()> {
        use fs2::FileExt;

        let file = File::open(&self.path)?;
        file.lock_exclusive()?;

        let records = parse_records(BufReader::new(&file));
        if records.len() <= MAX_RECORDS {
            file.unlock()?;
            return Ok(());
        }

        let start = records.len().saturating_sub(KEEP_AFTER_CLEANUP);
        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path)?;
            for record in &records[start..] {
                writeln!(temp_file, "{}", serde_json::to_string(record)?)?;
            }
        }

        // 原子替换
        fs::rename(&temp_path, &self.path)?;
        file.unlock()?;
        Ok(())
    }
}

fn parse_records<R: BufRead>(reader: R) -> Vec<HistoryRecord> {
    reader
        .lines()
        .map_while(|line| line.ok())
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}
