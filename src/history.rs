// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/history.rs - 检测历史存储
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! SQLite 中的 `detection_history` 表，只追加、不修改。

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

const MAX_CONNECTIONS: u32 = 5;
// 并发写入时等待写锁的时长
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "\
  CREATE TABLE IF NOT EXISTS detection_history ( \
    id INTEGER PRIMARY KEY AUTOINCREMENT, \
    timestamp TEXT NOT NULL, \
    original_image TEXT NOT NULL, \
    processed_image TEXT NOT NULL, \
    sheep_count INTEGER NOT NULL, \
    processing_time REAL NOT NULL \
  )";

const COLUMNS: &str = "id, timestamp, original_image, processed_image, sheep_count, processing_time";

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("数据库错误: {0}")]
  Database(#[from] sqlx::Error),
  #[error("无效的检测记录: {0}")]
  InvalidRecord(String),
}

/// 已持久化的检测记录
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DetectionRecord {
  pub id: i64,
  pub timestamp: DateTime<Utc>,
  pub original_image: String,
  pub processed_image: String,
  /// 视频为逐帧数量的均值
  pub sheep_count: i64,
  /// 秒
  pub processing_time: f64,
}

/// 待写入的检测记录，`timestamp` 为空时使用写入时刻
#[derive(Debug, Clone)]
pub struct NewDetectionRecord {
  pub timestamp: Option<DateTime<Utc>>,
  pub original_image: String,
  pub processed_image: String,
  pub sheep_count: u32,
  pub processing_time: f64,
}

#[derive(Clone)]
pub struct HistoryStore {
  pool: SqlitePool,
}

impl HistoryStore {
  /// 连接数据库（文件不存在时创建）并确保表结构存在
  pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?
      .create_if_missing(true)
      .journal_mode(SqliteJournalMode::Wal)
      .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
      .max_connections(MAX_CONNECTIONS)
      .connect_with(options)
      .await?;

    info!("打开历史数据库: {}", database_url);
    Self::from_pool(pool).await
  }

  pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
    sqlx::query(SCHEMA).execute(&pool).await?;
    Ok(Self { pool })
  }

  pub async fn append(&self, record: NewDetectionRecord) -> Result<(), StoreError> {
    if !record.processing_time.is_finite() || record.processing_time < 0.0 {
      return Err(StoreError::InvalidRecord(format!(
        "处理时间必须为非负数: {}",
        record.processing_time
      )));
    }

    let timestamp = record.timestamp.unwrap_or_else(Utc::now);
    let query = "INSERT INTO detection_history \
      (timestamp, original_image, processed_image, sheep_count, processing_time) \
      VALUES (?, ?, ?, ?, ?)";

    let result = sqlx::query(query)
      .bind(timestamp)
      .bind(&record.original_image)
      .bind(&record.processed_image)
      .bind(i64::from(record.sheep_count))
      .bind(record.processing_time)
      .execute(&self.pool)
      .await?;

    debug!(
      "写入检测记录 #{}: {} -> {}, 数量 {}",
      result.last_insert_rowid(),
      record.original_image,
      record.processed_image,
      record.sheep_count
    );
    Ok(())
  }

  /// 最新的记录在前
  pub async fn list(&self, limit: u32) -> Result<Vec<DetectionRecord>, StoreError> {
    let query = format!(
      "SELECT {COLUMNS} FROM detection_history ORDER BY timestamp DESC, id DESC LIMIT ?"
    );
    let records = sqlx::query_as::<_, DetectionRecord>(&query)
      .bind(i64::from(limit))
      .fetch_all(&self.pool)
      .await?;
    Ok(records)
  }

  pub async fn close(&self) {
    self.pool.close().await;
  }
}
