// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/report.rs - PDF 检测报告
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

//! 将检测历史渲染为横向 US Letter 的 PDF 表格。
//!
//! 表头灰色底纹，数据行浅灰底纹，所有单元格带黑色网格线并居中，
//! 超出一页的记录自动分页，每页重复表头。

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Local;
use printpdf::{
  BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect,
};
use thiserror::Error;
use tracing::info;

use crate::history::{DetectionRecord, HistoryStore, StoreError};

pub const REPORT_RECORD_LIMIT: u32 = 1000;

const PAGE_WIDTH: f32 = 279.4;
const PAGE_HEIGHT: f32 = 215.9;
const MARGIN: f32 = 15.0;
const TITLE_SIZE: f32 = 20.0;
const TITLE_BLOCK: f32 = 16.0;
const HEADER_SIZE: f32 = 12.0;
const HEADER_HEIGHT: f32 = 10.0;
const BODY_SIZE: f32 = 9.0;
const ROW_HEIGHT: f32 = 7.0;
const GRID_THICKNESS: f32 = 1.0;
const PT_TO_MM: f32 = 0.3528;
// Helvetica 平均字宽约为字号的一半
const AVG_CHAR_EM: f32 = 0.5;

const HEADERS: [&str; 5] = ["Timestamp", "Original", "Processed", "Count", "Time"];
const COLUMN_WIDTHS: [f32; 5] = [42.0, 86.0, 86.0, 17.0, 18.4];

#[derive(Error, Debug)]
pub enum ReportError {
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error("PDF 生成失败: {0}")]
  Pdf(#[from] printpdf::Error),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("报告渲染任务失败: {0}")]
  Task(#[from] tokio::task::JoinError),
}

pub struct ReportGenerator {
  store: HistoryStore,
  reports_dir: PathBuf,
  target_class: String,
}

impl ReportGenerator {
  pub fn new(store: HistoryStore, reports_dir: impl Into<PathBuf>, target_class: &str) -> Self {
    Self {
      store,
      reports_dir: reports_dir.into(),
      target_class: target_class.to_string(),
    }
  }

  pub fn title(&self) -> String {
    let mut chars = self.target_class.chars();
    let target = match chars.next() {
      Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
      None => String::new(),
    };
    format!("{} Detection Report", target)
  }

  pub fn file_name(&self) -> String {
    let prefix: String = self
      .target_class
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
      .collect();
    format!("{}_report_{}.pdf", prefix, Local::now().format("%Y%m%d_%H%M%S"))
  }

  /// 没有任何记录时返回 `Ok(None)`，且不创建任何文件
  pub async fn generate(&self) -> Result<Option<PathBuf>, ReportError> {
    let records = self.store.list(REPORT_RECORD_LIMIT).await?;
    if records.is_empty() {
      info!("没有检测记录，跳过报告生成");
      return Ok(None);
    }

    let reports_dir = self.reports_dir.clone();
    let path = self.reports_dir.join(self.file_name());
    let title = self.title();
    let rows = records.len();

    // 渲染与写文件都是阻塞操作
    let path = tokio::task::spawn_blocking(move || -> Result<PathBuf, ReportError> {
      std::fs::create_dir_all(&reports_dir)?;
      render_report(&title, &records, &path)?;
      Ok(path)
    })
    .await??;

    info!("生成报告 {}，共 {} 条记录", path.display(), rows);
    Ok(Some(path))
  }
}

/// 报告中一行的五个单元格
pub fn format_row(record: &DetectionRecord) -> [String; 5] {
  [
    record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
    record.original_image.clone(),
    record.processed_image.clone(),
    record.sheep_count.to_string(),
    format!("{:.2}s", record.processing_time),
  ]
}

/// 每页可容纳的数据行数
pub fn rows_per_page() -> usize {
  let body = PAGE_HEIGHT - 2.0 * MARGIN - TITLE_BLOCK - HEADER_HEIGHT;
  (body / ROW_HEIGHT).floor() as usize
}

fn text_width(text: &str, size: f32) -> f32 {
  text.chars().count() as f32 * size * PT_TO_MM * AVG_CHAR_EM
}

/// 超出列宽时保留末尾部分，前面以 `...` 代替
fn fit_to_column(text: &str, size: f32, width: f32) -> String {
  let max_chars = ((width - 2.0) / (size * PT_TO_MM * AVG_CHAR_EM)).floor() as usize;
  let len = text.chars().count();
  if len <= max_chars || max_chars <= 3 {
    return text.to_string();
  }
  let tail: String = text.chars().skip(len - (max_chars - 3)).collect();
  format!("...{}", tail)
}

struct PageWriter<'a> {
  layer: PdfLayerReference,
  regular: &'a IndirectFontRef,
  bold: &'a IndirectFontRef,
}

impl PageWriter<'_> {
  fn fill(&self, gray: f32, left: f32, bottom: f32, width: f32, height: f32) {
    self
      .layer
      .set_fill_color(Color::Rgb(printpdf::Rgb::new(gray, gray, gray, None)));
    self.layer.add_rect(Rect::new(
      Mm(left),
      Mm(bottom),
      Mm(left + width),
      Mm(bottom + height),
    ));
  }

  fn line(&self, from: (f32, f32), to: (f32, f32)) {
    self.layer.add_line(Line {
      points: vec![
        (Point::new(Mm(from.0), Mm(from.1)), false),
        (Point::new(Mm(to.0), Mm(to.1)), false),
      ],
      is_closed: false,
    });
  }

  fn centered_text(&self, text: &str, size: f32, left: f32, width: f32, baseline: f32, bold: bool) {
    let font = if bold { self.bold } else { self.regular };
    let x = left + ((width - text_width(text, size)) / 2.0).max(1.0);
    self
      .layer
      .set_fill_color(Color::Rgb(printpdf::Rgb::new(0.0, 0.0, 0.0, None)));
    self.layer.use_text(text, size, Mm(x), Mm(baseline), font);
  }

  fn row(&self, cells: &[String], top: f32, height: f32, size: f32, shade: f32, bold: bool) {
    let table_width: f32 = COLUMN_WIDTHS.iter().sum();
    let bottom = top - height;
    self.fill(shade, MARGIN, bottom, table_width, height);

    let baseline = bottom + (height - size * PT_TO_MM) / 2.0;
    let mut left = MARGIN;
    for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
      let text = fit_to_column(cell, size, width);
      self.centered_text(&text, size, left, width, baseline, bold);
      left += width;
    }

    // 网格：底边与各列竖线
    self.line((MARGIN, bottom), (MARGIN + table_width, bottom));
    let mut x = MARGIN;
    self.line((x, bottom), (x, top));
    for width in COLUMN_WIDTHS {
      x += width;
      self.line((x, bottom), (x, top));
    }
  }
}

fn render_report(title: &str, records: &[DetectionRecord], path: &Path) -> Result<(), ReportError> {
  let (doc, first_page, first_layer) =
    PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
  let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
  let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

  let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
  let table_width: f32 = COLUMN_WIDTHS.iter().sum();
  let per_page = rows_per_page();

  for (page_idx, chunk) in records.chunks(per_page).enumerate() {
    let layer = if page_idx == 0 {
      doc.get_page(first_page).get_layer(first_layer)
    } else {
      let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
      doc.get_page(page).get_layer(layer)
    };
    layer.set_outline_color(Color::Rgb(printpdf::Rgb::new(0.0, 0.0, 0.0, None)));
    layer.set_outline_thickness(GRID_THICKNESS);

    let writer = PageWriter {
      layer,
      regular: &regular,
      bold: &bold,
    };

    let mut top = PAGE_HEIGHT - MARGIN;
    if page_idx == 0 {
      writer.centered_text(title, TITLE_SIZE, MARGIN, table_width, top - TITLE_SIZE * PT_TO_MM, true);
    }
    top -= TITLE_BLOCK;

    // 表头上边框
    writer.line((MARGIN, top), (MARGIN + table_width, top));
    writer.row(&headers, top, HEADER_HEIGHT, HEADER_SIZE, 0.8, true);
    top -= HEADER_HEIGHT;

    for record in chunk {
      writer.row(&format_row(record), top, ROW_HEIGHT, BODY_SIZE, 0.933, false);
      top -= ROW_HEIGHT;
    }
  }

  let mut out = BufWriter::new(File::create(path)?);
  doc.save(&mut out)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::history::NewDetectionRecord;
  use chrono::{TimeZone, Utc};

  async fn store(dir: &tempfile::TempDir) -> HistoryStore {
    let url = format!("sqlite://{}", dir.path().join("history.db").display());
    HistoryStore::connect(&url).await.unwrap()
  }

  fn new_record(i: u32) -> NewDetectionRecord {
    NewDetectionRecord {
      timestamp: None,
      original_image: format!("static/uploads/{}.jpg", i),
      processed_image: format!("static/results/result_{}.jpg", i),
      sheep_count: i,
      processing_time: 1.0 + i as f64 / 10.0,
    }
  }

  #[test]
  fn rows_are_formatted_for_the_table() {
    let record = DetectionRecord {
      id: 1,
      timestamp: Utc.with_ymd_and_hms(2026, 5, 4, 13, 2, 9).unwrap(),
      original_image: "a.jpg".to_string(),
      processed_image: "result_a.jpg".to_string(),
      sheep_count: 12,
      processing_time: 3.14159,
    };
    assert_eq!(
      format_row(&record),
      [
        "2026-05-04 13:02:09".to_string(),
        "a.jpg".to_string(),
        "result_a.jpg".to_string(),
        "12".to_string(),
        "3.14s".to_string(),
      ]
    );
  }

  #[test]
  fn long_paths_keep_their_tail() {
    let long = format!("static/uploads/{}/file.jpg", "x".repeat(200));
    let fitted = fit_to_column(&long, BODY_SIZE, 40.0);
    assert!(fitted.starts_with("..."));
    assert!(fitted.ends_with("file.jpg"));
    assert!(fitted.chars().count() < long.chars().count());
    assert_eq!(fit_to_column("short", BODY_SIZE, 40.0), "short");
  }

  #[tokio::test]
  async fn title_and_file_name_follow_target_class() {
    let dir = tempfile::tempdir().unwrap();
    let generator = ReportGenerator::new(store(&dir).await, dir.path(), "sheep");
    assert_eq!(generator.title(), "Sheep Detection Report");
    let name = generator.file_name();
    assert!(name.starts_with("sheep_report_"));
    assert!(name.ends_with(".pdf"));
    assert_eq!(name.len(), "sheep_report_20260101_000000.pdf".len());
  }

  #[tokio::test]
  async fn empty_history_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let reports = dir.path().join("reports");
    let generator = ReportGenerator::new(store(&dir).await, &reports, "sheep");

    assert!(generator.generate().await.unwrap().is_none());
    assert!(!reports.exists());
  }

  #[tokio::test]
  async fn report_spans_multiple_pages() {
    let dir = tempfile::tempdir().unwrap();
    let history = store(&dir).await;
    let total = rows_per_page() as u32 + 5;
    for i in 0..total {
      history.append(new_record(i)).await.unwrap();
    }

    let reports = dir.path().join("reports");
    let generator = ReportGenerator::new(history, &reports, "sheep");
    let path = generator.generate().await.unwrap().unwrap();

    assert!(path.starts_with(&reports));
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
  }
}
