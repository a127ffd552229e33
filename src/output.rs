// 该文件是 Xunshi （巡视） 项目的一部分。
// src/output.rs - 检测报告输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::PathBuf,
};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub trait Publish<Report>: Sized {
  type Error;
  fn publish(&self, report: &Report) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("写入报告失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化报告失败: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// JSON 报告输出
///
/// `json:///tmp/report.json` 写入文件，`json:-` 或不指定时写到标准输出。
/// 查询参数 `pretty=false` 输出紧凑格式。
#[derive(Debug, Clone, PartialEq)]
pub struct JsonReportOutput {
  path: Option<PathBuf>,
  pretty: bool,
}

impl Default for JsonReportOutput {
  fn default() -> Self {
    Self::stdout()
  }
}

impl FromUrlWithScheme for JsonReportOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonReportOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(OutputError::SchemeMismatch);
    }

    let pretty = url
      .query_pairs()
      .find(|(k, _)| k == "pretty")
      .map(|(_, v)| v != "false" && v != "0")
      .unwrap_or(true);
    let path = match url.path() {
      "" | "-" => None,
      path => Some(PathBuf::from(path)),
    };

    Ok(Self { path, pretty })
  }
}

impl JsonReportOutput {
  pub fn stdout() -> Self {
    Self {
      path: None,
      pretty: true,
    }
  }

  pub fn file(path: impl Into<PathBuf>) -> Self {
    Self {
      path: Some(path.into()),
      pretty: true,
    }
  }

  fn write<W: Write, T: Serialize>(&self, mut writer: W, report: &T) -> Result<(), OutputError> {
    if self.pretty {
      serde_json::to_writer_pretty(&mut writer, report)?;
    } else {
      serde_json::to_writer(&mut writer, report)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
  }
}

impl<T: Serialize> Publish<T> for JsonReportOutput {
  type Error = OutputError;

  fn publish(&self, report: &T) -> Result<(), Self::Error> {
    match &self.path {
      Some(path) => {
        self.write(BufWriter::new(File::create(path)?), report)?;
        info!("报告已写入 {}", path.display());
      }
      None => self.write(std::io::stdout().lock(), report)?,
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BBox, Detection, ImageDetections};

  #[test]
  fn parses_urls() {
    let output = JsonReportOutput::from_url(&Url::parse("json:///tmp/a.json").unwrap()).unwrap();
    assert_eq!(output, JsonReportOutput::file("/tmp/a.json"));

    let output = JsonReportOutput::from_url(&Url::parse("json:-?pretty=false").unwrap()).unwrap();
    assert_eq!(output.path, None);
    assert!(!output.pretty);

    assert!(matches!(
      JsonReportOutput::from_url(&Url::parse("image:///tmp/a.png").unwrap()),
      Err(OutputError::SchemeMismatch)
    ));
  }

  #[test]
  fn writes_report_file() {
    let path = std::env::temp_dir().join(format!("xunshi-report-{}.json", std::process::id()));
    let report = ImageDetections {
      model: "yolov8n".to_string(),
      detections: vec![Detection {
        bbox: BBox::from([1.0, 2.0, 3.0, 4.0]),
        label: "person".to_string(),
        class_id: 0,
        score: 0.5,
      }],
    };
    JsonReportOutput::file(&path).publish(&report).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    let back: ImageDetections = serde_json::from_str(&text).unwrap();
    assert_eq!(back, report);
  }
}
