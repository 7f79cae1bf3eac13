// 该文件是 Yirong （仪容） 项目的一部分。
// src/output/json_record.rs - 分析结果 JSON 记录
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::PathBuf,
};

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::FrameAnalysis,
  output::Render,
  pose::Pose,
  report::AnalysisResult,
};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Record<'a> {
  #[serde(flatten)]
  result: &'a AnalysisResult,
  #[serde(skip_serializing_if = "Option::is_none")]
  landmarks: Option<&'a Pose>,
}

/// `json:///path/out.json[?landmarks]`，路径为空时写到标准输出
pub struct JsonRecordOutput {
  path: Option<PathBuf>,
  landmarks: bool,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch);
    }

    let path = match uri.path() {
      "" | "/" | "-" => None,
      path => Some(PathBuf::from(path)),
    };
    let landmarks = uri.query_pairs().any(|(k, _)| k == "landmarks");

    Ok(JsonRecordOutput { path, landmarks })
  }
}

impl JsonRecordOutput {
  fn write_record<W: Write>(&self, mut writer: W, analysis: &FrameAnalysis) -> Result<(), JsonRecordError> {
    let record = Record {
      result: &analysis.result,
      landmarks: self.landmarks.then_some(&analysis.pose),
    };
    serde_json::to_writer_pretty(&mut writer, &record)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
  }
}

impl Render<RgbImage, FrameAnalysis> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, _frame: &RgbImage, result: &FrameAnalysis) -> Result<(), Self::Error> {
    match &self.path {
      Some(path) => {
        if let Some(parent) = path.parent()
          && !parent.as_os_str().is_empty()
        {
          std::fs::create_dir_all(parent)?;
        }
        self.write_record(BufWriter::new(File::create(path)?), result)?;
        info!("分析结果已写入: {}", path.display());
      }
      None => self.write_record(std::io::stdout().lock(), result)?,
    }
    Ok(())
  }
}
