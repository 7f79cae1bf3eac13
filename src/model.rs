// 该文件是 Yirong （仪容） 项目的一部分。
// src/model.rs - 外部模型接口：姿态检测器、文本/图像编码器
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

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, frame::ClipFrame, pose::Pose};

/// 定长嵌入向量
pub type Embedding = Box<[f32]>;

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  Load(String),
  #[error("推理错误: {0}")]
  Inference(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("没有预计算的文本嵌入: {0:?}")]
  MissingPrompt(String),
  #[error("嵌入维度不一致: 期望 {expected}, 实际 {actual}")]
  DimensionMismatch { expected: usize, actual: usize },
  #[error("未知分类类别: {0}")]
  UnknownCategory(String),
  #[error("未配置图像编码器")]
  ImageEncoderDisabled,
  #[cfg(feature = "rknn")]
  #[error("RKNN 错误: {0}")]
  Rknn(#[from] rknpu::Error),
}

impl ModelError {
  pub fn scheme_mismatch(expected: &str, url: &Url) -> Self {
    ModelError::SchemeMismatch {
      expected: expected.to_string(),
      actual: url.scheme().to_string(),
    }
  }
}

/// 姿态检测器：给定一帧图像，返回 33 个关键点或没有人
#[async_trait]
pub trait PoseDetector: Send + Sync {
  async fn detect(&self, image: &RgbImage) -> Result<Option<Pose>, ModelError>;

  /// 清除检测器内部的时序平滑状态
  async fn reset(&self);
}

/// 文本编码器：每条提示词对应一个嵌入向量，顺序一致
#[async_trait]
pub trait TextEncoder: Send + Sync {
  async fn encode(&self, prompts: &[&str]) -> Result<Vec<Embedding>, ModelError>;
}

/// 图像编码器：输入固定尺寸的归一化帧
#[async_trait]
pub trait ImageEncoder: Send + Sync {
  async fn encode(&self, frame: &ClipFrame) -> Result<Embedding, ModelError>;
}

/// 已加载的外部模型句柄
pub struct Backends<D, T, I> {
  pub detector: D,
  pub text: T,
  pub image: I,
}

/// 负责加载外部模型，由引擎在初始化时调用一次
#[async_trait]
pub trait BackendLoader: Send + Sync {
  type Detector: PoseDetector;
  type Text: TextEncoder;
  type Image: ImageEncoder;

  async fn load(&self) -> Result<Backends<Self::Detector, Self::Text, Self::Image>, ModelError>;
}

mod embedding_table;
mod landmark_file;
pub use self::embedding_table::EmbeddingTable;
pub use self::landmark_file::LandmarkFileDetector;

#[cfg(feature = "rknn")]
mod clip_rknn;
#[cfg(feature = "rknn")]
pub use self::clip_rknn::{RknnClipImageEncoder, RknnClipImageEncoderBuilder};

/// 按 URI 方案选择的图像编码器
pub enum ImageEncoderWrapper {
  #[cfg(feature = "rknn")]
  Rknn(RknnClipImageEncoder),
  /// 未配置编码器，所有分类退化为 "unknown"
  Disabled,
}

impl FromUrl for ImageEncoderWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "rknn")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == RknnClipImageEncoderBuilder::SCHEME {
        let encoder = RknnClipImageEncoderBuilder::from_url(url)?.build()?;
        return Ok(ImageEncoderWrapper::Rknn(encoder));
      }
    }
    Err(ModelError::SchemeMismatch {
      expected: "rknn".to_string(),
      actual: url.scheme().to_string(),
    })
  }
}

#[async_trait]
impl ImageEncoder for ImageEncoderWrapper {
  async fn encode(&self, frame: &ClipFrame) -> Result<Embedding, ModelError> {
    match (self, frame) {
      #[cfg(feature = "rknn")]
      (ImageEncoderWrapper::Rknn(encoder), frame) => encoder.encode(frame).await,
      (ImageEncoderWrapper::Disabled, _frame) => Err(ModelError::ImageEncoderDisabled),
    }
  }
}

/// 由命令行 URI 描述的一组模型
#[derive(Debug, Clone)]
pub struct UrlBackendLoader {
  pub pose: Url,
  pub embeddings: Url,
  pub image_encoder: Option<Url>,
}

#[async_trait]
impl BackendLoader for UrlBackendLoader {
  type Detector = LandmarkFileDetector;
  type Text = EmbeddingTable;
  type Image = ImageEncoderWrapper;

  async fn load(&self) -> Result<Backends<Self::Detector, Self::Text, Self::Image>, ModelError> {
    info!("加载姿态来源: {}", self.pose);
    let detector = LandmarkFileDetector::from_url(&self.pose)?;
    info!("加载文本嵌入表: {}", self.embeddings);
    let text = EmbeddingTable::from_url(&self.embeddings)?;
    let image = match &self.image_encoder {
      Some(url) => {
        info!("加载图像编码器: {}", url);
        ImageEncoderWrapper::from_url(url)?
      }
      None => ImageEncoderWrapper::Disabled,
    };
    Ok(Backends {
      detector,
      text,
      image,
    })
  }
}

/// 余弦相似度，任一向量为零向量时返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  let mut dot = 0.0f32;
  let mut na = 0.0f32;
  let mut nb = 0.0f32;
  for (x, y) in a.iter().zip(b.iter()) {
    dot += x * y;
    na += x * x;
    nb += y * y;
  }
  let denom = na.sqrt() * nb.sqrt();
  if denom <= f32::EPSILON { 0.0 } else { dot / denom }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cosine_of_parallel_vectors_is_one() {
    assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
  }

  #[tokio::test]
  async fn disabled_image_encoder_reports_error() {
    let image = RgbImage::new(8, 8);
    let frame = ClipFrame::from_region(&image, &crate::roi::RoiBox::EMPTY);
    let err = ImageEncoderWrapper::Disabled.encode(&frame).await.unwrap_err();
    assert!(matches!(err, ModelError::ImageEncoderDisabled));
  }
}
