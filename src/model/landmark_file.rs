// 该文件是 Yirong （仪容） 项目的一部分。
// src/model/landmark_file.rs - 从 JSON 文件读取关键点的姿态来源
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{ModelError, PoseDetector},
  pose::Pose,
};

/// 由外部检测器预先导出的关键点。
///
/// 文件内容为 33 个关键点组成的数组，或 `null` 表示画面中没有人。
#[derive(Debug, Clone)]
pub struct LandmarkFileDetector {
  pose: Option<Pose>,
}

impl LandmarkFileDetector {
  pub fn new(pose: Option<Pose>) -> Self {
    Self { pose }
  }

  pub fn from_json(json: &str) -> Result<Self, ModelError> {
    let pose: Option<Pose> = serde_json::from_str(json)?;
    Ok(Self::new(pose))
  }
}

impl FromUrl for LandmarkFileDetector {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::scheme_mismatch(Self::SCHEME, url));
    }
    info!("读取关键点文件: {}", url.path());
    let json = std::fs::read_to_string(url.path())?;
    Self::from_json(&json)
  }
}

impl FromUrlWithScheme for LandmarkFileDetector {
  const SCHEME: &'static str = "pose";
}

#[async_trait]
impl PoseDetector for LandmarkFileDetector {
  async fn detect(&self, image: &RgbImage) -> Result<Option<Pose>, ModelError> {
    debug!(
      "返回预存关键点, 图像尺寸 {}x{}, 有人: {}",
      image.width(),
      image.height(),
      self.pose.is_some()
    );
    Ok(self.pose.clone())
  }

  async fn reset(&self) {
    debug!("关键点文件来源无时序状态");
  }
}
