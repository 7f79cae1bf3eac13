// 该文件是 Yirong （仪容） 项目的一部分。
// src/model/clip_rknn.rs - RKNN 上运行的 CLIP 图像编码器
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

use std::sync::Mutex;

use async_trait::async_trait;
use rknpu::{Context, InitFlags, TensorType};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{AsNhwcFrame, ClipFrame},
  model::{Embedding, ImageEncoder, ModelError},
};

const CLIP_NUM_INPUTS: u32 = 1;
const CLIP_NUM_OUTPUTS: u32 = 1;

pub struct RknnClipImageEncoder {
  context: Mutex<Context>,
}

pub struct RknnClipImageEncoderBuilder {
  model_path: String,
  flags: InitFlags,
}

impl FromUrl for RknnClipImageEncoderBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::scheme_mismatch(Self::SCHEME, url));
    }

    Ok(RknnClipImageEncoderBuilder {
      model_path: url.path().to_string(),
      flags: InitFlags::default(),
    })
  }
}

impl FromUrlWithScheme for RknnClipImageEncoderBuilder {
  const SCHEME: &'static str = "rknn";
}

impl RknnClipImageEncoderBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn build(self) -> Result<RknnClipImageEncoder, ModelError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, self.flags)?;

    let num_inputs = context.num_inputs()?;
    let num_outputs = context.num_outputs()?;
    if num_inputs != CLIP_NUM_INPUTS || num_outputs != CLIP_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        CLIP_NUM_INPUTS, CLIP_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(ModelError::Load(format!(
        "输入/输出数量不匹配: {}/{}",
        num_inputs, num_outputs
      )));
    }
    info!("模型加载完成");

    Ok(RknnClipImageEncoder {
      context: Mutex::new(context),
    })
  }
}

impl RknnClipImageEncoder {
  fn infer(&self, frame: &ClipFrame) -> Result<Embedding, ModelError> {
    let context = self
      .context
      .lock()
      .map_err(|_| ModelError::Inference("推理上下文已损坏".to_string()))?;

    // 模型内部完成均值/方差归一化，这里直接送入 u8 画布
    debug!("设置模型输入");
    context.set_input(
      0,
      frame.as_nhwc(),
      rknpu::TensorFormat::NHWC,
      TensorType::UInt8,
    )?;

    debug!("执行模型推理");
    context.run()?;

    let output = context.get_outputs()?;
    let embedding = output.get_f32(0)?;
    debug!("图像嵌入维度: {}", embedding.len());
    Ok(embedding.to_vec().into_boxed_slice())
  }
}

#[async_trait]
impl ImageEncoder for RknnClipImageEncoder {
  async fn encode(&self, frame: &ClipFrame) -> Result<Embedding, ModelError> {
    self.infer(frame)
  }
}
