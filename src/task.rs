// 该文件是 Yirong （仪容） 项目的一部分。
// src/task.rs - 任务编排：输入 → 引擎 → 输出
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

use std::time::Instant;

use async_trait::async_trait;
use image::RgbImage;
use tracing::{info, warn};

use crate::{
  engine::{Engine, FrameAnalysis},
  model::BackendLoader,
  output::Render,
};

#[async_trait]
pub trait Task<I, L: BackendLoader, O>: Sized {
  type Error;
  async fn run_task(self, input: I, engine: &Engine<L>, output: O) -> Result<FrameAnalysis, Self::Error>;
}

/// 取输入的第一帧，分析一次并交给输出
pub struct OneShotTask;

#[async_trait]
impl<I, L, O, RE> Task<I, L, O> for OneShotTask
where
  I: Iterator<Item = RgbImage> + Send + 'static,
  L: BackendLoader + 'static,
  O: Render<RgbImage, FrameAnalysis, Error = RE> + Send + 'static,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  async fn run_task(self, mut input: I, engine: &Engine<L>, output: O) -> Result<FrameAnalysis, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 ({}x{})，开始分析...", frame.width(), frame.height());

    let now = Instant::now();
    let analysis = engine.analyze(&frame).await?;
    info!("分析完成，耗时: {:.2?}", now.elapsed());
    if !analysis.result.full_body {
      warn!("未检测到完整身体: {}", analysis.result.status_text);
    }
    for line in &analysis.result.posture_lines {
      info!("[{:?}] {}", line.level, line.text);
    }

    output.render_result(&frame, &analysis)?;
    info!("渲染完成，总耗时: {:.2?}", now.elapsed());

    Ok(analysis)
  }
}
