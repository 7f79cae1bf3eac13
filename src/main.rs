// 该文件是 Yirong （仪容） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use yirong::{
  FromUrl,
  engine::{Engine, EngineConfig},
  input::InputWrapper,
  model::UrlBackendLoader,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("姿态来源: {}", args.pose);
  info!("文本嵌入: {}", args.embeddings);

  let config = match &args.config {
    Some(path) => {
      let text = std::fs::read_to_string(path).with_context(|| format!("无法读取配置文件 {}", path.display()))?;
      EngineConfig::from_json(&text).with_context(|| format!("配置文件格式错误 {}", path.display()))?
    }
    None => EngineConfig::default(),
  };

  let input = InputWrapper::from_url(&args.input)?;
  let outputs = args
    .output
    .iter()
    .map(OutputWrapper::from_url)
    .collect::<Result<Vec<_>, _>>()?;

  let loader = UrlBackendLoader {
    pose: args.pose,
    embeddings: args.embeddings,
    image_encoder: args.image_encoder,
  };
  let engine = Engine::new(loader, config);
  engine.initialize().await?;

  let analysis = OneShotTask.run_task(input, &engine, outputs).await?;
  info!("状态: {}, 置信度: {:.2}", analysis.result.status_text, analysis.result.confidence);

  Ok(())
}
