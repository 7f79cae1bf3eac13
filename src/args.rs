// 该文件是 Yirong （仪容） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Yirong 仪容与姿态检查
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///data/frame.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 姿态关键点来源，例如 pose:///data/frame.pose.json
  #[arg(long, value_name = "POSE")]
  pub pose: Url,

  /// 预计算的提示词文本嵌入表，例如 embeddings:///models/prompts.json
  #[arg(long, value_name = "EMBEDDINGS")]
  pub embeddings: Url,

  /// CLIP 图像编码器，例如 rknn:///models/clip_image.rknn；
  /// 未指定时所有服装类别记为 unknown
  #[arg(long, value_name = "MODEL")]
  pub image_encoder: Option<Url>,

  /// 输出，可重复指定
  /// 支持:
  /// - json:///out/result.json（路径为空时写到标准输出，?landmarks 附带关键点）
  /// - image:///out/overlay.png（?regions=false 不绘制分析区域）
  #[arg(long, value_name = "OUTPUT", default_value = "json:")]
  pub output: Vec<Url>,

  /// 引擎配置文件 (JSON)，缺省字段使用默认值
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
}
