// 该文件是 Yirong （仪容） 项目的一部分。
// src/gate.rs - 全身入镜判定
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

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pose::{Pose, PoseLandmark};

/// 全身判定必须可见的关键点
const REQUIRED_LANDMARKS: [PoseLandmark; 9] = [
  PoseLandmark::Nose,
  PoseLandmark::LeftShoulder,
  PoseLandmark::RightShoulder,
  PoseLandmark::LeftHip,
  PoseLandmark::RightHip,
  PoseLandmark::LeftKnee,
  PoseLandmark::RightKnee,
  PoseLandmark::LeftAnkle,
  PoseLandmark::RightAnkle,
];

/// 头部区域关键点
const HEAD_LANDMARKS: [PoseLandmark; 5] = [
  PoseLandmark::Nose,
  PoseLandmark::LeftEye,
  PoseLandmark::RightEye,
  PoseLandmark::LeftEar,
  PoseLandmark::RightEar,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
  pub visibility_threshold: f32,
  /// 画面边缘内缩比例
  pub margin: f32,
  pub min_visible_head_points: usize,
  /// 鼻尖到较低脚踝的纵向跨度占画面高度的最小比例
  pub min_body_ratio: f32,
}

impl Default for GateConfig {
  fn default() -> Self {
    Self {
      visibility_threshold: 0.5,
      margin: 0.05,
      min_visible_head_points: 3,
      min_body_ratio: 0.6,
    }
  }
}

/// 基础检查：必需关键点全部可见，且头部关键点至少有若干个未被画面边缘裁切
pub fn has_basic_full_body(pose: &Pose, config: &GateConfig) -> bool {
  let missing = REQUIRED_LANDMARKS
    .iter()
    .find(|&&idx| !pose[idx].visible_at_least(config.visibility_threshold));
  if let Some(idx) = missing {
    debug!("必需关键点不可见: {:?}", idx);
    return false;
  }

  let lo = config.margin;
  let hi = 1.0 - config.margin;
  let visible_head = HEAD_LANDMARKS
    .iter()
    .map(|&idx| pose[idx])
    .filter(|lm| lm.visible_at_least(config.visibility_threshold))
    .filter(|lm| (lo..=hi).contains(&lm.x) && (lo..=hi).contains(&lm.y))
    .count();

  debug!("可见头部关键点数量: {}", visible_head);
  visible_head >= config.min_visible_head_points
}

/// 至少一只脚踝严格位于上下边缘内缩带之内
pub fn ankles_in_frame(pose: &Pose, config: &GateConfig) -> bool {
  let inside = |y: f32| y > config.margin && y < 1.0 - config.margin;
  inside(pose[PoseLandmark::LeftAnkle].y) || inside(pose[PoseLandmark::RightAnkle].y)
}

/// 鼻尖到较低脚踝的纵向跨度足够大，排除人物过小的近景/远景
pub fn body_proportion_ok(pose: &Pose, config: &GateConfig) -> bool {
  let lowest_ankle = pose[PoseLandmark::LeftAnkle]
    .y
    .max(pose[PoseLandmark::RightAnkle].y);
  let body_height = lowest_ankle - pose[PoseLandmark::Nose].y;
  body_height >= config.min_body_ratio
}

/// 全身入镜判定，未通过时不进行后续分析
pub fn is_full_body_candidate(pose: &Pose, config: &GateConfig) -> bool {
  if !has_basic_full_body(pose, config) {
    return false;
  }
  let ankles = ankles_in_frame(pose, config);
  let proportion = body_proportion_ok(pose, config);
  debug!("脚踝入镜: {}, 身体比例: {}", ankles, proportion);
  ankles && proportion
}
