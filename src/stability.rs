// 该文件是 Yirong （仪容） 项目的一部分。
// src/stability.rs - 站姿稳定度评分
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

use crate::pose::{Pose, PoseLandmark, round_to};

/// 各项偏差的容差与权重，均为经验常数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityWeights {
  pub min_shoulder_width: f32,
  pub shoulder_tolerance: f32,
  pub hip_tolerance: f32,
  pub head_offset_tolerance: f32,
  pub body_offset_tolerance: f32,
  pub forward_lean_baseline: f32,
  pub shoulder_weight: f32,
  pub hip_weight: f32,
  pub head_offset_weight: f32,
  pub body_offset_weight: f32,
  pub forward_lean_weight: f32,
}

impl Default for StabilityWeights {
  fn default() -> Self {
    Self {
      min_shoulder_width: 0.05,
      shoulder_tolerance: 0.02,
      hip_tolerance: 0.05,
      head_offset_tolerance: 0.04,
      body_offset_tolerance: 0.04,
      forward_lean_baseline: 1.5,
      shoulder_weight: 150.0,
      hip_weight: 100.0,
      head_offset_weight: 120.0,
      body_offset_weight: 120.0,
      forward_lean_weight: 15.0,
    }
  }
}

/// 单帧稳定度评分，范围 [0, 100]，保留一位小数
pub fn stability_score(pose: &Pose, weights: &StabilityWeights) -> f32 {
  let ls = pose[PoseLandmark::LeftShoulder];
  let rs = pose[PoseLandmark::RightShoulder];
  let lh = pose[PoseLandmark::LeftHip];
  let rh = pose[PoseLandmark::RightHip];
  let nose = pose[PoseLandmark::Nose];

  let shoulder_width = (ls.x - rs.x).abs();
  if shoulder_width < weights.min_shoulder_width {
    debug!("肩宽过小 ({:.3})，稳定度记为 0", shoulder_width);
    return 0.0;
  }

  let excess = |raw: f32, tolerance: f32| (raw / shoulder_width - tolerance).max(0.0);

  let mid_shoulder_x = (ls.x + rs.x) / 2.0;
  let mid_hip_x = (lh.x + rh.x) / 2.0;

  let shoulder_asym = excess((ls.y - rs.y).abs(), weights.shoulder_tolerance);
  let hip_asym = excess((lh.y - rh.y).abs(), weights.hip_tolerance);
  let head_offset = excess((nose.x - mid_shoulder_x).abs(), weights.head_offset_tolerance);
  let body_offset = excess(
    (mid_shoulder_x - mid_hip_x).abs(),
    weights.body_offset_tolerance,
  );

  let mid_shoulder_z = (ls.z + rs.z) / 2.0;
  let lean_ratio = ((mid_shoulder_z - nose.z) / shoulder_width).max(0.0);
  let forward_lean = (lean_ratio - weights.forward_lean_baseline).max(0.0) * weights.forward_lean_weight;

  let penalty = shoulder_asym * weights.shoulder_weight
    + hip_asym * weights.hip_weight
    + head_offset * weights.head_offset_weight
    + body_offset * weights.body_offset_weight
    + forward_lean;

  debug!(
    "稳定度扣分: 肩 {:.3}, 髋 {:.3}, 头偏 {:.3}, 躯干偏 {:.3}, 前倾 {:.3}",
    shoulder_asym, hip_asym, head_offset, body_offset, forward_lean
  );

  round_to((100.0 - penalty).clamp(0.0, 100.0), 1)
}
