// 该文件是 Yirong （仪容） 项目的一部分。
// src/geometry.rs - 关节角度与姿态几何量
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

use crate::pose::{Landmark, Pose, PoseLandmark};

/// 肩宽低于此值时前倾分数无意义
const FORWARD_HEAD_MIN_SHOULDER_WIDTH: f32 = 0.01;
/// 前倾分数换算角度的基线与上限
const FORWARD_HEAD_BASELINE: f32 = 1.5;
const FORWARD_HEAD_DEGREE_PER_UNIT: f32 = 30.0;
const FORWARD_HEAD_MAX_DEGREE: f32 = 60.0;

/// 以 b 为顶点的关节弯曲角。
///
/// 返回 `180 - acos(cosθ)`，0° 表示完全伸直，越大越弯曲。
/// 任一向量长度近似为 0 时返回 0。
pub fn joint_angle<const N: usize>(a: [f32; N], b: [f32; N], c: [f32; N]) -> f32 {
  let mut ba = [0.0f32; N];
  let mut bc = [0.0f32; N];
  for i in 0..N {
    ba[i] = a[i] - b[i];
    bc[i] = c[i] - b[i];
  }

  let dot: f32 = ba.iter().zip(bc.iter()).map(|(x, y)| x * y).sum();
  let norm_ba = ba.iter().map(|v| v * v).sum::<f32>().sqrt();
  let norm_bc = bc.iter().map(|v| v * v).sum::<f32>().sqrt();

  if norm_ba <= f32::EPSILON || norm_bc <= f32::EPSILON {
    return 0.0;
  }

  let cosine = (dot / (norm_ba * norm_bc)).clamp(-1.0, 1.0);
  (180.0 - cosine.acos().to_degrees()).clamp(0.0, 180.0)
}

/// 以 b 为顶点的二维夹角（0..180），180° 表示三点共线伸直
pub fn interior_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
  let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
  let degrees = radians.to_degrees().abs();
  if degrees > 180.0 {
    360.0 - degrees
  } else {
    degrees
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForwardHead {
  /// 肩中点与鼻尖的 z 深度差 / 肩宽
  pub z_score: f32,
  /// 鼻尖低于双耳连线的距离 / 肩宽
  pub nose_drop: f32,
}

/// 头部前倾分数，按肩宽归一化
pub fn forward_head(pose: &Pose) -> ForwardHead {
  let nose = pose[PoseLandmark::Nose];
  let ls = pose[PoseLandmark::LeftShoulder];
  let rs = pose[PoseLandmark::RightShoulder];
  let left_ear = pose[PoseLandmark::LeftEar];
  let right_ear = pose[PoseLandmark::RightEar];

  let shoulder_width = (ls.x - rs.x).hypot(ls.y - rs.y);
  if shoulder_width < FORWARD_HEAD_MIN_SHOULDER_WIDTH {
    return ForwardHead::default();
  }

  let shoulder_z = (ls.z + rs.z) / 2.0;
  let ear_y = (left_ear.y + right_ear.y) / 2.0;

  ForwardHead {
    z_score: (shoulder_z - nose.z) / shoulder_width,
    nose_drop: (nose.y - ear_y) / shoulder_width,
  }
}

/// 前倾分数换算为展示用角度
pub fn forward_head_degrees(z_score: f32) -> f32 {
  let excess = (z_score - FORWARD_HEAD_BASELINE).max(0.0);
  (excess * FORWARD_HEAD_DEGREE_PER_UNIT).min(FORWARD_HEAD_MAX_DEGREE)
}

/// 肩线倾斜角（度），左肩低于右肩时为正
pub fn shoulder_tilt(pose: &Pose) -> f32 {
  let ls = pose[PoseLandmark::LeftShoulder];
  let rs = pose[PoseLandmark::RightShoulder];
  let dx = (ls.x - rs.x).abs();
  let dy = ls.y - rs.y;
  dy.atan2(dx).to_degrees()
}

/// 背部弯曲角：髋中点处，肩中点与膝中点的三维夹角
pub fn back_angle(pose: &Pose) -> f32 {
  let shoulder = pose.midpoint(PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder);
  let hip = pose.midpoint(PoseLandmark::LeftHip, PoseLandmark::RightHip);
  let knee = pose.midpoint(PoseLandmark::LeftKnee, PoseLandmark::RightKnee);
  joint_angle(shoulder.xyz(), hip.xyz(), knee.xyz())
}

/// 背部弯曲角的像素空间二维版本
pub fn back_tilt(pose: &Pose, width: u32, height: u32) -> f32 {
  let (w, h) = (width as f32, height as f32);
  let shoulder = pose.midpoint(PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder);
  let hip = pose.midpoint(PoseLandmark::LeftHip, PoseLandmark::RightHip);
  let knee = pose.midpoint(PoseLandmark::LeftKnee, PoseLandmark::RightKnee);
  joint_angle(
    shoulder.to_pixel(w, h),
    hip.to_pixel(w, h),
    knee.to_pixel(w, h),
  )
}

/// 头颈偏离角：肩中点处，鼻尖与髋中点的像素空间夹角
pub fn head_angle(pose: &Pose, width: u32, height: u32) -> f32 {
  let (w, h) = (width as f32, height as f32);
  let nose = pose[PoseLandmark::Nose];
  let shoulder = pose.midpoint(PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder);
  let hip = pose.midpoint(PoseLandmark::LeftHip, PoseLandmark::RightHip);
  joint_angle(nose.to_pixel(w, h), shoulder.to_pixel(w, h), hip.to_pixel(w, h))
}

/// 肘部弯曲角（左、右），使用 `joint_angle` 的二维版本
pub fn arm_angles(pose: &Pose) -> [f32; 2] {
  use PoseLandmark::*;
  [
    (LeftShoulder, LeftElbow, LeftWrist),
    (RightShoulder, RightElbow, RightWrist),
  ]
  .map(|(s, e, w)| joint_angle(pose[s].xy(), pose[e].xy(), pose[w].xy()))
}

/// 膝部弯曲角（左、右），使用 `joint_angle` 的三维版本
pub fn leg_angles(pose: &Pose) -> [f32; 2] {
  use PoseLandmark::*;
  [
    (LeftHip, LeftKnee, LeftAnkle),
    (RightHip, RightKnee, RightAnkle),
  ]
  .map(|(h, k, a)| joint_angle(pose[h].xyz(), pose[k].xyz(), pose[a].xyz()))
}

fn max_straightness_deviation(pose: &Pose, joints: [[PoseLandmark; 3]; 2]) -> f32 {
  joints
    .iter()
    .map(|[a, b, c]| (180.0 - interior_angle(&pose[*a], &pose[*b], &pose[*c])).abs())
    .fold(0.0, f32::max)
}

/// 双臂中最大的伸直偏差 `|180 - 夹角|`
pub fn max_arm_deviation(pose: &Pose) -> f32 {
  use PoseLandmark::*;
  max_straightness_deviation(
    pose,
    [
      [LeftShoulder, LeftElbow, LeftWrist],
      [RightShoulder, RightElbow, RightWrist],
    ],
  )
}

/// 双腿中最大的伸直偏差 `|180 - 夹角|`
pub fn max_leg_deviation(pose: &Pose) -> f32 {
  use PoseLandmark::*;
  max_straightness_deviation(
    pose,
    [
      [LeftHip, LeftKnee, LeftAnkle],
      [RightHip, RightKnee, RightAnkle],
    ],
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pose::fixtures::{standing_pose, with_landmark};
  use proptest::prelude::*;

  fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
  }

  #[test]
  fn straight_line_is_zero_and_right_angle_is_ninety() {
    assert!(approx(joint_angle([0.0, 0.0], [1.0, 0.0], [2.0, 0.0]), 0.0));
    assert!(approx(joint_angle([0.0, 1.0], [0.0, 0.0], [1.0, 0.0]), 90.0));
    assert!(approx(joint_angle([1.0, 0.0], [0.0, 0.0], [1.0, 0.0]), 180.0));
  }

  #[test]
  fn degenerate_vector_returns_zero() {
    assert_eq!(joint_angle([1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [2.0, 0.0, 0.0]), 0.0);
  }

  #[test]
  fn interior_angle_of_straight_limb_is_180() {
    let a = Landmark::new(0.0, 0.0, 0.0, 1.0);
    let b = Landmark::new(0.0, 1.0, 0.0, 1.0);
    let c = Landmark::new(0.0, 2.0, 0.0, 1.0);
    assert!(approx(interior_angle(&a, &b, &c), 180.0));
  }

  #[test]
  fn level_shoulders_have_no_tilt() {
    assert!(approx(shoulder_tilt(&standing_pose()), 0.0));
  }

  #[test]
  fn dropped_left_shoulder_tilts_positive() {
    let pose = with_landmark(
      &standing_pose(),
      PoseLandmark::LeftShoulder,
      Landmark::new(0.6, 0.45, 0.0, 0.9),
    );
    assert!(approx(shoulder_tilt(&pose), 45.0));
  }

  #[test]
  fn upright_torso_has_small_back_angle() {
    let pose = standing_pose();
    assert!(back_angle(&pose) < 1.0);
    assert!(back_tilt(&pose, 640, 480) < 1.0);
    assert!(head_angle(&pose, 640, 480) < 1.0);
  }

  #[test]
  fn straight_legs_have_no_deviation() {
    let pose = standing_pose();
    assert!(max_leg_deviation(&pose) < 1e-3);
    assert!(leg_angles(&pose).iter().all(|a| *a < 1e-3));
  }

  #[test]
  fn forward_head_is_scale_invariant() {
    let pose = with_landmark(
      &standing_pose(),
      PoseLandmark::Nose,
      Landmark::new(0.5, 0.12, -0.4, 0.9),
    );
    let fh = forward_head(&pose);
    assert!(approx(fh.z_score, 0.4 / 0.2));
    assert!(fh.nose_drop > 0.0);
  }

  #[test]
  fn forward_head_degrees_is_capped() {
    assert_eq!(forward_head_degrees(1.0), 0.0);
    assert!(approx(forward_head_degrees(2.0), 15.0));
    assert_eq!(forward_head_degrees(10.0), 60.0);
  }

  fn point() -> impl Strategy<Value = [f32; 3]> {
    prop::array::uniform3(-10.0f32..10.0)
  }

  proptest! {
    #[test]
    fn joint_angle_is_bounded_and_symmetric(a in point(), b in point(), c in point()) {
      let forward = joint_angle(a, b, c);
      let backward = joint_angle(c, b, a);
      prop_assert!((0.0..=180.0).contains(&forward));
      prop_assert!((forward - backward).abs() < 1e-3);
    }
  }
}
