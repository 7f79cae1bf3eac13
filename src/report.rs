// 该文件是 Yirong （仪容） 项目的一部分。
// src/report.rs - 分析结果与姿态提示
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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{classifier::UNKNOWN_LABEL, color::ColorName, verdict::Verdict};

pub const STATUS_FULL_BODY: &str = "FULL BODY";
pub const STATUS_NOT_FULL_BODY: &str = "NOT FULL BODY";
pub const STEP_BACK_HINT: &str = "Step back: full body not visible";
/// 未做分析时的胸前配饰
pub const NO_ACCESSORY: &str = "none";

/// 角度与稳定性指标，均已按展示精度取整
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Angles {
  pub head_deviation: f32,
  pub shoulder_tilt: f32,
  pub forward_head_z: f32,
  /// 前倾分数换算的角度，用于展示
  pub forward_head_degrees: f32,
  pub back_deviation: f32,
  /// 像素空间的背部弯曲角
  pub back_tilt: f32,
  /// 左、右肘弯曲角，0 为伸直
  pub arm_angles: [f32; 2],
  /// 左、右膝弯曲角，0 为伸直
  pub leg_angles: [f32; 2],
  pub max_arm_angle: f32,
  pub max_leg_angle: f32,
  pub stability_norm: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingReport {
  pub top: String,
  pub bottom: String,
  pub foot: String,
  pub head: String,
  pub accessory: String,
  pub top_state: Verdict,
  pub bottom_state: Verdict,
  pub top_condition: Verdict,
  pub head_state: Verdict,
  pub foot_check: Verdict,
  pub sleeve_check: Verdict,
  pub foot_details: String,
  pub sleeve_details: String,
  pub top_color: ColorName,
  pub bottom_color: ColorName,
}

impl Default for ClothingReport {
  fn default() -> Self {
    Self {
      top: UNKNOWN_LABEL.to_string(),
      bottom: UNKNOWN_LABEL.to_string(),
      foot: UNKNOWN_LABEL.to_string(),
      head: UNKNOWN_LABEL.to_string(),
      accessory: NO_ACCESSORY.to_string(),
      top_state: Verdict::unknown(),
      bottom_state: Verdict::unknown(),
      top_condition: Verdict::unknown(),
      head_state: Verdict::unknown(),
      foot_check: Verdict::unknown(),
      sleeve_check: Verdict::unknown(),
      foot_details: String::new(),
      sleeve_details: String::new(),
      top_color: ColorName::Unknown,
      bottom_color: ColorName::Unknown,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureLevel {
  Ok,
  Warn,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureLine {
  pub level: PostureLevel,
  pub text: String,
}

impl PostureLine {
  fn new(level: PostureLevel, text: &str) -> Self {
    Self {
      level,
      text: text.to_string(),
    }
  }
}

/// 不超过 `ok` 为正常，不超过 `warn` 为警告，否则为错误
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
  pub ok: f32,
  pub warn: f32,
}

impl Band {
  const fn new(ok: f32, warn: f32) -> Self {
    Self { ok, warn }
  }

  fn level(&self, value: f32) -> PostureLevel {
    if value <= self.ok {
      PostureLevel::Ok
    } else if value <= self.warn {
      PostureLevel::Warn
    } else {
      PostureLevel::Error
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureThresholds {
  pub back: Band,
  pub head_tilt: Band,
  pub forward_head: Band,
  pub shoulder: Band,
  pub legs: Band,
}

impl Default for PostureThresholds {
  fn default() -> Self {
    Self {
      back: Band::new(20.0, 40.0),
      head_tilt: Band::new(10.0, 20.0),
      forward_head: Band::new(2.2, 2.3),
      shoulder: Band::new(3.0, 10.0),
      legs: Band::new(60.0, 80.0),
    }
  }
}

/// 生成姿态提示：背部、头颈、肩部、腿部依次各一组
pub fn posture_lines(
  back: f32,
  head: f32,
  forward_z: f32,
  shoulder: f32,
  legs: f32,
  t: &PostureThresholds,
) -> Vec<PostureLine> {
  use PostureLevel::*;

  let pick = |level, texts: [&str; 3]| {
    let text = match level {
      Ok => texts[0],
      Warn => texts[1],
      Error => texts[2],
    };
    PostureLine::new(level, text)
  };

  let mut lines = vec![pick(
    t.back.level(back),
    ["Back posture is OK", "Back slightly bent", "Back significantly bent"],
  )];

  let mut head_issue = false;
  let tilt = t.head_tilt.level(head.abs());
  if tilt != Ok {
    head_issue = true;
    lines.push(pick(tilt, ["", "Neck slightly bent", "Bad neck posture"]));
  }
  let forward = t.forward_head.level(forward_z);
  if forward != Ok {
    head_issue = true;
    lines.push(pick(forward, ["", "Head slightly forward", "High forward head"]));
  }
  if !head_issue {
    lines.push(PostureLine::new(Ok, "Head & Neck: Perfect"));
  }

  lines.push(pick(
    t.shoulder.level(shoulder.abs()),
    ["Shoulder posture is OK", "Shoulder slightly tilted", "Shoulder posture incorrect"],
  ));
  lines.push(pick(
    t.legs.level(legs.abs()),
    ["Legs are straight", "Knees slightly bent", "Knees significantly bent"],
  ));
  lines
}

/// 单帧分析结果，构造后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
  pub full_body: bool,
  pub person_detected: bool,
  pub confidence: f32,
  pub angles: Angles,
  pub stability_score: f32,
  pub clothing: ClothingReport,
  pub status_text: String,
  pub posture_lines: Vec<PostureLine>,
  pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
  /// 未通过全身检查：只保留置信度，并提示后退
  pub fn not_full_body(confidence: f32) -> Self {
    Self {
      full_body: false,
      person_detected: true,
      confidence,
      angles: Angles::default(),
      stability_score: 0.0,
      clothing: ClothingReport::default(),
      status_text: STATUS_NOT_FULL_BODY.to_string(),
      posture_lines: vec![PostureLine::new(PostureLevel::Error, STEP_BACK_HINT)],
      timestamp: Utc::now(),
    }
  }
}
