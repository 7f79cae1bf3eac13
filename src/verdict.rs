// 该文件是 Yirong （仪容） 项目的一部分。
// src/verdict.rs - 带通过标记的判定文本
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

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const TRUE_TAG: &str = "(true)";
const FALSE_TAG: &str = "(false)";

/// 供人阅读的判定文本与可供评分的通过标记。
///
/// 线上格式为 `"<text> (true)"` / `"<text> (false)"`，仅在序列化边界转换。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Verdict {
  pub text: String,
  pub passed: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("缺少 (true)/(false) 标记: {0:?}")]
pub struct MissingTag(pub String);

impl Verdict {
  pub fn new(text: impl Into<String>, passed: bool) -> Self {
    Self {
      text: text.into(),
      passed,
    }
  }

  pub fn pass(text: impl Into<String>) -> Self {
    Self::new(text, true)
  }

  pub fn fail(text: impl Into<String>) -> Self {
    Self::new(text, false)
  }

  pub fn unknown() -> Self {
    Self::fail("Unknown")
  }

  /// 解析结尾的 `(true)` / `(false)` 标记（不区分大小写）
  pub fn parse(tagged: &str) -> Result<Self, MissingTag> {
    let trimmed = tagged.trim_end();
    let lower = trimmed.to_ascii_lowercase();
    let (tag_len, passed) = if lower.ends_with(TRUE_TAG) {
      (TRUE_TAG.len(), true)
    } else if lower.ends_with(FALSE_TAG) {
      (FALSE_TAG.len(), false)
    } else {
      return Err(MissingTag(tagged.to_string()));
    };
    let text = trimmed[..trimmed.len() - tag_len].trim();
    Ok(Self::new(text, passed))
  }
}

/// 去掉文本中的全部 `(true)` / `(false)` 标记，用于展示
pub fn strip_tags(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut rest = text;
  while let Some(pos) = rest.find('(') {
    let tail = &rest[pos..];
    let lower = tail.to_ascii_lowercase();
    let tag_len = [TRUE_TAG, FALSE_TAG]
      .iter()
      .find(|tag| lower.starts_with(**tag))
      .map(|tag| tag.len());
    match tag_len {
      Some(len) => {
        out.push_str(rest[..pos].trim_end());
        rest = &rest[pos + len..];
      }
      None => {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];
      }
    }
  }
  out.push_str(rest);
  out.trim().to_string()
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let tag = if self.passed { TRUE_TAG } else { FALSE_TAG };
    if self.text.is_empty() {
      write!(f, "{}", tag)
    } else {
      write!(f, "{} {}", self.text, tag)
    }
  }
}

impl From<Verdict> for String {
  fn from(verdict: Verdict) -> Self {
    verdict.to_string()
  }
}

impl TryFrom<String> for Verdict {
  type Error = MissingTag;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Verdict::parse(&value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_trailing_tag() {
    assert_eq!(
      Verdict::parse("Clothing is tucked (true)").unwrap(),
      Verdict::pass("Clothing is tucked")
    );
    assert_eq!(
      Verdict::parse(" Mismatched footwear type (Shoe vs Sandal)! (FALSE) ").unwrap(),
      Verdict::fail("Mismatched footwear type (Shoe vs Sandal)!")
    );
  }

  #[test]
  fn untagged_text_is_rejected() {
    assert!(Verdict::parse("neat pants").is_err());
    assert!(Verdict::parse("the word true is not a tag").is_err());
  }

  #[test]
  fn wire_form_round_trips_through_serde() {
    let verdict = Verdict::fail("The pants are rolled up.");
    let json = serde_json::to_string(&verdict).unwrap();
    assert_eq!(json, "\"The pants are rolled up. (false)\"");
    assert_eq!(serde_json::from_str::<Verdict>(&json).unwrap(), verdict);
  }

  #[test]
  fn strip_tags_removes_every_tag() {
    assert_eq!(strip_tags("neatly combed hair (true)"), "neatly combed hair");
    assert_eq!(strip_tags("a (b) c(false)"), "a (b) c");
    assert_eq!(strip_tags("raw (true)(true)"), "raw");
  }
}
