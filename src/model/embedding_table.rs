// 该文件是 Yirong （仪容） 项目的一部分。
// src/model/embedding_table.rs - 预计算的提示词文本嵌入
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

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Embedding, ModelError, TextEncoder},
};

/// 提示词到嵌入向量的查找表，JSON 格式为 `{"prompt": [f32, ...]}`
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
  table: HashMap<String, Embedding>,
  dim: usize,
}

impl EmbeddingTable {
  pub fn new(entries: HashMap<String, Vec<f32>>) -> Result<Self, ModelError> {
    let mut dim = None;
    let mut table = HashMap::with_capacity(entries.len());
    for (prompt, vector) in entries {
      let expected = *dim.get_or_insert(vector.len());
      if vector.len() != expected {
        return Err(ModelError::DimensionMismatch {
          expected,
          actual: vector.len(),
        });
      }
      table.insert(prompt, vector.into_boxed_slice());
    }
    Ok(Self {
      table,
      dim: dim.unwrap_or(0),
    })
  }

  pub fn from_json(json: &str) -> Result<Self, ModelError> {
    let entries: HashMap<String, Vec<f32>> = serde_json::from_str(json)?;
    Self::new(entries)
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  pub fn dim(&self) -> usize {
    self.dim
  }
}

impl FromUrl for EmbeddingTable {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::scheme_mismatch(Self::SCHEME, url));
    }
    let json = std::fs::read_to_string(url.path())?;
    let table = Self::from_json(&json)?;
    info!("文本嵌入表: {} 条, 维度 {}", table.len(), table.dim());
    Ok(table)
  }
}

impl FromUrlWithScheme for EmbeddingTable {
  const SCHEME: &'static str = "embeddings";
}

#[async_trait]
impl TextEncoder for EmbeddingTable {
  async fn encode(&self, prompts: &[&str]) -> Result<Vec<Embedding>, ModelError> {
    debug!("查询 {} 条提示词", prompts.len());
    prompts
      .iter()
      .map(|prompt| {
        self
          .table
          .get(*prompt)
          .cloned()
          .ok_or_else(|| ModelError::MissingPrompt(prompt.to_string()))
      })
      .collect()
  }
}
