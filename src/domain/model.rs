use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::error::{IacError, Result};

pub const STATE_FORMAT_VERSION: u32 = 1;

/// 資源位址：`type.name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceAddr {
    pub rtype: String,
    pub name: String,
}

impl ResourceAddr {
    pub fn new(rtype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            rtype: rtype.into(),
            name: name.into(),
        }
    }

    /// 解析 `depends_on` 的 `type.name` 字串
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.splitn(2, '.');
        let rtype = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if rtype.is_empty() || name.is_empty() {
            return Err(IacError::InvalidConfigValueError {
                field: "depends_on".to_string(),
                value: s.to_string(),
                reason: "Expected a 'type.name' address".to_string(),
            });
        }
        Ok(Self::new(rtype, name))
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.rtype, self.name)
    }
}

/// 資料查詢位址：`data.type.name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataAddr {
    pub dtype: String,
    pub name: String,
}

impl DataAddr {
    pub fn new(dtype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dtype: dtype.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DataAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data.{}.{}", self.dtype, self.name)
    }
}

/// 依賴圖節點：資源或資料查詢
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeAddr {
    Data(DataAddr),
    Resource(ResourceAddr),
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAddr::Data(addr) => addr.fmt(f),
            NodeAddr::Resource(addr) => addr.fmt(f),
        }
    }
}

/// 屬性值：TOML 值的子集。字串可內嵌引用表達式，解析後才轉成具體值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::Bool(b) => serde_json::Value::Bool(*b),
            AttrValue::Int(i) => serde_json::Value::Number((*i).into()),
            AttrValue::Str(s) => serde_json::Value::String(s.clone()),
            AttrValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Str(s) => write!(f, "\"{}\"", s),
            AttrValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\"", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// 引用表達式指向的目標
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Resource { addr: ResourceAddr, attr: String },
    Data { addr: DataAddr, attr: String },
}

impl Reference {
    pub fn node(&self) -> NodeAddr {
        match self {
            Reference::Resource { addr, .. } => NodeAddr::Resource(addr.clone()),
            Reference::Data { addr, .. } => NodeAddr::Data(addr.clone()),
        }
    }

    /// 還原成 `${...}` 原始表達式，供錯誤訊息使用
    pub fn expr(&self) -> String {
        match self {
            Reference::Resource { addr, attr } => format!("${{{}.{}}}", addr, attr),
            Reference::Data { addr, attr } => format!("${{{}.{}}}", addr, attr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentMeta {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// 已評估的資源宣告
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    pub addr: ResourceAddr,
    pub attributes: BTreeMap<String, AttrValue>,
    pub depends_on: Vec<ResourceAddr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataDecl {
    pub addr: DataAddr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    pub name: String,
    pub value: String,
    pub description: Option<String>,
}

/// 評估後的期望狀態圖：所有宣告加上拓撲執行順序
#[derive(Debug, Clone)]
pub struct DesiredState {
    pub deployment: DeploymentMeta,
    pub resources: BTreeMap<ResourceAddr, ResourceDecl>,
    pub data_lookups: BTreeMap<DataAddr, DataDecl>,
    pub outputs: Vec<OutputDecl>,
    pub execution_order: Vec<NodeAddr>,
}

impl DesiredState {
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn data_count(&self) -> usize {
        self.data_lookups.len()
    }
}

/// 送交 Provider 的資源：屬性已全部解析完成
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    pub addr: ResourceAddr,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// 單一資源的實際狀態紀錄
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub rtype: String,
    pub name: String,
    /// 宣告的原始屬性（解析前），差異比對以此為準
    pub declared: BTreeMap<String, AttrValue>,
    pub resolved: BTreeMap<String, serde_json::Value>,
    pub computed: BTreeMap<String, serde_json::Value>,
    pub depends_on: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn addr(&self) -> ResourceAddr {
        ResourceAddr::new(self.rtype.clone(), self.name.clone())
    }

    /// 引用解析視圖：宣告屬性與計算屬性的聯集，計算屬性優先
    pub fn attribute_view(&self) -> BTreeMap<String, serde_json::Value> {
        let mut view = self.resolved.clone();
        for (key, value) in &self.computed {
            view.insert(key.clone(), value.clone());
        }
        view
    }
}

/// 記錄的實際狀態檔
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    pub serial: u64,
    pub deployment: String,
    pub updated_at: DateTime<Utc>,
    pub resources: BTreeMap<String, ResourceRecord>,
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl StateFile {
    pub fn empty(deployment: &str) -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            serial: 0,
            deployment: deployment.to_string(),
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn record(&self, addr: &ResourceAddr) -> Option<&ResourceRecord> {
        self.resources.get(&addr.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    Normal,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    NoOp,
}

/// 單一屬性差異，`None` 表示該側不存在
#[derive(Debug, Clone, PartialEq)]
pub struct AttrChange {
    pub attribute: String,
    pub old: Option<AttrValue>,
    pub new: Option<AttrValue>,
}

#[derive(Debug, Clone)]
pub struct PlannedAction {
    pub addr: ResourceAddr,
    pub kind: ActionKind,
    pub changes: Vec<AttrChange>,
}

/// 有序的執行計畫：刪除在前（反向順序），建立/更新依拓撲順序在後
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub actions: Vec<PlannedAction>,
}

impl ExecutionPlan {
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    pub fn has_changes(&self) -> bool {
        self.actions.iter().any(|a| a.kind != ActionKind::NoOp)
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for action in &self.actions {
            match action.kind {
                ActionKind::Create => lines.push(format!("  + {}", action.addr)),
                ActionKind::Delete => lines.push(format!("  - {}", action.addr)),
                ActionKind::NoOp => {}
                ActionKind::Update => {
                    lines.push(format!("  ~ {}", action.addr));
                    for change in &action.changes {
                        let old = change
                            .old
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "(absent)".to_string());
                        let new = change
                            .new
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "(absent)".to_string());
                        lines.push(format!("      {}: {} -> {}", change.attribute, old, new));
                    }
                }
            }
        }
        lines.push(format!(
            "Plan: {} to create, {} to update, {} to delete, {} unchanged",
            self.count(ActionKind::Create),
            self.count(ActionKind::Update),
            self.count(ActionKind::Delete),
            self.count(ActionKind::NoOp),
        ));
        lines.join("\n")
    }
}

/// Apply 結束後的統計與輸出值
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub outputs: BTreeMap<String, serde_json::Value>,
    pub state_serial: u64,
}
