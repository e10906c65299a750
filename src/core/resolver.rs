use crate::domain::model::{AttrValue, DataAddr, Reference, ResourceAddr};
use crate::utils::error::{IacError, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// 引用表達式一律以小寫型別開頭；大寫佔位符屬於環境變數替換，
/// 在文件載入階段就處理掉了，掃描時直接略過。
fn placeholder_regex() -> Regex {
    Regex::new(r"\$\{([a-z][^}]*)\}").unwrap()
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 解析 `${...}` 內部的路徑：
/// `type.name.attr` 指向資源，`data.type.name.attr` 指向資料查詢
fn parse_reference(owner: &str, inner: &str) -> Result<Reference> {
    let invalid = || IacError::InvalidReference {
        owner: owner.to_string(),
        expression: format!("${{{}}}", inner),
    };

    let segments: Vec<&str> = inner.split('.').collect();
    if !segments.iter().all(|s| valid_segment(s)) {
        return Err(invalid());
    }

    match segments.as_slice() {
        ["data", dtype, name, attr] => Ok(Reference::Data {
            addr: DataAddr::new(*dtype, *name),
            attr: (*attr).to_string(),
        }),
        [rtype, name, attr] if *rtype != "data" => Ok(Reference::Resource {
            addr: ResourceAddr::new(*rtype, *name),
            attr: (*attr).to_string(),
        }),
        _ => Err(invalid()),
    }
}

/// 掃描字串中的所有引用表達式。格式不對的小寫佔位符直接回報錯誤，
/// 而不是靜默當成純文字流過去。
pub fn find_references(owner: &str, text: &str) -> Result<Vec<Reference>> {
    let re = placeholder_regex();
    let mut references = Vec::new();
    for caps in re.captures_iter(text) {
        references.push(parse_reference(owner, &caps[1])?);
    }
    Ok(references)
}

/// 收集一個屬性值裡的所有引用
pub fn find_value_references(owner: &str, value: &AttrValue) -> Result<Vec<Reference>> {
    match value {
        AttrValue::Str(s) => find_references(owner, s),
        AttrValue::List(items) => {
            let mut refs = Vec::new();
            for item in items {
                refs.extend(find_references(owner, item)?);
            }
            Ok(refs)
        }
        _ => Ok(Vec::new()),
    }
}

/// 解析視圖：已套用資源與已查詢資料的屬性值，依執行順序逐步累積
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    resources: BTreeMap<ResourceAddr, BTreeMap<String, serde_json::Value>>,
    data: BTreeMap<DataAddr, BTreeMap<String, serde_json::Value>>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_resource(
        &mut self,
        addr: ResourceAddr,
        attributes: BTreeMap<String, serde_json::Value>,
    ) {
        self.resources.insert(addr, attributes);
    }

    pub fn insert_data(
        &mut self,
        addr: DataAddr,
        values: BTreeMap<String, serde_json::Value>,
    ) {
        self.data.insert(addr, values);
    }

    pub fn lookup(&self, reference: &Reference) -> Result<serde_json::Value> {
        let (attrs, attr, owner_desc) = match reference {
            Reference::Resource { addr, attr } => (
                self.resources.get(addr).ok_or_else(|| {
                    IacError::UnresolvedReference {
                        expression: reference.expr(),
                        reason: format!("resource '{}' has not been applied yet", addr),
                    }
                })?,
                attr,
                reference.node().to_string(),
            ),
            Reference::Data { addr, attr } => (
                self.data
                    .get(addr)
                    .ok_or_else(|| IacError::UnresolvedReference {
                        expression: reference.expr(),
                        reason: format!("data lookup '{}' has not been resolved yet", addr),
                    })?,
                attr,
                reference.node().to_string(),
            ),
        };

        attrs
            .get(attr)
            .cloned()
            .ok_or_else(|| IacError::UnresolvedReference {
                expression: reference.expr(),
                reason: format!(
                    "attribute '{}' is not declared or exported by '{}'",
                    attr, owner_desc
                ),
            })
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 解析一個字串值。整串剛好是單一引用時沿用目標值的型別，
/// 內嵌在文字中的引用則做字串插值。
pub fn resolve_string(
    owner: &str,
    text: &str,
    ctx: &ResolutionContext,
) -> Result<serde_json::Value> {
    let references = find_references(owner, text)?;
    if references.is_empty() {
        return Ok(serde_json::Value::String(text.to_string()));
    }

    if references.len() == 1 && text.trim() == references[0].expr() {
        return ctx.lookup(&references[0]);
    }

    let mut resolved = text.to_string();
    for reference in &references {
        let value = ctx.lookup(reference)?;
        resolved = resolved.replace(&reference.expr(), &value_to_string(&value));
    }
    Ok(serde_json::Value::String(resolved))
}

pub fn resolve_value(
    owner: &str,
    value: &AttrValue,
    ctx: &ResolutionContext,
) -> Result<serde_json::Value> {
    match value {
        AttrValue::Str(s) => resolve_string(owner, s, ctx),
        AttrValue::List(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_string(owner, item, ctx)?);
            }
            Ok(serde_json::Value::Array(resolved))
        }
        other => Ok(other.to_json()),
    }
}
