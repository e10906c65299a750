use crate::core::resolver;
use crate::domain::model::{
    ActionKind, AttrChange, AttrValue, DesiredState, ExecutionPlan, NodeAddr, PlannedAction,
    Reference, ResourceAddr, StateFile,
};
use std::collections::{BTreeMap, BTreeSet};

/// 比對期望狀態與記錄狀態，產生有序執行計畫。
/// 差異以宣告的原始屬性為準：解析後的值含 Provider 回填的資料，
/// 拿來比對會讓每次執行都誤判成變更。
pub fn plan(desired: &DesiredState, state: &StateFile) -> ExecutionPlan {
    let mut actions = Vec::new();

    // 文件中已移除的資源：先刪，依記錄的依賴關係反向排序
    let removed: BTreeSet<ResourceAddr> = state
        .resources
        .values()
        .map(|r| r.addr())
        .filter(|addr| !desired.resources.contains_key(addr))
        .collect();

    for addr in record_destroy_order(state, &removed) {
        actions.push(PlannedAction {
            addr,
            kind: ActionKind::Delete,
            changes: vec![],
        });
    }

    // 其餘依拓撲順序：建立、更新或保持不變
    for node in &desired.execution_order {
        let NodeAddr::Resource(addr) = node else {
            continue;
        };
        let decl = &desired.resources[addr];

        match state.record(addr) {
            None => actions.push(PlannedAction {
                addr: addr.clone(),
                kind: ActionKind::Create,
                changes: vec![],
            }),
            Some(record) => {
                let mut changes = diff_attributes(&record.declared, &decl.attributes);

                let recorded_deps: Vec<String> = record.depends_on.clone();
                let declared_deps: Vec<String> =
                    decl.depends_on.iter().map(|d| d.to_string()).collect();
                if sorted(&recorded_deps) != sorted(&declared_deps) {
                    changes.push(AttrChange {
                        attribute: "depends_on".to_string(),
                        old: Some(AttrValue::List(recorded_deps)),
                        new: Some(AttrValue::List(declared_deps)),
                    });
                }

                let kind = if changes.is_empty() {
                    ActionKind::NoOp
                } else {
                    ActionKind::Update
                };
                actions.push(PlannedAction {
                    addr: addr.clone(),
                    kind,
                    changes,
                });
            }
        }
    }

    ExecutionPlan { actions }
}

/// 銷毀計畫：狀態檔中的所有資源，反向依賴順序刪除
pub fn plan_destroy(state: &StateFile) -> ExecutionPlan {
    let all: BTreeSet<ResourceAddr> = state.resources.values().map(|r| r.addr()).collect();
    let actions = record_destroy_order(state, &all)
        .into_iter()
        .map(|addr| PlannedAction {
            addr,
            kind: ActionKind::Delete,
            changes: vec![],
        })
        .collect();
    ExecutionPlan { actions }
}

fn sorted(items: &[String]) -> Vec<String> {
    let mut v = items.to_vec();
    v.sort();
    v
}

fn diff_attributes(
    old: &BTreeMap<String, AttrValue>,
    new: &BTreeMap<String, AttrValue>,
) -> Vec<AttrChange> {
    let mut changes = Vec::new();
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    for key in keys {
        let old_value = old.get(key);
        let new_value = new.get(key);
        if old_value != new_value {
            changes.push(AttrChange {
                attribute: key.clone(),
                old: old_value.cloned(),
                new: new_value.cloned(),
            });
        }
    }

    changes
}

/// 被刪除的資源已不在文件裡，排序只能靠狀態檔：顯式 depends_on
/// 加上宣告屬性裡的引用邊。先正向 Kahn 再反轉；只看子集合內部的邊。
fn record_destroy_order(state: &StateFile, subset: &BTreeSet<ResourceAddr>) -> Vec<ResourceAddr> {
    let mut remaining: BTreeMap<ResourceAddr, BTreeSet<ResourceAddr>> = BTreeMap::new();
    for addr in subset {
        let deps: BTreeSet<ResourceAddr> = state
            .record(addr)
            .map(|record| record_dependencies(record, subset))
            .unwrap_or_default();
        remaining.insert(addr.clone(), deps);
    }

    let mut forward = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let next: Vec<ResourceAddr> = remaining
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(addr, _)| addr.clone())
            .collect();

        if next.is_empty() {
            // 記錄的狀態理論上無環；保底把剩餘節點照位址順序補上
            forward.extend(remaining.keys().cloned());
            break;
        }

        for addr in next {
            remaining.remove(&addr);
            for deps in remaining.values_mut() {
                deps.remove(&addr);
            }
            forward.push(addr);
        }
    }

    forward.reverse();
    forward
}

fn record_dependencies(
    record: &crate::domain::model::ResourceRecord,
    subset: &BTreeSet<ResourceAddr>,
) -> BTreeSet<ResourceAddr> {
    let owner = record.addr().to_string();
    let mut deps: BTreeSet<ResourceAddr> = record
        .depends_on
        .iter()
        .filter_map(|d| ResourceAddr::parse(d).ok())
        .filter(|d| subset.contains(d))
        .collect();

    for value in record.declared.values() {
        let references = resolver::find_value_references(&owner, value).unwrap_or_default();
        for reference in references {
            if let Reference::Resource { addr, .. } = reference {
                if subset.contains(&addr) {
                    deps.insert(addr);
                }
            }
        }
    }

    deps
}
