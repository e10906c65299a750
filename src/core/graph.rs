use crate::core::resolver;
use crate::domain::model::{DataAddr, DataDecl, NodeAddr, OutputDecl, ResourceAddr, ResourceDecl};
use crate::utils::error::{IacError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// 依賴圖：節點是資源與資料查詢，邊來自屬性引用與顯式 depends_on。
/// 建圖同時完成引用檢查與拓撲排序，循環在這裡被擋下。
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// node -> 它依賴的節點
    edges: BTreeMap<NodeAddr, BTreeSet<NodeAddr>>,
    order: Vec<NodeAddr>,
}

impl DependencyGraph {
    pub fn build(
        resources: &BTreeMap<ResourceAddr, ResourceDecl>,
        data_lookups: &BTreeMap<DataAddr, DataDecl>,
        outputs: &[OutputDecl],
    ) -> Result<Self> {
        let mut edges: BTreeMap<NodeAddr, BTreeSet<NodeAddr>> = BTreeMap::new();
        for addr in resources.keys() {
            edges.insert(NodeAddr::Resource(addr.clone()), BTreeSet::new());
        }
        for addr in data_lookups.keys() {
            edges.insert(NodeAddr::Data(addr.clone()), BTreeSet::new());
        }

        let node_exists =
            |edges: &BTreeMap<NodeAddr, BTreeSet<NodeAddr>>, node: &NodeAddr| edges.contains_key(node);

        // 引用推導的邊
        for (addr, decl) in resources {
            let owner = addr.to_string();
            let node = NodeAddr::Resource(addr.clone());

            for value in decl.attributes.values() {
                for reference in resolver::find_value_references(&owner, value)? {
                    let target = reference.node();
                    if !node_exists(&edges, &target) {
                        return Err(IacError::UnknownReference {
                            owner: owner.clone(),
                            reference: target.to_string(),
                        });
                    }
                    edges.get_mut(&node).unwrap().insert(target);
                }
            }

            // 顯式排序提示，獨立於引用推導
            for dep in &decl.depends_on {
                let target = NodeAddr::Resource(dep.clone());
                if !node_exists(&edges, &target) {
                    return Err(IacError::UnknownReference {
                        owner: owner.clone(),
                        reference: target.to_string(),
                    });
                }
                edges.get_mut(&node).unwrap().insert(target);
            }
        }

        // 輸出值只做引用檢查，不是圖節點
        for output in outputs {
            let owner = format!("output.{}", output.name);
            for reference in resolver::find_references(&owner, &output.value)? {
                let target = reference.node();
                if !node_exists(&edges, &target) {
                    return Err(IacError::UnknownReference {
                        owner,
                        reference: target.to_string(),
                    });
                }
            }
        }

        let order = topological_order(&edges)?;

        Ok(Self { edges, order })
    }

    pub fn execution_order(&self) -> &[NodeAddr] {
        &self.order
    }

    pub fn destroy_order(&self) -> Vec<NodeAddr> {
        self.order.iter().rev().cloned().collect()
    }

    /// 節點的完整依賴集合（引用推導 + 顯式），記錄到狀態檔供銷毀排序
    pub fn dependencies(&self, node: &NodeAddr) -> Vec<NodeAddr> {
        self.edges
            .get(node)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Kahn 拓撲排序，以 BTreeSet 保證同位階節點的順序穩定
fn topological_order(edges: &BTreeMap<NodeAddr, BTreeSet<NodeAddr>>) -> Result<Vec<NodeAddr>> {
    let mut remaining: BTreeMap<NodeAddr, BTreeSet<NodeAddr>> = edges.clone();
    let mut dependents: BTreeMap<NodeAddr, BTreeSet<NodeAddr>> = BTreeMap::new();
    for (node, deps) in edges {
        for dep in deps {
            dependents
                .entry(dep.clone())
                .or_default()
                .insert(node.clone());
        }
    }

    let mut ready: BTreeSet<NodeAddr> = remaining
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(node, _)| node.clone())
        .collect();

    let mut order = Vec::with_capacity(remaining.len());
    while let Some(node) = ready.iter().next().cloned() {
        ready.remove(&node);
        remaining.remove(&node);
        order.push(node.clone());

        if let Some(deps) = dependents.get(&node) {
            for dependent in deps {
                if let Some(pending) = remaining.get_mut(dependent) {
                    pending.remove(&node);
                    if pending.is_empty() {
                        ready.insert(dependent.clone());
                    }
                }
            }
        }
    }

    if !remaining.is_empty() {
        let cycle_members: Vec<String> = remaining.keys().map(|n| n.to_string()).collect();
        return Err(IacError::DependencyCycle {
            path: cycle_members.join(", "),
        });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::AttrValue;

    fn resource(rtype: &str, name: &str, attrs: &[(&str, &str)], deps: &[&str]) -> ResourceDecl {
        ResourceDecl {
            addr: ResourceAddr::new(rtype, name),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), AttrValue::Str(v.to_string())))
                .collect(),
            depends_on: deps.iter().map(|d| ResourceAddr::parse(d).unwrap()).collect(),
        }
    }

    fn build_graph(
        resources: Vec<ResourceDecl>,
        data: Vec<DataAddr>,
        outputs: Vec<OutputDecl>,
    ) -> Result<DependencyGraph> {
        let resources: BTreeMap<ResourceAddr, ResourceDecl> = resources
            .into_iter()
            .map(|r| (r.addr.clone(), r))
            .collect();
        let data: BTreeMap<DataAddr, DataDecl> = data
            .into_iter()
            .map(|addr| (addr.clone(), DataDecl { addr }))
            .collect();
        DependencyGraph::build(&resources, &data, &outputs)
    }

    fn position(order: &[NodeAddr], rtype: &str, name: &str) -> usize {
        let target = NodeAddr::Resource(ResourceAddr::new(rtype, name));
        order.iter().position(|n| *n == target).unwrap()
    }

    #[test]
    fn test_reference_implied_ordering() {
        let graph = build_graph(
            vec![
                resource(
                    "function",
                    "api_handler",
                    &[("role_arn", "${role.fn_role.arn}")],
                    &[],
                ),
                resource("role", "fn_role", &[("name", "exec")], &[]),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        let order = graph.execution_order();
        assert!(position(order, "role", "fn_role") < position(order, "function", "api_handler"));
    }

    #[test]
    fn test_explicit_depends_on_ordering() {
        let graph = build_graph(
            vec![
                resource("function", "api_handler", &[], &["log_group.fn_logs"]),
                resource("log_group", "fn_logs", &[], &[]),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        let order = graph.execution_order();
        assert!(
            position(order, "log_group", "fn_logs") < position(order, "function", "api_handler")
        );
    }

    #[test]
    fn test_data_lookup_ordered_before_dependents() {
        let graph = build_graph(
            vec![resource(
                "log_group",
                "fn_logs",
                &[("name", "/logs/${data.region.current.name}")],
                &[],
            )],
            vec![DataAddr::new("region", "current")],
            vec![],
        )
        .unwrap();

        let order = graph.execution_order();
        assert_eq!(
            order[0],
            NodeAddr::Data(DataAddr::new("region", "current"))
        );
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let err = build_graph(
            vec![resource(
                "function",
                "api_handler",
                &[("role_arn", "${role.missing.arn}")],
                &[],
            )],
            vec![],
            vec![],
        )
        .unwrap_err();

        assert!(
            matches!(err, IacError::UnknownReference { ref reference, .. } if reference == "role.missing")
        );
    }

    #[test]
    fn test_unknown_depends_on_rejected() {
        let err = build_graph(
            vec![resource("function", "api_handler", &[], &["log_group.gone"])],
            vec![],
            vec![],
        )
        .unwrap_err();

        assert!(
            matches!(err, IacError::UnknownReference { ref reference, .. } if reference == "log_group.gone")
        );
    }

    #[test]
    fn test_unknown_output_reference_rejected() {
        let err = build_graph(
            vec![],
            vec![],
            vec![OutputDecl {
                name: "invoke_url".to_string(),
                value: "${api_deployment.prod.invoke_url}".to_string(),
                description: None,
            }],
        )
        .unwrap_err();

        assert!(
            matches!(err, IacError::UnknownReference { ref owner, .. } if owner == "output.invoke_url")
        );
    }

    #[test]
    fn test_cycle_detected() {
        let err = build_graph(
            vec![
                resource("role", "a", &[("name", "${policy.b.arn}")], &[]),
                resource("policy", "b", &[("name", "${role.a.arn}")], &[]),
            ],
            vec![],
            vec![],
        )
        .unwrap_err();

        match err {
            IacError::DependencyCycle { path } => {
                assert!(path.contains("role.a"));
                assert!(path.contains("policy.b"));
            }
            other => panic!("expected DependencyCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let err = build_graph(
            vec![resource("role", "a", &[("name", "${role.a.arn}")], &[])],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, IacError::DependencyCycle { .. }));
    }

    #[test]
    fn test_independent_nodes_keep_address_order() {
        let graph = build_graph(
            vec![
                resource("role", "zebra", &[], &[]),
                resource("role", "alpha", &[], &[]),
                resource("log_group", "logs", &[], &[]),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        // 無依賴時依位址排序，執行順序可重現
        let order = graph.execution_order();
        assert!(position(order, "log_group", "logs") < position(order, "role", "alpha"));
        assert!(position(order, "role", "alpha") < position(order, "role", "zebra"));
    }

    #[test]
    fn test_destroy_order_is_reverse() {
        let graph = build_graph(
            vec![
                resource(
                    "function",
                    "api_handler",
                    &[("role_arn", "${role.fn_role.arn}")],
                    &[],
                ),
                resource("role", "fn_role", &[], &[]),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        let destroy = graph.destroy_order();
        let forward = graph.execution_order();
        assert_eq!(destroy.len(), forward.len());
        assert_eq!(destroy.first(), forward.last());
    }

    #[test]
    fn test_dependencies_accessor() {
        let graph = build_graph(
            vec![
                resource(
                    "function",
                    "api_handler",
                    &[("role_arn", "${role.fn_role.arn}")],
                    &["log_group.fn_logs"],
                ),
                resource("role", "fn_role", &[], &[]),
                resource("log_group", "fn_logs", &[], &[]),
            ],
            vec![],
            vec![],
        )
        .unwrap();

        let deps =
            graph.dependencies(&NodeAddr::Resource(ResourceAddr::new("function", "api_handler")));
        assert_eq!(deps.len(), 2);
    }
}
