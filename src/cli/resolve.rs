//! `resolve` command: look up a source location in a scene dump.
//!
//! Without `--node`, lists every node rendered from the call site. With it,
//! prints the record the resolver settles on for that node.

use std::fs;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};

use super::ResolveArgs;
use crate::debug;
use crate::resolve::{Filter, find_nodes, resolve_element_meta};
use crate::scene::{NodeId, SceneTree};

pub fn run_resolve(args: &ResolveArgs) -> Result<()> {
    let content = fs::read_to_string(&args.scene)
        .with_context(|| format!("failed to read {}", args.scene.display()))?;
    let tree = SceneTree::from_json(&content)
        .with_context(|| format!("{} is not a scene dump", args.scene.display()))?;
    debug!("resolve"; "loaded {} node(s) from {}", tree.len(), args.scene.display());

    let output = resolve(&tree, args)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn resolve(tree: &SceneTree, args: &ResolveArgs) -> Result<Value> {
    let filter = Filter::exact(args.path.as_str(), args.line, args.column);

    if let Some(raw) = args.node {
        let node = NodeId::from(raw);
        if !tree.contains(node) {
            bail!("node {} is not in the scene", raw);
        }
        let meta = resolve_element_meta(tree, node, &filter);
        return Ok(json!({ "node": node, "meta": meta }));
    }

    let matches: Vec<Value> = find_nodes(tree, tree.root(), &filter, args.include_deleted)
        .into_iter()
        .map(|id| {
            json!({
                "node": id,
                "name": tree.get(id).map(|n| n.name.as_str()),
                "deleted": tree.is_inert(id),
            })
        })
        .collect();
    Ok(json!({ "matches": matches }))
}
