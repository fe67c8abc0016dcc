//! # Definition Resolver
//!
//! Orders the record definitions of a schema's `$defs` so that each one is
//! synthesized after every record definition it references.
//!
//! A definition is a record definition when it declares `properties`. A
//! record A depends on a record B when a `$ref` to B appears anywhere under
//! A's properties, looking through `anyOf`, `items`, `additionalProperties`
//! and nested inline `properties`. References to anything else are left for
//! the synthesizer to resolve or reject.
//!
//! Ordering is Kahn's algorithm over the dependency graph. Among the
//! definitions that are ready at any step, the one declared first wins, so
//! the output is a deterministic function of the input. When the algorithm
//! stalls, the remaining definitions contain at least one cycle; one such
//! cycle is extracted and reported.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::node::DEFS_PREFIX;
use crate::synthesizer::BuildOptions;

/// Order the record definitions in `defs` with default options.
pub fn resolve_definitions(defs: &Map<String, Value>) -> Result<Vec<String>, SchemaError> {
    resolve_definitions_with(defs, &BuildOptions::default())
}

/// Order the record definitions in `defs`.
///
/// Returns definition names (not pointers). Each record definition appears
/// exactly once; definitions without `properties` do not appear at all.
pub fn resolve_definitions_with(
    defs: &Map<String, Value>,
    options: &BuildOptions,
) -> Result<Vec<String>, SchemaError> {
    let names: Vec<&str> = defs
        .iter()
        .filter(|(_, def)| is_record_definition(def))
        .map(|(name, _)| name.as_str())
        .collect();
    let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    // deps[i]: definitions that i references.
    let mut deps: Vec<BTreeSet<usize>> = Vec::with_capacity(names.len());
    for name in &names {
        let mut found = BTreeSet::new();
        if let Some(Value::Object(props)) = defs.get(*name).and_then(|d| d.get("properties")) {
            for prop in props.values() {
                collect_refs(prop, &index, &mut found, 1, options.max_depth)?;
            }
        }
        deps.push(found);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for (i, ds) in deps.iter().enumerate() {
        for &d in ds {
            dependents[d].push(i);
        }
    }

    let mut pending: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..names.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(names.len());

    while let Some(next) = ready.pop_first() {
        order.push(names[next].to_string());
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < names.len() {
        let members = find_cycle(&pending, &deps)
            .into_iter()
            .map(|i| names[i].to_string())
            .collect();
        return Err(SchemaError::CircularDependency { members });
    }
    Ok(order)
}

pub(crate) fn is_record_definition(def: &Value) -> bool {
    def.get("properties").is_some()
}

/// Record every reference under `node` that names a record definition.
fn collect_refs(
    node: &Value,
    index: &HashMap<&str, usize>,
    found: &mut BTreeSet<usize>,
    depth: usize,
    max_depth: usize,
) -> Result<(), SchemaError> {
    if depth > max_depth {
        return Err(SchemaError::DepthLimitExceeded { limit: max_depth });
    }
    let Value::Object(map) = node else {
        return Ok(());
    };

    if let Some(target) = map
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix(DEFS_PREFIX))
    {
        if let Some(&i) = index.get(target) {
            found.insert(i);
        }
    }
    if let Some(Value::Array(members)) = map.get("anyOf") {
        for member in members {
            collect_refs(member, index, found, depth + 1, max_depth)?;
        }
    }
    for key in ["items", "additionalProperties"] {
        if let Some(child) = map.get(key) {
            collect_refs(child, index, found, depth + 1, max_depth)?;
        }
    }
    if let Some(Value::Object(props)) = map.get("properties") {
        for prop in props.values() {
            collect_refs(prop, index, found, depth + 1, max_depth)?;
        }
    }
    Ok(())
}

/// Walk unresolved dependencies from the first stalled definition until a
/// node repeats. Every stalled node has a stalled dependency, so the walk
/// always closes a loop.
fn find_cycle(pending: &[usize], deps: &[BTreeSet<usize>]) -> Vec<usize> {
    let stalled = |i: &usize| pending[*i] > 0;
    let Some(start) = (0..pending.len()).find(stalled) else {
        return Vec::new();
    };

    let mut walk = vec![start];
    let mut current = start;
    loop {
        let Some(next) = deps[current].iter().copied().find(stalled) else {
            return walk;
        };
        if let Some(pos) = walk.iter().position(|&n| n == next) {
            return walk.split_off(pos);
        }
        walk.push(next);
        current = next;
    }
}
