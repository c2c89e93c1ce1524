//! Removal of definitions repeated by textual includes, and forward
//! declarations for functions called before their definition.

use crate::context::{Patch, SignatureKey, StageUnit, TranspileContext};
use crate::error::TranspileError;
use crate::syntax::{self, Item, ItemKind, Region, Signature};
use crate::token::{self, Token};
use rustc_hash::{FxHashMap, FxHashSet};

fn key(signature: &Signature, item: &Item) -> SignatureKey {
    SignatureKey {
        name: signature.name.clone(),
        params: signature.param_types(),
        region: item.region.clone(),
    }
}

/// Every user function called from within each item, by item index.
fn calls_by_item(tokens: &[Token], items: &[Item]) -> Vec<FxHashSet<String>> {
    items
        .iter()
        .map(|item| {
            item.range
                .clone()
                .filter(|&idx| syntax::is_call(tokens, idx) && syntax::is_reference(tokens, idx))
                .filter(|&idx| match &item.kind {
                    ItemKind::Function(signature, _) | ItemKind::Prototype(signature) => {
                        idx != signature.name_idx
                    }
                    _ => true,
                })
                .map(|idx| tokens[idx].text.clone())
                .collect()
        })
        .collect()
}

/// The header of a function definition as a prototype, `vec4 f(vec2 uv);`.
fn prototype(tokens: &[Token], item: &Item, signature: &Signature, line: u32) -> Vec<Token> {
    let mut out: Vec<Token> = tokens[item.range.start..signature.close + 1].to_vec();
    out.extend(token::synthesize(";\n", line));
    out
}

pub(crate) fn deduplicate(
    ctx: &mut TranspileContext,
    unit: &mut StageUnit,
) -> Result<(), TranspileError> {
    ctx.begin_stage();
    let items = unit.items()?;
    let calls = calls_by_item(&unit.tokens, &items);
    let tokens = &unit.tokens;

    let mut patch = Patch::default();
    let mut removed = vec![false; items.len()];
    let mut prototypes = FxHashSet::default();
    let mut structs: FxHashSet<(String, Region)> = FxHashSet::default();
    let mut globals: FxHashSet<(String, Region)> = FxHashSet::default();

    for (idx, item) in items.iter().enumerate() {
        match &item.kind {
            ItemKind::Function(signature, _) => {
                let Some(first) = ctx.define(key(signature, item), idx) else {
                    continue;
                };
                removed[idx] = true;
                let relied_on = calls[first + 1..idx]
                    .iter()
                    .any(|called| called.contains(&signature.name));
                let line = tokens[item.range.start].line;
                if relied_on {
                    let mut declaration = prototype(tokens, item, signature, line);
                    // the removed range keeps its own line break
                    declaration.pop();
                    patch.replace(item.range.clone(), declaration);
                } else {
                    patch.remove(item.line_range(tokens));
                }
                tracing::trace!(
                    stage = %unit.stage,
                    function = %signature.name,
                    line,
                    relied_on,
                    "dropped repeated function definition"
                );
            }
            ItemKind::Prototype(signature) => {
                if !prototypes.insert(key(signature, item)) {
                    removed[idx] = true;
                    patch.remove(item.line_range(tokens));
                }
            }
            ItemKind::Struct(name) if !name.is_empty() => {
                if !structs.insert((name.clone(), item.region.clone())) {
                    removed[idx] = true;
                    patch.remove(item.line_range(tokens));
                    tracing::trace!(stage = %unit.stage, name = %name, "dropped repeated struct");
                }
            }
            ItemKind::Declaration => {
                let identity = match syntax::declaration(tokens, item) {
                    Some(declaration) => format!("{} {}", declaration.ty, declaration.name),
                    None => syntax::normalized(tokens, item.range.clone()),
                };
                if !globals.insert((identity, item.region.clone())) {
                    removed[idx] = true;
                    patch.remove(item.line_range(tokens));
                    tracing::trace!(
                        stage = %unit.stage,
                        line = tokens[item.range.start].line,
                        "dropped repeated global"
                    );
                }
            }
            _ => {}
        }
    }

    forward_declare(unit, &items, &calls, &removed, &mut patch);
    unit.apply(patch);
    Ok(())
}

/// Insert prototypes ahead of the first caller of every function that is
/// defined after it is called.
fn forward_declare(
    unit: &StageUnit,
    items: &[Item],
    calls: &[FxHashSet<String>],
    removed: &[bool],
    patch: &mut Patch,
) {
    let tokens = &unit.tokens;
    let live = |idx: &usize| !removed[*idx];

    // the first item declaring each signature, by name and parameter types
    let mut declared: FxHashMap<(String, Vec<String>), usize> = FxHashMap::default();
    let mut struct_at: FxHashMap<&str, usize> = FxHashMap::default();
    for (idx, item) in items.iter().enumerate().filter(|(idx, _)| live(idx)) {
        match &item.kind {
            ItemKind::Function(signature, _) | ItemKind::Prototype(signature) => {
                declared
                    .entry((signature.name.clone(), signature.param_types()))
                    .or_insert(idx);
            }
            ItemKind::Struct(name) => {
                struct_at.entry(name.as_str()).or_insert(idx);
            }
            _ => {}
        }
    }

    for (idx, item) in items.iter().enumerate().filter(|(idx, _)| live(idx)) {
        let ItemKind::Function(signature, _) = &item.kind else {
            continue;
        };
        let Some(caller) = (0..idx)
            .filter(live)
            .find(|&c| items[c].is_function() && calls[c].contains(&signature.name))
        else {
            continue;
        };
        let first = declared.get(&(signature.name.clone(), signature.param_types()));
        if first.is_some_and(|&first| first < caller) {
            continue;
        }

        if !item.region.is_empty() && item.region != items[caller].region {
            tracing::trace!(
                stage = %unit.stage,
                function = %signature.name,
                "not declaring a function ahead of a caller in another conditional block"
            );
            continue;
        }
        let struct_later = std::iter::once(&signature.return_type)
            .chain(signature.params.iter().map(|p| &p.ty))
            .map(|ty| ty.split('[').next().unwrap_or_default())
            .any(|ty| struct_at.get(ty).is_some_and(|&at| at > caller));
        if struct_later {
            continue;
        }

        let line = tokens[items[caller].range.start].line;
        patch.insert(
            items[caller].range.start,
            prototype(tokens, item, signature, line),
        );
        tracing::trace!(
            stage = %unit.stage,
            function = %signature.name,
            line,
            "declared function ahead of its first caller"
        );
    }
}
