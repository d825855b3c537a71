//! Recursion cycle detection between in-progress frames.
//!
//! Cycles are discovered lazily: a call that resolves to a specialization
//! already being inferred further up the call chain turns every frame on
//! the chain between the two into one cycle. The outermost frame becomes
//! the cycle root and drives all members to a joint fixpoint.

use crate::abstract_interp::FrameArena;
use crate::method_table::MethodId;

use super::call_graph::{push_unique, FrameId, SpecKey};

/// The root frame of the cycle `id` belongs to, or `id` itself.
pub fn cycle_root(arena: &FrameArena<'_>, id: FrameId) -> FrameId {
    arena[id].cycle_root.unwrap_or(id)
}

/// An in-progress frame for `key` reachable from `from` through parent
/// links or the cycles of its ancestors.
///
/// # Arguments
///
/// * `arena` - The frames of the current request
/// * `from` - The calling frame
/// * `key` - The specialization being requested
pub fn find_in_progress(arena: &FrameArena<'_>, from: FrameId, key: &SpecKey) -> Option<FrameId> {
    for id in arena.ancestors(from) {
        let frame = &arena[id];
        if frame.in_progress() && &frame.key == key {
            return Some(id);
        }
        let root = cycle_root(arena, id);
        for &member in std::iter::once(&root).chain(arena[root].callers_in_cycle.iter()) {
            let m = &arena[member];
            if m.in_progress() && &m.key == key {
                return Some(member);
            }
        }
    }
    None
}

/// The nearest in-progress ancestor (or `from` itself) inferring another
/// specialization of `method`.
pub fn find_same_method_ancestor(
    arena: &FrameArena<'_>,
    from: FrameId,
    method: MethodId,
) -> Option<FrameId> {
    arena
        .ancestors(from)
        .into_iter()
        .find(|&id| arena[id].in_progress() && arena[id].key.method == method)
}

/// Merge every frame on the parent chain from `from` up to `target` into one
/// cycle and return its root.
///
/// The root is the root of `target`'s cycle, or `target` itself. The walk
/// stops early at the first ancestor already in that cycle, since the rest
/// of the chain above it is a member too. A frame on the chain that was the
/// root of its own cycle hands its members over.
pub fn merge_cycle(arena: &mut FrameArena<'_>, from: FrameId, target: FrameId) -> FrameId {
    let root = cycle_root(arena, target);
    let mut chain = Vec::new();
    for id in arena.ancestors(from) {
        if id == target || cycle_root(arena, id) == root {
            break;
        }
        chain.push(id);
    }
    for id in chain {
        if id == root {
            continue;
        }
        let inherited = std::mem::take(&mut arena[id].callers_in_cycle);
        for member in std::iter::once(id).chain(inherited) {
            if member == root {
                continue;
            }
            arena[member].cycle_root = Some(root);
            push_unique(&mut arena[root].callers_in_cycle, member);
        }
    }
    root
}

/// The root followed by every member of its cycle.
pub fn cycle_members(arena: &FrameArena<'_>, root: FrameId) -> Vec<FrameId> {
    std::iter::once(root)
        .chain(arena[root].callers_in_cycle.iter().copied())
        .collect()
}
