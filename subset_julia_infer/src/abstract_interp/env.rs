//! Slot environment for abstract interpretation.
//!
//! A `VarTable` holds the abstract value of every local slot at one program
//! point. Unassigned slots hold `Bottom`: reading them can never complete.
//!
//! It also tracks which SSA-held `Conditional` values still describe their
//! slot. A `Conditional` produced at `%n` about slot `x` stays live along a
//! path until `x` is assigned; a branch on a stale one sees plain `Bool`.

use std::collections::BTreeSet;

use crate::ir::{SlotId, SsaId};
use crate::lattice::{AbstractValue, TypeLattice};

/// Slot-indexed type environment.
///
/// - `get`/`set`: basic lookup and assignment
/// - `merge_changed`: join another table into this one
/// - `invalidate_conditionals`: drop refinements about a reassigned slot
/// - `record_conditions`/`conditions_hold`: liveness of SSA-held conditionals
///
/// # Example
/// ```
/// use subset_julia_infer::abstract_interp::VarTable;
/// use subset_julia_infer::lattice::AbstractValue;
///
/// let mut env = VarTable::new(2);
/// env.set(0, AbstractValue::int(1));
/// assert_eq!(env.get(0), &AbstractValue::int(1));
/// assert_eq!(env.get(1), &AbstractValue::Bottom);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarTable {
    slots: Vec<AbstractValue>,
    /// `(ssa, slot)` pairs: `%ssa` refines `slot` and `slot` was not assigned since.
    live_conditions: BTreeSet<(SsaId, SlotId)>,
}

impl VarTable {
    /// A table of `nslots` unassigned slots.
    pub fn new(nslots: usize) -> Self {
        Self {
            slots: vec![AbstractValue::Bottom; nslots],
            live_conditions: BTreeSet::new(),
        }
    }

    /// A table whose leading slots hold `args` and the rest are unassigned.
    pub fn with_args(nslots: usize, args: Vec<AbstractValue>) -> Self {
        let mut env = Self::new(nslots.max(args.len()));
        for (slot, arg) in args.into_iter().enumerate() {
            env.slots[slot] = arg;
        }
        env
    }

    pub fn get(&self, slot: SlotId) -> &AbstractValue {
        self.slots.get(slot).unwrap_or(&AbstractValue::Bottom)
    }

    pub fn set(&mut self, slot: SlotId, value: AbstractValue) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = value;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbstractValue> {
        self.slots.iter()
    }

    /// Joins `other` slot by slot. Returns `true` if any slot changed.
    ///
    /// When `limited` is set, a slot that would grow jumps straight to `Top`.
    /// A conditional stays live only if it is live on both sides.
    pub fn merge_changed(
        &mut self,
        other: &VarTable,
        lattice: &TypeLattice<'_>,
        limited: bool,
    ) -> bool {
        let before = self.live_conditions.len();
        self.live_conditions.retain(|cond| other.live_conditions.contains(cond));
        let mut changed = self.live_conditions.len() != before;
        for (mine, theirs) in self.slots.iter_mut().zip(&other.slots) {
            let joined = if limited {
                limited_merge(lattice, mine, theirs)
            } else {
                lattice.merge(mine, theirs)
            };
            if &joined != mine {
                *mine = joined;
                changed = true;
            }
        }
        changed
    }

    /// Whether every slot of `self` subsumes the same slot of `old` and no
    /// conditional came back to life.
    pub fn subsumes(&self, old: &VarTable, lattice: &TypeLattice<'_>) -> bool {
        self.live_conditions.is_subset(&old.live_conditions)
            && self
                .slots
                .iter()
                .zip(&old.slots)
                .all(|(new, old)| lattice.subsumes(new, old))
    }

    /// Widen every `Conditional` that refines `slot`, in slots and in SSA
    /// values alike.
    pub fn invalidate_conditionals(&mut self, slot: SlotId, lattice: &TypeLattice<'_>) {
        for value in &mut self.slots {
            if mentions_slot(value, slot) {
                *value = lattice.widen_conditional(value);
            }
        }
        self.live_conditions.retain(|&(_, s)| s != slot);
    }

    /// Mark the conditionals in `value`, just produced as `%ssa`, live.
    pub fn record_conditions(&mut self, ssa: SsaId, value: &AbstractValue) {
        for leaf in value.leaves() {
            if let AbstractValue::Conditional { slot, .. } = leaf {
                self.live_conditions.insert((ssa, *slot));
            }
        }
    }

    /// Whether every conditional in `value`, read from `%ssa`, still
    /// describes its slot at this point.
    pub fn conditions_hold(&self, ssa: SsaId, value: &AbstractValue) -> bool {
        value.leaves().into_iter().all(|leaf| match leaf {
            AbstractValue::Conditional { slot, .. } => self.live_conditions.contains(&(ssa, *slot)),
            _ => true,
        })
    }

    /// The table with every `Conditional` widened to `Bool`.
    pub fn without_conditionals(&self, lattice: &TypeLattice<'_>) -> VarTable {
        VarTable {
            slots: self
                .slots
                .iter()
                .map(|v| lattice.widen_conditional(v))
                .collect(),
            live_conditions: BTreeSet::new(),
        }
    }
}

fn mentions_slot(v: &AbstractValue, slot: SlotId) -> bool {
    v.leaves()
        .into_iter()
        .any(|leaf| matches!(leaf, AbstractValue::Conditional { slot: s, .. } if *s == slot))
}

/// Merge used by frames that have hit a widening threshold: no further
/// refinement, only `old` or `Top`.
pub fn limited_merge(
    lattice: &TypeLattice<'_>,
    old: &AbstractValue,
    new: &AbstractValue,
) -> AbstractValue {
    if lattice.le(new, old) {
        old.clone()
    } else {
        AbstractValue::Top
    }
}
