//! Inference frames.
//!
//! A frame is the abstract-interpretation state of one specialization. All
//! frames of a request live in a `FrameArena` and refer to each other by
//! `FrameId`.

use std::ops::{Index, IndexMut};

use crate::config::InferenceConfig;
use crate::ipo::{Backedge, FrameId, SpecKey, WorldRange};
use crate::ir::CodeInfo;
use crate::lattice::AbstractValue;

use super::env::VarTable;
use super::handlers::HandlerMap;
use super::worklist::StmtWorklist;

#[derive(Debug)]
pub struct Frame<'a> {
    pub key: SpecKey,
    pub code: &'a CodeInfo,
    /// State on entry to each statement; `None` until reached.
    pub states: Vec<Option<VarTable>>,
    pub worklist: StmtWorklist,
    pub ssa_types: Vec<AbstractValue>,
    pub ssa_uses: Vec<Vec<usize>>,
    pub handlers: HandlerMap,
    pub visits: Vec<u32>,
    /// Join of every value returned so far.
    pub bestguess: AbstractValue,
    pub valid: WorldRange,
    pub limited: bool,
    pub inferred: bool,
    /// Whether the finished result may be written to the global cache.
    pub cached: bool,
    /// Whether the finished result was written to the global cache.
    pub stored: bool,
    pub optimize: bool,
    /// Specializations this frame's result depends on.
    pub edges: Vec<SpecKey>,
    /// Call statements to re-run when `bestguess` changes.
    pub backedges: Vec<Backedge>,
    pub parent: Option<FrameId>,
    /// Root of the recursion cycle this frame was merged into.
    pub cycle_root: Option<FrameId>,
    /// Members of the cycle rooted at this frame.
    pub callers_in_cycle: Vec<FrameId>,
    pub depth: usize,
}

impl<'a> Frame<'a> {
    pub fn new(
        key: SpecKey,
        code: &'a CodeInfo,
        entry: VarTable,
        valid: WorldRange,
        parent: Option<FrameId>,
        depth: usize,
        config: &InferenceConfig,
    ) -> Self {
        let n = code.stmts.len();
        let mut states = vec![None; n];
        let mut worklist = StmtWorklist::new(n);
        if n > 0 {
            states[0] = Some(entry);
            worklist.push(0);
        }
        Self {
            key,
            code,
            states,
            worklist,
            ssa_types: vec![AbstractValue::Bottom; n],
            ssa_uses: code.ssa_uses(),
            handlers: HandlerMap::compute(code),
            visits: vec![0; n],
            bestguess: AbstractValue::Bottom,
            valid,
            limited: false,
            inferred: false,
            cached: config.cached,
            stored: false,
            optimize: config.optimize,
            edges: Vec::new(),
            backedges: Vec::new(),
            parent,
            cycle_root: None,
            callers_in_cycle: Vec::new(),
            depth,
        }
    }

    pub fn name(&self) -> &str {
        &self.code.name
    }

    pub fn in_progress(&self) -> bool {
        !self.inferred
    }

    pub fn narrow_valid(&mut self, other: &WorldRange) {
        self.valid = self.valid.intersect(other);
    }
}

/// Owner of every frame created by one request.
#[derive(Debug, Default)]
pub struct FrameArena<'a> {
    frames: Vec<Frame<'a>>,
}

impl<'a> FrameArena<'a> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: Frame<'a>) -> FrameId {
        self.frames.push(frame);
        FrameId(self.frames.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `id` and its ancestors, innermost first.
    pub fn ancestors(&self, id: FrameId) -> Vec<FrameId> {
        let mut out = vec![id];
        let mut cur = self[id].parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self[p].parent;
        }
        out
    }
}

impl<'a> Index<FrameId> for FrameArena<'a> {
    type Output = Frame<'a>;

    fn index(&self, id: FrameId) -> &Frame<'a> {
        &self.frames[id.0]
    }
}

impl<'a> IndexMut<FrameId> for FrameArena<'a> {
    fn index_mut(&mut self, id: FrameId) -> &mut Frame<'a> {
        &mut self.frames[id.0]
    }
}
