//! Per-frame statement worklist.
//!
//! Statements are popped lowest index first so that straight-line code is
//! processed in program order and loop bodies settle before their exits.

/// Set of pending statement indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StmtWorklist {
    pending: Vec<bool>,
    /// No pending index is below this.
    lowest: usize,
    count: usize,
}

impl StmtWorklist {
    pub fn new(len: usize) -> Self {
        Self {
            pending: vec![false; len],
            lowest: len,
            count: 0,
        }
    }

    /// Returns `true` if `pc` was not already pending.
    pub fn push(&mut self, pc: usize) -> bool {
        match self.pending.get_mut(pc) {
            Some(slot) if !*slot => {
                *slot = true;
                self.count += 1;
                self.lowest = self.lowest.min(pc);
                true
            }
            _ => false,
        }
    }

    pub fn pop(&mut self) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let pc = (self.lowest..self.pending.len()).find(|&pc| self.pending[pc])?;
        self.pending[pc] = false;
        self.count -= 1;
        self.lowest = pc + 1;
        Some(pc)
    }

    pub fn contains(&self, pc: usize) -> bool {
        self.pending.get(pc).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_lowest_first() {
        let mut wl = StmtWorklist::new(8);
        assert!(wl.push(5));
        assert!(wl.push(2));
        assert!(!wl.push(5));
        assert!(!wl.push(20));
        assert_eq!(wl.len(), 2);
        assert_eq!(wl.pop(), Some(2));
        wl.push(1);
        assert_eq!(wl.pop(), Some(1));
        assert_eq!(wl.pop(), Some(5));
        assert_eq!(wl.pop(), None);
        assert!(wl.is_empty());
    }
}
