/// A single trellis node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Best cumulative score of any path arriving at this node
    pub score: f64,
    /// State at the previous position on that best path
    pub pointer: Option<u32>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            score: f64::NEG_INFINITY,
            pointer: None,
        }
    }
}

/// Dynamic-programming table for Viterbi decoding
///
/// This is a `[T][L]` table whose element `[t][s]` holds the best cumulative
/// score of a path ending in state #s at position #t together with a
/// backpointer to the state at #t-1.
#[derive(Debug, Clone)]
pub struct Trellis {
    /// The number of states per column
    num_states: usize,
    /// The number of columns
    len: usize,
    cells: Vec<Cell>,
}

impl Trellis {
    pub fn new(num_states: usize) -> Self {
        Self {
            num_states,
            len: 0,
            cells: Vec::new(),
        }
    }

    /// Create a trellis with room for `capacity` columns
    pub fn with_capacity(num_states: usize, capacity: usize) -> Self {
        Self {
            num_states,
            len: 0,
            cells: Vec::with_capacity(num_states * capacity),
        }
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a column; it must hold exactly one cell per state.
    pub fn push(&mut self, column: &[Cell]) {
        assert_eq!(column.len(), self.num_states, "column size mismatch");
        self.cells.extend_from_slice(column);
        self.len += 1;
    }

    /// Column `t`
    pub fn column(&self, t: usize) -> &[Cell] {
        let start = t * self.num_states;
        &self.cells[start..start + self.num_states]
    }

    pub fn cell(&self, t: usize, state: u32) -> Cell {
        self.column(t)[state as usize]
    }

    /// The last `depth` states of the best path ending in `state` at
    /// position `t`, in forward order
    ///
    /// Fewer states are returned when the path is shorter than `depth`.
    pub fn history(&self, t: usize, state: u32, depth: usize) -> Vec<u32> {
        let mut states = Vec::with_capacity(depth);
        let mut current = Some(state);
        let mut time = t + 1;
        while states.len() < depth && time > 0 {
            let Some(s) = current else { break };
            time -= 1;
            states.push(s);
            current = self.cell(time, s).pointer;
        }
        states.reverse();
        states
    }

    /// Follow backpointers from `state` in the last column to the first
    ///
    /// Returns one state per column, in forward order.
    pub fn backtrace(&self, state: u32) -> Vec<u32> {
        if self.is_empty() {
            return Vec::new();
        }
        self.history(self.len - 1, state, self.len)
    }

    /// Best state in the last column, preferring the lowest state on ties
    pub fn best_last(&self) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        let mut best: Option<(u32, f64)> = None;
        for (s, cell) in self.column(self.len - 1).iter().enumerate() {
            match best {
                Some((_, score)) if score >= cell.score => {}
                _ => best = Some((s as u32, cell.score)),
            }
        }
        best.map(|(s, _)| s)
    }

    /// Best final state and the path leading to it
    pub fn decode(&self) -> Vec<u32> {
        self.best_last()
            .map(|state| self.backtrace(state))
            .unwrap_or_default()
    }
}
