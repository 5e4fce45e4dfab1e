//! Decision vector layout
//!
//! The decision vector holds the predicted state trajectory followed by the
//! actuator trajectory, one contiguous block per quantity:
//!
//! ```text
//! [x; N] [y; N] [psi; N] [v; N] [cte; N] [epsi; N] [delta; N-1] [a; N-1]
//! ```
//!
//! The constraint vector holds one residual per state variable per
//! timestep, in the same block order as the state part of the decision
//! vector.

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of state variables per timestep.
pub const NUM_STATES: usize = 6;

/// Number of actuator variables per timestep.
pub const NUM_ACTUATORS: usize = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Block offsets into the decision vector for a given horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Horizon length N.
    pub n: usize,

    pub x_start: usize,
    pub y_start: usize,
    pub psi_start: usize,
    pub v_start: usize,
    pub cte_start: usize,
    pub epsi_start: usize,
    pub delta_start: usize,
    pub a_start: usize
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Layout {
    /// Compute the layout for a horizon of `n` timesteps.
    pub fn new(n: usize) -> Self {
        let delta_start = NUM_STATES * n;

        Self {
            n,
            x_start: 0,
            y_start: n,
            psi_start: 2 * n,
            v_start: 3 * n,
            cte_start: 4 * n,
            epsi_start: 5 * n,
            delta_start,
            a_start: delta_start + n.saturating_sub(1)
        }
    }

    /// Length of the decision vector, `8N - 2`.
    pub fn n_vars(&self) -> usize {
        NUM_STATES * self.n + NUM_ACTUATORS * self.n.saturating_sub(1)
    }

    /// Length of the constraint vector, `6N`.
    pub fn n_constraints(&self) -> usize {
        NUM_STATES * self.n
    }

    /// Offsets of the state blocks, in state vector order.
    pub fn state_starts(&self) -> [usize; NUM_STATES] {
        [
            self.x_start,
            self.y_start,
            self.psi_start,
            self.v_start,
            self.cte_start,
            self.epsi_start
        ]
    }

    /// Length of the caller output, `2 + 2(N - 1)`.
    pub fn n_outputs(&self) -> usize {
        2 + 2 * self.n.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout() {
        let l = Layout::new(10);
        assert_eq!(l.n_vars(), 78);
        assert_eq!(l.n_constraints(), 60);
        assert_eq!(l.n_outputs(), 20);
        assert_eq!(l.state_starts(), [0, 10, 20, 30, 40, 50]);
        assert_eq!(l.delta_start, 60);
        assert_eq!(l.a_start, 69);
        assert_eq!(l.a_start + l.n - 1, l.n_vars());

        let l = Layout::new(2);
        assert_eq!(l.n_vars(), 14);
        assert_eq!(l.n_constraints(), 12);
        assert_eq!(l.n_outputs(), 4);
        assert_eq!(l.delta_start, 12);
        assert_eq!(l.a_start, 13);
    }

    #[test]
    fn test_blocks_do_not_overlap() {
        for n in 2..20 {
            let l = Layout::new(n);
            let mut used = vec![false; l.n_vars()];

            let blocks = l.state_starts().iter()
                .map(|&s| (s, n))
                .chain(vec![(l.delta_start, n - 1), (l.a_start, n - 1)])
                .collect::<Vec<_>>();

            for (start, len) in blocks {
                for i in start..start + len {
                    assert!(!used[i], "index {} used twice for N = {}", i, n);
                    used[i] = true;
                }
            }

            assert!(used.iter().all(|&u| u));
        }
    }
}
