//! Walk enumeration and scoring.
//!
//! Every score is produced by a full DFS sweep: from each start cell the
//! walk extends to 8-neighbors, accumulating the decimal value of the
//! digits visited, and marks an oracle bitset per reached value. The
//! basis-pruned variant consults the prefix flags and cuts branches that
//! cannot reach any 4- or 5-length basis member, which keeps the sweep
//! cheap enough to run once per proposal.

use crate::basis::{self, BasisTables, BitSet};
use crate::board::{Board, ADJ_TABLE, COLS, ROWS};
use crate::constants::BASIS_MAX_RANGE;

/// Per-length bitsets of walk values reached by the current sweep.
/// Marks are monotone within one call; `reset` clears between calls.
pub struct RichnessOracle {
    pub bits3: BitSet,
    pub bits4: BitSet,
    pub bits5: BitSet,
}

impl Default for RichnessOracle {
    fn default() -> Self {
        Self {
            bits3: BitSet::new(1_000),
            bits4: BitSet::new(10_000),
            bits5: BitSet::new(100_000),
        }
    }
}

impl RichnessOracle {
    #[inline]
    pub fn mark(&mut self, len: usize, val: usize) {
        match len {
            3 => self.bits3.set(val),
            4 => self.bits4.set(val),
            5 => self.bits5.set(val),
            _ => {}
        }
    }

    pub fn reset(&mut self) {
        self.bits3.clear();
        self.bits4.clear();
        self.bits5.clear();
    }
}

/// Unpruned walk DFS: marks every reached 3/4/5-length value.
pub fn dfs_richness(
    board: &Board,
    r: usize,
    c: usize,
    depth: usize,
    current_val: usize,
    oracle: &mut RichnessOracle,
) {
    let val = board[r][c];
    if val == -1 {
        return;
    }
    let next_val = current_val * 10 + val as usize;
    if depth >= 3 {
        oracle.mark(depth, next_val);
        if depth == 5 {
            return;
        }
    }

    let adj = &ADJ_TABLE[r][c];
    for i in 0..adj.count as usize {
        let (nr, nc) = adj.list[i];
        dfs_richness(board, nr as usize, nc as usize, depth + 1, next_val, oracle);
    }
}

fn dfs_basis_pruned(
    board: &Board,
    tables: &BasisTables,
    r: usize,
    c: usize,
    depth: usize,
    current_val: usize,
    oracle: &mut RichnessOracle,
) {
    let val = board[r][c];
    if val == -1 {
        return;
    }
    let next_val = current_val * 10 + val as usize;

    let flags = tables.node_flags(depth, next_val);
    if flags == 0 {
        return;
    }

    if depth == 4 {
        oracle.mark(4, next_val);
        if flags & 2 == 0 {
            return;
        }
    } else if depth == 5 {
        oracle.mark(5, next_val);
        return;
    }

    let adj = &ADJ_TABLE[r][c];
    for i in 0..adj.count as usize {
        let (nr, nc) = adj.list[i];
        dfs_basis_pruned(board, tables, nr as usize, nc as usize, depth + 1, next_val, oracle);
    }
}

/// Per-cell criticality map produced by the two-pass heatmap sweep.
pub type Heatmap = [[i32; COLS]; ROWS];

/// Reusable scoring scratch owned by one worker. The oracle and the
/// FOUND/REDUNDANT bitsets are large; reusing them keeps the hot loop
/// allocation-free.
pub struct Scorer {
    oracle: RichnessOracle,
    /// Basis values seen at least once / at least twice in the current
    /// heatmap sweep. Flagged values never exceed BASIS_MAX_RANGE because
    /// 5-length members are all below it.
    found: BitSet,
    redundant: BitSet,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            oracle: RichnessOracle::default(),
            found: BitSet::new(BASIS_MAX_RANGE + 1),
            redundant: BitSet::new(BASIS_MAX_RANGE + 1),
        }
    }
}

impl Scorer {
    fn sweep(&mut self, board: &Board) -> &RichnessOracle {
        let tables = basis::tables();
        self.oracle.reset();
        for r in 0..ROWS {
            for c in 0..COLS {
                dfs_basis_pruned(board, tables, r, c, 1, 0, &mut self.oracle);
            }
        }
        &self.oracle
    }

    /// Number of distinct basis members reachable by some walk.
    pub fn basis_count(&mut self, board: &Board) -> i32 {
        let tables = basis::tables();
        let oracle = self.sweep(board);
        (oracle.bits4.and_count(&tables.bits4) + oracle.bits5.and_count(&tables.bits5)) as i32
    }

    /// Twin-weighted float score: `n + w_twin * t + w_double_twin * d`.
    pub fn weighted_score(&mut self, board: &Board, w_twin: f64, w_double_twin: f64) -> f64 {
        let (_, weighted) = self.combined(board, w_twin, w_double_twin);
        weighted
    }

    /// Integer count and weighted score from a single sweep. The SA loop
    /// needs both: the count for win detection, the float for Metropolis.
    pub fn combined(&mut self, board: &Board, w_twin: f64, w_double_twin: f64) -> (i32, f64) {
        let tables = basis::tables();
        let oracle = self.sweep(board);

        let count =
            oracle.bits4.and_count(&tables.bits4) + oracle.bits5.and_count(&tables.bits5);
        let twins =
            oracle.bits4.and_count(&tables.twins4) + oracle.bits5.and_count(&tables.twins5);
        let d_twins = oracle.bits4.and_count(&tables.double_twins4)
            + oracle.bits5.and_count(&tables.double_twins5);

        let weighted =
            count as f64 + w_twin * twins as f64 + w_double_twin * d_twins as f64;
        (count as i32, weighted)
    }

    /// Pass 1 of the heatmap: mark which basis values are found, and which
    /// of those are found along more than one path (redundant).
    fn count_global(&mut self, board: &Board) {
        let tables = basis::tables();
        self.found.clear();
        self.redundant.clear();
        for r in 0..ROWS {
            for c in 0..COLS {
                dfs_count_global(
                    board,
                    tables,
                    r,
                    c,
                    1,
                    0,
                    &mut self.found,
                    &mut self.redundant,
                );
            }
        }
    }

    /// Heatmap of per-cell criticality: cells on walks that realize a
    /// found-and-not-redundant basis member accrue 100, +75 if the member
    /// is a twin, +25 if a double twin. A zero cell carries no unique
    /// member.
    pub fn heatmap(&mut self, board: &Board) -> Heatmap {
        self.count_global(board);
        let tables = basis::tables();
        let mut heatmap = [[0i32; COLS]; ROWS];
        let mut path = [(0usize, 0usize); 5];
        for r in 0..ROWS {
            for c in 0..COLS {
                dfs_heatmap_mapping(
                    board,
                    tables,
                    r,
                    c,
                    1,
                    0,
                    &mut path,
                    &self.found,
                    &self.redundant,
                    &mut heatmap,
                );
            }
        }
        heatmap
    }

    /// Heatmap plus the missing-digit weight vector: for each unfound
    /// basis member, each of its digits bumps that digit's weight.
    pub fn heatmap_and_missing_weights(&mut self, board: &Board) -> (Heatmap, [f64; 10]) {
        self.count_global(board);
        let tables = basis::tables();

        let mut missing = [0.0f64; 10];
        for i in 0..10_000 {
            if tables.bits4.test(i) && !self.found.test(i) {
                let mut val = i;
                for _ in 0..4 {
                    missing[val % 10] += 1.0;
                    val /= 10;
                }
            }
        }
        for i in 0..100_000 {
            if tables.bits5.test(i) && !self.found.test(i) {
                let mut val = i;
                for _ in 0..5 {
                    missing[val % 10] += 1.0;
                    val /= 10;
                }
            }
        }

        let mut heatmap = [[0i32; COLS]; ROWS];
        let mut path = [(0usize, 0usize); 5];
        for r in 0..ROWS {
            for c in 0..COLS {
                dfs_heatmap_mapping(
                    board,
                    tables,
                    r,
                    c,
                    1,
                    0,
                    &mut path,
                    &self.found,
                    &self.redundant,
                    &mut heatmap,
                );
            }
        }
        (heatmap, missing)
    }
}

#[allow(clippy::too_many_arguments)]
fn dfs_count_global(
    board: &Board,
    tables: &BasisTables,
    r: usize,
    c: usize,
    depth: usize,
    current_val: usize,
    found: &mut BitSet,
    redundant: &mut BitSet,
) {
    let val = board[r][c];
    if val == -1 {
        return;
    }
    let next_val = current_val * 10 + val as usize;

    let flags = tables.node_flags(depth, next_val);
    if flags == 0 {
        return;
    }

    if depth == 4 {
        if flags & 1 != 0 {
            if found.test(next_val) {
                redundant.set(next_val);
            } else {
                found.set(next_val);
            }
        }
        if flags & 2 == 0 {
            return;
        }
    } else if depth == 5 {
        if flags & 2 != 0 {
            if found.test(next_val) {
                redundant.set(next_val);
            } else {
                found.set(next_val);
            }
        }
        return;
    }

    let adj = &ADJ_TABLE[r][c];
    for i in 0..adj.count as usize {
        let (nr, nc) = adj.list[i];
        dfs_count_global(
            board,
            tables,
            nr as usize,
            nc as usize,
            depth + 1,
            next_val,
            found,
            redundant,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn dfs_heatmap_mapping(
    board: &Board,
    tables: &BasisTables,
    r: usize,
    c: usize,
    depth: usize,
    current_val: usize,
    path: &mut [(usize, usize); 5],
    found: &BitSet,
    redundant: &BitSet,
    heatmap: &mut Heatmap,
) {
    let val = board[r][c];
    if val == -1 {
        return;
    }
    let next_val = current_val * 10 + val as usize;

    let flags = tables.node_flags(depth, next_val);
    if flags == 0 {
        return;
    }

    path[depth - 1] = (r, c);

    let mut add_score = |num: usize, path: &[(usize, usize); 5], heatmap: &mut Heatmap| {
        if found.test(num) && !redundant.test(num) {
            let (is_twin, is_d_twin) = if num < 10_000 {
                (tables.twins4.test(num), tables.double_twins4.test(num))
            } else {
                (tables.twins5.test(num), tables.double_twins5.test(num))
            };
            let mut score = 100;
            if is_twin {
                score += 75;
            }
            if is_d_twin {
                score += 25;
            }
            for &(pr, pc) in path.iter().take(depth) {
                heatmap[pr][pc] += score;
            }
        }
    };

    if depth == 4 {
        if flags & 1 != 0 {
            add_score(next_val, path, heatmap);
        }
        if flags & 2 == 0 {
            return;
        }
    } else if depth == 5 {
        if flags & 2 != 0 {
            add_score(next_val, path, heatmap);
        }
        return;
    }

    let adj = &ADJ_TABLE[r][c];
    for i in 0..adj.count as usize {
        let (nr, nc) = adj.list[i];
        dfs_heatmap_mapping(
            board,
            tables,
            nr as usize,
            nc as usize,
            depth + 1,
            next_val,
            path,
            found,
            redundant,
            heatmap,
        );
    }
}

/// Hill-climb over global digit relabelings: swap every occurrence of one
/// digit with another, keep the relabeling when the basis count improves,
/// repeat until no pair helps. Cheap polish for finished boards.
pub fn optimize_digit_permutation(board: &mut Board, scorer: &mut Scorer) -> i32 {
    let mut current = scorer.basis_count(board);
    let mut improved = true;
    while improved {
        improved = false;
        for i in 0..9i8 {
            for j in (i + 1)..10i8 {
                swap_digits(board, i, j);
                let score = scorer.basis_count(board);
                if score > current {
                    current = score;
                    improved = true;
                } else {
                    swap_digits(board, i, j);
                }
            }
        }
    }
    current
}

fn swap_digits(board: &mut Board, a: i8, b: i8) {
    for row in board.iter_mut() {
        for val in row.iter_mut() {
            if *val == a {
                *val = b;
            } else if *val == b {
                *val = a;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_board() -> Board {
        let mut board = [[0i8; COLS]; ROWS];
        for r in 0..ROWS {
            for c in 0..COLS {
                board[r][c] = ((r * COLS + c) % 10) as i8;
            }
        }
        board
    }

    #[test]
    fn uniform_boards_score_zero() {
        let mut scorer = Scorer::default();
        assert_eq!(scorer.basis_count(&[[0; COLS]; ROWS]), 0);
        assert_eq!(scorer.basis_count(&[[5; COLS]; ROWS]), 0);
        let (count, weighted) = scorer.combined(&[[5; COLS]; ROWS], 0.75, 0.25);
        assert_eq!(count, 0);
        assert_eq!(weighted, 0.0);
    }

    #[test]
    fn combined_matches_separate_entry_points() {
        let board = identity_board();
        let mut scorer = Scorer::default();
        let (count, weighted) = scorer.combined(&board, 0.75, 0.25);
        assert_eq!(count, scorer.basis_count(&board));
        assert_eq!(weighted, scorer.weighted_score(&board, 0.75, 0.25));
        assert!(count > 0);
        assert!(weighted >= count as f64);
    }

    #[test]
    fn weighted_score_with_zero_weights_is_count() {
        let board = identity_board();
        let mut scorer = Scorer::default();
        let count = scorer.basis_count(&board);
        assert_eq!(scorer.weighted_score(&board, 0.0, 0.0), count as f64);
    }

    #[test]
    fn oracle_is_reset_between_sweeps() {
        let mut scorer = Scorer::default();
        let rich = identity_board();
        assert!(scorer.basis_count(&rich) > 0);
        // A second sweep over a barren board must not inherit marks.
        assert_eq!(scorer.basis_count(&[[7; COLS]; ROWS]), 0);
    }

    #[test]
    fn dfs_richness_marks_all_lengths() {
        let board = identity_board();
        let mut oracle = RichnessOracle::default();
        for r in 0..ROWS {
            for c in 0..COLS {
                dfs_richness(&board, r, c, 1, 0, &mut oracle);
            }
        }
        assert!(oracle.bits3.count() > 0);
        assert!(oracle.bits4.count() > 0);
        assert!(oracle.bits5.count() > 0);
        // Row 0 starts 0,1,2: the walk 2 -> 1 -> 0 spells 210.
        assert!(oracle.bits3.test(210));
    }

    #[test]
    fn holes_terminate_walks() {
        let mut board = identity_board();
        let mut scorer = Scorer::default();
        let before = scorer.basis_count(&board);
        for c in 0..COLS {
            board[3][c] = -1;
        }
        let after = scorer.basis_count(&board);
        assert!(after <= before);
    }

    #[test]
    fn heatmap_is_non_negative_and_zero_on_uniform() {
        let mut scorer = Scorer::default();
        let heat = scorer.heatmap(&[[5; COLS]; ROWS]);
        assert!(heat.iter().flatten().all(|&h| h == 0));

        let heat = scorer.heatmap(&identity_board());
        assert!(heat.iter().flatten().all(|&h| h >= 0));
        assert!(heat.iter().flatten().any(|&h| h > 0));
    }

    #[test]
    fn missing_weights_shrink_when_coverage_grows() {
        let mut scorer = Scorer::default();
        let (_, missing_uniform) = scorer.heatmap_and_missing_weights(&[[5; COLS]; ROWS]);
        let (_, missing_identity) = scorer.heatmap_and_missing_weights(&identity_board());
        let total_uniform: f64 = missing_uniform.iter().sum();
        let total_identity: f64 = missing_identity.iter().sum();
        assert!(total_identity < total_uniform);
        assert!(missing_identity.iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn digit_permutation_polish_never_regresses() {
        let mut board = identity_board();
        let mut scorer = Scorer::default();
        let before = scorer.basis_count(&board);
        let after = optimize_digit_permutation(&mut board, &mut scorer);
        assert!(after >= before);
        assert_eq!(after, scorer.basis_count(&board));
    }
}
