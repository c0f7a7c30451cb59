//! Basis set construction.
//!
//! The basis is a greedy antichain over the decimal strings of 1..12999
//! under the span relation: walking the 1-D digit sequence of a member
//! (steps move to an adjacent index, length at most 5) must not reproduce
//! any other member. Scanning ascending, each uncovered number is
//! inserted and any earlier member its span now covers is purged, so the
//! scorer rewards one hit per genuinely distinct number.
//!
//! Built once at process start behind a `OnceLock`; every scoring call
//! reads the same tables.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::constants::BASIS_MAX_RANGE;

/// Fixed-capacity bitset over `u64` words.
#[derive(Clone)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    pub fn new(len: usize) -> Self {
        Self { words: vec![0; (len + 63) / 64], len }
    }

    #[inline]
    pub fn set(&mut self, idx: usize) {
        debug_assert!(idx < self.len);
        self.words[idx >> 6] |= 1u64 << (idx & 63);
    }

    #[inline]
    pub fn test(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        self.words[idx >> 6] & (1u64 << (idx & 63)) != 0
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Popcount of the intersection with `other`.
    pub fn and_count(&self, other: &BitSet) -> u32 {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones())
            .sum()
    }
}

/// Immutable basis tables shared by every worker.
pub struct BasisTables {
    /// 3/4/5-length members by value.
    pub bits3: BitSet,
    pub bits4: BitSet,
    pub bits5: BitSet,
    /// Members containing two equal adjacent digits.
    pub twins4: BitSet,
    pub twins5: BitSet,
    /// Members containing `xxyy` or `xxzyy` with x != y.
    pub double_twins4: BitSet,
    pub double_twins5: BitSet,
    /// Members of any length, sorted ascending.
    pub members: Vec<u32>,
    /// node_flags[depth][value]: bit0 = value prefixes a 4-length member,
    /// bit1 = value prefixes a 5-length member. Zero means the DFS can cut.
    node_flags: [Vec<u8>; 6],
}

impl BasisTables {
    #[inline]
    pub fn node_flags(&self, depth: usize, value: usize) -> u8 {
        self.node_flags[depth][value]
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

static TABLES: OnceLock<BasisTables> = OnceLock::new();

/// Build the basis tables if they do not exist yet and return them.
pub fn tables() -> &'static BasisTables {
    TABLES.get_or_init(build_tables)
}

/// All strings producible by walking the digit sequence of `start`,
/// stepping to an adjacent index each time, up to `max_len` digits.
/// Cells may repeat, exactly as grid walks may revisit cells.
fn span_of(start: &str, max_len: usize) -> HashSet<String> {
    let chars: Vec<char> = start.chars().collect();
    let n = chars.len();
    let mut results = HashSet::new();
    let mut queue: Vec<(String, usize)> = (0..n)
        .map(|i| (chars[i].to_string(), i))
        .collect();

    let mut head = 0;
    while head < queue.len() {
        let (s, idx) = queue[head].clone();
        head += 1;
        results.insert(s.clone());

        for ni in [idx.wrapping_sub(1), idx + 1] {
            if ni < n {
                let mut next = s.clone();
                next.push(chars[ni]);
                if next.len() <= max_len {
                    queue.push((next, ni));
                }
            }
        }
    }
    results
}

fn has_twin(s: &[u8]) -> bool {
    s.windows(2).any(|w| w[0] == w[1])
}

fn has_double_twin(s: &[u8]) -> bool {
    let n = s.len();
    // xxyy
    for i in 0..n.saturating_sub(3) {
        if s[i] == s[i + 1] && s[i + 2] == s[i + 3] && s[i] != s[i + 2] {
            return true;
        }
    }
    // xxzyy
    for i in 0..n.saturating_sub(4) {
        if s[i] == s[i + 1] && s[i + 3] == s[i + 4] && s[i] != s[i + 3] {
            return true;
        }
    }
    false
}

fn build_tables() -> BasisTables {
    let mut covered: HashSet<String> = HashSet::new();
    let mut basis: HashSet<String> = HashSet::new();

    for i in 1..BASIS_MAX_RANGE {
        let s = i.to_string();
        if covered.contains(&s) {
            continue;
        }
        let span = span_of(&s, 5);
        for item in &span {
            covered.insert(item.clone());
        }
        basis.retain(|member| !span.contains(member));
        basis.insert(s);
    }

    let mut bits3 = BitSet::new(1_000);
    let mut bits4 = BitSet::new(10_000);
    let mut bits5 = BitSet::new(100_000);
    let mut twins4 = BitSet::new(10_000);
    let mut twins5 = BitSet::new(100_000);
    let mut double_twins4 = BitSet::new(10_000);
    let mut double_twins5 = BitSet::new(100_000);
    let mut members: Vec<u32> = Vec::new();

    for s in &basis {
        let val: usize = s.parse().expect("basis member is a decimal string");
        let bytes = s.as_bytes();
        let twin = has_twin(bytes);
        let d_twin = has_double_twin(bytes);

        match s.len() {
            3 => bits3.set(val),
            4 => {
                bits4.set(val);
                if twin {
                    twins4.set(val);
                }
                if d_twin {
                    double_twins4.set(val);
                }
            }
            5 => {
                bits5.set(val);
                if twin {
                    twins5.set(val);
                }
                if d_twin {
                    double_twins5.set(val);
                }
            }
            _ => {}
        }
        members.push(val as u32);
    }
    members.sort_unstable();

    // Prefix flags drive the DFS prune: a partial walk value with zero
    // flags cannot extend into any 4- or 5-length member.
    let limits = [0usize, 10, 100, 1_000, 10_000, 100_000];
    let mut node_flags: [Vec<u8>; 6] = Default::default();
    for d in 1..=5 {
        node_flags[d] = vec![0; limits[d]];
    }

    for i in 0..10_000 {
        if bits4.test(i) {
            let mut val = i;
            for d in (1..=4).rev() {
                node_flags[d][val] |= 1;
                val /= 10;
            }
        }
    }
    for i in 0..100_000 {
        if bits5.test(i) {
            let mut val = i;
            for d in (1..=5).rev() {
                node_flags[d][val] |= 2;
                val /= 10;
            }
        }
    }

    let tables = BasisTables {
        bits3,
        bits4,
        bits5,
        twins4,
        twins5,
        double_twins4,
        double_twins5,
        members,
        node_flags,
    };

    let twin4 = tables.twins4.count();
    let twin5 = tables.twins5.count();
    let d_twin4 = tables.double_twins4.count();
    let d_twin5 = tables.double_twins5.count();
    log::info!(
        "basis: total {} | twins {} (4:{} 5:{}) | double twins {} (4:{} 5:{})",
        tables.size(),
        twin4 + twin5,
        twin4,
        twin5,
        d_twin4 + d_twin5,
        d_twin4,
        d_twin5
    );

    tables
}
