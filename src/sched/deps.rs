/// One block in a batch, with the variable names it reads and writes.
/// `index` is source order and decides dependency direction.
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub id: String,
    pub language: String,
    pub code: String,
    pub reads: Vec<String>,
    pub writes: Vec<String>,
    pub index: usize,
}

/// Blocks that may run concurrently. Groups execute strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    /// Positions into the batch slice, in source order.
    pub members: Vec<usize>,
}

/// True when `later` must wait for `earlier`: read-after-write,
/// write-after-write, or write-after-read on any shared name.
pub fn has_dependency(earlier: &BlockSpec, later: &BlockSpec) -> bool {
    let raw = later.reads.iter().any(|name| earlier.writes.contains(name));
    let waw = later.writes.iter().any(|name| earlier.writes.contains(name));
    let war = later.writes.iter().any(|name| earlier.reads.contains(name));
    raw || waw || war
}

/// Greedy level partition: each block lands one level past the deepest
/// earlier block it depends on, and blocks sharing a level form a group.
pub fn build_groups(blocks: &[BlockSpec]) -> Vec<DependencyGroup> {
    let mut levels = vec![0usize; blocks.len()];
    for i in 0..blocks.len() {
        for j in 0..i {
            if has_dependency(&blocks[j], &blocks[i]) {
                levels[i] = levels[i].max(levels[j] + 1);
            }
        }
    }

    let depth = levels.iter().copied().max().map_or(0, |d| d + 1);
    let mut groups = vec![DependencyGroup { members: Vec::new() }; depth];
    for (i, level) in levels.iter().enumerate() {
        groups[*level].members.push(i);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(index: usize, reads: &[&str], writes: &[&str]) -> BlockSpec {
        BlockSpec {
            id: format!("blk-{index}"),
            language: "fake".to_string(),
            code: String::new(),
            reads: reads.iter().map(|s| s.to_string()).collect(),
            writes: writes.iter().map(|s| s.to_string()).collect(),
            index,
        }
    }

    #[test]
    fn test_read_after_write_is_a_dependency() {
        let a = block(0, &[], &["x"]);
        let b = block(1, &["x"], &["y"]);
        assert!(has_dependency(&a, &b));
    }

    #[test]
    fn test_write_after_write_is_a_dependency() {
        let a = block(0, &[], &["x"]);
        let b = block(1, &[], &["x"]);
        assert!(has_dependency(&a, &b));
    }

    #[test]
    fn test_write_after_read_is_a_dependency() {
        let a = block(0, &["x"], &[]);
        let b = block(1, &[], &["x"]);
        assert!(has_dependency(&a, &b));
    }

    #[test]
    fn test_disjoint_blocks_are_independent() {
        let a = block(0, &["a"], &["x"]);
        let b = block(1, &["b"], &["y"]);
        assert!(!has_dependency(&a, &b));
    }

    #[test]
    fn test_partition_keeps_reader_after_writer() {
        // A writes x, B reads x, C is independent.
        let blocks = vec![
            block(0, &[], &["x"]),
            block(1, &["x"], &["y"]),
            block(2, &[], &["z"]),
        ];

        let groups = build_groups(&blocks);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![0, 2]);
        assert_eq!(groups[1].members, vec![1]);
    }

    #[test]
    fn test_chain_produces_one_group_per_block() {
        let blocks = vec![
            block(0, &[], &["a"]),
            block(1, &["a"], &["b"]),
            block(2, &["b"], &["c"]),
        ];
        let groups = build_groups(&blocks);
        assert_eq!(groups.len(), 3);
        for (level, group) in groups.iter().enumerate() {
            assert_eq!(group.members, vec![level]);
        }
    }

    #[test]
    fn test_empty_batch_has_no_groups() {
        assert!(build_groups(&[]).is_empty());
    }
}
