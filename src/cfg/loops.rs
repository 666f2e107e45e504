//! Natural loop detection.
//!
//! A back edge is an edge `tail -> header` where the header dominates the
//! tail. Each back edge yields one [`LoopInfo`], attached to both the header
//! and the tail block. Loop records are invalidated and recomputed whenever
//! the block graph is edited; the repair fixpoint relies on that.

use crate::{
    cfg::{dominators, BlockId},
    ir::MethodBody,
    Result,
};

/// A natural loop: one back edge plus cached structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    /// The loop header (target of the back edge, dominates the tail).
    pub header: BlockId,
    /// The back-edge source.
    pub tail: BlockId,
    /// Blocks in the loop body, header included.
    pub blocks: Vec<BlockId>,
    /// Edges leaving the loop: `(source inside, target outside)`.
    pub exit_edges: Vec<(BlockId, BlockId)>,
}

/// Detects all natural loops and records them on the method.
///
/// Requires dominators to be current; call [`dominators::compute`] first.
///
/// # Errors
///
/// Propagates consistency errors from the loop body walk.
pub fn detect(body: &mut MethodBody) -> Result<()> {
    body.clear_loops();

    let mut back_edges = Vec::new();
    for id in body.block_ids().collect::<Vec<_>>() {
        for succ in body.block(id).successors().collect::<Vec<_>>() {
            if dominators::dominates(body, succ, id) {
                back_edges.push((id, succ));
            }
        }
    }

    for (tail, header) in back_edges {
        let blocks = loop_body(body, header, tail);
        let exit_edges = exit_edges(body, &blocks);
        body.add_loop(LoopInfo {
            header,
            tail,
            blocks,
            exit_edges,
        });
    }
    Ok(())
}

/// Collects the loop body for a back edge: the header plus every block that
/// reaches the tail without passing through the header.
fn loop_body(body: &MethodBody, header: BlockId, tail: BlockId) -> Vec<BlockId> {
    let mut in_loop = vec![false; body.block_count()];
    in_loop[header.index()] = true;
    let mut worklist = vec![tail];
    while let Some(block) = worklist.pop() {
        if in_loop[block.index()] {
            continue;
        }
        in_loop[block.index()] = true;
        for &pred in &body.block(block).preds {
            if !in_loop[pred.index()] {
                worklist.push(pred);
            }
        }
    }
    body.block_ids().filter(|b| in_loop[b.index()]).collect()
}

/// Collects edges from inside the loop body to blocks outside it.
fn exit_edges(body: &MethodBody, blocks: &[BlockId]) -> Vec<(BlockId, BlockId)> {
    let mut exits = Vec::new();
    for &block in blocks {
        for succ in body.block(block).successors() {
            if !blocks.contains(&succ) {
                exits.push((block, succ));
            }
        }
    }
    exits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{BlockFlags, EdgeKind};

    fn graph(n: usize, edges: &[(u32, u32)]) -> MethodBody {
        let mut body = MethodBody::new();
        let blocks: Vec<BlockId> = (0..n).map(|_| body.add_block(None)).collect();
        body.set_entry(blocks[0]);
        for &(from, to) in edges {
            body.add_edge(blocks[from as usize], blocks[to as usize], EdgeKind::Normal);
        }
        body
    }

    #[test]
    fn test_simple_loop() {
        let mut body = graph(4, &[(0, 1), (1, 2), (2, 1), (2, 3)]);
        dominators::compute(&mut body).unwrap();
        detect(&mut body).unwrap();

        assert_eq!(body.loops.len(), 1);
        let info = &body.loops[0];
        assert_eq!(info.header, BlockId(1));
        assert_eq!(info.tail, BlockId(2));
        assert!(info.blocks.contains(&BlockId(1)));
        assert!(info.blocks.contains(&BlockId(2)));
        assert!(!info.blocks.contains(&BlockId(0)));
        assert_eq!(info.exit_edges, vec![(BlockId(2), BlockId(3))]);

        // LoopInfo is attached to both ends of the back edge.
        assert!(body.block(BlockId(1)).flags.contains(BlockFlags::LOOP_START));
        assert!(body.block(BlockId(2)).flags.contains(BlockFlags::LOOP_END));
    }

    #[test]
    fn test_no_loops_in_dag() {
        let mut body = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        dominators::compute(&mut body).unwrap();
        detect(&mut body).unwrap();
        assert!(body.loops.is_empty());
    }

    #[test]
    fn test_two_back_edges_two_loop_records() {
        // Both 2 -> 1 and 3 -> 1 are back edges into the same header.
        let mut body = graph(5, &[(0, 1), (1, 2), (1, 3), (2, 1), (3, 1), (3, 4)]);
        dominators::compute(&mut body).unwrap();
        detect(&mut body).unwrap();

        assert_eq!(body.loops.len(), 2);
        assert!(body.loops.iter().all(|l| l.header == BlockId(1)));
        assert_eq!(body.block(BlockId(1)).loops.len(), 2);
    }

    #[test]
    fn test_self_loop() {
        let mut body = graph(3, &[(0, 1), (1, 1), (1, 2)]);
        dominators::compute(&mut body).unwrap();
        detect(&mut body).unwrap();

        assert_eq!(body.loops.len(), 1);
        let info = &body.loops[0];
        assert_eq!(info.header, BlockId(1));
        assert_eq!(info.tail, BlockId(1));
        assert_eq!(info.blocks, vec![BlockId(1)]);
    }
}
