//! Cost-based re-tokenization against a fixed pair of Huffman trees.
//!
//! The greedy pass picks the longest match it can see; once trees exist,
//! that is often not the cheapest choice. This pass walks the buffer
//! backward computing, for every position, the token that minimizes the
//! total encoded bit count from there to the end, restricted to the copy
//! lengths and distances the current trees can express. Re-training the
//! trees on the result and repeating converges toward a smaller stream.

use super::huffman::CodeTree;
use super::lz::{self, Token};
use crate::format::{LITERAL_MAX, MIN_MATCH};

#[derive(Debug, Clone, Copy)]
struct PathNode {
    token: Token,
    /// bits needed to encode everything from this position onward
    weight: u64,
}

/// Total weight of the path starting at `pos`, or nothing past the end.
fn tail_weight(nodes: &[PathNode], pos: usize) -> u64 {
    if pos < nodes.len() {
        nodes[pos].weight
    } else {
        0
    }
}

/// Index of the largest allowed length `<= len`, in a sorted list.
fn round_down(len: u32, allowed: &[u32]) -> Option<usize> {
    let n = allowed.partition_point(|&v| v <= len);
    if n == 0 {
        None
    } else {
        Some(n - 1)
    }
}

pub(crate) fn retokenize(buf: &[u8], sym_tree: &CodeTree, dist_tree: &CodeTree) -> Vec<Token> {
    let size = buf.len();
    if size == 0 {
        return Vec::new();
    }

    // Leaves the trees actually carry, ascending. Length symbols map to
    // byte counts, distance symbols to back-distances.
    let len_syms = sym_tree.coded_symbols(LITERAL_MAX);
    let dist_syms = dist_tree.coded_symbols(0);
    let lens: Vec<u32> = len_syms
        .iter()
        .map(|&(sym, _)| sym - LITERAL_MAX + MIN_MATCH)
        .collect();
    let dists: Vec<u32> = dist_syms.iter().map(|&(sym, _)| sym + 1).collect();

    let mut nodes = vec![
        PathNode {
            token: Token::Literal(0),
            weight: 0,
        };
        size
    ];

    for pos in (0..size).rev() {
        let found = match lens.last() {
            Some(&longest) => lz::search_restricted(buf, pos, &dists, longest as usize),
            None => None,
        };

        // a match below the reference minimum can only be spent as literals
        let start = found
            .filter(|m| m.length >= MIN_MATCH)
            .and_then(|m| round_down(m.length, &lens).map(|idx| (m, idx)));

        let (token, weight) = match start {
            None => {
                let token = Token::Literal(buf[pos]);
                let weight = sym_tree.depth(buf[pos] as u32) + tail_weight(&nodes, pos + 1);
                (token, weight)
            }
            Some((m, start_idx)) => {
                // Try every expressible length below the match, plus the
                // one-byte literal, and keep the cheapest tail. Distance
                // cost is settled separately afterward.
                let mut best_weight = u64::MAX;
                let mut best_len = lens[start_idx];
                let mut idx = Some(start_idx);
                let mut length = lens[start_idx];
                loop {
                    let step_weight = match idx {
                        Some(i) => len_syms[i].1 as u64,
                        None => sym_tree.depth(buf[pos] as u32),
                    };
                    let this_weight = step_weight + tail_weight(&nodes, pos + length as usize);
                    if this_weight < best_weight {
                        best_weight = this_weight;
                        best_len = length;
                    }

                    if length == 1 {
                        break;
                    }
                    match round_down(length - 1, &lens) {
                        Some(i) => {
                            idx = Some(i);
                            length = lens[i];
                        }
                        None => {
                            idx = None;
                            length = 1;
                        }
                    }
                }

                if best_len < MIN_MATCH {
                    (Token::Literal(buf[pos]), best_weight)
                } else {
                    // The search returned *a* valid distance; a different
                    // coded distance may reproduce the same bytes for fewer
                    // bits. Candidates need an explicit byte compare since
                    // they weren't part of the original match.
                    let mut dst_cost = dist_tree.depth(m.distance - 1);
                    let mut distance = m.distance;
                    for (i, &d) in dists.iter().enumerate() {
                        if d as usize > pos {
                            break;
                        }
                        if (dist_syms[i].1 as u64) < dst_cost
                            && lz::confirm_match(buf, pos, d as usize, best_len as usize)
                        {
                            dst_cost = dist_syms[i].1 as u64;
                            distance = d;
                        }
                    }

                    (
                        Token::Reference {
                            length: best_len,
                            distance,
                        },
                        best_weight + dst_cost,
                    )
                }
            }
        };

        nodes[pos] = PathNode { token, weight };
    }

    // follow the cheapest path forward
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < size {
        let token = nodes[pos].token;
        tokens.push(token);
        pos += match token {
            Token::Reference { length, .. } => length as usize,
            Token::Literal(_) => 1,
        };
    }

    tokens
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::train_trees;

    #[test]
    fn round_down_picks_nearest_lower() {
        let allowed = [3, 5, 9];
        assert_eq!(round_down(2, &allowed), None);
        assert_eq!(round_down(3, &allowed), Some(0));
        assert_eq!(round_down(4, &allowed), Some(0));
        assert_eq!(round_down(8, &allowed), Some(1));
        assert_eq!(round_down(100, &allowed), Some(2));
        assert_eq!(round_down(100, &[]), None);
    }

    #[test]
    fn path_covers_whole_buffer() {
        let buf = b"the cat sat on the mat, the cat sat on the mat";
        let tokens = lz::tokenize(buf, 258, 2048);
        let (sym_tree, dist_tree) = train_trees(&tokens, 9, 11);

        let replayed = retokenize(buf, &sym_tree, &dist_tree);
        let total: usize = replayed
            .iter()
            .map(|t| match t {
                Token::Reference { length, .. } => *length as usize,
                Token::Literal(_) => 1,
            })
            .sum();
        assert_eq!(total, buf.len());
        for t in &replayed {
            if let Token::Reference { length, distance } = t {
                assert!(*length >= 3);
                assert!(*distance >= 1);
            }
        }
    }

    #[test]
    fn retokenized_cost_never_grows() {
        // weigh a token stream under the given trees
        fn cost(tokens: &[Token], sym: &CodeTree, dist: &CodeTree) -> u64 {
            tokens
                .iter()
                .map(|t| match *t {
                    Token::Literal(b) => sym.depth(b as u32),
                    Token::Reference { length, distance } => {
                        sym.depth(LITERAL_MAX + length - MIN_MATCH) + dist.depth(distance - 1)
                    }
                })
                .sum()
        }

        let buf: Vec<u8> = b"abcdefghij"
            .iter()
            .copied()
            .cycle()
            .take(4000)
            .collect();
        let tokens = lz::tokenize(&buf, 258, 2048);
        let (sym_tree, dist_tree) = train_trees(&tokens, 9, 11);

        let replayed = retokenize(&buf, &sym_tree, &dist_tree);
        assert!(cost(&replayed, &sym_tree, &dist_tree) <= cost(&tokens, &sym_tree, &dist_tree));
    }
}
