//! NFA → kNFA transform.
//!
//! Collapses k consecutive Thompson NFA symbol transitions into one
//! *emission* — a kNFA state whose window is a complete k-mer. Emission
//! states are deduplicated by `(NfaNode, window)` via a structural-key memo
//! map, the same dedup idiom used elsewhere in this crate for arena-backed
//! graphs (see DESIGN.md). Windowing is tumbling (stride k), matching the
//! reference implementation's single-pass `dfs`/`extract_matrix_paths`
//! convention.
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::{self, Write};

use crate::alphabet::Symbol;
use crate::dot::{Edge as DotEdge, Family, GraphWriter, Node as DotNode};
use crate::thompson::{NfaNode, ThompsonNfa};

/// A node handle into a [`Knfa`]'s arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct KNode(pub usize);

struct KnfaNodeData {
    window: Vec<Symbol>,
    /// Set when the underlying Thompson path reaches `Match` from this
    /// emission's Thompson state (the kNFA path may legally end here).
    terminal: bool,
    edges: Vec<KNode>,
}

/// The k-mer NFA derived from a [`ThompsonNfa`] for a fixed k.
pub struct Knfa {
    nodes: Vec<KnfaNodeData>,
    starts: Vec<KNode>,
    k: usize,
}

impl Knfa {
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn start_nodes(&self) -> &[KNode] {
        &self.starts
    }

    pub fn window(&self, node: KNode) -> &[Symbol] {
        &self.nodes[node.0].window
    }

    pub fn is_terminal(&self, node: KNode) -> bool {
        self.nodes[node.0].terminal
    }

    pub fn edges(&self, node: KNode) -> &[KNode] {
        &self.nodes[node.0].edges
    }

    /// Build the kNFA for a given Thompson NFA and k-mer length.
    ///
    /// The Thompson NFA is only borrowed here; callers are expected to drop
    /// it immediately after this call returns — this crate never retains it
    /// past this point.
    pub fn build(thompson: &ThompsonNfa, k: usize) -> Self {
        assert!(k > 0, "k-mer length must be positive");
        let mut builder = Builder {
            thompson,
            k,
            emission_memo: HashMap::new(),
            nodes: Vec::new(),
        };
        let mut starts = Vec::new();
        let mut visited = HashSet::new();
        builder.expand(thompson.start(), Vec::new(), &mut visited, &mut starts);
        Knfa { nodes: builder.nodes, starts, k }
    }

    /// Write the kNFA to a `dot` graph description for debugging, via the
    /// strongly typed `dot` writer in [`crate::dot`].
    pub fn write_to(&self, output: &mut dyn Write) -> io::Result<()> {
        let mut writer = GraphWriter::new(output, Family::Directed, None)?;

        for (from, data) in self.nodes.iter().enumerate() {
            let label = window_string(&data.window);
            for to in &data.edges {
                let edge = DotEdge { label: Some(label.clone().into()), ..DotEdge::none() };
                writer.segment([from, to.0].into_iter(), Some(edge))?;
            }
        }

        for (id, data) in self.nodes.iter().enumerate() {
            if data.terminal {
                let node = DotNode { peripheries: Some(2), ..DotNode::none() };
                writer.node(id.into(), Some(node))?;
            }
        }

        writer.end_into_inner().1
    }
}

fn window_string(window: &[Symbol]) -> String {
    window.iter().map(|s| s.0 as char).collect()
}

struct Builder<'a> {
    thompson: &'a ThompsonNfa,
    k: usize,
    emission_memo: HashMap<(NfaNode, Vec<Symbol>), KNode>,
    nodes: Vec<KnfaNodeData>,
}

impl Builder<'_> {
    /// Materialize (or retrieve) the emission state for a complete window at
    /// `state`, then eagerly build its outgoing edges by restarting window
    /// assembly from `state` with an empty window.
    fn emission(&mut self, state: NfaNode, window: Vec<Symbol>) -> KNode {
        let key = (state, window.clone());
        if let Some(&id) = self.emission_memo.get(&key) {
            return id;
        }

        let id = KNode(self.nodes.len());
        self.emission_memo.insert(key, id);
        self.nodes.push(KnfaNodeData {
            window,
            terminal: self.thompson.reaches_match(state),
            edges: Vec::new(),
        });

        let mut edges = Vec::new();
        let mut visited = HashSet::new();
        self.expand(state, Vec::new(), &mut visited, &mut edges);
        self.nodes[id.0].edges = edges;

        id
    }

    /// Grow `window` along Thompson edges from `state`. ε-edges fork without
    /// extending the window; a symbol edge appends one symbol. A window that
    /// reaches length k materializes (or reuses) an emission state, pushed
    /// into `out`. A window that reaches `Match` before length k is
    /// discarded. `visited` prunes revisits of the same
    /// (state, window-prefix) pair within this expansion, which is what
    /// makes the traversal terminate for regexes with Kleene closures.
    fn expand(
        &mut self,
        state: NfaNode,
        window: Vec<Symbol>,
        visited: &mut HashSet<(NfaNode, Vec<Symbol>)>,
        out: &mut Vec<KNode>,
    ) {
        let key = (state, window.clone());
        if !visited.insert(key) {
            return;
        }

        if window.len() == self.k {
            let node = self.emission(state, window);
            if !out.contains(&node) {
                out.push(node);
            }
            return;
        }

        for eps_target in self.thompson.epsilon_targets(state) {
            self.expand(eps_target, window.clone(), visited, out);
        }

        if let Some((sym, target)) = self.thompson.symbol_edge(state) {
            let mut extended = window;
            extended.push(sym);
            self.expand(target, extended, visited, out);
        }
        // Thompson `Match` reached with a partial window: nothing to emit.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thompson::ThompsonNfa;

    #[test]
    fn literal_kmer_has_one_terminal_start() {
        let nfa = ThompsonNfa::from_postfix("AC.G.").unwrap();
        let knfa = Knfa::build(&nfa, 3);
        assert_eq!(knfa.start_nodes().len(), 1);
        let start = knfa.start_nodes()[0];
        assert_eq!(window_string(knfa.window(start)), "ACG");
        assert!(knfa.is_terminal(start));
        assert!(knfa.edges(start).is_empty());
    }

    #[test]
    fn alternation_yields_two_kmer_paths() {
        // A(C|G)T -> postfix ACG|.T.
        let nfa = ThompsonNfa::from_postfix("ACG|.T.").unwrap();
        let knfa = Knfa::build(&nfa, 3);
        let windows: Vec<String> = knfa.start_nodes().iter().map(|&n| window_string(knfa.window(n))).collect();
        let mut sorted = windows.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["ACT".to_string(), "AGT".to_string()]);
    }

    #[test]
    fn kleene_star_terminates_and_shares_emission_states() {
        // AC*A, postfix: A C * . A .
        let nfa = ThompsonNfa::from_postfix("AC*.A.").unwrap();
        let knfa = Knfa::build(&nfa, 2);
        // Must terminate (no infinite recursion) and produce at least one
        // start state.
        assert!(!knfa.start_nodes().is_empty());
    }
}
