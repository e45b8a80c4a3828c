//! Dependency grouping of sibling `where` functions.
//!
//! Each function is a vertex; an edge `f -> g` means the body of `f`
//! references `g`. Tarjan's algorithm yields the strongly connected
//! components with every component emitted after the components it
//! depends on, so analysing them in order sees callees before callers and
//! mutually recursive functions together.

use rml_ast::free_vars::free_variables;
use rml_ast::{ExprId, Function, Module};
use std::collections::HashMap;

/// Indices into `functions`, grouped into components in dependency order.
/// Members of a component keep declaration order.
pub(crate) fn dependency_groups(module: &Module, functions: &[(ExprId, &Function)]) -> Vec<Vec<usize>> {
    let index_of: HashMap<&str, usize> = functions
        .iter()
        .enumerate()
        .filter_map(|(i, (_, f))| f.name.as_deref().map(|n| (n, i)))
        .collect();

    let graph: Vec<Vec<usize>> = functions
        .iter()
        .map(|(id, _)| {
            free_variables(module, *id)
                .iter()
                .filter_map(|name| index_of.get(name.as_str()).copied())
                .collect()
        })
        .collect();

    let mut groups = tarjan_scc(&graph);
    for group in &mut groups {
        group.sort_unstable();
    }
    groups
}

// ---------------------------------------------------------------------------
// Tarjan's SCC algorithm
// ---------------------------------------------------------------------------

struct TarjanState {
    index_counter: usize,
    stack: Vec<usize>,
    on_stack: Vec<bool>,
    indices: Vec<Option<usize>>,
    lowlinks: Vec<usize>,
    sccs: Vec<Vec<usize>>,
}

fn tarjan_scc(graph: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = graph.len();
    let mut state = TarjanState {
        index_counter: 0,
        stack: Vec::new(),
        on_stack: vec![false; n],
        indices: vec![None; n],
        lowlinks: vec![0; n],
        sccs: Vec::new(),
    };

    for v in 0..n {
        if state.indices[v].is_none() {
            strongconnect(v, graph, &mut state);
        }
    }

    state.sccs
}

fn strongconnect(v: usize, graph: &[Vec<usize>], state: &mut TarjanState) {
    let idx = state.index_counter;
    state.index_counter += 1;
    state.indices[v] = Some(idx);
    state.lowlinks[v] = idx;
    state.stack.push(v);
    state.on_stack[v] = true;

    for &w in &graph[v] {
        match state.indices[w] {
            None => {
                strongconnect(w, graph, state);
                state.lowlinks[v] = state.lowlinks[v].min(state.lowlinks[w]);
            }
            Some(w_idx) if state.on_stack[w] => {
                state.lowlinks[v] = state.lowlinks[v].min(w_idx);
            }
            Some(_) => {}
        }
    }

    // If v is a root node, pop the SCC
    if Some(state.lowlinks[v]) == state.indices[v] {
        let mut scc = Vec::new();
        while let Some(w) = state.stack.pop() {
            state.on_stack[w] = false;
            scc.push(w);
            if w == v {
                break;
            }
        }
        state.sccs.push(scc);
    }
}
