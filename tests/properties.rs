//! Property-based tests for carving.
//!
//! Invariants that should hold for every call graph:
//! - Monotonicity: more roots never keep fewer lines
//! - Order independence: root order does not change the result
//! - Exactness: a function's line is kept iff it is reachable by calls

use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tree_carver::types::{FunctionDecl, Stmt, StmtKind, Type};
use tree_carver::{
    collect, mark, CarveConfig, Carver, Decl, DeclId, DeclKind, FileEntry,
    InMemoryTranslationUnit, SourceRange,
};

// ============================================================================
// Generators
// ============================================================================

/// Adjacency lists: `graph[i]` holds the functions `f{i}` calls.
fn call_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0..n, 0..4), n))
}

/// One function per line: line `i + 1` holds `int f{i}() { ... }`.
fn build_unit(graph: &[Vec<usize>]) -> (InMemoryTranslationUnit, Vec<DeclId>) {
    let mut tu = InMemoryTranslationUnit::new();
    let main = tu.add_file(FileEntry::source("main.c", None));
    let int = tu.add_type(Type::Builtin("int".into()));

    let functions: Vec<DeclId> = (0..graph.len())
        .map(|i| {
            let line = i as u32 + 1;
            tu.add_top_level(Decl::new(
                format!("f{}", i),
                DeclKind::Function(FunctionDecl::new(int)),
                SourceRange::span(main, (line, 1), (line, 40)),
            ))
        })
        .collect();

    for (i, callees) in graph.iter().enumerate() {
        let line = i as u32 + 1;
        let calls = callees
            .iter()
            .map(|&callee| {
                let reference = tu.add_stmt(Stmt::new(
                    StmtKind::DeclRef {
                        decl: functions[callee],
                        template_args: vec![],
                        qualifier: None,
                    },
                    SourceRange::span(main, (line, 12), (line, 14)),
                ));
                tu.add_stmt(
                    Stmt::new(
                        StmtKind::Call { callee: reference },
                        SourceRange::span(main, (line, 12), (line, 16)),
                    )
                    .with_children(vec![reference]),
                )
            })
            .collect();
        let body = tu.add_stmt(
            Stmt::new(
                StmtKind::Other("CompoundStmt".into()),
                SourceRange::span(main, (line, 10), (line, 40)),
            )
            .with_children(calls),
        );
        if let DeclKind::Function(function) = &mut tu.decl_mut(functions[i]).kind {
            function.body = Some(body);
        }
    }
    (tu, functions)
}

fn reachable_by_calls(graph: &[Vec<usize>], roots: &BTreeSet<usize>) -> BTreeSet<usize> {
    let mut seen = BTreeSet::new();
    let mut pending: Vec<usize> = roots.iter().copied().collect();
    while let Some(f) = pending.pop() {
        if seen.insert(f) {
            pending.extend(graph[f].iter().copied());
        }
    }
    seen
}

fn subset(mask: u16, n: usize) -> BTreeSet<usize> {
    (0..n).filter(|i| mask & (1 << i) != 0).collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_more_roots_keep_more_lines(graph in call_graph(), a in any::<u16>(), b in any::<u16>()) {
        let n = graph.len();
        let small = subset(a & b, n);
        let large = subset(a | b, n);
        let (tu, _) = build_unit(&graph);
        let unit = Arc::new(tu);

        let names = |roots: &BTreeSet<usize>| roots.iter().map(|i| format!("f{}", i)).collect::<Vec<_>>();
        // An empty root set falls back to `main`, which does not exist here.
        prop_assume!(!small.is_empty());

        let small_out = Carver::new(Arc::clone(&unit), CarveConfig::with_roots(names(&small))).carve().unwrap();
        let large_out = Carver::new(Arc::clone(&unit), CarveConfig::with_roots(names(&large))).carve().unwrap();
        prop_assert!(small_out.kept_lines.is_subset_of(&large_out.kept_lines));
    }

    #[test]
    fn prop_root_order_irrelevant(graph in call_graph(), mask in any::<u16>()) {
        let (tu, functions) = build_unit(&graph);
        let roots: Vec<DeclId> = subset(mask, graph.len()).into_iter().map(|i| functions[i]).collect();
        let mut reversed = roots.clone();
        reversed.reverse();

        let forward = collect(&tu.ast, &roots);
        let backward = collect(&tu.ast, &reversed);
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(
            mark(&tu.ast, &tu, &forward).kept_lines.fingerprint(),
            mark(&tu.ast, &tu, &backward).kept_lines.fingerprint()
        );
    }

    #[test]
    fn prop_kept_lines_match_call_closure(graph in call_graph(), mask in any::<u16>()) {
        let roots = subset(mask, graph.len());
        let (tu, functions) = build_unit(&graph);
        let root_ids: Vec<DeclId> = roots.iter().map(|&i| functions[i]).collect();

        let marking = mark(&tu.ast, &tu, &collect(&tu.ast, &root_ids));
        let kept: BTreeSet<usize> = marking
            .kept_lines
            .file("main.c")
            .map(|lines| lines.kept().collect())
            .unwrap_or_default();
        prop_assert_eq!(kept, reachable_by_calls(&graph, &roots));
    }
}
