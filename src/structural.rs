//! Structural Parser (spec.md §4.3): recovers statement-start lines and
//! the full arc set directly from the CST instead of a bytecode stream —
//! the recommended redesign from spec.md §9, option (b). "Chunk" here
//! collapses to one entry per executable line (no opcode offsets exist to
//! split further); `BlockStackEntry` survives as `LoopFrame`/`FinallyFrame`,
//! modeling exactly the same implicit break/finally destinations the
//! bytecode's block stack modeled.

use std::cell::RefCell;
use std::collections::BTreeSet;

use tree_sitter::Node;

use crate::cst::{
    block_of, collect_code_objects, except_has_type, expand_statements, first_line, last_line,
    suite_statements,
};
use crate::unit::CodeUnit;

/// Sentinel marking a code object's synthetic entry (as `from`) or exit
/// (as `to`).
pub const EXIT: i64 = -1;

/// An ordered control-flow transition between two source lines, or between
/// a line and the synthetic entry/exit sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Arc {
    pub from: i64,
    pub to: i64,
}

impl Arc {
    fn new(from: i64, to: i64) -> Option<Self> {
        if from == to { None } else { Some(Self { from, to }) }
    }
}

/// A straight-line run of execution identified by a single source line,
/// with the set of lines (or the `EXIT` sentinel) it can transfer control
/// to. Exposed mainly for the diagnostic CLI; the façade only needs the
/// flattened arc set.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub line: i64,
    pub exits: BTreeSet<i64>,
}

/// Rebuilds per-line chunks from a flattened arc set, for display.
pub fn chunks_from_arcs(arcs: &BTreeSet<Arc>) -> Vec<Chunk> {
    let mut by_line: std::collections::BTreeMap<i64, BTreeSet<i64>> = Default::default();
    for arc in arcs {
        by_line.entry(arc.from).or_default().insert(arc.to);
    }
    by_line
        .into_iter()
        .map(|(line, exits)| Chunk { line, exits })
        .collect()
}

/// The output of the structural pass: every executable statement-start
/// line and the full arc set, unioned across every reachable code object.
pub struct StructuralResult {
    pub statement_starts: BTreeSet<u32>,
    pub arcs: BTreeSet<Arc>,
}

pub fn analyze_structure(unit: &CodeUnit) -> StructuralResult {
    let root = unit.tree().root_node();
    let mut code_objects = vec![root];
    collect_code_objects(root, &mut code_objects);

    let mut statement_starts = BTreeSet::new();
    let mut arcs = BTreeSet::new();

    for code_object in code_objects {
        let body = match code_object.kind() {
            "function_definition" | "class_definition" => {
                block_of(code_object).expect("def/class always has a body block")
            }
            _ => code_object, // the module itself
        };
        let stmts = expand_statements(&suite_statements(body));
        if stmts.is_empty() {
            continue;
        }
        let mut ctx = Ctx {
            arcs: &mut arcs,
            statement_starts: &mut statement_starts,
            loop_stack: Vec::new(),
            finally_stack: Vec::new(),
        };
        let entry = first_line(stmts[0]) as i64;
        ctx.emit(EXIT, entry);
        build_block(&stmts, &[EXIT], &mut ctx);
    }

    StructuralResult {
        statement_starts,
        arcs,
    }
}

struct LoopFrame {
    break_target: Vec<i64>,
    continue_target: Vec<i64>,
    finally_base: usize,
}

struct FinallyFrame {
    first_line: i64,
    destinations: RefCell<BTreeSet<i64>>,
}

struct Ctx<'a> {
    arcs: &'a mut BTreeSet<Arc>,
    statement_starts: &'a mut BTreeSet<u32>,
    loop_stack: Vec<LoopFrame>,
    finally_stack: Vec<FinallyFrame>,
}

impl<'a> Ctx<'a> {
    fn emit(&mut self, from: i64, to: i64) {
        if let Some(arc) = Arc::new(from, to) {
            self.arcs.insert(arc);
        }
    }

    fn emit_all(&mut self, from: i64, targets: &[i64]) {
        for &to in targets {
            self.emit(from, to);
        }
    }

    fn mark(&mut self, line: u32) {
        self.statement_starts.insert(line);
    }

    /// Routes `targets` through the innermost open `finally`, if any —
    /// used by `return`/`raise` and by exceptional exits from a try body,
    /// which must cross every enclosing finally regardless of loops.
    fn route(&self, targets: &[i64]) -> Vec<i64> {
        if let Some(frame) = self.finally_stack.last() {
            frame.destinations.borrow_mut().extend(targets.iter());
            vec![frame.first_line]
        } else {
            targets.to_vec()
        }
    }

    /// Routes a `break`/`continue` target, but only through finally frames
    /// opened *after* the loop itself — a break whose target is still
    /// inside the protected region must not be redirected through that
    /// region's own finally.
    fn route_loop(&self, targets: &[i64], finally_base: usize) -> Vec<i64> {
        if self.finally_stack.len() > finally_base {
            let frame = &self.finally_stack[self.finally_stack.len() - 1];
            frame.destinations.borrow_mut().extend(targets.iter());
            vec![frame.first_line]
        } else {
            targets.to_vec()
        }
    }
}

fn entry_line(stmts: &[Node]) -> i64 {
    first_line(stmts[0]) as i64
}

fn build_block(stmts: &[Node], after: &[i64], ctx: &mut Ctx) {
    for i in 0..stmts.len() {
        let next: Vec<i64> = if i + 1 < stmts.len() {
            vec![entry_line(&stmts[i + 1..])]
        } else {
            after.to_vec()
        };
        build_stmt(stmts[i], &next, ctx);
    }
}

fn build_stmt(node: Node, after: &[i64], ctx: &mut Ctx) {
    let line = first_line(node) as i64;
    match node.kind() {
        "if_statement" => build_if_chain(node, after, ctx),
        "while_statement" => build_while(node, after, ctx),
        "for_statement" => build_for(node, after, ctx),
        "try_statement" => build_try(node, after, ctx),
        "with_statement" => build_with(node, after, ctx),
        "match_statement" => build_match(node, after, ctx),
        "function_definition" | "class_definition" => {
            // The body is a separate reachable code object (see
            // analyze_structure); from here it's a plain statement that
            // simply falls through once the def/class object is built.
            ctx.mark(line as u32);
            ctx.emit_all(line, after);
        }
        "return_statement" => {
            ctx.mark(line as u32);
            let routed = ctx.route(&[EXIT]);
            ctx.emit_all(line, &routed);
        }
        "raise_statement" => {
            ctx.mark(line as u32);
            let routed = ctx.route(&[EXIT]);
            ctx.emit_all(line, &routed);
        }
        "break_statement" => {
            ctx.mark(line as u32);
            let frame = ctx
                .loop_stack
                .last()
                .expect("break only appears inside a loop");
            let (targets, base) = (frame.break_target.clone(), frame.finally_base);
            let routed = ctx.route_loop(&targets, base);
            ctx.emit_all(line, &routed);
        }
        "continue_statement" => {
            ctx.mark(line as u32);
            let frame = ctx
                .loop_stack
                .last()
                .expect("continue only appears inside a loop");
            let (targets, base) = (frame.continue_target.clone(), frame.finally_base);
            let routed = ctx.route_loop(&targets, base);
            ctx.emit_all(line, &routed);
        }
        _ => {
            // Any other simple statement: executes and falls through.
            ctx.mark(line as u32);
            ctx.emit_all(line, after);
        }
    }
}

/// Builds the `if`/`elif*`/`else?` chain as a sequence of conditional
/// clauses: `elif_clause`/`else_clause` are flat siblings of
/// `if_statement` in the grammar, not nested inside it, so the chain is
/// reconstructed here rather than walked recursively.
fn build_if_chain(if_stmt: Node, after: &[i64], ctx: &mut Ctx) {
    let mut cursor = if_stmt.walk();
    let clauses: Vec<Node> = if_stmt
        .children(&mut cursor)
        .filter(|c| matches!(c.kind(), "elif_clause" | "else_clause"))
        .collect();

    let conditionals: Vec<Node> = std::iter::once(if_stmt)
        .chain(clauses.iter().copied().filter(|c| c.kind() == "elif_clause"))
        .collect();
    let else_clause = clauses.iter().find(|c| c.kind() == "else_clause").copied();

    for (idx, clause) in conditionals.iter().enumerate() {
        let clause_line = first_line(*clause) as i64;
        ctx.mark(clause_line as u32);
        let body = expand_statements(&suite_statements(block_of(*clause).unwrap()));
        let true_target = entry_line(&body);
        ctx.emit(clause_line, true_target);
        build_block(&body, after, ctx);

        let false_target: Option<i64> = if idx + 1 < conditionals.len() {
            Some(first_line(conditionals[idx + 1]) as i64)
        } else {
            // else's body is built once, after this loop.
            else_clause.map(|else_| entry_line(&suite_statements(block_of(else_).unwrap())))
        };
        match false_target {
            Some(t) => ctx.emit(clause_line, t),
            None => ctx.emit_all(clause_line, after),
        }
    }
    if let Some(else_) = else_clause {
        let else_body = expand_statements(&suite_statements(block_of(else_).unwrap()));
        build_block(&else_body, after, ctx);
    }
}

fn build_while(node: Node, after: &[i64], ctx: &mut Ctx) {
    let line = first_line(node) as i64;
    ctx.mark(line as u32);
    let body = expand_statements(&suite_statements(block_of(node).unwrap()));
    let true_target = entry_line(&body);
    ctx.emit(line, true_target);

    let else_clause = find_else_sibling(node);
    match else_clause {
        Some(else_) => {
            let t = entry_line(&suite_statements(block_of(else_).unwrap()));
            ctx.emit(line, t);
        }
        None => ctx.emit_all(line, after),
    }

    ctx.loop_stack.push(LoopFrame {
        break_target: after.to_vec(),
        continue_target: vec![line],
        finally_base: ctx.finally_stack.len(),
    });
    build_block(&body, &[line], ctx);
    ctx.loop_stack.pop();

    if let Some(else_) = else_clause {
        let else_body = expand_statements(&suite_statements(block_of(else_).unwrap()));
        build_block(&else_body, after, ctx);
    }
}

fn build_for(node: Node, after: &[i64], ctx: &mut Ctx) {
    let line = first_line(node) as i64;
    ctx.mark(line as u32);
    let body = expand_statements(&suite_statements(block_of(node).unwrap()));
    let true_target = entry_line(&body);
    ctx.emit(line, true_target);

    let else_clause = find_else_sibling(node);
    match else_clause {
        Some(else_) => {
            let else_body = expand_statements(&suite_statements(block_of(else_).unwrap()));
            let t = entry_line(&else_body);
            ctx.emit(line, t);
        }
        None => ctx.emit_all(line, after),
    }

    ctx.loop_stack.push(LoopFrame {
        break_target: after.to_vec(),
        continue_target: vec![line],
        finally_base: ctx.finally_stack.len(),
    });
    build_block(&body, &[line], ctx);
    ctx.loop_stack.pop();

    if let Some(else_) = else_clause {
        let else_body = expand_statements(&suite_statements(block_of(else_).unwrap()));
        build_block(&else_body, after, ctx);
    }
}

/// The `else_clause` following a `while`/`for` statement, if any — a flat
/// sibling in the grammar, the same way `elif`/`else` follow `if`.
fn find_else_sibling(node: Node) -> Option<Node> {
    let parent = node.parent()?;
    let mut cursor = parent.walk();
    let mut seen_self = false;
    for child in parent.children(&mut cursor) {
        if child.id() == node.id() {
            seen_self = true;
        } else if seen_self && child.kind() == "else_clause" {
            return Some(child);
        }
    }
    None
}

fn build_try(node: Node, after: &[i64], ctx: &mut Ctx) {
    let try_line = first_line(node) as i64;
    ctx.mark(try_line as u32);

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    let except_clauses: Vec<Node> = children
        .iter()
        .filter(|c| matches!(c.kind(), "except_clause" | "except_group_clause"))
        .copied()
        .collect();
    let try_else = children.iter().find(|c| c.kind() == "else_clause").copied();
    let finally_clause = children
        .iter()
        .find(|c| c.kind() == "finally_clause")
        .copied();

    let finally_entry: Option<i64> = finally_clause.map(|f| {
        let body = expand_statements(&suite_statements(block_of(f).unwrap()));
        entry_line(&body)
    });

    if let Some(fl) = finally_entry {
        ctx.finally_stack.push(FinallyFrame {
            first_line: fl,
            destinations: RefCell::new(BTreeSet::new()),
        });
    }

    let post_try_targets: Vec<i64> = match finally_entry {
        Some(fl) => vec![fl],
        // No local finally: `after` was already routed by our own caller
        // through any finally enclosing *this* try statement. Keep every
        // destination, not just the first — it can legitimately carry more
        // than one reachable line (e.g. a loop's normal continuation
        // alongside a redirected `break` target).
        None => after.to_vec(),
    };

    let body = expand_statements(&suite_statements(block_of(node).unwrap()));
    let normal_target: Vec<i64> = match try_else {
        Some(else_) => {
            let else_body = expand_statements(&suite_statements(block_of(else_).unwrap()));
            vec![entry_line(&else_body)]
        }
        None => post_try_targets.clone(),
    };
    ctx.emit(try_line, entry_line(&body));
    build_block(&body, &normal_target, ctx);

    // Simplified exceptional-control-flow model: any statement directly in
    // the try body may transfer to the first handler (or straight to
    // finally, if there is no handler). A fully faithful model would add
    // this arc from every nested statement that can raise, not just the
    // try's own header line; see DESIGN.md.
    if let Some(first_except) = except_clauses.first() {
        let handler_line = first_line(*first_except) as i64;
        ctx.emit(try_line, handler_line);
    } else if let Some(fl) = finally_entry {
        ctx.emit(try_line, fl);
    } else {
        let routed = ctx.route(&[EXIT]);
        ctx.emit_all(try_line, &routed);
    }

    for (idx, except) in except_clauses.iter().enumerate() {
        let ex_line = first_line(*except) as i64;
        ctx.mark(ex_line as u32);
        let ex_body = expand_statements(&suite_statements(block_of(*except).unwrap()));
        let ex_entry = entry_line(&ex_body);
        ctx.emit(ex_line, ex_entry);
        build_block(&ex_body, &post_try_targets, ctx);

        if idx + 1 < except_clauses.len() {
            let next_line = first_line(except_clauses[idx + 1]) as i64;
            ctx.emit(ex_line, next_line);
        } else if except_has_type(*except) {
            let routed = ctx.route(&[EXIT]);
            ctx.emit_all(ex_line, &routed);
        }
    }

    if let Some(else_) = try_else {
        let else_body = expand_statements(&suite_statements(block_of(else_).unwrap()));
        build_block(&else_body, &post_try_targets, ctx);
    }

    if let Some(finally) = finally_clause {
        let frame = ctx.finally_stack.pop().expect("pushed above");
        let fin_body = expand_statements(&suite_statements(block_of(finally).unwrap()));

        let mut dests: BTreeSet<i64> = BTreeSet::new();
        for t in ctx.route(after) {
            dests.insert(t);
        }
        for d in frame.destinations.into_inner() {
            for t in ctx.route(&[d]) {
                dests.insert(t);
            }
        }
        let dests: Vec<i64> = dests.into_iter().collect();
        build_block(&fin_body, &dests, ctx);
    }
}

fn build_with(node: Node, after: &[i64], ctx: &mut Ctx) {
    let line = first_line(node) as i64;
    ctx.mark(line as u32);
    let body = expand_statements(&suite_statements(block_of(node).unwrap()));
    let target = entry_line(&body);
    ctx.emit(line, target);
    build_block(&body, after, ctx);
}

/// Simplified `match`/`case` support: each `case_clause` is treated like
/// an `elif` arm (sequential pattern test), falling through to `after` if
/// nothing matches — conservative even when a wildcard `case _:` makes
/// "nothing matched" unreachable in practice.
fn build_match(node: Node, after: &[i64], ctx: &mut Ctx) {
    let line = first_line(node) as i64;
    ctx.mark(line as u32);
    let Some(body_block) = block_of(node) else {
        ctx.emit_all(line, after);
        return;
    };
    let cases: Vec<Node> = suite_statements(body_block)
        .into_iter()
        .filter(|c| c.kind() == "case_clause")
        .collect();
    if cases.is_empty() {
        ctx.emit_all(line, after);
        return;
    }
    for (idx, case) in cases.iter().enumerate() {
        let case_line = first_line(*case) as i64;
        ctx.mark(case_line as u32);
        let case_body = expand_statements(&suite_statements(block_of(*case).unwrap()));
        let entry = entry_line(&case_body);
        ctx.emit(case_line, entry);
        build_block(&case_body, after, ctx);
        if idx == 0 {
            ctx.emit(line, case_line);
        } else {
            ctx.emit(first_line(cases[idx - 1]) as i64, case_line);
        }
    }
    ctx.emit_all(first_line(*cases.last().unwrap()) as i64, after);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> CodeUnit {
        CodeUnit::from_source("<code>", src).unwrap()
    }

    fn arcs_of(src: &str) -> BTreeSet<Arc> {
        analyze_structure(&parse(src)).arcs
    }

    #[test]
    fn s1_simple_if() {
        let arcs = arcs_of("a = 1\nif a == 2:\n    a = 3\n");
        let expected: BTreeSet<Arc> = [(-1, 1), (1, 2), (2, 3), (2, -1), (3, -1)]
            .into_iter()
            .map(|(f, t)| Arc { from: f, to: t })
            .collect();
        assert_eq!(arcs, expected);
    }

    #[test]
    fn s1_statement_starts() {
        let result = analyze_structure(&parse("a = 1\nif a == 2:\n    a = 3\n"));
        assert_eq!(result.statement_starts, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn s2_else_branch() {
        let src = "a = 1\nif a == 1:\n    x = 3\nelse:\n    y = 5\nassert x == 3\n";
        let result = analyze_structure(&parse(src));
        assert_eq!(result.statement_starts, BTreeSet::from([1, 2, 3, 5, 6]));
        assert!(result.arcs.contains(&Arc { from: 2, to: 3 }));
        assert!(result.arcs.contains(&Arc { from: 2, to: 5 }));
        assert!(result.arcs.contains(&Arc { from: 3, to: 6 }));
        assert!(result.arcs.contains(&Arc { from: 5, to: 6 }));
        assert!(result.arcs.contains(&Arc { from: 6, to: -1 }));
    }

    #[test]
    fn break_inside_try_finally_routes_through_finally() {
        let src = "while True:\n    try:\n        if a:\n            break\n    finally:\n        cleanup()\n";
        let result = analyze_structure(&parse(src));
        // break (line 4) routes to the finally's first line (6).
        assert!(result.arcs.contains(&Arc { from: 4, to: 6 }));
        // the finally's last line (also 6, single-statement body) must
        // reach the loop's exit in addition to any normal completion.
        let has_exit_arc = result.arcs.iter().any(|a| a.from == 6);
        assert!(has_exit_arc);
    }

    #[test]
    fn nested_function_gets_its_own_entry_and_exit_arcs() {
        let src = "def f():\n    def g():\n        return 1\n    return g\n";
        let result = analyze_structure(&parse(src));
        assert!(result.arcs.contains(&Arc { from: -1, to: 1 }));
        assert!(result.arcs.contains(&Arc { from: -1, to: 3 }));
        assert!(result.arcs.contains(&Arc { from: 3, to: -1 }));
        assert!(result.arcs.contains(&Arc { from: 4, to: -1 }));
    }

    #[test]
    fn try_statement_emits_fall_through_arc_into_its_own_body() {
        let src = "try:\n    a = 1\nexcept Exception:\n    a = 2\n";
        let result = analyze_structure(&parse(src));
        assert!(result.arcs.contains(&Arc { from: 1, to: 2 }));
    }

    #[test]
    fn finally_body_preserves_every_destination_through_a_nested_no_finally_try() {
        // The outer try's finally body's last statement is itself a try
        // with no finally of its own; its `after` is whatever the outer
        // finally routed (here: the loop header at line 1, from the
        // break, plus the loop's own normal exit at line 10). Both
        // destinations must survive into the inner try's own arcs instead
        // of collapsing to just the first one.
        let src = "while True:\n    try:\n        if cond:\n            break\n    finally:\n        try:\n            risky()\n        except Exception:\n            pass\nprint(done)\n";
        let result = analyze_structure(&parse(src));
        assert!(result.arcs.contains(&Arc { from: 7, to: 1 }));
        assert!(result.arcs.contains(&Arc { from: 7, to: 10 }));
        assert!(result.arcs.contains(&Arc { from: 9, to: 1 }));
        assert!(result.arcs.contains(&Arc { from: 9, to: 10 }));
    }
}
