use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::sat::{ProofToken, Tristate};
use crate::terms::{FunSym, Literal, Term, TermStore, TermView};

use super::TheoryArg;

/// The proof token attached to lemmas produced by the congruence closure.
pub const CC_LEMMA: ProofToken = ProofToken(0);

/// A node in the congruence closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeId(pub u32);

/// Events emitted by the congruence closure, relayed to theory plugins by
/// the theory interface.
///
/// `Conflict` and `Propagate` are also how the closure reaches the engine:
/// the theory interface fans each one out to the plugins first and then
/// performs the corresponding engine action, so plugins observe every
/// piece of CC-driven reasoning before it takes effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CcEvent {
    /// A term entered the closure.
    NewTerm(Term),
    /// Two classes, given by their representative terms, are about to
    /// merge.
    PreMerge(Term, Term),
    /// Two classes have merged.
    PostMerge(Term, Term),
    /// The closure found the asserted literals inconsistent; the payload
    /// is the conflict clause (each literal false under the trail).
    Conflict(Vec<Literal>),
    /// The closure wants to propagate a literal, justified by the listed
    /// asserted literals.
    Propagate(Literal, Vec<Literal>),
}

/// The contract the theory interface consumes for equality reasoning.
///
/// Only the theory interface calls `assert_lits`, `push_level` and
/// `pop_levels`; plugins may observe the closure through `find`, `merge`
/// and `explain`.
pub trait CongruenceClosure {
    /// Adds a term (and its subterms) to the closure.
    fn add_term(&mut self, store: &TermStore, t: Term) -> NodeId;

    /// The representative of a node's class.
    fn find(&self, n: NodeId) -> NodeId;

    /// Merges two classes, justified by an asserted literal.
    fn merge(&mut self, store: &TermStore, a: NodeId, b: NodeId, expl: Literal);

    /// Binds a boolean atom to a node so the closure can propagate it when
    /// the node joins the class of `true` or `false`.
    fn set_as_lit(&mut self, n: NodeId, lit: Literal);

    /// Digests a batch of asserted literals.
    fn assert_lits(&mut self, store: &TermStore, lits: &[Literal]);

    /// Surfaces pending propagations or a conflict, either directly
    /// through the handle or as `Conflict`/`Propagate` events which the
    /// theory interface performs after fanning them out to the plugins.
    fn check(&mut self, store: &TermStore, acts: &mut TheoryArg);

    /// The asserted literals under which `a` and `b` are congruent.
    fn explain(&self, store: &TermStore, a: NodeId, b: NodeId) -> Vec<Literal>;

    /// Opens a speculative level.
    fn push_level(&mut self);

    /// Closes the last `n` speculative levels.
    fn pop_levels(&mut self, n: usize);

    /// Drains the events accumulated since the last call.
    fn drain_events(&mut self) -> Vec<CcEvent>;
}

#[derive(Debug, Clone)]
enum EdgeExpl {
    Lit(Literal),
    Cong(NodeId, NodeId),
}

#[derive(Debug, Clone)]
struct Node {
    term: Term,
    parent: NodeId,
    size: u32,
    expl: Option<(NodeId, EdgeExpl)>,
    lit: Option<Literal>,
}

enum UndoOp {
    Union { child: NodeId, parent: NodeId },
    Expl { node: NodeId, old: Option<(NodeId, EdgeExpl)> },
}

struct Mark {
    undo_len: usize,
    diseq_len: usize,
}

/// A compact congruence closure: union-find with an undo trail, an
/// explanation forest whose edges carry asserted literals or congruence
/// justifications, and a signature table for one-step congruence
/// propagation.
pub struct MicroCc {
    nodes: Vec<Node>,
    ids: FxHashMap<Term, NodeId>,
    apps: Vec<NodeId>,
    sig_table: FxHashMap<(FunSym, Vec<NodeId>), NodeId>,
    atoms: Vec<NodeId>,
    diseqs: Vec<(NodeId, NodeId, Literal)>,
    true_node: NodeId,
    false_node: NodeId,
    pending: VecDeque<(NodeId, NodeId, EdgeExpl)>,
    undo: Vec<UndoOp>,
    marks: Vec<Mark>,
    events: Vec<CcEvent>,
    conflict: Option<Vec<Literal>>,
}

impl MicroCc {
    /// Creates a closure over the given store's boolean constants.
    pub fn new(store: &TermStore) -> Self {
        let mut cc = Self {
            nodes: Vec::new(),
            ids: FxHashMap::default(),
            apps: Vec::new(),
            sig_table: FxHashMap::default(),
            atoms: Vec::new(),
            diseqs: Vec::new(),
            true_node: NodeId(0),
            false_node: NodeId(0),
            pending: VecDeque::new(),
            undo: Vec::new(),
            marks: Vec::new(),
            events: Vec::new(),
            conflict: None,
        };
        cc.true_node = cc.new_node(store.verum());
        cc.false_node = cc.new_node(store.falsum());
        cc
    }

    fn n(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn n_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn new_node(&mut self, term: Term) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("congruence closure overflow"));
        self.nodes.push(Node { term, parent: id, size: 1, expl: None, lit: None });
        self.ids.insert(term, id);
        id
    }

    fn signature(&self, f: FunSym, args: &[Term]) -> (FunSym, Vec<NodeId>) {
        (f, args.iter().map(|&a| self.find(self.ids[&a])).collect())
    }

    /// Recomputes the signature table under the current union-find and
    /// queues congruent application pairs for merging.
    fn rescan_signatures(&mut self, store: &TermStore) {
        self.sig_table.clear();
        for i in 0..self.apps.len() {
            let app = self.apps[i];
            let TermView::App(f, args) = store.view(self.n(app).term) else {
                unreachable!("non-application in the app index")
            };
            let sig = self.signature(f, &args);
            if let Some(&other) = self.sig_table.get(&sig) {
                if self.find(other) != self.find(app) {
                    self.pending.push_back((app, other, EdgeExpl::Cong(app, other)));
                }
            } else {
                self.sig_table.insert(sig, app);
            }
        }
    }

    /// Inverts the explanation path from `a` to its root so `a` becomes
    /// the root of its explanation tree.
    fn reroot_expl(&mut self, a: NodeId) {
        let mut path = Vec::new();
        let mut cur = a;
        while let Some((next, e)) = self.n(cur).expl.clone() {
            path.push((cur, next, e));
            cur = next;
        }
        for (from, to, e) in path {
            self.undo.push(UndoOp::Expl { node: to, old: self.n(to).expl.clone() });
            self.n_mut(to).expl = Some((from, e));
        }
        self.undo.push(UndoOp::Expl { node: a, old: self.n(a).expl.clone() });
        self.n_mut(a).expl = None;
    }

    fn merge_pending(&mut self, store: &TermStore, a: NodeId, b: NodeId, expl: EdgeExpl) {
        self.pending.push_back((a, b, expl));
        self.process_pending(store);
    }

    fn process_pending(&mut self, store: &TermStore) {
        while let Some((a, b, expl)) = self.pending.pop_front() {
            if self.conflict.is_some() {
                self.pending.clear();
                return;
            }
            let ra = self.find(a);
            let rb = self.find(b);
            if ra == rb {
                continue;
            }
            self.events.push(CcEvent::PreMerge(self.n(ra).term, self.n(rb).term));

            self.reroot_expl(a);
            self.undo.push(UndoOp::Expl { node: a, old: self.n(a).expl.clone() });
            self.n_mut(a).expl = Some((b, expl));

            let (child, parent) = if self.n(ra).size <= self.n(rb).size { (ra, rb) } else { (rb, ra) };
            self.undo.push(UndoOp::Union { child, parent });
            self.n_mut(child).parent = parent;
            let child_size = self.n(child).size;
            self.n_mut(parent).size += child_size;

            self.events.push(CcEvent::PostMerge(self.n(child).term, self.n(parent).term));

            if self.find(self.true_node) == self.find(self.false_node) {
                self.conflict = Some(self.explain_nodes(store, self.true_node, self.false_node));
                self.pending.clear();
                return;
            }
            self.rescan_signatures(store);
        }
        for i in 0..self.diseqs.len() {
            let (x, y, lit) = self.diseqs[i];
            if self.find(x) == self.find(y) {
                let mut core = self.explain_nodes(store, x, y);
                core.push(lit);
                self.conflict = Some(core);
                return;
            }
        }
    }

    fn expl_root_path(&self, mut n: NodeId) -> Vec<NodeId> {
        let mut path = vec![n];
        while let Some((next, _)) = &self.n(n).expl {
            n = *next;
            path.push(*next);
        }
        path
    }

    fn explain_nodes(&self, store: &TermStore, a: NodeId, b: NodeId) -> Vec<Literal> {
        let mut out = Vec::new();
        self.explain_into(store, a, b, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn explain_into(&self, store: &TermStore, a: NodeId, b: NodeId, out: &mut Vec<Literal>) {
        if a == b {
            return;
        }
        let path_a = self.expl_root_path(a);
        let path_b = self.expl_root_path(b);
        let lca = *path_a
            .iter()
            .find(|n| path_b.contains(n))
            .expect("explain called on nodes in different classes");
        for &start in &[a, b] {
            let mut cur = start;
            while cur != lca {
                let (next, edge) = self.n(cur).expl.clone().expect("explanation path ended before the common ancestor");
                match edge {
                    EdgeExpl::Lit(l) => out.push(l),
                    EdgeExpl::Cong(p, q) => {
                        let (TermView::App(_, p_args), TermView::App(_, q_args)) =
                            (store.view(self.n(p).term), store.view(self.n(q).term))
                        else {
                            unreachable!("congruence edge between non-applications")
                        };
                        for (&pa, &qa) in p_args.iter().zip(q_args.iter()) {
                            self.explain_into(store, self.ids[&pa], self.ids[&qa], out);
                        }
                    }
                }
                cur = next;
            }
        }
    }

    fn propagate_atoms(&mut self, store: &TermStore, acts: &TheoryArg) {
        for i in 0..self.atoms.len() {
            let n = self.atoms[i];
            let Some(lit) = self.n(n).lit else { continue };
            let r = self.find(n);
            if r == self.find(self.true_node) && n != self.true_node {
                if acts.value(lit) != Tristate::True {
                    let expl = self.explain_nodes(store, n, self.true_node);
                    self.events.push(CcEvent::Propagate(lit, expl));
                }
                continue;
            }
            if r == self.find(self.false_node) && n != self.false_node && acts.value(lit.negate()) != Tristate::True {
                let expl = self.explain_nodes(store, n, self.false_node);
                self.events.push(CcEvent::Propagate(lit.negate(), expl));
                continue;
            }
            // equality atoms propagate from their sides as well
            if let TermView::Eq(x, y) = store.view(self.n(n).term) {
                let (Some(&nx), Some(&ny)) = (self.ids.get(&x), self.ids.get(&y)) else { continue };
                if self.find(nx) == self.find(ny) {
                    if acts.value(lit) != Tristate::True {
                        let expl = self.explain_nodes(store, nx, ny);
                        self.events.push(CcEvent::Propagate(lit, expl));
                    }
                    continue;
                }
                for j in 0..self.diseqs.len() {
                    let (u, v, dl) = self.diseqs[j];
                    let same = self.find(u) == self.find(nx) && self.find(v) == self.find(ny);
                    let swapped = self.find(u) == self.find(ny) && self.find(v) == self.find(nx);
                    if (same || swapped) && acts.value(lit.negate()) != Tristate::True {
                        let (first, second) = if same { (nx, ny) } else { (ny, nx) };
                        let mut expl = self.explain_nodes(store, u, first);
                        expl.extend(self.explain_nodes(store, v, second));
                        expl.push(dl);
                        self.events.push(CcEvent::Propagate(lit.negate(), expl));
                        break;
                    }
                }
            }
        }
    }
}

impl CongruenceClosure for MicroCc {
    fn add_term(&mut self, store: &TermStore, t: Term) -> NodeId {
        if let Some(&id) = self.ids.get(&t) {
            return id;
        }
        match store.view(t) {
            TermView::True => return self.true_node,
            TermView::False => return self.false_node,
            TermView::App(_, ref args) => {
                for &a in args {
                    self.add_term(store, a);
                }
            }
            TermView::Eq(a, b) => {
                self.add_term(store, a);
                self.add_term(store, b);
            }
            TermView::Const(..) | TermView::Not(_) => {}
        }
        let id = self.new_node(t);
        if let TermView::App(f, args) = store.view(t) {
            self.apps.push(id);
            let sig = self.signature(f, &args);
            if let Some(&other) = self.sig_table.get(&sig) {
                if self.find(other) != self.find(id) {
                    self.pending.push_back((id, other, EdgeExpl::Cong(id, other)));
                    self.process_pending(store);
                }
            } else {
                self.sig_table.insert(sig, id);
            }
        }
        self.events.push(CcEvent::NewTerm(t));
        id
    }

    fn find(&self, mut n: NodeId) -> NodeId {
        while self.n(n).parent != n {
            n = self.n(n).parent;
        }
        n
    }

    fn merge(&mut self, store: &TermStore, a: NodeId, b: NodeId, expl: Literal) {
        self.merge_pending(store, a, b, EdgeExpl::Lit(expl));
    }

    fn set_as_lit(&mut self, n: NodeId, lit: Literal) {
        if self.n(n).lit.is_none() {
            self.n_mut(n).lit = Some(lit);
            self.atoms.push(n);
        }
    }

    fn assert_lits(&mut self, store: &TermStore, lits: &[Literal]) {
        for &lit in lits {
            if self.conflict.is_some() {
                return;
            }
            let t = lit.term();
            match store.view(t) {
                TermView::True | TermView::False => {}
                TermView::Eq(x, y) => {
                    let nx = self.add_term(store, x);
                    let ny = self.add_term(store, y);
                    if lit.sign() {
                        self.merge_pending(store, nx, ny, EdgeExpl::Lit(lit));
                    } else {
                        self.diseqs.push((nx, ny, lit));
                        self.process_pending(store);
                    }
                }
                _ => {
                    let n = self.add_term(store, t);
                    let target = if lit.sign() { self.true_node } else { self.false_node };
                    self.merge_pending(store, n, target, EdgeExpl::Lit(lit));
                }
            }
        }
    }

    fn check(&mut self, store: &TermStore, acts: &mut TheoryArg) {
        if let Some(core) = self.conflict.take() {
            let clause: Vec<Literal> = core.iter().map(|l| l.negate()).collect();
            self.events.push(CcEvent::Conflict(clause));
            return;
        }
        self.propagate_atoms(store, acts);
    }

    fn explain(&self, store: &TermStore, a: NodeId, b: NodeId) -> Vec<Literal> {
        self.explain_nodes(store, a, b)
    }

    fn push_level(&mut self) {
        self.marks.push(Mark { undo_len: self.undo.len(), diseq_len: self.diseqs.len() });
    }

    fn pop_levels(&mut self, n: usize) {
        for _ in 0..n {
            let Some(mark) = self.marks.pop() else { break };
            while self.undo.len() > mark.undo_len {
                match self.undo.pop().unwrap() {
                    UndoOp::Union { child, parent } => {
                        self.n_mut(child).parent = child;
                        let child_size = self.n(child).size;
                        self.n_mut(parent).size -= child_size;
                    }
                    UndoOp::Expl { node, old } => self.n_mut(node).expl = old,
                }
            }
            self.diseqs.truncate(mark.diseq_len);
        }
        self.pending.clear();
        self.conflict = None;
        self.sig_table.clear();
    }

    fn drain_events(&mut self) -> Vec<CcEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::{CcEvent, CongruenceClosure, MicroCc};
    use crate::terms::{Literal, TermStore};

    fn setup() -> TermStore {
        TermStore::new()
    }

    #[test]
    fn test_transitive_merge_and_explain() {
        let store = setup();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        let c = store.constant("c", u).unwrap();
        let mut cc = MicroCc::new(&store);
        let lab = Literal::new(&store, store.eq(a, b).unwrap(), true);
        let lbc = Literal::new(&store, store.eq(b, c).unwrap(), true);
        cc.push_level();
        cc.assert_lits(&store, &[lab, lbc]);
        let (na, nc) = (cc.add_term(&store, a), cc.add_term(&store, c));
        assert_eq!(cc.find(na), cc.find(nc));
        let mut expl = cc.explain(&store, na, nc);
        expl.sort_unstable();
        let mut expected = vec![lab, lbc];
        expected.sort_unstable();
        assert_eq!(expl, expected);
        cc.pop_levels(1);
        assert_ne!(cc.find(na), cc.find(nc));
    }

    #[test]
    fn test_congruence() {
        let store = setup();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        let f = store.declare_fun("f", &[u], u).unwrap();
        let fa = store.app(f, &[a]).unwrap();
        let fb = store.app(f, &[b]).unwrap();
        let mut cc = MicroCc::new(&store);
        let nfa = cc.add_term(&store, fa);
        let nfb = cc.add_term(&store, fb);
        assert_ne!(cc.find(nfa), cc.find(nfb));
        let lab = Literal::new(&store, store.eq(a, b).unwrap(), true);
        cc.assert_lits(&store, &[lab]);
        assert_eq!(cc.find(nfa), cc.find(nfb));
        assert_eq!(cc.explain(&store, nfa, nfb), vec![lab]);
    }

    #[test]
    fn test_events_are_drained() {
        let store = setup();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let mut cc = MicroCc::new(&store);
        cc.add_term(&store, a);
        let events = cc.drain_events();
        assert!(events.contains(&CcEvent::NewTerm(a)));
        assert!(cc.drain_events().is_empty());
    }

    #[test]
    fn test_conflict_becomes_an_event() {
        let store = setup();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        let eq = store.eq(a, b).unwrap();
        let leq = Literal::new(&store, eq, true);
        let mut cc = MicroCc::new(&store);
        cc.assert_lits(&store, &[leq, leq.negate()]);
        let mut core = crate::sat::CoreSolver::new();
        let mut acts = crate::theory::TheoryArg::new(&mut core, &store);
        cc.check(&store, &mut acts);
        let events = cc.drain_events();
        assert!(events.iter().any(|e| matches!(e, CcEvent::Conflict(_))));
    }
}
