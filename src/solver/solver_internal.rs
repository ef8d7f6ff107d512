use rustc_hash::FxHashSet;

use crate::sat::CoreSolver;
use crate::simplify::{PreprocessCtx, PreprocessHook, Preprocessor, Simplifier, SimplifyHook};
use crate::terms::{Literal, Term, TermStore, TermView};
use crate::theory::{CcEvent, CongruenceClosure, Consequence, MicroCc, TheoryArg, Theory, CC_LEMMA};

/// The bridge between the CDCL engine and the theory side: it owns the
/// congruence closure, the plugin chain, and the preprocessing caches, and
/// fans every dispatch out in registration order.
pub struct SolverInternal {
    cc: Box<dyn CongruenceClosure>,
    plugins: Vec<Box<dyn Theory>>,
    simplifier: Simplifier,
    preprocessor: Preprocessor,
    lifted: FxHashSet<Term>,
    level: usize,
}

impl SolverInternal {
    pub(crate) fn new(store: &TermStore) -> Self {
        Self {
            cc: Box::new(MicroCc::new(store)),
            plugins: Vec::new(),
            simplifier: Simplifier::new(),
            preprocessor: Preprocessor::new(),
            lifted: FxHashSet::default(),
            level: 0,
        }
    }

    pub(crate) fn add_theory(&mut self, theory: Box<dyn Theory>) {
        debug_assert_eq!(self.level, 0, "theories must be registered outside of solving");
        self.plugins.push(theory);
    }

    pub(crate) fn add_simplifier(&mut self, hook: SimplifyHook) {
        self.simplifier.add_hook(hook);
    }

    pub(crate) fn add_preprocessor(&mut self, hook: PreprocessHook) {
        self.preprocessor.add_hook(hook);
    }

    pub(crate) fn set_congruence_closure(&mut self, cc: Box<dyn CongruenceClosure>) {
        self.cc = cc;
    }

    /// Simplifies, preprocesses and rebuilds a literal with its original
    /// sign. Idempotent up to the caches; definitional clauses introduced
    /// by hooks land on the solver at once.
    pub(crate) fn preprocess_lit(&mut self, core: &mut CoreSolver, store: &TermStore, lit: Literal) -> Literal {
        let simplified = self.simplifier.simplify(store, lit.term());
        let mut ctx = PreprocessCtx::new(core, store);
        let processed = self.preprocessor.preprocess(store, &mut ctx, simplified);
        Literal::new(store, processed, lit.sign())
    }

    /// Ensures every boolean subterm reachable from `t` that is not itself
    /// a negation has a propositional atom, and binds the atom to its node
    /// in the congruence closure.
    pub(crate) fn bind_bool_subterms(&mut self, core: &mut CoreSolver, store: &TermStore, t: Term) {
        let mut stack = vec![t];
        while let Some(s) = stack.pop() {
            if !self.lifted.insert(s) {
                continue;
            }
            match store.view(s) {
                TermView::Not(u) => stack.push(u),
                TermView::App(_, args) => stack.extend(args),
                TermView::Eq(a, b) => {
                    stack.push(a);
                    stack.push(b);
                }
                TermView::True | TermView::False | TermView::Const(..) => {}
            }
            let is_negation = matches!(store.view(s), TermView::Not(_));
            if store.ty(s).is_bool() && !is_negation && s != store.verum() && s != store.falsum() {
                let lit = Literal::new(store, s, true);
                core.make_atom(lit);
                let node = self.cc.add_term(store, s);
                self.cc.set_as_lit(node, lit);
            }
        }
        self.relay_cc_events(core, store);
    }

    /// Dispatches a batch of asserted literals: the congruence closure
    /// first, then every plugin in registration order. `final_check` is
    /// the last dispatch before the engine reports a model.
    pub(crate) fn assert_lits(&mut self, core: &mut CoreSolver, store: &TermStore, final_check: bool, lits: &[Literal]) {
        if !final_check {
            self.cc.assert_lits(store, lits);
        }
        {
            let mut acts = TheoryArg::new(core, store);
            self.cc.check(store, &mut acts);
        }
        self.relay_cc_events(core, store);
        for plugin in &mut self.plugins {
            let mut acts = TheoryArg::new(core, store);
            if final_check {
                plugin.final_check(&mut acts);
            } else {
                plugin.partial_check(&mut acts, lits);
            }
        }
    }

    /// Fans a drained event out to every plugin; for conflicts and
    /// propagations the engine action follows, so plugins observe the
    /// closure's reasoning before it takes effect.
    fn relay_cc_events(&mut self, core: &mut CoreSolver, store: &TermStore) {
        for event in self.cc.drain_events() {
            match &event {
                CcEvent::NewTerm(t) => {
                    for plugin in &mut self.plugins {
                        plugin.on_cc_new_term(store, *t);
                    }
                }
                CcEvent::PreMerge(a, b) => {
                    for plugin in &mut self.plugins {
                        let mut acts = TheoryArg::new(core, store);
                        plugin.on_cc_pre_merge(&mut acts, *a, *b);
                    }
                }
                CcEvent::PostMerge(a, b) => {
                    for plugin in &mut self.plugins {
                        let mut acts = TheoryArg::new(core, store);
                        plugin.on_cc_post_merge(&mut acts, *a, *b);
                    }
                }
                CcEvent::Conflict(lits) => {
                    for plugin in &mut self.plugins {
                        let mut acts = TheoryArg::new(core, store);
                        plugin.on_cc_conflict(&mut acts, lits);
                    }
                    let mut acts = TheoryArg::new(core, store);
                    acts.raise_conflict(lits, CC_LEMMA);
                }
                CcEvent::Propagate(lit, reason) => {
                    for plugin in &mut self.plugins {
                        let mut acts = TheoryArg::new(core, store);
                        plugin.on_cc_propagate(&mut acts, *lit, reason);
                    }
                    let mut acts = TheoryArg::new(core, store);
                    acts.propagate(*lit, Consequence::from_lits(reason.clone(), CC_LEMMA));
                }
            }
        }
    }

    /// Opens a speculative level on the closure and every plugin.
    pub(crate) fn push_level(&mut self) {
        self.level += 1;
        self.cc.push_level();
        for plugin in &mut self.plugins {
            plugin.push_level();
        }
    }

    /// Closes the last `n` speculative levels everywhere.
    pub(crate) fn pop_levels(&mut self, n: usize) {
        debug_assert!(n <= self.level);
        self.level -= n.min(self.level);
        self.cc.pop_levels(n);
        for plugin in &mut self.plugins {
            plugin.pop_levels(n);
        }
    }
}
