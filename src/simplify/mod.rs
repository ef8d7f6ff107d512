use rustc_hash::FxHashMap;

use crate::sat::{CoreSolver, Lit, Premise};
use crate::terms::{Literal, Term, TermStore, TermView};

/// A term rewriting hook. Returns `Some(u)` to rewrite the term to `u`,
/// `None` to leave it alone.
///
/// Hooks must be pure functions of their input and preserve the sort of
/// the term; the memoization caches below rely on it.
pub type SimplifyHook = Box<dyn Fn(&TermStore, Term) -> Option<Term>>;

/// A preprocessing hook. Like a [`SimplifyHook`], but it may intern
/// literals and introduce definitional clauses through the context.
pub type PreprocessHook = Box<dyn Fn(&TermStore, &mut PreprocessCtx, Term) -> Option<Term>>;

/// Handle given to preprocessing hooks for introducing definitional
/// clauses while a literal is being rewritten.
pub struct PreprocessCtx<'a> {
    core: &'a mut CoreSolver,
    store: &'a TermStore,
}

impl<'a> PreprocessCtx<'a> {
    pub(crate) fn new(core: &'a mut CoreSolver, store: &'a TermStore) -> Self {
        Self { core, store }
    }

    /// Interns a term as a positive literal.
    pub fn mk_lit(&mut self, t: Term) -> Lit {
        self.core.make_atom(Literal::new(self.store, t, true))
    }

    /// Asserts a definitional clause at level 0.
    pub fn add_clause(&mut self, lits: &[Literal]) {
        let data: Vec<Lit> = lits.iter().map(|&l| self.core.make_atom(l)).collect();
        self.core.add_clause(data, Premise::Hypothesis);
    }
}

/// Rebuilds a term with new children, preserving its shape.
fn rebuild(store: &TermStore, t: Term, children: &[Term]) -> Term {
    match store.view(t) {
        TermView::True | TermView::False | TermView::Const(..) => t,
        TermView::App(f, _) => store.app(f, children).expect("rewriting must preserve sorts"),
        TermView::Eq(..) => store.eq(children[0], children[1]).expect("rewriting must preserve sorts"),
        TermView::Not(_) => store.not(children[0]).expect("rewriting must preserve sorts"),
    }
}

fn children(store: &TermStore, t: Term) -> Vec<Term> {
    match store.view(t) {
        TermView::True | TermView::False | TermView::Const(..) => Vec::new(),
        TermView::App(_, args) => args,
        TermView::Eq(a, b) => vec![a, b],
        TermView::Not(u) => vec![u],
    }
}

/// A memoized fixed-point rewriter over a chain of hooks.
///
/// For every term, children are mapped first, then hooks are tried most
/// recently registered first. A successful rewrite restarts the process on
/// the rewritten term; the final result is cached.
#[derive(Default)]
pub struct Simplifier {
    hooks: Vec<SimplifyHook>,
    cache: FxHashMap<Term, Term>,
}

impl Simplifier {
    pub fn new() -> Self {
        Self { hooks: Vec::new(), cache: FxHashMap::default() }
    }

    /// Registers a hook. Hooks are tried most recently added first.
    pub fn add_hook(&mut self, hook: SimplifyHook) {
        self.hooks.push(hook);
    }

    /// Simplifies a term to a fixed point.
    pub fn simplify(&mut self, store: &TermStore, t: Term) -> Term {
        if let Some(&u) = self.cache.get(&t) {
            return u;
        }
        let kids = children(store, t);
        let mapped: Vec<Term> = kids.iter().map(|&k| self.simplify(store, k)).collect();
        let mut current = if mapped == kids { t } else { rebuild(store, t, &mapped) };
        'restart: loop {
            for hook in self.hooks.iter().rev() {
                if let Some(u) = hook(store, current) {
                    if u != current {
                        current = u;
                        let kids = children(store, current);
                        let mapped: Vec<Term> = kids.iter().map(|&k| self.simplify(store, k)).collect();
                        if mapped != kids {
                            current = rebuild(store, current, &mapped);
                        }
                        continue 'restart;
                    }
                }
            }
            break;
        }
        self.cache.insert(t, current);
        current
    }
}

/// Like [`Simplifier`], but hooks may introduce definitional clauses
/// through a [`PreprocessCtx`]. The cache makes preprocessing idempotent:
/// a second pass over the same term returns the cached result and
/// introduces no further clauses.
#[derive(Default)]
pub struct Preprocessor {
    hooks: Vec<PreprocessHook>,
    cache: FxHashMap<Term, Term>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self { hooks: Vec::new(), cache: FxHashMap::default() }
    }

    /// Registers a hook. Hooks are tried most recently added first.
    pub fn add_hook(&mut self, hook: PreprocessHook) {
        self.hooks.push(hook);
    }

    /// Preprocesses a term to a fixed point.
    pub fn preprocess(&mut self, store: &TermStore, ctx: &mut PreprocessCtx, t: Term) -> Term {
        if let Some(&u) = self.cache.get(&t) {
            return u;
        }
        let kids = children(store, t);
        let mapped: Vec<Term> = kids.iter().map(|&k| self.preprocess(store, ctx, k)).collect();
        let mut current = if mapped == kids { t } else { rebuild(store, t, &mapped) };
        'restart: loop {
            for hook in self.hooks.iter().rev() {
                if let Some(u) = hook(store, ctx, current) {
                    if u != current {
                        current = u;
                        let kids = children(store, current);
                        let mapped: Vec<Term> = kids.iter().map(|&k| self.preprocess(store, ctx, k)).collect();
                        if mapped != kids {
                            current = rebuild(store, current, &mapped);
                        }
                        continue 'restart;
                    }
                }
            }
            break;
        }
        self.cache.insert(t, current);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::{PreprocessCtx, Preprocessor, Simplifier};
    use crate::sat::CoreSolver;
    use crate::terms::{Literal, TermStore, TermView};

    #[test]
    fn test_fixed_point_rewrite() {
        let store = TermStore::new();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        let c = store.constant("c", u).unwrap();
        let mut simp = Simplifier::new();
        // a -> b, then b -> c: the chain must reach the fixed point c
        simp.add_hook(Box::new(move |s, t| (t == s.constant("a", s.sort("U")).unwrap()).then_some(b)));
        simp.add_hook(Box::new(move |s, t| (t == s.constant("b", s.sort("U")).unwrap()).then_some(c)));
        assert_eq!(simp.simplify(&store, a), c);
        assert_eq!(simp.simplify(&store, b), c);
        assert_eq!(simp.simplify(&store, c), c);
    }

    #[test]
    fn test_children_mapped_first() {
        let store = TermStore::new();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        let f = store.declare_fun("f", &[u], u).unwrap();
        let fa = store.app(f, &[a]).unwrap();
        let fb = store.app(f, &[b]).unwrap();
        let mut simp = Simplifier::new();
        simp.add_hook(Box::new(move |s, t| {
            (s.view(t) == TermView::Const(s.symbol("a"), s.sort("U"))).then_some(b)
        }));
        assert_eq!(simp.simplify(&store, fa), fb);
        // cached on the second pass
        assert_eq!(simp.simplify(&store, fa), fb);
    }

    #[test]
    fn test_preprocessing_is_idempotent() {
        let store = TermStore::new();
        let p = store.bool_const("p").unwrap();
        let d = store.bool_const("d").unwrap();
        let mut pre = Preprocessor::new();
        // rewrite p to d and assert the definitional clause (d | q)
        pre.add_hook(Box::new(move |s, ctx, t| {
            if t == s.bool_const("p").unwrap() {
                let definition = s.bool_const("d").unwrap();
                let guard = s.bool_const("q").unwrap();
                ctx.add_clause(&[Literal::new(s, definition, true), Literal::new(s, guard, true)]);
                Some(definition)
            } else {
                None
            }
        }));

        let mut core = CoreSolver::new();
        let mut ctx = PreprocessCtx::new(&mut core, &store);
        let first = pre.preprocess(&store, &mut ctx, p);
        assert_eq!(first, d);
        let clauses_after_first = core.n_vars();
        assert!(clauses_after_first > 0);

        let mut ctx = PreprocessCtx::new(&mut core, &store);
        let second = pre.preprocess(&store, &mut ctx, p);
        assert_eq!(second, first);
        // the cache answers the second pass, so no new atoms appear
        assert_eq!(core.n_vars(), clauses_after_first);
    }

    #[test]
    fn test_most_recent_hook_wins() {
        let store = TermStore::new();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        let c = store.constant("c", u).unwrap();
        let mut simp = Simplifier::new();
        simp.add_hook(Box::new(move |s, t| (t == s.constant("a", s.sort("U")).unwrap()).then_some(b)));
        simp.add_hook(Box::new(move |s, t| (t == s.constant("a", s.sort("U")).unwrap()).then_some(c)));
        assert_eq!(simp.simplify(&store, a), c);
    }
}
