// Minisat Copyrights
//
// Copyright (c) 2003-2006, Niklas Een, Niklas Sorensson
// Copyright (c) 2007-2010, Niklas Sorensson
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
// associated documentation files (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge, publish, distribute,
// sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
// NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
// OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::collections::{VarHeap, VEC_INIT_SIZE};
use crate::solver::{ClauseMinimization, SolverConfig, SolverStats};
use crate::terms::Literal;

use super::{
    mk_lit, not, sign, var, Clause, ClauseRef, DeferredId, Lit, Premise, ProofToken, Reason, Tristate, Var, VarState, Watcher,
};

/// A deferred theory explanation: called at most once, when conflict
/// analysis needs the reason of a theory-propagated literal. Yields the
/// implying literals and the lemma's proof token.
pub type DeferredExplain = Box<dyn FnOnce() -> (Vec<Literal>, ProofToken)>;

/// Outcome of installing a clause under the current trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    /// The clause is attached (or subsumed) and the trail is unchanged or
    /// extended by propagation.
    Ok,
    /// The clause is falsified under the current trail.
    Conflict(ClauseRef),
}

/// Snapshot of the solver state, restorable with
/// [`CoreSolver::load_state`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SolverState {
    id: usize,
    ok: bool,
    vars_size: usize,
    all_clause_size: usize,
    clause_size: usize,
}

/// The CDCL engine: clause database, trail, watched-literal propagation,
/// conflict analysis, and the callback surface used by the theory layer.
///
/// The search loop itself lives in the top-level solver, which interleaves
/// propagation with theory checks.
pub struct CoreSolver {
    pub(crate) config: SolverConfig,

    // mapping of term literals to variable indices
    lit_map: FxHashMap<Literal, Var>,
    var_lits: Vec<Literal>,

    // internal solver state
    ok: bool,
    root_conflict: Option<ClauseRef>,
    qhead: usize,
    th_head: usize,
    pub(crate) all_clauses: Vec<Clause>,
    clauses: Vec<ClauseRef>,
    learnts: Vec<ClauseRef>,
    watches: Vec<Vec<Watcher>>,
    pub(crate) vars: Vec<VarState>,
    activities: Vec<f64>,
    order_heap: VarHeap,
    pub(crate) trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    cla_inc: f64,
    var_inc: f64,
    var_decay: f64,
    max_learnts: f64,
    learntsize_adjust_confl: f64,
    learntsize_adjust_cnt: isize,

    // side outputs of `analyze`
    pub(crate) analyze_bt_level: usize,
    pub(crate) analyze_history: Vec<ClauseRef>,

    // theory callback state
    deferred: Vec<Option<DeferredExplain>>,
    pending_conflict: Option<ClauseRef>,
    pending_clauses: Vec<(Vec<Lit>, bool, ProofToken)>,
    incomplete: bool,

    valid_states: Vec<usize>,
    next_state_id: usize,

    rng: fastrand::Rng,
    pub(crate) stats: SolverStats,
}

impl Default for CoreSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreSolver {
    /// Constructs a new solver with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_config(SolverConfig::default())
    }

    /// Constructs a new solver with custom configuration.
    pub fn new_with_config(config: SolverConfig) -> Self {
        let rng = fastrand::Rng::with_seed(config.low_level_config().random_seed());
        Self {
            lit_map: FxHashMap::default(),
            var_lits: Vec::with_capacity(VEC_INIT_SIZE),
            ok: true,
            root_conflict: None,
            qhead: 0,
            th_head: 0,
            all_clauses: Vec::with_capacity(VEC_INIT_SIZE),
            clauses: Vec::with_capacity(VEC_INIT_SIZE),
            learnts: Vec::with_capacity(VEC_INIT_SIZE),
            watches: Vec::with_capacity(VEC_INIT_SIZE),
            vars: Vec::with_capacity(VEC_INIT_SIZE),
            activities: Vec::with_capacity(VEC_INIT_SIZE),
            order_heap: VarHeap::new(),
            trail: Vec::with_capacity(VEC_INIT_SIZE),
            trail_lim: Vec::with_capacity(VEC_INIT_SIZE),
            cla_inc: 1.0,
            var_inc: config.low_level_config().var_inc(),
            var_decay: config.low_level_config().var_decay(),
            max_learnts: 0.0,
            learntsize_adjust_confl: 0.0,
            learntsize_adjust_cnt: 0,
            analyze_bt_level: 0,
            analyze_history: Vec::new(),
            deferred: Vec::new(),
            pending_conflict: None,
            pending_clauses: Vec::new(),
            incomplete: false,
            valid_states: Vec::with_capacity(VEC_INIT_SIZE),
            next_state_id: 0,
            rng,
            stats: SolverStats::default(),
            config,
        }
    }

    pub(crate) fn c(&self, cls: ClauseRef) -> &Clause {
        &self.all_clauses[cls.0]
    }

    pub(crate) fn c_mut(&mut self, cls: ClauseRef) -> &mut Clause {
        &mut self.all_clauses[cls.0]
    }

    pub(crate) fn v(&self, lit: Lit) -> &VarState {
        &self.vars[var(lit).0]
    }

    pub(crate) fn v_mut(&mut self, lit: Lit) -> &mut VarState {
        &mut self.vars[var(lit).0]
    }

    pub(crate) fn value(&self, lit: Lit) -> Tristate {
        let val = self.v(lit).assignment;
        if sign(lit) {
            val.negate()
        } else {
            val
        }
    }

    /// `false` once the clause database is unsatisfiable at level 0.
    pub const fn ok(&self) -> bool {
        self.ok
    }

    /// The clause which falsified the database at level 0, if any.
    pub(crate) const fn root_conflict(&self) -> Option<ClauseRef> {
        self.root_conflict
    }

    pub(crate) fn set_root_conflict(&mut self, cls: ClauseRef) {
        self.ok = false;
        if self.root_conflict.is_none() {
            self.root_conflict = Some(cls);
        }
    }

    /// The number of variables on the solver.
    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }

    /// The number of currently assigned variables.
    pub fn n_assigns(&self) -> usize {
        self.trail.len()
    }

    pub(crate) fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    /// Creates a new internal variable.
    pub fn new_var(&mut self, polarity: bool, decision: bool) -> Var {
        let v = Var(self.vars.len());
        self.vars.push(VarState::new(polarity, decision));
        self.activities.push(0.0);
        self.watches.push(Vec::with_capacity(VEC_INIT_SIZE));
        self.watches.push(Vec::with_capacity(VEC_INIT_SIZE));
        self.insert_var_order(v);
        v
    }

    /// Interns a term literal, creating the variable on first sight.
    ///
    /// Two literals differing only in sign share one variable; the returned
    /// SAT literal carries the sign.
    pub fn make_atom(&mut self, lit: Literal) -> Lit {
        let (pos, _) = lit.norm();
        let v = if let Some(&v) = self.lit_map.get(&pos) {
            v
        } else {
            let v = self.new_var(self.config.initial_phase(), true);
            self.lit_map.insert(pos, v);
            self.var_lits.push(pos);
            v
        };
        mk_lit(v, !lit.sign())
    }

    /// Looks up the variable of a term literal without creating it.
    pub fn atom_of(&self, lit: Literal) -> Option<Lit> {
        let (pos, _) = lit.norm();
        self.lit_map.get(&pos).map(|&v| mk_lit(v, !lit.sign()))
    }

    /// The term literal a SAT literal stands for.
    pub fn term_lit(&self, lit: Lit) -> Literal {
        let pos = self.var_lits[var(lit).0];
        if sign(lit) {
            pos.negate()
        } else {
            pos
        }
    }

    /// The boolean currently assigned to a variable, if any.
    pub fn var_value(&self, v: Var) -> Tristate {
        self.vars[v.0].assignment
    }

    /// Iterates over all interned positive term literals with their
    /// variables.
    pub(crate) fn var_literals(&self) -> impl Iterator<Item = (Var, Literal)> + '_ {
        self.var_lits.iter().enumerate().map(|(i, &l)| (Var(i), l))
    }

    /// The literals currently on the trail, as term literals in assignment
    /// order.
    pub fn trail_literals(&self) -> impl Iterator<Item = Literal> + '_ {
        self.trail.iter().map(|&l| self.term_lit(l))
    }

    /// The slice of the trail the theory layer has not seen yet.
    pub(crate) fn theory_batch(&self) -> Vec<Literal> {
        self.trail[self.th_head..].iter().map(|&l| self.term_lit(l)).collect()
    }

    pub(crate) fn advance_theory_head(&mut self) {
        self.th_head = self.trail.len();
    }

    pub(crate) const fn theory_head(&self) -> usize {
        self.th_head
    }

    fn add_new_clause(&mut self, clause: Clause) -> ClauseRef {
        let index = self.all_clauses.len();
        self.all_clauses.push(clause);
        ClauseRef(index)
    }

    /// Installs a clause under the current trail.
    ///
    /// Duplicate literals are removed and tautologies dropped. With proof
    /// generation off, literals false at level 0 are removed and clauses
    /// satisfied at level 0 dropped; with proofs on the stored clause is
    /// exactly what the caller passed, so hypothesis leaves match the
    /// user's assertions.
    pub(crate) fn install_clause(&mut self, mut ps: Vec<Lit>, premise: Premise, keep: bool) -> Installed {
        if !self.ok {
            return Installed::Ok;
        }
        ps.sort_unstable();
        ps.dedup();
        let mut p = Lit::UNDEF;
        for &elem in &ps {
            if elem == not(p) {
                return Installed::Ok;
            }
            p = elem;
        }
        if !self.config.proof_generation() {
            if ps.iter().any(|&l| self.value(l) == Tristate::True && self.v(l).level == Some(0)) {
                return Installed::Ok;
            }
            ps.retain(|&l| !(self.value(l) == Tristate::False && self.v(l).level == Some(0)));
        }

        // the two best watch candidates move to the front
        ps.sort_unstable_by_key(|&l| match self.value(l) {
            Tristate::True | Tristate::Undef => 0,
            Tristate::False => 1 + self.vars.len() - self.v(l).level.unwrap_or(0),
        });

        let learnt_on_state = if keep { None } else { Some(self.next_state_id) };
        let clause = Clause::new(ps, premise, learnt_on_state);
        let cls = self.add_new_clause(clause);
        if keep {
            self.clauses.push(cls);
        } else {
            self.learnts.push(cls);
        }

        let len = self.all_clauses[cls.0].len();
        if len == 0 {
            self.set_root_conflict(cls);
            return Installed::Conflict(cls);
        }
        let first = self.all_clauses[cls.0].get(0);
        let unit = len == 1 || self.value(self.all_clauses[cls.0].get(1)) == Tristate::False;
        if len >= 2 {
            self.attach_clause(cls);
        }
        if self.value(first) == Tristate::False {
            if self.decision_level() == 0 {
                self.set_root_conflict(cls);
            }
            return Installed::Conflict(cls);
        }
        if unit && self.value(first) == Tristate::Undef {
            self.unchecked_enqueue(first, Some(Reason::Clause(cls)));
            if let Some(confl) = self.propagate() {
                if self.decision_level() == 0 {
                    self.set_root_conflict(confl);
                }
                return Installed::Conflict(confl);
            }
        }
        Installed::Ok
    }

    /// Adds a clause at level 0. Returns `false` if the database became
    /// unsatisfiable.
    pub fn add_clause(&mut self, ps: Vec<Lit>, premise: Premise) -> bool {
        debug_assert_eq!(self.decision_level(), 0);
        matches!(self.install_clause(ps, premise, true), Installed::Ok) && self.ok
    }

    pub(crate) fn unchecked_enqueue(&mut self, lit: Lit, reason: Option<Reason>) {
        debug_assert!(self.value(lit) == Tristate::Undef);
        let level = self.decision_level();
        let v = self.v_mut(lit);
        v.assignment = Tristate::from_bool(!sign(lit));
        v.reason = reason;
        v.level = Some(level);
        self.trail.push(lit);
        self.stats.propagations += 1;
    }

    pub(crate) fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    pub(crate) fn attach_clause(&mut self, cls: ClauseRef) {
        let clause = &mut self.all_clauses[cls.0];
        debug_assert!(clause.len() > 1 && !clause.attached);
        clause.attached = true;
        let lit0 = clause.get(0);
        let lit1 = clause.get(1);
        self.watches[not(lit0).0].push(Watcher { clause_ref: cls, blocking_lit: lit1 });
        self.watches[not(lit1).0].push(Watcher { clause_ref: cls, blocking_lit: lit0 });
    }

    pub(crate) fn detach_clause(&mut self, cls: ClauseRef) {
        let c = &self.all_clauses[cls.0];
        debug_assert!(c.attached);
        let w0 = not(c.get(0)).0;
        let w1 = not(c.get(1)).0;
        self.watches[w0].retain(|w| w.clause_ref != cls);
        self.watches[w1].retain(|w| w.clause_ref != cls);
        self.all_clauses[cls.0].attached = false;
    }

    fn remove_learnt(&mut self, cls: ClauseRef) {
        if self.all_clauses[cls.0].attached {
            self.detach_clause(cls);
        }
        if self.locked(cls) {
            let first = self.all_clauses[cls.0].get(0);
            self.v_mut(first).reason = None;
        }
    }

    pub(crate) fn locked(&self, cls: ClauseRef) -> bool {
        let c = self.c(cls);
        !c.is_empty()
            && self.value(c.get(0)) == Tristate::True
            && self.v(c.get(0)).reason.is_some_and(|r| r == Reason::Clause(cls))
    }

    /// Boolean constraint propagation. Consumes the trail from the watch
    /// cursor and returns a conflicting clause, if any.
    pub(crate) fn propagate(&mut self) -> Option<ClauseRef> {
        let mut confl = self.pending_conflict.take();
        while confl.is_none() && self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            let false_lit = not(p);
            let mut i_ind = 0;
            let mut j_ind = 0;
            'watches: while i_ind < self.watches[p.0].len() {
                let watcher = &self.watches[p.0][i_ind];
                let blocker = watcher.blocking_lit;
                if blocker != Lit::UNDEF && self.value(blocker) == Tristate::True {
                    self.watches[p.0][j_ind] = watcher.clone();
                    j_ind += 1;
                    i_ind += 1;
                    continue;
                }
                let cls = watcher.clause_ref;
                i_ind += 1;
                let c = &self.all_clauses[cls.0];
                if c.get(0) == false_lit {
                    let l1 = c.get(1);
                    self.all_clauses[cls.0].set(0, l1);
                    self.all_clauses[cls.0].set(1, false_lit);
                }
                let c = &self.all_clauses[cls.0];
                debug_assert_eq!(c.get(1), false_lit);
                let first = c.get(0);
                if first != blocker && self.value(first) == Tristate::True {
                    self.watches[p.0][j_ind] = Watcher { clause_ref: cls, blocking_lit: first };
                    j_ind += 1;
                    continue;
                }
                for k in 2..c.len() {
                    let k_lit = c.get(k);
                    if self.value(k_lit) != Tristate::False {
                        self.all_clauses[cls.0].set(1, k_lit);
                        self.all_clauses[cls.0].set(k, false_lit);
                        self.watches[not(k_lit).0].push(Watcher { clause_ref: cls, blocking_lit: first });
                        continue 'watches;
                    }
                }
                // no replacement watch: unit or conflict
                self.watches[p.0][j_ind] = Watcher { clause_ref: cls, blocking_lit: first };
                j_ind += 1;
                if self.value(first) == Tristate::False {
                    confl = Some(cls);
                    self.qhead = self.trail.len();
                    while i_ind < self.watches[p.0].len() {
                        self.watches[p.0].swap(j_ind, i_ind);
                        j_ind += 1;
                        i_ind += 1;
                    }
                } else {
                    self.unchecked_enqueue(first, Some(Reason::Clause(cls)));
                }
            }
            self.watches[p.0].truncate(j_ind);
        }
        if confl.is_some() && self.decision_level() == 0 {
            self.ok = false;
            if self.root_conflict.is_none() {
                self.root_conflict = confl;
            }
        }
        confl
    }

    pub(crate) fn cancel_until(&mut self, level: usize) {
        if self.decision_level() > level {
            for c in (self.trail_lim[level]..self.trail.len()).rev() {
                let lit = self.trail[c];
                let x = var(lit);
                let v = &mut self.vars[x.0];
                v.assignment = Tristate::Undef;
                v.reason = None;
                v.level = None;
                v.polarity = sign(lit);
                self.insert_var_order(x);
            }
            self.qhead = self.trail_lim[level];
            self.th_head = self.th_head.min(self.qhead);
            self.trail.truncate(self.qhead);
            self.trail_lim.truncate(level);
        }
    }

    // ------------------------------------------------------------------
    // decision heuristics

    pub(crate) fn insert_var_order(&mut self, x: Var) {
        if !self.order_heap.in_heap(x.0) && self.vars[x.0].decision {
            self.order_heap.insert(x.0, &self.activities);
        }
    }

    pub(crate) fn pick_branch_lit(&mut self) -> Option<Lit> {
        let random_freq = self.config.low_level_config().random_var_freq();
        let mut next = None;
        if random_freq > 0.0 && self.rng.f64() < random_freq && !self.order_heap.is_empty() {
            let idx = self.rng.usize(0..self.order_heap.len());
            let candidate = Var(self.order_heap[idx]);
            if self.vars[candidate.0].assignment == Tristate::Undef && self.vars[candidate.0].decision {
                next = Some(candidate);
            }
        }
        while next.is_none() || self.vars[next.unwrap().0].assignment != Tristate::Undef || !self.vars[next.unwrap().0].decision {
            if self.order_heap.is_empty() {
                return None;
            }
            next = Some(Var(self.order_heap.remove_min(&self.activities)));
        }
        let v = next.unwrap();
        Some(mk_lit(v, self.vars[v.0].polarity))
    }

    pub(crate) fn var_decay_activities(&mut self) {
        self.var_inc *= 1.0 / self.var_decay;
    }

    pub(crate) fn var_bump_activity(&mut self, v: Var) {
        self.activities[v.0] += self.var_inc;
        if self.activities[v.0] > 1e100 {
            for a in &mut self.activities {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
        if self.order_heap.in_heap(v.0) {
            self.order_heap.decrease(v.0, &self.activities);
        }
    }

    pub(crate) fn cla_decay_activities(&mut self) {
        self.cla_inc *= 1.0 / self.config.low_level_config().clause_decay();
    }

    pub(crate) fn cla_bump_activity(&mut self, cls: ClauseRef) {
        let c = &mut self.all_clauses[cls.0];
        c.increment_activity(self.cla_inc);
        if c.activity > 1e20 {
            for &learnt in &self.learnts {
                self.all_clauses[learnt.0].rescale_activity();
            }
            self.cla_inc *= 1e-20;
        }
    }

    // ------------------------------------------------------------------
    // theory callback surface

    /// Registers a deferred explanation and returns its id.
    pub(crate) fn defer_explanation(&mut self, thunk: DeferredExplain) -> DeferredId {
        self.deferred.push(Some(thunk));
        DeferredId(self.deferred.len() - 1)
    }

    /// Enqueues a theory-propagated literal at the current level.
    ///
    /// If the literal is already true this is a no-op; if it is false the
    /// explanation is materialized at once and recorded as a pending
    /// conflict.
    pub(crate) fn theory_propagate(&mut self, lit: Literal, thunk: DeferredExplain) {
        let l = self.make_atom(lit);
        match self.value(l) {
            Tristate::True => {}
            Tristate::Undef => {
                let id = self.defer_explanation(thunk);
                self.unchecked_enqueue(l, Some(Reason::Theory(id)));
                self.stats.theory_propagations += 1;
            }
            Tristate::False => {
                let cls = self.build_explanation_clause(l, thunk);
                self.pending_conflict = Some(cls);
                self.stats.theory_conflicts += 1;
            }
        }
    }

    /// Records a theory conflict clause; picked up by the next
    /// [`propagate`](Self::propagate) round.
    pub(crate) fn theory_conflict(&mut self, lits: &[Literal], token: ProofToken) {
        let data: Vec<Lit> = lits.iter().map(|&l| self.make_atom(l)).collect();
        debug_assert!(data.iter().all(|&l| self.value(l) == Tristate::False));
        let cls = self.add_new_clause(Clause::new(data, Premise::Lemma(token), Some(self.next_state_id)));
        self.learnts.push(cls);
        self.pending_conflict = Some(cls);
        self.stats.theory_conflicts += 1;
    }

    /// Queues a theory lemma for installation after the current dispatch.
    pub(crate) fn queue_clause(&mut self, lits: &[Literal], keep: bool, token: ProofToken) {
        let data: Vec<Lit> = lits.iter().map(|&l| self.make_atom(l)).collect();
        self.pending_clauses.push((data, keep, token));
    }

    /// Work the search loop must pick up before deciding: a pending
    /// conflict or trail entries the watch cursor has not consumed.
    pub(crate) fn has_more_work(&self) -> bool {
        self.pending_conflict.is_some() || self.qhead < self.trail.len()
    }

    /// Installs queued theory lemmas; a conflict among them becomes the
    /// pending conflict.
    pub(crate) fn drain_pending_clauses(&mut self) {
        while let Some((lits, keep, token)) = self.pending_clauses.pop() {
            match self.install_clause(lits, Premise::Lemma(token), keep) {
                Installed::Ok => {}
                Installed::Conflict(cls) => {
                    self.pending_clauses.clear();
                    self.pending_conflict = Some(cls);
                    return;
                }
            }
        }
    }

    /// The highest decision level among a clause's literals.
    pub(crate) fn conflict_level(&self, cls: ClauseRef) -> usize {
        self.all_clauses[cls.0].data.iter().map(|&l| self.v(l).level.unwrap_or(0)).max().unwrap_or(0)
    }

    /// Marks the search outcome as incomplete; reported as an unknown
    /// result when the final check accepts the assignment.
    pub(crate) fn set_incomplete(&mut self) {
        self.incomplete = true;
    }

    pub(crate) fn take_incomplete(&mut self) -> bool {
        std::mem::take(&mut self.incomplete)
    }

    /// Makes the next solve call re-feed the whole trail to the theory
    /// layer.
    pub(crate) fn reset_theory_head(&mut self) {
        self.th_head = 0;
    }

    fn build_explanation_clause(&mut self, lit: Lit, thunk: DeferredExplain) -> ClauseRef {
        let (antecedents, token) = thunk();
        let mut data = Vec::with_capacity(antecedents.len() + 1);
        data.push(lit);
        for l in antecedents {
            let a = self.make_atom(l.negate());
            debug_assert!(self.value(a) == Tristate::False);
            if !data.contains(&a) {
                data.push(a);
            }
        }
        // the second watch is the deepest false literal
        if data.len() > 2 {
            let mut max = 1;
            for k in 2..data.len() {
                if self.v(data[k]).level > self.v(data[max]).level {
                    max = k;
                }
            }
            data.swap(1, max);
        }
        let cls = self.add_new_clause(Clause::new(data, Premise::Lemma(token), Some(self.next_state_id)));
        self.learnts.push(cls);
        if self.all_clauses[cls.0].len() >= 2 {
            self.attach_clause(cls);
        }
        cls
    }

    /// Turns a theory reason into a lemma clause, updating the variable's
    /// reason so the clause is reused by later analyses.
    pub(crate) fn materialize_reason(&mut self, lit: Lit) -> ClauseRef {
        let Some(Reason::Theory(id)) = self.v(lit).reason else {
            unreachable!("materialize_reason on a non-theory reason")
        };
        let thunk = self.deferred[id.0].take().expect("deferred explanation already consumed");
        let cls = self.build_explanation_clause(lit, thunk);
        self.v_mut(lit).reason = Some(Reason::Clause(cls));
        cls
    }

    /// The reason of an assigned literal as a clause, materializing theory
    /// reasons on demand. `None` for decisions.
    pub(crate) fn reason_clause(&mut self, lit: Lit) -> Option<ClauseRef> {
        match self.v(lit).reason {
            None => None,
            Some(Reason::Clause(cls)) => Some(cls),
            Some(Reason::Theory(_)) => Some(self.materialize_reason(lit)),
        }
    }

    // ------------------------------------------------------------------
    // conflict analysis

    /// First-UIP conflict analysis.
    ///
    /// Returns the learned clause with the asserting literal first and the
    /// second-highest-level literal second; `analyze_bt_level` holds the
    /// backjump level and `analyze_history` the resolved parents in order.
    pub(crate) fn analyze(&mut self, conflict: ClauseRef) -> Vec<Lit> {
        let mut out_learnt = Vec::<Lit>::with_capacity(VEC_INIT_SIZE);
        let mut c_ref = conflict;
        let mut path_c = 0;
        let mut p = Lit::UNDEF;
        out_learnt.push(Lit::UNDEF);
        let mut first_run = true;
        let mut index = self.trail.len() - 1;
        self.analyze_history.clear();
        self.analyze_history.push(conflict);

        while first_run || path_c > 0 {
            if !first_run {
                self.analyze_history.push(c_ref);
            }
            if self.c(c_ref).is_learnt() {
                self.cla_bump_activity(c_ref);
            } else if !self.c(c_ref).seen {
                self.c_mut(c_ref).seen = true;
            }
            let start = usize::from(!first_run);
            let end = self.c(c_ref).len();
            for j in start..end {
                let q = self.c(c_ref).get(j);
                if !self.v(q).seen_any() && self.v(q).level_greater_zero() {
                    self.var_bump_activity(var(q));
                    self.v_mut(q).set_seen(sign(q), true);
                    if self.v(q).level.is_some_and(|l| l >= self.decision_level()) {
                        path_c += 1;
                    } else {
                        out_learnt.push(q);
                    }
                }
            }
            while !self.vars[var(self.trail[index]).0].seen_any() {
                index -= 1;
            }
            p = self.trail[index];
            self.v_mut(p).clear_seen();
            path_c -= 1;
            first_run = false;
            if path_c > 0 {
                c_ref = self.reason_clause(p).expect("expected reason");
            }
        }
        out_learnt[0] = not(p);
        self.simplify_learnt(&mut out_learnt);
        out_learnt
    }

    fn simplify_learnt(&mut self, out_learnt: &mut Vec<Lit>) {
        let to_clear = out_learnt.clone();
        match self.config.clause_minimization() {
            ClauseMinimization::Deep => self.minimize_deep(out_learnt),
            ClauseMinimization::Basic => self.minimize_basic(out_learnt),
            ClauseMinimization::None => {}
        }
        self.analyze_bt_level = 0;
        if out_learnt.len() > 1 {
            let mut max = 1;
            for k in 2..out_learnt.len() {
                if self.v(out_learnt[k]).level > self.v(out_learnt[max]).level {
                    max = k;
                }
            }
            let p = out_learnt[max];
            out_learnt.swap(max, 1);
            self.analyze_bt_level = self.v(p).level.unwrap();
        }
        for l in to_clear {
            self.v_mut(l).clear_seen();
        }
    }

    /// Removes literals whose reason is entirely subsumed by the rest of
    /// the clause (plus level 0). Each consumed reason joins the history so
    /// the recorded resolution chain stays replayable.
    fn minimize_basic(&mut self, out_learnt: &mut Vec<Lit>) {
        let mut removed: Vec<Var> = Vec::new();
        let mut j = 1;
        for i in 1..out_learnt.len() {
            let i_lit = out_learnt[i];
            let Some(cls) = self.reason_clause(not(i_lit)) else {
                out_learnt[j] = i_lit;
                j += 1;
                continue;
            };
            let c = &self.all_clauses[cls.0];
            let redundant = c.data.iter().all(|&k| k == not(i_lit) || self.v(k).seen_any() || !self.v(k).level_greater_zero());
            if redundant {
                removed.push(var(i_lit));
            } else {
                out_learnt[j] = i_lit;
                j += 1;
            }
        }
        out_learnt.truncate(j);
        if removed.is_empty() {
            return;
        }
        // reasons join the history latest-assigned first, so literals a
        // reason reintroduces are canceled by a later entry
        for idx in (0..self.trail.len()).rev() {
            let t_var = var(self.trail[idx]);
            if removed.contains(&t_var) {
                let cls = self.reason_clause(self.trail[idx]).expect("removed literal without reason");
                self.analyze_history.push(cls);
                self.v_mut(self.trail[idx]).clear_seen();
            }
        }
    }

    fn minimize_deep(&mut self, out_learnt: &mut Vec<Lit>) {
        debug_assert!(!self.config.proof_generation());
        let mut analyze_to_clear = out_learnt.clone();
        let mut abstract_levels = 0_usize;
        for &l in &out_learnt[1..] {
            abstract_levels |= self.abstract_level(var(l));
        }
        let mut j = 1;
        for i in 1..out_learnt.len() {
            let i_lit = out_learnt[i];
            if self.v(i_lit).reason.is_none() || !self.lit_redundant(i_lit, abstract_levels, &mut analyze_to_clear) {
                out_learnt[j] = i_lit;
                j += 1;
            }
        }
        out_learnt.truncate(j);
        for l in analyze_to_clear {
            self.v_mut(l).clear_seen();
        }
    }

    fn abstract_level(&self, x: Var) -> usize {
        1 << (self.vars[x.0].level.unwrap() & 31)
    }

    fn lit_redundant(&mut self, p: Lit, abstract_levels: usize, analyze_to_clear: &mut Vec<Lit>) -> bool {
        let mut analyze_stack = Vec::<Lit>::with_capacity(analyze_to_clear.len());
        analyze_stack.push(p);
        let top = analyze_to_clear.len();

        while let Some(last) = analyze_stack.pop() {
            let cls = self.reason_clause(not(last)).expect("expected reason");
            let c = &self.all_clauses[cls.0];
            for idx in 0..c.len() {
                let q = self.all_clauses[cls.0].get(idx);
                if q == not(last) || self.v(q).seen_any() || !self.v(q).level_greater_zero() {
                    continue;
                }
                if self.v(q).reason.is_some() && (self.abstract_level(var(q)) & abstract_levels) != 0 {
                    self.v_mut(q).set_seen(sign(q), true);
                    analyze_stack.push(q);
                    analyze_to_clear.push(q);
                } else {
                    for &l in &analyze_to_clear[top..] {
                        self.v_mut(l).clear_seen();
                    }
                    analyze_to_clear.truncate(top);
                    return false;
                }
            }
        }
        true
    }

    /// Installs a learned clause, enqueues its asserting literal and
    /// updates activities. Call after `cancel_until(analyze_bt_level)`.
    pub(crate) fn record_learnt(&mut self, learnt: Vec<Lit>) {
        let history = std::mem::take(&mut self.analyze_history);
        let premise = Premise::History(history);
        let asserting = learnt[0];
        let cls = self.add_new_clause(Clause::new(learnt, premise, Some(self.next_state_id)));
        if self.all_clauses[cls.0].len() == 1 {
            // learned units are permanent; they serve as level-0 reasons
            self.clauses.push(cls);
            self.unchecked_enqueue(asserting, Some(Reason::Clause(cls)));
        } else {
            self.learnts.push(cls);
            self.attach_clause(cls);
            self.cla_bump_activity(cls);
            self.unchecked_enqueue(asserting, Some(Reason::Clause(cls)));
        }
        self.stats.learned_clauses += 1;
        self.var_decay_activities();
        self.cla_decay_activities();
    }

    // ------------------------------------------------------------------
    // clause database reduction and restarts

    pub(crate) fn init_learntsize(&mut self) {
        self.max_learnts = self.clauses.len() as f64 * self.config.low_level_config().learntsize_factor();
        if self.max_learnts < 100.0 {
            self.max_learnts = 100.0;
        }
        self.learntsize_adjust_confl = 100.0;
        self.learntsize_adjust_cnt = 100;
    }

    pub(crate) fn on_conflict_budget(&mut self) {
        self.stats.conflicts += 1;
        self.learntsize_adjust_cnt -= 1;
        if self.learntsize_adjust_cnt <= 0 {
            self.learntsize_adjust_confl *= 1.5;
            self.learntsize_adjust_cnt = self.learntsize_adjust_confl as isize;
            self.max_learnts *= self.config.low_level_config().learntsize_inc();
        }
    }

    pub(crate) fn should_reduce(&self) -> bool {
        (self.learnts.len() as isize - self.n_assigns() as isize) as f64 >= self.max_learnts
    }

    /// Removes roughly half of the learnt clauses, preferring low activity.
    /// Clauses serving as reasons and binary clauses survive.
    pub(crate) fn reduce_db(&mut self) {
        let extra_lim = self.cla_inc / self.learnts.len() as f64;
        let mut sorted = std::mem::take(&mut self.learnts);
        sorted.sort_by(|&x, &y| {
            let cx = &self.all_clauses[x.0];
            let cy = &self.all_clauses[y.0];
            (cx.len() <= 2, cx.activity).partial_cmp(&(cy.len() <= 2, cy.activity)).unwrap()
        });
        let limit = sorted.len() / 2;
        let mut kept = Vec::with_capacity(sorted.len());
        for (i, &cls) in sorted.iter().enumerate() {
            let c = &self.all_clauses[cls.0];
            let removable = c.len() > 2 && c.attached && !self.locked(cls) && (i < limit || c.activity < extra_lim);
            if removable {
                self.remove_learnt(cls);
            } else {
                kept.push(cls);
            }
        }
        self.learnts = kept;
        self.stats.db_reductions += 1;
        debug!("reduce_db kept {} learnt clauses", self.learnts.len());
    }

    /// The Luby restart sequence.
    pub(crate) fn luby(y: f64, mut x: isize) -> f64 {
        let mut size = 1;
        let mut seq = 0;
        while size < x + 1 {
            seq += 1;
            size = 2 * size + 1;
        }
        while size - 1 != x {
            size = (size - 1) / 2;
            seq -= 1;
            x %= size;
        }
        y.powi(seq)
    }

    // ------------------------------------------------------------------
    // state snapshots

    /// Takes a snapshot of the database. Clauses learned after the
    /// snapshot are tagged and removed by [`load_state`](Self::load_state).
    pub fn save_state(&mut self) -> SolverState {
        self.next_state_id += 1;
        let id = self.next_state_id;
        self.valid_states.push(id);
        SolverState {
            id,
            ok: self.ok,
            vars_size: self.vars.len(),
            all_clause_size: self.all_clauses.len(),
            clause_size: self.clauses.len(),
        }
    }

    /// Restores a snapshot taken with [`save_state`](Self::save_state).
    pub fn load_state(&mut self, state: &SolverState) -> Result<(), String> {
        let Some(index) = self.valid_states.iter().rposition(|&s| s == state.id) else {
            return Err("the given solver state is not valid anymore".to_string());
        };
        self.valid_states.truncate(index + 1);
        self.complete_backtrack();
        self.ok = state.ok;
        if state.ok {
            self.root_conflict = None;
        }
        self.pending_conflict = None;
        self.pending_clauses.clear();
        self.deferred.clear();

        let new_vars_size = state.vars_size.min(self.vars.len());
        for i in (new_vars_size..self.vars.len()).rev() {
            if self.order_heap.in_heap(i) {
                self.order_heap.remove(i, &self.activities);
            }
            let lit = self.var_lits[i];
            self.lit_map.remove(&lit);
        }
        self.vars.truncate(new_vars_size);
        self.var_lits.truncate(new_vars_size);
        self.activities.truncate(new_vars_size);

        let new_clauses_size = state.clause_size.min(self.clauses.len());
        for i in (new_clauses_size..self.clauses.len()).rev() {
            let cls = self.clauses[i];
            if self.all_clauses[cls.0].attached {
                self.detach_clause(cls);
            }
        }
        self.clauses.truncate(new_clauses_size);

        let mut kept = 0;
        for i in 0..self.learnts.len() {
            let cls = self.learnts[i];
            if self.all_clauses[cls.0].learnt_on_state.is_none_or(|s| s <= state.id) {
                self.learnts[kept] = cls;
                kept += 1;
            } else if self.all_clauses[cls.0].attached {
                self.detach_clause(cls);
            }
        }
        self.learnts.truncate(kept);
        self.watches.truncate(new_vars_size * 2);
        self.all_clauses.truncate(state.all_clause_size.min(self.all_clauses.len()));

        // replay level-0 consequences of the surviving clauses
        for i in 0..self.clauses.len() {
            if !self.ok {
                break;
            }
            let cls = self.clauses[i];
            if self.all_clauses[cls.0].len() == 1 {
                let lit = self.all_clauses[cls.0].get(0);
                if self.value(lit) == Tristate::Undef {
                    self.unchecked_enqueue(lit, Some(Reason::Clause(cls)));
                    if let Some(confl) = self.propagate() {
                        self.set_root_conflict(confl);
                    }
                }
            }
        }
        Ok(())
    }

    fn complete_backtrack(&mut self) {
        for v in 0..self.vars.len() {
            let state = &mut self.vars[v];
            state.assignment = Tristate::Undef;
            state.reason = None;
            state.level = None;
            if !self.order_heap.in_heap(v) && state.decision {
                self.order_heap.insert(v, &self.activities);
            }
        }
        self.trail.clear();
        self.trail_lim.clear();
        self.qhead = 0;
        self.th_head = 0;
    }

    pub(crate) fn trail_slice(&self) -> &[Lit] {
        &self.trail
    }

    /// Logs a one-line summary of the database, for tracing.
    pub(crate) fn trace_state(&self) {
        trace!(
            "vars={} clauses={} learnts={} trail={} level={}",
            self.vars.len(),
            self.clauses.len(),
            self.learnts.len(),
            self.trail.len(),
            self.decision_level()
        );
    }
}
