use itertools::Itertools;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::sat::{not, ClauseRef, CoreSolver, Lit, Premise, ProofToken, Tristate};
use crate::terms::{Literal, TermStore};

/// Errors during proof reconstruction.
///
/// `NoPivot` and `MultiplePivots` indicate an inconsistent clause history,
/// which is a solver bug; `InsufficientHypotheses` means the proof cannot
/// be closed from the recorded premises. Neither invalidates an UNSAT
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// Two resolved clauses share no complementary literal pair.
    #[error("no pivot between resolved clauses")]
    NoPivot,
    /// Two resolved clauses share more than one complementary pair.
    #[error("multiple pivots between resolved clauses")]
    MultiplePivots,
    /// The recorded premises do not suffice to derive the empty clause.
    #[error("insufficient hypotheses to derive the empty clause")]
    InsufficientHypotheses,
}

/// A node of a [`Proof`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ProofNode(usize);

/// The rule concluding a proof node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofRule {
    /// A clause asserted by the user.
    Hypothesis,
    /// An assumption local to the solve call.
    Assumption,
    /// A theory lemma, carrying the theory's proof token.
    Lemma(ProofToken),
    /// A single resolution step between two proved clauses.
    Resolution {
        /// The resolved-upon literal, in positive form.
        pivot: Literal,
        /// The parent containing the positive pivot.
        left: ProofNode,
        /// The parent containing the negated pivot.
        right: ProofNode,
    },
}

struct Step {
    conclusion: Vec<Literal>,
    rule: ProofRule,
}

/// A resolution proof of the empty clause, represented as a DAG.
///
/// Nodes are shared by clause identity; traversal starts at
/// [`root`](Proof::root) and expands one step at a time through
/// [`expand`](Proof::expand).
pub struct Proof {
    steps: Vec<Step>,
    root: ProofNode,
}

/// The subset of asserted clauses a proof rests on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsatCore {
    clauses: Vec<Vec<Literal>>,
}

impl UnsatCore {
    /// The clauses of the core, as term-literal disjunctions.
    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    /// The number of clauses in the core.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// `true` if the core is empty.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether the core contains the given clause, as a set of literals.
    pub fn contains(&self, clause: &[Literal]) -> bool {
        let mut sorted = clause.to_vec();
        sorted.sort_unstable();
        self.clauses.iter().any(|c| {
            let mut other = c.clone();
            other.sort_unstable();
            other == sorted
        })
    }
}

impl Proof {
    /// The node concluding the empty clause.
    pub const fn root(&self) -> ProofNode {
        self.root
    }

    /// The number of nodes in the DAG.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` if the proof has no nodes.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The clause a node concludes.
    pub fn conclusion(&self, node: ProofNode) -> &[Literal] {
        &self.steps[node.0].conclusion
    }

    /// Expands a node into its rule. Resolution rules point at the two
    /// parent nodes for further expansion.
    pub fn expand(&self, node: ProofNode) -> &ProofRule {
        &self.steps[node.0].rule
    }

    /// The number of resolution steps in the DAG.
    pub fn resolution_steps(&self) -> usize {
        self.steps.iter().filter(|s| matches!(s.rule, ProofRule::Resolution { .. })).count()
    }

    /// Collects the conclusions of all hypothesis and assumption leaves
    /// reachable from the root, deduplicated by clause identity.
    pub fn unsat_core(&self) -> UnsatCore {
        let mut seen = vec![false; self.steps.len()];
        let mut stack = vec![self.root];
        let mut clauses: Vec<Vec<Literal>> = Vec::new();
        while let Some(node) = stack.pop() {
            if seen[node.0] {
                continue;
            }
            seen[node.0] = true;
            match &self.steps[node.0].rule {
                ProofRule::Hypothesis | ProofRule::Assumption => clauses.push(self.steps[node.0].conclusion.clone()),
                ProofRule::Lemma(_) => {}
                ProofRule::Resolution { left, right, .. } => {
                    stack.push(*left);
                    stack.push(*right);
                }
            }
        }
        UnsatCore { clauses: clauses.into_iter().unique().collect() }
    }

    /// Structurally validates every resolution step: the conclusion must
    /// equal the union of the parents minus the pivot pair.
    pub fn validate(&self) -> Result<(), ProofError> {
        for step in &self.steps {
            let ProofRule::Resolution { pivot, left, right } = &step.rule else {
                continue;
            };
            let mut expected: Vec<Literal> = self.steps[left.0]
                .conclusion
                .iter()
                .chain(&self.steps[right.0].conclusion)
                .copied()
                .filter(|&l| l != *pivot && l != pivot.negate())
                .collect();
            expected.sort_unstable();
            expected.dedup();
            let mut actual = step.conclusion.clone();
            actual.sort_unstable();
            if expected != actual {
                return Err(ProofError::NoPivot);
            }
            let left_has = self.steps[left.0].conclusion.contains(pivot);
            let right_has = self.steps[right.0].conclusion.contains(&pivot.negate());
            if !left_has || !right_has {
                return Err(ProofError::NoPivot);
            }
        }
        Ok(())
    }

    /// Serializes the DAG as GraphViz statements: one colored node per
    /// proved clause, one box per resolution pivot, edges from conclusion
    /// to pivot to parents.
    pub fn to_dot(&self, store: &TermStore) -> String {
        let mut out = String::from("digraph proof {\n");
        for (i, step) in self.steps.iter().enumerate() {
            let label = if step.conclusion.is_empty() {
                "\\u22a5".to_string()
            } else {
                step.conclusion.iter().map(|l| l.to_string(store)).join(" \\u2228 ")
            };
            let color = match step.rule {
                ProofRule::Hypothesis => "blue",
                ProofRule::Assumption => "green",
                ProofRule::Lemma(_) => "orange",
                ProofRule::Resolution { .. } => "black",
            };
            out.push_str(&format!("  c{i} [shape=ellipse, color={color}, label=\"{label}\"];\n"));
            if let ProofRule::Resolution { pivot, left, right } = &step.rule {
                let pivot_label = pivot.to_string(store);
                out.push_str(&format!("  p{i} [shape=box, label=\"{pivot_label}\"];\n"));
                out.push_str(&format!("  c{i} -> p{i};\n"));
                out.push_str(&format!("  p{i} -> c{};\n", left.0));
                out.push_str(&format!("  p{i} -> c{};\n", right.0));
            }
        }
        out.push_str("}\n");
        out
    }
}

enum BuiltRule {
    Hypothesis,
    Assumption,
    Lemma(ProofToken),
    Resolution { pivot: Lit, left: usize, right: usize },
}

/// Reconstructs a resolution DAG from the clause database's premise
/// records.
///
/// The builder proves clauses bottom-up: leaves come from `Hypothesis`,
/// `Local` and `Lemma` premises, `History` premises are replayed by
/// linear resolution, and any leftover level-0 literals are closed by
/// resolving against their unit reasons.
pub struct ProofBuilder<'a> {
    core: &'a mut CoreSolver,
    conclusions: Vec<Vec<Lit>>,
    rules: Vec<BuiltRule>,
    by_key: FxHashMap<Vec<Lit>, usize>,
    by_clause: FxHashMap<ClauseRef, usize>,
    trail_pos: FxHashMap<Lit, usize>,
}

impl<'a> ProofBuilder<'a> {
    pub(crate) fn new(core: &'a mut CoreSolver) -> Self {
        let trail_pos = core.trail_slice().iter().enumerate().map(|(i, &l)| (l, i)).collect();
        Self {
            core,
            conclusions: Vec::new(),
            rules: Vec::new(),
            by_key: FxHashMap::default(),
            by_clause: FxHashMap::default(),
            trail_pos,
        }
    }

    /// Proves the given level-0 conflict and closes it to the empty
    /// clause.
    pub(crate) fn prove_unsat(mut self, conflict: ClauseRef) -> Result<Proof, ProofError> {
        let mut node = self.prove(conflict)?;
        while !self.conclusions[node].is_empty() {
            let a = self.deepest_literal(node);
            let Some(reason) = self.level_zero_reason(a) else {
                return Err(ProofError::InsufficientHypotheses);
            };
            let parent = self.prove(reason)?;
            node = self.add_res(node, parent)?;
        }
        let root = ProofNode(node);
        let Self { core, conclusions, rules, .. } = self;
        let steps = conclusions
            .into_iter()
            .zip(rules)
            .map(|(concl, rule)| Step {
                conclusion: concl.iter().map(|&l| core.term_lit(l)).collect(),
                rule: match rule {
                    BuiltRule::Hypothesis => ProofRule::Hypothesis,
                    BuiltRule::Assumption => ProofRule::Assumption,
                    BuiltRule::Lemma(t) => ProofRule::Lemma(t),
                    BuiltRule::Resolution { pivot, left, right } => ProofRule::Resolution {
                        pivot: core.term_lit(pivot),
                        left: ProofNode(left),
                        right: ProofNode(right),
                    },
                },
            })
            .collect();
        Ok(Proof { steps, root })
    }

    /// The literal of a conclusion whose negation was assigned last; gap
    /// closing in reverse assignment order terminates.
    fn deepest_literal(&self, node: usize) -> Lit {
        *self.conclusions[node]
            .iter()
            .max_by_key(|&&l| self.trail_pos.get(&not(l)).copied().unwrap_or(0))
            .expect("deepest_literal on the empty clause")
    }

    fn level_zero_reason(&mut self, a: Lit) -> Option<ClauseRef> {
        let v = self.core.v(a);
        if v.level != Some(0) || self.core.value(not(a)) != Tristate::True {
            return None;
        }
        self.core.reason_clause(not(a))
    }

    fn is_proven(&self, c: ClauseRef) -> bool {
        self.by_clause.contains_key(&c)
    }

    fn prove(&mut self, c: ClauseRef) -> Result<usize, ProofError> {
        let mut stack = vec![c];
        while let Some(&top) = stack.last() {
            if self.is_proven(top) {
                stack.pop();
                continue;
            }
            match self.core.c(top).premise.clone() {
                Premise::Hypothesis => {
                    self.insert_leaf(top, BuiltRule::Hypothesis);
                    stack.pop();
                }
                Premise::Local => {
                    self.insert_leaf(top, BuiltRule::Assumption);
                    stack.pop();
                }
                Premise::Lemma(token) => {
                    self.insert_leaf(top, BuiltRule::Lemma(token));
                    stack.pop();
                }
                Premise::History(parents) => {
                    let unproven: Vec<ClauseRef> = parents.iter().copied().filter(|p| !self.is_proven(*p)).collect();
                    if unproven.is_empty() {
                        let node = self.replay_history(top, &parents)?;
                        self.by_clause.insert(top, node);
                        stack.pop();
                    } else {
                        stack.extend(unproven);
                    }
                }
            }
        }
        Ok(self.by_clause[&c])
    }

    fn insert_leaf(&mut self, c: ClauseRef, rule: BuiltRule) {
        let key = Self::key_of(&self.core.c(c).data);
        let node = self.node_for(key, rule);
        self.by_clause.insert(c, node);
    }

    fn key_of(lits: &[Lit]) -> Vec<Lit> {
        let mut key = lits.to_vec();
        key.sort_unstable();
        key.dedup();
        key
    }

    fn node_for(&mut self, key: Vec<Lit>, rule: BuiltRule) -> usize {
        if let Some(&node) = self.by_key.get(&key) {
            return node;
        }
        let node = self.conclusions.len();
        self.by_key.insert(key.clone(), node);
        self.conclusions.push(key);
        self.rules.push(rule);
        node
    }

    /// Folds the recorded parents by linear resolution and eliminates any
    /// leftover level-0 literals against their unit reasons.
    fn replay_history(&mut self, c: ClauseRef, parents: &[ClauseRef]) -> Result<usize, ProofError> {
        debug_assert!(!parents.is_empty());
        let mut acc = self.by_clause[&parents[0]];
        for p in &parents[1..] {
            let pn = self.by_clause[p];
            if acc == pn {
                continue;
            }
            acc = self.add_res(acc, pn)?;
        }
        let target = Self::key_of(&self.core.c(c).data);
        loop {
            let extra = self.conclusions[acc].iter().copied().find(|l| !target.contains(l));
            let Some(a) = extra else { break };
            let Some(reason) = self.level_zero_reason(a) else {
                return Err(ProofError::NoPivot);
            };
            let parent = self.prove(reason)?;
            acc = self.add_res(acc, parent)?;
        }
        Ok(acc)
    }

    /// One resolution step: merges the sorted literal lists and cancels
    /// exactly one complementary pair.
    fn add_res(&mut self, left: usize, right: usize) -> Result<usize, ProofError> {
        let pivots: Vec<Lit> = self.conclusions[left]
            .iter()
            .copied()
            .filter(|&l| self.conclusions[right].contains(&not(l)))
            .collect();
        match pivots.len() {
            0 => return Err(ProofError::NoPivot),
            1 => {}
            _ => return Err(ProofError::MultiplePivots),
        }
        let pivot = pivots[0];
        let mut merged: Vec<Lit> = self.conclusions[left]
            .iter()
            .chain(&self.conclusions[right])
            .copied()
            .filter(|&l| l != pivot && l != not(pivot))
            .collect();
        merged.sort_unstable();
        merged.dedup();
        let positive = if crate::sat::sign(pivot) { not(pivot) } else { pivot };
        let (left, right) = if crate::sat::sign(pivot) { (right, left) } else { (left, right) };
        Ok(self.node_for(merged, BuiltRule::Resolution { pivot: positive, left, right }))
    }
}
