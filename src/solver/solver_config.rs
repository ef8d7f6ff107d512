/// Configuration of the solver.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub struct SolverConfig {
    pub proof_generation: bool,
    pub clause_minimization: ClauseMinimization,
    pub initial_phase: bool,
    pub low_level_config: LowLevelConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverConfig {
    pub const fn new() -> Self {
        Self {
            proof_generation: false,
            clause_minimization: ClauseMinimization::Deep,
            initial_phase: false,
            low_level_config: LowLevelConfig::new(),
        }
    }

    pub const fn proof_generation(&self) -> bool {
        self.proof_generation
    }

    pub const fn with_proof_generation(mut self, proof_generation: bool) -> Self {
        self.proof_generation = proof_generation;
        self
    }

    /// The effective minimization mode.
    ///
    /// Deep minimization can eliminate literals whose justification the
    /// recorded resolution history cannot replay, so proof generation caps
    /// it at [`ClauseMinimization::Basic`].
    pub const fn clause_minimization(&self) -> ClauseMinimization {
        if self.proof_generation && matches!(self.clause_minimization, ClauseMinimization::Deep) {
            ClauseMinimization::Basic
        } else {
            self.clause_minimization
        }
    }

    pub const fn with_clause_minimization(mut self, clause_minimization: ClauseMinimization) -> Self {
        self.clause_minimization = clause_minimization;
        self
    }

    pub const fn initial_phase(&self) -> bool {
        self.initial_phase
    }

    pub const fn with_initial_phase(mut self, initial_phase: bool) -> Self {
        self.initial_phase = initial_phase;
        self
    }

    pub const fn low_level_config(&self) -> &LowLevelConfig {
        &self.low_level_config
    }

    pub const fn with_low_level_config(mut self, low_level_config: LowLevelConfig) -> Self {
        self.low_level_config = low_level_config;
        self
    }
}

/// How far learned clauses are minimized during conflict analysis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum ClauseMinimization {
    None,
    Basic,
    Deep,
}

/// Search parameters; the defaults are the usual MiniSat numerology.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub struct LowLevelConfig {
    var_decay: f64,
    var_inc: f64,
    clause_decay: f64,
    restart_first: isize,
    restart_inc: f64,
    learntsize_factor: f64,
    learntsize_inc: f64,
    random_var_freq: f64,
    random_seed: u64,
    max_conflicts: Option<u64>,
}

impl Default for LowLevelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LowLevelConfig {
    pub const fn new() -> Self {
        Self {
            var_decay: 0.95,
            var_inc: 1.0,
            clause_decay: 0.999,
            restart_first: 100,
            restart_inc: 2.0,
            learntsize_factor: 1.0 / 3.0,
            learntsize_inc: 1.1,
            random_var_freq: 0.0,
            random_seed: 91_648_253,
            max_conflicts: None,
        }
    }

    pub const fn var_decay(&self) -> f64 {
        self.var_decay
    }

    pub const fn with_var_decay(mut self, var_decay: f64) -> Self {
        self.var_decay = var_decay;
        self
    }

    pub const fn var_inc(&self) -> f64 {
        self.var_inc
    }

    pub const fn with_var_inc(mut self, var_inc: f64) -> Self {
        self.var_inc = var_inc;
        self
    }

    pub const fn clause_decay(&self) -> f64 {
        self.clause_decay
    }

    pub const fn with_clause_decay(mut self, clause_decay: f64) -> Self {
        self.clause_decay = clause_decay;
        self
    }

    pub const fn restart_first(&self) -> isize {
        self.restart_first
    }

    pub const fn with_restart_first(mut self, restart_first: isize) -> Self {
        self.restart_first = restart_first;
        self
    }

    pub const fn restart_inc(&self) -> f64 {
        self.restart_inc
    }

    pub const fn with_restart_inc(mut self, restart_inc: f64) -> Self {
        self.restart_inc = restart_inc;
        self
    }

    pub const fn learntsize_factor(&self) -> f64 {
        self.learntsize_factor
    }

    pub const fn with_learntsize_factor(mut self, learntsize_factor: f64) -> Self {
        self.learntsize_factor = learntsize_factor;
        self
    }

    pub const fn learntsize_inc(&self) -> f64 {
        self.learntsize_inc
    }

    pub const fn with_learntsize_inc(mut self, learntsize_inc: f64) -> Self {
        self.learntsize_inc = learntsize_inc;
        self
    }

    pub const fn random_var_freq(&self) -> f64 {
        self.random_var_freq
    }

    pub const fn with_random_var_freq(mut self, random_var_freq: f64) -> Self {
        self.random_var_freq = random_var_freq;
        self
    }

    pub const fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub const fn with_random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }

    pub const fn max_conflicts(&self) -> Option<u64> {
        self.max_conflicts
    }

    pub const fn with_max_conflicts(mut self, max_conflicts: Option<u64>) -> Self {
        self.max_conflicts = max_conflicts;
        self
    }
}
