use std::sync::RwLock;

use dashmap::DashMap;

use super::{FunSym, Sort, Symbol, Term, TermError, TermView};

const CACHE_INITIAL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TermData {
    True,
    False,
    Const(Symbol, Sort),
    App(FunSym, Box<[Term]>),
    Eq(Term, Term),
    Not(Term),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FunDecl {
    name: Symbol,
    domain: Box<[Sort]>,
    range: Sort,
}

/// The term store: hash-consed terms, interned sorts and symbols, and
/// declared function signatures.
///
/// The store is shared by the solver and its user. All interning methods
/// take `&self`; a store behind a shared reference can be used from several
/// threads. Terms from one store must never be mixed with another store.
///
/// # Examples
///
/// ```
/// # use smalt::terms::TermStore;
/// let store = TermStore::new();
/// let u = store.sort("U");
/// let a = store.constant("a", u).unwrap();
/// let b = store.constant("b", u).unwrap();
/// let eq = store.eq(a, b).unwrap();
/// assert_eq!(store.eq(b, a).unwrap(), eq);
/// ```
pub struct TermStore {
    terms: RwLock<Vec<TermData>>,
    term_ids: DashMap<TermData, Term>,
    symbols: RwLock<Vec<String>>,
    symbol_ids: DashMap<String, Symbol>,
    sorts: RwLock<Vec<Symbol>>,
    sort_ids: DashMap<Symbol, Sort>,
    funs: RwLock<Vec<FunDecl>>,
    fun_ids: DashMap<Symbol, FunSym>,
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TermStore {
    /// Creates a new store containing only the boolean sort and the two
    /// boolean constants.
    pub fn new() -> Self {
        let store = Self {
            terms: RwLock::new(Vec::with_capacity(CACHE_INITIAL_CAPACITY)),
            term_ids: DashMap::with_capacity(CACHE_INITIAL_CAPACITY),
            symbols: RwLock::new(Vec::new()),
            symbol_ids: DashMap::new(),
            sorts: RwLock::new(Vec::new()),
            sort_ids: DashMap::new(),
            funs: RwLock::new(Vec::new()),
            fun_ids: DashMap::new(),
        };
        let bool_sym = store.symbol("Bool");
        store.sorts.write().unwrap().push(bool_sym);
        store.sort_ids.insert(bool_sym, Sort::BOOL);
        // ids 0 and 1, see `verum`/`falsum`
        store.intern(TermData::True);
        store.intern(TermData::False);
        store
    }

    fn intern(&self, data: TermData) -> Term {
        if let Some(t) = self.term_ids.get(&data) {
            return *t;
        }
        *self.term_ids.entry(data.clone()).or_insert_with(|| {
            let mut terms = self.terms.write().unwrap();
            let id = u32::try_from(terms.len()).expect("term store overflow");
            terms.push(data);
            Term(id)
        })
    }

    fn data(&self, t: Term) -> TermData {
        self.terms.read().unwrap()[t.0 as usize].clone()
    }

    /// Interns a symbol name.
    pub fn symbol(&self, name: &str) -> Symbol {
        if let Some(s) = self.symbol_ids.get(name) {
            return *s;
        }
        *self.symbol_ids.entry(name.to_string()).or_insert_with(|| {
            let mut symbols = self.symbols.write().unwrap();
            let id = u32::try_from(symbols.len()).expect("symbol store overflow");
            symbols.push(name.to_string());
            Symbol(id)
        })
    }

    /// Returns the name of an interned symbol.
    pub fn symbol_name(&self, sym: Symbol) -> String {
        self.symbols.read().unwrap()[sym.0 as usize].clone()
    }

    /// Interns an atomic sort by name. The name `"Bool"` yields
    /// [`Sort::BOOL`].
    pub fn sort(&self, name: &str) -> Sort {
        let sym = self.symbol(name);
        if let Some(s) = self.sort_ids.get(&sym) {
            return *s;
        }
        *self.sort_ids.entry(sym).or_insert_with(|| {
            let mut sorts = self.sorts.write().unwrap();
            let id = u32::try_from(sorts.len()).expect("sort store overflow");
            sorts.push(sym);
            Sort(id)
        })
    }

    /// Returns the name of a sort.
    pub fn sort_name(&self, sort: Sort) -> String {
        let sym = self.sorts.read().unwrap()[sort.0 as usize];
        self.symbol_name(sym)
    }

    /// The term `true`.
    pub const fn verum(&self) -> Term {
        Term(0)
    }

    /// The term `false`.
    pub const fn falsum(&self) -> Term {
        Term(1)
    }

    /// Creates (or looks up) an uninterpreted constant of the given sort.
    ///
    /// Redeclaring a name with a different sort is an error.
    pub fn constant(&self, name: &str, sort: Sort) -> Result<Term, TermError> {
        let sym = self.symbol(name);
        let data = TermData::Const(sym, sort);
        if self.term_ids.contains_key(&data) {
            return Ok(self.intern(data));
        }
        for other in 0..self.sorts.read().unwrap().len() {
            let other = Sort(u32::try_from(other).unwrap());
            if other != sort && self.term_ids.contains_key(&TermData::Const(sym, other)) {
                return Err(TermError::ConstRedeclared(name.to_string()));
            }
        }
        Ok(self.intern(data))
    }

    /// Creates (or looks up) a boolean constant.
    pub fn bool_const(&self, name: &str) -> Result<Term, TermError> {
        self.constant(name, Sort::BOOL)
    }

    /// Declares a function symbol with the given signature.
    ///
    /// Redeclaring a name with a different signature is an error;
    /// redeclaring with the same signature returns the existing symbol.
    pub fn declare_fun(&self, name: &str, domain: &[Sort], range: Sort) -> Result<FunSym, TermError> {
        let sym = self.symbol(name);
        if let Some(f) = self.fun_ids.get(&sym) {
            let f = *f;
            let decl = &self.funs.read().unwrap()[f.0 as usize];
            if *decl.domain == *domain && decl.range == range {
                return Ok(f);
            }
            return Err(TermError::FunRedeclared(name.to_string()));
        }
        let mut funs = self.funs.write().unwrap();
        let id = FunSym(u32::try_from(funs.len()).expect("function store overflow"));
        funs.push(FunDecl { name: sym, domain: domain.into(), range });
        self.fun_ids.insert(sym, id);
        Ok(id)
    }

    /// Returns the name of a declared function symbol.
    pub fn fun_name(&self, f: FunSym) -> String {
        let sym = self.funs.read().unwrap()[f.0 as usize].name;
        self.symbol_name(sym)
    }

    /// Applies a declared function to arguments, checking arity and sorts.
    pub fn app(&self, f: FunSym, args: &[Term]) -> Result<Term, TermError> {
        let (domain, _range) = {
            let funs = self.funs.read().unwrap();
            let decl = &funs[f.0 as usize];
            (decl.domain.clone(), decl.range)
        };
        if domain.len() != args.len() {
            return Err(TermError::Arity { fun: self.fun_name(f), expected: domain.len(), actual: args.len() });
        }
        for (index, (&arg, &expected)) in args.iter().zip(domain.iter()).enumerate() {
            if self.ty(arg) != expected {
                return Err(TermError::ArgumentSort { fun: self.fun_name(f), index });
            }
        }
        Ok(self.intern(TermData::App(f, args.into())))
    }

    /// Creates an equality. Arguments are ordered by id, so
    /// `eq(a, b) == eq(b, a)`. Both sides must have the same sort.
    pub fn eq(&self, a: Term, b: Term) -> Result<Term, TermError> {
        if self.ty(a) != self.ty(b) {
            return Err(TermError::EqSorts);
        }
        let (a, b) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        Ok(self.intern(TermData::Eq(a, b)))
    }

    /// Creates a boolean negation. `not(not(t))` collapses to `t`.
    pub fn not(&self, t: Term) -> Result<Term, TermError> {
        if !self.ty(t).is_bool() {
            return Err(TermError::NotOnNonBool);
        }
        match self.data(t) {
            TermData::Not(u) => Ok(u),
            TermData::True => Ok(self.falsum()),
            TermData::False => Ok(self.verum()),
            _ => Ok(self.intern(TermData::Not(t))),
        }
    }

    /// Returns a shallow view of a term.
    pub fn view(&self, t: Term) -> TermView {
        match self.data(t) {
            TermData::True => TermView::True,
            TermData::False => TermView::False,
            TermData::Const(sym, sort) => TermView::Const(sym, sort),
            TermData::App(f, args) => TermView::App(f, args.into_vec()),
            TermData::Eq(a, b) => TermView::Eq(a, b),
            TermData::Not(u) => TermView::Not(u),
        }
    }

    /// Returns the sort of a term.
    pub fn ty(&self, t: Term) -> Sort {
        match self.data(t) {
            TermData::True | TermData::False | TermData::Eq(..) | TermData::Not(_) => Sort::BOOL,
            TermData::Const(_, sort) => sort,
            TermData::App(f, _) => self.funs.read().unwrap()[f.0 as usize].range,
        }
    }

    /// Strips an outer negation. Returns the absolute term and `true` if
    /// the sign was unchanged.
    ///
    /// Negations collapse structurally at construction, so at most one
    /// stripping step is ever needed.
    pub fn abs(&self, t: Term) -> (Term, bool) {
        match self.data(t) {
            TermData::Not(u) => (u, false),
            _ => (t, true),
        }
    }

    /// The number of interned terms.
    pub fn len(&self) -> usize {
        self.terms.read().unwrap().len()
    }

    /// Returns `true` if the store contains only the two boolean constants.
    pub fn is_empty(&self) -> bool {
        self.len() <= 2
    }

    /// Renders a term for diagnostics.
    pub fn to_string(&self, t: Term) -> String {
        match self.data(t) {
            TermData::True => "true".to_string(),
            TermData::False => "false".to_string(),
            TermData::Const(sym, _) => self.symbol_name(sym),
            TermData::App(f, args) => {
                let args = args.iter().map(|&a| self.to_string(a)).collect::<Vec<_>>().join(" ");
                format!("({} {args})", self.fun_name(f))
            }
            TermData::Eq(a, b) => format!("(= {} {})", self.to_string(a), self.to_string(b)),
            TermData::Not(u) => format!("(not {})", self.to_string(u)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Sort, TermError, TermStore, TermView};

    #[test]
    fn test_hash_consing() {
        let store = TermStore::new();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        assert_eq!(store.constant("a", u).unwrap(), a);
        assert_ne!(a, b);
        let f = store.declare_fun("f", &[u], u).unwrap();
        assert_eq!(store.app(f, &[a]).unwrap(), store.app(f, &[a]).unwrap());
        assert_ne!(store.app(f, &[a]).unwrap(), store.app(f, &[b]).unwrap());
    }

    #[test]
    fn test_eq_is_unordered() {
        let store = TermStore::new();
        let u = store.sort("U");
        let a = store.constant("a", u).unwrap();
        let b = store.constant("b", u).unwrap();
        assert_eq!(store.eq(a, b).unwrap(), store.eq(b, a).unwrap());
    }

    #[test]
    fn test_not_collapses() {
        let store = TermStore::new();
        let p = store.bool_const("p").unwrap();
        let np = store.not(p).unwrap();
        assert_eq!(store.not(np).unwrap(), p);
        assert_eq!(store.not(store.verum()).unwrap(), store.falsum());
        assert_eq!(store.abs(np), (p, false));
        assert_eq!(store.abs(p), (p, true));
    }

    #[test]
    fn test_type_errors() {
        let store = TermStore::new();
        let u = store.sort("U");
        let v = store.sort("V");
        let a = store.constant("a", u).unwrap();
        let p = store.bool_const("p").unwrap();
        assert_eq!(store.constant("a", v), Err(TermError::ConstRedeclared("a".to_string())));
        assert_eq!(store.eq(a, p), Err(TermError::EqSorts));
        assert_eq!(store.not(a), Err(TermError::NotOnNonBool));
        let f = store.declare_fun("f", &[u, u], u).unwrap();
        assert!(matches!(store.app(f, &[a]), Err(TermError::Arity { .. })));
        assert!(matches!(store.app(f, &[a, p]), Err(TermError::ArgumentSort { index: 1, .. })));
        assert!(store.declare_fun("f", &[u, u], u).is_ok());
        assert!(store.declare_fun("f", &[u], u).is_err());
    }

    #[test]
    fn test_views() {
        let store = TermStore::new();
        assert_eq!(store.view(store.verum()), TermView::True);
        assert_eq!(store.view(store.falsum()), TermView::False);
        let p = store.bool_const("p").unwrap();
        assert_eq!(store.ty(p), Sort::BOOL);
        let np = store.not(p).unwrap();
        assert_eq!(store.view(np), TermView::Not(p));
        assert_eq!(store.to_string(np), "(not p)");
    }
}
