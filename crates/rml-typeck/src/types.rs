use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt;

// ── Types ────────────────────────────────────────────────────────

pub type TyVarId = u32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    /// Unification variable, bound through the [`TypeStore`].
    Var(TyVarId),
    Number,
    String,
    Boolean,
    Unit,
    /// Untyped interop value: unifies with anything.
    Native,
    /// `[T]`
    Array(Box<Ty>),
    /// `(A, B)`
    Tuple(Vec<Ty>),
    /// `{x: A, y: B}`, properties in declaration order.
    Object(Vec<(SmolStr, Ty)>),
    /// Function type: `Fn([param_types], return_type)`
    Fn(Vec<Ty>, Box<Ty>),
    /// Algebraic data type instance: `Tag("Option", [Number])`
    Tag(SmolStr, Vec<Ty>),
    /// Type-class type: the class name and its subject type.
    TypeClass(SmolStr, Box<Ty>),
    /// A type reached through a plain type alias; displays as the alias name.
    Aliased(SmolStr, Box<Ty>),
}

impl Ty {
    pub fn array(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    pub fn func(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fn(params, Box::new(ret))
    }

    /// Strip alias wrappers.
    pub fn unaliased(&self) -> &Ty {
        match self {
            Ty::Aliased(_, inner) => inner.unaliased(),
            other => other,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::default();
        printer.write(f, self, false)
    }
}

/// Names variables `#a`, `#b`, ... in order of first appearance.
#[derive(Default)]
struct Printer {
    names: HashMap<TyVarId, String>,
}

impl Printer {
    fn var_name(&mut self, id: TyVarId) -> String {
        let next = self.names.len();
        self.names
            .entry(id)
            .or_insert_with(|| {
                let letter = (b'a' + (next % 26) as u8) as char;
                if next < 26 {
                    format!("#{}", letter)
                } else {
                    format!("#{}{}", letter, next / 26)
                }
            })
            .clone()
    }

    fn write(&mut self, f: &mut fmt::Formatter<'_>, ty: &Ty, nested: bool) -> fmt::Result {
        match ty {
            Ty::Var(id) => {
                let name = self.var_name(*id);
                write!(f, "{}", name)
            }
            Ty::Number => write!(f, "Number"),
            Ty::String => write!(f, "String"),
            Ty::Boolean => write!(f, "Boolean"),
            Ty::Unit => write!(f, "Unit"),
            Ty::Native => write!(f, "Native"),
            Ty::Array(elem) => {
                write!(f, "[")?;
                self.write(f, elem, false)?;
                write!(f, "]")
            }
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                self.list(f, elems)?;
                write!(f, ")")
            }
            Ty::Object(props) => {
                write!(f, "{{")?;
                for (i, (name, t)) in props.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    self.write(f, t, false)?;
                }
                write!(f, "}}")
            }
            Ty::Fn(params, ret) => {
                write!(f, "Function(")?;
                for p in params {
                    self.write(f, p, false)?;
                    write!(f, ", ")?;
                }
                self.write(f, ret, false)?;
                write!(f, ")")
            }
            Ty::Tag(name, args) if args.is_empty() => write!(f, "{}", name),
            Ty::Tag(name, args) => {
                if nested {
                    write!(f, "(")?;
                }
                write!(f, "{}", name)?;
                for a in args {
                    write!(f, " ")?;
                    self.write(f, a, true)?;
                }
                if nested {
                    write!(f, ")")?;
                }
                Ok(())
            }
            Ty::TypeClass(name, subject) => {
                write!(f, "{} ", name)?;
                self.write(f, subject, true)
            }
            Ty::Aliased(name, _) => write!(f, "{}", name),
        }
    }

    fn list(&mut self, f: &mut fmt::Formatter<'_>, tys: &[Ty]) -> fmt::Result {
        for (i, t) in tys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.write(f, t, false)?;
        }
        Ok(())
    }
}

// ── Type store ───────────────────────────────────────────────────

/// Position in the binding trail; see [`TypeStore::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    trail_len: usize,
}

/// Type variable slots. A bound slot is transparent: every read goes
/// through [`TypeStore::prune`] or [`TypeStore::resolve`].
#[derive(Debug, Default)]
pub struct TypeStore {
    slots: Vec<Option<Ty>>,
    /// Previous slot contents, recorded while a snapshot is open.
    trail: Vec<(TyVarId, Option<Ty>)>,
    open_snapshots: usize,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_var(&mut self) -> Ty {
        let id = self.slots.len() as TyVarId;
        self.slots.push(None);
        Ty::Var(id)
    }

    pub(crate) fn bind(&mut self, id: TyVarId, ty: Ty) {
        let slot = &mut self.slots[id as usize];
        let previous = slot.replace(ty);
        if self.open_snapshots > 0 {
            self.trail.push((id, previous));
        }
    }

    // ── Snapshots ────────────────────────────────────────────────

    /// Start recording bindings so they can be undone with [`rollback_to`](Self::rollback_to).
    pub fn snapshot(&mut self) -> Snapshot {
        self.open_snapshots += 1;
        Snapshot {
            trail_len: self.trail.len(),
        }
    }

    /// Undo every binding made since `snapshot`.
    pub fn rollback_to(&mut self, snapshot: Snapshot) {
        while self.trail.len() > snapshot.trail_len {
            if let Some((id, previous)) = self.trail.pop() {
                self.slots[id as usize] = previous;
            }
        }
        self.close(snapshot);
    }

    /// Keep every binding made since `snapshot`.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.close(snapshot);
    }

    fn close(&mut self, snapshot: Snapshot) {
        debug_assert!(self.trail.len() >= snapshot.trail_len);
        self.open_snapshots = self.open_snapshots.saturating_sub(1);
        // Entries stay while an outer snapshot may still roll back.
        if self.open_snapshots == 0 {
            self.trail.clear();
        }
    }

    // ── Pruning ──────────────────────────────────────────────────

    /// Follow variable bindings without stripping alias wrappers.
    pub(crate) fn shallow(&self, ty: &Ty) -> Ty {
        let mut current = ty;
        while let Ty::Var(id) = current {
            match &self.slots[*id as usize] {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    /// The representative type: bound variables followed, aliases stripped.
    pub fn prune(&self, ty: &Ty) -> Ty {
        self.prune_aliased(ty).0
    }

    /// Like [`prune`](Self::prune), also returning the outermost alias name met.
    pub(crate) fn prune_aliased(&self, ty: &Ty) -> (Ty, Option<SmolStr>) {
        let mut alias = None;
        let mut current = self.shallow(ty);
        loop {
            match current {
                Ty::Aliased(name, inner) => {
                    alias.get_or_insert(name);
                    current = self.shallow(&inner);
                }
                other => return (other, alias),
            }
        }
    }

    /// The variable whose slot holds the representative of `ty`, if `ty`
    /// reaches a concrete type through at least one variable.
    pub(crate) fn last_var(&self, ty: &Ty) -> Option<TyVarId> {
        let mut current = ty;
        let mut last = None;
        while let Ty::Var(id) = current {
            match &self.slots[*id as usize] {
                Some(next) => {
                    last = Some(*id);
                    current = next;
                }
                None => return None,
            }
        }
        last
    }

    /// Apply the substitution deeply.
    pub fn resolve(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(id) => match &self.slots[*id as usize] {
                Some(bound) => self.resolve(bound),
                None => ty.clone(),
            },
            Ty::Array(elem) => Ty::array(self.resolve(elem)),
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|t| self.resolve(t)).collect()),
            Ty::Object(props) => Ty::Object(
                props
                    .iter()
                    .map(|(k, t)| (k.clone(), self.resolve(t)))
                    .collect(),
            ),
            Ty::Fn(params, ret) => Ty::func(
                params.iter().map(|p| self.resolve(p)).collect(),
                self.resolve(ret),
            ),
            Ty::Tag(name, args) => {
                Ty::Tag(name.clone(), args.iter().map(|a| self.resolve(a)).collect())
            }
            Ty::TypeClass(name, subject) => {
                Ty::TypeClass(name.clone(), Box::new(self.resolve(subject)))
            }
            Ty::Aliased(name, inner) => Ty::Aliased(name.clone(), Box::new(self.resolve(inner))),
            Ty::Number | Ty::String | Ty::Boolean | Ty::Unit | Ty::Native => ty.clone(),
        }
    }

    /// Render with the substitution applied.
    pub fn display(&self, ty: &Ty) -> String {
        self.resolve(ty).to_string()
    }

    pub(crate) fn occurs_in(&self, var: TyVarId, ty: &Ty) -> bool {
        match self.shallow(ty) {
            Ty::Var(id) => id == var,
            Ty::Array(elem) => self.occurs_in(var, &elem),
            Ty::Tuple(elems) => elems.iter().any(|t| self.occurs_in(var, t)),
            Ty::Object(props) => props.iter().any(|(_, t)| self.occurs_in(var, t)),
            Ty::Fn(params, ret) => {
                params.iter().any(|p| self.occurs_in(var, p)) || self.occurs_in(var, &ret)
            }
            Ty::Tag(_, args) => args.iter().any(|a| self.occurs_in(var, a)),
            Ty::TypeClass(_, subject) => self.occurs_in(var, &subject),
            Ty::Aliased(_, inner) => self.occurs_in(var, &inner),
            Ty::Number | Ty::String | Ty::Boolean | Ty::Unit | Ty::Native => false,
        }
    }

    // ── Instantiation ────────────────────────────────────────────

    /// A variable is generic unless it occurs in one of the non-generic types.
    fn is_generic(&self, var: TyVarId, non_generic: &[Ty]) -> bool {
        !non_generic.iter().any(|t| self.occurs_in(var, t))
    }

    fn has_generic_var(&self, ty: &Ty, non_generic: &[Ty]) -> bool {
        match self.shallow(ty) {
            Ty::Var(id) => self.is_generic(id, non_generic),
            Ty::Array(elem) => self.has_generic_var(&elem, non_generic),
            Ty::Tuple(elems) => elems.iter().any(|t| self.has_generic_var(t, non_generic)),
            Ty::Object(props) => props
                .iter()
                .any(|(_, t)| self.has_generic_var(t, non_generic)),
            Ty::Fn(params, ret) => {
                params.iter().any(|p| self.has_generic_var(p, non_generic))
                    || self.has_generic_var(&ret, non_generic)
            }
            Ty::Tag(_, args) => args.iter().any(|a| self.has_generic_var(a, non_generic)),
            Ty::TypeClass(_, subject) => self.has_generic_var(&subject, non_generic),
            Ty::Aliased(_, inner) => self.has_generic_var(&inner, non_generic),
            Ty::Number | Ty::String | Ty::Boolean | Ty::Unit | Ty::Native => false,
        }
    }

    /// Copy `ty`, replacing every generic variable with a new one.
    /// Non-generic variables stay shared.
    pub fn fresh(&mut self, ty: &Ty, non_generic: &[Ty]) -> Ty {
        let mut mapping = HashMap::new();
        self.fresh_with(ty, non_generic, &mut mapping)
    }

    /// [`fresh`](Self::fresh) over several types that must share one instantiation.
    pub fn fresh_with(
        &mut self,
        ty: &Ty,
        non_generic: &[Ty],
        mapping: &mut HashMap<TyVarId, Ty>,
    ) -> Ty {
        // Nothing to instantiate: keep the variable so later bindings through
        // it stay visible.
        if matches!(ty, Ty::Var(_)) && !self.has_generic_var(ty, non_generic) {
            return ty.clone();
        }
        match self.shallow(ty) {
            Ty::Var(id) => {
                if !self.is_generic(id, non_generic) {
                    return Ty::Var(id);
                }
                if let Some(existing) = mapping.get(&id) {
                    return existing.clone();
                }
                let var = self.fresh_var();
                mapping.insert(id, var.clone());
                var
            }
            Ty::Array(elem) => Ty::array(self.fresh_with(&elem, non_generic, mapping)),
            Ty::Tuple(elems) => Ty::Tuple(
                elems
                    .iter()
                    .map(|t| self.fresh_with(t, non_generic, mapping))
                    .collect(),
            ),
            Ty::Object(props) => Ty::Object(
                props
                    .iter()
                    .map(|(k, t)| (k.clone(), self.fresh_with(t, non_generic, mapping)))
                    .collect(),
            ),
            Ty::Fn(params, ret) => {
                let params = params
                    .iter()
                    .map(|p| self.fresh_with(p, non_generic, mapping))
                    .collect();
                let ret = self.fresh_with(&ret, non_generic, mapping);
                Ty::func(params, ret)
            }
            Ty::Tag(name, args) => Ty::Tag(
                name,
                args.iter()
                    .map(|a| self.fresh_with(a, non_generic, mapping))
                    .collect(),
            ),
            Ty::TypeClass(name, subject) => Ty::TypeClass(
                name,
                Box::new(self.fresh_with(&subject, non_generic, mapping)),
            ),
            Ty::Aliased(name, inner) => Ty::Aliased(
                name,
                Box::new(self.fresh_with(&inner, non_generic, mapping)),
            ),
            other @ (Ty::Number | Ty::String | Ty::Boolean | Ty::Unit | Ty::Native) => other,
        }
    }
}

/// Merge curried results into one n-ary function type:
/// params `[a]` and result `Function(b, c)` give `Function(a, b, c)`.
pub(crate) fn flatten_function_type(store: &TypeStore, params: Vec<Ty>, result: Ty) -> Ty {
    let mut params = params;
    let mut current = result;
    while let Ty::Fn(inner, ret) = store.prune(&current) {
        params.extend(inner);
        current = *ret;
    }
    Ty::func(params, current)
}
