//! The hash-consing type factory.
//!
//! A [`TypeUniverse`] owns every [`Type`] produced during a typing pass and
//! guarantees that structurally equal constructor calls return the same
//! [`TypeId`]. All structural queries (`contains`, `is_sized`, `order`) are
//! cycle-safe through visited sets, since nominal members may refer back to
//! their own type, and memoized per universe.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use aster_ast::ast::{Item, Program};
use aster_ast::ids::{AliasId, EnumId, FnId, ImplId, ModId, StructId, TraitId, TypeParamId};

use crate::types::{PrimTag, ReplaceMap, Type, TypeId, TypeIds};

pub struct TypeUniverse {
    types: Vec<Type>,
    intern: FxHashMap<Type, TypeId>,
    // Cached singletons, interned once at construction.
    unit: TypeId,
    bottom: TypeId,
    top: TypeId,
    no_ret: TypeId,
    error: TypeId,
    // Memo caches for the structural queries. Results are only recorded for
    // top-level queries; in-flight cycle answers are never cached.
    contains_cache: RefCell<FxHashMap<(TypeId, TypeId), bool>>,
    sized_cache: RefCell<FxHashMap<TypeId, bool>>,
    order_cache: RefCell<FxHashMap<TypeId, u32>>,
}

impl TypeUniverse {
    pub fn new() -> Self {
        let mut uni = Self {
            types: Vec::new(),
            intern: FxHashMap::default(),
            unit: TypeId(0),
            bottom: TypeId(0),
            top: TypeId(0),
            no_ret: TypeId(0),
            error: TypeId(0),
            contains_cache: RefCell::new(FxHashMap::default()),
            sized_cache: RefCell::new(FxHashMap::default()),
            order_cache: RefCell::new(FxHashMap::default()),
        };
        uni.unit = uni.intern(Type::Tuple(TypeIds::new()));
        uni.bottom = uni.intern(Type::Bottom);
        uni.top = uni.intern(Type::Top);
        uni.no_ret = uni.intern(Type::NoRet);
        uni.error = uni.intern(Type::Error);
        uni
    }

    fn intern(&mut self, node: Type) -> TypeId {
        if let Some(&id) = self.intern.get(&node) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(node.clone());
        self.intern.insert(node, id);
        id
    }

    /// The node behind a handle. Handles are only ever produced by this
    /// universe, so the lookup is infallible.
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    /// Number of distinct types interned so far.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Read-only interning lookup: the handle for `node` if it already
    /// exists. Used by queries that must not allocate.
    pub(crate) fn lookup(&self, node: &Type) -> Option<TypeId> {
        self.intern.get(node).copied()
    }

    // ---------- constructors ----------

    pub fn prim_type(&mut self, tag: PrimTag) -> TypeId {
        self.intern(Type::Prim(tag))
    }

    pub fn bool_type(&mut self) -> TypeId {
        self.prim_type(PrimTag::Bool)
    }

    pub fn unit_type(&self) -> TypeId {
        self.unit
    }

    pub fn tuple_type(&mut self, elems: impl IntoIterator<Item = TypeId>) -> TypeId {
        let elems: TypeIds = elems.into_iter().collect();
        if elems.is_empty() {
            return self.unit;
        }
        self.intern(Type::Tuple(elems))
    }

    pub fn sized_array_type(&mut self, elem: TypeId, size: u64, simd: bool) -> TypeId {
        self.intern(Type::SizedArray { elem, size, simd })
    }

    pub fn unsized_array_type(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::UnsizedArray(elem))
    }

    pub fn ptr_type(&mut self, pointee: TypeId, mutable: bool, addr_space: u32) -> TypeId {
        self.intern(Type::Ptr { pointee, mutable, addr_space })
    }

    pub fn ref_type(&mut self, pointee: TypeId, mutable: bool, addr_space: u32) -> TypeId {
        self.intern(Type::Ref { pointee, mutable, addr_space })
    }

    pub fn fn_type(&mut self, dom: TypeId, codom: TypeId) -> TypeId {
        self.intern(Type::Fn { dom, codom })
    }

    /// Continuation type: a function that never returns in direct style.
    pub fn cn_type(&mut self, dom: TypeId) -> TypeId {
        let codom = self.no_ret;
        self.fn_type(dom, codom)
    }

    pub fn bottom_type(&self) -> TypeId {
        self.bottom
    }

    pub fn top_type(&self) -> TypeId {
        self.top
    }

    pub fn no_ret_type(&self) -> TypeId {
        self.no_ret
    }

    pub fn type_error(&self) -> TypeId {
        self.error
    }

    pub fn type_var(&mut self, param: TypeParamId) -> TypeId {
        self.intern(Type::Var(param))
    }

    pub fn forall_type(&mut self, decl: FnId, body: TypeId) -> TypeId {
        self.intern(Type::Forall { decl, body })
    }

    pub fn struct_type(&mut self, decl: StructId) -> TypeId {
        self.intern(Type::Struct(decl))
    }

    pub fn enum_type(&mut self, decl: EnumId) -> TypeId {
        self.intern(Type::Enum(decl))
    }

    pub fn trait_type(&mut self, decl: TraitId) -> TypeId {
        self.intern(Type::Trait(decl))
    }

    pub fn impl_type(&mut self, decl: ImplId) -> TypeId {
        self.intern(Type::Impl(decl))
    }

    pub fn mod_type(&mut self, decl: ModId) -> TypeId {
        self.intern(Type::Mod(decl))
    }

    pub fn type_alias(&mut self, decl: AliasId) -> TypeId {
        self.intern(Type::Alias(decl))
    }

    /// Apply a nominal type to arguments.
    ///
    /// Aliases are transparent: applying one substitutes the arguments into
    /// its (already resolved) body, so aliases never appear in normalized
    /// types. An arity mismatch or an unresolved alias body produces the
    /// error type; the caller reports.
    pub fn type_app(&mut self, prog: &Program, applied: TypeId, args: &[TypeId]) -> TypeId {
        if let Type::Alias(alias) = *self.get(applied) {
            let decl = prog.alias_decl(alias);
            if decl.type_params.len() != args.len() {
                return self.error;
            }
            let Some(body) = decl.body.ty.get() else {
                return self.error;
            };
            let map = self.alias_replace_map(prog, alias, args);
            return self.replace(body, &map);
        }
        if args.is_empty() {
            return applied;
        }
        let args = TypeIds::from_slice(args);
        self.intern(Type::App { applied, args })
    }

    /// The substitution that instantiates an alias's parameters with `args`.
    pub fn alias_replace_map(&mut self, prog: &Program, alias: AliasId, args: &[TypeId]) -> ReplaceMap {
        prog.alias_decl(alias)
            .type_params
            .iter()
            .copied()
            .zip(args.iter().copied())
            .collect()
    }

    // ---------- structural substitution ----------

    /// Structural substitution of type variables. Nominal types are identity
    /// under replacement; their parameters are captured through enclosing
    /// applications.
    pub fn replace(&mut self, t: TypeId, map: &ReplaceMap) -> TypeId {
        if map.is_empty() {
            return t;
        }
        match self.get(t).clone() {
            Type::Var(p) => map.get(&p).copied().unwrap_or(t),
            Type::Tuple(elems) => {
                let elems: TypeIds = elems.iter().map(|&e| self.replace(e, map)).collect();
                self.tuple_type(elems)
            }
            Type::SizedArray { elem, size, simd } => {
                let elem = self.replace(elem, map);
                self.sized_array_type(elem, size, simd)
            }
            Type::UnsizedArray(elem) => {
                let elem = self.replace(elem, map);
                self.unsized_array_type(elem)
            }
            Type::Ptr { pointee, mutable, addr_space } => {
                let pointee = self.replace(pointee, map);
                self.ptr_type(pointee, mutable, addr_space)
            }
            Type::Ref { pointee, mutable, addr_space } => {
                let pointee = self.replace(pointee, map);
                self.ref_type(pointee, mutable, addr_space)
            }
            Type::Fn { dom, codom } => {
                let dom = self.replace(dom, map);
                let codom = self.replace(codom, map);
                self.fn_type(dom, codom)
            }
            Type::App { applied, args } => {
                let applied = self.replace(applied, map);
                let args: TypeIds = args.iter().map(|&a| self.replace(a, map)).collect();
                self.intern(Type::App { applied, args })
            }
            _ => t,
        }
    }

    // ---------- structural queries ----------

    /// The resolved types of a nominal type's members, as far as they have
    /// been resolved. Only reads slots and the read-only intern table, so it
    /// can run during queries that hold a shared borrow of the universe.
    pub(crate) fn member_types(&self, prog: &Program, t: TypeId) -> Vec<TypeId> {
        match *self.get(t) {
            Type::Struct(id) => prog
                .struct_decl(id)
                .fields
                .iter()
                .filter_map(|f| f.ty_expr.ty.get())
                .collect(),
            Type::Enum(id) => prog
                .enum_decl(id)
                .options
                .iter()
                .filter_map(|o| match &o.payload {
                    Some(te) => te.ty.get(),
                    None => Some(self.unit),
                })
                .collect(),
            Type::Trait(id) => prog
                .trait_decl(id)
                .decls
                .iter()
                .filter_map(|&f| prog.fn_decl(f).ty.get())
                .collect(),
            Type::Impl(id) => prog
                .impl_decl(id)
                .decls
                .iter()
                .filter_map(|&f| prog.fn_decl(f).ty.get())
                .collect(),
            Type::Mod(id) => prog
                .mod_members(id)
                .iter()
                .filter_map(|&item| self.item_type(prog, item))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The type of a module member, if one exists yet. Does not allocate:
    /// nominal member types that were never interned cannot participate in
    /// any structural query either.
    pub(crate) fn item_type(&self, prog: &Program, item: Item) -> Option<TypeId> {
        match item {
            Item::Fn(f) => prog.fn_decl(f).ty.get(),
            Item::Struct(s) => self.lookup(&Type::Struct(s)),
            Item::Enum(e) => self.lookup(&Type::Enum(e)),
            Item::Trait(t) => self.lookup(&Type::Trait(t)),
            Item::Mod(m) => self.lookup(&Type::Mod(m)),
            Item::Alias(a) => prog.alias_decl(a).body.ty.get(),
            Item::Impl(_) => None,
        }
    }

    /// Structural containment: `t` contains `other` if they are equal or any
    /// structural child does. Nominal members are followed under a visited
    /// set so self-referential types terminate.
    pub fn contains(&self, prog: &Program, t: TypeId, other: TypeId) -> bool {
        if let Some(&cached) = self.contains_cache.borrow().get(&(t, other)) {
            return cached;
        }
        let mut seen = FxHashSet::default();
        let contained = self.contains_rec(prog, t, other, &mut seen);
        self.contains_cache.borrow_mut().insert((t, other), contained);
        contained
    }

    fn contains_rec(
        &self,
        prog: &Program,
        t: TypeId,
        other: TypeId,
        seen: &mut FxHashSet<TypeId>,
    ) -> bool {
        if t == other {
            return true;
        }
        match self.get(t) {
            Type::Tuple(elems) => elems.iter().any(|&e| self.contains_rec(prog, e, other, seen)),
            Type::SizedArray { elem, .. } | Type::UnsizedArray(elem) => {
                self.contains_rec(prog, *elem, other, seen)
            }
            Type::Ptr { pointee, .. } | Type::Ref { pointee, .. } => {
                self.contains_rec(prog, *pointee, other, seen)
            }
            Type::Fn { dom, codom } => {
                self.contains_rec(prog, *dom, other, seen)
                    || self.contains_rec(prog, *codom, other, seen)
            }
            Type::App { applied, args } => {
                self.contains_rec(prog, *applied, other, seen)
                    || args.iter().any(|&a| self.contains_rec(prog, a, other, seen))
            }
            Type::Forall { body, .. } => self.contains_rec(prog, *body, other, seen),
            Type::Struct(_) | Type::Enum(_) | Type::Trait(_) | Type::Impl(_) | Type::Mod(_) => {
                if !seen.insert(t) {
                    return false;
                }
                self.member_types(prog, t)
                    .into_iter()
                    .any(|m| self.contains_rec(prog, m, other, seen))
            }
            _ => false,
        }
    }

    /// Whether values of this type have a known size. Pointers and
    /// references are always sized; an unsized array in a value position is
    /// not, and a nominal cycle through value positions means the layout
    /// would be infinite, so it counts as unsized too.
    pub fn is_sized(&self, prog: &Program, t: TypeId) -> bool {
        if let Some(&cached) = self.sized_cache.borrow().get(&t) {
            return cached;
        }
        let mut seen = FxHashSet::default();
        let sized = self.is_sized_rec(prog, t, &mut seen);
        self.sized_cache.borrow_mut().insert(t, sized);
        sized
    }

    fn is_sized_rec(&self, prog: &Program, t: TypeId, seen: &mut FxHashSet<TypeId>) -> bool {
        match self.get(t) {
            Type::UnsizedArray(_) => false,
            Type::SizedArray { elem, .. } => self.is_sized_rec(prog, *elem, seen),
            Type::Tuple(elems) => elems.iter().all(|&e| self.is_sized_rec(prog, e, seen)),
            Type::App { applied, args } => {
                // Conservative: the application is sized when the applied
                // nominal and every argument are.
                self.is_sized_rec(prog, *applied, seen)
                    && args.iter().all(|&a| self.is_sized_rec(prog, a, seen))
            }
            Type::Struct(_) | Type::Enum(_) => {
                if !seen.insert(t) {
                    return false;
                }
                let sized = self
                    .member_types(prog, t)
                    .into_iter()
                    .all(|m| self.is_sized_rec(prog, m, seen));
                seen.remove(&t);
                sized
            }
            // Pointer and reference types are sized regardless of pointee.
            _ => true,
        }
    }

    /// Higher-order depth: base types are order 0, a function is one more
    /// than the deepest of its domain and codomain, containers propagate the
    /// maximum of their parts.
    pub fn order(&self, prog: &Program, t: TypeId) -> u32 {
        if let Some(&cached) = self.order_cache.borrow().get(&t) {
            return cached;
        }
        let mut seen = FxHashSet::default();
        let order = self.order_rec(prog, t, &mut seen);
        self.order_cache.borrow_mut().insert(t, order);
        order
    }

    fn order_rec(&self, prog: &Program, t: TypeId, seen: &mut FxHashSet<TypeId>) -> u32 {
        match self.get(t) {
            Type::Fn { dom, codom } => {
                1 + self
                    .order_rec(prog, *dom, seen)
                    .max(self.order_rec(prog, *codom, seen))
            }
            Type::Tuple(elems) => elems
                .iter()
                .map(|&e| self.order_rec(prog, e, seen))
                .max()
                .unwrap_or(0),
            Type::SizedArray { elem, .. } | Type::UnsizedArray(elem) => {
                self.order_rec(prog, *elem, seen)
            }
            Type::Ptr { pointee, .. } | Type::Ref { pointee, .. } => {
                self.order_rec(prog, *pointee, seen)
            }
            Type::App { applied, args } => args
                .iter()
                .map(|&a| self.order_rec(prog, a, seen))
                .max()
                .unwrap_or(0)
                .max(self.order_rec(prog, *applied, seen)),
            Type::Forall { body, .. } => self.order_rec(prog, *body, seen),
            Type::Struct(_) | Type::Enum(_) | Type::Trait(_) | Type::Impl(_) | Type::Mod(_) => {
                if !seen.insert(t) {
                    return 0;
                }
                let order = self
                    .member_types(prog, t)
                    .into_iter()
                    .map(|m| self.order_rec(prog, m, seen))
                    .max()
                    .unwrap_or(0);
                seen.remove(&t);
                order
            }
            _ => 0,
        }
    }
}

impl Default for TypeUniverse {
    fn default() -> Self {
        Self::new()
    }
}
