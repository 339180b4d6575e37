//! aster-ast: the resolved AST consumed by the type system core.
//!
//! Parsing and name resolution happen upstream; this crate only models their
//! output. Declarations live in per-kind arenas inside [`ast::Program`] and
//! reference each other through typed indices, so declaration identity is
//! stable for the whole typing pass. Every typeable node carries a write-once
//! [`ast::TySlot`] that the type checker fills exactly once.

pub mod span {
    use serde::{Deserialize, Serialize};

    /// Byte span in the source file, attached to every node for diagnostics.
    #[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Span {
        pub offset: usize,
        pub len: usize,
    }

    impl Span {
        pub fn new(offset: usize, len: usize) -> Self {
            Self { offset, len }
        }
    }
}

pub mod ids {
    use serde::{Deserialize, Serialize};

    macro_rules! define_id {
        ($(#[$doc:meta])* $name:ident) => {
            $(#[$doc])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        };
    }

    define_id!(
        /// Module declaration index.
        ModId
    );
    define_id!(
        /// Function declaration index.
        FnId
    );
    define_id!(
        /// Struct declaration index.
        StructId
    );
    define_id!(
        /// Enum declaration index.
        EnumId
    );
    define_id!(
        /// Trait declaration index.
        TraitId
    );
    define_id!(
        /// Impl declaration index.
        ImplId
    );
    define_id!(
        /// Type alias declaration index.
        AliasId
    );
    define_id!(
        /// Type parameter declaration index.
        TypeParamId
    );
    define_id!(
        /// Local (let- or parameter-bound) value index.
        LocalId
    );

    define_id!(
        /// Opaque handle into the type universe. Defined here rather than in
        /// the types crate so AST nodes can carry resolved types; handle
        /// equality coincides with structural type equality by the interning
        /// contract.
        TypeId
    );
}

pub mod ty {
    use serde::{Deserialize, Serialize};

    /// Primitive type tags of the source language.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum PrimTag {
        Bool,
        I8,
        I16,
        I32,
        I64,
        U8,
        U16,
        U32,
        U64,
        F16,
        F32,
        F64,
    }

    impl PrimTag {
        pub fn is_signed(self) -> bool {
            matches!(self, PrimTag::I8 | PrimTag::I16 | PrimTag::I32 | PrimTag::I64)
        }

        pub fn is_unsigned(self) -> bool {
            matches!(self, PrimTag::U8 | PrimTag::U16 | PrimTag::U32 | PrimTag::U64)
        }

        pub fn is_integer(self) -> bool {
            self.is_signed() || self.is_unsigned()
        }

        pub fn is_float(self) -> bool {
            matches!(self, PrimTag::F16 | PrimTag::F32 | PrimTag::F64)
        }

        pub fn bit_width(self) -> u32 {
            match self {
                PrimTag::Bool => 1,
                PrimTag::I8 | PrimTag::U8 => 8,
                PrimTag::I16 | PrimTag::U16 | PrimTag::F16 => 16,
                PrimTag::I32 | PrimTag::U32 | PrimTag::F32 => 32,
                PrimTag::I64 | PrimTag::U64 | PrimTag::F64 => 64,
            }
        }

        pub fn name(self) -> &'static str {
            match self {
                PrimTag::Bool => "bool",
                PrimTag::I8 => "i8",
                PrimTag::I16 => "i16",
                PrimTag::I32 => "i32",
                PrimTag::I64 => "i64",
                PrimTag::U8 => "u8",
                PrimTag::U16 => "u16",
                PrimTag::U32 => "u32",
                PrimTag::U64 => "u64",
                PrimTag::F16 => "f16",
                PrimTag::F32 => "f32",
                PrimTag::F64 => "f64",
            }
        }
    }
}

pub mod ast {
    use std::cell::{Cell, OnceCell};

    use serde::{Deserialize, Serialize};

    use crate::ids::*;
    use crate::span::Span;
    use crate::ty::PrimTag;

    /// Write-once type slot carried by every typeable node.
    ///
    /// The typing pass is single-threaded, so a plain `Cell` is enough; the
    /// slot is written at most once (re-setting to the same type is allowed so
    /// recovery paths stay simple).
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct TySlot(Cell<Option<TypeId>>);

    impl TySlot {
        pub fn new() -> Self {
            Self(Cell::new(None))
        }

        pub fn get(&self) -> Option<TypeId> {
            self.0.get()
        }

        pub fn set(&self, ty: TypeId) {
            debug_assert!(
                self.0.get().is_none() || self.0.get() == Some(ty),
                "type slot written twice with different types"
            );
            self.0.set(Some(ty));
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum Literal {
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    // ---------- Type expressions ----------

    /// A resolved reference inside a type expression. Name resolution has
    /// already linked the path to its declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum NamedRef {
        Struct(StructId),
        Enum(EnumId),
        Trait(TraitId),
        Alias(AliasId),
        Param(TypeParamId),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum TypeExprKind {
        Prim(PrimTag),
        /// `(A, B, ...)`; the empty tuple is the unit type.
        Tuple(Vec<TypeExpr>),
        SizedArray {
            elem: Box<TypeExpr>,
            size: u64,
            simd: bool,
        },
        UnsizedArray(Box<TypeExpr>),
        Ptr {
            pointee: Box<TypeExpr>,
            mutable: bool,
            addr_space: u32,
        },
        Ref {
            pointee: Box<TypeExpr>,
            mutable: bool,
            addr_space: u32,
        },
        Fn {
            dom: Box<TypeExpr>,
            codom: Box<TypeExpr>,
        },
        /// Continuation type `cn (T)`, i.e. a function that never returns.
        Cn(Box<TypeExpr>),
        Named {
            target: NamedRef,
            args: Vec<TypeExpr>,
        },
        /// Produced by parser recovery; types to the error type silently.
        Error,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TypeExpr {
        pub kind: TypeExprKind,
        pub span: Span,
        pub ty: TySlot,
    }

    impl TypeExpr {
        pub fn new(kind: TypeExprKind, span: Span) -> Self {
            Self { kind, span, ty: TySlot::new() }
        }
    }

    // ---------- Patterns and expressions ----------

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum PtrnKind {
        Bind(LocalId),
        Tuple(Vec<Ptrn>),
        Lit(Literal),
        Wildcard,
        Annot {
            ptrn: Box<Ptrn>,
            ty: TypeExpr,
        },
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ptrn {
        pub kind: PtrnKind,
        pub span: Span,
        pub ty: TySlot,
    }

    impl Ptrn {
        pub fn new(kind: PtrnKind, span: Span) -> Self {
            Self { kind, span, ty: TySlot::new() }
        }
    }

    /// A resolved value reference.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum DefRef {
        Local(LocalId),
        Fn(FnId),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum ExprKind {
        Lit(Literal),
        Var(DefRef),
        Tuple(Vec<Expr>),
        Array {
            elems: Vec<Expr>,
            simd: bool,
        },
        Call {
            callee: Box<Expr>,
            arg: Box<Expr>,
        },
        Field {
            base: Box<Expr>,
            member: String,
        },
        If {
            cond: Box<Expr>,
            then_expr: Box<Expr>,
            else_expr: Box<Expr>,
        },
        Block(Vec<Expr>),
        Let {
            ptrn: Ptrn,
            init: Box<Expr>,
        },
        Lambda {
            param: Ptrn,
            body: Box<Expr>,
        },
        Annot {
            expr: Box<Expr>,
            ty: TypeExpr,
        },
        /// Produced by parser recovery; types to the error type silently.
        Error,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Expr {
        pub kind: ExprKind,
        pub span: Span,
        pub ty: TySlot,
    }

    impl Expr {
        pub fn new(kind: ExprKind, span: Span) -> Self {
            Self { kind, span, ty: TySlot::new() }
        }
    }

    // ---------- Declarations ----------

    /// The declaration a nested declaration hangs off.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum Parent {
        Mod(ModId),
        Fn(FnId),
        Trait(TraitId),
        Impl(ImplId),
    }

    /// A trait obligation attached to a function or impl.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct WhereClause {
        pub ty: TypeExpr,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TypeParam {
        pub name: String,
        pub span: Span,
        /// Trait bounds written inline on the parameter; treated like the
        /// owning declaration's `where` clauses.
        pub bounds: Vec<TypeExpr>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LocalDecl {
        pub name: String,
        pub span: Span,
        pub ty: TySlot,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct FnDecl {
        pub name: String,
        pub span: Span,
        pub parent: Parent,
        pub type_params: Vec<TypeParamId>,
        pub where_clauses: Vec<WhereClause>,
        /// `None` for value definitions (constants).
        pub param: Option<Ptrn>,
        pub ret: Option<TypeExpr>,
        /// Trait method signatures may have no body; in a trait, a present
        /// body is the method's default implementation.
        pub body: Option<Expr>,
        pub ty: TySlot,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct FieldDecl {
        pub name: String,
        pub span: Span,
        pub ty_expr: TypeExpr,
        pub has_default: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct StructDecl {
        pub name: String,
        pub span: Span,
        pub parent: ModId,
        pub type_params: Vec<TypeParamId>,
        pub where_clauses: Vec<WhereClause>,
        pub fields: Vec<FieldDecl>,
        pub is_tuple_like: bool,
    }

    /// One constructor of an enum; `payload` is `None` for unit options.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct OptionDecl {
        pub name: String,
        pub span: Span,
        pub payload: Option<TypeExpr>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EnumDecl {
        pub name: String,
        pub span: Span,
        pub parent: ModId,
        pub type_params: Vec<TypeParamId>,
        pub options: Vec<OptionDecl>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TraitDecl {
        pub name: String,
        pub span: Span,
        pub parent: ModId,
        pub type_params: Vec<TypeParamId>,
        pub decls: Vec<FnId>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ImplDecl {
        pub span: Span,
        pub parent: ModId,
        pub type_params: Vec<TypeParamId>,
        pub where_clauses: Vec<WhereClause>,
        /// The implemented trait application, e.g. `Hash[(i32, i32)]`.
        pub trait_ty: TypeExpr,
        pub decls: Vec<FnId>,
    }

    /// A transparent type alias.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TypeDecl {
        pub name: String,
        pub span: Span,
        pub parent: ModId,
        pub type_params: Vec<TypeParamId>,
        pub body: TypeExpr,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum Item {
        Mod(ModId),
        Fn(FnId),
        Struct(StructId),
        Enum(EnumId),
        Trait(TraitId),
        Impl(ImplId),
        Alias(AliasId),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ModDecl {
        pub name: String,
        pub span: Span,
        pub parent: Option<ModId>,
        pub items: Vec<Item>,
        /// Named members, materialized on first access (impls are unnamed and
        /// filtered out). Not part of the serialized form.
        #[serde(skip)]
        pub members: OnceCell<Vec<Item>>,
    }

    // ---------- Program ----------

    /// The whole resolved program: one arena per declaration kind.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Program {
        pub mods: Vec<ModDecl>,
        pub fns: Vec<FnDecl>,
        pub structs: Vec<StructDecl>,
        pub enums: Vec<EnumDecl>,
        pub traits: Vec<TraitDecl>,
        pub impls: Vec<ImplDecl>,
        pub aliases: Vec<TypeDecl>,
        pub type_params: Vec<TypeParam>,
        pub locals: Vec<LocalDecl>,
    }

    impl Program {
        /// A fresh program with the (nameless) root module already in place.
        pub fn new() -> Self {
            let mut p = Self::default();
            p.mods.push(ModDecl {
                name: String::new(),
                span: Span::default(),
                parent: None,
                items: Vec::new(),
                members: OnceCell::new(),
            });
            p
        }

        pub fn root(&self) -> ModId {
            ModId(0)
        }

        // ---------- accessors ----------

        pub fn mod_decl(&self, id: ModId) -> &ModDecl {
            &self.mods[id.index()]
        }

        pub fn fn_decl(&self, id: FnId) -> &FnDecl {
            &self.fns[id.index()]
        }

        pub fn fn_decl_mut(&mut self, id: FnId) -> &mut FnDecl {
            &mut self.fns[id.index()]
        }

        pub fn struct_decl(&self, id: StructId) -> &StructDecl {
            &self.structs[id.index()]
        }

        pub fn enum_decl(&self, id: EnumId) -> &EnumDecl {
            &self.enums[id.index()]
        }

        pub fn trait_decl(&self, id: TraitId) -> &TraitDecl {
            &self.traits[id.index()]
        }

        pub fn impl_decl(&self, id: ImplId) -> &ImplDecl {
            &self.impls[id.index()]
        }

        pub fn alias_decl(&self, id: AliasId) -> &TypeDecl {
            &self.aliases[id.index()]
        }

        pub fn type_param(&self, id: TypeParamId) -> &TypeParam {
            &self.type_params[id.index()]
        }

        pub fn local(&self, id: LocalId) -> &LocalDecl {
            &self.locals[id.index()]
        }

        // ---------- builders ----------

        pub fn push_mod(&mut self, name: &str, parent: ModId) -> ModId {
            let id = ModId(self.mods.len() as u32);
            self.mods.push(ModDecl {
                name: name.to_string(),
                span: Span::default(),
                parent: Some(parent),
                items: Vec::new(),
                members: OnceCell::new(),
            });
            self.mods[parent.index()].items.push(Item::Mod(id));
            id
        }

        pub fn push_fn(&mut self, decl: FnDecl) -> FnId {
            let id = FnId(self.fns.len() as u32);
            if let Parent::Mod(m) = decl.parent {
                self.mods[m.index()].items.push(Item::Fn(id));
            }
            self.fns.push(decl);
            id
        }

        pub fn push_struct(&mut self, decl: StructDecl) -> StructId {
            let id = StructId(self.structs.len() as u32);
            self.mods[decl.parent.index()].items.push(Item::Struct(id));
            self.structs.push(decl);
            id
        }

        pub fn push_enum(&mut self, decl: EnumDecl) -> EnumId {
            let id = EnumId(self.enums.len() as u32);
            self.mods[decl.parent.index()].items.push(Item::Enum(id));
            self.enums.push(decl);
            id
        }

        pub fn push_trait(&mut self, decl: TraitDecl) -> TraitId {
            let id = TraitId(self.traits.len() as u32);
            self.mods[decl.parent.index()].items.push(Item::Trait(id));
            self.traits.push(decl);
            id
        }

        pub fn push_impl(&mut self, decl: ImplDecl) -> ImplId {
            let id = ImplId(self.impls.len() as u32);
            self.mods[decl.parent.index()].items.push(Item::Impl(id));
            self.impls.push(decl);
            id
        }

        pub fn push_alias(&mut self, decl: TypeDecl) -> AliasId {
            let id = AliasId(self.aliases.len() as u32);
            self.mods[decl.parent.index()].items.push(Item::Alias(id));
            self.aliases.push(decl);
            id
        }

        pub fn push_type_param(&mut self, name: &str) -> TypeParamId {
            let id = TypeParamId(self.type_params.len() as u32);
            self.type_params.push(TypeParam {
                name: name.to_string(),
                span: Span::default(),
                bounds: Vec::new(),
            });
            id
        }

        pub fn push_local(&mut self, name: &str) -> LocalId {
            let id = LocalId(self.locals.len() as u32);
            self.locals.push(LocalDecl {
                name: name.to_string(),
                span: Span::default(),
                ty: TySlot::new(),
            });
            id
        }

        // ---------- structure walks ----------

        /// The module a function ultimately lives in, walking through any
        /// enclosing functions, traits, or impls.
        pub fn fn_mod(&self, id: FnId) -> ModId {
            let mut parent = self.fn_decl(id).parent;
            loop {
                match parent {
                    Parent::Mod(m) => return m,
                    Parent::Fn(f) => parent = self.fn_decl(f).parent,
                    Parent::Trait(t) => return self.trait_decl(t).parent,
                    Parent::Impl(i) => return self.impl_decl(i).parent,
                }
            }
        }

        /// The function chain from `id` outward (including `id` itself), plus
        /// the impl the innermost non-function parent belongs to, if any.
        pub fn enclosing_fns(&self, id: FnId) -> (Vec<FnId>, Option<ImplId>) {
            let mut fns = vec![id];
            let mut parent = self.fn_decl(id).parent;
            loop {
                match parent {
                    Parent::Fn(f) => {
                        fns.push(f);
                        parent = self.fn_decl(f).parent;
                    }
                    Parent::Impl(i) => return (fns, Some(i)),
                    Parent::Mod(_) | Parent::Trait(_) => return (fns, None),
                }
            }
        }

        /// Modules from `id` outward to the root.
        pub fn mod_chain(&self, id: ModId) -> Vec<ModId> {
            let mut chain = vec![id];
            let mut cur = id;
            while let Some(p) = self.mod_decl(cur).parent {
                chain.push(p);
                cur = p;
            }
            chain
        }

        /// The name of an item, if it has one (impls are unnamed).
        pub fn item_name(&self, item: Item) -> Option<&str> {
            match item {
                Item::Mod(m) => Some(&self.mod_decl(m).name),
                Item::Fn(f) => Some(&self.fn_decl(f).name),
                Item::Struct(s) => Some(&self.struct_decl(s).name),
                Item::Enum(e) => Some(&self.enum_decl(e).name),
                Item::Trait(t) => Some(&self.trait_decl(t).name),
                Item::Alias(a) => Some(&self.alias_decl(a).name),
                Item::Impl(_) => None,
            }
        }

        /// Named members of a module, materialized lazily on first access.
        pub fn mod_members(&self, id: ModId) -> &[Item] {
            self.mod_decl(id).members.get_or_init(|| {
                self.mod_decl(id)
                    .items
                    .iter()
                    .copied()
                    .filter(|it| self.item_name(*it).is_some())
                    .collect()
            })
        }
    }
}

pub use ast::Program;
pub use ids::TypeId;
pub use span::Span;

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::ids::*;
    use crate::span::Span;

    #[test]
    fn ty_slot_write_once() {
        let slot = TySlot::new();
        assert_eq!(slot.get(), None);
        slot.set(TypeId(3));
        assert_eq!(slot.get(), Some(TypeId(3)));
        // Re-setting to the same type is allowed.
        slot.set(TypeId(3));
        assert_eq!(slot.get(), Some(TypeId(3)));
    }

    #[test]
    fn mod_members_skip_impls() {
        let mut p = Program::new();
        let root = p.root();
        let m = p.push_mod("inner", root);
        p.push_impl(ImplDecl {
            span: Span::default(),
            parent: m,
            type_params: vec![],
            where_clauses: vec![],
            trait_ty: TypeExpr::new(TypeExprKind::Error, Span::default()),
            decls: vec![],
        });
        let f = p.push_fn(FnDecl {
            name: "f".into(),
            span: Span::default(),
            parent: Parent::Mod(m),
            type_params: vec![],
            where_clauses: vec![],
            param: None,
            ret: None,
            body: None,
            ty: TySlot::new(),
        });
        let members = p.mod_members(m);
        assert_eq!(members.len(), 1);
        assert!(matches!(members[0], Item::Fn(id) if id == f));
    }

    #[test]
    fn fn_mod_walks_through_nested_fns() {
        let mut p = Program::new();
        let root = p.root();
        let m = p.push_mod("m", root);
        let outer = p.push_fn(FnDecl {
            name: "outer".into(),
            span: Span::default(),
            parent: Parent::Mod(m),
            type_params: vec![],
            where_clauses: vec![],
            param: None,
            ret: None,
            body: None,
            ty: TySlot::new(),
        });
        let inner = p.push_fn(FnDecl {
            name: "inner".into(),
            span: Span::default(),
            parent: Parent::Fn(outer),
            type_params: vec![],
            where_clauses: vec![],
            param: None,
            ret: None,
            body: None,
            ty: TySlot::new(),
        });
        assert_eq!(p.fn_mod(inner), m);
        assert_eq!(p.mod_chain(m), vec![m, root]);
    }
}
