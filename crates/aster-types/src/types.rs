//! Core type representation.
//!
//! All types are owned by a [`crate::universe::TypeUniverse`] and referred to
//! through [`TypeId`] handles; handle equality coincides with structural
//! equality by the interning contract, so `Type` itself stores children as
//! handles rather than boxes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use aster_ast::ids::{AliasId, EnumId, FnId, ImplId, ModId, StructId, TraitId, TypeParamId};
pub use aster_ast::ids::TypeId;
pub use aster_ast::ty::PrimTag;

/// Inline-allocated child list; most tuples and applications are short.
pub type TypeIds = SmallVec<[TypeId; 4]>;

/// A finite substitution from type parameters to types, used to instantiate
/// polymorphic types and rewrite alias bodies.
pub type ReplaceMap = FxHashMap<TypeParamId, TypeId>;

/// An interned type node.
///
/// Structural variants are interned by content; nominal variants by the
/// identity of the declaration they reference. The derived `Eq`/`Hash`
/// include the variant discriminant, which keeps hashing consistent with
/// equality across variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Prim(PrimTag),
    /// `(A, B, ...)`; the empty tuple is the unit type.
    Tuple(TypeIds),
    SizedArray {
        elem: TypeId,
        size: u64,
        simd: bool,
    },
    UnsizedArray(TypeId),
    Ptr {
        pointee: TypeId,
        mutable: bool,
        addr_space: u32,
    },
    Ref {
        pointee: TypeId,
        mutable: bool,
        addr_space: u32,
    },
    Fn {
        dom: TypeId,
        codom: TypeId,
    },
    /// Application of a nominal type to arguments. Aliases never appear here;
    /// `type_app` expands them eagerly.
    App {
        applied: TypeId,
        args: TypeIds,
    },
    Bottom,
    Top,
    /// Codomain marker for continuations (functions that never return).
    NoRet,
    /// Absorbing error type; already reported, never re-reported.
    Error,

    /// A type variable, identified by its parameter declaration.
    Var(TypeParamId),
    /// The polymorphic type of a parameterized function. The body is built
    /// exactly once per declaration, so structural equality coincides with
    /// declaration identity here.
    Forall {
        decl: FnId,
        body: TypeId,
    },
    Struct(StructId),
    Enum(EnumId),
    Trait(TraitId),
    Impl(ImplId),
    Mod(ModId),
    Alias(AliasId),
}

impl Type {
    /// Nominal types take their identity from a declaration, not their
    /// contents.
    pub fn is_nominal(&self) -> bool {
        matches!(
            self,
            Type::Var(_)
                | Type::Forall { .. }
                | Type::Struct(_)
                | Type::Enum(_)
                | Type::Trait(_)
                | Type::Impl(_)
                | Type::Mod(_)
                | Type::Alias(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(t: &Type) -> u64 {
        let mut h = DefaultHasher::new();
        t.hash(&mut h);
        h.finish()
    }

    #[test]
    fn equal_nodes_hash_equal() {
        let a = Type::Tuple(TypeIds::from_slice(&[TypeId(1), TypeId(2)]));
        let b = Type::Tuple(TypeIds::from_slice(&[TypeId(1), TypeId(2)]));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn variants_with_the_same_payload_differ() {
        // The discriminant participates in equality and hashing, so a struct
        // and an enum over the same declaration index never collide.
        let s = Type::Struct(StructId(0));
        let e = Type::Enum(EnumId(0));
        assert_ne!(s, e);
        let p = Type::Ptr { pointee: TypeId(1), mutable: false, addr_space: 0 };
        let r = Type::Ref { pointee: TypeId(1), mutable: false, addr_space: 0 };
        assert_ne!(p, r);
    }
}
