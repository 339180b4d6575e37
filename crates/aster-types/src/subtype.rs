//! The subtype relation and its induced join.
//!
//! Reflexivity and bottom/top aside, the relation is driven by coercions the
//! back-end can actually perform: auto-dereference of references, taking the
//! address of a value behind an immutable pointer, forgetting the length of a
//! non-SIMD sized array behind a pointer, and the usual componentwise tuple
//! and contravariant/covariant function rules. Address-taking coercions are
//! only available at value positions, never inside the pointee of a pointer
//! comparison, so no pointer is ever coerced by taking its own address.

use crate::types::Type;
use crate::universe::TypeUniverse;
use aster_ast::ids::TypeId;

impl TypeUniverse {
    /// Decide `a <: b`.
    pub fn subtype(&self, a: TypeId, b: TypeId) -> bool {
        self.subtype_with(a, b, true)
    }

    /// The relation proper. `allow_addr` permits the coercions that
    /// materialize a pointer out of a value (auto-address and sized-array
    /// decay). It is cleared when comparing pointees: memory behind an
    /// existing pointer must already have the right shape, so a pointee
    /// comparison must never manufacture a pointer. This is what keeps
    /// pointer-of-pointer coercions out: `*i32 <: **i32` would otherwise
    /// hold by taking the address of the pointee.
    fn subtype_with(&self, a: TypeId, b: TypeId, allow_addr: bool) -> bool {
        if a == b {
            return true;
        }
        match self.get(a) {
            Type::Bottom => return true,
            // Auto-dereference: a reference coerces to whatever its pointee
            // coerces to.
            Type::Ref { pointee, .. } => return self.subtype_with(*pointee, b, allow_addr),
            _ => {}
        }
        match self.get(b) {
            Type::Top => return true,
            Type::Ptr { pointee: q, mutable: mut_b, addr_space: as_b } => {
                let (q, mut_b, as_b) = (*q, *mut_b, *as_b);
                match self.get(a) {
                    Type::Ptr { pointee: p, mutable: mut_a, addr_space: as_a } => {
                        let (p, mut_a, as_a) = (*p, *mut_a, *as_a);
                        if as_a == as_b && (mut_a || !mut_b) {
                            if self.subtype_with(p, q, false) {
                                return true;
                            }
                            // &[T; N] <: &[T], except for SIMD arrays whose
                            // layout differs.
                            if let (
                                Type::SizedArray { elem: pe, simd: false, .. },
                                Type::UnsizedArray(qe),
                            ) = (self.get(p), self.get(q))
                            {
                                if pe == qe {
                                    return true;
                                }
                            }
                        }
                        return false;
                    }
                    Type::SizedArray { elem, simd: false, .. }
                        if allow_addr && as_b == 0 =>
                    {
                        // A sized array decays to a pointer to the unsized
                        // array in the generic address space.
                        if let Type::UnsizedArray(qe) = self.get(q) {
                            if qe == elem {
                                return true;
                            }
                        }
                    }
                    _ => {}
                }
                // Auto-address: a value coerces behind an immutable pointer.
                if allow_addr && !mut_b && self.subtype_with(a, q, allow_addr) {
                    return true;
                }
                return false;
            }
            _ => {}
        }
        match (self.get(a), self.get(b)) {
            (Type::Tuple(xs), Type::Tuple(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys.iter())
                        .all(|(&x, &y)| self.subtype_with(x, y, allow_addr))
            }
            // Contravariant domain, covariant codomain.
            (Type::Fn { dom: da, codom: ca }, Type::Fn { dom: db, codom: cb }) => {
                self.subtype_with(*db, *da, allow_addr)
                    && self.subtype_with(*ca, *cb, allow_addr)
            }
            _ => false,
        }
    }

    /// Least common supertype where one side already bounds the other;
    /// otherwise the top type.
    pub fn join(&self, a: TypeId, b: TypeId) -> TypeId {
        if self.subtype(a, b) {
            b
        } else if self.subtype(b, a) {
            a
        } else {
            self.top_type()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::PrimTag;
    use crate::universe::TypeUniverse;

    #[test]
    fn reference_dereferences_but_values_do_not_reference() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let r = uni.ref_type(i32t, false, 0);
        assert!(uni.subtype(r, i32t));
        assert!(!uni.subtype(i32t, r));
    }

    #[test]
    fn pointer_to_sized_array_forgets_length() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let sized = uni.sized_array_type(i32t, 4, false);
        let unsized_ = uni.unsized_array_type(i32t);
        let p_sized = uni.ptr_type(sized, false, 0);
        let p_unsized = uni.ptr_type(unsized_, false, 0);
        assert!(uni.subtype(p_sized, p_unsized));

        let simd = uni.sized_array_type(i32t, 4, true);
        let p_simd = uni.ptr_type(simd, false, 0);
        assert!(!uni.subtype(p_simd, p_unsized));
    }

    #[test]
    fn sized_array_decays_in_generic_address_space_only() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let sized = uni.sized_array_type(i32t, 4, false);
        let unsized_ = uni.unsized_array_type(i32t);
        let p0 = uni.ptr_type(unsized_, false, 0);
        let p1 = uni.ptr_type(unsized_, false, 1);
        assert!(uni.subtype(sized, p0));
        assert!(!uni.subtype(sized, p1));
    }

    #[test]
    fn mutable_pointers_do_not_weaken_to_auto_address() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let p_const = uni.ptr_type(i32t, false, 0);
        let p_mut = uni.ptr_type(i32t, true, 0);
        // Auto-address only behind an immutable pointer.
        assert!(uni.subtype(i32t, p_const));
        assert!(!uni.subtype(i32t, p_mut));
        // *mut T <: *T, not the reverse.
        assert!(uni.subtype(p_mut, p_const));
        assert!(!uni.subtype(p_const, p_mut));
        // No coercion across address spaces.
        let p_const_1 = uni.ptr_type(i32t, false, 1);
        assert!(!uni.subtype(p_mut, p_const_1));
    }

    #[test]
    fn no_pointer_of_pointer_auto_address() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let p = uni.ptr_type(i32t, false, 0);
        let pp = uni.ptr_type(p, false, 0);
        let ppp = uni.ptr_type(pp, false, 0);
        // *i32 must not coerce to **i32 by taking its own address, at any
        // nesting depth.
        assert!(!uni.subtype(p, pp));
        assert!(!uni.subtype(pp, ppp));
        // Nor may a pointee comparison take addresses deeper inside, e.g.
        // componentwise through a tuple behind the pointer.
        let tup_val = uni.tuple_type([i32t]);
        let tup_ptr = uni.tuple_type([p]);
        let a = uni.ptr_type(tup_val, false, 0);
        let b = uni.ptr_type(tup_ptr, false, 0);
        assert!(!uni.subtype(a, b));
    }

    #[test]
    fn function_variance() {
        let mut uni = TypeUniverse::new();
        let top = uni.top_type();
        let bottom = uni.bottom_type();
        let f = uni.fn_type(top, bottom);
        let g = uni.fn_type(bottom, top);
        assert!(uni.subtype(f, g));
        assert!(!uni.subtype(g, f));
    }

    #[test]
    fn tuples_are_componentwise_with_equal_arity() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let bottom = uni.bottom_type();
        let a = uni.tuple_type([i32t, bottom]);
        let b = uni.tuple_type([i32t, i32t]);
        assert!(uni.subtype(a, b));
        assert!(!uni.subtype(b, a));
        let short = uni.tuple_type([i32t]);
        assert!(!uni.subtype(short, b));
    }

    #[test]
    fn join_picks_the_bounding_side_or_top() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let bottom = uni.bottom_type();
        let a = uni.tuple_type([i32t, bottom]);
        let b = uni.tuple_type([i32t, i32t]);
        assert_eq!(uni.join(a, b), b);
        assert_eq!(uni.join(b, a), b);
        let short = uni.tuple_type([i32t]);
        assert_eq!(uni.join(short, b), uni.top_type());
        assert_eq!(uni.join(b, b), b);
    }

    #[test]
    fn subtype_is_reflexive_and_transitive_on_samples() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let u8t = uni.prim_type(PrimTag::U8);
        let bottom = uni.bottom_type();
        let top = uni.top_type();
        let r = uni.ref_type(i32t, true, 0);
        let tup = uni.tuple_type([i32t, u8t]);
        let f = uni.fn_type(tup, i32t);
        let samples = [i32t, u8t, bottom, top, r, tup, f];
        for &t in &samples {
            assert!(uni.subtype(t, t));
        }
        for &a in &samples {
            for &b in &samples {
                for &c in &samples {
                    if uni.subtype(a, b) && uni.subtype(b, c) {
                        assert!(uni.subtype(a, c), "transitivity failed");
                    }
                }
            }
        }
    }
}
