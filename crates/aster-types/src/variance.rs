//! Variance analysis and bounds inference for type variables.
//!
//! Both walks carry a direction flag (`true` = covariant position). Function
//! domains flip it; every other structural position passes it through. The
//! bounds walk destructures a parameterized type against a concrete target
//! and accumulates an interval per variable, intersecting intervals with
//! [`TypeBounds::meet`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use aster_ast::ids::{TypeId, TypeParamId};

use crate::types::Type;
use crate::universe::TypeUniverse;

/// How a position propagates subtyping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeVariance {
    Covariant,
    Contravariant,
    Invariant,
}

/// An interval `[lower, upper]` for a type variable.
///
/// `meet` intersects two intervals; an unsatisfiable lower collapses to the
/// top type and an unsatisfiable upper to the bottom type, so a later
/// `lower <: upper` check can reject the instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeBounds {
    pub lower: TypeId,
    pub upper: TypeId,
}

impl TypeBounds {
    pub fn new(lower: TypeId, upper: TypeId) -> Self {
        Self { lower, upper }
    }

    /// The tightest bounds consistent with both intervals.
    pub fn meet(&self, other: &TypeBounds, uni: &TypeUniverse) -> TypeBounds {
        let lower = if uni.subtype(self.lower, other.lower) {
            other.lower
        } else if uni.subtype(other.lower, self.lower) {
            self.lower
        } else {
            uni.top_type()
        };
        let upper = if uni.subtype(self.upper, other.upper) {
            self.upper
        } else if uni.subtype(other.upper, self.upper) {
            other.upper
        } else {
            uni.bottom_type()
        };
        TypeBounds { lower, upper }
    }

    /// A satisfiable interval admits at least one instantiation.
    pub fn is_satisfiable(&self, uni: &TypeUniverse) -> bool {
        uni.subtype(self.lower, self.upper)
    }
}

pub type VarianceMap = FxHashMap<TypeParamId, TypeVariance>;
pub type BoundsMap = FxHashMap<TypeParamId, TypeBounds>;

impl TypeUniverse {
    /// Record the variance of every type variable occurring in `t`.
    ///
    /// A variable seen only in one direction gets that direction (variables
    /// never seen default to covariant, the direction the analysis entered
    /// with); a variable seen in both directions becomes invariant.
    pub fn variance(&self, t: TypeId, vars: &mut VarianceMap, dir: bool) {
        match self.get(t) {
            Type::Var(p) => {
                let seen = if dir {
                    TypeVariance::Covariant
                } else {
                    TypeVariance::Contravariant
                };
                vars.entry(*p)
                    .and_modify(|v| {
                        if *v != seen {
                            *v = TypeVariance::Invariant;
                        }
                    })
                    .or_insert(seen);
            }
            Type::Tuple(elems) => {
                for &e in elems {
                    self.variance(e, vars, dir);
                }
            }
            Type::SizedArray { elem, .. } | Type::UnsizedArray(elem) => {
                self.variance(*elem, vars, dir)
            }
            Type::Ptr { pointee, .. } | Type::Ref { pointee, .. } => {
                self.variance(*pointee, vars, dir)
            }
            Type::Fn { dom, codom } => {
                self.variance(*dom, vars, !dir);
                self.variance(*codom, vars, dir);
            }
            Type::App { args, .. } => {
                for &a in args {
                    self.variance(a, vars, dir);
                }
            }
            Type::Forall { body, .. } => self.variance(*body, vars, dir),
            _ => {}
        }
    }

    /// Accumulate bounds for the variables of `t` against the concrete
    /// `target`. Matching variants destructure pairwise; at a variable leaf
    /// the target becomes a lower bound in covariant position and an upper
    /// bound in contravariant position. Mismatched structure contributes
    /// nothing; the caller decides satisfiability.
    pub fn bounds(&self, t: TypeId, target: TypeId, map: &mut BoundsMap, dir: bool) {
        if let Type::Var(p) = self.get(t) {
            let contribution = if dir {
                TypeBounds::new(target, self.top_type())
            } else {
                TypeBounds::new(self.bottom_type(), target)
            };
            let merged = match map.get(p) {
                Some(existing) => existing.meet(&contribution, self),
                None => contribution,
            };
            map.insert(*p, merged);
            return;
        }
        match (self.get(t), self.get(target)) {
            (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
                for (&x, &y) in xs.clone().iter().zip(ys.clone().iter()) {
                    self.bounds(x, y, map, dir);
                }
            }
            (
                Type::SizedArray { elem: xe, .. },
                Type::SizedArray { elem: ye, .. },
            ) => {
                let (xe, ye) = (*xe, *ye);
                self.bounds(xe, ye, map, dir);
            }
            (Type::UnsizedArray(xe), Type::UnsizedArray(ye)) => {
                let (xe, ye) = (*xe, *ye);
                self.bounds(xe, ye, map, dir);
            }
            (
                Type::Ptr { pointee: xp, .. },
                Type::Ptr { pointee: yp, .. },
            )
            | (
                Type::Ref { pointee: xp, .. },
                Type::Ref { pointee: yp, .. },
            ) => {
                let (xp, yp) = (*xp, *yp);
                self.bounds(xp, yp, map, dir);
            }
            (Type::Fn { dom: xd, codom: xc }, Type::Fn { dom: yd, codom: yc }) => {
                let (xd, xc, yd, yc) = (*xd, *xc, *yd, *yc);
                self.bounds(xd, yd, map, !dir);
                self.bounds(xc, yc, map, dir);
            }
            (
                Type::App { applied: xa, args: xs },
                Type::App { applied: ya, args: ys },
            ) if xa == ya && xs.len() == ys.len() => {
                for (&x, &y) in xs.clone().iter().zip(ys.clone().iter()) {
                    self.bounds(x, y, map, dir);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimTag;
    use aster_ast::ast::Program;

    #[test]
    fn function_domains_are_contravariant() {
        let mut uni = TypeUniverse::new();
        let mut prog = Program::new();
        let x = prog.push_type_param("X");
        let y = prog.push_type_param("Y");
        let vx = uni.type_var(x);
        let vy = uni.type_var(y);
        let f = uni.fn_type(vx, vy);

        let mut vars = VarianceMap::default();
        uni.variance(f, &mut vars, true);
        assert_eq!(vars.get(&x), Some(&TypeVariance::Contravariant));
        assert_eq!(vars.get(&y), Some(&TypeVariance::Covariant));
    }

    #[test]
    fn two_flips_restore_covariance() {
        let mut uni = TypeUniverse::new();
        let mut prog = Program::new();
        let x = prog.push_type_param("X");
        let vx = uni.type_var(x);
        let i32t = uni.prim_type(PrimTag::I32);
        // fn (fn (X) -> i32) -> i32: X sits under two domain flips.
        let inner = uni.fn_type(vx, i32t);
        let outer = uni.fn_type(inner, i32t);
        let mut vars = VarianceMap::default();
        uni.variance(outer, &mut vars, true);
        assert_eq!(vars.get(&x), Some(&TypeVariance::Covariant));
    }

    #[test]
    fn both_directions_make_a_variable_invariant() {
        let mut uni = TypeUniverse::new();
        let mut prog = Program::new();
        let x = prog.push_type_param("X");
        let vx = uni.type_var(x);
        let f = uni.fn_type(vx, vx);
        let mut vars = VarianceMap::default();
        uni.variance(f, &mut vars, true);
        assert_eq!(vars.get(&x), Some(&TypeVariance::Invariant));
    }

    #[test]
    fn bounds_collect_lower_and_upper() {
        let mut uni = TypeUniverse::new();
        let mut prog = Program::new();
        let x = prog.push_type_param("X");
        let vx = uni.type_var(x);
        let i32t = uni.prim_type(PrimTag::I32);

        // Covariant leaf: target is a lower bound.
        let mut map = BoundsMap::default();
        uni.bounds(vx, i32t, &mut map, true);
        let b = map[&x];
        assert_eq!(b.lower, i32t);
        assert_eq!(b.upper, uni.top_type());

        // Contravariant leaf through a function domain.
        let f = uni.fn_type(vx, i32t);
        let g = uni.fn_type(i32t, i32t);
        let mut map = BoundsMap::default();
        uni.bounds(f, g, &mut map, true);
        let b = map[&x];
        assert_eq!(b.lower, uni.bottom_type());
        assert_eq!(b.upper, i32t);
    }

    #[test]
    fn meet_tightens_and_collapses() {
        let mut uni = TypeUniverse::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let u8t = uni.prim_type(PrimTag::U8);
        let bottom = uni.bottom_type();
        let top = uni.top_type();

        let a = TypeBounds::new(bottom, i32t);
        let b = TypeBounds::new(i32t, top);
        let m = a.meet(&b, &uni);
        assert_eq!(m.lower, i32t);
        assert_eq!(m.upper, i32t);
        assert!(m.is_satisfiable(&uni));

        // Incomparable lowers collapse to top, making the interval empty.
        let c = TypeBounds::new(i32t, top);
        let d = TypeBounds::new(u8t, top);
        let m = c.meet(&d, &uni);
        assert_eq!(m.lower, top);
        assert!(m.is_satisfiable(&uni)); // top <: top still holds
        let m2 = TypeBounds::new(m.lower, i32t);
        assert!(!m2.is_satisfiable(&uni));

        // Incomparable uppers collapse to bottom.
        let e = TypeBounds::new(bottom, i32t);
        let f = TypeBounds::new(bottom, u8t);
        let m = e.meet(&f, &uni);
        assert_eq!(m.upper, bottom);
    }
}
