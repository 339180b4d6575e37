//! One-sided unification for impl matching.
//!
//! `from` carries the type variables, `to` is the concrete target; the `to`
//! side is never destructured to introduce bindings of its own. This is all
//! impl resolution needs, and deliberately less than first-order unification.

use aster_ast::ast::Program;
use aster_ast::ids::TypeId;

use crate::types::{ReplaceMap, Type};
use crate::universe::TypeUniverse;

/// Why a unification attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifyError {
    /// The two types cannot be made equal by any substitution.
    Mismatch { from: TypeId, to: TypeId },
    /// Binding the variable would build a type that contains it.
    Infinite { var: TypeId, ty: TypeId },
}

impl TypeUniverse {
    /// Try to extend `map` so that `from[map] == to`.
    ///
    /// On failure the map may hold bindings from already-unified siblings;
    /// callers restart from a fresh map per candidate.
    fn unify_pairwise(
        &self,
        prog: &Program,
        xs: &[TypeId],
        ys: &[TypeId],
        map: &mut ReplaceMap,
    ) -> Result<(), UnifyError> {
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            self.unify(prog, x, y, map)?;
        }
        Ok(())
    }

    pub fn unify(
        &self,
        prog: &Program,
        from: TypeId,
        to: TypeId,
        map: &mut ReplaceMap,
    ) -> Result<(), UnifyError> {
        if from == to {
            return Ok(());
        }
        match (self.get(from), self.get(to)) {
            (Type::Var(p), _) => {
                if let Some(&bound) = map.get(p) {
                    if bound == to {
                        Ok(())
                    } else {
                        Err(UnifyError::Mismatch { from, to })
                    }
                } else if self.contains(prog, to, from) {
                    Err(UnifyError::Infinite { var: from, ty: to })
                } else {
                    map.insert(*p, to);
                    Ok(())
                }
            }
            (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
                let (xs, ys) = (xs.clone(), ys.clone());
                self.unify_pairwise(prog, &xs, &ys, map)
            }
            (
                Type::App { applied: fa, args: xs },
                Type::App { applied: ta, args: ys },
            ) if fa == ta && xs.len() == ys.len() => {
                let (xs, ys) = (xs.clone(), ys.clone());
                self.unify_pairwise(prog, &xs, &ys, map)
            }
            (Type::Fn { dom: fd, codom: fc }, Type::Fn { dom: td, codom: tc }) => {
                let (fd, fc, td, tc) = (*fd, *fc, *td, *tc);
                self.unify(prog, fd, td, map)?;
                self.unify(prog, fc, tc, map)
            }
            (
                Type::SizedArray { elem: fe, size: fs, simd: fv },
                Type::SizedArray { elem: te, size: ts, simd: tv },
            ) if fs == ts && fv == tv => {
                let (fe, te) = (*fe, *te);
                self.unify(prog, fe, te, map)
            }
            (Type::UnsizedArray(fe), Type::UnsizedArray(te)) => {
                let (fe, te) = (*fe, *te);
                self.unify(prog, fe, te, map)
            }
            (
                Type::Ptr { pointee: fp, mutable: fm, addr_space: fa },
                Type::Ptr { pointee: tp, mutable: tm, addr_space: ta },
            )
            | (
                Type::Ref { pointee: fp, mutable: fm, addr_space: fa },
                Type::Ref { pointee: tp, mutable: tm, addr_space: ta },
            ) if fm == tm && fa == ta => {
                let (fp, tp) = (*fp, *tp);
                self.unify(prog, fp, tp, map)
            }
            _ => Err(UnifyError::Mismatch { from, to }),
        }
    }
}
