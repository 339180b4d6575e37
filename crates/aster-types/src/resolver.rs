//! Trait obligation resolution against `where` clauses and registered impls.
//!
//! Candidates are registered per `(module, trait)` pair and searched in
//! registration order, modules innermost-first from the use site. An
//! obligation is discharged either by an assumption (a syntactically equal
//! `where` clause on an enclosing function or impl) or by a registered impl
//! whose head unifies with the target and whose own clauses resolve
//! recursively. In-flight obligations are tracked so self-referential clause
//! cycles terminate instead of recursing forever.

use rustc_hash::{FxHashMap, FxHashSet};

use aster_ast::ast::Program;
use aster_ast::ids::{FnId, ImplId, ModId, TraitId, TypeId};

use crate::types::{ReplaceMap, Type};
use crate::universe::TypeUniverse;

#[derive(Debug, Default)]
pub struct ImplResolver {
    candidates: FxHashMap<(ModId, TraitId), Vec<ImplId>>,
}

impl ImplResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The trait a target type obligates, if any: either a bare trait type or
    /// a trait application.
    fn trait_of(uni: &TypeUniverse, target: TypeId) -> Option<TraitId> {
        match *uni.get(target) {
            Type::Trait(t) => Some(t),
            Type::App { applied, .. } => match *uni.get(applied) {
                Type::Trait(t) => Some(t),
                _ => None,
            },
            _ => None,
        }
    }

    /// Register an impl under its enclosing module and implemented trait.
    /// Returns `false` when the impl's trait type is unresolved or not a
    /// trait; the caller reports.
    pub fn register_impl(&mut self, prog: &Program, uni: &TypeUniverse, impl_id: ImplId) -> bool {
        let decl = prog.impl_decl(impl_id);
        let Some(impled) = decl.trait_ty.ty.get() else {
            return false;
        };
        let Some(trait_id) = Self::trait_of(uni, impled) else {
            return false;
        };
        self.candidates
            .entry((decl.parent, trait_id))
            .or_default()
            .push(impl_id);
        true
    }

    /// Candidates registered for a `(module, trait)` pair, in registration
    /// order.
    pub fn candidates(&self, module: ModId, trait_id: TraitId) -> &[ImplId] {
        self.candidates
            .get(&(module, trait_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find a witness for `target` visible from `use_site`.
    ///
    /// Returns the assumption type itself when an enclosing `where` clause
    /// matches, or the chosen impl type (wrapped in an application carrying
    /// the unified arguments when the impl is parameterized). `None` means
    /// the obligation is unsatisfied.
    pub fn find_impl(
        &self,
        prog: &Program,
        uni: &mut TypeUniverse,
        use_site: FnId,
        target: TypeId,
    ) -> Option<TypeId> {
        let mut in_flight = FxHashSet::default();
        self.find_impl_rec(prog, uni, use_site, target, &mut in_flight)
    }

    fn find_impl_rec(
        &self,
        prog: &Program,
        uni: &mut TypeUniverse,
        use_site: FnId,
        target: TypeId,
        in_flight: &mut FxHashSet<TypeId>,
    ) -> Option<TypeId> {
        let trait_id = Self::trait_of(uni, target)?;
        if !in_flight.insert(target) {
            // Already resolving this very obligation further up the stack.
            return None;
        }
        let found = self.find_impl_inner(prog, uni, use_site, target, trait_id, in_flight);
        in_flight.remove(&target);
        found
    }

    fn find_impl_inner(
        &self,
        prog: &Program,
        uni: &mut TypeUniverse,
        use_site: FnId,
        target: TypeId,
        trait_id: TraitId,
        in_flight: &mut FxHashSet<TypeId>,
    ) -> Option<TypeId> {
        // Assumptions from enclosing functions (and the enclosing impl, whose
        // clauses hold inside its methods) discharge the obligation directly.
        let (fns, encl_impl) = prog.enclosing_fns(use_site);
        for fid in &fns {
            for clause in &prog.fn_decl(*fid).where_clauses {
                if clause.ty.ty.get() == Some(target) {
                    return Some(target);
                }
            }
        }
        if let Some(impl_id) = encl_impl {
            for clause in &prog.impl_decl(impl_id).where_clauses {
                if clause.ty.ty.get() == Some(target) {
                    return Some(target);
                }
            }
        }

        // Registered impls, modules innermost-first, candidates in
        // registration order.
        for module in prog.mod_chain(prog.fn_mod(use_site)) {
            let Some(candidates) = self.candidates.get(&(module, trait_id)) else {
                continue;
            };
            'candidate: for &impl_id in candidates {
                let decl = prog.impl_decl(impl_id);
                let Some(impled) = decl.trait_ty.ty.get() else {
                    continue;
                };
                let mut map = ReplaceMap::default();
                if uni.unify(prog, impled, target, &mut map).is_err() {
                    continue;
                }
                for clause in &decl.where_clauses {
                    let Some(clause_ty) = clause.ty.ty.get() else {
                        continue 'candidate;
                    };
                    let obligation = uni.replace(clause_ty, &map);
                    if self
                        .find_impl_rec(prog, uni, use_site, obligation, in_flight)
                        .is_none()
                    {
                        continue 'candidate;
                    }
                }
                let impl_ty = uni.impl_type(impl_id);
                if decl.type_params.is_empty() {
                    return Some(impl_ty);
                }
                let args: Vec<TypeId> = decl
                    .type_params
                    .iter()
                    .map(|p| map.get(p).copied().unwrap_or_else(|| uni.type_error()))
                    .collect();
                return Some(uni.type_app(prog, impl_ty, &args));
            }
        }
        None
    }
}
