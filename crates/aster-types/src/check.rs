//! The checking pass.
//!
//! Re-walks the typed program and verifies every place an expected type is
//! known: function bodies against declared results, call arguments against
//! domains, conditions against `bool`, ascriptions and let bindings against
//! their annotations, and impl methods against their trait signatures. Trait
//! obligations of called functions are discharged through the resolver.
//!
//! The error type is absorbing: a node that already types to it neither fails
//! nor reports again, so one defect produces one diagnostic.

use aster_ast::ast::{DefRef, Expr, ExprKind, Program};
use aster_ast::ids::{FnId, ImplId, TypeId};
use aster_ast::span::Span;

use crate::diagnostic::Reporter;
use crate::display::pp_type;
use crate::error::TypeError;
use crate::infer::instantiation_map;
use crate::resolver::ImplResolver;
use crate::types::{ReplaceMap, Type};
use crate::unify::UnifyError;
use crate::universe::TypeUniverse;

pub struct TypeChecker<'a> {
    uni: &'a mut TypeUniverse,
    prog: &'a Program,
    resolver: &'a ImplResolver,
    reporter: &'a mut dyn Reporter,
    errors: usize,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        uni: &'a mut TypeUniverse,
        prog: &'a Program,
        resolver: &'a ImplResolver,
        reporter: &'a mut dyn Reporter,
    ) -> Self {
        Self { uni, prog, resolver, reporter, errors: 0 }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Check the whole program; the return value is the error count.
    pub fn check(&mut self) -> usize {
        let prog = self.prog;
        for i in 0..prog.fns.len() {
            self.check_fn(FnId(i as u32));
        }
        for i in 0..prog.impls.len() {
            self.check_impl(ImplId(i as u32));
        }
        self.errors
    }

    fn report(&mut self, err: TypeError) {
        self.errors += 1;
        self.reporter.error(err.span(), &err.to_string());
    }

    fn pp(&self, t: TypeId) -> String {
        pp_type(self.uni, self.prog, t)
    }

    /// Verify `found <: expected`, reporting a mismatch (or, for tuples of
    /// different lengths, an arity mismatch) named after the syntactic
    /// construct. Errors absorb silently.
    fn expect(&mut self, what: &str, span: Span, found: TypeId, expected: TypeId) -> TypeId {
        let error = self.uni.type_error();
        if found == error || expected == error {
            return error;
        }
        if self.uni.subtype(found, expected) {
            return found;
        }
        if let (Type::Tuple(xs), Type::Tuple(ys)) = (self.uni.get(found), self.uni.get(expected)) {
            if xs.len() != ys.len() {
                let err =
                    TypeError::ArityMismatch { expected: ys.len(), found: xs.len(), span };
                self.report(err);
                return error;
            }
        }
        let err = TypeError::Mismatch {
            context: what.to_string(),
            expected: self.pp(expected),
            found: self.pp(found),
            span,
        };
        self.report(err);
        error
    }

    fn check_fn(&mut self, id: FnId) {
        let prog = self.prog;
        let decl = prog.fn_decl(id);
        let Some(body) = &decl.body else {
            return;
        };
        self.check_expr(id, body);
        if let Some(want) = decl.ret.as_ref().and_then(|r| r.ty.get()) {
            if let Some(found) = body.ty.get() {
                self.expect("function body", body.span, found, want);
            }
        }
    }

    fn check_expr(&mut self, fid: FnId, e: &Expr) {
        match &e.kind {
            ExprKind::Lit(_) | ExprKind::Var(_) | ExprKind::Error => {}
            ExprKind::Tuple(elems) => {
                for el in elems {
                    self.check_expr(fid, el);
                }
            }
            ExprKind::Array { elems, .. } => {
                for el in elems {
                    self.check_expr(fid, el);
                }
            }
            ExprKind::Block(exprs) => {
                for ex in exprs {
                    self.check_expr(fid, ex);
                }
            }
            ExprKind::Call { callee, arg } => {
                self.check_expr(fid, callee);
                self.check_expr(fid, arg);
                self.check_call(fid, e, callee, arg);
            }
            ExprKind::Field { base, .. } => self.check_expr(fid, base),
            ExprKind::If { cond, then_expr, else_expr } => {
                self.check_expr(fid, cond);
                self.check_expr(fid, then_expr);
                self.check_expr(fid, else_expr);
                if let Some(found) = cond.ty.get() {
                    let want = self.uni.bool_type();
                    self.expect("condition", cond.span, found, want);
                }
            }
            ExprKind::Let { ptrn, init } => {
                self.check_expr(fid, init);
                if let (Some(found), Some(want)) = (init.ty.get(), ptrn.ty.get()) {
                    self.expect("let binding", init.span, found, want);
                }
            }
            ExprKind::Lambda { body, .. } => self.check_expr(fid, body),
            ExprKind::Annot { expr, ty } => {
                self.check_expr(fid, expr);
                if let (Some(found), Some(want)) = (expr.ty.get(), ty.ty.get()) {
                    self.expect("type ascription", expr.span, found, want);
                }
            }
        }
    }

    fn check_call(&mut self, fid: FnId, call: &Expr, callee: &Expr, arg: &Expr) {
        let prog = self.prog;
        let (Some(callee_ty), Some(arg_ty)) = (callee.ty.get(), arg.ty.get()) else {
            return;
        };
        let direct_callee = match callee.kind {
            ExprKind::Var(DefRef::Fn(f)) => Some(f),
            _ => None,
        };
        match self.uni.get(callee_ty).clone() {
            Type::Fn { dom, .. } => {
                self.expect("call argument", arg.span, arg_ty, dom);
                if let Some(cf) = direct_callee {
                    self.discharge_obligations(fid, cf, None, call.span);
                }
            }
            Type::Forall { decl, body } => {
                // Re-derive the substitution the inference pass used; its
                // failures were already reported there.
                let Ok(map) = instantiation_map(self.uni, prog, decl, body, arg_ty) else {
                    return;
                };
                let mono = self.uni.replace(body, &map);
                if let Type::Fn { dom, .. } = *self.uni.get(mono) {
                    self.expect("call argument", arg.span, arg_ty, dom);
                }
                self.discharge_obligations(fid, decl, Some(&map), call.span);
            }
            Type::Error => {}
            _ => {
                let err = TypeError::InvalidType {
                    reason: format!(
                        "called value of type {} is not a function",
                        self.pp(callee_ty)
                    ),
                    span: callee.span,
                };
                self.report(err);
            }
        }
    }

    /// Discharge the callee's `where` clauses and parameter bounds at this
    /// use site, substituted through the call's instantiation.
    fn discharge_obligations(
        &mut self,
        use_site: FnId,
        callee: FnId,
        map: Option<&ReplaceMap>,
        span: Span,
    ) {
        let prog = self.prog;
        let resolver = self.resolver;
        let decl = prog.fn_decl(callee);
        let clause_types = decl
            .where_clauses
            .iter()
            .filter_map(|c| c.ty.ty.get())
            .chain(
                decl.type_params
                    .iter()
                    .flat_map(|&p| prog.type_param(p).bounds.iter())
                    .filter_map(|b| b.ty.get()),
            )
            .collect::<Vec<_>>();
        for clause_ty in clause_types {
            let obligation = match map {
                Some(m) => self.uni.replace(clause_ty, m),
                None => clause_ty,
            };
            if obligation == self.uni.type_error() {
                continue;
            }
            if resolver.find_impl(prog, self.uni, use_site, obligation).is_none() {
                let err =
                    TypeError::UnsatisfiedBound { clause: self.pp(obligation), span };
                self.report(err);
            }
        }
    }

    /// Verify an impl against its trait: every trait method without a default
    /// body must be provided, and provided methods must unify with the trait
    /// signature instantiated at the impl's trait arguments.
    fn check_impl(&mut self, id: ImplId) {
        let prog = self.prog;
        let decl = prog.impl_decl(id);
        let Some(impled) = decl.trait_ty.ty.get() else {
            return;
        };
        let (trait_id, trait_args) = match self.uni.get(impled).clone() {
            Type::Trait(t) => (t, Vec::new()),
            Type::App { applied, args } => match *self.uni.get(applied) {
                Type::Trait(t) => (t, args.to_vec()),
                _ => return,
            },
            _ => return,
        };
        let tdecl = prog.trait_decl(trait_id);
        let tmap: ReplaceMap = tdecl
            .type_params
            .iter()
            .copied()
            .zip(trait_args.iter().copied())
            .collect();

        for &method in &tdecl.decls {
            let mdecl = prog.fn_decl(method);
            let provided = decl
                .decls
                .iter()
                .copied()
                .find(|&f| prog.fn_decl(f).name == mdecl.name);
            let Some(provided) = provided else {
                if mdecl.body.is_none() {
                    let err = TypeError::UnknownMember {
                        owner: self.pp(impled),
                        name: mdecl.name.clone(),
                        span: decl.span,
                    };
                    self.report(err);
                }
                continue;
            };
            let (Some(want), Some(got)) =
                (mdecl.ty.get(), prog.fn_decl(provided).ty.get())
            else {
                continue;
            };
            let want = self.peel_forall(want);
            let got = self.peel_forall(got);
            let want = self.uni.replace(want, &tmap);
            let mut map = ReplaceMap::default();
            match self.uni.unify(prog, want, got, &mut map) {
                Ok(()) => {}
                Err(UnifyError::Infinite { var, ty }) => {
                    let err = TypeError::InfiniteType {
                        var: self.pp(var),
                        ty: self.pp(ty),
                        span: prog.fn_decl(provided).span,
                    };
                    self.report(err);
                }
                Err(UnifyError::Mismatch { .. }) => {
                    let err = TypeError::Mismatch {
                        context: format!("method `{}`", mdecl.name),
                        expected: self.pp(want),
                        found: self.pp(got),
                        span: prog.fn_decl(provided).span,
                    };
                    self.report(err);
                }
            }
        }
    }

    fn peel_forall(&self, t: TypeId) -> TypeId {
        match *self.uni.get(t) {
            Type::Forall { body, .. } => body,
            _ => t,
        }
    }
}
