//! The inference pass.
//!
//! Walks declarations, lowers type expressions into the universe, builds
//! function signatures (polymorphic ones become `Forall` types), and infers a
//! type for every expression and pattern, threading an `expected` type down.
//! Structural errors (bad arities, unknown members, uninferable parameters)
//! are reported here; relational checks are the checking pass's job.
//!
//! Type variables solved at call sites land in an equations map keyed by the
//! variable's interned identity; `find` chases it. A rank counter is bumped
//! around `let` initializers so equations remember how deep they were solved.

use rustc_hash::{FxHashMap, FxHashSet};

use aster_ast::ast::{
    DefRef, Expr, ExprKind, Literal, NamedRef, Program, Ptrn, PtrnKind, TypeExpr, TypeExprKind,
};
use aster_ast::ids::{AliasId, EnumId, FnId, ImplId, StructId, TypeId, TypeParamId};
use aster_ast::span::Span;

use crate::diagnostic::Reporter;
use crate::display::pp_type;
use crate::error::TypeError;
use crate::types::{PrimTag, ReplaceMap, Type};
use crate::universe::TypeUniverse;
use crate::variance::{BoundsMap, TypeBounds, TypeVariance, VarianceMap};

/// A solved type variable: where it was solved, to what, and at which rank.
#[derive(Debug, Clone, Copy)]
pub struct Equation {
    pub span: Span,
    pub ty: TypeId,
    pub rank: i32,
}

pub struct TypeInference<'a> {
    uni: &'a mut TypeUniverse,
    prog: &'a Program,
    reporter: &'a mut dyn Reporter,
    eqs: FxHashMap<TypeId, Equation>,
    rank: i32,
    errors: usize,
    aliases_in_progress: FxHashSet<AliasId>,
}

impl<'a> TypeInference<'a> {
    pub fn new(
        uni: &'a mut TypeUniverse,
        prog: &'a Program,
        reporter: &'a mut dyn Reporter,
    ) -> Self {
        Self {
            uni,
            prog,
            reporter,
            eqs: FxHashMap::default(),
            rank: 0,
            errors: 0,
            aliases_in_progress: FxHashSet::default(),
        }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn inc_rank(&mut self) {
        self.rank += 1;
    }

    pub fn dec_rank(&mut self) {
        self.rank -= 1;
    }

    /// Chase the equations map through solved variables.
    pub fn find(&self, t: TypeId) -> TypeId {
        let mut cur = t;
        while let Some(eq) = self.eqs.get(&cur) {
            if eq.ty == cur {
                break;
            }
            cur = eq.ty;
        }
        cur
    }

    pub fn equation(&self, var: TypeId) -> Option<&Equation> {
        self.eqs.get(&var)
    }

    fn report(&mut self, err: TypeError) {
        self.errors += 1;
        self.reporter.error(err.span(), &err.to_string());
    }

    fn pp(&self, t: TypeId) -> String {
        pp_type(self.uni, self.prog, t)
    }

    // ---------- program walk ----------

    pub fn infer_program(&mut self) {
        let prog = self.prog;
        for i in 0..prog.aliases.len() {
            self.resolve_alias(AliasId(i as u32));
        }
        for i in 0..prog.structs.len() {
            self.struct_signature(StructId(i as u32));
        }
        for i in 0..prog.enums.len() {
            self.enum_signature(EnumId(i as u32));
        }
        for i in 0..prog.impls.len() {
            self.impl_signature(ImplId(i as u32));
        }
        for i in 0..prog.fns.len() {
            self.fn_signature(FnId(i as u32));
        }
        for i in 0..prog.fns.len() {
            self.infer_fn_body(FnId(i as u32));
        }
    }

    fn struct_signature(&mut self, id: StructId) {
        let prog = self.prog;
        let decl = prog.struct_decl(id);
        for clause in &decl.where_clauses {
            self.lower_type_expr(&clause.ty);
        }
        for field in &decl.fields {
            self.lower_type_expr(&field.ty_expr);
        }
    }

    fn enum_signature(&mut self, id: EnumId) {
        let prog = self.prog;
        for option in &prog.enum_decl(id).options {
            if let Some(payload) = &option.payload {
                self.lower_type_expr(payload);
            }
        }
    }

    fn impl_signature(&mut self, id: ImplId) {
        let prog = self.prog;
        let decl = prog.impl_decl(id);
        self.lower_type_expr(&decl.trait_ty);
        for clause in &decl.where_clauses {
            self.lower_type_expr(&clause.ty);
        }
    }

    fn fn_signature(&mut self, id: FnId) {
        let prog = self.prog;
        let decl = prog.fn_decl(id);
        for clause in &decl.where_clauses {
            self.lower_type_expr(&clause.ty);
        }
        for &p in &decl.type_params {
            for bound in &prog.type_param(p).bounds {
                self.lower_type_expr(bound);
            }
        }
        let dom = decl.param.as_ref().map(|p| self.ptrn_type(p));
        let codom = decl.ret.as_ref().map(|r| self.lower_type_expr(r));
        match (dom, codom) {
            (Some(dom), Some(codom)) => {
                let fn_ty = self.uni.fn_type(dom, codom);
                let ty = self.generalize(id, fn_ty);
                decl.ty.set(ty);
            }
            (None, Some(codom)) => decl.ty.set(codom),
            // Unannotated results are filled in once the body is inferred.
            _ => {}
        }
    }

    /// Wrap a parameterized function's type in its `Forall`.
    fn generalize(&mut self, id: FnId, fn_ty: TypeId) -> TypeId {
        if self.prog.fn_decl(id).type_params.is_empty() {
            fn_ty
        } else {
            self.uni.forall_type(id, fn_ty)
        }
    }

    fn infer_fn_body(&mut self, id: FnId) {
        let prog = self.prog;
        let decl = prog.fn_decl(id);
        if let Some(param) = &decl.param {
            let dom = param.ty.get().unwrap_or_else(|| self.uni.type_error());
            self.bind_ptrn(param, dom);
        }
        let Some(body) = &decl.body else {
            return;
        };
        let expected = decl.ret.as_ref().and_then(|r| r.ty.get());
        let body_ty = self.infer_expr(body, expected);
        if decl.ty.get().is_none() {
            let ty = match decl.param.as_ref().and_then(|p| p.ty.get()) {
                Some(dom) => self.uni.fn_type(dom, body_ty),
                None => body_ty,
            };
            let ty = self.generalize(id, ty);
            decl.ty.set(ty);
        }
    }

    // ---------- type expression lowering ----------

    /// Resolve an alias body, detecting alias cycles.
    fn resolve_alias(&mut self, id: AliasId) -> TypeId {
        let prog = self.prog;
        let decl = prog.alias_decl(id);
        if let Some(t) = decl.body.ty.get() {
            return t;
        }
        if !self.aliases_in_progress.insert(id) {
            self.report(TypeError::InvalidType {
                reason: format!("type alias `{}` refers to itself", decl.name),
                span: decl.span,
            });
            let err = self.uni.type_error();
            decl.body.ty.set(err);
            return err;
        }
        let t = self.lower_type_expr(&decl.body);
        self.aliases_in_progress.remove(&id);
        t
    }

    /// Lower a type expression into the universe and fill its slot.
    pub fn lower_type_expr(&mut self, te: &TypeExpr) -> TypeId {
        if let Some(t) = te.ty.get() {
            return t;
        }
        let t = match &te.kind {
            TypeExprKind::Prim(tag) => self.uni.prim_type(*tag),
            TypeExprKind::Tuple(elems) => {
                let ids: Vec<TypeId> = elems.iter().map(|e| self.lower_type_expr(e)).collect();
                self.uni.tuple_type(ids)
            }
            TypeExprKind::SizedArray { elem, size, simd } => {
                let elem = self.lower_type_expr(elem);
                self.uni.sized_array_type(elem, *size, *simd)
            }
            TypeExprKind::UnsizedArray(elem) => {
                let elem = self.lower_type_expr(elem);
                self.uni.unsized_array_type(elem)
            }
            TypeExprKind::Ptr { pointee, mutable, addr_space } => {
                let pointee = self.lower_type_expr(pointee);
                self.uni.ptr_type(pointee, *mutable, *addr_space)
            }
            TypeExprKind::Ref { pointee, mutable, addr_space } => {
                let pointee = self.lower_type_expr(pointee);
                self.uni.ref_type(pointee, *mutable, *addr_space)
            }
            TypeExprKind::Fn { dom, codom } => {
                let dom = self.lower_type_expr(dom);
                let codom = self.lower_type_expr(codom);
                self.uni.fn_type(dom, codom)
            }
            TypeExprKind::Cn(dom) => {
                let dom = self.lower_type_expr(dom);
                self.uni.cn_type(dom)
            }
            TypeExprKind::Named { target, args } => self.lower_named(*target, args, te.span),
            TypeExprKind::Error => self.uni.type_error(),
        };
        te.ty.set(t);
        t
    }

    fn lower_named(&mut self, target: NamedRef, args: &[TypeExpr], span: Span) -> TypeId {
        let prog = self.prog;
        let arg_ids: Vec<TypeId> = args.iter().map(|a| self.lower_type_expr(a)).collect();
        let (base, params) = match target {
            NamedRef::Param(p) => {
                if !arg_ids.is_empty() {
                    self.report(TypeError::ArityMismatch {
                        expected: 0,
                        found: arg_ids.len(),
                        span,
                    });
                    return self.uni.type_error();
                }
                return self.uni.type_var(p);
            }
            NamedRef::Struct(s) => {
                (self.uni.struct_type(s), prog.struct_decl(s).type_params.as_slice())
            }
            NamedRef::Enum(e) => (self.uni.enum_type(e), prog.enum_decl(e).type_params.as_slice()),
            NamedRef::Trait(t) => {
                (self.uni.trait_type(t), prog.trait_decl(t).type_params.as_slice())
            }
            NamedRef::Alias(a) => {
                self.resolve_alias(a);
                // Aliases expand on the spot, so the arity must be exact.
                let params = prog.alias_decl(a).type_params.as_slice();
                if arg_ids.len() != params.len() {
                    self.report(TypeError::ArityMismatch {
                        expected: params.len(),
                        found: arg_ids.len(),
                        span,
                    });
                    return self.uni.type_error();
                }
                let alias_ty = self.uni.type_alias(a);
                return self.uni.type_app(prog, alias_ty, &arg_ids);
            }
        };
        // A bare nominal reference (no arguments) is allowed, e.g. inside its
        // own declaration.
        if !arg_ids.is_empty() && arg_ids.len() != params.len() {
            self.report(TypeError::ArityMismatch {
                expected: params.len(),
                found: arg_ids.len(),
                span,
            });
            return self.uni.type_error();
        }
        self.uni.type_app(prog, base, &arg_ids)
    }

    // ---------- patterns ----------

    /// The declared type of a pattern, from its annotations; `None` when any
    /// component is unannotated.
    fn ptrn_annot_type(&mut self, ptrn: &Ptrn) -> Option<TypeId> {
        match &ptrn.kind {
            PtrnKind::Annot { ty, .. } => Some(self.lower_type_expr(ty)),
            PtrnKind::Tuple(elems) => {
                let mut ids = Vec::with_capacity(elems.len());
                for e in elems {
                    ids.push(self.ptrn_annot_type(e)?);
                }
                Some(self.uni.tuple_type(ids))
            }
            _ => None,
        }
    }

    /// A function parameter's type; parameters must be annotated.
    fn ptrn_type(&mut self, ptrn: &Ptrn) -> TypeId {
        let t = match self.ptrn_annot_type(ptrn) {
            Some(t) => t,
            None => {
                self.report(TypeError::InvalidType {
                    reason: "function parameters need a type annotation".to_string(),
                    span: ptrn.span,
                });
                self.uni.type_error()
            }
        };
        ptrn.ty.set(t);
        t
    }

    /// Push a scrutinee type down through a pattern, filling pattern and
    /// local slots.
    fn bind_ptrn(&mut self, ptrn: &Ptrn, ty: TypeId) {
        let prog = self.prog;
        match &ptrn.kind {
            PtrnKind::Bind(l) => {
                prog.local(*l).ty.set(ty);
                ptrn.ty.set(ty);
            }
            PtrnKind::Wildcard => ptrn.ty.set(ty),
            PtrnKind::Lit(l) => {
                let lit_ty = self.lit_type(l, Some(ty));
                ptrn.ty.set(lit_ty);
            }
            PtrnKind::Tuple(elems) => {
                match self.uni.get(ty).clone() {
                    Type::Tuple(parts) if parts.len() == elems.len() => {
                        for (e, &p) in elems.iter().zip(parts.iter()) {
                            self.bind_ptrn(e, p);
                        }
                        ptrn.ty.set(ty);
                    }
                    Type::Error => {
                        let err = self.uni.type_error();
                        for e in elems {
                            self.bind_ptrn(e, err);
                        }
                        ptrn.ty.set(err);
                    }
                    Type::Tuple(parts) => {
                        self.report(TypeError::ArityMismatch {
                            expected: elems.len(),
                            found: parts.len(),
                            span: ptrn.span,
                        });
                        let err = self.uni.type_error();
                        for e in elems {
                            self.bind_ptrn(e, err);
                        }
                        ptrn.ty.set(err);
                    }
                    _ => {
                        // Shape mismatch; the checking pass reports it when
                        // it compares the pattern against the scrutinee.
                        let err = self.uni.type_error();
                        for e in elems {
                            self.bind_ptrn(e, err);
                        }
                        ptrn.ty.set(ty);
                    }
                }
            }
            PtrnKind::Annot { ptrn: inner, ty: te } => {
                // The annotation wins for everything bound underneath; the
                // checker verifies the scrutinee against it.
                let want = self.lower_type_expr(te);
                self.bind_ptrn(inner, want);
                ptrn.ty.set(want);
            }
        }
    }

    // ---------- expressions ----------

    fn lit_type(&mut self, lit: &Literal, expected: Option<TypeId>) -> TypeId {
        match lit {
            Literal::Bool(_) => self.uni.bool_type(),
            Literal::Int(_) => {
                if let Some(x) = expected {
                    if let Type::Prim(tag) = self.uni.get(x) {
                        if tag.is_integer() {
                            return x;
                        }
                    }
                }
                self.uni.prim_type(PrimTag::I32)
            }
            Literal::Float(_) => {
                if let Some(x) = expected {
                    if let Type::Prim(tag) = self.uni.get(x) {
                        if tag.is_float() {
                            return x;
                        }
                    }
                }
                self.uni.prim_type(PrimTag::F64)
            }
        }
    }

    pub fn infer_expr(&mut self, e: &Expr, expected: Option<TypeId>) -> TypeId {
        let prog = self.prog;
        let t = match &e.kind {
            ExprKind::Lit(lit) => self.lit_type(lit, expected),
            ExprKind::Var(DefRef::Local(l)) => {
                prog.local(*l).ty.get().unwrap_or_else(|| self.uni.type_error())
            }
            ExprKind::Var(DefRef::Fn(f)) => {
                prog.fn_decl(*f).ty.get().unwrap_or_else(|| self.uni.type_error())
            }
            ExprKind::Tuple(elems) => {
                let parts: Option<Vec<TypeId>> = match expected.map(|x| self.uni.get(x).clone()) {
                    Some(Type::Tuple(parts)) if parts.len() == elems.len() => {
                        Some(parts.to_vec())
                    }
                    _ => None,
                };
                let ids: Vec<TypeId> = elems
                    .iter()
                    .enumerate()
                    .map(|(i, el)| {
                        let want = parts.as_ref().map(|p| p[i]);
                        self.infer_expr(el, want)
                    })
                    .collect();
                self.uni.tuple_type(ids)
            }
            ExprKind::Array { elems, simd } => {
                let want_elem = match expected.map(|x| self.uni.get(x).clone()) {
                    Some(Type::SizedArray { elem, .. }) | Some(Type::UnsizedArray(elem)) => {
                        Some(elem)
                    }
                    _ => None,
                };
                let mut elem_ty = want_elem.unwrap_or_else(|| self.uni.bottom_type());
                for el in elems {
                    let t = self.infer_expr(el, want_elem);
                    elem_ty = self.uni.join(elem_ty, t);
                }
                self.uni.sized_array_type(elem_ty, elems.len() as u64, *simd)
            }
            ExprKind::Call { callee, arg } => {
                let callee_ty = self.infer_expr(callee, None);
                match self.uni.get(callee_ty).clone() {
                    Type::Fn { dom, codom } => {
                        self.infer_expr(arg, Some(dom));
                        codom
                    }
                    Type::Forall { decl, body } => {
                        let arg_ty = self.infer_expr(arg, None);
                        let mono = self.instantiate(decl, body, arg_ty, e.span);
                        match self.uni.get(mono).clone() {
                            Type::Fn { codom, .. } => codom,
                            _ => self.uni.type_error(),
                        }
                    }
                    _ => {
                        // Calling a non-function (or an error) resolves the
                        // argument anyway; the checker reports.
                        self.infer_expr(arg, None);
                        self.uni.type_error()
                    }
                }
            }
            ExprKind::Field { base, member } => {
                let base_ty = self.infer_expr(base, None);
                self.field_type(base_ty, member, e.span)
            }
            ExprKind::If { cond, then_expr, else_expr } => {
                let want_bool = self.uni.bool_type();
                self.infer_expr(cond, Some(want_bool));
                let t = self.infer_expr(then_expr, expected);
                let f = self.infer_expr(else_expr, expected);
                self.uni.join(t, f)
            }
            ExprKind::Block(exprs) => {
                let mut t = self.uni.unit_type();
                for (i, ex) in exprs.iter().enumerate() {
                    let last = i + 1 == exprs.len();
                    t = self.infer_expr(ex, if last { expected } else { None });
                }
                t
            }
            ExprKind::Let { ptrn, init } => {
                self.inc_rank();
                let want = self.ptrn_annot_type(ptrn);
                let init_ty = self.infer_expr(init, want);
                self.dec_rank();
                self.bind_ptrn(ptrn, want.unwrap_or(init_ty));
                self.uni.unit_type()
            }
            ExprKind::Lambda { param, body } => {
                let dom = match self.ptrn_annot_type(param) {
                    Some(d) => d,
                    None => match expected.map(|x| self.uni.get(x).clone()) {
                        Some(Type::Fn { dom, .. }) => dom,
                        _ => {
                            self.report(TypeError::InvalidType {
                                reason: "cannot infer the parameter type of this function"
                                    .to_string(),
                                span: param.span,
                            });
                            self.uni.type_error()
                        }
                    },
                };
                self.bind_ptrn(param, dom);
                let want_codom = match expected.map(|x| self.uni.get(x).clone()) {
                    Some(Type::Fn { codom, .. }) => Some(codom),
                    _ => None,
                };
                let body_ty = self.infer_expr(body, want_codom);
                self.uni.fn_type(dom, body_ty)
            }
            ExprKind::Annot { expr, ty } => {
                let want = self.lower_type_expr(ty);
                self.infer_expr(expr, Some(want));
                want
            }
            ExprKind::Error => self.uni.type_error(),
        };
        e.ty.set(t);
        t
    }

    /// Look a member up on a nominal type, auto-dereferencing pointers and
    /// references and substituting application arguments.
    fn field_type(&mut self, base_ty: TypeId, name: &str, span: Span) -> TypeId {
        let prog = self.prog;
        if base_ty == self.uni.type_error() {
            return base_ty;
        }
        let mut t = base_ty;
        loop {
            match *self.uni.get(t) {
                Type::Ref { pointee, .. } | Type::Ptr { pointee, .. } => t = pointee,
                _ => break,
            }
        }
        let view = match self.uni.as_complex(t) {
            Some(view) => view,
            None => {
                let owner = self.pp(base_ty);
                self.report(TypeError::UnknownMember {
                    owner,
                    name: name.to_string(),
                    span,
                });
                return self.uni.type_error();
            }
        };
        let Some(index) = view.find_member(prog, name) else {
            let owner = self.pp(t);
            self.report(TypeError::UnknownMember { owner, name: name.to_string(), span });
            return self.uni.type_error();
        };
        let Some(member_ty) = view.member_type(prog, self.uni, index) else {
            return self.uni.type_error();
        };
        if let Type::App { applied, args } = self.uni.get(t).clone() {
            if let Some(params) = nominal_type_params(prog, self.uni, applied) {
                let map: ReplaceMap =
                    params.iter().copied().zip(args.iter().copied()).collect();
                return self.uni.replace(member_ty, &map);
            }
        }
        member_ty
    }

    /// Instantiate a polymorphic callee against its argument type and record
    /// the solved variables as equations.
    fn instantiate(&mut self, decl: FnId, body: TypeId, arg_ty: TypeId, span: Span) -> TypeId {
        let prog = self.prog;
        let map = match instantiation_map(self.uni, prog, decl, body, arg_ty) {
            Ok(map) => map,
            Err(err) => {
                let err = self.instantiation_error(err, span);
                self.report(err);
                return self.uni.type_error();
            }
        };
        for (&p, &ty) in &map {
            let var = self.uni.type_var(p);
            self.eqs.insert(var, Equation { span, ty, rank: self.rank });
        }
        self.uni.replace(body, &map)
    }

    fn instantiation_error(&self, err: InstantiationError, span: Span) -> TypeError {
        let prog = self.prog;
        match err {
            InstantiationError::NotAFunction => TypeError::InvalidType {
                reason: "called value is not a function".to_string(),
                span,
            },
            InstantiationError::Uninferable(p) => TypeError::InvalidType {
                reason: format!("cannot infer the type argument `{}`", prog.type_param(p).name),
                span,
            },
            InstantiationError::Unsatisfiable(p, b) => TypeError::Mismatch {
                context: format!("type argument `{}`", prog.type_param(p).name),
                expected: self.pp(b.upper),
                found: self.pp(b.lower),
                span,
            },
        }
    }
}

/// Why a polymorphic call site could not be instantiated.
#[derive(Debug, Clone, Copy)]
pub(crate) enum InstantiationError {
    NotAFunction,
    Uninferable(TypeParamId),
    Unsatisfiable(TypeParamId, TypeBounds),
}

/// The substitution that instantiates `decl`'s parameters so the body's
/// domain accepts `arg_ty`. Deterministic, so the checking pass can re-derive
/// the map the inference pass used without extra bookkeeping.
pub(crate) fn instantiation_map(
    uni: &TypeUniverse,
    prog: &Program,
    decl: FnId,
    body: TypeId,
    arg_ty: TypeId,
) -> Result<ReplaceMap, InstantiationError> {
    let Type::Fn { dom, .. } = *uni.get(body) else {
        return Err(InstantiationError::NotAFunction);
    };
    let mut bounds = BoundsMap::default();
    uni.bounds(dom, arg_ty, &mut bounds, true);
    let mut variances = VarianceMap::default();
    uni.variance(body, &mut variances, true);

    let mut map = ReplaceMap::default();
    for &p in &prog.fn_decl(decl).type_params {
        let b = bounds
            .get(&p)
            .copied()
            .ok_or(InstantiationError::Uninferable(p))?;
        if !b.is_satisfiable(uni) {
            return Err(InstantiationError::Unsatisfiable(p, b));
        }
        // Unconstrained directions default to covariant, the direction the
        // analysis entered with.
        let choice = match variances.get(&p).copied().unwrap_or(TypeVariance::Covariant) {
            TypeVariance::Contravariant => b.upper,
            // Covariant or invariant: the lower bound is the most specific
            // choice; fall back to the upper bound when nothing constrains
            // the variable from below.
            _ => {
                if b.lower == uni.bottom_type() {
                    b.upper
                } else {
                    b.lower
                }
            }
        };
        map.insert(p, choice);
    }
    Ok(map)
}

/// The type parameters of the nominal behind an application head.
pub(crate) fn nominal_type_params<'p>(
    prog: &'p Program,
    uni: &TypeUniverse,
    applied: TypeId,
) -> Option<&'p [TypeParamId]> {
    match *uni.get(applied) {
        Type::Struct(s) => Some(&prog.struct_decl(s).type_params),
        Type::Enum(e) => Some(&prog.enum_decl(e).type_params),
        Type::Trait(t) => Some(&prog.trait_decl(t).type_params),
        Type::Impl(i) => Some(&prog.impl_decl(i).type_params),
        _ => None,
    }
}
