//! Impl resolution: where-clause assumptions, nested where discharge,
//! module search order, and cycle termination.

use aster_ast::ast::*;
use aster_ast::ids::{FnId, ModId, TraitId};
use aster_ast::span::Span;
use aster_ast::ty::PrimTag;
use aster_types::{CollectReporter, ImplResolver, TypeInference, TypeUniverse};

fn te(kind: TypeExprKind) -> TypeExpr {
    TypeExpr::new(kind, Span::default())
}

fn named(target: NamedRef, args: Vec<TypeExpr>) -> TypeExpr {
    te(TypeExprKind::Named { target, args })
}

fn prim(tag: PrimTag) -> TypeExpr {
    te(TypeExprKind::Prim(tag))
}

fn plain_fn(prog: &mut Program, name: &str, parent: ModId) -> FnId {
    prog.push_fn(FnDecl {
        name: name.into(),
        span: Span::default(),
        parent: Parent::Mod(parent),
        type_params: vec![],
        where_clauses: vec![],
        param: None,
        ret: None,
        body: None,
        ty: TySlot::new(),
    })
}

fn trait_decl(prog: &mut Program, name: &str, parent: ModId, arity: usize) -> TraitId {
    let params = (0..arity).map(|i| prog.push_type_param(&format!("T{}", i))).collect();
    prog.push_trait(TraitDecl {
        name: name.into(),
        span: Span::default(),
        parent,
        type_params: params,
        decls: vec![],
    })
}

/// Run the signature pass and register every impl.
fn setup(prog: &Program) -> (TypeUniverse, ImplResolver, CollectReporter) {
    let mut uni = TypeUniverse::new();
    let mut reporter = CollectReporter::new();
    {
        let mut inference = TypeInference::new(&mut uni, prog, &mut reporter);
        inference.infer_program();
    }
    let mut resolver = ImplResolver::new();
    for i in 0..prog.impls.len() {
        assert!(resolver.register_impl(prog, &uni, aster_ast::ids::ImplId(i as u32)));
    }
    (uni, resolver, reporter)
}

#[test]
fn nested_where_clauses_are_discharged_through_the_substitution() {
    let mut prog = Program::new();
    let root = prog.root();
    let hash = trait_decl(&mut prog, "Hash", root, 1);

    // impl Hash[i32]
    let impl_i32 = prog.push_impl(ImplDecl {
        span: Span::default(),
        parent: root,
        type_params: vec![],
        where_clauses: vec![],
        trait_ty: named(NamedRef::Trait(hash), vec![prim(PrimTag::I32)]),
        decls: vec![],
    });

    // impl Hash[(A, A)] where Hash[A]
    let a = prog.push_type_param("A");
    let impl_pair = prog.push_impl(ImplDecl {
        span: Span::default(),
        parent: root,
        type_params: vec![a],
        where_clauses: vec![WhereClause {
            ty: named(NamedRef::Trait(hash), vec![named(NamedRef::Param(a), vec![])]),
            span: Span::default(),
        }],
        trait_ty: named(
            NamedRef::Trait(hash),
            vec![te(TypeExprKind::Tuple(vec![
                named(NamedRef::Param(a), vec![]),
                named(NamedRef::Param(a), vec![]),
            ]))],
        ),
        decls: vec![],
    });

    let user = plain_fn(&mut prog, "user", root);
    let (mut uni, resolver, _) = setup(&prog);

    let i32t = uni.prim_type(PrimTag::I32);
    let pair = uni.tuple_type([i32t, i32t]);
    let hash_ty = uni.trait_type(hash);

    // Hash[i32] resolves to the first impl directly.
    let target_i32 = uni.type_app(&prog, hash_ty, &[i32t]);
    let expect_i32 = uni.impl_type(impl_i32);
    assert_eq!(resolver.find_impl(&prog, &mut uni, user, target_i32), Some(expect_i32));

    // Hash[(i32, i32)] unifies the pair impl (A = i32), then discharges
    // Hash[A][A = i32] against the first impl.
    let target_pair = uni.type_app(&prog, hash_ty, &[pair]);
    let found = resolver.find_impl(&prog, &mut uni, user, target_pair).unwrap();
    let impl_pair_ty = uni.impl_type(impl_pair);
    let expect_pair = uni.type_app(&prog, impl_pair_ty, &[i32t]);
    assert_eq!(found, expect_pair);

    // Hash[(i32, u8)] has no impl: the pair impl needs A = i32 and A = u8.
    let u8t = uni.prim_type(PrimTag::U8);
    let mixed = uni.tuple_type([i32t, u8t]);
    let target_mixed = uni.type_app(&prog, hash_ty, &[mixed]);
    assert_eq!(resolver.find_impl(&prog, &mut uni, user, target_mixed), None);
}

#[test]
fn where_clause_assumptions_win_over_impls() {
    let mut prog = Program::new();
    let root = prog.root();
    let show = trait_decl(&mut prog, "Show", root, 1);

    // fn user() where Show[u8] -- no impl registered anywhere.
    let user = prog.push_fn(FnDecl {
        name: "user".into(),
        span: Span::default(),
        parent: Parent::Mod(root),
        type_params: vec![],
        where_clauses: vec![WhereClause {
            ty: named(NamedRef::Trait(show), vec![prim(PrimTag::U8)]),
            span: Span::default(),
        }],
        param: None,
        ret: None,
        body: None,
        ty: TySlot::new(),
    });

    let (mut uni, resolver, _) = setup(&prog);
    let u8t = uni.prim_type(PrimTag::U8);
    let show_ty = uni.trait_type(show);
    let target = uni.type_app(&prog, show_ty, &[u8t]);
    // The assumption discharges the obligation and is returned as-is.
    assert_eq!(resolver.find_impl(&prog, &mut uni, user, target), Some(target));

    // A different instantiation is not assumed.
    let i32t = uni.prim_type(PrimTag::I32);
    let other = uni.type_app(&prog, show_ty, &[i32t]);
    assert_eq!(resolver.find_impl(&prog, &mut uni, user, other), None);
}

#[test]
fn modules_are_searched_innermost_first() {
    let mut prog = Program::new();
    let root = prog.root();
    let eq = trait_decl(&mut prog, "Eq", root, 1);
    let inner = prog.push_mod("inner", root);

    // Same trait application implemented in both the root and the inner
    // module; a use site inside `inner` must see the inner one.
    let impl_outer = prog.push_impl(ImplDecl {
        span: Span::default(),
        parent: root,
        type_params: vec![],
        where_clauses: vec![],
        trait_ty: named(NamedRef::Trait(eq), vec![prim(PrimTag::I32)]),
        decls: vec![],
    });
    let impl_inner = prog.push_impl(ImplDecl {
        span: Span::default(),
        parent: inner,
        type_params: vec![],
        where_clauses: vec![],
        trait_ty: named(NamedRef::Trait(eq), vec![prim(PrimTag::I32)]),
        decls: vec![],
    });

    let inner_user = plain_fn(&mut prog, "inner_user", inner);
    let outer_user = plain_fn(&mut prog, "outer_user", root);

    let (mut uni, resolver, _) = setup(&prog);
    let i32t = uni.prim_type(PrimTag::I32);
    let eq_ty = uni.trait_type(eq);
    let target = uni.type_app(&prog, eq_ty, &[i32t]);

    let expect_inner = uni.impl_type(impl_inner);
    let expect_outer = uni.impl_type(impl_outer);
    assert_eq!(resolver.find_impl(&prog, &mut uni, inner_user, target), Some(expect_inner));
    assert_eq!(resolver.find_impl(&prog, &mut uni, outer_user, target), Some(expect_outer));
}

#[test]
fn candidates_match_in_registration_order() {
    let mut prog = Program::new();
    let root = prog.root();
    let conv = trait_decl(&mut prog, "Conv", root, 1);

    // A generic impl registered first shadows a later specific one.
    let b = prog.push_type_param("B");
    let impl_generic = prog.push_impl(ImplDecl {
        span: Span::default(),
        parent: root,
        type_params: vec![b],
        where_clauses: vec![],
        trait_ty: named(NamedRef::Trait(conv), vec![named(NamedRef::Param(b), vec![])]),
        decls: vec![],
    });
    let _impl_specific = prog.push_impl(ImplDecl {
        span: Span::default(),
        parent: root,
        type_params: vec![],
        where_clauses: vec![],
        trait_ty: named(NamedRef::Trait(conv), vec![prim(PrimTag::I32)]),
        decls: vec![],
    });

    let user = plain_fn(&mut prog, "user", root);
    let (mut uni, resolver, _) = setup(&prog);
    let i32t = uni.prim_type(PrimTag::I32);
    let conv_ty = uni.trait_type(conv);
    let target = uni.type_app(&prog, conv_ty, &[i32t]);

    let generic_ty = uni.impl_type(impl_generic);
    let expect = uni.type_app(&prog, generic_ty, &[i32t]);
    assert_eq!(resolver.find_impl(&prog, &mut uni, user, target), Some(expect));
}

#[test]
fn self_referential_where_clauses_terminate() {
    let mut prog = Program::new();
    let root = prog.root();
    let odd = trait_decl(&mut prog, "Odd", root, 1);

    // impl Odd[i32] where Odd[i32] -- can only be discharged by itself.
    prog.push_impl(ImplDecl {
        span: Span::default(),
        parent: root,
        type_params: vec![],
        where_clauses: vec![WhereClause {
            ty: named(NamedRef::Trait(odd), vec![prim(PrimTag::I32)]),
            span: Span::default(),
        }],
        trait_ty: named(NamedRef::Trait(odd), vec![prim(PrimTag::I32)]),
        decls: vec![],
    });

    let user = plain_fn(&mut prog, "user", root);
    let (mut uni, resolver, _) = setup(&prog);
    let i32t = uni.prim_type(PrimTag::I32);
    let odd_ty = uni.trait_type(odd);
    let target = uni.type_app(&prog, odd_ty, &[i32t]);
    // Must return (with no witness), not recurse forever.
    assert_eq!(resolver.find_impl(&prog, &mut uni, user, target), None);
}

#[test]
fn non_trait_targets_resolve_to_nothing() {
    let mut prog = Program::new();
    let root = prog.root();
    let user = plain_fn(&mut prog, "user", root);
    let (mut uni, resolver, _) = setup(&prog);
    let i32t = uni.prim_type(PrimTag::I32);
    assert_eq!(resolver.find_impl(&prog, &mut uni, user, i32t), None);
}
