//! Member introspection over nominal types.
//!
//! Struct, enum, trait, impl, and module types all expose a uniform indexed
//! member view: count, name, resolved type, lookup by name, and whether the
//! member carries a default (struct field initializers and trait methods with
//! default bodies). Module member lists are materialized lazily on first
//! access, see [`Program::mod_members`].

use aster_ast::ast::{Item, Program};
use aster_ast::ids::{EnumId, ImplId, ModId, StructId, TraitId, TypeId};

use crate::types::Type;
use crate::universe::TypeUniverse;

/// A view over the members of a nominal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexType {
    Struct(StructId),
    Enum(EnumId),
    Trait(TraitId),
    Impl(ImplId),
    Mod(ModId),
}

impl TypeUniverse {
    /// The member view of `t`, if it is a nominal type with members. An
    /// application exposes the members of the applied nominal; callers
    /// substitute the arguments themselves.
    pub fn as_complex(&self, t: TypeId) -> Option<ComplexType> {
        match *self.get(t) {
            Type::Struct(id) => Some(ComplexType::Struct(id)),
            Type::Enum(id) => Some(ComplexType::Enum(id)),
            Type::Trait(id) => Some(ComplexType::Trait(id)),
            Type::Impl(id) => Some(ComplexType::Impl(id)),
            Type::Mod(id) => Some(ComplexType::Mod(id)),
            Type::App { applied, .. } => self.as_complex(applied),
            _ => None,
        }
    }
}

impl ComplexType {
    pub fn member_count(&self, prog: &Program) -> usize {
        match *self {
            ComplexType::Struct(id) => prog.struct_decl(id).fields.len(),
            ComplexType::Enum(id) => prog.enum_decl(id).options.len(),
            ComplexType::Trait(id) => prog.trait_decl(id).decls.len(),
            ComplexType::Impl(id) => prog.impl_decl(id).decls.len(),
            ComplexType::Mod(id) => prog.mod_members(id).len(),
        }
    }

    pub fn member_name<'p>(&self, prog: &'p Program, i: usize) -> &'p str {
        match *self {
            ComplexType::Struct(id) => &prog.struct_decl(id).fields[i].name,
            ComplexType::Enum(id) => &prog.enum_decl(id).options[i].name,
            ComplexType::Trait(id) => &prog.fn_decl(prog.trait_decl(id).decls[i]).name,
            ComplexType::Impl(id) => &prog.fn_decl(prog.impl_decl(id).decls[i]).name,
            ComplexType::Mod(id) => prog
                .item_name(prog.mod_members(id)[i])
                .expect("module members are named by construction"),
        }
    }

    /// The resolved type of member `i`, if the signature pass has reached it
    /// yet.
    pub fn member_type(
        &self,
        prog: &Program,
        uni: &mut TypeUniverse,
        i: usize,
    ) -> Option<TypeId> {
        match *self {
            ComplexType::Struct(id) => prog.struct_decl(id).fields[i].ty_expr.ty.get(),
            ComplexType::Enum(id) => match &prog.enum_decl(id).options[i].payload {
                Some(te) => te.ty.get(),
                None => Some(uni.unit_type()),
            },
            ComplexType::Trait(id) => prog.fn_decl(prog.trait_decl(id).decls[i]).ty.get(),
            ComplexType::Impl(id) => prog.fn_decl(prog.impl_decl(id).decls[i]).ty.get(),
            ComplexType::Mod(id) => match prog.mod_members(id)[i] {
                Item::Fn(f) => prog.fn_decl(f).ty.get(),
                Item::Struct(s) => Some(uni.struct_type(s)),
                Item::Enum(e) => Some(uni.enum_type(e)),
                Item::Trait(t) => Some(uni.trait_type(t)),
                Item::Mod(m) => Some(uni.mod_type(m)),
                Item::Alias(a) => prog.alias_decl(a).body.ty.get(),
                Item::Impl(_) => None,
            },
        }
    }

    pub fn find_member(&self, prog: &Program, name: &str) -> Option<usize> {
        (0..self.member_count(prog)).find(|&i| self.member_name(prog, i) == name)
    }

    /// Struct fields with initializers and trait methods with default bodies
    /// have defaults; nothing else does.
    pub fn has_default_value(&self, prog: &Program, i: usize) -> bool {
        match *self {
            ComplexType::Struct(id) => prog.struct_decl(id).fields[i].has_default,
            ComplexType::Trait(id) => {
                prog.fn_decl(prog.trait_decl(id).decls[i]).body.is_some()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimTag;
    use aster_ast::ast::*;
    use aster_ast::span::Span;

    fn te(kind: TypeExprKind) -> TypeExpr {
        TypeExpr::new(kind, Span::default())
    }

    #[test]
    fn struct_members_by_index_and_name() {
        let mut uni = TypeUniverse::new();
        let mut prog = Program::new();
        let root = prog.root();
        let s = prog.push_struct(StructDecl {
            name: "Point".into(),
            span: Span::default(),
            parent: root,
            type_params: vec![],
            where_clauses: vec![],
            fields: vec![
                FieldDecl {
                    name: "x".into(),
                    span: Span::default(),
                    ty_expr: te(TypeExprKind::Prim(PrimTag::F32)),
                    has_default: false,
                },
                FieldDecl {
                    name: "y".into(),
                    span: Span::default(),
                    ty_expr: te(TypeExprKind::Prim(PrimTag::F32)),
                    has_default: true,
                },
            ],
            is_tuple_like: false,
        });
        let f32t = uni.prim_type(PrimTag::F32);
        prog.struct_decl(s).fields[0].ty_expr.ty.set(f32t);
        prog.struct_decl(s).fields[1].ty_expr.ty.set(f32t);

        let st = uni.struct_type(s);
        let view = uni.as_complex(st).unwrap();
        assert_eq!(view.member_count(&prog), 2);
        assert_eq!(view.member_name(&prog, 0), "x");
        assert_eq!(view.find_member(&prog, "y"), Some(1));
        assert_eq!(view.find_member(&prog, "z"), None);
        assert_eq!(view.member_type(&prog, &mut uni, 0), Some(f32t));
        assert!(!view.has_default_value(&prog, 0));
        assert!(view.has_default_value(&prog, 1));
    }

    #[test]
    fn module_members_are_lazy_and_skip_impls() {
        let mut uni = TypeUniverse::new();
        let mut prog = Program::new();
        let root = prog.root();
        let m = prog.push_mod("util", root);
        prog.push_impl(ImplDecl {
            span: Span::default(),
            parent: m,
            type_params: vec![],
            where_clauses: vec![],
            trait_ty: te(TypeExprKind::Error),
            decls: vec![],
        });
        let s = prog.push_struct(StructDecl {
            name: "S".into(),
            span: Span::default(),
            parent: m,
            type_params: vec![],
            where_clauses: vec![],
            fields: vec![],
            is_tuple_like: false,
        });
        let mt = uni.mod_type(m);
        let view = uni.as_complex(mt).unwrap();
        assert_eq!(view.member_count(&prog), 1);
        assert_eq!(view.member_name(&prog, 0), "S");
        let expect = uni.struct_type(s);
        assert_eq!(view.member_type(&prog, &mut uni, 0), Some(expect));
    }

    #[test]
    fn enum_unit_options_have_unit_type() {
        let mut uni = TypeUniverse::new();
        let mut prog = Program::new();
        let root = prog.root();
        let e = prog.push_enum(EnumDecl {
            name: "Flag".into(),
            span: Span::default(),
            parent: root,
            type_params: vec![],
            options: vec![
                OptionDecl { name: "On".into(), span: Span::default(), payload: None },
                OptionDecl {
                    name: "Level".into(),
                    span: Span::default(),
                    payload: Some(te(TypeExprKind::Prim(PrimTag::U8))),
                },
            ],
        });
        let u8t = uni.prim_type(PrimTag::U8);
        prog.enum_decl(e).options[1].payload.as_ref().unwrap().ty.set(u8t);
        let et = uni.enum_type(e);
        let view = uni.as_complex(et).unwrap();
        assert_eq!(view.member_type(&prog, &mut uni, 0), Some(uni.unit_type()));
        assert_eq!(view.member_type(&prog, &mut uni, 1), Some(u8t));
    }
}
