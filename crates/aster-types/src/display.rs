//! Pretty printing for interned types.
//!
//! Used when building error messages; never on a hot path. Function types in
//! argument position get parentheses, tuple domains already bring their own.

use aster_ast::ast::Program;
use aster_ast::ids::TypeId;

use crate::types::Type;
use crate::universe::TypeUniverse;

/// Render a type for diagnostics.
pub fn pp_type(uni: &TypeUniverse, prog: &Program, t: TypeId) -> String {
    match uni.get(t) {
        Type::Prim(tag) => tag.name().to_string(),
        Type::Tuple(elems) => {
            let parts: Vec<String> = elems.iter().map(|&e| pp_type(uni, prog, e)).collect();
            format!("({})", parts.join(", "))
        }
        Type::SizedArray { elem, size, simd } => {
            let head = if *simd { "simd[" } else { "[" };
            format!("{}{}; {}]", head, pp_type(uni, prog, *elem), size)
        }
        Type::UnsizedArray(elem) => format!("[{}]", pp_type(uni, prog, *elem)),
        Type::Ptr { pointee, mutable, addr_space } => format!(
            "*{}{}{}",
            if *mutable { "mut " } else { "" },
            addr_space_prefix(*addr_space),
            pp_atom(uni, prog, *pointee)
        ),
        Type::Ref { pointee, mutable, addr_space } => format!(
            "&{}{}{}",
            if *mutable { "mut " } else { "" },
            addr_space_prefix(*addr_space),
            pp_atom(uni, prog, *pointee)
        ),
        Type::Fn { dom, codom } => {
            let dom_str = if matches!(uni.get(*dom), Type::Tuple(_)) {
                pp_type(uni, prog, *dom)
            } else {
                format!("({})", pp_type(uni, prog, *dom))
            };
            if *codom == uni.no_ret_type() {
                format!("fn {} -> !", dom_str)
            } else {
                format!("fn {} -> {}", dom_str, pp_type(uni, prog, *codom))
            }
        }
        Type::App { applied, args } => {
            let parts: Vec<String> = args.iter().map(|&a| pp_type(uni, prog, a)).collect();
            format!("{}[{}]", pp_type(uni, prog, *applied), parts.join(", "))
        }
        Type::Bottom => "bottom".to_string(),
        Type::Top => "top".to_string(),
        Type::NoRet => "!".to_string(),
        Type::Error => "<type error>".to_string(),
        Type::Var(p) => prog.type_param(*p).name.clone(),
        Type::Forall { body, .. } => pp_type(uni, prog, *body),
        Type::Struct(id) => prog.struct_decl(*id).name.clone(),
        Type::Enum(id) => prog.enum_decl(*id).name.clone(),
        Type::Trait(id) => prog.trait_decl(*id).name.clone(),
        Type::Impl(id) => match prog.impl_decl(*id).trait_ty.ty.get() {
            Some(impled) => format!("impl {}", pp_type(uni, prog, impled)),
            None => "impl".to_string(),
        },
        Type::Mod(id) => {
            let name = &prog.mod_decl(*id).name;
            if name.is_empty() {
                "mod".to_string()
            } else {
                format!("mod {}", name)
            }
        }
        Type::Alias(id) => prog.alias_decl(*id).name.clone(),
    }
}

fn addr_space_prefix(addr_space: u32) -> String {
    if addr_space == 0 {
        String::new()
    } else {
        format!("addr({}) ", addr_space)
    }
}

/// Like [`pp_type`] but parenthesizes function types, for positions where a
/// bare arrow would misparse.
fn pp_atom(uni: &TypeUniverse, prog: &Program, t: TypeId) -> String {
    match uni.get(t) {
        Type::Fn { .. } => format!("({})", pp_type(uni, prog, t)),
        _ => pp_type(uni, prog, t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimTag;
    use aster_ast::ast::Program;

    #[test]
    fn renders_core_shapes() {
        let mut uni = TypeUniverse::new();
        let prog = Program::new();
        let i32t = uni.prim_type(PrimTag::I32);
        let b = uni.bool_type();
        let tup = uni.tuple_type([i32t, b]);
        assert_eq!(pp_type(&uni, &prog, tup), "(i32, bool)");

        let arr = uni.sized_array_type(i32t, 4, false);
        assert_eq!(pp_type(&uni, &prog, arr), "[i32; 4]");
        let simd = uni.sized_array_type(i32t, 4, true);
        assert_eq!(pp_type(&uni, &prog, simd), "simd[i32; 4]");
        let slice = uni.unsized_array_type(i32t);
        assert_eq!(pp_type(&uni, &prog, slice), "[i32]");

        let p = uni.ptr_type(slice, true, 1);
        assert_eq!(pp_type(&uni, &prog, p), "*mut addr(1) [i32]");
        let r = uni.ref_type(i32t, false, 0);
        assert_eq!(pp_type(&uni, &prog, r), "&i32");

        let f = uni.fn_type(tup, i32t);
        assert_eq!(pp_type(&uni, &prog, f), "fn (i32, bool) -> i32");
        let g = uni.fn_type(i32t, i32t);
        assert_eq!(pp_type(&uni, &prog, g), "fn (i32) -> i32");
        let cn = uni.cn_type(i32t);
        assert_eq!(pp_type(&uni, &prog, cn), "fn (i32) -> !");
    }
}
