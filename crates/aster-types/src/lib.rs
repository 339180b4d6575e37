//! aster-types: the type system core of the aster front-end.
//!
//! Pieces, leaves first:
//! - [`universe`]: hash-consed type factory; pointer identity is structural
//!   equality, structural queries are cycle-safe and memoized.
//! - [`subtype`]: the `a <: b` relation and its induced join.
//! - [`unify`]: one-sided unification producing substitutions, used by impl
//!   resolution.
//! - [`variance`]: per-variable variance and inferred `[lower, upper]`
//!   bounds.
//! - [`complex`]: member views over struct/enum/trait/impl/module types.
//! - [`resolver`]: trait obligation resolution against `where` clauses and
//!   registered impls.
//! - [`infer`] / [`check`]: the two-phase façade over the AST.
//!
//! Everything is single-threaded; a universe, a resolver, and the passes all
//! live on one thread for the duration of a typing run.

pub mod check;
pub mod complex;
pub mod diagnostic;
pub mod display;
pub mod error;
pub mod infer;
pub mod resolver;
pub mod subtype;
pub mod types;
pub mod unify;
pub mod universe;
pub mod variance;

pub use check::TypeChecker;
pub use complex::ComplexType;
pub use diagnostic::{CollectReporter, Report, ReportKind, Reporter};
pub use display::pp_type;
pub use error::TypeError;
pub use infer::TypeInference;
pub use resolver::ImplResolver;
pub use types::{PrimTag, ReplaceMap, Type, TypeId};
pub use unify::UnifyError;
pub use universe::TypeUniverse;
pub use variance::{TypeBounds, TypeVariance};

pub mod api {
    //! One-call driver over the two passes plus impl registration, in the
    //! order the model requires: signatures, then registration, then body
    //! checking. Returns the universe, the resolver, and the error count.

    use aster_ast::ast::Program;
    use aster_ast::ids::ImplId;

    use crate::check::TypeChecker;
    use crate::diagnostic::Reporter;
    use crate::error::TypeError;
    use crate::infer::TypeInference;
    use crate::resolver::ImplResolver;
    use crate::universe::TypeUniverse;

    pub fn check_program(
        prog: &Program,
        reporter: &mut dyn Reporter,
    ) -> (TypeUniverse, ImplResolver, usize) {
        let mut uni = TypeUniverse::new();
        let mut errors = 0;
        {
            let mut inference = TypeInference::new(&mut uni, prog, reporter);
            inference.infer_program();
            errors += inference.errors();
        }
        let mut resolver = ImplResolver::new();
        for i in 0..prog.impls.len() {
            let id = ImplId(i as u32);
            if !resolver.register_impl(prog, &uni, id) {
                let err = TypeError::InvalidType {
                    reason: "impl does not implement a trait".to_string(),
                    span: prog.impl_decl(id).span,
                };
                reporter.error(err.span(), &err.to_string());
                errors += 1;
            }
        }
        let mut checker = TypeChecker::new(&mut uni, prog, &resolver, reporter);
        errors += checker.check();
        (uni, resolver, errors)
    }
}
