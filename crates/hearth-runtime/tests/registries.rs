//! Declaration and lookup through a run context

mod common;

use common::*;
#[allow(unused_imports)]
use common::{assert_eq, assert_ne};
use hearth_runtime::{
    error_codes, Application, ConstantEntry, DeclarationKind, DiagnosticSink, FunctionDescriptor, MemoryDiagnosticSink,
    RunContext, RuntimeError, TypeDescriptor, Value,
};
use proptest::prelude::*;
use rstest::rstest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn func(name: &str) -> Arc<FunctionDescriptor> {
    Arc::new(FunctionDescriptor::new(name, |_, args| Ok(Value::Int(args.len() as i64))))
}

fn empty_ctx() -> RunContext {
    RunContext::new(Application::builder().build())
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_declared_function_is_callable() {
    let mut ctx = empty_ctx();
    ctx.declare_function(func("count_args")).unwrap();

    let f = ctx.routines().lookup("Count_Args").unwrap();
    assert_eq!(f.invoke(&mut ctx, &[Value::Null, Value::Null]).unwrap(), Value::Int(2));
}

#[test]
fn test_function_redeclaration_is_fatal() {
    let mut ctx = empty_ctx();
    ctx.declare_function(func("helper")).unwrap();

    let err = ctx.declare_function(func("HELPER")).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Redeclaration {
            kind: DeclarationKind::Function,
            ..
        }
    ));
    assert_eq!(err.code(), error_codes::FUNCTION_REDECLARED);
}

#[test]
fn test_redeclaring_identical_function_is_idempotent() {
    let mut ctx = empty_ctx();
    let f = func("helper");
    ctx.declare_function(f.clone()).unwrap();
    ctx.declare_function(f.clone()).unwrap();

    assert_eq!(ctx.routines().len(), 1);
    assert!(ctx.assert_function_declared(&f).is_ok());
}

#[test]
fn test_assert_function_declared_fails_for_other_descriptor() {
    let mut ctx = empty_ctx();
    ctx.declare_function(func("helper")).unwrap();

    let err = ctx.assert_function_declared(&func("helper")).unwrap_err();
    assert!(matches!(err, RuntimeError::FunctionNotFound { .. }));
}

#[test]
fn test_call_site_cache_validation() {
    let app = Application::builder()
        .declare_function(func("builtin"))
        .unwrap()
        .build();
    let mut ctx = RunContext::new(app);
    let user = func("user_fn");
    ctx.declare_function(user.clone()).unwrap();

    let index = ctx.routines().index_of("user_fn").unwrap();
    assert_eq!(index, 1);
    assert!(ctx.check_function_declared(index, user.tag()));
    assert!(!ctx.check_function_declared(0, user.tag()));
    assert!(!ctx.check_function_declared(7, user.tag()));
}

#[test]
fn test_runs_do_not_share_declarations() {
    let app = Application::builder().build();
    let mut first = RunContext::new(app.clone());
    let second = RunContext::new(app);

    first.declare_function(func("only_here")).unwrap();

    assert!(first.routines().lookup("only_here").is_some());
    assert!(second.routines().lookup("only_here").is_none());
}

proptest! {
    #[test]
    fn prop_all_declared_functions_are_found(names in prop::collection::hash_set("[a-z][a-z0-9_]{0,10}", 1..30)) {
        let mut ctx = empty_ctx();
        for name in &names {
            ctx.declare_function(func(name)).unwrap();
        }
        for name in &names {
            prop_assert!(ctx.routines().lookup(name).is_some());
        }
        prop_assert_eq!(ctx.routines().enumerate_all().count(), names.len());
    }
}

// ============================================================================
// Types
// ============================================================================

#[test]
fn test_type_alias_lookup_returns_same_identity() {
    let mut ctx = empty_ctx();
    let model = Arc::new(TypeDescriptor::new("App\\Model"));
    ctx.declare_type(model.clone()).unwrap();
    ctx.declare_type_alias(model.clone(), "Model").unwrap();
    ctx.declare_type_alias(model.clone(), "Entity").unwrap();

    for name in ["App\\Model", "\\app\\model", "model", "ENTITY"] {
        let found = ctx.types().lookup(name).unwrap();
        assert!(found.is_same(&model), "{} resolved to another type", name);
    }
    assert_eq!(ctx.types().len(), 1);
}

#[test]
fn test_type_redeclaration_is_fatal() {
    let mut ctx = empty_ctx();
    ctx.declare_type(Arc::new(TypeDescriptor::new("Foo"))).unwrap();

    let err = ctx.declare_type(Arc::new(TypeDescriptor::new("Foo"))).unwrap_err();
    assert_eq!(err.code(), error_codes::TYPE_REDECLARED);
}

#[rstest]
#[case::self_with_context("self", true, Some("Child"))]
#[case::parent_with_context("parent", true, Some("Base"))]
#[case::self_without_context("self", false, None)]
#[case::parent_without_context("parent", false, None)]
fn test_contextual_type_names(#[case] name: &str, #[case] with_caller: bool, #[case] expected: Option<&str>) {
    let mut ctx = empty_ctx();
    let base = Arc::new(TypeDescriptor::new("Base"));
    let child = Arc::new(TypeDescriptor::new("Child").with_base(&base));
    ctx.declare_type(base.clone()).unwrap();
    ctx.declare_type(child.clone()).unwrap();

    let caller = with_caller.then_some(&child);
    let resolved = ctx.resolve_type(name, caller, false).unwrap();

    assert_eq!(resolved.as_ref().map(|t| t.name()), expected);
}

#[test]
fn test_parent_of_type_without_base_is_absent() {
    let mut ctx = empty_ctx();
    let root = Arc::new(TypeDescriptor::new("Root"));

    assert!(ctx.resolve_type("parent", Some(&root), true).unwrap().is_none());
}

#[test]
fn test_static_is_left_to_caller() {
    let mut ctx = empty_ctx();
    let t = Arc::new(TypeDescriptor::new("T"));

    let err = ctx.resolve_type("static", Some(&t), true).unwrap_err();
    assert!(matches!(err, RuntimeError::LateStaticBinding));
}

#[test]
fn test_autoload_runs_once_and_declares() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let mut ctx = RunContext::builder(Application::builder().build())
        .autoload(move |ctx: &mut RunContext, name: &str| -> Result<(), RuntimeError> {
            seen.fetch_add(1, Ordering::SeqCst);
            if name == "Lazy" {
                ctx.declare_type(Arc::new(TypeDescriptor::new("Lazy")))?;
            }
            Ok(())
        })
        .build();

    assert!(ctx.resolve_type("Lazy", None, false).unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(ctx.resolve_type("Lazy", None, true).unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // declared now, no second autoload
    assert!(ctx.resolve_type("lazy", None, true).unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(ctx.resolve_type("Missing", None, true).unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let err = ctx.resolve_type_or_err("Missing", None, true).unwrap_err();
    assert_eq!(err.code(), error_codes::TYPE_NOT_FOUND);
}

#[test]
fn test_autoload_redeclaration_propagates() {
    let mut ctx = RunContext::builder(Application::builder().build())
        .autoload(|ctx: &mut RunContext, name: &str| -> Result<(), RuntimeError> {
            ctx.declare_type(Arc::new(TypeDescriptor::new(name)))?;
            ctx.declare_type(Arc::new(TypeDescriptor::new(name)))
        })
        .build();

    let err = ctx.resolve_type("Twice", None, true).unwrap_err();
    assert!(matches!(err, RuntimeError::Redeclaration { .. }));
}

#[test]
fn test_ensure_type_declared() {
    let expected = Arc::new(TypeDescriptor::new("Expected"));
    let autoloaded = expected.clone();
    let mut ctx = RunContext::builder(Application::builder().build())
        .autoload(move |ctx: &mut RunContext, name: &str| -> Result<(), RuntimeError> {
            match name {
                "Expected" => ctx.declare_type(autoloaded.clone()),
                "Impostor" => ctx.declare_type(Arc::new(TypeDescriptor::new("Impostor"))),
                _ => Ok(()),
            }
        })
        .build();

    ctx.ensure_type_declared(&expected).unwrap();
    ctx.ensure_type_declared(&expected).unwrap();

    let impostor = Arc::new(TypeDescriptor::new("Impostor"));
    let err = ctx.ensure_type_declared(&impostor).unwrap_err();
    assert_eq!(err.code(), error_codes::TYPE_MISMATCH);

    let not_loadable = Arc::new(TypeDescriptor::new("Nowhere").with_autoload(false));
    let err = ctx.ensure_type_declared(&not_loadable).unwrap_err();
    assert_eq!(err.code(), error_codes::TYPE_NOT_FOUND);
}

// ============================================================================
// Constants
// ============================================================================

#[test]
fn test_constant_redefinition_is_a_warning() {
    let sink = MemoryDiagnosticSink::new();
    let mut ctx = RunContext::builder(Application::builder().build())
        .diagnostics(sink.clone())
        .build();

    assert!(ctx.declare_constant(ConstantEntry::new("VERSION", "1.0")));
    assert!(!ctx.declare_constant(ConstantEntry::new("VERSION", "2.0")));

    assert_eq!(ctx.constants().value("VERSION"), Some(&Value::from("1.0")));
    let diags = sink.entries();
    assert_eq!(diags.len(), 1);
    assert!(!diags[0].is_error());
    assert_eq!(diags[0].code, error_codes::CONSTANT_REDEFINED);
}

#[test]
fn test_application_constants_visible_and_fixed() {
    let app = Application::builder()
        .declare_constant(ConstantEntry::case_insensitive("PHP_EOL", "\n"))
        .build();
    let mut ctx = RunContext::new(app);

    assert_eq!(ctx.constants().value("php_eol"), Some(&Value::from("\n")));
    assert!(!ctx.declare_constant(ConstantEntry::new("PHP_EOL", "\r\n")));
    assert_eq!(ctx.constants().value("PHP_EOL"), Some(&Value::from("\n")));
}

#[test]
fn test_server_api_defined_per_run() {
    let ctx = empty_ctx();
    assert_eq!(ctx.constants().value("SERVER_API"), Some(&Value::from("cli")));
    assert!(ctx.constants().value("server_api").is_none());
}
