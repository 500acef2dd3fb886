//! Per-run execution context
//!
//! A [`RunContext`] owns everything one execution of a program needs:
//! the run's function, type and constant registries (layered over the shared
//! [`Application`]), the set of scripts included so far, the global variable
//! scope, and the resources released at teardown.
//!
//! Teardown runs exactly once, either through [`RunContext::dispose`] or when
//! the context is dropped:
//! 1. shutdown callbacks, in registration order
//! 2. registered disposables
//! 3. the hosted session, closed without persisting
//! 4. buffered output, flushed
//! 5. temporary files, deleted even if an earlier step panicked
//! 6. the context is marked disposed

use crate::application::Application;
use crate::descriptor::{CompiledUnit, ConstantEntry, DescriptorTag, FunctionDescriptor, TypeDescriptor};
use crate::diagnostic::{error_codes, Diagnostic, DiagnosticLevel, DiagnosticSink, NullDiagnosticSink};
use crate::host::{BufferedHost, FsStreamLayer, HostHooks, StreamLayer};
use crate::inclusion::{split_scheme, InclusionResolver};
use crate::options::RuntimeOptions;
use crate::registry::types::TypeRef;
use crate::registry::{ConstantRegistry, DeclareOutcome, RoutineRegistry, ScriptRegistry, TypeRegistry};
use crate::value::{Locals, RuntimeError, Value};
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, trace, warn};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, nothing executed yet
    Created,
    /// At least one script has started executing
    Running,
    /// Teardown in progress
    ShuttingDown,
    /// Torn down; every further registration is ignored
    Disposed,
}

/// Callback invoked when a referenced type is not declared
pub trait AutoloadHook: Send + Sync {
    /// Try to declare `name`, typically by including the script defining it
    fn autoload(&self, ctx: &mut RunContext, name: &str) -> Result<(), RuntimeError>;
}

impl<F> AutoloadHook for F
where
    F: Fn(&mut RunContext, &str) -> Result<(), RuntimeError> + Send + Sync,
{
    fn autoload(&self, ctx: &mut RunContext, name: &str) -> Result<(), RuntimeError> {
        self(ctx, name)
    }
}

/// A per-run resource released at teardown
pub trait Disposable {
    fn dispose(&mut self) -> Result<(), RuntimeError>;
}

/// Handle returned by [`RunContext::register_disposable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisposableId(u64);

/// Callback run during teardown
pub type ShutdownCallback = Box<dyn FnOnce(&mut RunContext) -> Result<(), RuntimeError>>;

/// User handler for errors nothing else caught
pub type ExceptionHandler = Box<dyn FnMut(&mut RunContext, &RuntimeError) -> Result<(), RuntimeError>>;

/// Variables a script reads and writes
enum Vars<'a> {
    /// Caller-owned scope, such as a function's locals
    Local(&'a mut Locals),
    /// The run's global scope, shared by every global inclusion
    Global(Rc<RefCell<Locals>>),
}

impl Vars<'_> {
    fn reborrow(&mut self) -> Vars<'_> {
        match self {
            Vars::Local(locals) => Vars::Local(&mut **locals),
            Vars::Global(globals) => Vars::Global(Rc::clone(globals)),
        }
    }

    fn get(&self, name: &str) -> Option<Value> {
        match self {
            Vars::Local(locals) => locals.get(name).cloned(),
            Vars::Global(globals) => globals.borrow().get(name).cloned(),
        }
    }

    fn with<R>(&mut self, f: impl FnOnce(&mut Locals) -> R) -> R {
        match self {
            Vars::Local(locals) => f(&mut **locals),
            Vars::Global(globals) => f(&mut *globals.borrow_mut()),
        }
    }
}

/// Variables and type context handed to a script's entry point
pub struct Scope<'a> {
    vars: Vars<'a>,
    /// Object the inclusion happened inside of, if any
    pub this: Option<&'a Value>,
    /// Type the inclusion happened inside of, if any
    pub self_type: Option<Arc<TypeDescriptor>>,
    /// The script being executed
    pub unit: Arc<CompiledUnit>,
}

impl<'a> Scope<'a> {
    /// Directory of the executing script, relative to the root
    pub fn current_dir(&self) -> &str {
        self.unit.directory()
    }

    /// Whether the script runs in the run's global scope
    pub fn is_global(&self) -> bool {
        matches!(self.vars, Vars::Global(_))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.with(|locals| locals.insert(name, value));
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.with(|locals| locals.remove(name))
    }

    /// Direct access to the variables for the duration of `f`.
    ///
    /// `f` must not run scripts: the global scope stays borrowed until it returns.
    pub fn with_locals<R>(&mut self, f: impl FnOnce(&mut Locals) -> R) -> R {
        self.vars.with(f)
    }

    /// Inclusion from inside this script, sharing its variables and context
    pub fn include<'s>(&'s mut self, path: &'s str) -> IncludeRequest<'s> {
        IncludeRequest {
            current_dir: Some(self.unit.directory()),
            path,
            vars: self.vars.reborrow(),
            this: self.this,
            self_type: self.self_type.clone(),
            once: false,
            throw_on_error: false,
        }
    }
}

/// Arguments of an `include`/`require` operation
pub struct IncludeRequest<'a> {
    /// Directory of the including script; `None` skips that lookup step
    pub current_dir: Option<&'a str>,
    pub path: &'a str,
    vars: Vars<'a>,
    pub this: Option<&'a Value>,
    pub self_type: Option<Arc<TypeDescriptor>>,
    /// Skip execution if the unit was already included this run
    pub once: bool,
    /// "require" semantics: a missing script is fatal
    pub throw_on_error: bool,
}

impl<'a> IncludeRequest<'a> {
    pub fn new(path: &'a str, locals: &'a mut Locals) -> Self {
        Self {
            current_dir: None,
            path,
            vars: Vars::Local(locals),
            this: None,
            self_type: None,
            once: false,
            throw_on_error: false,
        }
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn require(mut self) -> Self {
        self.throw_on_error = true;
        self
    }

    pub fn from_dir(mut self, dir: &'a str) -> Self {
        self.current_dir = Some(dir);
        self
    }

    pub fn with_this(mut self, this: &'a Value) -> Self {
        self.this = Some(this);
        self
    }

    pub fn with_self_type(mut self, ty: Arc<TypeDescriptor>) -> Self {
        self.self_type = Some(ty);
        self
    }
}

/// Builder for [`RunContext`]
pub struct RunContextBuilder {
    app: Arc<Application>,
    options: RuntimeOptions,
    host: Arc<dyn HostHooks>,
    streams: Arc<dyn StreamLayer>,
    autoload: Option<Arc<dyn AutoloadHook>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    args: Option<Vec<String>>,
}

impl RunContextBuilder {
    pub fn new(app: Arc<Application>) -> Self {
        Self {
            app,
            options: RuntimeOptions::default(),
            host: Arc::new(BufferedHost::new()),
            streams: Arc::new(FsStreamLayer),
            autoload: None,
            diagnostics: Arc::new(NullDiagnosticSink),
            args: None,
        }
    }

    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn host(mut self, host: impl HostHooks + 'static) -> Self {
        self.host = Arc::new(host);
        self
    }

    pub fn stream_layer(mut self, streams: impl StreamLayer + 'static) -> Self {
        self.streams = Arc::new(streams);
        self
    }

    pub fn autoload(mut self, hook: impl AutoloadHook + 'static) -> Self {
        self.autoload = Some(Arc::new(hook));
        self
    }

    pub fn diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Arc::new(sink);
        self
    }

    /// Command-line arguments, exposed as the `argv`/`argc` globals
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> RunContext {
        let resolver = InclusionResolver::new(
            &self.options.root,
            &self.options.include_paths,
            &self.options.working_dir,
        );

        let mut ctx = RunContext {
            routines: RoutineRegistry::new(self.app.routines().clone()),
            types: TypeRegistry::new(self.app.types().clone()),
            constants: ConstantRegistry::new(self.app.constants().clone()),
            scripts: ScriptRegistry::new(self.app.scripts().clone()),
            app: self.app,
            resolver,
            options: self.options,
            host: self.host,
            streams: self.streams,
            autoload: self.autoload,
            diagnostics: self.diagnostics,
            globals: Rc::default(),
            shutdown_callbacks: VecDeque::new(),
            disposables: BTreeMap::new(),
            next_disposable: 0,
            temporary_files: HashSet::new(),
            exception_handler: None,
            state: LifecycleState::Created,
        };

        let server_api = ctx.options.server_api.clone();
        ctx.declare_constant(ConstantEntry::new("SERVER_API", server_api));

        if let Some(args) = self.args {
            let argc = args.len() as i64;
            let argv: Vec<Value> = args.into_iter().map(Value::from).collect();
            let mut globals = ctx.globals.borrow_mut();
            globals.insert("argv", Value::from(argv));
            globals.insert("argc", Value::Int(argc));
        }

        debug!(
            root = %ctx.options.root.display(),
            server_api = %ctx.options.server_api,
            "run context created"
        );
        ctx
    }
}

/// Runtime state of one execution
pub struct RunContext {
    app: Arc<Application>,
    routines: RoutineRegistry,
    types: TypeRegistry,
    constants: ConstantRegistry,
    scripts: ScriptRegistry,
    resolver: InclusionResolver,
    options: RuntimeOptions,
    host: Arc<dyn HostHooks>,
    streams: Arc<dyn StreamLayer>,
    autoload: Option<Arc<dyn AutoloadHook>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    globals: Rc<RefCell<Locals>>,
    shutdown_callbacks: VecDeque<ShutdownCallback>,
    disposables: BTreeMap<DisposableId, Box<dyn Disposable>>,
    next_disposable: u64,
    temporary_files: HashSet<PathBuf>,
    exception_handler: Option<ExceptionHandler>,
    state: LifecycleState,
}

impl RunContext {
    /// Context with default options and an in-memory host
    pub fn new(app: Arc<Application>) -> Self {
        RunContextBuilder::new(app).build()
    }

    pub fn builder(app: Arc<Application>) -> RunContextBuilder {
        RunContextBuilder::new(app)
    }

    // === Accessors ===

    pub fn application(&self) -> &Arc<Application> {
        &self.app
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn routines(&self) -> &RoutineRegistry {
        &self.routines
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn constants(&self) -> &ConstantRegistry {
        &self.constants
    }

    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    pub fn resolver(&self) -> &InclusionResolver {
        &self.resolver
    }

    pub fn host(&self) -> &Arc<dyn HostHooks> {
        &self.host
    }

    /// The run's global variables.
    ///
    /// Release the guard before running scripts; global inclusions borrow
    /// the same scope.
    pub fn globals(&self) -> Ref<'_, Locals> {
        self.globals.borrow()
    }

    pub fn globals_mut(&mut self) -> RefMut<'_, Locals> {
        self.globals.borrow_mut()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.state == LifecycleState::Disposed
    }

    /// Report a diagnostic to the run's sink
    pub fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.level {
            DiagnosticLevel::Error => error!(code = %diagnostic.code, "{}", diagnostic.message),
            DiagnosticLevel::Warning => warn!(code = %diagnostic.code, "{}", diagnostic.message),
        }
        self.diagnostics.report(diagnostic);
    }

    fn enter_running(&mut self) {
        if self.state == LifecycleState::Created {
            debug!("run started");
            self.state = LifecycleState::Running;
        }
    }

    // === Declarations ===

    /// Declare a function for the rest of the run
    pub fn declare_function(&mut self, function: Arc<FunctionDescriptor>) -> Result<(), RuntimeError> {
        if self.is_disposed() {
            return Ok(());
        }
        debug!(function = function.name(), "declare function");
        self.routines.declare(function)
    }

    /// Whether the routine at `index` is still the one a call site cached
    pub fn check_function_declared(&self, index: usize, expected: DescriptorTag) -> bool {
        self.routines
            .lookup_by_index(index)
            .is_some_and(|f| f.tag() == expected)
    }

    /// Fail unless this exact function is declared
    pub fn assert_function_declared(&self, function: &FunctionDescriptor) -> Result<(), RuntimeError> {
        if self.routines.is_declared(function) {
            Ok(())
        } else {
            Err(RuntimeError::FunctionNotFound {
                name: function.name().to_string(),
            })
        }
    }

    pub fn declare_type(&mut self, ty: Arc<TypeDescriptor>) -> Result<(), RuntimeError> {
        if self.is_disposed() {
            return Ok(());
        }
        debug!(type_name = ty.name(), "declare type");
        self.types.declare(ty)
    }

    pub fn declare_type_alias(&mut self, ty: Arc<TypeDescriptor>, alias: &str) -> Result<(), RuntimeError> {
        if self.is_disposed() {
            return Ok(());
        }
        debug!(type_name = ty.name(), alias, "declare type alias");
        self.types.declare_alias(ty, alias)
    }

    /// Define a constant. Returns `true` if it was newly defined.
    ///
    /// A redefinition with a different value keeps the old value and reports
    /// a warning.
    pub fn declare_constant(&mut self, constant: ConstantEntry) -> bool {
        if self.is_disposed() {
            return false;
        }
        let name = constant.name().to_string();
        match self.constants.declare(constant) {
            DeclareOutcome::Declared => true,
            DeclareOutcome::Unchanged => false,
            DeclareOutcome::Conflict { existing } => {
                self.report(
                    Diagnostic::warning_with_code(
                        error_codes::CONSTANT_REDEFINED,
                        format!("Constant {} already defined", name),
                    )
                    .with_note(format!("current value: {}", existing)),
                );
                false
            }
        }
    }

    // === Type resolution ===

    /// Resolve a type name as written at a use site.
    ///
    /// `self` and `parent` resolve against `caller`; `static` is left to the
    /// caller's dispatch. Other names are looked up, running the autoload
    /// hook once if `autoload` is set and the name is unknown.
    pub fn resolve_type(
        &mut self,
        name: &str,
        caller: Option<&Arc<TypeDescriptor>>,
        autoload: bool,
    ) -> Result<Option<Arc<TypeDescriptor>>, RuntimeError> {
        match TypeRef::parse(name) {
            TypeRef::SelfType => Ok(caller.cloned()),
            TypeRef::Parent => Ok(caller.and_then(|t| t.base())),
            TypeRef::Static => Err(RuntimeError::LateStaticBinding),
            TypeRef::Named(name) => self.lookup_type(name, autoload),
        }
    }

    /// Like [`resolve_type`](Self::resolve_type), failing if the type is not found
    pub fn resolve_type_or_err(
        &mut self,
        name: &str,
        caller: Option<&Arc<TypeDescriptor>>,
        autoload: bool,
    ) -> Result<Arc<TypeDescriptor>, RuntimeError> {
        self.resolve_type(name, caller, autoload)?
            .ok_or_else(|| RuntimeError::TypeNotFound {
                name: name.to_string(),
            })
    }

    /// Make sure `ty` is the type declared under its name, autoloading if allowed
    pub fn ensure_type_declared(&mut self, ty: &Arc<TypeDescriptor>) -> Result<(), RuntimeError> {
        if self.types.is_declared(ty) {
            return Ok(());
        }
        match self.lookup_type(ty.name(), ty.is_autoload_eligible())? {
            Some(found) if found.is_same(ty) => Ok(()),
            Some(_) => Err(RuntimeError::TypeMismatch {
                name: ty.name().to_string(),
            }),
            None => Err(RuntimeError::TypeNotFound {
                name: ty.name().to_string(),
            }),
        }
    }

    fn lookup_type(&mut self, name: &str, autoload: bool) -> Result<Option<Arc<TypeDescriptor>>, RuntimeError> {
        if let Some(found) = self.types.lookup(name) {
            return Ok(Some(found));
        }
        if !autoload || self.is_disposed() {
            return Ok(None);
        }
        let Some(hook) = self.autoload.clone() else {
            return Ok(None);
        };

        trace!(type_name = name, "autoload");
        hook.autoload(self, name)?;
        Ok(self.types.lookup(name))
    }

    // === Inclusion ===

    /// Resolve an inclusion path to a compiled unit
    pub fn resolve_script(&self, path: &str, current_dir: Option<&str>) -> Option<Arc<CompiledUnit>> {
        if let Some((scheme, rest)) = split_scheme(path) {
            let handler = self.app.scheme_handler(scheme)?.clone();
            return handler.resolve_script(self, current_dir, rest);
        }
        self.resolver.resolve(self.app.scripts(), path, current_dir)
    }

    /// Include a script.
    ///
    /// Returns the script's result, `true` when a once-inclusion was skipped,
    /// and for an unresolved path either the raw file's content written to
    /// the output (`null`), `false` with a warning, or under require
    /// semantics a [`RuntimeError::ScriptNotFound`].
    pub fn include(&mut self, request: IncludeRequest<'_>) -> Result<Value, RuntimeError> {
        if self.is_disposed() {
            return Ok(Value::Null);
        }

        let Some(unit) = self.resolve_script(request.path, request.current_dir) else {
            return self.include_missing(request.path, request.current_dir, request.throw_on_error);
        };

        if request.once && self.scripts.is_included_this_run(&unit) {
            trace!(script = unit.path(), "already included");
            return Ok(Value::Bool(true));
        }

        let mut scope = Scope {
            vars: request.vars,
            this: request.this,
            self_type: request.self_type,
            unit: unit.clone(),
        };
        self.execute(&unit, &mut scope)
    }

    /// Include a script in the run's global scope.
    ///
    /// Nested global inclusions, such as an autoload from inside the main
    /// script, all see the same variables.
    pub fn include_global(&mut self, path: &str, once: bool, throw_on_error: bool) -> Result<Value, RuntimeError> {
        let request = IncludeRequest {
            current_dir: None,
            path,
            vars: Vars::Global(Rc::clone(&self.globals)),
            this: None,
            self_type: None,
            once,
            throw_on_error,
        };
        self.include(request)
    }

    /// Run the entry script of the program.
    ///
    /// An error escaping the script is offered to the exception handler; if
    /// one handled it, the result is `null`.
    pub fn run_main(&mut self, path: &str) -> Result<Value, RuntimeError> {
        debug!(script = path, "run main");
        match self.include_global(path, true, true) {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.on_unhandled_error(&err)? {
                    Ok(Value::Null)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// `true` if `unit` has not been included yet this run
    pub fn check_include_once(&self, unit: &CompiledUnit) -> bool {
        !self.scripts.is_included_this_run(unit)
    }

    /// Record that `unit` started executing
    pub fn on_include(&mut self, unit: &CompiledUnit) {
        if !self.is_disposed() {
            self.scripts.mark_included_this_run(unit);
        }
    }

    fn execute(&mut self, unit: &Arc<CompiledUnit>, scope: &mut Scope<'_>) -> Result<Value, RuntimeError> {
        self.enter_running();
        self.on_include(unit);
        debug!(script = unit.path(), "include");
        unit.evaluate(self, scope)
    }

    fn include_missing(
        &mut self,
        path: &str,
        current_dir: Option<&str>,
        throw_on_error: bool,
    ) -> Result<Value, RuntimeError> {
        let physical = self.resolver.physical_path(path, current_dir);
        if let Ok(content) = self.streams.read_file(&physical) {
            debug!(file = %physical.display(), "include raw file");
            self.host.write_output(&content)?;
            return Ok(Value::Null);
        }

        if throw_on_error {
            let err = RuntimeError::ScriptNotFound {
                path: path.to_string(),
            };
            self.report(err.to_diagnostic().with_file(path));
            return Err(err);
        }

        self.report(
            Diagnostic::warning_with_code(
                error_codes::SCRIPT_INCLUSION_FAILED,
                format!("Failed opening '{}' for inclusion", path),
            )
            .with_file(path),
        );
        Ok(Value::Bool(false))
    }

    // === Resources ===

    /// Run `callback` at teardown, after previously registered callbacks
    pub fn register_shutdown_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut RunContext) -> Result<(), RuntimeError> + 'static,
    {
        if self.is_disposed() {
            return;
        }
        self.shutdown_callbacks.push_back(Box::new(callback));
    }

    /// Dispose `resource` at teardown. Returns `None` once disposed.
    pub fn register_disposable(&mut self, resource: impl Disposable + 'static) -> Option<DisposableId> {
        if self.is_disposed() {
            return None;
        }
        let id = DisposableId(self.next_disposable);
        self.next_disposable += 1;
        self.disposables.insert(id, Box::new(resource));
        Some(id)
    }

    /// Take a resource back without disposing it
    pub fn unregister_disposable(&mut self, id: DisposableId) -> Option<Box<dyn Disposable>> {
        self.disposables.remove(&id)
    }

    /// Delete `path` at teardown. Returns `false` if already registered or disposed.
    pub fn add_temporary_file(&mut self, path: impl Into<PathBuf>) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.temporary_files.insert(path.into())
    }

    /// Stop tracking `path`; the file itself is left alone
    pub fn remove_temporary_file(&mut self, path: &Path) -> bool {
        self.temporary_files.remove(path)
    }

    pub fn is_temporary_file(&self, path: &Path) -> bool {
        self.temporary_files.contains(path)
    }

    // === Errors ===

    /// Install a handler for errors nothing else caught; returns the previous one
    pub fn set_exception_handler<F>(&mut self, handler: F) -> Option<ExceptionHandler>
    where
        F: FnMut(&mut RunContext, &RuntimeError) -> Result<(), RuntimeError> + 'static,
    {
        self.exception_handler.replace(Box::new(handler))
    }

    pub fn clear_exception_handler(&mut self) -> Option<ExceptionHandler> {
        self.exception_handler.take()
    }

    /// Offer `err` to the exception handler. Returns whether one was installed.
    pub fn on_unhandled_error(&mut self, err: &RuntimeError) -> Result<bool, RuntimeError> {
        let Some(mut handler) = self.exception_handler.take() else {
            return Ok(false);
        };
        let result = handler(self, err);
        // the handler may have installed a replacement
        if self.exception_handler.is_none() {
            self.exception_handler = Some(handler);
        }
        result.map(|_| true)
    }

    // === Teardown ===

    /// Tear the run down. Later calls do nothing.
    pub fn dispose(&mut self) {
        self.teardown(false);
    }

    fn teardown(&mut self, swallow_panics: bool) {
        if matches!(self.state, LifecycleState::ShuttingDown | LifecycleState::Disposed) {
            return;
        }
        debug!("run teardown");
        self.state = LifecycleState::ShuttingDown;

        let mut panicked = None;
        self.release_resources(&mut panicked);
        self.delete_temporary_files(&mut panicked);
        self.state = LifecycleState::Disposed;
        debug!("run disposed");

        if let Some(payload) = panicked {
            if !swallow_panics {
                panic::resume_unwind(payload);
            }
        }
    }

    /// Teardown steps 1 to 4. Every callback, disposal and host hook runs
    /// even if an earlier one failed or panicked.
    fn release_resources(&mut self, panicked: &mut Option<PanicPayload>) {
        while let Some(callback) = self.shutdown_callbacks.pop_front() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(self)));
            self.settle_step("shutdown callback", outcome, panicked);
        }

        let disposables = std::mem::take(&mut self.disposables);
        for (_, mut resource) in disposables {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| resource.dispose()));
            self.settle_step("dispose", outcome, panicked);
        }

        let host = Arc::clone(&self.host);
        match panic::catch_unwind(AssertUnwindSafe(|| host.close_session_if_active())) {
            Ok(Ok(true)) => debug!("session closed"),
            outcome => self.settle_step("close session", outcome.map(|r| r.map(|_| ())), panicked),
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| host.flush_output()));
        self.settle_step("flush output", outcome, panicked);
    }

    fn delete_temporary_files(&mut self, panicked: &mut Option<PanicPayload>) {
        let streams = Arc::clone(&self.streams);
        for path in std::mem::take(&mut self.temporary_files) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match streams.remove_file(&path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                result => result.map_err(RuntimeError::from),
            }));
            trace!(file = %path.display(), "delete temporary file");
            self.settle_step(&format!("delete {}", path.display()), outcome, panicked);
        }
    }

    /// Report a failed teardown step and keep the first panic for re-raising
    fn settle_step(
        &self,
        step: &str,
        outcome: thread::Result<Result<(), RuntimeError>>,
        panicked: &mut Option<PanicPayload>,
    ) {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.teardown_failed(step, &err),
            Err(payload) => {
                self.teardown_failed(step, &format!("panicked: {}", panic_message(&*payload)));
                if panicked.is_none() {
                    *panicked = Some(payload);
                }
            }
        }
    }

    fn teardown_failed(&self, step: &str, err: &dyn fmt::Display) {
        self.report(Diagnostic::warning_with_code(
            error_codes::TEARDOWN_STEP_FAILED,
            format!("{}: {}", step, err),
        ));
    }
}

type PanicPayload = Box<dyn Any + Send + 'static>;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.teardown(std::thread::panicking());
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("routines", &self.routines.len())
            .field("types", &self.types.len())
            .field("constants", &self.constants.len())
            .field("shutdown_callbacks", &self.shutdown_callbacks.len())
            .field("disposables", &self.disposables.len())
            .field("temporary_files", &self.temporary_files.len())
            .finish()
    }
}
