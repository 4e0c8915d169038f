use fnv::FnvHashMap;
use log::{trace, warn};
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::io::{stderr, stdout, Write};
use std::rc::Rc;
use super::gc::{GC_DEFAULT_TRIGGER_LIMIT, Heap};
use super::val::{Payload, Val};

//-------------------------------------------------------------------------------------------------
// output macros
//-------------------------------------------------------------------------------------------------

/**
Prints to an [`Engine`](struct.Engine.html)'s current `pr_writer`.

The first argument is an `&Engine`; the rest follows the syntax of `print!`.

The `pr_writer` defaults to `Stdout`.
*/

#[macro_export]
macro_rules! pr {
	($engine:expr, $($arg:tt)*) => (
		{
			use std::io::Write;
			let mut writer = $engine.pr_writer();
			write!(writer, $($arg)*).ok();
			writer.flush().ok();
		}
	);
}

/**
Prints to an [`Engine`](struct.Engine.html)'s current `pr_writer`, with a trailing `'\n'`.
*/

#[macro_export]
macro_rules! prn {
	($engine:expr, $($arg:tt)*) => (
		{
			use std::io::Write;
			writeln!($engine.pr_writer(), $($arg)*).ok();
		}
	);
}

/**
Prints to an [`Engine`](struct.Engine.html)'s current `epr_writer`.

The `epr_writer` defaults to `Stderr`.
*/

#[macro_export]
macro_rules! epr {
	($engine:expr, $($arg:tt)*) => (
		{
			use std::io::Write;
			let mut writer = $engine.epr_writer();
			write!(writer, $($arg)*).ok();
			writer.flush().ok();
		}
	);
}

/**
Prints to an [`Engine`](struct.Engine.html)'s current `epr_writer`, with a trailing `'\n'`.
*/

#[macro_export]
macro_rules! eprn {
	($engine:expr, $($arg:tt)*) => (
		{
			use std::io::Write;
			writeln!($engine.epr_writer(), $($arg)*).ok();
		}
	);
}

//-------------------------------------------------------------------------------------------------
// Guard
//-------------------------------------------------------------------------------------------------

//some engine state has to be restored even when an evaluation exits early, or when a native
//function panics. Guard runs an arbitrary closure when it's dropped.
pub(crate) struct Guard<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Guard<F> {
	pub(crate) fn new(f: F) -> Guard<F> {
		Guard(Some(f))
	}
}

impl<F: FnOnce()> Drop for Guard<F> {
	fn drop(&mut self) {
		if let Some(f) = self.0.take() {
			f()
		}
	}
}

//-------------------------------------------------------------------------------------------------
// Sym, SymTable
//-------------------------------------------------------------------------------------------------

/**
An interned symbol name.

Symbols are interned per-[`Engine`](struct.Engine.html), so a `Sym` is only meaningful to the
engine which produced it. Symbol *values* are separate heap values which carry a `Sym`.
*/

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Sym(pub(crate) u32);

#[derive(Default)]
struct SymTable {
	names: Vec<Rc<str>>,
	map: FnvHashMap<Rc<str>, Sym>
}

impl SymTable {
	fn intern(&mut self, name: &str) -> Sym {
		if let Some(&sym) = self.map.get(name) {
			return sym
		}

		let sym = Sym(self.names.len() as u32);
		let name: Rc<str> = name.into();
		self.names.push(Rc::clone(&name));
		self.map.insert(name, sym);
		sym
	}
}

//-------------------------------------------------------------------------------------------------
// Native
//-------------------------------------------------------------------------------------------------

/**
The entry point of a native function or special form.

It receives the engine, the argument vector (already evaluated for a builtin; the raw argument
forms for a special form) and the calling environment. It must return a value: errors are
reported by returning an error value.

The argument vector and environment are rooted by the caller. Anything else the entry point
allocates must be rooted before it allocates again.
*/

pub type NativeFn = Rc<dyn Fn(&Engine, Val, Val) -> Val>;

///The payload of a builtin or special-form value.
#[derive(Clone)]
pub struct Native {
	pub name: Rc<str>,
	pub arity: usize,
	pub(crate) entry: NativeFn
}

impl Native {
	pub fn new<F>(name: &str, arity: usize, entry: F) -> Native
	where
		F: Fn(&Engine, Val, Val) -> Val + 'static
	{
		Native {
			name: name.into(),
			arity,
			entry: Rc::new(entry)
		}
	}
}

impl Debug for Native {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "Native({})", self.name)
	}
}

//-------------------------------------------------------------------------------------------------
// EngineBuilder
//-------------------------------------------------------------------------------------------------

/**
Configuration options for constructing an [`Engine`](struct.Engine.html).
*/

pub struct EngineBuilder {
	gc_trigger_limit: usize,
	prevent_gc: bool,
	debug: bool,
	pr_writer: Option<Box<dyn Write>>,
	epr_writer: Option<Box<dyn Write>>
}

impl EngineBuilder {
	pub fn new() -> EngineBuilder {
		EngineBuilder {
			gc_trigger_limit: GC_DEFAULT_TRIGGER_LIMIT,
			prevent_gc: false,
			debug: false,
			pr_writer: None,
			epr_writer: None
		}
	}

	///The number of allocations between automatic collections. Defaults to 1024.
	pub fn gc_trigger_limit(self, gc_trigger_limit: usize) -> EngineBuilder {
		EngineBuilder { gc_trigger_limit, ..self }
	}

	///When true, allocation never triggers a collection. Defaults to `false`.
	pub fn prevent_gc(self, prevent_gc: bool) -> EngineBuilder {
		EngineBuilder { prevent_gc, ..self }
	}

	///When true, every evaluated form is traced to the `epr_writer`. Defaults to `false`.
	pub fn debug(self, debug: bool) -> EngineBuilder {
		EngineBuilder { debug, ..self }
	}

	pub fn pr_writer(self, writer: Box<dyn Write>) -> EngineBuilder {
		EngineBuilder { pr_writer: Some(writer), ..self }
	}

	pub fn epr_writer(self, writer: Box<dyn Write>) -> EngineBuilder {
		EngineBuilder { epr_writer: Some(writer), ..self }
	}

	pub fn build(self) -> Engine {
		Engine::with_settings(self)
	}
}

impl Default for EngineBuilder {
	fn default() -> EngineBuilder {
		EngineBuilder::new()
	}
}

//-------------------------------------------------------------------------------------------------
// Engine
//-------------------------------------------------------------------------------------------------

pub(crate) struct Constants {
	pub(crate) nil: Val,
	pub(crate) true_val: Val,
	pub(crate) false_val: Val
}

/**
A complete, isolated Dern runtime core: the heap and its root stack, the symbol table, the
global environment and the evaluator state.

Any number of `Engines` can coexist. Values, symbols and roots belong to a single engine and
must not be passed to another.
*/

pub struct Engine {
	pub(crate) heap: Heap,
	syms: RefCell<SymTable>,
	pub(crate) constants: Constants,
	global_env: Val,

	pub(crate) function_return: Cell<Option<Val>>,
	pub(crate) eval_depth: Cell<usize>,
	pub(crate) debug: Cell<bool>,
	quit: Cell<bool>,
	exit_code: Cell<i32>,

	libraries: RefCell<Vec<(String, Val)>>,
	command_line_args: RefCell<Vec<String>>,
	environment_vars: RefCell<Vec<String>>,

	pr_writer: RefCell<Box<dyn Write>>,
	epr_writer: RefCell<Box<dyn Write>>
}

impl Engine {
	pub fn new() -> Engine {
		EngineBuilder::new().build()
	}

	fn with_settings(builder: EngineBuilder) -> Engine {
		let heap = Heap::new(builder.gc_trigger_limit, builder.prevent_gc);
		let mut syms = SymTable::default();

		//the initial values are registered directly, so that they can't trigger a collection
		//before they're reachable
		let constants = Constants {
			nil: heap.insert(Payload::Nil),
			true_val: heap.insert(Payload::Boolean(true)),
			false_val: heap.insert(Payload::Boolean(false))
		};

		let global_env = heap.insert(Payload::Environment(super::env::Env::new(None)));

		let globals = [
			("nil", constants.nil, "Represents missing value."),
			("true", constants.true_val, "Boolean true value. Opposite of false."),
			("false", constants.false_val, "Boolean false value. Opposite of true.")
		];

		for &(name, val, doc) in &globals {
			let sym = syms.intern(name);
			let sym_val = heap.insert(Payload::Symbol(sym));
			let doc_val = heap.insert(Payload::Str(doc.to_string()));
			heap.get_mut(val, |obj| obj.doc = Some(doc_val));
			heap.get_mut(global_env, |obj| {
				if let Payload::Environment(ref mut env) = obj.payload {
					env.define(sym, sym_val, val);
				}
			});
		}

		Engine {
			heap,
			syms: RefCell::new(syms),
			constants,
			global_env,

			function_return: Cell::new(None),
			eval_depth: Cell::new(0),
			debug: Cell::new(builder.debug),
			quit: Cell::new(false),
			exit_code: Cell::new(0),

			libraries: RefCell::new(Vec::new()),
			command_line_args: RefCell::new(Vec::new()),
			environment_vars: RefCell::new(Vec::new()),

			pr_writer: RefCell::new(builder.pr_writer.unwrap_or_else(|| Box::new(stdout()))),
			epr_writer: RefCell::new(builder.epr_writer.unwrap_or_else(|| Box::new(stderr())))
		}
	}

	pub fn global_env(&self) -> Val {
		self.global_env
	}

	//everything the collector treats as a root, apart from the root stack itself
	pub(crate) fn extra_roots(&self) -> Vec<Val> {
		let mut roots = vec![
			self.global_env,
			self.constants.nil,
			self.constants.true_val,
			self.constants.false_val
		];

		if let Some(val) = self.function_return.get() {
			roots.push(val);
		}

		roots.extend(self.libraries.borrow().iter().map(|&(_, table)| table));
		roots
	}

	//symbols

	pub fn intern(&self, name: &str) -> Sym {
		self.syms.borrow_mut().intern(name)
	}

	pub fn sym_name(&self, sym: Sym) -> Rc<str> {
		Rc::clone(&self.syms.borrow().names[sym.0 as usize])
	}

	//output

	pub fn pr_writer(&self) -> std::cell::RefMut<Box<dyn Write>> {
		self.pr_writer.borrow_mut()
	}

	pub fn epr_writer(&self) -> std::cell::RefMut<Box<dyn Write>> {
		self.epr_writer.borrow_mut()
	}

	pub fn set_pr_writer(&self, writer: Box<dyn Write>) {
		*self.pr_writer.borrow_mut() = writer;
	}

	pub fn set_epr_writer(&self, writer: Box<dyn Write>) {
		*self.epr_writer.borrow_mut() = writer;
	}

	//configuration

	pub fn debug(&self) -> bool {
		self.debug.get()
	}

	pub fn set_debug(&self, debug: bool) {
		self.debug.set(debug)
	}

	//host-driven shutdown

	/**
	Sets the quit flag. From then on, every evaluation is a no-op which returns `nil`.
	*/
	pub fn quit(&self) {
		self.quit.set(true)
	}

	pub fn is_quit(&self) -> bool {
		self.quit.get()
	}

	pub fn exit_code(&self) -> i32 {
		self.exit_code.get()
	}

	pub fn set_exit_code(&self, code: i32) {
		self.exit_code.set(code)
	}

	//host data made available to programs

	pub fn add_command_line_argument(&self, arg: &str) {
		self.command_line_args.borrow_mut().push(arg.to_string())
	}

	pub fn command_line_arguments(&self) -> Vec<String> {
		self.command_line_args.borrow().clone()
	}

	///Records an environment variable, conventionally as `NAME=value`.
	pub fn add_environment_variable(&self, var: &str) {
		self.environment_vars.borrow_mut().push(var.to_string())
	}

	pub fn environment_variables(&self) -> Vec<String> {
		self.environment_vars.borrow().clone()
	}

	//libraries

	/**
	Registers a named extension table (usually an environment or a hash-map). Everything
	reachable from a registered table survives collection for the lifetime of the engine.

	Registering a second table with the same name replaces the first.
	*/
	pub fn register_library(&self, name: &str, table: Val) {
		let mut libraries = self.libraries.borrow_mut();
		match libraries.iter_mut().find(|(lib_name, _)| lib_name == name) {
			Some(entry) => entry.1 = table,
			None => libraries.push((name.to_string(), table))
		}
		trace!("registered library {}", name);
	}

	pub fn library(&self, name: &str) -> Option<Val> {
		self.libraries.borrow().iter().find(|(lib_name, _)| lib_name == name).map(|&(_, t)| t)
	}

	//native registration

	pub fn new_builtin(&self, native: Native) -> Val {
		self.alloc(Payload::Builtin(native))
	}

	pub fn new_special(&self, native: Native) -> Val {
		self.alloc(Payload::Special(native))
	}

	/**
	Creates a builtin (a native function whose arguments are evaluated before the call) and
	binds it to `name` in `env`.

	`arity` is the number of required arguments, for documentation purposes only; the entry
	point validates its own arguments. Returns `false` if `env` isn't an environment.
	*/
	pub fn register_builtin<F>(
		&self,
		name: &str,
		entry: F,
		arity: usize,
		doc: &str,
		howto_allowed: bool,
		env: Val
	) -> bool
	where
		F: Fn(&Engine, Val, Val) -> Val + 'static
	{
		let _env_root = self.root(env);
		let val = self.new_builtin(Native::new(name, arity, entry));
		self.register_native(name, val, doc, howto_allowed, env)
	}

	/**
	Creates a special form (a native function which receives its argument forms unevaluated)
	and binds it to `name` in `env`.
	*/
	pub fn register_special<F>(
		&self,
		name: &str,
		entry: F,
		arity: usize,
		doc: &str,
		howto_allowed: bool,
		env: Val
	) -> bool
	where
		F: Fn(&Engine, Val, Val) -> Val + 'static
	{
		let _env_root = self.root(env);
		let val = self.new_special(Native::new(name, arity, entry));
		self.register_native(name, val, doc, howto_allowed, env)
	}

	fn register_native(&self, name: &str, val: Val, doc: &str, howto_allowed: bool, env: Val) -> bool {
		let val_root = self.root(val);
		let doc_val = self.new_string(doc);
		self.set_doc(*val_root, Some(doc_val));
		self.set_howto_allowed(*val_root, howto_allowed);

		trace!("registered native {}", name);
		self.env_define_str(env, name, *val_root)
	}
}

impl Default for Engine {
	fn default() -> Engine {
		Engine::new()
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		/*
		a Root guard borrows its Engine, so under ordinary use the root stack is already empty
		here. push_root() without a matching unroot() can leave entries behind; those are
		drained with a warning rather than treated as fatal, because the process is tearing the
		engine down anyway.

		everything else is released by a final collection which treats nothing as a root.
		*/

		let leftover = self.heap.drain_roots();
		if leftover > 0 {
			warn!("{} values were still rooted when their engine was dropped", leftover);
		}

		self.function_return.set(None);
		self.libraries.borrow_mut().clear();
		self.collect_everything();

		if self.heap.live() != 0 {
			fatal!("{} values survived engine teardown", self.heap.live())
		}

		self.pr_writer.borrow_mut().flush().ok();
		self.epr_writer.borrow_mut().flush().ok();
	}
}
