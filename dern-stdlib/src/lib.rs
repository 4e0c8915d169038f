#![forbid(unsafe_code)]

use dern_engine::{bail, ensure, DResult, Engine, EngineBuilder, Escape, Tag, Val};
use log::debug;
use std::io::Write;
use std::ops::Deref;

mod collections;
mod forms;
mod io;
mod misc;
mod num;

/**
The Dern interpreter: an [`Engine`](../dern_engine/struct.Engine.html) with the standard
library installed in its global environment.

`Runtime` dereferences to `Engine`, so every host operation (reading and evaluating source
text, registering natives, rooting values) is called on it directly.

It's possible for multiple `Runtimes` to coexist. Each one is strictly isolated from the
others: they don't share global variables, symbols or values.
*/

//a Runtime is just a thin wrapper for an Engine which has been initialized with the stdlib. the
//engine crate knows nothing about special forms or natives beyond the registration surface.
pub struct Runtime(Engine);

impl Runtime {
	/**
	Construct a `Runtime` with default settings.

	To construct a custom `Runtime`, use [`RuntimeBuilder`](struct.RuntimeBuilder.html)
	instead.
	*/
	pub fn new() -> Runtime {
		RuntimeBuilder::new().build()
	}

	fn with_settings(sandboxed: bool, engine: Engine) -> Runtime {
		if let Err(escape) = init_stdlib(&engine, sandboxed) {
			let message = engine.error_message(escape.into_val()).unwrap_or_default();
			fatal_init(&message)
		}

		debug!("stdlib installed, {} live values", engine.live_values());
		Runtime(engine)
	}

	pub fn engine(&self) -> &Engine {
		&self.0
	}
}

impl Default for Runtime {
	fn default() -> Runtime {
		Runtime::new()
	}
}

impl Deref for Runtime {
	type Target = Engine;

	fn deref(&self) -> &Engine {
		&self.0
	}
}

fn fatal_init(message: &str) -> ! {
	eprintln!("unable to initialize the standard library: {} - aborting process", message);
	std::process::abort()
}

/**
Configuration options for constructing a [`Runtime`](struct.Runtime.html).

Every [`EngineBuilder`](../dern_engine/struct.EngineBuilder.html) option is forwarded, and
[`sandboxed`](#method.sandboxed) is added.
*/
pub struct RuntimeBuilder {
	sandboxed: bool,
	engine_builder: EngineBuilder
}

impl RuntimeBuilder {
	pub fn new() -> RuntimeBuilder {
		RuntimeBuilder {
			sandboxed: false,
			engine_builder: EngineBuilder::new()
		}
	}

	/**
	Sets the `sandboxed` configuration option, which defaults to `false`.

	When `sandboxed` is `true`, the natives which touch the file system (`input-file-open`,
	`output-file-open` and `read-and-eval-path`) are not defined. The host can still call
	[`Engine::read_and_eval_path`](../dern_engine/struct.Engine.html#method.read_and_eval_path)
	itself.
	*/
	pub fn sandboxed(self, sandboxed: bool) -> RuntimeBuilder {
		RuntimeBuilder {
			sandboxed,
			..self
		}
	}

	pub fn gc_trigger_limit(self, limit: usize) -> RuntimeBuilder {
		RuntimeBuilder {
			engine_builder: self.engine_builder.gc_trigger_limit(limit),
			..self
		}
	}

	pub fn prevent_gc(self, prevent_gc: bool) -> RuntimeBuilder {
		RuntimeBuilder {
			engine_builder: self.engine_builder.prevent_gc(prevent_gc),
			..self
		}
	}

	pub fn debug(self, debug: bool) -> RuntimeBuilder {
		RuntimeBuilder {
			engine_builder: self.engine_builder.debug(debug),
			..self
		}
	}

	pub fn pr_writer(self, writer: Box<dyn Write>) -> RuntimeBuilder {
		RuntimeBuilder {
			engine_builder: self.engine_builder.pr_writer(writer),
			..self
		}
	}

	pub fn epr_writer(self, writer: Box<dyn Write>) -> RuntimeBuilder {
		RuntimeBuilder {
			engine_builder: self.engine_builder.epr_writer(writer),
			..self
		}
	}

	///Construct a `Runtime` with these settings.
	pub fn build(self) -> Runtime {
		Runtime::with_settings(self.sandboxed, self.engine_builder.build())
	}
}

impl Default for RuntimeBuilder {
	fn default() -> RuntimeBuilder {
		RuntimeBuilder::new()
	}
}

/**
Installs the standard library into `engine`'s global environment.

`Runtime` calls this for you. It's public so that a host which builds its own `Engine` can
still opt into the standard library.
*/
pub fn init_stdlib(engine: &Engine, sandboxed: bool) -> DResult<()> {
	forms::init(engine, sandboxed)?;
	num::init(engine, sandboxed)?;
	collections::init(engine, sandboxed)?;
	misc::init(engine, sandboxed)?;
	io::init(engine, sandboxed)?;

	Ok(())
}

//-------------------------------------------------------------------------------------------------
// binding
//-------------------------------------------------------------------------------------------------

/*
every native in the stdlib is written as an `Entry`, which returns a DResult so that it can use
`?` on nested evaluations. the wrapper converts the result back into the Val that the engine's
registration surface expects: an Escape::Error becomes its error value, and an Escape::Return
becomes its returned value, leaving the engine's function-return slot set so that the evaluator
keeps unwinding.
*/

pub(crate) type Entry = fn(&Engine, Val, Val) -> DResult<Val>;

pub(crate) fn bind_builtin(
	engine: &Engine,
	name: &str,
	entry: Entry,
	arity: usize,
	doc: &str
) -> DResult<()> {
	let bound = engine.register_builtin(name, move |engine, args, env| {
		entry(engine, args, env).unwrap_or_else(Escape::into_val)
	}, arity, doc, true, engine.global_env());

	ensure!(engine, bound, "unable to bind the builtin '{}'", name);
	Ok(())
}

pub(crate) fn bind_special(
	engine: &Engine,
	name: &str,
	entry: Entry,
	arity: usize,
	doc: &str
) -> DResult<()> {
	let bound = engine.register_special(name, move |engine, args, env| {
		entry(engine, args, env).unwrap_or_else(Escape::into_val)
	}, arity, doc, true, engine.global_env());

	ensure!(engine, bound, "unable to bind the special form '{}'", name);
	Ok(())
}

//-------------------------------------------------------------------------------------------------
// argument helpers
//-------------------------------------------------------------------------------------------------

//the elements of an argument vector. they stay alive for as long as the argument vector, which
//the evaluator roots for the duration of the call.
pub(crate) fn items(engine: &Engine, args: Val) -> Vec<Val> {
	engine.seq_items(args).unwrap_or_default()
}

pub(crate) fn expect_count(
	engine: &Engine,
	kind: &str,
	name: &str,
	items: &[Val],
	expected: usize
) -> DResult<()> {
	ensure!(engine, items.len() == expected, "{} '{}' expects {} {}. {} {} given.",
	        capitalize(kind), name, expected, plural(expected, "argument"), items.len(),
	        if items.len() == 1 { "argument was" } else { "arguments were" });
	Ok(())
}

pub(crate) fn expect_at_least(
	engine: &Engine,
	kind: &str,
	name: &str,
	items: &[Val],
	min: usize
) -> DResult<()> {
	ensure!(engine, items.len() >= min, "{} '{}' expects at least {} {}. {} {} given.",
	        capitalize(kind), name, min, plural(min, "argument"), items.len(),
	        if items.len() == 1 { "argument was" } else { "arguments were" });
	Ok(())
}

pub(crate) fn int_arg(engine: &Engine, name: &str, ordinal: usize, val: Val) -> DResult<i32> {
	match engine.as_integer(val) {
		Some(i) => Ok(i),
		None => bail!(engine, "{} argument to builtin '{}' must be integer. Type '{}' was given.",
		              ordinal_name(ordinal), name, engine.type_name(val))
	}
}

pub(crate) fn str_arg(engine: &Engine, name: &str, ordinal: usize, val: Val) -> DResult<String> {
	match engine.as_str(val) {
		Some(s) => Ok(s),
		None => bail!(engine, "{} argument to builtin '{}' must be string. Type '{}' was given.",
		              ordinal_name(ordinal), name, engine.type_name(val))
	}
}

pub(crate) fn expect_tag(
	engine: &Engine,
	name: &str,
	ordinal: usize,
	val: Val,
	tag: Tag
) -> DResult<()> {
	ensure!(engine, engine.tag(val) == tag, "{} argument to builtin '{}' must be {}. Type '{}' \
	        was given.", ordinal_name(ordinal), name, tag.name(), engine.type_name(val));
	Ok(())
}

pub(crate) fn ordinal_name(ordinal: usize) -> &'static str {
	match ordinal {
		0 => "First",
		1 => "Second",
		2 => "Third",
		3 => "Fourth",
		4 => "Fifth",
		5 => "Sixth",
		6 => "Seventh",
		7 => "Eighth",
		_ => "Later"
	}
}

fn plural(count: usize, noun: &str) -> String {
	if count == 1 {
		noun.to_string()
	} else {
		format!("{}s", noun)
	}
}

fn capitalize(word: &str) -> String {
	let mut chars = word.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new()
	}
}

//numbers are mutable in place (`++`, `+=`), so binding one which appears literally in source
//code would let later mutations rewrite the code itself. bindings receive a fresh number.
pub(crate) fn fresh_binding(engine: &Engine, val: Val) -> DResult<Val> {
	match engine.tag(val) {
		Tag::Integer | Tag::Real => engine.copy(val),
		_ => Ok(val)
	}
}
