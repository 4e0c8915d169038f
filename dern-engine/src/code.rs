use smallvec::SmallVec;
use std::rc::Rc;
use super::engine::{Engine, Sym};
use super::error::DResult;
use super::gc::Visitor;
use super::val::{Payload, Tag, Val};

//-------------------------------------------------------------------------------------------------
// Params
//-------------------------------------------------------------------------------------------------

pub const VARARGS_MARKER: &str = "...";

/**
A closure's formal parameters, validated when the closure is constructed.

The formals vector may contain the marker `...` once. The formal written next to it collects
every remaining actual argument into a single vector: either the one formal which follows the
marker, `(a b ... rest)`, or, when nothing follows it, the one which precedes it,
`(a b rest ...)`.
*/

#[derive(Clone, Debug)]
pub struct Params {
	fixed: SmallVec<[Sym; 4]>,
	rest: Option<Sym>
}

impl Params {
	pub fn required(&self) -> usize {
		self.fixed.len()
	}

	pub fn is_variadic(&self) -> bool {
		self.rest.is_some()
	}
}

//-------------------------------------------------------------------------------------------------
// Closure
//-------------------------------------------------------------------------------------------------

/**
The payload of a function or macro value.

`env` is the environment the closure was created in. Invocations run in a fresh scope whose
enclosing scope is `env`, never the caller's environment.
*/

#[derive(Clone)]
pub struct Closure {
	pub(crate) name: Option<Rc<str>>,
	pub(crate) params: Params,
	pub(crate) formals: Val,
	pub(crate) body: Val,
	pub(crate) env: Val
}

impl Closure {
	pub fn name(&self) -> Option<&str> {
		self.name.as_ref().map(|name| &**name)
	}

	pub fn params(&self) -> &Params {
		&self.params
	}

	pub(crate) fn trace<V: Visitor>(&self, visitor: &mut V) {
		visitor.visit(self.formals);
		visitor.visit(self.body);
		visitor.visit(self.env);
	}
}

//-------------------------------------------------------------------------------------------------
// Engine methods
//-------------------------------------------------------------------------------------------------

impl Engine {
	/**
	Constructs a function. `formals` is a vector of symbols, `body` a vector of forms and `env`
	the environment to capture.

	Malformed formals are reported here, as an error value, rather than when the function is
	called.
	*/
	pub fn new_function(&self, formals: Val, body: Val, env: Val) -> DResult<Val> {
		let params = self.parse_params(formals)?;
		Ok(self.alloc(Payload::Function(Closure { name: None, params, formals, body, env })))
	}

	///Constructs a macro. Its formals follow the same rules as a function's.
	pub fn new_macro(&self, formals: Val, body: Val, env: Val) -> DResult<Val> {
		let params = self.parse_params(formals)?;
		Ok(self.alloc(Payload::Macro(Closure { name: None, params, formals, body, env })))
	}

	pub fn is_closure(&self, val: Val) -> bool {
		matches!(self.tag(val), Tag::Function | Tag::Macro)
	}

	pub(crate) fn closure(&self, val: Val) -> Option<Closure> {
		self.with_payload(val, |payload| match *payload {
			Payload::Function(ref closure) | Payload::Macro(ref closure) => Some(closure.clone()),
			_ => None
		})
	}

	///The name a closure, builtin or special form was given by `define` or at registration.
	pub fn callable_name(&self, val: Val) -> Option<Rc<str>> {
		self.with_payload(val, |payload| match *payload {
			Payload::Function(ref closure) | Payload::Macro(ref closure) => closure.name.clone(),
			Payload::Special(ref native) | Payload::Builtin(ref native) => {
				Some(Rc::clone(&native.name))
			}
			_ => None
		})
	}

	pub fn set_closure_name(&self, val: Val, name: &str) {
		self.with_payload_mut(val, |payload| match *payload {
			Payload::Function(ref mut closure) | Payload::Macro(ref mut closure) => {
				closure.name = Some(name.into())
			}
			_ => ()
		})
	}

	///The formals vector a closure was constructed with.
	pub fn closure_formals(&self, val: Val) -> Option<Val> {
		self.closure(val).map(|closure| closure.formals)
	}

	fn parse_params(&self, formals: Val) -> DResult<Params> {
		let items = match self.seq_items(formals) {
			Some(items) if self.tag(formals) == Tag::Vector => items,
			_ => bail!(self, "Formal arguments must be given as a vector. Now a value of type \
			                  {} was given.", self.type_name(formals))
		};

		let mut before: SmallVec<[Sym; 4]> = SmallVec::new();
		let mut after: SmallVec<[Sym; 4]> = SmallVec::new();
		let mut markers = 0;

		for &item in &items {
			let sym = match self.as_sym(item) {
				Some(sym) => sym,
				None => bail!(self, "Formal arguments must be symbols. Now a value of type {} \
				                     was given.", self.type_name(item))
			};

			if &*self.sym_name(sym) == VARARGS_MARKER {
				markers += 1;
			} else if markers > 0 {
				after.push(sym);
			} else {
				before.push(sym);
			}
		}

		ensure!(self, markers <= 1, "Function can have only one formal ... argument for \
		                             varargs. Now {} were given.", markers);
		ensure!(self, after.len() <= 1, "Function can have at most one formal argument after \
		                                 ... for varargs. Now {} formals were given after ...",
		                                 after.len());

		if markers == 0 {
			return Ok(Params { fixed: before, rest: None })
		}

		let rest = match after.pop() {
			Some(sym) => sym,
			None => match before.pop() {
				Some(sym) => sym,
				None => bail!(self, "Formal ... for varargs must be next to the formal which \
				                     collects the extra arguments.")
			}
		};

		Ok(Params { fixed: before, rest: Some(rest) })
	}

	/**
	Binds `args` (a vector value) to `params` in the fresh scope `scope`. The variadic formal,
	if any, receives a new vector holding the remaining arguments.

	Arity mismatches are reported here, when the closure is called.
	*/
	pub(crate) fn bind_params(&self, params: &Params, scope: Val, args: Val) -> DResult<()> {
		let items = self.seq_items(args).unwrap_or_default();

		if params.rest.is_none() && items.len() != params.fixed.len() {
			bail!(self, "Number of formal and actual arguments must be equal for functions \
			             without varargs using the ...-formal. Now {} formal and {} actual \
			             arguments were given.", params.fixed.len(), items.len())
		}

		if items.len() < params.fixed.len() {
			bail!(self, "Function expects at least {} arguments. Now {} arguments were given.",
			      params.fixed.len(), items.len())
		}

		//args is rooted by the caller, so its elements are safe while we allocate
		for (&sym, &actual) in params.fixed.iter().zip(items.iter()) {
			let name = self.new_symbol_from_sym(sym);
			self.env_define(scope, name, actual);
		}

		if let Some(rest_sym) = params.rest {
			let rest = self.new_vector(items[params.fixed.len()..].to_vec());
			let _rest = self.root(rest);
			let name = self.new_symbol_from_sym(rest_sym);
			self.env_define(scope, name, rest);
		}

		Ok(())
	}

	/**
	Checks a documentation vector against a closure's formals. The vector alternates formal
	symbols and their doc strings, `(a [doc for a] b [doc for b])`. Every formal, including
	the `...` marker, must appear exactly once, and the marker's doc string must be
	`varargs`.
	*/
	pub fn validate_doc_vec(&self, closure: Val, doc_vec: Val) -> DResult<()> {
		let formals = match self.closure_formals(closure) {
			Some(formals) => self.seq_items(formals).unwrap_or_default(),
			None => bail!(self, "Only functions and macros have a documentation vector. Now \
			                     a value of type {} was given.", self.type_name(closure))
		};

		let entries = match self.seq_items(doc_vec) {
			Some(entries) if self.tag(doc_vec) == Tag::Vector => entries,
			_ => bail!(self, "Documentation of formals must be a vector. Now it has type {}.",
			           self.type_name(doc_vec))
		};

		for pair in entries.chunks(2) {
			ensure!(self, self.tag(pair[0]) == Tag::Symbol, "Documentation vector must \
			        alternate symbols and strings. Now a value of type {} was found in place \
			        of a symbol.", self.type_name(pair[0]));
		}

		for &formal in &formals {
			let name = self.symbol_name(formal).unwrap_or_else(|| "".into());
			let position = entries.chunks(2).position(|pair| {
				self.is_symbol_named(pair[0], &name)
			});

			let pair = match position {
				Some(i) => &entries[i * 2..],
				None => bail!(self, "formal '{}' is not mentioned in docvec", name)
			};

			let doc = match pair.get(1) {
				Some(&doc) => doc,
				None => bail!(self, "formal '{}' doesn't have docstring in docvec", name)
			};

			let doc = match self.as_str(doc) {
				Some(doc) => doc,
				None => bail!(self, "type of docstring for formal '{}' is not string. It has \
				                     type {}", name, self.type_name(doc))
			};

			if &*name == VARARGS_MARKER && doc != "varargs" {
				bail!(self, "docstring for ... should be varargs, now it is '{}'", doc)
			}
		}

		ensure!(self, entries.len() == formals.len() * 2, "docvec has {} elements, but {} were \
		        expected for {} formals", entries.len(), formals.len() * 2, formals.len());

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::{Engine, EngineBuilder};
	use crate::val::Val;

	fn formals(engine: &Engine, names: &[&str]) -> Val {
		let syms: Vec<Val> = names.iter().map(|name| engine.new_symbol(name)).collect();
		engine.new_vector(syms)
	}

	#[test]
	fn marker_position_selects_the_rest_formal() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let body = engine.new_vector(Vec::new());
		let env = engine.global_env();

		let trailing = formals(&engine, &["a", "...", "rest"]);
		let f = engine.new_function(trailing, body, env).unwrap();
		let params = engine.closure(f).unwrap().params;
		assert_eq!(params.required(), 1);
		assert!(params.is_variadic());

		let leading = formals(&engine, &["a", "rest", "..."]);
		let f = engine.new_function(leading, body, env).unwrap();
		assert_eq!(engine.closure(f).unwrap().params.required(), 1);
	}

	#[test]
	fn malformed_formals_fail_at_construction() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let body = engine.new_vector(Vec::new());
		let env = engine.global_env();

		for names in &[&["a", "...", "b", "c"][..], &["...", "a", "..."][..], &["..."][..]] {
			let formals = formals(&engine, names);
			assert!(engine.new_function(formals, body, env).is_err());
		}

		let not_symbols = engine.new_vector(vec![engine.boolean(true)]);
		assert!(engine.new_macro(not_symbols, body, env).is_err());
	}

	#[test]
	fn doc_vec_must_match_formals() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let body = engine.new_vector(Vec::new());
		let f = engine.new_function(formals(&engine, &["x", "..."]), body, engine.global_env())
			.unwrap();

		let x = engine.new_symbol("x");
		let dots = engine.new_symbol("...");
		let doc_x = engine.new_string("the x");
		let varargs = engine.new_string("varargs");
		let other = engine.new_string("something");

		let good = engine.new_vector(vec![x, doc_x, dots, varargs]);
		assert!(engine.validate_doc_vec(f, good).is_ok());

		let missing = engine.new_vector(vec![x, doc_x]);
		assert!(engine.validate_doc_vec(f, missing).is_err());

		let bad_varargs = engine.new_vector(vec![x, doc_x, dots, other]);
		assert!(engine.validate_doc_vec(f, bad_varargs).is_err());

		let y = engine.new_symbol("y");
		let extra = engine.new_vector(vec![x, doc_x, dots, varargs, y, other]);
		assert!(engine.validate_doc_vec(f, extra).is_err());
	}
}
