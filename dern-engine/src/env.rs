use fnv::FnvHashMap;
use super::engine::{Engine, Sym};
use super::gc::Visitor;
use super::val::{Payload, Val};

//-------------------------------------------------------------------------------------------------
// Env
//-------------------------------------------------------------------------------------------------

/**
The payload of an environment value: one lexical scope.

Each binding remembers the symbol value it was defined with, so that iterating an environment
can produce `(symbol value)` pairs without allocating new symbols. The link to the enclosing
scope is an ordinary `Val`; the enclosing environment is kept alive by tracing it.
*/

#[derive(Clone)]
pub struct Env {
	parent: Option<Val>,
	names: FnvHashMap<Sym, usize>,
	bindings: Vec<(Val, Val)>
}

impl Env {
	pub(crate) fn new(parent: Option<Val>) -> Env {
		Env {
			parent,
			names: FnvHashMap::default(),
			bindings: Vec::new()
		}
	}

	pub fn parent(&self) -> Option<Val> {
		self.parent
	}

	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}

	///`(symbol value)` pairs in definition order.
	pub fn bindings(&self) -> &[(Val, Val)] {
		&self.bindings
	}

	pub(crate) fn get(&self, sym: Sym) -> Option<Val> {
		self.names.get(&sym).map(|&i| self.bindings[i].1)
	}

	//binds in this scope only, overwriting an existing binding of the same name
	pub(crate) fn define(&mut self, sym: Sym, sym_val: Val, value: Val) {
		match self.names.get(&sym) {
			Some(&i) => self.bindings[i].1 = value,
			None => {
				self.names.insert(sym, self.bindings.len());
				self.bindings.push((sym_val, value));
			}
		}
	}

	fn set(&mut self, sym: Sym, value: Val) -> bool {
		match self.names.get(&sym) {
			Some(&i) => {
				self.bindings[i].1 = value;
				true
			}
			None => false
		}
	}

	pub(crate) fn trace<V: Visitor>(&self, visitor: &mut V) {
		if let Some(parent) = self.parent {
			visitor.visit(parent);
		}

		for &(sym_val, value) in &self.bindings {
			visitor.visit(sym_val);
			visitor.visit(value);
		}
	}
}

//-------------------------------------------------------------------------------------------------
// Engine methods
//-------------------------------------------------------------------------------------------------

impl Engine {
	/**
	Creates a new, empty scope. Lookups which miss in the new scope continue in `parent`.

	`parent` must be an environment value, or `None` for a detached top-level scope.
	*/
	pub fn new_environment(&self, parent: Option<Val>) -> Val {
		self.alloc(Payload::Environment(Env::new(parent)))
	}

	pub fn is_environment(&self, val: Val) -> bool {
		self.with_payload(val, |payload| matches!(*payload, Payload::Environment(_)))
	}

	pub fn env_parent(&self, env: Val) -> Option<Val> {
		self.with_payload(env, |payload| match *payload {
			Payload::Environment(ref env) => env.parent(),
			_ => None
		})
	}

	/**
	Binds the symbol value `name` to `value` in `env` itself. A binding of the same name in
	`env` is overwritten; bindings in enclosing scopes are shadowed, never modified.

	Returns `false` if `env` isn't an environment or `name` isn't a symbol.
	*/
	pub fn env_define(&self, env: Val, name: Val, value: Val) -> bool {
		let sym = match self.as_sym(name) {
			Some(sym) => sym,
			None => return false
		};

		self.with_payload_mut(env, |payload| match *payload {
			Payload::Environment(ref mut env) => {
				env.define(sym, name, value);
				true
			}
			_ => false
		})
	}

	///Like [`env_define`](#method.env_define), allocating the symbol value for `name`.
	pub fn env_define_str(&self, env: Val, name: &str, value: Val) -> bool {
		let _value_root = self.root(value);
		let _env_root = self.root(env);
		let name = self.new_symbol(name);
		self.env_define(env, name, value)
	}

	/**
	Resolves `sym`, starting in `env` and walking outward through the enclosing scopes. The
	innermost binding wins.
	*/
	pub fn env_lookup(&self, env: Val, sym: Sym) -> Option<Val> {
		let mut current = Some(env);
		while let Some(scope) = current {
			let step = self.with_payload(scope, |payload| match *payload {
				Payload::Environment(ref env) => Ok(env.get(sym).ok_or(env.parent())),
				_ => Err(())
			});

			match step {
				Ok(Ok(value)) => return Some(value),
				Ok(Err(parent)) => current = parent,
				Err(()) => return None
			}
		}

		None
	}

	pub fn env_lookup_str(&self, env: Val, name: &str) -> Option<Val> {
		self.env_lookup(env, self.intern(name))
	}

	///Looks up `sym` in `env` itself, ignoring the enclosing scopes.
	pub fn env_lookup_local(&self, env: Val, sym: Sym) -> Option<Val> {
		self.with_payload(env, |payload| match *payload {
			Payload::Environment(ref env) => env.get(sym),
			_ => None
		})
	}

	/**
	Reassigns the innermost existing binding of `sym`, walking outward from `env`. Returns
	`false`, binding nothing, if `sym` is unbound.
	*/
	pub fn env_set(&self, env: Val, sym: Sym, value: Val) -> bool {
		enum Step {
			Assigned,
			Outward(Val),
			Unbound
		}

		let mut scope = env;
		loop {
			let step = self.with_payload_mut(scope, |payload| match *payload {
				Payload::Environment(ref mut env) => {
					if env.set(sym, value) {
						Step::Assigned
					} else {
						env.parent().map_or(Step::Unbound, Step::Outward)
					}
				}
				_ => Step::Unbound
			});

			match step {
				Step::Assigned => return true,
				Step::Outward(parent) => scope = parent,
				Step::Unbound => return false
			}
		}
	}

	///A snapshot of the `(symbol value)` pairs bound directly in `env`, in definition order.
	pub fn env_bindings(&self, env: Val) -> Option<Vec<(Val, Val)>> {
		self.with_payload(env, |payload| match *payload {
			Payload::Environment(ref env) => Some(env.bindings().to_vec()),
			_ => None
		})
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::EngineBuilder;

	#[test]
	fn lookup_walks_outward_and_shadows() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let global = engine.global_env();

		let one = engine.new_integer(1);
		engine.env_define_str(global, "x", one);

		let inner = engine.new_environment(Some(global));
		let _inner = engine.root(inner);
		let x = engine.intern("x");
		assert_eq!(engine.env_lookup(inner, x), Some(one));

		let two = engine.new_integer(2);
		engine.env_define_str(inner, "x", two);
		assert_eq!(engine.env_lookup(inner, x), Some(two));
		assert_eq!(engine.env_lookup(global, x), Some(one));

		assert_eq!(engine.env_lookup_str(inner, "missing"), None);
	}

	#[test]
	fn redefinition_overwrites_the_same_scope() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let env = engine.new_environment(None);
		let _env = engine.root(env);

		let a = engine.new_integer(1);
		let b = engine.new_integer(2);
		engine.env_define_str(env, "a", a);
		engine.env_define_str(env, "a", b);

		assert_eq!(engine.len(env), Some(1));
		assert_eq!(engine.env_lookup_str(env, "a"), Some(b));
	}

	#[test]
	fn set_reassigns_the_nearest_binding() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let outer = engine.new_environment(None);
		let _outer = engine.root(outer);
		let inner = engine.new_environment(Some(outer));
		let _inner = engine.root(inner);

		let a = engine.new_integer(1);
		engine.env_define_str(outer, "a", a);

		let b = engine.new_integer(2);
		let sym = engine.intern("a");
		assert!(engine.env_set(inner, sym, b));
		assert_eq!(engine.env_lookup_local(outer, sym), Some(b));
		assert_eq!(engine.env_lookup_local(inner, sym), None);

		let unbound = engine.intern("unbound");
		assert!(!engine.env_set(inner, unbound, b));
	}

	#[test]
	fn bindings_survive_through_the_environment() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let env = engine.new_environment(Some(engine.global_env()));
		let _env = engine.root(env);

		let val = engine.new_string("bound");
		engine.env_define_str(env, "s", val);

		engine.collect();
		assert!(engine.is_live(val));
		assert_eq!(engine.env_bindings(env).map(|b| b.len()), Some(1));
	}
}
