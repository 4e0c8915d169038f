use super::code::Closure;
use super::engine::{Engine, Guard, NativeFn};
use super::error::{DResult, Escape};
use super::val::{Payload, Tag, Val};

/*
the evaluator is a recursive tree-walker. every value it creates or receives is rooted before
it calls anything else which might allocate, and every root is a guard, so the root stack is
restored on every exit path, including the early exits taken through `?`.

early return is carried by Escape::Return. natives can only return a Val, so the `return`
native also records its argument in the engine's function-return slot; the dispatcher checks
that slot after every native call and converts it back into an Escape::Return. only the
closure-body loop which receives the Escape::Return clears the slot.
*/

impl Engine {
	/**
	Evaluates `form` in `env` and returns the result, which may be an error value.

	This is the entry point for hosts and for natives which need to evaluate a form. A `return`
	which isn't inside any function ends the outermost evaluation with the returned value.
	*/
	pub fn eval(&self, form: Val, env: Val) -> Val {
		let depth = self.eval_depth.get();
		self.eval_depth.set(depth + 1);
		let _guard = Guard::new(|| self.eval_depth.set(depth));

		let result = self.eval_step(form, env);

		if depth == 0 {
			self.function_return.set(None);
		}

		result.unwrap_or_else(Escape::into_val)
	}

	pub fn eval_in_global_env(&self, form: Val) -> Val {
		self.eval(form, self.global_env())
	}

	/**
	Evaluates `form` in `env`, reporting an error value or an early return as an `Escape`.

	Special forms use this to evaluate their argument forms, so that `?` stops them as soon as
	a nested form fails or returns.
	*/
	pub fn eval_step(&self, form: Val, env: Val) -> DResult<Val> {
		if self.is_quit() {
			return Ok(self.nil())
		}

		if self.debug.get() {
			eprn!(self, "[:::DEBUG:::] {}", self.repr(form));
		}

		match self.tag(form) {
			Tag::Symbol => {
				let sym = self.as_sym(form).unwrap_or_else(|| fatal!("malformed symbol payload"));
				match self.env_lookup(env, sym) {
					Some(val) => Ok(val),
					None => bail!(self, "Unbound symbol '{}'", self.sym_name(sym))
				}
			}
			Tag::Vector => {
				let _form_root = self.root(form);
				let _env_root = self.root(env);

				self.eval_form(form, env).map_err(|escape| self.annotate(escape, form))
			}
			Tag::Error => Err(Escape::Error(form)),
			tag if tag.is_self_evaluating() => Ok(form),
			tag => bail!(self, "Cannot evaluate a value of type '{}' ({})", tag.name(),
			             self.repr(form))
		}
	}

	//form and env are rooted by the caller
	fn eval_form(&self, form: Val, env: Val) -> DResult<Val> {
		let items = self.seq_items(form).unwrap_or_default();
		let (&head, tail) = match items.split_first() {
			Some(split) => split,
			None => bail!(self, "Cannot evaluate empty vector '()'")
		};

		let op = self.eval_step(head, env)?;
		let _op_root = self.root(op);

		match self.tag(op) {
			Tag::Special => {
				let entry = self.native_entry(op);
				let args = self.new_vector(tail.to_vec());
				let _args_root = self.root(args);

				let result = entry(self, args, env);
				self.settle(result)
			}
			Tag::Builtin => {
				let entry = self.native_entry(op);
				let args = self.new_vector(Vec::with_capacity(tail.len()));
				let _args_root = self.root(args);
				self.eval_args(tail, env, args)?;

				let result = entry(self, args, env);
				self.settle(result)
			}
			Tag::Function => {
				let args = self.new_vector(Vec::with_capacity(tail.len()));
				let _args_root = self.root(args);
				self.eval_args(tail, env, args)?;

				match self.closure(op) {
					Some(closure) => self.invoke_closure(&closure, args),
					None => fatal!("malformed function payload")
				}
			}
			Tag::Macro => {
				let args = self.new_vector(tail.to_vec());
				let _args_root = self.root(args);

				let expansion = match self.closure(op) {
					Some(closure) => self.invoke_closure(&closure, args)?,
					None => fatal!("malformed macro payload")
				};

				let _expansion_root = self.root(expansion);
				self.eval_step(expansion, env)
			}
			tag => bail!(self, "Cannot evaluate operator of type '{}' ({})", tag.name(),
			             self.repr(op))
		}
	}

	//evaluates each argument form left-to-right, appending the results to the rooted vector
	//`args`. stops at the first error or early return.
	fn eval_args(&self, forms: &[Val], env: Val, args: Val) -> DResult<()> {
		for &form in forms {
			let val = self.eval_step(form, env)?;
			self.vector_push(args, val);
		}

		Ok(())
	}

	/**
	Runs a closure body in a fresh scope whose enclosing scope is the closure's captured
	environment. `args` must be rooted.
	*/
	fn invoke_closure(&self, closure: &Closure, args: Val) -> DResult<Val> {
		let scope = self.new_environment(Some(closure.env));
		let _scope_root = self.root(scope);

		self.bind_params(&closure.params, scope, args)?;

		let mut result = self.nil();
		for form in self.seq_items(closure.body).unwrap_or_default() {
			match self.eval_step(form, scope) {
				Ok(val) => result = val,
				Err(Escape::Return(val)) => {
					self.function_return.set(None);
					return Ok(val)
				}
				Err(escape) => return Err(escape)
			}
		}

		Ok(result)
	}

	fn native_entry(&self, op: Val) -> NativeFn {
		self.with_payload(op, |payload| match *payload {
			Payload::Special(ref native) | Payload::Builtin(ref native) => native.entry.clone(),
			_ => fatal!("malformed native payload")
		})
	}

	//converts the Val produced by a native back into the evaluator's control flow
	fn settle(&self, result: Val) -> DResult<Val> {
		if let Some(returned) = self.function_return.get() {
			return Err(Escape::Return(returned))
		}

		if self.is_error(result) {
			Err(Escape::Error(result))
		} else {
			Ok(result)
		}
	}

	fn annotate(&self, escape: Escape, form: Val) -> Escape {
		if let Escape::Error(error) = escape {
			let trail = format!("\n\tAt form: >>>>>>>>>>{}<<<<<<<<<<\n", self.repr(form));
			self.append_to_error(error, &trail);
		}

		escape
	}

	/**
	Calls a builtin or a function with an already-evaluated argument vector. `args` must be
	rooted.

	Special forms and macros can't be applied, because they expect unevaluated forms.
	*/
	pub fn apply(&self, callable: Val, args: Val) -> DResult<Val> {
		let _callable_root = self.root(callable);

		match self.tag(callable) {
			Tag::Builtin => {
				let entry = self.native_entry(callable);
				let result = entry(self, args, self.global_env());
				self.settle(result)
			}
			Tag::Function => match self.closure(callable) {
				Some(closure) => self.invoke_closure(&closure, args),
				None => fatal!("malformed function payload")
			},
			tag => bail!(self, "Cannot apply a value of type '{}'", tag.name())
		}
	}

	///Like [`apply`](#method.apply), building the argument vector from a slice.
	pub fn apply_values(&self, callable: Val, args: &[Val]) -> DResult<Val> {
		let _callable_root = self.root(callable);
		let args = self.new_vector(args.to_vec());
		let _args_root = self.root(args);
		self.apply(callable, args)
	}

	//early return

	/**
	Records an early return. The closure body which is currently running stops after the
	native which called this returns, and produces `val`.
	*/
	pub fn set_function_return(&self, val: Val) {
		self.function_return.set(Some(val))
	}

	pub fn function_return(&self) -> Option<Val> {
		self.function_return.get()
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::{Engine, EngineBuilder};
	use crate::val::{Tag, Val};

	//a minimal set of natives, enough to drive the evaluator from source text
	fn engine() -> Engine {
		let engine = EngineBuilder::new().gc_trigger_limit(16).build();
		let global = engine.global_env();

		engine.register_special("quote", |engine, args, _| {
			engine.vector_get(args, 0).unwrap_or_else(|| engine.nil())
		}, 1, "", false, global);

		engine.register_special("fn", |engine, args, env| {
			let formals = engine.vector_get(args, 0).unwrap_or_else(|| engine.nil());
			let body = engine.seq_items(args).unwrap_or_default().split_off(1);
			let body = engine.new_vector(body);
			let _body = engine.root(body);
			engine.new_function(formals, body, env).unwrap_or_else(|escape| escape.into_val())
		}, 2, "", false, global);

		engine.register_builtin("return", |engine, args, _| {
			let val = engine.vector_get(args, 0).unwrap_or_else(|| engine.nil());
			engine.set_function_return(val);
			val
		}, 1, "", false, global);

		engine.register_builtin("+", |engine, args, _| {
			let items = engine.seq_items(args).unwrap_or_default();
			let sum = items.iter().map(|&i| engine.as_integer(i).unwrap_or(0)).sum();
			engine.new_integer(sum)
		}, 0, "", false, global);

		engine.register_special("do", |engine, args, env| {
			let mut result = engine.nil();
			for form in engine.seq_items(args).unwrap_or_default() {
				match engine.eval_step(form, env) {
					Ok(val) => result = val,
					Err(escape) => return escape.into_val()
				}
			}
			result
		}, 0, "", false, global);

		engine
	}

	fn run(engine: &Engine, source: &str) -> Val {
		engine.read_and_eval_str(source)
	}

	#[test]
	fn self_evaluation_and_lookup() {
		let engine = engine();
		assert_eq!(engine.as_integer(run(&engine, "7")), Some(7));
		assert_eq!(run(&engine, "nil"), engine.nil());
		assert_eq!(run(&engine, "true"), engine.boolean(true));

		let err = run(&engine, "undefined-thing");
		assert_eq!(engine.error_message(err).as_deref(), Some("Unbound symbol 'undefined-thing'"));
	}

	#[test]
	fn empty_and_non_callable_forms() {
		let engine = engine();

		let err = run(&engine, "()");
		assert!(engine.error_message(err).unwrap().starts_with("Cannot evaluate empty vector"));

		let err = run(&engine, "(1 2)");
		assert!(engine.error_message(err).unwrap()
			.starts_with("Cannot evaluate operator of type 'integer'"));
	}

	#[test]
	fn builtin_arguments_short_circuit() {
		let engine = engine();
		let err = run(&engine, "(+ 1 nope (return 3))");
		assert_eq!(engine.tag(err), Tag::Error);

		let message = engine.error_message(err).unwrap();
		assert!(message.starts_with("Unbound symbol 'nope'"));
		assert!(message.contains("At form: >>>>>>>>>>(+ 1 nope (return 3))<<<<<<<<<<"));
		assert_eq!(engine.function_return(), None);
	}

	#[test]
	fn closures_capture_their_definition_scope() {
		let engine = engine();
		let result = run(&engine, "
			((fn (x) ((fn (y) (+ x y)) 10)) 5)
		");
		assert_eq!(engine.as_integer(result), Some(15));

		let result = run(&engine, "(((fn (x) (fn (y) (+ x y))) 1) 2)");
		assert_eq!(engine.as_integer(result), Some(3));
	}

	#[test]
	fn call_time_arity_mismatch() {
		let engine = engine();
		let err = run(&engine, "((fn (a b) a) 1)");
		assert!(engine.error_message(err).unwrap().starts_with("Number of formal and actual"));

		let rest = run(&engine, "((fn (a ... rest) rest) 1 2 3)");
		assert_eq!(engine.vector_len(rest), Some(2));
	}

	#[test]
	fn return_stops_the_enclosing_body_only() {
		let engine = engine();
		let roots = engine.root_stack_len();

		let result = run(&engine, "((fn (x) (do (return x) (unbound-symbol)) (unbound-symbol)) 5)");
		assert_eq!(engine.as_integer(result), Some(5));
		assert_eq!(engine.function_return(), None);

		let result = run(&engine, "(+ 1 ((fn () (return 2) 100)))");
		assert_eq!(engine.as_integer(result), Some(3));

		assert_eq!(engine.root_stack_len(), roots);
	}

	#[test]
	fn stray_return_ends_the_outermost_eval() {
		let engine = engine();
		let result = run(&engine, "(do (return 4) (unbound-symbol))");
		assert_eq!(engine.as_integer(result), Some(4));
		assert_eq!(engine.function_return(), None);
	}

	#[test]
	fn quit_makes_evaluation_a_no_op() {
		let engine = engine();
		engine.quit();
		assert_eq!(run(&engine, "(+ 1 2)"), engine.nil());
	}

	#[test]
	fn apply_calls_functions_and_builtins() {
		let engine = engine();
		let f = run(&engine, "(fn (a b) (+ a b))");
		let _f = engine.root(f);

		let one = engine.new_integer(1);
		let _one = engine.root(one);
		let two = engine.new_integer(2);
		let _two = engine.root(two);

		let result = engine.apply_values(f, &[one, two]).unwrap();
		assert_eq!(engine.as_integer(result), Some(3));

		let plus = engine.env_lookup_str(engine.global_env(), "+").unwrap();
		let result = engine.apply_values(plus, &[one, two, two]).unwrap();
		assert_eq!(engine.as_integer(result), Some(5));

		let quote = engine.env_lookup_str(engine.global_env(), "quote").unwrap();
		assert!(engine.apply_values(quote, &[one]).is_err());
	}
}
