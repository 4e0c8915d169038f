use dern_engine::{bail, ensure, DResult, Engine, Escape, Tag, Val};
use super::{bind_special, expect_at_least, expect_count, fresh_binding, items, ordinal_name};

pub fn init(engine: &Engine, _sandboxed: bool) -> DResult<()> {
	bind_special(engine, "define", define, 4, "Bind a value, with documentation, to a symbol in \
	             the current or a given environment")?;
	bind_special(engine, "quote", quote, 1, "Quote value, preventing its evaluation")?;
	bind_special(engine, "if", if_, 2, "Evaluate the second or third argument, depending on \
	             whether the first argument evaluates into true or false")?;
	bind_special(engine, "while", while_, 2, "Evaluate the remaining arguments for as long as \
	             the first argument evaluates into true")?;
	bind_special(engine, "for", for_, 4, "Iterate a numeric range or the elements of a \
	             container, string or input port")?;
	bind_special(engine, "select", select, 2, "Select the result of the first test which \
	             evaluates into true, or the 'default' result")?;
	bind_special(engine, "do", do_, 0, "Evaluate the arguments in order and return the last \
	             result")?;
	bind_special(engine, "and", and, 0, "Evaluate arguments until one evaluates into false or \
	             nil")?;
	bind_special(engine, "or", or, 0, "Evaluate arguments until one evaluates into something \
	             other than false or nil")?;
	bind_special(engine, "fn", fn_, 2, "Create a new function")?;
	bind_special(engine, "macro", macro_, 2, "Create a new macro")?;
	bind_special(engine, "template", template, 1, "Quote a form, replacing each (unquote x) \
	             within it by the value of x")?;
	bind_special(engine, "=", assign, 2, "Assign a new value to a bound symbol, or set an \
	             element of a vector, hash map or environment")?;
	bind_special(engine, "error?", errorp, 1, "Predicate telling whether the argument evaluates \
	             into an error")?;

	Ok(())
}

//-------------------------------------------------------------------------------------------------
// helpers
//-------------------------------------------------------------------------------------------------

//evaluates each form in order. returns the last result, or nil when there are no forms.
pub(crate) fn eval_body(engine: &Engine, forms: &[Val], env: Val) -> DResult<Val> {
	let mut result = engine.nil();
	for &form in forms {
		result = engine.eval_step(form, env)?;
	}

	Ok(result)
}

fn expect_marker(engine: &Engine, form: &str, items: &[Val], i: usize, marker: &str) -> DResult<()> {
	ensure!(engine, engine.is_symbol_named(items[i], marker), "{} argument to special '{}' \
	        must be symbol '{}'. Now it is '{}'.", ordinal_name(i), form, marker,
	        engine.repr(items[i]));
	Ok(())
}

fn is_falsy(engine: &Engine, val: Val) -> bool {
	engine.is_nil(val) || engine.as_boolean(val) == Some(false)
}

//-------------------------------------------------------------------------------------------------
// define
//-------------------------------------------------------------------------------------------------

/*
define has four shapes:
	(define name as value [doc])
	(define name as value [doc] in env)
	(define name as callable [doc] docvec howto-ok)
	(define name as callable [doc] docvec in env howto-ok)

the six-argument shapes are told apart by the fifth argument: the symbol `in` selects the
environment form. nothing is bound unless every argument is valid.
*/

fn define(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, matches!(items.len(), 4 | 6 | 8), "Special 'define' expects four, six or \
	        eight arguments. {} arguments were given.", items.len());

	let name = items[0];
	ensure!(engine, engine.tag(name) == Tag::Symbol, "First argument to special 'define' must \
	        be symbol. Now it has type {}.", engine.type_name(name));
	expect_marker(engine, "define", &items, 1, "as")?;

	let value = engine.eval_step(items[2], env)?;
	let _value = engine.root(value);
	let value = fresh_binding(engine, value)?;
	let _fresh = engine.root(value);

	let doc = engine.eval_step(items[3], env)?;
	let _doc = engine.root(doc);
	ensure!(engine, engine.tag(doc) == Tag::Str, "Fourth argument to special 'define' must \
	        evaluate into string (the documentation). Now it has type {}.", engine.type_name(doc));

	let with_env = items.len() == 6 && engine.is_symbol_named(items[4], "in");
	let documents_formals = items.len() == 8 || (items.len() == 6 && !with_env);

	let mut doc_vec = None;
	let mut howto = false;
	if documents_formals {
		ensure!(engine, engine.is_closure(value), "Third argument to special 'define' must \
		        evaluate into function or macro when a documentation vector is given. Now it \
		        has type {}.", engine.type_name(value));

		let vec = engine.eval_step(items[4], env)?;
		engine.push_root(vec);
		let validated = engine.validate_doc_vec(value, vec);
		engine.unroot(vec);
		validated?;
		doc_vec = Some(vec);

		let howto_sym = items[items.len() - 1];
		howto = if engine.is_symbol_named(howto_sym, "howto-ok") {
			true
		} else if engine.is_symbol_named(howto_sym, "howto-no") {
			false
		} else {
			bail!(engine, "{} argument to special 'define' must be symbol 'howto-ok' or \
			      'howto-no'. Now it is '{}'.", ordinal_name(items.len() - 1),
			      engine.repr(howto_sym))
		};
	}

	//an evaluated doc vector isn't necessarily reachable from the argument forms
	let _doc_vec = doc_vec.map(|vec| engine.root(vec));

	let target = if items.len() == 8 || with_env {
		let in_index = if with_env { 4 } else { 5 };
		expect_marker(engine, "define", &items, in_index, "in")?;

		let target = engine.eval_step(items[in_index + 1], env)?;
		ensure!(engine, engine.is_environment(target), "{} argument to special 'define' must \
		        evaluate into environment. Now it has type {}.", ordinal_name(in_index + 1),
		        engine.type_name(target));
		target
	} else {
		env
	};
	let _target = engine.root(target);

	if !is_shared_constant(engine, value) {
		engine.set_doc(value, Some(doc));
	}

	if engine.is_closure(value) {
		if let Some(name) = engine.symbol_name(name) {
			engine.set_closure_name(value, &name);
		}

		if let Some(vec) = doc_vec {
			engine.set_doc_vec(value, Some(vec));
			engine.set_howto_allowed(value, howto);
		}
	}

	ensure!(engine, engine.env_define(target, name, value), "Special 'define' failed to bind \
	        '{}'.", engine.repr(name));
	Ok(engine.boolean(true))
}

fn is_shared_constant(engine: &Engine, val: Val) -> bool {
	val == engine.nil() || val == engine.boolean(true) || val == engine.boolean(false)
}

//-------------------------------------------------------------------------------------------------
// quote, template
//-------------------------------------------------------------------------------------------------

fn quote(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "special", "quote", &items, 1)?;
	Ok(items[0])
}

fn template(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "special", "template", &items, 1)?;
	fill_template(engine, items[0], env)
}

//`form` stays reachable through the template's argument vector
fn fill_template(engine: &Engine, form: Val, env: Val) -> DResult<Val> {
	if engine.tag(form) != Tag::Vector {
		return Ok(form)
	}

	let elements = engine.seq_items(form).unwrap_or_default();
	if elements.len() == 2 && engine.is_symbol_named(elements[0], "unquote") {
		return engine.eval_step(elements[1], env)
	}

	let filled = engine.new_vector(Vec::with_capacity(elements.len()));
	let _filled = engine.root(filled);

	for element in elements {
		let element = fill_template(engine, element, env)?;
		engine.vector_push(filled, element);
	}

	Ok(filled)
}

//-------------------------------------------------------------------------------------------------
// control flow
//-------------------------------------------------------------------------------------------------

fn if_(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() == 2 || items.len() == 3, "Special 'if' expects two or three \
	        arguments. {} arguments were given.", items.len());

	let mut test = engine.eval_step(items[0], env)?;
	if engine.tag(test) == Tag::Function {
		test = engine.apply_values(test, &[])?;
	}

	let branch = match engine.as_boolean(test) {
		Some(true) => 1,
		Some(false) => 2,
		None => bail!(engine, "First argument to special 'if' must evaluate into boolean value. \
		              Now it evaluated into type {}.", engine.type_name(test))
	};

	match items.get(branch) {
		Some(&form) => engine.eval_step(form, env),
		None => Ok(engine.nil())
	}
}

fn while_(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "special", "while", &items, 2)?;

	let mut count: i32 = 0;
	loop {
		let test = engine.eval_step(items[0], env)?;
		match engine.as_boolean(test) {
			Some(true) => (),
			Some(false) => break,
			None => bail!(engine, "First argument to special 'while' must evaluate into boolean \
			              value. Now it evaluated into type {}.", engine.type_name(test))
		}

		eval_body(engine, &items[1..], env)?;
		count = count.wrapping_add(1);
	}

	Ok(engine.new_integer(count))
}

fn select(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() % 2 == 0, "Special 'select' expects an even number of arguments \
	        (pairs of test and result). {} arguments were given.", items.len());

	for (i, pair) in items.chunks(2).enumerate() {
		let (test, result) = (pair[0], pair[1]);

		if engine.is_symbol_named(test, "default") {
			ensure!(engine, (i + 1) * 2 == items.len(), "Special 'select' accepts 'default' only \
			        as the last test.");
			return engine.eval_step(result, env)
		}

		let outcome = engine.eval_step(test, env)?;
		match engine.as_boolean(outcome) {
			Some(true) => return engine.eval_step(result, env),
			Some(false) => (),
			None => bail!(engine, "Tests of special 'select' must evaluate into boolean values. \
			              Now a test evaluated into type {}.", engine.type_name(outcome))
		}
	}

	Ok(engine.nil())
}

fn do_(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	eval_body(engine, &items(engine, args), env)
}

fn and(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let mut result = engine.boolean(true);
	for form in items(engine, args) {
		result = engine.eval_step(form, env)?;
		if is_falsy(engine, result) {
			return Ok(engine.boolean(false))
		}
	}

	Ok(result)
}

fn or(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	for form in items(engine, args) {
		let result = engine.eval_step(form, env)?;
		if !is_falsy(engine, result) {
			return Ok(result)
		}
	}

	Ok(engine.boolean(false))
}

fn errorp(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "special", "error?", &items, 1)?;

	match engine.eval_step(items[0], env) {
		Ok(_) => Ok(engine.boolean(false)),
		Err(Escape::Error(_)) => Ok(engine.boolean(true)),
		Err(escape) => Err(escape)
	}
}

//-------------------------------------------------------------------------------------------------
// for
//-------------------------------------------------------------------------------------------------

/*
	(for i from 0 to 10 [step 2] body...)
	(for x in container [step 2] body...)

the counter symbol is bound in a single child scope, which every iteration reuses. the step is
an unevaluated integer literal. the result is the number of completed iterations.
*/

fn for_(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "special", "for", &items, 4)?;

	let counter = items[0];
	ensure!(engine, engine.tag(counter) == Tag::Symbol, "First argument to special 'for' must \
	        be symbol value. Now it has type {}.", engine.type_name(counter));

	let scope = engine.new_environment(Some(env));
	let _scope = engine.root(scope);

	let count = if engine.is_symbol_named(items[1], "in") {
		for_in(engine, &items, env, scope)?
	} else if engine.is_symbol_named(items[1], "from") {
		for_range(engine, &items, env, scope)?
	} else {
		bail!(engine, "Second argument to special 'for' must be symbol 'in' or 'from'. Now it \
		      is '{}'.", engine.repr(items[1]))
	};

	Ok(engine.new_integer(count as i32))
}

//returns the step size and the index of the first body form
fn optional_step(engine: &Engine, items: &[Val], at: usize, context: &str) -> DResult<(usize, usize)> {
	match items.get(at) {
		Some(&marker) if engine.is_symbol_named(marker, "step") => {
			let size = match items.get(at + 1) {
				Some(&size) => size,
				None => bail!(engine, "Special 'for' expects a step size after 'step'. {} \
				              arguments were given.", items.len())
			};

			let step = match engine.as_integer(size) {
				Some(step) => step,
				None => bail!(engine, "{} argument to special 'for' using 'step' with {} must be \
				              an integer step size. Now it has type {}.", ordinal_name(at + 1),
				              context, engine.type_name(size))
			};

			ensure!(engine, step > 0, "The 'step' of special 'for' must be larger than zero. Now \
			        it is {}.", step);
			Ok((step as usize, at + 2))
		}
		_ => Ok((1, at))
	}
}

fn for_range(engine: &Engine, items: &[Val], env: Val, scope: Val) -> DResult<usize> {
	ensure!(engine, items.len() >= 5, "Special 'for' expects at least five arguments for \
	        iterating a numeric range. {} arguments were given.", items.len());

	let from_val = engine.eval_step(items[2], env)?;
	let from = match engine.as_integer(from_val) {
		Some(from) => from as i64,
		None => bail!(engine, "Third argument to special 'for' using 'from' must be integer. Now \
		              it has type {}.", engine.type_name(from_val))
	};

	expect_marker(engine, "for", items, 3, "to")?;

	let to_val = engine.eval_step(items[4], env)?;
	let to = match engine.as_integer(to_val) {
		Some(to) => to as i64,
		None => bail!(engine, "Fifth argument to special 'for' using 'from' must be of same type \
		              than the third (integer). Now it has type {}.", engine.type_name(to_val))
	};

	let (step, body_start) = optional_step(engine, items, 5, "numeric iteration")?;
	let body = &items[body_start..];

	let mut count = 0;
	for offset in (0 ..= (to - from).abs()).step_by(step) {
		let i = if from <= to { from + offset } else { from - offset };
		let counter = engine.new_integer(i as i32);
		engine.env_define(scope, items[0], counter);

		eval_body(engine, body, scope)?;
		count += 1;
	}

	Ok(count)
}

enum Source {
	Elements(Vec<Val>),
	Chars(Vec<char>),
	Pairs(Vec<(Val, Val)>)
}

fn for_in(engine: &Engine, items: &[Val], env: Val, scope: Val) -> DResult<usize> {
	let container = engine.eval_step(items[2], env)?;
	let _container = engine.root(container);

	let (step, body_start) = optional_step(engine, items, 3, "containers")?;
	let body = &items[body_start..];

	let source = match engine.tag(container) {
		Tag::Str => Source::Chars(engine.as_str(container).unwrap_or_default().chars().collect()),
		Tag::Vector | Tag::List | Tag::Queue => {
			Source::Elements(engine.seq_items(container).unwrap_or_default())
		}
		Tag::HashMap => Source::Pairs(engine.map_entries(container).unwrap_or_default()),
		Tag::Environment => Source::Pairs(engine.env_bindings(container).unwrap_or_default()),
		Tag::Port => return for_in_port(engine, items[0], container, step, body, scope),
		_ => bail!(engine, "Third argument to special 'for' using 'in' must be a container \
		           (string, vector, list, queue, hash map, environment or input port). Now it \
		           has type {}.", engine.type_name(container))
	};

	//the body may remove elements from the container, so the snapshot keeps them alive
	let snapshot = match source {
		Source::Elements(ref elements) => elements.clone(),
		Source::Pairs(ref pairs) => pairs.iter().flat_map(|&(k, v)| vec![k, v]).collect(),
		Source::Chars(_) => Vec::new()
	};
	let snapshot = engine.new_vector(snapshot);
	let _snapshot = engine.root(snapshot);

	let len = match source {
		Source::Elements(ref elements) => elements.len(),
		Source::Chars(ref chars) => chars.len(),
		Source::Pairs(ref pairs) => pairs.len()
	};

	let mut count = 0;
	for i in (0 .. len).step_by(step) {
		let element = match source {
			Source::Elements(ref elements) => elements[i],
			Source::Chars(ref chars) => engine.new_char(chars[i]),
			Source::Pairs(ref pairs) => engine.new_vector(vec![pairs[i].0, pairs[i].1])
		};
		engine.env_define(scope, items[0], element);

		eval_body(engine, body, scope)?;
		count += 1;
	}

	Ok(count)
}

fn for_in_port(
	engine: &Engine,
	counter: Val,
	port: Val,
	step: usize,
	body: &[Val],
	scope: Val
) -> DResult<usize> {
	let readable = engine.with_port(port, |port| port.supports_input()).unwrap_or(false);
	ensure!(engine, readable, "Third argument to special 'for' using 'in' must be a port which \
	        supports input.");

	let read = |engine: &Engine| -> DResult<Option<u8>> {
		match engine.with_port(port, |port| port.read_octet()) {
			Some(Ok(octet)) => Ok(octet),
			Some(Err(err)) => bail!(engine, "Special 'for' failed to read from port: {}", err),
			None => Ok(None)
		}
	};

	let mut count = 0;
	while let Some(octet) = read(engine)? {
		let element = engine.new_integer(octet as i32);
		engine.env_define(scope, counter, element);

		eval_body(engine, body, scope)?;
		count += 1;

		for _ in 1 .. step {
			if read(engine)?.is_none() {
				return Ok(count)
			}
		}
	}

	Ok(count)
}

//-------------------------------------------------------------------------------------------------
// closures
//-------------------------------------------------------------------------------------------------

fn fn_(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	closure(engine, "fn", args, env)
}

fn macro_(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	closure(engine, "macro", args, env)
}

fn closure(engine: &Engine, kind: &str, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "special", kind, &items, 2)?;

	let formals = items[0];
	ensure!(engine, engine.tag(formals) == Tag::Vector, "First argument to special '{}' must \
	        be a vector of formal arguments. Now it has type {}.", kind,
	        engine.type_name(formals));

	let body = engine.new_vector(items[1..].to_vec());
	let _body = engine.root(body);

	if kind == "macro" {
		engine.new_macro(formals, body, env)
	} else {
		engine.new_function(formals, body, env)
	}
}

//-------------------------------------------------------------------------------------------------
// assignment
//-------------------------------------------------------------------------------------------------

fn assign(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);

	match items.len() {
		2 => {
			let sym = match engine.as_sym(items[0]) {
				Some(sym) => sym,
				None => bail!(engine, "First argument to special '=' must be symbol when \
				              assigning a variable. Now it has type {}.",
				              engine.type_name(items[0]))
			};

			let value = engine.eval_step(items[1], env)?;
			let _value = engine.root(value);
			let value = fresh_binding(engine, value)?;

			ensure!(engine, engine.env_set(env, sym, value), "Special '=' cannot assign to \
			        unbound symbol '{}'.", engine.sym_name(sym));
			Ok(value)
		}
		3 => {
			let target = engine.eval_step(items[0], env)?;
			let _target = engine.root(target);
			let key = engine.eval_step(items[1], env)?;
			let _key = engine.root(key);
			let value = engine.eval_step(items[2], env)?;
			let _value = engine.root(value);
			let value = fresh_binding(engine, value)?;
			let _fresh = engine.root(value);

			match engine.tag(target) {
				Tag::Vector => {
					let len = engine.vector_len(target).unwrap_or(0);
					let index = match engine.as_integer(key) {
						Some(i) if i >= 0 && (i as usize) < len => i as usize,
						Some(i) => bail!(engine, "Special '=' cannot set index {} of a vector of \
						                 length {}.", i, len),
						None => bail!(engine, "Second argument to special '=' must evaluate into \
						              integer when setting a vector element. Now it has type {}.",
						              engine.type_name(key))
					};
					engine.vector_set(target, index, value);
				}
				Tag::HashMap => {
					engine.map_insert(target, key, value);
				}
				Tag::Environment => {
					ensure!(engine, engine.tag(key) == Tag::Symbol, "Second argument to special \
					        '=' must evaluate into symbol when setting an environment binding. \
					        Now it has type {}.", engine.type_name(key));
					engine.env_define(target, key, value);
				}
				_ => bail!(engine, "First argument to special '=' must evaluate into vector, hash \
				           map or environment when setting an element. Now it has type {}.",
				           engine.type_name(target))
			}

			Ok(target)
		}
		n => bail!(engine, "Special '=' expects two or three arguments. {} arguments were given.",
		           n)
	}
}
