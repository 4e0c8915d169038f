use dern_engine::{bail, ensure, DResult, Engine, Tag, Val};
use std::collections::VecDeque;
use super::{bind_builtin, expect_at_least, expect_count, expect_tag, int_arg, items, ordinal_name};

pub fn init(engine: &Engine, _sandboxed: bool) -> DResult<()> {
	bind_builtin(engine, "vector", vector, 0, "Create a new vector holding the arguments")?;
	bind_builtin(engine, "hash-map", hash_map, 0, "Create a new hash map from keys and values")?;
	bind_builtin(engine, "queue", queue, 0, "Create a new queue holding the arguments")?;
	bind_builtin(engine, "queue-with-max-length", queue_with_max_length, 1, "Create a new queue \
	             which drops its oldest elements when it grows past the given length")?;
	bind_builtin(engine, "list", list, 0, "Create a new list holding the arguments")?;

	bind_builtin(engine, "len", len, 1, "Get the length of a collection, string or environment")?;
	bind_builtin(engine, "nth", nth, 2, "Get the element at an index")?;
	bind_builtin(engine, "find", find, 2, "Find the index of a value, or the value of a key")?;
	bind_builtin(engine, "pop-front", pop_front, 1, "Remove and return the first element")?;
	bind_builtin(engine, "pop-back", pop_back, 1, "Remove and return the last element")?;
	bind_builtin(engine, "split", split, 2, "Split a string or a vector at each separator")?;
	bind_builtin(engine, "copy", copy, 1, "Copy a value, giving the copy a new identity")?;

	bind_builtin(engine, "env-new", env_new, 0, "Create a new environment")?;
	bind_builtin(engine, "env-current", env_current, 0, "Get the current environment")?;
	bind_builtin(engine, "env-global", env_global, 0, "Get the global environment")?;

	Ok(())
}

//-------------------------------------------------------------------------------------------------
// constructors
//-------------------------------------------------------------------------------------------------

fn vector(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	Ok(engine.new_vector(items(engine, args)))
}

fn hash_map(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() % 2 == 0, "Builtin 'hash-map' expects keys and values in pairs. \
	        {} arguments were given.", items.len());

	let map = engine.new_hash_map();
	for pair in items.chunks(2) {
		engine.map_insert(map, pair[0], pair[1]);
	}

	Ok(map)
}

fn queue(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let queue = engine.new_queue(None);
	for item in items(engine, args) {
		engine.seq_push_back(queue, item);
	}

	Ok(queue)
}

fn queue_with_max_length(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "queue-with-max-length", &items, 1)?;

	let max_len = int_arg(engine, "queue-with-max-length", 0, items[0])?;
	ensure!(engine, max_len >= 0, "First argument to builtin 'queue-with-max-length' cannot be \
	        negative. Now it is {}.", max_len);

	let queue = engine.new_queue(Some(max_len as usize));
	for &item in &items[1..] {
		engine.seq_push_back(queue, item);
	}

	Ok(queue)
}

fn list(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	Ok(engine.new_list(items(engine, args).into_iter().collect::<VecDeque<Val>>()))
}

//-------------------------------------------------------------------------------------------------
// access
//-------------------------------------------------------------------------------------------------

fn len(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "len", &items, 1)?;

	match engine.len(items[0]) {
		Some(len) => Ok(engine.new_integer(len as i32)),
		None => bail!(engine, "Builtin 'len' cannot get the length of a value of type '{}'.",
		              engine.type_name(items[0]))
	}
}

fn nth(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "nth", &items, 2)?;

	let index = int_arg(engine, "nth", 0, items[0])?;
	let container = items[1];
	let len = engine.len(container).unwrap_or(0);

	ensure!(engine, index >= 0 && (index as usize) < len, "Builtin 'nth' cannot index {} of \
	        length {} from index {}.", engine.type_name(container), len, index);
	let index = index as usize;

	match engine.tag(container) {
		Tag::Str => {
			let text = engine.as_str(container).unwrap_or_default();
			match text.chars().nth(index) {
				Some(c) => Ok(engine.new_char(c)),
				None => bail!(engine, "Builtin 'nth' cannot index string from index {}.", index)
			}
		}
		Tag::Vector | Tag::List | Tag::Queue => {
			Ok(engine.seq_items(container).unwrap_or_default()[index])
		}
		Tag::HashMap => Ok(engine.map_entries(container).unwrap_or_default()[index].1),
		_ => bail!(engine, "Second argument to builtin 'nth' must be string, vector, list, queue \
		           or hash map. Type '{}' was given.", engine.type_name(container))
	}
}

/*
(find container value) finds the index of the first element equal to `value` in a vector, list
or queue, the character index of a substring or character in a string, the value of a key in a
hash map, or the value bound to a symbol in an environment. it returns nil when nothing is
found. with several values, it returns a vector holding one result per value.
*/

fn find(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "find", &items, 2)?;
	let (container, needles) = (items[0], &items[1..]);

	if needles.len() == 1 {
		return find_one(engine, container, needles[0], 1)
	}

	let results = engine.new_vector(Vec::with_capacity(needles.len()));
	let _results = engine.root(results);
	for (i, &needle) in needles.iter().enumerate() {
		let found = find_one(engine, container, needle, i + 1)?;
		engine.vector_push(results, found);
	}

	Ok(results)
}

fn find_one(engine: &Engine, container: Val, needle: Val, ordinal: usize) -> DResult<Val> {
	let index = match engine.tag(container) {
		Tag::Vector | Tag::List | Tag::Queue => {
			engine.seq_items(container).unwrap_or_default().into_iter()
				.position(|element| engine.equal(element, needle))
		}
		Tag::Str => {
			ensure!(engine, matches!(engine.tag(needle), Tag::Str | Tag::Char), "{} argument to \
			        builtin 'find' must be string or character when searching a string. Type \
			        '{}' was given.", ordinal_name(ordinal), engine.type_name(needle));

			let text = engine.as_str(container).unwrap_or_default();
			let pattern = engine.plain_string(needle);
			text.find(&pattern).map(|byte_index| text[..byte_index].chars().count())
		}
		Tag::HashMap => return Ok(engine.map_get(container, needle).unwrap_or_else(|| engine.nil())),
		Tag::Environment => {
			let found = engine.as_sym(needle).and_then(|sym| engine.env_lookup(container, sym));
			return Ok(found.unwrap_or_else(|| engine.nil()))
		}
		_ => bail!(engine, "First argument to builtin 'find' cannot be of type '{}'.",
		           engine.type_name(container))
	};

	Ok(match index {
		Some(i) => engine.new_integer(i as i32),
		None => engine.nil()
	})
}

fn pop_front(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	pop(engine, "pop-front", args, true)
}

fn pop_back(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	pop(engine, "pop-back", args, false)
}

fn pop(engine: &Engine, name: &str, args: Val, front: bool) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", name, &items, 1)?;
	let seq = items[0];

	ensure!(engine, matches!(engine.tag(seq), Tag::Vector | Tag::List | Tag::Queue), "First \
	        argument to builtin '{}' must be vector, list or queue. Type '{}' was given.", name,
	        engine.type_name(seq));

	let popped = if front { engine.seq_pop_front(seq) } else { engine.seq_pop_back(seq) };
	match popped {
		Some(val) => Ok(val),
		None => bail!(engine, "Builtin '{}' cannot remove an element from an empty {}.", name,
		              engine.type_name(seq))
	}
}

fn split(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "split", &items, 2)?;
	let (source, separator) = (items[0], items[1]);

	let parts = engine.new_vector(Vec::new());
	let _parts = engine.root(parts);

	match engine.tag(source) {
		Tag::Str => {
			ensure!(engine, matches!(engine.tag(separator), Tag::Str | Tag::Char), "Second \
			        argument to builtin 'split' must be string or character when splitting a \
			        string. Type '{}' was given.", engine.type_name(separator));

			let text = engine.as_str(source).unwrap_or_default();
			let separator = engine.plain_string(separator);
			ensure!(engine, !separator.is_empty(), "Builtin 'split' cannot split at an empty \
			        separator.");

			for part in text.split(separator.as_str()) {
				let part = engine.new_string(part);
				engine.vector_push(parts, part);
			}
		}
		Tag::Vector => {
			let mut current = Vec::new();
			for element in engine.seq_items(source).unwrap_or_default() {
				if engine.equal(element, separator) {
					let part = engine.new_vector(std::mem::take(&mut current));
					engine.vector_push(parts, part);
				} else {
					current.push(element);
				}
			}

			let part = engine.new_vector(current);
			engine.vector_push(parts, part);
		}
		_ => bail!(engine, "First argument to builtin 'split' must be string or vector. Type \
		           '{}' was given.", engine.type_name(source))
	}

	Ok(parts)
}

fn copy(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "copy", &items, 1)?;
	engine.copy(items[0])
}

//-------------------------------------------------------------------------------------------------
// environments
//-------------------------------------------------------------------------------------------------

//(env-new) encloses the calling environment; (env-new parent) encloses `parent`
fn env_new(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() <= 1, "Builtin 'env-new' expects zero or one arguments. {} \
	        arguments were given.", items.len());

	let parent = match items.first() {
		Some(&parent) => {
			expect_tag(engine, "env-new", 0, parent, Tag::Environment)?;
			parent
		}
		None => env
	};

	Ok(engine.new_environment(Some(parent)))
}

fn env_current(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	expect_count(engine, "builtin", "env-current", &items(engine, args), 0)?;
	Ok(env)
}

fn env_global(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	expect_count(engine, "builtin", "env-global", &items(engine, args), 0)?;
	Ok(engine.global_env())
}

#[cfg(test)]
mod tests {
	use crate::{Runtime, RuntimeBuilder};

	#[test]
	fn constructors_and_access() {
		let runtime = RuntimeBuilder::new().gc_trigger_limit(4).build();

		let result = runtime.read_and_eval_str("(hash-map [a] 1 [b] 2)");
		assert_eq!(runtime.repr(result), "(hash-map [a] 1 [b] 2)");

		let result = runtime.read_and_eval_str("(len (list 1 2 3))");
		assert_eq!(runtime.as_integer(result), Some(3));

		let result = runtime.read_and_eval_str("(nth 1 [abc])");
		assert_eq!(runtime.as_char(result), Some('b'));

		let result = runtime.read_and_eval_str("(nth 5 (vector 1))");
		assert!(runtime.is_error(result));

		let result = runtime.read_and_eval_str("
			(define q as (queue-with-max-length 2 1 2) [q])
			(+= q 3)
			q
		");
		assert_eq!(runtime.repr(result), "(queue 2 3)");
	}

	#[test]
	fn find_and_split() {
		let runtime = Runtime::new();

		let result = runtime.read_and_eval_str("(find (vector 5 6 7) 7)");
		assert_eq!(runtime.as_integer(result), Some(2));
		assert_eq!(runtime.read_and_eval_str("(find (vector 5 6 7) 8)"), runtime.nil());

		let result = runtime.read_and_eval_str("(find [hello] [llo] |h|)");
		assert_eq!(runtime.repr(result), "(2 0)");

		let result = runtime.read_and_eval_str("(find (hash-map 1 [one]) 1)");
		assert_eq!(runtime.as_str(result).as_deref(), Some("one"));

		let result = runtime.read_and_eval_str("(split [a,b,,c] |,|)");
		assert_eq!(runtime.repr(result), "([a] [b] [] [c])");

		let result = runtime.read_and_eval_str("(split (vector 1 0 2 3 0) 0)");
		assert_eq!(runtime.repr(result), "((1) (2 3) ())");
	}

	#[test]
	fn popping() {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str("
			(define v as (vector 1 2 3) [v])
			(+ (pop-front v) (pop-back v))
		");
		assert_eq!(runtime.as_integer(result), Some(4));

		let result = runtime.read_and_eval_str("(pop-back (vector))");
		assert!(runtime.is_error(result));
	}

	#[test]
	fn environments() {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str("
			(define e as (env-new) [e])
			(define x as 1 [x] in e)
			(find e 'x)
		");
		assert_eq!(runtime.as_integer(result), Some(1));

		let unbound = runtime.read_and_eval_str("x");
		assert!(runtime.is_error(unbound));

		assert_eq!(runtime.read_and_eval_str("(env-global)"), runtime.global_env());
	}
}
