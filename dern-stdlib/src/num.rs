use dern_engine::{bail, ensure, DResult, Engine, Payload, Tag, Val};
use std::cmp::Ordering;
use super::{bind_builtin, expect_at_least, expect_count, items, ordinal_name};

pub fn init(engine: &Engine, _sandboxed: bool) -> DResult<()> {
	bind_builtin(engine, "+", add, 0, "Add numbers, or concatenate strings and characters")?;
	bind_builtin(engine, "-", sub, 1, "Subtract numbers, or negate a single number")?;
	bind_builtin(engine, "*", mul, 0, "Multiply numbers")?;
	bind_builtin(engine, "/", div, 1, "Divide numbers")?;
	bind_builtin(engine, "mod", modulo, 2, "Calculate the remainder of integer division")?;

	bind_builtin(engine, "++", incr, 1, "Increase numbers by one, in place")?;
	bind_builtin(engine, "--", decr, 1, "Decrease numbers by one, in place")?;
	bind_builtin(engine, "+=", add_assign, 2, "Add to a number, string or collection, in place")?;
	bind_builtin(engine, "-=", sub_assign, 2, "Subtract from a number, or remove from a string \
	             or collection, in place")?;

	bind_builtin(engine, "<", lt, 2, "Predicate telling whether values are in increasing order")?;
	bind_builtin(engine, ">", gt, 2, "Predicate telling whether values are in decreasing order")?;
	bind_builtin(engine, "<=", lte, 2, "Predicate telling whether values are in non-decreasing \
	             order")?;
	bind_builtin(engine, ">=", gte, 2, "Predicate telling whether values are in non-increasing \
	             order")?;
	bind_builtin(engine, "==", eq, 2, "Predicate telling whether values are structurally equal")?;
	bind_builtin(engine, "===", same, 2, "Predicate telling whether values are the same value")?;
	bind_builtin(engine, "!=", not_eq, 2, "Predicate telling whether values are not \
	             structurally equal")?;

	bind_builtin(engine, "to-integer", to_integer, 1, "Convert a real, string or character into \
	             an integer")?;
	bind_builtin(engine, "integer?", integerp, 1, "Predicate telling whether a value is an \
	             integer")?;
	bind_builtin(engine, "real?", realp, 1, "Predicate telling whether a value is a real")?;
	bind_builtin(engine, "number?", numberp, 1, "Predicate telling whether a value is an integer \
	             or a real")?;

	Ok(())
}

//-------------------------------------------------------------------------------------------------
// Num
//-------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq)]
enum Num {
	Int(i32),
	Flo(f64)
}

impl Num {
	fn into_f64(self) -> f64 {
		match self {
			Num::Int(i) => i as f64,
			Num::Flo(f) => f
		}
	}
}

fn num_arg(engine: &Engine, name: &str, ordinal: usize, val: Val) -> DResult<Num> {
	if let Some(i) = engine.as_integer(val) {
		Ok(Num::Int(i))
	} else if let Some(f) = engine.as_real(val) {
		Ok(Num::Flo(f))
	} else {
		bail!(engine, "{} argument to builtin '{}' must be integer or real. Type '{}' was given.",
		      ordinal_name(ordinal), name, engine.type_name(val))
	}
}

fn new_num(engine: &Engine, num: Num) -> Val {
	match num {
		Num::Int(i) => engine.new_integer(i),
		Num::Flo(f) => engine.new_real(f)
	}
}

//applies a binary operation, using `int_op` when both sides are integers and `flo_op` otherwise
fn arith(
	engine: &Engine,
	name: &str,
	a: Num,
	b: Num,
	int_op: fn(i32, i32) -> Option<i32>,
	flo_op: fn(f64, f64) -> f64
) -> DResult<Num> {
	match (a, b) {
		(Num::Int(x), Num::Int(y)) => match int_op(x, y) {
			Some(result) => Ok(Num::Int(result)),
			None => bail!(engine, "Integer overflow in builtin '{}' ({} and {}).", name, x, y)
		},
		(a, b) => Ok(Num::Flo(flo_op(a.into_f64(), b.into_f64())))
	}
}

fn fold_nums(
	engine: &Engine,
	name: &str,
	vals: &[Val],
	int_op: fn(i32, i32) -> Option<i32>,
	flo_op: fn(f64, f64) -> f64
) -> DResult<Num> {
	let mut acc = num_arg(engine, name, 0, vals[0])?;
	for (i, &val) in vals.iter().enumerate().skip(1) {
		let operand = num_arg(engine, name, i, val)?;
		acc = arith(engine, name, acc, operand, int_op, flo_op)?;
	}

	Ok(acc)
}

//-------------------------------------------------------------------------------------------------
// arithmetic
//-------------------------------------------------------------------------------------------------

fn is_textual(engine: &Engine, val: Val) -> bool {
	matches!(engine.tag(val), Tag::Str | Tag::Char)
}

fn add(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	if items.is_empty() {
		return Ok(engine.new_integer(0))
	}

	if is_textual(engine, items[0]) {
		let mut text = String::new();
		for (i, &item) in items.iter().enumerate() {
			ensure!(engine, is_textual(engine, item), "{} argument to builtin '+' must be string \
			        or character when adding text. Type '{}' was given.", ordinal_name(i),
			        engine.type_name(item));
			text.push_str(&engine.plain_string(item));
		}

		return Ok(engine.new_string(text))
	}

	let sum = fold_nums(engine, "+", &items, i32::checked_add, |x, y| x + y)?;
	Ok(new_num(engine, sum))
}

fn sub(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "-", &items, 1)?;

	if items.len() == 1 {
		let negated = match num_arg(engine, "-", 0, items[0])? {
			Num::Int(i) => match i.checked_neg() {
				Some(i) => Num::Int(i),
				None => bail!(engine, "Integer overflow in builtin '-' (negating {}).", i)
			},
			Num::Flo(f) => Num::Flo(-f)
		};
		return Ok(new_num(engine, negated))
	}

	let difference = fold_nums(engine, "-", &items, i32::checked_sub, |x, y| x - y)?;
	Ok(new_num(engine, difference))
}

fn mul(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	if items.is_empty() {
		return Ok(engine.new_integer(1))
	}

	let product = fold_nums(engine, "*", &items, i32::checked_mul, |x, y| x * y)?;
	Ok(new_num(engine, product))
}

fn div(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "/", &items, 1)?;

	if items.len() == 1 {
		let divisor = num_arg(engine, "/", 0, items[0])?.into_f64();
		ensure!(engine, divisor != 0.0, "First argument to builtin '/' cannot be zero, when it \
		        is the only argument.");
		return Ok(engine.new_real(1.0 / divisor))
	}

	for (i, &item) in items.iter().enumerate().skip(1) {
		if let Some(0) = engine.as_integer(item) {
			bail!(engine, "{} argument to builtin '/' cannot be zero. Division by zero.",
			      ordinal_name(i))
		}
	}

	let quotient = fold_nums(engine, "/", &items, i32::checked_div, |x, y| x / y)?;
	Ok(new_num(engine, quotient))
}

fn modulo(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "mod", &items, 2)?;

	let x = super::int_arg(engine, "mod", 0, items[0])?;
	let y = super::int_arg(engine, "mod", 1, items[1])?;
	ensure!(engine, y != 0, "Second argument to builtin 'mod' cannot be zero.");

	match x.checked_rem(y) {
		Some(rem) => Ok(engine.new_integer(rem)),
		None => bail!(engine, "Integer overflow in builtin 'mod' ({} and {}).", x, y)
	}
}

//-------------------------------------------------------------------------------------------------
// in-place mutation
//-------------------------------------------------------------------------------------------------

//numbers are mutable. every binding of a number refers to the same value, so mutating it in
//place is visible through all of them
fn mutate_num(engine: &Engine, name: &str, ordinal: usize, target: Val, by: Num, sign: i32) -> DResult<()> {
	let current = num_arg(engine, name, ordinal, target)?;
	let updated = match (current, by, sign) {
		(Num::Int(x), Num::Int(y), 1) => x.checked_add(y).map(Num::Int),
		(Num::Int(x), Num::Int(y), _) => x.checked_sub(y).map(Num::Int),
		(Num::Int(x), Num::Flo(y), _) => float_to_int(x as f64 + y * sign as f64).map(Num::Int),
		(Num::Flo(x), by, _) => Some(Num::Flo(x + by.into_f64() * sign as f64))
	};

	let updated = match updated {
		Some(updated) => updated,
		None => bail!(engine, "Integer overflow in builtin '{}'.", name)
	};

	engine.with_payload_mut(target, |payload| match (payload, updated) {
		(&mut Payload::Integer(ref mut i), Num::Int(new)) => *i = new,
		(&mut Payload::Real(ref mut f), Num::Flo(new)) => *f = new,
		_ => ()
	});

	Ok(())
}

fn float_to_int(f: f64) -> Option<i32> {
	if f.is_finite() && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
		Some(f.trunc() as i32)
	} else {
		None
	}
}

fn incr(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	step_each(engine, "++", args, 1)
}

fn decr(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	step_each(engine, "--", args, -1)
}

fn step_each(engine: &Engine, name: &str, args: Val, sign: i32) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", name, &items, 1)?;

	for (i, &item) in items.iter().enumerate() {
		mutate_num(engine, name, i, item, Num::Int(1), sign)?;
	}

	Ok(items[0])
}

fn add_assign(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "+=", &items, 2)?;
	let (target, rest) = (items[0], &items[1..]);

	match engine.tag(target) {
		Tag::Integer | Tag::Real => {
			for (i, &item) in rest.iter().enumerate() {
				let by = num_arg(engine, "+=", i + 1, item)?;
				mutate_num(engine, "+=", 0, target, by, 1)?;
			}
		}
		Tag::Str => {
			let suffix: String = rest.iter().map(|&item| engine.plain_string(item)).collect();
			engine.with_payload_mut(target, |payload| {
				if let Payload::Str(ref mut s) = *payload {
					s.push_str(&suffix);
				}
			});
		}
		Tag::Vector | Tag::List | Tag::Queue => {
			for &item in rest {
				engine.seq_push_back(target, item);
			}
		}
		Tag::HashMap => {
			ensure!(engine, rest.len() % 2 == 0, "Builtin '+=' expects key and value pairs when \
			        adding to a hash map. {} values were given.", rest.len());
			for pair in rest.chunks(2) {
				engine.map_insert(target, pair[0], pair[1]);
			}
		}
		_ => bail!(engine, "First argument to builtin '+=' cannot be of type '{}'.",
		           engine.type_name(target))
	}

	Ok(target)
}

fn sub_assign(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "-=", &items, 2)?;
	let (target, rest) = (items[0], &items[1..]);

	match engine.tag(target) {
		Tag::Integer | Tag::Real => {
			for (i, &item) in rest.iter().enumerate() {
				let by = num_arg(engine, "-=", i + 1, item)?;
				mutate_num(engine, "-=", 0, target, by, -1)?;
			}
		}
		Tag::Str => {
			let mut text = engine.as_str(target).unwrap_or_default();
			for (i, &item) in rest.iter().enumerate() {
				ensure!(engine, is_textual(engine, item), "{} argument to builtin '-=' must be \
				        string or character when removing from a string. Type '{}' was given.",
				        ordinal_name(i + 1), engine.type_name(item));

				let needle = engine.plain_string(item);
				if !needle.is_empty() {
					text = text.replace(&needle, "");
				}
			}

			engine.with_payload_mut(target, |payload| {
				if let Payload::Str(ref mut s) = *payload {
					*s = text;
				}
			});
		}
		Tag::Vector | Tag::List | Tag::Queue => {
			//the elements stay reachable through `kept` and the argument vector while the
			//sequence is rebuilt
			let kept: Vec<Val> = engine.seq_items(target).unwrap_or_default().into_iter()
				.filter(|&element| !rest.iter().any(|&item| engine.equal(element, item)))
				.collect();

			let kept_vec = engine.new_vector(kept.clone());
			let _kept_vec = engine.root(kept_vec);

			while engine.seq_pop_back(target).is_some() { }
			for element in kept {
				engine.seq_push_back(target, element);
			}
		}
		Tag::HashMap => {
			for &key in rest {
				engine.map_remove(target, key);
			}
		}
		_ => bail!(engine, "First argument to builtin '-=' cannot be of type '{}'.",
		           engine.type_name(target))
	}

	Ok(target)
}

//-------------------------------------------------------------------------------------------------
// comparison
//-------------------------------------------------------------------------------------------------

fn compare_chain(
	engine: &Engine,
	name: &str,
	args: Val,
	accept: fn(Ordering) -> bool
) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", name, &items, 2)?;

	let mut result = true;
	for pair in items.windows(2) {
		match engine.compare(pair[0], pair[1]) {
			Some(ordering) => result &= accept(ordering),
			None => bail!(engine, "Builtin '{}' cannot compare values of types '{}' and '{}'.",
			              name, engine.type_name(pair[0]), engine.type_name(pair[1]))
		}
	}

	Ok(engine.boolean(result))
}

fn lt(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	compare_chain(engine, "<", args, |ord| ord == Ordering::Less)
}

fn gt(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	compare_chain(engine, ">", args, |ord| ord == Ordering::Greater)
}

fn lte(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	compare_chain(engine, "<=", args, |ord| ord != Ordering::Greater)
}

fn gte(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	compare_chain(engine, ">=", args, |ord| ord != Ordering::Less)
}

fn eq(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "==", &items, 2)?;
	let all_equal = items.windows(2).all(|pair| engine.equal(pair[0], pair[1]));
	Ok(engine.boolean(all_equal))
}

fn same(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "===", &items, 2)?;
	let all_same = items.windows(2).all(|pair| pair[0] == pair[1]);
	Ok(engine.boolean(all_same))
}

fn not_eq(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "!=", &items, 2)?;
	let all_equal = items.windows(2).all(|pair| engine.equal(pair[0], pair[1]));
	Ok(engine.boolean(!all_equal))
}

//-------------------------------------------------------------------------------------------------
// conversion, predicates
//-------------------------------------------------------------------------------------------------

fn to_integer(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "to-integer", &items, 1)?;
	let val = items[0];

	let converted = match engine.tag(val) {
		Tag::Integer => return Ok(val),
		Tag::Real => engine.as_real(val).and_then(float_to_int),
		Tag::Str => engine.as_str(val).and_then(|s| s.trim().parse::<i32>().ok()),
		Tag::Char => engine.as_char(val).map(|c| c as i32),
		_ => bail!(engine, "Builtin 'to-integer' cannot convert a value of type '{}'.",
		           engine.type_name(val))
	};

	match converted {
		Some(i) => Ok(engine.new_integer(i)),
		None => bail!(engine, "Builtin 'to-integer' cannot convert {} into an integer.",
		              engine.repr(val))
	}
}

fn type_predicate(engine: &Engine, name: &str, args: Val, tags: &[Tag]) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", name, &items, 1)?;
	Ok(engine.boolean(tags.contains(&engine.tag(items[0]))))
}

fn integerp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	type_predicate(engine, "integer?", args, &[Tag::Integer])
}

fn realp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	type_predicate(engine, "real?", args, &[Tag::Real])
}

fn numberp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	type_predicate(engine, "number?", args, &[Tag::Integer, Tag::Real])
}

#[cfg(test)]
mod tests {
	use crate::{Runtime, RuntimeBuilder};

	fn int(runtime: &Runtime, source: &str) -> Option<i32> {
		let result = runtime.read_and_eval_str(source);
		runtime.as_integer(result)
	}

	#[test]
	fn arithmetic() {
		let runtime = Runtime::new();
		assert_eq!(int(&runtime, "(+ 1 2 3)"), Some(6));
		assert_eq!(int(&runtime, "(- 10 4 1)"), Some(5));
		assert_eq!(int(&runtime, "(- 3)"), Some(-3));
		assert_eq!(int(&runtime, "(* 2 3 4)"), Some(24));
		assert_eq!(int(&runtime, "(/ 7 2)"), Some(3));
		assert_eq!(int(&runtime, "(mod 7 3)"), Some(1));

		let real = runtime.read_and_eval_str("(+ 1 2.5)");
		assert_eq!(runtime.as_real(real), Some(3.5));

		let err = runtime.read_and_eval_str("(/ 1 0)");
		assert!(runtime.is_error(err));

		let err = runtime.read_and_eval_str("(+ 2147483647 1)");
		assert!(runtime.error_message(err).unwrap().starts_with("Integer overflow"));
	}

	#[test]
	fn text_addition() {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str("(+ [ab] |c| [d])");
		assert_eq!(runtime.as_str(result).as_deref(), Some("abcd"));
	}

	#[test]
	fn in_place_mutation_leaves_source_literals_alone() {
		let runtime = RuntimeBuilder::new().gc_trigger_limit(8).build();
		let result = runtime.read_and_eval_str("
			(define f as (fn () (define n as 0 [n]) (++ n) (+= n 10) n) [f] '() howto-no)
			(f)
			(f)
		");
		assert_eq!(runtime.as_integer(result), Some(11));

		let result = runtime.read_and_eval_str("
			(define v as (vector 1 2 1 3) [v])
			(-= v 1)
			v
		");
		assert_eq!(runtime.repr(result), "(2 3)");

		let result = runtime.read_and_eval_str("
			(define s as [hello] [s])
			(+= s [ world] |!|)
			s
		");
		assert_eq!(runtime.as_str(result).as_deref(), Some("hello world!"));
	}

	#[test]
	fn comparisons() {
		let runtime = Runtime::new();
		let yes = runtime.boolean(true);
		let no = runtime.boolean(false);

		assert_eq!(runtime.read_and_eval_str("(< 1 2 3)"), yes);
		assert_eq!(runtime.read_and_eval_str("(< 1 3 2)"), no);
		assert_eq!(runtime.read_and_eval_str("(>= 2 2.0 1)"), yes);
		assert_eq!(runtime.read_and_eval_str("(< [abc] [abd])"), yes);
		assert_eq!(runtime.read_and_eval_str("(== 1 1.0)"), yes);
		assert_eq!(runtime.read_and_eval_str("(!= [a] [a])"), no);
		assert_eq!(runtime.read_and_eval_str("(< 1.2.3 1.10.0)"), yes);

		let err = runtime.read_and_eval_str("(< 1 [a])");
		assert!(runtime.is_error(err));
	}

	#[test]
	fn conversions() {
		let runtime = Runtime::new();
		assert_eq!(int(&runtime, "(to-integer 3.9)"), Some(3));
		assert_eq!(int(&runtime, "(to-integer [ 42 ])"), Some(42));
		assert_eq!(int(&runtime, "(to-integer |a|)"), Some(97));
		assert!(runtime.is_error(runtime.read_and_eval_str("(to-integer [x])")));

		assert_eq!(runtime.read_and_eval_str("(number? 1.5)"), runtime.boolean(true));
		assert_eq!(runtime.read_and_eval_str("(integer? 1.5)"), runtime.boolean(false));
	}
}
