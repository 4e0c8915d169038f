use dern_engine::{bail, ensure, eprn, pr, prn, DResult, Engine, Escape, Tag, Val};
use std::convert::TryFrom;
use std::io::Write;
use super::{bind_builtin, expect_at_least, expect_count, expect_tag, int_arg, items, str_arg};

pub fn init(engine: &Engine, sandboxed: bool) -> DResult<()> {
	bind_builtin(engine, "return", return_, 0, "Return from the enclosing function, with the \
	             argument as its result")?;
	bind_builtin(engine, "not", not, 1, "Reverse a boolean value")?;
	bind_builtin(engine, "exit", exit, 0, "Quit evaluating, with an optional exit code")?;
	bind_builtin(engine, "abort", abort, 1, "Quit execution with error message")?;
	bind_builtin(engine, "eval", eval, 1, "Evaluate a value in the current or a given \
	             environment")?;

	bind_builtin(engine, "uid", uid, 1, "Get the unique identity of a value")?;
	bind_builtin(engine, "doc", doc, 1, "Get the documentation string of a value")?;
	bind_builtin(engine, "to-string", to_string, 1, "Give the string presentation of values")?;
	bind_builtin(engine, "string-format", string_format, 1, "Create a string, replacing each {} \
	             in the format string with the next argument")?;
	bind_builtin(engine, "print", print, 1, "Print values, formatting them when the first is a \
	             string")?;
	bind_builtin(engine, "println", println, 1, "Print values followed by a newline")?;
	bind_builtin(engine, "starts-with?", starts_withp, 2, "Predicate telling whether a string \
	             starts with another string or character")?;

	bind_builtin(engine, "nil?", nilp, 1, "Predicate telling whether a value is nil")?;
	bind_builtin(engine, "boolean?", booleanp, 1, "Predicate telling whether a value is a \
	             boolean")?;
	bind_builtin(engine, "character?", characterp, 1, "Predicate telling whether a value is a \
	             character")?;
	bind_builtin(engine, "string?", stringp, 1, "Predicate telling whether a value is a string")?;
	bind_builtin(engine, "symbol?", symbolp, 1, "Predicate telling whether a value is a symbol")?;
	bind_builtin(engine, "vector?", vectorp, 1, "Predicate telling whether a value is a vector")?;
	bind_builtin(engine, "hash-map?", hash_mapp, 1, "Predicate telling whether a value is a hash \
	             map")?;

	bind_builtin(engine, "read-and-eval-string", read_and_eval_string, 1, "Read and evaluate \
	             every form in a string, returning the last result")?;
	if !sandboxed {
		bind_builtin(engine, "read-and-eval-path", read_and_eval_path, 1, "Read and evaluate \
		             every form in a file, returning the last result")?;
	}

	bind_builtin(engine, "host-get-command-line-arguments", command_line_arguments, 0, "Get the \
	             command line arguments the host made available, as a vector of strings")?;
	bind_builtin(engine, "host-get-environment-variables", environment_variables, 0, "Get the \
	             environment variables the host made available, as a vector of strings")?;

	Ok(())
}

//-------------------------------------------------------------------------------------------------
// control
//-------------------------------------------------------------------------------------------------

fn return_(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() <= 1, "Builtin 'return' expects zero or one arguments. {} \
	        arguments were given.", items.len());

	let val = items.first().copied().unwrap_or_else(|| engine.nil());
	engine.set_function_return(val);
	Ok(val)
}

fn not(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "not", &items, 1)?;

	match engine.as_boolean(items[0]) {
		Some(b) => Ok(engine.boolean(!b)),
		None => bail!(engine, "First argument to builtin 'not' must be boolean. Type '{}' was \
		              given.", engine.type_name(items[0]))
	}
}

fn exit(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() <= 1, "Builtin 'exit' expects zero or one arguments. {} \
	        arguments were given.", items.len());

	if let Some(&code) = items.first() {
		engine.set_exit_code(int_arg(engine, "exit", 0, code)?);
	}

	engine.quit();
	Ok(engine.nil())
}

//prints the message, then aborts the process
fn abort(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "abort", &items, 1)?;

	eprn!(engine, "{}", engine.plain_string(items[0]));
	engine.epr_writer().flush().ok();
	std::process::abort()
}

fn eval(engine: &Engine, args: Val, env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() == 1 || items.len() == 2, "Builtin 'eval' expects one or two \
	        arguments. {} arguments were given.", items.len());

	let target = match items.get(1) {
		Some(&target) => {
			expect_tag(engine, "eval", 1, target, Tag::Environment)?;
			target
		}
		None => env
	};

	engine.eval_step(items[0], target)
}

//-------------------------------------------------------------------------------------------------
// introspection
//-------------------------------------------------------------------------------------------------

fn uid(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "uid", &items, 1)?;

	let uid = engine.uid(items[0]);
	match i32::try_from(uid) {
		Ok(uid) => Ok(engine.new_integer(uid)),
		Err(_) => Ok(engine.new_real(uid as f64))
	}
}

fn doc(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "doc", &items, 1)?;

	let doc = match engine.doc(items[0]) {
		Some(doc) => doc,
		None => return Ok(engine.nil())
	};

	//a documented callable lists its formals after the main text
	let entries = match engine.doc_vec(items[0]).and_then(|vec| engine.seq_items(vec)) {
		Some(entries) if !entries.is_empty() => entries,
		_ => return Ok(doc)
	};

	let mut text = engine.plain_string(doc);
	text.push_str("\nArguments are:");
	for pair in entries.chunks(2) {
		let formal = engine.plain_string(pair[0]);
		let formal_doc = pair.get(1).map(|&d| engine.plain_string(d)).unwrap_or_default();
		text.push_str(&format!("\n{} -> {}", formal, formal_doc));
	}

	Ok(engine.new_string(text))
}

//-------------------------------------------------------------------------------------------------
// text and output
//-------------------------------------------------------------------------------------------------

fn to_string(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "to-string", &items, 1)?;

	let text: String = items.iter().map(|&item| engine.plain_string(item)).collect();
	Ok(engine.new_string(text))
}

//replaces each {} in `format` with the next value, in its plain form
fn format_values(engine: &Engine, name: &str, format: &str, values: &[Val]) -> DResult<String> {
	let pieces: Vec<&str> = format.split("{}").collect();
	ensure!(engine, pieces.len() - 1 == values.len(), "Builtin '{}' expects {} values for the \
	        format string. {} values were given.", name, pieces.len() - 1, values.len());

	let mut text = String::from(pieces[0]);
	for (piece, &value) in pieces[1..].iter().zip(values) {
		text.push_str(&engine.plain_string(value));
		text.push_str(piece);
	}

	Ok(text)
}

fn string_format(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", "string-format", &items, 1)?;

	let format = str_arg(engine, "string-format", 0, items[0])?;
	let text = format_values(engine, "string-format", &format, &items[1..])?;
	Ok(engine.new_string(text))
}

fn printable(engine: &Engine, name: &str, args: Val) -> DResult<String> {
	let items = items(engine, args);
	expect_at_least(engine, "builtin", name, &items, 1)?;

	match engine.as_str(items[0]) {
		Some(format) => format_values(engine, name, &format, &items[1..]),
		None => {
			expect_count(engine, "builtin", name, &items, 1)?;
			Ok(engine.plain_string(items[0]))
		}
	}
}

fn print(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let text = printable(engine, "print", args)?;
	pr!(engine, "{}", text);
	Ok(engine.nil())
}

fn println(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let text = printable(engine, "println", args)?;
	prn!(engine, "{}", text);
	Ok(engine.nil())
}

fn starts_withp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "starts-with?", &items, 2)?;

	let text = str_arg(engine, "starts-with?", 0, items[0])?;
	ensure!(engine, matches!(engine.tag(items[1]), Tag::Str | Tag::Char), "Second argument to \
	        builtin 'starts-with?' must be string or character. Type '{}' was given.",
	        engine.type_name(items[1]));

	let prefix = engine.plain_string(items[1]);
	Ok(engine.boolean(text.starts_with(&prefix)))
}

//-------------------------------------------------------------------------------------------------
// predicates
//-------------------------------------------------------------------------------------------------

fn is_tag(engine: &Engine, name: &str, args: Val, tag: Tag) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", name, &items, 1)?;
	Ok(engine.boolean(engine.tag(items[0]) == tag))
}

fn nilp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	is_tag(engine, "nil?", args, Tag::Nil)
}

fn booleanp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	is_tag(engine, "boolean?", args, Tag::Boolean)
}

fn characterp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	is_tag(engine, "character?", args, Tag::Char)
}

fn stringp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	is_tag(engine, "string?", args, Tag::Str)
}

fn symbolp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	is_tag(engine, "symbol?", args, Tag::Symbol)
}

fn vectorp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	is_tag(engine, "vector?", args, Tag::Vector)
}

fn hash_mapp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	is_tag(engine, "hash-map?", args, Tag::HashMap)
}

//-------------------------------------------------------------------------------------------------
// loading, host data
//-------------------------------------------------------------------------------------------------

fn settled(engine: &Engine, result: Val) -> DResult<Val> {
	if engine.is_error(result) {
		Err(Escape::Error(result))
	} else {
		Ok(result)
	}
}

fn read_and_eval_string(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "read-and-eval-string", &items, 1)?;

	let text = str_arg(engine, "read-and-eval-string", 0, items[0])?;
	settled(engine, engine.read_and_eval_str(&text))
}

fn read_and_eval_path(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "read-and-eval-path", &items, 1)?;

	let path = str_arg(engine, "read-and-eval-path", 0, items[0])?;
	settled(engine, engine.read_and_eval_path(&path))
}

fn strings_vector(engine: &Engine, strings: Vec<String>) -> Val {
	let vec = engine.new_vector(Vec::with_capacity(strings.len()));
	let _vec = engine.root(vec);

	for s in strings {
		let s = engine.new_string(s);
		engine.vector_push(vec, s);
	}

	vec
}

fn command_line_arguments(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	expect_count(engine, "builtin", "host-get-command-line-arguments", &items(engine, args), 0)?;
	Ok(strings_vector(engine, engine.command_line_arguments()))
}

fn environment_variables(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	expect_count(engine, "builtin", "host-get-environment-variables", &items(engine, args), 0)?;
	Ok(strings_vector(engine, engine.environment_variables()))
}

#[cfg(test)]
mod tests {
	use crate::{Runtime, RuntimeBuilder};
	use std::cell::RefCell;
	use std::io::{self, Write};
	use std::rc::Rc;

	#[derive(Clone, Default)]
	struct Capture(Rc<RefCell<Vec<u8>>>);

	impl Write for Capture {
		fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
			self.0.borrow_mut().extend_from_slice(bytes);
			Ok(bytes.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl Capture {
		fn text(&self) -> String {
			String::from_utf8_lossy(&self.0.borrow()).into_owned()
		}
	}

	#[test]
	fn printing_goes_to_the_pr_writer() {
		let capture = Capture::default();
		let runtime = RuntimeBuilder::new().pr_writer(Box::new(capture.clone())).build();

		runtime.read_and_eval_str("
			(println [x is {} and y is {}] 1 [two])
			(print |c|)
			(println (vector 1 [s]))
		");
		assert_eq!(capture.text(), "x is 1 and y is two\nc(1 [s])\n");

		let err = runtime.read_and_eval_str("(println [{} {}] 1)");
		assert!(runtime.is_error(err));
	}

	#[test]
	fn exit_sets_the_code_and_quits() {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str("(exit 3) (println [never])");
		assert_eq!(result, runtime.nil());
		assert!(runtime.is_quit());
		assert_eq!(runtime.exit_code(), 3);
	}

	#[test]
	fn eval_and_strings() {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str("(eval '(+ 1 2))");
		assert_eq!(runtime.as_integer(result), Some(3));

		let result = runtime.read_and_eval_str("(read-and-eval-string [(+ 2 3) (* 2 3)])");
		assert_eq!(runtime.as_integer(result), Some(6));

		let result = runtime.read_and_eval_str("(string-format [{}-{}] 1 |x|)");
		assert_eq!(runtime.as_str(result).as_deref(), Some("1-x"));

		let result = runtime.read_and_eval_str("(to-string 1.5 [a])");
		assert_eq!(runtime.as_str(result).as_deref(), Some("1.5a"));

		assert_eq!(runtime.read_and_eval_str("(starts-with? [dern] [de])"), runtime.boolean(true));
		assert_eq!(runtime.read_and_eval_str("(not true)"), runtime.boolean(false));
		assert_eq!(runtime.read_and_eval_str("(nil? nil)"), runtime.boolean(true));
	}

	#[test]
	fn host_data_is_visible() {
		let runtime = Runtime::new();
		runtime.add_command_line_argument("--fast");
		runtime.add_environment_variable("HOME=/home/dern");

		let result = runtime.read_and_eval_str("(host-get-command-line-arguments)");
		assert_eq!(runtime.repr(result), "([--fast])");

		let result = runtime.read_and_eval_str("(nth 0 (host-get-environment-variables))");
		assert_eq!(runtime.as_str(result).as_deref(), Some("HOME=/home/dern"));
	}

	#[test]
	fn sandboxing_hides_the_file_system() {
		let runtime = RuntimeBuilder::new().sandboxed(true).build();
		let err = runtime.read_and_eval_str("(read-and-eval-path [anything.dern])");
		assert!(runtime.error_message(err).unwrap().starts_with("Unbound symbol"));
	}

	#[test]
	fn doc_lists_documented_formals() {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str("
			(define my-inc as (fn (value) (++ value)) [my own inc-function]
				'(value [the value to increase]) howto-ok)
			(doc my-inc)
		");
		assert_eq!(runtime.as_str(result).as_deref(),
		           Some("my own inc-function\nArguments are:\nvalue -> the value to increase"));

		let result = runtime.read_and_eval_str("(define n as 1 [a number]) (doc n)");
		assert_eq!(runtime.as_str(result).as_deref(), Some("a number"));
	}

	#[test]
	fn abort_checks_its_arguments() {
		let runtime = Runtime::new();
		let err = runtime.read_and_eval_str("(abort)");
		assert!(runtime.is_error(err));
		assert!(!runtime.is_quit());
	}
}
