use std::io::Read;
use std::path::Path;
use super::engine::Engine;
use super::error::{DResult, Escape};
use super::lex::{LexError, Lexer, Token};
use super::val::Val;

//-------------------------------------------------------------------------------------------------
// Reader
//-------------------------------------------------------------------------------------------------

/**
Reads forms from source text, one at a time.

Forms are built with the same constructors that the rest of the engine uses, so a parsed
program is indistinguishable from data constructed at runtime: compound forms become vectors,
and `'x` becomes the two-element vector `(quote x)`.

Parse failures are reported as error values which carry the line number.
*/

pub struct Reader<'a> {
	lexer: Lexer<'a>
}

impl<'a> Reader<'a> {
	pub fn new(text: &'a str) -> Reader<'a> {
		Reader { lexer: Lexer::new(text) }
	}

	pub fn line(&self) -> usize {
		self.lexer.line()
	}

	/**
	Reads the next form. Returns `None` at the end of the input. The form is unrooted.
	*/
	pub fn next_form(&mut self, engine: &Engine) -> Option<DResult<Val>> {
		let token = match self.lexer.next_token()? {
			Ok(token) => token,
			Err(err) => return Some(Err(lex_error(engine, err)))
		};

		Some(self.parse_token(engine, token))
	}

	fn parse_token(&mut self, engine: &Engine, token: Token) -> DResult<Val> {
		Ok(match token {
			Token::Open => return self.parse_vector(engine),
			Token::Close => {
				return Err(Escape::Error(engine.new_error_at("Unexpected ')'", self.line())))
			}
			Token::Quote => {
				let line = self.line();
				let quoted = match self.lexer.next_token() {
					Some(Ok(token)) => self.parse_token(engine, token)?,
					Some(Err(err)) => return Err(lex_error(engine, err)),
					None => {
						return Err(Escape::Error(engine.new_error_at(
							"Quote at the end of input has nothing to quote", line
						)))
					}
				};

				let _quoted = engine.root(quoted);
				let quote = engine.new_symbol("quote");
				engine.new_vector(vec![quote, quoted])
			}
			Token::Str(text) => engine.new_string(text),
			Token::Char(c) => engine.new_char(c),
			Token::Int(i) => engine.new_integer(i),
			Token::Flo(f) => engine.new_real(f),
			Token::SemVer(semver) => engine.new_semver(semver),
			Token::True => engine.boolean(true),
			Token::False => engine.boolean(false),
			Token::Nil => engine.nil(),
			Token::Sym(name) => engine.new_symbol(&name)
		})
	}

	fn parse_vector(&mut self, engine: &Engine) -> DResult<Val> {
		let start = self.line();
		let vec = engine.new_vector(Vec::new());
		let _vec = engine.root(vec);

		loop {
			let token = match self.lexer.next_token() {
				Some(Ok(Token::Close)) => return Ok(vec),
				Some(Ok(token)) => token,
				Some(Err(err)) => return Err(lex_error(engine, err)),
				None => {
					return Err(Escape::Error(engine.new_error_at(
						format!("Unterminated '(' starting at line {}", start), self.line()
					)))
				}
			};

			let item = self.parse_token(engine, token)?;
			engine.vector_push(vec, item);
		}
	}
}

fn lex_error(engine: &Engine, err: LexError) -> Escape {
	Escape::Error(engine.new_error_at(err.message, err.line))
}

//-------------------------------------------------------------------------------------------------
// read and eval
//-------------------------------------------------------------------------------------------------

impl Engine {
	/**
	Parses every form in `text` without evaluating anything, returning a vector of the forms,
	or the first parse error.
	*/
	pub fn read_all(&self, text: &str) -> Val {
		let forms = self.new_vector(Vec::new());
		let _forms = self.root(forms);

		let mut reader = Reader::new(text);
		while let Some(form) = reader.next_form(self) {
			match form {
				Ok(form) => {
					self.vector_push(forms, form);
				}
				Err(escape) => return escape.into_val()
			}
		}

		forms
	}

	/**
	Reads each form in `text` and evaluates it in the global environment before reading the
	next one.

	Returns the result of the last form, or the first error, which stops everything after it.
	A `return` fired inside an enclosing function also stops the remaining forms. Empty input
	evaluates to `nil`.
	*/
	pub fn read_and_eval_str(&self, text: &str) -> Val {
		let mut last_root = self.root(self.nil());
		let mut last = self.nil();

		let mut reader = Reader::new(text);
		while let Some(form) = reader.next_form(self) {
			let form = match form {
				Ok(form) => form,
				Err(escape) => return escape.into_val()
			};

			let form_root = self.root(form);
			let result = self.eval(form, self.global_env());
			drop(form_root);

			drop(last_root);
			last_root = self.root(result);
			last = result;

			if self.is_error(result) || self.is_quit() || self.function_return().is_some() {
				break
			}
		}

		drop(last_root);
		last
	}

	///Reads all of `reader` as UTF-8 text, then behaves like `read_and_eval_str`.
	pub fn read_and_eval_reader<R: Read>(&self, mut reader: R) -> Val {
		let mut text = String::new();
		match reader.read_to_string(&mut text) {
			Ok(_) => self.read_and_eval_str(&text),
			Err(err) => self.new_error(format!("Cannot read input: {}", err))
		}
	}

	pub fn read_and_eval_path<P: AsRef<Path>>(&self, path: P) -> Val {
		let path = path.as_ref();
		match std::fs::read_to_string(path) {
			Ok(text) => self.read_and_eval_str(&text),
			Err(err) => self.new_error(format!("Cannot read file '{}': {}", path.display(), err))
		}
	}

	///Reads a single form from `text`, ignoring anything after it. Empty input reads as `nil`.
	pub fn read_form(&self, text: &str) -> Val {
		match Reader::new(text).next_form(self) {
			Some(Ok(form)) => form,
			Some(Err(escape)) => escape.into_val(),
			None => self.nil()
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::EngineBuilder;
	use crate::val::Tag;

	#[test]
	fn nested_forms_and_quote() {
		let engine = EngineBuilder::new().gc_trigger_limit(4).build();
		let forms = engine.read_all("(a (b 'c) [s]) 1");
		let _forms = engine.root(forms);

		assert_eq!(engine.vector_len(forms), Some(2));
		let first = engine.vector_get(forms, 0).unwrap();
		assert_eq!(engine.repr(first), "(a (b (quote c)) [s])");
		assert_eq!(engine.tag(engine.vector_get(forms, 1).unwrap()), Tag::Integer);
	}

	#[test]
	fn literals_read_as_the_shared_constants() {
		let engine = EngineBuilder::new().build();
		assert_eq!(engine.read_form("nil"), engine.nil());
		assert_eq!(engine.read_form("true"), engine.boolean(true));
		assert_eq!(engine.read_form("false"), engine.boolean(false));
	}

	#[test]
	fn errors_carry_lines() {
		let engine = EngineBuilder::new().build();

		let err = engine.read_all("(a\n(b c)\n");
		assert_eq!(engine.tag(err), Tag::Error);
		assert!(engine.error_message(err).unwrap().starts_with("Unterminated '('"));

		let err = engine.read_all("\n\n)");
		assert_eq!(engine.error_line(err), Some(3));

		assert_eq!(engine.read_and_eval_str(""), engine.nil());
	}

	#[test]
	fn reading_keeps_the_root_stack_balanced() {
		let engine = EngineBuilder::new().gc_trigger_limit(0).build();
		let len = engine.root_stack_len();

		engine.read_all("((((1 2) [x]) 'y) |c|)");
		engine.read_and_eval_str("1 2 3");
		engine.read_all("(unterminated");

		assert_eq!(engine.root_stack_len(), len);
	}
}
