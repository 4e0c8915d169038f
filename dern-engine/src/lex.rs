use std::iter::Peekable;
use std::str::Chars;
use super::semver::SemVer;

//-------------------------------------------------------------------------------------------------
// Token
//-------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
	Open,
	Close,
	Quote,
	Str(String),
	Char(char),
	Int(i32),
	Flo(f64),
	SemVer(SemVer),
	True,
	False,
	Nil,
	Sym(String)
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LexError {
	pub(crate) message: String,
	pub(crate) line: usize
}

//these names are shared by character literals and by escapes inside strings
const CHAR_NAMES: [(&str, char); 6] = [
	("newline", '\n'),
	("tab", '\t'),
	("bar", '|'),
	("string-start", '['),
	("string-end", ']'),
	("space", ' ')
];

pub(crate) fn char_from_name(name: &str) -> Option<char> {
	CHAR_NAMES.iter().find(|&&(n, _)| n == name).map(|&(_, c)| c)
}

pub(crate) fn char_name(c: char) -> Option<&'static str> {
	CHAR_NAMES.iter().find(|&&(_, ch)| ch == c).map(|&(n, _)| n)
}

fn is_delimiter(c: char) -> bool {
	c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '|' | '\'' | ';' | '{' | '}')
}

//-------------------------------------------------------------------------------------------------
// Lexer
//-------------------------------------------------------------------------------------------------

/**
Splits source text into tokens, one at a time, tracking the 1-based line number.
*/

pub(crate) struct Lexer<'a> {
	chars: Peekable<Chars<'a>>,
	line: usize
}

impl<'a> Lexer<'a> {
	pub(crate) fn new(text: &'a str) -> Lexer<'a> {
		Lexer {
			chars: text.chars().peekable(),
			line: 1
		}
	}

	pub(crate) fn line(&self) -> usize {
		self.line
	}

	fn next_char(&mut self) -> Option<char> {
		let c = self.chars.next()?;
		if c == '\n' {
			self.line += 1;
		}
		Some(c)
	}

	fn error<T>(&self, message: String) -> Result<T, LexError> {
		Err(LexError { message, line: self.line })
	}

	//skips whitespace and both comment syntaxes
	fn skip_trivia(&mut self) -> Result<(), LexError> {
		loop {
			match self.chars.peek() {
				Some(&c) if c.is_whitespace() => {
					self.next_char();
				}
				Some(';') => {
					while let Some(c) = self.next_char() {
						if c == '\n' {
							break
						}
					}
				}
				Some('#') => {
					let start = self.line;
					self.next_char();
					if self.next_char() != Some('!') {
						return self.error("Expected '!' after '#' to start a multiline \
						                   comment".to_string())
					}

					let mut prev = '\0';
					loop {
						match self.next_char() {
							Some('#') if prev == '!' => break,
							Some(c) => prev = c,
							None => {
								return self.error(format!("Unterminated multiline comment \
								                           starting at line {}", start))
							}
						}
					}
				}
				_ => return Ok(())
			}
		}
	}

	pub(crate) fn next_token(&mut self) -> Option<Result<Token, LexError>> {
		if let Err(err) = self.skip_trivia() {
			return Some(Err(err))
		}

		let c = *self.chars.peek()?;
		let token = match c {
			'(' => {
				self.next_char();
				Ok(Token::Open)
			}
			')' => {
				self.next_char();
				Ok(Token::Close)
			}
			'\'' => {
				self.next_char();
				Ok(Token::Quote)
			}
			'[' => self.lex_string(),
			'|' => self.lex_char(),
			'{' => self.lex_radix_number(),
			']' | '}' => {
				self.next_char();
				self.error(format!("Unexpected '{}'", c))
			}
			_ => self.lex_atom()
		};

		Some(token)
	}

	fn lex_string(&mut self) -> Result<Token, LexError> {
		let start = self.line;
		self.next_char();

		let mut text = String::new();
		loop {
			match self.next_char() {
				Some(']') => return Ok(Token::Str(text)),
				Some('|') => {
					let name = self.read_until_bar(start)?;
					match char_from_name(&name) {
						Some(c) => text.push(c),
						None => {
							return self.error(format!("Unknown escape '|{}|' in string", name))
						}
					}
				}
				Some(c) => text.push(c),
				None => return self.error(format!("Unterminated string starting at line {}", start))
			}
		}
	}

	fn read_until_bar(&mut self, start: usize) -> Result<String, LexError> {
		let mut name = String::new();
		loop {
			match self.next_char() {
				Some('|') => return Ok(name),
				Some(c) => name.push(c),
				None => {
					return self.error(format!("Unterminated '|' starting at line {}", start))
				}
			}
		}
	}

	fn lex_char(&mut self) -> Result<Token, LexError> {
		let start = self.line;
		self.next_char();

		let name = self.read_until_bar(start)?;
		let mut chars = name.chars();
		match (chars.next(), chars.next()) {
			(Some(c), None) => Ok(Token::Char(c)),
			_ => match char_from_name(&name) {
				Some(c) => Ok(Token::Char(c)),
				None => self.error(format!("Unknown character name '|{}|'", name))
			}
		}
	}

	//{D+10}, {X-FF}, {O+17}, {B+101}, {D+1.5}. spaces may separate digits.
	fn lex_radix_number(&mut self) -> Result<Token, LexError> {
		self.next_char();

		let mut body = String::new();
		loop {
			match self.next_char() {
				Some('}') => break,
				Some(c) if c.is_whitespace() => (),
				Some(c) => body.push(c),
				None => return self.error("Unterminated number literal".to_string())
			}
		}

		let mut chars = body.chars();
		let radix = match chars.next() {
			Some('X') => 16,
			Some('D') => 10,
			Some('O') => 8,
			Some('B') => 2,
			_ => return self.error(format!("Number literal '{{{}}}' must start with one of \
			                                'X', 'D', 'O' or 'B'", body))
		};

		let negative = match chars.next() {
			Some('+') => false,
			Some('-') => true,
			_ => return self.error(format!("Number literal '{{{}}}' must have a '+' or '-' \
			                                sign after its radix", body))
		};

		let digits: String = chars.collect();
		let (whole, fraction) = match digits.find('.') {
			Some(i) => (&digits[..i], Some(&digits[i + 1..])),
			None => (&digits[..], None)
		};

		if whole.is_empty() {
			return self.error(format!("Number literal '{{{}}}' has no digits", body))
		}

		let mut value = 0f64;
		for c in whole.chars() {
			match c.to_digit(radix) {
				Some(d) => value = value * radix as f64 + d as f64,
				None => return self.error(format!("Invalid digit '{}' in number literal \
				                                   '{{{}}}'", c, body))
			}
		}

		match fraction {
			None => {
				let value = if negative { -value } else { value };
				if value < i32::MIN as f64 || value > i32::MAX as f64 {
					return self.error(format!("Number literal '{{{}}}' is out of range", body))
				}
				Ok(Token::Int(value as i32))
			}
			Some(fraction) => {
				ensure_lex(!fraction.contains('.'), self.line,
				           "Number can contain only one '.' character")?;

				let mut scale = 1f64 / radix as f64;
				for c in fraction.chars() {
					match c.to_digit(radix) {
						Some(d) => value += d as f64 * scale,
						None => return self.error(format!("Invalid digit '{}' in number \
						                                   literal '{{{}}}'", c, body))
					}
					scale /= radix as f64;
				}

				Ok(Token::Flo(if negative { -value } else { value }))
			}
		}
	}

	fn lex_atom(&mut self) -> Result<Token, LexError> {
		let mut text = String::new();
		while let Some(&c) = self.chars.peek() {
			if is_delimiter(c) {
				break
			}
			text.push(c);
			self.next_char();
		}

		match &text[..] {
			"true" => return Ok(Token::True),
			"false" => return Ok(Token::False),
			"nil" => return Ok(Token::Nil),
			_ => ()
		}

		let unsigned = text.strip_prefix('-').or_else(|| text.strip_prefix('+')).unwrap_or(&text);
		if !unsigned.starts_with(|c: char| c.is_ascii_digit()) {
			return Ok(Token::Sym(text))
		}

		match unsigned.matches('.').count() {
			0 => match text.parse::<i32>() {
				Ok(i) => Ok(Token::Int(i)),
				Err(_) if unsigned.chars().all(|c| c.is_ascii_digit()) => {
					self.error(format!("Integer literal '{}' is out of range", text))
				}
				Err(_) => self.error(format!("Malformed number '{}'", text))
			},
			1 => match text.parse::<f64>() {
				Ok(f) => Ok(Token::Flo(f)),
				Err(_) => self.error(format!("Malformed number '{}'", text))
			},
			_ if unsigned.len() == text.len() => match SemVer::parse(&text) {
				Ok(semver) => Ok(Token::SemVer(semver)),
				Err(message) => self.error(format!("{} in '{}'", message, text))
			},
			_ => self.error(format!("Malformed number '{}'", text))
		}
	}
}

fn ensure_lex(cond: bool, line: usize, message: &str) -> Result<(), LexError> {
	if cond {
		Ok(())
	} else {
		Err(LexError { message: message.to_string(), line })
	}
}
