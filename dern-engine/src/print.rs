use smallvec::SmallVec;
use std::fmt::Write;
use super::engine::Engine;
use super::lex::char_name;
use super::val::{Payload, Val};

/*
the printer writes the same syntax the reader accepts wherever one exists, so printed data can
usually be read back in. values with no literal syntax print in angle brackets.

containers can refer to themselves. a container which is already being printed further up the
current path prints as `...` instead.
*/

impl Engine {
	///The printed representation of a value: strings as `[text]`, characters as `|c|`.
	pub fn repr(&self, val: Val) -> String {
		let mut out = String::new();
		self.write_val(&mut out, val, false, &mut SmallVec::new());
		out
	}

	///Like [`repr`](#method.repr), except that a top-level string or character prints as its
	///raw text. Used by `print` and `to-string`.
	pub fn plain_string(&self, val: Val) -> String {
		let mut out = String::new();
		self.write_val(&mut out, val, true, &mut SmallVec::new());
		out
	}

	fn write_val(&self, out: &mut String, val: Val, plain: bool, path: &mut SmallVec<[Val; 8]>) {
		if path.contains(&val) {
			out.push_str("...");
			return
		}

		let children = self.with_payload(val, |payload| {
			match *payload {
				Payload::Nil => out.push_str("nil"),
				Payload::Boolean(b) => out.push_str(if b { "true" } else { "false" }),
				Payload::Integer(i) => write!(out, "{}", i).unwrap_or(()),
				Payload::Real(f) => write!(out, "{:?}", f).unwrap_or(()),
				Payload::Str(ref s) if plain => out.push_str(s),
				Payload::Str(ref s) => write_string_literal(out, s),
				Payload::Char(c) if plain => out.push(c),
				Payload::Char(c) => match char_name(c) {
					Some(name) if matches!(c, '\n' | '\t' | '|') => {
						write!(out, "|{}|", name).unwrap_or(())
					}
					_ => write!(out, "|{}|", c).unwrap_or(())
				},
				Payload::Symbol(sym) => out.push_str(&self.sym_name(sym)),
				Payload::Error(ref data) => write!(out, "<error>: {}", data.message).unwrap_or(()),
				Payload::Vector(ref items) => return Some(("(", items.clone())),
				Payload::List(ref items) => return Some(("(list", items.iter().copied().collect())),
				Payload::Queue(ref queue) => {
					return Some(("(queue", queue.items().iter().copied().collect()))
				}
				Payload::HashMap(ref map) => {
					let flat = map.entries().iter().flat_map(|&(k, v)| vec![k, v]).collect();
					return Some(("(hash-map", flat))
				}
				Payload::Environment(_) => out.push_str("<environment>"),
				Payload::Function(ref closure) => write_callable(out, "fn", closure.name()),
				Payload::Macro(ref closure) => write_callable(out, "macro", closure.name()),
				Payload::Special(ref native) => write_callable(out, "special", Some(&*native.name)),
				Payload::Builtin(ref native) => write_callable(out, "builtin", Some(&*native.name)),
				Payload::Port(ref port) => {
					let kind = if port.supports_input() {
						"input-port"
					} else if port.supports_output() {
						"output-port"
					} else {
						"closed-port"
					};
					write!(out, "<{}:{}>", kind, port.name()).unwrap_or(())
				}
				Payload::HostData(ref data) => {
					write!(out, "<host-data {}:{}>", data.plugin, data.type_name).unwrap_or(())
				}
				Payload::SemVer(ref semver) => write!(out, "{}", semver).unwrap_or(())
			}

			None
		});

		if let Some((open, items)) = children {
			out.push_str(open);
			path.push(val);

			for (i, &item) in items.iter().enumerate() {
				if i > 0 || open != "(" {
					out.push(' ');
				}
				self.write_val(out, item, false, path);
			}

			path.pop();
			out.push(')');
		}
	}
}

fn write_string_literal(out: &mut String, s: &str) {
	out.push('[');
	for c in s.chars() {
		match c {
			'\n' | '\t' | '|' | '[' | ']' => {
				out.push('|');
				out.push_str(char_name(c).unwrap_or(""));
				out.push('|');
			}
			c => out.push(c)
		}
	}
	out.push(']');
}

fn write_callable(out: &mut String, kind: &str, name: Option<&str>) {
	match name {
		Some(name) => write!(out, "<{} {}>", kind, name).unwrap_or(()),
		None => write!(out, "<{}>", kind).unwrap_or(())
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::EngineBuilder;

	#[test]
	fn scalars() {
		let engine = EngineBuilder::new().prevent_gc(true).build();

		assert_eq!(engine.repr(engine.new_integer(-12)), "-12");
		assert_eq!(engine.repr(engine.new_real(3.0)), "3.0");
		assert_eq!(engine.repr(engine.new_real(2.5)), "2.5");
		assert_eq!(engine.repr(engine.nil()), "nil");

		let s = engine.new_string("a|b\n[c]");
		assert_eq!(engine.repr(s), "[a|bar|b|newline||string-start|c|string-end|]");
		assert_eq!(engine.plain_string(s), "a|b\n[c]");

		assert_eq!(engine.repr(engine.new_char('x')), "|x|");
		assert_eq!(engine.repr(engine.new_char('\t')), "|tab|");
		assert_eq!(engine.plain_string(engine.new_char('x')), "x");

		assert_eq!(engine.repr(engine.new_error("bad")), "<error>: bad");
	}

	#[test]
	fn containers() {
		let engine = EngineBuilder::new().prevent_gc(true).build();

		let one = engine.new_integer(1);
		let s = engine.new_string("s");
		let vec = engine.new_vector(vec![one, s]);
		assert_eq!(engine.repr(vec), "(1 [s])");
		assert_eq!(engine.plain_string(vec), "(1 [s])");
		assert_eq!(engine.repr(engine.new_vector(Vec::new())), "()");

		let map = engine.new_hash_map();
		engine.map_insert(map, s, one);
		assert_eq!(engine.repr(map), "(hash-map [s] 1)");

		let list = engine.new_list(vec![one].into_iter().collect());
		assert_eq!(engine.repr(list), "(list 1)");
		assert_eq!(engine.repr(engine.new_queue(None)), "(queue)");
	}

	#[test]
	fn self_containing_vector() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let vec = engine.new_vector(Vec::new());
		engine.vector_push(vec, vec);
		assert_eq!(engine.repr(vec), "(...)");
	}
}
