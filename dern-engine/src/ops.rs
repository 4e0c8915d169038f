use fnv::FnvHashMap;
use std::cmp::Ordering;
use std::collections::VecDeque;
use super::engine::Engine;
use super::error::DResult;
use super::val::{Payload, Tag, Val};

//-------------------------------------------------------------------------------------------------
// equality and ordering
//-------------------------------------------------------------------------------------------------

impl Engine {
	/**
	Structural equality, `==`.

	Integers and reals compare numerically. Strings, characters, symbols, semvers and errors
	compare by content. Vectors, lists and queues compare element-wise, and hash-maps compare
	entry-wise regardless of insertion order. Everything else compares by identity.
	*/
	pub fn equal(&self, a: Val, b: Val) -> bool {
		self.equal_inner(a, b, &mut Vec::new())
	}

	fn equal_inner(&self, a: Val, b: Val, path: &mut Vec<(Val, Val)>) -> bool {
		if a == b || path.contains(&(a, b)) {
			return true
		}

		if let (Some(x), Some(y)) = (self.as_number(a), self.as_number(b)) {
			return x == y
		}

		let (tag_a, tag_b) = (self.tag(a), self.tag(b));
		if tag_a != tag_b {
			return false
		}

		match tag_a {
			Tag::Vector | Tag::List | Tag::Queue => {
				let (xs, ys) = match (self.seq_items(a), self.seq_items(b)) {
					(Some(xs), Some(ys)) => (xs, ys),
					_ => return false
				};

				if xs.len() != ys.len() {
					return false
				}

				path.push((a, b));
				let result = xs.iter().zip(ys.iter()).all(|(&x, &y)| self.equal_inner(x, y, path));
				path.pop();
				result
			}
			Tag::HashMap => {
				let (xs, ys) = match (self.map_entries(a), self.map_entries(b)) {
					(Some(xs), Some(ys)) => (xs, ys),
					_ => return false
				};

				if xs.len() != ys.len() {
					return false
				}

				path.push((a, b));
				let result = xs.iter().all(|&(key, x)| match self.map_get(b, key) {
					Some(y) => self.equal_inner(x, y, path),
					None => false
				});
				path.pop();
				result
			}
			_ => self.with_payload(a, |pa| self.with_payload(b, |pb| match (pa, pb) {
				(&Payload::Nil, &Payload::Nil) => true,
				(&Payload::Boolean(x), &Payload::Boolean(y)) => x == y,
				(&Payload::Str(ref x), &Payload::Str(ref y)) => x == y,
				(&Payload::Char(x), &Payload::Char(y)) => x == y,
				(&Payload::Symbol(x), &Payload::Symbol(y)) => x == y,
				(&Payload::SemVer(ref x), &Payload::SemVer(ref y)) => x == y,
				(&Payload::Error(ref x), &Payload::Error(ref y)) => x.message == y.message,
				_ => false
			}))
		}
	}

	/**
	Ordering for numbers, strings, characters and semantic versions. Returns `None` for any
	other pair of values, and for NaN.
	*/
	pub fn compare(&self, a: Val, b: Val) -> Option<Ordering> {
		if let (Some(x), Some(y)) = (self.as_number(a), self.as_number(b)) {
			return match (self.as_integer(a), self.as_integer(b)) {
				(Some(i), Some(j)) => Some(i.cmp(&j)),
				_ => x.partial_cmp(&y)
			}
		}

		self.with_payload(a, |pa| self.with_payload(b, |pb| match (pa, pb) {
			(&Payload::Str(ref x), &Payload::Str(ref y)) => Some(x.cmp(y)),
			(&Payload::Char(x), &Payload::Char(y)) => Some(x.cmp(&y)),
			(&Payload::SemVer(ref x), &Payload::SemVer(ref y)) => Some(x.precedence(y)),
			_ => None
		}))
	}
}

//-------------------------------------------------------------------------------------------------
// copy
//-------------------------------------------------------------------------------------------------

enum CopyPlan {
	Shared,
	Scalar(Payload),
	Vector,
	List,
	Queue(Option<usize>),
	HashMap,
	Environment(Option<Val>),
	Refused(String)
}

impl Engine {
	/**
	Copies a value, giving the copy a new identity.

	Containers are copied recursively, preserving any sharing and cycles within the copied
	structure. Environments copy their bindings but keep the same enclosing scope. Callables
	are copied shallowly: the copy shares its formals, body and captured environment.

	`nil`, `true` and `false` are shared constants and copy to themselves. Ports can't be
	copied, and neither can host data which declares itself non-copyable; both produce an error
	value.
	*/
	pub fn copy(&self, val: Val) -> DResult<Val> {
		let _val = self.root(val);
		let copies = self.new_vector(Vec::new());
		let _copies = self.root(copies);
		self.copy_inner(val, copies, &mut FnvHashMap::default())
	}

	//`copies` is a rooted vector which keeps every copy made so far alive; `memo` maps each
	//original to its copy
	fn copy_inner(&self, val: Val, copies: Val, memo: &mut FnvHashMap<Val, Val>) -> DResult<Val> {
		if let Some(&copy) = memo.get(&val) {
			return Ok(copy)
		}

		let plan = self.with_payload(val, |payload| match *payload {
			Payload::Nil | Payload::Boolean(_) => CopyPlan::Shared,
			Payload::Integer(i) => CopyPlan::Scalar(Payload::Integer(i)),
			Payload::Real(f) => CopyPlan::Scalar(Payload::Real(f)),
			Payload::Str(ref s) => CopyPlan::Scalar(Payload::Str(s.clone())),
			Payload::Char(c) => CopyPlan::Scalar(Payload::Char(c)),
			Payload::Symbol(sym) => CopyPlan::Scalar(Payload::Symbol(sym)),
			Payload::Error(ref data) => CopyPlan::Scalar(Payload::Error(data.clone())),
			Payload::SemVer(ref semver) => CopyPlan::Scalar(Payload::SemVer(semver.clone())),
			Payload::Function(ref closure) => CopyPlan::Scalar(Payload::Function(closure.clone())),
			Payload::Macro(ref closure) => CopyPlan::Scalar(Payload::Macro(closure.clone())),
			Payload::Special(ref native) => CopyPlan::Scalar(Payload::Special(native.clone())),
			Payload::Builtin(ref native) => CopyPlan::Scalar(Payload::Builtin(native.clone())),
			Payload::HostData(ref data) if data.copyable => {
				CopyPlan::Scalar(Payload::HostData(data.clone()))
			}
			Payload::HostData(ref data) => {
				CopyPlan::Refused(format!("Host data '{}:{}' cannot be copied", data.plugin,
				                          data.type_name))
			}
			Payload::Port(ref port) => {
				CopyPlan::Refused(format!("Port '{}' cannot be copied", port.name()))
			}
			Payload::Vector(_) => CopyPlan::Vector,
			Payload::List(_) => CopyPlan::List,
			Payload::Queue(ref queue) => CopyPlan::Queue(queue.max_len),
			Payload::HashMap(_) => CopyPlan::HashMap,
			Payload::Environment(ref env) => CopyPlan::Environment(env.parent())
		});

		let copy = match plan {
			CopyPlan::Shared => return Ok(val),
			CopyPlan::Refused(message) => bail!(self, "{}", message),
			CopyPlan::Scalar(payload) => self.alloc(payload),
			CopyPlan::Vector => self.new_vector(Vec::new()),
			CopyPlan::List => self.new_list(VecDeque::new()),
			CopyPlan::Queue(max_len) => self.new_queue(max_len),
			CopyPlan::HashMap => self.new_hash_map(),
			CopyPlan::Environment(parent) => self.new_environment(parent)
		};

		self.vector_push(copies, copy);
		memo.insert(val, copy);

		self.set_doc(copy, self.doc(val));
		self.set_doc_vec(copy, self.doc_vec(val));
		self.set_howto_allowed(copy, self.howto_allowed(val));

		//the originals stay reachable through `val`, which the caller keeps alive
		match self.tag(copy) {
			Tag::Vector | Tag::List | Tag::Queue => {
				for item in self.seq_items(val).unwrap_or_default() {
					let item_copy = self.copy_inner(item, copies, memo)?;
					self.seq_push_back(copy, item_copy);
				}
			}
			Tag::HashMap => {
				for (key, value) in self.map_entries(val).unwrap_or_default() {
					let key_copy = self.copy_inner(key, copies, memo)?;
					let value_copy = self.copy_inner(value, copies, memo)?;
					self.map_insert(copy, key_copy, value_copy);
				}
			}
			Tag::Environment => {
				for (name, value) in self.env_bindings(val).unwrap_or_default() {
					let value_copy = self.copy_inner(value, copies, memo)?;
					self.env_define(copy, name, value_copy);
				}
			}
			_ => ()
		}

		Ok(copy)
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::EngineBuilder;
	use crate::io::HostData;
	use std::cmp::Ordering;

	#[test]
	fn numeric_and_structural_equality() {
		let engine = EngineBuilder::new().prevent_gc(true).build();

		let one = engine.new_integer(1);
		let one_real = engine.new_real(1.0);
		assert!(engine.equal(one, one_real));
		assert_eq!(engine.compare(one, engine.new_real(1.5)), Some(Ordering::Less));

		let a = engine.new_vector(vec![one, engine.new_string("x")]);
		let b = engine.new_vector(vec![one_real, engine.new_string("x")]);
		assert!(engine.equal(a, b));
		assert_ne!(a, b);

		engine.vector_push(b, one);
		assert!(!engine.equal(a, b));

		let s = engine.new_string("abc");
		assert_eq!(engine.compare(s, engine.new_string("abd")), Some(Ordering::Less));
		assert_eq!(engine.compare(s, one), None);
	}

	#[test]
	fn hash_maps_compare_regardless_of_order() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let (k1, k2) = (engine.new_string("a"), engine.new_string("b"));
		let (v1, v2) = (engine.new_integer(1), engine.new_integer(2));

		let x = engine.new_hash_map();
		engine.map_insert(x, k1, v1);
		engine.map_insert(x, k2, v2);

		let y = engine.new_hash_map();
		engine.map_insert(y, k2, v2);
		engine.map_insert(y, k1, v1);

		assert!(engine.equal(x, y));
	}

	#[test]
	fn copies_are_equal_but_not_identical() {
		let engine = EngineBuilder::new().gc_trigger_limit(2).build();
		let vec = engine.read_form("(1 2 (3 [x]))");
		let _vec = engine.root(vec);

		let copy = engine.copy(vec).unwrap();
		let _copy = engine.root(copy);

		assert!(engine.equal(vec, copy));
		assert_ne!(vec, copy);
		assert_ne!(engine.uid(vec), engine.uid(copy));

		let extra = engine.new_integer(4);
		engine.vector_push(copy, extra);
		assert_eq!(engine.vector_len(vec), Some(3));
		assert!(!engine.equal(vec, copy));
	}

	#[test]
	fn copying_preserves_cycles() {
		let engine = EngineBuilder::new().prevent_gc(true).build();
		let vec = engine.new_vector(Vec::new());
		engine.vector_push(vec, vec);

		let copy = engine.copy(vec).unwrap();
		assert_ne!(copy, vec);
		assert_eq!(engine.vector_get(copy, 0), Some(copy));
	}

	#[test]
	fn refused_copies() {
		let engine = EngineBuilder::new().prevent_gc(true).build();

		let port = engine.new_input_port_from_bytes("bytes", vec![1]);
		assert!(engine.copy(port).is_err());

		let locked = engine.new_host_data(HostData::new("test", "locked", false, 5u8));
		assert!(engine.copy(locked).is_err());

		let shared = engine.new_host_data(HostData::new("test", "shared", true, 5u8));
		let copy = engine.copy(shared).unwrap();
		assert_eq!(engine.with_host_data(copy, |n: &u8| *n), Some(5));

		assert_eq!(engine.copy(engine.nil()).unwrap(), engine.nil());
	}
}
