use std::collections::VecDeque;
use std::rc::Rc;
use super::code::Closure;
use super::collections::{Map, Queue};
use super::engine::{Engine, Native, Sym};
use super::env::Env;
use super::error::ErrorData;
use super::gc::Visitor;
use super::io::{HostData, Port};
use super::semver::SemVer;

//-------------------------------------------------------------------------------------------------
// Val
//-------------------------------------------------------------------------------------------------

/**
A handle to a value stored in an [`Engine`](struct.Engine.html)'s heap.

`Val` is a small `Copy` index. It does not keep its value alive: a value survives a collection
only when it's reachable from the root stack, the global environment, or a registered library
table. See [`Engine::root`](struct.Engine.html#method.root).

Two `Val`s compare equal when they refer to the same value (identity, `===`). Structural
equality is [`Engine::equal`](struct.Engine.html#method.equal).

A `Val` whose value has been collected is stale; using it is a fatal error.
*/

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Val {
	pub(crate) index: u32,
	pub(crate) generation: u32
}

//-------------------------------------------------------------------------------------------------
// Tag
//-------------------------------------------------------------------------------------------------

///The type of a value.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Tag {
	Nil,
	Boolean,
	Integer,
	Real,
	Str,
	Char,
	Symbol,
	Error,
	Vector,
	HashMap,
	Queue,
	List,
	Environment,
	Function,
	Macro,
	Special,
	Builtin,
	Port,
	HostData,
	SemVer
}

impl Tag {
	pub fn name(self) -> &'static str {
		match self {
			Tag::Nil => "nil",
			Tag::Boolean => "boolean",
			Tag::Integer => "integer",
			Tag::Real => "real",
			Tag::Str => "string",
			Tag::Char => "character",
			Tag::Symbol => "symbol",
			Tag::Error => "error",
			Tag::Vector => "vector",
			Tag::HashMap => "hash map",
			Tag::Queue => "queue",
			Tag::List => "list",
			Tag::Environment => "environment",
			Tag::Function => "function",
			Tag::Macro => "macro",
			Tag::Special => "special",
			Tag::Builtin => "builtin",
			Tag::Port => "port",
			Tag::HostData => "host data",
			Tag::SemVer => "semver"
		}
	}

	///Values of these types evaluate to themselves.
	pub fn is_self_evaluating(self) -> bool {
		match self {
			Tag::Nil | Tag::Boolean | Tag::Integer | Tag::Real | Tag::Str | Tag::Char |
			Tag::Error | Tag::Function | Tag::Macro | Tag::Special | Tag::Builtin |
			Tag::SemVer => true,

			Tag::Symbol | Tag::Vector | Tag::HashMap | Tag::Queue | Tag::List |
			Tag::Environment | Tag::Port | Tag::HostData => false
		}
	}
}

//-------------------------------------------------------------------------------------------------
// Payload, Obj
//-------------------------------------------------------------------------------------------------

/**
The contents of a value.

Container variants hold `Val` handles rather than nested copies. Dropping a container's payload
never releases its elements; they're freed by the collector once nothing reaches them.
*/

pub enum Payload {
	Nil,
	Boolean(bool),
	Integer(i32),
	Real(f64),
	Str(String),
	Char(char),
	Symbol(Sym),
	Error(ErrorData),
	Vector(Vec<Val>),
	HashMap(Map),
	Queue(Queue),
	List(VecDeque<Val>),
	Environment(Env),
	Function(Closure),
	Macro(Closure),
	Special(Native),
	Builtin(Native),
	Port(Port),
	HostData(HostData),
	SemVer(SemVer)
}

impl Payload {
	pub fn tag(&self) -> Tag {
		match *self {
			Payload::Nil => Tag::Nil,
			Payload::Boolean(_) => Tag::Boolean,
			Payload::Integer(_) => Tag::Integer,
			Payload::Real(_) => Tag::Real,
			Payload::Str(_) => Tag::Str,
			Payload::Char(_) => Tag::Char,
			Payload::Symbol(_) => Tag::Symbol,
			Payload::Error(_) => Tag::Error,
			Payload::Vector(_) => Tag::Vector,
			Payload::HashMap(_) => Tag::HashMap,
			Payload::Queue(_) => Tag::Queue,
			Payload::List(_) => Tag::List,
			Payload::Environment(_) => Tag::Environment,
			Payload::Function(_) => Tag::Function,
			Payload::Macro(_) => Tag::Macro,
			Payload::Special(_) => Tag::Special,
			Payload::Builtin(_) => Tag::Builtin,
			Payload::Port(_) => Tag::Port,
			Payload::HostData(_) => Tag::HostData,
			Payload::SemVer(_) => Tag::SemVer
		}
	}

	pub(crate) fn trace<V: Visitor>(&self, visitor: &mut V) {
		match *self {
			Payload::Nil | Payload::Boolean(_) | Payload::Integer(_) | Payload::Real(_) |
			Payload::Str(_) | Payload::Char(_) | Payload::Symbol(_) | Payload::Error(_) |
			Payload::Special(_) | Payload::Builtin(_) | Payload::Port(_) |
			Payload::HostData(_) | Payload::SemVer(_) => (),

			Payload::Vector(ref items) => items.iter().for_each(|&val| visitor.visit(val)),
			Payload::HashMap(ref map) => {
				for &(key, value) in map.entries() {
					visitor.visit(key);
					visitor.visit(value);
				}
			}
			Payload::Queue(ref queue) => queue.items().iter().for_each(|&val| visitor.visit(val)),
			Payload::List(ref items) => items.iter().for_each(|&val| visitor.visit(val)),
			Payload::Environment(ref env) => env.trace(visitor),
			Payload::Function(ref closure) | Payload::Macro(ref closure) => {
				closure.trace(visitor)
			}
		}
	}
}

/**
A registered heap entry: the payload plus the bookkeeping every value carries.
*/

pub(crate) struct Obj {
	pub(crate) uid: u64,
	pub(crate) marked: bool,
	pub(crate) howto_allowed: bool,
	pub(crate) doc: Option<Val>,
	pub(crate) doc_vec: Option<Val>,
	pub(crate) payload: Payload
}

impl Obj {
	pub(crate) fn new(uid: u64, payload: Payload) -> Obj {
		Obj {
			uid,
			marked: false,
			howto_allowed: false,
			doc: None,
			doc_vec: None,
			payload
		}
	}

	pub(crate) fn trace<V: Visitor>(&self, visitor: &mut V) {
		if let Some(doc) = self.doc {
			visitor.visit(doc);
		}

		if let Some(doc_vec) = self.doc_vec {
			visitor.visit(doc_vec);
		}

		self.payload.trace(visitor);
	}
}

//-------------------------------------------------------------------------------------------------
// constructors
//-------------------------------------------------------------------------------------------------

/*
every constructor returns its value unrooted. the caller must root it before doing anything
else which might allocate.

the payload passed to Engine::alloc is traced if the allocation triggers a collection, so it's
fine for a constructor to receive unrooted elements, as long as nothing else allocates between
their creation and the constructor call.
*/

impl Engine {
	pub fn nil(&self) -> Val {
		self.constants.nil
	}

	pub fn boolean(&self, b: bool) -> Val {
		if b { self.constants.true_val } else { self.constants.false_val }
	}

	pub fn new_integer(&self, i: i32) -> Val {
		self.alloc(Payload::Integer(i))
	}

	pub fn new_real(&self, f: f64) -> Val {
		self.alloc(Payload::Real(f))
	}

	pub fn new_string<S: Into<String>>(&self, s: S) -> Val {
		self.alloc(Payload::Str(s.into()))
	}

	pub fn new_char(&self, c: char) -> Val {
		self.alloc(Payload::Char(c))
	}

	pub fn new_symbol(&self, name: &str) -> Val {
		let sym = self.intern(name);
		self.alloc(Payload::Symbol(sym))
	}

	pub fn new_symbol_from_sym(&self, sym: Sym) -> Val {
		self.alloc(Payload::Symbol(sym))
	}

	pub fn new_error<S: Into<String>>(&self, message: S) -> Val {
		self.alloc(Payload::Error(ErrorData::new(message.into(), None)))
	}

	pub fn new_error_at<S: Into<String>>(&self, message: S, line: usize) -> Val {
		self.alloc(Payload::Error(ErrorData::new(message.into(), Some(line))))
	}

	pub fn new_vector(&self, items: Vec<Val>) -> Val {
		self.alloc(Payload::Vector(items))
	}

	pub fn new_hash_map(&self) -> Val {
		self.alloc(Payload::HashMap(Map::new()))
	}

	pub fn new_queue(&self, max_len: Option<usize>) -> Val {
		self.alloc(Payload::Queue(Queue::new(max_len)))
	}

	pub fn new_list(&self, items: VecDeque<Val>) -> Val {
		self.alloc(Payload::List(items))
	}

	pub fn new_port(&self, port: Port) -> Val {
		self.alloc(Payload::Port(port))
	}

	pub fn new_input_port_from_bytes(&self, name: &str, bytes: Vec<u8>) -> Val {
		self.new_port(Port::from_bytes(name, bytes))
	}

	pub fn new_host_data(&self, data: HostData) -> Val {
		self.alloc(Payload::HostData(data))
	}

	pub fn new_semver(&self, semver: SemVer) -> Val {
		self.alloc(Payload::SemVer(semver))
	}
}

//-------------------------------------------------------------------------------------------------
// accessors
//-------------------------------------------------------------------------------------------------

impl Engine {

	/**
	Calls `f` with a shared reference to the value's payload.

	`f` must not call back into the `Engine`; the heap is borrowed while it runs.
	*/
	pub fn with_payload<R, F: FnOnce(&Payload) -> R>(&self, val: Val, f: F) -> R {
		self.heap.get(val, |obj| f(&obj.payload))
	}

	/**
	Calls `f` with a mutable reference to the value's payload.

	`f` must not call back into the `Engine`, and must not replace the payload with one of a
	different type.
	*/
	pub fn with_payload_mut<R, F: FnOnce(&mut Payload) -> R>(&self, val: Val, f: F) -> R {
		self.heap.get_mut(val, |obj| {
			let tag = obj.payload.tag();
			let result = f(&mut obj.payload);
			if obj.payload.tag() != tag {
				fatal!("the payload of a {} value was replaced by a {}", tag.name(),
				       obj.payload.tag().name())
			}
			result
		})
	}

	pub fn tag(&self, val: Val) -> Tag {
		self.with_payload(val, |payload| payload.tag())
	}

	pub fn type_name(&self, val: Val) -> &'static str {
		self.tag(val).name()
	}

	///The value's unique identity, assigned at construction and never reused.
	pub fn uid(&self, val: Val) -> u64 {
		self.heap.get(val, |obj| obj.uid)
	}

	///Returns `false` once the collector has released the value.
	pub fn is_live(&self, val: Val) -> bool {
		self.heap.contains(val)
	}

	pub fn is_nil(&self, val: Val) -> bool {
		self.tag(val) == Tag::Nil
	}

	pub fn is_error(&self, val: Val) -> bool {
		self.tag(val) == Tag::Error
	}

	pub fn as_boolean(&self, val: Val) -> Option<bool> {
		self.with_payload(val, |payload| match *payload {
			Payload::Boolean(b) => Some(b),
			_ => None
		})
	}

	pub fn as_integer(&self, val: Val) -> Option<i32> {
		self.with_payload(val, |payload| match *payload {
			Payload::Integer(i) => Some(i),
			_ => None
		})
	}

	pub fn as_real(&self, val: Val) -> Option<f64> {
		self.with_payload(val, |payload| match *payload {
			Payload::Real(f) => Some(f),
			_ => None
		})
	}

	///Converts an integer or a real to `f64`.
	pub fn as_number(&self, val: Val) -> Option<f64> {
		self.with_payload(val, |payload| match *payload {
			Payload::Integer(i) => Some(i as f64),
			Payload::Real(f) => Some(f),
			_ => None
		})
	}

	pub fn as_char(&self, val: Val) -> Option<char> {
		self.with_payload(val, |payload| match *payload {
			Payload::Char(c) => Some(c),
			_ => None
		})
	}

	pub fn as_str(&self, val: Val) -> Option<String> {
		self.with_payload(val, |payload| match *payload {
			Payload::Str(ref s) => Some(s.clone()),
			_ => None
		})
	}

	pub fn as_sym(&self, val: Val) -> Option<Sym> {
		self.with_payload(val, |payload| match *payload {
			Payload::Symbol(sym) => Some(sym),
			_ => None
		})
	}

	pub fn symbol_name(&self, val: Val) -> Option<Rc<str>> {
		self.as_sym(val).map(|sym| self.sym_name(sym))
	}

	///Returns true if `val` is the symbol named `name`.
	pub fn is_symbol_named(&self, val: Val, name: &str) -> bool {
		match self.symbol_name(val) {
			Some(sym_name) => &*sym_name == name,
			None => false
		}
	}

	pub fn error_message(&self, val: Val) -> Option<String> {
		self.with_payload(val, |payload| match *payload {
			Payload::Error(ref data) => Some(data.message.clone()),
			_ => None
		})
	}

	pub fn error_line(&self, val: Val) -> Option<usize> {
		self.with_payload(val, |payload| match *payload {
			Payload::Error(ref data) => data.line,
			_ => None
		})
	}

	pub(crate) fn append_to_error(&self, val: Val, text: &str) {
		self.with_payload_mut(val, |payload| {
			if let Payload::Error(ref mut data) = *payload {
				data.message.push_str(text);
			}
		})
	}

	/**
	The number of elements in a container, characters in a string, or bindings in an
	environment (excluding its enclosing environments).
	*/
	pub fn len(&self, val: Val) -> Option<usize> {
		self.with_payload(val, |payload| match *payload {
			Payload::Str(ref s) => Some(s.chars().count()),
			Payload::Vector(ref items) => Some(items.len()),
			Payload::HashMap(ref map) => Some(map.len()),
			Payload::Queue(ref queue) => Some(queue.items().len()),
			Payload::List(ref items) => Some(items.len()),
			Payload::Environment(ref env) => Some(env.len()),
			Payload::Symbol(sym) => Some(self.sym_name(sym).chars().count()),
			_ => None
		})
	}

	pub fn vector_len(&self, val: Val) -> Option<usize> {
		self.with_payload(val, |payload| match *payload {
			Payload::Vector(ref items) => Some(items.len()),
			_ => None
		})
	}

	pub fn vector_get(&self, val: Val, i: usize) -> Option<Val> {
		self.with_payload(val, |payload| match *payload {
			Payload::Vector(ref items) => items.get(i).copied(),
			_ => None
		})
	}

	pub fn vector_push(&self, val: Val, item: Val) -> bool {
		self.with_payload_mut(val, |payload| match *payload {
			Payload::Vector(ref mut items) => {
				items.push(item);
				true
			}
			_ => false
		})
	}

	pub fn vector_set(&self, val: Val, i: usize, item: Val) -> bool {
		self.with_payload_mut(val, |payload| match *payload {
			Payload::Vector(ref mut items) if i < items.len() => {
				items[i] = item;
				true
			}
			_ => false
		})
	}

	/**
	A snapshot of the elements of a vector, list or queue, in order.

	The snapshot doesn't root anything. Its elements stay alive only as long as the
	sequence itself is reachable and unchanged.
	*/
	pub fn seq_items(&self, val: Val) -> Option<Vec<Val>> {
		self.with_payload(val, |payload| match *payload {
			Payload::Vector(ref items) => Some(items.clone()),
			Payload::Queue(ref queue) => Some(queue.items().iter().copied().collect()),
			Payload::List(ref items) => Some(items.iter().copied().collect()),
			_ => None
		})
	}

	///A snapshot of a hash-map's entries, in insertion order.
	pub fn map_entries(&self, val: Val) -> Option<Vec<(Val, Val)>> {
		self.with_payload(val, |payload| match *payload {
			Payload::HashMap(ref map) => Some(map.entries().to_vec()),
			_ => None
		})
	}

	pub fn map_get(&self, map: Val, key: Val) -> Option<Val> {
		let hash_key = self.hash_key(key);
		self.with_payload(map, |payload| match *payload {
			Payload::HashMap(ref map) => map.get(&hash_key).map(|(_, value)| value),
			_ => None
		})
	}

	///Inserts or overwrites an entry. Returns `false` if `map` isn't a hash-map.
	pub fn map_insert(&self, map: Val, key: Val, value: Val) -> bool {
		let hash_key = self.hash_key(key);
		self.with_payload_mut(map, |payload| match *payload {
			Payload::HashMap(ref mut map) => {
				map.insert(hash_key, key, value);
				true
			}
			_ => false
		})
	}

	pub fn map_remove(&self, map: Val, key: Val) -> Option<Val> {
		let hash_key = self.hash_key(key);
		self.with_payload_mut(map, |payload| match *payload {
			Payload::HashMap(ref mut map) => map.remove(&hash_key).map(|(_, value)| value),
			_ => None
		})
	}

	///Appends to the back of a vector, queue or list.
	pub fn seq_push_back(&self, val: Val, item: Val) -> bool {
		self.with_payload_mut(val, |payload| match *payload {
			Payload::Vector(ref mut items) => {
				items.push(item);
				true
			}
			Payload::Queue(ref mut queue) => {
				queue.push(item);
				true
			}
			Payload::List(ref mut items) => {
				items.push_back(item);
				true
			}
			_ => false
		})
	}

	pub fn seq_pop_front(&self, val: Val) -> Option<Val> {
		self.with_payload_mut(val, |payload| match *payload {
			Payload::Vector(ref mut items) if !items.is_empty() => Some(items.remove(0)),
			Payload::Queue(ref mut queue) => queue.items.pop_front(),
			Payload::List(ref mut items) => items.pop_front(),
			_ => None
		})
	}

	pub fn seq_pop_back(&self, val: Val) -> Option<Val> {
		self.with_payload_mut(val, |payload| match *payload {
			Payload::Vector(ref mut items) => items.pop(),
			Payload::Queue(ref mut queue) => queue.items.pop_back(),
			Payload::List(ref mut items) => items.pop_back(),
			_ => None
		})
	}

	//documentation

	pub fn doc(&self, val: Val) -> Option<Val> {
		self.heap.get(val, |obj| obj.doc)
	}

	pub fn set_doc(&self, val: Val, doc: Option<Val>) {
		self.heap.get_mut(val, |obj| obj.doc = doc)
	}

	pub fn doc_vec(&self, val: Val) -> Option<Val> {
		self.heap.get(val, |obj| obj.doc_vec)
	}

	pub fn set_doc_vec(&self, val: Val, doc_vec: Option<Val>) {
		self.heap.get_mut(val, |obj| obj.doc_vec = doc_vec)
	}

	pub fn howto_allowed(&self, val: Val) -> bool {
		self.heap.get(val, |obj| obj.howto_allowed)
	}

	pub fn set_howto_allowed(&self, val: Val, allowed: bool) {
		self.heap.get_mut(val, |obj| obj.howto_allowed = allowed)
	}

	pub fn with_host_data<T: 'static, R, F: FnOnce(&T) -> R>(&self, val: Val, f: F) -> Option<R> {
		self.with_payload(val, |payload| match *payload {
			Payload::HostData(ref data) => data.downcast_ref::<T>().map(f),
			_ => None
		})
	}

	pub fn with_port<R, F: FnOnce(&mut Port) -> R>(&self, val: Val, f: F) -> Option<R> {
		self.with_payload_mut(val, |payload| match *payload {
			Payload::Port(ref mut port) => Some(f(port)),
			_ => None
		})
	}
}
