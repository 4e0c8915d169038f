use fnv::FnvHashMap;
use std::collections::VecDeque;
use super::engine::{Engine, Sym};
use super::val::{Payload, Val};

//-------------------------------------------------------------------------------------------------
// HashKey
//-------------------------------------------------------------------------------------------------

/*
hash-map keys are hashed by content when they're scalars, and by identity otherwise. this means
that two structurally-equal vectors are still distinct keys, which is consistent with the fact
that a vector key can be mutated after it's been inserted.

a real with a whole value in integer range shares its key with that integer, since `==` treats
them as equal. this also folds -0.0 into 0.
*/

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum HashKey {
	Nil,
	Boolean(bool),
	Integer(i32),
	Real(u64),
	Str(String),
	Char(char),
	Symbol(Sym),
	SemVer(String),
	Identity(u64)
}

impl Engine {
	pub(crate) fn hash_key(&self, key: Val) -> HashKey {
		self.heap.get(key, |obj| {
			match obj.payload {
				Payload::Nil => HashKey::Nil,
				Payload::Boolean(b) => HashKey::Boolean(b),
				Payload::Integer(i) => HashKey::Integer(i),
				Payload::Real(f) => real_key(f),
				Payload::Str(ref s) => HashKey::Str(s.clone()),
				Payload::Char(c) => HashKey::Char(c),
				Payload::Symbol(sym) => HashKey::Symbol(sym),
				Payload::SemVer(ref v) => HashKey::SemVer(v.to_string()),
				_ => HashKey::Identity(obj.uid)
			}
		})
	}
}

fn real_key(f: f64) -> HashKey {
	if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
		HashKey::Integer(f as i32)
	} else {
		HashKey::Real(f.to_bits())
	}
}

//-------------------------------------------------------------------------------------------------
// Map
//-------------------------------------------------------------------------------------------------

/**
The payload of a hash-map value.

Entries are kept in insertion order, so printing and iterating a hash-map is deterministic.
*/

#[derive(Clone, Default)]
pub struct Map {
	entries: Vec<(Val, Val)>,
	index: FnvHashMap<HashKey, usize>
}

impl Map {
	pub fn new() -> Map {
		Map::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn entries(&self) -> &[(Val, Val)] {
		&self.entries
	}

	pub(crate) fn get(&self, key: &HashKey) -> Option<(Val, Val)> {
		self.index.get(key).map(|&i| self.entries[i])
	}

	//returns the previous value, if any. the previous key is kept.
	pub(crate) fn insert(&mut self, hash_key: HashKey, key: Val, value: Val) -> Option<Val> {
		match self.index.get(&hash_key) {
			Some(&i) => {
				let prev = self.entries[i].1;
				self.entries[i].1 = value;
				Some(prev)
			}
			None => {
				self.index.insert(hash_key, self.entries.len());
				self.entries.push((key, value));
				None
			}
		}
	}

	pub(crate) fn remove(&mut self, hash_key: &HashKey) -> Option<(Val, Val)> {
		let i = self.index.remove(hash_key)?;
		let removed = self.entries.remove(i);

		//entries after the removed one have shifted down by one
		for slot in self.index.values_mut() {
			if *slot > i {
				*slot -= 1;
			}
		}

		Some(removed)
	}
}

//-------------------------------------------------------------------------------------------------
// Queue
//-------------------------------------------------------------------------------------------------

/**
The payload of a queue value: a double-ended sequence with an optional maximum length.

When a push would exceed the maximum length, the oldest element is dropped from the front.
*/

#[derive(Clone, Default)]
pub struct Queue {
	pub(crate) items: VecDeque<Val>,
	pub(crate) max_len: Option<usize>
}

impl Queue {
	pub fn new(max_len: Option<usize>) -> Queue {
		Queue {
			items: VecDeque::new(),
			max_len
		}
	}

	pub fn push(&mut self, val: Val) {
		self.items.push_back(val);

		if let Some(max_len) = self.max_len {
			while self.items.len() > max_len {
				self.items.pop_front();
			}
		}
	}

	pub fn items(&self) -> &VecDeque<Val> {
		&self.items
	}

	pub fn max_len(&self) -> Option<usize> {
		self.max_len
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn val(index: u32) -> Val {
		Val { index, generation: 0 }
	}

	#[test]
	fn queue_drops_from_front_past_max_len() {
		let mut queue = Queue::new(Some(2));
		queue.push(val(1));
		queue.push(val(2));
		queue.push(val(3));

		assert_eq!(queue.items().iter().copied().collect::<Vec<_>>(), vec![val(2), val(3)]);
	}

	#[test]
	fn map_keeps_insertion_order_and_overwrites() {
		let mut map = Map::new();
		assert_eq!(map.insert(HashKey::Integer(2), val(0), val(1)), None);
		assert_eq!(map.insert(HashKey::Integer(1), val(2), val(3)), None);
		assert_eq!(map.insert(HashKey::Integer(2), val(4), val(5)), Some(val(1)));

		assert_eq!(map.entries(), &[(val(0), val(5)), (val(2), val(3))]);
		assert_eq!(map.get(&HashKey::Integer(1)), Some((val(2), val(3))));
		assert_eq!(map.get(&HashKey::Nil), None);
	}

	#[test]
	fn whole_reals_share_keys_with_integers() {
		let engine = crate::engine::EngineBuilder::new().prevent_gc(true).build();
		let map = engine.new_hash_map();
		let _map = engine.root(map);

		let one = engine.new_integer(1);
		let value = engine.new_string("a");
		engine.map_insert(map, one, value);

		assert_eq!(engine.map_get(map, engine.new_real(1.0)), Some(value));
		assert_eq!(engine.map_get(map, engine.new_real(1.5)), None);

		let zero = engine.new_real(0.0);
		engine.map_insert(map, zero, value);
		assert_eq!(engine.map_get(map, engine.new_real(-0.0)), Some(value));
		assert_eq!(engine.map_get(map, engine.new_integer(0)), Some(value));
	}
}
