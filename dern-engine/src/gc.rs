use log::debug;
use std::cell::{Cell, RefCell};
use std::ops::Deref;
use super::engine::Engine;
use super::val::{Obj, Payload, Val};

//the collector is a non-incremental, non-generational mark-and-sweep over a single arena. values
//are addressed by (slot index, generation) pairs; a slot's generation is bumped whenever its
//value is released, so stale handles can always be detected.

/** The default number of allocations between automatic collections. */
pub const GC_DEFAULT_TRIGGER_LIMIT: usize = 1024;

//-------------------------------------------------------------------------------------------------
// Visitor
//-------------------------------------------------------------------------------------------------

#[doc(hidden)]
pub trait Visitor {
	fn visit(&mut self, val: Val);
}

struct MarkingVisitor<'a> {
	marking_stack: &'a mut Vec<Val>
}

impl<'a> Visitor for MarkingVisitor<'a> {
	#[inline]
	fn visit(&mut self, val: Val) {
		self.marking_stack.push(val);
	}
}

//-------------------------------------------------------------------------------------------------
// Heap
//-------------------------------------------------------------------------------------------------

struct Entry {
	generation: u32,
	obj: Option<Obj>
}

/**
The value registry: owns every value for the lifetime of an `Engine`, together with the
root stack and the allocation counter which drives automatic collection.
*/

pub(crate) struct Heap {
	entries: RefCell<Vec<Entry>>,
	vacant: RefCell<Vec<u32>>,
	live: Cell<usize>,
	next_uid: Cell<u64>,

	roots: RefCell<Vec<Val>>,

	allocs_since_gc: Cell<usize>,
	trigger_limit: Cell<usize>,
	prevent_gc: Cell<bool>,
	gc_in_progress: Cell<bool>,
	cycles: Cell<usize>
}

impl Heap {
	pub(crate) fn new(trigger_limit: usize, prevent_gc: bool) -> Heap {
		Heap {
			entries: RefCell::new(Vec::with_capacity(256)),
			vacant: RefCell::new(Vec::new()),
			live: Cell::new(0),
			next_uid: Cell::new(0),

			roots: RefCell::new(Vec::with_capacity(64)),

			allocs_since_gc: Cell::new(0),
			trigger_limit: Cell::new(trigger_limit),
			prevent_gc: Cell::new(prevent_gc),
			gc_in_progress: Cell::new(false),
			cycles: Cell::new(0)
		}
	}

	//registers a value without any possibility of triggering a collection
	pub(crate) fn insert(&self, payload: Payload) -> Val {
		let uid = self.next_uid.get();
		self.next_uid.set(uid + 1);

		let obj = Obj::new(uid, payload);
		let mut entries = self.entries.borrow_mut();

		let val = match self.vacant.borrow_mut().pop() {
			Some(index) => {
				let entry = &mut entries[index as usize];
				debug_assert!(entry.obj.is_none());
				entry.obj = Some(obj);
				Val { index, generation: entry.generation }
			}
			None => {
				let index = entries.len() as u32;
				entries.push(Entry { generation: 0, obj: Some(obj) });
				Val { index, generation: 0 }
			}
		};

		self.live.set(self.live.get() + 1);
		val
	}

	//counts one allocation. returns true when a collection is due, resetting the counter.
	fn count_allocation(&self) -> bool {
		if self.allocs_since_gc.get() >= self.trigger_limit.get() && !self.prevent_gc.get() {
			self.allocs_since_gc.set(0);
			true
		} else {
			self.allocs_since_gc.set(self.allocs_since_gc.get() + 1);
			false
		}
	}

	#[inline]
	pub(crate) fn get<R, F: FnOnce(&Obj) -> R>(&self, val: Val, f: F) -> R {
		let entries = self.entries.borrow();
		match entries.get(val.index as usize) {
			Some(&Entry { generation, obj: Some(ref obj) }) if generation == val.generation => f(obj),
			_ => fatal!("attempted to access a value which has already been collected")
		}
	}

	#[inline]
	pub(crate) fn get_mut<R, F: FnOnce(&mut Obj) -> R>(&self, val: Val, f: F) -> R {
		let mut entries = self.entries.borrow_mut();
		match entries.get_mut(val.index as usize) {
			Some(&mut Entry { generation, obj: Some(ref mut obj) }) if generation == val.generation => {
				f(obj)
			}
			_ => fatal!("attempted to access a value which has already been collected")
		}
	}

	pub(crate) fn contains(&self, val: Val) -> bool {
		let entries = self.entries.borrow();
		match entries.get(val.index as usize) {
			Some(entry) => entry.generation == val.generation && entry.obj.is_some(),
			None => false
		}
	}

	pub(crate) fn live(&self) -> usize {
		self.live.get()
	}

	//root stack

	pub(crate) fn push_root(&self, val: Val) {
		self.roots.borrow_mut().push(val);
	}

	pub(crate) fn pop_root(&self, expected: Val) {
		let popped = self.roots.borrow_mut().pop();
		if popped != Some(expected) {
			fatal!("root stack unbalanced: expected {:?} on top, found {:?}", expected, popped)
		}
	}

	pub(crate) fn roots_len(&self) -> usize {
		self.roots.borrow().len()
	}

	pub(crate) fn drain_roots(&self) -> usize {
		let mut roots = self.roots.borrow_mut();
		let len = roots.len();
		roots.clear();
		len
	}

	/**
	Marks everything reachable from the root stack, `extra_roots` and `pending`, then releases
	everything else. Returns the number of values released.
	*/
	fn collect(&self, extra_roots: &[Val], pending: Option<&Payload>) -> usize {
		if self.gc_in_progress.replace(true) {
			fatal!("the collector was re-entered")
		}

		let mut marking_stack: Vec<Val> = self.roots.borrow().clone();
		marking_stack.extend_from_slice(extra_roots);

		if let Some(payload) = pending {
			payload.trace(&mut MarkingVisitor { marking_stack: &mut marking_stack });
		}

		let mut entries = self.entries.borrow_mut();

		//mark
		while let Some(val) = marking_stack.pop() {
			let obj = match entries.get_mut(val.index as usize) {
				Some(&mut Entry { generation, obj: Some(ref mut obj) })
					if generation == val.generation => obj,
				_ => fatal!("the collector reached a value which has already been collected")
			};

			if !obj.marked {
				obj.marked = true;
				obj.trace(&mut MarkingVisitor { marking_stack: &mut marking_stack });
			}
		}

		//sweep. released payloads are dropped after the arena is unborrowed, because a
		//HostData destructor is arbitrary code.
		let mut released = Vec::new();
		let mut vacant = self.vacant.borrow_mut();

		for (index, entry) in entries.iter_mut().enumerate() {
			let keep = match entry.obj {
				Some(ref mut obj) if obj.marked => {
					obj.marked = false;
					true
				}
				Some(_) => false,
				None => true
			};

			if !keep {
				released.push(entry.obj.take());
				entry.generation = entry.generation.wrapping_add(1);
				vacant.push(index as u32);
			}
		}

		drop(vacant);
		drop(entries);

		let freed = released.len();
		self.live.set(self.live.get() - freed);
		self.cycles.set(self.cycles.get() + 1);
		self.gc_in_progress.set(false);

		drop(released);

		debug!("gc cycle {}: released {} values, {} live", self.cycles.get(), freed, self.live.get());
		freed
	}
}

//-------------------------------------------------------------------------------------------------
// Root
//-------------------------------------------------------------------------------------------------

/**
A guard which keeps a value on the root stack for as long as it exists.

Created by [`Engine::root`](struct.Engine.html#method.root). Dropping the guard unroots the
value; guards must be dropped in the reverse order of their creation, which ordinary lexical
scoping guarantees. Dropping guards out of order is a fatal error.
*/

pub struct Root<'a> {
	heap: &'a Heap,
	val: Val
}

impl<'a> Root<'a> {
	pub fn val(&self) -> Val {
		self.val
	}
}

impl<'a> Deref for Root<'a> {
	type Target = Val;

	fn deref(&self) -> &Val {
		&self.val
	}
}

impl<'a> Drop for Root<'a> {
	fn drop(&mut self) {
		self.heap.pop_root(self.val)
	}
}

//-------------------------------------------------------------------------------------------------
// Engine methods
//-------------------------------------------------------------------------------------------------

impl Engine {
	pub(crate) fn alloc(&self, payload: Payload) -> Val {
		if self.heap.count_allocation() {
			let extra_roots = self.extra_roots();
			self.heap.collect(&extra_roots, Some(&payload));
		}

		self.heap.insert(payload)
	}

	/**
	Pushes `val` onto the root stack, returning a guard which pops it again when dropped.
	*/
	pub fn root(&self, val: Val) -> Root {
		self.heap.push_root(val);
		Root { heap: &self.heap, val }
	}

	/**
	Pushes `val` onto the root stack without a guard. Must be balanced by a call to
	[`unroot`](#method.unroot).
	*/
	pub fn push_root(&self, val: Val) {
		self.heap.push_root(val)
	}

	/**
	Pops the top of the root stack.

	If the popped value isn't `expected`, the root stack has been corrupted by unbalanced
	rooting; the process is aborted.
	*/
	pub fn unroot(&self, expected: Val) {
		self.heap.pop_root(expected)
	}

	pub fn root_stack_len(&self) -> usize {
		self.heap.roots_len()
	}

	///Runs a full collection immediately, returning the number of values released.
	pub fn collect(&self) -> usize {
		let extra_roots = self.extra_roots();
		self.heap.collect(&extra_roots, None)
	}

	///The number of values currently registered in the heap.
	pub fn live_values(&self) -> usize {
		self.heap.live()
	}

	pub fn gc_cycles(&self) -> usize {
		self.heap.cycles.get()
	}

	pub fn gc_trigger_limit(&self) -> usize {
		self.heap.trigger_limit.get()
	}

	pub fn set_gc_trigger_limit(&self, limit: usize) {
		self.heap.trigger_limit.set(limit)
	}

	pub fn prevent_gc(&self) -> bool {
		self.heap.prevent_gc.get()
	}

	///While `prevent` is true, allocation never triggers a collection. An explicit
	///[`collect`](#method.collect) still runs.
	pub fn set_prevent_gc(&self, prevent: bool) {
		self.heap.prevent_gc.set(prevent)
	}

	//releases everything, for engine teardown
	pub(crate) fn collect_everything(&self) -> usize {
		self.heap.collect(&[], None)
	}
}
