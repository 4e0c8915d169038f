use dern::{Runtime, RuntimeBuilder, Tag};
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

fn int(runtime: &Runtime, text: &str) -> Option<i32> {
	let result = runtime.read_and_eval_str(text);
	runtime.as_integer(result)
}

#[test]
fn early_return_stops_loops() {
	let runtime = Runtime::new();
	assert_eq!(int(&runtime, "((fn (x) (while true (return x))) 5)"), Some(5));

	let result = int(&runtime, "
		((fn (x)
			(for i from 1 to 10
				(while true
					(do (return (+ x i)))))
			(return 0))
		 5)
	");
	assert_eq!(result, Some(6));

	//a return only leaves the innermost function
	let result = int(&runtime, "
		(define outer as (fn () (do ((fn () (return 1))) 2)) [outer])
		(outer)
	");
	assert_eq!(result, Some(2));
}

#[test]
fn closures_capture_their_environment() {
	let runtime = Runtime::new();
	let result = int(&runtime, "
		(define make-counter as (fn (start)
			(fn () (++ start) start))
			[make-counter])
		(define a as (make-counter 10) [a])
		(define b as (make-counter 100) [b])
		(a) (a) (b)
		(+ (a) (b))
	");
	assert_eq!(result, Some(13 + 102));
}

#[test]
fn variadic_closures() {
	let runtime = Runtime::new();
	let result = runtime.read_and_eval_str("((fn (a ... rest) (vector a rest)) 1 2 3)");
	assert_eq!(runtime.repr(result), "(1 (2 3))");

	let result = runtime.read_and_eval_str("((fn (a rest ...) rest) 1)");
	assert_eq!(runtime.repr(result), "()");

	let err = runtime.read_and_eval_str("((fn (a b) a) 1)");
	assert!(runtime.is_error(err));
}

#[test]
fn define_dispatches_on_argument_count() {
	let runtime = Runtime::new();

	let result = runtime.read_and_eval_str("(define x as 1 [one])");
	assert_eq!(result, runtime.boolean(true));
	assert_eq!(int(&runtime, "x"), Some(1));

	let result = int(&runtime, "
		(define scope as (env-new) [scope])
		(define y as 2 [two] in scope)
		(find scope (quote y))
	");
	assert_eq!(result, Some(2));
	let unbound = runtime.read_and_eval_str("(error? y)");
	assert_eq!(unbound, runtime.boolean(true));

	let result = runtime.read_and_eval_str("
		(define add as (fn (a b) (+ a b)) [adds two numbers]
			(quote (a [first addend] b [second addend])) in (env-global) howto-ok)
		(add 2 3)
	");
	assert_eq!(runtime.as_integer(result), Some(5));

	let doc = runtime.read_and_eval_str("(doc add)");
	assert_eq!(runtime.as_str(doc).as_deref(),
	           Some("adds two numbers\nArguments are:\na -> first addend\nb -> second addend"));

	let err = runtime.read_and_eval_str("
		(define sub as (fn (a b) (- a b)) [subtracts]
			(quote (a [first])) in (env-global) howto-ok)
	");
	assert!(runtime.is_error(err));
	assert_eq!(runtime.read_and_eval_str("(error? sub)"), runtime.boolean(true));

	let err = runtime.read_and_eval_str("
		(define mul as (fn (a b) (* a b)) [multiplies]
			(quote (a [first] b [second])) in (env-global) howto-maybe)
	");
	assert!(runtime.is_error(err));
	assert_eq!(runtime.read_and_eval_str("(error? mul)"), runtime.boolean(true));

	let err = runtime.read_and_eval_str("(define z as 1)");
	assert!(runtime.is_error(err));
}

#[test]
fn copies_are_equal_but_distinct() {
	let runtime = Runtime::new();
	let result = runtime.read_and_eval_str("
		(define a as (vector 1 (vector 2 [s]) (hash-map |k| 3)) [a])
		(define b as (copy a) [b])
		(and (== a b) (not (=== a b)) (not (=== (nth 1 a) (nth 1 b))))
	");
	assert_eq!(result, runtime.boolean(true));

	let result = runtime.read_and_eval_str("
		(+= (nth 1 b) 4)
		(== a b)
	");
	assert_eq!(result, runtime.boolean(false));
}

#[test]
fn for_in_honours_the_step() {
	let capture = Capture::default();
	let runtime = RuntimeBuilder::new().pr_writer(Box::new(capture.clone())).build();

	let result = runtime.read_and_eval_str("(for i in (vector 10 20 30 40) step 2 (println i))");
	assert_eq!(runtime.as_integer(result), Some(2));
	assert_eq!(capture.text(), "10\n30\n");

	let result = int(&runtime, "
		(define total as 0 [total])
		(for i from 5 to 1 (+= total i))
		total
	");
	assert_eq!(result, Some(15));
}

#[test]
fn control_forms() {
	let runtime = Runtime::new();

	assert_eq!(int(&runtime, "(if (< 1 2) 1 2)"), Some(1));
	assert_eq!(runtime.read_and_eval_str("(if false 1)"), runtime.nil());
	assert!(runtime.is_error(runtime.read_and_eval_str("(if 1 2 3)")));

	assert_eq!(int(&runtime, "(select (> 1 2) 1 (== 1 2) 2 default 3)"), Some(3));
	assert_eq!(runtime.read_and_eval_str("(select false 1)"), runtime.nil());

	assert_eq!(runtime.read_and_eval_str("(and 1 nil 2)"), runtime.boolean(false));
	assert_eq!(int(&runtime, "(or nil false 7)"), Some(7));

	assert_eq!(int(&runtime, "(define n as 0 [n]) (while (< n 4) (++ n))"), Some(4));

	let result = runtime.read_and_eval_str("
		(define unless as (macro (test body) (template (if (unquote test) nil (unquote body))))
			[evaluates body when test is false])
		(unless false [ran])
	");
	assert_eq!(runtime.as_str(result).as_deref(), Some("ran"));
}

#[test]
fn assignment_requires_an_existing_binding() {
	let runtime = Runtime::new();

	let err = runtime.read_and_eval_str("(= nosuch 5)");
	assert!(runtime.is_error(err));
	assert_eq!(runtime.read_and_eval_str("(error? nosuch)"), runtime.boolean(true));

	let result = int(&runtime, "
		(define w as 1 [w])
		((fn () (= w 2)))
		w
	");
	assert_eq!(result, Some(2));

	let result = runtime.read_and_eval_str("
		(define slots as (vector 1 2) [slots])
		(= slots 1 [two])
		slots
	");
	assert_eq!(runtime.repr(result), "(1 [two])");
}

#[test]
fn return_stops_nested_source_evaluation() {
	let capture = Capture::default();
	let runtime = RuntimeBuilder::new().pr_writer(Box::new(capture.clone())).build();

	let result = int(&runtime, "
		((fn ()
			(read-and-eval-string [(return 1)
				(println |string-start|after|string-end|)
				(define leaked as 7 |string-start|leaked|string-end|)])
			2))
	");
	assert_eq!(result, Some(1));
	assert_eq!(capture.text(), "");
	assert_eq!(runtime.read_and_eval_str("(error? leaked)"), runtime.boolean(true));
}

#[test]
fn if_calls_a_function_test() {
	let runtime = Runtime::new();
	assert_eq!(int(&runtime, "(if (fn () true) 1 2)"), Some(1));
	assert_eq!(int(&runtime, "(if (fn () false) 1 2)"), Some(2));
	assert!(runtime.is_error(runtime.read_and_eval_str("(if (fn () 1) 1 2)")));
}

#[test]
fn for_in_traverses_every_container() {
	let runtime = Runtime::new();

	let result = runtime.read_and_eval_str("
		(define text as [] [text])
		(for c in [abc] (+= text c c))
		text
	");
	assert_eq!(runtime.as_str(result).as_deref(), Some("aabbcc"));

	let result = int(&runtime, "
		(define sum as 0 [sum])
		(for pair in (hash-map 1 10 2 20) (+= sum (nth 0 pair) (nth 1 pair)))
		sum
	");
	assert_eq!(result, Some(33));

	let result = int(&runtime, "
		(define scope as (env-new) [scope])
		(define q as 5 [q] in scope)
		(define from-env as 0 [from-env])
		(for pair in scope (+= from-env (nth 1 pair)))
		from-env
	");
	assert_eq!(result, Some(5));

	let result = int(&runtime, "
		(define seqs as 0 [seqs])
		(for x in (list 1 2 3) (+= seqs x))
		(for x in (queue 10 20) (+= seqs x))
		seqs
	");
	assert_eq!(result, Some(36));
}

#[test]
fn for_rejects_bad_steps() {
	let runtime = Runtime::new();
	assert!(runtime.is_error(runtime.read_and_eval_str("(for i in (vector 1 2) step 0 i)")));
	assert!(runtime.is_error(runtime.read_and_eval_str("(for i in (vector 1 2) step (+ 1 1) i)")));
	assert!(runtime.is_error(runtime.read_and_eval_str("(for i from 1 to 3 step -1 i)")));
}

#[test]
fn select_default_must_come_last() {
	let runtime = Runtime::new();
	assert!(runtime.is_error(runtime.read_and_eval_str("(select default 1 true 2)")));
	assert!(runtime.is_error(runtime.read_and_eval_str("(select 1 2)")));
	assert_eq!(int(&runtime, "(select false 1 default 2)"), Some(2));
}

#[test]
fn errors_carry_a_message() {
	let runtime = Runtime::new();

	let err = runtime.read_and_eval_str("(undefined-thing 1)");
	assert_eq!(runtime.tag(err), Tag::Error);
	assert!(runtime.error_message(err).unwrap_or_default().contains("undefined-thing"));

	let err = runtime.read_and_eval_str("(+ 2147483647 1)");
	assert!(runtime.is_error(err));

	assert_eq!(runtime.read_and_eval_str("(error? (/ 1 0))"), runtime.boolean(true));
	assert_eq!(runtime.read_and_eval_str("(error? (/ 1 1))"), runtime.boolean(false));
}

#[test]
fn evaluation_leaves_the_root_stack_balanced() {
	let runtime = Runtime::new();
	let before = runtime.root_stack_len();

	let programs = [
		"(define v as (vector 1 2 3) [v])",
		"(for x in v (+ x 1))",
		"(for i from 0 to 3 step 2 (vector i))",
		"(define m as (hash-map 1 2) [m]) (= m 3 4) (find m 3)",
		"(select (== 1 1) (vector 1) default 2)",
		"(while false 1)",
		"((fn (x) (while true (return x))) 5)",
		"(error? (nth 10 v))",
		"(nth 10 v)",
		"(template (a (unquote (+ 1 2))))",
		"(to-string (copy v) [s] |c|)",
		"(split [a,b,c] |,|)",
		"(pop-front (queue 1 2 3))",
		"(eval '(+ 1 2) (env-new))",
		"(port-read (vector 1))",
		"(define z as)",
		"(return 3)",
		"(if (fn () true) 1 2)",
		"(if 1 2)",
		"(quote (a b))",
		"(do 1 (vector 2))",
		"(and true (vector 1))",
		"(or false (vector 2))",
		"(define twice as (macro (x) (template (do (unquote x) (unquote x)))) [twice]) (twice 3)",
		"(error? (undefined-thing))",
		"(error? 1)",
		"(= nosuch 1)",
		"(for c in [abc] c)",
		"(for pair in m pair)",
		"(for i in v step 0 i)",
		"(select default 1 true 2)",
		"(read-and-eval-string [(+ 1 2)])",
		"((fn () (read-and-eval-string [(return 1) 2]) 3))",
		"(= v (vector 9))",
	];

	for program in &programs {
		runtime.read_and_eval_str(program);
		assert_eq!(runtime.root_stack_len(), before, "unbalanced after {}", program);
	}
}

#[test]
fn values_survive_frequent_collection() {
	let runtime = RuntimeBuilder::new().gc_trigger_limit(1).build();

	let result = runtime.read_and_eval_str("
		(define build as (fn (n)
			(define out as (vector) [out])
			(for i from 1 to n
				(+= out (vector i (to-string [item] i) (hash-map i (vector i)))))
			out)
			[build])
		(define data as (build 50) [data])
		(define total as 0 [total])
		(for entry in data (+= total (nth 0 entry)))
		total
	");
	assert_eq!(runtime.as_integer(result), Some(50 * 51 / 2));
	assert!(runtime.gc_cycles() > 0);

	let last = runtime.read_and_eval_str("(nth 1 (nth 49 data))");
	assert_eq!(runtime.as_str(last).as_deref(), Some("item50"));
}

#[test]
fn unreachable_values_are_reclaimed() {
	let runtime = RuntimeBuilder::new().prevent_gc(true).build();
	runtime.collect();
	let baseline = runtime.live_values();

	runtime.read_and_eval_str("(for i from 1 to 100 (vector i (vector i)))");
	assert!(runtime.live_values() > baseline);

	runtime.collect();
	assert!(runtime.live_values() <= baseline + 1);

	let kept = runtime.new_vector(Vec::new());
	let root = runtime.root(kept);
	runtime.collect();
	assert!(runtime.is_live(kept));
	drop(root);

	runtime.collect();
	assert!(!runtime.is_live(kept));
}

#[test]
fn host_natives_join_the_global_environment() {
	let runtime = Runtime::new();
	let registered = runtime.register_builtin("double", |engine, args, _env| {
		match engine.vector_get(args, 0).and_then(|val| engine.as_integer(val)) {
			Some(i) => engine.new_integer(i * 2),
			None => engine.new_error("double expects an integer")
		}
	}, 1, "Double an integer", true, runtime.global_env());
	assert!(registered);

	assert_eq!(int(&runtime, "(double 21)"), Some(42));
	assert!(runtime.is_error(runtime.read_and_eval_str("(double [x])")));
}
