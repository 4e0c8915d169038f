use dern::{Runtime, RuntimeBuilder};
use proptest::prelude::*;

fn vector_literal(items: &[i32]) -> String {
	let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
	format!("(vector {})", items.join(" "))
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn integer_addition_is_checked(a in any::<i32>(), b in any::<i32>()) {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str(&format!("(+ {} {})", a, b));

		match a.checked_add(b) {
			Some(sum) => prop_assert_eq!(runtime.as_integer(result), Some(sum)),
			None => prop_assert!(runtime.is_error(result))
		}
	}

	#[test]
	fn comparisons_agree_with_rust(a in -1000i32..1000, b in -1000i32..1000) {
		let runtime = Runtime::new();
		let check = |op: &str, expected: bool| {
			let result = runtime.read_and_eval_str(&format!("({} {} {})", op, a, b));
			runtime.as_boolean(result) == Some(expected)
		};

		prop_assert!(check("<", a < b));
		prop_assert!(check(">", a > b));
		prop_assert!(check("<=", a <= b));
		prop_assert!(check(">=", a >= b));
		prop_assert!(check("==", a == b));
		prop_assert!(check("!=", a != b));
	}

	#[test]
	fn for_in_visits_every_step(items in prop::collection::vec(-100i32..100, 0..40), step in 1usize..5) {
		let runtime = Runtime::new();
		let result = runtime.read_and_eval_str(&format!("
			(define total as 0 [total])
			(define visited as (for x in {} step {} (+= total x)) [visited])
			(vector visited total)
		", vector_literal(&items), step));

		let expected_total: i32 = items.iter().step_by(step).sum();
		let expected_visits = items.iter().step_by(step).count() as i32;

		let visits = runtime.vector_get(result, 0).and_then(|val| runtime.as_integer(val));
		let total = runtime.vector_get(result, 1).and_then(|val| runtime.as_integer(val));
		prop_assert_eq!(visits, Some(expected_visits));
		prop_assert_eq!(total, Some(expected_total));
	}

	#[test]
	fn copies_survive_collection(items in prop::collection::vec(any::<i32>(), 0..30)) {
		let runtime = RuntimeBuilder::new().gc_trigger_limit(2).build();
		let result = runtime.read_and_eval_str(&format!("
			(define original as {} [original])
			(define copied as (copy original) [copied])
			(and (== original copied) (not (=== original copied)))
		", vector_literal(&items)));
		prop_assert_eq!(result, runtime.boolean(true));

		runtime.collect();
		let copied = runtime.read_and_eval_str("copied");
		let values: Vec<Option<i32>> = runtime.seq_items(copied).unwrap_or_default()
			.into_iter()
			.map(|val| runtime.as_integer(val))
			.collect();
		let expected: Vec<Option<i32>> = items.iter().map(|&i| Some(i)).collect();
		prop_assert_eq!(values, expected);
	}

	#[test]
	fn early_return_yields_the_returned_value(x in any::<i32>(), depth in 1usize..6) {
		let runtime = Runtime::new();
		let roots = runtime.root_stack_len();

		let mut body = format!("(return {})", x);
		for _ in 0 .. depth {
			body = format!("(while true {})", body);
		}

		let result = runtime.read_and_eval_str(&format!("((fn () {} 0))", body));
		prop_assert_eq!(runtime.as_integer(result), Some(x));
		prop_assert_eq!(runtime.root_stack_len(), roots);
	}
}
