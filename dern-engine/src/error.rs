use super::val::Val;

//-------------------------------------------------------------------------------------------------
// Escape, DResult
//-------------------------------------------------------------------------------------------------

/**
The reason an evaluation stopped before producing an ordinary result.

Dern errors are first-class values, so an `Escape::Error` simply carries the error value
outward. `Escape::Return` carries the argument of a `(return x)` call outward until it reaches
the closure body which owns it.

Both variants travel through the `?` operator, which is what lets special forms and natives
stop evaluating their nested forms as soon as either one appears.
*/

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Escape {
	Error(Val),
	Return(Val)
}

impl Escape {
	///The value carried by this `Escape`, whichever variant it is.
	pub fn into_val(self) -> Val {
		match self {
			Escape::Error(val) | Escape::Return(val) => val
		}
	}

	pub fn is_error(&self) -> bool {
		matches!(*self, Escape::Error(_))
	}
}

/**
The return type for any evaluation which might be cut short by an error or an early return.
*/

pub type DResult<T = Val> = Result<T, Escape>;

//-------------------------------------------------------------------------------------------------
// ErrorData
//-------------------------------------------------------------------------------------------------

///The payload of an error value.
#[derive(Clone, Debug)]
pub struct ErrorData {
	pub message: String,
	pub line: Option<usize>
}

impl ErrorData {
	pub fn new(message: String, line: Option<usize>) -> ErrorData {
		ErrorData { message, line }
	}
}

//-------------------------------------------------------------------------------------------------
// macros
//-------------------------------------------------------------------------------------------------

/**
Allocates an error value and returns it from the enclosing function as an `Escape::Error`.

The first argument is an `&Engine`; the rest follows the syntax of `format!`.
*/

#[macro_export]
macro_rules! bail {
	($engine:expr, $($arg:tt)*) => (
		return Err($crate::Escape::Error($engine.new_error(format!($($arg)*))))
	);
}

/**
Calls [`bail!`](macro.bail.html) when the condition is false.
*/

#[macro_export]
macro_rules! ensure {
	($engine:expr, $cond:expr, $($arg:tt)*) => (
		if !($cond) {
			$crate::bail!($engine, $($arg)*)
		}
	);
}

//internal invariant violations are never reported as error values
macro_rules! fatal {
	($($arg:tt)*) => (
		{
			eprintln!("{} - aborting process", format!($($arg)*));
			std::process::abort()
		}
	);
}
