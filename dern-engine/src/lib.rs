#![forbid(unsafe_code)]

#[macro_use]
mod error;

#[macro_use]
mod engine;

mod code;
mod collections;
mod env;
mod eval;
mod gc;
mod io;
mod lex;
mod ops;
mod parse;
mod print;
mod semver;
mod val;

pub use self::{
	code::{Closure, Params, VARARGS_MARKER},
	collections::{Map, Queue},
	engine::{Engine, EngineBuilder, Native, NativeFn, Sym},
	env::Env,
	error::{DResult, ErrorData, Escape},
	gc::{GC_DEFAULT_TRIGGER_LIMIT, Root},
	io::{HostData, Port},
	parse::Reader,
	semver::SemVer,
	val::{Payload, Tag, Val}
};
