use dern_engine::{bail, ensure, DResult, Engine, Port, Tag, Val};
use super::{bind_builtin, expect_count, expect_tag, int_arg, items, ordinal_name, str_arg};

pub fn init(engine: &Engine, sandboxed: bool) -> DResult<()> {
	if !sandboxed {
		bind_builtin(engine, "input-file-open", input_file_open, 1, "Open a file for reading \
		             octets")?;
		bind_builtin(engine, "output-file-open", output_file_open, 1, "Open a file for writing \
		             octets, creating or truncating it")?;
	}

	bind_builtin(engine, "port-close", port_close, 1, "Close a port, flushing any output")?;
	bind_builtin(engine, "port-read", port_read, 1, "Read one octet from a port, or a vector of \
	             up to the given number of octets")?;
	bind_builtin(engine, "port-write", port_write, 2, "Write octets, characters or strings to a \
	             port")?;
	bind_builtin(engine, "port-flush", port_flush, 1, "Flush a port's buffered output")?;
	bind_builtin(engine, "port-length", port_length, 1, "Get the length of a port in octets, or \
	             -1 when it isn't known")?;
	bind_builtin(engine, "port-supports-input?", port_supports_inputp, 1, "Predicate telling \
	             whether a port can be read from")?;
	bind_builtin(engine, "port-supports-output?", port_supports_outputp, 1, "Predicate telling \
	             whether a port can be written to")?;

	Ok(())
}

//-------------------------------------------------------------------------------------------------
// opening
//-------------------------------------------------------------------------------------------------

fn input_file_open(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "input-file-open", &items, 1)?;

	let path = str_arg(engine, "input-file-open", 0, items[0])?;
	match Port::open_input_file(&path) {
		Ok(port) => Ok(engine.new_port(port)),
		Err(err) => bail!(engine, "Builtin 'input-file-open' cannot open '{}': {}", path, err)
	}
}

fn output_file_open(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "output-file-open", &items, 1)?;

	let path = str_arg(engine, "output-file-open", 0, items[0])?;
	match Port::open_output_file(&path) {
		Ok(port) => Ok(engine.new_port(port)),
		Err(err) => bail!(engine, "Builtin 'output-file-open' cannot open '{}': {}", path, err)
	}
}

//-------------------------------------------------------------------------------------------------
// port operations
//-------------------------------------------------------------------------------------------------

//runs `f` on the port passed as the first argument
fn with_port_arg<R, F>(engine: &Engine, name: &str, port: Val, f: F) -> DResult<R>
where
	F: FnOnce(&mut Port) -> R
{
	expect_tag(engine, name, 0, port, Tag::Port)?;
	match engine.with_port(port, f) {
		Some(result) => Ok(result),
		None => bail!(engine, "First argument to builtin '{}' must be port.", name)
	}
}

fn port_close(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "port-close", &items, 1)?;

	match with_port_arg(engine, "port-close", items[0], |port| port.close())? {
		Ok(()) => Ok(engine.boolean(true)),
		Err(err) => bail!(engine, "Builtin 'port-close' failed: {}", err)
	}
}

fn port_read(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() == 1 || items.len() == 2, "Builtin 'port-read' expects one or \
	        two arguments. {} arguments were given.", items.len());

	let port = items[0];
	let readable = with_port_arg(engine, "port-read", port, |port| port.supports_input())?;
	ensure!(engine, readable, "Builtin 'port-read' cannot read from a port which doesn't support \
	        input.");

	let read_octet = || -> DResult<Option<u8>> {
		match with_port_arg(engine, "port-read", port, |port| port.read_octet())? {
			Ok(octet) => Ok(octet),
			Err(err) => bail!(engine, "Builtin 'port-read' failed: {}", err)
		}
	};

	if items.len() == 1 {
		return Ok(match read_octet()? {
			Some(octet) => engine.new_integer(octet as i32),
			None => engine.nil()
		})
	}

	let count = int_arg(engine, "port-read", 1, items[1])?;
	ensure!(engine, count >= 0, "Second argument to builtin 'port-read' cannot be negative. Now \
	        it is {}.", count);

	let mut octets = Vec::new();
	while octets.len() < count as usize {
		match read_octet()? {
			Some(octet) => octets.push(octet),
			None => break
		}
	}

	let vec = engine.new_vector(Vec::with_capacity(octets.len()));
	let _vec = engine.root(vec);
	for octet in octets {
		let octet = engine.new_integer(octet as i32);
		engine.vector_push(vec, octet);
	}

	Ok(vec)
}

fn port_write(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	ensure!(engine, items.len() >= 2, "Builtin 'port-write' expects at least two arguments. {} \
	        arguments were given.", items.len());

	let mut bytes = Vec::new();
	for (i, &item) in items.iter().enumerate().skip(1) {
		match engine.tag(item) {
			Tag::Integer => {
				let octet = engine.as_integer(item).unwrap_or(0);
				ensure!(engine, (0 ..= 255).contains(&octet), "{} argument to builtin \
				        'port-write' must be an octet (0-255). Now it is {}.", ordinal_name(i),
				        octet);
				bytes.push(octet as u8);
			}
			Tag::Str | Tag::Char => bytes.extend_from_slice(engine.plain_string(item).as_bytes()),
			Tag::Vector => {
				for element in engine.seq_items(item).unwrap_or_default() {
					match engine.as_integer(element) {
						Some(octet) if (0 ..= 255).contains(&octet) => bytes.push(octet as u8),
						_ => bail!(engine, "{} argument to builtin 'port-write' must contain only \
						           octets (0-255).", ordinal_name(i))
					}
				}
			}
			_ => bail!(engine, "{} argument to builtin 'port-write' cannot be of type '{}'.",
			           ordinal_name(i), engine.type_name(item))
		}
	}

	let writable = with_port_arg(engine, "port-write", items[0], |port| port.supports_output())?;
	ensure!(engine, writable, "Builtin 'port-write' cannot write to a port which doesn't support \
	        output.");

	match with_port_arg(engine, "port-write", items[0], |port| port.write(&bytes))? {
		Ok(written) => Ok(engine.new_integer(written as i32)),
		Err(err) => bail!(engine, "Builtin 'port-write' failed: {}", err)
	}
}

fn port_flush(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "port-flush", &items, 1)?;

	match with_port_arg(engine, "port-flush", items[0], |port| port.flush())? {
		Ok(()) => Ok(engine.boolean(true)),
		Err(err) => bail!(engine, "Builtin 'port-flush' failed: {}", err)
	}
}

fn port_length(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "port-length", &items, 1)?;

	let length = with_port_arg(engine, "port-length", items[0], |port| port.length())?;
	Ok(engine.new_integer(length.map(|len| len.min(i32::MAX as u64) as i32).unwrap_or(-1)))
}

fn port_supports_inputp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "port-supports-input?", &items, 1)?;

	let supported = with_port_arg(engine, "port-supports-input?", items[0],
	                              |port| port.supports_input())?;
	Ok(engine.boolean(supported))
}

fn port_supports_outputp(engine: &Engine, args: Val, _env: Val) -> DResult<Val> {
	let items = items(engine, args);
	expect_count(engine, "builtin", "port-supports-output?", &items, 1)?;

	let supported = with_port_arg(engine, "port-supports-output?", items[0],
	                              |port| port.supports_output())?;
	Ok(engine.boolean(supported))
}

#[cfg(test)]
mod tests {
	use crate::Runtime;

	#[test]
	fn reading_an_in_memory_port() {
		let runtime = Runtime::new();
		let port = runtime.new_input_port_from_bytes("bytes", vec![1, 2, 3, 4, 5]);
		runtime.env_define_str(runtime.global_env(), "p", port);

		let result = runtime.read_and_eval_str("(port-read p)");
		assert_eq!(runtime.as_integer(result), Some(1));

		let result = runtime.read_and_eval_str("(port-read p 2)");
		assert_eq!(runtime.repr(result), "(2 3)");

		let length = runtime.read_and_eval_str("(port-length p)");
		assert_eq!(runtime.as_integer(length), Some(5));
		assert_eq!(runtime.read_and_eval_str("(port-supports-output? p)"), runtime.boolean(false));

		let err = runtime.read_and_eval_str("(port-write p 1)");
		assert!(runtime.is_error(err));

		runtime.read_and_eval_str("(port-close p)");
		assert_eq!(runtime.read_and_eval_str("(port-supports-input? p)"), runtime.boolean(false));
	}

	#[test]
	fn writing_and_reading_a_file() {
		let path = std::env::temp_dir().join(format!("dern-port-test-{}.bin", std::process::id()));
		let runtime = Runtime::new();
		let path_val = runtime.new_string(path.to_string_lossy().into_owned());
		runtime.env_define_str(runtime.global_env(), "path", path_val);

		let result = runtime.read_and_eval_str("
			(define out as (output-file-open path) [out])
			(port-write out [hi] 33)
			(port-close out)
			(define total as 0 [total])
			(for octet in (input-file-open path) (+= total octet))
			total
		");

		let _ = std::fs::remove_file(&path);
		assert_eq!(runtime.as_integer(result), Some(104 + 105 + 33));
	}
}
