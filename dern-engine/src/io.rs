use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use std::rc::Rc;

//-------------------------------------------------------------------------------------------------
// Port
//-------------------------------------------------------------------------------------------------

/**
The payload of an I/O port value.

An input port yields successive octets until the end of its input. An output port accepts
octets. A closed port does neither.
*/

pub struct Port {
	name: String,
	kind: PortKind,
	length: Option<u64>
}

enum PortKind {
	Input(Box<dyn Read>),
	Output(Box<dyn Write>),
	Closed
}

impl Port {
	pub fn input<R: Read + 'static>(name: &str, reader: R, length: Option<u64>) -> Port {
		Port {
			name: name.to_string(),
			kind: PortKind::Input(Box::new(reader)),
			length
		}
	}

	pub fn output<W: Write + 'static>(name: &str, writer: W) -> Port {
		Port {
			name: name.to_string(),
			kind: PortKind::Output(Box::new(writer)),
			length: Some(0)
		}
	}

	pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Port {
		let len = bytes.len() as u64;
		Port::input(name, Cursor::new(bytes), Some(len))
	}

	pub fn open_input_file<P: AsRef<Path>>(path: P) -> io::Result<Port> {
		let path = path.as_ref();
		let file = File::open(path)?;
		let length = file.metadata().ok().map(|meta| meta.len());
		Ok(Port::input(&path.to_string_lossy(), BufReader::new(file), length))
	}

	pub fn open_output_file<P: AsRef<Path>>(path: P) -> io::Result<Port> {
		let path = path.as_ref();
		let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
		Ok(Port::output(&path.to_string_lossy(), BufWriter::new(file)))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn supports_input(&self) -> bool {
		matches!(self.kind, PortKind::Input(_))
	}

	pub fn supports_output(&self) -> bool {
		matches!(self.kind, PortKind::Output(_))
	}

	///The number of octets in an input source, or written so far to an output port.
	pub fn length(&self) -> Option<u64> {
		match self.kind {
			PortKind::Closed => None,
			_ => self.length
		}
	}

	///Reads a single octet. Returns `Ok(None)` at the end of input, or for a port which
	///doesn't support input.
	pub fn read_octet(&mut self) -> io::Result<Option<u8>> {
		match self.kind {
			PortKind::Input(ref mut reader) => {
				let mut buf = [0u8; 1];
				loop {
					match reader.read(&mut buf) {
						Ok(0) => return Ok(None),
						Ok(_) => return Ok(Some(buf[0])),
						Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
						Err(err) => return Err(err)
					}
				}
			}
			_ => Ok(None)
		}
	}

	pub fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
		match self.kind {
			PortKind::Output(ref mut writer) => {
				writer.write_all(bytes)?;
				self.length = Some(self.length.unwrap_or(0) + bytes.len() as u64);
				Ok(bytes.len())
			}
			_ => Err(io::Error::new(io::ErrorKind::Other, "port does not support output"))
		}
	}

	pub fn flush(&mut self) -> io::Result<()> {
		match self.kind {
			PortKind::Output(ref mut writer) => writer.flush(),
			_ => Ok(())
		}
	}

	pub fn close(&mut self) -> io::Result<()> {
		self.flush()?;
		self.kind = PortKind::Closed;
		Ok(())
	}
}

impl Debug for Port {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		let kind = match self.kind {
			PortKind::Input(_) => "input",
			PortKind::Output(_) => "output",
			PortKind::Closed => "closed"
		};
		write!(f, "Port({}, {:?})", kind, self.name)
	}
}

impl Drop for Port {
	fn drop(&mut self) {
		//a failed flush during collection has nowhere to be reported
		self.flush().ok();
	}
}

//-------------------------------------------------------------------------------------------------
// HostData
//-------------------------------------------------------------------------------------------------

/**
The payload of an opaque host-data value: arbitrary Rust data owned by the embedding program
or by an extension library.

When `copyable` is false, [`Engine::copy`](struct.Engine.html#method.copy) refuses to copy the
value and produces an error value instead. Copies share the same underlying data.

The data is dropped when the last value holding it is collected.
*/

#[derive(Clone)]
pub struct HostData {
	pub plugin: String,
	pub type_name: String,
	pub copyable: bool,
	data: Rc<dyn Any>
}

impl HostData {
	pub fn new<T: Any>(plugin: &str, type_name: &str, copyable: bool, data: T) -> HostData {
		HostData {
			plugin: plugin.to_string(),
			type_name: type_name.to_string(),
			copyable,
			data: Rc::new(data)
		}
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.data.downcast_ref::<T>()
	}

	pub fn ptr_eq(&self, other: &HostData) -> bool {
		Rc::ptr_eq(&self.data, &other.data)
	}
}

impl Debug for HostData {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "HostData({}:{})", self.plugin, self.type_name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn byte_port_reads_to_end() {
		let mut port = Port::from_bytes("bytes", vec![1, 2, 3]);
		assert!(port.supports_input());
		assert!(!port.supports_output());
		assert_eq!(port.length(), Some(3));

		let mut read = Vec::new();
		while let Some(octet) = port.read_octet().unwrap() {
			read.push(octet);
		}
		assert_eq!(read, vec![1, 2, 3]);

		port.close().unwrap();
		assert!(!port.supports_input());
		assert_eq!(port.length(), None);
	}

	#[test]
	fn output_port_counts_octets() {
		let mut port = Port::output("sink", Vec::new());
		assert_eq!(port.write(b"abc").unwrap(), 3);
		assert_eq!(port.length(), Some(3));
		assert!(port.read_octet().unwrap().is_none());
	}
}
