/*!
The Dern scripting language.

A [`Runtime`](struct.Runtime.html) owns an [`Engine`](struct.Engine.html) with the standard
library already bound into its global environment. Values returned to the host are only
guaranteed to survive a collection while they're reachable from the global environment or
protected by a [`Root`](struct.Root.html).
*/

pub use dern_engine::*;

pub use dern_stdlib::{init_stdlib, Runtime, RuntimeBuilder};

pub mod prelude {
	/*!
	The prelude.
	*/

	#[doc(no_inline)]
	pub use crate::{
		bail, ensure, epr, eprn, pr, prn,

		DResult, Engine, EngineBuilder, Escape,
		HostData,
		Payload, Port,
		Root, Runtime, RuntimeBuilder,
		Tag,
		Val,
	};
}
