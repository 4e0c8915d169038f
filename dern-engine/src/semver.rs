use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/**
The payload of a semantic-version value, such as `1.2.3-alpha.1+build.5`.
*/

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SemVer {
	pub major: u64,
	pub minor: u64,
	pub patch: u64,
	pub pre_release: Vec<String>,
	pub build: Vec<String>
}

impl SemVer {
	pub fn new(major: u64, minor: u64, patch: u64) -> SemVer {
		SemVer {
			major,
			minor,
			patch,
			pre_release: Vec::new(),
			build: Vec::new()
		}
	}

	///Parses text of the form `major.minor.patch[-pre.release][+build.metadata]`.
	pub fn parse(text: &str) -> Result<SemVer, String> {
		let (rest, build) = match text.find('+') {
			Some(i) => (&text[..i], split_identifiers(&text[i + 1..], "build metadata")?),
			None => (text, Vec::new())
		};

		let (core, pre_release) = match rest.find('-') {
			Some(i) => (&rest[..i], split_identifiers(&rest[i + 1..], "pre-release")?),
			None => (rest, Vec::new())
		};

		let mut parts = core.split('.');
		let mut component = |name: &str| -> Result<u64, String> {
			match parts.next() {
				Some(part) if !part.is_empty() => {
					part.parse::<u64>().map_err(|_| {
						format!("{} component of semantic version number must be a number", name)
					})
				}
				_ => Err(format!("{} component of semantic version number cannot be empty", name))
			}
		};

		let major = component("Major")?;
		let minor = component("Minor")?;
		let patch = component("Patch")?;

		if parts.next().is_some() {
			return Err("semantic version number has too many components".to_string())
		}

		Ok(SemVer { major, minor, patch, pre_release, build })
	}

	/**
	Compares two versions by precedence. Build metadata is ignored, and a version with a
	pre-release has lower precedence than the same version without one.
	*/
	pub fn precedence(&self, other: &SemVer) -> Ordering {
		let core = (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch));
		if core != Ordering::Equal {
			return core
		}

		match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
			(true, true) => Ordering::Equal,
			(true, false) => Ordering::Greater,
			(false, true) => Ordering::Less,
			(false, false) => {
				for (a, b) in self.pre_release.iter().zip(other.pre_release.iter()) {
					let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
						(Ok(a), Ok(b)) => a.cmp(&b),
						(Ok(_), Err(_)) => Ordering::Less,
						(Err(_), Ok(_)) => Ordering::Greater,
						(Err(_), Err(_)) => a.cmp(b)
					};

					if ord != Ordering::Equal {
						return ord
					}
				}

				self.pre_release.len().cmp(&other.pre_release.len())
			}
		}
	}
}

fn split_identifiers(text: &str, what: &str) -> Result<Vec<String>, String> {
	let idents: Vec<String> = text.split('.').map(|s| s.to_string()).collect();
	if idents.iter().any(|s| s.is_empty()) {
		return Err(format!("empty {} identifier in semantic version number", what))
	}

	Ok(idents)
}

impl Display for SemVer {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

		if !self.pre_release.is_empty() {
			write!(f, "-{}", self.pre_release.join("."))?;
		}

		if !self.build.is_empty() {
			write!(f, "+{}", self.build.join("."))?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_and_display() {
		let v = SemVer::parse("1.2.3-alpha.1+build.5").unwrap();
		assert_eq!(v.major, 1);
		assert_eq!(v.pre_release, vec!["alpha", "1"]);
		assert_eq!(v.build, vec!["build", "5"]);
		assert_eq!(v.to_string(), "1.2.3-alpha.1+build.5");

		assert!(SemVer::parse("1.2").is_err());
		assert!(SemVer::parse("1..3").is_err());
	}

	#[test]
	fn precedence_rules() {
		let p = |s: &str| SemVer::parse(s).unwrap();
		assert_eq!(p("1.0.0-alpha").precedence(&p("1.0.0")), Ordering::Less);
		assert_eq!(p("1.0.0-alpha.1").precedence(&p("1.0.0-alpha.beta")), Ordering::Less);
		assert_eq!(p("1.0.0-beta.11").precedence(&p("1.0.0-beta.2")), Ordering::Greater);
		assert_eq!(p("2.0.0+a").precedence(&p("2.0.0+b")), Ordering::Equal);
		assert_eq!(p("1.10.0").precedence(&p("1.9.9")), Ordering::Greater);
	}
}
