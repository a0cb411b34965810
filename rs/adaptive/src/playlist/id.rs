/// An interned identifier composed of one or more tokens.
///
/// Most manifests use a single token; HLS grouping composes several, e.g. the audio group
/// id plus the rendition name (`"aac English"`). Tokens joined by a space form the display
/// and comparison key.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Id {
	tokens: Vec<String>,
}

impl Id {
	pub fn new(token: impl Into<String>) -> Self {
		Self {
			tokens: vec![token.into()],
		}
	}

	pub fn from_tokens(tokens: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			tokens: tokens.into_iter().map(Into::into).collect(),
		}
	}

	pub fn push(&mut self, token: impl Into<String>) {
		self.tokens.push(token.into());
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}
}

impl std::fmt::Display for Id {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut first = true;
		for token in &self.tokens {
			if !first {
				f.write_str(" ")?;
			}
			f.write_str(token)?;
			first = false;
		}
		Ok(())
	}
}

impl From<&str> for Id {
	fn from(token: &str) -> Self {
		Self::new(token)
	}
}
