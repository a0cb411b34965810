use crate::Stime;

/// Values substituted into a templated URL component at emission time.
#[derive(Debug, Clone)]
pub struct TemplateContext {
	pub number: u64,
	/// Scaled start time of the segment, for `$Time$`.
	pub time: Stime,
	pub bandwidth: u64,
	pub representation_id: String,
}

/// One piece of a URL, classified at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
	value: String,
	/// Whether `$...$` substitution applies when the URL is emitted.
	templated: bool,
	scheme: bool,
	dir: bool,
	absolute: bool,
}

impl Component {
	pub fn new(value: impl Into<String>) -> Self {
		Self::build(value.into(), false)
	}

	pub fn template(value: impl Into<String>) -> Self {
		Self::build(value.into(), true)
	}

	fn build(value: String, templated: bool) -> Self {
		let dir = value.ends_with('/');
		let absolute = value.starts_with('/');
		let scheme = match (value.find("://"), value.find('/')) {
			(Some(colon), Some(slash)) => colon + 1 == slash,
			_ => false,
		};
		Self {
			value,
			templated,
			scheme,
			dir,
			absolute,
		}
	}

	pub fn has_scheme(&self) -> bool {
		self.scheme
	}
}

/// A URL as an ordered vector of components, reduced left to right on emission.
///
/// A component with a scheme discards everything before it; an absolute path replaces only
/// the path of the accumulator; directories are preserved only while they are not the last
/// component.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Url {
	components: Vec<Component>,
}

impl Url {
	pub fn new(value: impl Into<String>) -> Self {
		Self {
			components: vec![Component::new(value)],
		}
	}

	pub fn template(value: impl Into<String>) -> Self {
		Self {
			components: vec![Component::template(value)],
		}
	}

	pub fn is_empty(&self) -> bool {
		self.components.is_empty()
	}

	pub fn has_scheme(&self) -> bool {
		self.components.first().is_some_and(|c| c.scheme)
	}

	pub fn prepend(&mut self, component: Component) -> &mut Self {
		self.components.insert(0, component);
		self
	}

	pub fn append(&mut self, component: Component) -> &mut Self {
		if self.components.last().is_some_and(|c| !c.dir) {
			self.components.pop();
		}
		self.components.push(component);
		self
	}

	pub fn append_url(&mut self, url: Url) -> &mut Self {
		let Some(front) = url.components.first() else {
			return self;
		};

		// An absolute path keeps only the scheme and authority of the accumulator.
		if front.absolute && self.has_scheme() {
			self.components.truncate(1);
			let first = &mut self.components[0];
			if let Some(colon) = first.value.find("://") {
				if let Some(path) = first.value[colon + 3..].find('/') {
					first.value.truncate(colon + 3 + path);
				}
			}
		}

		if self.components.last().is_some_and(|c| !c.dir) {
			self.components.pop();
		}
		self.components.extend(url.components);
		self
	}

	pub fn to_string_with(&self, ctx: Option<&TemplateContext>) -> String {
		let mut accumulated = String::new();
		for component in &self.components {
			let part = match (component.templated, ctx) {
				(true, Some(ctx)) => substitute(&component.value, ctx),
				_ => component.value.clone(),
			};
			if accumulated.is_empty() {
				accumulated = part;
			} else {
				accumulated = resolve(&accumulated, &part);
			}
		}
		accumulated
	}
}

impl std::fmt::Display for Url {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.to_string_with(None))
	}
}

/// Resolve `reference` against `base` using standard URL joining, with a textual fallback
/// when the accumulator isn't an absolute URL yet.
fn resolve(base: &str, reference: &str) -> String {
	if let Ok(parsed) = url::Url::parse(base) {
		if let Ok(joined) = parsed.join(reference) {
			return joined.to_string();
		}
	}

	// The reference may itself be absolute.
	if url::Url::parse(reference).is_ok() {
		return reference.to_string();
	}

	match base.rfind('/') {
		Some(pos) if !reference.starts_with('/') => format!("{}{}", &base[..=pos], reference),
		_ => reference.to_string(),
	}
}

/// Expand the `$...$` template grammar.
///
/// Recognized tokens: `$$`, `$RepresentationID$`, `$Number$`, `$Time$`, `$Bandwidth$`, and
/// the zero-padded width forms `$Number%05d$` etc. Anything else stays literal, dollars
/// included.
pub fn substitute(pattern: &str, ctx: &TemplateContext) -> String {
	let mut out = String::with_capacity(pattern.len());
	let mut rest = pattern;

	while let Some(start) = rest.find('$') {
		out.push_str(&rest[..start]);
		let after = &rest[start + 1..];
		let Some(end) = after.find('$') else {
			// Unterminated token, keep as-is.
			out.push_str(&rest[start..]);
			return out;
		};

		let token = &after[..end];
		match expand(token, ctx) {
			Some(expanded) => out.push_str(&expanded),
			None => {
				out.push('$');
				out.push_str(token);
				out.push('$');
			}
		}
		rest = &after[end + 1..];
	}

	out.push_str(rest);
	out
}

fn expand(token: &str, ctx: &TemplateContext) -> Option<String> {
	if token.is_empty() {
		return Some("$".to_string());
	}
	if token == "RepresentationID" {
		return Some(ctx.representation_id.clone());
	}

	let (name, width) = match token.find('%') {
		Some(pos) => {
			let spec = token[pos + 1..].strip_prefix('0')?.strip_suffix('d')?;
			(&token[..pos], Some(spec.parse::<usize>().ok()?))
		}
		None => (token, None),
	};

	let value: u64 = match name {
		"Number" => ctx.number,
		"Time" => ctx.time as u64,
		"Bandwidth" => ctx.bandwidth,
		_ => return None,
	};

	Some(match width {
		Some(width) => format!("{:0width$}", value, width = width),
		None => value.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ctx() -> TemplateContext {
		TemplateContext {
			number: 42,
			time: 123_400,
			bandwidth: 1_280_000,
			representation_id: "video-hi".to_string(),
		}
	}

	#[test]
	fn substitution_tokens() {
		let ctx = ctx();
		assert_eq!(substitute("$Number$.m4v", &ctx), "42.m4v");
		assert_eq!(substitute("seg-$Number%05d$.m4s", &ctx), "seg-00042.m4s");
		assert_eq!(substitute("$RepresentationID$/$Time$.mp4", &ctx), "video-hi/123400.mp4");
		assert_eq!(substitute("$Bandwidth%08d$", &ctx), "01280000");
		assert_eq!(substitute("100$$.ts", &ctx), "100$.ts");
	}

	#[test]
	fn unknown_tokens_stay_literal() {
		let ctx = ctx();
		assert_eq!(substitute("$SubNumber$.m4v", &ctx), "$SubNumber$.m4v");
		assert_eq!(substitute("$Number%5d$.m4v", &ctx), "$Number%5d$.m4v");
		assert_eq!(substitute("broken$", &ctx), "broken$");
	}

	#[test]
	fn relative_resolution() {
		let mut url = Url::new("http://example.com/live/");
		url.append(Component::new("segment1.ts"));
		assert_eq!(url.to_string(), "http://example.com/live/segment1.ts");
	}

	#[test]
	fn scheme_discards_prefix() {
		let mut url = Url::new("http://example.com/live/");
		url.append(Component::new("http://cdn.example.com/other.ts"));
		assert_eq!(url.to_string(), "http://cdn.example.com/other.ts");
	}

	#[test]
	fn absolute_path_replaces_path_only() {
		let mut url = Url::new("http://example.com/deep/nested/");
		url.append_url(Url::new("/other/path.ts"));
		assert_eq!(url.to_string(), "http://example.com/other/path.ts");
	}

	#[test]
	fn non_dir_component_is_replaced_on_append() {
		let mut url = Url::new("http://example.com/a/");
		url.append(Component::new("playlist.m3u8"));
		url.append(Component::new("segment.ts"));
		assert_eq!(url.to_string(), "http://example.com/a/segment.ts");
	}
}
