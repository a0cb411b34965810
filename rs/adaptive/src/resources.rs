use std::collections::HashMap;
use std::sync::Mutex;

use crate::http::ConnectionManager;

/// Decryption keys fetched out of band, addressed by their key URI.
///
/// The store itself is dumb: whoever owns the DRM session puts keys in, the consumer of a
/// chunk takes them out. The tracker never gates on key availability.
#[derive(Default)]
pub struct KeyStore {
	keys: Mutex<HashMap<String, Vec<u8>>>,
}

impl KeyStore {
	pub fn put(&self, uri: impl Into<String>, key: Vec<u8>) {
		self.keys.lock().unwrap().insert(uri.into(), key);
	}

	pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
		self.keys.lock().unwrap().get(uri).cloned()
	}

	pub fn contains(&self, uri: &str) -> bool {
		self.keys.lock().unwrap().contains_key(uri)
	}
}

/// Process-wide bundle shared by every tracker of a playback session.
///
/// Lives for the whole session; trackers borrow it immutably. Carries the connection
/// manager so lazy playlist refetches can reach the network; logging goes through
/// `tracing` rather than a sink carried here.
#[derive(Default)]
pub struct SharedResources {
	pub keys: KeyStore,
	connection: Option<Box<dyn ConnectionManager + Send + Sync>>,
}

impl SharedResources {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_connection(connection: Box<dyn ConnectionManager + Send + Sync>) -> Self {
		Self {
			keys: KeyStore::default(),
			connection: Some(connection),
		}
	}

	pub fn connection(&self) -> Option<&(dyn ConnectionManager + Send + Sync)> {
		self.connection.as_deref()
	}
}
