//! Navigation seam and a recording implementation for headless hosts.

// self
use crate::_prelude::*;

/// Navigation side effects the broker asks the host to perform.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Loads `url` into the hidden frame called `frame`, creating it if needed.
	fn load_frame(&self, frame: &str, url: &Url);

	/// Replaces the top-level document with `url`; the current context is expected to unload.
	fn redirect(&self, url: &Url);

	/// Removes the response fragment from the visible address without a reload.
	fn clear_fragment(&self);

	/// Address of the current document.
	fn current_url(&self) -> Url;

	/// `false` when running inside a frame rather than the top-level window.
	fn is_top_level(&self) -> bool {
		true
	}
}

/// Navigation performed by a [`RecordingNavigator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
	/// Hidden-frame load.
	Frame {
		/// Frame name.
		name: String,
		/// Loaded URL.
		url: Url,
	},
	/// Top-level redirect.
	Redirect(Url),
	/// Fragment removal.
	ClearFragment,
}

/// Navigator that records every request instead of performing it.
#[derive(Debug)]
pub struct RecordingNavigator {
	current: Url,
	top_level: bool,
	log: Mutex<Vec<Navigation>>,
}
impl RecordingNavigator {
	/// Creates a top-level navigator positioned at `current`.
	pub fn new(current: Url) -> Self {
		Self { current, top_level: true, log: Mutex::new(Vec::new()) }
	}

	/// Marks the navigator as running inside a frame.
	pub fn inside_frame(mut self) -> Self {
		self.top_level = false;

		self
	}

	/// Every navigation in the order it was requested.
	pub fn history(&self) -> Vec<Navigation> {
		self.log.lock().clone()
	}

	/// Hidden-frame loads as `(frame, url)` pairs.
	pub fn frame_loads(&self) -> Vec<(String, Url)> {
		self.log
			.lock()
			.iter()
			.filter_map(|nav| match nav {
				Navigation::Frame { name, url } => Some((name.clone(), url.clone())),
				_ => None,
			})
			.collect()
	}

	/// Top-level redirects.
	pub fn redirects(&self) -> Vec<Url> {
		self.log
			.lock()
			.iter()
			.filter_map(|nav| match nav {
				Navigation::Redirect(url) => Some(url.clone()),
				_ => None,
			})
			.collect()
	}

	/// Number of fragment removals.
	pub fn fragment_clears(&self) -> usize {
		self.log.lock().iter().filter(|nav| matches!(nav, Navigation::ClearFragment)).count()
	}
}
impl Navigator for RecordingNavigator {
	fn load_frame(&self, frame: &str, url: &Url) {
		self.log.lock().push(Navigation::Frame { name: frame.to_owned(), url: url.clone() });
	}

	fn redirect(&self, url: &Url) {
		self.log.lock().push(Navigation::Redirect(url.clone()));
	}

	fn clear_fragment(&self) {
		self.log.lock().push(Navigation::ClearFragment);
	}

	fn current_url(&self) -> Url {
		self.current.clone()
	}

	fn is_top_level(&self) -> bool {
		self.top_level
	}
}
