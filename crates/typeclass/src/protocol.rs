//! Structural capability checks.

use std::fmt;
use std::sync::Arc;

use tyclass_hierarchy::TypeInfo;

type Check = dyn Fn(&TypeInfo) -> bool + Send + Sync;

/// A named predicate over a type descriptor.
///
/// The predicate must be pure: dispatch caches its answer per type.
#[derive(Clone)]
pub struct Protocol {
	name: Arc<str>,
	check: Arc<Check>,
}

impl Protocol {
	pub fn new<F>(name: impl Into<Arc<str>>, check: F) -> Self
	where
		F: Fn(&TypeInfo) -> bool + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			check: Arc::new(check),
		}
	}

	/// Protocol satisfied by types that offer every listed member.
	pub fn requiring<I, S>(name: impl Into<Arc<str>>, members: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Arc<str>>,
	{
		let members: Vec<Arc<str>> = members.into_iter().map(Into::into).collect();
		Self::new(name, move |info| members.iter().all(|m| info.has_member(m)))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn name_arc(&self) -> Arc<str> {
		Arc::clone(&self.name)
	}

	pub fn accepts(&self, info: &TypeInfo) -> bool {
		(self.check)(info)
	}
}

impl fmt::Debug for Protocol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Protocol").field(&self.name).finish()
	}
}
