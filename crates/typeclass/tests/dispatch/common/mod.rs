//! Common utilities for dispatch integration tests.

use std::sync::Arc;

use tyclass::{Hierarchy, TypeDecl, Typeclass};

/// Installs a fmt subscriber once per test binary.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Builds an isolated hierarchy so tests never observe each other's
/// virtual registrations.
pub fn isolated_hierarchy() -> Arc<Hierarchy> {
	init_tracing();
	let hierarchy = Arc::new(Hierarchy::new());
	hierarchy
		.declare(TypeDecl::of::<String>().named("str").member("len"))
		.unwrap();
	hierarchy
		.declare(TypeDecl::of::<Vec<i64>>().named("list").member("len"))
		.unwrap();
	hierarchy
}

/// `length(instance) -> int`, defined against `hierarchy`.
pub fn length(hierarchy: &Arc<Hierarchy>) -> Typeclass<(), i64> {
	Typeclass::builder("length")
		.hierarchy(Arc::clone(hierarchy))
		.build()
		.unwrap()
}
