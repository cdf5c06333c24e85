use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tyclass::{DispatchError, TypeDecl, Typeclass};

use crate::common::isolated_hierarchy;

trait Shape {}
struct Circle;
struct Square<const I: usize>;

#[test]
fn callers_observe_virtual_registration() {
	let hierarchy = isolated_hierarchy();
	hierarchy
		.declare(TypeDecl::of::<dyn Shape>().abstract_type())
		.unwrap();
	let area = Arc::new(
		Typeclass::<(), &'static str>::builder("area")
			.hierarchy(Arc::clone(&hierarchy))
			.build()
			.unwrap(),
	);
	area.instance_of::<dyn Shape>()
		.unwrap()
		.register(|_: &dyn Any, ()| "shape");

	let registered = AtomicBool::new(false);
	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				for _ in 0..256 {
					// Read the flag first: once it is set, the relationship is
					// published and no caller may see a stale miss.
					let after = registered.load(Ordering::Acquire);
					let result = area.call(&Circle, ());
					if after {
						assert_eq!(result, Ok("shape"));
					}
				}
			});
		}
		s.spawn(|| {
			hierarchy.register_virtual_of::<Circle, dyn Shape>().unwrap();
			registered.store(true, Ordering::Release);
		});
	});

	assert_eq!(area.call(&Circle, ()), Ok("shape"));
}

#[test]
fn registrations_race_with_calls() {
	let hierarchy = isolated_hierarchy();
	let tc = Typeclass::<(), usize>::builder("index")
		.hierarchy(hierarchy)
		.build()
		.unwrap();

	std::thread::scope(|s| {
		s.spawn(|| tc.instance_of::<Square<0>>().unwrap().register(|_: &dyn Any, ()| 0));
		s.spawn(|| tc.instance_of::<Square<1>>().unwrap().register(|_: &dyn Any, ()| 1));
		s.spawn(|| tc.instance_of::<Square<2>>().unwrap().register(|_: &dyn Any, ()| 2));
		for _ in 0..3 {
			s.spawn(|| {
				for _ in 0..128 {
					match tc.call(&Square::<1>, ()) {
						Ok(n) => assert_eq!(n, 1),
						Err(DispatchError::UnmatchedType { .. }) => {}
					}
				}
			});
		}
	});

	assert_eq!(tc.registrations().len(), 3);
	assert_eq!(tc.call(&Square::<0>, ()), Ok(0));
	assert_eq!(tc.call(&Square::<1>, ()), Ok(1));
	assert_eq!(tc.call(&Square::<2>, ()), Ok(2));
}

#[test]
fn registration_after_cached_miss_is_visible() {
	let hierarchy = isolated_hierarchy();
	let tc = Typeclass::<(), usize>::builder("index")
		.hierarchy(hierarchy)
		.build()
		.unwrap();

	assert!(!tc.supports(&Square::<5>));
	let registered = AtomicBool::new(false);
	std::thread::scope(|s| {
		s.spawn(|| {
			tc.instance_of::<Square<5>>()
				.unwrap()
				.register(|_: &dyn Any, ()| 5);
			registered.store(true, Ordering::Release);
		});
		s.spawn(|| {
			for _ in 0..256 {
				let after = registered.load(Ordering::Acquire);
				let supported = tc.supports(&Square::<5>);
				if after {
					assert!(supported);
				}
			}
		});
	});
	assert_eq!(tc.call(&Square::<5>, ()), Ok(5));
}
