use std::any::Any;

use pretty_assertions::assert_eq;
use tyclass::{DispatchError, MatchKind, Protocol, TypeKey};

use crate::common::{isolated_hierarchy, length};

fn sized() -> Protocol {
	Protocol::requiring("Sized", ["len"])
}

#[test]
fn list_exact_string_protocol_int_unmatched() {
	let hierarchy = isolated_hierarchy();
	let length = length(&hierarchy);
	length
		.instance_of::<Vec<i64>>()
		.unwrap()
		.register(|_: &dyn Any, ()| 1);
	length
		.instance_protocol(sized())
		.unwrap()
		.register(|_: &dyn Any, ()| 0);

	assert_eq!(length.call(&vec![1i64, 2, 3], ()), Ok(1));
	assert_eq!(length.call(&"ab".to_string(), ()), Ok(0));

	let err = length.call(&42i32, ()).unwrap_err();
	assert!(matches!(err, DispatchError::UnmatchedType { .. }));
	assert_eq!(err.to_string(), "Missing matched typeclass instance for type: i32");
}

#[test]
fn erased_int_is_named_once_seen_through_a_typed_call() {
	let hierarchy = isolated_hierarchy();
	let length = length(&hierarchy);
	length
		.instance_of::<Vec<i64>>()
		.unwrap()
		.register(|_: &dyn Any, ()| 1);

	let value: Box<dyn Any> = Box::new(42i32);
	let err = length.call_dyn(value.as_ref(), ()).unwrap_err();
	assert_eq!(err.to_string(), "Missing matched typeclass instance for type: <erased>");

	let typed = length.call(&42i32, ()).unwrap_err();
	let erased = length.call_dyn(value.as_ref(), ()).unwrap_err();
	assert_eq!(erased, typed);
	assert_eq!(erased.to_string(), "Missing matched typeclass instance for type: i32");

	let err = length.call_dyn(&"ab".to_string(), ()).unwrap_err();
	assert_eq!(err.to_string(), "Missing matched typeclass instance for type: str");
}

#[test]
fn resolution_kinds_match_the_scenario() {
	let hierarchy = isolated_hierarchy();
	let length = length(&hierarchy);
	length
		.instance_of::<Vec<i64>>()
		.unwrap()
		.register(|_: &dyn Any, ()| 1);
	length
		.instance_protocol(sized())
		.unwrap()
		.register(|_: &dyn Any, ()| 0);

	assert_eq!(length.resolve(&vec![0i64]), MatchKind::Exact(TypeKey::of::<Vec<i64>>()));
	assert_eq!(length.resolve(&String::new()), MatchKind::Protocol("Sized".into()));
	assert_eq!(length.resolve(&0i32), MatchKind::Unmatched);
	assert!(length.supports(&vec![0i64]));
	assert!(length.supports(&String::new()));
	assert!(!length.supports(&0i32));
}

#[test]
fn implementations_can_read_the_value() {
	let hierarchy = isolated_hierarchy();
	let length = length(&hierarchy);
	length
		.instance_of::<Vec<i64>>()
		.unwrap()
		.register(|value: &dyn Any, ()| {
			value
				.downcast_ref::<Vec<i64>>()
				.map_or(-1, |v| v.len() as i64)
		});
	length
		.instance_of::<String>()
		.unwrap()
		.register(|value: &dyn Any, ()| {
			value
				.downcast_ref::<String>()
				.map_or(-1, |s| s.chars().count() as i64)
		});

	assert_eq!(length.call(&vec![1i64, 2, 3], ()), Ok(3));
	assert_eq!(length.call(&"héllo".to_string(), ()), Ok(5));
}
