use std::any::Any;
use std::sync::Arc;

use proptest::prelude::*;
use tyclass::{Hierarchy, InstanceArgs, MatchKind, Protocol, TypeDecl, TypeKey, Typeclass};

use crate::common::init_tracing;

trait Root {}
struct Node<const I: usize>;

/// Index 0 is the abstract root; 1 to 5 are concrete nodes.
fn keys() -> [TypeKey; 6] {
	[
		TypeKey::of::<dyn Root>(),
		TypeKey::of::<Node<1>>(),
		TypeKey::of::<Node<2>>(),
		TypeKey::of::<Node<3>>(),
		TypeKey::of::<Node<4>>(),
		TypeKey::of::<Node<5>>(),
	]
}

fn values() -> [&'static dyn Any; 5] {
	[&Node::<1>, &Node::<2>, &Node::<3>, &Node::<4>, &Node::<5>]
}

fn member(i: usize) -> String {
	format!("m{}", i % 3)
}

/// Node 1 and 2 extend the root, node 3 extends node 1. Nodes 4 and 5 are
/// undeclared and only reach the root through virtual registration.
fn hierarchy() -> Arc<Hierarchy> {
	let k = keys();
	let h = Arc::new(Hierarchy::new());
	h.declare(TypeDecl::for_key(k[0]).abstract_type()).unwrap();
	h.declare(TypeDecl::for_key(k[1]).extends_key(k[0]).member(member(1)))
		.unwrap();
	h.declare(TypeDecl::for_key(k[2]).extends_key(k[0]).member(member(2)))
		.unwrap();
	h.declare(TypeDecl::for_key(k[3]).extends_key(k[1]).member(member(3)))
		.unwrap();
	h
}

fn ancestors(node: usize, virtual_nodes: &[usize]) -> Vec<usize> {
	match node {
		1 | 2 => vec![0],
		3 => vec![1, 0],
		n if virtual_nodes.contains(&n) => vec![0],
		_ => vec![],
	}
}

fn expected_match(node: usize, exact: &[bool], protocols: &[usize], virtual_nodes: &[usize]) -> bool {
	let has_member = |k: usize| (1..=3).contains(&node) && node % 3 == k;
	exact[node]
		|| protocols.iter().any(|&k| has_member(k))
		|| ancestors(node, virtual_nodes).into_iter().any(|a| exact[a])
}

proptest! {
	/// `supports` agrees with `call` and with an independent model of the
	/// resolution order, before and after virtual registration.
	#[test]
	fn prop_supports_agrees_with_call(
		exact in proptest::collection::vec(any::<bool>(), 6),
		protocols in proptest::collection::vec(0usize..3, 0..3),
		virtual_nodes in proptest::collection::vec(4usize..6, 0..2),
	) {
		init_tracing();
		let k = keys();
		let h = hierarchy();
		let tc = Typeclass::<(), usize>::builder("probe")
			.hierarchy(Arc::clone(&h))
			.build()
			.unwrap();

		for (i, _) in exact.iter().enumerate().filter(|(_, e)| **e) {
			tc.instance(InstanceArgs::new().exact(k[i]))
				.unwrap()
				.register(move |_: &dyn Any, ()| i);
		}
		for &m in &protocols {
			tc.instance_protocol(Protocol::requiring(format!("has m{m}"), [format!("m{m}")]))
				.unwrap()
				.register(|_: &dyn Any, ()| 100);
		}

		// Warm the cache before the hierarchy changes.
		for value in values() {
			let _ = tc.supports_dyn(value);
		}
		for &n in &virtual_nodes {
			h.register_virtual(k[n], k[0]).unwrap();
		}

		for (index, value) in values().into_iter().enumerate() {
			let node = index + 1;
			let supported = tc.supports_dyn(value);
			let called = tc.call_dyn(value, ());
			prop_assert_eq!(supported, called.is_ok());
			prop_assert_eq!(supported, expected_match(node, &exact, &protocols, &virtual_nodes));

			if exact[node] {
				prop_assert_eq!(called, Ok(node));
				prop_assert_eq!(tc.resolve_dyn(value), MatchKind::Exact(k[node]));
			}
		}
	}
}
