//! C3 linearization.
//!
//! # Invariants
//!
//! * The linearization of a type starts with the type itself.
//! * Every type precedes its bases, and bases keep their declared order
//!   (local precedence order).
//! * A type appears at most once.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::TypeKey;


/// C3 merge failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MroConflict {
	/// Type whose linearization could not be built.
	pub at: TypeKey,
	/// Heads left over when no candidate was admissible.
	pub remaining: Vec<TypeKey>,
}

/// Computes the C3 linearization of `root`.
///
/// `bases_of` returns the ordered direct bases of a type. Cycles are reported
/// as conflicts rather than recursing forever.
pub fn linearize<F, B>(root: TypeKey, bases_of: F) -> Result<Vec<TypeKey>, MroConflict>
where
	F: Fn(TypeKey) -> B,
	B: AsRef<[TypeKey]>,
{
	let mut memo = FxHashMap::default();
	let mut visiting = FxHashSet::default();
	linearize_inner(root, &bases_of, &mut memo, &mut visiting)
}

fn linearize_inner<F, B>(
	key: TypeKey,
	bases_of: &F,
	memo: &mut FxHashMap<TypeKey, Vec<TypeKey>>,
	visiting: &mut FxHashSet<TypeKey>,
) -> Result<Vec<TypeKey>, MroConflict>
where
	F: Fn(TypeKey) -> B,
	B: AsRef<[TypeKey]>,
{
	if let Some(done) = memo.get(&key) {
		return Ok(done.clone());
	}
	if !visiting.insert(key) {
		return Err(MroConflict {
			at: key,
			remaining: vec![key],
		});
	}

	let bases = bases_of(key);
	let bases = bases.as_ref();
	let mut sequences = Vec::with_capacity(bases.len() + 1);
	for &base in bases {
		sequences.push(linearize_inner(base, bases_of, memo, visiting)?);
	}
	sequences.push(bases.to_vec());

	let mut result = vec![key];
	merge(key, sequences, &mut result)?;

	visiting.remove(&key);
	memo.insert(key, result.clone());
	Ok(result)
}

fn merge(
	at: TypeKey,
	sequences: Vec<Vec<TypeKey>>,
	out: &mut Vec<TypeKey>,
) -> Result<(), MroConflict> {
	// Each sequence is consumed from the front; `cursors[i]` is its current head.
	let mut cursors = vec![0usize; sequences.len()];
	loop {
		let live: Vec<usize> = (0..sequences.len())
			.filter(|&i| cursors[i] < sequences[i].len())
			.collect();
		if live.is_empty() {
			return Ok(());
		}

		let candidate = live.iter().map(|&i| sequences[i][cursors[i]]).find(|head| {
			live
				.iter()
				.all(|&j| !sequences[j][cursors[j] + 1..].contains(head))
		});

		let Some(head) = candidate else {
			let remaining = live.iter().map(|&i| sequences[i][cursors[i]]).collect();
			return Err(MroConflict { at, remaining });
		};

		out.push(head);
		for i in live {
			if sequences[i][cursors[i]] == head {
				cursors[i] += 1;
			}
		}
	}
}
