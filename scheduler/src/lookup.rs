//! Name to address lookup for named tasks.

use crate::Error;
use alloc::collections::BTreeMap;
use qp_scheduler::{TaskAddress, TaskName};

/// Lookup from a name to the block number and index of the task.
pub struct LookupTable<BlockNumber> {
	entries: BTreeMap<TaskName, TaskAddress<BlockNumber>>,
}

impl<BlockNumber> Default for LookupTable<BlockNumber> {
	fn default() -> Self {
		Self { entries: BTreeMap::new() }
	}
}

impl<BlockNumber: Copy> LookupTable<BlockNumber> {
	/// Map `name` to `address`. A name can only be mapped once.
	pub fn insert(&mut self, name: TaskName, address: TaskAddress<BlockNumber>) -> Result<(), Error> {
		if self.entries.contains_key(&name) {
			return Err(Error::DuplicateId);
		}
		self.entries.insert(name, address);
		Ok(())
	}

	pub fn remove(&mut self, name: &TaskName) -> Option<TaskAddress<BlockNumber>> {
		self.entries.remove(name)
	}

	pub fn resolve(&self, name: &TaskName) -> Option<TaskAddress<BlockNumber>> {
		self.entries.get(name).copied()
	}

	pub fn contains(&self, name: &TaskName) -> bool {
		self.entries.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
