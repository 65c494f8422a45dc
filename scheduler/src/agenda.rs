//! Per-block agendas of task slots.
//!
//! Slots are addressed by `(block, index)` and never renumbered: removing a task leaves a `None`
//! tombstone behind so that lookup and retry entries pointing at later slots stay valid. Only
//! trailing tombstones are dropped.

use alloc::collections::BTreeMap;
use frame_support::{traits::Get, BoundedVec};

/// Mapping from block number to the ordered slots due at that block.
pub struct AgendaStore<BlockNumber, Task, S: Get<u32>> {
	agendas: BTreeMap<BlockNumber, BoundedVec<Option<Task>, S>>,
}

impl<BlockNumber, Task, S: Get<u32>> Default for AgendaStore<BlockNumber, Task, S> {
	fn default() -> Self {
		Self { agendas: BTreeMap::new() }
	}
}

impl<BlockNumber: Ord + Copy, Task, S: Get<u32>> AgendaStore<BlockNumber, Task, S> {
	/// The slots of the agenda at `when`, empty if there is none.
	pub fn get(&self, when: BlockNumber) -> &[Option<Task>] {
		self.agendas.get(&when).map(|agenda| agenda.as_slice()).unwrap_or(&[])
	}

	/// The task at `(when, index)`, if the slot exists and is not a tombstone.
	pub fn slot(&self, when: BlockNumber, index: u32) -> Option<&Task> {
		self.get(when).get(index as usize).and_then(Option::as_ref)
	}

	/// All non-empty agendas in block order.
	pub fn iter(&self) -> impl Iterator<Item = (BlockNumber, &[Option<Task>])> {
		self.agendas.iter().map(|(when, agenda)| (*when, agenda.as_slice()))
	}

	/// Add `task` to the agenda at `when` and return its index.
	///
	/// The task goes to the end of the agenda while there is room, otherwise into the first
	/// tombstone. A full agenda without holes hands the task back.
	pub fn append(&mut self, when: BlockNumber, task: Task) -> Result<u32, Task> {
		let agenda = self.agendas.entry(when).or_default();
		if (agenda.len() as u32) < S::get() {
			// will always succeed due to the above check.
			let _ = agenda.try_push(Some(task));
			return Ok(agenda.len() as u32 - 1);
		}
		let maybe_hole = agenda.iter().position(Option::is_none);
		let is_empty = agenda.is_empty();
		match maybe_hole {
			Some(hole_index) => {
				agenda[hole_index] = Some(task);
				Ok(hole_index as u32)
			},
			None => {
				// a zero capacity leaves an empty record behind
				if is_empty {
					self.agendas.remove(&when);
				}
				Err(task)
			},
		}
	}

	/// Overwrite the slot at `(when, index)`. Returns `false` if the slot does not exist.
	pub fn set(&mut self, when: BlockNumber, index: u32, slot: Option<Task>) -> bool {
		match self.agendas.get_mut(&when).and_then(|agenda| agenda.get_mut(index as usize)) {
			Some(s) => {
				*s = slot;
				true
			},
			None => false,
		}
	}

	/// Take the task out of `(when, index)`, leaving a tombstone.
	///
	/// The agenda is not trimmed; callers do that once they are done with it.
	pub fn take(&mut self, when: BlockNumber, index: u32) -> Option<Task> {
		self.agendas.get_mut(&when)?.get_mut(index as usize)?.take()
	}

	/// Remove trailing `None` items of the agenda at `when`. If all items are `None` remove the
	/// agenda record entirely.
	pub fn trim_trailing_none(&mut self, when: BlockNumber) {
		let Some(agenda) = self.agendas.get_mut(&when) else { return };
		match agenda.iter().rposition(Option::is_some) {
			Some(i) => agenda.truncate(i + 1),
			None => {
				self.agendas.remove(&when);
			},
		}
	}
}
