//! Per-block execution of due agendas.

use super::*;
use sp_runtime::traits::{CheckedAdd, One};
use sp_weights::WeightMeter;

enum ServiceTaskError<Task> {
	/// Could not be executed due to missing preimage.
	Unavailable,
	/// Could not be executed due to weight limitations. The task is handed back.
	Overweight(Task),
}
use ServiceTaskError::*;

impl<T: Config> Scheduler<T> {
	/// Execute everything that is due at `now`, along with whatever earlier blocks left behind.
	///
	/// Must be called once for every block, with increasing block numbers. Returns the weight
	/// that was used.
	pub fn service(&mut self, now: T::BlockNumber) -> Weight {
		if now < self.now {
			log::warn!(
				target: LOG_TARGET,
				"ignoring block {:?}, already serviced up to {:?}",
				now,
				self.now
			);
			return Weight::zero();
		}
		self.now = now;

		let mut weight_counter = WeightMeter::with_limit(T::MaximumWeight::get());
		self.service_agendas(&mut weight_counter, now);
		weight_counter.consumed()
	}

	/// Service the agendas queue starting from earliest incompletely executed agenda.
	fn service_agendas(&mut self, weight: &mut WeightMeter, now: T::BlockNumber) {
		if weight.try_consume(T::WeightInfo::service_agendas_base()).is_err() {
			self.incomplete_since = Some(self.incomplete_since.map_or(now, |since| since.min(now)));
			return;
		}

		let mut next = Some(self.incomplete_since.take().unwrap_or(now));
		let mut executed = 0;

		let service_agenda_base_weight =
			T::WeightInfo::service_agenda_base(T::MaxScheduledPerBlock::get());
		while let Some(when) = next.filter(|when| *when <= now) {
			if !weight.can_consume(service_agenda_base_weight) ||
				!self.service_agenda(weight, &mut executed, now, when)
			{
				self.incomplete_since = Some(when);
				break;
			}
			next = when.checked_add(&One::one());
		}
	}

	/// Returns `true` if the agenda was fully completed, `false` if it should be revisited at a
	/// later block.
	///
	/// Slots are visited in index order. The first task that does not fit into the remaining
	/// weight stops the scan and everything from it onwards stays in place.
	fn service_agenda(
		&mut self,
		weight: &mut WeightMeter,
		executed: &mut u32,
		now: T::BlockNumber,
		when: T::BlockNumber,
	) -> bool {
		let len = self.agendas.get(when).len() as u32;
		let within_limit = weight.try_consume(T::WeightInfo::service_agenda_base(len)).is_ok();
		debug_assert!(within_limit, "weight limit should have been checked in advance");
		log::trace!(target: LOG_TARGET, "servicing agenda {:?} with {} slots", when, len);

		for agenda_index in 0..len {
			let task = match self.agendas.take(when, agenda_index) {
				None => continue,
				Some(t) => t,
			};
			match self.service_task(weight, now, when, agenda_index, *executed == 0, task) {
				Ok(()) => *executed += 1,
				Err(Unavailable) => {},
				Err(Overweight(task)) => {
					self.agendas.set(when, agenda_index, Some(task));
					self.agendas.trim_trailing_none(when);
					return false;
				},
			}
		}
		self.agendas.trim_trailing_none(when);

		true
	}

	/// Service (i.e. execute) the given task, being careful not to overflow the `weight` counter.
	///
	/// This involves:
	/// - realizing the task's call which can include a preimage lookup.
	/// - removing the `Lookup` entry for the task.
	/// - rescheduling the task for execution in a later agenda if periodic, or for a retry if it
	///   failed.
	fn service_task(
		&mut self,
		weight: &mut WeightMeter,
		now: T::BlockNumber,
		when: T::BlockNumber,
		agenda_index: u32,
		is_first: bool,
		task: ScheduledOf<T>,
	) -> Result<(), ServiceTaskError<ScheduledOf<T>>> {
		let address = (when, agenda_index);
		let (call, lookup_len) = match self.preimages.peek(&task.call) {
			Ok(c) => c,
			Err(_) => {
				log::warn!(
					target: LOG_TARGET,
					"call of task ({:?}, {}) is unavailable, dropping it",
					when,
					agenda_index
				);
				if let Some(ref id) = task.maybe_id {
					self.lookup.remove(id);
				}
				self.retries.clear(&address);
				// It was not available when we needed it, so we don't need to have requested it
				// anymore.
				self.release(&task.call);
				self.deposit_event(Event::CallUnavailable { task: address, id: task.maybe_id });
				return Err(Unavailable);
			},
		};

		let task_weight = T::WeightInfo::service_task(
			lookup_len.map(|x| x as usize),
			task.maybe_id.is_some(),
			task.maybe_periodic.is_some(),
		);
		let call_weight = self.dispatcher.call_weight(&call);
		// A task with a retry policy must also leave room to place its retry.
		let retry_weight = if self.retries.get(&address).is_some() {
			T::WeightInfo::schedule_retry(T::MaxScheduledPerBlock::get())
		} else {
			Weight::zero()
		};
		// We only allow a scheduled call if it cannot push the weight past the limit.
		let max_weight = task_weight
			.saturating_add(T::WeightInfo::execute_dispatch())
			.saturating_add(call_weight)
			.saturating_add(retry_weight);
		if !weight.can_consume(max_weight) {
			if is_first {
				log::warn!(
					target: LOG_TARGET,
					"task ({:?}, {}) needs {:?} and can never be executed",
					when,
					agenda_index,
					max_weight
				);
				self.deposit_event(Event::PermanentlyOverweight {
					task: address,
					id: task.maybe_id,
				});
			}
			return Err(Overweight(task));
		}

		let _ = weight.try_consume(task_weight);
		if let Some(ref id) = task.maybe_id {
			self.lookup.remove(id);
		}

		let result = self.execute_dispatch(weight, task.origin.clone(), &call, call_weight);
		let failed = result.is_err();
		let maybe_retry_config = self.retries.clear(&address);
		self.deposit_event(Event::Dispatched { task: address, id: task.maybe_id, result });

		match maybe_retry_config {
			Some(retry_config) if failed => {
				self.schedule_retry(weight, now, address, task, retry_config);
			},
			_ if failed => self.release(&task.call),
			_ => self.renew_periodic(now, address, task),
		}
		Ok(())
	}

	/// Make a dispatch to the given `call` from the given `origin`, counting the weight it
	/// actually used. The post info may lower the weight below `call_weight`, never raise it.
	fn execute_dispatch(
		&mut self,
		weight: &mut WeightMeter,
		origin: T::Origin,
		call: &[u8],
		call_weight: Weight,
	) -> DispatchResult {
		let (maybe_actual_call_weight, result) = match self.dispatcher.dispatch(origin, call) {
			Ok(post_info) => (post_info.actual_weight, Ok(())),
			Err(error_and_info) =>
				(error_and_info.post_info.actual_weight, Err(error_and_info.error)),
		};
		let call_weight = maybe_actual_call_weight.map_or(call_weight, |w| w.min(call_weight));
		let _ = weight.try_consume(T::WeightInfo::execute_dispatch());
		let _ = weight.try_consume(call_weight);
		result
	}

	/// Put a successfully dispatched periodic task back into the agenda `period` blocks from now.
	fn renew_periodic(
		&mut self,
		now: T::BlockNumber,
		address: TaskAddressOf<T>,
		mut task: ScheduledOf<T>,
	) {
		let Some((period, count)) = task.maybe_periodic else {
			self.release(&task.call);
			return;
		};
		task.maybe_periodic = if count > 1 { Some((period, count - 1)) } else { None };

		let placed = match now.checked_add(&period) {
			Some(wake) => self.place_task(wake, task),
			None => Err((Error::TargetBlockElapsed, task)),
		};
		if let Err((error, task)) = placed {
			log::warn!(
				target: LOG_TARGET,
				"periodic task ({:?}, {}) could not be renewed: {:?}",
				address.0,
				address.1,
				error
			);
			self.release(&task.call);
			self.deposit_event(Event::PeriodicFailed { task: address, id: task.maybe_id });
		}
	}

	/// Reschedule a failed task according to its retry configuration.
	///
	/// Possible causes for failure to schedule a retry for a task:
	/// - there were no more retry attempts left
	/// - there wasn't enough weight to run the task reschedule logic
	/// - the retry would land in the current block
	/// - the agenda was full.
	fn schedule_retry(
		&mut self,
		weight: &mut WeightMeter,
		now: T::BlockNumber,
		address: TaskAddressOf<T>,
		task: ScheduledOf<T>,
		retry_config: RetryConfigOf<T>,
	) {
		let Some(next_config) = retry_config.next() else {
			// out of retries, the failure is final
			self.release(&task.call);
			return;
		};

		if weight
			.try_consume(T::WeightInfo::schedule_retry(T::MaxScheduledPerBlock::get()))
			.is_err()
		{
			self.retry_failed(address, task, "not enough weight");
			return;
		}

		let placed = match now.checked_add(&retry_config.period()).filter(|wake| *wake > now) {
			Some(wake) => self.place_task(wake, task.as_retry()),
			None => Err((Error::TargetBlockElapsed, task.as_retry())),
		};
		match placed {
			Ok(new_address) => {
				// Reinsert the retry config to the new address of the task after it was placed.
				self.retries.insert(new_address, next_config);
			},
			Err((error, _)) => self.retry_failed(address, task, error.as_str()),
		}
	}

	fn retry_failed(&mut self, address: TaskAddressOf<T>, task: ScheduledOf<T>, reason: &str) {
		log::warn!(
			target: LOG_TARGET,
			"task ({:?}, {}) could not be retried: {}",
			address.0,
			address.1,
			reason
		);
		self.release(&task.call);
		self.deposit_event(Event::RetryFailed { task: address, id: task.maybe_id });
	}
}
