//! # Scheduler test environment.

use super::*;

use alloc::collections::BTreeMap;
use frame_support::{parameter_types, traits::ConstU32};
use qp_scheduler::StorePreimage;
use sp_core::H256;
use sp_runtime::traits::{BlakeTwo256, Hash};

/// Origins the test dispatcher tells apart.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum OriginCaller {
	Root,
	Signed(u64),
}

pub fn root() -> OriginCaller {
	OriginCaller::Root
}

/// Calls understood by the [`logger::Logger`] dispatcher.
#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum LoggerCall {
	/// Log `i` with the caller origin.
	Log { i: u32, weight: Weight },
	/// Log `i` if the current block is within the threshold, fail otherwise.
	TimedLog { i: u32, weight: Weight },
}

impl LoggerCall {
	pub fn weight(&self) -> Weight {
		match self {
			LoggerCall::Log { weight, .. } | LoggerCall::TimedLog { weight, .. } => *weight,
		}
	}
}

pub mod logger {
	use super::*;
	use frame_support::dispatch::DispatchResultWithPostInfo;

	/// Dispatcher that records what it has been asked to do.
	pub struct Logger {
		log: Vec<(OriginCaller, u32)>,
		attempts: Vec<u64>,
		block: u64,
		threshold: (u64, u64),
	}

	impl Default for Logger {
		fn default() -> Self {
			Self { log: Vec::new(), attempts: Vec::new(), block: 0, threshold: (0, u64::MAX) }
		}
	}

	impl Logger {
		/// Successfully dispatched calls.
		pub fn log(&self) -> Vec<(OriginCaller, u32)> {
			self.log.clone()
		}

		/// Blocks at which a call was dispatched, successfully or not.
		pub fn attempts(&self) -> Vec<u64> {
			self.attempts.clone()
		}

		pub fn set_block(&mut self, block: u64) {
			self.block = block;
		}

		/// `TimedLog` succeeds in blocks `start..end` only.
		pub fn set_threshold(&mut self, start: u64, end: u64) {
			self.threshold = (start, end);
		}
	}

	impl CallDispatcher<OriginCaller> for Logger {
		fn call_weight(&self, call: &[u8]) -> Weight {
			LoggerCall::decode(&mut &call[..]).map(|c| c.weight()).unwrap_or_default()
		}

		fn dispatch(&mut self, origin: OriginCaller, call: &[u8]) -> DispatchResultWithPostInfo {
			let call = LoggerCall::decode(&mut &call[..])
				.map_err(|_| DispatchError::Other("undecodable call"))?;
			self.attempts.push(self.block);
			match call {
				LoggerCall::Log { i, .. } => {
					log::info!(target: "runtime::logger", "log: {:?} {}", origin, i);
					self.log.push((origin, i));
				},
				LoggerCall::TimedLog { i, .. } => {
					let (start, end) = self.threshold;
					if !(start..end).contains(&self.block) {
						return Err(DispatchError::Other("outside of threshold").into());
					}
					log::info!(target: "runtime::logger", "timed log: {:?} {}", origin, i);
					self.log.push((origin, i));
				},
			}
			Ok(().into())
		}
	}
}

/// In-memory preimage store with request counting.
#[derive(Default)]
pub struct Preimages {
	preimages: BTreeMap<H256, Vec<u8>>,
	requests: BTreeMap<H256, u32>,
}

impl Preimages {
	pub fn is_requested(&self, hash: &H256) -> bool {
		self.requests.contains_key(hash)
	}

	pub fn unnote(&mut self, hash: &H256) {
		self.preimages.remove(hash);
	}
}

impl QueryPreimage for Preimages {
	type H = H256;

	fn fetch(&self, hash: &H256, len: u32) -> Option<Vec<u8>> {
		self.preimages.get(hash).filter(|p| p.len() as u32 == len).cloned()
	}

	fn request(&mut self, hash: &H256) {
		*self.requests.entry(*hash).or_default() += 1;
	}

	fn unrequest(&mut self, hash: &H256) {
		if let Some(count) = self.requests.get_mut(hash) {
			*count -= 1;
			if *count == 0 {
				self.requests.remove(hash);
			}
		}
	}
}

impl StorePreimage for Preimages {
	fn note(&mut self, bytes: Vec<u8>) -> H256 {
		let hash = BlakeTwo256::hash(&bytes);
		self.preimages.insert(hash, bytes);
		hash
	}
}

parameter_types! {
	pub const MaximumSchedulerWeight: Weight = Weight::from_parts(2_000_000_000_000, 0);
}

pub struct Test;

impl Config for Test {
	type BlockNumber = u64;
	type Hash = H256;
	type Origin = OriginCaller;
	type Dispatcher = logger::Logger;
	type Preimages = Preimages;
	type MaximumWeight = MaximumSchedulerWeight;
	type MaxScheduledPerBlock = ConstU32<10>;
	type WeightInfo = ();
}

pub fn new_test_scheduler() -> Scheduler<Test> {
	let _ = env_logger::builder().is_test(true).try_init();
	Scheduler::new(logger::Logger::default(), Preimages::default())
}

/// Service every block after the last serviced one, up to and including `n`.
pub fn run_to_block(scheduler: &mut Scheduler<Test>, n: u64) {
	let mut block = scheduler.now();
	while block < n {
		block += 1;
		scheduler.dispatcher_mut().set_block(block);
		scheduler.service(block);
	}
}

/// Bound `call`, noting it as a preimage if it is too long to be inlined.
pub fn bound(scheduler: &mut Scheduler<Test>, call: LoggerCall) -> BoundedCall<H256> {
	scheduler.preimages_mut().bound(call.encode())
}

/// Reference `call` by hash without noting its preimage.
pub fn lookup_of(call: &LoggerCall) -> BoundedCall<H256> {
	let encoded = call.encode();
	BoundedCall::Lookup { hash: BlakeTwo256::hash(&encoded), len: encoded.len() as u32 }
}

/// A call using `percent` of the weight budget.
pub fn heavy_call(i: u32, percent: u64) -> LoggerCall {
	let weight = MaximumSchedulerWeight::get().ref_time() / 100 * percent;
	LoggerCall::Log { i, weight: Weight::from_parts(weight, 0) }
}

pub fn log_call(i: u32) -> LoggerCall {
	LoggerCall::Log { i, weight: Weight::from_parts(10, 0) }
}

pub fn timed_log_call(i: u32) -> LoggerCall {
	LoggerCall::TimedLog { i, weight: Weight::from_parts(10, 0) }
}
