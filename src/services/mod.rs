pub mod allocation_service;
pub mod amounts;
pub mod donation_service;
pub mod dream_service;
pub mod dream_transitions;
pub mod fallback_pool;
pub mod referral_counter;
pub mod referral_graph;

pub use allocation_service::*;
pub use donation_service::*;
pub use dream_service::*;
pub use fallback_pool::{Candidate, FallbackPool, PoolKind};
pub use referral_counter::*;
pub use referral_graph::*;
