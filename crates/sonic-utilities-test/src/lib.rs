//! Test support for the SONiC chassis utilities.
//!
//! - [`fixtures`]: CHASSIS_MODULE records, fabric ASIC bindings and
//!   scenarios built from them
//! - [`FixedClock`], [`RecordingServiceControl`]: collaborators for the
//!   transition guard and the fabric reconciler
//! - [`StoreVerifier`], [`CommandVerifier`]: assertions over database
//!   contents and issued service commands
//! - [`RedisTestEnv`]: a containerised Redis for `#[ignore]`d tests

mod fakes;
pub mod fixtures;
mod redis_env;
mod verification;

pub use fakes::{unix_time, FixedClock, RecordingServiceControl};
pub use redis_env::RedisTestEnv;
pub use verification::{CommandVerifier, StoreVerifier, VerificationError, VerifyResult};
