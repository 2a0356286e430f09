pub mod cache;
pub mod calculator;
pub mod jobs;
pub mod mapper;
pub mod metrics;
pub mod profiles;

pub use cache::{MemoryStore, RedisStore, TtlStore};
pub use jobs::{JobResultView, JobService, JobStatusView};
pub use metrics::{get_metrics, init_metrics};
pub use profiles::{CachedProfiles, ProfileSource, StaticProfileSource};
