pub mod http;
pub mod keyed_lock;
pub mod patterns;
pub mod rate_limiter;

pub use http::{HttpClient, HttpResponse, Transport};
pub use keyed_lock::KeyedLock;
pub use patterns::PatternUtils;
pub use rate_limiter::RateLimiter;
