pub mod hubspot_oauth;
pub mod rate_limiter;
