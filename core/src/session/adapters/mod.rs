mod in_memory;
#[cfg(feature = "redis-store")]
mod redis_store;

pub use in_memory::InMemorySessionStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisSessionStore;
