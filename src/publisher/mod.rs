mod redis_message;
mod redis_publisher;

pub use self::redis_message::RedisMessage;
pub use self::redis_publisher::RedisConnection;
