pub mod client;
pub mod dispatch;
pub mod encoding;
pub mod envelope;

#[cfg(test)]
pub mod mock;
