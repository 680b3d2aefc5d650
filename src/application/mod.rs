pub mod codec;
pub mod ports;
pub mod preprocess;
pub mod registry;
pub mod sampling;
pub mod services;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
