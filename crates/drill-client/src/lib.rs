pub mod authority;
pub mod autoplay;
pub mod clock;
pub mod config;
pub mod controller;
pub mod countdown;
pub mod events;
pub mod resolver;
pub mod session_state;
pub mod summary;

#[cfg(feature = "http")]
pub mod http_authority;

#[cfg(test)]
pub(crate) mod testing;
