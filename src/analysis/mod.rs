pub mod client;
pub mod dto;
pub mod interpret;
mod lenient;
