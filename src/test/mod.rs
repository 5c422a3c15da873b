pub mod utils;

mod admin;
mod api;
mod sessions;
mod store;
