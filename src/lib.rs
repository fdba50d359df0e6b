pub mod config;
pub mod detect;
pub mod market;
pub mod models;
pub mod news;
pub mod notify;
#[cfg(test)]
pub mod test_helpers;
pub mod tracking;
