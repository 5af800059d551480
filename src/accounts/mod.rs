pub mod client;

pub use client::HttpAccountClient;
