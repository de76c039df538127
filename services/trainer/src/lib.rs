pub mod config;
pub mod convai_adapter;
pub mod microphone;
pub mod render;
