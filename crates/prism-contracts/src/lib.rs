pub mod codec;
pub mod detect;
pub mod envelope;
pub mod events;
pub mod intent;
pub mod models;
pub mod payload;
pub mod scoring;
