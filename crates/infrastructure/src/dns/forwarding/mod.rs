pub mod message_builder;

pub use message_builder::MessageBuilder;
