pub mod backend;
pub mod failover;
pub mod parsing;
pub mod prompts;
