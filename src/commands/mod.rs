pub mod run;
pub mod targets;
pub mod validate;

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;
