pub mod discover;
pub mod run;
pub mod validate;
