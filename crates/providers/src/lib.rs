//! Language model backends for Oracle.
//!
//! All backends implement the `oracle_core::LanguageModel` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatModel;
