//! HTTP microservice that turns texts into sentence embeddings with a
//! locally loaded pretrained model.

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod testing;
