pub mod extensions;
pub mod inference;
pub mod model_manager;

#[cfg(test)]
pub(crate) mod testing;
