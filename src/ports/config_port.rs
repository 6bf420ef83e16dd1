//! Configuration access port trait.

/// Typed access to `[section] key` values. Typed getters return `None` when
/// the key is absent or its value does not parse.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str) -> Option<f64>;
    fn get_uint(&self, section: &str, key: &str) -> Option<u64>;
}
