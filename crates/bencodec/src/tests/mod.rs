mod fields;
mod property;
pub(crate) mod utils;
