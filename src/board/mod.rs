//! Board model: character codec, the fixed grid, and the two renderers that
//! are allowed to mutate it.

pub mod charset;
pub mod grid;
pub mod render;
pub mod status;
