//! Command implementations for the OxiZip CLI.

pub mod append;
pub mod create;
pub mod extract;
pub mod info;
pub mod list;
pub mod zlib;

pub use append::cmd_append;
pub use create::cmd_create;
pub use extract::cmd_extract;
pub use info::cmd_info;
pub use list::cmd_list;
pub use test::cmd_test;
pub use zlib::{cmd_zlib_compress, cmd_zlib_decompress};
