// Export pipeline: print job to .g3drem file.

pub mod error;
pub mod job;
pub mod settings_block;
pub mod thumbnail;
pub mod writer;
