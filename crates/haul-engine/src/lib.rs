pub mod args;
pub mod ytdlp;

pub use args::build_args;
pub use ytdlp::YtDlpEngine;
