pub mod cookies;
pub mod prober;
pub mod ytdlp;

pub use prober::Prober;
pub use ytdlp::YtDlpAdapter;
