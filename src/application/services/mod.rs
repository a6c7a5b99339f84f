mod embed;

pub use embed::EmbedService;
