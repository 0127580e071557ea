use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "leaf-gateway", about = "Leaf disease detection over HTTP")]
pub struct Config {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// ONNX export of the plant disease model.
    #[arg(long, default_value = "model.onnx")]
    pub model_path: PathBuf,

    /// One label per line, in model output order. Defaults to the built-in label set.
    #[arg(long)]
    pub labels_path: Option<PathBuf>,

    /// Limit for uploaded image bytes. The base64 JSON body limit is scaled up to match.
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long, default_value = "info", value_parser = ["debug", "info", "warn", "error"])]
    pub log_level: String,
}

impl Config {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level.as_str() {
            "debug" => log::LevelFilter::Debug,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["leaf-gateway"]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.model_path, PathBuf::from("model.onnx"));
        assert!(config.labels_path.is_none());
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn overrides() {
        let config = Config::parse_from([
            "leaf-gateway",
            "--port",
            "9000",
            "--labels-path",
            "labels.txt",
            "--log-level",
            "debug",
            "--workers",
            "2",
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.labels_path, Some(PathBuf::from("labels.txt")));
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(Config::try_parse_from(["leaf-gateway", "--log-level", "trace"]).is_err());
    }
}
