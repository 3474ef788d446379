use common::{Environment, LogLevel};
use inference::{DevicePreference, LoaderConfig};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: i64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub bind_addr: String,
    /// Parent of the per-request working directories.
    pub upload_dir: PathBuf,
    pub models_dir: PathBuf,
    pub default_model: String,
    pub default_min_conf: f64,
    pub default_imgsz: u32,
    pub max_upload_bytes: usize,
    pub device: DevicePreference,
    pub intra_threads: usize,
    pub label_font_path: Option<PathBuf>,
    /// Ask the detector to also write its annotated image to disk.
    pub save_artifacts: bool,
    pub otel_endpoint: Option<String>,
}

impl Config {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            models_dir: self.models_dir.clone(),
            device: self.device,
            intra_threads: self.intra_threads,
            label_font_path: self.label_font_path.clone(),
            ..LoaderConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            environment: Environment::Development,
            bind_addr: "0.0.0.0:8080".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            models_dir: PathBuf::from("./models"),
            default_model: "lostfound.onnx".to_string(),
            default_min_conf: 0.6,
            default_imgsz: 640,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES as usize,
            device: DevicePreference::Auto,
            intra_threads: 4,
            label_font_path: None,
            save_artifacts: false,
            otel_endpoint: None,
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("bind_addr", "0.0.0.0:8080")?
        .set_default("upload_dir", "./uploads")?
        .set_default("models_dir", "./models")?
        .set_default("default_model", "lostfound.onnx")?
        .set_default("default_min_conf", 0.6)?
        .set_default("default_imgsz", 640)?
        .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?
        .set_default("device", "auto")?
        .set_default("intra_threads", 4)?
        .set_default("save_artifacts", false)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 5] = [
        "GATEWAY_BIND_ADDR",
        "GATEWAY_DEFAULT_MIN_CONF",
        "GATEWAY_ENVIRONMENT",
        "GATEWAY_DEVICE",
        "GATEWAY_LABEL_FONT_PATH",
    ];

    fn clear_vars() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_environment() {
        clear_vars();
        let config = get_configuration().unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.default_model, "lostfound.onnx");
        assert!((config.default_min_conf - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.default_imgsz, 640);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.device, DevicePreference::Auto);
        assert!(config.label_font_path.is_none());
        assert!(config.otel_endpoint.is_none());
        assert!(!config.save_artifacts);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_vars();
        unsafe {
            env::set_var("GATEWAY_BIND_ADDR", "127.0.0.1:9000");
            env::set_var("GATEWAY_DEFAULT_MIN_CONF", "0.3");
            env::set_var("GATEWAY_DEVICE", "cpu");
            env::set_var("GATEWAY_LABEL_FONT_PATH", "/fonts/DejaVuSans.ttf");
        }

        let config = get_configuration().unwrap();
        clear_vars();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert!((config.default_min_conf - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(
            config.label_font_path,
            Some(PathBuf::from("/fonts/DejaVuSans.ttf"))
        );
    }

    #[test]
    #[serial]
    fn test_short_environment_alias_is_accepted() {
        clear_vars();
        unsafe { env::set_var("GATEWAY_ENVIRONMENT", "prod") };

        let config = get_configuration();
        clear_vars();

        assert_eq!(config.unwrap().environment, Environment::Production);
    }

    #[test]
    #[serial]
    fn test_unknown_environment_is_rejected() {
        clear_vars();
        unsafe { env::set_var("GATEWAY_ENVIRONMENT", "staging") };

        let config = get_configuration();
        clear_vars();

        assert!(config.is_err());
    }

    #[test]
    fn test_loader_config_carries_model_settings() {
        let config = Config {
            models_dir: PathBuf::from("/srv/models"),
            device: DevicePreference::Cpu,
            intra_threads: 2,
            ..Config::default()
        };

        let loader = config.loader_config();
        assert_eq!(loader.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(loader.device, DevicePreference::Cpu);
        assert_eq!(loader.intra_threads, 2);
    }
}
