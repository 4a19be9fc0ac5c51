use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::{Map, Value};

#[derive(Parser, Debug)]
#[command(
    name = "plotglass",
    author,
    version,
    about = "Headless streaming line plots"
)]
pub struct Cli {
    /// Glass configuration describing sources and plots (TOML).
    #[arg(long, short, value_name = "FILE", env = "PLOTGLASS_CONFIG")]
    pub config: PathBuf,

    /// Number of frames to render before exiting.
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frames: u64,

    /// Rendering backend: `gpu` (wgpu, headless) or `host` (records draw calls only).
    #[arg(
        long,
        value_name = "BACKEND",
        value_parser = parse_backend,
        default_value = "gpu"
    )]
    pub backend: Backend,

    /// Export the last rendered frame to the provided PNG path.
    #[arg(long, value_name = "PATH", value_parser = parse_export_path)]
    pub export: Option<PathBuf>,

    /// Override the glass resolution (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions)]
    pub size: Option<(u32, u32)>,

    /// Pace frames against the wall clock instead of a simulated timeline.
    #[arg(long)]
    pub realtime: bool,

    /// Override a glass option with a JSON value (e.g. `clear_color=[0,0,0,1]`).
    #[arg(long = "option", value_name = "KEY=JSON", value_parser = parse_option)]
    pub options: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gpu,
    Host,
}

impl Cli {
    /// Option overrides collected into a single update.
    pub fn option_overrides(&self) -> Map<String, Value> {
        self.options.iter().cloned().collect()
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_backend(value: &str) -> Result<Backend, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("backend must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "gpu" | "wgpu" => {
            if cfg!(feature = "gpu") {
                Ok(Backend::Gpu)
            } else {
                Err("gpu support is not enabled in this build".to_string())
            }
        }
        "host" | "none" => Ok(Backend::Host),
        other => Err(format!("unknown backend '{other}'; expected gpu or host")),
    }
}

pub fn parse_export_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    check_export_format(&path)?;
    Ok(path)
}

fn check_export_format(path: &Path) -> Result<(), String> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Ok(()),
        None => Err("export path has no extension; expected .png".to_string()),
        Some(other) => Err(format!(
            "unsupported export format '.{other}'; expected .png"
        )),
    }
}

pub fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height".to_string())?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_option(value: &str) -> Result<(String, Value), String> {
    let (key, raw) = value
        .split_once('=')
        .ok_or_else(|| "expected KEY=JSON".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("option key must not be empty".to_string());
    }
    let parsed = serde_json::from_str(raw.trim())
        .map_err(|err| format!("invalid JSON for option '{key}': {err}"))?;
    Ok((key.to_string(), parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_backends() {
        assert_eq!(parse_backend(" HOST ").unwrap(), Backend::Host);
        assert!(parse_backend("").is_err());
        assert!(parse_backend("vulkan").is_err());
        if cfg!(feature = "gpu") {
            assert_eq!(parse_backend("wgpu").unwrap(), Backend::Gpu);
        }
    }

    #[test]
    fn export_requires_png() {
        assert!(parse_export_path("out/frame.PNG").is_ok());
        assert!(parse_export_path("frame").is_err());
        assert!(parse_export_path("frame.exr").is_err());
    }

    #[test]
    fn parses_dimensions() {
        assert_eq!(parse_dimensions("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_dimensions("64 X 32").unwrap(), (64, 32));
        assert!(parse_dimensions("0x10").is_err());
        assert!(parse_dimensions("1280").is_err());
    }

    #[test]
    fn parses_json_options() {
        assert_eq!(
            parse_option("clear_color=[0, 0, 0, 1]").unwrap(),
            ("clear_color".to_string(), json!([0, 0, 0, 1]))
        );
        assert_eq!(
            parse_option("stats_interval = 2.5").unwrap(),
            ("stats_interval".to_string(), json!(2.5))
        );
        assert!(parse_option("=1").is_err());
        assert!(parse_option("fps").is_err());
        assert!(parse_option("fps=fast").is_err());
    }

    #[test]
    fn cli_collects_overrides() {
        let cli = Cli::try_parse_from([
            "plotglass",
            "--config",
            "glass.toml",
            "--backend",
            "host",
            "--option",
            "fps=30",
            "--size",
            "320x200",
        ])
        .unwrap();
        assert_eq!(cli.frames, 600);
        assert_eq!(cli.backend, Backend::Host);
        assert_eq!(cli.size, Some((320, 200)));
        assert_eq!(cli.option_overrides().get("fps"), Some(&json!(30)));
        assert!(Cli::try_parse_from(["plotglass", "-c", "g.toml", "--frames", "0"]).is_err());
    }
}
