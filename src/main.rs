//! # 图片规范化工具 — 命令行入口
//!
//! 本文件只负责参数解析、日志初始化与结果输出。
//! 业务逻辑全部在 `normalizer` 模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use image_normalizer::error::AppError;
use image_normalizer::normalizer::{
    ImageSource, NormalizeOptions, NormalizedImage, NormalizerService, PerformanceProfile,
};

#[derive(Parser, Debug)]
#[command(name = "image-normalizer")]
#[command(version)]
#[command(about = "Correct orientation, crop and downscale an image to fit a size budget")]
struct Cli {
    /// Image file path, or a `data:<type>/<subtype>;base64,...` string
    input: String,

    /// Maximum encoded size in KiB; larger results fail with size_exceeded
    #[arg(long)]
    max_size_kib: Option<u32>,

    /// Re-encode even when the input already fits
    #[arg(long)]
    force_resize: bool,

    /// Pass animated GIF / WebP / APNG through untouched
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    keep_animation: bool,

    /// Center-crop to this aspect ratio before scaling, e.g. 16:9
    #[arg(long, value_parser = parse_aspect)]
    aspect: Option<(u32, u32)>,

    /// Resampling profile: quality, balanced or speed
    #[arg(long)]
    profile: Option<String>,

    /// Write the normalized bytes to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the result summary as JSON
    #[arg(long)]
    json: bool,

    /// Also print the full data URI
    #[arg(long)]
    print_data_uri: bool,
}

fn parse_aspect(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(':')
        .ok_or_else(|| format!("expected W:H, got {value:?}"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("invalid width {w:?}: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("invalid height {h:?}: {e}"))?;
    if w == 0 || h == 0 {
        return Err("aspect components must be positive".to_string());
    }
    Ok((w, h))
}

/// 档位名在创建服务之前校验，非法值按参数错误退出（退出码 2）。
fn parse_profile(value: &str) -> Result<PerformanceProfile, AppError> {
    PerformanceProfile::from_str(value).map_err(|err| AppError::Argument(format!("--profile {err}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json {
                match serde_json::to_string_pretty(&serde_json::json!({ "error": &err })) {
                    Ok(body) => println!("{}", body),
                    Err(_) => eprintln!("❌ [{}] {}", err.code(), err),
                }
            } else {
                eprintln!("❌ [{}] {}", err.code(), err);
            }
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let options = NormalizeOptions {
        max_size_kib: cli.max_size_kib,
        bypass_animated: cli.keep_animation,
        force_resize: cli.force_resize,
        target_aspect: cli.aspect,
    };

    let profile = cli.profile.as_deref().map(parse_profile).transpose()?;

    let service = NormalizerService::new()?;
    if let Some(profile) = profile {
        service.normalizer().set_performance_profile(profile)?;
    }

    let result = service
        .process("cli", ImageSource::from_arg(&cli.input), &options)
        .await?;

    if let Some(path) = &cli.output {
        tokio::fs::write(path, &result.bytes).await?;
        log::info!("💾 已写入 {}（{} 字节）", path.display(), result.byte_size);
    }

    if cli.json {
        let mut body = serde_json::to_value(result.summary())?;
        if cli.print_data_uri {
            body["data_uri"] = serde_json::Value::String(result.data_uri.clone());
        }
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_summary(&result);
        if cli.print_data_uri {
            println!("{}", result.data_uri);
        }
    }

    Ok(())
}

fn print_summary(result: &NormalizedImage) {
    let raw = &result.raw_info;
    println!(
        "{} {}x{} ({:.2} KiB) -> {}x{} ({:.2} KiB) [{:?}]",
        raw.name.as_deref().unwrap_or("<data uri>"),
        raw.width,
        raw.height,
        raw.source_byte_size as f64 / 1024.0,
        result.width,
        result.height,
        result.size_kib(),
        result.outcome
    );
    if let Some(geometry) = &result.geometry {
        println!(
            "  crop {}x{}+{}+{}, {} pass(es), orientation tag {}",
            geometry.source_width,
            geometry.source_height,
            geometry.source_x,
            geometry.source_y,
            geometry.pass_factor,
            raw.orientation_tag.map_or("-".to_string(), |tag| tag.to_string())
        );
    }
    println!("  {}", result.object_url);
}
