use anyhow::{Context, Result};
use clap::Parser;
use kgquery::image::{visualization_prompts, ImageGenerator, ImageOrigin};
use kgquery::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "image")]
#[command(about = "Generate an illustrative image from a text prompt")]
struct Args {
    /// Text prompt; with --from-response, a query answer to derive prompts from
    prompt: String,

    /// Output file; the extension is chosen from the image format when omitted
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Number of inference steps (defaults to images.num_inference_steps)
    #[arg(long)]
    steps: Option<u32>,

    /// Guidance scale (defaults to images.guidance_scale)
    #[arg(long)]
    guidance: Option<f32>,

    /// Treat the argument as a query answer and generate up to three images
    /// for the topics it mentions
    #[arg(long)]
    from_response: bool,
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();
    let config = Config::load()?;

    let steps = args.steps.unwrap_or(config.images.num_inference_steps);
    let guidance = args.guidance.unwrap_or(config.images.guidance_scale);
    if steps == 0 {
        anyhow::bail!("--steps must be greater than 0");
    }

    let generator = ImageGenerator::from_config(&config.images);

    let prompts = if args.from_response {
        visualization_prompts(&args.prompt)
    } else {
        vec![args.prompt.clone()]
    };

    let images = generator.generate_batch(&prompts, steps, guidance).await;
    if images.is_empty() {
        anyhow::bail!("Please enter a prompt to generate an image.");
    }

    for (i, (prompt, image)) in images.iter().enumerate() {
        let ext = extension_for(&image.mime_type);
        let path = match (&args.out, images.len()) {
            (Some(out), 1) => out.clone(),
            (Some(out), _) => {
                let stem = out.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
                out.with_file_name(format!("{}-{}.{}", stem, i + 1, ext))
            }
            (None, _) => PathBuf::from(format!("image-{}.{}", i + 1, ext)),
        };

        std::fs::write(&path, &image.bytes)
            .with_context(|| format!("Failed to write image: {}", path.display()))?;

        let origin = match image.origin {
            ImageOrigin::Generated => "generated",
            ImageOrigin::Cached => "cached",
            ImageOrigin::Placeholder => "placeholder",
        };
        println!("{} -> {} ({})", prompt, path.display(), origin);
    }

    Ok(())
}
