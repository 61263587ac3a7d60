use std::path::PathBuf;

use clap::Parser;
use color_eyre::{Result, eyre::bail};
use imagegen::{
    credential::ApiKey,
    image_model::{AspectRatio, Gemini, GenerationRequest, ImageSize, generate},
    preview,
};

/// Generate an image with Gemini 3 Pro Image Preview, or transform an existing one.
///
/// Requires the GEMINI_API_KEY environment variable.
#[derive(clap::Parser)]
struct Cli {
    /// Text prompt describing the desired image
    #[arg(short, long)]
    prompt: String,

    /// Output path for the generated image
    #[arg(short, long)]
    output: PathBuf,

    /// Input image path for editing/transformation
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Aspect ratio for the generated image
    #[arg(short, long)]
    aspect_ratio: Option<AspectRatio>,

    /// Image size/resolution
    #[arg(short = 's', long)]
    image_size: Option<ImageSize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    imagegen::init_logging();
    let Cli {
        prompt,
        output,
        input,
        aspect_ratio,
        image_size,
    } = Cli::parse();

    let api_key = ApiKey::from_env()?;
    let request = GenerationRequest::try_new(prompt)?
        .with_input_image(input)
        .with_aspect_ratio(aspect_ratio)
        .with_image_size(image_size);

    println!("Generating image with prompt: {}", preview(&request.prompt, 100));

    let gemini = Gemini::new(api_key);
    let result = generate(&gemini, &request, &output).await?;
    if !result.success {
        bail!("Image generation did not produce an image");
    }

    println!(
        "Image generation completed successfully: {}",
        result.output_path.display()
    );
    Ok(())
}
