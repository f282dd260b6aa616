use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use likeness_core::input::encode_png_data_url;
use likeness_core::{
    AgeReply, AgeService, AssetIndex, ImageRequest, ModelHandle, SimilarityReply,
    SimilarityService,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "likeness", about = "Face age and lookalike prediction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the age of the face in an image
    Age {
        /// Face photo
        image: PathBuf,
        /// Model manifest (TOML)
        #[arg(short, long, default_value = "models/age.toml")]
        manifest: PathBuf,
        /// Send the image through the data-URL path instead of as a decoded image
        #[arg(long)]
        data_url: bool,
    },
    /// Find the reference identities the face most resembles
    Similar {
        /// Face photo
        image: PathBuf,
        /// Model manifest (TOML)
        #[arg(short, long, default_value = "models/similarity.toml")]
        manifest: PathBuf,
        /// Directory of `<label>.jpg` reference photos
        #[arg(short, long, default_value = "celeb_samples_all")]
        gallery: PathBuf,
        /// Write each match image as NN.png into this directory
        #[arg(long)]
        save: Option<PathBuf>,
        /// Send the image through the data-URL path instead of as a decoded image
        #[arg(long)]
        data_url: bool,
    },
    /// Print an image as a data URL
    Encode {
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Age {
            image,
            manifest,
            data_url,
        } => {
            let service = AgeService::new(ModelHandle::from_manifest(&manifest));
            if !service.model().is_loaded() {
                bail!("age model failed to load from {}", manifest.display());
            }
            match service.predict(load_request(&image, data_url)?) {
                AgeReply::Message(message) => println!("{message}"),
                AgeReply::Null => println!("No image provided"),
                AgeReply::EmptySequence => println!("No result"),
            }
        }
        Commands::Similar {
            image,
            manifest,
            gallery,
            save,
            data_url,
        } => {
            let service =
                SimilarityService::new(ModelHandle::from_manifest(&manifest), AssetIndex::new(gallery));
            if !service.model().is_loaded() {
                bail!("similarity model failed to load from {}", manifest.display());
            }
            match service.predict(load_request(&image, data_url)?) {
                SimilarityReply::Gallery(items) => {
                    if let Some(dir) = &save {
                        std::fs::create_dir_all(dir)
                            .with_context(|| format!("cannot create {}", dir.display()))?;
                    }
                    for (rank, item) in items.iter().enumerate() {
                        println!("{}. {}", rank + 1, item.caption);
                        if let Some(dir) = &save {
                            let path = dir.join(format!("{:02}.png", rank + 1));
                            item.image
                                .save(&path)
                                .with_context(|| format!("cannot write {}", path.display()))?;
                        }
                    }
                }
                SimilarityReply::Null => println!("No image provided"),
                SimilarityReply::EmptySequence => println!("No matches"),
            }
        }
        Commands::Encode { image } => {
            let decoded = open_image(&image)?;
            println!("{}", encode_png_data_url(&decoded.into_rgb8())?);
        }
    }

    Ok(())
}

fn open_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("cannot open image {}", path.display()))
}

/// Build the request the way a web client would send it.
fn load_request(path: &Path, as_data_url: bool) -> Result<ImageRequest> {
    let decoded = open_image(path)?;
    tracing::debug!(
        path = %path.display(),
        width = decoded.width(),
        height = decoded.height(),
        as_data_url,
        "input image loaded"
    );
    if as_data_url {
        Ok(ImageRequest::DataUrl(encode_png_data_url(&decoded.into_rgb8())?))
    } else {
        Ok(ImageRequest::Decoded(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_similar_defaults() {
        let cli = Cli::try_parse_from(["likeness", "similar", "me.jpg"]).unwrap();
        match cli.command {
            Commands::Similar {
                image,
                manifest,
                gallery,
                save,
                data_url,
            } => {
                assert_eq!(image, PathBuf::from("me.jpg"));
                assert_eq!(manifest, PathBuf::from("models/similarity.toml"));
                assert_eq!(gallery, PathBuf::from("celeb_samples_all"));
                assert!(save.is_none());
                assert!(!data_url);
            }
            _ => panic!("expected similar"),
        }
    }

    #[test]
    fn test_load_request_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();

        assert!(matches!(load_request(&path, false).unwrap(), ImageRequest::Decoded(_)));
        match load_request(&path, true).unwrap() {
            ImageRequest::DataUrl(url) => assert!(url.starts_with("data:image/png;base64,")),
            other => panic!("expected data URL, got {}", other.kind()),
        }
        assert!(load_request(&dir.path().join("missing.png"), false).is_err());
    }
}
